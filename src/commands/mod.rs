pub mod app_command;

pub use app_command::AppCommand;

pub const HELP: &str = "可用命令: survey | recent [n] | show <id> | schema | migrate | help | quit";

use std::str::FromStr;

pub const DEFAULT_RECENT: u64 = 50;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppCommand {
    Survey,
    Recent { n: u64 },
    Show { id: String },
    Schema,
    Migrate,
    Help,
    Quit,
    Unknown(String),
}

impl FromStr for AppCommand {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split_whitespace().collect();
        if parts.is_empty() {
            return Ok(AppCommand::Unknown("".to_string()));
        }

        match parts[0] {
            "survey" | "start" => Ok(AppCommand::Survey),
            "recent" => match parts.get(1) {
                None => Ok(AppCommand::Recent { n: DEFAULT_RECENT }),
                Some(raw) => match raw.parse::<u64>() {
                    Ok(n) if n > 0 => Ok(AppCommand::Recent { n }),
                    _ => Ok(AppCommand::Unknown("用法: recent [n]".to_string())),
                },
            },
            "show" => {
                if let Some(id) = parts.get(1) {
                    Ok(AppCommand::Show { id: id.to_string() })
                } else {
                    Ok(AppCommand::Unknown("用法: show <id>".to_string()))
                }
            }
            "schema" | "status" => Ok(AppCommand::Schema),
            "migrate" => Ok(AppCommand::Migrate),
            "help" | "?" => Ok(AppCommand::Help),
            "quit" | "exit" | "q" => Ok(AppCommand::Quit),
            other => Ok(AppCommand::Unknown(format!("未知命令: {}", other))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(s: &str) -> AppCommand {
        s.parse().unwrap()
    }

    #[test]
    fn parses_commands() {
        assert_eq!(parse("survey"), AppCommand::Survey);
        assert_eq!(parse("recent"), AppCommand::Recent { n: DEFAULT_RECENT });
        assert_eq!(parse("  recent 5 "), AppCommand::Recent { n: 5 });
        assert_eq!(parse("show r1"), AppCommand::Show { id: "r1".into() });
        assert_eq!(parse("migrate"), AppCommand::Migrate);
        assert_eq!(parse("exit"), AppCommand::Quit);
    }

    #[test]
    fn bad_arguments_are_unknown() {
        assert!(matches!(parse("recent 0"), AppCommand::Unknown(_)));
        assert!(matches!(parse("recent x"), AppCommand::Unknown(_)));
        assert!(matches!(parse("show"), AppCommand::Unknown(_)));
        assert!(matches!(parse("dance"), AppCommand::Unknown(m) if m.contains("dance")));
        assert_eq!(parse(""), AppCommand::Unknown(String::new()));
    }
}

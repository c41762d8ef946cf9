use anyhow::Context;
use chrono::Local;
use log::{info, warn};
use survey_recorder::ai::{ImageProvider, OpenAiImageProvider};
use survey_recorder::app_service::{run_command, AppContext, Flow};
use survey_recorder::commands::{AppCommand, HELP};
use survey_recorder::config::{AppConfig, SecretStore};
use survey_recorder::storage::{RecorderError, ResponseRecorder};
use survey_recorder::ui::Console;
use tokio::io::BufReader;

#[tokio::main(flavor = "multi_thread")]
async fn main() -> anyhow::Result<()> {
    let ts = Local::now().format("%Y%m%d-%H%M%S").to_string();
    let log_dir = std::path::PathBuf::from("logs");
    std::fs::create_dir_all(&log_dir)?;
    let log_path = log_dir.join(format!("app-{}.log", ts));
    let log_file = std::fs::File::create(log_path)?;
    env_logger::Builder::from_default_env()
        .target(env_logger::Target::Pipe(Box::new(log_file)))
        .filter_level(log::LevelFilter::Warn)
        .filter_module("survey_recorder", log::LevelFilter::Info)
        .filter_module("sqlx", log::LevelFilter::Error)
        .filter_module("sea_orm", log::LevelFilter::Error)
        .init();

    let config = AppConfig::from_env().context("读取配置失败")?;
    let secrets = SecretStore::load(config.secrets_path.as_deref()).context("读取密钥失败")?;

    let mut console = Console::new(BufReader::new(tokio::io::stdin()), tokio::io::stdout());

    // 表结构不兼容时仍然打开连接，只允许 schema / migrate
    let (recorder, schema_ready) = match ResponseRecorder::initialize(&config.storage).await {
        Ok(r) => (r, true),
        Err(e @ RecorderError::SchemaMismatch { .. }) => {
            warn!("{}", e);
            console.say(&format!("✗ {}", e)).await?;
            (ResponseRecorder::open(&config.storage).await?, false)
        }
        Err(e) => return Err(e).context("无法打开数据库"),
    };

    let provider: Option<Box<dyn ImageProvider>> =
        match OpenAiImageProvider::from_secrets(&secrets, &config.image) {
            Ok(p) => Some(Box::new(p)),
            Err(e) => {
                warn!("图片生成不可用: {}", e);
                console
                    .say(&format!("⚠ 图片生成不可用（{}），问卷仍可进行", e))
                    .await?;
                None
            }
        };

    let mut ctx = AppContext {
        config,
        recorder,
        provider,
        schema_ready,
    };

    // 有命令行参数时只执行一次
    let args: Vec<String> = std::env::args().skip(1).collect();
    let result = if !args.is_empty() {
        let cmd = args.join(" ").parse::<AppCommand>().unwrap_or(AppCommand::Help);
        run_command(&mut ctx, cmd, &mut console).await.map(|_| ())
    } else {
        repl(&mut ctx, &mut console).await
    };

    // 无论命令是否成功都释放存储句柄
    let closed = ctx.recorder.close().await;
    result?;
    closed?;
    info!("bye");
    Ok(())
}

async fn repl<R, W>(ctx: &mut AppContext, console: &mut Console<R, W>) -> anyhow::Result<()>
where
    R: tokio::io::AsyncBufRead + Unpin,
    W: tokio::io::AsyncWrite + Unpin,
{
    console.say(HELP).await?;
    loop {
        console.say("> ").await?;
        let Some(line) = console.read_line().await? else {
            return Ok(());
        };
        let cmd = line.parse::<AppCommand>().unwrap_or(AppCommand::Help);
        match run_command(ctx, cmd, console).await {
            Ok(Flow::Quit) => return Ok(()),
            Ok(Flow::Continue) => {}
            Err(e) => {
                warn!("命令执行失败: {:#}", e);
                console.say(&format!("✗ {:#}", e)).await?;
            }
        }
    }
}

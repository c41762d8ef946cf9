use crate::ai::{ImageError, ImageProvider};
use crate::commands::{AppCommand, HELP};
use crate::config::{AppConfig, ImageConfig, OPENAI_API_KEY};
use crate::storage::{schema, RecorderError, ResponseRecorder};
use crate::survey::{SessionError, SurveySession};
use crate::ui::Console;
use anyhow::Context;
use base64::Engine;
use log::{info, warn};
use std::path::PathBuf;
use tokio::io::{AsyncBufRead, AsyncWrite};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Quit,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SurveyOutcome {
    pub id: String,
    pub saved: bool,
    pub image_path: Option<PathBuf>,
}

/// 进程级上下文：记录器只构造一次，按引用传给每条命令
pub struct AppContext {
    pub config: AppConfig,
    pub recorder: ResponseRecorder,
    pub provider: Option<Box<dyn ImageProvider>>,
    pub schema_ready: bool,
}

pub async fn run_command<R, W>(
    ctx: &mut AppContext,
    cmd: AppCommand,
    console: &mut Console<R, W>,
) -> anyhow::Result<Flow>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    match cmd {
        AppCommand::Survey => {
            if !ctx.schema_ready {
                console
                    .say("✗ 数据表结构不兼容，请先执行 migrate")
                    .await?;
                return Ok(Flow::Continue);
            }
            let outcome = run_survey(
                console,
                &ctx.recorder,
                ctx.provider.as_deref(),
                &ctx.config.image,
            )
            .await?;
            info!("问卷结束 [{}] saved={}", outcome.id, outcome.saved);
        }
        AppCommand::Recent { n } => {
            let rows = ctx.recorder.recent(n).await?;
            if rows.is_empty() {
                console.say("Noch keine Einträge.").await?;
            }
            for r in rows {
                console
                    .say(&format!(
                        "{} | {} | {} | {} | {} | {} | {} | gefallen={} ueberzeugung={}",
                        r.id,
                        r.created_at,
                        r.alter_group,
                        r.geschlecht.as_deref().unwrap_or("-"),
                        r.bildung,
                        r.richtung,
                        r.einkommen.as_deref().unwrap_or("-"),
                        r.gefallen,
                        r.ueberzeugung
                    ))
                    .await?;
            }
        }
        AppCommand::Show { id } => match ctx.recorder.find_by_id(&id).await? {
            Some(mut rec) => {
                let image_len = rec.image_b64.take().map(|b| b.len());
                let mut view = serde_json::to_value(&rec)?;
                view["image_b64"] = match image_len {
                    Some(len) => format!("<{len} base64 chars>").into(),
                    None => serde_json::Value::Null,
                };
                console.say(&serde_json::to_string_pretty(&view)?).await?;
            }
            None => console.say("未找到对应记录").await?,
        },
        AppCommand::Schema => {
            let version = ctx.recorder.schema_version().await?;
            let user_version = schema::user_version(ctx.recorder.connection()).await?;
            console
                .say(&format!("schema: {} (user_version={})", version, user_version))
                .await?;
            if ctx.schema_ready {
                let total = ctx.recorder.count().await?;
                let with_image = ctx.recorder.count_with_image().await?;
                console
                    .say(&format!("记录数: {} (含图片: {})", total, with_image))
                    .await?;
            }
        }
        AppCommand::Migrate => {
            let report = ctx.recorder.migrate().await?;
            if report.steps.is_empty() {
                console.say(&format!("无需迁移: {}", report.to)).await?;
            } else {
                console
                    .say(&format!("✓ 迁移完成: {} -> {}", report.from, report.to))
                    .await?;
                for step in &report.steps {
                    console.say(&format!("  - {}", step)).await?;
                }
            }
            ctx.schema_ready = true;
        }
        AppCommand::Help => console.say(HELP).await?,
        AppCommand::Quit => return Ok(Flow::Quit),
        AppCommand::Unknown(msg) => {
            if !msg.is_empty() {
                console.say(&msg).await?;
            }
            console.say(HELP).await?;
        }
    }
    Ok(Flow::Continue)
}

/// 一次完整问卷：画像 -> 生成图片 -> 反馈 -> 写入
pub async fn run_survey<R, W>(
    console: &mut Console<R, W>,
    recorder: &ResponseRecorder,
    provider: Option<&dyn ImageProvider>,
    image_cfg: &ImageConfig,
) -> anyhow::Result<SurveyOutcome>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut session = SurveySession::new();
    let (profile, style) = console.collect_profile().await?;
    session.submit_profile(profile, style)?;

    console.say("Einen Moment, Motiv wird generiert …").await?;
    let result = match provider {
        Some(p) => p.generate(session.image_request(image_cfg)?).await,
        None => Err(ImageError::MissingSecret(OPENAI_API_KEY)),
    };
    session.attach_image(result)?;

    let image_path = match session.image() {
        Some(img) => match save_image(&image_cfg.output_dir, session.id(), &img.b64).await {
            Ok(path) => {
                console
                    .say(&format!(
                        "Generiertes neutrales Motiv (ohne Text/Logos): {}",
                        path.display()
                    ))
                    .await?;
                Some(path)
            }
            Err(e) => {
                warn!("图片无法写入磁盘 [{}]: {:#}", session.id(), e);
                None
            }
        },
        None => {
            let reason = session.image_error().unwrap_or("unbekannt").to_string();
            console
                .say(&format!(
                    "Bildgenerierung fehlgeschlagen: {reason}. Deine Antworten werden trotzdem gespeichert."
                ))
                .await?;
            None
        }
    };

    let feedback = console.collect_feedback().await?;
    session.submit_feedback(feedback)?;

    let saved = loop {
        match session.finish(recorder).await {
            Ok(()) => {
                console
                    .say("Danke! Deine Antworten wurden gespeichert.")
                    .await?;
                break true;
            }
            Err(SessionError::Recorder(e)) if e.is_retryable() => {
                console.say(&format!("Speichern fehlgeschlagen: {e}")).await?;
                if !console
                    .confirm("Später erneut versuchen? Deine Antworten bleiben erhalten", true)
                    .await?
                {
                    break false;
                }
            }
            Err(SessionError::Recorder(RecorderError::ConstraintViolation { field, reason }))
                if matches!(field, "gefallen" | "ueberzeugung" | "kommentar") =>
            {
                console
                    .say(&format!("Ungültige Antwort ({field}: {reason}), bitte erneut ausfüllen."))
                    .await?;
                let feedback = console.collect_feedback().await?;
                session.submit_feedback(feedback)?;
            }
            Err(SessionError::Recorder(e)) => {
                console
                    .say(&format!("Speichern fehlgeschlagen: {e}"))
                    .await?;
                break false;
            }
            Err(e) => return Err(e.into()),
        }
    };

    if saved {
        console
            .say("Du kannst das Fenster schließen. Vielen Dank fürs Mitmachen!")
            .await?;
    }
    Ok(SurveyOutcome {
        id: session.id().to_string(),
        saved,
        image_path,
    })
}

async fn save_image(dir: &std::path::Path, id: &str, b64: &str) -> anyhow::Result<PathBuf> {
    let bytes = base64::engine::general_purpose::STANDARD
        .decode(b64)
        .context("decode generated image")?;
    tokio::fs::create_dir_all(dir)
        .await
        .with_context(|| format!("create {}", dir.display()))?;
    let path = dir.join(format!("{id}.png"));
    tokio::fs::write(&path, bytes)
        .await
        .with_context(|| format!("write {}", path.display()))?;
    Ok(path)
}

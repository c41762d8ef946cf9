use crate::config::StorageConfig;
use log::info;
use sea_orm::{ConnectOptions, Database, DatabaseConnection, DbErr};
use std::time::Duration;

pub async fn establish_connection(cfg: &StorageConfig) -> Result<DatabaseConnection, DbErr> {
    let mut opt = ConnectOptions::new(cfg.database_url.to_owned());
    // 内存库每条连接都是独立的数据库，只能用单连接
    let max = if cfg.database_url.contains(":memory:") {
        1
    } else {
        cfg.max_connections.max(1)
    };
    opt.max_connections(max)
        .min_connections(1)
        .connect_timeout(cfg.write_timeout)
        .acquire_timeout(cfg.write_timeout)
        .idle_timeout(Duration::from_secs(60))
        .sqlx_logging(true)
        .sqlx_logging_level(log::LevelFilter::Info);

    let db = Database::connect(opt).await?;

    // 启用 WAL 模式
    let _ = sea_orm::ConnectionTrait::execute(
        &db,
        sea_orm::Statement::from_string(
            sea_orm::DatabaseBackend::Sqlite,
            "PRAGMA journal_mode=WAL;".to_string(),
        ),
    )
    .await?;

    info!("Database connection established with WAL mode: {}", cfg.database_url);

    Ok(db)
}

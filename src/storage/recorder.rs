use crate::config::StorageConfig;
use crate::storage::connection::establish_connection;
use crate::storage::error::RecorderError;
use crate::storage::repository::{ResponseRepository, ResponseSummary};
use crate::storage::schema::{self, MigrationReport, SchemaVersion};
use crate::survey::model::SurveyResponse;
use log::{error, info, warn};
use sea_orm::{DatabaseConnection, DbErr};
use std::future::Future;
use std::time::Duration;

/// 问卷结果记录器：持有唯一的存储句柄，进程内构造一次并显式传递
pub struct ResponseRecorder {
    db: DatabaseConnection,
    write_timeout: Duration,
}

impl ResponseRecorder {
    /// 连接并确认表结构；可在每次启动时重复调用
    pub async fn initialize(cfg: &StorageConfig) -> Result<Self, RecorderError> {
        let recorder = Self::open(cfg).await?;
        schema::ensure_canonical(&recorder.db).await?;
        info!("✓ 记录器已就绪: {}", cfg.database_url);
        Ok(recorder)
    }

    /// 只建立连接，不检查表结构（迁移命令使用）
    pub async fn open(cfg: &StorageConfig) -> Result<Self, RecorderError> {
        let db = with_timeout(cfg.write_timeout, "connect", async {
            establish_connection(cfg)
                .await
                .map_err(|e| RecorderError::StorageUnavailable(e.to_string()))
        })
        .await?;
        Ok(Self {
            db,
            write_timeout: cfg.write_timeout,
        })
    }

    pub fn connection(&self) -> &DatabaseConnection {
        &self.db
    }

    /// 追加一条记录：校验 -> 单条 INSERT。没有更新/删除路径
    ///
    /// 单语句自动提交直接申请写锁，锁被占用时走 SQLite 的 busy 等待；
    /// 主键冲突由 `From<DbErr>` 映射为 `id` 上的 ConstraintViolation
    pub async fn append(&self, rec: &SurveyResponse) -> Result<(), RecorderError> {
        if let Err(e) = rec.validate() {
            warn!("✗ 提交被拒绝 [{}]: {}", rec.id, e);
            return Err(e);
        }

        let result = with_timeout(
            self.write_timeout,
            "append",
            ResponseRepository::insert(&self.db, rec),
        )
        .await;

        match &result {
            Ok(()) => info!(
                "✓ 已保存问卷 [{}] (image: {})",
                rec.id,
                if rec.image_b64.is_some() { "yes" } else { "no" }
            ),
            Err(e @ RecorderError::ConstraintViolation { .. }) => {
                warn!("✗ 提交被拒绝 [{}]: {}", rec.id, e)
            }
            Err(e) => error!("✗ 保存失败 [{}]: {}", rec.id, e),
        }
        result
    }

    pub async fn find_by_id(&self, id: &str) -> Result<Option<SurveyResponse>, RecorderError> {
        let model = with_timeout(self.write_timeout, "read", async {
            ResponseRepository::find_by_id(&self.db, id)
                .await
                .map_err(|e| decode_error(id, e))
        })
        .await?;
        model.map(SurveyResponse::try_from).transpose()
    }

    pub async fn recent(&self, n: u64) -> Result<Vec<ResponseSummary>, RecorderError> {
        with_timeout(self.write_timeout, "read", async {
            ResponseRepository::recent(&self.db, n)
                .await
                .map_err(|e| decode_error("*", e))
        })
        .await
    }

    pub async fn count(&self) -> Result<u64, RecorderError> {
        with_timeout(self.write_timeout, "count", ResponseRepository::count(&self.db)).await
    }

    pub async fn count_with_image(&self) -> Result<u64, RecorderError> {
        with_timeout(
            self.write_timeout,
            "count",
            ResponseRepository::count_with_image(&self.db),
        )
        .await
    }

    pub async fn schema_version(&self) -> Result<SchemaVersion, RecorderError> {
        with_timeout(self.write_timeout, "inspect", schema::inspect(&self.db)).await
    }

    pub async fn migrate(&self) -> Result<MigrationReport, RecorderError> {
        schema::migrate(&self.db).await
    }

    /// 释放连接池
    pub async fn close(self) -> Result<(), RecorderError> {
        self.db
            .close()
            .await
            .map_err(|e| RecorderError::StorageUnavailable(e.to_string()))?;
        info!("记录器已关闭");
        Ok(())
    }
}

/// 旧数据里非空列出现 NULL 时 sea-orm 报 `DbErr::Type`，这是数据问题而不是存储不可用
fn decode_error(id: &str, err: DbErr) -> RecorderError {
    match err {
        DbErr::Type(reason) => RecorderError::CorruptRow {
            id: id.to_string(),
            reason,
        },
        other => other.into(),
    }
}

async fn with_timeout<T, E, F>(limit: Duration, op: &str, fut: F) -> Result<T, RecorderError>
where
    F: Future<Output = Result<T, E>>,
    E: Into<RecorderError>,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(r) => r.map_err(Into::into),
        Err(_) => Err(RecorderError::StorageUnavailable(format!(
            "{op} timed out after {}s",
            limit.as_secs_f32()
        ))),
    }
}

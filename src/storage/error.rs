use sea_orm::{DbErr, SqlErr};

#[derive(thiserror::Error, Debug)]
pub enum RecorderError {
    #[error("constraint violation on `{field}`: {reason}")]
    ConstraintViolation { field: &'static str, reason: String },
    #[error("storage unavailable: {0}")]
    StorageUnavailable(String),
    #[error("incompatible `responses` schema ({found}); {hint}")]
    SchemaMismatch { found: String, hint: String },
    #[error("stored row `{id}` is unreadable: {reason}")]
    CorruptRow { id: String, reason: String },
}

impl RecorderError {
    pub fn violation(field: &'static str, reason: impl Into<String>) -> Self {
        RecorderError::ConstraintViolation {
            field,
            reason: reason.into(),
        }
    }

    /// 提交失败后是否值得稍后重试（答案保留在内存中）
    pub fn is_retryable(&self) -> bool {
        matches!(self, RecorderError::StorageUnavailable(_))
    }
}

impl From<DbErr> for RecorderError {
    fn from(err: DbErr) -> Self {
        match err.sql_err() {
            Some(SqlErr::UniqueConstraintViolation(msg)) => {
                RecorderError::violation("id", format!("duplicate identifier ({msg})"))
            }
            _ if err.to_string().contains("UNIQUE constraint failed") => {
                RecorderError::violation("id", format!("duplicate identifier ({err})"))
            }
            _ => RecorderError::StorageUnavailable(err.to_string()),
        }
    }
}

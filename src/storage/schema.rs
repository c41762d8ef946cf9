use crate::storage::entity::Response;
use crate::storage::error::RecorderError;
use crate::survey::model::{format_timestamp, parse_timestamp};
use log::info;
use sea_orm::{
    ConnectionTrait, DatabaseBackend, DatabaseConnection, DbErr, Schema, Statement,
    TransactionTrait,
};
use std::collections::BTreeSet;
use std::fmt;

pub const TABLE: &str = "responses";

/// 当前规范 schema 的 `PRAGMA user_version`
pub const CANONICAL_VERSION: i32 = 2;

pub const CANONICAL_COLUMNS: [&str; 13] = [
    "id",
    "created_at",
    "alter_group",
    "geschlecht",
    "bildung",
    "richtung",
    "einkommen",
    "prompt",
    "image_b64",
    "gefallen",
    "ueberzeugung",
    "kommentar",
    "extras_json",
];

const EXTENDED_ONLY: [&str; 3] = ["geschlecht", "einkommen", "extras_json"];
const UMLAUT_RATING: &str = "überzeugung";
const RATING: &str = "ueberzeugung";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchemaVersion {
    Absent,
    /// 早期版本：没有 geschlecht / einkommen / extras_json
    LegacyBase { umlaut_rating: bool },
    /// 扩展列齐全，但评分列仍叫 `überzeugung`
    LegacyUmlaut,
    Canonical,
    /// 列名齐全，但 `id` 不是唯一主键
    MissingPrimaryKey,
    Unknown(Vec<String>),
}

impl SchemaVersion {
    pub fn is_legacy(&self) -> bool {
        matches!(
            self,
            SchemaVersion::LegacyBase { .. } | SchemaVersion::LegacyUmlaut
        )
    }

    fn classify(cols: &BTreeSet<String>) -> Self {
        if cols.is_empty() {
            return SchemaVersion::Absent;
        }
        let canonical: BTreeSet<String> = CANONICAL_COLUMNS.iter().map(|c| c.to_string()).collect();
        if *cols == canonical {
            return SchemaVersion::Canonical;
        }

        let with_umlaut: BTreeSet<String> = canonical
            .iter()
            .map(|c| if c == RATING { UMLAUT_RATING.to_string() } else { c.clone() })
            .collect();
        if *cols == with_umlaut {
            return SchemaVersion::LegacyUmlaut;
        }

        let base: BTreeSet<String> = canonical
            .iter()
            .filter(|c| !EXTENDED_ONLY.contains(&c.as_str()))
            .cloned()
            .collect();
        if *cols == base {
            return SchemaVersion::LegacyBase {
                umlaut_rating: false,
            };
        }
        let base_umlaut: BTreeSet<String> = base
            .iter()
            .map(|c| if c == RATING { UMLAUT_RATING.to_string() } else { c.clone() })
            .collect();
        if *cols == base_umlaut {
            return SchemaVersion::LegacyBase {
                umlaut_rating: true,
            };
        }

        SchemaVersion::Unknown(cols.iter().cloned().collect())
    }

    fn classify_table(cols: &BTreeSet<String>, pk: &BTreeSet<String>) -> Self {
        let version = Self::classify(cols);
        let id_only = pk.len() == 1 && pk.contains("id");
        match version {
            SchemaVersion::Absent | SchemaVersion::Unknown(_) => version,
            _ if !id_only => SchemaVersion::MissingPrimaryKey,
            _ => version,
        }
    }
}

impl fmt::Display for SchemaVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SchemaVersion::Absent => write!(f, "absent"),
            SchemaVersion::LegacyBase { umlaut_rating } => {
                if *umlaut_rating {
                    write!(f, "legacy base schema (v0, `überzeugung`)")
                } else {
                    write!(f, "legacy base schema (v0)")
                }
            }
            SchemaVersion::LegacyUmlaut => write!(f, "legacy extended schema (v1, `überzeugung`)"),
            SchemaVersion::Canonical => write!(f, "canonical schema (v{CANONICAL_VERSION})"),
            SchemaVersion::MissingPrimaryKey => write!(f, "known columns but `id` is not the primary key"),
            SchemaVersion::Unknown(cols) => write!(f, "unknown columns [{}]", cols.join(", ")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationReport {
    pub from: SchemaVersion,
    pub to: SchemaVersion,
    pub steps: Vec<String>,
}

pub async fn inspect<C: ConnectionTrait>(db: &C) -> Result<SchemaVersion, DbErr> {
    let rows = db
        .query_all(Statement::from_string(
            DatabaseBackend::Sqlite,
            format!("PRAGMA table_info({TABLE});"),
        ))
        .await?;

    let mut cols = BTreeSet::new();
    let mut pk = BTreeSet::new();
    for row in rows {
        if let Ok(name) = row.try_get::<String>("", "name") {
            if row.try_get::<i32>("", "pk").unwrap_or(0) > 0 {
                pk.insert(name.clone());
            }
            cols.insert(name);
        }
    }
    Ok(SchemaVersion::classify_table(&cols, &pk))
}

pub async fn user_version<C: ConnectionTrait>(db: &C) -> Result<i32, DbErr> {
    let row = db
        .query_one(Statement::from_string(
            DatabaseBackend::Sqlite,
            "PRAGMA user_version;".to_string(),
        ))
        .await?;
    Ok(row
        .and_then(|r| r.try_get::<i32>("", "user_version").ok())
        .unwrap_or(0))
}

async fn create_canonical<C: ConnectionTrait>(db: &C) -> Result<(), DbErr> {
    let builder = db.get_database_backend();
    let schema = Schema::new(builder);
    let stmt = builder.build(schema.create_table_from_entity(Response).if_not_exists());
    db.execute(stmt).await?;
    db.execute(Statement::from_string(
        builder,
        format!("PRAGMA user_version = {CANONICAL_VERSION};"),
    ))
    .await?;
    Ok(())
}

/// 启动时调用：表不存在则创建，已是规范 schema 则什么都不做，
/// 其它情况返回 SchemaMismatch，不做任何修补
pub async fn ensure_canonical(db: &DatabaseConnection) -> Result<(), RecorderError> {
    match inspect(db).await? {
        SchemaVersion::Absent => {
            create_canonical(db).await?;
            info!("✓ 已创建 {} 表 (schema v{})", TABLE, CANONICAL_VERSION);
            Ok(())
        }
        SchemaVersion::Canonical => Ok(()),
        found if found.is_legacy() => Err(RecorderError::SchemaMismatch {
            found: found.to_string(),
            hint: "run the `migrate` command to upgrade it".to_string(),
        }),
        found => Err(RecorderError::SchemaMismatch {
            found: found.to_string(),
            hint: "point DATABASE_URL at a different database".to_string(),
        }),
    }
}

/// 显式迁移：旧 schema -> 规范 schema，整个过程在一个事务里完成
pub async fn migrate(db: &DatabaseConnection) -> Result<MigrationReport, RecorderError> {
    let txn = db.begin().await?;
    let from = inspect(&txn).await?;
    let backend = txn.get_database_backend();
    let mut steps = Vec::new();

    match &from {
        SchemaVersion::Canonical => {}
        SchemaVersion::Absent => {
            create_canonical(&txn).await?;
            steps.push(format!("create table {TABLE}"));
        }
        SchemaVersion::LegacyBase { umlaut_rating } => {
            for col in EXTENDED_ONLY {
                let sql = format!("ALTER TABLE {TABLE} ADD COLUMN {col} TEXT;");
                txn.execute(Statement::from_string(backend, sql)).await?;
                steps.push(format!("add column {col}"));
            }
            if *umlaut_rating {
                rename_rating(&txn).await?;
                steps.push(format!("rename {UMLAUT_RATING} -> {RATING}"));
            }
        }
        SchemaVersion::LegacyUmlaut => {
            rename_rating(&txn).await?;
            steps.push(format!("rename {UMLAUT_RATING} -> {RATING}"));
        }
        SchemaVersion::Unknown(_) | SchemaVersion::MissingPrimaryKey => {
            txn.rollback().await?;
            return Err(RecorderError::SchemaMismatch {
                found: from.to_string(),
                hint: "no migration path is known for these columns".to_string(),
            });
        }
    }

    if from.is_legacy() {
        let n = normalize_timestamps(&txn).await?;
        if n > 0 {
            steps.push(format!("normalize created_at ({n} rows)"));
        }
    }

    if !steps.is_empty() {
        txn.execute(Statement::from_string(
            backend,
            format!("PRAGMA user_version = {CANONICAL_VERSION};"),
        ))
        .await?;
    }
    let to = inspect(&txn).await?;
    txn.commit().await?;

    if to != SchemaVersion::Canonical {
        return Err(RecorderError::SchemaMismatch {
            found: to.to_string(),
            hint: "migration finished without reaching the canonical schema".to_string(),
        });
    }
    info!("✓ schema 迁移完成: {} -> {} ({} 步)", from, to, steps.len());
    Ok(MigrationReport { from, to, steps })
}

async fn rename_rating<C: ConnectionTrait>(db: &C) -> Result<(), DbErr> {
    db.execute(Statement::from_string(
        db.get_database_backend(),
        format!("ALTER TABLE {TABLE} RENAME COLUMN \"{UMLAUT_RATING}\" TO {RATING};"),
    ))
    .await?;
    Ok(())
}

/// 旧数据的时间戳精度和时区写法不统一，统一改写成定长 RFC 3339，保证按文本排序即按时间排序
async fn normalize_timestamps<C: ConnectionTrait>(db: &C) -> Result<usize, DbErr> {
    let backend = db.get_database_backend();
    let rows = db
        .query_all(Statement::from_string(
            backend,
            format!("SELECT id, created_at FROM {TABLE};"),
        ))
        .await?;

    let mut changed = 0;
    for row in rows {
        let (Ok(id), Ok(raw)) = (
            row.try_get::<String>("", "id"),
            row.try_get::<String>("", "created_at"),
        ) else {
            continue;
        };
        // 无法解析的保留原样，读取时报 CorruptRow
        let Some(ts) = parse_timestamp(&raw) else {
            continue;
        };
        let canonical = format_timestamp(&ts);
        if canonical != raw {
            db.execute(Statement::from_sql_and_values(
                backend,
                format!("UPDATE {TABLE} SET created_at = ? WHERE id = ?;"),
                [canonical.into(), id.into()],
            ))
            .await?;
            changed += 1;
        }
    }
    Ok(changed)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(cols: &[&str]) -> BTreeSet<String> {
        cols.iter().map(|c| c.to_string()).collect()
    }

    #[test]
    fn classifies_known_layouts() {
        assert_eq!(SchemaVersion::classify(&set(&[])), SchemaVersion::Absent);
        assert_eq!(
            SchemaVersion::classify(&set(&CANONICAL_COLUMNS)),
            SchemaVersion::Canonical
        );

        let base = [
            "id",
            "created_at",
            "alter_group",
            "bildung",
            "richtung",
            "prompt",
            "image_b64",
            "gefallen",
            "ueberzeugung",
            "kommentar",
        ];
        assert_eq!(
            SchemaVersion::classify(&set(&base)),
            SchemaVersion::LegacyBase {
                umlaut_rating: false
            }
        );

        let umlaut: Vec<&str> = CANONICAL_COLUMNS
            .iter()
            .map(|c| if *c == "ueberzeugung" { "überzeugung" } else { *c })
            .collect();
        assert_eq!(
            SchemaVersion::classify(&set(&umlaut)),
            SchemaVersion::LegacyUmlaut
        );
    }

    #[test]
    fn extra_column_is_unknown() {
        let mut cols = set(&CANONICAL_COLUMNS);
        cols.insert("score".to_string());
        let v = SchemaVersion::classify(&cols);
        assert!(matches!(v, SchemaVersion::Unknown(_)));
        assert!(!v.is_legacy());
        assert!(v.to_string().contains("score"));
    }

    #[test]
    fn known_columns_without_id_key_are_rejected() {
        let cols = set(&CANONICAL_COLUMNS);
        assert_eq!(
            SchemaVersion::classify_table(&cols, &set(&["id"])),
            SchemaVersion::Canonical
        );
        assert_eq!(
            SchemaVersion::classify_table(&cols, &set(&[])),
            SchemaVersion::MissingPrimaryKey
        );
        assert_eq!(
            SchemaVersion::classify_table(&cols, &set(&["id", "created_at"])),
            SchemaVersion::MissingPrimaryKey
        );
        assert_eq!(
            SchemaVersion::classify_table(&set(&[]), &set(&[])),
            SchemaVersion::Absent
        );
    }
}

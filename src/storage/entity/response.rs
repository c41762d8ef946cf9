use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// `responses` 表：每位受访者一行，只追加不修改
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "responses")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false, column_type = "Text")]
    pub id: String,
    #[sea_orm(column_type = "Text")]
    pub created_at: String, // RFC 3339
    #[sea_orm(column_type = "Text")]
    pub alter_group: String,
    #[sea_orm(column_type = "Text", nullable)]
    pub geschlecht: Option<String>,
    #[sea_orm(column_type = "Text")]
    pub bildung: String,
    #[sea_orm(column_type = "Text")]
    pub richtung: String,
    #[sea_orm(column_type = "Text", nullable)]
    pub einkommen: Option<String>,
    #[sea_orm(column_type = "Text")]
    pub prompt: String,
    #[sea_orm(column_type = "Text", nullable)]
    pub image_b64: Option<String>,
    pub gefallen: i32,
    pub ueberzeugung: i32,
    #[sea_orm(column_type = "Text", nullable)]
    pub kommentar: Option<String>,

    // JSON 文本
    #[sea_orm(column_type = "Text", nullable)]
    pub extras_json: Option<String>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

use crate::storage::entity::response::{
    self, ActiveModel as ResponseActiveModel, Entity as Response, Model as ResponseModel,
};
use crate::storage::error::RecorderError;
use crate::survey::model::{format_timestamp, parse_timestamp, SurveyResponse};
use sea_orm::{
    ColumnTrait, ConnectionTrait, DbErr, EntityTrait, FromQueryResult, PaginatorTrait,
    QueryOrder, QuerySelect, Set,
};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// 管理员快速预览用，不含 prompt / 图片
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromQueryResult)]
pub struct ResponseSummary {
    pub id: String,
    pub created_at: String,
    pub alter_group: String,
    pub geschlecht: Option<String>,
    pub bildung: String,
    pub richtung: String,
    pub einkommen: Option<String>,
    pub gefallen: i32,
    pub ueberzeugung: i32,
}

impl From<&SurveyResponse> for ResponseActiveModel {
    fn from(rec: &SurveyResponse) -> Self {
        ResponseActiveModel {
            id: Set(rec.id.clone()),
            created_at: Set(format_timestamp(&rec.created_at)),
            alter_group: Set(rec.alter_group.clone()),
            geschlecht: Set(rec.geschlecht.clone()),
            bildung: Set(rec.bildung.clone()),
            richtung: Set(rec.richtung.clone()),
            einkommen: Set(rec.einkommen.clone()),
            prompt: Set(rec.prompt.clone()),
            image_b64: Set(rec.image_b64.clone()),
            gefallen: Set(rec.gefallen),
            ueberzeugung: Set(rec.ueberzeugung),
            kommentar: Set(rec.kommentar.clone()),
            extras_json: Set(rec
                .extras_json
                .as_ref()
                .map(|m| Value::Object(m.clone()).to_string())),
        }
    }
}

impl TryFrom<ResponseModel> for SurveyResponse {
    type Error = RecorderError;

    fn try_from(model: ResponseModel) -> Result<Self, Self::Error> {
        let created_at =
            parse_timestamp(&model.created_at).ok_or_else(|| RecorderError::CorruptRow {
                id: model.id.clone(),
                reason: format!("created_at `{}` is not a timestamp", model.created_at),
            })?;

        // 旧版本会写入 "{}"，视为没有额外答案
        let extras_json = match model.extras_json.as_deref().map(str::trim) {
            None | Some("") => None,
            Some(raw) => match serde_json::from_str::<Value>(raw) {
                Ok(Value::Object(m)) if m.is_empty() => None,
                Ok(Value::Object(m)) => Some(m),
                Ok(Value::Null) => None,
                Ok(other) => {
                    let mut m = Map::new();
                    m.insert("value".to_string(), other);
                    Some(m)
                }
                Err(e) => {
                    return Err(RecorderError::CorruptRow {
                        id: model.id,
                        reason: format!("extras_json is not JSON: {e}"),
                    })
                }
            },
        };

        Ok(SurveyResponse {
            id: model.id,
            created_at,
            alter_group: model.alter_group,
            geschlecht: model.geschlecht,
            bildung: model.bildung,
            richtung: model.richtung,
            einkommen: model.einkommen,
            prompt: model.prompt,
            image_b64: model.image_b64,
            gefallen: model.gefallen,
            ueberzeugung: model.ueberzeugung,
            kommentar: model.kommentar,
            extras_json,
        })
    }
}

pub struct ResponseRepository;

impl ResponseRepository {
    /// 纯插入，不做任何冲突处理：主键冲突由调用方映射
    pub async fn insert<C: ConnectionTrait>(db: &C, rec: &SurveyResponse) -> Result<(), DbErr> {
        let am = ResponseActiveModel::from(rec);
        Response::insert(am).exec_without_returning(db).await?;
        Ok(())
    }

    pub async fn find_by_id<C: ConnectionTrait>(
        db: &C,
        id: &str,
    ) -> Result<Option<ResponseModel>, DbErr> {
        Response::find_by_id(id.to_string()).one(db).await
    }

    pub async fn recent<C: ConnectionTrait>(
        db: &C,
        limit: u64,
    ) -> Result<Vec<ResponseSummary>, DbErr> {
        Response::find()
            .select_only()
            .columns([
                response::Column::Id,
                response::Column::CreatedAt,
                response::Column::AlterGroup,
                response::Column::Geschlecht,
                response::Column::Bildung,
                response::Column::Richtung,
                response::Column::Einkommen,
                response::Column::Gefallen,
                response::Column::Ueberzeugung,
            ])
            .order_by_desc(response::Column::CreatedAt)
            .limit(limit)
            .into_model::<ResponseSummary>()
            .all(db)
            .await
    }

    pub async fn count<C: ConnectionTrait>(db: &C) -> Result<u64, DbErr> {
        Response::find().count(db).await
    }

    pub async fn count_with_image<C: ConnectionTrait>(db: &C) -> Result<u64, DbErr> {
        use sea_orm::QueryFilter;
        Response::find()
            .filter(response::Column::ImageB64.is_not_null())
            .count(db)
            .await
    }
}

use crate::storage::error::RecorderError;
use base64::Engine;
use chrono::{DateTime, NaiveDateTime, SecondsFormat, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::OnceLock;

pub const RATING_MIN: i32 = 1;
pub const RATING_MAX: i32 = 7;

const LABEL_MAX_CHARS: usize = 128;
const ID_MAX_CHARS: usize = 64;
const COMMENT_MAX_CHARS: usize = 4000;
const AGE_MAX: u8 = 120;

/// 年龄段：`18-24` 或 `55+`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AgeBracket {
    pub min: u8,
    pub max: Option<u8>,
}

impl AgeBracket {
    pub fn parse(raw: &str) -> Option<Self> {
        static RE: OnceLock<Regex> = OnceLock::new();
        let re = RE.get_or_init(|| Regex::new(r"^(\d{1,3})\s*(?:[-–]\s*(\d{1,3})|(\+))$").unwrap());
        let caps = re.captures(raw.trim())?;
        let min: u8 = caps.get(1)?.as_str().parse().ok()?;
        let max = match caps.get(2) {
            Some(m) => Some(m.as_str().parse::<u8>().ok()?),
            None => None,
        };
        if min > AGE_MAX || max.is_some_and(|m| m < min || m > AGE_MAX) {
            return None;
        }
        Some(Self { min, max })
    }
}

/// 一份完整问卷记录，已通过校验
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SurveyResponse {
    pub id: String,
    pub created_at: DateTime<Utc>,
    pub alter_group: String,
    pub geschlecht: Option<String>,
    pub bildung: String,
    pub richtung: String,
    pub einkommen: Option<String>,
    pub prompt: String,
    pub image_b64: Option<String>,
    pub gefallen: i32,
    pub ueberzeugung: i32,
    pub kommentar: Option<String>,
    pub extras_json: Option<Map<String, Value>>,
}

/// 表现层交上来的原始答案，字段都可能缺失
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewResponse {
    pub id: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub alter_group: Option<String>,
    pub geschlecht: Option<String>,
    pub bildung: Option<String>,
    pub richtung: Option<String>,
    pub einkommen: Option<String>,
    pub prompt: Option<String>,
    pub image_b64: Option<String>,
    pub gefallen: Option<i32>,
    pub ueberzeugung: Option<i32>,
    pub kommentar: Option<String>,
    pub extras_json: Option<Map<String, Value>>,
}

fn required(field: &'static str, v: Option<String>) -> Result<String, RecorderError> {
    v.ok_or_else(|| RecorderError::violation(field, "required field is missing"))
}

fn optional_label(v: Option<String>) -> Option<String> {
    v.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
}

fn check_label(field: &'static str, v: &str) -> Result<(), RecorderError> {
    if v.trim().is_empty() {
        return Err(RecorderError::violation(field, "must not be empty"));
    }
    if v.trim() != v {
        return Err(RecorderError::violation(field, "surrounding whitespace"));
    }
    if v.chars().count() > LABEL_MAX_CHARS {
        return Err(RecorderError::violation(
            field,
            format!("longer than {LABEL_MAX_CHARS} characters"),
        ));
    }
    Ok(())
}

fn check_rating(field: &'static str, v: i32) -> Result<(), RecorderError> {
    if !(RATING_MIN..=RATING_MAX).contains(&v) {
        return Err(RecorderError::violation(
            field,
            format!("{v} is outside {RATING_MIN}..={RATING_MAX}"),
        ));
    }
    Ok(())
}

impl SurveyResponse {
    pub fn new_id() -> String {
        uuid::Uuid::new_v4().to_string()
    }

    pub fn validate(&self) -> Result<(), RecorderError> {
        if self.id.trim().is_empty() {
            return Err(RecorderError::violation("id", "must not be empty"));
        }
        if self.id.chars().count() > ID_MAX_CHARS {
            return Err(RecorderError::violation(
                "id",
                format!("longer than {ID_MAX_CHARS} characters"),
            ));
        }

        check_label("alter_group", &self.alter_group)?;
        if AgeBracket::parse(&self.alter_group).is_none() {
            return Err(RecorderError::violation(
                "alter_group",
                format!("`{}` is not an age bracket like 18-24 or 55+", self.alter_group),
            ));
        }
        check_label("bildung", &self.bildung)?;
        check_label("richtung", &self.richtung)?;
        if let Some(g) = &self.geschlecht {
            check_label("geschlecht", g)?;
        }
        if let Some(e) = &self.einkommen {
            check_label("einkommen", e)?;
        }

        if self.prompt.trim().is_empty() {
            return Err(RecorderError::violation("prompt", "must not be empty"));
        }

        if let Some(img) = &self.image_b64 {
            if img.is_empty() {
                return Err(RecorderError::violation(
                    "image_b64",
                    "empty image; leave it absent instead",
                ));
            }
            base64::engine::general_purpose::STANDARD
                .decode(img)
                .map_err(|e| RecorderError::violation("image_b64", format!("not base64: {e}")))?;
        }

        check_rating("gefallen", self.gefallen)?;
        check_rating("ueberzeugung", self.ueberzeugung)?;

        if self.extras_json.as_ref().is_some_and(|m| m.is_empty()) {
            return Err(RecorderError::violation(
                "extras_json",
                "empty map; leave it absent instead",
            ));
        }

        if let Some(k) = &self.kommentar {
            if k.chars().count() > COMMENT_MAX_CHARS {
                return Err(RecorderError::violation(
                    "kommentar",
                    format!("longer than {COMMENT_MAX_CHARS} characters"),
                ));
            }
        }
        Ok(())
    }

    pub fn created_at_text(&self) -> String {
        format_timestamp(&self.created_at)
    }
}

impl TryFrom<NewResponse> for SurveyResponse {
    type Error = RecorderError;

    fn try_from(raw: NewResponse) -> Result<Self, Self::Error> {
        let rec = SurveyResponse {
            id: raw.id.unwrap_or_else(SurveyResponse::new_id),
            created_at: raw.created_at.unwrap_or_else(Utc::now),
            alter_group: required("alter_group", raw.alter_group)?.trim().to_string(),
            geschlecht: optional_label(raw.geschlecht),
            bildung: required("bildung", raw.bildung)?.trim().to_string(),
            richtung: required("richtung", raw.richtung)?.trim().to_string(),
            einkommen: optional_label(raw.einkommen),
            prompt: required("prompt", raw.prompt)?,
            image_b64: raw.image_b64.filter(|s| !s.is_empty()),
            gefallen: raw
                .gefallen
                .ok_or_else(|| RecorderError::violation("gefallen", "required field is missing"))?,
            ueberzeugung: raw.ueberzeugung.ok_or_else(|| {
                RecorderError::violation("ueberzeugung", "required field is missing")
            })?,
            kommentar: optional_label(raw.kommentar),
            extras_json: raw.extras_json.filter(|m| !m.is_empty()),
        };
        rec.validate()?;
        Ok(rec)
    }
}

/// 定长纳秒精度，文本顺序与时间顺序一致
pub fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

/// 兼容旧数据：早期版本写入的是不带时区的 UTC 时间
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|n| n.and_utc())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw() -> NewResponse {
        NewResponse {
            alter_group: Some("25-34".into()),
            bildung: Some(" Lehre ".into()),
            richtung: Some("neutral".into()),
            prompt: Some("a quiet lake".into()),
            gefallen: Some(5),
            ueberzeugung: Some(2),
            kommentar: Some("   ".into()),
            ..Default::default()
        }
    }

    #[test]
    fn age_brackets() {
        assert_eq!(
            AgeBracket::parse("18-25"),
            Some(AgeBracket {
                min: 18,
                max: Some(25)
            })
        );
        assert_eq!(AgeBracket::parse("55+"), Some(AgeBracket { min: 55, max: None }));
        assert!(AgeBracket::parse("30-20").is_none());
        assert!(AgeBracket::parse("teen").is_none());
        assert!(AgeBracket::parse("18-250").is_none());
    }

    #[test]
    fn construction_normalizes_and_fills_defaults() {
        let rec = SurveyResponse::try_from(raw()).unwrap();
        assert_eq!(rec.bildung, "Lehre");
        assert_eq!(rec.kommentar, None);
        assert!(uuid::Uuid::parse_str(&rec.id).is_ok());
        assert!(rec.image_b64.is_none());
    }

    #[test]
    fn missing_required_field_is_rejected() {
        let mut r = raw();
        r.bildung = None;
        let err = SurveyResponse::try_from(r).unwrap_err();
        assert!(matches!(
            err,
            RecorderError::ConstraintViolation { field: "bildung", .. }
        ));
    }

    #[test]
    fn rating_bounds() {
        let mut r = raw();
        r.gefallen = Some(8);
        assert!(SurveyResponse::try_from(r).is_err());

        let mut r = raw();
        r.ueberzeugung = Some(0);
        assert!(SurveyResponse::try_from(r).is_err());

        let mut r = raw();
        r.gefallen = Some(RATING_MAX);
        r.ueberzeugung = Some(RATING_MIN);
        assert!(SurveyResponse::try_from(r).is_ok());
    }

    #[test]
    fn empty_extras_are_absent_not_empty() {
        let mut r = raw();
        r.extras_json = Some(Map::new());
        assert_eq!(SurveyResponse::try_from(r).unwrap().extras_json, None);

        let mut rec = SurveyResponse::try_from(raw()).unwrap();
        rec.extras_json = Some(Map::new());
        assert!(matches!(
            rec.validate(),
            Err(RecorderError::ConstraintViolation {
                field: "extras_json",
                ..
            })
        ));
    }

    #[test]
    fn image_must_be_base64() {
        let mut r = raw();
        r.image_b64 = Some("not base64!".into());
        let err = SurveyResponse::try_from(r).unwrap_err();
        assert!(matches!(
            err,
            RecorderError::ConstraintViolation { field: "image_b64", .. }
        ));
    }

    #[test]
    fn timestamps_round_trip() {
        let ts = parse_timestamp("2024-01-01T00:00:00Z").unwrap();
        assert_eq!(format_timestamp(&ts), "2024-01-01T00:00:00.000000000Z");

        let legacy = parse_timestamp("2024-03-05T10:11:12.345678").unwrap();
        assert_eq!(format_timestamp(&legacy), "2024-03-05T10:11:12.345678000Z");
    }

    #[test]
    fn timestamp_text_sorts_like_time() {
        let whole = parse_timestamp("2024-01-01T00:00:00Z").unwrap();
        let half = parse_timestamp("2024-01-01T00:00:00.5Z").unwrap();
        assert!(whole < half);
        assert!(format_timestamp(&whole) < format_timestamp(&half));
    }
}

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub const ALTER_GROUPS: [&str; 5] = ["18-24", "25-34", "35-44", "45-54", "55+"];
pub const GESCHLECHT: [&str; 3] = ["Mann", "Frau", "Divers"];
pub const BILDUNG: [&str; 5] = ["Sek II", "Lehre", "HF/FH", "Uni/ETH", "Andere"];
pub const EINKOMMEN: [&str; 4] = [
    "0–20’000 CHF",
    "20’000–80’000 CHF",
    "80’000–150’000 CHF",
    "150’000+ CHF",
];

/// 本问卷只生成中性图片
pub const RICHTUNG_NEUTRAL: &str = "neutral";

pub const MOTIVTHEMA: [&str; 5] = [
    "Community-Event im Stadtpark",
    "Neues Schulgebäude (Architektur-Visual)",
    "Öffentlicher Platz / Begegnungszone",
    "Rathaus-Foyer / Informationsstand",
    "Neutraler Natur-Ort (Wiese/Bäume/See)",
];
pub const BILDSTIL: [&str; 3] = ["Fotorealistisch", "Illustriert (clean)", "Halbrealistisch"];
pub const TAGESZEIT: [&str; 5] = ["Morgen", "Mittag", "Nachmittag", "Abend", "Blaue Stunde"];
pub const WETTER: [&str; 4] = [
    "Sonnig weich",
    "Bewölkt weich",
    "Leichtes Gegenlicht",
    "Innenraum soft light",
];
pub const FARBPALETTE: [&str; 5] = [
    "Neutral/Beige",
    "Kühl/Blau",
    "Warm/Orange",
    "Grün/Natur",
    "Monochrom",
];
pub const STIMMUNG: [&str; 4] = ["Ruhig", "Optimistisch", "Seriös", "Einladend"];
pub const PERSONENANZAHL: [&str; 4] = [
    "1 Person",
    "2–3 Personen",
    "Gruppe (5–8)",
    "Keine Person (nur Ort)",
];
pub const BEKLEIDUNG: [&str; 4] = ["Casual", "Smart-Casual", "Business-leicht", "Neutral/Outdoor"];
pub const KOMPOSITION: [&str; 4] = [
    "Halbtotal",
    "Total/Weitwinkel",
    "Porträt",
    "Subjekt vorn, Ort hinten",
];
pub const TIEFE: [&str; 3] = [
    "Leichte Tiefenunschärfe",
    "Alles scharf (f/8+)",
    "Moderate Unschärfe",
];
pub const DIVERSITY: [&str; 3] = ["Keine Präferenz", "Leicht gemischt", "Deutlich gemischt"];

pub const REALISMUS_MIN: i32 = 1;
pub const REALISMUS_MAX: i32 = 7;
pub const REALISMUS_DEFAULT: i32 = 6;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    pub alter_group: String,
    pub geschlecht: Option<String>,
    pub bildung: String,
    pub einkommen: Option<String>,
    pub richtung: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StylePreferences {
    pub motivthema: String,
    pub bildstil: String,
    pub realismus: i32,
    pub tageszeit: String,
    pub wetter: String,
    pub farbpalette: String,
    pub stimmung: String,
    pub personenanzahl: String,
    pub bekleidung: String,
    pub komposition: String,
    pub tiefe: String,
    pub diversity: String,
}

impl Default for StylePreferences {
    fn default() -> Self {
        Self {
            motivthema: MOTIVTHEMA[0].to_string(),
            bildstil: BILDSTIL[0].to_string(),
            realismus: REALISMUS_DEFAULT,
            tageszeit: TAGESZEIT[0].to_string(),
            wetter: WETTER[0].to_string(),
            farbpalette: FARBPALETTE[0].to_string(),
            stimmung: STIMMUNG[0].to_string(),
            personenanzahl: PERSONENANZAHL[0].to_string(),
            bekleidung: BEKLEIDUNG[0].to_string(),
            komposition: KOMPOSITION[0].to_string(),
            tiefe: TIEFE[0].to_string(),
            diversity: DIVERSITY[0].to_string(),
        }
    }
}

impl StylePreferences {
    /// 存入 `extras_json` 的键值对
    pub fn to_extras(&self) -> Map<String, Value> {
        match serde_json::to_value(self) {
            Ok(Value::Object(m)) => m,
            _ => Map::new(),
        }
    }
}

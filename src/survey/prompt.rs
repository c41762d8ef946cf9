use crate::survey::profile::{Profile, StylePreferences, REALISMUS_MAX};

const UNSPECIFIED: &str = "keine Angabe";

pub struct PromptBuilder;

impl PromptBuilder {
    /// 中性、无文字、无标志的图片提示词
    pub fn build(profile: &Profile, style: &StylePreferences) -> String {
        let geschlecht = profile.geschlecht.as_deref().unwrap_or(UNSPECIFIED);
        let einkommen = profile.einkommen.as_deref().unwrap_or(UNSPECIFIED);

        let mut lines = Vec::new();
        lines.push(
            "Erzeuge ein 1080x1350 neutrales, nicht-persuasives Bild **ohne Text** und **ohne Logos**."
                .to_string(),
        );
        lines.push(format!("Motivthema: {}.", style.motivthema));
        lines.push(format!(
            "Falls Personen: realistische Darstellung passend zu Alter {}, Geschlecht {}.",
            profile.alter_group, geschlecht
        ));
        lines.push(format!(
            "Personen: {}. Kleidung: {}. Diversität: {}.",
            style.personenanzahl, style.bekleidung, style.diversity
        ));
        lines.push(format!(
            "Stil: {}, Realismusgrad {}/{}. Stimmung: {}. Farbwelt: {}.",
            style.bildstil, style.realismus, REALISMUS_MAX, style.stimmung, style.farbpalette
        ));
        lines.push(format!(
            "Komposition/Kamera: {}. Tiefenwirkung: {}.",
            style.komposition, style.tiefe
        ));
        lines.push(format!(
            "Tageszeit: {}, Licht/Wetter: {}.",
            style.tageszeit, style.wetter
        ));
        lines.push(format!(
            "Sozioökonomische Anmutung: {} (nur subtile Kontexte; nicht stereotypisieren).",
            einkommen
        ));
        lines.push("Keine politischen Inhalte oder Symbole.".to_string());
        lines.join(" ")
    }
}

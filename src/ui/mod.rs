use crate::survey::model::{RATING_MAX, RATING_MIN};
use crate::survey::profile::*;
use crate::survey::session::Feedback;
use std::io;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};

const MAX_ATTEMPTS: usize = 5;

/// 逐行交互的表现层；读写端可替换，测试时直接喂脚本
pub struct Console<R, W> {
    input: R,
    output: W,
}

impl<R, W> Console<R, W>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    pub fn new(input: R, output: W) -> Self {
        Self { input, output }
    }

    pub fn into_output(self) -> W {
        self.output
    }

    pub async fn say(&mut self, text: &str) -> io::Result<()> {
        self.output.write_all(text.as_bytes()).await?;
        self.output.write_all(b"\n").await?;
        self.output.flush().await
    }

    async fn ask(&mut self, prompt: &str) -> io::Result<()> {
        self.output.write_all(prompt.as_bytes()).await?;
        self.output.flush().await
    }

    /// EOF 返回 None
    pub async fn read_line(&mut self) -> io::Result<Option<String>> {
        let mut buf = String::new();
        let n = self.input.read_line(&mut buf).await?;
        if n == 0 {
            return Ok(None);
        }
        Ok(Some(buf.trim().to_string()))
    }

    async fn answer(&mut self) -> io::Result<String> {
        self.read_line()
            .await?
            .ok_or_else(|| io::Error::new(io::ErrorKind::UnexpectedEof, "input closed"))
    }

    pub async fn choose(&mut self, label: &str, options: &[&str], default: usize) -> io::Result<String> {
        let default = default.min(options.len().saturating_sub(1));
        self.say(&format!("{label}:")).await?;
        for (i, opt) in options.iter().enumerate() {
            let mark = if i == default { "*" } else { " " };
            self.say(&format!(" {mark}{:>2}) {opt}", i + 1)).await?;
        }

        for _ in 0..MAX_ATTEMPTS {
            self.ask(&format!("Auswahl [1-{}, Enter = {}]: ", options.len(), default + 1))
                .await?;
            let line = self.answer().await?;
            if line.is_empty() {
                return Ok(options[default].to_string());
            }
            if let Ok(n) = line.parse::<usize>() {
                if (1..=options.len()).contains(&n) {
                    return Ok(options[n - 1].to_string());
                }
            }
            if let Some(opt) = options.iter().find(|o| o.eq_ignore_ascii_case(&line)) {
                return Ok(opt.to_string());
            }
            self.say("Ungültige Auswahl, bitte erneut versuchen.").await?;
        }
        Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("no valid answer for `{label}`"),
        ))
    }

    pub async fn slider(&mut self, label: &str, min: i32, max: i32, default: i32) -> io::Result<i32> {
        for _ in 0..MAX_ATTEMPTS {
            self.ask(&format!("{label} [{min}-{max}, Enter = {default}]: "))
                .await?;
            let line = self.answer().await?;
            if line.is_empty() {
                return Ok(default);
            }
            match line.parse::<i32>() {
                Ok(v) if (min..=max).contains(&v) => return Ok(v),
                _ => self.say(&format!("Bitte eine Zahl von {min} bis {max} eingeben.")).await?,
            }
        }
        Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("no valid answer for `{label}`"),
        ))
    }

    pub async fn text(&mut self, label: &str) -> io::Result<Option<String>> {
        self.ask(&format!("{label}: ")).await?;
        let line = self.answer().await?;
        Ok(Some(line).filter(|l| !l.is_empty()))
    }

    pub async fn confirm(&mut self, label: &str, default: bool) -> io::Result<bool> {
        let hint = if default { "J/n" } else { "j/N" };
        self.ask(&format!("{label} [{hint}]: ")).await?;
        let line = self.answer().await?.to_lowercase();
        Ok(match line.as_str() {
            "" => default,
            "j" | "ja" | "y" | "yes" => true,
            _ => false,
        })
    }

    pub async fn collect_profile(&mut self) -> io::Result<(Profile, StylePreferences)> {
        self.say("Profil (nur Darstellung, optional):").await?;
        let alter_group = self.choose("Alter (geschätzt)", &ALTER_GROUPS, 0).await?;
        let geschlecht = self.choose("Geschlecht", &GESCHLECHT, 0).await?;
        let bildung = self.choose("Höchster Abschluss", &BILDUNG, 0).await?;
        let einkommen = self
            .choose("Einkommen (Selbsteinschätzung)", &EINKOMMEN, 0)
            .await?;

        self.say("---").await?;
        self.say("Bild-/Stil-Präferenzen (neutral):").await?;
        let style = StylePreferences {
            motivthema: self.choose("Neutrales Motiv-Thema", &MOTIVTHEMA, 0).await?,
            bildstil: self.choose("Bildstil", &BILDSTIL, 0).await?,
            realismus: self
                .slider("Realismusgrad", REALISMUS_MIN, REALISMUS_MAX, REALISMUS_DEFAULT)
                .await?,
            tageszeit: self.choose("Tageszeit", &TAGESZEIT, 0).await?,
            wetter: self.choose("Licht/Wetter", &WETTER, 0).await?,
            farbpalette: self.choose("Farbwelt", &FARBPALETTE, 0).await?,
            stimmung: self.choose("Stimmung", &STIMMUNG, 0).await?,
            personenanzahl: self
                .choose("Personenanzahl im Bild", &PERSONENANZAHL, 0)
                .await?,
            bekleidung: self
                .choose("Bekleidungs-Vibe (falls Personen)", &BEKLEIDUNG, 0)
                .await?,
            komposition: self.choose("Komposition / Kamera", &KOMPOSITION, 0).await?,
            tiefe: self.choose("Tiefenwirkung", &TIEFE, 0).await?,
            diversity: self
                .choose("Diversität (falls Personen)", &DIVERSITY, 0)
                .await?,
        };

        let profile = Profile {
            alter_group,
            geschlecht: Some(geschlecht),
            bildung,
            einkommen: Some(einkommen),
            richtung: RICHTUNG_NEUTRAL.to_string(),
        };
        Ok((profile, style))
    }

    pub async fn collect_feedback(&mut self) -> io::Result<Feedback> {
        let mid = (RATING_MIN + RATING_MAX) / 2;
        let gefallen = self
            .slider("Wie gut gefällt dir das Motiv insgesamt?", RATING_MIN, RATING_MAX, mid)
            .await?;
        let ueberzeugung = self
            .slider("Wie glaubwürdig wirkt die Darstellung?", RATING_MIN, RATING_MAX, mid)
            .await?;
        let kommentar = self.text("Kurzes Feedback (optional)").await?;
        Ok(Feedback {
            gefallen,
            ueberzeugung,
            kommentar,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn console(script: &str) -> Console<&[u8], Vec<u8>> {
        Console::new(script.as_bytes(), Vec::new())
    }

    #[tokio::test]
    async fn choose_accepts_number_text_and_default() {
        let mut c = console("2\nfrau\n\n");
        assert_eq!(c.choose("G", &GESCHLECHT, 0).await.unwrap(), "Frau");
        assert_eq!(c.choose("G", &GESCHLECHT, 0).await.unwrap(), "Frau");
        assert_eq!(c.choose("G", &GESCHLECHT, 2).await.unwrap(), "Divers");
    }

    #[tokio::test]
    async fn invalid_answers_are_retried() {
        let mut c = console("9\nabc\n3\n");
        assert_eq!(c.choose("G", &GESCHLECHT, 0).await.unwrap(), "Divers");
        let out = String::from_utf8(c.into_output()).unwrap();
        assert_eq!(out.matches("Ungültige Auswahl").count(), 2);
    }

    #[tokio::test]
    async fn slider_bounds_and_eof() {
        let mut c = console("0\n8\n7\n");
        assert_eq!(c.slider("R", 1, 7, 4).await.unwrap(), 7);
        let err = c.slider("R", 1, 7, 4).await.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);
    }

    #[tokio::test]
    async fn feedback_with_blank_comment() {
        let mut c = console("5\n\n\n");
        let fb = c.collect_feedback().await.unwrap();
        assert_eq!(fb.gefallen, 5);
        assert_eq!(fb.ueberzeugung, 4);
        assert_eq!(fb.kommentar, None);
    }
}

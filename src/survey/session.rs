use crate::ai::{GeneratedImage, ImageError, ImageRequest};
use crate::config::ImageConfig;
use crate::storage::{RecorderError, ResponseRecorder};
use crate::survey::model::{NewResponse, SurveyResponse};
use crate::survey::profile::{Profile, StylePreferences};
use crate::survey::prompt::PromptBuilder;
use log::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Profile,
    Image,
    Feedback,
    Done,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Feedback {
    pub gefallen: i32,
    pub ueberzeugung: i32,
    pub kommentar: Option<String>,
}

#[derive(thiserror::Error, Debug)]
pub enum SessionError {
    #[error("session is at step {actual:?}, expected {expected:?}")]
    OutOfOrder { expected: Step, actual: Step },
    #[error(transparent)]
    Recorder(#[from] RecorderError),
}

/// 单个受访者的问卷会话：Profile -> Image -> Feedback -> Done
///
/// 所有答案都留在内存里，直到 `finish` 成功写入；写入失败可以直接重试。
pub struct SurveySession {
    id: String,
    step: Step,
    profile: Option<Profile>,
    style: Option<StylePreferences>,
    prompt: Option<String>,
    image: Option<GeneratedImage>,
    image_error: Option<String>,
    feedback: Option<Feedback>,
    prepared: Option<SurveyResponse>,
}

impl Default for SurveySession {
    fn default() -> Self {
        Self::new()
    }
}

impl SurveySession {
    pub fn new() -> Self {
        Self::with_id(SurveyResponse::new_id())
    }

    pub fn with_id(id: String) -> Self {
        Self {
            id,
            step: Step::Profile,
            profile: None,
            style: None,
            prompt: None,
            image: None,
            image_error: None,
            feedback: None,
            prepared: None,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn step(&self) -> Step {
        self.step
    }

    pub fn prompt(&self) -> Option<&str> {
        self.prompt.as_deref()
    }

    pub fn image(&self) -> Option<&GeneratedImage> {
        self.image.as_ref()
    }

    pub fn image_error(&self) -> Option<&str> {
        self.image_error.as_deref()
    }

    fn require(&self, expected: Step) -> Result<(), SessionError> {
        if self.step != expected {
            return Err(SessionError::OutOfOrder {
                expected,
                actual: self.step,
            });
        }
        Ok(())
    }

    pub fn submit_profile(
        &mut self,
        profile: Profile,
        style: StylePreferences,
    ) -> Result<&str, SessionError> {
        self.require(Step::Profile)?;
        let prompt = PromptBuilder::build(&profile, &style);
        self.profile = Some(profile);
        self.style = Some(style);
        self.step = Step::Image;
        Ok(self.prompt.insert(prompt).as_str())
    }

    pub fn image_request(&self, cfg: &ImageConfig) -> Result<ImageRequest, SessionError> {
        self.require(Step::Image)?;
        Ok(ImageRequest {
            model: cfg.model.clone(),
            prompt: self.prompt.clone().unwrap_or_default(),
            size: cfg.size.clone(),
        })
    }

    /// 生成失败不会中断问卷：记录原因，继续进入反馈环节，最终记录里没有图片
    pub fn attach_image(
        &mut self,
        result: Result<GeneratedImage, ImageError>,
    ) -> Result<(), SessionError> {
        self.require(Step::Image)?;
        match result {
            Ok(img) => {
                info!("✓ 图片已生成 [{}]", self.id);
                self.image = Some(img);
                self.image_error = None;
            }
            Err(e) => {
                warn!("✗ 图片生成失败 [{}]: {}", self.id, e);
                self.image = None;
                self.image_error = Some(e.to_string());
            }
        }
        self.step = Step::Feedback;
        Ok(())
    }

    pub fn submit_feedback(&mut self, feedback: Feedback) -> Result<(), SessionError> {
        self.require(Step::Feedback)?;
        self.feedback = Some(feedback);
        self.prepared = None;
        Ok(())
    }

    /// 组装最终记录；第一次组装时固定 created_at，重试时复用
    pub fn prepare(&mut self) -> Result<&SurveyResponse, SessionError> {
        self.require(Step::Feedback)?;
        if self.prepared.is_none() {
            let (Some(profile), Some(feedback)) = (self.profile.as_ref(), self.feedback.as_ref())
            else {
                return Err(SessionError::OutOfOrder {
                    expected: Step::Feedback,
                    actual: Step::Image,
                });
            };
            let raw = NewResponse {
                id: Some(self.id.clone()),
                created_at: None,
                alter_group: Some(profile.alter_group.clone()),
                geschlecht: profile.geschlecht.clone(),
                bildung: Some(profile.bildung.clone()),
                richtung: Some(profile.richtung.clone()),
                einkommen: profile.einkommen.clone(),
                prompt: self.prompt.clone(),
                image_b64: self.image.as_ref().map(|i| i.b64.clone()),
                gefallen: Some(feedback.gefallen),
                ueberzeugung: Some(feedback.ueberzeugung),
                kommentar: feedback.kommentar.clone(),
                extras_json: self.style.as_ref().map(StylePreferences::to_extras),
            };
            self.prepared = Some(SurveyResponse::try_from(raw)?);
        }
        self.prepared.as_ref().ok_or(SessionError::OutOfOrder {
            expected: Step::Feedback,
            actual: self.step,
        })
    }

    /// 写入记录器；失败时会话保持在 Feedback，答案不丢失
    ///
    /// 上一次提交超时但实际已落库时，重试会撞上主键；库里那行与本次记录完全一致即视为已保存
    pub async fn finish(&mut self, recorder: &ResponseRecorder) -> Result<(), SessionError> {
        let rec = self.prepare()?;
        if let Err(e) = recorder.append(rec).await {
            let already_saved = matches!(e, RecorderError::ConstraintViolation { field: "id", .. })
                && recorder.find_by_id(&rec.id).await?.as_ref() == Some(rec);
            if !already_saved {
                return Err(e.into());
            }
            info!("记录已在上一次提交中写入 [{}]", rec.id);
        }
        self.step = Step::Done;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::survey::profile::{ALTER_GROUPS, BILDUNG, RICHTUNG_NEUTRAL};

    fn profile() -> Profile {
        Profile {
            alter_group: ALTER_GROUPS[1].to_string(),
            geschlecht: None,
            bildung: BILDUNG[3].to_string(),
            einkommen: None,
            richtung: RICHTUNG_NEUTRAL.to_string(),
        }
    }

    fn feedback(g: i32) -> Feedback {
        Feedback {
            gefallen: g,
            ueberzeugung: 4,
            kommentar: Some("ok".to_string()),
        }
    }

    #[test]
    fn steps_must_run_in_order() {
        let mut s = SurveySession::new();
        assert!(matches!(
            s.submit_feedback(feedback(3)),
            Err(SessionError::OutOfOrder {
                expected: Step::Feedback,
                actual: Step::Profile
            })
        ));
        s.submit_profile(profile(), StylePreferences::default())
            .unwrap();
        assert_eq!(s.step(), Step::Image);
        assert!(s
            .submit_profile(profile(), StylePreferences::default())
            .is_err());
    }

    #[test]
    fn failed_image_still_leads_to_feedback() {
        let mut s = SurveySession::with_id("s1".into());
        s.submit_profile(profile(), StylePreferences::default())
            .unwrap();
        s.attach_image(Err(ImageError::Timeout)).unwrap();
        assert_eq!(s.step(), Step::Feedback);
        assert_eq!(s.image_error(), Some("request timed out"));

        s.submit_feedback(feedback(5)).unwrap();
        let rec = s.prepare().unwrap();
        assert_eq!(rec.id, "s1");
        assert!(rec.image_b64.is_none());
        assert_eq!(rec.richtung, "neutral");
        assert_eq!(rec.extras_json.as_ref().map(|m| m.len()), Some(12));
    }

    #[test]
    fn prepared_record_is_stable_until_feedback_changes() {
        let mut s = SurveySession::new();
        s.submit_profile(profile(), StylePreferences::default())
            .unwrap();
        s.attach_image(Ok(GeneratedImage {
            b64: "aGVsbG8=".into(),
            revised_prompt: None,
        }))
        .unwrap();
        s.submit_feedback(feedback(5)).unwrap();
        let first = s.prepare().unwrap().created_at;
        let again = s.prepare().unwrap().created_at;
        assert_eq!(first, again);

        s.submit_feedback(feedback(9)).unwrap();
        assert!(matches!(
            s.prepare(),
            Err(SessionError::Recorder(RecorderError::ConstraintViolation {
                field: "gefallen",
                ..
            }))
        ));
    }
}

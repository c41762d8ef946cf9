use crate::ai::build_image_http_client;
use crate::ai::types::{GeneratedImage, ImageError, ImageProvider, ImageRequest};
use crate::config::{ImageConfig, SecretStore, OPENAI_API_KEY};
use async_trait::async_trait;
use base64::Engine;
use log::info;
use reqwest::StatusCode;
use serde_json::Value;

#[derive(Clone)]
pub struct OpenAiImageProvider {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
}

impl OpenAiImageProvider {
    pub fn from_secrets(secrets: &SecretStore, cfg: &ImageConfig) -> Result<Self, ImageError> {
        let api_key = secrets
            .get(OPENAI_API_KEY)
            .ok_or(ImageError::MissingSecret(OPENAI_API_KEY))?;
        Self::new(api_key, cfg)
    }

    /// 代理配置错误直接报出，不退回到无代理、无超时的默认客户端
    pub fn new(api_key: String, cfg: &ImageConfig) -> Result<Self, ImageError> {
        let client = build_image_http_client(cfg)?;
        Ok(Self {
            client,
            api_key,
            base_url: cfg.base_url.clone(),
        })
    }
}

#[async_trait]
impl ImageProvider for OpenAiImageProvider {
    async fn generate(&self, req: ImageRequest) -> Result<GeneratedImage, ImageError> {
        let url = format!("{}/images/generations", self.base_url.trim_end_matches('/'));
        let body = serde_json::json!({
            "model": req.model,
            "prompt": req.prompt,
            "size": req.size,
        });

        info!("请求生成图片: model={} size={}", req.model, req.size);
        let resp = self
            .client
            .post(url)
            .bearer_auth(&self.api_key)
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ImageError::Timeout
                } else {
                    ImageError::Http(e.to_string())
                }
            })?;

        match resp.status() {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => return Err(ImageError::Unauthorized),
            StatusCode::TOO_MANY_REQUESTS => return Err(ImageError::RateLimited),
            _ => {}
        }

        let status = resp.status();
        let raw = resp.text().await.map_err(|e| {
            if e.is_timeout() {
                ImageError::Timeout
            } else {
                ImageError::Http(e.to_string())
            }
        })?;

        if !status.is_success() {
            return Err(ImageError::Http(format!("{} {}", status.as_u16(), raw)));
        }

        parse_generation(&raw)
    }
}

/// 解析 `data[0].b64_json`，并确认确实是 base64
pub fn parse_generation(raw: &str) -> Result<GeneratedImage, ImageError> {
    let v: Value = serde_json::from_str(raw)
        .map_err(|e| ImageError::InvalidResponse(format!("json parse failed: {e}")))?;

    if let Some(msg) = v
        .get("error")
        .and_then(|e| e.get("message"))
        .and_then(|m| m.as_str())
    {
        return Err(ImageError::InvalidResponse(msg.to_string()));
    }

    let item = v
        .get("data")
        .and_then(|d| d.get(0))
        .ok_or_else(|| ImageError::InvalidResponse("missing data[0]".to_string()))?;

    let b64 = item
        .get("b64_json")
        .and_then(|b| b.as_str())
        .filter(|s| !s.is_empty())
        .ok_or_else(|| ImageError::InvalidResponse("missing data[0].b64_json".to_string()))?;

    base64::engine::general_purpose::STANDARD
        .decode(b64)
        .map_err(|e| ImageError::InvalidResponse(format!("b64_json is not base64: {e}")))?;

    Ok(GeneratedImage {
        b64: b64.to_string(),
        revised_prompt: item
            .get("revised_prompt")
            .and_then(|p| p.as_str())
            .map(str::to_string),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_first_image() {
        let raw = r#"{"created":1,"data":[{"b64_json":"aGVsbG8=","revised_prompt":"calm lake"}]}"#;
        let img = parse_generation(raw).unwrap();
        assert_eq!(img.b64, "aGVsbG8=");
        assert_eq!(img.revised_prompt.as_deref(), Some("calm lake"));
    }

    #[test]
    fn error_body_is_reported() {
        let raw = r#"{"error":{"message":"content policy","type":"invalid_request_error"}}"#;
        match parse_generation(raw) {
            Err(ImageError::InvalidResponse(msg)) => assert_eq!(msg, "content policy"),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn missing_or_broken_payload() {
        assert!(matches!(
            parse_generation(r#"{"data":[]}"#),
            Err(ImageError::InvalidResponse(_))
        ));
        assert!(matches!(
            parse_generation(r#"{"data":[{"url":"https://x"}]}"#),
            Err(ImageError::InvalidResponse(_))
        ));
        assert!(matches!(
            parse_generation(r#"{"data":[{"b64_json":"%%%"}]}"#),
            Err(ImageError::InvalidResponse(_))
        ));
        assert!(parse_generation("<html>").is_err());
    }

    #[test]
    fn missing_key_is_typed() {
        let secrets = SecretStore::default();
        std::env::remove_var(OPENAI_API_KEY);
        let res = OpenAiImageProvider::from_secrets(&secrets, &ImageConfig::default());
        assert!(matches!(res, Err(ImageError::MissingSecret(OPENAI_API_KEY))));
    }

    #[test]
    fn bad_proxy_is_not_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".secrets");
        std::fs::write(&path, format!("{OPENAI_API_KEY}=sk-test\n")).unwrap();
        let secrets = SecretStore::load(Some(&path)).unwrap();

        let cfg = ImageConfig {
            proxy: Some("ftp://proxy.example:21".to_string()),
            ..ImageConfig::default()
        };
        assert!(matches!(
            OpenAiImageProvider::from_secrets(&secrets, &cfg),
            Err(ImageError::Http(_))
        ));

        let cfg = ImageConfig {
            proxy: Some("127.0.0.1:1080".to_string()),
            ..ImageConfig::default()
        };
        assert!(OpenAiImageProvider::from_secrets(&secrets, &cfg).is_ok());
    }
}

pub mod openai;
pub mod types;

pub use openai::OpenAiImageProvider;
pub use types::{GeneratedImage, ImageError, ImageProvider, ImageRequest};

use crate::config::ImageConfig;

pub(crate) fn build_image_http_client(cfg: &ImageConfig) -> Result<reqwest::Client, ImageError> {
    let mut builder = reqwest::Client::builder().timeout(cfg.timeout);

    if let Some(raw) = cfg.proxy.as_deref() {
        let t = raw.trim();
        if !t.is_empty() {
            let url = if t.contains("://") {
                t.to_string()
            } else {
                format!("socks5h://{}", t)
            };
            let proxy = reqwest::Proxy::all(&url).map_err(|e| ImageError::Http(e.to_string()))?;
            builder = builder.proxy(proxy);
        }
    }

    builder.build().map_err(|e| ImageError::Http(e.to_string()))
}

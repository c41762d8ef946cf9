use async_trait::async_trait;

#[derive(Clone, Debug)]
pub struct ImageRequest {
    pub model: String,
    pub prompt: String,
    pub size: String,
}

#[derive(Clone, Debug)]
pub struct GeneratedImage {
    pub b64: String,
    pub revised_prompt: Option<String>,
}

#[derive(thiserror::Error, Debug)]
pub enum ImageError {
    #[error("missing secret {0}")]
    MissingSecret(&'static str),
    #[error("http error: {0}")]
    Http(String),
    #[error("request timed out")]
    Timeout,
    #[error("unauthorized")]
    Unauthorized,
    #[error("rate limited")]
    RateLimited,
    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

#[async_trait]
pub trait ImageProvider: Send + Sync {
    async fn generate(&self, req: ImageRequest) -> Result<GeneratedImage, ImageError>;
}

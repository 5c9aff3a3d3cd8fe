pub mod gemini;
pub mod openai;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("missing model credentials")]
    MissingCredentials,
    #[error("http error: {0}")]
    Http(String),
    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

pub use gemini::{GeminiClient, GeminiConfig};
pub use openai::{OpenAiClient, OpenAiConfig};

/// An uploaded or fetched image, ready for inline transport to a vision
/// model. Data may be empty in demo mode; clients must tolerate that.
#[derive(Debug, Clone)]
pub struct ImageAttachment {
    pub name: String,
    pub mime_type: String,
    pub data: Vec<u8>,
}

impl ImageAttachment {
    pub fn base64(&self) -> String {
        use base64::{Engine, engine::general_purpose::STANDARD};
        STANDARD.encode(&self.data)
    }

    pub fn data_uri(&self) -> String {
        format!("data:{};base64,{}", self.mime_type, self.base64())
    }
}

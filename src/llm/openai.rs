use crate::http::build_client;
use crate::llm::{ImageAttachment, LlmError};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

#[derive(Debug, Clone)]
pub struct OpenAiConfig {
    pub api_key: Option<String>,
    pub model: String,
    pub endpoint: String,
}

impl OpenAiConfig {
    pub fn from_env() -> Self {
        Self {
            api_key: std::env::var("OPENAI_API_KEY")
                .ok()
                .filter(|v| !v.trim().is_empty()),
            model: std::env::var("OPENAI_MODEL").unwrap_or_else(|_| "gpt-4o-mini".into()),
            endpoint: std::env::var("OPENAI_ENDPOINT")
                .unwrap_or_else(|_| "https://api.openai.com/v1".into()),
        }
    }
}

/// Alternate-model collaborator for the third identification phase.
pub struct OpenAiClient {
    http: Client,
    config: OpenAiConfig,
}

impl OpenAiClient {
    pub fn new(config: OpenAiConfig) -> Self {
        Self {
            http: build_client(),
            config,
        }
    }

    pub async fn generate(
        &self,
        prompt: &str,
        images: &[ImageAttachment],
    ) -> Result<String, LlmError> {
        let Some(key) = self.config.api_key.as_deref() else {
            return Err(LlmError::MissingCredentials);
        };

        let mut content: Vec<Value> = vec![json!({ "type": "text", "text": prompt })];
        for image in images.iter().filter(|img| !img.data.is_empty()) {
            content.push(json!({
                "type": "image_url",
                "image_url": { "url": image.data_uri() },
            }));
        }

        let body = json!({
            "model": self.config.model,
            "messages": [{ "role": "user", "content": content }],
        });

        let url = format!(
            "{endpoint}/chat/completions",
            endpoint = self.config.endpoint.trim_end_matches('/'),
        );

        let response = self
            .http
            .post(url)
            .bearer_auth(key)
            .json(&body)
            .send()
            .await
            .map_err(|err| LlmError::Http(err.to_string()))?;

        if !response.status().is_success() {
            return Err(LlmError::Http(format!("HTTP {}", response.status())));
        }

        let payload: ChatResponse = response
            .json()
            .await
            .map_err(|err| LlmError::InvalidResponse(err.to_string()))?;

        let text = payload
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .unwrap_or_default();

        Ok(text)
    }
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Serialize, Deserialize)]
struct ChatMessage {
    #[serde(default)]
    content: Option<String>,
}

use crate::http::build_client;
use crate::identify::prompt::extract_candidates;
use crate::llm::ImageAttachment;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use thiserror::Error;
use tracing::warn;

#[derive(Debug, Error)]
pub enum OcrError {
    #[error("ocr request failed: {0}")]
    Request(String),
    #[error("invalid ocr response: {0}")]
    Deserialize(String),
}

/// Text extracted across the whole image batch plus the part-number-like
/// tokens found in it. An absent OCR collaborator yields the empty outcome,
/// which downstream treats as scenario C.
#[derive(Debug, Clone, Default)]
pub struct OcrOutcome {
    pub full_text: String,
    pub candidates: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct VisionConfig {
    pub api_key: Option<String>,
    pub endpoint: String,
}

impl VisionConfig {
    pub fn from_env() -> Self {
        Self {
            api_key: std::env::var("GOOGLE_VISION_API_KEY")
                .ok()
                .filter(|v| !v.trim().is_empty()),
            endpoint: std::env::var("GOOGLE_VISION_ENDPOINT")
                .unwrap_or_else(|_| "https://vision.googleapis.com/v1".into()),
        }
    }
}

pub struct VisionClient {
    http: Client,
    config: VisionConfig,
}

impl VisionClient {
    pub fn new(config: VisionConfig) -> Self {
        Self {
            http: build_client(),
            config,
        }
    }

    /// Run TEXT_DETECTION over every image with content and merge the text.
    /// Per-image failures degrade to skipping that image, never to an error
    /// for the whole batch.
    pub async fn extract_text(&self, images: &[ImageAttachment]) -> OcrOutcome {
        let Some(key) = self.config.api_key.as_deref() else {
            return OcrOutcome::default();
        };

        let mut full_text = String::new();
        for image in images.iter().filter(|img| !img.data.is_empty()) {
            match self.annotate_one(key, image).await {
                Ok(Some(text)) => {
                    if !full_text.is_empty() {
                        full_text.push('\n');
                    }
                    full_text.push_str(text.trim());
                }
                Ok(None) => {}
                Err(err) => {
                    warn!(
                        target = "partscout.ocr",
                        image = %image.name,
                        error = %err,
                        "ocr_image_skipped"
                    );
                }
            }
        }

        let candidates = extract_candidates(&full_text);
        OcrOutcome {
            full_text,
            candidates,
        }
    }

    async fn annotate_one(
        &self,
        key: &str,
        image: &ImageAttachment,
    ) -> Result<Option<String>, OcrError> {
        let body = json!({
            "requests": [{
                "image": { "content": image.base64() },
                "features": [{ "type": "TEXT_DETECTION" }],
            }]
        });

        let url = format!(
            "{endpoint}/images:annotate",
            endpoint = self.config.endpoint.trim_end_matches('/'),
        );

        let response = self
            .http
            .post(url)
            .query(&[("key", key)])
            .json(&body)
            .send()
            .await
            .map_err(|err| OcrError::Request(err.to_string()))?;

        if !response.status().is_success() {
            return Err(OcrError::Request(format!("HTTP {}", response.status())));
        }

        let payload: AnnotateResponse = response
            .json()
            .await
            .map_err(|err| OcrError::Deserialize(err.to_string()))?;

        Ok(payload
            .responses
            .into_iter()
            .next()
            .and_then(|entry| entry.full_text_annotation)
            .map(|annotation| annotation.text))
    }
}

#[derive(Debug, Deserialize)]
struct AnnotateResponse {
    #[serde(default)]
    responses: Vec<ImageAnnotation>,
}

#[derive(Debug, Deserialize)]
struct ImageAnnotation {
    #[serde(rename = "fullTextAnnotation")]
    full_text_annotation: Option<FullTextAnnotation>,
}

#[derive(Debug, Deserialize)]
struct FullTextAnnotation {
    #[serde(default)]
    text: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn missing_key_yields_scenario_c_outcome() {
        let client = VisionClient::new(VisionConfig {
            api_key: None,
            endpoint: "https://vision.googleapis.com/v1".into(),
        });
        let outcome = client.extract_text(&[]).await;
        assert!(outcome.full_text.is_empty());
        assert!(outcome.candidates.is_empty());
    }
}

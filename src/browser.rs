use crate::http::build_client;
use crate::llm::ImageAttachment;
use reqwest::Client;
use serde_json::{Value, json};
use thiserror::Error;
use tracing::{debug, warn};

// Selector drift on the target UI makes this phase structurally unreliable.
// Every sequence below is best effort; callers must expect total failure and
// must never treat a partial scrape as a confident identification.

const UPLOAD_SELECTORS: &[&str] = &[
    "input[type='file']",
    "input[accept*='image']",
    "[data-testid='file-upload'] input",
    "form input[type='file']",
];

const PROMPT_SELECTORS: &[&str] = &[
    "textarea",
    "[contenteditable='true']",
    "[data-testid='prompt-input']",
    "input[type='text']",
];

const RESPONSE_SELECTORS: &[&str] = &[
    "[data-testid='response']",
    ".model-response",
    "main article",
    "main",
];

const FIXED_PROMPT: &str = "Identify this auto part. Reply with labeled sections: \
Part Type, Part Number, Brand, Condition, Vehicle Fitment, Price Range, Optimized Title.";

const ENTER_KEY: &str = "\u{e007}";

#[derive(Debug, Error)]
pub enum BrowserError {
    #[error("no remote browser configured")]
    NotConfigured,
    #[error("webdriver request failed: {0}")]
    Request(String),
    #[error("no usable element for any candidate selector: {0}")]
    SelectorsExhausted(&'static str),
    #[error("scraped response was empty")]
    EmptyScrape,
}

#[derive(Debug, Clone)]
pub struct BrowserConfig {
    pub webdriver_url: Option<String>,
    pub target_url: String,
}

impl BrowserConfig {
    pub fn from_env() -> Self {
        Self {
            webdriver_url: std::env::var("REMOTE_BROWSER_URL")
                .ok()
                .filter(|v| !v.trim().is_empty()),
            target_url: std::env::var("BROWSER_TARGET_URL")
                .unwrap_or_else(|_| "https://gemini.google.com/app".into()),
        }
    }
}

/// Last-resort identification collaborator: drives a remote headless browser
/// through a third-party chat UI over the WebDriver wire protocol.
pub struct BrowserClient {
    http: Client,
    config: BrowserConfig,
}

impl BrowserClient {
    pub fn new(config: BrowserConfig) -> Self {
        Self {
            http: build_client(),
            config,
        }
    }

    /// navigate → upload → type fixed prompt → submit → scrape rendered text.
    /// The session is torn down on every exit path.
    pub async fn attempt_identification(
        &self,
        images: &[ImageAttachment],
    ) -> Result<String, BrowserError> {
        let Some(base) = self.config.webdriver_url.as_deref() else {
            return Err(BrowserError::NotConfigured);
        };
        let base = base.trim_end_matches('/');

        let session = self.open_session(base).await?;
        let result = self.drive(base, &session, images).await;
        if let Err(err) = self.close_session(base, &session).await {
            warn!(target = "partscout.browser", error = %err, "session_close_failed");
        }
        result
    }

    async fn drive(
        &self,
        base: &str,
        session: &str,
        images: &[ImageAttachment],
    ) -> Result<String, BrowserError> {
        self.post(
            &format!("{base}/session/{session}/url"),
            json!({ "url": self.config.target_url }),
        )
        .await?;

        if let Some(upload) = self
            .find_first(base, session, UPLOAD_SELECTORS)
            .await
        {
            for image in images.iter().filter(|img| !img.data.is_empty()) {
                // File inputs accept a path; remote ends usually map uploads
                // through a virtual filesystem keyed by filename.
                let _ = self
                    .post(
                        &format!("{base}/session/{session}/element/{upload}/value"),
                        json!({ "text": image.name }),
                    )
                    .await;
            }
        } else {
            debug!(
                target = "partscout.browser",
                "no upload affordance found, continuing text-only"
            );
        }

        let prompt_box = self
            .find_first(base, session, PROMPT_SELECTORS)
            .await
            .ok_or(BrowserError::SelectorsExhausted("prompt input"))?;

        self.post(
            &format!("{base}/session/{session}/element/{prompt_box}/value"),
            json!({ "text": format!("{FIXED_PROMPT}{ENTER_KEY}") }),
        )
        .await?;

        let response_el = self
            .find_first(base, session, RESPONSE_SELECTORS)
            .await
            .ok_or(BrowserError::SelectorsExhausted("response container"))?;

        let text = self
            .get_text(base, session, &response_el)
            .await?;
        if text.trim().is_empty() {
            return Err(BrowserError::EmptyScrape);
        }
        Ok(text)
    }

    async fn open_session(&self, base: &str) -> Result<String, BrowserError> {
        let value = self
            .post(
                &format!("{base}/session"),
                json!({ "capabilities": { "alwaysMatch": { "browserName": "chrome" } } }),
            )
            .await?;
        value
            .pointer("/value/sessionId")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| BrowserError::Request("missing sessionId".into()))
    }

    async fn close_session(&self, base: &str, session: &str) -> Result<(), BrowserError> {
        self.http
            .delete(format!("{base}/session/{session}"))
            .send()
            .await
            .map_err(|err| BrowserError::Request(err.to_string()))?;
        Ok(())
    }

    /// Try candidate selectors in priority order, returning the first element
    /// id that resolves.
    async fn find_first(&self, base: &str, session: &str, selectors: &[&str]) -> Option<String> {
        for selector in selectors {
            let body = json!({ "using": "css selector", "value": selector });
            match self
                .post(&format!("{base}/session/{session}/element"), body)
                .await
            {
                Ok(value) => {
                    if let Some(element) = element_id(&value) {
                        return Some(element);
                    }
                }
                Err(err) => {
                    debug!(
                        target = "partscout.browser",
                        selector = selector,
                        error = %err,
                        "selector_miss"
                    );
                }
            }
        }
        None
    }

    async fn get_text(
        &self,
        base: &str,
        session: &str,
        element: &str,
    ) -> Result<String, BrowserError> {
        let response = self
            .http
            .get(format!("{base}/session/{session}/element/{element}/text"))
            .send()
            .await
            .map_err(|err| BrowserError::Request(err.to_string()))?;
        let payload: Value = response
            .json()
            .await
            .map_err(|err| BrowserError::Request(err.to_string()))?;
        Ok(payload
            .pointer("/value")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string())
    }

    async fn post(&self, url: &str, body: Value) -> Result<Value, BrowserError> {
        let response = self
            .http
            .post(url)
            .json(&body)
            .send()
            .await
            .map_err(|err| BrowserError::Request(err.to_string()))?;
        if !response.status().is_success() {
            return Err(BrowserError::Request(format!("HTTP {}", response.status())));
        }
        response
            .json()
            .await
            .map_err(|err| BrowserError::Request(err.to_string()))
    }
}

fn element_id(value: &Value) -> Option<String> {
    let element = value.get("value")?.as_object()?;
    element
        .values()
        .next()
        .and_then(Value::as_str)
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn unconfigured_browser_fails_fast() {
        let client = BrowserClient::new(BrowserConfig {
            webdriver_url: None,
            target_url: "https://example.com".into(),
        });
        let err = client.attempt_identification(&[]).await.unwrap_err();
        assert!(matches!(err, BrowserError::NotConfigured));
    }

    #[test]
    fn element_id_reads_any_w3c_key() {
        let value = json!({
            "value": { "element-6066-11e4-a52e-4f735466cecf": "abc123" }
        });
        assert_eq!(element_id(&value).as_deref(), Some("abc123"));
    }
}

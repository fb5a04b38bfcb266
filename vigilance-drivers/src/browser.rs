use std::time::Duration;

use async_trait::async_trait;
use fantoccini::{Client, ClientBuilder};
use serde_json::{json, Value};
use tokio::time::{sleep, timeout};
use tracing::{debug, info, warn};
use url::Url;
use webdriver::capabilities::Capabilities;

use crate::source::{PageTextProvider, ProviderError};

const INNER_TEXT_SCRIPT: &str = "return document.body ? document.body.innerText : null;";

/// How to drive the browser for one capture.
#[derive(Debug, Clone)]
pub struct BrowserOptions {
    /// WebDriver endpoint, e.g. a local chromedriver.
    pub webdriver_url: String,
    pub headless: bool,
    /// Pause after navigation so client-side data can load.
    pub settle: Duration,
    /// Deadline for connecting and navigating.
    pub navigation_timeout: Duration,
}

impl Default for BrowserOptions {
    fn default() -> Self {
        Self {
            webdriver_url: "http://localhost:9515".to_string(),
            headless: true,
            settle: Duration::from_secs(5),
            navigation_timeout: Duration::from_secs(30),
        }
    }
}

/// Chrome capabilities for an unattended capture.
pub fn chrome_capabilities(headless: bool) -> Capabilities {
    let mut args = vec![
        json!("--no-sandbox"),
        json!("--disable-setuid-sandbox"),
        json!("--disable-dev-shm-usage"),
    ];
    if headless {
        args.push(json!("--headless"));
        args.push(json!("--disable-gpu"));
    }

    let mut caps = Capabilities::new();
    caps.insert("goog:chromeOptions".to_string(), json!({ "args": args }));
    caps
}

/// Renders a page in a WebDriver session and returns its visible text.
#[derive(Debug, Clone)]
pub struct BrowserSource {
    url: Url,
    options: BrowserOptions,
}

impl BrowserSource {
    pub fn new(url: &str, options: BrowserOptions) -> Result<Self, ProviderError> {
        let url = Url::parse(url)
            .map_err(|e| ProviderError::WebDriver(format!("invalid URL {url}: {e}")))?;
        Ok(Self { url, options })
    }

    async fn connect(&self) -> Result<Client, ProviderError> {
        ClientBuilder::native()
            .capabilities(chrome_capabilities(self.options.headless))
            .connect(&self.options.webdriver_url)
            .await
            .map_err(|e| ProviderError::WebDriver(format!("session start failed: {e}")))
    }

    async fn capture(&self, client: &Client) -> Result<String, ProviderError> {
        info!(url = %self.url, "loading page");
        timeout(self.options.navigation_timeout, client.goto(self.url.as_str()))
            .await
            .map_err(|_| ProviderError::Timeout {
                what: "navigation",
                after: self.options.navigation_timeout,
            })?
            .map_err(|e| ProviderError::WebDriver(format!("navigation failed: {e}")))?;

        debug!(settle_ms = self.options.settle.as_millis() as u64, "waiting for page data");
        sleep(self.options.settle).await;

        let value = client
            .execute(INNER_TEXT_SCRIPT, vec![])
            .await
            .map_err(|e| ProviderError::WebDriver(format!("text extraction failed: {e}")))?;
        inner_text(value)
    }
}

fn inner_text(value: Value) -> Result<String, ProviderError> {
    match value {
        Value::String(text) => Ok(text),
        Value::Null => Err(ProviderError::NotText("null".into())),
        other => Err(ProviderError::NotText(other.to_string())),
    }
}

#[async_trait]
impl PageTextProvider for BrowserSource {
    fn describe(&self) -> String {
        format!("browser:{}", self.url)
    }

    async fn fetch(&self) -> Result<Vec<u8>, ProviderError> {
        let client = timeout(self.options.navigation_timeout, self.connect())
            .await
            .map_err(|_| ProviderError::Timeout {
                what: "webdriver connection",
                after: self.options.navigation_timeout,
            })??;

        // Always attempt to close the session before returning
        let result = self.capture(&client).await;
        if let Err(e) = client.close().await {
            warn!(error = %e, "failed to close webdriver session");
        }

        let text = result?;
        info!(chars = text.chars().count(), "page text captured");
        Ok(text.into_bytes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn headless_adds_flags() {
        let caps = chrome_capabilities(true);
        let args = caps["goog:chromeOptions"]["args"].as_array().unwrap();
        assert!(args.contains(&json!("--headless")));
        assert!(args.contains(&json!("--no-sandbox")));

        let visible = chrome_capabilities(false);
        let args = visible["goog:chromeOptions"]["args"].as_array().unwrap();
        assert!(!args.contains(&json!("--headless")));
    }

    #[test]
    fn script_result_must_be_text() {
        assert_eq!(inner_text(json!("DEMAIN")).unwrap(), "DEMAIN");
        assert!(matches!(inner_text(Value::Null), Err(ProviderError::NotText(_))));
        assert!(matches!(inner_text(json!({"a": 1})), Err(ProviderError::NotText(_))));
    }

    #[test]
    fn rejects_unparsable_url() {
        let err = BrowserSource::new("not a url", BrowserOptions::default()).unwrap_err();
        assert!(matches!(err, ProviderError::WebDriver(_)));
    }

    #[test]
    fn describe_names_the_page() {
        let source =
            BrowserSource::new("https://example.org/vigilance/", BrowserOptions::default()).unwrap();
        assert_eq!(source.describe(), "browser:https://example.org/vigilance/");
    }
}

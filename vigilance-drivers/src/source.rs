use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tracing::{debug, info};
use vigilance_http::{HttpClient, HttpError, RequestOpts};

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Http(#[from] HttpError),

    #[error("webdriver error: {0}")]
    WebDriver(String),

    #[error("{what} timed out after {}s", after.as_secs())]
    Timeout { what: &'static str, after: Duration },

    #[error("page script returned {0} instead of text")]
    NotText(String),
}

impl ProviderError {
    pub fn is_timeout(&self) -> bool {
        match self {
            ProviderError::Timeout { .. } => true,
            ProviderError::Http(err) => err.is_timeout(),
            _ => false,
        }
    }
}

/// Something that can hand over the raw payload for one run.
#[async_trait]
pub trait PageTextProvider: Send + Sync {
    /// Short human-readable origin, for logs.
    fn describe(&self) -> String;

    async fn fetch(&self) -> Result<Vec<u8>, ProviderError>;
}

/// Reads a payload previously saved to disk.
#[derive(Debug, Clone)]
pub struct FileSource {
    path: PathBuf,
}

impl FileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl PageTextProvider for FileSource {
    fn describe(&self) -> String {
        format!("file:{}", self.path.display())
    }

    async fn fetch(&self) -> Result<Vec<u8>, ProviderError> {
        let bytes = tokio::fs::read(&self.path)
            .await
            .map_err(|source| ProviderError::Io {
                path: self.path.clone(),
                source,
            })?;
        debug!(path = %self.path.display(), len = bytes.len(), "payload read from file");
        Ok(bytes)
    }
}

/// Fetches a payload with a plain GET.
#[derive(Debug, Clone)]
pub struct HttpSource {
    client: HttpClient,
}

impl HttpSource {
    pub fn new(url: &str, timeout: Duration, retries: usize) -> Result<Self, ProviderError> {
        let client = HttpClient::new(url)?
            .with_timeout(timeout)
            .with_retries(retries);
        Ok(Self { client })
    }
}

#[async_trait]
impl PageTextProvider for HttpSource {
    fn describe(&self) -> String {
        self.client.base().to_string()
    }

    async fn fetch(&self) -> Result<Vec<u8>, ProviderError> {
        let fetched = self.client.get_bytes("", RequestOpts::default()).await?;
        info!(
            url = %fetched.url,
            status = %fetched.status,
            content_type = ?fetched.content_type,
            len = fetched.body.len(),
            "payload fetched"
        );
        Ok(fetched.body)
    }
}

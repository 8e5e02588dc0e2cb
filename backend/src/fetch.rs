use std::time::Duration;
use url::Url;

const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36";

#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
    #[error("Unsupported URL scheme: {0}")]
    UnsupportedScheme(String),
    #[error("Request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("Remote server returned status {0}")]
    Status(u16),
    #[error("Remote image exceeds {0} bytes")]
    TooLarge(usize),
}

/// Downloads images for URL-based prediction.
#[derive(Clone)]
pub struct ImageFetcher {
    client: reqwest::Client,
    max_bytes: usize,
}

impl ImageFetcher {
    pub fn new(timeout: Duration, max_bytes: usize) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()?;
        Ok(Self { client, max_bytes })
    }

    pub fn parse_url(raw: &str) -> Result<Url, FetchError> {
        let url = Url::parse(raw.trim())?;
        match url.scheme() {
            "http" | "https" => Ok(url),
            other => Err(FetchError::UnsupportedScheme(other.to_string())),
        }
    }

    pub async fn fetch(&self, raw_url: &str) -> Result<Vec<u8>, FetchError> {
        let url = Self::parse_url(raw_url)?;
        let mut response = self.client.get(url).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status(status.as_u16()));
        }
        if let Some(len) = response.content_length() {
            if len as usize > self.max_bytes {
                return Err(FetchError::TooLarge(self.max_bytes));
            }
        }

        let mut body = Vec::new();
        while let Some(chunk) = response.chunk().await? {
            if body.len() + chunk.len() > self.max_bytes {
                return Err(FetchError::TooLarge(self.max_bytes));
            }
            body.extend_from_slice(&chunk);
        }
        Ok(body)
    }
}

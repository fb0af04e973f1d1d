use async_trait::async_trait;
use log::{debug, trace};

use crate::crawler::errors::{CrawlerResult, TransportError};

/// Status and body of a fetched document
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchResponse {
    pub status: u16,
    pub body: String,
}

impl FetchResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Plain GET used for robots.txt, sitemap probing and sitemap retrieval.
///
/// Any HTTP status is a successful fetch; only failures to get a response at
/// all are errors.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn fetch(&self, url: &str) -> CrawlerResult<FetchResponse>;
}

/// `reqwest` backed transport with the client's default redirect policy
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new(user_agent: &str) -> CrawlerResult<Self> {
        let client = reqwest::Client::builder()
            .user_agent(user_agent)
            .build()
            .map_err(|e| TransportError::ClientBuildFailed(e.to_string()))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn fetch(&self, url: &str) -> CrawlerResult<FetchResponse> {
        trace!("[transport] GET {}", url);
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| TransportError::RequestFailed {
                url: url.to_string(),
                reason: e.to_string(),
            })?;

        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|e| TransportError::BodyReadFailed {
                url: url.to_string(),
                reason: e.to_string(),
            })?;

        debug!("[transport] {} -> {} ({} bytes)", url, status, body.len());
        Ok(FetchResponse { status, body })
    }
}

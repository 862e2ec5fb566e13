//! History source seam and its REST implementation.

use async_trait::async_trait;
use cohort_protocol::{ErrorBody, MessagePage};
use reqwest::Url;

use crate::error::{ClientError, ClientResult};

/// Paged read access to a channel's message log, most recent first
#[async_trait]
pub trait HistorySource: Send + Sync + 'static {
    async fn read_page(&self, channel_key: &str, limit: i64, offset: i64) -> ClientResult<MessagePage>;
}

/// `GET /api/channels/{key}/messages` over reqwest
#[derive(Debug, Clone)]
pub struct RestHistory {
    client: reqwest::Client,
    base_url: Url,
    token: String,
}

impl RestHistory {
    pub fn new(base_url: &str, token: impl Into<String>) -> ClientResult<Self> {
        let base_url =
            Url::parse(base_url).map_err(|e| ClientError::Protocol(format!("invalid server url {base_url}: {e}")))?;
        Ok(Self { client: reqwest::Client::new(), base_url, token: token.into() })
    }
}

#[async_trait]
impl HistorySource for RestHistory {
    async fn read_page(&self, channel_key: &str, limit: i64, offset: i64) -> ClientResult<MessagePage> {
        let url = self
            .base_url
            .join(&format!("/api/channels/{channel_key}/messages"))
            .map_err(|e| ClientError::Protocol(e.to_string()))?;

        let response = self
            .client
            .get(url)
            .bearer_auth(&self.token)
            .query(&[("limit", limit), ("offset", offset)])
            .send()
            .await?;

        if !response.status().is_success() {
            let body: ErrorBody = response.json().await?;
            return Err(ClientError::Rejected { code: body.error, message: body.message });
        }

        Ok(response.json().await?)
    }
}

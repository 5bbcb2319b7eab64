use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;

use crate::error::HistogramError;

/// Retrieves the bytes of a remote data file
#[async_trait]
pub trait DataFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<Bytes, HistogramError>;
}

pub fn make_data_fetcher() -> Arc<dyn DataFetcher> {
    Arc::new(ReqwestFetcher::new())
}

#[derive(Debug, Clone, Default)]
pub struct ReqwestFetcher {
    client: reqwest::Client,
}

impl ReqwestFetcher {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl DataFetcher for ReqwestFetcher {
    async fn fetch(&self, url: &str) -> Result<Bytes, HistogramError> {
        log::info!("Fetching {url}");
        let response = self.client.get(url).send().await?.error_for_status()?;
        Ok(response.bytes().await?)
    }
}

/// Serves preloaded responses keyed by URL, for offline use and tests
#[derive(Debug, Clone, Default)]
pub struct StaticFetcher {
    responses: HashMap<String, Bytes>,
}

impl StaticFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_response(mut self, url: impl Into<String>, body: impl Into<Bytes>) -> Self {
        self.responses.insert(url.into(), body.into());
        self
    }
}

#[async_trait]
impl DataFetcher for StaticFetcher {
    async fn fetch(&self, url: &str) -> Result<Bytes, HistogramError> {
        self.responses
            .get(url)
            .cloned()
            .ok_or_else(|| HistogramError::DataLoadError(format!("no response for {url}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_static_fetcher() {
        let fetcher = StaticFetcher::new().with_response("https://x.org/a.csv", "a\n1\n");
        let body = fetcher.fetch("https://x.org/a.csv").await.unwrap();
        assert_eq!(&body[..], b"a\n1\n");
        assert!(matches!(
            fetcher.fetch("https://x.org/b.csv").await,
            Err(HistogramError::DataLoadError(_))
        ));
    }
}

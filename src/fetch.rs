use std::future::Future;
use std::time::Duration;

use tracing::debug;

use crate::error::{CrawlError, Result};

/// Source of page bodies. The crawl only ever needs "GET this URL as text".
pub trait Fetch: Send + Sync + 'static {
    fn get_text(&self, url: &str) -> impl Future<Output = Result<String>> + Send;
}

pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new(timeout: Duration, user_agent: Option<&str>) -> Result<Self> {
        let mut builder = reqwest::Client::builder().timeout(timeout);
        if let Some(ua) = user_agent {
            builder = builder.user_agent(ua.to_string());
        }
        let client = builder
            .build()
            .map_err(|e| CrawlError::fetch("<client>", e))?;
        Ok(HttpFetcher { client })
    }
}

impl Fetch for HttpFetcher {
    async fn get_text(&self, url: &str) -> Result<String> {
        debug!("GET {}", url);
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| CrawlError::fetch(url, e))?;
        let status = response.status();
        if !status.is_success() {
            return Err(CrawlError::fetch(url, format!("HTTP {}", status)));
        }
        response.text().await.map_err(|e| CrawlError::fetch(url, e))
    }
}

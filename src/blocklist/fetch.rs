use anyhow::{Context, Error};
use async_trait::async_trait;
use std::time::Duration;

/// Remote blocklist document source
#[async_trait]
pub trait Fetch: Send + Sync {
    async fn fetch(&self) -> Result<String, Error>;
}

pub struct HttpFetch {
    url: String,
    client: reqwest::Client,
}

impl HttpFetch {
    pub fn new(url: &str) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .expect("build http client");
        Self {
            url: url.to_string(),
            client,
        }
    }
}

#[async_trait]
impl Fetch for HttpFetch {
    async fn fetch(&self) -> Result<String, Error> {
        let response = self
            .client
            .get(&self.url)
            .send()
            .await
            .context("blocklist request failed")?
            .error_for_status()
            .context("blocklist server error")?;

        response.text().await.context("blocklist body read failed")
    }
}

use anyhow::{Context as _, Result};
use async_trait::async_trait;

use super::Intermediary;

/// Where the directory gets its candidate list from.
#[async_trait]
pub trait IntermediarySource: Send + Sync {
    async fn fetch(&self) -> Result<Vec<Intermediary>>;
}

/// Registry document served as a JSON array of intermediaries.
pub struct HttpRegistry {
    client: reqwest::Client,
    url: String,
}

impl HttpRegistry {
    pub fn new(client: reqwest::Client, url: impl Into<String>) -> Self {
        Self {
            client,
            url: url.into(),
        }
    }
}

#[async_trait]
impl IntermediarySource for HttpRegistry {
    async fn fetch(&self) -> Result<Vec<Intermediary>> {
        let resp = self
            .client
            .get(&self.url)
            .send()
            .await
            .with_context(|| format!("GET registry {}", self.url))?
            .error_for_status()
            .with_context(|| format!("registry {} returned an error", self.url))?;
        resp.json::<Vec<Intermediary>>()
            .await
            .with_context(|| format!("decode registry {}", self.url))
    }
}

/// Fixed candidate list, for statically configured deployments.
#[derive(Debug, Clone, Default)]
pub struct StaticIntermediaries(pub Vec<Intermediary>);

#[async_trait]
impl IntermediarySource for StaticIntermediaries {
    async fn fetch(&self) -> Result<Vec<Intermediary>> {
        Ok(self.0.clone())
    }
}

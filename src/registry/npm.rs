//! npm-compatible registry client.

use anyhow::Result;
use async_trait::async_trait;
use log::debug;

use crate::error::EngineError;
use crate::http::HttpClient;

use super::{PackageDocument, Registry};

pub const DEFAULT_REGISTRY: &str = "https://registry.npmjs.org";

/// Document URL for `name`. Scoped names keep their `@` but encode the slash.
pub fn package_url(registry: &str, name: &str) -> String {
    format!(
        "{}/{}",
        registry.trim_end_matches('/'),
        name.replace('/', "%2F")
    )
}

pub struct NpmRegistry {
    http_client: HttpClient,
    url: String,
}

impl NpmRegistry {
    pub fn new(http_client: HttpClient, url: &str) -> Self {
        Self {
            http_client,
            url: url.trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl Registry for NpmRegistry {
    fn url(&self) -> &str {
        &self.url
    }

    async fn package(&self, name: &str) -> Result<PackageDocument> {
        let url = package_url(&self.url, name);
        debug!("Fetching package document from {}...", url);
        self.http_client
            .get_json::<PackageDocument>(&url)
            .await
            .map_err(|e| EngineError::registry(name, &e).into())
    }
}

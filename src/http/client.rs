//! HTTP client with bounded registry queries and streamed downloads.

use anyhow::{Context, Result};
use log::debug;
use reqwest::Client;
use serde::de::DeserializeOwned;
use std::io::Write;
use std::time::Duration;

use super::status::classify_status;

/// Upper bound for a registry metadata query, connect through body.
pub const DEFAULT_QUERY_TIMEOUT: Duration = Duration::from_secs(5);

/// HTTP client shared by the registry and the installer.
///
/// Requests are attempted once; a failed query surfaces immediately.
#[derive(Clone)]
pub struct HttpClient {
    client: Client,
    query_timeout: Duration,
}

impl HttpClient {
    /// Creates a new HTTP client wrapping the given reqwest Client.
    pub fn new(client: Client) -> Self {
        Self {
            client,
            query_timeout: DEFAULT_QUERY_TIMEOUT,
        }
    }

    /// Builds the client used by the CLI: our user agent, and a connect timeout
    /// equal to the query timeout so that downloads also fail fast on dead hosts.
    pub fn build(query_timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .user_agent(concat!("pluck-cli/", env!("PLUCK_VERSION")))
            .connect_timeout(query_timeout)
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self::new(client).with_query_timeout(query_timeout))
    }

    pub fn with_query_timeout(mut self, query_timeout: Duration) -> Self {
        self.query_timeout = query_timeout;
        self
    }

    /// Performs a GET request and deserializes the JSON response.
    #[tracing::instrument(skip(self))]
    pub async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T> {
        debug!("GET JSON from {}...", url);

        let response = self
            .client
            .get(url)
            .header(reqwest::header::ACCEPT, "application/json")
            .timeout(self.query_timeout)
            .send()
            .await
            .context("Failed to send request")?;

        let response = response.error_for_status().map_err(classify_status)?;

        response
            .json::<T>()
            .await
            .context("Failed to parse JSON response")
    }

    /// Downloads a file from a URL into the writer produced by `create_writer`.
    /// The writer is only created once the server has answered successfully.
    #[tracing::instrument(skip(self, create_writer))]
    pub async fn download_file<W, F>(&self, url: &str, create_writer: F) -> Result<u64>
    where
        W: Write,
        F: FnOnce() -> Result<W>,
    {
        debug!("Downloading file from {}...", url);

        let response = self
            .client
            .get(url)
            .send()
            .await
            .context("Failed to start download request")?;

        let mut response = response.error_for_status().map_err(classify_status)?;

        let mut writer = create_writer()?;
        let mut downloaded_bytes: u64 = 0;

        while let Some(chunk) = response
            .chunk()
            .await
            .context("Failed to read chunk from download stream")?
        {
            writer
                .write_all(&chunk)
                .context("Failed to write chunk to file")?;
            downloaded_bytes += chunk.len() as u64;
        }
        writer.flush().context("Failed to flush download")?;

        debug!("Downloaded {:.2} KB", downloaded_bytes as f64 / 1024.0);

        Ok(downloaded_bytes)
    }
}

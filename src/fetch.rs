//! HTTP retrieval of artifacts and manifests
//!
//! [`Fetcher::fetch`] downloads a whole payload into memory, retrying failed
//! attempts with linear backoff (see [`crate::retry`]) and reporting progress as
//! body chunks arrive. Cancellation aborts the request, the body stream, or the
//! wait between attempts.
//!
//! Timeouts apply to connecting and to each read (response headers, then every
//! body chunk) rather than to the whole transfer. A stalled read fails the
//! attempt with an I/O `TimedOut` error, which is retried.

use crate::config::{InstallConfig, RetryConfig};
use crate::error::{Error, Result};
use crate::retry::retry_with_backoff;
use serde::de::DeserializeOwned;
use std::future::Future;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Upper bound for the body buffer pre-allocation
const MAX_PREALLOCATION: u64 = 64 * 1024 * 1024;

/// Download progress of a single attempt
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FetchProgress {
    /// Bytes received so far in this attempt
    pub received: u64,
    /// Total size announced by the server, if any
    pub total: Option<u64>,
}

impl FetchProgress {
    /// `received / total`, or None when the server did not announce a size
    pub fn fraction(&self) -> Option<f32> {
        match self.total {
            Some(total) if total > 0 => Some((self.received as f64 / total as f64).min(1.0) as f32),
            _ => None,
        }
    }
}

/// HTTP client with retry and cancellable streaming downloads
#[derive(Clone, Debug)]
pub struct Fetcher {
    client: reqwest::Client,
    retry: RetryConfig,
    read_timeout: Duration,
}

impl Fetcher {
    /// Build a fetcher with its own HTTP client
    pub fn new(install: &InstallConfig, retry: RetryConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(install.connect_timeout)
            .user_agent(install.user_agent.clone())
            .build()?;
        Ok(Self {
            client,
            retry,
            read_timeout: install.read_timeout,
        })
    }

    /// Build a fetcher around an existing client, with the default read timeout
    pub fn with_client(client: reqwest::Client, retry: RetryConfig) -> Self {
        Self {
            client,
            retry,
            read_timeout: InstallConfig::default().read_timeout,
        }
    }

    /// Replace the per-read timeout
    pub fn with_read_timeout(mut self, read_timeout: Duration) -> Self {
        self.read_timeout = read_timeout;
        self
    }

    /// Retry settings in use
    pub fn retry_config(&self) -> &RetryConfig {
        &self.retry
    }

    /// Download `url` into memory
    ///
    /// `on_progress` is called once when response headers arrive and again after
    /// every body chunk. Returns the error of the last attempt once all attempts
    /// have failed, or [`Error::Cancelled`] as soon as `cancel` fires.
    pub async fn fetch<P>(
        &self,
        url: &str,
        cancel: &CancellationToken,
        on_progress: P,
    ) -> Result<Vec<u8>>
    where
        P: Fn(FetchProgress) + Send + Sync,
    {
        let on_progress = &on_progress;
        retry_with_backoff(&self.retry, cancel, move |attempt| {
            debug!(url, attempt, "fetching");
            self.fetch_once(url, cancel, on_progress)
        })
        .await
    }

    async fn fetch_once<P>(
        &self,
        url: &str,
        cancel: &CancellationToken,
        on_progress: &P,
    ) -> Result<Vec<u8>>
    where
        P: Fn(FetchProgress) + Send + Sync,
    {
        let response = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(Error::Cancelled),
            response = self.read(url, self.client.get(url).send()) => response?,
        };
        let mut response = response.error_for_status()?;

        let total = response.content_length().filter(|len| *len > 0);
        let mut body = Vec::with_capacity(total.unwrap_or(0).min(MAX_PREALLOCATION) as usize);
        let mut received = 0u64;
        on_progress(FetchProgress { received, total });

        loop {
            let chunk = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(Error::Cancelled),
                chunk = self.read(url, response.chunk()) => chunk?,
            };
            let Some(chunk) = chunk else { break };
            received += chunk.len() as u64;
            body.extend_from_slice(&chunk);
            on_progress(FetchProgress { received, total });
        }

        debug!(url, bytes = received, "fetch complete");
        Ok(body)
    }

    /// Fetch and decode a JSON document in a single attempt
    ///
    /// Unknown fields are ignored by the target types.
    pub async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T> {
        let response = self
            .read(url, self.client.get(url).send())
            .await?
            .error_for_status()?;
        let body = self.read(url, response.bytes()).await?;
        Ok(serde_json::from_slice(&body)?)
    }

    /// Await one network read, failing with `TimedOut` when it stalls
    async fn read<T>(
        &self,
        url: &str,
        read: impl Future<Output = reqwest::Result<T>>,
    ) -> Result<T> {
        match tokio::time::timeout(self.read_timeout, read).await {
            Ok(result) => Ok(result?),
            Err(_) => Err(Error::Io(std::io::Error::new(
                std::io::ErrorKind::TimedOut,
                format!("no data from {} for {:?}", url, self.read_timeout),
            ))),
        }
    }
}

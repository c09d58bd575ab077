//! Byte retrieval for `load_from_url`.
//!
//! This module provides:
//! * [`Transport`] — async trait for anything that can fetch a URL as bytes.
//! * [`HttpTransport`] — `reqwest` implementation configured by [`HttpConfig`].
//! * [`Loader`] — wraps a transport and enforces a single in-flight
//!   retrieval.  A second [`Loader::start`] while one is running fails with
//!   [`LoadError::Busy`]; the running retrieval is unaffected.
//! * [`LoadError`] — error variants for retrieval.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use crate::config::HttpConfig;

// ---------------------------------------------------------------------------
// LoadError
// ---------------------------------------------------------------------------

/// Errors that can occur while obtaining raw audio bytes.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum LoadError {
    /// Another retrieval is still in flight on this instance.
    #[error("a retrieval is already in flight")]
    Busy,

    /// HTTP transport or connection error.
    #[error("HTTP request failed: {0}")]
    Request(String),

    /// The request did not complete within the configured timeout.
    #[error("request timed out")]
    Timeout,

    /// The server answered with a non-success status.
    #[error("server responded with HTTP {0}")]
    Status(u16),
}

impl From<reqwest::Error> for LoadError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            LoadError::Timeout
        } else {
            LoadError::Request(e.to_string())
        }
    }
}

// ---------------------------------------------------------------------------
// Transport trait
// ---------------------------------------------------------------------------

/// Fetches a resource as raw binary content.
///
/// Implementors must be `Send + Sync` so they can be held behind an
/// `Arc<dyn Transport>` and used from spawned tasks.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, LoadError>;
}

// ---------------------------------------------------------------------------
// HttpTransport
// ---------------------------------------------------------------------------

/// Issues a single `GET` per fetch and returns the body bytes.
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    /// Build a transport from config.
    ///
    /// The client carries the configured timeout and user agent.  A default
    /// client is used as a last-resort fallback if the builder fails.
    pub fn from_config(config: &HttpConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .user_agent(config.user_agent.clone())
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self { client }
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, LoadError> {
        let response = self.client.get(url).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(LoadError::Status(status.as_u16()));
        }

        let body = response.bytes().await?;
        log::debug!("loader: fetched {} bytes from {url}", body.len());
        Ok(body.to_vec())
    }
}

// ---------------------------------------------------------------------------
// Loader
// ---------------------------------------------------------------------------

/// Single-slot retrieval front-end over a [`Transport`].
pub struct Loader {
    transport: Arc<dyn Transport>,
    in_flight: Arc<AtomicBool>,
}

impl Loader {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self {
            transport,
            in_flight: Arc::new(AtomicBool::new(false)),
        }
    }

    /// `true` while a [`Retrieval`] returned by [`start`](Self::start) is alive.
    pub fn is_busy(&self) -> bool {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// Claim the retrieval slot for `url`.
    ///
    /// The slot stays claimed until the returned [`Retrieval`] is dropped,
    /// so the caller can finish handling the bytes before another
    /// retrieval may start.
    pub fn start(&self, url: &str) -> Result<Retrieval, LoadError> {
        self.in_flight
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .map_err(|_| LoadError::Busy)?;

        Ok(Retrieval {
            transport: Arc::clone(&self.transport),
            url: url.to_owned(),
            slot: Arc::clone(&self.in_flight),
        })
    }
}

/// A claimed retrieval.  Dropping it releases the loader's slot.
pub struct Retrieval {
    transport: Arc<dyn Transport>,
    url: String,
    slot: Arc<AtomicBool>,
}

impl Retrieval {
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Perform the fetch.
    pub async fn run(&self) -> Result<Vec<u8>, LoadError> {
        self.transport.fetch(&self.url).await
    }
}

impl Drop for Retrieval {
    fn drop(&mut self) {
        self.slot.store(false, Ordering::SeqCst);
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

//! Pool observer API access.
//!
//! The observer exposes a small read-only HTTP API plus a WebSocket event
//! stream. This module provides the HTTP client ([`ObserverClient`]), the
//! decoded payload and event types, and the two background tasks that feed
//! the block tracker: the streaming consumer with its reconnect loop
//! ([`stream::task`]) and the fallback poller ([`poller::task`]).

pub mod events;
pub mod poller;
pub mod stream;
pub mod types;

use std::time::Duration;

use serde::de::DeserializeOwned;
use thiserror::Error;
use tracing::debug;

pub use types::{MinerInfo, PoolInfo};

/// Bound on every observer API request.
pub const API_TIMEOUT: Duration = Duration::from_secs(10);

/// How an observer API call failed.
///
/// Callers on the background paths log and skip the cycle; the command
/// layer turns these into short user-facing strings via
/// [`user_message`](ObserverError::user_message).
#[derive(Error, Debug)]
pub enum ObserverError {
    #[error("pool API unreachable: {0}")]
    Unreachable(#[source] reqwest::Error),

    #[error("pool API request timed out")]
    Timeout,

    #[error("pool API returned status {0}")]
    Status(u16),

    #[error("miner not found")]
    MinerNotFound,

    #[error("malformed pool API response: {0}")]
    Malformed(#[source] serde_json::Error),
}

impl ObserverError {
    /// Short human-readable form for command replies.
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::Unreachable(_) => "Could not connect to the pool API.",
            Self::Timeout => "The request to the pool API timed out.",
            Self::Status(_) => "The pool API request failed.",
            Self::MinerNotFound => "That miner address was not found on the pool.",
            Self::Malformed(_) => "The pool API returned an invalid response.",
        }
    }
}

/// HTTP client for the pool observer API.
#[derive(Debug, Clone)]
pub struct ObserverClient {
    http: reqwest::Client,
    base: String,
}

impl ObserverClient {
    /// Create a client for the given API base URL (for example
    /// `https://mini.p2pool.observer/api`).
    pub fn new(base: &str) -> crate::error::Result<Self> {
        let http = reqwest::Client::builder().timeout(API_TIMEOUT).build()?;
        Ok(Self {
            http,
            base: base.trim_end_matches('/').to_string(),
        })
    }

    /// Fetch current pool and sidechain statistics.
    pub async fn pool_info(&self) -> Result<PoolInfo, ObserverError> {
        self.get_json("pool_info").await
    }

    /// Fetch share statistics for one miner address.
    ///
    /// A 404 from the API means the address is unknown to the pool and is
    /// reported as [`ObserverError::MinerNotFound`].
    pub async fn miner_info(&self, address: &str) -> Result<MinerInfo, ObserverError> {
        match self.get_json(&format!("miner_info/{address}")).await {
            Err(ObserverError::Status(404)) => Err(ObserverError::MinerNotFound),
            other => other,
        }
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, ObserverError> {
        let url = format!("{}/{}", self.base, path);
        debug!(%url, "Fetching from observer API.");

        let response = self.http.get(&url).send().await.map_err(classify_send)?;
        let status = response.status();
        if !status.is_success() {
            return Err(ObserverError::Status(status.as_u16()));
        }

        // Decode from text rather than `Response::json` so a body that is
        // not valid JSON classifies as Malformed, not as a transport error.
        let body = response.text().await.map_err(classify_send)?;
        serde_json::from_str(&body).map_err(ObserverError::Malformed)
    }
}

fn classify_send(err: reqwest::Error) -> ObserverError {
    if err.is_timeout() {
        ObserverError::Timeout
    } else {
        ObserverError::Unreachable(err)
    }
}

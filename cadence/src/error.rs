//! # Error Taxonomy
//!
//! Typed errors for the retry and persistence paths. Startup code works in
//! `anyhow::Result`; everything a worker loop can observe is one of these.

use thiserror::Error;

/// Failure of a single chain interaction (balance, nonce or action).
///
/// The variant decides the executor's recovery: rotate the endpoint, re-fetch
/// the nonce, stop for the day, or back off.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ActionError {
    #[error("transport failure: {0}")]
    Transport(String),
    #[error("nonce conflict: {0}")]
    NonceConflict(String),
    #[error("insufficient funds: {0}")]
    InsufficientFunds(String),
    #[error("action rejected: {0}")]
    Rejected(String),
}

const TRANSPORT_MARKERS: [&str; 6] = [
    "invalid json rpc response",
    "invalid response",
    "deserialization error",
    "connection refused",
    "connection reset",
    "error sending request",
];

const NONCE_MARKERS: [&str; 5] = [
    "nonce too low",
    "nonce has already been used",
    "already known",
    "replacement transaction underpriced",
    "invalid nonce",
];

const FUNDS_MARKERS: [&str; 2] = ["insufficient funds", "insufficient balance"];

impl ActionError {
    /// Classifies a raw node or transport error message.
    pub fn classify(message: impl Into<String>) -> Self {
        let message = message.into();
        let lower = message.to_ascii_lowercase();
        if TRANSPORT_MARKERS.iter().any(|m| lower.contains(m)) {
            Self::Transport(message)
        } else if NONCE_MARKERS.iter().any(|m| lower.contains(m)) {
            Self::NonceConflict(message)
        } else if FUNDS_MARKERS.iter().any(|m| lower.contains(m)) {
            Self::InsufficientFunds(message)
        } else {
            Self::Rejected(message)
        }
    }
}

/// Tracker persistence failure. Always logged, never fatal.
#[derive(Debug, Error)]
pub enum TrackerError {
    #[error("tracker io error at {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("tracker encode error: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("tracker persist error at {path}: {reason}")]
    Persist { path: String, reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PoolError {
    #[error("endpoint pool requires at least one endpoint")]
    Empty,
}

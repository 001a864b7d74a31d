//! Error types for nutri-core.
//!
//! None of these reach an end user raw: the resolver turns validation failures
//! into [`Rejection`]s, the services turn [`ServiceError`]s into fallbacks and
//! the stores swallow [`StoreError`]s after logging them.

use crate::capability::Capability;
use thiserror::Error;

/// Failures of the key-value backend behind the credential and record stores.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("sled: {0}")]
    Sled(#[from] sled::Error),

    #[error("JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// Failures of a live capability call. Always recoverable through the fallback path.
#[derive(Error, Debug)]
pub enum ServiceError {
    /// Carries no URL: request URLs may hold credentials.
    #[error("request failed: {0}")]
    Transport(reqwest::Error),

    #[error("API error {status}: {body}")]
    Status { status: u16, body: String },

    #[error("malformed response: {0}")]
    MalformedResponse(String),

    #[error("{0}")]
    NotImplemented(&'static str),

    #[error("capability not configured: {0}")]
    NotConfigured(Capability),
}

impl From<reqwest::Error> for ServiceError {
    fn from(e: reqwest::Error) -> Self {
        ServiceError::Transport(e.without_url())
    }
}

/// A value refused by `configure`. The message is meant for the configuration page.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct Rejection {
    pub capability: Capability,
    pub message: String,
}

impl Rejection {
    pub fn new(capability: Capability, message: impl Into<String>) -> Self {
        Self {
            capability,
            message: message.into(),
        }
    }
}

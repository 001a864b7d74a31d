//! Capability services: each wraps one external dependency and degrades to a
//! local implementation instead of failing.
//!
//! Every call returns a [`Served`] value whose [`ServedBy`] tells the caller
//! whether the live dependency answered or the fallback did, and why.

mod ai;
mod database;

pub use ai::{
    build_chat_prompt, build_diet_prompt, fallback_chat_reply, fallback_diet_plan, AiService,
    FALLBACK_NOTE,
};
pub(crate) use ai::API_KEY_HEADER;
pub use database::{DatabaseService, RemoteBackend, UnimplementedBackend};

use crate::capability::Capability;
use crate::error::ServiceError;
use crate::resolver::ConfigHandle;
use serde::Serialize;
use std::future::Future;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", content = "detail", rename_all = "camelCase")]
pub enum FallbackReason {
    /// The capability was not configured; no live call was made.
    Unavailable,
    /// The live call was made and failed with this error.
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "path", rename_all = "camelCase")]
pub enum ServedBy {
    Live,
    Fallback(FallbackReason),
}

/// A service result tagged with the path that produced it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Served<T> {
    pub value: T,
    pub path: ServedBy,
}

impl<T> Served<T> {
    pub fn live(value: T) -> Self {
        Self {
            value,
            path: ServedBy::Live,
        }
    }

    pub fn fallback(value: T, reason: FallbackReason) -> Self {
        Self {
            value,
            path: ServedBy::Fallback(reason),
        }
    }

    pub fn is_live(&self) -> bool {
        self.path == ServedBy::Live
    }

    pub fn is_fallback(&self) -> bool {
        !self.is_live()
    }

    pub fn into_inner(self) -> T {
        self.value
    }
}

/// Common surface of the AI and database services.
#[async_trait::async_trait]
pub trait CapabilityService: Send + Sync {
    fn capability(&self) -> Capability;

    fn config(&self) -> &ConfigHandle;

    /// Re-read on every call so a runtime `configure` applies to the next request.
    async fn is_available(&self) -> bool {
        self.config().is_configured(self.capability()).await
    }
}

/// Attempt-then-fallback. Never returns an error: a failed attempt is logged
/// under `target` and recorded in the [`ServedBy`] tag.
pub async fn serve_with_fallback<T, A, Fut, F>(
    target: &'static str,
    available: bool,
    attempt: A,
    fallback: F,
) -> Served<T>
where
    A: FnOnce() -> Fut,
    Fut: Future<Output = Result<T, ServiceError>>,
    F: FnOnce() -> T,
{
    if !available {
        return Served::fallback(fallback(), FallbackReason::Unavailable);
    }
    match attempt().await {
        Ok(value) => Served::live(value),
        Err(e) => {
            tracing::warn!(target: "nutri::services", "[{}] live call failed, using fallback: {}", target, e);
            Served::fallback(fallback(), FallbackReason::Failed(e.to_string()))
        }
    }
}

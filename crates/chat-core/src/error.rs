use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Broad error category used for user-facing handling and retry behavior.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ChatErrorCategory {
    /// Invalid input or unsupported request.
    Config,
    /// Transient failure of the (simulated) transport.
    Network,
    /// Runtime shut down or invariant break.
    Internal,
}

/// Stable error payload surfaced to UI collaborators.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Error)]
#[error("{category:?}:{code}: {message}")]
pub struct ChatError {
    /// High-level error category.
    pub category: ChatErrorCategory,
    /// Stable machine-readable error code.
    pub code: String,
    /// Human-readable message.
    pub message: String,
    /// Optional retry hint in milliseconds.
    pub retry_after_ms: Option<u64>,
}

impl ChatError {
    /// Construct a new error.
    pub fn new(
        category: ChatErrorCategory,
        code: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            category,
            code: code.into(),
            message: message.into(),
            retry_after_ms: None,
        }
    }

    /// Attach a retry hint to the error.
    pub fn with_retry_after(mut self, retry_after: Duration) -> Self {
        self.retry_after_ms = Some(retry_after.as_millis() as u64);
        self
    }

    /// Simulated send rejected by the backend.
    pub fn send_failed(message: impl Into<String>) -> Self {
        Self::new(ChatErrorCategory::Network, "send_failed", message)
    }

    /// Send request with nothing to send.
    pub fn empty_message(channel_id: &str) -> Self {
        Self::new(
            ChatErrorCategory::Config,
            "empty_message",
            format!("refusing to send an empty message to channel {channel_id}"),
        )
    }

    /// The session runtime is no longer accepting commands.
    pub fn runtime_closed() -> Self {
        Self::new(
            ChatErrorCategory::Internal,
            "runtime_closed",
            "session runtime is not running",
        )
    }

    /// Whether retrying the same request may succeed.
    pub fn is_retryable(&self) -> bool {
        self.category == ChatErrorCategory::Network
    }
}

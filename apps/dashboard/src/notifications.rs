//! Transient notices surfaced to the dashboard alongside data.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::api_client::ApiError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NoticeKind {
    Network,
    AuthExpired,
    ProcessingComplete,
    ProcessingFailed,
    ProcessingTimeout,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Notice {
    pub kind: NoticeKind,
    pub message: String,
    pub retryable: bool,
    pub created_at: DateTime<Utc>,
}

impl NoticeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NoticeKind::Network => "network",
            NoticeKind::AuthExpired => "auth_expired",
            NoticeKind::ProcessingComplete => "processing_complete",
            NoticeKind::ProcessingFailed => "processing_failed",
            NoticeKind::ProcessingTimeout => "processing_timeout",
        }
    }
}

impl Notice {
    pub fn new(kind: NoticeKind, message: impl Into<String>, created_at: DateTime<Utc>) -> Self {
        Self {
            kind,
            message: message.into(),
            retryable: false,
            created_at,
        }
    }

    pub fn retryable(mut self) -> Self {
        self.retryable = true;
        self
    }

    /// Notice for a failed fetch of primary data. Auth expiry is handled by
    /// the caller so duplicates can be suppressed.
    pub fn from_api_error(err: &ApiError, now: DateTime<Utc>) -> Self {
        match err {
            ApiError::AuthExpired => Notice::new(
                NoticeKind::AuthExpired,
                "Your session has expired. Please sign in again.",
                now,
            ),
            ApiError::Parse(_) => Notice::new(
                NoticeKind::Network,
                "The server sent a response we could not read.",
                now,
            ),
            _ => Notice::new(
                NoticeKind::Network,
                "Could not reach the server. Showing the last data we have.",
                now,
            )
            .retryable(),
        }
    }
}

use serde::{Deserialize, Serialize};

/// Status values the remote processing endpoint reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RemoteStatus {
    Processing,
    Parsing,
    Matching,
    Finalizing,
    Completed,
    Error,
}

/// Body of `GET /api/resume/processing-status`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusResponse {
    pub status: RemoteStatus,
    #[serde(default)]
    pub step: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub matches_found: Option<u32>,
}

#[cfg(test)]
impl StatusResponse {
    pub fn new(status: RemoteStatus) -> Self {
        Self {
            status,
            step: None,
            message: None,
            matches_found: None,
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn with_matches_found(mut self, count: u32) -> Self {
        self.matches_found = Some(count);
        self
    }
}

/// Body returned when the backend accepts a resume upload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UploadAccepted {
    #[serde(default)]
    pub resume_id: Option<String>,
    #[serde(default)]
    pub status: Option<RemoteStatus>,
    #[serde(default)]
    pub message: Option<String>,
}

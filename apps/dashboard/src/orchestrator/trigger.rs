use serde::{Deserialize, Serialize};

/// Why a fetch is happening. Decides whether the cache may answer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FetchTrigger {
    /// First mount with no special context.
    #[default]
    InitialLoad,
    /// Arrived straight from the upload flow.
    AfterUpload,
    /// The processing job just reached `completed`.
    ProcessingCompleted,
    /// No job pending; confirm the current truth.
    NoPendingJob,
    /// User pressed refresh / regenerate.
    UserRefresh,
}

impl FetchTrigger {
    pub fn bypasses_cache(self) -> bool {
        !matches!(self, FetchTrigger::InitialLoad)
    }

    pub fn invalidates_first(self) -> bool {
        matches!(
            self,
            FetchTrigger::UserRefresh | FetchTrigger::ProcessingCompleted
        )
    }
}

/// Whether recommendations may stand in for empty matches while an
/// upload is still being processed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecommendationPolicy {
    pub suppress_during_upload: bool,
}

impl Default for RecommendationPolicy {
    fn default() -> Self {
        Self {
            suppress_during_upload: true,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MatchQuery {
    pub trigger: FetchTrigger,
    pub upload_in_progress: bool,
    pub limit: Option<u32>,
}

impl MatchQuery {
    pub fn new(trigger: FetchTrigger) -> Self {
        Self {
            trigger,
            ..Default::default()
        }
    }

    pub fn with_upload_in_progress(mut self, in_progress: bool) -> Self {
        self.upload_in_progress = in_progress;
        self
    }

    pub fn with_limit(mut self, limit: Option<u32>) -> Self {
        self.limit = limit;
        self
    }

    pub fn fallback_allowed(&self, policy: RecommendationPolicy) -> bool {
        !(policy.suppress_during_upload && self.upload_in_progress)
    }
}

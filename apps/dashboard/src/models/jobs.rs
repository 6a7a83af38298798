use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A real match produced by the backend's matching pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobMatch {
    pub id: String,
    pub job_id: String,
    pub title: String,
    pub company: String,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub match_score: f64,
    #[serde(default)]
    pub matched_skills: Vec<String>,
    #[serde(default)]
    pub missing_skills: Vec<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

/// Generic suggestion shown only while no real matches exist.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    pub id: String,
    pub title: String,
    pub company: String,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub reason: Option<String>,
    #[serde(default)]
    pub score: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MatchingStats {
    #[serde(default)]
    pub total_matches: u32,
    #[serde(default)]
    pub average_score: f64,
    #[serde(default)]
    pub top_score: f64,
    #[serde(default)]
    pub strong_matches: u32,
    #[serde(default)]
    pub last_matched_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SavedJob {
    pub id: String,
    pub job_id: String,
    pub title: String,
    pub company: String,
    #[serde(default)]
    pub saved_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DashboardStats {
    #[serde(default)]
    pub saved_jobs: u32,
    #[serde(default)]
    pub total_matches: u32,
    #[serde(default)]
    pub applications: u32,
    #[serde(default)]
    pub profile_completeness: f64,
}

/// What the match panel shows. Recommendations never share a cache entry
/// with real matches.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", content = "items", rename_all = "snake_case")]
pub enum MatchFeed {
    Matches(Vec<JobMatch>),
    Recommendations(Vec<Recommendation>),
    Empty,
}

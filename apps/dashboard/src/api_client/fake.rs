//! Scripted in-memory `JobApi` for tests.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::Notify;

use super::{ApiError, JobApi};
use crate::models::jobs::{DashboardStats, JobMatch, MatchingStats, Recommendation, SavedJob};
use crate::models::processing::{RemoteStatus, StatusResponse, UploadAccepted};
use crate::models::profile::{Education, Experience, ProfileUpdate, Skill, UserProfile};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Failure {
    Transient,
    AuthExpired,
    NotFound,
}

impl Failure {
    fn into_error(self) -> ApiError {
        match self {
            Failure::Transient => ApiError::Api {
                status: 503,
                message: "service unavailable".to_string(),
            },
            Failure::AuthExpired => ApiError::AuthExpired,
            Failure::NotFound => ApiError::NotFound,
        }
    }
}

#[derive(Default)]
pub struct FakeJobApi {
    pub matches: Mutex<Vec<JobMatch>>,
    pub recommendations: Mutex<Vec<Recommendation>>,
    pub stats: Mutex<MatchingStats>,
    pub saved: Mutex<Vec<SavedJob>>,
    pub profile: Mutex<UserProfile>,
    pub skills: Mutex<Vec<Skill>>,
    statuses: Mutex<VecDeque<Result<StatusResponse, Failure>>>,
    failures: Mutex<HashMap<&'static str, Failure>>,
    calls: Mutex<HashMap<&'static str, usize>>,
    matches_gate: Mutex<Option<Arc<Notify>>>,
    status_delay: Mutex<Option<Duration>>,
}

pub fn job_match(id: &str) -> JobMatch {
    JobMatch {
        id: id.to_string(),
        job_id: format!("job-{id}"),
        title: "Backend Engineer".to_string(),
        company: "Acme".to_string(),
        location: None,
        match_score: 0.8,
        matched_skills: vec!["rust".to_string()],
        missing_skills: vec![],
        url: None,
        created_at: None,
    }
}

pub fn recommendation(id: &str) -> Recommendation {
    Recommendation {
        id: id.to_string(),
        title: "Platform Engineer".to_string(),
        company: "Globex".to_string(),
        location: None,
        reason: Some("popular in your area".to_string()),
        score: None,
    }
}

impl FakeJobApi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_matches(&self, matches: Vec<JobMatch>) {
        *self.matches.lock().unwrap() = matches;
    }

    pub fn set_recommendations(&self, recs: Vec<Recommendation>) {
        *self.recommendations.lock().unwrap() = recs;
    }

    pub fn fail(&self, endpoint: &'static str, failure: Failure) {
        self.failures.lock().unwrap().insert(endpoint, failure);
    }

    pub fn recover(&self, endpoint: &'static str) {
        self.failures.lock().unwrap().remove(endpoint);
    }

    pub fn push_status(&self, status: StatusResponse) {
        self.statuses.lock().unwrap().push_back(Ok(status));
    }

    pub fn push_status_failure(&self, failure: Failure) {
        self.statuses.lock().unwrap().push_back(Err(failure));
    }

    pub fn delay_status(&self, delay: Duration) {
        *self.status_delay.lock().unwrap() = Some(delay);
    }

    /// The next `job_matches` call snapshots its data, then parks until
    /// the returned handle is notified.
    pub fn gate_next_matches(&self) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        *self.matches_gate.lock().unwrap() = Some(gate.clone());
        gate
    }

    pub fn calls(&self, endpoint: &str) -> usize {
        self.calls.lock().unwrap().get(endpoint).copied().unwrap_or(0)
    }

    fn enter(&self, endpoint: &'static str) -> Result<(), ApiError> {
        *self.calls.lock().unwrap().entry(endpoint).or_insert(0) += 1;
        match self.failures.lock().unwrap().get(endpoint) {
            Some(failure) => Err(failure.into_error()),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl JobApi for FakeJobApi {
    async fn job_matches(&self, limit: Option<u32>) -> Result<Vec<JobMatch>, ApiError> {
        self.enter("job_matches")?;
        let mut snapshot = self.matches.lock().unwrap().clone();
        if let Some(limit) = limit {
            snapshot.truncate(limit as usize);
        }
        let gate = self.matches_gate.lock().unwrap().take();
        if let Some(gate) = gate {
            gate.notified().await;
        }
        Ok(snapshot)
    }

    async fn recommendations(&self, limit: Option<u32>) -> Result<Vec<Recommendation>, ApiError> {
        self.enter("recommendations")?;
        let mut recs = self.recommendations.lock().unwrap().clone();
        if let Some(limit) = limit {
            recs.truncate(limit as usize);
        }
        Ok(recs)
    }

    async fn matching_stats(&self) -> Result<MatchingStats, ApiError> {
        self.enter("matching_stats")?;
        Ok(self.stats.lock().unwrap().clone())
    }

    async fn regenerate_matches(&self) -> Result<(), ApiError> {
        self.enter("regenerate_matches")
    }

    async fn delete_matches(&self) -> Result<(), ApiError> {
        self.enter("delete_matches")?;
        self.matches.lock().unwrap().clear();
        Ok(())
    }

    async fn saved_jobs(&self) -> Result<Vec<SavedJob>, ApiError> {
        self.enter("saved_jobs")?;
        Ok(self.saved.lock().unwrap().clone())
    }

    async fn save_job(&self, job_id: &str) -> Result<(), ApiError> {
        self.enter("save_job")?;
        self.saved.lock().unwrap().push(SavedJob {
            id: format!("saved-{job_id}"),
            job_id: job_id.to_string(),
            title: "Saved".to_string(),
            company: "Acme".to_string(),
            saved_at: None,
        });
        Ok(())
    }

    async fn unsave_job(&self, job_id: &str) -> Result<(), ApiError> {
        self.enter("unsave_job")?;
        self.saved.lock().unwrap().retain(|s| s.job_id != job_id);
        Ok(())
    }

    async fn profile(&self) -> Result<UserProfile, ApiError> {
        self.enter("profile")?;
        Ok(self.profile.lock().unwrap().clone())
    }

    async fn update_profile(&self, update: &ProfileUpdate) -> Result<(), ApiError> {
        self.enter("update_profile")?;
        let mut profile = self.profile.lock().unwrap();
        if let Some(name) = &update.full_name {
            profile.full_name = Some(name.clone());
        }
        if let Some(headline) = &update.headline {
            profile.headline = Some(headline.clone());
        }
        Ok(())
    }

    async fn skills(&self) -> Result<Vec<Skill>, ApiError> {
        self.enter("skills")?;
        Ok(self.skills.lock().unwrap().clone())
    }

    async fn education(&self) -> Result<Vec<Education>, ApiError> {
        self.enter("education")?;
        Ok(vec![])
    }

    async fn experience(&self) -> Result<Vec<Experience>, ApiError> {
        self.enter("experience")?;
        Ok(vec![])
    }

    async fn dashboard_stats(&self) -> Result<DashboardStats, ApiError> {
        self.enter("dashboard_stats")?;
        Ok(DashboardStats {
            saved_jobs: self.saved.lock().unwrap().len() as u32,
            total_matches: self.matches.lock().unwrap().len() as u32,
            ..Default::default()
        })
    }

    async fn dashboard_matches(&self) -> Result<Vec<JobMatch>, ApiError> {
        self.enter("dashboard_matches")?;
        Ok(self.matches.lock().unwrap().clone())
    }

    async fn upload_resume(
        &self,
        _file_name: &str,
        _content_type: &str,
        _bytes: Bytes,
    ) -> Result<UploadAccepted, ApiError> {
        self.enter("upload_resume")?;
        Ok(UploadAccepted {
            resume_id: Some("resume-1".to_string()),
            status: Some(RemoteStatus::Processing),
            message: None,
        })
    }

    async fn processing_status(&self) -> Result<StatusResponse, ApiError> {
        self.enter("processing_status")?;
        let delay = *self.status_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        let next = self.statuses.lock().unwrap().pop_front();
        match next {
            Some(Ok(status)) => Ok(status),
            Some(Err(failure)) => Err(failure.into_error()),
            None => Ok(StatusResponse::new(RemoteStatus::Processing)),
        }
    }
}

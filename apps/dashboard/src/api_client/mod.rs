/// Remote API client: the single point of entry for calls to the job-matching
/// REST service.
///
/// ARCHITECTURAL RULE: nothing else in the dashboard builds HTTP requests to
/// the backend. The orchestrator and the processing coordinator depend on the
/// `JobApi` trait so tests can script responses.
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::{Client, Method, RequestBuilder, Response, Url};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::auth::TokenHolder;
use crate::models::jobs::{DashboardStats, JobMatch, MatchingStats, Recommendation, SavedJob};
use crate::models::processing::{StatusResponse, UploadAccepted};
use crate::models::profile::{Education, Experience, ProfileUpdate, Skill, UserProfile};

#[cfg(test)]
pub mod fake;

const MAX_RETRIES: u32 = 3;
const RETRY_BASE_MS: u64 = 500;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("Authentication expired")]
    AuthExpired,

    #[error("Resource not found")]
    NotFound,

    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Service unavailable after {retries} retries")]
    Unavailable { retries: u32 },

    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

impl ApiError {
    /// Worth retrying later: the request may succeed unchanged.
    pub fn is_transient(&self) -> bool {
        match self {
            ApiError::Http(_) | ApiError::Unavailable { .. } => true,
            ApiError::Api { status, .. } => *status == 429 || *status >= 500,
            ApiError::AuthExpired
            | ApiError::NotFound
            | ApiError::Parse(_)
            | ApiError::InvalidRequest(_) => false,
        }
    }
}

#[async_trait]
pub trait JobApi: Send + Sync {
    async fn job_matches(&self, limit: Option<u32>) -> Result<Vec<JobMatch>, ApiError>;
    async fn recommendations(&self, limit: Option<u32>) -> Result<Vec<Recommendation>, ApiError>;
    async fn matching_stats(&self) -> Result<MatchingStats, ApiError>;
    async fn regenerate_matches(&self) -> Result<(), ApiError>;
    async fn delete_matches(&self) -> Result<(), ApiError>;

    async fn saved_jobs(&self) -> Result<Vec<SavedJob>, ApiError>;
    async fn save_job(&self, job_id: &str) -> Result<(), ApiError>;
    async fn unsave_job(&self, job_id: &str) -> Result<(), ApiError>;

    async fn profile(&self) -> Result<UserProfile, ApiError>;
    async fn update_profile(&self, update: &ProfileUpdate) -> Result<(), ApiError>;
    async fn skills(&self) -> Result<Vec<Skill>, ApiError>;
    async fn education(&self) -> Result<Vec<Education>, ApiError>;
    async fn experience(&self) -> Result<Vec<Experience>, ApiError>;

    async fn dashboard_stats(&self) -> Result<DashboardStats, ApiError>;
    async fn dashboard_matches(&self) -> Result<Vec<JobMatch>, ApiError>;

    async fn upload_resume(
        &self,
        file_name: &str,
        content_type: &str,
        bytes: Bytes,
    ) -> Result<UploadAccepted, ApiError>;
    async fn processing_status(&self) -> Result<StatusResponse, ApiError>;
}

/// Collections come back either bare or wrapped in an object.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Listing<T> {
    Bare(Vec<T>),
    Wrapped {
        #[serde(
            alias = "matches",
            alias = "recommendations",
            alias = "jobs",
            alias = "saved_jobs",
            alias = "skills",
            alias = "education",
            alias = "experience",
            alias = "data"
        )]
        items: Vec<T>,
    },
}

impl<T> Listing<T> {
    fn into_vec(self) -> Vec<T> {
        match self {
            Listing::Bare(items) | Listing::Wrapped { items } => items,
        }
    }
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    #[serde(alias = "detail", alias = "error")]
    message: String,
}

#[derive(Debug, Serialize)]
struct LimitQuery {
    #[serde(skip_serializing_if = "Option::is_none")]
    limit: Option<u32>,
}

#[derive(Clone)]
pub struct HttpJobApi {
    client: Client,
    base_url: String,
    tokens: Arc<TokenHolder>,
}

impl HttpJobApi {
    pub fn new(
        base_url: &str,
        tokens: Arc<TokenHolder>,
        timeout: Duration,
    ) -> Result<Self, ApiError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            tokens,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// `/api/jobs/saved/<job_id>` with the id encoded as a single path
    /// segment, so it can never address a different resource.
    fn saved_job_url(&self, job_id: &str) -> Result<Url, ApiError> {
        if job_id.is_empty() || job_id == "." || job_id == ".." {
            return Err(ApiError::InvalidRequest(format!(
                "'{job_id}' is not a valid job id"
            )));
        }
        let mut url = Url::parse(&self.url("/api/jobs/saved"))
            .map_err(|e| ApiError::InvalidRequest(format!("bad API base URL: {e}")))?;
        url.path_segments_mut()
            .map_err(|_| ApiError::InvalidRequest("API base URL cannot carry a path".to_string()))?
            .push(job_id);
        Ok(url)
    }

    fn authorized(&self, builder: RequestBuilder) -> RequestBuilder {
        match self.tokens.token() {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    /// Sends the request built by `build`, retrying on 429 and 5xx with
    /// exponential backoff. Maps 401/403 and 404 to their own variants.
    async fn send<F>(&self, build: F) -> Result<Response, ApiError>
    where
        F: Fn() -> RequestBuilder,
    {
        let mut last_error: Option<ApiError> = None;

        for attempt in 0..MAX_RETRIES {
            if attempt > 0 {
                // 500ms, 1s
                let delay = Duration::from_millis(RETRY_BASE_MS * (1 << (attempt - 1)));
                warn!(
                    "API call attempt {} failed, retrying after {}ms...",
                    attempt,
                    delay.as_millis()
                );
                tokio::time::sleep(delay).await;
            }

            let response = match self.authorized(build()).send().await {
                Ok(r) => r,
                Err(e) => {
                    last_error = Some(ApiError::Http(e));
                    continue;
                }
            };

            let status = response.status();

            if status.as_u16() == 429 || status.is_server_error() {
                let body = response.text().await.unwrap_or_default();
                warn!("API returned {}: {}", status, body);
                last_error = Some(ApiError::Api {
                    status: status.as_u16(),
                    message: body,
                });
                continue;
            }

            if status.as_u16() == 401 || status.as_u16() == 403 {
                return Err(ApiError::AuthExpired);
            }

            if status.as_u16() == 404 {
                return Err(ApiError::NotFound);
            }

            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                let message = serde_json::from_str::<ApiErrorBody>(&body)
                    .map(|e| e.message)
                    .unwrap_or(body);
                return Err(ApiError::Api {
                    status: status.as_u16(),
                    message,
                });
            }

            return Ok(response);
        }

        Err(last_error.unwrap_or(ApiError::Unavailable {
            retries: MAX_RETRIES,
        }))
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        limit: Option<u32>,
    ) -> Result<T, ApiError> {
        let url = self.url(path);
        let query = LimitQuery { limit };
        let response = self
            .send(|| self.client.get(&url).query(&query))
            .await?;
        let body = response.text().await?;
        debug!("GET {path} -> {} bytes", body.len());
        Ok(serde_json::from_str(&body)?)
    }

    async fn get_list<T: DeserializeOwned>(
        &self,
        path: &str,
        limit: Option<u32>,
    ) -> Result<Vec<T>, ApiError> {
        let listing: Listing<T> = self.get_json(path, limit).await?;
        Ok(listing.into_vec())
    }

    async fn send_empty(&self, method: Method, url: Url) -> Result<(), ApiError> {
        self.send(|| self.client.request(method.clone(), url.clone()))
            .await?;
        debug!("{method} {} ok", url.path());
        Ok(())
    }

    fn parsed_url(&self, path: &str) -> Result<Url, ApiError> {
        Url::parse(&self.url(path))
            .map_err(|e| ApiError::InvalidRequest(format!("bad API base URL: {e}")))
    }
}

#[async_trait]
impl JobApi for HttpJobApi {
    async fn job_matches(&self, limit: Option<u32>) -> Result<Vec<JobMatch>, ApiError> {
        self.get_list("/api/jobs/matches", limit).await
    }

    async fn recommendations(&self, limit: Option<u32>) -> Result<Vec<Recommendation>, ApiError> {
        self.get_list("/api/jobs/recommendations", limit).await
    }

    async fn matching_stats(&self) -> Result<MatchingStats, ApiError> {
        self.get_json("/api/jobs/matches/stats", None).await
    }

    async fn regenerate_matches(&self) -> Result<(), ApiError> {
        let url = self.parsed_url("/api/jobs/matches/regenerate")?;
        self.send_empty(Method::POST, url).await
    }

    async fn delete_matches(&self) -> Result<(), ApiError> {
        let url = self.parsed_url("/api/jobs/matches")?;
        self.send_empty(Method::DELETE, url).await
    }

    async fn saved_jobs(&self) -> Result<Vec<SavedJob>, ApiError> {
        self.get_list("/api/jobs/saved", None).await
    }

    async fn save_job(&self, job_id: &str) -> Result<(), ApiError> {
        let url = self.saved_job_url(job_id)?;
        self.send_empty(Method::POST, url).await
    }

    async fn unsave_job(&self, job_id: &str) -> Result<(), ApiError> {
        let url = self.saved_job_url(job_id)?;
        self.send_empty(Method::DELETE, url).await
    }

    async fn profile(&self) -> Result<UserProfile, ApiError> {
        self.get_json("/api/profile", None).await
    }

    async fn update_profile(&self, update: &ProfileUpdate) -> Result<(), ApiError> {
        let url = self.url("/api/profile");
        self.send(|| self.client.put(&url).json(update)).await?;
        Ok(())
    }

    async fn skills(&self) -> Result<Vec<Skill>, ApiError> {
        self.get_list("/api/profile/skills", None).await
    }

    async fn education(&self) -> Result<Vec<Education>, ApiError> {
        self.get_list("/api/profile/education", None).await
    }

    async fn experience(&self) -> Result<Vec<Experience>, ApiError> {
        self.get_list("/api/profile/experience", None).await
    }

    async fn dashboard_stats(&self) -> Result<DashboardStats, ApiError> {
        self.get_json("/api/dashboard/stats", None).await
    }

    async fn dashboard_matches(&self) -> Result<Vec<JobMatch>, ApiError> {
        self.get_list("/api/dashboard/matches", None).await
    }

    async fn upload_resume(
        &self,
        file_name: &str,
        content_type: &str,
        bytes: Bytes,
    ) -> Result<UploadAccepted, ApiError> {
        let url = self.url("/api/resume/upload");
        // Multipart bodies are single-use, so each attempt rebuilds the form.
        let response = self
            .send(|| {
                let part = reqwest::multipart::Part::stream(bytes.clone())
                    .file_name(file_name.to_string())
                    .mime_str(content_type)
                    .unwrap_or_else(|_| {
                        reqwest::multipart::Part::stream(bytes.clone())
                            .file_name(file_name.to_string())
                    });
                let form = reqwest::multipart::Form::new().part("file", part);
                self.client.post(&url).multipart(form)
            })
            .await?;
        Ok(response.json().await?)
    }

    async fn processing_status(&self) -> Result<StatusResponse, ApiError> {
        self.get_json("/api/resume/processing-status", None).await
    }
}

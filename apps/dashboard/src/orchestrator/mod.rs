//! Fetch orchestrator: decides, per domain and trigger, whether the cache
//! may answer, when to go to the network, and what to invalidate around
//! mutations.
//!
//! Rules:
//! - A failed fetch never clears a domain; the last cached value is returned
//!   as `stale` with a notice.
//! - Every mutation is followed by invalidate-then-refetch. Optimistic local
//!   state is never written into the cache.
//! - Recommendations only ever stand in for an empty match list and are
//!   evicted the moment real matches exist.

pub mod trigger;

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Serialize};
use tracing::{debug, info, warn};

use crate::api_client::{ApiError, JobApi};
use crate::auth::TokenHolder;
use crate::cache::{CacheDomain, CacheDomains, InvalidationGroup};
use crate::clock::Clock;
use crate::models::jobs::{DashboardStats, JobMatch, MatchFeed, MatchingStats, SavedJob};
use crate::models::profile::{Education, Experience, ProfileUpdate, Skill, UserProfile};
use crate::notifications::Notice;

pub use trigger::{FetchTrigger, MatchQuery, RecommendationPolicy};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DataOrigin {
    Cache,
    Network,
    /// Network failed; this is the last cached value.
    Stale,
    None,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Fetched<T> {
    pub data: Option<T>,
    pub origin: DataOrigin,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notice: Option<Notice>,
}

impl<T> Fetched<T> {
    fn cached(data: T) -> Self {
        Self {
            data: Some(data),
            origin: DataOrigin::Cache,
            notice: None,
        }
    }

    fn network(data: T) -> Self {
        Self {
            data: Some(data),
            origin: DataOrigin::Network,
            notice: None,
        }
    }

    fn failed(stale: Option<T>, notice: Option<Notice>) -> Self {
        let origin = if stale.is_some() {
            DataOrigin::Stale
        } else {
            DataOrigin::None
        };
        Self {
            data: stale,
            origin,
            notice,
        }
    }
}

pub struct FetchOrchestrator {
    api: Arc<dyn JobApi>,
    domains: Arc<CacheDomains>,
    tokens: Arc<TokenHolder>,
    policy: RecommendationPolicy,
    completion_pending: AtomicBool,
}

impl FetchOrchestrator {
    pub fn new(
        api: Arc<dyn JobApi>,
        domains: Arc<CacheDomains>,
        tokens: Arc<TokenHolder>,
        policy: RecommendationPolicy,
    ) -> Self {
        Self {
            api,
            domains,
            tokens,
            policy,
            completion_pending: AtomicBool::new(false),
        }
    }

    pub fn domains(&self) -> &Arc<CacheDomains> {
        &self.domains
    }

    /// Time as seen by the cache, so notices and entries share one clock.
    pub fn now(&self) -> DateTime<Utc> {
        self.domains.store().clock().now()
    }

    // ────────────────────────────────────────────────────────────────────
    // Core read path
    // ────────────────────────────────────────────────────────────────────

    async fn load<T, F, Fut>(&self, domain: CacheDomain, bypass: bool, fetch: F) -> Fetched<T>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, ApiError>>,
    {
        if !bypass {
            if let Some(value) = self.domains.get::<T>(domain).await {
                debug!(domain = domain.key(), "served from cache");
                return Fetched::cached(value);
            }
        }

        let ticket = self.domains.begin_request(domain).await;
        match fetch().await {
            Ok(value) => {
                if self.domains.commit(ticket, &value).await {
                    return Fetched::network(value);
                }
                // A newer request or an invalidation landed while this one
                // was in flight. Prefer whatever the newer operation stored.
                match self.domains.get::<T>(domain).await {
                    Some(newer) => Fetched::cached(newer),
                    None => Fetched::network(value),
                }
            }
            Err(e) => {
                warn!(domain = domain.key(), error = %e, "fetch failed; keeping cached value");
                let notice = self.notice_for(&e);
                let stale = self.domains.get::<T>(domain).await;
                Fetched::failed(stale, notice)
            }
        }
    }

    /// Invalidates ahead of a fetch when the trigger asks for it and returns
    /// whether the cache must be bypassed.
    async fn prepare(&self, trigger: FetchTrigger, domain: CacheDomain) -> bool {
        if trigger.invalidates_first() {
            self.domains.invalidate_group(domain.group()).await;
        }
        trigger.bypasses_cache()
    }

    fn notice_for(&self, err: &ApiError) -> Option<Notice> {
        if matches!(err, ApiError::AuthExpired) {
            // Only the first rejection after sign-in is worth telling the user.
            return self
                .tokens
                .report_expired()
                .then(|| Notice::from_api_error(err, self.now()));
        }
        Some(Notice::from_api_error(err, self.now()))
    }

    fn note_mutation_error(&self, err: &ApiError) {
        if matches!(err, ApiError::AuthExpired) {
            self.tokens.report_expired();
        }
    }

    // ────────────────────────────────────────────────────────────────────
    // Job matches and the recommendation fallback
    // ────────────────────────────────────────────────────────────────────

    pub async fn fetch_job_matches(&self, query: MatchQuery) -> Fetched<MatchFeed> {
        let trigger = if self.completion_pending.swap(false, Ordering::SeqCst) {
            FetchTrigger::ProcessingCompleted
        } else {
            query.trigger
        };
        let bypass = self.prepare(trigger, CacheDomain::JobMatches).await;

        let api = Arc::clone(&self.api);
        let limit = query.limit;
        let fetched: Fetched<Vec<JobMatch>> = self
            .load(CacheDomain::JobMatches, bypass, || async move {
                api.job_matches(limit).await
            })
            .await;

        let Fetched {
            data,
            origin,
            notice,
        } = fetched;

        let Some(matches) = data else {
            return Fetched {
                data: None,
                origin,
                notice,
            };
        };

        if !matches.is_empty() {
            // Real matches exist; recommendations must not linger beside them.
            self.domains.invalidate(CacheDomain::Recommendations).await;
            return Fetched {
                data: Some(MatchFeed::Matches(matches)),
                origin,
                notice,
            };
        }

        if !query.fallback_allowed(self.policy) {
            debug!("no matches yet; recommendations suppressed while upload is processing");
            return Fetched {
                data: Some(MatchFeed::Empty),
                origin,
                notice,
            };
        }

        info!("no real matches; falling back to recommendations");
        let api = Arc::clone(&self.api);
        let recs = self
            .load(CacheDomain::Recommendations, bypass, || async move {
                api.recommendations(limit).await
            })
            .await;

        let notice = notice.or(recs.notice);
        match recs.data {
            Some(items) if !items.is_empty() => Fetched {
                data: Some(MatchFeed::Recommendations(items)),
                origin: recs.origin,
                notice,
            },
            _ => Fetched {
                data: Some(MatchFeed::Empty),
                origin,
                notice,
            },
        }
    }

    pub async fn fetch_matching_stats(&self, trigger: FetchTrigger) -> Fetched<MatchingStats> {
        let bypass = self.prepare(trigger, CacheDomain::MatchingStats).await;
        let api = Arc::clone(&self.api);
        self.load(CacheDomain::MatchingStats, bypass, || async move {
            api.matching_stats().await
        })
        .await
    }

    // ────────────────────────────────────────────────────────────────────
    // Other domains
    // ────────────────────────────────────────────────────────────────────

    pub async fn fetch_saved_jobs(&self, trigger: FetchTrigger) -> Fetched<Vec<SavedJob>> {
        let bypass = self.prepare(trigger, CacheDomain::SavedJobs).await;
        let api = Arc::clone(&self.api);
        self.load(CacheDomain::SavedJobs, bypass, || async move {
            api.saved_jobs().await
        })
        .await
    }

    pub async fn fetch_profile(&self, trigger: FetchTrigger) -> Fetched<UserProfile> {
        let bypass = self.prepare(trigger, CacheDomain::UserProfile).await;
        let api = Arc::clone(&self.api);
        self.load(CacheDomain::UserProfile, bypass, || async move {
            api.profile().await
        })
        .await
    }

    pub async fn fetch_skills(&self, trigger: FetchTrigger) -> Fetched<Vec<Skill>> {
        let bypass = self.prepare(trigger, CacheDomain::Skills).await;
        let api = Arc::clone(&self.api);
        self.load(CacheDomain::Skills, bypass, || async move { api.skills().await })
            .await
    }

    pub async fn fetch_education(&self, trigger: FetchTrigger) -> Fetched<Vec<Education>> {
        let bypass = self.prepare(trigger, CacheDomain::Education).await;
        let api = Arc::clone(&self.api);
        self.load(CacheDomain::Education, bypass, || async move {
            api.education().await
        })
        .await
    }

    pub async fn fetch_experience(&self, trigger: FetchTrigger) -> Fetched<Vec<Experience>> {
        let bypass = self.prepare(trigger, CacheDomain::Experience).await;
        let api = Arc::clone(&self.api);
        self.load(CacheDomain::Experience, bypass, || async move {
            api.experience().await
        })
        .await
    }

    pub async fn fetch_dashboard_stats(&self, trigger: FetchTrigger) -> Fetched<DashboardStats> {
        let bypass = self.prepare(trigger, CacheDomain::DashboardStats).await;
        let api = Arc::clone(&self.api);
        self.load(CacheDomain::DashboardStats, bypass, || async move {
            api.dashboard_stats().await
        })
        .await
    }

    pub async fn fetch_dashboard_matches(&self, trigger: FetchTrigger) -> Fetched<Vec<JobMatch>> {
        let bypass = self.prepare(trigger, CacheDomain::DashboardMatches).await;
        let api = Arc::clone(&self.api);
        self.load(CacheDomain::DashboardMatches, bypass, || async move {
            api.dashboard_matches().await
        })
        .await
    }

    // ────────────────────────────────────────────────────────────────────
    // Mutations
    // ────────────────────────────────────────────────────────────────────

    /// Invalidates the match group before asking the backend to regenerate,
    /// so nothing issued earlier can repopulate it with pre-regeneration data.
    pub async fn regenerate_matches(
        &self,
        limit: Option<u32>,
    ) -> Result<Fetched<MatchFeed>, ApiError> {
        self.domains
            .invalidate_group(InvalidationGroup::JobMatches)
            .await;
        if let Err(e) = self.api.regenerate_matches().await {
            self.note_mutation_error(&e);
            return Err(e);
        }
        info!("match regeneration requested");
        self.domains
            .invalidate_group(InvalidationGroup::Dashboard)
            .await;
        Ok(self
            .fetch_job_matches(MatchQuery::new(FetchTrigger::UserRefresh).with_limit(limit))
            .await)
    }

    pub async fn clear_matches(&self) -> Result<Fetched<MatchFeed>, ApiError> {
        if let Err(e) = self.api.delete_matches().await {
            self.note_mutation_error(&e);
            return Err(e);
        }
        info!("matches cleared");
        self.domains
            .invalidate_group(InvalidationGroup::JobMatches)
            .await;
        self.domains
            .invalidate_group(InvalidationGroup::Dashboard)
            .await;
        Ok(self
            .fetch_job_matches(MatchQuery::new(FetchTrigger::UserRefresh))
            .await)
    }

    pub async fn save_job(&self, job_id: &str) -> Result<Fetched<Vec<SavedJob>>, ApiError> {
        if let Err(e) = self.api.save_job(job_id).await {
            self.note_mutation_error(&e);
            return Err(e);
        }
        self.after_saved_jobs_change().await
    }

    pub async fn unsave_job(&self, job_id: &str) -> Result<Fetched<Vec<SavedJob>>, ApiError> {
        if let Err(e) = self.api.unsave_job(job_id).await {
            self.note_mutation_error(&e);
            return Err(e);
        }
        self.after_saved_jobs_change().await
    }

    async fn after_saved_jobs_change(&self) -> Result<Fetched<Vec<SavedJob>>, ApiError> {
        self.domains
            .invalidate_group(InvalidationGroup::SavedJobs)
            .await;
        self.domains
            .invalidate_group(InvalidationGroup::Dashboard)
            .await;
        Ok(self.fetch_saved_jobs(FetchTrigger::UserRefresh).await)
    }

    pub async fn update_profile(
        &self,
        update: &ProfileUpdate,
    ) -> Result<Fetched<UserProfile>, ApiError> {
        if let Err(e) = self.api.update_profile(update).await {
            self.note_mutation_error(&e);
            return Err(e);
        }
        Ok(self.fetch_profile(FetchTrigger::UserRefresh).await)
    }

    // ────────────────────────────────────────────────────────────────────
    // Signals from the processing coordinator
    // ────────────────────────────────────────────────────────────────────

    /// A new resume was accepted: everything derived from the old one is void.
    pub async fn on_upload_accepted(&self) {
        for group in [
            InvalidationGroup::JobMatches,
            InvalidationGroup::UserProfile,
            InvalidationGroup::Dashboard,
        ] {
            self.domains.invalidate_group(group).await;
        }
    }

    /// Processing reached `completed`: drop the match group and force one
    /// fresh fetch. The pending flag is consumed by that fetch.
    pub async fn on_processing_completed(&self) -> Fetched<MatchFeed> {
        self.completion_pending.store(true, Ordering::SeqCst);
        self.domains
            .invalidate_group(InvalidationGroup::JobMatches)
            .await;
        self.domains
            .invalidate_group(InvalidationGroup::Dashboard)
            .await;
        self.fetch_job_matches(MatchQuery::default()).await
    }

    /// Processing ended without success (backend error or local timeout).
    /// Whatever the backend has now is the truth.
    pub async fn on_processing_failed(&self) -> Fetched<MatchFeed> {
        self.domains
            .invalidate_group(InvalidationGroup::JobMatches)
            .await;
        self.fetch_job_matches(MatchQuery::new(FetchTrigger::NoPendingJob))
            .await
    }

    #[cfg(test)]
    pub fn completion_pending(&self) -> bool {
        self.completion_pending.load(Ordering::SeqCst)
    }

    /// Logout-style reset of every domain.
    pub async fn reset_all(&self) {
        self.completion_pending.store(false, Ordering::SeqCst);
        self.domains.reset_all().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api_client::fake::{job_match, recommendation, Failure, FakeJobApi};
    use crate::cache::{EntryStore, MemoryBackend, TtlPolicy};
    use crate::clock::ManualClock;
    use crate::notifications::NoticeKind;

    struct Harness {
        api: Arc<FakeJobApi>,
        orchestrator: Arc<FetchOrchestrator>,
        tokens: Arc<TokenHolder>,
        clock: Arc<ManualClock>,
    }

    fn harness_with(policy: RecommendationPolicy) -> Harness {
        let api = Arc::new(FakeJobApi::new());
        let clock = Arc::new(ManualClock::default());
        let store = EntryStore::new(Arc::new(MemoryBackend::new()), clock.clone(), "test");
        let domains = Arc::new(CacheDomains::new(store, TtlPolicy::default()));
        let tokens = Arc::new(TokenHolder::new(Some("token".to_string())));
        let orchestrator = Arc::new(FetchOrchestrator::new(
            api.clone(),
            domains,
            tokens.clone(),
            policy,
        ));
        Harness {
            api,
            orchestrator,
            tokens,
            clock,
        }
    }

    fn harness() -> Harness {
        harness_with(RecommendationPolicy::default())
    }

    #[tokio::test]
    async fn test_initial_load_serves_from_cache_on_second_call() {
        let h = harness();
        h.api.set_matches(vec![job_match("m1")]);

        let first = h.orchestrator.fetch_job_matches(MatchQuery::default()).await;
        assert_eq!(first.origin, DataOrigin::Network);

        let second = h.orchestrator.fetch_job_matches(MatchQuery::default()).await;
        assert_eq!(second.origin, DataOrigin::Cache);
        assert_eq!(second.data, Some(MatchFeed::Matches(vec![job_match("m1")])));
        assert_eq!(h.api.calls("job_matches"), 1);
    }

    #[tokio::test]
    async fn test_cache_expiry_forces_refetch() {
        let h = harness();
        h.api.set_matches(vec![job_match("m1")]);
        h.orchestrator.fetch_job_matches(MatchQuery::default()).await;

        h.clock.advance(chrono::Duration::minutes(6));
        let again = h.orchestrator.fetch_job_matches(MatchQuery::default()).await;
        assert_eq!(again.origin, DataOrigin::Network);
        assert_eq!(h.api.calls("job_matches"), 2);
    }

    #[tokio::test]
    async fn test_bypassing_triggers_always_hit_network() {
        let h = harness();
        h.api.set_matches(vec![job_match("m1")]);
        h.orchestrator.fetch_job_matches(MatchQuery::default()).await;

        for trigger in [
            FetchTrigger::AfterUpload,
            FetchTrigger::NoPendingJob,
            FetchTrigger::UserRefresh,
        ] {
            let fetched = h.orchestrator.fetch_job_matches(MatchQuery::new(trigger)).await;
            assert_eq!(fetched.origin, DataOrigin::Network, "{trigger:?}");
        }
        assert_eq!(h.api.calls("job_matches"), 4);
    }

    #[tokio::test]
    async fn test_empty_matches_fall_back_to_recommendations() {
        let h = harness();
        h.api.set_recommendations(vec![recommendation("r1")]);

        let fetched = h.orchestrator.fetch_job_matches(MatchQuery::default()).await;
        assert_eq!(
            fetched.data,
            Some(MatchFeed::Recommendations(vec![recommendation("r1")]))
        );

        // The match domain holds the real (empty) answer, not recommendations.
        let cached: Option<Vec<JobMatch>> =
            h.orchestrator.domains().get(CacheDomain::JobMatches).await;
        assert_eq!(cached, Some(vec![]));
    }

    #[tokio::test]
    async fn test_fallback_suppressed_mid_upload() {
        let h = harness();
        h.api.set_recommendations(vec![recommendation("r1")]);

        let query = MatchQuery::new(FetchTrigger::AfterUpload).with_upload_in_progress(true);
        let fetched = h.orchestrator.fetch_job_matches(query).await;
        assert_eq!(fetched.data, Some(MatchFeed::Empty));
        assert_eq!(h.api.calls("recommendations"), 0);
    }

    #[tokio::test]
    async fn test_fallback_during_upload_when_policy_allows() {
        let h = harness_with(RecommendationPolicy {
            suppress_during_upload: false,
        });
        h.api.set_recommendations(vec![recommendation("r1")]);

        let query = MatchQuery::new(FetchTrigger::AfterUpload).with_upload_in_progress(true);
        let fetched = h.orchestrator.fetch_job_matches(query).await;
        assert!(matches!(fetched.data, Some(MatchFeed::Recommendations(_))));
    }

    #[tokio::test]
    async fn test_real_matches_evict_cached_recommendations() {
        let h = harness();
        h.api.set_recommendations(vec![recommendation("r1")]);
        h.orchestrator.fetch_job_matches(MatchQuery::default()).await;
        let domains = h.orchestrator.domains();
        assert!(domains
            .get::<Vec<serde_json::Value>>(CacheDomain::Recommendations)
            .await
            .is_some());

        h.api.set_matches(vec![job_match("m1")]);
        let fetched = h
            .orchestrator
            .fetch_job_matches(MatchQuery::new(FetchTrigger::NoPendingJob))
            .await;
        assert!(matches!(fetched.data, Some(MatchFeed::Matches(_))));
        assert!(domains
            .get::<Vec<serde_json::Value>>(CacheDomain::Recommendations)
            .await
            .is_none());
    }

    #[tokio::test]
    async fn test_failed_fetch_keeps_stale_value_and_surfaces_notice() {
        let h = harness();
        h.api.set_matches(vec![job_match("m1")]);
        h.orchestrator.fetch_job_matches(MatchQuery::default()).await;

        h.api.fail("job_matches", Failure::Transient);
        let fetched = h
            .orchestrator
            .fetch_job_matches(MatchQuery::new(FetchTrigger::UserRefresh))
            .await;
        // UserRefresh invalidated first, so nothing stale remains to show.
        assert_eq!(fetched.origin, DataOrigin::None);

        h.api.recover("job_matches");
        h.orchestrator.fetch_job_matches(MatchQuery::default()).await;
        h.api.fail("job_matches", Failure::Transient);
        let fetched = h
            .orchestrator
            .fetch_job_matches(MatchQuery::new(FetchTrigger::NoPendingJob))
            .await;
        assert_eq!(fetched.origin, DataOrigin::Stale);
        assert_eq!(fetched.data, Some(MatchFeed::Matches(vec![job_match("m1")])));
        let notice = fetched.notice.unwrap();
        assert_eq!(notice.kind, NoticeKind::Network);
        assert!(notice.retryable);

        // The domain was not cleared by the failure.
        let cached: Option<Vec<JobMatch>> =
            h.orchestrator.domains().get(CacheDomain::JobMatches).await;
        assert!(cached.is_some());
    }

    #[tokio::test]
    async fn test_notice_is_stamped_with_the_injected_clock() {
        let h = harness();
        h.clock.advance(chrono::Duration::days(400));
        h.api.fail("skills", Failure::Transient);

        let fetched = h.orchestrator.fetch_skills(FetchTrigger::InitialLoad).await;
        assert_eq!(fetched.notice.unwrap().created_at, h.clock.now());
    }

    #[tokio::test]
    async fn test_auth_expiry_notice_is_not_repeated() {
        let h = harness();
        h.api.fail("saved_jobs", Failure::AuthExpired);
        h.api.fail("profile", Failure::AuthExpired);

        let first = h.orchestrator.fetch_saved_jobs(FetchTrigger::InitialLoad).await;
        let second = h.orchestrator.fetch_profile(FetchTrigger::InitialLoad).await;

        assert_eq!(first.notice.unwrap().kind, NoticeKind::AuthExpired);
        assert!(second.notice.is_none());
        assert!(!h.tokens.is_authenticated());
    }

    #[tokio::test]
    async fn test_regenerate_wins_over_stale_inflight_read() {
        let h = harness();
        h.api.set_matches(vec![job_match("old")]);

        // A read issued before regeneration parks with pre-regeneration data.
        let gate = h.api.gate_next_matches();
        let orchestrator = h.orchestrator.clone();
        let stale_read = tokio::spawn(async move {
            orchestrator
                .fetch_job_matches(MatchQuery::new(FetchTrigger::NoPendingJob))
                .await
        });
        while h.api.calls("job_matches") == 0 {
            tokio::task::yield_now().await;
        }

        h.api.set_matches(vec![job_match("new")]);
        let regenerated = h.orchestrator.regenerate_matches(None).await.unwrap();
        assert_eq!(
            regenerated.data,
            Some(MatchFeed::Matches(vec![job_match("new")]))
        );

        gate.notify_one();
        let stale = stale_read.await.unwrap();
        assert_eq!(stale.data, Some(MatchFeed::Matches(vec![job_match("new")])));

        let cached: Option<Vec<JobMatch>> =
            h.orchestrator.domains().get(CacheDomain::JobMatches).await;
        assert_eq!(cached, Some(vec![job_match("new")]));
    }

    #[tokio::test]
    async fn test_regenerate_clears_stats_and_recommendations() {
        let h = harness();
        h.api.set_recommendations(vec![recommendation("r1")]);
        h.orchestrator.fetch_job_matches(MatchQuery::default()).await;
        h.orchestrator
            .fetch_matching_stats(FetchTrigger::InitialLoad)
            .await;

        h.api.set_matches(vec![job_match("m1")]);
        h.orchestrator.regenerate_matches(None).await.unwrap();

        let domains = h.orchestrator.domains();
        assert!(domains
            .get::<MatchingStats>(CacheDomain::MatchingStats)
            .await
            .is_none());
        assert!(domains
            .get::<Vec<serde_json::Value>>(CacheDomain::Recommendations)
            .await
            .is_none());
        assert_eq!(h.api.calls("regenerate_matches"), 1);
    }

    #[tokio::test]
    async fn test_failed_mutation_propagates() {
        let h = harness();
        h.api.fail("regenerate_matches", Failure::Transient);
        assert!(h.orchestrator.regenerate_matches(None).await.is_err());
        assert_eq!(h.api.calls("job_matches"), 0);
    }

    #[tokio::test]
    async fn test_save_job_refetches_instead_of_trusting_local_state() {
        let h = harness();
        let before = h.orchestrator.fetch_saved_jobs(FetchTrigger::InitialLoad).await;
        assert_eq!(before.data, Some(vec![]));

        let after = h.orchestrator.save_job("job-42").await.unwrap();
        assert_eq!(after.origin, DataOrigin::Network);
        assert_eq!(after.data.unwrap()[0].job_id, "job-42");
        assert_eq!(h.api.calls("saved_jobs"), 2);

        let after = h.orchestrator.unsave_job("job-42").await.unwrap();
        assert_eq!(after.data, Some(vec![]));
    }

    #[tokio::test]
    async fn test_clear_matches_falls_back_to_recommendations() {
        let h = harness();
        h.api.set_matches(vec![job_match("m1")]);
        h.api.set_recommendations(vec![recommendation("r1")]);
        h.orchestrator.fetch_job_matches(MatchQuery::default()).await;

        let fetched = h.orchestrator.clear_matches().await.unwrap();
        assert!(matches!(fetched.data, Some(MatchFeed::Recommendations(_))));
    }

    #[tokio::test]
    async fn test_processing_completion_bypasses_once() {
        let h = harness();
        h.api.set_matches(vec![job_match("old")]);
        h.orchestrator.fetch_job_matches(MatchQuery::default()).await;

        h.api.set_matches(vec![job_match("fresh")]);
        let fetched = h.orchestrator.on_processing_completed().await;
        assert_eq!(fetched.origin, DataOrigin::Network);
        assert_eq!(
            fetched.data,
            Some(MatchFeed::Matches(vec![job_match("fresh")]))
        );
        assert!(!h.orchestrator.completion_pending());

        let next = h.orchestrator.fetch_job_matches(MatchQuery::default()).await;
        assert_eq!(next.origin, DataOrigin::Cache);
    }

    #[tokio::test]
    async fn test_profile_update_invalidates_sections() {
        let h = harness();
        h.orchestrator.fetch_skills(FetchTrigger::InitialLoad).await;
        let update = ProfileUpdate {
            full_name: Some("Ada".to_string()),
            headline: None,
        };
        let fetched = h.orchestrator.update_profile(&update).await.unwrap();
        assert_eq!(fetched.data.unwrap().full_name.as_deref(), Some("Ada"));

        let skills = h.orchestrator.fetch_skills(FetchTrigger::InitialLoad).await;
        assert_eq!(skills.origin, DataOrigin::Network);
        assert_eq!(h.api.calls("skills"), 2);
    }

    #[tokio::test]
    async fn test_reset_all_empties_every_domain() {
        let h = harness();
        h.orchestrator.fetch_saved_jobs(FetchTrigger::InitialLoad).await;
        h.orchestrator.fetch_profile(FetchTrigger::InitialLoad).await;
        h.orchestrator.reset_all().await;

        for domain in CacheDomain::ALL {
            assert!(h
                .orchestrator
                .domains()
                .get::<serde_json::Value>(domain)
                .await
                .is_none());
        }
    }
}

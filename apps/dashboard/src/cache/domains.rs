//! Named cache domains over the entry store, with TTL tiers, invalidation
//! groups and per-domain request versions.

use std::collections::HashMap;
use std::time::Duration;

use serde::{de::DeserializeOwned, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::cache::store::EntryStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CacheDomain {
    JobMatches,
    Recommendations,
    MatchingStats,
    SavedJobs,
    UserProfile,
    Skills,
    Education,
    Experience,
    DashboardStats,
    DashboardMatches,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TtlTier {
    /// Volatile data: matches, stats, saved jobs, dashboard.
    Short,
    /// Slow-changing data: profile and its sections.
    Long,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InvalidationGroup {
    JobMatches,
    SavedJobs,
    UserProfile,
    Dashboard,
}

impl CacheDomain {
    pub const ALL: [CacheDomain; 10] = [
        CacheDomain::JobMatches,
        CacheDomain::Recommendations,
        CacheDomain::MatchingStats,
        CacheDomain::SavedJobs,
        CacheDomain::UserProfile,
        CacheDomain::Skills,
        CacheDomain::Education,
        CacheDomain::Experience,
        CacheDomain::DashboardStats,
        CacheDomain::DashboardMatches,
    ];

    pub fn key(self) -> &'static str {
        match self {
            CacheDomain::JobMatches => "job_matches",
            CacheDomain::Recommendations => "job_recommendations",
            CacheDomain::MatchingStats => "matching_stats",
            CacheDomain::SavedJobs => "saved_jobs",
            CacheDomain::UserProfile => "user_profile",
            CacheDomain::Skills => "user_skills",
            CacheDomain::Education => "user_education",
            CacheDomain::Experience => "user_experience",
            CacheDomain::DashboardStats => "dashboard_stats",
            CacheDomain::DashboardMatches => "dashboard_matches",
        }
    }

    pub fn tier(self) -> TtlTier {
        match self {
            CacheDomain::UserProfile
            | CacheDomain::Skills
            | CacheDomain::Education
            | CacheDomain::Experience => TtlTier::Long,
            _ => TtlTier::Short,
        }
    }

    pub fn group(self) -> InvalidationGroup {
        match self {
            CacheDomain::JobMatches | CacheDomain::Recommendations | CacheDomain::MatchingStats => {
                InvalidationGroup::JobMatches
            }
            CacheDomain::SavedJobs => InvalidationGroup::SavedJobs,
            CacheDomain::UserProfile
            | CacheDomain::Skills
            | CacheDomain::Education
            | CacheDomain::Experience => InvalidationGroup::UserProfile,
            CacheDomain::DashboardStats | CacheDomain::DashboardMatches => {
                InvalidationGroup::Dashboard
            }
        }
    }
}

impl InvalidationGroup {
    pub fn members(self) -> &'static [CacheDomain] {
        match self {
            InvalidationGroup::JobMatches => &[
                CacheDomain::JobMatches,
                CacheDomain::Recommendations,
                CacheDomain::MatchingStats,
            ],
            InvalidationGroup::SavedJobs => &[CacheDomain::SavedJobs],
            InvalidationGroup::UserProfile => &[
                CacheDomain::UserProfile,
                CacheDomain::Skills,
                CacheDomain::Education,
                CacheDomain::Experience,
            ],
            InvalidationGroup::Dashboard => {
                &[CacheDomain::DashboardStats, CacheDomain::DashboardMatches]
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TtlPolicy {
    pub short: Duration,
    pub long: Duration,
}

impl Default for TtlPolicy {
    fn default() -> Self {
        Self {
            short: Duration::from_secs(5 * 60),
            long: Duration::from_secs(30 * 60),
        }
    }
}

impl TtlPolicy {
    pub fn for_tier(&self, tier: TtlTier) -> Duration {
        match tier {
            TtlTier::Short => self.short,
            TtlTier::Long => self.long,
        }
    }
}

/// Issued before a network fetch; the response may only be cached if this
/// is still the latest ticket for its domain when it comes back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestTicket {
    pub domain: CacheDomain,
    pub version: u64,
}

pub struct CacheDomains {
    store: EntryStore,
    ttl: TtlPolicy,
    versions: Mutex<HashMap<CacheDomain, u64>>,
}

impl CacheDomains {
    pub fn new(store: EntryStore, ttl: TtlPolicy) -> Self {
        Self {
            store,
            ttl,
            versions: Mutex::new(HashMap::new()),
        }
    }

    pub fn store(&self) -> &EntryStore {
        &self.store
    }

    pub fn ttl_for(&self, domain: CacheDomain) -> Duration {
        self.ttl.for_tier(domain.tier())
    }

    pub async fn get<T: DeserializeOwned>(&self, domain: CacheDomain) -> Option<T> {
        self.store.get(domain.key()).await
    }

    /// Unconditional write. Supersedes any fetch still in flight for the domain.
    pub async fn set<T: Serialize>(&self, domain: CacheDomain, data: &T, ttl: Option<Duration>) {
        let mut versions = self.versions.lock().await;
        *versions.entry(domain).or_insert(0) += 1;
        let ttl = ttl.unwrap_or_else(|| self.ttl_for(domain));
        self.store.set(domain.key(), data, ttl).await;
    }

    pub async fn begin_request(&self, domain: CacheDomain) -> RequestTicket {
        let mut versions = self.versions.lock().await;
        let version = versions.entry(domain).or_insert(0);
        *version += 1;
        RequestTicket {
            domain,
            version: *version,
        }
    }

    /// Writes `data` if `ticket` is still current. Returns whether it was written.
    pub async fn commit<T: Serialize>(&self, ticket: RequestTicket, data: &T) -> bool {
        // Held across the write so an invalidation cannot slip in between
        // the version check and the store write.
        let versions = self.versions.lock().await;
        let latest = versions.get(&ticket.domain).copied().unwrap_or(0);
        if latest != ticket.version {
            debug!(
                domain = ticket.domain.key(),
                ticket = ticket.version,
                latest,
                "dropping superseded response"
            );
            return false;
        }
        self.store
            .set(ticket.domain.key(), data, self.ttl_for(ticket.domain))
            .await;
        true
    }

    pub async fn invalidate(&self, domain: CacheDomain) {
        let mut versions = self.versions.lock().await;
        *versions.entry(domain).or_insert(0) += 1;
        self.store.remove(domain.key()).await;
    }

    pub async fn invalidate_group(&self, group: InvalidationGroup) {
        let mut versions = self.versions.lock().await;
        for domain in group.members() {
            *versions.entry(*domain).or_insert(0) += 1;
        }
        let keys: Vec<&'static str> = group.members().iter().map(|d| d.key()).collect();
        self.store.remove_all(&keys).await;
        info!(group = ?group, "invalidated cache group");
    }

    /// Clears every domain. Used on logout-style resets.
    pub async fn reset_all(&self) {
        let mut versions = self.versions.lock().await;
        for domain in CacheDomain::ALL {
            *versions.entry(domain).or_insert(0) += 1;
        }
        let keys: Vec<&'static str> = CacheDomain::ALL.iter().map(|d| d.key()).collect();
        self.store.remove_all(&keys).await;
        info!("reset all cache domains");
    }
}

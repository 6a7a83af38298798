//! Durable entry store: a namespaced key/value store with per-entry expiry.
//!
//! Best-effort by contract: persistence failures are logged and swallowed,
//! corrupt envelopes are evicted and reported as absent. Expiry is enforced
//! lazily on read; there is no background sweep.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tracing::{debug, warn};

use crate::cache::backend::StorageBackend;
use crate::clock::Clock;

/// Persisted envelope. Serialized as `{value, createdAt, expiresAt}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheEntry<T> {
    pub value: T,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl<T> CacheEntry<T> {
    /// An entry stops being valid the instant `createdAt + ttl` is reached.
    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        now < self.expires_at
    }

    fn is_well_formed(&self) -> bool {
        self.expires_at > self.created_at
    }
}

#[derive(Clone)]
pub struct EntryStore {
    backend: Arc<dyn StorageBackend>,
    clock: Arc<dyn Clock>,
    namespace: String,
}

impl EntryStore {
    pub fn new(
        backend: Arc<dyn StorageBackend>,
        clock: Arc<dyn Clock>,
        namespace: impl Into<String>,
    ) -> Self {
        Self {
            backend,
            clock,
            namespace: namespace.into(),
        }
    }

    pub fn backend_kind(&self) -> &'static str {
        self.backend.kind()
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    fn namespaced(&self, key: &str) -> String {
        format!("{}:{}", self.namespace, key)
    }

    /// Stores `value` until `now + ttl`, replacing any prior entry.
    /// Returns once the backend write has completed (or failed and been logged).
    pub async fn set<T: Serialize>(&self, key: &str, value: &T, ttl: Duration) {
        let created_at = self.clock.now();
        let ttl = chrono::Duration::from_std(ttl)
            .unwrap_or_else(|_| chrono::Duration::days(365))
            .max(chrono::Duration::milliseconds(1));
        let expires_at = created_at
            .checked_add_signed(ttl)
            .unwrap_or(DateTime::<Utc>::MAX_UTC);

        let entry = CacheEntry {
            value,
            created_at,
            expires_at,
        };

        let raw = match serde_json::to_string(&entry) {
            Ok(raw) => raw,
            Err(e) => {
                warn!(key = %key, error = %e, "cache entry not serializable; skipping write");
                return;
            }
        };

        if let Err(e) = self.backend.write(&self.namespaced(key), raw).await {
            warn!(key = %key, backend = self.backend.kind(), error = %e, "cache write failed");
        } else {
            debug!(key = %key, expires_at = %expires_at, "cache set");
        }
    }

    /// Returns the value if present and unexpired. Expired and corrupt
    /// entries are deleted as a side effect.
    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.get_entry(key).await.map(|entry| entry.value)
    }

    pub async fn get_entry<T: DeserializeOwned>(&self, key: &str) -> Option<CacheEntry<T>> {
        let full_key = self.namespaced(key);

        let raw = match self.backend.read(&full_key).await {
            Ok(Some(raw)) => raw,
            Ok(None) => {
                debug!(key = %key, "cache miss");
                return None;
            }
            Err(e) => {
                warn!(key = %key, backend = self.backend.kind(), error = %e, "cache read failed");
                return None;
            }
        };

        let entry = match serde_json::from_str::<CacheEntry<T>>(&raw) {
            Ok(entry) if entry.is_well_formed() => entry,
            Ok(_) => {
                warn!(key = %key, "cache entry has inverted timestamps; evicting");
                self.evict(&full_key, &raw).await;
                return None;
            }
            Err(e) => {
                warn!(key = %key, error = %e, "corrupt cache entry; evicting");
                self.evict(&full_key, &raw).await;
                return None;
            }
        };

        // Checked against a fresh clock reading at the point of use.
        if !entry.is_valid_at(self.clock.now()) {
            debug!(key = %key, "cache entry expired; evicting");
            self.evict(&full_key, &raw).await;
            return None;
        }

        debug!(key = %key, "cache hit");
        Some(entry)
    }

    pub async fn remove(&self, key: &str) {
        self.delete_quietly(&self.namespaced(key)).await;
    }

    pub async fn remove_all(&self, keys: &[&str]) {
        for key in keys {
            self.remove(key).await;
        }
    }

    /// Deletes `full_key` only if it still holds `seen`. A write that lands
    /// between the read and the eviction is kept.
    async fn evict(&self, full_key: &str, seen: &str) {
        match self.backend.read(full_key).await {
            Ok(Some(current)) if current != seen => {
                debug!(key = %full_key, "entry replaced during read; not evicting");
            }
            _ => self.delete_quietly(full_key).await,
        }
    }

    async fn delete_quietly(&self, full_key: &str) {
        if let Err(e) = self.backend.delete(full_key).await {
            warn!(key = %full_key, backend = self.backend.kind(), error = %e, "cache delete failed");
        }
    }
}

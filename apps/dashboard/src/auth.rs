use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::RwLock;

use tracing::warn;

/// Holds the bearer token issued by the identity provider. Token storage
/// and refresh belong to the login flow; this only carries the current
/// value and reacts to expiry.
#[derive(Debug, Default)]
pub struct TokenHolder {
    token: RwLock<Option<String>>,
    expiry_reported: AtomicBool,
}

impl TokenHolder {
    pub fn new(token: Option<String>) -> Self {
        Self {
            token: RwLock::new(token),
            expiry_reported: AtomicBool::new(false),
        }
    }

    pub fn token(&self) -> Option<String> {
        self.token.read().unwrap_or_else(|e| e.into_inner()).clone()
    }

    #[cfg(test)]
    pub fn set_token(&self, token: String) {
        *self.token.write().unwrap_or_else(|e| e.into_inner()) = Some(token);
        self.expiry_reported.store(false, Ordering::SeqCst);
    }

    #[cfg(test)]
    pub fn is_authenticated(&self) -> bool {
        self.token.read().unwrap_or_else(|e| e.into_inner()).is_some()
    }

    /// Drops the credential. Returns `true` only for the first report after
    /// a token was set, so callers surface one "session expired" notice
    /// instead of one per failing request.
    pub fn report_expired(&self) -> bool {
        *self.token.write().unwrap_or_else(|e| e.into_inner()) = None;
        let first = !self.expiry_reported.swap(true, Ordering::SeqCst);
        if first {
            warn!("Credentials rejected by the API; cleared token");
        }
        first
    }
}

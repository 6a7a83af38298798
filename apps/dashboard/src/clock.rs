use chrono::{DateTime, Utc};

#[cfg(test)]
pub use manual::ManualClock;

/// Source of "now" for everything that stamps or checks expiry.
/// Production uses `SystemClock`; tests drive a `ManualClock`.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

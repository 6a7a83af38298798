//! Processing status state machine.
//!
//! Pure state: nothing here sleeps or spawns. A driver calls `begin_attempt`
//! on every timer tick, performs the status fetch, and hands the result to
//! `apply`. Stopping the driver is the whole of cancellation.

use std::future::Future;
use std::time::Duration;

use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

use crate::api_client::ApiError;
use crate::models::processing::{RemoteStatus, StatusResponse};
use crate::notifications::Notice;

pub const TIMEOUT_MESSAGE: &str =
    "Processing is taking longer than expected. Check back in a few minutes or refresh your matches.";
pub const SESSION_EXPIRED_MESSAGE: &str = "Your session has expired. Please sign in again.";
const DEFAULT_ERROR_MESSAGE: &str = "Resume processing failed.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessingState {
    NotUploaded,
    Processing,
    Parsing,
    Matching,
    Finalizing,
    Completed,
    Error,
    NotFound,
}

impl ProcessingState {
    pub fn is_in_progress(self) -> bool {
        matches!(
            self,
            ProcessingState::Processing
                | ProcessingState::Parsing
                | ProcessingState::Matching
                | ProcessingState::Finalizing
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, ProcessingState::Completed | ProcessingState::Error)
    }
}

impl From<RemoteStatus> for ProcessingState {
    fn from(status: RemoteStatus) -> Self {
        match status {
            RemoteStatus::Processing => ProcessingState::Processing,
            RemoteStatus::Parsing => ProcessingState::Parsing,
            RemoteStatus::Matching => ProcessingState::Matching,
            RemoteStatus::Finalizing => ProcessingState::Finalizing,
            RemoteStatus::Completed => ProcessingState::Completed,
            RemoteStatus::Error => ProcessingState::Error,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollConfig {
    pub interval: Duration,
    pub max_attempts: u32,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_millis(3000),
            max_attempts: 30,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PollSession {
    pub id: Uuid,
    pub attempts_made: u32,
    pub max_attempts: u32,
    pub interval_ms: u64,
    pub active: bool,
}

/// Proof that a poll was scheduled for a particular session and attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttemptTicket {
    pub session_id: Uuid,
    pub attempt: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttemptDecision {
    Poll(AttemptTicket),
    /// The ceiling was reached before a terminal status arrived.
    TimedOut(ProcessingEvent),
    /// No active session, or the consumer is gone.
    Idle,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessingEvent {
    Progress(ProcessingState),
    Completed {
        matches_found: Option<u32>,
        /// False when the success notice already fired this session.
        notify: bool,
    },
    Failed {
        message: String,
    },
    TimedOut {
        attempts: u32,
    },
    NotFound,
    Ignored,
}

impl ProcessingEvent {
    pub fn ends_session(&self) -> bool {
        matches!(
            self,
            ProcessingEvent::Completed { .. }
                | ProcessingEvent::Failed { .. }
                | ProcessingEvent::TimedOut { .. }
                | ProcessingEvent::NotFound
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProcessingSnapshot {
    pub state: ProcessingState,
    pub message: Option<String>,
    pub step: Option<String>,
    pub matches_found: Option<u32>,
    pub session: Option<PollSession>,
    pub polling: bool,
    /// Most recent processing notice; filled in by the coordinator.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_notice: Option<Notice>,
}

#[derive(Debug)]
pub struct ProcessingMachine {
    config: PollConfig,
    state: ProcessingState,
    message: Option<String>,
    step: Option<String>,
    matches_found: Option<u32>,
    session: Option<PollSession>,
    completion_notified: bool,
    mounted: bool,
}

impl ProcessingMachine {
    pub fn new(config: PollConfig) -> Self {
        Self {
            config,
            state: ProcessingState::NotUploaded,
            message: None,
            step: None,
            matches_found: None,
            session: None,
            completion_notified: false,
            mounted: true,
        }
    }

    pub fn state(&self) -> ProcessingState {
        self.state
    }

    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    pub fn session(&self) -> Option<&PollSession> {
        self.session.as_ref()
    }

    pub fn is_polling(&self) -> bool {
        self.mounted && self.session.as_ref().is_some_and(|s| s.active)
    }

    pub fn snapshot(&self) -> ProcessingSnapshot {
        ProcessingSnapshot {
            state: self.state,
            message: self.message.clone(),
            step: self.step.clone(),
            matches_found: self.matches_found,
            session: self.session.clone(),
            polling: self.is_polling(),
            last_notice: None,
        }
    }

    /// Upload accepted: enter `processing` and open a fresh poll session.
    /// Refused while terminal (call `reset` first) or after teardown.
    pub fn start_session(&mut self) -> Option<Uuid> {
        if !self.mounted || self.state.is_terminal() {
            return None;
        }
        self.state = ProcessingState::Processing;
        self.message = None;
        self.step = None;
        self.matches_found = None;
        Some(self.open_session())
    }

    /// A job was found already running (e.g. after a restart). Adopts the
    /// reported sub-state and starts polling it.
    pub fn resume_session(&mut self, status: &StatusResponse) -> Option<Uuid> {
        let state = ProcessingState::from(status.status);
        if !self.mounted || !state.is_in_progress() || self.state.is_terminal() {
            return None;
        }
        self.state = state;
        self.step = status.step.clone();
        self.message = status.message.clone();
        Some(self.open_session())
    }

    fn open_session(&mut self) -> Uuid {
        let id = Uuid::new_v4();
        self.completion_notified = false;
        self.session = Some(PollSession {
            id,
            attempts_made: 0,
            max_attempts: self.config.max_attempts,
            interval_ms: self.config.interval.as_millis() as u64,
            active: true,
        });
        info!(session = %id, "processing poll session started");
        id
    }

    /// Called on every timer tick.
    pub fn begin_attempt(&mut self) -> AttemptDecision {
        if !self.mounted {
            return AttemptDecision::Idle;
        }
        let Some(session) = self.session.as_mut().filter(|s| s.active) else {
            return AttemptDecision::Idle;
        };

        if session.attempts_made >= session.max_attempts {
            let attempts = session.attempts_made;
            return AttemptDecision::TimedOut(self.time_out(attempts));
        }

        session.attempts_made += 1;
        AttemptDecision::Poll(AttemptTicket {
            session_id: session.id,
            attempt: session.attempts_made,
        })
    }

    /// Applies one status response. Responses may arrive out of order; any
    /// response for the live session is taken as the latest truth.
    pub fn apply(
        &mut self,
        ticket: AttemptTicket,
        result: Result<StatusResponse, ApiError>,
    ) -> ProcessingEvent {
        if !self.mounted {
            return ProcessingEvent::Ignored;
        }
        let live = self
            .session
            .as_ref()
            .is_some_and(|s| s.active && s.id == ticket.session_id);
        if !live || self.state.is_terminal() {
            return ProcessingEvent::Ignored;
        }

        let status = match result {
            Ok(status) => status,
            Err(ApiError::NotFound) => {
                self.state = ProcessingState::NotFound;
                self.message = None;
                self.end_session();
                info!("no processing job found; polling stopped");
                return ProcessingEvent::NotFound;
            }
            Err(ApiError::AuthExpired) => {
                return self.fail(SESSION_EXPIRED_MESSAGE.to_string());
            }
            Err(e) => {
                warn!(attempt = ticket.attempt, error = %e, "status check failed; will retry");
                if ticket.attempt >= self.config.max_attempts {
                    return self.time_out(ticket.attempt);
                }
                return ProcessingEvent::Progress(self.state);
            }
        };

        let next = ProcessingState::from(status.status);
        self.step = status.step.clone();
        if status.matches_found.is_some() {
            self.matches_found = status.matches_found;
        }

        match next {
            ProcessingState::Completed => {
                self.state = next;
                self.message = status.message;
                self.end_session();
                let notify = !self.completion_notified;
                self.completion_notified = true;
                info!(matches_found = ?self.matches_found, "resume processing completed");
                ProcessingEvent::Completed {
                    matches_found: self.matches_found,
                    notify,
                }
            }
            ProcessingState::Error => self.fail(
                status
                    .message
                    .unwrap_or_else(|| DEFAULT_ERROR_MESSAGE.to_string()),
            ),
            _ => {
                if next != self.state {
                    info!(from = ?self.state, to = ?next, "processing stage changed");
                }
                self.state = next;
                self.message = status.message;
                if ticket.attempt >= self.config.max_attempts {
                    return self.time_out(ticket.attempt);
                }
                ProcessingEvent::Progress(next)
            }
        }
    }

    /// One full tick with an injected fetch.
    pub async fn tick<F, Fut>(&mut self, fetch: F) -> ProcessingEvent
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<StatusResponse, ApiError>>,
    {
        match self.begin_attempt() {
            AttemptDecision::Poll(ticket) => {
                let result = fetch().await;
                self.apply(ticket, result)
            }
            AttemptDecision::TimedOut(event) => event,
            AttemptDecision::Idle => ProcessingEvent::Ignored,
        }
    }

    /// Back to `not_uploaded` with counters cleared.
    pub fn reset(&mut self) {
        self.state = ProcessingState::NotUploaded;
        self.message = None;
        self.step = None;
        self.matches_found = None;
        self.session = None;
        self.completion_notified = false;
    }

    /// The consumer is gone: drop the session and ignore anything still in flight.
    pub fn teardown(&mut self) {
        self.mounted = false;
        self.session = None;
    }

    fn fail(&mut self, message: String) -> ProcessingEvent {
        warn!(message = %message, "resume processing failed");
        self.state = ProcessingState::Error;
        self.message = Some(message.clone());
        self.end_session();
        ProcessingEvent::Failed { message }
    }

    fn time_out(&mut self, attempts: u32) -> ProcessingEvent {
        warn!(attempts, "processing poll ceiling reached; giving up locally");
        self.state = ProcessingState::Error;
        self.message = Some(TIMEOUT_MESSAGE.to_string());
        self.end_session();
        ProcessingEvent::TimedOut { attempts }
    }

    fn end_session(&mut self) {
        if let Some(session) = self.session.as_mut() {
            session.active = false;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn machine(max_attempts: u32) -> ProcessingMachine {
        ProcessingMachine::new(PollConfig {
            interval: Duration::from_millis(2000),
            max_attempts,
        })
    }

    fn status(s: RemoteStatus) -> Result<StatusResponse, ApiError> {
        Ok(StatusResponse::new(s))
    }

    #[tokio::test]
    async fn test_happy_path_walks_sub_states_to_completed() {
        let mut m = machine(30);
        assert_eq!(m.state(), ProcessingState::NotUploaded);
        m.start_session().unwrap();
        assert_eq!(m.state(), ProcessingState::Processing);

        for (remote, expected) in [
            (RemoteStatus::Parsing, ProcessingState::Parsing),
            (RemoteStatus::Matching, ProcessingState::Matching),
            (RemoteStatus::Finalizing, ProcessingState::Finalizing),
        ] {
            let event = m.tick(|| async move { status(remote) }).await;
            assert_eq!(event, ProcessingEvent::Progress(expected));
        }

        let event = m
            .tick(|| async {
                Ok(StatusResponse::new(RemoteStatus::Completed).with_matches_found(12))
            })
            .await;
        assert_eq!(
            event,
            ProcessingEvent::Completed {
                matches_found: Some(12),
                notify: true
            }
        );
        assert!(!m.is_polling());
        assert_eq!(m.begin_attempt(), AttemptDecision::Idle);
    }

    #[tokio::test]
    async fn test_times_out_after_max_attempts_without_extra_fetch() {
        let mut m = machine(30);
        m.start_session().unwrap();
        let mut fetches = 0;

        for _ in 0..30 {
            m.tick(|| {
                fetches += 1;
                async { status(RemoteStatus::Matching) }
            })
            .await;
        }

        assert_eq!(fetches, 30);
        assert_eq!(m.state(), ProcessingState::Error);
        assert_eq!(m.message(), Some(TIMEOUT_MESSAGE));
        assert!(!m.is_polling());

        // Further ticks never fetch.
        let event = m
            .tick(|| {
                fetches += 1;
                async { status(RemoteStatus::Matching) }
            })
            .await;
        assert_eq!(event, ProcessingEvent::Ignored);
        assert_eq!(fetches, 30);
    }

    #[test]
    fn test_tick_at_ceiling_times_out_while_last_fetch_in_flight() {
        let mut m = machine(2);
        m.start_session().unwrap();
        let AttemptDecision::Poll(_) = m.begin_attempt() else {
            panic!("expected poll")
        };
        let AttemptDecision::Poll(_) = m.begin_attempt() else {
            panic!("expected poll")
        };
        assert_eq!(
            m.begin_attempt(),
            AttemptDecision::TimedOut(ProcessingEvent::TimedOut { attempts: 2 })
        );
        assert_eq!(m.state(), ProcessingState::Error);
    }

    #[test]
    fn test_backend_error_is_distinct_from_timeout() {
        let mut m = machine(30);
        m.start_session().unwrap();
        let AttemptDecision::Poll(ticket) = m.begin_attempt() else {
            panic!("expected poll")
        };
        let event = m.apply(
            ticket,
            Ok(StatusResponse::new(RemoteStatus::Error).with_message("unreadable PDF")),
        );
        assert_eq!(
            event,
            ProcessingEvent::Failed {
                message: "unreadable PDF".to_string()
            }
        );
        assert_ne!(m.message(), Some(TIMEOUT_MESSAGE));
    }

    #[test]
    fn test_completion_notifies_once_even_with_overlapping_responses() {
        let mut m = machine(30);
        m.start_session().unwrap();
        let AttemptDecision::Poll(first) = m.begin_attempt() else {
            panic!("expected poll")
        };
        let AttemptDecision::Poll(second) = m.begin_attempt() else {
            panic!("expected poll")
        };

        let a = m.apply(second, status(RemoteStatus::Completed));
        let b = m.apply(first, status(RemoteStatus::Completed));
        assert!(matches!(a, ProcessingEvent::Completed { notify: true, .. }));
        assert_eq!(b, ProcessingEvent::Ignored);
    }

    #[test]
    fn test_out_of_order_progress_is_last_write_wins() {
        let mut m = machine(30);
        m.start_session().unwrap();
        let AttemptDecision::Poll(first) = m.begin_attempt() else {
            panic!("expected poll")
        };
        let AttemptDecision::Poll(second) = m.begin_attempt() else {
            panic!("expected poll")
        };
        m.apply(second, status(RemoteStatus::Matching));
        m.apply(first, status(RemoteStatus::Parsing));
        assert_eq!(m.state(), ProcessingState::Parsing);
    }

    #[test]
    fn test_responses_after_teardown_are_dropped() {
        let mut m = machine(30);
        m.start_session().unwrap();
        let AttemptDecision::Poll(ticket) = m.begin_attempt() else {
            panic!("expected poll")
        };
        m.teardown();
        assert_eq!(
            m.apply(ticket, status(RemoteStatus::Completed)),
            ProcessingEvent::Ignored
        );
        assert_eq!(m.begin_attempt(), AttemptDecision::Idle);
        assert!(m.start_session().is_none());
    }

    #[test]
    fn test_stale_session_ticket_is_ignored() {
        let mut m = machine(30);
        m.start_session().unwrap();
        let AttemptDecision::Poll(old) = m.begin_attempt() else {
            panic!("expected poll")
        };
        m.reset();
        m.start_session().unwrap();
        assert_eq!(
            m.apply(old, status(RemoteStatus::Completed)),
            ProcessingEvent::Ignored
        );
        assert_eq!(m.state(), ProcessingState::Processing);
    }

    #[test]
    fn test_terminal_state_requires_reset() {
        let mut m = machine(30);
        m.start_session().unwrap();
        let AttemptDecision::Poll(ticket) = m.begin_attempt() else {
            panic!("expected poll")
        };
        m.apply(ticket, status(RemoteStatus::Completed));
        assert!(m.start_session().is_none());

        m.reset();
        assert_eq!(m.state(), ProcessingState::NotUploaded);
        assert!(m.session().is_none());
        assert!(m.start_session().is_some());
        assert_eq!(m.session().unwrap().attempts_made, 0);
    }

    #[test]
    fn test_transient_errors_count_as_attempts() {
        let mut m = machine(2);
        m.start_session().unwrap();
        let AttemptDecision::Poll(t1) = m.begin_attempt() else {
            panic!("expected poll")
        };
        let event = m.apply(t1, Err(ApiError::Unavailable { retries: 3 }));
        assert_eq!(event, ProcessingEvent::Progress(ProcessingState::Processing));

        let AttemptDecision::Poll(t2) = m.begin_attempt() else {
            panic!("expected poll")
        };
        let event = m.apply(t2, Err(ApiError::Unavailable { retries: 3 }));
        assert_eq!(event, ProcessingEvent::TimedOut { attempts: 2 });
    }

    #[test]
    fn test_not_found_and_auth_expiry_end_the_session() {
        let mut m = machine(30);
        m.start_session().unwrap();
        let AttemptDecision::Poll(t) = m.begin_attempt() else {
            panic!("expected poll")
        };
        assert_eq!(m.apply(t, Err(ApiError::NotFound)), ProcessingEvent::NotFound);
        assert_eq!(m.state(), ProcessingState::NotFound);
        assert!(!m.is_polling());

        let mut m = machine(30);
        m.start_session().unwrap();
        let AttemptDecision::Poll(t) = m.begin_attempt() else {
            panic!("expected poll")
        };
        m.apply(t, Err(ApiError::AuthExpired));
        assert_eq!(m.state(), ProcessingState::Error);
        assert_eq!(m.message(), Some(SESSION_EXPIRED_MESSAGE));
    }

    #[test]
    fn test_resume_session_adopts_reported_stage() {
        let mut m = machine(30);
        let reported = StatusResponse::new(RemoteStatus::Finalizing);
        assert!(m.resume_session(&reported).is_some());
        assert_eq!(m.state(), ProcessingState::Finalizing);
        assert!(m.is_polling());

        let mut idle = machine(30);
        assert!(idle
            .resume_session(&StatusResponse::new(RemoteStatus::Completed))
            .is_none());
        assert_eq!(idle.state(), ProcessingState::NotUploaded);
    }
}

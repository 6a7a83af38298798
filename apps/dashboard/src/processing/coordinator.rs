//! Drives the processing state machine on a tokio interval and routes its
//! terminal events to the fetch orchestrator.

use std::sync::{Arc, Mutex, MutexGuard};

use bytes::Bytes;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::api_client::{ApiError, JobApi};
use crate::notifications::{Notice, NoticeKind};
use crate::orchestrator::FetchOrchestrator;
use crate::processing::machine::{
    AttemptDecision, PollConfig, ProcessingEvent, ProcessingMachine, ProcessingSnapshot,
};

const NOTICE_CAPACITY: usize = 16;

/// The running poll timer and the session it belongs to.
struct Poller {
    session: Uuid,
    handle: JoinHandle<()>,
}

pub struct ProcessingCoordinator {
    machine: Mutex<ProcessingMachine>,
    api: Arc<dyn JobApi>,
    orchestrator: Arc<FetchOrchestrator>,
    config: PollConfig,
    poller: Mutex<Option<Poller>>,
    notices: broadcast::Sender<Notice>,
    last_notice: Mutex<Option<Notice>>,
}

impl ProcessingCoordinator {
    pub fn new(
        api: Arc<dyn JobApi>,
        orchestrator: Arc<FetchOrchestrator>,
        config: PollConfig,
    ) -> Arc<Self> {
        let (notices, _) = broadcast::channel(NOTICE_CAPACITY);
        Arc::new(Self {
            machine: Mutex::new(ProcessingMachine::new(config)),
            api,
            orchestrator,
            config,
            poller: Mutex::new(None),
            notices,
            last_notice: Mutex::new(None),
        })
    }

    fn machine(&self) -> MutexGuard<'_, ProcessingMachine> {
        self.machine.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn poller(&self) -> MutexGuard<'_, Option<Poller>> {
        self.poller.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn last_notice(&self) -> MutexGuard<'_, Option<Notice>> {
        self.last_notice.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn snapshot(&self) -> ProcessingSnapshot {
        let mut snapshot = self.machine().snapshot();
        snapshot.last_notice = self.last_notice().clone();
        snapshot
    }

    /// Live feed of processing notices (completion, failure, timeout).
    pub fn subscribe(&self) -> broadcast::Receiver<Notice> {
        self.notices.subscribe()
    }

    /// Sends the resume to the backend and, once accepted, starts a new
    /// processing episode.
    pub async fn upload_resume(
        self: &Arc<Self>,
        file_name: &str,
        content_type: &str,
        bytes: Bytes,
    ) -> Result<ProcessingSnapshot, ApiError> {
        let accepted = self
            .api
            .upload_resume(file_name, content_type, bytes)
            .await?;
        info!(resume_id = ?accepted.resume_id, "resume upload accepted");

        self.orchestrator.on_upload_accepted().await;

        let started = {
            let mut machine = self.machine();
            if machine.state().is_terminal() {
                // A new upload opens a new episode.
                machine.reset();
            }
            machine.start_session()
        };
        if let Some(session) = started {
            *self.last_notice() = None;
            self.spawn_poller(session);
        }
        Ok(self.snapshot())
    }

    /// Checks once whether the backend is already processing a resume and,
    /// if so, adopts that job and polls it.
    pub async fn detect_in_progress(self: &Arc<Self>) -> ProcessingSnapshot {
        match self.api.processing_status().await {
            Ok(status) => {
                let resumed = self.machine().resume_session(&status);
                if let Some(session) = resumed {
                    info!(status = ?status.status, "found processing job in progress");
                    self.spawn_poller(session);
                }
            }
            Err(ApiError::NotFound) => debug!("no processing job on record"),
            Err(e) => warn!(error = %e, "could not check processing status"),
        }
        self.snapshot()
    }

    /// Stops polling and returns to `not_uploaded`.
    pub fn reset_processing(&self) -> ProcessingSnapshot {
        self.stop_poller();
        self.machine().reset();
        *self.last_notice() = None;
        info!("processing state reset");
        self.snapshot()
    }

    /// Teardown: no timer survives and no late response mutates state.
    pub fn shutdown(&self) {
        self.machine().teardown();
        self.stop_poller();
        info!("processing coordinator shut down");
    }

    pub fn is_polling(&self) -> bool {
        let timer_alive = self
            .poller()
            .as_ref()
            .is_some_and(|p| !p.handle.is_finished());
        timer_alive && self.machine().is_polling()
    }

    fn stop_poller(&self) {
        let poller = self.poller().take();
        if let Some(poller) = poller {
            poller.handle.abort();
            debug!(session = %poller.session, "poll timer cancelled");
        }
    }

    /// Cancels the timer only if it still belongs to `session`; a newer
    /// session's timer is left running.
    fn stop_poller_for(&self, session: Uuid) {
        let poller = {
            let mut slot = self.poller();
            match slot.as_ref() {
                Some(p) if p.session == session => slot.take(),
                _ => None,
            }
        };
        if let Some(poller) = poller {
            poller.handle.abort();
            debug!(session = %session, "poll timer cancelled");
        }
    }

    fn spawn_poller(self: &Arc<Self>, session: Uuid) {
        self.stop_poller();

        let this = Arc::clone(self);
        let interval = self.config.interval;
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // The first tick completes immediately; polls start one interval in.
            ticker.tick().await;

            loop {
                ticker.tick().await;
                let decision = this.machine().begin_attempt();
                match decision {
                    AttemptDecision::Poll(ticket) => {
                        // Not awaited: a slow check must not delay the next tick.
                        let worker = Arc::clone(&this);
                        tokio::spawn(async move {
                            let result = worker.api.processing_status().await;
                            let event = worker.machine().apply(ticket, result);
                            worker.handle_event(ticket.session_id, event).await;
                        });
                    }
                    AttemptDecision::TimedOut(event) => {
                        // Detach rather than abort: this task is the poller and
                        // still has the follow-up refresh to run.
                        {
                            let mut slot = this.poller();
                            if slot.as_ref().is_some_and(|p| p.session == session) {
                                slot.take();
                            }
                        }
                        this.handle_event(session, event).await;
                        break;
                    }
                    AttemptDecision::Idle => break,
                }
            }
            debug!(session = %session, "poll loop exited");
        });

        *self.poller() = Some(Poller { session, handle });
    }

    async fn handle_event(&self, session: Uuid, event: ProcessingEvent) {
        if event.ends_session() {
            self.stop_poller_for(session);
        }

        let now = self.orchestrator.now();
        match event {
            ProcessingEvent::Completed {
                matches_found,
                notify,
            } => {
                if notify {
                    let message = match matches_found {
                        Some(n) => format!("Your resume has been processed. {n} matches found."),
                        None => "Your resume has been processed.".to_string(),
                    };
                    self.publish(Notice::new(NoticeKind::ProcessingComplete, message, now));
                }
                self.orchestrator.on_processing_completed().await;
            }
            ProcessingEvent::Failed { message } => {
                self.publish(Notice::new(NoticeKind::ProcessingFailed, message, now).retryable());
                self.orchestrator.on_processing_failed().await;
            }
            ProcessingEvent::TimedOut { attempts } => {
                info!(attempts, "processing timed out locally");
                let message = self
                    .machine()
                    .message()
                    .unwrap_or_default()
                    .to_string();
                self.publish(Notice::new(NoticeKind::ProcessingTimeout, message, now).retryable());
                self.orchestrator.on_processing_failed().await;
            }
            ProcessingEvent::Progress(state) => debug!(state = ?state, "processing in progress"),
            ProcessingEvent::NotFound | ProcessingEvent::Ignored => {}
        }
    }

    fn publish(&self, notice: Notice) {
        *self.last_notice() = Some(notice.clone());
        if self.notices.send(notice).is_err() {
            debug!("no live notice subscribers; kept as last notice");
        }
    }
}

impl Drop for ProcessingCoordinator {
    fn drop(&mut self) {
        if let Some(poller) = self
            .poller
            .get_mut()
            .unwrap_or_else(|e| e.into_inner())
            .take()
        {
            poller.handle.abort();
        }
    }
}

//! Async driver: runs the reducer and performs its remote calls.
//!
//! All methods take `&self`. The state mutex is held only while
//! [`update`] runs, never across the remote call, so [`Session::reset`] can
//! be called while a submission is pending. The pending call then resolves
//! into a stale ticket and its result is dropped.

use super::state::{HistoryEntry, JobSnapshot, SessionState, Ticket, Tool};
use super::update::{update, Effect, Msg, Submission};
use crate::config::RemovalConfig;
use crate::error::{BgRemoveError, SessionError};
use crate::media::ImageFile;
use crate::observer::{NoopObserver, Observer};
use crate::pipeline::remote::{BackgroundRemover, RemoveBgClient, UploadProgress};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::warn;

/// One browser-tab's worth of state: a job slot, a history, a remover.
pub struct Session {
    state: Mutex<SessionState>,
    remover: Arc<dyn BackgroundRemover>,
    observer: Observer,
}

impl Session {
    pub fn new(config: RemovalConfig, remover: Arc<dyn BackgroundRemover>) -> Self {
        Self {
            state: Mutex::new(SessionState::new(config)),
            remover,
            observer: Arc::new(NoopObserver),
        }
    }

    /// Session backed by the real remove.bg client.
    pub fn with_client(config: RemovalConfig) -> Result<Self, BgRemoveError> {
        let client = RemoveBgClient::new(&config)?;
        Ok(Self::new(config, Arc::new(client)))
    }

    pub fn with_observer(mut self, observer: Observer) -> Self {
        self.observer = observer;
        self
    }

    /// Validate `file` and, if it passes, submit it. Resolves once the job
    /// reaches `Succeeded` or `Failed`, or once it has been superseded.
    ///
    /// A rejected file is not an `Err`: the returned snapshot is `Failed`
    /// with an `InvalidInput` detail. `Err` means the selection itself was
    /// refused (a job is in progress, or the active tool is unavailable).
    pub async fn select_file(&self, file: ImageFile) -> Result<JobSnapshot, SessionError> {
        let submissions = self.dispatch(Msg::SelectFile(file))?;
        self.run(submissions).await;
        Ok(self.snapshot())
    }

    /// Resubmit the failed job's original file.
    pub async fn retry(&self) -> Result<JobSnapshot, SessionError> {
        let submissions = self.dispatch(Msg::Retry)?;
        self.run(submissions).await;
        Ok(self.snapshot())
    }

    /// Drop the current job. Safe while a submission is in flight.
    pub fn reset(&self) {
        self.dispatch_infallible(Msg::Reset);
    }

    pub fn select_tool(&self, tool: Tool) {
        self.dispatch_infallible(Msg::SelectTool(tool));
    }

    pub fn clear_history(&self) {
        self.dispatch_infallible(Msg::ClearHistory);
    }

    pub fn active_tool(&self) -> Tool {
        self.lock().active_tool()
    }

    pub fn snapshot(&self) -> JobSnapshot {
        self.lock().snapshot()
    }

    /// Most recent first.
    pub fn history(&self) -> Vec<HistoryEntry> {
        self.lock().history_entries()
    }

    pub fn live_resources(&self) -> usize {
        self.lock().live_resources()
    }

    pub fn generation(&self) -> u64 {
        self.lock().generation()
    }

    fn lock(&self) -> MutexGuard<'_, SessionState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Apply `msg`, notify the observer, and hand back any remote calls.
    fn dispatch(&self, msg: Msg) -> Result<Vec<Submission>, SessionError> {
        let effects = update(&mut self.lock(), msg)?;

        let mut submissions = Vec::new();
        for effect in effects {
            match effect {
                Effect::Submit(s) => submissions.push(s),
                Effect::Transition { job, from, to } => self.observer.on_transition(job, from, to),
                Effect::Stored {
                    filename,
                    history_len,
                } => self.observer.on_result_stored(&filename, history_len),
                Effect::Evicted { filename } => self.observer.on_history_evicted(&filename),
            }
        }
        Ok(submissions)
    }

    fn dispatch_infallible(&self, msg: Msg) {
        match self.dispatch(msg) {
            Ok(submissions) if submissions.is_empty() => {}
            Ok(_) => warn!("Unexpected submission from a synchronous action"),
            Err(e) => warn!("{}", e),
        }
    }

    async fn run(&self, submissions: Vec<Submission>) {
        for submission in submissions {
            let progress = TicketProgress {
                session: self,
                ticket: submission.ticket,
            };
            let outcome = self.remover.submit(&submission.file, &progress).await;
            self.dispatch_infallible(Msg::SubmissionFinished {
                ticket: submission.ticket,
                outcome,
            });
        }
    }
}

/// Routes upload progress back into the reducer under the issuing ticket.
struct TicketProgress<'a> {
    session: &'a Session,
    ticket: Ticket,
}

impl UploadProgress for TicketProgress<'_> {
    fn on_request_sent(&self) {
        self.session.dispatch_infallible(Msg::RequestSent(self.ticket));
    }
}

//! The session reducer.
//!
//! [`update`] is the only function that mutates a [`SessionState`]. It never
//! performs I/O: the remote call is requested through [`Effect::Submit`] and
//! its outcome comes back later as [`Msg::SubmissionFinished`], carrying the
//! [`Ticket`] it was issued with. A ticket that no longer matches the current
//! job and attempt is stale and changes nothing.

use super::state::{JobId, JobState, ProcessingJob, SessionState, Ticket, Tool};
use crate::error::{ErrorDetail, ProcessingError, SessionError};
use crate::history::ProcessedImageRecord;
use crate::media::{ImageData, ImageFile};
use crate::pipeline::intake;
use crate::resources::{ResourceId, ResourceRegistry};
use chrono::Utc;
use tracing::{debug, error, info, warn};

/// Events fed into the reducer.
#[derive(Debug)]
pub enum Msg {
    /// User picked a file (drop or file picker).
    SelectFile(ImageFile),
    /// The upload for this ticket finished; the service is working.
    RequestSent(Ticket),
    /// The remote call for this ticket resolved.
    SubmissionFinished {
        ticket: Ticket,
        outcome: Result<ImageData, ProcessingError>,
    },
    /// Resubmit the failed job's original file.
    Retry,
    /// Drop the current job and return to idle.
    Reset,
    SelectTool(Tool),
    ClearHistory,
}

/// A remote call the driver must perform.
#[derive(Debug, Clone)]
pub struct Submission {
    pub ticket: Ticket,
    pub file: ImageFile,
}

/// Instructions and notifications produced by [`update`].
#[derive(Debug, Clone)]
pub enum Effect {
    Submit(Submission),
    Transition {
        job: JobId,
        from: JobState,
        to: JobState,
    },
    /// A result was added to the history.
    Stored { filename: String, history_len: usize },
    /// The oldest history record was dropped to make room.
    Evicted { filename: String },
}

/// Apply `msg` to `state`.
///
/// Returns `Err` when the action is not allowed in the current state; the
/// state is then untouched.
pub fn update(state: &mut SessionState, msg: Msg) -> Result<Vec<Effect>, SessionError> {
    match msg {
        Msg::SelectFile(file) => select_file(state, file),
        Msg::RequestSent(ticket) => Ok(request_sent(state, ticket)),
        Msg::SubmissionFinished { ticket, outcome } => Ok(finish(state, ticket, outcome)),
        Msg::Retry => retry(state),
        Msg::Reset => Ok(reset(state)),
        Msg::SelectTool(tool) => {
            if tool != state.active_tool {
                debug!("Active tool: {} → {}", state.active_tool, tool);
                state.active_tool = tool;
            }
            Ok(Vec::new())
        }
        Msg::ClearHistory => {
            let records = state.history.clear();
            debug!("Clearing {} history records", records.len());
            for record in records {
                release_record(&mut state.resources, &record);
            }
            Ok(Vec::new())
        }
    }
}

fn select_file(state: &mut SessionState, file: ImageFile) -> Result<Vec<Effect>, SessionError> {
    if !state.active_tool.is_available() {
        return Err(SessionError::ToolUnavailable {
            tool: state.active_tool,
        });
    }
    let current = state.job_state();
    if current.is_busy() {
        return Err(SessionError::Busy { state: current });
    }

    // A new selection replaces whatever finished job was on screen.
    let mut effects = Vec::new();
    if let Some(old) = state.job.take() {
        effects.push(Effect::Transition {
            job: old.id,
            from: old.state,
            to: JobState::Idle,
        });
        release_job(&mut state.resources, old);
    }

    state.generation += 1;
    let id = JobId(state.generation);
    info!("{}: selected '{}' ({} bytes)", id, file.name, file.size());

    let mut job = ProcessingJob {
        id,
        attempt: 0,
        filename: file.name.clone(),
        state: JobState::Validating,
        source: None,
        result: None,
        error: None,
    };
    effects.push(Effect::Transition {
        job: id,
        from: JobState::Idle,
        to: JobState::Validating,
    });

    match intake::validate(&file, &state.config) {
        Err(rejection) => {
            info!("{}: rejected: {}", id, rejection);
            job.error = Some(ErrorDetail::from(&ProcessingError::InvalidInput(rejection)));
            job.state = JobState::Failed;
            effects.push(Effect::Transition {
                job: id,
                from: JobState::Validating,
                to: JobState::Failed,
            });
        }
        Ok(()) => {
            job.source = Some(state.resources.insert(file.data.clone()));
            job.state = JobState::Uploading;
            effects.push(Effect::Transition {
                job: id,
                from: JobState::Validating,
                to: JobState::Uploading,
            });
            effects.push(Effect::Submit(Submission {
                ticket: job.ticket(),
                file,
            }));
        }
    }

    state.job = Some(job);
    Ok(effects)
}

/// The current job, if `ticket` still refers to its in-flight attempt.
fn current_job(state: &mut SessionState, ticket: Ticket) -> Option<&mut ProcessingJob> {
    state
        .job
        .as_mut()
        .filter(|j| j.ticket() == ticket && j.state.is_in_flight())
}

fn request_sent(state: &mut SessionState, ticket: Ticket) -> Vec<Effect> {
    match current_job(state, ticket) {
        Some(job) if job.state == JobState::Uploading => {
            job.state = JobState::Processing;
            vec![Effect::Transition {
                job: job.id,
                from: JobState::Uploading,
                to: JobState::Processing,
            }]
        }
        Some(_) => Vec::new(),
        None => {
            debug!("Ignoring upload notice for stale {:?}", ticket);
            Vec::new()
        }
    }
}

fn finish(
    state: &mut SessionState,
    ticket: Ticket,
    outcome: Result<ImageData, ProcessingError>,
) -> Vec<Effect> {
    let Some(job) = current_job(state, ticket) else {
        debug!(
            "Discarding stale result for {} attempt {}",
            ticket.job, ticket.attempt
        );
        return Vec::new();
    };
    let from = job.state;
    let id = job.id;

    match outcome {
        Err(err) => {
            warn!("{}: failed: {}", id, err);
            job.error = Some(ErrorDetail::from(&err));
            job.state = JobState::Failed;
            vec![Effect::Transition {
                job: id,
                from,
                to: JobState::Failed,
            }]
        }
        Ok(data) => {
            let filename = job.filename.clone();
            let source = job.source;
            info!("{}: '{}' processed ({} bytes)", id, filename, data.len());

            let result = state.resources.insert(data);
            if let Some(job) = state.job.as_mut() {
                job.result = Some(result);
                job.state = JobState::Succeeded;
            }
            let mut effects = vec![Effect::Transition {
                job: id,
                from,
                to: JobState::Succeeded,
            }];

            let Some(source) = source else {
                error!("{}: succeeded without a source image; not recorded", id);
                return effects;
            };
            effects.extend(store_result(state, source, result, filename));
            effects
        }
    }
}

/// Append a history record sharing the job's images.
fn store_result(
    state: &mut SessionState,
    source: ResourceId,
    result: ResourceId,
    filename: String,
) -> Vec<Effect> {
    let mut effects = Vec::new();
    for id in [source, result] {
        if let Err(e) = state.resources.retain(id) {
            error!("Cannot record result: {}", e);
            return effects;
        }
    }

    let record = ProcessedImageRecord {
        original: source,
        processed: result,
        filename: filename.clone(),
        timestamp: Utc::now(),
    };
    if let Some(evicted) = state.history.append(record) {
        debug!("History full; evicting '{}'", evicted.filename);
        release_record(&mut state.resources, &evicted);
        effects.push(Effect::Evicted {
            filename: evicted.filename,
        });
    }
    effects.push(Effect::Stored {
        filename,
        history_len: state.history.len(),
    });
    effects
}

fn retry(state: &mut SessionState) -> Result<Vec<Effect>, SessionError> {
    let Some(job) = state.job.as_mut() else {
        return Err(SessionError::NothingToRetry);
    };
    if job.state.is_busy() {
        return Err(SessionError::Busy { state: job.state });
    }
    if job.state != JobState::Failed {
        return Err(SessionError::NothingToRetry);
    }
    if let Some(detail) = &job.error {
        if !detail.is_retryable() {
            return Err(SessionError::NotRetryable { kind: detail.kind });
        }
    }
    let data = job
        .source
        .and_then(|id| state.resources.get(id))
        .cloned()
        .ok_or(SessionError::NothingToRetry)?;

    // Same bytes, same name; validation already passed for this file.
    let file = ImageFile {
        name: job.filename.clone(),
        data,
    };
    job.attempt += 1;
    job.error = None;
    job.state = JobState::Uploading;
    info!("{}: retry attempt {}", job.id, job.attempt);

    Ok(vec![
        Effect::Transition {
            job: job.id,
            from: JobState::Failed,
            to: JobState::Uploading,
        },
        Effect::Submit(Submission {
            ticket: job.ticket(),
            file,
        }),
    ])
}

fn reset(state: &mut SessionState) -> Vec<Effect> {
    let Some(job) = state.job.take() else {
        return Vec::new();
    };
    if job.state.is_in_flight() {
        info!("{}: reset while {:?}; its result will be discarded", job.id, job.state);
    } else {
        debug!("{}: reset", job.id);
    }
    let effect = Effect::Transition {
        job: job.id,
        from: job.state,
        to: JobState::Idle,
    };
    release_job(&mut state.resources, job);
    vec![effect]
}

fn release_job(resources: &mut ResourceRegistry, job: ProcessingJob) {
    for id in [job.source, job.result].into_iter().flatten() {
        release(resources, id);
    }
}

fn release_record(resources: &mut ResourceRegistry, record: &ProcessedImageRecord) {
    release(resources, record.original);
    release(resources, record.processed);
}

fn release(resources: &mut ResourceRegistry, id: ResourceId) {
    if let Err(e) = resources.release(id) {
        error!("{}", e);
    }
}

//! Session state and the read-only views handed to callers.

use crate::config::RemovalConfig;
use crate::error::ErrorDetail;
use crate::history::{ProcessedImageRecord, ResultHistory};
use crate::media::ImageData;
use crate::pipeline::output::download_name;
use crate::resources::{ResourceId, ResourceRegistry};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle of one job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum JobState {
    /// No job. The upload path is open.
    #[default]
    Idle,
    Validating,
    /// Request body is being sent.
    Uploading,
    /// Upload done; waiting for the service to finish.
    Processing,
    Succeeded,
    Failed,
}

impl JobState {
    /// While busy, new file selections and retries are refused.
    pub fn is_busy(self) -> bool {
        matches!(
            self,
            JobState::Validating | JobState::Uploading | JobState::Processing
        )
    }

    pub fn is_in_flight(self) -> bool {
        matches!(self, JobState::Uploading | JobState::Processing)
    }
}

/// Session-local job identifier. Equal to the generation that created it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct JobId(pub(crate) u64);

impl JobId {
    pub fn generation(self) -> u64 {
        self.0
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "job-{}", self.0)
    }
}

/// Identifies one submission: the job plus which attempt of it.
///
/// A completion is applied only if its ticket still matches the current
/// job and attempt. Anything else arrived after a reset, a new selection or
/// a newer retry and is dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Ticket {
    pub job: JobId,
    pub attempt: u32,
}

/// The editing tools offered by the application. Exactly one is active.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Tool {
    #[default]
    BackgroundRemover,
    BackgroundReplacer,
    ImageResizer,
    ImageCompressor,
    FormatConverter,
    BlurTool,
    CartoonEffect,
    ShadowGenerator,
    ProfileCreator,
}

impl Tool {
    pub const ALL: [Tool; 9] = [
        Tool::BackgroundRemover,
        Tool::BackgroundReplacer,
        Tool::ImageResizer,
        Tool::ImageCompressor,
        Tool::FormatConverter,
        Tool::BlurTool,
        Tool::CartoonEffect,
        Tool::ShadowGenerator,
        Tool::ProfileCreator,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Tool::BackgroundRemover => "Background Remover",
            Tool::BackgroundReplacer => "Background Replacer",
            Tool::ImageResizer => "Image Resizer",
            Tool::ImageCompressor => "Image Compressor",
            Tool::FormatConverter => "Format Converter",
            Tool::BlurTool => "Blur Tool",
            Tool::CartoonEffect => "Cartoon Effect",
            Tool::ShadowGenerator => "Shadow Generator",
            Tool::ProfileCreator => "Profile Picture Creator",
        }
    }

    /// Only background removal is wired to a processing backend.
    pub fn is_available(self) -> bool {
        matches!(self, Tool::BackgroundRemover)
    }
}

impl fmt::Display for Tool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// The single job slot of a session.
#[derive(Debug)]
pub(crate) struct ProcessingJob {
    pub(crate) id: JobId,
    pub(crate) attempt: u32,
    pub(crate) filename: String,
    pub(crate) state: JobState,
    pub(crate) source: Option<ResourceId>,
    pub(crate) result: Option<ResourceId>,
    pub(crate) error: Option<ErrorDetail>,
}

impl ProcessingJob {
    pub(crate) fn ticket(&self) -> Ticket {
        Ticket {
            job: self.id,
            attempt: self.attempt,
        }
    }
}

/// Everything a session knows. Mutated only through
/// [`crate::session::update`].
#[derive(Debug)]
pub struct SessionState {
    pub(crate) config: RemovalConfig,
    pub(crate) generation: u64,
    pub(crate) job: Option<ProcessingJob>,
    pub(crate) history: ResultHistory,
    pub(crate) resources: ResourceRegistry,
    pub(crate) active_tool: Tool,
}

impl SessionState {
    pub fn new(config: RemovalConfig) -> Self {
        let history = ResultHistory::new(config.history_capacity);
        Self {
            config,
            generation: 0,
            job: None,
            history,
            resources: ResourceRegistry::new(),
            active_tool: Tool::default(),
        }
    }

    pub fn config(&self) -> &RemovalConfig {
        &self.config
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn job_state(&self) -> JobState {
        self.job.as_ref().map_or(JobState::Idle, |j| j.state)
    }

    pub fn active_tool(&self) -> Tool {
        self.active_tool
    }

    /// Images currently registered; 0 once the job is reset and the
    /// history cleared.
    pub fn live_resources(&self) -> usize {
        self.resources.live()
    }

    pub fn history_len(&self) -> usize {
        self.history.len()
    }

    pub fn snapshot(&self) -> JobSnapshot {
        let Some(job) = &self.job else {
            return JobSnapshot::default();
        };
        let resolve = |id: Option<ResourceId>| id.and_then(|id| self.resources.get(id)).cloned();
        JobSnapshot {
            id: Some(job.id),
            attempt: job.attempt,
            state: job.state,
            filename: Some(job.filename.clone()),
            source: resolve(job.source),
            result: resolve(job.result),
            error: job.error.clone(),
        }
    }

    /// History, most recent first, with image data resolved.
    pub fn history_entries(&self) -> Vec<HistoryEntry> {
        self.history
            .list()
            .filter_map(|r| self.resolve_record(r))
            .collect()
    }

    fn resolve_record(&self, record: &ProcessedImageRecord) -> Option<HistoryEntry> {
        Some(HistoryEntry {
            original: self.resources.get(record.original)?.clone(),
            processed: self.resources.get(record.processed)?.clone(),
            filename: record.filename.clone(),
            timestamp: record.timestamp,
        })
    }
}

/// What the UI renders for the current job.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct JobSnapshot {
    pub id: Option<JobId>,
    pub attempt: u32,
    pub state: JobState,
    pub filename: Option<String>,
    pub source: Option<ImageData>,
    pub result: Option<ImageData>,
    pub error: Option<ErrorDetail>,
}

impl JobSnapshot {
    pub fn can_select_file(&self) -> bool {
        !self.state.is_busy()
    }

    /// True when the error panel should show a Retry button.
    pub fn can_retry(&self) -> bool {
        self.state == JobState::Failed
            && self.source.is_some()
            && self.error.as_ref().is_some_and(ErrorDetail::is_retryable)
    }

    /// Download name for the result, when there is one.
    pub fn download_name(&self) -> Option<String> {
        self.result.as_ref()?;
        self.filename.as_deref().map(download_name)
    }
}

/// A history record with its images.
#[derive(Debug, Clone, PartialEq)]
pub struct HistoryEntry {
    pub original: ImageData,
    pub processed: ImageData,
    pub filename: String,
    pub timestamp: DateTime<Utc>,
}

impl HistoryEntry {
    pub fn download_name(&self) -> String {
        download_name(&self.filename)
    }
}

//! Error types for the edgequake-bgremove library.
//!
//! Four error types cover four distinct audiences:
//!
//! * [`BgRemoveError`]: **Fatal**: the library cannot do what was asked at
//!   all (file missing, output not writable, invalid configuration).
//!
//! * [`ProcessingError`]: **Per job**: one background-removal attempt
//!   failed. The remote client always returns this type; the session stores
//!   it as an [`ErrorDetail`] on the failed job so the caller can show it
//!   and, where [`ErrorKind::is_retryable`] allows, offer a retry.
//!
//! * [`SessionError`]: a UI action was refused because of the current job
//!   state (uploading while busy, retrying a success, …). Nothing changed.
//!
//! * [`ResourceError`]: misuse of the image resource registry. Indicates a
//!   bookkeeping bug rather than a user-facing condition.

use crate::resources::ResourceId;
use crate::session::{JobState, Tool};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

/// Boxed cause kept on network failures for diagnostics.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// All fatal errors returned by the edgequake-bgremove library.
#[derive(Debug, Error)]
pub enum BgRemoveError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Input file was not found at the given path.
    #[error("Image file not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// The file exists but could not be read.
    #[error("Failed to read '{path}': {source}")]
    ReadFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Output errors ─────────────────────────────────────────────────────
    /// Could not create or write the processed image file.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// The HTTP client could not be constructed (TLS backend, proxy settings).
    #[error("Failed to build HTTP client: {0}")]
    HttpClient(String),
}

/// Why the intake validator refused a file.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum Rejection {
    /// Declared MIME type does not match the accepted pattern.
    #[error("Please select a valid image file")]
    InvalidType { mime: String },

    /// File is larger than the configured maximum.
    #[error("File size should be less than {}MB", max / (1024 * 1024))]
    TooLarge { size: u64, max: u64 },
}

/// Classification of a failed job, used to decide what the UI offers next.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    /// File failed validation. The user must pick a different file.
    InvalidInput,
    /// API credential missing. Fatal for this session's processing.
    ConfigurationError,
    /// Transport-level failure. Retryable.
    NetworkError,
    /// Non-2xx response from the service. Retryable.
    ServerError,
}

impl ErrorKind {
    /// Whether an explicit user retry can reasonably succeed.
    pub fn is_retryable(self) -> bool {
        matches!(self, ErrorKind::NetworkError | ErrorKind::ServerError)
    }
}

/// The uniform result type of one background-removal attempt.
#[derive(Debug, Error)]
pub enum ProcessingError {
    /// The file never reached the network layer.
    #[error(transparent)]
    InvalidInput(#[from] Rejection),

    /// The API credential is missing; no request was attempted.
    #[error("Remove.bg API key not found\nSet REMOVEBG_API_KEY or pass --api-key.")]
    Configuration,

    /// Connect, DNS, timeout or body-read failure.
    #[error("Network error: {message}")]
    Network {
        message: String,
        #[source]
        source: BoxError,
    },

    /// The service answered with a non-2xx status.
    #[error("{message}")]
    Server { status: u16, message: String },
}

impl ProcessingError {
    /// Wrap a transport error, keeping it as the source.
    pub fn network(source: impl Into<BoxError>) -> Self {
        let source = source.into();
        ProcessingError::Network {
            message: source.to_string(),
            source,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            ProcessingError::InvalidInput(_) => ErrorKind::InvalidInput,
            ProcessingError::Configuration => ErrorKind::ConfigurationError,
            ProcessingError::Network { .. } => ErrorKind::NetworkError,
            ProcessingError::Server { .. } => ErrorKind::ServerError,
        }
    }
}

/// What a failed job keeps about its error: the message shown in the error
/// panel, its classification, and the underlying cause for diagnostics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorDetail {
    pub kind: ErrorKind,
    pub message: String,
    pub cause: Option<String>,
}

impl ErrorDetail {
    pub fn is_retryable(&self) -> bool {
        self.kind.is_retryable()
    }
}

impl From<&ProcessingError> for ErrorDetail {
    fn from(err: &ProcessingError) -> Self {
        let kind = err.kind();
        let (message, cause) = match err {
            // Validation messages are already written for the user.
            ProcessingError::InvalidInput(r) => (r.to_string(), None),
            ProcessingError::Configuration => {
                ("Failed to remove background".to_string(), Some(err.to_string()))
            }
            ProcessingError::Network { message, source } => {
                let mut chain = message.clone();
                let mut next = source.source();
                while let Some(e) = next {
                    chain.push_str(": ");
                    chain.push_str(&e.to_string());
                    next = e.source();
                }
                ("Network error, please try again".to_string(), Some(chain))
            }
            ProcessingError::Server { message, .. } => (message.clone(), None),
        };
        ErrorDetail {
            kind,
            message,
            cause,
        }
    }
}

/// A session action was refused; the session state is unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    /// A job is validating, uploading or processing.
    #[error("A job is already in progress ({state:?}); wait for it to finish or reset")]
    Busy { state: JobState },

    /// Retry requested but there is no failed job.
    #[error("Nothing to retry")]
    NothingToRetry,

    /// The failed job's error cannot be fixed by resubmitting.
    #[error("A {kind:?} failure cannot be retried")]
    NotRetryable { kind: ErrorKind },

    /// The active tool has no processing behaviour.
    #[error("{tool} is not available yet")]
    ToolUnavailable { tool: Tool },
}

/// Misuse of the image resource registry.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResourceError {
    /// The id was never issued or has already been freed.
    #[error("Unknown or already released image resource {0}")]
    Unknown(ResourceId),
}

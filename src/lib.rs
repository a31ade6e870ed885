//! # edgequake-bgremove
//!
//! Remove image backgrounds through the remove.bg API, with the request
//! lifecycle of an interactive editor: validation, a single job slot per
//! session, explicit retry, and a bounded history of results.
//!
//! ## Why a state machine?
//!
//! The remote call is slow and the user is not. They reset, pick another
//! file, or retry while an upload is still pending. Every change goes
//! through one reducer ([`session::update`]) and every remote completion
//! carries the ticket it was issued with, so a late answer for a job the
//! user already abandoned is recognised and dropped instead of overwriting
//! the screen.
//!
//! ## Pipeline Overview
//!
//! ```text
//! ImageFile
//!  │
//!  ├─ 1. Intake    MIME `image/*`, size ≤ 10 MiB       (no I/O)
//!  ├─ 2. Remote    multipart POST to remove.bg          (at most once)
//!  ├─ 3. Session   Idle → Validating → Uploading → Processing → Succeeded | Failed
//!  ├─ 4. History   last 10 results, most recent first
//!  └─ 5. Output    `{stem}_no_bg.png`
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use edgequake_bgremove::{ImageFile, JobState, RemovalConfig, Session};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // API key from REMOVEBG_API_KEY
//!     let session = Session::with_client(RemovalConfig::from_env())?;
//!     let file = ImageFile::from_path("vacation.jpg").await?;
//!
//!     let mut job = session.select_file(file).await?;
//!     if job.state == JobState::Failed && job.can_retry() {
//!         job = session.retry().await?;
//!     }
//!     if let (Some(result), Some(name)) = (&job.result, job.download_name()) {
//!         std::fs::write(name, &result.bytes)?;
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `bgremove` binary (clap + anyhow + tracing-subscriber + indicatif) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! edgequake-bgremove = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod error;
pub mod history;
pub mod media;
pub mod observer;
pub mod pipeline;
pub mod resources;
pub mod session;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{RemovalConfig, RemovalConfigBuilder, API_KEY_ENV, DEFAULT_ENDPOINT};
pub use error::{BgRemoveError, ErrorDetail, ErrorKind, ProcessingError, Rejection, ResourceError, SessionError};
pub use history::{ProcessedImageRecord, ResultHistory};
pub use media::{ImageData, ImageFile, ImageInfo};
pub use observer::{NoopObserver, Observer, SessionObserver};
pub use pipeline::intake::validate;
pub use pipeline::output::{download_name, save_image};
pub use pipeline::remote::{BackgroundRemover, NoProgress, RemoveBgClient, UploadProgress};
pub use resources::{ResourceId, ResourceRegistry};
pub use session::{HistoryEntry, JobId, JobSnapshot, JobState, Session, SessionState, Ticket, Tool};

//! The processing state machine.
//!
//! ```text
//! Idle ──SelectFile──▶ Validating ──valid──▶ Uploading ──RequestSent──▶ Processing
//!                          │                     │                          │
//!                       invalid                error                   ok / error
//!                          ▼                     ▼                          ▼
//!                       Failed               Failed                Succeeded | Failed
//!
//! Failed ──Retry──▶ Uploading          any ──Reset──▶ Idle
//! ```
//!
//! * [`state`] : `SessionState`, job/tool types and caller-facing snapshots
//! * [`update`]: the reducer; pure state transitions, no I/O
//! * [`driver`]: `Session`, which runs the reducer and performs remote calls

pub mod driver;
pub mod state;
pub mod update;

pub use driver::Session;
pub use state::{HistoryEntry, JobId, JobSnapshot, JobState, SessionState, Ticket, Tool};
pub use update::{update, Effect, Msg, Submission};

//! Pipeline stages for one background-removal job.
//!
//! Each submodule implements exactly one step, so each can be tested
//! without the others and the session only wires them together.
//!
//! ## Data Flow
//!
//! ```text
//! intake ──▶ remote ──▶ (session history) ──▶ output
//! (validate)  (remove.bg)                     (name + save)
//! ```
//!
//! 1. [`intake`]: MIME and size checks; pure, runs before any I/O
//! 2. [`remote`]: the multipart upload; the only stage with network I/O
//! 3. [`output`]: `*_no_bg.png` naming and atomic saving

pub mod intake;
pub mod output;
pub mod remote;

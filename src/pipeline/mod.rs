//! The per-operation conversion pipeline.
//!
//! One generic [`OperationPipeline`] serves every document type; a
//! [`crate::format::FormatAdapter`] supplies the only per-format policy.
//!
//! ## State machine
//!
//! ```text
//! Idle ──▶ Validating ──▶ AcquiringEngine ──▶ Converting ──▶ Finalizing ──▶ Succeeded
//!              │                 │                 │              │
//!              └──────────── Failed / Cancelled ◀──┴──────────────┘
//! ```
//!
//! Cancellation is cooperative. The token is checked immediately before and
//! after each suspension point (engine acquisition, the conversion call).
//! Waiting for the engine can be abandoned early; the conversion call itself
//! cannot be interrupted, only its result discarded.
//!
//! 1. [`input`]     — in-memory input files and host-side resolution
//! 2. [`operation`] — the state machine and its checkpoints

pub mod input;
pub mod operation;

pub use input::{InputFile, OperationInput, OperationOptions};
pub use operation::{OperationPipeline, PipelineState};

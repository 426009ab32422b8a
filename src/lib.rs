//! # officepdf
//!
//! Convert presentations, word-processing documents and rich text to PDF
//! through one shared, lazily started conversion engine.
//!
//! ## Why this crate?
//!
//! The conversion itself belongs to a heavyweight external engine (a headless
//! office suite) that takes seconds to start and must only be started once
//! per process. The hard part is everything around it: many call sites asking
//! for the engine at once, operations the user cancels halfway, a progress
//! bar that spans engine start-up and conversion, and one error vocabulary
//! for all of it. This crate expresses that orchestration once, for every
//! document type.
//!
//! ## Pipeline Overview
//!
//! ```text
//! InputFile
//!  │
//!  ├─ 1. Validate  file count + extension against the FormatAdapter
//!  ├─ 2. Acquire   shared EngineHandle (single-flight initialisation)
//!  ├─ 3. Convert   engine.convert_to_pdf (cannot be interrupted)
//!  ├─ 4. Finalize  derive `<name>.pdf`, collect metadata
//!  └─ 5. Result    Success { blob, suggested_file_name, metadata }
//!                | Error   { code, message, detail }
//! ```
//!
//! Cancellation is checked before and after every step that waits.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use officepdf::{engine, DocumentFormat, InputFile, OperationPipeline, SofficeEngine};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // One engine per process, started on first use.
//!     let handle = engine::shared_with(|| Arc::new(SofficeEngine::default()));
//!
//!     let pipeline = OperationPipeline::for_format(DocumentFormat::WordProcessing, handle);
//!     let file = InputFile::from_path("Report.DOCX").await?;
//!     let done = pipeline.run(file.into(), None).await.into_result()?;
//!
//!     assert_eq!(done.suggested_file_name, "Report.pdf");
//!     std::fs::write(&done.suggested_file_name, &done.blob)?;
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `office2pdf` binary (clap + anyhow + tracing-subscriber + indicatif) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! officepdf = { version = "0.3", default-features = false }
//! ```
//!
//! ## Error codes
//!
//! | Code | Meaning |
//! |------|---------|
//! | `INVALID_OPTIONS` | wrong number of input files |
//! | `FILE_TYPE_INVALID` | extension not accepted by the format |
//! | `PROCESSING_CANCELLED` | the caller cancelled the operation |
//! | `PROCESSING_FAILED` | engine start-up or conversion failed |

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod convert;
pub mod engine;
pub mod error;
pub mod format;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod stream;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{PipelineConfig, PipelineConfigBuilder};
pub use convert::{convert_file, convert_sync, convert_to_file};
pub use engine::soffice::{SofficeConfig, SofficeEngine};
pub use engine::{ConversionEngine, EngineHandle, EngineStatus, InitProgress};
pub use error::{
    ConfigError, ConversionError, ConvertError, EngineInitError, ErrorCode, InputError,
    OperationError, ProcessingError,
};
pub use format::{DocumentFormat, FormatAdapter, PhaseMessages};
pub use output::{ConversionMetadata, ConversionSuccess, OperationResult};
pub use pipeline::{InputFile, OperationInput, OperationOptions, OperationPipeline, PipelineState};
pub use progress::{
    NoopProgressCallback, Phase, PhaseSpan, PhaseWeights, ProgressAggregator, ProgressCallback,
    ProgressEvent,
};
pub use stream::{run_stream, EventStream, PipelineEvent};
pub use tokio_util::sync::CancellationToken;

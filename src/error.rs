//! Error types for the officepdf library.
//!
//! Three layers reflect three audiences:
//!
//! * [`EngineInitError`] / [`ConversionError`] — raised by a
//!   [`crate::engine::ConversionEngine`] implementation. Initialisation errors
//!   are `Clone` because every caller waiting on the same initialisation
//!   receives the same failure.
//!
//! * [`ProcessingError`] — the pipeline's internal taxonomy. Each variant maps
//!   to exactly one wire [`ErrorCode`].
//!
//! * [`OperationError`] — what callers actually see inside
//!   [`crate::output::OperationResult::Error`]: a stable code, a
//!   human-readable message and the raw diagnostic detail.
//!
//! [`InputError`] and [`ConfigError`] cover host-side concerns (reading files,
//! building configuration) that happen before a pipeline runs.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

// ── Engine errors ────────────────────────────────────────────────────────────

/// The shared conversion engine failed to initialise.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Conversion engine failed to initialise: {message}")]
pub struct EngineInitError {
    pub message: String,
}

impl EngineInitError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// The engine was ready but could not convert one particular input.
#[derive(Debug, Error)]
pub enum ConversionError {
    /// `convert_to_pdf` was called before `initialize` succeeded.
    #[error("Conversion engine is not initialised")]
    NotInitialized,

    /// The engine process could not be started.
    #[error("Failed to launch conversion engine: {0}")]
    Launch(#[source] std::io::Error),

    /// The engine ran but reported failure.
    #[error("Conversion engine exited with {status}: {stderr}")]
    EngineExit { status: String, stderr: String },

    /// The engine claimed success but produced no output document.
    #[error("Conversion engine produced no output for '{file_name}'")]
    MissingOutput { file_name: String },

    /// Scratch-file I/O around the engine call failed.
    #[error("I/O error during conversion: {0}")]
    Io(#[from] std::io::Error),

    /// Engine-specific failure described by the engine itself.
    #[error("{0}")]
    Engine(String),
}

// ── Pipeline taxonomy ────────────────────────────────────────────────────────

/// Every way a single pipeline operation can end without a document.
#[derive(Debug, Error)]
pub enum ProcessingError {
    /// Wrong number of input files.
    #[error("Expected {expected} input file(s), got {actual}")]
    InvalidInput { expected: usize, actual: usize },

    /// File extension not accepted by the active format.
    #[error("Unsupported file type '{file_name}'. Accepted extensions: {}", .accepted.join(", "))]
    UnsupportedFormat {
        file_name: String,
        accepted: Vec<String>,
    },

    /// The shared engine could not be started.
    #[error("The conversion engine could not be started")]
    EngineInit(#[from] EngineInitError),

    /// The engine failed on this specific input.
    #[error("Conversion of '{file_name}' failed")]
    Conversion {
        file_name: String,
        #[source]
        source: ConversionError,
    },

    /// The caller cancelled the operation.
    #[error("Processing was cancelled")]
    Cancelled,

    /// `run` was called on a pipeline that already executed an operation.
    #[error("Pipeline already executed an operation; call reset() before reusing it")]
    AlreadyStarted,
}

impl ProcessingError {
    /// The stable wire code for this error.
    pub fn code(&self) -> ErrorCode {
        match self {
            ProcessingError::InvalidInput { .. } => ErrorCode::InvalidOptions,
            ProcessingError::UnsupportedFormat { .. } => ErrorCode::FileTypeInvalid,
            ProcessingError::Cancelled => ErrorCode::ProcessingCancelled,
            ProcessingError::EngineInit(_)
            | ProcessingError::Conversion { .. }
            | ProcessingError::AlreadyStarted => ErrorCode::ProcessingFailed,
        }
    }

    /// Raw diagnostic detail, when there is an underlying cause.
    pub fn detail(&self) -> Option<String> {
        match self {
            ProcessingError::EngineInit(e) => Some(e.message.clone()),
            ProcessingError::Conversion { source, .. } => Some(source.to_string()),
            _ => None,
        }
    }
}

// ── Caller-facing error ──────────────────────────────────────────────────────

/// Stable error codes surfaced to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    /// Wrong file count.
    InvalidOptions,
    /// Unrecognised extension.
    FileTypeInvalid,
    /// Voluntarily aborted by the caller; never retried automatically.
    ProcessingCancelled,
    /// Engine initialisation or conversion failure.
    ProcessingFailed,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::InvalidOptions => "INVALID_OPTIONS",
            ErrorCode::FileTypeInvalid => "FILE_TYPE_INVALID",
            ErrorCode::ProcessingCancelled => "PROCESSING_CANCELLED",
            ErrorCode::ProcessingFailed => "PROCESSING_FAILED",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The `Error` arm of an operation result.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("{code}: {message}")]
pub struct OperationError {
    pub code: ErrorCode,
    pub message: String,
    pub detail: Option<String>,
}

impl From<ProcessingError> for OperationError {
    fn from(err: ProcessingError) -> Self {
        Self {
            code: err.code(),
            message: err.to_string(),
            detail: err.detail(),
        }
    }
}

// ── Host-side errors ─────────────────────────────────────────────────────────

/// Failures while acquiring input bytes from the host environment.
#[derive(Debug, Error)]
pub enum InputError {
    /// Input file was not found at the given path.
    #[error("Input file not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// Reading the file failed for another reason.
    #[error("Failed to read '{path}': {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// HTTP URL was syntactically valid but download failed.
    #[error("Failed to download '{url}': {reason}\nCheck your internet connection.")]
    DownloadFailed { url: String, reason: String },

    /// Download exceeded the configured timeout.
    #[error("Download timed out after {secs}s for '{url}'\nIncrease --download-timeout.")]
    DownloadTimeout { url: String, secs: u64 },

    /// No format accepts this file's extension.
    #[error("Cannot infer document format for '{file_name}'\nPass --format explicitly.")]
    UnknownFormat { file_name: String },

    /// Could not write the converted document.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Failure of a convenience entry point: either the input could not be
/// acquired or the operation itself returned an error.
#[derive(Debug, Error)]
pub enum ConvertError {
    #[error(transparent)]
    Input(#[from] InputError),

    #[error(transparent)]
    Operation(#[from] OperationError),

    /// Could not create a runtime for the synchronous wrapper.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Builder validation failed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Invalid configuration: {0}")]
pub struct ConfigError(pub String);

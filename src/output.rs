//! Result types returned by a pipeline operation.

use crate::error::{ErrorCode, OperationError};
use serde::{Deserialize, Serialize};

/// Describes a produced document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversionMetadata {
    /// Always `"pdf"`.
    pub format: String,
    /// Id of the [`crate::format::FormatAdapter`] that accepted the input.
    pub source_format: String,
    pub source_file_name: String,
    pub input_bytes: usize,
    pub output_bytes: usize,
    pub duration_ms: u64,
}

/// The `Success` arm of an operation result.
#[derive(Clone, PartialEq, Eq)]
pub struct ConversionSuccess {
    pub blob: Vec<u8>,
    pub suggested_file_name: String,
    pub metadata: ConversionMetadata,
}

impl std::fmt::Debug for ConversionSuccess {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConversionSuccess")
            .field("blob", &format_args!("<{} bytes>", self.blob.len()))
            .field("suggested_file_name", &self.suggested_file_name)
            .field("metadata", &self.metadata)
            .finish()
    }
}

/// Outcome of one `run`: a document or a typed error, never both.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OperationResult {
    Success(ConversionSuccess),
    Error(OperationError),
}

impl OperationResult {
    pub fn is_success(&self) -> bool {
        matches!(self, OperationResult::Success(_))
    }

    /// The error code, if this is an error.
    pub fn error_code(&self) -> Option<ErrorCode> {
        match self {
            OperationResult::Success(_) => None,
            OperationResult::Error(e) => Some(e.code),
        }
    }

    /// Convert into a `Result` for `?`-style callers.
    pub fn into_result(self) -> Result<ConversionSuccess, OperationError> {
        match self {
            OperationResult::Success(s) => Ok(s),
            OperationResult::Error(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_success() -> ConversionSuccess {
        ConversionSuccess {
            blob: b"%PDF-1.7".to_vec(),
            suggested_file_name: "deck.pdf".into(),
            metadata: ConversionMetadata {
                format: "pdf".into(),
                source_format: "presentation".into(),
                source_file_name: "deck.pptx".into(),
                input_bytes: 10,
                output_bytes: 8,
                duration_ms: 3,
            },
        }
    }

    #[test]
    fn into_result_success() {
        let out = OperationResult::Success(sample_success());
        assert!(out.is_success());
        assert_eq!(out.error_code(), None);
        assert_eq!(out.into_result().unwrap().suggested_file_name, "deck.pdf");
    }

    #[test]
    fn into_result_error() {
        let out = OperationResult::Error(OperationError {
            code: ErrorCode::ProcessingCancelled,
            message: "Processing was cancelled".into(),
            detail: None,
        });
        assert_eq!(out.error_code(), Some(ErrorCode::ProcessingCancelled));
        assert!(out.into_result().is_err());
    }

    #[test]
    fn success_debug_omits_blob_contents() {
        let dbg = format!("{:?}", sample_success());
        assert!(dbg.contains("<8 bytes>"), "got: {dbg}");
    }
}

//! Convenience entry points for the common "file in, PDF out" case.
//!
//! These wrap input resolution, format detection and a fresh
//! [`OperationPipeline`] around a shared [`EngineHandle`]. Use the pipeline
//! directly when you need cancellation or in-memory inputs.

use crate::engine::EngineHandle;
use crate::error::{ConvertError, InputError};
use crate::format::DocumentFormat;
use crate::output::ConversionSuccess;
use crate::pipeline::input::{self, InputFile};
use crate::pipeline::OperationPipeline;
use crate::progress::ProgressCallback;
use std::path::{Path, PathBuf};
use tracing::info;

/// Download timeout used when `input` is a URL.
pub const DEFAULT_DOWNLOAD_TIMEOUT_SECS: u64 = 120;

/// Convert a local file or URL to PDF in memory.
///
/// `format` overrides extension-based detection.
pub async fn convert_file(
    engine: &EngineHandle,
    input: impl AsRef<str>,
    format: Option<DocumentFormat>,
    progress: Option<&dyn ProgressCallback>,
) -> Result<ConversionSuccess, ConvertError> {
    let file = input::resolve_input(input.as_ref(), DEFAULT_DOWNLOAD_TIMEOUT_SECS).await?;
    let format = resolve_format(&file, format)?;
    let pipeline = OperationPipeline::for_format(format, engine.clone());
    Ok(pipeline.run(file.into(), progress).await.into_result()?)
}

/// Convert and write `<output_dir>/<suggested name>`, returning its path.
///
/// Uses atomic write (temp file + rename) to prevent partial files.
pub async fn convert_to_file(
    engine: &EngineHandle,
    input: impl AsRef<str>,
    output_dir: impl AsRef<Path>,
    format: Option<DocumentFormat>,
    progress: Option<&dyn ProgressCallback>,
) -> Result<PathBuf, ConvertError> {
    let done = convert_file(engine, input, format, progress).await?;
    let path = output_dir.as_ref().join(&done.suggested_file_name);
    write_atomic(&path, &done.blob).await?;
    info!("Wrote {} ({} bytes)", path.display(), done.blob.len());
    Ok(path)
}

/// Synchronous wrapper around [`convert_file`].
///
/// Creates a temporary tokio runtime internally; do not call from async code.
pub fn convert_sync(
    engine: &EngineHandle,
    input: impl AsRef<str>,
    format: Option<DocumentFormat>,
) -> Result<ConversionSuccess, ConvertError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| ConvertError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(convert_file(engine, input, format, None))
}

/// Explicit format, else detection from the file name.
pub fn resolve_format(
    file: &InputFile,
    format: Option<DocumentFormat>,
) -> Result<DocumentFormat, InputError> {
    format
        .or_else(|| DocumentFormat::detect(&file.name))
        .ok_or_else(|| InputError::UnknownFormat {
            file_name: file.name.clone(),
        })
}

/// Write `bytes` to `path` through a sibling temp file and a rename, so a
/// reader never observes a partially written document.
pub async fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), InputError> {
    let failed = |source| InputError::OutputWriteFailed {
        path: path.to_path_buf(),
        source,
    };

    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await.map_err(failed)?;
    }

    let tmp_path = path.with_extension("pdf.tmp");
    tokio::fs::write(&tmp_path, bytes).await.map_err(failed)?;
    tokio::fs::rename(&tmp_path, path).await.map_err(failed)?;
    Ok(())
}

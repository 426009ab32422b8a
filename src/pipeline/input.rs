//! Operation inputs and host-side input resolution.
//!
//! A pipeline operation works on in-memory [`InputFile`]s so that callers can
//! feed bytes from anywhere (an upload, a database, a download). For the
//! common cases [`resolve_input`] turns a local path or an HTTP(S) URL into
//! an `InputFile`.

use crate::error::InputError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

/// One document to convert.
#[derive(Clone, PartialEq, Eq)]
pub struct InputFile {
    /// File name including extension, e.g. `Quarterly.pptx`.
    pub name: String,
    pub data: Vec<u8>,
}

impl std::fmt::Debug for InputFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InputFile")
            .field("name", &self.name)
            .field("bytes", &self.data.len())
            .finish()
    }
}

impl InputFile {
    pub fn new(name: impl Into<String>, data: impl Into<Vec<u8>>) -> Self {
        Self {
            name: name.into(),
            data: data.into(),
        }
    }

    /// Read a local file; the name is the path's final component.
    pub async fn from_path(path: impl AsRef<Path>) -> Result<Self, InputError> {
        let path = path.as_ref();
        let data = tokio::fs::read(path).await.map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => InputError::FileNotFound {
                path: path.to_path_buf(),
            },
            std::io::ErrorKind::PermissionDenied => InputError::PermissionDenied {
                path: path.to_path_buf(),
            },
            _ => InputError::Read {
                path: path.to_path_buf(),
                source: e,
            },
        })?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.to_string_lossy().into_owned());
        debug!("Read {} ({} bytes)", path.display(), data.len());
        Ok(Self { name, data })
    }
}

/// Per-operation options. Currently empty; reserved for extension.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationOptions {}

/// Everything one `run` call consumes.
#[derive(Debug, Clone, Default)]
pub struct OperationInput {
    pub files: Vec<InputFile>,
    pub options: OperationOptions,
}

impl OperationInput {
    pub fn single(file: InputFile) -> Self {
        Self {
            files: vec![file],
            options: OperationOptions::default(),
        }
    }
}

impl From<InputFile> for OperationInput {
    fn from(file: InputFile) -> Self {
        Self::single(file)
    }
}

impl From<Vec<InputFile>> for OperationInput {
    fn from(files: Vec<InputFile>) -> Self {
        Self {
            files,
            options: OperationOptions::default(),
        }
    }
}

// ── Host-side resolution ─────────────────────────────────────────────────────

/// Check if the input string looks like a URL.
pub fn is_url(input: &str) -> bool {
    input.starts_with("http://") || input.starts_with("https://")
}

/// Resolve a local path or HTTP(S) URL into an [`InputFile`].
pub async fn resolve_input(input: &str, timeout_secs: u64) -> Result<InputFile, InputError> {
    if is_url(input) {
        download_url(input, timeout_secs).await
    } else {
        InputFile::from_path(PathBuf::from(input)).await
    }
}

/// Download a URL into memory.
async fn download_url(url: &str, timeout_secs: u64) -> Result<InputFile, InputError> {
    info!("Downloading document from: {}", url);

    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| InputError::DownloadFailed {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

    let response = client.get(url).send().await.map_err(|e| {
        if e.is_timeout() {
            InputError::DownloadTimeout {
                url: url.to_string(),
                secs: timeout_secs,
            }
        } else {
            InputError::DownloadFailed {
                url: url.to_string(),
                reason: e.to_string(),
            }
        }
    })?;

    if !response.status().is_success() {
        return Err(InputError::DownloadFailed {
            url: url.to_string(),
            reason: format!("HTTP {}", response.status()),
        });
    }

    let name = extract_filename(url);
    let bytes = response
        .bytes()
        .await
        .map_err(|e| InputError::DownloadFailed {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

    info!("Downloaded {} ({} bytes)", name, bytes.len());
    Ok(InputFile::new(name, bytes.to_vec()))
}

/// The last URL path segment when it looks like a file name.
fn extract_filename(url: &str) -> String {
    if let Ok(parsed) = reqwest::Url::parse(url) {
        if let Some(mut segments) = parsed.path_segments() {
            if let Some(last) = segments.next_back() {
                if !last.is_empty() && last.contains('.') {
                    return last.to_string();
                }
            }
        }
    }

    "downloaded".to_string()
}

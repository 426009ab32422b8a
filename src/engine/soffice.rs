//! A [`ConversionEngine`] backed by a headless LibreOffice installation.
//!
//! ## Why one conversion at a time?
//!
//! LibreOffice locks its user profile: two `soffice` processes sharing a
//! profile either fail or silently hand work to each other. The engine owns
//! a private profile and serialises conversions behind an async mutex, so
//! concurrent pipelines queue up instead of corrupting each other.
//!
//! ## Why spawn_blocking for initialisation?
//!
//! Locating the binary and probing `soffice --version` are plain blocking
//! file-system and process calls (see [`soffice_auto`]). They run on Tokio's
//! blocking pool so worker threads keep serving other operations while the
//! engine warms up.

use super::{ConversionEngine, InitProgress};
use crate::error::{ConversionError, EngineInitError};
use crate::pipeline::input::InputFile;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::OnceLock;
use tokio::process::Command;
use tracing::{debug, info};

/// Settings for [`SofficeEngine`].
#[derive(Debug, Clone, Default)]
pub struct SofficeConfig {
    /// Explicit `soffice` binary. If None, `SOFFICE_PATH`, `PATH` and default
    /// install locations are searched.
    pub binary: Option<PathBuf>,

    /// Private user-profile directory. If None, uses
    /// [`soffice_auto::soffice_profile_dir`].
    pub profile_dir: Option<PathBuf>,

    /// Extra arguments inserted before the input path.
    pub extra_args: Vec<String>,
}

impl SofficeConfig {
    pub fn binary(mut self, path: impl Into<PathBuf>) -> Self {
        self.binary = Some(path.into());
        self
    }

    pub fn profile_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.profile_dir = Some(dir.into());
        self
    }

    pub fn extra_arg(mut self, arg: impl Into<String>) -> Self {
        self.extra_args.push(arg.into());
        self
    }
}

/// What initialisation resolved.
#[derive(Debug)]
struct SofficeRuntime {
    binary: PathBuf,
    profile_url: String,
    version: String,
}

/// Converts documents by shelling out to `soffice --headless --convert-to pdf`.
#[derive(Debug, Default)]
pub struct SofficeEngine {
    config: SofficeConfig,
    runtime: OnceLock<SofficeRuntime>,
    convert_lock: tokio::sync::Mutex<()>,
}

impl SofficeEngine {
    pub fn new(config: SofficeConfig) -> Self {
        Self {
            config,
            runtime: OnceLock::new(),
            convert_lock: tokio::sync::Mutex::new(()),
        }
    }

    /// LibreOffice's version banner, once initialised.
    pub fn version(&self) -> Option<&str> {
        self.runtime.get().map(|r| r.version.as_str())
    }
}

#[async_trait]
impl ConversionEngine for SofficeEngine {
    fn is_ready(&self) -> bool {
        self.runtime.get().is_some()
    }

    async fn initialize(&self, progress: &InitProgress) -> Result<(), EngineInitError> {
        if self.is_ready() {
            return Ok(());
        }

        progress.report(5, "Locating LibreOffice…");
        let explicit = self.config.binary.clone();
        let binary = blocking(move || soffice_auto::locate_soffice_from(explicit.as_deref())).await?;
        debug!("Using soffice at {}", binary.display());

        progress.report(25, "Preparing LibreOffice profile…");
        let profile_dir = self
            .config
            .profile_dir
            .clone()
            .unwrap_or_else(soffice_auto::soffice_profile_dir);
        let profile_dir = blocking(move || soffice_auto::ensure_profile_dir(&profile_dir)).await?;

        progress.report(45, "Starting LibreOffice…");
        let probe_path = binary.clone();
        let version = blocking(move || soffice_auto::probe_version(&probe_path)).await?;

        info!("LibreOffice ready: {}", version);
        progress.report(100, format!("{version} ready"));

        let _ = self.runtime.set(SofficeRuntime {
            binary,
            profile_url: soffice_auto::profile_url(&profile_dir),
            version,
        });
        Ok(())
    }

    async fn convert_to_pdf(&self, file: &InputFile) -> Result<Vec<u8>, ConversionError> {
        let runtime = self.runtime.get().ok_or(ConversionError::NotInitialized)?;
        let _turn = self.convert_lock.lock().await;

        let scratch = tempfile::tempdir()?;
        let input_path = scratch.path().join(scratch_name(&file.name));
        let out_dir = scratch.path().join("out");
        tokio::fs::write(&input_path, &file.data).await?;
        tokio::fs::create_dir_all(&out_dir).await?;

        debug!("soffice --convert-to pdf {}", input_path.display());
        let output = Command::new(&runtime.binary)
            .arg(format!("-env:UserInstallation={}", runtime.profile_url))
            .args([
                "--headless",
                "--invisible",
                "--nodefault",
                "--nolockcheck",
                "--norestore",
                "--convert-to",
                "pdf",
                "--outdir",
            ])
            .arg(&out_dir)
            .args(&self.config.extra_args)
            .arg(&input_path)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(ConversionError::Launch)?;

        if !output.status.success() {
            return Err(ConversionError::EngineExit {
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        match find_pdf(&out_dir).await? {
            Some(pdf) => Ok(tokio::fs::read(pdf).await?),
            None => Err(ConversionError::MissingOutput {
                file_name: file.name.clone(),
            }),
        }
    }
}

/// Run a blocking soffice-auto call on the blocking pool.
async fn blocking<T, F>(f: F) -> Result<T, EngineInitError>
where
    F: FnOnce() -> Result<T, soffice_auto::SofficeAutoError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| EngineInitError::new(format!("initialisation task failed: {e}")))?
        .map_err(|e| EngineInitError::new(e.to_string()))
}

/// A safe scratch-file name: final path component only, extension kept
/// because LibreOffice picks its import filter from it.
fn scratch_name(name: &str) -> String {
    Path::new(name)
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .filter(|n| !n.is_empty())
        .unwrap_or_else(|| "input".to_string())
}

async fn find_pdf(dir: &Path) -> Result<Option<PathBuf>, ConversionError> {
    let mut entries = tokio::fs::read_dir(dir).await?;
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        let is_pdf = path
            .extension()
            .map(|e| e.eq_ignore_ascii_case("pdf"))
            .unwrap_or(false);
        if is_pdf {
            return Ok(Some(path));
        }
    }
    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scratch_name_strips_directories() {
        assert_eq!(scratch_name("../../etc/deck.pptx"), "deck.pptx");
        assert_eq!(scratch_name("Report.DOCX"), "Report.DOCX");
        assert_eq!(scratch_name(""), "input");
    }

    #[test]
    fn new_engine_is_not_ready() {
        let engine = SofficeEngine::default();
        assert!(!engine.is_ready());
        assert!(engine.version().is_none());
    }

    #[tokio::test]
    async fn convert_before_initialise_fails() {
        let engine = SofficeEngine::default();
        let err = engine
            .convert_to_pdf(&InputFile::new("a.docx", b"x".to_vec()))
            .await
            .unwrap_err();
        assert!(matches!(err, ConversionError::NotInitialized));
    }

    #[tokio::test]
    async fn missing_binary_fails_initialisation() {
        let engine = SofficeEngine::new(SofficeConfig::default().binary("/definitely/not/soffice"));
        let err = engine
            .initialize(&InitProgress::detached())
            .await
            .unwrap_err();
        assert!(err.message.contains("not found"), "got: {}", err.message);
        assert!(!engine.is_ready());
    }

    #[tokio::test]
    async fn find_pdf_ignores_other_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("log.txt"), b"").unwrap();
        assert!(find_pdf(dir.path()).await.unwrap().is_none());
        std::fs::write(dir.path().join("deck.PDF"), b"%PDF").unwrap();
        assert!(find_pdf(dir.path()).await.unwrap().is_some());
    }
}

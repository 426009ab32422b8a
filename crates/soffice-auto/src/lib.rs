//! # soffice-auto
//!
//! Locate and prepare a [LibreOffice](https://www.libreoffice.org/)
//! installation for headless document conversion, so that callers no longer
//! need to hard-code the `soffice` path for every platform.
//!
//! ## How it works
//!
//! On first call to [`locate_soffice`]:
//!
//! 1. Honours `SOFFICE_PATH` when it points to an existing file.
//! 2. Otherwise walks every directory in `PATH` looking for `soffice` or
//!    `libreoffice`.
//! 3. Falls back to the platform's default install locations
//!    (e.g. `/Applications/LibreOffice.app/Contents/MacOS/soffice`).
//!
//! The resolved path is cached for the rest of the process; subsequent calls
//! never touch the file system.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use soffice_auto::{ensure_profile_dir, locate_soffice, probe_version, soffice_profile_dir};
//!
//! let soffice = locate_soffice().expect("LibreOffice not installed");
//! let version = probe_version(&soffice).expect("soffice --version failed");
//! let profile = ensure_profile_dir(&soffice_profile_dir()).expect("profile dir");
//! println!("{version} at {} (profile {})", soffice.display(), profile.display());
//! ```
//!
//! ## Environment variable overrides
//!
//! - `SOFFICE_PATH` — path to an existing `soffice` binary; skips the search.
//! - `OFFICE2PDF_PROFILE_DIR` — override the private user-profile directory.

use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::OnceLock;

use thiserror::Error;

// ── Public constants ─────────────────────────────────────────────────────────

/// Environment variable naming an explicit `soffice` binary.
pub const SOFFICE_PATH_ENV: &str = "SOFFICE_PATH";

/// Environment variable overriding the user-profile directory.
pub const PROFILE_DIR_ENV: &str = "OFFICE2PDF_PROFILE_DIR";

#[cfg(windows)]
const BINARY_NAMES: &[&str] = &["soffice.exe", "soffice.com"];
#[cfg(not(windows))]
const BINARY_NAMES: &[&str] = &["soffice", "libreoffice"];

// ── Error type ───────────────────────────────────────────────────────────────

/// Errors returned by soffice-auto operations.
#[derive(Error, Debug)]
pub enum SofficeAutoError {
    /// No LibreOffice binary could be found.
    #[error(
        "LibreOffice (soffice) not found. Searched {} location(s).\n\
Install LibreOffice or set SOFFICE_PATH=/path/to/soffice.",
        .searched.len()
    )]
    NotFound { searched: Vec<PathBuf> },

    /// Could not create the user-profile directory.
    #[error("Profile directory error for '{path}': {source}")]
    ProfileDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// `soffice --version` could not be run or exited with an error.
    #[error("Failed to probe LibreOffice at '{path}': {reason}")]
    Probe { path: PathBuf, reason: String },
}

// ── Directory resolution ─────────────────────────────────────────────────────

/// Returns the private LibreOffice user-profile directory.
///
/// Default locations:
/// - **macOS**: `~/Library/Caches/office2pdf/lo-profile/`
/// - **Linux**: `~/.cache/office2pdf/lo-profile/`
/// - **Windows**: `%LOCALAPPDATA%\office2pdf\lo-profile\`
///
/// Override by setting `OFFICE2PDF_PROFILE_DIR`.
pub fn soffice_profile_dir() -> PathBuf {
    if let Ok(override_dir) = std::env::var(PROFILE_DIR_ENV) {
        if !override_dir.is_empty() {
            return PathBuf::from(override_dir);
        }
    }

    let base = dirs::cache_dir()
        .or_else(|| dirs::home_dir().map(|h| h.join(".cache")))
        .unwrap_or_else(std::env::temp_dir);

    base.join("office2pdf").join("lo-profile")
}

/// Creates `dir` (and parents) if needed and returns it.
pub fn ensure_profile_dir(dir: &Path) -> Result<PathBuf, SofficeAutoError> {
    std::fs::create_dir_all(dir).map_err(|source| SofficeAutoError::ProfileDir {
        path: dir.to_path_buf(),
        source,
    })?;
    Ok(dir.to_path_buf())
}

/// Formats `dir` as the `file://` URL LibreOffice expects in
/// `-env:UserInstallation=`.
///
/// Windows UNC shares (`\\server\share\dir`) become `file://server/share/dir`;
/// verbatim prefixes (`\\?\C:\…`, `\\?\UNC\…`) are stripped first.
pub fn profile_url(dir: &Path) -> String {
    let original = dir.to_string_lossy();
    let raw = original.replace('\\', "/");

    let (mut url, path) = if original.starts_with("\\\\") {
        if let Some(share) = raw.strip_prefix("//?/UNC/") {
            (String::from("file://"), share)
        } else if let Some(local) = raw.strip_prefix("//?/") {
            (String::from("file:///"), local)
        } else {
            (String::from("file://"), &raw[2..])
        }
    } else if raw.starts_with('/') {
        (String::from("file://"), raw.as_str())
    } else {
        (String::from("file:///"), raw.as_str())
    };

    for byte in path.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'/' | b':' | b'-' | b'_' | b'.' | b'~' => {
                url.push(byte as char)
            }
            other => url.push_str(&format!("%{other:02X}")),
        }
    }
    url
}

// ── Thread-safe singleton path cache ─────────────────────────────────────────

static RESOLVED_PATH: OnceLock<PathBuf> = OnceLock::new();

// ── Public API ───────────────────────────────────────────────────────────────

/// Returns `true` if a LibreOffice binary can be found without error.
pub fn is_soffice_available() -> bool {
    locate_soffice().is_ok()
}

/// Locates the `soffice` binary, caching the result for the process lifetime.
///
/// # Thread safety
///
/// Safe to call from multiple threads simultaneously; concurrent first calls
/// may both search, but they resolve the same path.
pub fn locate_soffice() -> Result<PathBuf, SofficeAutoError> {
    if let Some(path) = RESOLVED_PATH.get() {
        return Ok(path.clone());
    }

    let path = resolve(std::env::var_os("PATH").as_deref())?;
    let _ = RESOLVED_PATH.set(path.clone());
    Ok(path)
}

/// Like [`locate_soffice`] but prefers `explicit` when it exists.
///
/// An explicit path that does not exist is reported as [`SofficeAutoError::NotFound`]
/// instead of silently falling back to a different installation.
pub fn locate_soffice_from(explicit: Option<&Path>) -> Result<PathBuf, SofficeAutoError> {
    match explicit {
        Some(path) if path.is_file() => Ok(path.to_path_buf()),
        Some(path) => Err(SofficeAutoError::NotFound {
            searched: vec![path.to_path_buf()],
        }),
        None => locate_soffice(),
    }
}

/// Runs `soffice --version` and returns its trimmed first line.
///
/// Blocking: call from `spawn_blocking` in async contexts.
pub fn probe_version(path: &Path) -> Result<String, SofficeAutoError> {
    let output = Command::new(path)
        .arg("--headless")
        .arg("--version")
        .output()
        .map_err(|e| SofficeAutoError::Probe {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

    if !output.status.success() {
        return Err(SofficeAutoError::Probe {
            path: path.to_path_buf(),
            reason: format!(
                "exited with {}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            ),
        });
    }

    let stdout = String::from_utf8_lossy(&output.stdout);
    Ok(stdout.lines().next().unwrap_or_default().trim().to_string())
}

// ── Internal helpers ─────────────────────────────────────────────────────────

fn resolve(path_var: Option<&std::ffi::OsStr>) -> Result<PathBuf, SofficeAutoError> {
    let mut searched = Vec::new();

    // 1. Environment variable override.
    if let Ok(env_path) = std::env::var(SOFFICE_PATH_ENV) {
        let p = PathBuf::from(env_path);
        if p.is_file() {
            return Ok(p);
        }
        searched.push(p);
    }

    // 2. PATH lookup.
    let mut candidates: Vec<PathBuf> = path_var
        .map(|paths| {
            std::env::split_paths(paths)
                .flat_map(|dir| BINARY_NAMES.iter().map(move |name| dir.join(name)))
                .collect()
        })
        .unwrap_or_default();

    // 3. Default install locations.
    candidates.extend(default_locations());

    for candidate in candidates {
        if candidate.is_file() {
            return Ok(candidate);
        }
        searched.push(candidate);
    }

    Err(SofficeAutoError::NotFound { searched })
}

fn default_locations() -> Vec<PathBuf> {
    match std::env::consts::OS {
        "macos" => vec![PathBuf::from(
            "/Applications/LibreOffice.app/Contents/MacOS/soffice",
        )],
        "windows" => ["ProgramFiles", "ProgramFiles(x86)"]
            .iter()
            .filter_map(|var| std::env::var_os(var))
            .map(|base| {
                PathBuf::from(base)
                    .join("LibreOffice")
                    .join("program")
                    .join("soffice.exe")
            })
            .collect(),
        _ => vec![
            PathBuf::from("/usr/lib/libreoffice/program/soffice"),
            PathBuf::from("/opt/libreoffice/program/soffice"),
            PathBuf::from("/snap/bin/libreoffice"),
        ],
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn profile_dir_is_deterministic() {
        let d1 = soffice_profile_dir();
        let d2 = soffice_profile_dir();
        assert_eq!(d1, d2);
    }

    #[test]
    fn profile_url_escapes_spaces() {
        let url = profile_url(Path::new("/tmp/my profile"));
        assert_eq!(url, "file:///tmp/my%20profile");
    }

    #[test]
    fn profile_url_unc_share() {
        let url = profile_url(Path::new("\\\\fileserver\\office\\lo profile"));
        assert_eq!(url, "file://fileserver/office/lo%20profile");
    }

    #[test]
    fn profile_url_verbatim_prefixes() {
        assert_eq!(
            profile_url(Path::new("\\\\?\\C:\\Users\\me\\lo")),
            "file:///C:/Users/me/lo"
        );
        assert_eq!(
            profile_url(Path::new("\\\\?\\UNC\\fileserver\\office")),
            "file://fileserver/office"
        );
    }

    #[test]
    fn profile_url_windows_style_path() {
        let url = profile_url(Path::new("C:\\Users\\me\\lo"));
        assert_eq!(url, "file:///C:/Users/me/lo");
    }

    #[test]
    fn ensure_profile_dir_creates_nested() {
        let tmp = tempfile::tempdir().unwrap();
        let nested = tmp.path().join("a").join("b");
        let created = ensure_profile_dir(&nested).unwrap();
        assert!(created.is_dir());
    }

    #[test]
    fn missing_explicit_path_is_not_found() {
        let err = locate_soffice_from(Some(Path::new("/definitely/not/soffice"))).unwrap_err();
        assert!(matches!(err, SofficeAutoError::NotFound { ref searched } if searched.len() == 1));
    }

    #[test]
    fn path_lookup_finds_binary() {
        let tmp = tempfile::tempdir().unwrap();
        let bin = tmp.path().join(BINARY_NAMES[0]);
        std::fs::write(&bin, b"").unwrap();
        let found = resolve(Some(tmp.path().as_os_str())).unwrap();
        // SOFFICE_PATH may be set on developer machines; only check the PATH hit otherwise.
        if std::env::var(SOFFICE_PATH_ENV).is_err() {
            assert_eq!(found, bin);
        }
    }
}

//! Local PDF → ODP conversion through LibreOffice.
//!
//! LibreOffice's Impress PDF import turns each page into a slide of
//! positioned text boxes and images; the result is written as
//! `<outdir>/<stem>.odp`.
//!
//! # System requirement
//!
//! LibreOffice must be installed:
//! - **macOS**: `brew install --cask libreoffice`
//! - **Linux**: `apt install libreoffice-impress`
//! - **Windows**: `winget install TheDocumentFoundation.LibreOffice`

use super::DocumentConverter;
use crate::error::Pdf2SlidesError;
use async_trait::async_trait;
use std::collections::HashSet;
use std::env;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;
use tokio::time::{timeout, Duration};
use tracing::{debug, info};

fn install_hint() -> String {
    "Install LibreOffice (macOS: 'brew install --cask libreoffice', \
Linux: 'apt install libreoffice-impress', \
Windows: 'winget install TheDocumentFoundation.LibreOffice') \
or point --soffice / PDF2GSLIDES_SOFFICE at the soffice executable."
        .to_string()
}

fn soffice_candidates() -> Vec<PathBuf> {
    let mut seen = HashSet::new();
    let mut candidates = Vec::new();
    let mut push = |path: PathBuf| {
        if seen.insert(path.clone()) {
            candidates.push(path);
        }
    };

    for var in ["PDF2GSLIDES_SOFFICE", "SOFFICE_PATH"] {
        if let Some(value) = env::var_os(var).filter(|v| !v.is_empty()) {
            push(PathBuf::from(value));
        }
    }

    if cfg!(target_os = "macos") {
        push(PathBuf::from("/Applications/LibreOffice.app/Contents/MacOS/soffice"));
    }
    if cfg!(target_os = "windows") {
        push(PathBuf::from("C:\\Program Files\\LibreOffice\\program\\soffice.exe"));
        push(PathBuf::from("C:\\Program Files\\LibreOffice\\program\\soffice.com"));
    }

    if let Some(path_env) = env::var_os("PATH") {
        for dir in env::split_paths(&path_env) {
            push(dir.join("soffice"));
            push(dir.join("libreoffice"));
            push(dir.join("soffice.exe"));
        }
    }

    candidates
}

/// Find an `soffice` executable.
pub fn locate_soffice() -> Result<PathBuf, Pdf2SlidesError> {
    soffice_candidates()
        .into_iter()
        .find(|c| c.is_file())
        .ok_or_else(|| Pdf2SlidesError::ConverterNotFound {
            hint: install_hint(),
        })
}

/// Headless LibreOffice converter.
#[derive(Debug, Clone)]
pub struct SofficeConverter {
    binary: PathBuf,
    timeout_secs: u64,
}

impl SofficeConverter {
    pub fn new(binary: impl Into<PathBuf>, timeout_secs: u64) -> Self {
        Self {
            binary: binary.into(),
            timeout_secs,
        }
    }

    /// Use `explicit` if given, otherwise search for `soffice`.
    pub fn discover(explicit: Option<&Path>, timeout_secs: u64) -> Result<Self, Pdf2SlidesError> {
        let binary = match explicit {
            Some(p) if p.is_file() => p.to_path_buf(),
            Some(p) => {
                return Err(Pdf2SlidesError::ConverterNotFound {
                    hint: format!("'{}' is not a file. {}", p.display(), install_hint()),
                })
            }
            None => locate_soffice()?,
        };
        debug!("Using LibreOffice at {}", binary.display());
        Ok(Self::new(binary, timeout_secs))
    }

    pub fn binary(&self) -> &Path {
        &self.binary
    }

    /// Arguments for converting `source` into `out_dir`.
    pub fn arguments(source: &Path, out_dir: &Path) -> Vec<std::ffi::OsString> {
        vec![
            "--headless".into(),
            "--infilter=impress_pdf_import".into(),
            "--convert-to".into(),
            "odp:impress8".into(),
            "--outdir".into(),
            out_dir.as_os_str().to_os_string(),
            source.as_os_str().to_os_string(),
        ]
    }
}

/// Where LibreOffice writes the converted file.
pub fn expected_output(source: &Path, out_dir: &Path) -> PathBuf {
    let mut name = source.file_stem().unwrap_or(source.as_os_str()).to_os_string();
    name.push(".odp");
    out_dir.join(name)
}

#[async_trait]
impl DocumentConverter for SofficeConverter {
    async fn convert(&self, source: &Path, out_dir: &Path) -> Result<PathBuf, Pdf2SlidesError> {
        let fail = |detail: String| Pdf2SlidesError::ConversionFailed {
            path: source.to_path_buf(),
            detail,
        };

        let out_dir = std::path::absolute(out_dir).map_err(|e| fail(e.to_string()))?;
        let output = expected_output(source, &out_dir);

        let child = Command::new(&self.binary)
            .args(Self::arguments(source, &out_dir))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| fail(format!("failed to start '{}': {}", self.binary.display(), e)))?;

        let result = timeout(Duration::from_secs(self.timeout_secs), child.wait_with_output())
            .await
            .map_err(|_| fail(format!("timed out after {}s", self.timeout_secs)))?
            .map_err(|e| fail(e.to_string()))?;

        if !result.status.success() {
            let stderr = String::from_utf8_lossy(&result.stderr);
            return Err(fail(format!(
                "soffice exited with {}: {}",
                result.status,
                stderr.trim()
            )));
        }

        if !tokio::fs::try_exists(&output).await.unwrap_or(false) {
            return Err(fail(format!(
                "soffice reported success but '{}' was not written",
                output.display()
            )));
        }

        info!("Converted {} to {}", source.display(), output.display());
        Ok(output)
    }
}

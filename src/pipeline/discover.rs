//! Directory convention: `in/` holds source PDFs, `temp/` holds the
//! intermediate ODP files and is removed after a clean run.

use crate::error::Pdf2SlidesError;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Create the input and working directories if they are missing.
pub async fn ensure_dirs(input_dir: &Path, work_dir: &Path) -> Result<(), Pdf2SlidesError> {
    for dir in [input_dir, work_dir] {
        tokio::fs::create_dir_all(dir)
            .await
            .map_err(|source| Pdf2SlidesError::DirectoryFailed {
                path: dir.to_path_buf(),
                source,
            })?;
    }
    Ok(())
}

/// Regular files in `dir` with a `.pdf` extension (any case), sorted by
/// file name.
pub async fn discover_pdfs(dir: &Path) -> Result<Vec<PathBuf>, Pdf2SlidesError> {
    let list_err = |source| Pdf2SlidesError::DirectoryFailed {
        path: dir.to_path_buf(),
        source,
    };

    let mut entries = tokio::fs::read_dir(dir).await.map_err(list_err)?;
    let mut pdfs = Vec::new();
    while let Some(entry) = entries.next_entry().await.map_err(list_err)? {
        let path = entry.path();
        if !is_pdf(&path) {
            continue;
        }
        let file_type = entry.file_type().await.map_err(list_err)?;
        if file_type.is_file() {
            pdfs.push(path);
        }
    }
    pdfs.sort();
    debug!("Found {} PDFs in {}", pdfs.len(), dir.display());
    Ok(pdfs)
}

/// Remove the working directory and everything in it.
pub async fn clear_work_dir(work_dir: &Path) -> Result<(), Pdf2SlidesError> {
    match tokio::fs::remove_dir_all(work_dir).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(source) => Err(Pdf2SlidesError::DirectoryFailed {
            path: work_dir.to_path_buf(),
            source,
        }),
    }
}

fn is_pdf(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("pdf"))
}

use crate::model::WorkflowError;
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

/// Upload ceiling enforced before any network call (50 MiB).
pub const MAX_UPLOAD_BYTES: u64 = 50 * 1024 * 1024;

/// A file selected for upload, captured with its metadata at selection time.
/// Transient: superseded by the next selection or cleared on reset.
#[derive(Debug, Clone)]
pub struct CandidateFile {
    pub path: PathBuf,
    pub file_name: String,
    pub size: u64,
}

impl CandidateFile {
    pub fn from_path(path: &Path) -> Result<Self> {
        let meta = std::fs::metadata(path)
            .with_context(|| format!("cannot read metadata for {}", path.display()))?;
        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .map(str::to_string)
            .with_context(|| format!("path has no usable file name: {}", path.display()))?;
        Ok(Self {
            path: path.to_path_buf(),
            file_name,
            size: meta.len(),
        })
    }

    pub fn validate(&self) -> Result<(), WorkflowError> {
        classify(&self.file_name, self.size)
    }
}

/// Classify a candidate by declared type and size. Pure: no filesystem or
/// network access, the caller owns all user-facing messaging.
pub fn classify(file_name: &str, size: u64) -> Result<(), WorkflowError> {
    let ext = Path::new(file_name).extension().and_then(|e| e.to_str());
    match ext {
        Some(e) if e.eq_ignore_ascii_case("pdf") => {}
        _ => return Err(WorkflowError::InvalidFileType),
    }
    if size > MAX_UPLOAD_BYTES {
        return Err(WorkflowError::FileTooLarge {
            size,
            limit: MAX_UPLOAD_BYTES,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_a_small_pdf() {
        assert!(classify("statement.pdf", 1024).is_ok());
    }

    #[test]
    fn extension_check_is_case_insensitive() {
        assert!(classify("STATEMENT.PDF", 1024).is_ok());
        assert!(classify("statement.Pdf", 1024).is_ok());
    }

    #[test]
    fn rejects_non_pdf_extensions() {
        assert_eq!(
            classify("statement.txt", 1024),
            Err(WorkflowError::InvalidFileType)
        );
        assert_eq!(
            classify("statement", 1024),
            Err(WorkflowError::InvalidFileType)
        );
    }

    #[test]
    fn rejects_files_over_the_ceiling() {
        assert!(classify("statement.pdf", MAX_UPLOAD_BYTES).is_ok());
        assert_eq!(
            classify("statement.pdf", MAX_UPLOAD_BYTES + 1),
            Err(WorkflowError::FileTooLarge {
                size: MAX_UPLOAD_BYTES + 1,
                limit: MAX_UPLOAD_BYTES,
            })
        );
    }

    #[test]
    fn type_check_runs_before_the_size_check() {
        assert_eq!(
            classify("dump.bin", MAX_UPLOAD_BYTES + 1),
            Err(WorkflowError::InvalidFileType)
        );
    }
}

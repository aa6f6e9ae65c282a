//! Attachment set resolution. Resolved once per batch and shared read-only by every row.

use std::path::{Path, PathBuf};

use mailrun_common::error::AppError;

/// Where a batch's attachments come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttachmentSource {
    /// Every regular file directly inside this directory
    Directory(PathBuf),
    /// An explicitly curated list of files
    Files(Vec<PathBuf>),
}

impl AttachmentSource {
    pub fn resolve(&self) -> Result<AttachmentSet, AppError> {
        match self {
            AttachmentSource::Directory(dir) => AttachmentSet::from_dir(dir),
            AttachmentSource::Files(files) => AttachmentSet::from_files(files),
        }
    }
}

/// Ordered, non-empty list of files attached to every message in a batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttachmentSet {
    files: Vec<PathBuf>,
}

impl AttachmentSet {
    /// All regular files directly inside `dir`, sorted by path.
    pub fn from_dir(dir: &Path) -> Result<Self, AppError> {
        if !dir.is_dir() {
            return Err(AppError::Attachment(format!(
                "attachment directory does not exist or is not a directory: {}",
                dir.display()
            )));
        }

        let mut files = Vec::new();
        for entry in std::fs::read_dir(dir)? {
            let path = entry?.path();
            if path.is_file() {
                files.push(path);
            }
        }
        files.sort();

        if files.is_empty() {
            return Err(AppError::Attachment(format!(
                "no files to attach in {}",
                dir.display()
            )));
        }

        tracing::info!(dir = %dir.display(), count = files.len(), "Resolved attachments");
        Ok(Self { files })
    }

    /// The curated files that exist, in the given order. Missing entries are skipped.
    pub fn from_files(candidates: &[PathBuf]) -> Result<Self, AppError> {
        let mut files = Vec::with_capacity(candidates.len());
        for path in candidates {
            if path.is_file() {
                files.push(path.clone());
            } else {
                tracing::warn!(path = %path.display(), "Skipping missing attachment");
            }
        }

        if files.is_empty() {
            return Err(AppError::Attachment("no valid attachment files selected".into()));
        }
        Ok(Self { files })
    }

    pub fn paths(&self) -> &[PathBuf] {
        &self.files
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_dir_lists_files_sorted_and_skips_subdirs() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("b.pdf"), b"b").unwrap();
        std::fs::write(dir.path().join("a.xlsx"), b"a").unwrap();
        std::fs::create_dir(dir.path().join("nested")).unwrap();

        let set = AttachmentSet::from_dir(dir.path()).unwrap();
        let names: Vec<_> = set
            .paths()
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["a.xlsx", "b.pdf"]);
    }

    #[test]
    fn test_empty_dir_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let err = AttachmentSet::from_dir(dir.path()).unwrap_err();
        assert!(matches!(err, AppError::Attachment(_)));
    }

    #[test]
    fn test_missing_dir_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let err = AttachmentSet::from_dir(&dir.path().join("nope")).unwrap_err();
        assert!(matches!(err, AppError::Attachment(_)));
    }

    #[test]
    fn test_curated_list_keeps_order_and_drops_missing() {
        let dir = tempfile::tempdir().unwrap();
        let z = dir.path().join("z.pdf");
        let a = dir.path().join("a.pdf");
        std::fs::write(&z, b"z").unwrap();
        std::fs::write(&a, b"a").unwrap();

        let source = AttachmentSource::Files(vec![z.clone(), dir.path().join("gone.pdf"), a.clone()]);
        let set = source.resolve().unwrap();
        assert_eq!(set.paths(), &[z, a]);
    }

    #[test]
    fn test_curated_list_all_missing_is_rejected() {
        let err = AttachmentSet::from_files(&[PathBuf::from("/definitely/not/here.pdf")]).unwrap_err();
        assert!(matches!(err, AppError::Attachment(_)));
    }
}

//! Batch-level inputs, validated before any message is dispatched.

use std::path::Path;

use mailrun_common::dates::DateRange;
use mailrun_common::error::AppError;
use mailrun_common::types::ConfigRow;
use mailrun_directory::attachments::{AttachmentSet, AttachmentSource};
use mailrun_directory::parse_directory_file;
use mailrun_templates::PlaceholderContext;

/// Everything a run needs besides the transport.
#[derive(Debug, Clone)]
pub struct BatchInputs {
    pub rows: Vec<ConfigRow>,
    pub dates: DateRange,
    pub context: PlaceholderContext,
    pub attachments: AttachmentSet,
}

impl BatchInputs {
    /// Validate dates, load the directory and resolve attachments. Any error
    /// here aborts the run before the transport is touched.
    pub fn prepare(
        directory: &Path,
        start: &str,
        end: &str,
        attachments: &AttachmentSource,
    ) -> Result<Self, AppError> {
        let dates = DateRange::parse(start, end)?;
        let rows = parse_directory_file(directory)?;
        let attachments = attachments.resolve()?;

        tracing::info!(
            directory = %directory.display(),
            rows = rows.len(),
            attachments = attachments.len(),
            range = %dates.range_cn(),
            "Batch inputs ready"
        );

        Ok(Self {
            context: PlaceholderContext::for_dates(&dates),
            rows,
            dates,
            attachments,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mailrun_templates::Placeholder;

    const DIRECTORY: &str = "sequence_id,group_name,to,subject_template,body_template\n\
                             1,West,a@x.com,Report {start_date},Hi\n";

    fn setup() -> (tempfile::TempDir, std::path::PathBuf, AttachmentSource) {
        let dir = tempfile::tempdir().unwrap();
        let directory = dir.path().join("mail_config.csv");
        std::fs::write(&directory, DIRECTORY).unwrap();
        let files = dir.path().join("files");
        std::fs::create_dir(&files).unwrap();
        std::fs::write(files.join("a.pdf"), b"x").unwrap();
        (dir, directory, AttachmentSource::Directory(files))
    }

    #[test]
    fn test_prepare_builds_context() {
        let (_dir, directory, source) = setup();
        let inputs = BatchInputs::prepare(&directory, "2025-12-01", "2025-12-20", &source).unwrap();
        assert_eq!(inputs.rows.len(), 1);
        assert_eq!(inputs.attachments.len(), 1);
        assert_eq!(inputs.context.get(Placeholder::StartDate), Some("2025-12-01"));
        assert_eq!(inputs.context.get(Placeholder::GroupName), None);
    }

    #[test]
    fn test_bad_dates_fail_first() {
        let (_dir, directory, _) = setup();
        let missing = AttachmentSource::Files(vec![]);
        let err = BatchInputs::prepare(&directory, "2025-12-20", "2025-12-01", &missing).unwrap_err();
        assert!(matches!(err, AppError::DateRange(_)));
    }

    #[test]
    fn test_empty_attachments_abort() {
        let (dir, directory, _) = setup();
        let empty = dir.path().join("empty");
        std::fs::create_dir(&empty).unwrap();
        let err = BatchInputs::prepare(
            &directory,
            "2025-12-01",
            "2025-12-20",
            &AttachmentSource::Directory(empty),
        )
        .unwrap_err();
        assert!(matches!(err, AppError::Attachment(_)));
    }
}

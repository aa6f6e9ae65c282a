//! Archive naming and persistence.
//!
//! File names derive from the subject: `<base>.msg`, then `<base> (1).msg`,
//! `<base> (2).msg`, ... An existing archive is never overwritten.

use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use std::time::Duration;

use regex::Regex;

use mailrun_common::config::AppConfig;
use mailrun_common::error::{ArchiveError, TransportError};
use mailrun_common::types::{ArchiveFormat, RecordId};
use mailrun_transport::MailTransport;

/// Used when a subject has no usable characters.
pub const FALLBACK_BASE_NAME: &str = "email";

/// Longest base name kept, in characters.
pub const MAX_BASE_NAME_CHARS: usize = 150;

/// Longest base name kept, in UTF-8 bytes. Leaves room for ` (N).msg` under the
/// usual 255-byte file name limit.
pub const MAX_BASE_NAME_BYTES: usize = 200;

const ARCHIVE_EXTENSION: &str = "msg";

static ILLEGAL_FILENAME_CHARS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"[\\/:*?"<>|\x00-\x1f]"#).expect("valid filename regex"));

/// Filesystem-safe base name for a subject.
pub fn safe_base_name(subject: &str) -> String {
    let replaced = ILLEGAL_FILENAME_CHARS.replace_all(subject, "_");
    let capped: String = replaced.trim().chars().take(MAX_BASE_NAME_CHARS).collect();
    let capped = truncate_to_bytes(&capped, MAX_BASE_NAME_BYTES).trim();
    if capped.is_empty() {
        FALLBACK_BASE_NAME.to_string()
    } else {
        capped.to_string()
    }
}

/// Longest prefix of `s` within `max` bytes that ends on a char boundary.
fn truncate_to_bytes(s: &str, max: usize) -> &str {
    if s.len() <= max {
        return s;
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}

/// First unused archive path for `subject` inside `dir`.
pub fn unique_archive_path(dir: &Path, subject: &str) -> PathBuf {
    let base = safe_base_name(subject);
    let first = dir.join(format!("{}.{}", base, ARCHIVE_EXTENSION));
    if !first.exists() {
        return first;
    }
    (1u64..)
        .map(|i| dir.join(format!("{} ({}).{}", base, i, ARCHIVE_EXTENSION)))
        .find(|p| !p.exists())
        .unwrap_or(first)
}

/// Bounded retry budget for saving a located record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SavePolicy {
    /// Total attempts, including the first in-place save
    pub attempts: u32,
    /// Pause after a failed attempt
    pub wait: Duration,
}

impl Default for SavePolicy {
    fn default() -> Self {
        Self {
            attempts: 4,
            wait: Duration::from_secs(3),
        }
    }
}

impl SavePolicy {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            attempts: config.save_retries.max(1),
            wait: Duration::from_millis(config.save_wait_ms.max(500)),
        }
    }
}

/// Persist `record` into `dir`, retrying per `policy`.
///
/// The first attempt saves the record itself. Later attempts save a fresh
/// duplicate (and then delete it) so a handle left over from a failed attempt
/// cannot block the save.
pub async fn save_with_retries<T: MailTransport + ?Sized>(
    transport: &T,
    record: &RecordId,
    dir: &Path,
    subject: &str,
    policy: &SavePolicy,
) -> Result<PathBuf, ArchiveError> {
    tokio::fs::create_dir_all(dir).await?;

    let attempts = policy.attempts.max(1);
    let mut last_error = String::new();

    for attempt in 1..=attempts {
        let target = unique_archive_path(dir, subject);
        let result = if attempt == 1 {
            save_any_format(transport, record, &target).await
        } else {
            save_duplicate(transport, record, &target).await
        };

        match result {
            Ok(()) => {
                tracing::info!(path = %target.display(), attempt, "Archived sent copy");
                return Ok(target);
            }
            Err(e) => {
                tracing::warn!(
                    record = %record,
                    attempt,
                    max_attempts = attempts,
                    error = %e,
                    "Archive save failed"
                );
                last_error = e.to_string();
                if attempt < attempts {
                    tokio::time::sleep(policy.wait).await;
                }
            }
        }
    }

    Err(ArchiveError::SaveExhausted {
        attempts,
        last_error,
    })
}

/// Save as `Msg`, falling back to `MsgUnicode` within the same attempt.
async fn save_any_format<T: MailTransport + ?Sized>(
    transport: &T,
    record: &RecordId,
    target: &Path,
) -> Result<(), TransportError> {
    match transport.save_as(record, target, ArchiveFormat::Msg).await {
        Ok(()) => Ok(()),
        Err(e) => {
            tracing::debug!(error = %e, "Retrying save in unicode format");
            transport
                .save_as(record, target, ArchiveFormat::MsgUnicode)
                .await
        }
    }
}

async fn save_duplicate<T: MailTransport + ?Sized>(
    transport: &T,
    record: &RecordId,
    target: &Path,
) -> Result<(), TransportError> {
    let copy = transport.duplicate(record).await?;
    let saved = save_any_format(transport, &copy, target).await;
    if let Err(e) = transport.delete(&copy).await {
        tracing::warn!(record = %copy, error = %e, "Could not delete duplicate record");
    }
    saved
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use mailrun_transport::MemoryTransport;

    #[test]
    fn test_safe_name_replaces_illegal_chars() {
        assert_eq!(safe_base_name(r#"Q1: "A/B" <test>?"#), "Q1_ _A_B_ _test__");
        assert_eq!(safe_base_name("line\nbreak"), "line_break");
    }

    #[test]
    fn test_safe_name_trims_and_caps() {
        assert_eq!(safe_base_name("  padded  "), "padded");
        let ascii = "a".repeat(300);
        assert_eq!(safe_base_name(&ascii).len(), MAX_BASE_NAME_CHARS);
    }

    #[test]
    fn test_multibyte_subject_fits_file_name_limit() {
        let dir = tempfile::tempdir().unwrap();
        let subject = "报".repeat(160);
        let base = safe_base_name(&subject);
        assert!(base.len() <= MAX_BASE_NAME_BYTES);
        assert!(subject.starts_with(&base));
        assert_eq!(base.chars().count(), MAX_BASE_NAME_BYTES / 3);

        for expected in [format!("{}.msg", base), format!("{} (1).msg", base)] {
            let path = unique_archive_path(dir.path(), &subject);
            assert_eq!(path, dir.path().join(&expected));
            std::fs::write(&path, b"copy").unwrap();
        }
    }

    #[test]
    fn test_byte_cap_respects_char_boundaries() {
        assert_eq!(truncate_to_bytes("ab报", 4), "ab");
        assert_eq!(truncate_to_bytes("ab报", 5), "ab报");
        assert_eq!(truncate_to_bytes("short", 200), "short");
    }

    #[test]
    fn test_safe_name_fallback() {
        assert_eq!(safe_base_name(""), FALLBACK_BASE_NAME);
        assert_eq!(safe_base_name("   "), FALLBACK_BASE_NAME);
    }

    #[test]
    fn test_unique_path_never_overwrites() {
        let dir = tempfile::tempdir().unwrap();
        let first = unique_archive_path(dir.path(), "Report");
        assert_eq!(first, dir.path().join("Report.msg"));
        std::fs::write(&first, b"x").unwrap();

        let second = unique_archive_path(dir.path(), "Report");
        assert_eq!(second, dir.path().join("Report (1).msg"));
        std::fs::write(&second, b"x").unwrap();

        assert_eq!(
            unique_archive_path(dir.path(), "Report"),
            dir.path().join("Report (2).msg")
        );
    }

    #[test]
    fn test_policy_floors() {
        let config = AppConfig {
            save_retries: 0,
            save_wait_ms: 10,
            ..AppConfig::default()
        };
        let policy = SavePolicy::from_config(&config);
        assert_eq!(policy.attempts, 1);
        assert_eq!(policy.wait, Duration::from_millis(500));
    }

    async fn sent_record(transport: &MemoryTransport) -> RecordId {
        transport.insert_sent_record("Report", Utc::now(), Some(1))
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_attempt_saves_in_place() {
        let dir = tempfile::tempdir().unwrap();
        let transport = MemoryTransport::new();
        let record = sent_record(&transport).await;

        let path = save_with_retries(&transport, &record, dir.path(), "Report", &SavePolicy::default())
            .await
            .unwrap();
        assert_eq!(path, dir.path().join("Report.msg"));
        assert_eq!(transport.duplicates_created(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_long_multibyte_subject_is_archived() {
        let dir = tempfile::tempdir().unwrap();
        let transport = MemoryTransport::new();
        let subject = "报".repeat(160);
        let record = transport.insert_sent_record(&subject, Utc::now(), Some(1));

        let path = save_with_retries(&transport, &record, dir.path(), &subject, &SavePolicy::default())
            .await
            .unwrap();
        assert!(path.exists());
        assert_eq!(transport.saved_paths(), vec![path]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unicode_fallback_within_one_attempt() {
        let dir = tempfile::tempdir().unwrap();
        let transport = MemoryTransport::new().rejecting_ansi_format();
        let record = sent_record(&transport).await;

        save_with_retries(&transport, &record, dir.path(), "Report", &SavePolicy::default())
            .await
            .unwrap();
        assert_eq!(transport.duplicates_created(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_uses_duplicate_and_deletes_it() {
        let dir = tempfile::tempdir().unwrap();
        // Both formats fail on the first attempt.
        let transport = MemoryTransport::new().with_save_failures(2);
        let record = sent_record(&transport).await;

        let path = save_with_retries(&transport, &record, dir.path(), "Report", &SavePolicy::default())
            .await
            .unwrap();
        assert!(path.exists());
        assert_eq!(transport.duplicates_created(), 1);
        assert_eq!(transport.deleted().len(), 1);
        assert_ne!(transport.deleted()[0], record);
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhausted_budget_reports_failure() {
        let dir = tempfile::tempdir().unwrap();
        let transport = MemoryTransport::new().with_save_failures(100);
        let record = sent_record(&transport).await;
        let policy = SavePolicy {
            attempts: 3,
            wait: Duration::from_secs(1),
        };

        let err = save_with_retries(&transport, &record, dir.path(), "Report", &policy)
            .await
            .unwrap_err();
        assert!(matches!(err, ArchiveError::SaveExhausted { attempts: 3, .. }));
        assert_eq!(transport.duplicates_created(), 2);
        assert!(!dir.path().join("Report.msg").exists());
    }
}

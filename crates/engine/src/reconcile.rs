//! Sent-copy reconciliation.
//!
//! After a send, the transport's sent store is polled until an item matching the
//! message shows up, then that item is saved to the archive directory. The sent
//! store is eventually consistent, so a match may take several polls.
//!
//! Repeated subjects are common within one batch, and a lagging store may show
//! an earlier row's copy before the current one. Records already archived for
//! another message are tracked as claimed and never matched again.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use mailrun_common::config::AppConfig;
use mailrun_common::error::ArchiveError;
use mailrun_common::types::{RecordId, SentQuery, SentRecord};
use mailrun_transport::MailTransport;

use crate::archive::{SavePolicy, save_with_retries};

/// Polling bounds for locating a sent copy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconcilePolicy {
    /// Total time allowed for the copy to appear
    pub deadline: Duration,
    pub poll_interval: Duration,
    /// Subtracted from the send mark to tolerate clock differences with the store
    pub clock_skew: TimeDelta,
    /// Only the most recent items of each query are examined
    pub scan_limit: usize,
}

impl Default for ReconcilePolicy {
    fn default() -> Self {
        Self {
            deadline: Duration::from_secs(120),
            poll_interval: Duration::from_millis(1200),
            clock_skew: TimeDelta::minutes(2),
            scan_limit: 60,
        }
    }
}

impl ReconcilePolicy {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            deadline: Duration::from_secs(config.poll_seconds.max(10)),
            poll_interval: Duration::from_millis(config.poll_interval_ms.max(200)),
            ..Self::default()
        }
    }

    /// Earliest `sent_on` a candidate may carry for a send started at `sent_at`.
    pub fn sent_after(&self, sent_at: DateTime<Utc>) -> DateTime<Utc> {
        sent_at - self.clock_skew
    }
}

/// Candidate predicate: exact subject, not older than the mark, and the expected
/// attachment count when the store reports one.
pub fn is_match(
    record: &SentRecord,
    subject: &str,
    sent_after: DateTime<Utc>,
    expected_attachments: usize,
) -> bool {
    record.subject == subject
        && record.sent_on >= sent_after
        && record
            .attachment_count
            .is_none_or(|count| count == expected_attachments)
}

/// Locates sent copies and persists them into one archive directory.
#[derive(Debug, Clone)]
pub struct Reconciler {
    archive_dir: PathBuf,
    policy: ReconcilePolicy,
    save: SavePolicy,
}

impl Reconciler {
    pub fn new(archive_dir: impl Into<PathBuf>, policy: ReconcilePolicy, save: SavePolicy) -> Self {
        Self {
            archive_dir: archive_dir.into(),
            policy,
            save,
        }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(
            config.archive_dir.clone(),
            ReconcilePolicy::from_config(config),
            SavePolicy::from_config(config),
        )
    }

    pub fn archive_dir(&self) -> &Path {
        &self.archive_dir
    }

    pub fn policy(&self) -> &ReconcilePolicy {
        &self.policy
    }

    /// Find the sent copy of a message sent at `sent_at` and archive it.
    ///
    /// Returns the archive path. The located record is added to `claimed`
    /// whether or not the save succeeds. On `Err` the message is still sent;
    /// callers degrade the row's outcome rather than failing it.
    pub async fn reconcile<T: MailTransport + ?Sized>(
        &self,
        transport: &T,
        subject: &str,
        sent_at: DateTime<Utc>,
        expected_attachments: usize,
        claimed: &mut HashSet<RecordId>,
        cancel: &CancellationToken,
    ) -> Result<PathBuf, ArchiveError> {
        let record = self
            .locate(transport, subject, sent_at, expected_attachments, claimed, cancel)
            .await?;
        claimed.insert(record.id.clone());
        save_with_retries(transport, &record.id, &self.archive_dir, subject, &self.save).await
    }

    /// Poll the sent store until an unclaimed matching item appears or the
    /// deadline passes.
    pub async fn locate<T: MailTransport + ?Sized>(
        &self,
        transport: &T,
        subject: &str,
        sent_at: DateTime<Utc>,
        expected_attachments: usize,
        claimed: &HashSet<RecordId>,
        cancel: &CancellationToken,
    ) -> Result<SentRecord, ArchiveError> {
        let sent_after = self.policy.sent_after(sent_at);
        let query = SentQuery {
            subject: subject.to_string(),
            sent_after,
            limit: self.policy.scan_limit,
        };

        let started = Instant::now();
        let deadline = started + self.policy.deadline;
        let mut polls = 0u32;

        loop {
            polls += 1;
            match transport.query_sent(&query).await {
                Ok(mut records) => {
                    records.sort_by(|a, b| b.sent_on.cmp(&a.sent_on));
                    let found = records
                        .into_iter()
                        .take(self.policy.scan_limit)
                        .find(|r| {
                            !claimed.contains(&r.id)
                                && is_match(r, subject, sent_after, expected_attachments)
                        });
                    if let Some(record) = found {
                        tracing::debug!(record = %record.id, polls, "Located sent copy");
                        return Ok(record);
                    }
                }
                Err(e) => {
                    tracing::debug!(error = %e, polls, "Sent-store query failed");
                }
            }

            let now = Instant::now();
            if now >= deadline {
                return Err(ArchiveError::Timeout {
                    subject: subject.to_string(),
                    waited_secs: now.duration_since(started).as_secs(),
                });
            }

            let wait = self.policy.poll_interval.min(deadline - now);
            tokio::select! {
                _ = cancel.cancelled() => return Err(ArchiveError::Cancelled),
                _ = tokio::time::sleep(wait) => {}
            }
        }
    }
}

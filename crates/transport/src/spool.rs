//! Filesystem spool transport.
//!
//! Layout under the spool root:
//!
//! ```text
//! sent/<id>.json     one file per sent message (the sent store)
//! drafts/<id>.json   one file per draft
//! ```
//!
//! A downstream relay picks messages up from `sent/`. Records are visible as soon
//! as `send` returns.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use mailrun_common::error::TransportError;
use mailrun_common::types::{ArchiveFormat, OutgoingMessage, RecordId, SentQuery, SentRecord};

use crate::{ArchivedMessage, MailTransport, Result};

#[derive(Debug, Clone, Serialize, Deserialize)]
struct SpoolRecord {
    id: RecordId,
    sent_on: DateTime<Utc>,
    message: OutgoingMessage,
}

impl SpoolRecord {
    fn to_sent_record(&self) -> SentRecord {
        SentRecord {
            id: self.id.clone(),
            subject: self.message.subject.clone(),
            sent_on: self.sent_on,
            attachment_count: Some(self.message.attachments.len()),
        }
    }
}

/// Transport that writes messages as JSON files under a spool directory.
#[derive(Debug, Clone)]
pub struct SpoolTransport {
    root: PathBuf,
}

impl SpoolTransport {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn sent_dir(&self) -> PathBuf {
        self.root.join("sent")
    }

    fn drafts_dir(&self) -> PathBuf {
        self.root.join("drafts")
    }

    fn record_path(&self, id: &RecordId) -> Result<PathBuf> {
        let valid = !id.0.is_empty()
            && id.0.chars().all(|c| c.is_ascii_alphanumeric() || c == '-');
        if !valid {
            return Err(TransportError::NotFound(id.to_string()));
        }
        Ok(self.sent_dir().join(format!("{}.json", id.0)))
    }

    async fn write_record(&self, dir: PathBuf, record: &SpoolRecord) -> Result<()> {
        tokio::fs::create_dir_all(&dir).await?;
        let bytes = serde_json::to_vec_pretty(record)?;
        tokio::fs::write(dir.join(format!("{}.json", record.id.0)), bytes).await?;
        Ok(())
    }

    async fn read_record(&self, id: &RecordId) -> Result<SpoolRecord> {
        let path = self.record_path(id)?;
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(TransportError::NotFound(id.to_string()));
            }
            Err(e) => return Err(e.into()),
        };
        Ok(serde_json::from_slice(&bytes)?)
    }

    fn new_record(message: &OutgoingMessage) -> SpoolRecord {
        SpoolRecord {
            id: RecordId(Uuid::new_v4().to_string()),
            sent_on: Utc::now(),
            message: message.clone(),
        }
    }
}

#[async_trait]
impl MailTransport for SpoolTransport {
    async fn send(&self, message: &OutgoingMessage) -> Result<()> {
        if message.to.trim().is_empty() {
            return Err(TransportError::Rejected("message has no recipients".into()));
        }
        let record = Self::new_record(message);
        self.write_record(self.sent_dir(), &record).await?;
        tracing::debug!(id = %record.id, subject = %message.subject, "Spooled message");
        Ok(())
    }

    async fn save_draft(&self, message: &OutgoingMessage) -> Result<()> {
        let record = Self::new_record(message);
        self.write_record(self.drafts_dir(), &record).await
    }

    async fn query_sent(&self, query: &SentQuery) -> Result<Vec<SentRecord>> {
        let dir = self.sent_dir();
        let mut entries = match tokio::fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut found = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let bytes = tokio::fs::read(&path).await?;
            let record: SpoolRecord = match serde_json::from_slice(&bytes) {
                Ok(record) => record,
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "Skipping unreadable spool record");
                    continue;
                }
            };
            if record.message.subject == query.subject && record.sent_on >= query.sent_after {
                found.push(record.to_sent_record());
            }
        }

        found.sort_by(|a, b| b.sent_on.cmp(&a.sent_on));
        found.truncate(query.limit);
        Ok(found)
    }

    async fn duplicate(&self, record: &RecordId) -> Result<RecordId> {
        let mut copy = self.read_record(record).await?;
        copy.id = RecordId(Uuid::new_v4().to_string());
        self.write_record(self.sent_dir(), &copy).await?;
        Ok(copy.id)
    }

    async fn save_as(&self, record: &RecordId, path: &Path, format: ArchiveFormat) -> Result<()> {
        let stored = self.read_record(record).await?;
        let archived = ArchivedMessage {
            format,
            id: stored.id,
            sent_on: stored.sent_on,
            message: stored.message,
        };
        tokio::fs::write(path, serde_json::to_vec_pretty(&archived)?).await?;
        Ok(())
    }

    async fn delete(&self, record: &RecordId) -> Result<()> {
        let path = self.record_path(record)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(TransportError::NotFound(record.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    fn name(&self) -> &'static str {
        "spool"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message(subject: &str) -> OutgoingMessage {
        OutgoingMessage {
            to: "a@x.com".into(),
            cc: String::new(),
            bcc: String::new(),
            subject: subject.to_string(),
            html_body: "<p>hi</p>".into(),
            attachments: vec![PathBuf::from("report.pdf")],
        }
    }

    fn query(subject: &str) -> SentQuery {
        SentQuery {
            subject: subject.to_string(),
            sent_after: Utc::now() - chrono::Duration::minutes(2),
            limit: 60,
        }
    }

    #[tokio::test]
    async fn test_send_then_query_finds_record() {
        let dir = tempfile::tempdir().unwrap();
        let spool = SpoolTransport::new(dir.path());

        spool.send(&message("Weekly")).await.unwrap();
        spool.send(&message("Other")).await.unwrap();

        let found = spool.query_sent(&query("Weekly")).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].attachment_count, Some(1));
    }

    #[tokio::test]
    async fn test_query_on_empty_spool() {
        let dir = tempfile::tempdir().unwrap();
        let spool = SpoolTransport::new(dir.path().join("never-created"));
        assert!(spool.query_sent(&query("x")).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_duplicate_save_delete() {
        let dir = tempfile::tempdir().unwrap();
        let spool = SpoolTransport::new(dir.path().join("spool"));
        spool.send(&message("Weekly")).await.unwrap();
        let original = spool.query_sent(&query("Weekly")).await.unwrap().remove(0);

        let copy = spool.duplicate(&original.id).await.unwrap();
        assert_eq!(spool.query_sent(&query("Weekly")).await.unwrap().len(), 2);

        let target = dir.path().join("Weekly.msg");
        spool.save_as(&copy, &target, ArchiveFormat::Msg).await.unwrap();
        spool.delete(&copy).await.unwrap();

        let archived: ArchivedMessage =
            serde_json::from_slice(&std::fs::read(&target).unwrap()).unwrap();
        assert_eq!(archived.message.subject, "Weekly");
        assert_eq!(spool.query_sent(&query("Weekly")).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_drafts_do_not_enter_sent_store() {
        let dir = tempfile::tempdir().unwrap();
        let spool = SpoolTransport::new(dir.path());
        spool.save_draft(&message("Weekly")).await.unwrap();
        assert!(spool.query_sent(&query("Weekly")).await.unwrap().is_empty());
        assert_eq!(std::fs::read_dir(dir.path().join("drafts")).unwrap().count(), 1);
    }

    #[tokio::test]
    async fn test_foreign_ids_are_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let spool = SpoolTransport::new(dir.path());
        let err = spool.delete(&RecordId("../escape".into())).await.unwrap_err();
        assert!(matches!(err, TransportError::NotFound(_)));
    }
}

//! In-memory transport with a lagging sent store and failure injection.
//!
//! Sent items only become visible to `query_sent` after a configurable delay,
//! measured on tokio's clock so paused-time tests control it.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::time::Instant;
use uuid::Uuid;

use mailrun_common::error::TransportError;
use mailrun_common::types::{ArchiveFormat, OutgoingMessage, RecordId, SentQuery, SentRecord};

use crate::{ArchivedMessage, MailTransport, Result};

#[derive(Debug, Clone)]
struct StoredItem {
    record: SentRecord,
    message: OutgoingMessage,
    visible_at: Instant,
}

#[derive(Debug, Default)]
struct State {
    sent: Vec<StoredItem>,
    drafts: Vec<OutgoingMessage>,
    failing_recipients: HashSet<String>,
    save_failures_remaining: u32,
    reject_ansi: bool,
    hide_attachment_counts: bool,
    visibility_delay: Duration,
    saved_paths: Vec<PathBuf>,
    duplicates_created: usize,
    deleted: Vec<RecordId>,
    queries: usize,
}

/// Transport double backed by process memory.
#[derive(Debug, Default)]
pub struct MemoryTransport {
    state: Mutex<State>,
}

impl MemoryTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Delay between a successful send and the item showing up in queries.
    pub fn with_visibility_delay(self, delay: Duration) -> Self {
        self.state().visibility_delay = delay;
        self
    }

    /// Make the next `count` `save_as` calls fail as if the item were locked.
    pub fn with_save_failures(self, count: u32) -> Self {
        self.state().save_failures_remaining = count;
        self
    }

    /// Refuse `ArchiveFormat::Msg`, accepting only the Unicode variant.
    pub fn rejecting_ansi_format(self) -> Self {
        self.state().reject_ansi = true;
        self
    }

    /// Report `attachment_count: None`, as stores that cannot count attachments do.
    pub fn without_attachment_counts(self) -> Self {
        self.state().hide_attachment_counts = true;
        self
    }

    /// Reject sends whose `to` contains `address` (case-insensitive).
    pub fn fail_sends_to(&self, address: &str) {
        self.state()
            .failing_recipients
            .insert(address.to_lowercase());
    }

    pub fn clear_send_failures(&self) {
        self.state().failing_recipients.clear();
    }

    /// Seed the sent store with an item that was not sent through this session.
    pub fn insert_sent_record(
        &self,
        subject: &str,
        sent_on: DateTime<Utc>,
        attachment_count: Option<usize>,
    ) -> RecordId {
        let id = RecordId(Uuid::new_v4().to_string());
        let item = StoredItem {
            record: SentRecord {
                id: id.clone(),
                subject: subject.to_string(),
                sent_on,
                attachment_count,
            },
            message: OutgoingMessage {
                to: String::new(),
                cc: String::new(),
                bcc: String::new(),
                subject: subject.to_string(),
                html_body: String::new(),
                attachments: Vec::new(),
            },
            visible_at: Instant::now(),
        };
        self.state().sent.push(item);
        id
    }

    pub fn sent_messages(&self) -> Vec<OutgoingMessage> {
        self.state().sent.iter().map(|i| i.message.clone()).collect()
    }

    pub fn drafts(&self) -> Vec<OutgoingMessage> {
        self.state().drafts.clone()
    }

    pub fn saved_paths(&self) -> Vec<PathBuf> {
        self.state().saved_paths.clone()
    }

    pub fn duplicates_created(&self) -> usize {
        self.state().duplicates_created
    }

    pub fn deleted(&self) -> Vec<RecordId> {
        self.state().deleted.clone()
    }

    pub fn query_count(&self) -> usize {
        self.state().queries
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl MailTransport for MemoryTransport {
    async fn send(&self, message: &OutgoingMessage) -> Result<()> {
        let mut state = self.state();
        let to = message.to.to_lowercase();
        if let Some(addr) = state.failing_recipients.iter().find(|a| to.contains(a.as_str())) {
            return Err(TransportError::Rejected(format!("recipient {} refused", addr)));
        }

        let attachment_count = (!state.hide_attachment_counts).then_some(message.attachments.len());
        let item = StoredItem {
            record: SentRecord {
                id: RecordId(Uuid::new_v4().to_string()),
                subject: message.subject.clone(),
                sent_on: Utc::now(),
                attachment_count,
            },
            message: message.clone(),
            visible_at: Instant::now() + state.visibility_delay,
        };
        state.sent.push(item);
        Ok(())
    }

    async fn save_draft(&self, message: &OutgoingMessage) -> Result<()> {
        let mut state = self.state();
        let to = message.to.to_lowercase();
        if let Some(addr) = state.failing_recipients.iter().find(|a| to.contains(a.as_str())) {
            return Err(TransportError::Rejected(format!("recipient {} refused", addr)));
        }
        state.drafts.push(message.clone());
        Ok(())
    }

    async fn query_sent(&self, query: &SentQuery) -> Result<Vec<SentRecord>> {
        let mut state = self.state();
        state.queries += 1;
        let now = Instant::now();

        let mut found: Vec<SentRecord> = state
            .sent
            .iter()
            .filter(|i| i.visible_at <= now)
            .filter(|i| i.record.subject == query.subject && i.record.sent_on >= query.sent_after)
            .map(|i| i.record.clone())
            .collect();
        found.sort_by(|a, b| b.sent_on.cmp(&a.sent_on));
        found.truncate(query.limit);
        Ok(found)
    }

    async fn duplicate(&self, record: &RecordId) -> Result<RecordId> {
        let mut state = self.state();
        let original = state
            .sent
            .iter()
            .find(|i| &i.record.id == record)
            .cloned()
            .ok_or_else(|| TransportError::NotFound(record.to_string()))?;

        let id = RecordId(Uuid::new_v4().to_string());
        let mut copy = original;
        copy.record.id = id.clone();
        copy.visible_at = Instant::now();
        state.sent.push(copy);
        state.duplicates_created += 1;
        Ok(id)
    }

    async fn save_as(&self, record: &RecordId, path: &Path, format: ArchiveFormat) -> Result<()> {
        let archived = {
            let mut state = self.state();
            if format == ArchiveFormat::Msg && state.reject_ansi {
                return Err(TransportError::UnsupportedFormat(format.to_string()));
            }
            if state.save_failures_remaining > 0 {
                state.save_failures_remaining -= 1;
                return Err(TransportError::Unavailable(format!("record {} is locked", record)));
            }
            let item = state
                .sent
                .iter()
                .find(|i| &i.record.id == record)
                .ok_or_else(|| TransportError::NotFound(record.to_string()))?;
            ArchivedMessage {
                format,
                id: item.record.id.clone(),
                sent_on: item.record.sent_on,
                message: item.message.clone(),
            }
        };

        let bytes = serde_json::to_vec_pretty(&archived)?;
        tokio::fs::write(path, bytes).await?;
        self.state().saved_paths.push(path.to_path_buf());
        Ok(())
    }

    async fn delete(&self, record: &RecordId) -> Result<()> {
        let mut state = self.state();
        let before = state.sent.len();
        state.sent.retain(|i| &i.record.id != record);
        if state.sent.len() == before {
            return Err(TransportError::NotFound(record.to_string()));
        }
        state.deleted.push(record.clone());
        Ok(())
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}

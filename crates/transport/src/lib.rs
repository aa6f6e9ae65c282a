//! Mail transport capability interface.
//!
//! The engine only ever talks to a transport through [`MailTransport`]: send, save
//! a draft, query the sent store, and duplicate/save/delete a sent record. A
//! transport session is a single stateful resource; callers never issue
//! overlapping calls against one.

pub mod memory;
pub mod spool;

use std::path::Path;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use mailrun_common::error::TransportError;
use mailrun_common::types::{ArchiveFormat, OutgoingMessage, RecordId, SentQuery, SentRecord};

pub use memory::MemoryTransport;
pub use spool::SpoolTransport;

/// File contents written by the bundled transports' `save_as`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArchivedMessage {
    pub format: ArchiveFormat,
    pub id: RecordId,
    pub sent_on: DateTime<Utc>,
    pub message: OutgoingMessage,
}

/// Result type for transport operations
pub type Result<T> = std::result::Result<T, TransportError>;

#[async_trait]
pub trait MailTransport: Send + Sync {
    /// Create and send a message. Returning `Ok` does not imply the message is
    /// already visible in the sent store.
    async fn send(&self, message: &OutgoingMessage) -> Result<()>;

    /// Create the message and save it as a draft.
    async fn save_draft(&self, message: &OutgoingMessage) -> Result<()>;

    /// Items whose subject equals `query.subject` and that were sent at or after
    /// `query.sent_after`, most recent first, at most `query.limit` of them.
    async fn query_sent(&self, query: &SentQuery) -> Result<Vec<SentRecord>>;

    /// Create a copy of a sent record and return the copy's id.
    async fn duplicate(&self, record: &RecordId) -> Result<RecordId>;

    /// Write a record to a local file in a message-archive format.
    async fn save_as(&self, record: &RecordId, path: &Path, format: ArchiveFormat) -> Result<()>;

    /// Remove a record from the store.
    async fn delete(&self, record: &RecordId) -> Result<()>;

    /// Human-readable name for logs.
    fn name(&self) -> &'static str;
}

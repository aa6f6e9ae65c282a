//! Batch dispatcher.
//!
//! Walks rows in order and, for each one:
//! 1. Renders subject and body against the batch context plus the row's group
//! 2. Saves a draft or sends, depending on the mode
//! 3. In send mode with archiving on, reconciles and archives the sent copy
//!
//! A row's failure never stops the batch. Rows are processed strictly one at a
//! time: a transport session does not support overlapping calls.

use std::collections::HashSet;

use chrono::Utc;
use tokio_util::sync::CancellationToken;

use mailrun_common::config::AppConfig;
use mailrun_common::error::AppError;
use mailrun_common::types::{ConfigRow, DispatchMode, DispatchOutcome, OutgoingMessage, RecordId};
use mailrun_directory::attachments::AttachmentSet;
use mailrun_templates::{BodyStyle, PlaceholderContext, render_body, render_subject};
use mailrun_transport::MailTransport;

use crate::reconcile::Reconciler;
use crate::report::{RowResult, RunReport};
use crate::run_log::RunLog;

/// Rendering and archival settings for a run.
#[derive(Debug, Clone, Default)]
pub struct DispatchSettings {
    pub style: BodyStyle,
    /// `None` disables archival
    pub archive: Option<Reconciler>,
}

impl DispatchSettings {
    pub fn from_config(config: &AppConfig) -> Result<Self, AppError> {
        let archive = if config.archive_enabled {
            if config.archive_dir.as_os_str().is_empty() {
                return Err(AppError::Config(
                    "archiving is enabled but no archive directory is set".into(),
                ));
            }
            Some(Reconciler::from_config(config))
        } else {
            None
        };

        Ok(Self {
            style: BodyStyle::new(&config.font_family, config.font_pt),
            archive,
        })
    }
}

pub struct Dispatcher<'a, T: MailTransport + ?Sized> {
    transport: &'a T,
    settings: DispatchSettings,
    cancel: CancellationToken,
    run_log: Option<RunLog>,
    /// Sent-store records already archived for a message of this dispatcher
    claimed: HashSet<RecordId>,
}

impl<'a, T: MailTransport + ?Sized> Dispatcher<'a, T> {
    pub fn new(transport: &'a T, settings: DispatchSettings) -> Self {
        Self {
            transport,
            settings,
            cancel: CancellationToken::new(),
            run_log: None,
            claimed: HashSet::new(),
        }
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn with_run_log(mut self, run_log: RunLog) -> Self {
        self.run_log = Some(run_log);
        self
    }

    /// Whether sent messages are archived.
    pub fn archives(&self) -> bool {
        self.settings.archive.is_some()
    }

    pub fn run_log(&self) -> Option<&RunLog> {
        self.run_log.as_ref()
    }

    /// Dispatch `rows` in order. Per-row failures are recorded in the report.
    ///
    /// Cancellation is checked before each row; rows not yet started are left
    /// out of the report.
    pub async fn run(
        &mut self,
        rows: &[ConfigRow],
        context: &PlaceholderContext,
        attachments: &AttachmentSet,
        mode: DispatchMode,
    ) -> RunReport {
        let mut report = RunReport::new(mode, self.archives());
        let total = rows.len();

        tracing::info!(
            transport = self.transport.name(),
            mode = %mode,
            rows = total,
            attachments = attachments.len(),
            archiving = self.archives(),
            "Starting batch"
        );

        for (i, row) in rows.iter().enumerate() {
            if self.cancel.is_cancelled() {
                tracing::warn!(remaining = total - i, "Batch cancelled");
                report.cancelled = true;
                break;
            }

            let (subject, outcome) = self.dispatch_row(row, context, attachments, mode).await;

            match &outcome {
                DispatchOutcome::Failed(reason) => tracing::warn!(
                    position = i + 1,
                    total,
                    sequence_id = %row.sequence_id,
                    group = %row.group_name,
                    reason = %reason,
                    "Row failed"
                ),
                _ => tracing::info!(
                    position = i + 1,
                    total,
                    sequence_id = %row.sequence_id,
                    group = %row.group_name,
                    outcome = %outcome,
                    "Row dispatched"
                ),
            }

            let result = RowResult {
                sequence_id: row.sequence_id.clone(),
                group_name: row.group_name.clone(),
                to: row.to.clone(),
                subject,
                outcome,
            };

            if let Some(log) = self.run_log.as_mut() {
                if let Err(e) = log.record(&result, attachments.len(), mode) {
                    tracing::error!(error = %e, "Failed to write run log entry");
                }
            }

            report.results.push(result);
        }

        tracing::info!(summary = %report.summary(), "Batch complete");
        report
    }

    async fn dispatch_row(
        &mut self,
        row: &ConfigRow,
        context: &PlaceholderContext,
        attachments: &AttachmentSet,
        mode: DispatchMode,
    ) -> (Option<String>, DispatchOutcome) {
        let row_context = context.for_group(&row.group_name);

        let subject = match render_subject(&row.subject_template, &row_context) {
            Ok(subject) => subject,
            Err(e) => return (None, DispatchOutcome::Failed(format!("subject: {}", e))),
        };
        let html_body = match render_body(&row.body_template, &row_context, &self.settings.style) {
            Ok(body) => body,
            Err(e) => {
                return (Some(subject), DispatchOutcome::Failed(format!("body: {}", e)));
            }
        };

        let message = OutgoingMessage {
            to: row.to.clone(),
            cc: row.cc.clone(),
            bcc: row.bcc.clone(),
            subject: subject.clone(),
            html_body,
            attachments: attachments.paths().to_vec(),
        };

        let outcome = match mode {
            DispatchMode::Draft => match self.transport.save_draft(&message).await {
                Ok(()) => DispatchOutcome::Drafted,
                Err(e) => DispatchOutcome::Failed(e.to_string()),
            },
            DispatchMode::Send => self.send_and_archive(&message).await,
        };
        (Some(subject), outcome)
    }

    async fn send_and_archive(&mut self, message: &OutgoingMessage) -> DispatchOutcome {
        let sent_at = Utc::now();
        if let Err(e) = self.transport.send(message).await {
            return DispatchOutcome::Failed(e.to_string());
        }

        let Some(reconciler) = &self.settings.archive else {
            return DispatchOutcome::Sent;
        };

        match reconciler
            .reconcile(
                self.transport,
                &message.subject,
                sent_at,
                message.attachments.len(),
                &mut self.claimed,
                &self.cancel,
            )
            .await
        {
            Ok(path) => DispatchOutcome::SentAndArchived(path),
            Err(e) => {
                tracing::warn!(subject = %message.subject, error = %e, "Sent without archive copy");
                DispatchOutcome::Sent
            }
        }
    }
}

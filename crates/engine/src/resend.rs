//! Full runs and the two resend flows.
//!
//! - [`run_all`]: dispatch every row and start a fresh failure set
//! - [`resend_failed`]: re-dispatch only rows whose last attempt failed
//! - [`resend_by_recipients`]: re-send to a pasted list of addresses, one
//!   message per owning row, addressed only to the listed recipients

use std::collections::BTreeSet;

use mailrun_common::error::AppError;
use mailrun_common::types::{ConfigRow, DispatchMode};
use mailrun_directory::recipients::{RecipientIndex, extract_addresses};
use mailrun_transport::MailTransport;

use crate::batch::BatchInputs;
use crate::dispatcher::Dispatcher;
use crate::report::{AmbiguousRecipient, RunReport};
use crate::retry_state::RetryState;

/// Dispatch every row. The returned state replaces any previous one.
pub async fn run_all<T: MailTransport + ?Sized>(
    dispatcher: &mut Dispatcher<'_, T>,
    inputs: &BatchInputs,
    mode: DispatchMode,
) -> (RunReport, RetryState) {
    let report = dispatcher
        .run(&inputs.rows, &inputs.context, &inputs.attachments, mode)
        .await;
    let state = RetryState::new().absorb(&report);
    (report, state)
}

/// Re-dispatch the rows in `state` that are still present in the directory.
pub async fn resend_failed<T: MailTransport + ?Sized>(
    dispatcher: &mut Dispatcher<'_, T>,
    inputs: &BatchInputs,
    mode: DispatchMode,
    state: RetryState,
) -> Result<(RunReport, RetryState), AppError> {
    if state.is_empty() {
        return Err(AppError::NoFailures);
    }

    let rows: Vec<ConfigRow> = inputs
        .rows
        .iter()
        .filter(|r| state.contains(&r.sequence_id))
        .cloned()
        .collect();
    if rows.is_empty() {
        return Err(AppError::Validation(format!(
            "none of the {} previously failed rows are in the current directory",
            state.len()
        )));
    }

    tracing::info!(rows = rows.len(), "Resending failed rows");
    let report = dispatcher
        .run(&rows, &inputs.context, &inputs.attachments, mode)
        .await;
    let state = state.absorb(&report);
    Ok((report, state))
}

/// Rows to send for a recipient resend, plus the addresses that could not be
/// placed cleanly.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecipientPlan {
    /// Copies of the owning rows with `to` narrowed to the requested addresses
    pub rows: Vec<ConfigRow>,
    pub unmatched: Vec<String>,
    pub ambiguous: Vec<AmbiguousRecipient>,
}

/// Group `addresses` by owning row. An address listed in several rows goes to
/// the earliest one and is reported as ambiguous.
pub fn plan_recipient_resend(rows: &[ConfigRow], addresses: &[String]) -> RecipientPlan {
    let index = RecipientIndex::build(rows);
    let mut groups: Vec<(usize, BTreeSet<String>)> = Vec::new();
    let mut plan = RecipientPlan::default();

    for address in addresses {
        let matches = index.lookup(address);
        let Some(owner) = matches.first() else {
            plan.unmatched.push(address.clone());
            continue;
        };
        if matches.len() > 1 {
            plan.ambiguous.push(AmbiguousRecipient {
                address: address.clone(),
                sequence_ids: matches.iter().map(|m| m.sequence_id.clone()).collect(),
            });
        }
        match groups.iter_mut().find(|(position, _)| *position == owner.position) {
            Some((_, group)) => {
                group.insert(address.clone());
            }
            None => groups.push((owner.position, BTreeSet::from([address.clone()]))),
        }
    }

    groups.sort_by_key(|(position, _)| *position);
    plan.rows = groups
        .into_iter()
        .map(|(position, group)| {
            let mut row = rows[position].clone();
            row.to = group.into_iter().collect::<Vec<_>>().join("; ");
            row
        })
        .collect();
    plan
}

/// Re-send to the addresses found in `text`. Always sends and archives; the
/// failure set is left alone because each message reaches only part of its row.
pub async fn resend_by_recipients<T: MailTransport + ?Sized>(
    dispatcher: &mut Dispatcher<'_, T>,
    inputs: &BatchInputs,
    text: &str,
) -> Result<RunReport, AppError> {
    if !dispatcher.archives() {
        return Err(AppError::Validation(
            "resending by recipient requires archiving to be enabled".into(),
        ));
    }

    let addresses = extract_addresses(text);
    if addresses.is_empty() {
        return Err(AppError::Validation("no email addresses found in input".into()));
    }

    let plan = plan_recipient_resend(&inputs.rows, &addresses);
    for address in &plan.unmatched {
        tracing::warn!(address = %address, "Recipient matches no row");
    }
    for ambiguous in &plan.ambiguous {
        tracing::warn!(recipient = %ambiguous, "Recipient matches several rows, using the first");
    }

    let mut report = if plan.rows.is_empty() {
        RunReport::new(DispatchMode::Send, true)
    } else {
        tracing::info!(
            addresses = addresses.len(),
            rows = plan.rows.len(),
            "Resending by recipient"
        );
        dispatcher
            .run(&plan.rows, &inputs.context, &inputs.attachments, DispatchMode::Send)
            .await
    };
    report.unmatched = plan.unmatched;
    report.ambiguous = plan.ambiguous;
    Ok(report)
}

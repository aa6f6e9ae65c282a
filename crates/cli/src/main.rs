//! mailrun: batch mail dispatch with archived sent copies.

mod cli;

use std::path::Path;
use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;
use tokio_util::sync::CancellationToken;

use mailrun_common::config::AppConfig;
use mailrun_common::error::AppError;
use mailrun_common::types::DispatchMode;
use mailrun_directory::sample::write_sample_directory;
use mailrun_engine::resend::{resend_by_recipients, resend_failed, run_all};
use mailrun_engine::{BatchInputs, DispatchSettings, Dispatcher, RetryState, RunLog, RunReport};
use mailrun_transport::SpoolTransport;

use crate::cli::{BatchArgs, Cli, Command};

/// What a dispatching command does once inputs are ready.
enum Action {
    RunAll(DispatchMode),
    RetryFailed(DispatchMode, RetryState),
    Resend(String),
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();

    // Initialize tracing
    let builder = tracing_subscriber::fmt().with_env_filter(
        tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| "mailrun=info,mailrun_engine=info".into()),
    );
    if cli.log_json {
        builder.json().init();
    } else {
        builder.init();
    }

    let mut config = AppConfig::from_env()?;

    let (batch, action) = match cli.command {
        Command::Init { path } => {
            let path = path.unwrap_or(config.directory_path);
            if write_sample_directory(&path)? {
                println!("Wrote sample directory to {}", path.display());
            } else {
                println!("{} already exists, left unchanged", path.display());
            }
            return Ok(ExitCode::SUCCESS);
        }
        Command::Run { batch, mode } => (batch, Action::RunAll(mode.into())),
        Command::RetryFailed { batch, mode } => {
            let state_file = batch.state_file.as_ref().unwrap_or(&config.state_file);
            let Some(state) = pending_failures(state_file)? else {
                println!("{}", AppError::NoFailures);
                return Ok(ExitCode::SUCCESS);
            };
            (batch, Action::RetryFailed(mode.into(), state))
        }
        Command::Resend {
            batch,
            recipients,
            recipients_file,
        } => {
            let text = match (recipients, recipients_file) {
                (Some(text), _) => text,
                (None, Some(path)) => std::fs::read_to_string(&path)
                    .with_context(|| format!("reading recipients from {}", path.display()))?,
                (None, None) => String::new(),
            };
            (batch, Action::Resend(text))
        }
    };

    batch.apply(&mut config);
    let report = dispatch(&config, &batch, action).await?;
    print!("{}", report);

    if report.failed() > 0 || report.cancelled {
        Ok(ExitCode::FAILURE)
    } else {
        Ok(ExitCode::SUCCESS)
    }
}

/// Failed rows recorded at `path`, or `None` when there is nothing to retry.
///
/// Checked before any input is resolved, so an empty retry touches nothing.
fn pending_failures(path: &Path) -> anyhow::Result<Option<RetryState>> {
    let state = RetryState::load(path)
        .with_context(|| format!("loading failed rows from {}", path.display()))?;
    Ok((!state.is_empty()).then_some(state))
}

/// Prepare inputs and a spool-backed dispatcher, then carry out `action`.
///
/// Ctrl+C cancels the run: the row in flight finishes (its archive poll is
/// abandoned) and no further rows start.
async fn dispatch(config: &AppConfig, batch: &BatchArgs, action: Action) -> anyhow::Result<RunReport> {
    let inputs = BatchInputs::prepare(
        &config.directory_path,
        &batch.start,
        &batch.end,
        &batch.attachment_source(),
    )?;
    let settings = DispatchSettings::from_config(config)?;
    let transport = SpoolTransport::new(&config.spool_dir);
    let run_log = RunLog::create(&config.log_dir)?;

    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Received interrupt, finishing current row and stopping");
            trigger.cancel();
        }
    });

    let mut dispatcher = Dispatcher::new(&transport, settings)
        .with_cancellation(cancel)
        .with_run_log(run_log);

    let report = match action {
        Action::RunAll(mode) => {
            let (report, state) = run_all(&mut dispatcher, &inputs, mode).await;
            state.save(&config.state_file)?;
            report
        }
        Action::RetryFailed(mode, state) => {
            let (report, state) = resend_failed(&mut dispatcher, &inputs, mode, state).await?;
            state.save(&config.state_file)?;
            report
        }
        Action::Resend(text) => resend_by_recipients(&mut dispatcher, &inputs, &text).await?,
    };

    if let Some(log) = dispatcher.run_log() {
        println!("Run log: {}", log.path().display());
    }
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use mailrun_common::types::DispatchOutcome;

    #[test]
    fn test_missing_state_has_nothing_to_retry() {
        let dir = tempfile::tempdir().unwrap();
        assert!(pending_failures(&dir.path().join("state.json")).unwrap().is_none());
    }

    #[test]
    fn test_empty_state_has_nothing_to_retry() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        RetryState::new().save(&path).unwrap();

        assert!(pending_failures(&path).unwrap().is_none());
        let entries: Vec<_> = std::fs::read_dir(dir.path()).unwrap().collect();
        assert_eq!(entries.len(), 1);
    }

    #[test]
    fn test_recorded_failures_are_returned() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        let mut state = RetryState::new();
        state.record("B", &DispatchOutcome::Failed("message rejected".into()));
        state.save(&path).unwrap();

        let pending = pending_failures(&path).unwrap().unwrap();
        assert!(pending.contains("B"));
    }

    #[test]
    fn test_unreadable_state_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        std::fs::write(&path, b"not json").unwrap();
        assert!(pending_failures(&path).is_err());
    }
}

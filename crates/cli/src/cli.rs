//! Command-line arguments.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

use mailrun_common::config::AppConfig;
use mailrun_common::types::DispatchMode;
use mailrun_directory::attachments::AttachmentSource;

#[derive(Parser, Debug)]
#[command(name = "mailrun")]
#[command(version, about = "Personalized batch mail with archived sent copies", long_about = None)]
pub struct Cli {
    /// Emit logs as JSON lines
    #[arg(long, global = true, env = "MAILRUN_LOG_JSON")]
    pub log_json: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Write a sample directory file to fill in
    Init {
        /// Where to write it (defaults to the configured directory path)
        #[arg(short, long)]
        path: Option<PathBuf>,
    },

    /// Dispatch every row in the directory
    Run {
        #[command(flatten)]
        batch: BatchArgs,

        #[arg(short, long, value_enum, default_value_t = ModeArg::Draft)]
        mode: ModeArg,
    },

    /// Re-dispatch only the rows that failed last time
    RetryFailed {
        #[command(flatten)]
        batch: BatchArgs,

        #[arg(short, long, value_enum, default_value_t = ModeArg::Send)]
        mode: ModeArg,
    },

    /// Re-send to specific recipients, one message per owning row
    Resend {
        #[command(flatten)]
        batch: BatchArgs,

        /// Addresses separated by commas, semicolons or newlines
        #[arg(long, conflicts_with = "recipients_file", required_unless_present = "recipients_file")]
        recipients: Option<String>,

        /// Read the addresses from a file instead
        #[arg(long)]
        recipients_file: Option<PathBuf>,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum ModeArg {
    Draft,
    Send,
}

impl From<ModeArg> for DispatchMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Draft => DispatchMode::Draft,
            ModeArg::Send => DispatchMode::Send,
        }
    }
}

/// Inputs shared by every dispatching command. Unset options keep the values
/// loaded from the environment.
#[derive(Args, Debug)]
pub struct BatchArgs {
    /// Reporting period start, YYYY-MM-DD
    #[arg(long)]
    pub start: String,

    /// Reporting period end, YYYY-MM-DD
    #[arg(long)]
    pub end: String,

    /// Attach every file in this directory
    #[arg(long, conflicts_with = "attachment", required_unless_present = "attachment")]
    pub attachments_dir: Option<PathBuf>,

    /// Attach this file (repeatable)
    #[arg(long)]
    pub attachment: Vec<PathBuf>,

    /// Directory file (CSV)
    #[arg(long)]
    pub directory: Option<PathBuf>,

    /// Do not archive sent copies
    #[arg(long)]
    pub no_archive: bool,

    #[arg(long)]
    pub archive_dir: Option<PathBuf>,

    /// Seconds to wait for a sent copy to appear (min 10)
    #[arg(long)]
    pub poll_seconds: Option<u64>,

    /// Archive save attempts (min 1)
    #[arg(long)]
    pub save_retries: Option<u32>,

    /// Font preset (yahei, simsun, simhei, fangsong, arial, times) or CSS family list
    #[arg(long)]
    pub font: Option<String>,

    #[arg(long)]
    pub font_pt: Option<u32>,

    #[arg(long)]
    pub state_file: Option<PathBuf>,

    #[arg(long)]
    pub spool_dir: Option<PathBuf>,

    #[arg(long)]
    pub log_dir: Option<PathBuf>,
}

impl BatchArgs {
    pub fn attachment_source(&self) -> AttachmentSource {
        match &self.attachments_dir {
            Some(dir) => AttachmentSource::Directory(dir.clone()),
            None => AttachmentSource::Files(self.attachment.clone()),
        }
    }

    /// Layer command-line overrides onto `config`.
    pub fn apply(&self, config: &mut AppConfig) {
        if let Some(path) = &self.directory {
            config.directory_path = path.clone();
        }
        if self.no_archive {
            config.archive_enabled = false;
        }
        if let Some(dir) = &self.archive_dir {
            config.archive_dir = dir.clone();
        }
        if let Some(secs) = self.poll_seconds {
            config.poll_seconds = secs;
        }
        if let Some(n) = self.save_retries {
            config.save_retries = n;
        }
        if let Some(font) = &self.font {
            config.font_family = font.clone();
        }
        if let Some(pt) = self.font_pt {
            config.font_pt = pt;
        }
        if let Some(path) = &self.state_file {
            config.state_file = path.clone();
        }
        if let Some(dir) = &self.spool_dir {
            config.spool_dir = dir.clone();
        }
        if let Some(dir) = &self.log_dir {
            config.log_dir = dir.clone();
        }
    }
}

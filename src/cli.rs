//! Command-line interface built on clap.
//!
//! Each invocation stands in for one inbound chat action: `--as` is the
//! sender and the subcommand is the bot command they sent.

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

use crate::appeal::{AppealId, AppealKind, UserId};

/// fedappeal: federation unban and admin-request appeals.
#[derive(Debug, Parser)]
#[command(name = "fedappeal", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Chat user id of the sender.
    #[arg(long = "as", global = true, default_value_t = 0, allow_negative_numbers = true)]
    pub sender: UserId,

    /// Sender's username, shown to the administrator.
    #[arg(long, global = true)]
    pub username: Option<String>,

    /// Path to the configuration file.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Appeal database, overriding configuration and FEDAPPEAL_DB.
    #[arg(long, global = true)]
    pub db: Option<PathBuf>,

    /// Enable debug logging.
    #[arg(long, short, global = true, default_value_t = false)]
    pub verbose: bool,
}

/// Appeal kind as typed on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum KindArg {
    /// Federation unban appeal.
    Unban,
    /// Federation admin request.
    Admin,
}

impl From<KindArg> for AppealKind {
    fn from(arg: KindArg) -> Self {
        match arg {
            KindArg::Unban => AppealKind::UnbanAppeal,
            KindArg::Admin => AppealKind::AdminRequest,
        }
    }
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Show the welcome message.
    Start,

    /// Submit an appeal; without a kind, list the choices.
    Appeal { kind: Option<KindArg> },

    /// List pending appeals (admin only).
    Pending {
        /// Zero-based page number.
        #[arg(default_value_t = 0)]
        page: usize,
    },

    /// Approve an appeal (admin only).
    Approve { id: AppealId },

    /// Reject an appeal (admin only).
    Reject { id: AppealId },

    /// Show a single appeal (admin only).
    Show { id: AppealId },

    /// Run the built-in lifecycle demonstration against an in-memory store.
    Demo,
}

impl Command {
    /// Appeal id and decision word for `approve` / `reject`.
    pub fn decision(&self) -> Option<(AppealId, &'static str)> {
        match self {
            Command::Approve { id } => Some((*id, "approve")),
            Command::Reject { id } => Some((*id, "reject")),
            _ => None,
        }
    }
}

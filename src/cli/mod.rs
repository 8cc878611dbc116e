//! Command-line interface for davlock
//!
//! This module defines the CLI structure using clap derive macros.
//! Each subcommand is defined in its own submodule.

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};

use crate::config::Config;
use crate::error::Result;
use crate::lock_state::DesiredState;
use crate::output::OutputOptions;

mod lock;
mod status;

/// davlock - WebDAV user locks
///
/// Lock and unlock files on a Nextcloud-style server and keep the
/// last known lock state in a local sync journal.
#[derive(Parser, Debug)]
#[command(name = "davlock")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to the configuration file (defaults to ./.davlock.toml)
    #[arg(long, global = true, env = "DAVLOCK_CONFIG")]
    pub config: Option<PathBuf>,

    /// Journal directory (overrides journal.dir)
    #[arg(long, global = true, env = "DAVLOCK_JOURNAL")]
    pub journal: Option<PathBuf>,

    /// Output in JSON format
    #[arg(long, global = true)]
    pub json: bool,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Take a user lock on a remote file
    Lock {
        /// File path relative to the user's DAV root
        path: String,
    },

    /// Release a user lock on a remote file
    Unlock {
        /// File path relative to the user's DAV root
        path: String,
    },

    /// Show the lock state recorded in the journal
    Status {
        /// File path relative to the user's DAV root
        path: String,
    },
}

impl Cli {
    /// Execute the CLI command
    pub fn run(self) -> Result<()> {
        let output = OutputOptions {
            json: self.json,
            quiet: self.quiet,
        };
        let config = load_config(self.config.as_deref())?;
        let journal_dir = self
            .journal
            .clone()
            .unwrap_or_else(|| config.journal.dir.clone());

        match self.command {
            Commands::Lock { path } => lock::run(lock::LockOptions {
                path,
                desired: DesiredState::Locked,
                config,
                journal_dir,
                output,
            }),
            Commands::Unlock { path } => lock::run(lock::LockOptions {
                path,
                desired: DesiredState::Unlocked,
                config,
                journal_dir,
                output,
            }),
            Commands::Status { path } => status::run(status::StatusOptions {
                path,
                config,
                journal_dir,
                output,
            }),
        }
    }
}

/// An explicit config path must load; the implicit one falls back to defaults
fn load_config(explicit: Option<&Path>) -> Result<Config> {
    match explicit {
        Some(path) => Config::load(path),
        None => {
            let cwd = std::env::current_dir()?;
            Ok(Config::load_from_dir(&cwd))
        }
    }
}

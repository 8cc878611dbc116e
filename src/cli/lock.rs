//! davlock lock / unlock command implementation
//!
//! Runs one lock operation against the configured server and reports the
//! lock state it left in the journal.

use std::path::PathBuf;
use std::sync::Arc;

use serde::Serialize;

use crate::config::Config;
use crate::error::Result;
use crate::journal::{LockRecordStore, SyncJournal};
use crate::lock_state::{DesiredState, LockInfo};
use crate::operation::{LockOperation, OperationOptions};
use crate::output::{emit_success, HumanOutput, OutputOptions};
use crate::session::HttpSession;

/// Options for the lock and unlock commands
pub struct LockOptions {
    pub path: String,
    pub desired: DesiredState,
    pub config: Config,
    pub journal_dir: PathBuf,
    pub output: OutputOptions,
}

#[derive(Serialize)]
struct LockReport {
    path: String,
    desired: DesiredState,
    /// False when the server had nothing to change
    committed: bool,
    lock: LockInfo,
}

pub fn run(options: LockOptions) -> Result<()> {
    let session = HttpSession::new(&options.config.server, Config::password_from_env())?;
    let journal = Arc::new(SyncJournal::open(&options.journal_dir)?);

    let operation = LockOperation::new(
        &options.path,
        options.desired,
        journal.clone(),
        Arc::new(session),
        OperationOptions::from(&options.config.locks),
    )?;

    let runtime = tokio::runtime::Runtime::new()?;
    let completion = runtime.block_on(operation.start().finished())?;

    let key = completion.path.journal_key().to_string();
    let lock = journal.read(&key);
    let report = LockReport {
        path: key,
        desired: completion.desired,
        committed: completion.committed.is_some(),
        lock,
    };

    let header = match (report.desired, report.committed) {
        (DesiredState::Locked, _) => format!("Locked {}", completion.path),
        (DesiredState::Unlocked, true) => format!("Unlocked {}", completion.path),
        (DesiredState::Unlocked, false) => format!("{} was not locked", completion.path),
    };
    let mut human = HumanOutput::new(header);
    if report.lock.locked {
        human.push_summary("holder", report.lock.holder_label());
        if let Some(expires_at) = report.lock.expires_at() {
            human.push_summary("expires", format_epoch(expires_at));
        }
        human.push_next_step(format!("davlock unlock {}", report.path));
    }

    emit_success(options.output, command_name(report.desired), &report, Some(&human))
}

fn command_name(desired: DesiredState) -> &'static str {
    match desired {
        DesiredState::Locked => "lock",
        DesiredState::Unlocked => "unlock",
    }
}

pub(super) fn format_epoch(secs: i64) -> String {
    chrono::DateTime::from_timestamp(secs, 0)
        .map(|at| at.to_rfc3339())
        .unwrap_or_else(|| secs.to_string())
}

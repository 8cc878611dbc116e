//! davlock status command implementation
//!
//! Reads the journal only; no request is sent.

use std::path::PathBuf;

use serde::Serialize;

use crate::config::Config;
use crate::error::Result;
use crate::facade::{can_request_unlock, current_lock_status};
use crate::journal::{LockRecordStore, SyncJournal};
use crate::lock_state::{LockInfo, LockStatus};
use crate::operation::RemotePath;
use crate::output::{emit_success, HumanOutput, OutputOptions};

use super::lock::format_epoch;

/// Options for the status command
pub struct StatusOptions {
    pub path: String,
    pub config: Config,
    pub journal_dir: PathBuf,
    pub output: OutputOptions,
}

#[derive(Serialize)]
struct StatusReport {
    path: String,
    status: LockStatus,
    expired: bool,
    can_request_unlock: bool,
    lock: LockInfo,
}

pub fn run(options: StatusOptions) -> Result<()> {
    let path = RemotePath::parse(&options.path)?;
    let journal = SyncJournal::open(&options.journal_dir)?;

    let key = path.journal_key();
    let lock = journal.read(key);
    let now = chrono::Utc::now().timestamp();

    let report = StatusReport {
        path: key.to_string(),
        status: current_lock_status(&journal, key),
        expired: lock.is_expired(now),
        can_request_unlock: can_request_unlock(&journal, key, &options.config.server.user),
        lock,
    };

    let mut human = HumanOutput::new(format!("{}: {}", path, report.status));
    if report.lock.locked {
        human.push_summary("holder", report.lock.holder_label());
        human.push_summary("type", report.lock.owner_type.to_string());
        human.push_summary("since", format_epoch(report.lock.lock_time));
        if let Some(expires_at) = report.lock.expires_at() {
            let suffix = if report.expired { " (expired)" } else { "" };
            human.push_summary("expires", format!("{}{}", format_epoch(expires_at), suffix));
        }
        if report.can_request_unlock {
            human.push_next_step(format!("davlock unlock {}", report.path));
        }
    }

    emit_success(options.output, "status", &report, Some(&human))
}

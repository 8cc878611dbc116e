//! Lock operation: one request/response cycle for one file
//!
//! ```text
//! Created ──start──▶ Requesting ──▶ Succeeded
//!    │                    │
//!    └──(offline)──▶ Failed ◀──────┘
//! ```
//!
//! An operation is single-use. It sends at most one request, writes the
//! journal at most once (only for a committed outcome) and delivers exactly
//! one terminal value through its [`LockJob`].

use std::fmt;
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::oneshot;

use crate::classify::{classify, ClassifyContext, Conflict, ConflictKind, Outcome};
use crate::config::LocksConfig;
use crate::error::{Error, Result};
use crate::journal::{path_segments, LockRecordStore};
use crate::lock_state::{DesiredState, LockInfo};
use crate::session::{DavRequest, DavSession, USER_LOCK_HEADER};

// =============================================================================
// Remote paths
// =============================================================================

/// Normalized resource path, always starting with `/`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RemotePath(String);

impl RemotePath {
    pub fn parse(raw: &str) -> Result<Self> {
        let segments = path_segments(raw);
        if let Some(segment) = segments.iter().find(|s| *s == "." || *s == "..") {
            return Err(Error::InvalidArgument(format!(
                "path must not contain '{}' segments: {}",
                segment, raw
            )));
        }

        if segments.is_empty() {
            return Err(Error::InvalidArgument(format!(
                "path does not name a file: '{}'",
                raw
            )));
        }

        Ok(RemotePath(format!("/{}", segments.join("/"))))
    }

    /// Path as sent to the server
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Folder-relative key used by the journal
    pub fn journal_key(&self) -> &str {
        &self.0[1..]
    }
}

impl fmt::Display for RemotePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// =============================================================================
// Operation state
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationState {
    Created,
    Requesting,
    Succeeded,
    Failed,
}

impl OperationState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, OperationState::Succeeded | OperationState::Failed)
    }

    pub fn can_transition_to(&self, next: OperationState) -> bool {
        use OperationState::*;

        matches!(
            (self, next),
            (Created, Requesting) | (Created, Failed) | (Requesting, Succeeded) | (Requesting, Failed)
        )
    }
}

/// Settings an operation needs beyond its target
#[derive(Debug, Clone)]
pub struct OperationOptions {
    /// Lock timeout recorded when the server does not send one
    pub default_timeout: i64,
}

impl Default for OperationOptions {
    fn default() -> Self {
        Self::from(&LocksConfig::default())
    }
}

impl From<&LocksConfig> for OperationOptions {
    fn from(config: &LocksConfig) -> Self {
        Self {
            default_timeout: config.default_timeout_secs,
        }
    }
}

/// Successful terminal value
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockCompletion {
    pub path: RemotePath,
    pub desired: DesiredState,
    /// Lock state written to the journal, `None` for an idempotent no-op
    pub committed: Option<LockInfo>,
}

// =============================================================================
// Lock operation
// =============================================================================

pub struct LockOperation {
    path: RemotePath,
    desired: DesiredState,
    store: Arc<dyn LockRecordStore>,
    session: Arc<dyn DavSession>,
    options: OperationOptions,
    state: OperationState,
}

impl LockOperation {
    pub fn new(
        path: &str,
        desired: DesiredState,
        store: Arc<dyn LockRecordStore>,
        session: Arc<dyn DavSession>,
        options: OperationOptions,
    ) -> Result<Self> {
        Ok(Self {
            path: RemotePath::parse(path)?,
            desired,
            store,
            session,
            options,
            state: OperationState::Created,
        })
    }

    pub fn path(&self) -> &RemotePath {
        &self.path
    }

    pub fn desired(&self) -> DesiredState {
        self.desired
    }

    pub fn state(&self) -> OperationState {
        self.state
    }

    /// Spawn the operation on the current tokio runtime
    ///
    /// Returns immediately; the outcome arrives through [`LockJob::finished`].
    pub fn start(self) -> LockJob {
        let (sender, receiver) = oneshot::channel();
        let path = self.path.clone();
        let desired = self.desired;

        tokio::spawn(async move {
            let result = self.run().await;
            // The job handle may have been dropped; nobody is waiting then.
            let _ = sender.send(result);
        });

        LockJob {
            path,
            desired,
            receiver,
        }
    }

    /// Drive the operation to its terminal state
    pub async fn run(mut self) -> Result<LockCompletion> {
        tracing::info!(path = %self.path, desired = %self.desired, "lock operation started");

        let result = self.execute().await;
        match &result {
            Ok(completion) => {
                self.transition(OperationState::Succeeded);
                tracing::info!(
                    path = %self.path,
                    desired = %self.desired,
                    committed = completion.committed.is_some(),
                    "lock operation succeeded"
                );
            }
            Err(err) => {
                self.transition(OperationState::Failed);
                tracing::warn!(path = %self.path, desired = %self.desired, error = %err, "lock operation failed");
            }
        }
        result
    }

    async fn execute(&mut self) -> Result<LockCompletion> {
        if !self.session.is_connected() {
            return Err(Error::NotConnected);
        }

        self.transition(OperationState::Requesting);

        let request = DavRequest::new(self.desired.verb(), self.path.as_str())
            .header(USER_LOCK_HEADER, "1");
        let response = self
            .session
            .send(request)
            .await
            .map_err(|err| Error::Transport {
                path: self.path.journal_key().to_string(),
                status: None,
                message: err.to_string(),
            })?;

        let ctx = ClassifyContext {
            user_id: self.session.user_id().to_string(),
            display_name: self.session.display_name().to_string(),
            now: Utc::now().timestamp(),
            default_timeout: self.options.default_timeout,
        };
        let outcome = classify(self.desired, response.status, response.body.as_deref(), &ctx);
        tracing::debug!(path = %self.path, status = response.status, ?outcome, "classified lock response");

        match outcome {
            Outcome::Committed(info) => {
                self.commit(&info).await?;
                Ok(self.completion(Some(info)))
            }
            Outcome::NoOpSuccess => Ok(self.completion(None)),
            Outcome::Conflict(conflict) => Err(self.conflict_error(conflict)),
            Outcome::TransportFailure(message) => Err(Error::Transport {
                path: self.path.journal_key().to_string(),
                status: Some(response.status),
                message,
            }),
        }
    }

    async fn commit(&self, info: &LockInfo) -> Result<()> {
        let store = Arc::clone(&self.store);
        let key = self.path.journal_key().to_string();
        let info = info.clone();

        tokio::task::spawn_blocking(move || store.write(&key, &info))
            .await
            .map_err(|err| Error::OperationFailed(format!("journal write aborted: {}", err)))?
    }

    fn completion(&self, committed: Option<LockInfo>) -> LockCompletion {
        LockCompletion {
            path: self.path.clone(),
            desired: self.desired,
            committed,
        }
    }

    fn conflict_error(&self, conflict: Conflict) -> Error {
        let path = self.path.journal_key().to_string();
        match conflict.kind {
            ConflictKind::AlreadyLocked => Error::AlreadyLocked {
                path,
                holder: conflict.holder.label(),
            },
            ConflictKind::ForeignLock => Error::ForeignLock {
                path,
                holder: conflict.holder.label(),
            },
            ConflictKind::UnlockRejected => Error::UnlockRejected { path },
        }
    }

    fn transition(&mut self, next: OperationState) {
        debug_assert!(
            self.state.can_transition_to(next),
            "invalid lock operation transition {:?} -> {:?}",
            self.state,
            next
        );
        tracing::debug!(path = %self.path, from = ?self.state, to = ?next, "lock operation transition");
        self.state = next;
    }
}

/// Handle to a started operation
pub struct LockJob {
    path: RemotePath,
    desired: DesiredState,
    receiver: oneshot::Receiver<Result<LockCompletion>>,
}

impl LockJob {
    pub fn path(&self) -> &RemotePath {
        &self.path
    }

    pub fn desired(&self) -> DesiredState {
        self.desired
    }

    /// Wait for the terminal value
    pub async fn finished(self) -> Result<LockCompletion> {
        self.receiver.await.unwrap_or_else(|_| {
            Err(Error::OperationFailed(
                "lock operation ended without reporting an outcome".to_string(),
            ))
        })
    }
}

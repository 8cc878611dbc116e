//! Lock service: the entry point callers use instead of building operations
//!
//! `request_state` starts a [`LockOperation`] and re-publishes its terminal
//! value as a [`LockEvent`] on a broadcast channel, so GUI code and sync logic
//! can observe outcomes without holding the job handle. The query helpers read
//! the journal directly.

use std::sync::Arc;

use tokio::sync::broadcast;

use crate::journal::LockRecordStore;
use crate::lock_state::{DesiredState, LockInfo, LockStatus};
use crate::operation::{LockOperation, OperationOptions, RemotePath};
use crate::session::DavSession;

const EVENT_CAPACITY: usize = 64;

/// Relayed terminal notification of a lock operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LockEvent {
    Succeeded {
        path: String,
        desired: DesiredState,
    },
    Failed {
        path: String,
        desired: DesiredState,
        message: String,
    },
}

impl LockEvent {
    pub fn path(&self) -> &str {
        match self {
            LockEvent::Succeeded { path, .. } | LockEvent::Failed { path, .. } => path,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, LockEvent::Succeeded { .. })
    }
}

pub struct LockService {
    session: Arc<dyn DavSession>,
    options: OperationOptions,
    events: broadcast::Sender<LockEvent>,
}

impl LockService {
    pub fn new(session: Arc<dyn DavSession>) -> Self {
        Self::with_options(session, OperationOptions::default())
    }

    pub fn with_options(session: Arc<dyn DavSession>, options: OperationOptions) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            session,
            options,
            events,
        }
    }

    /// Observe relayed success/error notifications
    pub fn subscribe(&self) -> broadcast::Receiver<LockEvent> {
        self.events.subscribe()
    }

    /// Ask the server to move `path` to `desired`
    ///
    /// Does nothing while the session is offline. Otherwise the outcome is
    /// published to subscribers once the request completes. Must be called
    /// from within a tokio runtime.
    pub fn request_state(&self, path: &str, store: Arc<dyn LockRecordStore>, desired: DesiredState) {
        if !self.session.is_connected() {
            tracing::debug!(path, %desired, "session offline, ignoring lock request");
            return;
        }

        let events = self.events.clone();
        let operation = match LockOperation::new(
            path,
            desired,
            store,
            Arc::clone(&self.session),
            self.options.clone(),
        ) {
            Ok(operation) => operation,
            Err(err) => {
                publish(
                    &events,
                    LockEvent::Failed {
                        path: path.to_string(),
                        desired,
                        message: err.to_string(),
                    },
                );
                return;
            }
        };

        let job = operation.start();
        let key = job.path().journal_key().to_string();
        tokio::spawn(async move {
            let event = match job.finished().await {
                Ok(_) => LockEvent::Succeeded { path: key, desired },
                Err(err) => LockEvent::Failed {
                    path: key,
                    desired,
                    message: err.to_string(),
                },
            };
            publish(&events, event);
        });
    }

    /// Lock status recorded for `path`
    pub fn current_lock_status(&self, store: &dyn LockRecordStore, path: &str) -> LockStatus {
        current_lock_status(store, path)
    }

    /// Whether `current_user_id` may ask for the lock on `path` to be released
    pub fn can_request_unlock(
        &self,
        store: &dyn LockRecordStore,
        path: &str,
        current_user_id: &str,
    ) -> bool {
        can_request_unlock(store, path, current_user_id)
    }
}

/// Lock status recorded for `path`; paths that cannot name a file are unlocked
pub fn current_lock_status(store: &dyn LockRecordStore, path: &str) -> LockStatus {
    recorded_lock(store, path)
        .map(|info| info.status())
        .unwrap_or(LockStatus::Unlocked)
}

/// Whether `current_user_id` may ask for the lock on `path` to be released
///
/// Only plain user locks held by that user qualify; application locks and
/// other users' locks cannot be released by this caller.
pub fn can_request_unlock(store: &dyn LockRecordStore, path: &str, current_user_id: &str) -> bool {
    recorded_lock(store, path)
        .map(|info| info.is_user_lock_of(current_user_id))
        .unwrap_or(false)
}

// Same key the lock operation writes under.
fn recorded_lock(store: &dyn LockRecordStore, path: &str) -> Option<LockInfo> {
    let path = RemotePath::parse(path).ok()?;
    Some(store.read(path.journal_key()))
}

fn publish(events: &broadcast::Sender<LockEvent>, event: LockEvent) {
    tracing::debug!(?event, "relaying lock event");
    // No subscribers is fine; the journal already holds the result.
    let _ = events.send(event);
}

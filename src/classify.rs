//! Lock response classification
//!
//! Maps `(desired state, status code, body)` to an [`Outcome`]. Pure: no I/O,
//! the clock and the requester identity come in through [`ClassifyContext`].
//!
//! # Status Codes
//!
//! - `2xx`: the transition happened
//! - `423 Locked`: the resource is locked right now (authoritative)
//! - `412 Precondition Failed`: on unlock, either "nothing to unlock" or
//!   "locked by someone else"; the body tells which
//! - anything else: unclassified transport failure

use crate::lock_state::{DesiredState, LockInfo, LockOwnerType};
use crate::response::{BodyError, LockHolder, LockProperties};

pub const STATUS_PRECONDITION_FAILED: u16 = 412;
pub const STATUS_LOCKED: u16 = 423;

/// Requester identity and fallbacks for a success acknowledgment
#[derive(Debug, Clone)]
pub struct ClassifyContext {
    pub user_id: String,
    pub display_name: String,
    /// Epoch seconds, used when the server omits `lock-time`
    pub now: i64,
    /// Seconds, used when the server omits `lock-timeout`
    pub default_timeout: i64,
}

/// Why a transition was refused
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConflictKind {
    /// Lock requested on a resource that is already locked, by anyone
    AlreadyLocked,
    /// Unlock requested on a resource locked by another owner
    ForeignLock,
    /// Unlock refused although the requester holds the lock
    UnlockRejected,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Conflict {
    pub kind: ConflictKind,
    pub holder: LockHolder,
}

/// Result of classifying one response
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Write this lock state and report success
    Committed(LockInfo),
    /// Report success, leave the store alone
    NoOpSuccess,
    Conflict(Conflict),
    TransportFailure(String),
}

impl Outcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Committed(_) | Outcome::NoOpSuccess)
    }
}

pub fn is_success_status(status: u16) -> bool {
    (200..300).contains(&status)
}

/// Classify a `LOCK` / `UNLOCK` response
pub fn classify(
    desired: DesiredState,
    status: u16,
    body: Option<&str>,
    ctx: &ClassifyContext,
) -> Outcome {
    let parsed = LockProperties::parse(body.unwrap_or_default());

    if is_success_status(status) {
        return match desired {
            DesiredState::Unlocked => Outcome::Committed(LockInfo::unlocked()),
            DesiredState::Locked => match parsed {
                Ok(props) => Outcome::Committed(acknowledged_lock(&props, ctx)),
                Err(BodyError::Empty) => {
                    Outcome::Committed(acknowledged_lock(&LockProperties::default(), ctx))
                }
                Err(err @ BodyError::Malformed(_)) => {
                    Outcome::TransportFailure(format!("status {}: {}", status, err))
                }
            },
        };
    }

    let props = match (status, parsed) {
        (STATUS_LOCKED | STATUS_PRECONDITION_FAILED, Ok(props)) => props,
        (_, Err(err)) => return Outcome::TransportFailure(format!("status {}: {}", status, err)),
        (_, Ok(_)) => return Outcome::TransportFailure(format!("unexpected status {}", status)),
    };

    match desired {
        DesiredState::Locked if status == STATUS_LOCKED => Outcome::Conflict(Conflict {
            kind: ConflictKind::AlreadyLocked,
            holder: props.holder(),
        }),
        DesiredState::Locked => {
            Outcome::TransportFailure(format!("unexpected status {} for LOCK", status))
        }
        DesiredState::Unlocked if !props.lock_present => Outcome::NoOpSuccess,
        DesiredState::Unlocked => {
            let holder = props.holder();
            let kind = if holder.owner_type == LockOwnerType::User && holder.owner_id == ctx.user_id
            {
                ConflictKind::UnlockRejected
            } else {
                ConflictKind::ForeignLock
            };
            Outcome::Conflict(Conflict { kind, holder })
        }
    }
}

fn acknowledged_lock(props: &LockProperties, ctx: &ClassifyContext) -> LockInfo {
    LockInfo::locked(
        props.owner_id.clone().unwrap_or_else(|| ctx.user_id.clone()),
        props
            .owner_display_name
            .clone()
            .unwrap_or_else(|| ctx.display_name.clone()),
        props.owner_editor_app.clone().unwrap_or_default(),
        props.owner_type.unwrap_or(LockOwnerType::User),
        props.lock_time.unwrap_or(ctx.now),
        props.lock_timeout.unwrap_or(ctx.default_timeout),
    )
}

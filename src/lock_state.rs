//! Lock state data model
//!
//! A `LockInfo` is the last known server-side lock of a single file. It is
//! embedded in the file's journal record and only ever replaced as a whole.
//!
//! # Owner Types
//!
//! - `user`: lock held directly by a human account (wire value `0`)
//! - `token`: lock held on behalf of an editing application (wire value `1`)

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

// =============================================================================
// Lock Owner Type
// =============================================================================

/// Who holds a lock
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LockOwnerType {
    /// Human-held lock
    #[default]
    User,
    /// Application/editor-held lock
    Token,
}

impl LockOwnerType {
    /// Map the `lock-owner-type` wire value
    ///
    /// Anything other than `0` is treated as an application lock, which a
    /// user can never release on their own.
    pub fn from_wire(value: i64) -> Self {
        if value == 0 {
            LockOwnerType::User
        } else {
            LockOwnerType::Token
        }
    }
}

impl fmt::Display for LockOwnerType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LockOwnerType::User => write!(f, "user"),
            LockOwnerType::Token => write!(f, "token"),
        }
    }
}

// =============================================================================
// Desired State / Lock Status
// =============================================================================

/// State a caller wants a file to transition to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DesiredState {
    Locked,
    Unlocked,
}

impl DesiredState {
    /// WebDAV verb that requests this state
    pub fn verb(&self) -> &'static str {
        match self {
            DesiredState::Locked => "LOCK",
            DesiredState::Unlocked => "UNLOCK",
        }
    }
}

impl fmt::Display for DesiredState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DesiredState::Locked => write!(f, "locked"),
            DesiredState::Unlocked => write!(f, "unlocked"),
        }
    }
}

impl FromStr for DesiredState {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "locked" | "lock" => Ok(DesiredState::Locked),
            "unlocked" | "unlock" => Ok(DesiredState::Unlocked),
            _ => Err(Error::InvalidArgument(format!(
                "Invalid lock state '{}'. Expected: locked, unlocked",
                s
            ))),
        }
    }
}

/// Caller-facing view of a stored lock
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LockStatus {
    Locked,
    Unlocked,
}

impl fmt::Display for LockStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LockStatus::Locked => write!(f, "locked"),
            LockStatus::Unlocked => write!(f, "unlocked"),
        }
    }
}

// =============================================================================
// Lock Info
// =============================================================================

/// Last known lock state of one file
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct LockInfo {
    pub locked: bool,

    #[serde(default)]
    pub owner_id: String,

    #[serde(default)]
    pub owner_display_name: String,

    /// Editor application name, empty for user locks
    #[serde(default)]
    pub owner_editor_app: String,

    #[serde(default)]
    pub owner_type: LockOwnerType,

    /// Seconds since epoch
    #[serde(default)]
    pub lock_time: i64,

    /// Seconds
    #[serde(default)]
    pub lock_timeout: i64,
}

impl LockInfo {
    /// The zero value every file starts with
    pub fn unlocked() -> Self {
        Self::default()
    }

    /// Build an active lock, clearing the editor app for user locks
    pub fn locked(
        owner_id: impl Into<String>,
        owner_display_name: impl Into<String>,
        owner_editor_app: impl Into<String>,
        owner_type: LockOwnerType,
        lock_time: i64,
        lock_timeout: i64,
    ) -> Self {
        let owner_editor_app = match owner_type {
            LockOwnerType::User => String::new(),
            LockOwnerType::Token => owner_editor_app.into(),
        };

        Self {
            locked: true,
            owner_id: owner_id.into(),
            owner_display_name: owner_display_name.into(),
            owner_editor_app,
            owner_type,
            lock_time,
            lock_timeout,
        }
    }

    pub fn status(&self) -> LockStatus {
        if self.locked {
            LockStatus::Locked
        } else {
            LockStatus::Unlocked
        }
    }

    /// Enforce the zero-value invariant on records read back from disk
    pub fn normalized(self) -> Self {
        if self.locked {
            self
        } else {
            Self::unlocked()
        }
    }

    /// Whether `user_id` holds this lock as a plain user lock
    pub fn is_user_lock_of(&self, user_id: &str) -> bool {
        self.locked && self.owner_type == LockOwnerType::User && self.owner_id == user_id
    }

    /// Epoch second at which the server lets the lock lapse
    pub fn expires_at(&self) -> Option<i64> {
        if self.locked && self.lock_timeout > 0 {
            Some(self.lock_time.saturating_add(self.lock_timeout))
        } else {
            None
        }
    }

    pub fn is_expired(&self, now: i64) -> bool {
        self.expires_at().map(|at| now >= at).unwrap_or(false)
    }

    /// Name to show users for the lock holder
    pub fn holder_label(&self) -> String {
        holder_label(
            &self.owner_display_name,
            &self.owner_id,
            &self.owner_editor_app,
            self.owner_type,
        )
    }
}

pub(crate) fn holder_label(
    display_name: &str,
    owner_id: &str,
    editor_app: &str,
    owner_type: LockOwnerType,
) -> String {
    let name = if display_name.trim().is_empty() {
        owner_id
    } else {
        display_name
    };
    let name = if name.trim().is_empty() { "unknown" } else { name };

    match owner_type {
        LockOwnerType::Token if !editor_app.trim().is_empty() => {
            format!("{} ({})", name, editor_app)
        }
        _ => name.to_string(),
    }
}

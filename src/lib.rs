//! davlock - WebDAV user lock library
//!
//! Requests server-side locks on individual files of a synced folder and
//! records the last known lock state in the sync journal.
//!
//! # Core Concepts
//!
//! - **Lock operation**: one LOCK/UNLOCK request for one file, single-use
//! - **Classification**: mapping status code plus property body to an outcome
//! - **Journal**: per-file records; the lock subsystem owns only the lock subset
//! - **Service**: entry point that relays terminal outcomes as events
//!
//! # Module Organization
//!
//! - `cli`: Command-line interface using clap
//! - `config`: Configuration loading from `.davlock.toml`
//! - `error`: Error types and result aliases
//! - `lock_state`: Lock data model
//! - `response`: Lock property body parsing
//! - `classify`: Response classification
//! - `session`: Account seam and the reqwest-backed session
//! - `operation`: Single lock/unlock request lifecycle
//! - `facade`: Lock service and event relay
//! - `journal`: Sync journal record store
//! - `fs_lock`: File locking and atomic writes for the journal

pub mod classify;
pub mod cli;
pub mod config;
pub mod error;
pub mod facade;
pub mod fs_lock;
pub mod journal;
pub mod lock_state;
pub mod operation;
pub mod output;
pub mod response;
pub mod session;

pub use error::{Error, Result};

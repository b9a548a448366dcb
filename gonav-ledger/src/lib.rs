//! Fanm Gonav savings-group ledger
//!
//! On-device data layer for community savings groups: members,
//! contributions, loans and the leadership track, with every mutation
//! queued for later reconciliation.
//!
//! # Architecture
//!
//! - **Record Store**: one RocksDB column family per table, with declared
//!   secondary indexes
//! - **Single Writer**: one actor task runs every ledger operation
//! - **Atomic Operations**: compound operations commit one `WriteBatch`
//! - **Sync Queue**: every committed write is appended to a local log and
//!   broadcast through the status signal
//!
//! # Invariants
//!
//! - `Group.totalSavings` = contributions - loan principal + payoff payments
//! - `Member.balance` = totalContributions - totalLoans
//! - `Group.memberCount` and `Group.activeLoans` count live members and
//!   unpaid loans

#![forbid(unsafe_code)]
#![warn(
    missing_docs,
    rust_2018_idioms,
    missing_debug_implementations,
    clippy::all
)]

pub mod types;
pub mod schema;
pub mod storage;
pub mod sync;
pub mod actor;
pub mod ledger;
pub mod leadership;
pub mod auth;
pub mod seed;
pub mod error;
pub mod config;
pub mod metrics;

// Re-exports
pub use error::{Error, Result};
pub use schema::{Record, Table};
pub use storage::{Store, Transaction};
pub use sync::{StatusSignal, SyncAction, SyncQueueEntry, SyncStatus};
pub use ledger::Ledger;
pub use config::Config;
pub use metrics::Metrics;

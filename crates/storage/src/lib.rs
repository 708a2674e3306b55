// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! Durable event store: write-ahead log, snapshots, checkpointing, and
//! schema migration for the materialized event/document state.

pub mod checkpoint;
pub mod migration;
pub mod snapshot;
pub mod state;
pub mod wal;

pub use checkpoint::{CheckpointError, CheckpointHandle, CheckpointResult, CheckpointWriter, Checkpointer, FsCheckpointWriter, load_snapshot};
pub use migration::{Migration, MigrationError, MigrationRegistry};
pub use snapshot::{Snapshot, SnapshotError, CURRENT_SNAPSHOT_VERSION};
pub use state::{FailOutcome, MaterializedState, StaleRelease};
pub use wal::{Wal, WalEntry, WalError};

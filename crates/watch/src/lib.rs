// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

#![cfg_attr(test, allow(clippy::panic, clippy::unwrap_used, clippy::expect_used))]

pub mod debounce;
pub mod filter;
pub mod watcher;

pub use debounce::{CoalescedChange, Debouncer};
pub use filter::WatchFilter;
pub use watcher::{FolderWatcher, WatchError, WatchMessage, WatchRoot};

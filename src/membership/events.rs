// Copyright (c) 2025 Nikolay Denev <ndenev@gmail.com>
// SPDX-License-Identifier: BSD-3-Clause

//! Refresh event reporting
//!
//! The poller reports each refresh cycle here. The counters back the status
//! endpoint; the broadcast stream is for in-process observers such as tests.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::broadcast;

/// Refresh cycle update
#[derive(Clone, Debug)]
pub enum RefreshUpdate {
    /// Listing pods from the API server
    Fetching,
    /// A new snapshot was published
    Refreshed { members: usize, elapsed_ms: u64 },
    /// The listing failed and the previous snapshot was kept
    Failed {
        error: String,
        consecutive_failures: u32,
    },
}

pub struct RefreshReporter {
    sender: broadcast::Sender<RefreshUpdate>,
    refreshes: AtomicU64,
    failures: AtomicU64,
}

impl RefreshReporter {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(100);
        Self {
            sender,
            refreshes: AtomicU64::new(0),
            failures: AtomicU64::new(0),
        }
    }

    /// Subscribe to refresh updates. Nothing in the server subscribes; the
    /// stream lets embedders and tests watch cycles as they happen.
    pub fn subscribe(&self) -> broadcast::Receiver<RefreshUpdate> {
        self.sender.subscribe()
    }

    pub fn fetching(&self) {
        let _ = self.sender.send(RefreshUpdate::Fetching);
    }

    pub fn refreshed(&self, members: usize, elapsed_ms: u64) {
        self.refreshes.fetch_add(1, Ordering::SeqCst);
        let _ = self.sender.send(RefreshUpdate::Refreshed {
            members,
            elapsed_ms,
        });
    }

    pub fn failed(&self, error: &str, consecutive_failures: u32) {
        self.failures.fetch_add(1, Ordering::SeqCst);
        let _ = self.sender.send(RefreshUpdate::Failed {
            error: error.to_string(),
            consecutive_failures,
        });
    }

    /// Totals so far (successful refreshes, failed refreshes)
    pub fn counts(&self) -> (u64, u64) {
        (
            self.refreshes.load(Ordering::SeqCst),
            self.failures.load(Ordering::SeqCst),
        )
    }
}

impl Default for RefreshReporter {
    fn default() -> Self {
        Self::new()
    }
}

/// Thread-safe handle to the refresh reporter
pub type RefreshHandle = Arc<RefreshReporter>;

pub fn create_refresh_handle() -> RefreshHandle {
    Arc::new(RefreshReporter::new())
}

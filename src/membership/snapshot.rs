// Copyright (c) 2025 Nikolay Denev <ndenev@gmail.com>
// SPDX-License-Identifier: BSD-3-Clause

//! Published view of cluster membership
//!
//! A `Snapshot` is the result of exactly one completed pod listing. The store
//! swaps whole snapshots atomically, so readers see either the previous or the
//! next snapshot and never a mix of the two.

use arc_swap::ArcSwap;
use std::sync::Arc;
use std::time::SystemTime;

use crate::kubernetes::MemberPod;

#[derive(Debug, Clone)]
pub struct Snapshot {
    members: Vec<MemberPod>,
    refreshed_at: Option<SystemTime>,
    valid: bool,
}

impl Snapshot {
    /// Snapshot of a successful refresh taken now
    pub fn new(members: Vec<MemberPod>) -> Self {
        Self::at(members, SystemTime::now())
    }

    pub fn at(members: Vec<MemberPod>, refreshed_at: SystemTime) -> Self {
        Self {
            members,
            refreshed_at: Some(refreshed_at),
            valid: true,
        }
    }

    /// Placeholder served before the first refresh completes
    pub fn empty() -> Self {
        Self {
            members: Vec::new(),
            refreshed_at: None,
            valid: false,
        }
    }

    /// Same members and timestamp, flagged as stale
    pub fn invalidated(&self) -> Self {
        Self {
            members: self.members.clone(),
            refreshed_at: self.refreshed_at,
            valid: false,
        }
    }

    pub fn members(&self) -> &[MemberPod] {
        &self.members
    }

    pub fn refreshed_at(&self) -> Option<SystemTime> {
        self.refreshed_at
    }

    /// Refresh time as UNIX seconds
    pub fn refreshed_at_unix(&self) -> Option<u64> {
        self.refreshed_at.map(|t| {
            t.duration_since(SystemTime::UNIX_EPOCH)
                .unwrap_or_default()
                .as_secs()
        })
    }

    pub fn is_valid(&self) -> bool {
        self.valid
    }

    /// Member names in listing order
    pub fn names(&self) -> Vec<String> {
        self.members.iter().map(|m| m.name().to_string()).collect()
    }
}

impl Default for Snapshot {
    fn default() -> Self {
        Self::empty()
    }
}

/// Holder of the current snapshot. One writer (the poller), many readers.
#[derive(Debug)]
pub struct SnapshotStore {
    current: ArcSwap<Snapshot>,
}

impl SnapshotStore {
    pub fn new() -> Self {
        Self {
            current: ArcSwap::from_pointee(Snapshot::empty()),
        }
    }

    /// Latest complete snapshot; never blocks
    pub fn get(&self) -> Arc<Snapshot> {
        self.current.load_full()
    }

    /// Atomically replace the current snapshot
    pub fn set(&self, snapshot: Snapshot) {
        self.current.store(Arc::new(snapshot));
    }
}

impl Default for SnapshotStore {
    fn default() -> Self {
        Self::new()
    }
}

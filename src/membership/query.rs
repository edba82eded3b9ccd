// Copyright (c) 2025 Nikolay Denev <ndenev@gmail.com>
// SPDX-License-Identifier: BSD-3-Clause

use serde::Serialize;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::time;

use super::events::RefreshHandle;
use super::snapshot::SnapshotStore;
use crate::error::{DiscoveryError, Result};
use crate::kubernetes::{MemberPod, PodLister};

pub const MISSING_FIELDS: &str = "label and namespace must be present";

/// On-demand lookup: both fields are required
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Query {
    namespace: String,
    label_selector: String,
}

impl Query {
    pub fn new(namespace: &str, label_selector: &str) -> Result<Self> {
        if namespace.trim().is_empty() || label_selector.trim().is_empty() {
            return Err(DiscoveryError::InvalidQuery(MISSING_FIELDS));
        }
        Ok(Self {
            namespace: namespace.to_string(),
            label_selector: label_selector.to_string(),
        })
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn label_selector(&self) -> &str {
        &self.label_selector
    }
}

/// Snapshot metadata for callers that care about staleness
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct SnapshotStatus {
    pub valid: bool,
    pub refreshed_at: Option<u64>,
    pub members: usize,
    pub refreshes: u64,
    pub failures: u64,
}

/// Per-member detail for clients that dial peers by address
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct PeerInfo {
    pub name: String,
    pub namespace: String,
    pub ip: Option<String>,
    pub reachable: bool,
}

impl From<&MemberPod> for PeerInfo {
    fn from(member: &MemberPod) -> Self {
        Self {
            name: member.name().to_string(),
            namespace: member.namespace().to_string(),
            ip: member.pod_ip().map(str::to_string),
            reachable: member.is_reachable(),
        }
    }
}

/// Read side of discovery: cached peers and fresh label lookups
#[derive(Clone)]
pub struct QueryService {
    lister: Arc<dyn PodLister>,
    store: Arc<SnapshotStore>,
    reporter: RefreshHandle,
    request_timeout: Duration,
}

impl QueryService {
    pub fn new(
        lister: Arc<dyn PodLister>,
        store: Arc<SnapshotStore>,
        reporter: RefreshHandle,
        request_timeout: Duration,
    ) -> Self {
        Self {
            lister,
            store,
            reporter,
            request_timeout,
        }
    }

    /// Names of all members in the current snapshot
    pub fn list_peers(&self) -> Vec<String> {
        self.store.get().names()
    }

    /// Names of cached members whose pod is Ready and not terminating
    pub fn reachable_peers(&self) -> Vec<String> {
        self.store
            .get()
            .members()
            .iter()
            .filter(|m| m.is_reachable())
            .map(|m| m.name().to_string())
            .collect()
    }

    /// Cached members with their pod IP and reachability
    pub fn peer_details(&self) -> Vec<PeerInfo> {
        self.store.get().members().iter().map(PeerInfo::from).collect()
    }

    /// Fresh lookup against the API server, bypassing the snapshot
    pub async fn query_by_label(&self, namespace: &str, label_selector: &str) -> Result<Vec<String>> {
        let query = Query::new(namespace, label_selector)?;

        let members = time::timeout(
            self.request_timeout,
            self.lister
                .list_pods(query.namespace(), query.label_selector()),
        )
        .await
        .unwrap_or_else(|_| {
            Err(DiscoveryError::DiscoveryUnavailable(format!(
                "pod listing timed out after {:?}",
                self.request_timeout
            )))
        })?;

        Ok(unique_names(&members))
    }

    pub fn status(&self) -> SnapshotStatus {
        let snapshot = self.store.get();
        let (refreshes, failures) = self.reporter.counts();
        SnapshotStatus {
            valid: snapshot.is_valid(),
            refreshed_at: snapshot.refreshed_at_unix(),
            members: snapshot.members().len(),
            refreshes,
            failures,
        }
    }
}

/// Names in listing order, one per (namespace, name) pair
fn unique_names(members: &[MemberPod]) -> Vec<String> {
    let mut seen = HashSet::new();
    members
        .iter()
        .filter(|m| seen.insert((m.namespace(), m.name())))
        .map(|m| m.name().to_string())
        .collect()
}

// Copyright (c) 2025 Nikolay Denev <ndenev@gmail.com>
// SPDX-License-Identifier: BSD-3-Clause

//! Background refresh of the membership snapshot
//!
//! Each cycle lists pods once and, on success, publishes a new snapshot. On
//! failure the previous snapshot stays in place; after `stale_after`
//! consecutive failures it is republished flagged as invalid.

use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::time::{self, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::events::RefreshHandle;
use super::snapshot::{Snapshot, SnapshotStore};
use crate::error::{DiscoveryError, Result};
use crate::kubernetes::PodLister;

#[derive(Debug, Clone)]
pub struct PollerSettings {
    /// Namespace to watch (empty = all namespaces)
    pub namespace: String,
    /// Label selector (empty = all pods)
    pub label_selector: String,
    pub interval: Duration,
    /// Upper bound on a single pod listing
    pub request_timeout: Duration,
    /// Consecutive failures before the snapshot is marked invalid (0 = never)
    pub stale_after: u32,
}

impl Default for PollerSettings {
    fn default() -> Self {
        Self {
            namespace: String::new(),
            label_selector: String::new(),
            interval: Duration::from_secs(10),
            request_timeout: Duration::from_secs(10),
            stale_after: 3,
        }
    }
}

/// The only writer of the snapshot store
pub struct DiscoveryPoller {
    lister: Arc<dyn PodLister>,
    store: Arc<SnapshotStore>,
    reporter: RefreshHandle,
    settings: PollerSettings,
    consecutive_failures: u32,
}

impl DiscoveryPoller {
    pub fn new(
        lister: Arc<dyn PodLister>,
        store: Arc<SnapshotStore>,
        reporter: RefreshHandle,
        settings: PollerSettings,
    ) -> Self {
        Self {
            lister,
            store,
            reporter,
            settings,
            consecutive_failures: 0,
        }
    }

    /// Run one fetch cycle. Returns the member count on success.
    pub async fn refresh_once(&mut self) -> Result<usize> {
        let namespace = &self.settings.namespace;
        let selector = &self.settings.label_selector;

        self.reporter.fetching();
        let start = Instant::now();

        let listing = time::timeout(
            self.settings.request_timeout,
            self.lister.list_pods(namespace, selector),
        )
        .await
        .unwrap_or_else(|_| {
            Err(DiscoveryError::DiscoveryUnavailable(format!(
                "pod listing timed out after {:?}",
                self.settings.request_timeout
            )))
        });

        match listing {
            Ok(members) => {
                let count = members.len();
                self.store.set(Snapshot::new(members));

                if self.consecutive_failures > 0 {
                    info!(
                        failures = self.consecutive_failures,
                        "Discovery recovered after failures"
                    );
                }
                self.consecutive_failures = 0;

                let elapsed_ms = start.elapsed().as_millis() as u64;
                self.reporter.refreshed(count, elapsed_ms);
                debug!(
                    namespace = %namespace,
                    selector = %selector,
                    members = count,
                    elapsed_ms,
                    "Membership snapshot refreshed"
                );
                Ok(count)
            }
            Err(e) => {
                self.consecutive_failures += 1;
                error!(
                    namespace = %namespace,
                    selector = %selector,
                    consecutive_failures = self.consecutive_failures,
                    error = %e,
                    "Membership refresh failed, keeping previous snapshot"
                );
                self.mark_stale_if_needed();
                self.reporter
                    .failed(&e.to_string(), self.consecutive_failures);
                Err(e)
            }
        }
    }

    fn mark_stale_if_needed(&self) {
        let threshold = self.settings.stale_after;
        if threshold == 0 || self.consecutive_failures < threshold {
            return;
        }

        let current = self.store.get();
        if current.is_valid() {
            warn!(
                consecutive_failures = self.consecutive_failures,
                members = current.members().len(),
                "Marking membership snapshot as stale"
            );
            self.store.set(current.invalidated());
        }
    }

    /// Refresh every `interval` until `shutdown` is cancelled.
    ///
    /// The first tick fires one interval from now; the caller is expected to
    /// have run the initial refresh. A fetch in progress when shutdown is
    /// signalled runs to completion.
    pub async fn run(mut self, shutdown: CancellationToken) {
        let mut ticker = time::interval_at(
            time::Instant::now() + self.settings.interval,
            self.settings.interval,
        );
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!(
            interval_secs = self.settings.interval.as_secs_f64(),
            namespace = %self.settings.namespace,
            selector = %self.settings.label_selector,
            "Discovery poller started"
        );

        loop {
            tokio::select! {
                biased;
                _ = shutdown.cancelled() => break,
                _ = ticker.tick() => {}
            }
            // Failures are logged and reported inside; the loop carries on.
            let _ = self.refresh_once().await;
        }

        info!("Discovery poller stopped");
    }
}

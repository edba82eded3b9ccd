// Copyright (c) 2025 Nikolay Denev <ndenev@gmail.com>
// SPDX-License-Identifier: BSD-3-Clause

use k8s_openapi::api::core::v1::Pod;
use std::collections::BTreeMap;

/// One discovered cluster member
///
/// Immutable once built; a refresh replaces the whole set rather than
/// patching members in place.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemberPod {
    name: String,
    namespace: String,
    labels: BTreeMap<String, String>,
    pod_ip: Option<String>,
    ready: bool,
    terminating: bool,
}

impl MemberPod {
    pub fn new(
        name: impl Into<String>,
        namespace: impl Into<String>,
        labels: BTreeMap<String, String>,
    ) -> Self {
        Self {
            name: name.into(),
            namespace: namespace.into(),
            labels,
            pod_ip: None,
            ready: true,
            terminating: false,
        }
    }

    /// Override readiness and termination state
    pub fn with_status(mut self, pod_ip: Option<String>, ready: bool, terminating: bool) -> Self {
        self.pod_ip = pod_ip;
        self.ready = ready;
        self.terminating = terminating;
        self
    }

    /// Build a member from a Pod returned by the API server.
    /// Returns None for pods without a name.
    pub fn from_pod(pod: &Pod) -> Option<Self> {
        let name = pod.metadata.name.clone()?;
        let namespace = pod.metadata.namespace.clone().unwrap_or_default();
        let labels = pod.metadata.labels.clone().unwrap_or_default();

        let status = pod.status.as_ref();
        let pod_ip = status.and_then(|s| s.pod_ip.clone());
        let ready = status
            .and_then(|s| s.conditions.as_ref())
            .is_some_and(|conditions| {
                conditions
                    .iter()
                    .any(|c| c.type_ == "Ready" && c.status == "True")
            });

        Some(Self {
            name,
            namespace,
            labels,
            pod_ip,
            ready,
            terminating: pod.metadata.deletion_timestamp.is_some(),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn labels(&self) -> &BTreeMap<String, String> {
        &self.labels
    }

    pub fn pod_ip(&self) -> Option<&str> {
        self.pod_ip.as_deref()
    }

    /// Ready and not being deleted
    pub fn is_reachable(&self) -> bool {
        self.ready && !self.terminating
    }
}

// Copyright (c) 2025 Nikolay Denev <ndenev@gmail.com>
// SPDX-License-Identifier: BSD-3-Clause

use async_trait::async_trait;
use k8s_openapi::api::core::v1::Pod;
use kube::config::KubeConfigOptions;
use kube::{Api, Client, Config, api::ListParams};
use std::collections::HashSet;
use std::time::Duration;
use tracing::{debug, info, trace};

use super::{MemberPod, PodLister};
use crate::error::{DiscoveryError, Result};

/// Timeout for connecting to K8s API
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Page size for paginated list requests
const PAGE_SIZE: u32 = 500;

/// Pod lister backed by the Kubernetes API server
pub struct KubePodLister {
    client: Client,
}

impl KubePodLister {
    /// Build a client from in-cluster credentials, or from a kubeconfig context
    /// when one is given. Reads are bounded by `read_timeout`.
    pub async fn new(context: Option<&str>, read_timeout: Duration) -> Result<Self> {
        let mut config = match context {
            Some(ctx) => Config::from_kubeconfig(&KubeConfigOptions {
                context: Some(ctx.to_string()),
                ..Default::default()
            })
            .await
            .map_err(|e| {
                DiscoveryError::Configuration(format!(
                    "failed to load kubeconfig for context '{}': {}",
                    ctx, e
                ))
            })?,
            None => Config::infer().await.map_err(|e| {
                DiscoveryError::Configuration(format!("failed to infer client config: {}", e))
            })?,
        };

        config.connect_timeout = Some(CONNECT_TIMEOUT);
        config.read_timeout = Some(read_timeout);

        info!(
            cluster_url = %config.cluster_url,
            default_namespace = %config.default_namespace,
            "Kubernetes client configured"
        );

        let client = Client::try_from(config).map_err(|e| {
            DiscoveryError::Configuration(format!("failed to create client: {}", e))
        })?;

        Ok(Self { client })
    }

    fn api(&self, namespace: &str) -> Api<Pod> {
        if namespace.is_empty() {
            Api::all(self.client.clone())
        } else {
            Api::namespaced(self.client.clone(), namespace)
        }
    }
}

/// Build ListParams for one page of a label-selected listing
fn build_list_params(label_selector: &str, continue_token: Option<&str>) -> ListParams {
    let mut params = ListParams::default().limit(PAGE_SIZE);

    if !label_selector.is_empty() {
        params = params.labels(label_selector);
    }

    if let Some(token) = continue_token {
        params = params.continue_token(token);
    }

    trace!(label_selector = %label_selector, continue_token = ?continue_token, "Built ListParams");

    params
}

/// Append members from one page, skipping (namespace, name) pairs already seen
fn collect_members(
    pods: &[Pod],
    seen: &mut HashSet<(String, String)>,
    members: &mut Vec<MemberPod>,
) {
    for pod in pods {
        let Some(member) = MemberPod::from_pod(pod) else {
            continue;
        };
        if seen.insert((member.namespace().to_string(), member.name().to_string())) {
            members.push(member);
        }
    }
}

#[async_trait]
impl PodLister for KubePodLister {
    async fn list_pods(&self, namespace: &str, label_selector: &str) -> Result<Vec<MemberPod>> {
        let api = self.api(namespace);
        let mut members = Vec::new();
        let mut seen = HashSet::new();
        let mut continue_token: Option<String> = None;
        let mut page_count = 0u32;

        loop {
            let params = build_list_params(label_selector, continue_token.as_deref());
            let list = api.list(&params).await?;
            page_count += 1;

            collect_members(&list.items, &mut seen, &mut members);

            match list.metadata.continue_ {
                Some(token) if !token.is_empty() => continue_token = Some(token),
                _ => break,
            }
        }

        debug!(
            namespace = %namespace,
            selector = %label_selector,
            pages = page_count,
            members = members.len(),
            "Listed pods"
        );

        Ok(members)
    }
}

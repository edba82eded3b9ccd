mod client;
#[cfg(test)]
pub mod fake;
mod member;

pub use client::KubePodLister;
pub use member::MemberPod;

use async_trait::async_trait;

use crate::error::Result;

/// Capability to list pods by namespace and label selector
///
/// An empty namespace means all namespaces. The selector is passed to the
/// API server as-is. Implementations do not retry; that policy belongs to
/// the caller.
#[async_trait]
pub trait PodLister: Send + Sync {
    async fn list_pods(&self, namespace: &str, label_selector: &str) -> Result<Vec<MemberPod>>;
}

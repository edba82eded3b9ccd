// Copyright (c) 2025 Nikolay Denev <ndenev@gmail.com>
// SPDX-License-Identifier: BSD-3-Clause

//! Error taxonomy for peer discovery
//!
//! Adapter failures are recovered by the poller and surfaced as 500s for
//! on-demand queries; invalid queries are client mistakes and map to 400.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, DiscoveryError>;

#[derive(Debug, Error)]
pub enum DiscoveryError {
    /// The control-plane client could not be constructed
    #[error("configuration error: {0}")]
    Configuration(String),

    /// A list-pods call failed (network, auth, API error or timeout)
    #[error("discovery unavailable: {0}")]
    DiscoveryUnavailable(String),

    /// Namespace or label selector missing from an on-demand query
    #[error("{0}")]
    InvalidQuery(&'static str),

    /// A result could not be serialized for the wire
    #[error("encoding error: {0}")]
    Encoding(#[from] serde_json::Error),
}

impl DiscoveryError {
    /// True for errors caused by the caller rather than the service
    pub fn is_client_error(&self) -> bool {
        matches!(self, DiscoveryError::InvalidQuery(_))
    }
}

impl From<kube::Error> for DiscoveryError {
    fn from(err: kube::Error) -> Self {
        DiscoveryError::DiscoveryUnavailable(err.to_string())
    }
}

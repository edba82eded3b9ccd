// Copyright (c) 2025 Nikolay Denev <ndenev@gmail.com>
// SPDX-License-Identifier: BSD-3-Clause

//! Runtime configuration
//!
//! Built-in defaults, overridden by an optional JSON file, overridden by
//! command-line flags.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

use crate::cli::Args;
use crate::error::DiscoveryError;
use crate::membership::PollerSettings;

pub const DEFAULT_PORT: u16 = 8888;
pub const DEFAULT_BIND: &str = "0.0.0.0";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub port: u16,
    pub bind: String,
    /// Namespace polled for peers (empty = all namespaces)
    pub namespace: String,
    /// Label selector for polled peers (empty = all pods)
    pub selector: String,
    pub poll_interval_secs: u64,
    pub request_timeout_secs: u64,
    pub shutdown_timeout_secs: u64,
    pub stale_after: u32,
    /// Kubeconfig context; in-cluster credentials when unset
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            bind: DEFAULT_BIND.to_string(),
            namespace: String::new(),
            selector: String::new(),
            poll_interval_secs: 10,
            request_timeout_secs: 10,
            shutdown_timeout_secs: 2,
            stale_after: 3,
            context: None,
        }
    }
}

impl Config {
    /// Load config from a JSON file
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let config: Config = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
        Ok(config)
    }

    /// Defaults, then `--config` file, then flags; validated
    pub fn resolve(args: &Args) -> Result<Self> {
        let mut config = match &args.config {
            Some(path) => Self::load(path)?,
            None => Self::default(),
        };
        config.apply_args(args);
        config.validate()?;
        Ok(config)
    }

    pub fn apply_args(&mut self, args: &Args) {
        if let Some(port) = args.port {
            self.port = port;
        }
        if let Some(ref bind) = args.bind {
            self.bind = bind.clone();
        }
        if let Some(ref namespace) = args.namespace {
            self.namespace = namespace.clone();
        }
        if let Some(ref selector) = args.selector {
            self.selector = selector.clone();
        }
        if let Some(secs) = args.poll_interval {
            self.poll_interval_secs = secs;
        }
        if let Some(secs) = args.request_timeout {
            self.request_timeout_secs = secs;
        }
        if let Some(secs) = args.shutdown_timeout {
            self.shutdown_timeout_secs = secs;
        }
        if let Some(failures) = args.stale_after {
            self.stale_after = failures;
        }
        if args.context.is_some() {
            self.context = args.context.clone();
        }
    }

    pub fn validate(&self) -> std::result::Result<(), DiscoveryError> {
        if self.poll_interval_secs == 0 {
            return Err(DiscoveryError::Configuration(
                "poll interval must be at least 1 second".to_string(),
            ));
        }
        if self.request_timeout_secs == 0 {
            return Err(DiscoveryError::Configuration(
                "request timeout must be at least 1 second".to_string(),
            ));
        }
        Ok(())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout_secs)
    }

    pub fn poller_settings(&self) -> PollerSettings {
        PollerSettings {
            namespace: self.namespace.clone(),
            label_selector: self.selector.clone(),
            interval: Duration::from_secs(self.poll_interval_secs),
            request_timeout: self.request_timeout(),
            stale_after: self.stale_after,
        }
    }
}

// Copyright (c) 2025 Nikolay Denev <ndenev@gmail.com>
// SPDX-License-Identifier: BSD-3-Clause

use clap::Parser;
use std::path::PathBuf;

/// Flags left unset fall back to the config file, then to built-in defaults
#[derive(Parser, Debug, Default)]
#[command(name = "k8s-peer-discovery")]
#[command(author, version, about = "Discover cluster peers from Kubernetes pods")]
pub struct Args {
    /// Port to listen on [default: 8888]
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Address to bind to [default: 0.0.0.0]
    #[arg(short, long)]
    pub bind: Option<String>,

    /// Namespace polled for peers (empty for all namespaces)
    #[arg(short, long)]
    pub namespace: Option<String>,

    /// Label selector for polled peers, e.g. "app=raft"
    #[arg(short = 'l', long)]
    pub selector: Option<String>,

    /// Seconds between membership refreshes [default: 10]
    #[arg(long, value_name = "SECONDS")]
    pub poll_interval: Option<u64>,

    /// Upper bound on a single API server listing [default: 10]
    #[arg(long, value_name = "SECONDS")]
    pub request_timeout: Option<u64>,

    /// Grace period for in-flight work on shutdown [default: 2]
    #[arg(long, value_name = "SECONDS")]
    pub shutdown_timeout: Option<u64>,

    /// Consecutive refresh failures before peers are reported stale, 0 to disable [default: 3]
    #[arg(long, value_name = "FAILURES")]
    pub stale_after: Option<u32>,

    /// Kubeconfig context to use instead of in-cluster credentials
    #[arg(short, long, value_name = "CONTEXT")]
    pub context: Option<String>,

    /// JSON configuration file
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Also write rotated log files to this directory
    #[arg(long, value_name = "DIR")]
    pub log_dir: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_flags() {
        let args = Args::parse_from(["k8s-peer-discovery"]);
        assert!(args.port.is_none());
        assert!(args.selector.is_none());
        assert!(!args.verbose);
    }

    #[test]
    fn test_flags() {
        let args = Args::parse_from([
            "k8s-peer-discovery",
            "--port",
            "8080",
            "-n",
            "raft",
            "-l",
            "app=raft",
            "--poll-interval",
            "5",
            "--stale-after",
            "0",
            "-v",
        ]);
        assert_eq!(args.port, Some(8080));
        assert_eq!(args.namespace.as_deref(), Some("raft"));
        assert_eq!(args.selector.as_deref(), Some("app=raft"));
        assert_eq!(args.poll_interval, Some(5));
        assert_eq!(args.stale_after, Some(0));
        assert!(args.verbose);
    }

    #[test]
    fn test_invalid_port_rejected() {
        assert!(Args::try_parse_from(["k8s-peer-discovery", "--port", "70000"]).is_err());
    }
}

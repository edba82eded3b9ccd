// Copyright (c) 2025 Nikolay Denev <ndenev@gmail.com>
// SPDX-License-Identifier: BSD-3-Clause

use anyhow::Result;
use clap::Parser;
use std::path::Path;
use tracing_subscriber::prelude::*;

use k8s_peer_discovery::cli::Args;
use k8s_peer_discovery::config::Config;
use k8s_peer_discovery::lifecycle;

/// Initialize logging to stderr, plus rotated files when a log directory is given
fn init_logging(verbose: bool, log_dir: Option<&Path>) {
    use tracing_rolling_file::{RollingConditionBase, RollingFileAppenderBase};
    use tracing_subscriber::fmt::format::FmtSpan;

    let filter = if verbose {
        "k8s_peer_discovery=debug"
    } else {
        "k8s_peer_discovery=info"
    };
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter));

    let stderr_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_span_events(FmtSpan::NONE);

    // File appender with size-based rotation:
    // - Max 10MB per file
    // - Keep up to 5 files
    // - Also rotate daily
    let file_layer = log_dir.and_then(|dir| {
        if let Err(e) = std::fs::create_dir_all(dir) {
            eprintln!("Warning: Could not create log directory: {}", e);
            return None;
        }

        let condition = RollingConditionBase::new()
            .daily()
            .max_size(10 * 1024 * 1024);

        match RollingFileAppenderBase::new(dir.join("k8s-peer-discovery.log"), condition, 5) {
            Ok(appender) => {
                let (non_blocking, guard) = appender.get_non_blocking_appender();
                // Keep the background writer alive for the life of the process
                std::mem::forget(guard);
                Some(
                    tracing_subscriber::fmt::layer()
                        .with_writer(non_blocking)
                        .with_ansi(false)
                        .with_span_events(FmtSpan::NONE),
                )
            }
            Err(e) => {
                eprintln!("Warning: Could not create log file: {}", e);
                None
            }
        }
    });

    tracing_subscriber::registry()
        .with(env_filter)
        .with(stderr_layer)
        .with(file_layer)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    // Install rustls crypto provider (aws-lc-rs)
    rustls::crypto::aws_lc_rs::default_provider()
        .install_default()
        .expect("Failed to install rustls crypto provider");

    let args = Args::parse();
    init_logging(args.verbose, args.log_dir.as_deref());

    let config = Config::resolve(&args)?;
    tracing::debug!(?config, "Resolved configuration");

    lifecycle::run(&config).await
}

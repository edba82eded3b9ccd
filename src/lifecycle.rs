// Copyright (c) 2025 Nikolay Denev <ndenev@gmail.com>
// SPDX-License-Identifier: BSD-3-Clause

//! Process wiring: startup, background tasks and graceful shutdown
//!
//! Startup aborts if the first membership listing fails or the listener
//! cannot be bound. Once running, a termination signal (or the server dying)
//! cancels the poller and the HTTP server, which get `shutdown_timeout` to
//! finish in-flight work before they are abandoned.

use anyhow::{Context, Result, anyhow};
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::config::Config;
use crate::daemon::HttpServer;
use crate::kubernetes::{KubePodLister, PodLister};
use crate::membership::{DiscoveryPoller, QueryService, SnapshotStore, create_refresh_handle};

/// Poller and HTTP server running in the background
pub struct RunningService {
    local_addr: SocketAddr,
    shutdown: CancellationToken,
    shutdown_timeout: Duration,
    poller: JoinHandle<()>,
    server: JoinHandle<Result<()>>,
}

/// Build the Kubernetes client, start everything and block until a
/// termination signal arrives
pub async fn run(config: &Config) -> Result<()> {
    info!("Starting Kubernetes peer discovery");

    let lister = KubePodLister::new(config.context.as_deref(), config.request_timeout())
        .await
        .context("Failed to set up Kubernetes client")?;

    start(config, Arc::new(lister))
        .await?
        .wait(shutdown_signal())
        .await
}

/// Run the initial refresh, bind the listener and spawn the background tasks
pub async fn start(config: &Config, lister: Arc<dyn PodLister>) -> Result<RunningService> {
    let store = Arc::new(SnapshotStore::new());
    let reporter = create_refresh_handle();

    let mut poller = DiscoveryPoller::new(
        Arc::clone(&lister),
        Arc::clone(&store),
        Arc::clone(&reporter),
        config.poller_settings(),
    );
    let members = poller
        .refresh_once()
        .await
        .context("Initial membership discovery failed")?;
    info!(members, "Initial membership discovered");

    let queries = QueryService::new(lister, store, reporter, config.request_timeout());
    let server = HttpServer::bind(&config.bind, config.port, queries).await?;
    let local_addr = server.local_addr()?;

    let shutdown = CancellationToken::new();
    let poller = tokio::spawn(poller.run(shutdown.clone()));
    let server = tokio::spawn(server.run(shutdown.clone()));

    Ok(RunningService {
        local_addr,
        shutdown,
        shutdown_timeout: config.shutdown_timeout(),
        poller,
        server,
    })
}

impl RunningService {
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Wait for `signal` (or the server exiting on its own), then shut down.
    /// Returns an error if the server stopped without being asked to.
    pub async fn wait(self, signal: impl Future<Output = ()>) -> Result<()> {
        let RunningService {
            shutdown,
            shutdown_timeout,
            poller,
            mut server,
            ..
        } = self;

        let early_exit = tokio::select! {
            _ = signal => None,
            joined = &mut server => Some(joined),
        };

        let failure = early_exit.map(|joined| match joined {
            Ok(Ok(())) => anyhow!("Discovery server exited unexpectedly"),
            Ok(Err(e)) => e,
            Err(e) => anyhow!("Discovery server task failed: {}", e),
        });
        let server = match &failure {
            Some(e) => {
                error!(error = %e, "Discovery server stopped, shutting down");
                None
            }
            None => Some(server),
        };

        info!("Initiating graceful shutdown");
        shutdown.cancel();

        let drain = async move {
            if let Err(e) = poller.await {
                error!(error = %e, "Discovery poller task failed");
            }
            if let Some(server) = server {
                match server.await {
                    Ok(Ok(())) => {}
                    Ok(Err(e)) => error!(error = %e, "Error while shutting down discovery server"),
                    Err(e) => error!(error = %e, "Discovery server task failed"),
                }
            }
        };

        match time::timeout(shutdown_timeout, drain).await {
            Ok(()) => info!("Shutdown complete"),
            Err(_) => warn!(
                timeout_secs = shutdown_timeout.as_secs_f64(),
                "Graceful shutdown timed out, abandoning in-flight work"
            ),
        }

        match failure {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

/// Resolves on SIGTERM, SIGHUP, SIGABRT or Ctrl-C
pub async fn shutdown_signal() {
    let ctrl_c = async {
        match tokio::signal::ctrl_c().await {
            Ok(()) => "SIGINT",
            Err(e) => {
                error!(error = %e, "Failed to install Ctrl-C handler");
                std::future::pending().await
            }
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::SignalKind;

        tokio::select! {
            name = unix_signal(SignalKind::terminate(), "SIGTERM") => name,
            name = unix_signal(SignalKind::hangup(), "SIGHUP") => name,
            name = unix_signal(SignalKind::from_raw(libc::SIGABRT), "SIGABRT") => name,
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<&'static str>();

    let name = tokio::select! {
        name = ctrl_c => name,
        name = terminate => name,
    };
    info!(signal = name, "Received termination signal");
}

#[cfg(unix)]
async fn unix_signal(kind: tokio::signal::unix::SignalKind, name: &'static str) -> &'static str {
    match tokio::signal::unix::signal(kind) {
        Ok(mut stream) => {
            stream.recv().await;
            name
        }
        Err(e) => {
            error!(signal = name, error = %e, "Failed to install signal handler");
            std::future::pending().await
        }
    }
}

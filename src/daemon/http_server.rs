// Copyright (c) 2025 Nikolay Denev <ndenev@gmail.com>
// SPDX-License-Identifier: BSD-3-Clause

use std::net::SocketAddr;

use anyhow::Context;
use axum::Router;
use axum::extract::rejection::PathRejection;
use axum::extract::{ConnectInfo, Path, State};
use axum::http::{Method, StatusCode, Uri, header};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::error::DiscoveryError;
use crate::membership::{MISSING_FIELDS, QueryService};

/// HTTP server exposing discovered peers
pub struct HttpServer {
    listener: TcpListener,
    queries: QueryService,
}

impl HttpServer {
    /// Bind the listening socket. Fails fast so startup can abort.
    pub async fn bind(bind_address: &str, port: u16, queries: QueryService) -> anyhow::Result<Self> {
        let server_addr = format!("{}:{}", bind_address, port);
        let listener = TcpListener::bind(&server_addr)
            .await
            .with_context(|| format!("Failed to bind discovery server to {}", server_addr))?;
        Ok(Self { listener, queries })
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Serve until `shutdown` is cancelled, then drain in-flight requests
    pub async fn run(self, shutdown: CancellationToken) -> anyhow::Result<()> {
        let addr = self.local_addr()?;
        info!("Discovery server listening on {}", addr);

        let app = router(self.queries).into_make_service_with_connect_info::<SocketAddr>();
        axum::serve(self.listener, app)
            .with_graceful_shutdown(async move { shutdown.cancelled().await })
            .await
            .context("Discovery server failed")?;

        info!("Discovery server stopped");
        Ok(())
    }
}

pub fn router(queries: QueryService) -> Router {
    Router::new()
        .route("/v1/nodes", get(nodes_missing_fields))
        .route("/v1/nodes/", get(nodes_missing_fields))
        .route("/v1/nodes/{*path}", get(nodes_with_label))
        .route("/peers", get(peers))
        .route("/peers/reachable", get(reachable_peers))
        .route("/peers/members", get(peer_members))
        .route("/peers/status", get(peer_status))
        .fallback(not_found)
        .with_state(queries)
}

impl IntoResponse for DiscoveryError {
    fn into_response(self) -> Response {
        let status = if self.is_client_error() {
            StatusCode::BAD_REQUEST
        } else {
            StatusCode::INTERNAL_SERVER_ERROR
        };
        (
            status,
            [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
            self.to_string(),
        )
            .into_response()
    }
}

/// Split `{ns}/{label}`; the selector may itself contain '/'
fn split_nodes_path(path: &str) -> (&str, &str) {
    path.split_once('/').unwrap_or((path, ""))
}

fn json_response<T: serde::Serialize>(value: &T) -> Result<Response, DiscoveryError> {
    let body = serde_json::to_vec(value)?;
    Ok((
        StatusCode::OK,
        [(header::CONTENT_TYPE, "application/json")],
        body,
    )
        .into_response())
}

fn encode_or_500<T: serde::Serialize>(remote: SocketAddr, value: &T) -> Response {
    json_response(value).unwrap_or_else(|e| {
        error!(remote = %remote, error = %e, "Failed to encode response");
        e.into_response()
    })
}

async fn nodes_missing_fields(
    ConnectInfo(remote): ConnectInfo<SocketAddr>,
    uri: Uri,
) -> Response {
    let err = DiscoveryError::InvalidQuery(MISSING_FIELDS);
    warn!(remote = %remote, uri = %uri, "Rejected nodes query: {}", err);
    err.into_response()
}

async fn nodes_with_label(
    State(queries): State<QueryService>,
    ConnectInfo(remote): ConnectInfo<SocketAddr>,
    uri: Uri,
    path: Result<Path<String>, PathRejection>,
) -> Response {
    let path = match path {
        Ok(Path(path)) => path,
        Err(rejection) => {
            warn!(remote = %remote, uri = %uri, "Rejected nodes query: {}", rejection);
            return rejection.into_response();
        }
    };
    let (namespace, selector) = split_nodes_path(&path);

    match queries.query_by_label(namespace, selector).await {
        Ok(names) => {
            info!(
                remote = %remote,
                namespace = %namespace,
                selector = %selector,
                members = names.len(),
                "Served nodes query"
            );
            encode_or_500(remote, &names)
        }
        Err(e) if e.is_client_error() => {
            warn!(remote = %remote, path = %path, "Rejected nodes query: {}", e);
            e.into_response()
        }
        Err(e) => {
            error!(
                remote = %remote,
                namespace = %namespace,
                selector = %selector,
                error = %e,
                "Failed to retrieve pods"
            );
            e.into_response()
        }
    }
}

async fn peers(
    State(queries): State<QueryService>,
    ConnectInfo(remote): ConnectInfo<SocketAddr>,
) -> Response {
    let names = queries.list_peers();
    info!(remote = %remote, members = names.len(), "Served peers");
    encode_or_500(remote, &names)
}

async fn reachable_peers(
    State(queries): State<QueryService>,
    ConnectInfo(remote): ConnectInfo<SocketAddr>,
) -> Response {
    let names = queries.reachable_peers();
    info!(remote = %remote, members = names.len(), "Served reachable peers");
    encode_or_500(remote, &names)
}

async fn peer_members(
    State(queries): State<QueryService>,
    ConnectInfo(remote): ConnectInfo<SocketAddr>,
) -> Response {
    let details = queries.peer_details();
    info!(remote = %remote, members = details.len(), "Served peer members");
    encode_or_500(remote, &details)
}

async fn peer_status(
    State(queries): State<QueryService>,
    ConnectInfo(remote): ConnectInfo<SocketAddr>,
) -> Response {
    let status = queries.status();
    info!(remote = %remote, valid = status.valid, "Served peer status");
    encode_or_500(remote, &status)
}

async fn not_found(
    ConnectInfo(remote): ConnectInfo<SocketAddr>,
    method: Method,
    uri: Uri,
) -> Response {
    warn!(remote = %remote, method = %method, uri = %uri, "No route");
    (StatusCode::NOT_FOUND, "not found").into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kubernetes::MemberPod;
    use crate::kubernetes::fake::{FakeLister, members};
    use crate::membership::{Snapshot, SnapshotStore, create_refresh_handle};
    use std::collections::BTreeMap;
    use std::sync::Arc;
    use std::time::Duration;

    struct TestServer {
        base: String,
        store: Arc<SnapshotStore>,
        lister: Arc<FakeLister>,
        shutdown: CancellationToken,
        handle: tokio::task::JoinHandle<anyhow::Result<()>>,
    }

    impl TestServer {
        async fn start(lister: FakeLister) -> Self {
            let lister = Arc::new(lister);
            let store = Arc::new(SnapshotStore::new());
            let queries = QueryService::new(
                lister.clone(),
                Arc::clone(&store),
                create_refresh_handle(),
                Duration::from_secs(5),
            );
            let server = HttpServer::bind("127.0.0.1", 0, queries).await.unwrap();
            let base = format!("http://{}", server.local_addr().unwrap());
            let shutdown = CancellationToken::new();
            let handle = tokio::spawn(server.run(shutdown.clone()));
            Self {
                base,
                store,
                lister,
                shutdown,
                handle,
            }
        }

        async fn get(&self, path: &str) -> (u16, String) {
            let response = reqwest::get(format!("{}{}", self.base, path)).await.unwrap();
            let status = response.status().as_u16();
            (status, response.text().await.unwrap())
        }

        async fn stop(self) {
            self.shutdown.cancel();
            self.handle.await.unwrap().unwrap();
        }
    }

    #[test]
    fn test_split_nodes_path() {
        assert_eq!(split_nodes_path("default/app=x"), ("default", "app=x"));
        assert_eq!(split_nodes_path("/app=x"), ("", "app=x"));
        assert_eq!(split_nodes_path("default/"), ("default", ""));
        assert_eq!(split_nodes_path("default"), ("default", ""));
        assert_eq!(
            split_nodes_path("default/app.kubernetes.io/name=x"),
            ("default", "app.kubernetes.io/name=x")
        );
    }

    #[tokio::test]
    async fn test_nodes_with_label() {
        let server = TestServer::start(FakeLister::returning(members(&["pod-a", "pod-b"]))).await;

        let (status, body) = server.get("/v1/nodes/default/app=x").await;
        assert_eq!(status, 200);
        assert_eq!(body, r#"["pod-a","pod-b"]"#);
        assert_eq!(
            server.lister.calls(),
            vec![("default".to_string(), "app=x".to_string())]
        );

        server.stop().await;
    }

    #[tokio::test]
    async fn test_nodes_missing_namespace_is_bad_request() {
        let server = TestServer::start(FakeLister::returning(members(&["pod-a"]))).await;

        let (status, body) = server.get("/v1/nodes//app=x").await;
        assert_eq!(status, 400);
        assert_eq!(body, "label and namespace must be present");

        for path in ["/v1/nodes/default/", "/v1/nodes/default", "/v1/nodes/", "/v1/nodes"] {
            let (status, body) = server.get(path).await;
            assert_eq!(status, 400, "{}", path);
            assert_eq!(body, "label and namespace must be present", "{}", path);
        }

        assert!(server.lister.calls().is_empty());
        server.stop().await;
    }

    #[tokio::test]
    async fn test_nodes_undecodable_path_is_bad_request() {
        let server = TestServer::start(FakeLister::returning(members(&["pod-a"]))).await;

        let (status, _) = server.get("/v1/nodes/default/app=%FF").await;
        assert_eq!(status, 400);
        assert!(server.lister.calls().is_empty());

        server.stop().await;
    }

    #[tokio::test]
    async fn test_nodes_discovery_failure_is_server_error() {
        let server = TestServer::start(FakeLister::failing("connection refused")).await;

        let (status, body) = server.get("/v1/nodes/default/app=x").await;
        assert_eq!(status, 500);
        assert!(body.contains("connection refused"));

        server.stop().await;
    }

    #[tokio::test]
    async fn test_nodes_selector_with_slash() {
        let server = TestServer::start(FakeLister::returning(members(&["pod-a"]))).await;

        let (status, _) = server.get("/v1/nodes/raft/app.kubernetes.io/name=raft").await;
        assert_eq!(status, 200);
        assert_eq!(
            server.lister.calls(),
            vec![("raft".to_string(), "app.kubernetes.io/name=raft".to_string())]
        );

        server.stop().await;
    }

    #[tokio::test]
    async fn test_peers_serves_latest_snapshot() {
        let server = TestServer::start(FakeLister::returning(vec![])).await;

        let (status, body) = server.get("/peers").await;
        assert_eq!(status, 200);
        assert_eq!(body, "[]");

        server.store.set(Snapshot::new(members(&["s1-a", "s1-b"])));
        server.store.set(Snapshot::new(members(&["s2-a"])));

        let (status, body) = server.get("/peers").await;
        assert_eq!(status, 200);
        assert_eq!(body, r#"["s2-a"]"#);
        assert!(server.lister.calls().is_empty());

        server.stop().await;
    }

    #[tokio::test]
    async fn test_reachable_peers() {
        let server = TestServer::start(FakeLister::returning(vec![])).await;
        server.store.set(Snapshot::new(vec![
            MemberPod::new("pod-a", "default", BTreeMap::new()),
            MemberPod::new("pod-b", "default", BTreeMap::new()).with_status(None, false, false),
        ]));

        let (status, body) = server.get("/peers/reachable").await;
        assert_eq!(status, 200);
        assert_eq!(body, r#"["pod-a"]"#);

        server.stop().await;
    }

    #[tokio::test]
    async fn test_peer_members_include_ip() {
        let server = TestServer::start(FakeLister::returning(vec![])).await;
        server.store.set(Snapshot::new(vec![
            MemberPod::new("pod-a", "default", BTreeMap::new())
                .with_status(Some("10.0.0.7".to_string()), true, false),
            MemberPod::new("pod-b", "default", BTreeMap::new()).with_status(None, false, false),
        ]));

        let (status, body) = server.get("/peers/members").await;
        assert_eq!(status, 200);
        let value: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert_eq!(
            value,
            serde_json::json!([
                {"name": "pod-a", "namespace": "default", "ip": "10.0.0.7", "reachable": true},
                {"name": "pod-b", "namespace": "default", "ip": null, "reachable": false},
            ])
        );

        server.stop().await;
    }

    #[tokio::test]
    async fn test_peer_status() {
        let server = TestServer::start(FakeLister::returning(vec![])).await;

        let (status, body) = server.get("/peers/status").await;
        assert_eq!(status, 200);
        let value: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert_eq!(value["valid"], false);
        assert!(value["refreshed_at"].is_null());

        server.store.set(Snapshot::new(members(&["pod-a"])));
        let (_, body) = server.get("/peers/status").await;
        let value: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert_eq!(value["valid"], true);
        assert_eq!(value["members"], 1);

        server.stop().await;
    }

    #[tokio::test]
    async fn test_unknown_route_is_not_found() {
        let server = TestServer::start(FakeLister::returning(vec![])).await;
        let (status, _) = server.get("/v2/whatever").await;
        assert_eq!(status, 404);
        server.stop().await;
    }
}

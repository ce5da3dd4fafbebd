#![allow(dead_code)]

use std::path::Path;

use axum::body::Body;
use axum::http::{Method, Request};
use axum::response::Response;
use axum::Router;
use http_body_util::BodyExt;
use tempfile::TempDir;
use tower::ServiceExt;

use ansiweb_api::config::{ServerConfig, SitePaths};
use ansiweb_api::router::build_app_router;
use ansiweb_api::state::AppState;
use ansiweb_core::jobs::{EngineConfig, JobsConfig, OrphanPolicy};

/// Engine stand-in that prints the playbook it was given and succeeds.
pub const ECHO_PLAYBOOK: &str = "cat \"$3\"\n";

/// Engine stand-in that keeps running until it is killed.
pub const LONG_RUNNING: &str = "exec sleep 30\n";

/// A router over a throwaway base directory.
///
/// The directory is removed when this value is dropped, so keep it alive for
/// the duration of the test.
pub struct TestApp {
    pub root: TempDir,
    pub state: AppState,
    pub router: Router,
}

impl TestApp {
    /// Fresh router sharing this app's state.
    pub fn app(&self) -> Router {
        self.router.clone()
    }
}

/// Build a test `ServerConfig` rooted at `base`, running `script` through
/// `/bin/sh` in place of the playbook engine.
pub fn test_config(base: &Path, script: &str) -> ServerConfig {
    let script_path = base.join("engine.sh");
    std::fs::write(&script_path, script).unwrap();

    let mut jobs = JobsConfig::under(base);
    jobs.engine = EngineConfig {
        program: "/bin/sh".into(),
        leading_args: vec![script_path.into_os_string()],
        env_vars: Vec::new(),
    };

    ServerConfig {
        host: [127, 0, 0, 1].into(),
        port: 0,
        cors_origins: vec!["http://localhost:5173".parse().unwrap()],
        request_timeout_secs: 30,
        shutdown_timeout_secs: 30,
        site: SitePaths::under(base),
        jobs,
        orphan_policy: OrphanPolicy::Fail,
    }
}

/// Build the full application router with all middleware layers.
///
/// Uses the same builder as `main.rs` so integration tests exercise the
/// production middleware stack.
pub fn build_test_app(script: &str) -> TestApp {
    let root = tempfile::tempdir().unwrap();
    build_test_app_with(root, |config| config, script)
}

/// Like [`build_test_app`], with a hook to adjust the configuration.
pub fn build_test_app_with(
    root: TempDir,
    adjust: impl FnOnce(ServerConfig) -> ServerConfig,
    script: &str,
) -> TestApp {
    let config = adjust(test_config(root.path(), script));
    let state = AppState::new(config.clone());
    let router = build_app_router(state.clone(), &config);
    TestApp {
        root,
        state,
        router,
    }
}

pub async fn get(app: Router, uri: &str) -> Response {
    let request = Request::builder()
        .method(Method::GET)
        .uri(uri)
        .header("host", "ansiweb.test")
        .body(Body::empty())
        .unwrap();
    app.oneshot(request).await.unwrap()
}

pub async fn post_json(app: Router, uri: &str, body: serde_json::Value) -> Response {
    let request = Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header("host", "ansiweb.test")
        .header("content-type", "application/json")
        .body(Body::from(serde_json::to_vec(&body).unwrap()))
        .unwrap();
    app.oneshot(request).await.unwrap()
}

pub async fn post_empty(app: Router, uri: &str) -> Response {
    let request = Request::builder()
        .method(Method::POST)
        .uri(uri)
        .body(Body::empty())
        .unwrap();
    app.oneshot(request).await.unwrap()
}

pub async fn body_bytes(response: Response) -> Vec<u8> {
    response
        .into_body()
        .collect()
        .await
        .unwrap()
        .to_bytes()
        .to_vec()
}

pub async fn body_json(response: Response) -> serde_json::Value {
    serde_json::from_slice(&body_bytes(response).await).unwrap()
}

pub async fn body_text(response: Response) -> String {
    String::from_utf8(body_bytes(response).await).unwrap()
}

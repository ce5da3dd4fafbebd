//! Integration tests for the browser-facing routes.

mod common;

use std::net::SocketAddr;

use ansiweb_core::jobs::{JobId, JobStatus};
use axum::body::Body;
use axum::extract::ConnectInfo;
use axum::http::{header, Method, Request, StatusCode};
use common::{body_text, get, ECHO_PLAYBOOK};
use tower::ServiceExt;

fn form_request(body: &'static str) -> Request<Body> {
    let mut request = Request::builder()
        .method(Method::POST)
        .uri("/")
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
        .body(Body::from(body))
        .unwrap();
    let addr: SocketAddr = "10.1.2.3:40000".parse().unwrap();
    request.extensions_mut().insert(ConnectInfo(addr));
    request
}

/// Submit through the form and return the job id from the redirect.
async fn submit_form(test: &common::TestApp) -> JobId {
    let response = test
        .app()
        .oneshot(form_request(
            "inventory=%5Bweb%5D%0Ahost1&playbook=-+hosts%3A+web&playbook_selection=site",
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::SEE_OTHER);

    let location = response
        .headers()
        .get(header::LOCATION)
        .expect("redirect location")
        .to_str()
        .unwrap();
    let id = location
        .strip_prefix("/jobs/")
        .and_then(|rest| rest.strip_suffix("/log"))
        .expect("location points at the job log");
    JobId::parse(id).unwrap()
}

// ---------------------------------------------------------------------------
// Test: static pages
// ---------------------------------------------------------------------------

#[tokio::test]
async fn index_and_status_pages_are_served() {
    let test = common::build_test_app(ECHO_PLAYBOOK);
    let templates = test.root.path().join("templates");
    std::fs::create_dir_all(&templates).unwrap();
    std::fs::write(templates.join("index.html"), "<h1>submit</h1>").unwrap();
    std::fs::write(templates.join("status.html"), "<h1>status</h1>").unwrap();

    let response = get(test.app(), "/").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_text(response).await, "<h1>submit</h1>");

    let response = get(test.app(), "/status").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_text(response).await, "<h1>status</h1>");
}

#[tokio::test]
async fn playbooks_directory_is_served() {
    let test = common::build_test_app(ECHO_PLAYBOOK);
    let playbooks = test.root.path().join("playbooks");
    std::fs::create_dir_all(&playbooks).unwrap();
    std::fs::write(playbooks.join("site.yml"), "- hosts: all\n").unwrap();

    let response = get(test.app(), "/playbooks/site.yml").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_text(response).await, "- hosts: all\n");

    let response = get(test.app(), "/assets/missing.css").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

// ---------------------------------------------------------------------------
// Test: form submission
// ---------------------------------------------------------------------------

#[tokio::test]
async fn form_submission_redirects_to_log_and_records_submitter() {
    let test = common::build_test_app(ECHO_PLAYBOOK);

    let id = submit_form(&test).await;
    assert_eq!(
        test.state.jobs.supervisor().wait(&id).await,
        Some(JobStatus::Succeeded)
    );

    let workspace = test.root.path().join("jobs").join(id.as_str());
    assert_eq!(
        std::fs::read_to_string(workspace.join("inventory")).unwrap(),
        "[web]\nhost1"
    );
    assert_eq!(
        std::fs::read_to_string(workspace.join("remote")).unwrap(),
        "job started by 10.1.2.3:40000"
    );
}

// ---------------------------------------------------------------------------
// Test: job files
// ---------------------------------------------------------------------------

#[tokio::test]
async fn job_log_is_served_as_plain_text() {
    let test = common::build_test_app(ECHO_PLAYBOOK);
    let id = submit_form(&test).await;
    test.state.jobs.supervisor().wait(&id).await;

    let response = get(test.app(), &format!("/jobs/{id}/log")).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()[header::CONTENT_TYPE],
        "text/plain; charset=utf-8"
    );
    assert_eq!(body_text(response).await, "- hosts: web");
}

#[tokio::test]
async fn job_index_lists_present_files() {
    let test = common::build_test_app(ECHO_PLAYBOOK);
    let id = submit_form(&test).await;
    test.state.jobs.supervisor().wait(&id).await;

    let response = get(test.app(), &format!("/jobs/{id}/")).await;
    assert_eq!(response.status(), StatusCode::OK);
    let html = body_text(response).await;

    for name in ["log", "exitstatus", "inventory", "playbook.yml", "remote"] {
        assert!(
            html.contains(&format!("href=\"/jobs/{id}/{name}\"")),
            "listing should link {name}: {html}"
        );
    }
    assert!(!html.contains("roles"));
}

#[tokio::test]
async fn unpublished_job_files_are_not_served() {
    let test = common::build_test_app(ECHO_PLAYBOOK);
    let id = submit_form(&test).await;
    test.state.jobs.supervisor().wait(&id).await;

    let response = get(test.app(), &format!("/jobs/{id}/roles")).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = get(test.app(), "/jobs/unknown/log").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn workspaces_with_unsafe_names_are_ignored() {
    let test = common::build_test_app(ECHO_PLAYBOOK);
    let jobs = test.root.path().join("jobs");
    std::fs::create_dir_all(jobs.join("a&b<i>\"x\"")).unwrap();
    std::fs::write(jobs.join("a&b<i>\"x\"").join("log"), "old run").unwrap();

    let response = get(test.app(), "/jobs/a%26b%3Ci%3E%22x%22/").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let listed = common::body_json(get(test.app(), "/api/v1/jobs").await).await;
    assert_eq!(listed["data"], serde_json::json!([]));
}

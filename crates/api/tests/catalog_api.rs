//! Integration tests for `GET /api/v1/catalog`.

mod common;

use axum::http::StatusCode;
use common::{body_json, get, ECHO_PLAYBOOK};

#[tokio::test]
async fn empty_base_dir_yields_empty_catalog() {
    let test = common::build_test_app(ECHO_PLAYBOOK);

    let response = get(test.app(), "/api/v1/catalog").await;
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    assert_eq!(json["data"]["machines"], serde_json::json!([]));
    assert_eq!(json["data"]["playbooks"], serde_json::json!([]));
    assert_eq!(json["data"]["roles"], serde_json::json!([]));
}

#[tokio::test]
async fn catalog_lists_machines_playbooks_and_roles() {
    let test = common::build_test_app(ECHO_PLAYBOOK);
    let base = test.root.path();

    std::fs::write(base.join("machines"), "web1\ndb1\n").unwrap();
    std::fs::create_dir_all(base.join("playbooks")).unwrap();
    std::fs::write(base.join("playbooks/site.yml"), "- hosts: all\n").unwrap();
    std::fs::write(base.join("playbooks/deploy.yml"), "- hosts: web\n").unwrap();
    std::fs::write(base.join("playbooks/README"), "notes").unwrap();
    std::fs::create_dir_all(base.join("roles/nginx")).unwrap();
    std::fs::create_dir_all(base.join("roles/common")).unwrap();

    let json = body_json(get(test.app(), "/api/v1/catalog").await).await;

    assert_eq!(json["data"]["machines"], serde_json::json!(["web1", "db1"]));
    assert_eq!(
        json["data"]["playbooks"],
        serde_json::json!(["deploy", "site"])
    );
    assert_eq!(json["data"]["roles"], serde_json::json!(["common", "nginx"]));
}

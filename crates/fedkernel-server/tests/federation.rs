//! Integration tests for repository import, fact ingestion, and
//! cross-repository link resolution.

use std::time::Duration;

use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use axum::Router;
use serde_json::json;
use tower::ServiceExt;

use fedkernel_server::router::build_router;
use fedkernel_server::state::AppState;

fn test_app() -> Router {
    let state = AppState::in_memory().expect("failed to create in-memory AppState");
    build_router(state)
}

async fn request_json(
    app: &Router,
    method: Method,
    path: &str,
    body: Option<serde_json::Value>,
) -> (StatusCode, serde_json::Value) {
    let mut builder = Request::builder().method(method).uri(path);

    let body = match body {
        Some(v) => {
            builder = builder.header("content-type", "application/json");
            Body::from(serde_json::to_vec(&v).unwrap())
        }
        None => Body::empty(),
    };

    let response = app.clone().oneshot(builder.body(body).unwrap()).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = serde_json::from_slice(&bytes).unwrap_or(json!(null));
    (status, json)
}

async fn post_json(
    app: &Router,
    path: &str,
    body: serde_json::Value,
) -> (StatusCode, serde_json::Value) {
    request_json(app, Method::POST, path, Some(body)).await
}

async fn get_json(app: &Router, path: &str) -> (StatusCode, serde_json::Value) {
    request_json(app, Method::GET, path, None).await
}

async fn import_repo(app: &Router, owner: &str, repo: &str) -> i64 {
    let (status, body) = post_json(
        app,
        "/federation/import-repo",
        json!({ "owner": owner, "repo": repo, "default_branch": "main" }),
    )
    .await;
    assert_eq!(status, StatusCode::ACCEPTED, "import failed: {body:?}");
    assert_eq!(body["status"], "Ingesting");
    body["repo_id"].as_i64().unwrap()
}

async fn submit_facts(
    app: &Router,
    repo_id: i64,
    facts: serde_json::Value,
) -> (StatusCode, serde_json::Value) {
    post_json(
        app,
        &format!("/federation/repos/{repo_id}/facts"),
        json!({ "facts": facts }),
    )
    .await
}

/// Polls the graph query until `repo_id` shows a row cross-linked to
/// `symbol`; the linker runs in a background task, so resolution is
/// observed rather than awaited.
async fn wait_for_resolution(app: &Router, repo_id: i64, symbol: &str) {
    for _ in 0..50 {
        let (_, graph) = get_json(app, &format!("/federation/graph/query?repo_id={repo_id}")).await;
        let resolved = graph["rows"]
            .as_array()
            .unwrap()
            .iter()
            .any(|row| row["cross_linked_to"] == symbol);
        if resolved {
            return;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("timed out waiting for a link to '{symbol}' to resolve");
}

fn repo_a_facts() -> serde_json::Value {
    json!([
        { "type": "file_declared", "file_path": "f.py" },
        { "type": "node_declared", "file_path": "f.py", "name": "foo", "kind": "function",
          "span": { "start_line": 1, "end_line": 12 } }
    ])
}

fn repo_b_facts() -> serde_json::Value {
    json!([
        { "type": "file_declared", "file_path": "g.py" },
        { "type": "node_declared", "file_path": "g.py", "name": "caller", "kind": "function" },
        { "type": "link_declared",
          "from": { "file_path": "g.py", "name": "caller", "kind": "function" },
          "target_owner": "acme", "target_repo": "a", "target_symbol": "foo",
          "kind": "calls", "notes": "federation call" }
    ])
}

#[tokio::test]
async fn test_import_and_ingest_lifecycle() {
    let app = test_app();
    let repo_id = import_repo(&app, "acme", "a").await;

    let (status, body) = submit_facts(&app, repo_id, repo_a_facts()).await;
    assert_eq!(status, StatusCode::OK, "ingest failed: {body:?}");
    assert_eq!(body["status"], "Ingested");
    assert_eq!(body["files_applied"], 1);
    assert_eq!(body["nodes_upserted"], 1);

    let (status, repo) = get_json(&app, &format!("/federation/repos/{repo_id}")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(repo["status"], "Ingested");
}

#[tokio::test]
async fn test_second_import_while_ingesting_is_busy() {
    let app = test_app();
    let repo_id = import_repo(&app, "acme", "a").await;

    let (status, body) = post_json(
        &app,
        "/federation/import-repo",
        json!({ "owner": "acme", "repo": "a" }),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"]["code"], "BUSY");

    // Finishing the snapshot releases the gate; re-import is accepted.
    let (status, _) = submit_facts(&app, repo_id, repo_a_facts()).await;
    assert_eq!(status, StatusCode::OK);
    let again = import_repo(&app, "acme", "a").await;
    assert_eq!(again, repo_id, "re-import keeps the stable repo id");
}

#[tokio::test]
async fn test_facts_without_open_import_are_rejected() {
    let app = test_app();
    let repo_id = import_repo(&app, "acme", "a").await;
    let (status, _) = submit_facts(&app, repo_id, repo_a_facts()).await;
    assert_eq!(status, StatusCode::OK);

    // Gate is released now; a stray facts batch cannot bypass import.
    let (status, body) = submit_facts(&app, repo_id, repo_a_facts()).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"]["code"], "BUSY");
}

#[tokio::test]
async fn test_validation_failure_reports_offending_fact() {
    let app = test_app();
    let repo_id = import_repo(&app, "acme", "a").await;

    let bad = json!([
        { "type": "file_declared", "file_path": "f.py" },
        { "type": "node_declared", "file_path": "missing.py", "name": "ghost", "kind": "function" }
    ]);
    let (status, body) = submit_facts(&app, repo_id, bad).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error"]["code"], "VALIDATION_FAILED");
    assert_eq!(body["error"]["details"]["index"], 1);
    assert_eq!(body["error"]["details"]["fact"]["type"], "node_declared");

    let (_, repo) = get_json(&app, &format!("/federation/repos/{repo_id}")).await;
    assert_eq!(repo["status"], "Failed");
}

#[tokio::test]
async fn test_unresolved_link_resolves_when_target_ingests() {
    let app = test_app();

    // B first: its link to acme/a has no target yet.
    let repo_b = import_repo(&app, "acme", "b").await;
    let (status, _) = submit_facts(&app, repo_b, repo_b_facts()).await;
    assert_eq!(status, StatusCode::OK);

    let (status, pending) = get_json(&app, "/federation/graph/unresolved?owner=acme&repo=a").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(pending["links"].as_array().unwrap().len(), 1);
    assert_eq!(pending["links"][0]["target_symbol"], "foo");

    // Ingesting A triggers resolution in the background.
    let repo_a = import_repo(&app, "acme", "a").await;
    let (status, _) = submit_facts(&app, repo_a, repo_a_facts()).await;
    assert_eq!(status, StatusCode::OK);

    wait_for_resolution(&app, repo_b, "foo").await;

    let (_, pending) = get_json(&app, "/federation/graph/unresolved?owner=acme&repo=a").await;
    assert!(pending["links"].as_array().unwrap().is_empty());

    // Re-ingesting B unchanged keeps the edge resolved.
    let repo_b2 = import_repo(&app, "acme", "b").await;
    assert_eq!(repo_b2, repo_b);
    let (status, body) = submit_facts(&app, repo_b, repo_b_facts()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["files_skipped"], 1);

    let (_, graph) = get_json(&app, &format!("/federation/graph/query?repo_id={repo_b}")).await;
    assert!(graph["rows"]
        .as_array()
        .unwrap()
        .iter()
        .any(|row| row["cross_linked_to"] == "foo"));
}

#[tokio::test]
async fn test_link_declared_after_target_already_ingested() {
    let app = test_app();

    // A first, then B: the target's ingestion moment has already passed,
    // so B's own linker pass must resolve its outgoing links.
    let repo_a = import_repo(&app, "acme", "a").await;
    submit_facts(&app, repo_a, repo_a_facts()).await;

    let repo_b = import_repo(&app, "acme", "b").await;
    let (status, _) = submit_facts(&app, repo_b, repo_b_facts()).await;
    assert_eq!(status, StatusCode::OK);

    wait_for_resolution(&app, repo_b, "foo").await;
}

#[tokio::test]
async fn test_tombstoned_node_leaves_the_live_graph() {
    let app = test_app();
    let repo_id = import_repo(&app, "acme", "a").await;
    submit_facts(&app, repo_id, repo_a_facts()).await;

    let (_, graph) = get_json(&app, &format!("/federation/graph/query?repo_id={repo_id}")).await;
    assert_eq!(graph["rows"].as_array().unwrap().len(), 1);

    // Re-ingest with f.py no longer declaring foo.
    import_repo(&app, "acme", "a").await;
    let empty_file = json!([{ "type": "file_declared", "file_path": "f.py" }]);
    let (status, body) = submit_facts(&app, repo_id, empty_file).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["nodes_tombstoned"], 1);

    let (_, graph) = get_json(&app, &format!("/federation/graph/query?repo_id={repo_id}")).await;
    assert!(graph["rows"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_graph_scan_summary() {
    let app = test_app();
    let repo_b = import_repo(&app, "acme", "b").await;
    submit_facts(&app, repo_b, repo_b_facts()).await;

    let (status, scan) = get_json(&app, "/federation/graph/scan").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(scan["repositories"], 1);
    assert_eq!(scan["nodes"], 1);
    assert_eq!(scan["pending_links"], 1);
    assert_eq!(scan["repos"][0]["pending_links"], 1);
    assert_eq!(scan["components"], 1);
}

#[tokio::test]
async fn test_health_ping() {
    let app = test_app();
    let (status, body) = get_json(&app, "/health/ping").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "online");
}

//! Integration tests for the patch proposal workflow: creation
//! preconditions, review, decisions, the conflict cascade, supersession,
//! and staleness against re-ingested graphs.

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

/// Ingests repo acme/a with nodes `foo` and `bar` in f.py; returns
/// (repo_id, foo_node_id, bar_node_id).
async fn setup_graph(app: &Router) -> (i64, String, String) {
    let (status, body) = post_json(
        app,
        "/federation/import-repo",
        json!({ "owner": "acme", "repo": "a" }),
    )
    .await;
    assert_eq!(status, StatusCode::ACCEPTED, "import failed: {body:?}");
    let repo_id = body["repo_id"].as_i64().unwrap();

    let facts = json!([
        { "type": "file_declared", "file_path": "f.py" },
        { "type": "node_declared", "file_path": "f.py", "name": "foo", "kind": "function" },
        { "type": "node_declared", "file_path": "f.py", "name": "bar", "kind": "function" }
    ]);
    let (status, body) = post_json(
        app,
        &format!("/federation/repos/{repo_id}/facts"),
        json!({ "facts": facts }),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "ingest failed: {body:?}");

    let (_, graph) = get_json(app, &format!("/federation/graph/query?repo_id={repo_id}")).await;
    let rows = graph["rows"].as_array().unwrap();
    let node_id = |name: &str| {
        rows.iter()
            .find(|row| row["name"] == name)
            .unwrap_or_else(|| panic!("node '{name}' missing from graph"))["node_id"]
            .as_str()
            .unwrap()
            .to_string()
    };
    (repo_id, node_id("foo"), node_id("bar"))
}

async fn propose(
    app: &Router,
    actor: &str,
    targets: &[&str],
) -> (StatusCode, serde_json::Value) {
    post_json(
        app,
        "/federation/patches",
        json!({
            "owner": "acme",
            "repo": "a",
            "file_path": "f.py",
            "target_node_ids": targets,
            "actor": actor
        }),
    )
    .await
}

#[tokio::test]
async fn test_propose_creates_proposed_patch() {
    let app = test_app();
    let (_, foo, _) = setup_graph(&app).await;

    let (status, patch) = propose(&app, "alice", &[&foo]).await;
    assert_eq!(status, StatusCode::CREATED, "propose failed: {patch:?}");
    assert_eq!(patch["status"], "Proposed");
    assert_eq!(patch["actor"], "alice");
    assert_eq!(patch["target_node_ids"][0], foo);

    let patch_id = patch["patch_id"].as_str().unwrap();
    let (status, loaded) = get_json(&app, &format!("/federation/patches/{patch_id}")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(loaded["status"], "Proposed");
}

#[tokio::test]
async fn test_missing_target_creates_nothing() {
    let app = test_app();
    let (_, foo, _) = setup_graph(&app).await;

    let ghost = "00".repeat(32);
    let (status, body) = propose(&app, "alice", &[&foo, &ghost]).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["code"], "TARGET_NOT_FOUND");
    assert_eq!(body["error"]["details"][0], ghost);

    let (_, queue) = get_json(&app, "/federation/patches").await;
    assert!(queue["patches"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_propose_requires_ingested_repo() {
    let app = test_app();
    // Import opens the window but no facts ever arrive: repo stays
    // Ingesting.
    let (status, body) = post_json(
        &app,
        "/federation/import-repo",
        json!({ "owner": "acme", "repo": "pending" }),
    )
    .await;
    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(body["status"], "Ingesting");

    let fake_target = "11".repeat(32);
    let (status, body) = post_json(
        &app,
        "/federation/patches",
        json!({
            "owner": "acme",
            "repo": "pending",
            "file_path": "f.py",
            "target_node_ids": [fake_target],
            "actor": "alice"
        }),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"]["code"], "REPO_NOT_INGESTED");
}

#[tokio::test]
async fn test_approval_cascades_conflicts() {
    let app = test_app();
    let (_, foo, _) = setup_graph(&app).await;

    let (_, p1) = propose(&app, "alice", &[&foo]).await;
    let (_, p2) = propose(&app, "bob", &[&foo]).await;
    let p1_id = p1["patch_id"].as_str().unwrap().to_string();
    let p2_id = p2["patch_id"].as_str().unwrap().to_string();

    let (status, decided) = post_json(
        &app,
        &format!("/federation/patches/{p1_id}/decide"),
        json!({ "outcome": "Approved", "actor": "carol" }),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "decide failed: {decided:?}");
    assert_eq!(decided["status"], "Approved");
    assert_eq!(decided["conflicted"][0], p2_id);

    let (_, p2_after) = get_json(&app, &format!("/federation/patches/{p2_id}")).await;
    assert_eq!(p2_after["status"], "Conflicted");
    assert_eq!(p2_after["conflicts_with"][0], p1_id);
}

#[tokio::test]
async fn test_disjoint_proposals_do_not_conflict() {
    let app = test_app();
    let (_, foo, bar) = setup_graph(&app).await;

    let (_, p1) = propose(&app, "alice", &[&foo]).await;
    let (_, p2) = propose(&app, "bob", &[&bar]).await;
    let p1_id = p1["patch_id"].as_str().unwrap().to_string();
    let p2_id = p2["patch_id"].as_str().unwrap().to_string();

    let (status, decided) = post_json(
        &app,
        &format!("/federation/patches/{p1_id}/decide"),
        json!({ "outcome": "Approved" }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(decided["conflicted"].as_array().unwrap().is_empty());

    let (_, p2_after) = get_json(&app, &format!("/federation/patches/{p2_id}")).await;
    assert_eq!(p2_after["status"], "Proposed");
}

#[tokio::test]
async fn test_conflicted_patch_cannot_be_approved() {
    let app = test_app();
    let (_, foo, _) = setup_graph(&app).await;

    let (_, p1) = propose(&app, "alice", &[&foo]).await;
    let (_, p2) = propose(&app, "bob", &[&foo]).await;
    let p1_id = p1["patch_id"].as_str().unwrap().to_string();
    let p2_id = p2["patch_id"].as_str().unwrap().to_string();

    post_json(
        &app,
        &format!("/federation/patches/{p1_id}/decide"),
        json!({ "outcome": "Approved" }),
    )
    .await;

    let (status, body) = post_json(
        &app,
        &format!("/federation/patches/{p2_id}/decide"),
        json!({ "outcome": "Approved" }),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"]["code"], "CONFLICT");

    // Explicit rejection of a conflicted patch is still allowed.
    let (status, rejected) = post_json(
        &app,
        &format!("/federation/patches/{p2_id}/decide"),
        json!({ "outcome": "Rejected" }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(rejected["status"], "Rejected");
}

#[tokio::test]
async fn test_same_actor_overlapping_proposal_supersedes() {
    let app = test_app();
    let (_, foo, bar) = setup_graph(&app).await;

    let (_, p1) = propose(&app, "alice", &[&foo]).await;
    let p1_id = p1["patch_id"].as_str().unwrap().to_string();

    // Same actor, overlapping targets, same file: the old proposal is
    // replaced.
    let (status, p2) = propose(&app, "alice", &[&foo, &bar]).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(p2["status"], "Proposed");

    let (_, p1_after) = get_json(&app, &format!("/federation/patches/{p1_id}")).await;
    assert_eq!(p1_after["status"], "Superseded");

    // A different actor does not supersede.
    let (_, p3) = propose(&app, "bob", &[&foo]).await;
    assert_eq!(p3["status"], "Proposed");
    let p2_id = p2["patch_id"].as_str().unwrap();
    let (_, p2_after) = get_json(&app, &format!("/federation/patches/{p2_id}")).await;
    assert_eq!(p2_after["status"], "Proposed");
}

#[tokio::test]
async fn test_review_and_decide_flow() {
    let app = test_app();
    let (_, foo, _) = setup_graph(&app).await;

    let (_, patch) = propose(&app, "alice", &[&foo]).await;
    let patch_id = patch["patch_id"].as_str().unwrap().to_string();

    let (status, reviewed) = post_json(
        &app,
        &format!("/federation/patches/{patch_id}/review"),
        json!({ "actor": "carol" }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(reviewed["status"], "UnderReview");
    assert_eq!(reviewed["reviewed_by"], "carol");

    // Reviewing twice is rejected.
    let (status, _) = post_json(
        &app,
        &format!("/federation/patches/{patch_id}/review"),
        json!({ "actor": "dave" }),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, decided) = post_json(
        &app,
        &format!("/federation/patches/{patch_id}/decide"),
        json!({ "outcome": "Approved", "actor": "carol" }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(decided["status"], "Approved");

    // Terminal patches cannot be decided again.
    let (status, _) = post_json(
        &app,
        &format!("/federation/patches/{patch_id}/decide"),
        json!({ "outcome": "Rejected" }),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_withdraw_records_own_actor() {
    let app = test_app();
    let (_, foo, _) = setup_graph(&app).await;

    let (_, patch) = propose(&app, "alice", &[&foo]).await;
    let patch_id = patch["patch_id"].as_str().unwrap().to_string();

    let (status, withdrawn) = post_json(
        &app,
        &format!("/federation/patches/{patch_id}/withdraw"),
        json!({}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(withdrawn["status"], "Rejected");
    assert_eq!(withdrawn["decided_by"], "alice");
}

#[tokio::test]
async fn test_queue_filter_and_stale_flag() {
    let app = test_app();
    let (repo_id, foo, _) = setup_graph(&app).await;

    let (_, patch) = propose(&app, "alice", &[&foo]).await;
    let patch_id = patch["patch_id"].as_str().unwrap().to_string();

    let (status, queue) = get_json(&app, "/federation/patches?status=Proposed").await;
    assert_eq!(status, StatusCode::OK);
    let rows = queue["patches"].as_array().unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["patch_id"], patch_id.as_str());
    assert_eq!(rows[0]["stale"], false);

    let (status, _) = get_json(&app, "/federation/patches?status=Bogus").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // Re-ingest the repo with foo gone: the open proposal stays valid by
    // id but the queue marks it stale.
    let (status, _) = post_json(
        &app,
        "/federation/import-repo",
        json!({ "owner": "acme", "repo": "a" }),
    )
    .await;
    assert_eq!(status, StatusCode::ACCEPTED);
    let facts = json!([
        { "type": "file_declared", "file_path": "f.py" },
        { "type": "node_declared", "file_path": "f.py", "name": "bar", "kind": "function" }
    ]);
    let (status, _) = post_json(
        &app,
        &format!("/federation/repos/{repo_id}/facts"),
        json!({ "facts": facts }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (_, queue) = get_json(&app, "/federation/patches?status=Proposed").await;
    let rows = queue["patches"].as_array().unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["stale"], true);

    let (status, loaded) = get_json(&app, &format!("/federation/patches/{patch_id}")).await;
    assert_eq!(status, StatusCode::OK, "proposal remains addressable by id");
    assert_eq!(loaded["status"], "Proposed");
}

#[tokio::test]
async fn test_unknown_patch_is_not_found() {
    let app = test_app();
    setup_graph(&app).await;

    let ghost = uuid::Uuid::new_v4();
    let (status, body) = post_json(
        &app,
        &format!("/federation/patches/{ghost}/decide"),
        json!({ "outcome": "Approved" }),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["code"], "NOT_FOUND");
}

//! Integration tests for the RPC bridge against a mocked Aria2 endpoint.
//!
//! The mock server speaks just enough JSON-RPC to exercise the submit /
//! poll / cancel lifecycle, the idempotency window, the retry budget and
//! the secret-token handling.
//!
//! Run with: cargo test --test rpc_bridge_test

use std::time::Duration;

use pretty_assertions::assert_eq;
use serde_json::json;
use teloxide::types::ChatId;
use wiremock::matchers::{body_partial_json, body_string_contains, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use ariadne::aria2::Aria2Client;
use ariadne::bridge::{JobStatus, RpcBridge};
use ariadne::error::BridgeError;
use ariadne::utils::parse_source;

const MAGNET: &str = "magnet:?xt=urn:btih:c9e15763f722f23e98a29decdfae341b98d53056";

/// Test harness: mock Aria2 daemon plus a bridge pointed at it.
struct BridgeTest {
    server: MockServer,
    bridge: RpcBridge,
}

impl BridgeTest {
    async fn new(secret: Option<&str>) -> Self {
        let server = MockServer::start().await;
        let client = Aria2Client::new(
            format!("{}/jsonrpc", server.uri()),
            secret.map(|s| s.to_string()),
            Duration::from_secs(5),
        )
        .expect("client builds");
        let bridge = RpcBridge::new(client, None, Duration::from_secs(120));
        Self { server, bridge }
    }

    /// Mount a mock answering one RPC method with a fixed result.
    async fn answer(&self, rpc_method: &str, result: serde_json::Value) {
        Mock::given(method("POST"))
            .and(path("/jsonrpc"))
            .and(body_partial_json(json!({"method": rpc_method})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "x",
                "jsonrpc": "2.0",
                "result": result,
            })))
            .mount(&self.server)
            .await;
    }
}

fn task_status(gid: &str, state: &str, completed: u64, total: u64) -> serde_json::Value {
    json!({
        "gid": gid,
        "status": state,
        "totalLength": total.to_string(),
        "completedLength": completed.to_string(),
        "downloadSpeed": "1024",
        "files": [{"path": "/downloads/file.iso"}],
    })
}

#[tokio::test]
async fn submit_returns_job_with_handle() {
    let t = BridgeTest::new(None).await;
    t.answer("aria2.addUri", json!("gid-1")).await;

    let source = parse_source(MAGNET).unwrap();
    let outcome = t.bridge.submit(ChatId(7), &source).await.unwrap();

    assert!(!outcome.deduplicated);
    assert_eq!(outcome.job.handle, "dl-1");
    assert_eq!(outcome.job.gid, "gid-1");
    assert_eq!(outcome.job.status, JobStatus::Pending);
    assert_ne!(outcome.job.handle, outcome.job.gid);
}

#[tokio::test]
async fn duplicate_submit_within_window_yields_one_job() {
    let t = BridgeTest::new(None).await;

    Mock::given(method("POST"))
        .and(path("/jsonrpc"))
        .and(body_partial_json(json!({"method": "aria2.addUri"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "x", "jsonrpc": "2.0", "result": "gid-1",
        })))
        .expect(1)
        .mount(&t.server)
        .await;

    let source = parse_source(MAGNET).unwrap();
    let first = t.bridge.submit(ChatId(7), &source).await.unwrap();
    let second = t.bridge.submit(ChatId(7), &source).await.unwrap();

    assert!(!first.deduplicated);
    assert!(second.deduplicated);
    assert_eq!(first.job.handle, second.job.handle);
    assert_eq!(t.bridge.registry().len(), 1);
}

#[tokio::test]
async fn poll_reaches_terminal_state() {
    let t = BridgeTest::new(None).await;
    t.answer("aria2.addUri", json!("gid-1")).await;

    // First poll sees an active transfer, second sees completion. Mocks
    // match in mount order, so the one-shot active mock goes first and the
    // completion mock takes over once it is exhausted.
    Mock::given(method("POST"))
        .and(path("/jsonrpc"))
        .and(body_partial_json(json!({"method": "aria2.tellStatus"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "x", "jsonrpc": "2.0",
            "result": task_status("gid-1", "active", 25, 100),
        })))
        .up_to_n_times(1)
        .mount(&t.server)
        .await;
    t.answer("aria2.tellStatus", task_status("gid-1", "complete", 100, 100))
        .await;

    let source = parse_source("https://example.com/file.iso").unwrap();
    let outcome = t.bridge.submit(ChatId(7), &source).await.unwrap();

    let mid = t.bridge.poll(&outcome.job.handle).await.unwrap();
    assert_eq!(mid.status, JobStatus::Active);
    assert!(mid.progress > 0.0 && mid.progress < 1.0);

    let done = t.bridge.poll(&outcome.job.handle).await.unwrap();
    assert_eq!(done.status, JobStatus::Complete);
    assert_eq!(done.progress, 1.0);

    // Terminal jobs are served from the registry without another RPC.
    let again = t.bridge.poll(&outcome.job.handle).await.unwrap();
    assert_eq!(again.status, JobStatus::Complete);
}

#[tokio::test]
async fn cancel_unknown_handle_is_not_found_and_side_effect_free() {
    let t = BridgeTest::new(None).await;

    Mock::given(method("POST"))
        .and(path("/jsonrpc"))
        .and(body_partial_json(json!({"method": "aria2.remove"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "x", "jsonrpc": "2.0", "result": "gid-1",
        })))
        .expect(0)
        .mount(&t.server)
        .await;

    let err = t.bridge.cancel("dl-99").await.unwrap_err();
    assert!(matches!(err, BridgeError::NotFound(_)));
    assert_eq!(t.bridge.registry().len(), 0);
}

#[tokio::test]
async fn cancel_removes_job_in_daemon_and_registry() {
    let t = BridgeTest::new(None).await;
    t.answer("aria2.addUri", json!("gid-1")).await;
    t.answer("aria2.remove", json!("gid-1")).await;

    let source = parse_source(MAGNET).unwrap();
    let outcome = t.bridge.submit(ChatId(7), &source).await.unwrap();

    let cancelled = t.bridge.cancel(&outcome.job.handle).await.unwrap();
    assert_eq!(cancelled.gid, "gid-1");
    assert_eq!(t.bridge.registry().len(), 0);

    let err = t.bridge.poll(&outcome.job.handle).await.unwrap_err();
    assert!(matches!(err, BridgeError::NotFound(_)));
}

#[tokio::test]
async fn malformed_input_never_reaches_the_rpc_bridge() {
    let t = BridgeTest::new(None).await;

    // Dispatcher-side validation: junk does not produce a SourceUri, so
    // there is nothing to hand to the bridge.
    assert!(parse_source("add not-a-uri").is_none());
    assert!(parse_source("magnet:?xt=urn:btih:short").is_none());

    let requests = t.server.received_requests().await.unwrap();
    assert!(requests.is_empty());
}

#[tokio::test]
async fn transport_failure_retries_then_reports_unavailable() {
    let t = BridgeTest::new(None).await;

    // 1 attempt + 3 retries
    Mock::given(method("POST"))
        .and(path("/jsonrpc"))
        .respond_with(ResponseTemplate::new(500))
        .expect(4)
        .mount(&t.server)
        .await;

    let source = parse_source(MAGNET).unwrap();
    let err = t.bridge.submit(ChatId(7), &source).await.unwrap_err();

    assert!(matches!(err, BridgeError::RpcUnavailable(_)));
    assert_eq!(t.bridge.registry().len(), 0);
}

#[tokio::test]
async fn secret_token_is_sent_when_configured() {
    let t = BridgeTest::new(Some("sekret")).await;

    Mock::given(method("POST"))
        .and(path("/jsonrpc"))
        .and(body_string_contains("token:sekret"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "x", "jsonrpc": "2.0", "result": "gid-1",
        })))
        .expect(1)
        .mount(&t.server)
        .await;

    let source = parse_source(MAGNET).unwrap();
    t.bridge.submit(ChatId(7), &source).await.unwrap();
}

#[tokio::test]
async fn rpc_error_on_submit_is_not_retried() {
    let t = BridgeTest::new(None).await;

    Mock::given(method("POST"))
        .and(path("/jsonrpc"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "x", "jsonrpc": "2.0",
            "error": {"code": 1, "message": "Unauthorized"},
        })))
        .expect(1)
        .mount(&t.server)
        .await;

    let source = parse_source(MAGNET).unwrap();
    let err = t.bridge.submit(ChatId(7), &source).await.unwrap_err();
    assert!(matches!(err, BridgeError::Internal(_)));
}

#[tokio::test]
async fn vanished_gid_marks_job_failed() {
    let t = BridgeTest::new(None).await;
    t.answer("aria2.addUri", json!("gid-1")).await;

    Mock::given(method("POST"))
        .and(path("/jsonrpc"))
        .and(body_partial_json(json!({"method": "aria2.tellStatus"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "x", "jsonrpc": "2.0",
            "error": {"code": 1, "message": "gid-1 is not found"},
        })))
        .mount(&t.server)
        .await;

    let source = parse_source(MAGNET).unwrap();
    let outcome = t.bridge.submit(ChatId(7), &source).await.unwrap();

    let job = t.bridge.poll(&outcome.job.handle).await.unwrap();
    assert_eq!(job.status, JobStatus::Failed);
    assert!(job.error.is_some());
}

#[tokio::test]
async fn reconcile_adopts_running_downloads_without_owner() {
    let t = BridgeTest::new(None).await;
    t.answer(
        "aria2.tellActive",
        json!([
            task_status("gid-a", "active", 10, 100),
            task_status("gid-b", "active", 90, 100),
        ]),
    )
    .await;

    let adopted = t.bridge.reconcile().await.unwrap();
    assert_eq!(adopted, 2);
    assert_eq!(t.bridge.registry().len(), 2);

    // Adopted jobs belong to no chat
    assert!(t.bridge.registry().jobs_for_chat(ChatId(7)).is_empty());

    // A second reconcile is idempotent
    let adopted = t.bridge.reconcile().await.unwrap();
    assert_eq!(adopted, 0);
}

#[tokio::test]
async fn submit_then_status_shows_bounded_progress() {
    let t = BridgeTest::new(None).await;
    t.answer("aria2.addUri", json!("gid-1")).await;
    t.answer("aria2.tellStatus", task_status("gid-1", "active", 50, 200))
        .await;

    let source = parse_source(MAGNET).unwrap();
    let outcome = t.bridge.submit(ChatId(7), &source).await.unwrap();
    assert!(outcome.job.handle.starts_with("dl-"));

    let job = t.bridge.poll(&outcome.job.handle).await.unwrap();
    let percent = job.progress * 100.0;
    assert!((0.0..=100.0).contains(&percent));

    let card = job.status_card();
    assert!(card.contains("25.0%"));
    assert!(card.contains(&outcome.job.handle));
}

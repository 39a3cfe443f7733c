//! RAG bridge and refresher against a mock backend over HTTP

use chainwatch_client::{ChainClient, ChainClientConfig, PageFetcher, QaBatchListing};
use chainwatch_core::ChatMessage;
use chainwatch_poll::{
    ActivityTracker, BridgeConfig, BridgeOutcome, ListKey, PollingRefresher, RagBridge, RefreshInterval,
    RefresherConfig,
};
use serde_json::json;
use std::time::Duration;
use wiremock::matchers::{body_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn client(server: &MockServer) -> ChainClient {
    ChainClient::new(ChainClientConfig::new(server.uri())).unwrap()
}

fn fast_bridge_config() -> BridgeConfig {
    BridgeConfig {
        poll_interval: Duration::from_millis(50),
        timeout: Duration::from_secs(5),
    }
}

#[tokio::test]
async fn test_bridge_polls_until_success() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chain/samples/github-rag/rag"))
        .and(body_json(json!({
            "repo_id": "repo-1",
            "messages": [{"role": "user", "content": "What does it do?"}]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": "ok",
            "request_id": "req-42"
        })))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/chain/samples/github-rag/rag/status"))
        .and(body_json(json!({"request_id": "req-42"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": "ok",
            "status": "pending"
        })))
        .up_to_n_times(2)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/chain/samples/github-rag/rag/status"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": "ok",
            "status": "success",
            "response_details": {"answer": "It indexes GitHub repositories."}
        })))
        .mount(&server)
        .await;

    let bridge = RagBridge::new(client(&server), "repo-1", fast_bridge_config());
    let outcome = bridge.ask("What does it do?").await.unwrap();

    assert_eq!(
        outcome,
        BridgeOutcome::Resolved("It indexes GitHub repositories.".to_string())
    );
    assert_eq!(
        bridge.history().last(),
        Some(&ChatMessage::assistant("It indexes GitHub repositories."))
    );
}

#[tokio::test]
async fn test_bridge_submit_failure_surfaces_detail() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chain/samples/github-rag/rag"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "detail": "Repository is still being ingested"
        })))
        .mount(&server)
        .await;

    let bridge = RagBridge::new(client(&server), "repo-1", fast_bridge_config());
    let err = bridge.submit("Hello?").await.unwrap_err();

    assert!(err.to_string().contains("Repository is still being ingested"));
    assert!(bridge.history().is_empty());
}

#[tokio::test]
async fn test_refresher_loads_first_page() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chain/samples/github-rag/qa/batches"))
        .and(body_json(json!({"repo_id": "repo-1", "page": 1, "page_size": 20})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": "ok",
            "batches": [
                {"id": "b-1", "status": "completed", "added_at": "2026-03-02T10:00:00Z"}
            ],
            "total_batches": 21
        })))
        .mount(&server)
        .await;

    let refresher = PollingRefresher::start(
        PageFetcher::<QaBatchListing>::new(client(&server)),
        ListKey::first::<QaBatchListing>(Some("repo-1".to_string())),
        RefreshInterval::Short,
        ActivityTracker::default(),
        RefresherConfig::default(),
    );

    let mut rx = refresher.subscribe();
    let state = tokio::time::timeout(Duration::from_secs(5), rx.wait_for(|s| s.current().is_some()))
        .await
        .expect("first page did not load")
        .unwrap();

    let page = state.current().unwrap();
    assert_eq!(page.items.len(), 1);
    assert_eq!(page.total_count, 21);
    assert_eq!(page.total_pages(), 2);
    assert!(page.has_next());
    assert!(!page.has_previous());
}

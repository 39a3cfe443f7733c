//! RAG bridge submission, polling and timeout behaviour on a paused clock

use async_trait::async_trait;
use chainwatch_client::ClientError;
use chainwatch_client::wire::RagStatusResponse;
use chainwatch_core::{ChatMessage, Conversation, RagStatus};
use chainwatch_poll::{BridgeConfig, BridgeError, BridgeOutcome, BridgeState, RagBackend, RagBridge, TIMEOUT_MESSAGE};
use serde_json::{Value, json};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::Instant;

/// Scripted backend; once the script runs out every poll reports pending
#[derive(Clone, Default)]
struct FakeBackend {
    script: Arc<Mutex<VecDeque<Result<RagStatusResponse, ClientError>>>>,
    submitted: Arc<Mutex<Vec<Vec<ChatMessage>>>>,
    polls: Arc<AtomicUsize>,
    reject_submit: bool,
}

impl FakeBackend {
    fn scripted(script: Vec<Result<RagStatusResponse, ClientError>>) -> Self {
        Self {
            script: Arc::new(Mutex::new(script.into())),
            ..Default::default()
        }
    }

    fn polls(&self) -> usize {
        self.polls.load(Ordering::SeqCst)
    }

    fn submissions(&self) -> usize {
        self.submitted.lock().unwrap().len()
    }
}

fn status(status: RagStatus, details: Value) -> Result<RagStatusResponse, ClientError> {
    Ok(RagStatusResponse {
        status,
        response_details: details,
    })
}

fn pending() -> Result<RagStatusResponse, ClientError> {
    status(RagStatus::Pending, Value::Null)
}

#[async_trait]
impl RagBackend for FakeBackend {
    async fn submit(&self, _repo_id: &str, messages: &[ChatMessage]) -> Result<String, ClientError> {
        if self.reject_submit {
            return Err(ClientError::Api {
                status_code: 500,
                detail: "index not ready".to_string(),
            });
        }
        let mut submitted = self.submitted.lock().unwrap();
        submitted.push(messages.to_vec());
        Ok(format!("req-{}", submitted.len()))
    }

    async fn status(&self, _request_id: &str) -> Result<RagStatusResponse, ClientError> {
        self.polls.fetch_add(1, Ordering::SeqCst);
        self.script.lock().unwrap().pop_front().unwrap_or_else(pending)
    }
}

fn bridge(backend: &FakeBackend) -> RagBridge<FakeBackend> {
    RagBridge::new(backend.clone(), "repo-1", BridgeConfig::default())
}

fn assert_within_ms(elapsed: Duration, expected: Duration) {
    assert!(
        elapsed >= expected && elapsed < expected + Duration::from_millis(10),
        "elapsed {:?}, expected {:?}",
        elapsed,
        expected
    );
}

#[tokio::test(start_paused = true)]
async fn test_blank_question_makes_no_call() {
    let backend = FakeBackend::default();
    let bridge = bridge(&backend);

    assert!(matches!(bridge.submit("").await, Err(BridgeError::EmptyQuestion)));
    assert!(matches!(bridge.submit("   \n").await, Err(BridgeError::EmptyQuestion)));

    tokio::time::sleep(Duration::from_secs(10)).await;
    assert_eq!(backend.submissions(), 0);
    assert_eq!(backend.polls(), 0);
    assert_eq!(bridge.state(), BridgeState::Idle);
    assert!(bridge.history().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_resolves_on_third_poll_and_stops_polling() {
    let backend = FakeBackend::scripted(vec![
        pending(),
        pending(),
        status(RagStatus::Success, json!("Use the ingest endpoint.")),
    ]);
    let bridge = bridge(&backend);

    let start = Instant::now();
    let pending_answer = bridge.submit("  How do I add a repo?  ").await.unwrap();
    assert_eq!(pending_answer.request_id(), "req-1");
    assert_eq!(
        bridge.state(),
        BridgeState::AwaitingResult {
            request_id: "req-1".to_string()
        }
    );

    let outcome = pending_answer.wait().await;
    assert_eq!(outcome, BridgeOutcome::Resolved("Use the ingest endpoint.".to_string()));
    assert_within_ms(start.elapsed(), Duration::from_secs(6));
    assert_eq!(backend.polls(), 3);

    tokio::time::sleep(Duration::from_secs(30)).await;
    assert_eq!(backend.polls(), 3);

    assert_eq!(bridge.state(), BridgeState::Resolved);
    let history = bridge.history();
    assert_eq!(
        history.messages(),
        &[
            ChatMessage::user("How do I add a repo?"),
            ChatMessage::assistant("Use the ingest endpoint."),
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn test_submission_carries_prior_history_and_new_question() {
    let backend = FakeBackend::scripted(vec![status(RagStatus::Success, json!({"answer": "Yes."}))]);
    let prior = Conversation::from(vec![ChatMessage::user("Hi"), ChatMessage::assistant("Hello!")]);
    let bridge = bridge(&backend).with_history(prior.clone());

    let outcome = bridge.ask("Is it indexed?").await.unwrap();
    assert_eq!(outcome, BridgeOutcome::Resolved("Yes.".to_string()));

    let sent = backend.submitted.lock().unwrap()[0].clone();
    assert_eq!(sent.len(), 3);
    assert_eq!(&sent[..2], prior.messages());
    assert_eq!(sent[2], ChatMessage::user("Is it indexed?"));

    let history = bridge.history();
    assert_eq!(history.len(), prior.len() + 2);
    assert_eq!(&history.messages()[..2], prior.messages());
}

#[tokio::test(start_paused = true)]
async fn test_times_out_at_deadline_and_appends_notice_once() {
    let backend = FakeBackend::default();
    let bridge = bridge(&backend);

    let start = Instant::now();
    let pending_answer = bridge.submit("Anyone there?").await.unwrap();

    tokio::time::sleep(Duration::from_millis(119_900)).await;
    assert!(bridge.state().is_busy());

    let outcome = pending_answer.wait().await;
    assert_eq!(outcome, BridgeOutcome::TimedOut);
    assert_within_ms(start.elapsed(), Duration::from_secs(120));
    // Polls at 2s..118s; the one due at 120s loses to the deadline
    assert_eq!(backend.polls(), 59);

    tokio::time::sleep(Duration::from_secs(60)).await;
    assert_eq!(backend.polls(), 59);

    assert_eq!(bridge.state(), BridgeState::TimedOut);
    let history = bridge.history();
    assert_eq!(history.len(), 2);
    assert_eq!(history.last(), Some(&ChatMessage::assistant(TIMEOUT_MESSAGE)));
    let notices = history
        .messages()
        .iter()
        .filter(|m| m.content == TIMEOUT_MESSAGE)
        .count();
    assert_eq!(notices, 1);
}

#[tokio::test(start_paused = true)]
async fn test_error_status_appends_error_payload() {
    let backend = FakeBackend::scripted(vec![
        pending(),
        status(RagStatus::Error, json!({"error": "Repository has no embeddings"})),
    ]);
    let bridge = bridge(&backend);

    let outcome = bridge.ask("Why?").await.unwrap();
    assert_eq!(outcome, BridgeOutcome::Failed("Repository has no embeddings".to_string()));
    assert_eq!(bridge.state(), BridgeState::Failed);
    assert_eq!(
        bridge.history().last(),
        Some(&ChatMessage::assistant("Repository has no embeddings"))
    );
}

#[tokio::test(start_paused = true)]
async fn test_second_question_rejected_while_awaiting() {
    let backend = FakeBackend::scripted(vec![pending(), status(RagStatus::Success, json!("done"))]);
    let bridge = bridge(&backend);

    let first = bridge.submit("first").await.unwrap();
    assert!(matches!(bridge.submit("second").await, Err(BridgeError::AlreadyInFlight)));
    assert!(bridge.reset().is_err());
    assert_eq!(backend.submissions(), 1);

    assert_eq!(first.wait().await, BridgeOutcome::Resolved("done".to_string()));

    // A finished exchange accepts the next question
    let next = bridge.submit("second").await.unwrap();
    assert_eq!(next.request_id(), "req-2");
}

#[tokio::test(start_paused = true)]
async fn test_transient_poll_errors_keep_polling() {
    let backend = FakeBackend::scripted(vec![
        Err(ClientError::Parse("truncated body".to_string())),
        Err(ClientError::Api {
            status_code: 503,
            detail: "busy".to_string(),
        }),
        status(RagStatus::Success, json!("ok")),
    ]);
    let bridge = bridge(&backend);

    assert_eq!(bridge.ask("q").await.unwrap(), BridgeOutcome::Resolved("ok".to_string()));
    assert_eq!(backend.polls(), 3);
    assert_eq!(bridge.history().len(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_rejected_submission_leaves_history_untouched() {
    let backend = FakeBackend {
        reject_submit: true,
        ..Default::default()
    };
    let prior = Conversation::from(vec![ChatMessage::user("Hi"), ChatMessage::assistant("Hello!")]);
    let bridge = bridge(&backend).with_history(prior.clone());

    let err = bridge.submit("What now?").await.unwrap_err();
    assert!(matches!(err, BridgeError::Submit(ClientError::Api { status_code: 500, .. })));
    assert_eq!(bridge.state(), BridgeState::Idle);
    assert_eq!(bridge.history(), prior);

    tokio::time::sleep(Duration::from_secs(10)).await;
    assert_eq!(backend.polls(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_cancel_stops_polling_and_withdraws_question() {
    let backend = FakeBackend::default();
    let bridge = bridge(&backend);

    let pending_answer = bridge.submit("q").await.unwrap();
    tokio::time::sleep(Duration::from_millis(4_500)).await;
    bridge.cancel();

    assert_eq!(pending_answer.wait().await, BridgeOutcome::Cancelled);
    assert_eq!(bridge.state(), BridgeState::Idle);
    assert!(bridge.history().is_empty());

    tokio::time::sleep(Duration::from_secs(30)).await;
    assert_eq!(backend.polls(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_question_after_cancel_has_no_dangling_turn() {
    let backend = FakeBackend::default();
    let bridge = bridge(&backend);

    let first = bridge.submit("first").await.unwrap();
    bridge.cancel();
    assert_eq!(first.wait().await, BridgeOutcome::Cancelled);

    let _second = bridge.submit("second").await.unwrap();
    let submitted = backend.submitted.lock().unwrap().clone();
    assert_eq!(submitted.len(), 2);
    assert_eq!(submitted[1], vec![ChatMessage::user("second")]);
    assert_eq!(bridge.history().messages(), &[ChatMessage::user("second")]);
}

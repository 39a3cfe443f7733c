//! Asynchronous request/response bridge for RAG questions
//!
//! The backend answers questions asynchronously: a submit call returns a
//! request id, and the answer is obtained by polling the status of that id
//! until it reports success or error. The bridge drives that exchange for
//! one conversation and keeps its history:
//!
//! - the user turn is appended once the backend has accepted the question
//! - exactly one assistant turn (answer, error or timeout notice) follows,
//!   unless the request is cancelled, which withdraws the user turn
//! - at most one request is in flight at a time

use crate::task::{PollOutcome, PollSchedule, PollTask};
use async_trait::async_trait;
use chainwatch_client::wire::RagStatusResponse;
use chainwatch_client::{ChainClient, ClientError};
use chainwatch_core::{ChatMessage, Conversation, Error as CoreError, RagStatus};
use std::ops::ControlFlow;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Assistant turn appended when no answer arrives in time
pub const TIMEOUT_MESSAGE: &str = "Request timed out, please try again.";

/// Backend operations the bridge needs
#[async_trait]
pub trait RagBackend: Send + Sync + 'static {
    /// Submit the conversation, returning the request id
    async fn submit(&self, repo_id: &str, messages: &[ChatMessage]) -> Result<String, ClientError>;

    async fn status(&self, request_id: &str) -> Result<RagStatusResponse, ClientError>;
}

#[async_trait]
impl RagBackend for ChainClient {
    async fn submit(&self, repo_id: &str, messages: &[ChatMessage]) -> Result<String, ClientError> {
        self.submit_rag(repo_id, messages).await
    }

    async fn status(&self, request_id: &str) -> Result<RagStatusResponse, ClientError> {
        self.rag_status(request_id).await
    }
}

/// Poll cadence and overall deadline
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BridgeConfig {
    pub poll_interval: Duration,
    /// Measured from the start of polling
    pub timeout: Duration,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(2),
            timeout: Duration::from_secs(120),
        }
    }
}

impl BridgeConfig {
    pub fn validate(&self) -> chainwatch_core::Result<()> {
        if self.poll_interval.is_zero() {
            return Err(CoreError::ConfigValidation(
                "rag poll interval must be greater than zero".to_string(),
            ));
        }
        if self.timeout < self.poll_interval {
            return Err(CoreError::ConfigValidation(format!(
                "rag timeout ({:?}) must not be shorter than the poll interval ({:?})",
                self.timeout, self.poll_interval
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("Question is empty")]
    EmptyQuestion,

    #[error("A question is already awaiting its answer")]
    AlreadyInFlight,

    #[error("Failed to submit question: {0}")]
    Submit(#[source] ClientError),
}

/// Where the current exchange stands
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum BridgeState {
    #[default]
    Idle,
    Submitting,
    AwaitingResult { request_id: String },
    Resolved,
    Failed,
    TimedOut,
}

impl BridgeState {
    /// A new question is refused in these states
    pub fn is_busy(&self) -> bool {
        matches!(self, BridgeState::Submitting | BridgeState::AwaitingResult { .. })
    }
}

/// How a submitted question ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BridgeOutcome {
    Resolved(String),
    Failed(String),
    TimedOut,
    /// Polling was cancelled; nothing was appended
    Cancelled,
}

/// Answer to a submitted question, delivered once polling ends
#[derive(Debug)]
pub struct PendingAnswer {
    request_id: String,
    rx: oneshot::Receiver<BridgeOutcome>,
}

impl PendingAnswer {
    pub fn request_id(&self) -> &str {
        &self.request_id
    }

    pub async fn wait(self) -> BridgeOutcome {
        self.rx.await.unwrap_or(BridgeOutcome::Cancelled)
    }
}

enum Terminal {
    Success(String),
    Error(String),
}

#[derive(Default)]
struct Inner {
    state: BridgeState,
    history: Conversation,
    poll_cancel: Option<CancellationToken>,
}

/// Drives RAG questions for one repository conversation
pub struct RagBridge<B: RagBackend> {
    backend: Arc<B>,
    repo_id: String,
    config: BridgeConfig,
    inner: Arc<Mutex<Inner>>,
}

impl<B: RagBackend> RagBridge<B> {
    pub fn new(backend: B, repo_id: impl Into<String>, config: BridgeConfig) -> Self {
        Self {
            backend: Arc::new(backend),
            repo_id: repo_id.into(),
            config,
            inner: Arc::new(Mutex::new(Inner::default())),
        }
    }

    /// Continue an existing conversation
    pub fn with_history(self, history: Conversation) -> Self {
        lock(&self.inner).history = history;
        self
    }

    pub fn repo_id(&self) -> &str {
        &self.repo_id
    }

    pub fn state(&self) -> BridgeState {
        lock(&self.inner).state.clone()
    }

    pub fn history(&self) -> Conversation {
        lock(&self.inner).history.clone()
    }

    /// Send a question and start polling for its answer
    ///
    /// Blank questions are rejected before any call is made. If the backend
    /// refuses the submission the history is left untouched and the bridge
    /// is ready for another question.
    pub async fn submit(&self, question: &str) -> Result<PendingAnswer, BridgeError> {
        let question = question.trim();
        if question.is_empty() {
            return Err(BridgeError::EmptyQuestion);
        }

        let messages = {
            let mut inner = lock(&self.inner);
            if inner.state.is_busy() {
                return Err(BridgeError::AlreadyInFlight);
            }
            inner.state = BridgeState::Submitting;
            inner.history.with_question(question)
        };

        let request_id = match self.backend.submit(&self.repo_id, &messages).await {
            Ok(request_id) => request_id,
            Err(e) => {
                warn!(repo_id = %self.repo_id, error = %e, "RAG submission failed");
                lock(&self.inner).state = BridgeState::Idle;
                return Err(BridgeError::Submit(e));
            }
        };
        info!(repo_id = %self.repo_id, %request_id, "RAG request accepted");

        let task = self.start_polling(request_id.clone());
        {
            let mut inner = lock(&self.inner);
            inner.history.push_user(question);
            inner.state = BridgeState::AwaitingResult {
                request_id: request_id.clone(),
            };
            inner.poll_cancel = Some(task.cancellation_token());
        }

        let (tx, rx) = oneshot::channel();
        let inner = Arc::clone(&self.inner);
        tokio::spawn(async move {
            let outcome = finish(&inner, task.completion().await);
            let _ = tx.send(outcome);
        });

        Ok(PendingAnswer { request_id, rx })
    }

    /// Submit and wait for the answer
    pub async fn ask(&self, question: &str) -> Result<BridgeOutcome, BridgeError> {
        Ok(self.submit(question).await?.wait().await)
    }

    /// Stop polling the in-flight request, if any
    pub fn cancel(&self) {
        if let Some(token) = lock(&self.inner).poll_cancel.take() {
            debug!("Cancelling RAG polling");
            token.cancel();
        }
    }

    /// Forget the conversation; refused while a request is in flight
    pub fn reset(&self) -> Result<(), BridgeError> {
        let mut inner = lock(&self.inner);
        if inner.state.is_busy() {
            return Err(BridgeError::AlreadyInFlight);
        }
        inner.history = Conversation::new();
        inner.state = BridgeState::Idle;
        Ok(())
    }

    fn start_polling(&self, request_id: String) -> PollTask<Terminal> {
        let schedule = PollSchedule::every(self.config.poll_interval).with_timeout(self.config.timeout);
        let backend = Arc::clone(&self.backend);

        PollTask::start(schedule, move || {
            let backend = Arc::clone(&backend);
            let request_id = request_id.clone();
            async move {
                match backend.status(&request_id).await {
                    Ok(response) => match response.status {
                        RagStatus::Success => ControlFlow::Break(Terminal::Success(response.payload_text())),
                        RagStatus::Error => ControlFlow::Break(Terminal::Error(response.payload_text())),
                        RagStatus::Pending => ControlFlow::Continue(()),
                    },
                    Err(e) => {
                        warn!(%request_id, error = %e, "RAG status poll failed, will retry");
                        ControlFlow::Continue(())
                    }
                }
            }
        })
    }
}

impl<B: RagBackend> Drop for RagBridge<B> {
    fn drop(&mut self) {
        self.cancel();
    }
}

fn lock(inner: &Mutex<Inner>) -> MutexGuard<'_, Inner> {
    inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Apply the end of polling to the conversation
fn finish(inner: &Mutex<Inner>, outcome: PollOutcome<Terminal>) -> BridgeOutcome {
    let mut inner = lock(inner);
    inner.poll_cancel = None;

    match outcome {
        PollOutcome::Completed(Terminal::Success(answer)) => {
            inner.history.push_assistant(answer.clone());
            inner.state = BridgeState::Resolved;
            BridgeOutcome::Resolved(answer)
        }
        PollOutcome::Completed(Terminal::Error(message)) => {
            warn!(error = %message, "RAG request failed");
            inner.history.push_assistant(message.clone());
            inner.state = BridgeState::Failed;
            BridgeOutcome::Failed(message)
        }
        PollOutcome::TimedOut => {
            warn!("RAG request timed out");
            inner.history.push_assistant(TIMEOUT_MESSAGE);
            inner.state = BridgeState::TimedOut;
            BridgeOutcome::TimedOut
        }
        PollOutcome::Cancelled => {
            inner.history.pop_unanswered();
            inner.state = BridgeState::Idle;
            BridgeOutcome::Cancelled
        }
    }
}

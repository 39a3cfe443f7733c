//! Request and response bodies of the chain-reaction API

use chainwatch_core::models::{OverallMetrics, RepoFile};
use chainwatch_core::{ChatMessage, RagStatus};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Endpoint paths, relative to the base URL
pub mod paths {
    pub const INGEST: &str = "/chain/samples/github-rag";
    pub const FILES: &str = "/chain/samples/github-rag/files";
    pub const QA_BATCHES: &str = "/chain/samples/github-rag/qa/batches";
    pub const QA_BATCH_CREATE: &str = "/chain/samples/github-rag/qa/batch/create";
    pub const QA_PAIRS: &str = "/chain/samples/github-rag/qa/pairs";
    pub const QA_PAIR_ARCHIVE: &str = "/chain/samples/github-rag/qa/pair/archive";
    pub const EVAL_JOBS: &str = "/chain/samples/github-rag/eval/jobs";
    pub const EVAL_CREATE: &str = "/chain/samples/github-rag/eval/create";
    pub const EVAL_METRICS: &str = "/chain/samples/github-rag/eval/metrics";
    pub const EVAL_OVERALL: &str = "/chain/samples/github-rag/eval/overall-metrics";
    pub const RAG_SUBMIT: &str = "/chain/samples/github-rag/rag";
    pub const RAG_STATUS: &str = "/chain/samples/github-rag/rag/status";
    pub const TRANSLATE: &str = "/chain/samples/translate";
    pub const TRANSLATE_CHAIN: &str = "/chain/samples/translate-chain";
}

/// Value of the `success` field on every successful response
pub const SUCCESS_OK: &str = "ok";

#[derive(Debug, Serialize)]
pub struct IngestRequest<'a> {
    pub repo_url: &'a str,
}

#[derive(Debug, Deserialize)]
pub struct IngestResponse {
    pub repo_id: String,
}

#[derive(Debug, Deserialize)]
pub struct FileDetailResponse {
    pub file: RepoFile,
}

#[derive(Debug, Serialize)]
pub struct RepoRequest<'a> {
    pub repo_id: &'a str,
}

#[derive(Debug, Deserialize)]
pub struct CreateBatchResponse {
    #[serde(default)]
    pub batch_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ArchiveRequest<'a> {
    pub qa_id: &'a str,
}

#[derive(Debug, Serialize)]
pub struct CreateEvalRequest<'a> {
    pub qa_batch_id: &'a str,
    pub repo_id: &'a str,
}

#[derive(Debug, Deserialize)]
pub struct CreateEvalResponse {
    #[serde(default)]
    pub eval_job_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct EvalJobRequest<'a> {
    pub eval_job_id: &'a str,
}

#[derive(Debug, Deserialize)]
pub struct OverallMetricsResponse {
    #[serde(default)]
    pub overall_metrics: OverallMetrics,
}

#[derive(Debug, Serialize)]
pub struct RagSubmitRequest<'a> {
    pub repo_id: &'a str,
    pub messages: &'a [ChatMessage],
}

#[derive(Debug, Deserialize)]
pub struct RagSubmitResponse {
    pub request_id: String,
}

#[derive(Debug, Serialize)]
pub struct RagStatusRequest<'a> {
    pub request_id: &'a str,
}

/// Status of an asynchronous RAG request
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RagStatusResponse {
    pub status: RagStatus,
    #[serde(default)]
    pub response_details: Value,
}

impl RagStatusResponse {
    /// Human-readable payload: the answer on success, the error on failure
    ///
    /// Plain strings are used as-is; objects are searched for a well-known
    /// text field before falling back to their JSON form.
    pub fn payload_text(&self) -> String {
        match &self.response_details {
            Value::Null => match self.status {
                RagStatus::Error => "The request failed without details.".to_string(),
                _ => String::new(),
            },
            Value::String(text) => text.clone(),
            Value::Object(map) => ["answer", "response", "content", "error", "detail", "message"]
                .iter()
                .find_map(|key| map.get(*key).and_then(Value::as_str))
                .map(str::to_string)
                .unwrap_or_else(|| self.response_details.to_string()),
            other => other.to_string(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct TranslateRequest<'a> {
    pub text: &'a str,
    pub languages: &'a [String],
}

#[derive(Debug, Deserialize)]
pub struct TranslateResponse {
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub results: Map<String, Value>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn status(value: Value) -> RagStatusResponse {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_payload_text_plain_string() {
        let resp = status(json!({"status": "success", "response_details": "The answer"}));
        assert_eq!(resp.payload_text(), "The answer");
    }

    #[test]
    fn test_payload_text_object_fields() {
        let resp = status(json!({"status": "success", "response_details": {"answer": "42"}}));
        assert_eq!(resp.payload_text(), "42");

        let resp = status(json!({"status": "error", "response_details": {"error": "index missing"}}));
        assert_eq!(resp.payload_text(), "index missing");
    }

    #[test]
    fn test_payload_text_fallbacks() {
        let resp = status(json!({"status": "error"}));
        assert_eq!(resp.payload_text(), "The request failed without details.");

        let resp = status(json!({"status": "success", "response_details": {"chunks": 3}}));
        assert_eq!(resp.payload_text(), "{\"chunks\":3}");
    }

    #[test]
    fn test_rag_submit_body_shape() {
        let messages = vec![ChatMessage::user("hi")];
        let body = serde_json::to_value(RagSubmitRequest { repo_id: "r-1", messages: &messages }).unwrap();
        assert_eq!(
            body,
            json!({"repo_id": "r-1", "messages": [{"role": "user", "content": "hi"}]})
        );
    }
}

//! Domain models returned by the chain-reaction backend
//!
//! Field names follow the backend's JSON. Timestamps are kept as the ISO
//! strings the backend sends; rendering decides how to show them.

use crate::status::{JobStatus, ProcessingStatus};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// A file of an ingested repository
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RepoFile {
    pub id: String,
    pub path: String,
    pub summary_status: ProcessingStatus,
    pub chunks_status: ProcessingStatus,
    pub added_at: String,
    /// Only present on the detail endpoint
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    /// Only present on the detail endpoint
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw_content: Option<String>,
}

/// A synthetic Q&A generation batch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QaBatch {
    pub id: String,
    pub status: JobStatus,
    #[serde(default)]
    pub processed_files: u64,
    #[serde(default)]
    pub total_files: u64,
    pub added_at: String,
}

impl QaBatch {
    /// Only running or completed batches can be evaluated
    pub fn is_eval_candidate(&self) -> bool {
        matches!(self.status, JobStatus::Running | JobStatus::Completed)
    }
}

/// A generated question/answer pair
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QaPair {
    pub id: String,
    pub question: String,
    pub answer: String,
    #[serde(default)]
    pub evolution_strategy: Option<String>,
    #[serde(default)]
    pub question_score: Option<f64>,
    #[serde(default)]
    pub chunk_score: Option<f64>,
    #[serde(default)]
    pub chunk_id: Option<String>,
    #[serde(default)]
    pub file_id: Option<String>,
    #[serde(default)]
    pub flow_logs: Option<Value>,
    #[serde(default)]
    pub archived: bool,
}

/// An evaluation run over one Q&A batch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvalJob {
    pub id: String,
    pub qa_batch_id: String,
    pub status: JobStatus,
    #[serde(default)]
    pub total_qa_pairs: u64,
    #[serde(default)]
    pub processed_qa_pairs: u64,
    pub created_at: String,
    #[serde(default)]
    pub completed_at: Option<String>,
    #[serde(default)]
    pub batch_created_at: Option<String>,
}

/// Score of a single metric for one evaluated question
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricScore {
    #[serde(default)]
    pub score: f64,
    #[serde(default)]
    pub passed: bool,
    #[serde(default)]
    pub reason: Option<String>,
}

impl MetricScore {
    /// e.g. `85.0% ✓`
    pub fn badge(&self) -> String {
        format!("{} {}", format_percent(self.score), if self.passed { "✓" } else { "✗" })
    }
}

/// Evaluation result for one Q&A pair
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvalMetric {
    pub id: String,
    pub qa_id: String,
    pub question: String,
    pub expected_answer: String,
    #[serde(default)]
    pub actual_answer: Option<String>,
    #[serde(default)]
    pub relevant_chunks: Vec<Value>,
    /// Metric name to score object, plus a `status` entry
    #[serde(default)]
    pub metrics: Map<String, Value>,
    #[serde(default)]
    pub file_id: Option<String>,
    pub created_at: String,
}

impl EvalMetric {
    /// Parsed metric scores in display order, skipping the `status` entry
    pub fn scores(&self) -> Vec<(String, MetricScore)> {
        let mut scores: Vec<(String, MetricScore)> = self
            .metrics
            .iter()
            .filter(|(key, _)| key.as_str() != "status")
            .filter_map(|(key, value)| {
                serde_json::from_value::<MetricScore>(value.clone())
                    .ok()
                    .map(|score| (key.clone(), score))
            })
            .collect();
        scores.sort_by_key(|(key, _)| metric_rank(key));
        scores
    }

    /// The `status` entry of the metric map, if any
    pub fn evaluation_status(&self) -> Option<&str> {
        self.metrics.get("status").and_then(Value::as_str)
    }
}

/// Aggregate of one metric across an eval job
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricSummary {
    pub average_score: f64,
    pub pass_rate: f64,
    pub min_score: f64,
    pub max_score: f64,
    pub total_passed: u64,
    pub total_evaluated: u64,
}

/// Aggregates of every metric across an eval job
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OverallMetrics {
    #[serde(default)]
    pub total_evaluated: u64,
    #[serde(default)]
    pub metrics_summary: BTreeMap<String, MetricSummary>,
}

impl OverallMetrics {
    /// Summaries in display order
    pub fn ordered(&self) -> Vec<(&str, &MetricSummary)> {
        let mut entries: Vec<(&str, &MetricSummary)> = self
            .metrics_summary
            .iter()
            .map(|(key, summary)| (key.as_str(), summary))
            .collect();
        entries.sort_by_key(|(key, _)| metric_rank(key));
        entries
    }
}

/// Known metrics with their display names, in display order
pub const METRIC_DISPLAY_NAMES: [(&str, &str); 10] = [
    ("g_eval_correctness", "Correctness"),
    ("g_eval_coherence", "Coherence"),
    ("g_eval_tonality", "Tonality"),
    ("g_eval_safety", "Safety"),
    ("dag_score", "DAG Score"),
    ("contextual_relevancy", "Context Relevancy"),
    ("contextual_precision", "Context Precision"),
    ("contextual_recall", "Context Recall"),
    ("answer_relevancy", "Answer Relevancy"),
    ("answer_faithfulness", "Answer Faithfulness"),
];

/// Display name of a metric key; unknown keys are shown verbatim
pub fn metric_display_name(key: &str) -> &str {
    METRIC_DISPLAY_NAMES
        .iter()
        .find(|(k, _)| *k == key)
        .map(|(_, name)| *name)
        .unwrap_or(key)
}

// Unknown metrics sort after the known ones, alphabetically
fn metric_rank(key: &str) -> (usize, String) {
    let rank = METRIC_DISPLAY_NAMES
        .iter()
        .position(|(k, _)| *k == key)
        .unwrap_or(METRIC_DISPLAY_NAMES.len());
    (rank, key.to_string())
}

/// A 0..1 ratio as a percentage with one decimal
pub fn format_percent(ratio: f64) -> String {
    format!("{:.1}%", ratio * 100.0)
}

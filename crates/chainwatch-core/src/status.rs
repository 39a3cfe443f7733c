//! Status enums reported by the backend
//!
//! Every status the backend reports is a closed set. Adding a variant here
//! forces every `match` over it (badges, polling decisions) to be revisited.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Visual weight of a status badge
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tone {
    Neutral,
    Info,
    Warning,
    Success,
    Danger,
}

/// Per-file processing status (summary and chunking stages)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProcessingStatus {
    /// Work queued but not finished
    #[serde(alias = "processing")]
    Pending,
    /// File was deliberately not processed (binary, ignored, too large)
    Skipped,
    /// Stage finished
    #[serde(alias = "processed")]
    Completed,
}

impl ProcessingStatus {
    pub fn label(&self) -> &'static str {
        match self {
            ProcessingStatus::Pending => "Pending",
            ProcessingStatus::Skipped => "Skipped",
            ProcessingStatus::Completed => "Completed",
        }
    }

    pub fn tone(&self) -> Tone {
        match self {
            ProcessingStatus::Pending => Tone::Warning,
            ProcessingStatus::Skipped => Tone::Neutral,
            ProcessingStatus::Completed => Tone::Success,
        }
    }
}

impl fmt::Display for ProcessingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Lifecycle of a Q&A generation batch or an evaluation job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    #[default]
    Idle,
    Running,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn label(&self) -> &'static str {
        match self {
            JobStatus::Idle => "idle",
            JobStatus::Running => "running",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
        }
    }

    pub fn tone(&self) -> Tone {
        match self {
            JobStatus::Idle => Tone::Neutral,
            JobStatus::Running => Tone::Info,
            JobStatus::Completed => Tone::Success,
            JobStatus::Failed => Tone::Danger,
        }
    }

    /// True once the job will not change any more
    pub fn is_finished(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Status of an asynchronous RAG request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RagStatus {
    Pending,
    Success,
    Error,
}

impl RagStatus {
    /// Terminal statuses end polling
    pub fn is_terminal(&self) -> bool {
        match self {
            RagStatus::Pending => false,
            RagStatus::Success | RagStatus::Error => true,
        }
    }
}

impl fmt::Display for RagStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RagStatus::Pending => "pending",
            RagStatus::Success => "success",
            RagStatus::Error => "error",
        };
        f.write_str(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_processing_status_parse() {
        let status: ProcessingStatus = serde_json::from_str("\"pending\"").unwrap();
        assert_eq!(status, ProcessingStatus::Pending);

        let status: ProcessingStatus = serde_json::from_str("\"skipped\"").unwrap();
        assert_eq!(status, ProcessingStatus::Skipped);

        let status: ProcessingStatus = serde_json::from_str("\"completed\"").unwrap();
        assert_eq!(status, ProcessingStatus::Completed);
    }

    #[test]
    fn test_processing_status_legacy_aliases() {
        let status: ProcessingStatus = serde_json::from_str("\"processing\"").unwrap();
        assert_eq!(status, ProcessingStatus::Pending);

        let status: ProcessingStatus = serde_json::from_str("\"processed\"").unwrap();
        assert_eq!(status, ProcessingStatus::Completed);
    }

    #[test]
    fn test_unknown_status_is_rejected() {
        assert!(serde_json::from_str::<ProcessingStatus>("\"exploded\"").is_err());
        assert!(serde_json::from_str::<JobStatus>("\"paused\"").is_err());
        assert!(serde_json::from_str::<RagStatus>("\"queued\"").is_err());
    }

    #[test]
    fn test_badge_tones() {
        assert_eq!(ProcessingStatus::Pending.tone(), Tone::Warning);
        assert_eq!(ProcessingStatus::Skipped.tone(), Tone::Neutral);
        assert_eq!(ProcessingStatus::Completed.tone(), Tone::Success);

        assert_eq!(JobStatus::Idle.tone(), Tone::Neutral);
        assert_eq!(JobStatus::Running.tone(), Tone::Info);
        assert_eq!(JobStatus::Completed.tone(), Tone::Success);
        assert_eq!(JobStatus::Failed.tone(), Tone::Danger);
    }

    #[test]
    fn test_job_status_finished() {
        assert!(!JobStatus::Idle.is_finished());
        assert!(!JobStatus::Running.is_finished());
        assert!(JobStatus::Completed.is_finished());
        assert!(JobStatus::Failed.is_finished());
    }

    #[test]
    fn test_rag_status_terminal() {
        assert!(!RagStatus::Pending.is_terminal());
        assert!(RagStatus::Success.is_terminal());
        assert!(RagStatus::Error.is_terminal());
        assert_eq!(RagStatus::Error.to_string(), "error");
    }
}

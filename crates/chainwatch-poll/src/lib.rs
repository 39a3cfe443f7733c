//! Chainwatch client-side scheduling
//!
//! This crate keeps views in sync with the backend:
//! - Activity tracking with an explicit subscription lifecycle
//! - A cancellable periodic task with an optional overall timeout
//! - The polling refresher behind every list and detail view
//! - The submit-and-poll bridge behind RAG questions

pub mod activity;
pub mod bridge;
pub mod refresher;
pub mod source;
pub mod task;

// Re-export commonly used types
pub use activity::{ActivitySubscription, ActivityTracker};
pub use bridge::{
    BridgeConfig, BridgeError, BridgeOutcome, BridgeState, PendingAnswer, RagBackend, RagBridge,
    TIMEOUT_MESSAGE,
};
pub use refresher::{PollingRefresher, RefreshInterval, RefreshState, RefresherConfig};
pub use source::{FileDetailSource, ListKey, OverallMetricsSource, Refreshable};
pub use task::{PollOutcome, PollSchedule, PollTask};

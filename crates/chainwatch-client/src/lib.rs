//! Chainwatch HTTP client
//!
//! This crate talks to the chain-reaction backend:
//! - Shared HTTP client construction and retry policy
//! - Typed calls for ingestion, files, Q&A, evaluation, RAG and translation
//! - A generic paginated list fetch shared by every list view

pub mod api;
pub mod client;
pub mod error;
pub mod listing;
pub mod wire;

pub use api::{ChainClient, ChainClientConfig};
pub use error::{ClientError, Result};
pub use listing::{
    EvalJobListing, EvalMetricListing, FileListing, Listing, PageFetcher, QaBatchListing,
    QaPairListing,
};

//! Chainwatch Core Types
//!
//! This crate provides the types shared by every Chainwatch crate:
//! - Domain models returned by the chain-reaction backend
//! - Closed status enums for files, jobs and RAG requests
//! - Pagination math
//! - Conversation history for the RAG question flow
//! - Core error types

pub mod conversation;
pub mod error;
pub mod models;
pub mod pagination;
pub mod status;

pub use conversation::{ChatMessage, Conversation, Role};
pub use error::{Error, Result};
pub use pagination::{PageRequest, PagedResult, total_pages};
pub use status::{JobStatus, ProcessingStatus, RagStatus};

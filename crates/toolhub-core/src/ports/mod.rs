//! Port definitions (trait abstractions) for external systems.
//!
//! Ports define the interfaces that the core domain expects from infrastructure.
//! They contain no implementation details and use only domain types.
//!
//! # Design Rules
//!
//! - No `sqlx` types in any signature
//! - No process/network implementation details
//! - Traits are minimal and CRUD-focused for repositories

pub mod event_emitter;
pub mod mcp_error;
pub mod mcp_repository;
pub mod token_store;

pub use event_emitter::{AppEventEmitter, NoopEmitter};
pub use mcp_error::{McpErrorCategory, McpErrorInfo, McpServiceError};
pub use mcp_repository::{McpRepositoryError, McpServerRepository};
pub use token_store::{OAuthTokenStore, TokenStoreError};

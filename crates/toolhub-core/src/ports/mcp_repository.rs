//! MCP server repository trait and error types.
//!
//! This module defines the persistence adapter for MCP server configuration.

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::mcp::{McpServer, NewMcpServer};

/// Domain-specific errors for MCP repository operations.
///
/// Cloneable so that a single failed lookup can be handed to every caller
/// waiting on the same client creation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum McpRepositoryError {
    /// The requested MCP server was not found.
    #[error("MCP server not found: {0}")]
    NotFound(String),

    /// An MCP server with the same name already exists.
    #[error("MCP server already exists: {0}")]
    Conflict(String),

    /// Storage backend error (database, etc.).
    #[error("Storage error: {0}")]
    Internal(String),
}

/// Repository trait for MCP server persistence.
///
/// # Design Rules
///
/// - Environment variables and headers are embedded in `McpServer`
/// - `save()` is an upsert that replaces the entire server atomically
/// - Constraint: unique `name` across all servers
///
/// # Example
///
/// ```ignore
/// let saved = repo.save(NewMcpServer::new_stdio("fs", "npx", vec![], "alice")).await?;
/// let found = repo.find_by_id(&saved.id).await?;
/// let all = repo.list().await?;
/// ```
#[async_trait]
pub trait McpServerRepository: Send + Sync {
    /// Get an MCP server by id, `None` if absent.
    async fn find_by_id(&self, id: &str) -> Result<Option<McpServer>, McpRepositoryError>;

    /// Get an MCP server by its unique name, `None` if absent.
    async fn find_by_name(&self, name: &str) -> Result<Option<McpServer>, McpRepositoryError>;

    /// List all MCP servers, ordered by name.
    async fn list(&self) -> Result<Vec<McpServer>, McpRepositoryError>;

    /// Insert or replace an MCP server.
    ///
    /// Returns the stored server with its id and timestamps.
    ///
    /// # Errors
    ///
    /// - `Conflict` if another server already uses the name
    /// - `Internal` for storage errors
    async fn save(&self, server: NewMcpServer) -> Result<McpServer, McpRepositoryError>;

    /// Delete an MCP server by id.
    ///
    /// # Errors
    ///
    /// - `NotFound` if no server with the given id exists
    async fn delete(&self, id: &str) -> Result<(), McpRepositoryError>;

    /// Update only the `last_connected_at` timestamp.
    async fn update_last_connected(&self, id: &str) -> Result<(), McpRepositoryError>;
}

//! Repository implementations using `SQLite`.
//!
//! These implementations encapsulate all SQL queries and database access.
//! The `SqlitePool` is confined to this module and never exposed through
//! the port trait signatures.

mod row_mappers;
mod sqlite_mcp_repository;
mod sqlite_token_store;

pub use sqlite_mcp_repository::SqliteMcpRepository;
pub use sqlite_token_store::SqliteTokenStore;

//! SQLite adapters for the toolhub ports.
//!
//! - [`SqliteMcpRepository`] implements `McpServerRepository`
//! - [`SqliteTokenStore`] implements `OAuthTokenStore`
//! - [`setup_database`] opens the pool and creates the schema

#![deny(unsafe_code)]

pub mod factory;
pub mod repositories;
pub mod setup;

// Re-export factory for convenient access
pub use factory::{CoreFactory, Repos};

// Re-export repository implementations
pub use repositories::{SqliteMcpRepository, SqliteTokenStore};

// Re-export setup functions for convenient access
pub use setup::setup_database;
#[cfg(any(test, feature = "test-utils"))]
pub use setup::setup_test_database;

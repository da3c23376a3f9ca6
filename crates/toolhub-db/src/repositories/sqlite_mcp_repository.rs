//! `SQLite` implementation of the MCP server repository.
//!
//! Environment variables live in a separate table with base64 encoding
//! (not encryption). HTTP headers and stdio args are stored as JSON text.

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::Utc;
use sqlx::SqlitePool;

use toolhub_core::domain::mcp::{
    McpEnvEntry, McpServer, McpServerConfig, McpServerType, NewMcpServer, Visibility,
};
use toolhub_core::ports::{McpRepositoryError, McpServerRepository};

use super::row_mappers::{
    decode_env_value, encode_env_value, format_datetime, parse_datetime, parse_datetime_or_now,
};

const SERVER_COLUMNS: &str = "id, name, type, enabled, command, args, cwd, path_extra, url, \
     headers, visibility, owner_user_id, created_at, updated_at, last_connected_at";

/// `SQLite` implementation of the MCP server repository.
pub struct SqliteMcpRepository {
    pool: SqlitePool,
}

impl SqliteMcpRepository {
    /// Create a new `SQLite` MCP repository.
    pub const fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Internal row types for database queries
// ─────────────────────────────────────────────────────────────────────────────

#[derive(sqlx::FromRow)]
struct McpServerRow {
    id: String,
    name: String,
    #[sqlx(rename = "type")]
    server_type: String,
    enabled: bool,
    command: Option<String>,
    args: Option<String>,
    cwd: Option<String>,
    path_extra: Option<String>,
    url: Option<String>,
    headers: Option<String>,
    visibility: String,
    owner_user_id: String,
    created_at: String,
    updated_at: String,
    last_connected_at: Option<String>,
}

#[derive(sqlx::FromRow)]
struct EnvRow {
    key: String,
    value: String,
}

// ─────────────────────────────────────────────────────────────────────────────
// Helper functions
// ─────────────────────────────────────────────────────────────────────────────

/// Convert a `McpServerRow` (with env) to domain `McpServer`.
fn row_to_server(row: McpServerRow, env: Vec<McpEnvEntry>) -> McpServer {
    let server_type = match row.server_type.as_str() {
        "http" => McpServerType::Http,
        _ => McpServerType::Stdio,
    };

    let visibility = match row.visibility.as_str() {
        "public" => Visibility::Public,
        _ => Visibility::Private,
    };

    let args: Option<Vec<String>> = row.args.and_then(|a| serde_json::from_str(&a).ok());
    let headers: BTreeMap<String, String> = row
        .headers
        .and_then(|h| serde_json::from_str(&h).ok())
        .unwrap_or_default();

    let config = McpServerConfig {
        command: row.command,
        args,
        working_dir: row.cwd,
        path_extra: row.path_extra,
        url: row.url,
        headers,
    };

    McpServer {
        id: row.id,
        name: row.name,
        server_type,
        config,
        env,
        visibility,
        owner_user_id: row.owner_user_id,
        enabled: row.enabled,
        created_at: parse_datetime_or_now(&row.created_at),
        updated_at: parse_datetime_or_now(&row.updated_at),
        last_connected_at: row.last_connected_at.as_deref().and_then(parse_datetime),
    }
}

/// Map `SQLx` errors to `McpRepositoryError`.
fn map_sqlx_error(e: sqlx::Error) -> McpRepositoryError {
    // Check for unique constraint violations (name conflict)
    let msg = e.to_string();
    if msg.contains("UNIQUE constraint failed") && msg.contains("name") {
        return McpRepositoryError::Conflict("MCP server name already exists".to_string());
    }
    McpRepositoryError::Internal(msg)
}

// ─────────────────────────────────────────────────────────────────────────────
// Repository implementation
// ─────────────────────────────────────────────────────────────────────────────

#[async_trait]
impl McpServerRepository for SqliteMcpRepository {
    async fn find_by_id(&self, id: &str) -> Result<Option<McpServer>, McpRepositoryError> {
        let row = sqlx::query_as::<_, McpServerRow>(&format!(
            "SELECT {SERVER_COLUMNS} FROM mcp_servers WHERE id = ?"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        match row {
            Some(row) => {
                let env = self.fetch_env(&row.id).await?;
                Ok(Some(row_to_server(row, env)))
            }
            None => Ok(None),
        }
    }

    async fn find_by_name(&self, name: &str) -> Result<Option<McpServer>, McpRepositoryError> {
        let row = sqlx::query_as::<_, McpServerRow>(&format!(
            "SELECT {SERVER_COLUMNS} FROM mcp_servers WHERE name = ?"
        ))
        .bind(name)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        match row {
            Some(row) => {
                let env = self.fetch_env(&row.id).await?;
                Ok(Some(row_to_server(row, env)))
            }
            None => Ok(None),
        }
    }

    async fn list(&self) -> Result<Vec<McpServer>, McpRepositoryError> {
        let rows = sqlx::query_as::<_, McpServerRow>(&format!(
            "SELECT {SERVER_COLUMNS} FROM mcp_servers ORDER BY name"
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        let mut servers = Vec::with_capacity(rows.len());
        for row in rows {
            let env = self.fetch_env(&row.id).await?;
            servers.push(row_to_server(row, env));
        }

        Ok(servers)
    }

    async fn save(&self, server: NewMcpServer) -> Result<McpServer, McpRepositoryError> {
        let id = server
            .id
            .clone()
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
        let now = format_datetime(Utc::now());

        let args_json = serde_json::to_string(server.config.args())
            .map_err(|e| McpRepositoryError::Internal(e.to_string()))?;
        let headers_json = serde_json::to_string(&server.config.headers)
            .map_err(|e| McpRepositoryError::Internal(e.to_string()))?;

        let mut tx = self.pool.begin().await.map_err(map_sqlx_error)?;

        let exists: Option<(String,)> = sqlx::query_as("SELECT id FROM mcp_servers WHERE id = ?")
            .bind(&id)
            .fetch_optional(&mut *tx)
            .await
            .map_err(map_sqlx_error)?;

        if exists.is_some() {
            sqlx::query(
                r#"
                UPDATE mcp_servers
                SET name = ?, type = ?, enabled = ?, command = ?, args = ?, cwd = ?, path_extra = ?,
                    url = ?, headers = ?, visibility = ?, owner_user_id = ?, updated_at = ?
                WHERE id = ?
                "#,
            )
            .bind(&server.name)
            .bind(server.server_type.as_str())
            .bind(server.enabled)
            .bind(&server.config.command)
            .bind(&args_json)
            .bind(&server.config.working_dir)
            .bind(&server.config.path_extra)
            .bind(&server.config.url)
            .bind(&headers_json)
            .bind(server.visibility.as_str())
            .bind(&server.owner_user_id)
            .bind(&now)
            .bind(&id)
            .execute(&mut *tx)
            .await
            .map_err(map_sqlx_error)?;
        } else {
            sqlx::query(
                r#"
                INSERT INTO mcp_servers (id, name, type, enabled, command, args, cwd, path_extra, url,
                                         headers, visibility, owner_user_id, created_at, updated_at)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(&id)
            .bind(&server.name)
            .bind(server.server_type.as_str())
            .bind(server.enabled)
            .bind(&server.config.command)
            .bind(&args_json)
            .bind(&server.config.working_dir)
            .bind(&server.config.path_extra)
            .bind(&server.config.url)
            .bind(&headers_json)
            .bind(server.visibility.as_str())
            .bind(&server.owner_user_id)
            .bind(&now)
            .bind(&now)
            .execute(&mut *tx)
            .await
            .map_err(map_sqlx_error)?;
        }

        // Atomic env replacement: delete all and re-insert
        sqlx::query("DELETE FROM mcp_server_env WHERE server_id = ?")
            .bind(&id)
            .execute(&mut *tx)
            .await
            .map_err(map_sqlx_error)?;

        for entry in &server.env {
            sqlx::query("INSERT INTO mcp_server_env (server_id, key, value) VALUES (?, ?, ?)")
                .bind(&id)
                .bind(&entry.key)
                .bind(encode_env_value(&entry.value))
                .execute(&mut *tx)
                .await
                .map_err(map_sqlx_error)?;
        }

        tx.commit().await.map_err(map_sqlx_error)?;

        tracing::debug!(server_id = %id, server_name = %server.name, "Saved MCP server");

        self.find_by_id(&id)
            .await?
            .ok_or_else(|| McpRepositoryError::Internal(format!("saved server {id} vanished")))
    }

    async fn delete(&self, id: &str) -> Result<(), McpRepositoryError> {
        let mut tx = self.pool.begin().await.map_err(map_sqlx_error)?;

        sqlx::query("DELETE FROM mcp_server_env WHERE server_id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(map_sqlx_error)?;

        let result = sqlx::query("DELETE FROM mcp_servers WHERE id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(map_sqlx_error)?;

        if result.rows_affected() == 0 {
            return Err(McpRepositoryError::NotFound(id.to_string()));
        }

        tx.commit().await.map_err(map_sqlx_error)?;
        Ok(())
    }

    async fn update_last_connected(&self, id: &str) -> Result<(), McpRepositoryError> {
        let result = sqlx::query("UPDATE mcp_servers SET last_connected_at = ? WHERE id = ?")
            .bind(format_datetime(Utc::now()))
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(map_sqlx_error)?;

        if result.rows_affected() == 0 {
            return Err(McpRepositoryError::NotFound(id.to_string()));
        }

        Ok(())
    }
}

impl SqliteMcpRepository {
    /// Fetch and decode environment variables for a server.
    async fn fetch_env(&self, server_id: &str) -> Result<Vec<McpEnvEntry>, McpRepositoryError> {
        let rows = sqlx::query_as::<_, EnvRow>(
            "SELECT key, value FROM mcp_server_env WHERE server_id = ? ORDER BY id",
        )
        .bind(server_id)
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        let mut env = Vec::with_capacity(rows.len());
        for row in rows {
            let decoded_value = decode_env_value(&row.value).map_err(McpRepositoryError::Internal)?;
            env.push(McpEnvEntry::new(row.key, decoded_value));
        }

        Ok(env)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

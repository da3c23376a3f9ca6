//! OAuth authorization-code flow for HTTP MCP servers.
//!
//! [`HttpOAuthFlow::begin_authorization`] discovers the authorization server
//! (RFC 9728 protected resource metadata when the server advertises it,
//! otherwise RFC 8414 on the server's origin), registers a client
//! dynamically (RFC 7591), records a PKCE session in the token store and
//! returns the URL the user must visit. The redirect target later hands
//! `state` and `code` to [`crate::McpService::complete_authorization`].

use std::sync::Arc;

use async_trait::async_trait;
use base64::Engine;
use chrono::{Duration, Utc};
use serde::Deserialize;
use sha2::{Digest, Sha256};
use thiserror::Error;

use toolhub_core::{
    McpServer, McpServiceError, OAuthSession, OAuthTokenStore, OAuthTokens, TokenStoreError,
};

/// Errors from the OAuth flow.
#[derive(Debug, Error)]
pub enum OAuthError {
    #[error("authorization server discovery failed: {0}")]
    Discovery(String),

    #[error("client registration failed: {0}")]
    Registration(String),

    #[error("token exchange failed: {0}")]
    Exchange(String),

    #[error("invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error(transparent)]
    Store(#[from] TokenStoreError),
}

impl From<OAuthError> for McpServiceError {
    fn from(e: OAuthError) -> Self {
        match e {
            OAuthError::Store(e) => Self::TokenStore(e),
            other => Self::OAuth(other.to_string()),
        }
    }
}

/// Starts and completes OAuth handshakes.
#[async_trait]
pub trait OAuthFlow: Send + Sync {
    /// Prepare a pending session and return the authorization URL.
    async fn begin_authorization(
        &self,
        server: &McpServer,
        www_authenticate: Option<&str>,
    ) -> Result<String, OAuthError>;

    /// Exchange an authorization code for tokens.
    async fn exchange_code(
        &self,
        session: &OAuthSession,
        code: &str,
    ) -> Result<OAuthTokens, OAuthError>;
}

/// Authorization server metadata (RFC 8414), the fields this flow uses.
#[derive(Debug, Clone, Deserialize)]
pub struct AuthorizationServerMetadata {
    pub authorization_endpoint: String,
    pub token_endpoint: String,
    #[serde(default)]
    pub registration_endpoint: Option<String>,
    #[serde(default)]
    pub scopes_supported: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
struct ProtectedResourceMetadata {
    #[serde(default)]
    authorization_servers: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct RegistrationResponse {
    client_id: String,
    #[serde(default)]
    client_secret: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    token_type: Option<String>,
    #[serde(default)]
    expires_in: Option<i64>,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    scope: Option<String>,
}

/// Production [`OAuthFlow`] over reqwest.
pub struct HttpOAuthFlow {
    http: reqwest::Client,
    tokens: Arc<dyn OAuthTokenStore>,
    redirect_uri: String,
}

impl HttpOAuthFlow {
    pub fn new(tokens: Arc<dyn OAuthTokenStore>, redirect_uri: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            tokens,
            redirect_uri: redirect_uri.into(),
        }
    }

    /// Locate the authorization server for `server_url`.
    async fn discover(
        &self,
        server_url: &url::Url,
        www_authenticate: Option<&str>,
    ) -> Result<AuthorizationServerMetadata, OAuthError> {
        let mut issuer = origin(server_url);

        if let Some(resource_metadata) = www_authenticate.and_then(resource_metadata_url) {
            match self.fetch_json::<ProtectedResourceMetadata>(&resource_metadata).await {
                Ok(meta) => {
                    if let Some(first) = meta.authorization_servers.first() {
                        issuer = url::Url::parse(first)?;
                    }
                }
                Err(e) => tracing::debug!(error = %e, "Protected resource metadata unavailable"),
            }
        }

        let well_known = authorization_server_metadata_url(&issuer);
        match self
            .fetch_json::<AuthorizationServerMetadata>(well_known.as_str())
            .await
        {
            Ok(meta) => Ok(meta),
            Err(e) => {
                // Servers without metadata use the default endpoint paths
                tracing::debug!(issuer = %issuer, error = %e, "Falling back to default OAuth endpoints");
                Ok(AuthorizationServerMetadata {
                    authorization_endpoint: issuer.join("/authorize")?.to_string(),
                    token_endpoint: issuer.join("/token")?.to_string(),
                    registration_endpoint: Some(issuer.join("/register")?.to_string()),
                    scopes_supported: None,
                })
            }
        }
    }

    async fn fetch_json<T: for<'de> Deserialize<'de>>(&self, url: &str) -> Result<T, OAuthError> {
        let response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| OAuthError::Discovery(e.to_string()))?;

        if !response.status().is_success() {
            return Err(OAuthError::Discovery(format!(
                "{url} returned HTTP {}",
                response.status()
            )));
        }

        response
            .json()
            .await
            .map_err(|e| OAuthError::Discovery(e.to_string()))
    }

    async fn register(&self, endpoint: &str) -> Result<RegistrationResponse, OAuthError> {
        let body = serde_json::json!({
            "client_name": "toolhub",
            "redirect_uris": [self.redirect_uri],
            "grant_types": ["authorization_code", "refresh_token"],
            "response_types": ["code"],
            "token_endpoint_auth_method": "none"
        });

        let response = self
            .http
            .post(endpoint)
            .json(&body)
            .send()
            .await
            .map_err(|e| OAuthError::Registration(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(OAuthError::Registration(format!("HTTP {status}: {text}")));
        }

        response
            .json()
            .await
            .map_err(|e| OAuthError::Registration(e.to_string()))
    }
}

#[async_trait]
impl OAuthFlow for HttpOAuthFlow {
    async fn begin_authorization(
        &self,
        server: &McpServer,
        www_authenticate: Option<&str>,
    ) -> Result<String, OAuthError> {
        let raw_url = server
            .config
            .url
            .as_deref()
            .ok_or_else(|| OAuthError::Discovery("server has no URL".to_string()))?;
        let server_url = url::Url::parse(raw_url)?;

        let metadata = self.discover(&server_url, www_authenticate).await?;
        let registration_endpoint = metadata.registration_endpoint.as_deref().ok_or_else(|| {
            OAuthError::Registration(
                "authorization server does not support dynamic registration".to_string(),
            )
        })?;
        let client = self.register(registration_endpoint).await?;

        let code_verifier = generate_code_verifier();
        let session = OAuthSession {
            state: uuid::Uuid::new_v4().simple().to_string(),
            server_id: server.id.clone(),
            code_verifier: code_verifier.clone(),
            client_id: client.client_id,
            client_secret: client.client_secret,
            redirect_uri: self.redirect_uri.clone(),
            token_endpoint: metadata.token_endpoint.clone(),
            created_at: Utc::now(),
        };

        let url = authorization_url(&metadata, &session, &code_challenge(&code_verifier), raw_url)?;
        self.tokens.save_session(&session).await?;

        tracing::info!(server_id = %server.id, server_name = %server.name, "OAuth authorization started");
        Ok(url)
    }

    async fn exchange_code(
        &self,
        session: &OAuthSession,
        code: &str,
    ) -> Result<OAuthTokens, OAuthError> {
        let mut form = vec![
            ("grant_type", "authorization_code"),
            ("code", code),
            ("redirect_uri", session.redirect_uri.as_str()),
            ("client_id", session.client_id.as_str()),
            ("code_verifier", session.code_verifier.as_str()),
        ];
        if let Some(secret) = &session.client_secret {
            form.push(("client_secret", secret.as_str()));
        }

        let response = self
            .http
            .post(&session.token_endpoint)
            .form(&form)
            .send()
            .await
            .map_err(|e| OAuthError::Exchange(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(OAuthError::Exchange(format!("HTTP {status}: {text}")));
        }

        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| OAuthError::Exchange(e.to_string()))?;

        Ok(OAuthTokens {
            access_token: token.access_token,
            token_type: token.token_type.unwrap_or_else(|| "Bearer".to_string()),
            refresh_token: token.refresh_token,
            expires_at: token
                .expires_in
                .map(|secs| Utc::now() + Duration::seconds(secs)),
            scope: token.scope,
        })
    }
}

/// `scheme://host[:port]/` of a URL.
fn origin(url: &url::Url) -> url::Url {
    let mut origin = url.clone();
    origin.set_path("/");
    origin.set_query(None);
    origin.set_fragment(None);
    origin
}

/// RFC 8414 metadata location: the well-known segment goes between the
/// host and any issuer path.
fn authorization_server_metadata_url(issuer: &url::Url) -> url::Url {
    let issuer_path = issuer.path().trim_end_matches('/');
    let mut url = issuer.clone();
    url.set_path(&format!("/.well-known/oauth-authorization-server{issuer_path}"));
    url.set_query(None);
    url.set_fragment(None);
    url
}

/// Extract `resource_metadata="..."` from a `WWW-Authenticate` header.
fn resource_metadata_url(header: &str) -> Option<String> {
    let start = header.find("resource_metadata=")? + "resource_metadata=".len();
    let rest = &header[start..];
    let value = rest.strip_prefix('"').map_or_else(
        || rest.split([',', ' ']).next().unwrap_or_default(),
        |quoted| quoted.split('"').next().unwrap_or_default(),
    );
    (!value.is_empty()).then(|| value.to_string())
}

/// 64 characters from the unreserved set, within RFC 7636's 43..=128 range.
fn generate_code_verifier() -> String {
    format!(
        "{}{}",
        uuid::Uuid::new_v4().simple(),
        uuid::Uuid::new_v4().simple()
    )
}

/// S256 PKCE challenge.
fn code_challenge(verifier: &str) -> String {
    let digest = Sha256::digest(verifier.as_bytes());
    base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(digest)
}

fn authorization_url(
    metadata: &AuthorizationServerMetadata,
    session: &OAuthSession,
    challenge: &str,
    resource: &str,
) -> Result<String, OAuthError> {
    let mut url = url::Url::parse(&metadata.authorization_endpoint)?;
    {
        let mut query = url.query_pairs_mut();
        query
            .append_pair("response_type", "code")
            .append_pair("client_id", &session.client_id)
            .append_pair("redirect_uri", &session.redirect_uri)
            .append_pair("code_challenge", challenge)
            .append_pair("code_challenge_method", "S256")
            .append_pair("state", &session.state)
            .append_pair("resource", resource);
        if let Some(scopes) = metadata.scopes_supported.as_ref().filter(|s| !s.is_empty()) {
            query.append_pair("scope", &scopes.join(" "));
        }
    }
    Ok(url.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_code_challenge_matches_rfc7636_example() {
        // Appendix B of RFC 7636
        let challenge = code_challenge("dBjftJeZ4CVP-mB92K27uhbUJU1p1r_wW1gFWFOEjXk");
        assert_eq!(challenge, "E9Melhoa2OwvFrEMTJguCHaoeK1t8URWbuGJSstw-cM");
    }

    #[test]
    fn test_code_verifier_length() {
        let verifier = generate_code_verifier();
        assert_eq!(verifier.len(), 64);
        assert!(verifier.chars().all(|c| c.is_ascii_alphanumeric()));
    }

    #[test]
    fn test_origin_strips_path() {
        let url = url::Url::parse("https://mcp.example.com:8443/v1/mcp?x=1").unwrap();
        assert_eq!(origin(&url).as_str(), "https://mcp.example.com:8443/");
    }

    #[test]
    fn test_metadata_url_keeps_issuer_path() {
        let issuer = url::Url::parse("https://auth.example/tenant1").unwrap();
        assert_eq!(
            authorization_server_metadata_url(&issuer).as_str(),
            "https://auth.example/.well-known/oauth-authorization-server/tenant1"
        );

        let issuer = url::Url::parse("https://auth.example/").unwrap();
        assert_eq!(
            authorization_server_metadata_url(&issuer).as_str(),
            "https://auth.example/.well-known/oauth-authorization-server"
        );
    }

    #[test]
    fn test_resource_metadata_url() {
        let header = r#"Bearer error="invalid_token", resource_metadata="https://mcp.example.com/.well-known/oauth-protected-resource""#;
        assert_eq!(
            resource_metadata_url(header).as_deref(),
            Some("https://mcp.example.com/.well-known/oauth-protected-resource")
        );
        assert_eq!(resource_metadata_url("Bearer realm=\"mcp\""), None);
    }

    #[test]
    fn test_authorization_url_carries_pkce_and_state() {
        let metadata = AuthorizationServerMetadata {
            authorization_endpoint: "https://auth.example.com/authorize".into(),
            token_endpoint: "https://auth.example.com/token".into(),
            registration_endpoint: None,
            scopes_supported: Some(vec!["mcp".into(), "offline_access".into()]),
        };
        let session = OAuthSession {
            state: "state123".into(),
            server_id: "s1".into(),
            code_verifier: "verifier".into(),
            client_id: "client-1".into(),
            client_secret: None,
            redirect_uri: "http://localhost:8976/callback".into(),
            token_endpoint: metadata.token_endpoint.clone(),
            created_at: Utc::now(),
        };

        let url = authorization_url(&metadata, &session, "challenge", "https://mcp.example.com/mcp")
            .unwrap();
        let parsed = url::Url::parse(&url).unwrap();
        let query: std::collections::HashMap<_, _> = parsed.query_pairs().into_owned().collect();

        assert_eq!(query["state"], "state123");
        assert_eq!(query["client_id"], "client-1");
        assert_eq!(query["code_challenge"], "challenge");
        assert_eq!(query["code_challenge_method"], "S256");
        assert_eq!(query["redirect_uri"], "http://localhost:8976/callback");
        assert_eq!(query["scope"], "mcp offline_access");
    }
}

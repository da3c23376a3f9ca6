//! End-to-end scenarios through the `McpService` facade.

mod common;

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use tokio_util::sync::CancellationToken;

use common::{FakeBehavior, FakeStats, Harness, weather_behavior, weather_server};
use toolhub_core::{
    AppEvent, McpServerRepository, McpServerStatus, McpServiceError, NewMcpServer,
    OAuthTokenStore, OAuthTokens, Visibility,
};
use toolhub_mcp::{McpClient, McpClientError, Resume};

fn oauth_server() -> NewMcpServer {
    NewMcpServer::new_http("notes", "https://notes.example/mcp", "alice").with_id("s2")
}

fn oauth_behavior() -> FakeBehavior {
    FakeBehavior {
        requires_auth: true,
        ..FakeBehavior::with_tools(&["list_notes"])
    }
}

#[tokio::test]
async fn weather_tool_call_returns_text() {
    let h = Harness::new();
    h.transports.set("s1", weather_behavior());
    let service = h.service();

    let client = service.persist_client(weather_server()).await.unwrap();
    assert_eq!(client.status().await, McpServerStatus::Connected);

    let result = service
        .tool_call("s1", "get_weather", json!({ "latitude": 1, "longitude": 2 }))
        .await
        .unwrap();

    assert!(!result.is_error);
    assert_eq!(result.text(), "Sunny at 1,2");
}

#[tokio::test]
async fn call_by_name_matches_call_by_id() {
    let h = Harness::new();
    h.seed(weather_server(), weather_behavior()).await;
    let service = h.service();

    let input = json!({ "latitude": 48.1, "longitude": 11.6 });
    let by_id = service
        .tool_call("s1", "get_weather", input.clone())
        .await
        .unwrap();
    let by_name = service
        .tool_call_by_server_name("weather", "get_weather", input)
        .await
        .unwrap();

    assert_eq!(by_id, by_name);
}

#[tokio::test]
async fn call_by_unknown_name_fails() {
    let h = Harness::new();
    let service = h.service();

    let err = service
        .tool_call_by_server_name("nope", "anything", json!({}))
        .await
        .unwrap_err();
    assert!(matches!(err, McpServiceError::ServerNotFound(name) if name == "nope"));
}

#[tokio::test]
async fn call_on_missing_config_fails() {
    let h = Harness::new();
    let service = h.service();

    let err = service.tool_call("ghost", "x", json!({})).await.unwrap_err();
    assert!(matches!(err, McpServiceError::ConfigNotFound(_)));
}

#[tokio::test]
async fn call_on_errored_client_never_reaches_transport() {
    let h = Harness::new();
    h.seed(
        weather_server(),
        FakeBehavior {
            fail_connect: Some("spawn failed".to_string()),
            ..weather_behavior()
        },
    )
    .await;
    let service = h.service();

    let err = service
        .tool_call("s1", "get_weather", json!({}))
        .await
        .unwrap_err();

    assert!(matches!(err, McpServiceError::NotConnected(id) if id == "s1"));
    assert_eq!(FakeStats::get(&h.stats().calls), 0);
}

#[tokio::test]
async fn call_on_connecting_client_never_reaches_transport() {
    let h = Harness::new();
    let server = weather_server().into_unsaved("s1");
    h.transports.set("s1", weather_behavior());

    let deps = h.deps();
    let client = McpClient::new(
        server.clone(),
        deps.transports.create(&server),
        deps.tokens,
        deps.oauth,
    );
    assert_eq!(client.status().await, McpServerStatus::Connecting);

    let err = client
        .call_tool("get_weather", json!({}), None)
        .await
        .unwrap_err();

    assert!(matches!(err, McpClientError::NotConnected(_)));
    assert_eq!(FakeStats::get(&h.stats().calls), 0);
}

#[tokio::test]
async fn unknown_tool_is_rejected_locally() {
    let h = Harness::new();
    h.seed(weather_server(), weather_behavior()).await;
    let service = h.service();

    let err = service
        .tool_call("s1", "get_forecast", json!({}))
        .await
        .unwrap_err();

    assert!(
        matches!(err, McpServiceError::ToolNotFound { server_id, tool } if server_id == "s1" && tool == "get_forecast")
    );
    assert_eq!(FakeStats::get(&h.stats().calls), 0);
}

#[tokio::test]
async fn transport_failure_surfaces_and_emits_error() {
    let h = Harness::new();
    h.seed(weather_server(), weather_behavior()).await;
    let service = h.service();

    let err = service
        .tool_call("s1", "explode", json!({}))
        .await
        .unwrap_err();

    assert!(matches!(err, McpServiceError::ToolCall(_)));
    assert!(
        h.events
            .events()
            .iter()
            .any(|e| matches!(e, AppEvent::McpServerError { .. }))
    );
    // No retry.
    assert_eq!(FakeStats::get(&h.stats().calls), 1);
}

#[tokio::test]
async fn cancelled_call_stops_waiting() {
    let h = Harness::new();
    h.seed(weather_server(), weather_behavior()).await;
    let service = h.service();

    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(20)).await;
        trigger.cancel();
    });

    let err = tokio::time::timeout(
        Duration::from_secs(5),
        service.tool_call_with_cancel("s1", "slow", json!({}), Some(&cancel)),
    )
    .await
    .expect("cancellation should end the call")
    .unwrap_err();

    assert!(matches!(err, McpServiceError::Cancelled));
    assert_eq!(FakeStats::get(&h.stats().cancelled), 1);

    // The handle stays usable.
    let client = service.get_client("s1").await.unwrap().unwrap();
    assert_eq!(client.status().await, McpServerStatus::Connected);
}

#[tokio::test]
async fn remove_deletes_config_tokens_and_client() {
    let h = Harness::new();
    h.seed(weather_server(), weather_behavior()).await;
    h.tokens
        .save_tokens("s1", &OAuthTokens::bearer("secret"))
        .await
        .unwrap();
    let service = h.service();

    service.get_client("s1").await.unwrap().unwrap();
    service.remove_client("s1").await.unwrap();

    assert!(service.get_clients().await.is_empty());
    assert!(service.get_client("s1").await.unwrap().is_none());
    assert!(h.repo.ids().is_empty());
    assert!(!h.tokens.has_tokens("s1"));
    assert!(
        h.events
            .events()
            .iter()
            .any(|e| matches!(e, AppEvent::McpServerRemoved { server_id } if server_id == "s1"))
    );
}

#[tokio::test]
async fn remove_unknown_id_fails() {
    let h = Harness::new();
    let err = h.service().remove_client("ghost").await.unwrap_err();
    assert!(matches!(err, McpServiceError::ConfigNotFound(_)));
}

#[tokio::test]
async fn persist_rejects_invalid_config() {
    let h = Harness::new();
    let service = h.service();

    let err = service
        .persist_client(NewMcpServer::new_http("broken", "", "alice"))
        .await
        .unwrap_err();

    assert!(matches!(err, McpServiceError::InvalidConfig(_)));
    assert!(h.repo.ids().is_empty());
    assert_eq!(FakeStats::get(&h.stats().created), 0);
}

#[tokio::test]
async fn persist_duplicate_name_propagates_conflict() {
    let h = Harness::new();
    h.seed(weather_server(), weather_behavior()).await;
    let service = h.service();

    let err = service
        .persist_client(NewMcpServer::new_stdio(
            "weather",
            "other-mcp",
            vec![],
            "bob",
        ))
        .await
        .unwrap_err();

    assert!(matches!(err, McpServiceError::Repository(_)));
}

#[tokio::test]
async fn persist_replaces_running_client() {
    let h = Harness::new();
    h.seed(weather_server(), FakeBehavior::with_tools(&["v1"]))
        .await;
    let service = h.service();

    let before = service.get_client("s1").await.unwrap().unwrap();

    h.transports.set("s1", FakeBehavior::with_tools(&["v2"]));
    let after = service
        .persist_client(weather_server().with_env("API_KEY", "k"))
        .await
        .unwrap();

    assert!(!Arc::ptr_eq(&before, &after));
    assert_eq!(before.status().await, McpServerStatus::Disconnected);
    assert_eq!(after.tools().await[0].name, "v2");
    assert_eq!(after.server().env.len(), 1);
    assert!(
        h.events
            .events()
            .iter()
            .any(|e| matches!(e, AppEvent::McpServerSaved { server } if server.id == "s1"))
    );
}

#[tokio::test]
async fn refresh_unknown_id_fails() {
    let h = Harness::new();
    let err = h.service().refresh_client("ghost").await.unwrap_err();
    assert!(matches!(err, McpServiceError::ConfigNotFound(_)));
}

#[tokio::test]
async fn oauth_server_authorizes_then_connects_after_refresh() {
    let h = Harness::new();
    h.transports.set("s2", oauth_behavior());
    let service = h.service();

    let client = service.persist_client(oauth_server()).await.unwrap();
    assert_eq!(client.status().await, McpServerStatus::Authorizing);

    let url = client.authorization_url().await.unwrap();
    assert!(!url.is_empty());

    let info = &service.get_clients().await[0];
    assert_eq!(info.authorization_url.as_deref(), Some(url.as_str()));
    assert!(h.events.events().iter().any(|e| matches!(
        e,
        AppEvent::McpClientAuthorizing { server_id, .. } if server_id == "s2"
    )));

    let err = service
        .tool_call("s2", "list_notes", json!({}))
        .await
        .unwrap_err();
    assert!(matches!(err, McpServiceError::NotConnected(_)));

    h.tokens
        .save_tokens("s2", &OAuthTokens::bearer("granted"))
        .await
        .unwrap();
    service.refresh_client("s2").await.unwrap();

    let client = service.get_client("s2").await.unwrap().unwrap();
    assert_eq!(client.status().await, McpServerStatus::Connected);
    assert!(client.authorization_url().await.is_none());
}

#[tokio::test]
async fn complete_authorization_exchanges_code_and_reconnects() {
    let h = Harness::new();
    h.transports.set("s2", oauth_behavior());
    let service = h.service();

    service.persist_client(oauth_server()).await.unwrap();
    assert_eq!(h.tokens.session_count(), 1);

    let client = service
        .complete_authorization("state-s2", "the-code")
        .await
        .unwrap();

    assert_eq!(client.status().await, McpServerStatus::Connected);
    let stored = h.tokens.get_tokens("s2").await.unwrap().unwrap();
    assert_eq!(stored.access_token, "token-for-the-code");
    assert_eq!(h.tokens.session_count(), 0);

    // The state is single use.
    let err = service
        .complete_authorization("state-s2", "the-code")
        .await
        .unwrap_err();
    assert!(matches!(err, McpServiceError::OAuth(_)));
}

#[tokio::test]
async fn failed_code_exchange_keeps_client_authorizing() {
    let h = Harness::new();
    h.transports.set("s2", oauth_behavior());
    let service = h.service();

    let client = service.persist_client(oauth_server()).await.unwrap();
    let err = service
        .complete_authorization("state-s2", "bad")
        .await
        .unwrap_err();

    assert!(matches!(err, McpServiceError::OAuth(_)));
    assert_eq!(client.status().await, McpServerStatus::Authorizing);
    assert!(!h.tokens.has_tokens("s2"));
}

#[tokio::test]
async fn tokens_available_resumes_in_place() {
    let h = Harness::new();
    h.transports.set("s2", oauth_behavior());
    let service = h.service();

    let client = service.persist_client(oauth_server()).await.unwrap();

    let still = service.notify_tokens_available("s2").await.unwrap();
    assert_eq!(still, Some(McpServerStatus::Authorizing));

    h.tokens
        .save_tokens("s2", &OAuthTokens::bearer("granted"))
        .await
        .unwrap();
    let status = service.notify_tokens_available("s2").await.unwrap();
    assert_eq!(status, Some(McpServerStatus::Connected));

    let same = service.get_client("s2").await.unwrap().unwrap();
    assert!(Arc::ptr_eq(&client, &same));
    assert_eq!(same.tools().await.len(), 1);

    assert_eq!(service.notify_tokens_available("ghost").await.unwrap(), None);
}

#[tokio::test]
async fn clients_for_user_respects_visibility() {
    let h = Harness::new();
    h.seed(weather_server(), weather_behavior()).await;
    h.seed(
        NewMcpServer::new_stdio("shared", "shared-mcp", vec![], "bob")
            .with_id("s3")
            .with_visibility(Visibility::Public),
        FakeBehavior::with_tools(&["ping"]),
    )
    .await;
    h.seed(
        NewMcpServer::new_stdio("bobs", "bobs-mcp", vec![], "bob").with_id("s4"),
        FakeBehavior::with_tools(&["ping"]),
    )
    .await;
    let service = h.service();
    assert_eq!(service.initialize().await.unwrap(), 3);

    let names: Vec<_> = service
        .get_clients_for_user("alice")
        .await
        .into_iter()
        .map(|c| c.name)
        .collect();
    assert_eq!(names, vec!["shared", "weather"]);
    assert_eq!(service.get_clients().await.len(), 3);
}

#[tokio::test]
async fn test_connection_leaves_registry_untouched() {
    let h = Harness::new();
    let service = h.service();

    let config = NewMcpServer::new_stdio("probe", "probe-mcp", vec![], "alice").with_id("probe");
    h.transports
        .set("probe", FakeBehavior::with_tools(&["a", "b"]));

    let tools = service.test_connection(config).await.unwrap();

    assert_eq!(tools.len(), 2);
    assert!(service.get_clients().await.is_empty());
    assert!(h.repo.ids().is_empty());
    assert_eq!(FakeStats::get(&h.stats().closed), 1);
}

#[tokio::test]
async fn test_connection_reports_failures() {
    let h = Harness::new();
    let service = h.service();

    h.transports.set(
        "bad",
        FakeBehavior {
            fail_connect: Some("exit status 1".to_string()),
            ..FakeBehavior::default()
        },
    );
    let err = service
        .test_connection(NewMcpServer::new_stdio("bad", "bad-mcp", vec![], "alice").with_id("bad"))
        .await
        .unwrap_err();
    assert!(matches!(err, McpServiceError::Connection(message) if message.contains("exit status 1")));

    h.transports.set("locked", oauth_behavior());
    let err = service
        .test_connection(
            NewMcpServer::new_http("locked", "https://locked.example/mcp", "alice")
                .with_id("locked"),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, McpServiceError::AuthorizationRequired { url, .. } if !url.is_empty()));
}

#[tokio::test]
async fn repository_is_consulted_for_missing_handles_only() {
    let h = Harness::new();
    h.seed(weather_server(), weather_behavior()).await;
    let service = h.service();

    service.get_client("s1").await.unwrap();
    service.get_client("s1").await.unwrap();
    service.tool_call("s1", "get_weather", json!({})).await.unwrap();

    assert_eq!(
        h.repo.lookups.load(std::sync::atomic::Ordering::SeqCst),
        1
    );
    let stored = h.repo.find_by_id("s1").await.unwrap().unwrap();
    assert_eq!(stored.name, "weather");
}

#[tokio::test]
async fn remove_tears_down_client_when_config_already_gone() {
    let h = Harness::new();
    h.seed(weather_server(), weather_behavior()).await;
    let service = h.service();

    let client = service.get_client("s1").await.unwrap().unwrap();
    h.repo.delete("s1").await.unwrap();

    let err = service.remove_client("s1").await.unwrap_err();

    assert!(matches!(err, McpServiceError::ConfigNotFound(id) if id == "s1"));
    assert!(service.get_clients().await.is_empty());
    assert_eq!(client.status().await, McpServerStatus::Disconnected);
}

#[tokio::test]
async fn remove_tears_down_client_when_token_delete_fails() {
    let h = Harness::new();
    h.seed(weather_server(), weather_behavior()).await;
    let service = h.service();

    service.get_client("s1").await.unwrap().unwrap();
    h.tokens
        .fail_deletes
        .store(true, std::sync::atomic::Ordering::SeqCst);

    let err = service.remove_client("s1").await.unwrap_err();

    assert!(matches!(err, McpServiceError::TokenStore(_)));
    assert!(service.get_clients().await.is_empty());
    assert!(h.repo.ids().is_empty());
    assert!(
        !h.events
            .events()
            .iter()
            .any(|e| matches!(e, AppEvent::McpServerRemoved { .. }))
    );
}

fn connected_events(h: &Harness, id: &str) -> usize {
    h.events
        .events()
        .iter()
        .filter(|e| matches!(e, AppEvent::McpClientConnected { server_id, .. } if server_id == id))
        .count()
}

#[tokio::test]
async fn concurrent_token_notifications_connect_once() {
    let h = Harness::new();
    h.transports.set("s2", oauth_behavior());
    let service = h.service();

    service.persist_client(oauth_server()).await.unwrap();
    assert_eq!(FakeStats::get(&h.stats().connects), 1);

    h.tokens
        .save_tokens("s2", &OAuthTokens::bearer("granted"))
        .await
        .unwrap();
    h.transports
        .set("s2", oauth_behavior().delayed(Duration::from_millis(50)));

    let (first, second) = tokio::join!(
        service.notify_tokens_available("s2"),
        service.notify_tokens_available("s2"),
    );

    assert_eq!(first.unwrap(), Some(McpServerStatus::Connected));
    assert_eq!(second.unwrap(), Some(McpServerStatus::Connected));
    assert_eq!(FakeStats::get(&h.stats().connects), 2);
    assert_eq!(connected_events(&h, "s2"), 1);
}

#[tokio::test]
async fn evicted_handle_is_not_resumed() {
    let h = Harness::new();
    h.transports.set("s2", oauth_behavior());
    let service = h.service();

    let old = service.persist_client(oauth_server()).await.unwrap();
    service.refresh_client("s2").await.unwrap();
    assert_eq!(old.status().await, McpServerStatus::Disconnected);

    h.tokens
        .save_tokens("s2", &OAuthTokens::bearer("granted"))
        .await
        .unwrap();
    let connects = FakeStats::get(&h.stats().connects);

    let resumed = old.resume_authorization().await.unwrap();

    assert_eq!(resumed, Resume::Unchanged(McpServerStatus::Disconnected));
    assert_eq!(FakeStats::get(&h.stats().connects), connects);
}

#[tokio::test]
async fn resume_racing_refresh_announces_only_the_new_handle() {
    let h = Harness::new();
    h.transports.set("s2", oauth_behavior());
    let service = Arc::new(h.service());

    let old = service.persist_client(oauth_server()).await.unwrap();
    h.tokens
        .save_tokens("s2", &OAuthTokens::bearer("granted"))
        .await
        .unwrap();
    h.transports
        .set("s2", oauth_behavior().delayed(Duration::from_millis(100)));

    let resume = {
        let service = Arc::clone(&service);
        tokio::spawn(async move { service.notify_tokens_available("s2").await })
    };
    tokio::time::sleep(Duration::from_millis(20)).await;
    service.refresh_client("s2").await.unwrap();
    resume.await.unwrap().unwrap();

    let current = service.get_client("s2").await.unwrap().unwrap();
    assert!(!Arc::ptr_eq(&old, &current));
    assert_eq!(current.status().await, McpServerStatus::Connected);
    assert_eq!(old.status().await, McpServerStatus::Disconnected);
    assert_eq!(connected_events(&h, "s2"), 1);
}

#[tokio::test]
async fn test_connection_never_borrows_a_saved_id() {
    let h = Harness::new();
    h.seed(weather_server(), weather_behavior()).await;
    h.tokens
        .save_tokens("s1", &OAuthTokens::bearer("weather-token"))
        .await
        .unwrap();
    h.transports.set("impostor", oauth_behavior());
    let service = h.service();

    let err = service
        .test_connection(
            NewMcpServer::new_http("impostor", "https://impostor.example/mcp", "alice")
                .with_id("s1"),
        )
        .await
        .unwrap_err();

    assert!(
        matches!(err, McpServiceError::AuthorizationRequired { server_id, .. } if server_id.starts_with("test-"))
    );
    let stored = h.tokens.get_tokens("s1").await.unwrap().unwrap();
    assert_eq!(stored.access_token, "weather-token");
}

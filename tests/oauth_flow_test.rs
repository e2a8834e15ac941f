// End-to-end OAuth flow scenarios through the HTTP surface

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use syncbridge::api::{
    create_oauth_router, create_sync_router, OAuthAppState, SyncAppState,
};
use syncbridge::config::HostConfig;
use syncbridge::credentials::{CredentialStore, SecretCodec};
use syncbridge::oauth::{OAuthFlow, SessionStore};
use syncbridge::status::StatusAggregator;
use tower::ServiceExt;

fn test_host(server_url: &str, token_url: &str) -> HostConfig {
    HostConfig {
        server_url: Some(server_url.to_string()),
        authorize_url: Some(format!("{}/oauth/authorize", server_url)),
        token_url: Some(token_url.to_string()),
        revoke_url: None,
        client_id: Some("sync-client".to_string()),
        client_secret: Some("sync-secret".to_string()),
        scopes: vec!["documents.read".to_string()],
    }
}

fn create_test_app(host: HostConfig) -> (Router, Arc<CredentialStore>) {
    let codec = SecretCodec::from_base64_key(&BASE64.encode([0u8; 32])).unwrap();
    let store = Arc::new(CredentialStore::new(":memory:", codec).unwrap());

    let flow = Arc::new(OAuthFlow::new(
        host,
        SessionStore::new(600),
        store.clone(),
        Duration::from_secs(5),
    ));

    let aggregator = Arc::new(StatusAggregator::new(
        store.clone(),
        300,
        Duration::from_secs(2),
        "/api/v1/ping".to_string(),
    ));

    let app = create_oauth_router(OAuthAppState {
        flow,
        auth_enabled: false,
        callback_base_url: "http://localhost:3000".to_string(),
        settings_return_url: "/settings/background-sync".to_string(),
    })
    .merge(create_sync_router(SyncAppState {
        store: store.clone(),
        aggregator,
        auth_enabled: false,
    }));

    (app, store)
}

fn location_header(response: &axum::response::Response) -> String {
    response
        .headers()
        .get("location")
        .expect("redirect should carry a Location header")
        .to_str()
        .unwrap()
        .to_string()
}

/// Pulls the `state` parameter out of the authorization redirect URL.
fn extract_state(authorize_url: &str) -> String {
    let query = authorize_url.split_once('?').expect("URL has a query").1;
    let params: HashMap<String, String> = serde_urlencoded::from_str(query).unwrap();
    params.get("state").expect("state param present").clone()
}

async fn get(app: &Router, uri: &str) -> axum::response::Response {
    app.clone()
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap()
}

async fn post(app: &Router, uri: &str) -> axum::response::Response {
    app.clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri(uri)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap()
}

async fn body_json(response: axum::response::Response) -> serde_json::Value {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&body).unwrap()
}

#[tokio::test]
async fn test_full_flow_connects_user() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("POST", "/oauth/token")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"access_token": "granted-app-pw"}"#)
        .create_async()
        .await;

    let host = test_host(&server.url(), &format!("{}/oauth/token", server.url()));
    let (app, store) = create_test_app(host);

    // Initiate: 302 to the host's authorization page
    let response = get(&app, "/oauth/authorize").await;
    assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
    let authorize_url = location_header(&response);
    assert!(authorize_url.contains("response_type=code"));
    let state = extract_state(&authorize_url);

    // Callback with the matching state: lands on the settings page
    let response = get(&app, &format!("/oauth/callback?code=code123&state={}", state)).await;
    assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
    assert_eq!(
        location_header(&response),
        "/settings/background-sync?connect=ok"
    );

    // Credential stored for the default user, fresh validation
    let stored = store.get("default").unwrap().unwrap();
    assert_eq!(stored.secret, "granted-app-pw");

    // Status reports connected without needing to probe
    let response = get(&app, "/api/v1/background-sync/status").await;
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["connected"], true);
    assert_eq!(json["stale"], false);
}

#[tokio::test]
async fn test_callback_with_unknown_state_creates_nothing() {
    let host = test_host("https://docs.example.com", "https://docs.example.com/oauth/token");
    let (app, store) = create_test_app(host);

    let response = get(&app, "/oauth/callback?code=code123&state=xyz").await;

    // Browser path: redirect to the error page, no hard failure
    assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
    assert_eq!(
        location_header(&response),
        "/settings/background-sync?connect=error"
    );

    assert!(store.get("default").unwrap().is_none());
}

#[tokio::test]
async fn test_callback_state_cannot_be_replayed() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("POST", "/oauth/token")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"access_token": "granted-app-pw"}"#)
        .expect(1)
        .create_async()
        .await;

    let host = test_host(&server.url(), &format!("{}/oauth/token", server.url()));
    let (app, store) = create_test_app(host);

    let response = get(&app, "/oauth/authorize").await;
    let state = extract_state(&location_header(&response));

    let first = get(&app, &format!("/oauth/callback?code=code123&state={}", state)).await;
    assert_eq!(
        location_header(&first),
        "/settings/background-sync?connect=ok"
    );

    // Replay: state already consumed, no second exchange happens
    let second = get(&app, &format!("/oauth/callback?code=code123&state={}", state)).await;
    assert_eq!(
        location_header(&second),
        "/settings/background-sync?connect=error"
    );

    assert!(store.get("default").unwrap().is_some());
}

#[tokio::test]
async fn test_host_denial_redirects_to_error_page() {
    let host = test_host("https://docs.example.com", "https://docs.example.com/oauth/token");
    let (app, _store) = create_test_app(host);

    let response = get(
        &app,
        "/oauth/callback?error=access_denied&error_description=User+cancelled",
    )
    .await;

    assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
    assert_eq!(
        location_header(&response),
        "/settings/background-sync?connect=error"
    );
}

#[tokio::test]
async fn test_disconnect_after_connect_reports_disconnected() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("POST", "/oauth/token")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"access_token": "granted-app-pw"}"#)
        .create_async()
        .await;

    let host = test_host(&server.url(), &format!("{}/oauth/token", server.url()));
    let (app, store) = create_test_app(host);

    let response = get(&app, "/oauth/authorize").await;
    let state = extract_state(&location_header(&response));
    get(&app, &format!("/oauth/callback?code=code123&state={}", state)).await;
    assert!(store.get("default").unwrap().is_some());

    let response = post(&app, "/oauth/disconnect").await;
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["success"], true);

    assert!(store.get("default").unwrap().is_none());

    let response = get(&app, "/api/v1/background-sync/status").await;
    let json = body_json(response).await;
    assert_eq!(json["connected"], false);
}

#[tokio::test]
async fn test_authorize_without_configured_endpoint_fails() {
    let mut host = test_host("https://docs.example.com", "https://docs.example.com/oauth/token");
    host.authorize_url = None;
    let (app, _store) = create_test_app(host);

    let response = get(&app, "/oauth/authorize").await;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
}

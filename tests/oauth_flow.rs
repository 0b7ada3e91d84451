mod common;

use secrets_auth::IdentityStore;
use serde_json::json;
use url::Url;
use wiremock::matchers::{body_string_contains, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use common::{assert_found, body_text, location, Browser, TestApp};

async fn mount_token(server: &MockServer, expected_calls: u64) {
    Mock::given(method("POST"))
        .and(path("/token"))
        .and(body_string_contains("grant_type=authorization_code"))
        .and(body_string_contains("code=good-code"))
        .and(body_string_contains("client_secret=test-secret"))
        .and(body_string_contains("code_verifier="))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "provider-access",
            "token_type": "Bearer",
            "expires_in": 3599
        })))
        .expect(expected_calls)
        .mount(server)
        .await;
}

async fn mount_userinfo(server: &MockServer, subject: &str) {
    Mock::given(method("GET"))
        .and(path("/userinfo"))
        .and(header("authorization", "Bearer provider-access"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "sub": subject,
            "name": "Pat Provider",
            "picture": "https://img.example/pat.png"
        })))
        .mount(server)
        .await;
}

/// Follow `/auth/google` and return the `state` the provider would echo back.
async fn initiate(browser: &mut Browser, server: &MockServer) -> String {
    let response = browser.get("/auth/google").await;
    assert_eq!(response.status(), axum::http::StatusCode::FOUND);

    let target = Url::parse(location(&response)).unwrap();
    assert!(target.as_str().starts_with(&format!("{}/authorize?", server.uri())));
    let query = |key: &str| {
        target
            .query_pairs()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.into_owned())
    };
    assert_eq!(query("client_id").as_deref(), Some("test-client"));
    assert_eq!(query("scope").as_deref(), Some("profile"));
    assert_eq!(query("code_challenge_method").as_deref(), Some("S256"));
    assert_eq!(
        query("redirect_uri").as_deref(),
        Some("http://localhost:3000/auth/google/callback")
    );
    query("state").expect("state parameter")
}

#[tokio::test]
async fn test_provider_login_creates_account_and_session() {
    let server = MockServer::start().await;
    mount_token(&server, 1).await;
    mount_userinfo(&server, "p1").await;

    let app = TestApp::new(&server.uri());
    let mut browser = app.browser();
    let state = initiate(&mut browser, &server).await;

    let response = browser
        .get(&format!("/auth/google/callback?code=good-code&state={state}"))
        .await;
    assert_found(&response, "/secrets");

    let account = app
        .identities
        .find_by_provider("google", "p1")
        .await
        .unwrap()
        .expect("provider account");
    assert!(account.username.is_none());
    assert!(account.credential_hash.is_none());
    assert_eq!(account.display_name.as_deref(), Some("Pat Provider"));
    assert_eq!(app.sessions.len(), 1);

    let page = body_text(browser.get("/secrets").await).await;
    assert!(page.contains("https://img.example/pat.png"));
}

#[tokio::test]
async fn test_repeat_provider_login_reuses_account() {
    let server = MockServer::start().await;
    mount_token(&server, 2).await;
    mount_userinfo(&server, "p1").await;

    let app = TestApp::new(&server.uri());
    for _ in 0..2 {
        let mut browser = app.browser();
        let state = initiate(&mut browser, &server).await;
        let response = browser
            .get(&format!("/auth/google/callback?code=good-code&state={state}"))
            .await;
        assert_found(&response, "/secrets");
    }

    assert_eq!(app.identities.len(), 1);
    assert_eq!(app.identities.count_provider_links("google", "p1"), 1);
}

#[tokio::test]
async fn test_state_mismatch_fails_without_contacting_provider() {
    let server = MockServer::start().await;
    mount_token(&server, 0).await;

    let app = TestApp::new(&server.uri());
    let mut browser = app.browser();
    let _issued = initiate(&mut browser, &server).await;

    let response = browser
        .get("/auth/google/callback?code=good-code&state=attacker-state")
        .await;
    assert_found(&response, "/login");
    assert!(app.identities.is_empty());
    assert!(app.sessions.is_empty());
    assert!(!browser.cookies.contains_key("__secrets_session"));
}

#[tokio::test]
async fn test_callback_without_initiate_fails() {
    let server = MockServer::start().await;
    mount_token(&server, 0).await;

    let app = TestApp::new(&server.uri());
    let response = app
        .browser()
        .get("/auth/google/callback?code=good-code&state=anything")
        .await;
    assert_found(&response, "/login");
    assert!(app.identities.is_empty());
}

#[tokio::test]
async fn test_callback_is_single_use() {
    let server = MockServer::start().await;
    mount_token(&server, 1).await;
    mount_userinfo(&server, "p1").await;

    let app = TestApp::new(&server.uri());
    let mut browser = app.browser();
    let state = initiate(&mut browser, &server).await;
    let callback = format!("/auth/google/callback?code=good-code&state={state}");

    assert_found(&browser.get(&callback).await, "/secrets");
    assert_found(&browser.get(&callback).await, "/login");
}

#[tokio::test]
async fn test_provider_denial_fails_without_token_exchange() {
    let server = MockServer::start().await;
    mount_token(&server, 0).await;

    let app = TestApp::new(&server.uri());
    let mut browser = app.browser();
    let state = initiate(&mut browser, &server).await;

    let response = browser
        .get(&format!(
            "/auth/google/callback?error=access_denied&error_description=nope&state={state}"
        ))
        .await;
    assert_found(&response, "/login");
    assert!(app.identities.is_empty());
}

#[tokio::test]
async fn test_token_endpoint_failure_creates_nothing() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/token"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "error": "invalid_grant"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let app = TestApp::new(&server.uri());
    let mut browser = app.browser();
    let state = initiate(&mut browser, &server).await;

    let response = browser
        .get(&format!("/auth/google/callback?code=stale&state={state}"))
        .await;
    assert_found(&response, "/login");
    assert!(app.identities.is_empty());
    assert!(app.sessions.is_empty());
}

#[tokio::test]
async fn test_profile_failure_creates_nothing() {
    let server = MockServer::start().await;
    mount_token(&server, 1).await;
    Mock::given(method("GET"))
        .and(path("/userinfo"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let app = TestApp::new(&server.uri());
    let mut browser = app.browser();
    let state = initiate(&mut browser, &server).await;

    let response = browser
        .get(&format!("/auth/google/callback?code=good-code&state={state}"))
        .await;
    assert_found(&response, "/login");
    assert!(app.identities.is_empty());
}

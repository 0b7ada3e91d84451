#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, Request, Response, StatusCode};
use axum::Router;
use secrets_auth::middleware::{auth_routes, AuthConfig};
use secrets_auth::{
    CredentialHash, CredentialHasher, Error, MemoryIdentityStore, MemorySessionStore,
};
use time::Duration;
use tower::ServiceExt;

pub const SESSION_SECRET: &str =
    "test-session-secret-test-session-secret-test-session-secret-0123456789";

/// Cheap reversible "hash" so HTTP tests don't pay for Argon2.
pub struct PlainHasher;

impl CredentialHasher for PlainHasher {
    fn hash(&self, plaintext: &str) -> Result<CredentialHash, Error> {
        Ok(CredentialHash::new(format!("plain${plaintext}")))
    }

    fn verify(&self, plaintext: &str, hash: &CredentialHash) -> Result<bool, Error> {
        Ok(hash.as_str() == format!("plain${plaintext}"))
    }
}

/// Config as the binary would load it, with provider endpoints at `provider_base`.
pub fn config(provider_base: &str) -> AuthConfig {
    let vars: HashMap<&str, String> = [
        ("OAUTH_CLIENT_ID", "test-client".to_string()),
        ("OAUTH_CLIENT_SECRET", "test-secret".to_string()),
        (
            "OAUTH_CALLBACK_URL",
            "http://localhost:3000/auth/google/callback".to_string(),
        ),
        ("SESSION_SECRET", SESSION_SECRET.to_string()),
        ("SESSION_IDLE_TIMEOUT_SECS", "1800".to_string()),
        ("OAUTH_AUTH_URL", format!("{provider_base}/authorize")),
        ("OAUTH_TOKEN_URL", format!("{provider_base}/token")),
        ("OAUTH_USERINFO_URL", format!("{provider_base}/userinfo")),
        ("INSECURE_COOKIES", "1".to_string()),
    ]
    .into_iter()
    .collect();

    AuthConfig::from_lookup(|name| vars.get(name).cloned())
        .expect("test config")
        .with_hasher(Arc::new(PlainHasher))
}

/// The full router plus handles on its stores.
pub struct TestApp {
    pub router: Router,
    pub identities: Arc<MemoryIdentityStore>,
    pub sessions: Arc<MemorySessionStore>,
}

impl TestApp {
    pub fn new(provider_base: &str) -> Self {
        Self::with_idle_timeout(provider_base, Duration::minutes(30))
    }

    pub fn with_idle_timeout(provider_base: &str, idle_timeout: Duration) -> Self {
        Self::with_config(config(provider_base), idle_timeout)
    }

    pub fn with_config(config: AuthConfig, idle_timeout: Duration) -> Self {
        let identities = Arc::new(MemoryIdentityStore::new());
        let sessions = Arc::new(MemorySessionStore::new(idle_timeout));
        let router = auth_routes(config, identities.clone(), sessions.clone());
        Self {
            router,
            identities,
            sessions,
        }
    }

    /// A browser with an empty cookie jar.
    pub fn browser(&self) -> Browser {
        Browser {
            router: self.router.clone(),
            cookies: HashMap::new(),
        }
    }
}

/// Minimal user agent: remembers `Set-Cookie`, replays it, never follows redirects.
pub struct Browser {
    router: Router,
    pub cookies: HashMap<String, String>,
}

impl Browser {
    pub async fn get(&mut self, uri: &str) -> Response<Body> {
        let request = Request::get(uri);
        self.send(request, Body::empty()).await
    }

    pub async fn post_form(&mut self, uri: &str, form: &str) -> Response<Body> {
        let request = Request::post(uri)
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded");
        self.send(request, Body::from(form.to_string())).await
    }

    async fn send(
        &mut self,
        mut request: axum::http::request::Builder,
        body: Body,
    ) -> Response<Body> {
        if !self.cookies.is_empty() {
            let cookie = self
                .cookies
                .iter()
                .map(|(k, v)| format!("{k}={v}"))
                .collect::<Vec<_>>()
                .join("; ");
            request = request.header(header::COOKIE, cookie);
        }
        let response = self
            .router
            .clone()
            .oneshot(request.body(body).unwrap())
            .await
            .unwrap();

        for value in response.headers().get_all(header::SET_COOKIE) {
            let raw = value.to_str().unwrap();
            let pair = raw.split(';').next().unwrap_or_default();
            let Some((name, value)) = pair.split_once('=') else {
                continue;
            };
            if value.is_empty() {
                self.cookies.remove(name);
            } else {
                self.cookies.insert(name.to_string(), value.to_string());
            }
        }
        response
    }
}

pub fn location(response: &Response<Body>) -> &str {
    response
        .headers()
        .get(header::LOCATION)
        .expect("Location header")
        .to_str()
        .unwrap()
}

pub fn assert_found(response: &Response<Body>, expected: &str) {
    assert_eq!(response.status(), StatusCode::FOUND);
    assert_eq!(location(response), expected);
}

pub async fn body_text(response: Response<Body>) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

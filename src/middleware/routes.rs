use std::sync::Arc;

use axum::extract::{Query, State};
use axum::response::Html;
use axum::routing::get;
use axum::{Form, Router};
use axum_extra::extract::PrivateCookieJar;
use serde::Deserialize;

use super::config::{AuthConfig, AuthSettings};
use super::cookies;
use super::error::{AuthError, Found};
use super::extractor::Viewer;
use super::state::AuthState;
use crate::account::Account;
use crate::authenticator::{Authenticators, Credentials};
use crate::codec::SessionCodec;
use crate::delegate::{CallbackParams, OAuthDelegate};
use crate::error::Error;
use crate::local::LocalAuthenticator;
use crate::oauth::AuthClient;
use crate::session::SessionStore;
use crate::store::IdentityStore;
use crate::types::SessionId;

/// Create the authentication router: entry pages, local login and
/// registration, the provider redirect and callback, the protected area
/// and logout.
pub fn auth_routes<I, S>(config: AuthConfig, identities: Arc<I>, sessions: Arc<S>) -> Router
where
    I: IdentityStore,
    S: SessionStore,
{
    let settings = config.settings;
    let local = LocalAuthenticator::with_hasher(identities.clone(), config.hasher);
    let delegate = OAuthDelegate::new(
        settings.provider.clone(),
        AuthClient::new(config.oauth),
        identities,
    );

    let state = AuthState {
        authenticators: Authenticators::new(local, delegate),
        sessions,
        codec: SessionCodec,
        settings,
    };

    let provider_path = state.settings.provider_path();
    Router::new()
        .route("/", get(home::<I, S>))
        .route(
            &state.settings.login_path,
            get(login_page::<I, S>).post(login::<I, S>),
        )
        .route(
            &state.settings.register_path,
            get(register_page::<I, S>).post(register::<I, S>),
        )
        .route(&state.settings.protected_path, get(protected::<I, S>))
        .route(&provider_path, get(initiate::<I, S>))
        .route(&format!("{provider_path}/callback"), get(callback::<I, S>))
        .route("/logout", get(logout::<I, S>).post(logout::<I, S>))
        .with_state(state)
}

// ── Local login & registration ─────────────────────────────────────

#[derive(Deserialize)]
struct PasswordForm {
    #[serde(default)]
    username: String,
    #[serde(default)]
    password: String,
}

async fn login<I: IdentityStore, S: SessionStore>(
    State(state): State<AuthState<I, S>>,
    viewer: Viewer,
    jar: PrivateCookieJar,
    Form(form): Form<PasswordForm>,
) -> Result<(PrivateCookieJar, Found), AuthError> {
    let credentials = Credentials::Password {
        username: form.username,
        password: form.password,
    };

    let account = state
        .authenticators
        .authenticate(credentials)
        .await
        .map_err(|e| match e {
            Error::InvalidCredentials => {
                tracing::info!("Local login rejected");
                AuthError::LoginFailed {
                    login_path: state.settings.login_path.clone(),
                }
            }
            other => AuthError::Internal(other),
        })?;

    let jar = start_session(&state, jar, viewer.session_id.as_ref(), &account).await?;
    Ok((jar, Found::to(&state.settings.protected_path)))
}

async fn register<I: IdentityStore, S: SessionStore>(
    State(state): State<AuthState<I, S>>,
    viewer: Viewer,
    jar: PrivateCookieJar,
    Form(form): Form<PasswordForm>,
) -> Result<(PrivateCookieJar, Found), AuthError> {
    let account = state
        .authenticators
        .local
        .register(&form.username, &form.password)
        .await
        .map_err(|e| {
            if matches!(
                e,
                Error::DuplicateUsername | Error::InvalidUsername(_) | Error::InvalidPassword(_)
            ) {
                tracing::info!(reason = %e, "Registration rejected");
                AuthError::RegistrationFailed {
                    register_path: state.settings.register_path.clone(),
                }
            } else {
                AuthError::Internal(e)
            }
        })?;

    let jar = start_session(&state, jar, viewer.session_id.as_ref(), &account).await?;
    Ok((jar, Found::to(&state.settings.protected_path)))
}

// ── Provider login ─────────────────────────────────────────────────

async fn initiate<I: IdentityStore, S: SessionStore>(
    State(state): State<AuthState<I, S>>,
    jar: PrivateCookieJar,
) -> (PrivateCookieJar, Found) {
    let request = state.authenticators.delegate.initiate();

    let (verifier_cookie, state_cookie) = cookies::pending_cookies(
        &request.pending,
        state.settings.secure_cookies,
        &state.settings.auth_path,
    );

    (jar.add(verifier_cookie).add(state_cookie), Found(request.url))
}

async fn callback<I: IdentityStore, S: SessionStore>(
    State(state): State<AuthState<I, S>>,
    viewer: Viewer,
    jar: PrivateCookieJar,
    Query(params): Query<CallbackParams>,
) -> Result<(PrivateCookieJar, Found), AuthError> {
    let pending = cookies::pending_authorization(&jar);

    // Single use, whatever the outcome.
    let (clear_verifier, clear_state) = cookies::clear_pending_cookies(&state.settings.auth_path);
    let jar = jar.remove(clear_verifier).remove(clear_state);

    let credentials = Credentials::Delegated {
        pending,
        callback: params,
    };
    match state.authenticators.authenticate(credentials).await {
        Ok(account) => {
            let jar = start_session(&state, jar, viewer.session_id.as_ref(), &account).await?;
            Ok((jar, Found::to(&state.settings.protected_path)))
        }
        Err(_) => Ok((jar, Found::to(&state.settings.login_path))),
    }
}

// ── Logout ─────────────────────────────────────────────────────────

async fn logout<I: IdentityStore, S: SessionStore>(
    State(state): State<AuthState<I, S>>,
    jar: PrivateCookieJar,
) -> (PrivateCookieJar, Found) {
    let name = &state.settings.session_cookie_name;
    if let Some(session_id) = cookies::session_id(&jar, name) {
        if let Err(e) = state.sessions.destroy(&session_id).await {
            tracing::warn!(error = %e, "Session deletion failed during logout");
        }
    }

    let clear_cookie = cookies::clear_session_cookie(name);
    (jar.remove(clear_cookie), Found::to(&state.settings.logout_redirect))
}

// ── Pages ──────────────────────────────────────────────────────────

async fn home<I: IdentityStore, S: SessionStore>(
    State(state): State<AuthState<I, S>>,
    viewer: Viewer,
) -> Html<String> {
    let s = &state.settings;
    let body = if viewer.is_authenticated() {
        format!(
            r#"<p><a href="{}">Your secrets</a></p><form method="post" action="/logout"><button>Log out</button></form>"#,
            s.protected_path
        )
    } else {
        format!(
            r#"<p><a href="{}">Log in</a> or <a href="{}">register</a></p>"#,
            s.login_path, s.register_path
        )
    };
    page("Secrets", &body)
}

async fn login_page<I: IdentityStore, S: SessionStore>(
    State(state): State<AuthState<I, S>>,
) -> Html<String> {
    let s = &state.settings;
    page(
        "Log in",
        &format!(
            "{}{}",
            password_form(&s.login_path, "Log in"),
            provider_link(s)
        ),
    )
}

async fn register_page<I: IdentityStore, S: SessionStore>(
    State(state): State<AuthState<I, S>>,
) -> Html<String> {
    let s = &state.settings;
    page(
        "Register",
        &format!(
            "{}{}",
            password_form(&s.register_path, "Register"),
            provider_link(s)
        ),
    )
}

async fn protected<I: IdentityStore, S: SessionStore>(
    State(state): State<AuthState<I, S>>,
    viewer: Viewer,
) -> Result<Html<String>, AuthError> {
    let identity = viewer.require(&state.settings.login_path)?;
    let name = identity
        .username
        .as_ref()
        .map_or_else(|| "friend".to_string(), ToString::to_string);
    let picture = identity
        .picture
        .as_deref()
        .map(|src| format!(r#"<img src="{}" alt="">"#, html_escape(src)))
        .unwrap_or_default();
    Ok(page(
        "Secrets",
        &format!(
            r#"{picture}<p>Welcome, {}.</p><form method="post" action="/logout"><button>Log out</button></form>"#,
            html_escape(&name)
        ),
    ))
}

// ── Helpers ────────────────────────────────────────────────────────

/// Issue a fresh session for `account`, dropping whatever session the
/// request already carried.
async fn start_session<I, S: SessionStore>(
    state: &AuthState<I, S>,
    jar: PrivateCookieJar,
    previous: Option<&SessionId>,
    account: &Account,
) -> Result<PrivateCookieJar, AuthError> {
    if let Some(previous) = previous {
        state.sessions.destroy(previous).await?;
    }

    let token = state.codec.serialize(account)?;
    let session_id = state.sessions.create(token).await?;
    tracing::info!(account_id = %account.id, "Session started");

    let cookie = cookies::session_cookie(
        &state.settings.session_cookie_name,
        &session_id,
        state.settings.secure_cookies,
    );
    Ok(jar.add(cookie))
}

fn page(title: &str, body: &str) -> Html<String> {
    Html(format!(
        "<!doctype html><html><head><meta charset=\"utf-8\"><title>{title}</title></head><body><h1>{title}</h1>{body}</body></html>"
    ))
}

fn password_form(action: &str, submit: &str) -> String {
    format!(
        r#"<form method="post" action="{action}"><input name="username" autocomplete="username" required><input name="password" type="password" required><button>{submit}</button></form>"#
    )
}

fn provider_link(settings: &AuthSettings) -> String {
    format!(
        r#"<p><a href="{}">Continue with {}</a></p>"#,
        settings.provider_path(),
        html_escape(&settings.provider)
    )
}

fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

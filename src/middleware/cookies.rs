use axum_extra::extract::cookie::{Cookie, SameSite};
use axum_extra::extract::PrivateCookieJar;
use time::Duration;

use crate::oauth::PendingAuthorization;
use crate::types::SessionId;

const PKCE_COOKIE_NAME: &str = "__secrets_pkce";
const STATE_COOKIE_NAME: &str = "__secrets_state";

/// Short-lived cookies binding an authorization request to this browser.
pub(super) fn pending_cookies(
    pending: &PendingAuthorization,
    secure: bool,
    auth_path: &str,
) -> (Cookie<'static>, Cookie<'static>) {
    let build = |name: &'static str, value: &str| {
        Cookie::build((name, value.to_string()))
            .http_only(true)
            .secure(secure)
            .same_site(SameSite::Lax)
            .path(auth_path.to_string())
            .max_age(Duration::minutes(5))
            .build()
    };

    (
        build(PKCE_COOKIE_NAME, &pending.code_verifier),
        build(STATE_COOKIE_NAME, &pending.state),
    )
}

/// Removal cookies for the pending authorization.
pub(super) fn clear_pending_cookies(auth_path: &str) -> (Cookie<'static>, Cookie<'static>) {
    let verifier = Cookie::build((PKCE_COOKIE_NAME, ""))
        .path(auth_path.to_string())
        .build();
    let state = Cookie::build((STATE_COOKIE_NAME, ""))
        .path(auth_path.to_string())
        .build();
    (verifier, state)
}

/// The pending authorization, if both halves survived the round trip.
pub(super) fn pending_authorization(jar: &PrivateCookieJar) -> Option<PendingAuthorization> {
    let state = jar.get(STATE_COOKIE_NAME)?.value().to_string();
    let code_verifier = jar.get(PKCE_COOKIE_NAME)?.value().to_string();
    Some(PendingAuthorization {
        state,
        code_verifier,
    })
}

/// Browser-session cookie; lifetime is enforced server-side.
pub(super) fn session_cookie(name: &str, session_id: &SessionId, secure: bool) -> Cookie<'static> {
    Cookie::build((name.to_string(), session_id.as_str().to_string()))
        .http_only(true)
        .secure(secure)
        .same_site(SameSite::Lax)
        .path("/".to_string())
        .build()
}

pub(super) fn clear_session_cookie(name: &str) -> Cookie<'static> {
    Cookie::build((name.to_string(), ""))
        .path("/".to_string())
        .build()
}

pub(super) fn session_id(jar: &PrivateCookieJar, name: &str) -> Option<SessionId> {
    jar.get(name)
        .map(|c| c.value().to_string())
        .filter(|v| !v.is_empty())
        .map(SessionId)
}

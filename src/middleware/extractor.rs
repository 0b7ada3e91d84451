use std::convert::Infallible;

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum_extra::extract::cookie::Key;
use axum_extra::extract::PrivateCookieJar;

use super::cookies;
use super::error::AuthError;
use super::state::AuthState;
use crate::codec::{Identity, SessionCodec};
use crate::session::SessionStore;
use crate::store::IdentityStore;
use crate::types::SessionId;

/// Whoever is making the request, possibly nobody.
///
/// Extraction never rejects: a missing, unknown or expired session yields an
/// anonymous viewer. Protected handlers decide for themselves with
/// [`require`](Viewer::require).
///
/// # Example
///
/// ```rust,ignore
/// async fn secrets(viewer: Viewer) -> Result<impl IntoResponse, AuthError> {
///     let identity = viewer.require("/login")?;
///     Ok(format!("Hello, {}", identity.id))
/// }
/// ```
#[derive(Debug, Clone, Default)]
pub struct Viewer {
    /// Session id carried by the request, if it still resolves.
    pub session_id: Option<SessionId>,
    pub identity: Option<Identity>,
}

impl Viewer {
    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.identity.is_some()
    }

    /// The attached identity, or a redirect to `login_path`.
    ///
    /// # Errors
    ///
    /// [`AuthError::Unauthenticated`] when no identity is attached.
    pub fn require(&self, login_path: &str) -> Result<&Identity, AuthError> {
        self.identity.as_ref().ok_or_else(|| AuthError::Unauthenticated {
            login_path: login_path.to_string(),
        })
    }
}

impl<I: IdentityStore, S: SessionStore> FromRequestParts<AuthState<I, S>> for Viewer {
    type Rejection = Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AuthState<I, S>,
    ) -> Result<Self, Self::Rejection> {
        let jar: PrivateCookieJar<Key> = PrivateCookieJar::from_request_parts(parts, state).await?;
        Ok(resolve_session(
            state.sessions.as_ref(),
            &state.codec,
            &jar,
            &state.settings.session_cookie_name,
        )
        .await)
    }
}

/// Resolve the session cookie in `jar` into a [`Viewer`].
///
/// Store and codec failures are logged and treated as "no session".
pub async fn resolve_session<S: SessionStore>(
    sessions: &S,
    codec: &SessionCodec,
    jar: &PrivateCookieJar,
    cookie_name: &str,
) -> Viewer {
    let Some(session_id) = cookies::session_id(jar, cookie_name) else {
        return Viewer::default();
    };

    let token = match sessions.resolve(&session_id).await {
        Ok(Some(token)) => token,
        Ok(None) => return Viewer::default(),
        Err(e) => {
            tracing::warn!(error = %e, "Session lookup failed");
            return Viewer::default();
        }
    };

    match codec.deserialize(&token) {
        Ok(identity) => Viewer {
            session_id: Some(session_id),
            identity: Some(identity),
        },
        Err(e) => {
            tracing::warn!(error = %e, "Undecodable session token");
            Viewer::default()
        }
    }
}

use axum::http::{header::LOCATION, StatusCode};
use axum::response::{IntoResponse, Response};

use crate::error::Error;

/// `302 Found` to `location`.
///
/// axum's `Redirect::to` answers 303; browsers treat both alike, but the
/// auth endpoints promise a 302.
#[derive(Debug, Clone)]
pub struct Found(pub String);

impl Found {
    #[must_use]
    pub fn to(location: impl Into<String>) -> Self {
        Self(location.into())
    }
}

impl IntoResponse for Found {
    fn into_response(self) -> Response {
        (StatusCode::FOUND, [(LOCATION, self.0)]).into_response()
    }
}

/// Authentication errors for the HTTP layer.
///
/// Recoverable failures become a bare redirect back to the relevant entry
/// point; the cause is logged, never shown to the client.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// No identity attached to the request.
    #[error("Not authenticated")]
    Unauthenticated { login_path: String },

    /// Local or delegated login did not succeed.
    #[error("Login failed")]
    LoginFailed { login_path: String },

    /// Registration input rejected (taken or malformed username, bad password).
    #[error("Registration failed")]
    RegistrationFailed { register_path: String },

    /// Store, codec or other server-side failure.
    #[error("Internal error: {0}")]
    Internal(#[from] Error),
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        match self {
            Self::Unauthenticated { login_path } | Self::LoginFailed { login_path } => {
                Found(login_path).into_response()
            }
            Self::RegistrationFailed { register_path } => Found(register_path).into_response(),
            Self::Internal(ref e) => {
                tracing::error!(error = %e, "Auth internal error");
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal error").into_response()
            }
        }
    }
}

use std::sync::Arc;

use axum::extract::FromRef;
use axum_extra::extract::cookie::Key;

use super::config::AuthSettings;
use crate::authenticator::Authenticators;
use crate::codec::SessionCodec;
use crate::session::SessionStore;
use crate::store::IdentityStore;

/// Shared state for auth route handlers.
pub struct AuthState<I, S> {
    pub(super) authenticators: Authenticators<I>,
    pub(super) sessions: Arc<S>,
    pub(super) codec: SessionCodec,
    pub(super) settings: AuthSettings,
}

// Manual Clone: avoid derive adding `I: Clone, S: Clone` bounds.
impl<I, S> Clone for AuthState<I, S> {
    fn clone(&self) -> Self {
        Self {
            authenticators: self.authenticators.clone(),
            sessions: self.sessions.clone(),
            codec: self.codec,
            settings: self.settings.clone(),
        }
    }
}

// PrivateCookieJar requires Key to be extractable from state
impl<I: IdentityStore, S: SessionStore> FromRef<AuthState<I, S>> for Key {
    fn from_ref(state: &AuthState<I, S>) -> Self {
        state.settings.cookie_key.clone()
    }
}

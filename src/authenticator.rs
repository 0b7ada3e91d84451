use std::sync::Arc;

use crate::account::Account;
use crate::delegate::{CallbackParams, OAuthDelegate};
use crate::error::Error;
use crate::local::LocalAuthenticator;
use crate::oauth::PendingAuthorization;
use crate::store::IdentityStore;

/// Proof offered by a client, one variant per login method.
#[derive(Clone)]
pub enum Credentials {
    Password {
        username: String,
        password: String,
    },
    Delegated {
        pending: Option<PendingAuthorization>,
        callback: CallbackParams,
    },
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Password { username, .. } => f
                .debug_struct("Password")
                .field("username", username)
                .field("password", &"<redacted>")
                .finish(),
            Self::Delegated { callback, .. } => f
                .debug_struct("Delegated")
                .field("state", &callback.state)
                .finish_non_exhaustive(),
        }
    }
}

/// Both login methods over one shared [`IdentityStore`].
pub struct Authenticators<I> {
    pub local: Arc<LocalAuthenticator<I>>,
    pub delegate: Arc<OAuthDelegate<I>>,
}

// Manual Clone: avoid derive adding an `I: Clone` bound.
impl<I> Clone for Authenticators<I> {
    fn clone(&self) -> Self {
        Self {
            local: self.local.clone(),
            delegate: self.delegate.clone(),
        }
    }
}

impl<I: IdentityStore> Authenticators<I> {
    #[must_use]
    pub fn new(local: LocalAuthenticator<I>, delegate: OAuthDelegate<I>) -> Self {
        Self {
            local: Arc::new(local),
            delegate: Arc::new(delegate),
        }
    }

    /// Route `credentials` to the matching authenticator.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidCredentials`] for password logins,
    /// [`Error::AuthenticationFailed`] for delegated ones.
    pub async fn authenticate(&self, credentials: Credentials) -> Result<Account, Error> {
        match credentials {
            Credentials::Password { username, password } => {
                self.local.verify(&username, &password).await
            }
            Credentials::Delegated { pending, callback } => {
                self.delegate.complete(pending.as_ref(), &callback).await
            }
        }
    }
}

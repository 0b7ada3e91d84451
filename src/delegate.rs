//! Delegated login through one OAuth2 provider.
//!
//! The flow has three states:
//!
//! 1. **Initiate** - [`OAuthDelegate::initiate`] issues the provider redirect
//!    together with a [`PendingAuthorization`] (`state` + PKCE verifier) that
//!    the caller binds to the browser.
//! 2. **Callback pending** - [`OAuthDelegate::complete`] checks the returned
//!    `state` against the pending one *before* any provider call, then
//!    exchanges the code and fetches the profile.
//! 3. **Resolved** - the profile is reconciled with a local account through
//!    [`IdentityStore::find_or_create_by_provider`].
//!
//! Any failure in 2-3 is terminal ([`Error::AuthenticationFailed`]); nothing
//! is retried and the user has to start over.

use std::sync::Arc;

use serde::Deserialize;

use crate::account::Account;
use crate::error::{DelegationFailure, Error};
use crate::oauth::{pkce, AuthClient, AuthorizationRequest, PendingAuthorization};
use crate::store::IdentityStore;

/// Query parameters of the provider's redirect back to us.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CallbackParams {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
    pub error_description: Option<String>,
}

pub struct OAuthDelegate<I> {
    provider: String,
    client: AuthClient,
    store: Arc<I>,
}

impl<I: IdentityStore> OAuthDelegate<I> {
    #[must_use]
    pub fn new(provider: impl Into<String>, client: AuthClient, store: Arc<I>) -> Self {
        Self {
            provider: provider.into(),
            client,
            store,
        }
    }

    /// Provider name used as the key in `Account::provider_ids`.
    #[must_use]
    pub fn provider(&self) -> &str {
        &self.provider
    }

    #[must_use]
    pub fn initiate(&self) -> AuthorizationRequest {
        self.client.authorization_url()
    }

    /// Finish the flow started by [`initiate`](Self::initiate).
    ///
    /// # Errors
    ///
    /// [`Error::AuthenticationFailed`] with the [`DelegationFailure`] reason.
    pub async fn complete(
        &self,
        pending: Option<&PendingAuthorization>,
        callback: &CallbackParams,
    ) -> Result<Account, Error> {
        let result = self.resolve(pending, callback).await;
        if let Err(reason) = &result {
            tracing::warn!(provider = %self.provider, reason = %reason, "Delegated login failed");
        }
        result.map_err(Error::from)
    }

    async fn resolve(
        &self,
        pending: Option<&PendingAuthorization>,
        callback: &CallbackParams,
    ) -> Result<Account, DelegationFailure> {
        let pending = pending.ok_or(DelegationFailure::NoPendingAuthorization)?;
        let returned = callback
            .state
            .as_deref()
            .ok_or(DelegationFailure::StateMismatch)?;
        if !pkce::states_match(&pending.state, returned) {
            return Err(DelegationFailure::StateMismatch);
        }

        if let Some(error) = &callback.error {
            let detail = callback
                .error_description
                .as_deref()
                .map_or_else(|| error.clone(), |desc| format!("{error}: {desc}"));
            return Err(DelegationFailure::ProviderDenied(detail));
        }

        let code = callback
            .code
            .as_deref()
            .filter(|c| !c.is_empty())
            .ok_or(DelegationFailure::MissingCode)?;

        let token = self
            .client
            .exchange_code(code, &pending.code_verifier)
            .await
            .map_err(|e| DelegationFailure::TokenExchange(e.to_string()))?;

        let profile = self
            .client
            .fetch_profile(&token.access_token)
            .await
            .map_err(|e| DelegationFailure::Profile(e.to_string()))?;

        let account = self
            .store
            .find_or_create_by_provider(&self.provider, &profile.sub, profile.defaults())
            .await
            .map_err(|e| DelegationFailure::AccountResolution(e.to_string()))?;

        tracing::info!(
            provider = %self.provider,
            account_id = %account.id,
            "Delegated login resolved"
        );
        Ok(account)
    }
}

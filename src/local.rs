use std::sync::Arc;

use tokio::sync::OnceCell;

use crate::account::{Account, CredentialHash};
use crate::error::Error;
use crate::password::{Argon2Hasher, CredentialHasher};
use crate::store::IdentityStore;
use crate::types::{AccountId, Username};

const MAX_PASSWORD_LEN: usize = 1024;
const DUMMY_PASSWORD: &str = "not-a-real-password";

/// Username/password authentication against an [`IdentityStore`].
pub struct LocalAuthenticator<I> {
    store: Arc<I>,
    hasher: Arc<dyn CredentialHasher>,
    // Hash checked for unknown users so both failure paths cost the same.
    dummy_hash: OnceCell<CredentialHash>,
}

impl<I: IdentityStore> LocalAuthenticator<I> {
    #[must_use]
    pub fn new(store: Arc<I>) -> Self {
        Self::with_hasher(store, Arc::new(Argon2Hasher))
    }

    #[must_use]
    pub fn with_hasher(store: Arc<I>, hasher: Arc<dyn CredentialHasher>) -> Self {
        Self {
            store,
            hasher,
            dummy_hash: OnceCell::new(),
        }
    }

    /// Create a local account.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidUsername`] / [`Error::InvalidPassword`] for malformed
    /// input, [`Error::DuplicateUsername`] if the name is taken.
    pub async fn register(&self, username: &str, password: &str) -> Result<Account, Error> {
        let username: Username = username.parse()?;
        check_password(password)?;

        if self.store.find_by_username(&username).await?.is_some() {
            return Err(Error::DuplicateUsername);
        }

        let hash = self.hash(password).await?;
        let account = self.store.create_local(username, hash).await?;
        tracing::info!(account_id = %account.id, "Local account registered");
        Ok(account)
    }

    /// Check a username/password pair.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidCredentials`] for an unknown user, a provider-only
    /// account, a wrong password or an unreadable stored hash alike.
    pub async fn verify(&self, username: &str, password: &str) -> Result<Account, Error> {
        let Ok(username) = username.parse::<Username>() else {
            self.burn_dummy_verify(password).await;
            return Err(Error::InvalidCredentials);
        };

        let account = self.store.find_by_username(&username).await?;
        let Some((account, hash)) =
            account.and_then(|a| a.credential_hash.clone().map(|h| (a, h)))
        else {
            tracing::debug!("Local login for unknown user");
            self.burn_dummy_verify(password).await;
            return Err(Error::InvalidCredentials);
        };

        match self.check(password, hash).await {
            Ok(true) => Ok(account),
            Ok(false) => {
                tracing::debug!(account_id = %account.id, "Local login with wrong password");
                Err(Error::InvalidCredentials)
            }
            Err(e) => {
                tracing::warn!(account_id = %account.id, error = %e, "Stored credential unusable");
                Err(Error::InvalidCredentials)
            }
        }
    }

    /// Rotate the stored hash after re-checking the current password.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidCredentials`] if `current` does not match,
    /// [`Error::AccountNotFound`] for an unknown id.
    pub async fn change_password(
        &self,
        id: AccountId,
        current: &str,
        new: &str,
    ) -> Result<Account, Error> {
        check_password(new)?;
        let account = self.store.find_by_id(id).await?.ok_or(Error::AccountNotFound)?;
        let hash = account
            .credential_hash
            .clone()
            .ok_or(Error::InvalidCredentials)?;
        if !self.check(current, hash).await? {
            return Err(Error::InvalidCredentials);
        }
        let hash = self.hash(new).await?;
        self.store.rotate_credential(id, hash).await
    }

    async fn hash(&self, password: &str) -> Result<CredentialHash, Error> {
        let hasher = self.hasher.clone();
        let password = password.to_owned();
        blocking(move || hasher.hash(&password)).await
    }

    async fn check(&self, password: &str, hash: CredentialHash) -> Result<bool, Error> {
        let hasher = self.hasher.clone();
        let password = password.to_owned();
        blocking(move || hasher.verify(&password, &hash)).await
    }

    async fn burn_dummy_verify(&self, password: &str) {
        let dummy = self
            .dummy_hash
            .get_or_try_init(|| self.hash(DUMMY_PASSWORD))
            .await;
        match dummy {
            Ok(hash) => {
                let _ = self.check(password, hash.clone()).await;
            }
            Err(e) => tracing::warn!(error = %e, "Could not prepare dummy hash"),
        }
    }
}

fn check_password(password: &str) -> Result<(), Error> {
    if password.is_empty() {
        return Err(Error::InvalidPassword("empty"));
    }
    if password.len() > MAX_PASSWORD_LEN {
        return Err(Error::InvalidPassword("too long"));
    }
    Ok(())
}

async fn blocking<T, F>(f: F) -> Result<T, Error>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T, Error> + Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| Error::Store(format!("hashing task failed: {e}")))?
}

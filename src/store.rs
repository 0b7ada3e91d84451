use std::collections::HashMap;
use std::future::Future;

use parking_lot::RwLock;

use crate::account::{Account, CredentialHash, ProfileDefaults};
use crate::error::Error;
use crate::types::{AccountId, Username};

/// Durable account storage.
///
/// Implementations must enforce two uniqueness keys themselves: the
/// case-insensitive username, and the `(provider, subject)` pair. Both
/// [`create_local`](IdentityStore::create_local) and
/// [`find_or_create_by_provider`](IdentityStore::find_or_create_by_provider)
/// must be linearizable with respect to those keys, so that concurrent
/// callers racing on the same key never produce two accounts.
///
/// # Example
///
/// ```rust,ignore
/// impl IdentityStore for MyDb {
///     async fn find_or_create_by_provider(
///         &self,
///         provider: &str,
///         subject: &str,
///         defaults: ProfileDefaults,
///     ) -> Result<Account, Error> {
///         // INSERT ... ON CONFLICT (provider, subject) DO NOTHING, then SELECT
///     }
///     // ...
/// }
/// ```
pub trait IdentityStore: Send + Sync + 'static {
    fn find_by_id(
        &self,
        id: AccountId,
    ) -> impl Future<Output = Result<Option<Account>, Error>> + Send;

    fn find_by_username(
        &self,
        username: &Username,
    ) -> impl Future<Output = Result<Option<Account>, Error>> + Send;

    fn find_by_provider(
        &self,
        provider: &str,
        subject: &str,
    ) -> impl Future<Output = Result<Option<Account>, Error>> + Send;

    /// Create a credential-backed account.
    ///
    /// Fails with [`Error::DuplicateUsername`] if the username is taken.
    fn create_local(
        &self,
        username: Username,
        credential_hash: CredentialHash,
    ) -> impl Future<Output = Result<Account, Error>> + Send;

    /// Return the account linked to `(provider, subject)`, creating it with
    /// `defaults` if none exists. Existing accounts are returned untouched.
    fn find_or_create_by_provider(
        &self,
        provider: &str,
        subject: &str,
        defaults: ProfileDefaults,
    ) -> impl Future<Output = Result<Account, Error>> + Send;

    /// Attach a provider identity to an existing account.
    ///
    /// Linking a pair already held by the same account is a no-op; held by a
    /// different account it fails with [`Error::DuplicateProviderLink`].
    fn link_provider(
        &self,
        id: AccountId,
        provider: &str,
        subject: &str,
    ) -> impl Future<Output = Result<Account, Error>> + Send;

    fn rotate_credential(
        &self,
        id: AccountId,
        credential_hash: CredentialHash,
    ) -> impl Future<Output = Result<Account, Error>> + Send;
}

#[derive(Default)]
struct Tables {
    accounts: HashMap<AccountId, Account>,
    by_username: HashMap<String, AccountId>,
    by_provider: HashMap<(String, String), AccountId>,
}

impl Tables {
    fn lookup(&self, id: Option<&AccountId>) -> Option<Account> {
        id.and_then(|id| self.accounts.get(id)).cloned()
    }
}

/// In-process identity store.
///
/// The unique indexes live next to the rows under one lock, so every
/// check-then-insert is a single critical section.
#[derive(Default)]
pub struct MemoryIdentityStore {
    tables: RwLock<Tables>,
}

impl MemoryIdentityStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.tables.read().accounts.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of accounts linked to the given provider identity (0 or 1).
    #[must_use]
    pub fn count_provider_links(&self, provider: &str, subject: &str) -> usize {
        self.tables
            .read()
            .accounts
            .values()
            .filter(|a| a.provider_subject(provider) == Some(subject))
            .count()
    }
}

impl IdentityStore for MemoryIdentityStore {
    async fn find_by_id(&self, id: AccountId) -> Result<Option<Account>, Error> {
        Ok(self.tables.read().accounts.get(&id).cloned())
    }

    async fn find_by_username(&self, username: &Username) -> Result<Option<Account>, Error> {
        let tables = self.tables.read();
        Ok(tables.lookup(tables.by_username.get(&username.key())))
    }

    async fn find_by_provider(
        &self,
        provider: &str,
        subject: &str,
    ) -> Result<Option<Account>, Error> {
        let tables = self.tables.read();
        Ok(tables.lookup(
            tables
                .by_provider
                .get(&(provider.to_owned(), subject.to_owned())),
        ))
    }

    async fn create_local(
        &self,
        username: Username,
        credential_hash: CredentialHash,
    ) -> Result<Account, Error> {
        let mut tables = self.tables.write();
        let key = username.key();
        if tables.by_username.contains_key(&key) {
            return Err(Error::DuplicateUsername);
        }
        let account = Account::new_local(username, credential_hash);
        tables.by_username.insert(key, account.id);
        tables.accounts.insert(account.id, account.clone());
        tracing::debug!(account_id = %account.id, "Local account created");
        Ok(account)
    }

    async fn find_or_create_by_provider(
        &self,
        provider: &str,
        subject: &str,
        defaults: ProfileDefaults,
    ) -> Result<Account, Error> {
        let mut tables = self.tables.write();
        let link = (provider.to_owned(), subject.to_owned());
        if let Some(existing) = tables.lookup(tables.by_provider.get(&link)) {
            return Ok(existing);
        }
        let account = Account::new_provider(provider, subject, defaults);
        tables.by_provider.insert(link, account.id);
        tables.accounts.insert(account.id, account.clone());
        tracing::debug!(account_id = %account.id, provider, "Provider account created");
        Ok(account)
    }

    async fn link_provider(
        &self,
        id: AccountId,
        provider: &str,
        subject: &str,
    ) -> Result<Account, Error> {
        let mut tables = self.tables.write();
        let link = (provider.to_owned(), subject.to_owned());
        match tables.by_provider.get(&link) {
            Some(owner) if *owner == id => {}
            Some(_) => {
                return Err(Error::DuplicateProviderLink {
                    provider: provider.to_owned(),
                    subject: subject.to_owned(),
                });
            }
            None => {
                let account = tables.accounts.get_mut(&id).ok_or(Error::AccountNotFound)?;
                let previous = account
                    .provider_ids
                    .insert(provider.to_owned(), subject.to_owned());
                if let Some(previous) = previous {
                    tables.by_provider.remove(&(provider.to_owned(), previous));
                }
                tables.by_provider.insert(link, id);
            }
        }
        tables.lookup(Some(&id)).ok_or(Error::AccountNotFound)
    }

    async fn rotate_credential(
        &self,
        id: AccountId,
        credential_hash: CredentialHash,
    ) -> Result<Account, Error> {
        let mut tables = self.tables.write();
        let account = tables.accounts.get_mut(&id).ok_or(Error::AccountNotFound)?;
        account.credential_hash = Some(credential_hash);
        Ok(account.clone())
    }
}

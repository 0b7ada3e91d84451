use std::collections::BTreeMap;

use time::OffsetDateTime;

use crate::types::{AccountId, Username};

/// Salted one-way hash of a local password, in PHC string form.
#[derive(Clone, PartialEq, Eq)]
pub struct CredentialHash(String);

impl CredentialHash {
    #[must_use]
    pub fn new(phc: impl Into<String>) -> Self {
        Self(phc.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for CredentialHash {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("CredentialHash(<redacted>)")
    }
}

/// Profile fields copied from a provider on first sign-in only.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProfileDefaults {
    pub display_name: Option<String>,
    pub picture: Option<String>,
}

/// Durable identity record.
///
/// Local accounts carry a `username` and `credential_hash`; provider accounts
/// carry at least one `provider_ids` entry. Either may later gain the other.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Account {
    pub id: AccountId,
    pub username: Option<Username>,
    pub credential_hash: Option<CredentialHash>,
    /// provider name -> provider-issued subject id
    pub provider_ids: BTreeMap<String, String>,
    pub display_name: Option<String>,
    pub picture: Option<String>,
    pub created_at: OffsetDateTime,
}

impl Account {
    #[must_use]
    pub fn new_local(username: Username, credential_hash: CredentialHash) -> Self {
        Self {
            id: AccountId::generate(),
            display_name: Some(username.as_str().to_owned()),
            username: Some(username),
            credential_hash: Some(credential_hash),
            provider_ids: BTreeMap::new(),
            picture: None,
            created_at: OffsetDateTime::now_utc(),
        }
    }

    #[must_use]
    pub fn new_provider(provider: &str, subject: &str, defaults: ProfileDefaults) -> Self {
        Self {
            id: AccountId::generate(),
            username: None,
            credential_hash: None,
            provider_ids: BTreeMap::from([(provider.to_owned(), subject.to_owned())]),
            display_name: defaults.display_name,
            picture: defaults.picture,
            created_at: OffsetDateTime::now_utc(),
        }
    }

    /// Every stored account must be reachable by at least one login path.
    #[must_use]
    pub fn has_login_method(&self) -> bool {
        self.credential_hash.is_some() || !self.provider_ids.is_empty()
    }

    #[must_use]
    pub fn provider_subject(&self, provider: &str) -> Option<&str> {
        self.provider_ids.get(provider).map(String::as_str)
    }
}

use std::hash::{Hash, Hasher};

use derive_more::{Display, From, Into};
use serde::{Deserialize, Serialize};
use ulid::Ulid;

use crate::error::Error;

const MAX_USERNAME_LEN: usize = 64;

/// Account identifier (ULID).
///
/// Assigned once at creation and never changed.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    Display,
    From,
    Into,
)]
#[serde(transparent)]
pub struct AccountId(pub Ulid);

impl AccountId {
    #[must_use]
    pub fn generate() -> Self {
        Self(Ulid::new())
    }
}

impl std::str::FromStr for AccountId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ulid::from_string(s)
            .map(Self)
            .map_err(|e| Error::Store(format!("malformed account id {s:?}: {e}")))
    }
}

/// Opaque session identifier, the only value handed to the client.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Display, From, Into)]
#[serde(transparent)]
pub struct SessionId(pub String);

impl SessionId {
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Serialized minimal identity stored inside a session.
///
/// Produced and consumed only by [`SessionCodec`](crate::codec::SessionCodec);
/// opaque to everything else.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, From, Into)]
#[serde(transparent)]
pub struct IdentityToken(pub String);

impl IdentityToken {
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Validated local-login username.
///
/// Keeps the spelling the user registered with for display, but compares,
/// hashes and indexes case-insensitively via [`Username::key`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Username(String);

impl Username {
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Normalized form used for uniqueness and lookup.
    #[must_use]
    pub fn key(&self) -> String {
        self.0.to_lowercase()
    }
}

impl PartialEq for Username {
    fn eq(&self, other: &Self) -> bool {
        self.key() == other.key()
    }
}

impl Eq for Username {}

impl Hash for Username {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.key().hash(state);
    }
}

impl std::fmt::Display for Username {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::str::FromStr for Username {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::try_from(s.to_owned())
    }
}

impl TryFrom<String> for Username {
    type Error = Error;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(Error::InvalidUsername("empty".into()));
        }
        if trimmed.chars().count() > MAX_USERNAME_LEN {
            return Err(Error::InvalidUsername(format!(
                "longer than {MAX_USERNAME_LEN} characters"
            )));
        }
        if trimmed.chars().any(|c| c.is_control() || c.is_whitespace()) {
            return Err(Error::InvalidUsername(
                "contains whitespace or control characters".into(),
            ));
        }
        Ok(Self(trimmed.to_owned()))
    }
}

impl From<Username> for String {
    fn from(u: Username) -> Self {
        u.0
    }
}

use serde::{Deserialize, Serialize};

use crate::account::Account;
use crate::error::Error;
use crate::types::{AccountId, IdentityToken, Username};

/// Minimal projection of an [`Account`] carried by a session.
///
/// Never includes credential material. Reconstructed on every request
/// without touching the identity store; re-query by `id` when fresh
/// account state is needed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub id: AccountId,
    pub username: Option<Username>,
    pub picture: Option<String>,
}

impl Identity {
    #[must_use]
    pub fn of(account: &Account) -> Self {
        Self {
            id: account.id,
            username: account.username.clone(),
            picture: account.picture.clone(),
        }
    }
}

/// Turns accounts into [`IdentityToken`]s and back.
///
/// `deserialize(serialize(a)) == Identity::of(a)` for every account.
#[derive(Debug, Default, Clone, Copy)]
pub struct SessionCodec;

impl SessionCodec {
    /// # Errors
    ///
    /// [`Error::Codec`] if encoding fails.
    pub fn serialize(&self, account: &Account) -> Result<IdentityToken, Error> {
        Ok(IdentityToken(serde_json::to_string(&Identity::of(account))?))
    }

    /// # Errors
    ///
    /// [`Error::Codec`] for tokens not produced by [`serialize`](Self::serialize).
    pub fn deserialize(&self, token: &IdentityToken) -> Result<Identity, Error> {
        Ok(serde_json::from_str(token.as_str())?)
    }
}

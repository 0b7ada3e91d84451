#![doc = include_str!("../README.md")]

pub mod account;
pub mod authenticator;
pub mod codec;
pub mod delegate;
pub mod error;
pub mod local;
pub mod middleware;
pub mod oauth;
pub mod password;
pub mod session;
#[cfg(feature = "sqlite")]
pub mod sqlite;
pub mod store;
pub mod types;

// Re-exports for convenient access
pub use account::{Account, CredentialHash, ProfileDefaults};
pub use authenticator::{Authenticators, Credentials};
pub use codec::{Identity, SessionCodec};
pub use delegate::{CallbackParams, OAuthDelegate};
pub use error::{DelegationFailure, Error};
pub use local::LocalAuthenticator;
pub use oauth::pkce::{generate_code_challenge, generate_code_verifier, generate_state};
pub use oauth::{
    AuthClient, AuthorizationRequest, OAuthConfig, PendingAuthorization, ProviderProfile,
    TokenResponse,
};
pub use password::{Argon2Hasher, CredentialHasher};
pub use session::{MemorySessionStore, SessionStore};
#[cfg(feature = "sqlite")]
pub use sqlite::SqliteIdentityStore;
pub use store::{IdentityStore, MemoryIdentityStore};
pub use types::{AccountId, IdentityToken, SessionId, Username};

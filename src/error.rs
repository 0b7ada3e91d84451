/// Why a delegated (provider) login did not produce an account.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[non_exhaustive]
pub enum DelegationFailure {
    #[error("provider returned error: {0}")]
    ProviderDenied(String),
    #[error("no authorization in progress")]
    NoPendingAuthorization,
    #[error("state mismatch")]
    StateMismatch,
    #[error("missing authorization code")]
    MissingCode,
    #[error("token exchange failed: {0}")]
    TokenExchange(String),
    #[error("profile fetch failed: {0}")]
    Profile(String),
    #[error("account resolution failed: {0}")]
    AccountResolution(String),
}

#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    #[error("username already taken")]
    DuplicateUsername,

    /// Unknown user and wrong password are deliberately the same variant.
    #[error("invalid credentials")]
    InvalidCredentials,

    #[error("invalid username: {0}")]
    InvalidUsername(String),

    #[error("invalid password: {0}")]
    InvalidPassword(&'static str),

    #[error("authentication failed: {0}")]
    AuthenticationFailed(#[from] DelegationFailure),

    #[error("provider identity {provider}:{subject} is linked to another account")]
    DuplicateProviderLink { provider: String, subject: String },

    #[error("account not found")]
    AccountNotFound,

    #[error("configuration error: {0}")]
    Config(String),

    #[error("store error: {0}")]
    Store(String),

    #[error("session codec error: {0}")]
    Codec(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("OAuth2 {operation} failed (status {status:?}): {detail}")]
    OAuth {
        operation: &'static str,
        status: Option<u16>,
        detail: String,
    },
}

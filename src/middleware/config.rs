use std::sync::Arc;

use axum_extra::extract::cookie::Key;
use time::Duration;
use url::Url;

use crate::error::Error;
use crate::oauth::OAuthConfig;
use crate::password::{Argon2Hasher, CredentialHasher};

/// Shared auth settings used by both config and runtime state.
#[derive(Clone)]
pub(crate) struct AuthSettings {
    pub(crate) cookie_key: Key,
    pub(crate) session_cookie_name: String,
    pub(crate) idle_timeout: Duration,
    pub(crate) secure_cookies: bool,
    pub(crate) provider: String,
    pub(crate) auth_path: String,
    pub(crate) protected_path: String,
    pub(crate) login_path: String,
    pub(crate) register_path: String,
    pub(crate) logout_redirect: String,
}

impl AuthSettings {
    fn defaults(cookie_key: Key, idle_timeout: Duration) -> Self {
        Self {
            cookie_key,
            session_cookie_name: "__secrets_session".into(),
            idle_timeout,
            secure_cookies: true,
            provider: "google".into(),
            auth_path: "/auth".into(),
            protected_path: "/secrets".into(),
            login_path: "/login".into(),
            register_path: "/register".into(),
            logout_redirect: "/".into(),
        }
    }

    pub(crate) fn provider_path(&self) -> String {
        format!("{}/{}", self.auth_path, self.provider)
    }
}

/// Authentication configuration.
///
/// Provider credentials, the session secret and the idle timeout are
/// constructor parameters; there is no "missing field" state at runtime.
///
/// Use [`from_env()`](AuthConfig::from_env) for convention-based setup,
/// or [`new()`](AuthConfig::new) with `with_*` methods for full control.
pub struct AuthConfig {
    pub(super) oauth: OAuthConfig,
    pub(super) hasher: Arc<dyn CredentialHasher>,
    pub(super) settings: AuthSettings,
}

impl AuthConfig {
    #[must_use]
    pub fn new(oauth: OAuthConfig, cookie_key: Key, idle_timeout: Duration) -> Self {
        Self {
            oauth,
            hasher: Arc::new(Argon2Hasher),
            settings: AuthSettings::defaults(cookie_key, idle_timeout),
        }
    }

    /// Create config from environment variables.
    ///
    /// # Required env vars
    /// - `OAUTH_CLIENT_ID`, `OAUTH_CLIENT_SECRET`: provider client credentials
    /// - `OAUTH_CALLBACK_URL`: absolute callback URL registered with the provider
    /// - `SESSION_SECRET`: cookie encryption secret, at least 64 bytes
    /// - `SESSION_IDLE_TIMEOUT_SECS`: positive integer
    ///
    /// # Optional env vars
    /// - `OAUTH_PROVIDER`: provider name and path segment (default `google`)
    /// - `OAUTH_AUTH_URL`, `OAUTH_TOKEN_URL`, `OAUTH_USERINFO_URL`: endpoint overrides
    /// - `OAUTH_SCOPES`: comma-separated scopes
    /// - `INSECURE_COOKIES`: `"1"` or `"true"` drops the `Secure` cookie flag
    ///
    /// # Errors
    ///
    /// [`Error::Config`] if a required variable is missing or any value is invalid.
    pub fn from_env() -> Result<Self, Error> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// [`from_env`](Self::from_env) over an arbitrary variable source.
    ///
    /// # Errors
    ///
    /// Same as [`from_env`](Self::from_env).
    pub fn from_lookup<F>(lookup: F) -> Result<Self, Error>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |name: &str| {
            lookup(name)
                .filter(|v| !v.trim().is_empty())
                .ok_or_else(|| Error::Config(format!("{name} is required")))
        };
        let url = |name: &str, raw: String| {
            raw.parse::<Url>()
                .map_err(|e| Error::Config(format!("{name}: {e}")))
        };

        let client_id = required("OAUTH_CLIENT_ID")?;
        let client_secret = required("OAUTH_CLIENT_SECRET")?;
        let callback = url("OAUTH_CALLBACK_URL", required("OAUTH_CALLBACK_URL")?)?;

        let secret = required("SESSION_SECRET")?;
        let cookie_key = Key::try_from(secret.as_bytes()).map_err(|_| {
            Error::Config("SESSION_SECRET must be at least 64 bytes".into())
        })?;

        let idle_secs: u32 = required("SESSION_IDLE_TIMEOUT_SECS")?
            .trim()
            .parse()
            .ok()
            .filter(|secs| *secs > 0)
            .ok_or_else(|| {
                Error::Config("SESSION_IDLE_TIMEOUT_SECS must be a positive integer".into())
            })?;

        let mut oauth = OAuthConfig::new(client_id, client_secret, callback);
        if let Some(raw) = lookup("OAUTH_AUTH_URL") {
            oauth = oauth.with_auth_url(url("OAUTH_AUTH_URL", raw)?);
        }
        if let Some(raw) = lookup("OAUTH_TOKEN_URL") {
            oauth = oauth.with_token_url(url("OAUTH_TOKEN_URL", raw)?);
        }
        if let Some(raw) = lookup("OAUTH_USERINFO_URL") {
            oauth = oauth.with_userinfo_url(url("OAUTH_USERINFO_URL", raw)?);
        }
        if let Some(scopes) = lookup("OAUTH_SCOPES") {
            let scopes: Vec<String> = scopes
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();
            if !scopes.is_empty() {
                oauth = oauth.with_scopes(scopes);
            }
        }

        let insecure = matches!(
            lookup("INSECURE_COOKIES").as_deref(),
            Some("1") | Some("true"),
        );

        let mut config = Self::new(oauth, cookie_key, Duration::seconds(i64::from(idle_secs)))
            .with_secure_cookies(!insecure);
        if let Some(provider) = lookup("OAUTH_PROVIDER").filter(|p| !p.trim().is_empty()) {
            config = config.with_provider(provider.trim());
        }
        Ok(config)
    }

    #[must_use]
    pub fn with_hasher(mut self, hasher: Arc<dyn CredentialHasher>) -> Self {
        self.hasher = hasher;
        self
    }

    #[must_use]
    pub fn with_provider(mut self, provider: impl Into<String>) -> Self {
        self.settings.provider = provider.into();
        self
    }

    #[must_use]
    pub fn with_session_cookie_name(mut self, name: impl Into<String>) -> Self {
        self.settings.session_cookie_name = name.into();
        self
    }

    #[must_use]
    pub fn with_secure_cookies(mut self, secure: bool) -> Self {
        self.settings.secure_cookies = secure;
        self
    }

    #[must_use]
    pub fn with_auth_path(mut self, path: impl Into<String>) -> Self {
        self.settings.auth_path = path.into();
        self
    }

    #[must_use]
    pub fn with_protected_path(mut self, path: impl Into<String>) -> Self {
        self.settings.protected_path = path.into();
        self
    }

    #[must_use]
    pub fn oauth(&self) -> &OAuthConfig {
        &self.oauth
    }

    #[must_use]
    pub fn idle_timeout(&self) -> Duration {
        self.settings.idle_timeout
    }

    #[must_use]
    pub fn provider(&self) -> &str {
        &self.settings.provider
    }
}

//! Plug-and-play authentication routes and session extraction for Axum.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use secrets_auth::middleware::{AuthConfig, auth_routes};
//! use secrets_auth::{MemoryIdentityStore, MemorySessionStore};
//!
//! // 1. Configure from environment (fails fast on a missing secret)
//! let config = AuthConfig::from_env()?;
//!
//! // 2. Pick stores
//! let identities = Arc::new(MemoryIdentityStore::new());
//! let sessions = Arc::new(MemorySessionStore::new(config.idle_timeout()));
//!
//! // 3. Mount auth routes
//! let app = axum::Router::new().merge(auth_routes(config, identities, sessions));
//!
//! // 4. Use the `Viewer` extractor, or `resolve_session()` in your own middleware
//! ```

mod config;
mod cookies;
mod error;
mod extractor;
mod routes;
mod state;

pub use config::AuthConfig;
pub use error::{AuthError, Found};
pub use extractor::{resolve_session, Viewer};
pub use routes::auth_routes;
pub use state::AuthState;

/// Re-export cookie key type for builder API.
pub use axum_extra::extract::cookie::Key as CookieKey;

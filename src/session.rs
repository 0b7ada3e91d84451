//! Server-side sessions keyed by an opaque random id.
//!
//! Expiry is lazy: an entry whose `expires_at` has passed is
//! indistinguishable from one that never existed. [`MemorySessionStore::spawn_sweeper`]
//! only reclaims memory; correctness never depends on it.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use parking_lot::Mutex;
use time::{Duration, OffsetDateTime};
use tokio::task::JoinHandle;

use crate::error::Error;
use crate::oauth::pkce;
use crate::types::{IdentityToken, SessionId};

/// Session persistence.
///
/// # Example
///
/// ```rust,ignore
/// impl SessionStore for RedisSessions {
///     async fn create(&self, token: IdentityToken) -> Result<SessionId, Error> {
///         let id = SessionId::generate();
///         self.set_ex(id.as_str(), token.as_str(), self.idle_secs).await?;
///         Ok(id)
///     }
///     // ...
/// }
/// ```
pub trait SessionStore: Send + Sync + 'static {
    /// Store `token` under a fresh random id.
    fn create(&self, token: IdentityToken)
        -> impl Future<Output = Result<SessionId, Error>> + Send;

    /// `None` for unknown and expired ids alike.
    fn resolve(
        &self,
        id: &SessionId,
    ) -> impl Future<Output = Result<Option<IdentityToken>, Error>> + Send;

    /// Idempotent.
    fn destroy(&self, id: &SessionId) -> impl Future<Output = Result<(), Error>> + Send;
}

impl SessionId {
    /// 32 random bytes, base64url.
    #[must_use]
    pub fn generate() -> Self {
        Self(pkce::random_token::<32>())
    }
}

#[derive(Debug, Clone)]
struct SessionRecord {
    token: IdentityToken,
    created_at: OffsetDateTime,
    expires_at: OffsetDateTime,
}

impl SessionRecord {
    fn is_expired(&self, now: OffsetDateTime) -> bool {
        self.expires_at <= now
    }
}

/// Process-local [`SessionStore`] with a sliding idle timeout.
#[derive(Debug)]
pub struct MemorySessionStore {
    sessions: Mutex<HashMap<String, SessionRecord>>,
    idle_timeout: Duration,
}

impl MemorySessionStore {
    #[must_use]
    pub fn new(idle_timeout: Duration) -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
            idle_timeout,
        }
    }

    #[must_use]
    pub fn idle_timeout(&self) -> Duration {
        self.idle_timeout
    }

    /// Live and expired-but-unswept entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.sessions.lock().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sessions.lock().is_empty()
    }

    /// Drop every expired entry. Returns how many were removed.
    pub fn sweep_expired(&self) -> usize {
        let now = OffsetDateTime::now_utc();
        let mut sessions = self.sessions.lock();
        let before = sessions.len();
        sessions.retain(|_, record| !record.is_expired(now));
        before - sessions.len()
    }

    /// Run [`sweep_expired`](Self::sweep_expired) every `period` until the
    /// returned task is aborted.
    pub fn spawn_sweeper(self: Arc<Self>, period: std::time::Duration) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                interval.tick().await;
                let removed = self.sweep_expired();
                if removed > 0 {
                    tracing::debug!(removed, "Swept expired sessions");
                }
            }
        })
    }
}

impl SessionStore for MemorySessionStore {
    async fn create(&self, token: IdentityToken) -> Result<SessionId, Error> {
        let id = SessionId::generate();
        let now = OffsetDateTime::now_utc();
        let record = SessionRecord {
            token,
            created_at: now,
            expires_at: now + self.idle_timeout,
        };
        self.sessions.lock().insert(id.as_str().to_owned(), record);
        Ok(id)
    }

    async fn resolve(&self, id: &SessionId) -> Result<Option<IdentityToken>, Error> {
        let now = OffsetDateTime::now_utc();
        let mut sessions = self.sessions.lock();
        let Some(record) = sessions.get_mut(id.as_str()) else {
            return Ok(None);
        };
        if record.is_expired(now) {
            tracing::debug!(
                age_secs = (now - record.created_at).whole_seconds(),
                "Session expired"
            );
            sessions.remove(id.as_str());
            return Ok(None);
        }
        record.expires_at = now + self.idle_timeout;
        Ok(Some(record.token.clone()))
    }

    async fn destroy(&self, id: &SessionId) -> Result<(), Error> {
        self.sessions.lock().remove(id.as_str());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn token(s: &str) -> IdentityToken {
        IdentityToken(s.into())
    }

    #[tokio::test]
    async fn test_create_then_resolve() {
        let store = MemorySessionStore::new(Duration::minutes(30));
        let id = store.create(token("t")).await.unwrap();
        assert_eq!(store.resolve(&id).await.unwrap(), Some(token("t")));
    }

    #[tokio::test]
    async fn test_ids_are_random_and_distinct() {
        let store = MemorySessionStore::new(Duration::minutes(30));
        let a = store.create(token("t")).await.unwrap();
        let b = store.create(token("t")).await.unwrap();
        assert_ne!(a, b);
        assert_eq!(a.as_str().len(), 43);
    }

    #[tokio::test]
    async fn test_destroy_is_idempotent() {
        let store = MemorySessionStore::new(Duration::minutes(30));
        let id = store.create(token("t")).await.unwrap();
        store.destroy(&id).await.unwrap();
        assert_eq!(store.resolve(&id).await.unwrap(), None);
        store.destroy(&id).await.unwrap();
        store.destroy(&SessionId("never-issued".into())).await.unwrap();
    }

    #[tokio::test]
    async fn test_unknown_id_is_missing() {
        let store = MemorySessionStore::new(Duration::minutes(30));
        assert_eq!(store.resolve(&SessionId("nope".into())).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_elapsed_session_is_missing() {
        let store = MemorySessionStore::new(Duration::ZERO);
        let id = store.create(token("t")).await.unwrap();
        assert_eq!(store.resolve(&id).await.unwrap(), None);
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_resolve_slides_expiry() {
        let store = MemorySessionStore::new(Duration::minutes(30));
        let id = store.create(token("t")).await.unwrap();
        let first = store.sessions.lock()[id.as_str()].expires_at;
        std::thread::sleep(std::time::Duration::from_millis(5));
        store.resolve(&id).await.unwrap();
        let second = store.sessions.lock()[id.as_str()].expires_at;
        assert!(second > first);
    }

    #[tokio::test]
    async fn test_sweep_removes_only_expired() {
        let store = MemorySessionStore::new(Duration::minutes(30));
        let live = store.create(token("live")).await.unwrap();
        let dead = store.create(token("dead")).await.unwrap();
        store.sessions.lock().get_mut(dead.as_str()).unwrap().expires_at =
            OffsetDateTime::now_utc() - Duration::seconds(1);

        assert_eq!(store.sweep_expired(), 1);
        assert_eq!(store.len(), 1);
        assert_eq!(store.resolve(&live).await.unwrap(), Some(token("live")));
    }

    #[tokio::test]
    async fn test_sweeper_task_reclaims_memory() {
        let store = Arc::new(MemorySessionStore::new(Duration::ZERO));
        store.create(token("t")).await.unwrap();
        let handle = store.clone().spawn_sweeper(std::time::Duration::from_millis(10));
        for _ in 0..50 {
            if store.is_empty() {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
        handle.abort();
        assert!(store.is_empty());
    }
}

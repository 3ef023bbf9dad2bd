use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::api::ApiError;
use crate::cache::MemoryCache;

/// How long a resolved identity is trusted before asking the auth service
/// again.
const SESSION_TTL: Duration = Duration::from_secs(5 * 60);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub id: String,
    #[serde(default)]
    pub email: Option<String>,
}

impl Identity {
    pub fn new(id: impl Into<String>, email: Option<String>) -> Self {
        Self {
            id: id.into(),
            email,
        }
    }
}

#[async_trait]
pub trait SessionProvider: Send + Sync {
    /// `Ok(None)` when the token is unknown or expired.
    async fn identify(&self, token: &str) -> Result<Option<Identity>, ApiError>;
}

#[derive(Debug, Clone, Default)]
pub struct StaticSessions {
    tokens: HashMap<String, Identity>,
}

impl StaticSessions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_token(mut self, token: impl Into<String>, identity: Identity) -> Self {
        self.tokens.insert(token.into(), identity);
        self
    }

    /// Parse `token=user[:email]` pairs separated by commas.
    pub fn parse(spec: &str) -> Self {
        let mut sessions = Self::new();
        for pair in spec.split(',').map(str::trim).filter(|p| !p.is_empty()) {
            let Some((token, user)) = pair.split_once('=') else {
                continue;
            };
            let (id, email) = match user.split_once(':') {
                Some((id, email)) => (id, Some(email.to_string())),
                None => (user, None),
            };
            if token.is_empty() || id.is_empty() {
                continue;
            }
            sessions = sessions.with_token(token, Identity::new(id, email));
        }
        sessions
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }
}

#[async_trait]
impl SessionProvider for StaticSessions {
    async fn identify(&self, token: &str) -> Result<Option<Identity>, ApiError> {
        Ok(self.tokens.get(token).cloned())
    }
}

/// Wraps a provider and caches positive lookups for `SESSION_TTL`.
///
/// The token's own expiry is not consulted, so a token that expires or is
/// revoked keeps resolving until its cache entry ages out. Expired entries
/// are swept whenever a new identity is cached, so tokens replaced by a
/// refresh do not accumulate.
pub struct CachedSessions<P> {
    inner: P,
    cache: MemoryCache,
}

impl<P: SessionProvider> CachedSessions<P> {
    pub fn new(inner: P) -> Self {
        Self {
            inner,
            cache: MemoryCache::new(),
        }
    }
}

#[async_trait]
impl<P: SessionProvider> SessionProvider for CachedSessions<P> {
    async fn identify(&self, token: &str) -> Result<Option<Identity>, ApiError> {
        if let Some(identity) = self.cache.get_as::<Identity>(token) {
            return Ok(Some(identity));
        }
        let identity = self.inner.identify(token).await?;
        if let Some(ref found) = identity {
            self.cache.purge_expired();
            self.cache.set_as(token, found, SESSION_TTL);
        }
        Ok(identity)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    #[test]
    fn test_parse_token_pairs() {
        let sessions = StaticSessions::parse("abc=u1:gate@example.com, def=u2,,bad, =u3");
        assert_eq!(sessions.len(), 2);
        assert_eq!(
            sessions.tokens["abc"],
            Identity::new("u1", Some("gate@example.com".to_string()))
        );
        assert_eq!(sessions.tokens["def"], Identity::new("u2", None));
    }

    #[tokio::test]
    async fn test_static_unknown_token() {
        let sessions = StaticSessions::new().with_token("t", Identity::new("u", None));
        assert!(sessions.identify("other").await.unwrap().is_none());
        assert!(sessions.identify("t").await.unwrap().is_some());
    }

    struct CountingProvider {
        calls: Arc<AtomicU32>,
    }

    #[async_trait]
    impl SessionProvider for CountingProvider {
        async fn identify(&self, token: &str) -> Result<Option<Identity>, ApiError> {
            self.calls.fetch_add(1, Ordering::Relaxed);
            Ok(token.starts_with("good").then(|| Identity::new("u1", None)))
        }
    }

    #[tokio::test]
    async fn test_cached_sessions_only_cache_hits() {
        let calls = Arc::new(AtomicU32::new(0));
        let sessions = CachedSessions::new(CountingProvider { calls: calls.clone() });

        assert!(sessions.identify("good").await.unwrap().is_some());
        assert!(sessions.identify("good").await.unwrap().is_some());
        assert_eq!(calls.load(Ordering::Relaxed), 1);

        assert!(sessions.identify("bad").await.unwrap().is_none());
        assert!(sessions.identify("bad").await.unwrap().is_none());
        assert_eq!(calls.load(Ordering::Relaxed), 3);
    }

    #[tokio::test]
    async fn test_cached_sessions_sweep_expired_tokens() {
        let calls = Arc::new(AtomicU32::new(0));
        let sessions = CachedSessions::new(CountingProvider { calls: calls.clone() });

        sessions.identify("good-1").await.unwrap();
        sessions.cache.backdate("good-1", SESSION_TTL);
        sessions.identify("good-2").await.unwrap();
        assert_eq!(sessions.cache.len(), 1);

        // An aged-out token goes back to the auth service
        sessions.identify("good-1").await.unwrap();
        assert_eq!(calls.load(Ordering::Relaxed), 3);
    }
}

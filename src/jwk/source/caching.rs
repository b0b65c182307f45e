//! Caching with single-flight refreshes.

use std::sync::{Arc, Condvar, Mutex, RwLock};

use time::{Duration, OffsetDateTime};

use super::{JWKSetSource, SourceError, SourceHealth};
use crate::jwk::JWKSet;

#[derive(Debug, Clone)]
struct CachedSet {
    set: Arc<JWKSet>,
    created_at: OffsetDateTime,
    expires_at: OffsetDateTime,
}

#[derive(Debug, Default)]
struct Flight {
    in_flight: bool,
    last_error: Option<SourceError>,
}

/// Caches the inner source's set for a TTL.
///
/// Concurrent misses share one upstream fetch: the first caller becomes
/// the leader, everyone else waits on the flight and receives the leader's
/// outcome. A forced refresh carrying a timestamp older than the cache
/// entry is elided, because a concurrent thread has already refreshed.
pub struct CachingJWKSetSource<S> {
    source: S,
    ttl: Duration,
    refresh_timeout: std::time::Duration,
    cache: RwLock<Option<CachedSet>>,
    flight: Mutex<Flight>,
    done: Condvar,
    health: Mutex<Option<SourceHealth>>,
}

impl<S: JWKSetSource> CachingJWKSetSource<S> {
    pub fn new(source: S, ttl: Duration, refresh_timeout: std::time::Duration) -> Self {
        CachingJWKSetSource {
            source,
            ttl,
            refresh_timeout,
            cache: RwLock::new(None),
            flight: Mutex::new(Flight::default()),
            done: Condvar::new(),
            health: Mutex::new(None),
        }
    }

    /// The wrapped source.
    pub fn inner(&self) -> &S {
        &self.source
    }

    /// When the current cache entry expires, if one exists.
    pub(crate) fn cache_expiry(&self) -> Option<OffsetDateTime> {
        self.cache
            .read()
            .expect("lock poisoned")
            .as_ref()
            .map(|c| c.expires_at)
    }

    fn cached(&self) -> Option<CachedSet> {
        self.cache.read().expect("lock poisoned").clone()
    }

    fn record_health(&self, healthy: bool, checked_at: OffsetDateTime) {
        *self.health.lock().expect("lock poisoned") = Some(SourceHealth {
            healthy,
            checked_at,
        });
    }

    fn load(&self, force_refresh: bool, now: OffsetDateTime) -> Result<Arc<JWKSet>, SourceError> {
        let mut flight = self.flight.lock().expect("lock poisoned");
        if flight.in_flight {
            // follower: wait for the leader's outcome
            let (guard, timeout) = self
                .done
                .wait_timeout_while(flight, self.refresh_timeout, |f| f.in_flight)
                .expect("lock poisoned");
            flight = guard;
            if timeout.timed_out() && flight.in_flight {
                return Err(SourceError::Unavailable(
                    "timed out waiting for the JWK set refresh".to_string(),
                ));
            }
            return match &flight.last_error {
                None => self
                    .cached()
                    .map(|c| c.set)
                    .ok_or_else(|| {
                        SourceError::Unavailable("refresh produced no JWK set".to_string())
                    }),
                Some(error) => Err(error.clone()),
            };
        }

        // leader: fetch with the flight marked, publish, wake the others
        flight.in_flight = true;
        drop(flight);

        let result = self.source.jwk_set(force_refresh, now);
        let outcome = match result {
            Ok(set) => {
                *self.cache.write().expect("lock poisoned") = Some(CachedSet {
                    set: Arc::clone(&set),
                    created_at: now,
                    expires_at: now + self.ttl,
                });
                self.record_health(true, now);
                Ok(set)
            }
            // an over-limit forced refresh falls back to a still-valid cache
            Err(SourceError::RateLimitReached) => match self.cached() {
                Some(cached) if now <= cached.expires_at => Ok(cached.set),
                _ => {
                    self.record_health(false, now);
                    Err(SourceError::RateLimitReached)
                }
            },
            Err(error) => {
                self.record_health(false, now);
                tracing::warn!(error = %error, "JWK set refresh failed");
                Err(error)
            }
        };

        let mut flight = self.flight.lock().expect("lock poisoned");
        flight.in_flight = false;
        flight.last_error = outcome.as_ref().err().cloned();
        self.done.notify_all();
        outcome
    }
}

impl<S: JWKSetSource> JWKSetSource for CachingJWKSetSource<S> {
    fn jwk_set(
        &self,
        force_refresh: bool,
        now: OffsetDateTime,
    ) -> Result<Arc<JWKSet>, SourceError> {
        if let Some(cached) = self.cached() {
            if force_refresh {
                // a refresh performed after the caller looked is good enough
                if cached.created_at > now {
                    return Ok(cached.set);
                }
            } else if now <= cached.expires_at {
                return Ok(cached.set);
            }
        }
        self.load(force_refresh, now)
    }

    fn health(&self, refresh: bool) -> Option<SourceHealth> {
        let recorded = *self.health.lock().expect("lock poisoned");
        if recorded.is_none() && refresh {
            let _ = self.jwk_set(false, OffsetDateTime::now_utc());
            return *self.health.lock().expect("lock poisoned");
        }
        recorded
    }
}

//! JWK sourcing pipeline.
//!
//! A [`JWKSetSource`] supplies whole JWK sets and can fail transiently
//! ([`SourceError::Unavailable`]) or fatally ([`SourceError::Parse`]).
//! Decorators compose around a base source, each owning its inner source:
//! caching with single-flight, refresh-ahead, rate limiting of forced
//! refreshes, outage tolerance, and failover between two assembled
//! pipelines. [`JWKSourceBuilder`] assembles the chain.
//!
//! Every operation takes the caller-observed time, so cache decisions are
//! testable and concurrent refreshes can be elided: a forced refresh
//! carries the timestamp captured *before* the caller inspected the cached
//! set, letting the cache detect that another thread has refreshed since.

use std::fmt;
use std::sync::Arc;

use time::{Duration, OffsetDateTime};

use super::{JWKSelector, JWKSet, JWK};

mod builder;
mod caching;
mod failover;
mod immutable;
mod outage;
mod rate_limited;
mod refresh_ahead;
mod url;

pub use builder::{HttpConfig, JWKSourceBuilder};
pub use caching::CachingJWKSetSource;
pub use failover::FailoverJWKSource;
pub use immutable::ImmutableJWKSet;
pub use outage::OutageTolerantJWKSetSource;
pub use rate_limited::RateLimitedJWKSetSource;
pub use refresh_ahead::RefreshAheadJWKSetSource;
pub use url::UrlJWKSetSource;

/// Failures of the sourcing pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceError {
    /// Transient failure: the source could not be reached or timed out.
    /// Recoverable by outage tolerance and failover.
    Unavailable(String),
    /// Fatal failure: the source answered with something that is not a
    /// JWK set.
    Parse(String),
    /// A forced refresh was denied by the rate limiter.
    RateLimitReached,
    /// Both pipelines of a failover source failed.
    Remote(String),
}

impl fmt::Display for SourceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceError::Unavailable(msg) => write!(f, "JWK set unavailable: {msg}"),
            SourceError::Parse(msg) => write!(f, "JWK set malformed: {msg}"),
            SourceError::RateLimitReached => f.write_str("JWK set refresh rate limit reached"),
            SourceError::Remote(msg) => write!(f, "remote key sourcing failed: {msg}"),
        }
    }
}

impl std::error::Error for SourceError {}

/// Outcome of the pipeline's most recent interaction with its upstream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourceHealth {
    /// Whether the last upstream interaction succeeded
    pub healthy: bool,
    /// When that interaction happened
    pub checked_at: OffsetDateTime,
}

/// Notifications emitted by the pipeline's decorators.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceEvent {
    /// A transient upstream failure is being bridged with the last known
    /// set; `remaining` is how long the bridge still holds.
    Outage {
        /// Time left within the outage TTL
        remaining: Duration,
    },
    /// A forced refresh was denied by the token bucket.
    RateLimited,
    /// A background refresh was scheduled.
    RefreshScheduled {
        /// When the refresh will run
        at: OffsetDateTime,
    },
    /// A background refresh completed.
    RefreshCompleted,
    /// A background refresh failed.
    RefreshFailed,
}

/// Receives [`SourceEvent`]s. Handed to the pipeline at construction; no
/// global state is involved.
pub trait SourceEventListener: Send + Sync {
    fn on_event(&self, _event: &SourceEvent) {}
}

/// The default listener: ignores everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopListener;

impl SourceEventListener for NoopListener {}

/// Supplies whole JWK sets.
pub trait JWKSetSource: Send + Sync {
    /// Return the JWK set.
    ///
    /// `force_refresh` bypasses caches. `now` is the time the caller
    /// observed before initiating the call; caching layers use it to elide
    /// refreshes that another thread has already performed.
    fn jwk_set(
        &self,
        force_refresh: bool,
        now: OffsetDateTime,
    ) -> Result<Arc<JWKSet>, SourceError>;

    /// The latest upstream outcome. `refresh` asks the source to perform
    /// a fetch first when it has nothing to report yet.
    fn health(&self, refresh: bool) -> Option<SourceHealth> {
        let _ = refresh;
        None
    }
}

impl<S: JWKSetSource + ?Sized> JWKSetSource for Box<S> {
    fn jwk_set(
        &self,
        force_refresh: bool,
        now: OffsetDateTime,
    ) -> Result<Arc<JWKSet>, SourceError> {
        (**self).jwk_set(force_refresh, now)
    }

    fn health(&self, refresh: bool) -> Option<SourceHealth> {
        (**self).health(refresh)
    }
}

impl<S: JWKSetSource + ?Sized> JWKSetSource for Arc<S> {
    fn jwk_set(
        &self,
        force_refresh: bool,
        now: OffsetDateTime,
    ) -> Result<Arc<JWKSet>, SourceError> {
        (**self).jwk_set(force_refresh, now)
    }

    fn health(&self, refresh: bool) -> Option<SourceHealth> {
        (**self).health(refresh)
    }
}

/// Supplies verification or decryption keys by running a selector.
pub trait JWKSource: Send + Sync {
    /// The keys matching `selector`, in source order.
    fn get(&self, selector: &JWKSelector) -> Result<Vec<JWK>, SourceError>;

    /// The latest upstream outcome, where the source tracks one.
    fn health(&self, refresh: bool) -> Option<SourceHealth> {
        let _ = refresh;
        None
    }
}

impl<S: JWKSource + ?Sized> JWKSource for Arc<S> {
    fn get(&self, selector: &JWKSelector) -> Result<Vec<JWK>, SourceError> {
        (**self).get(selector)
    }

    fn health(&self, refresh: bool) -> Option<SourceHealth> {
        (**self).health(refresh)
    }
}

/// Adapts a [`JWKSetSource`] into a [`JWKSource`].
///
/// When the selector matches nothing against the cached set, one forced
/// refresh is requested with the timestamp captured before the first
/// lookup, then the selector reruns. A concurrent thread that already
/// refreshed the cache makes the forced fetch a no-op.
pub struct JWKSetBasedJWKSource<S> {
    source: S,
}

impl<S: JWKSetSource> JWKSetBasedJWKSource<S> {
    pub fn new(source: S) -> Self {
        JWKSetBasedJWKSource { source }
    }

    /// The underlying set source.
    pub fn set_source(&self) -> &S {
        &self.source
    }
}

impl<S: JWKSetSource> JWKSource for JWKSetBasedJWKSource<S> {
    fn get(&self, selector: &JWKSelector) -> Result<Vec<JWK>, SourceError> {
        let now = OffsetDateTime::now_utc();
        let set = self.source.jwk_set(false, now)?;
        let matches = selector.select(&set);
        if !matches.is_empty() {
            return Ok(matches);
        }

        // the selector may have missed because the published set is stale,
        // e.g. after a signing key rotation
        let set = self.source.jwk_set(true, now)?;
        Ok(selector.select(&set))
    }

    fn health(&self, refresh: bool) -> Option<SourceHealth> {
        self.source.health(refresh)
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    use super::*;
    use crate::jwk::CommonParameters;

    /// A JWK set holding octet keys with the given kids.
    pub fn set_with_kids(kids: &[&str]) -> JWKSet {
        JWKSet {
            keys: kids
                .iter()
                .map(|kid| JWK {
                    common: CommonParameters {
                        key_id: Some((*kid).to_string()),
                        ..Default::default()
                    },
                    ..JWK::new_octet_key(kid.as_bytes())
                })
                .collect(),
            additional: Default::default(),
        }
    }

    /// A scripted source: pops the next response per call and counts the
    /// calls it served.
    pub struct ScriptedSource {
        responses: Mutex<Vec<Result<JWKSet, SourceError>>>,
        pub calls: AtomicUsize,
    }

    impl ScriptedSource {
        pub fn new(responses: Vec<Result<JWKSet, SourceError>>) -> Self {
            ScriptedSource {
                responses: Mutex::new(responses),
                calls: AtomicUsize::new(0),
            }
        }

        /// A source that always serves the same set.
        pub fn constant(set: JWKSet) -> Self {
            ScriptedSource::new(vec![Ok(set)])
        }

        pub fn call_count(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl JWKSetSource for ScriptedSource {
        fn jwk_set(
            &self,
            _force_refresh: bool,
            _now: OffsetDateTime,
        ) -> Result<Arc<JWKSet>, SourceError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let mut responses = self.responses.lock().expect("lock poisoned");
            let response = if responses.len() > 1 {
                responses.remove(0)
            } else {
                responses[0].clone()
            };
            response.map(Arc::new)
        }
    }

    /// A listener that records every event.
    #[derive(Default)]
    pub struct RecordingListener(pub Mutex<Vec<SourceEvent>>);

    impl SourceEventListener for RecordingListener {
        fn on_event(&self, event: &SourceEvent) {
            self.0.lock().expect("lock poisoned").push(event.clone());
        }
    }
}

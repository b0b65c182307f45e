//! Token-bucket rate limiting of forced refreshes.

use std::sync::{Arc, Mutex};

use time::{Duration, OffsetDateTime};

use super::{JWKSetSource, SourceError, SourceEvent, SourceEventListener, SourceHealth};
use crate::jwk::JWKSet;

#[derive(Debug)]
struct TokenBucket {
    capacity: u32,
    tokens: u32,
    refill_interval: Duration,
    last_refill: Option<OffsetDateTime>,
}

impl TokenBucket {
    fn try_take(&mut self, now: OffsetDateTime) -> bool {
        match self.last_refill {
            None => self.last_refill = Some(now),
            Some(last) => {
                let elapsed = now - last;
                if elapsed >= self.refill_interval {
                    let intervals =
                        elapsed.whole_seconds() / self.refill_interval.whole_seconds().max(1);
                    self.tokens = self
                        .capacity
                        .min(self.tokens.saturating_add(intervals.min(i64::from(u32::MAX)) as u32));
                    self.last_refill = Some(last + self.refill_interval * intervals as i32);
                }
            }
        }
        if self.tokens == 0 {
            return false;
        }
        self.tokens -= 1;
        true
    }
}

/// Limits *forced* refreshes to a budget per interval; ordinary reads pass
/// straight through. Over-limit forced calls fail with
/// [`SourceError::RateLimitReached`], which the caching layer above turns
/// back into the still-valid cached set when it has one.
pub struct RateLimitedJWKSetSource<S> {
    source: S,
    bucket: Mutex<TokenBucket>,
    listener: Arc<dyn SourceEventListener>,
}

impl<S: JWKSetSource> RateLimitedJWKSetSource<S> {
    pub fn new(
        source: S,
        bucket_size: u32,
        refill_interval: Duration,
        listener: Arc<dyn SourceEventListener>,
    ) -> Self {
        RateLimitedJWKSetSource {
            source,
            bucket: Mutex::new(TokenBucket {
                capacity: bucket_size,
                tokens: bucket_size,
                refill_interval,
                last_refill: None,
            }),
            listener,
        }
    }
}

impl<S: JWKSetSource> JWKSetSource for RateLimitedJWKSetSource<S> {
    fn jwk_set(
        &self,
        force_refresh: bool,
        now: OffsetDateTime,
    ) -> Result<Arc<JWKSet>, SourceError> {
        if force_refresh {
            let allowed = self.bucket.lock().expect("lock poisoned").try_take(now);
            if !allowed {
                tracing::debug!("forced JWK set refresh denied by rate limit");
                self.listener.on_event(&SourceEvent::RateLimited);
                return Err(SourceError::RateLimitReached);
            }
        }
        self.source.jwk_set(force_refresh, now)
    }

    fn health(&self, refresh: bool) -> Option<SourceHealth> {
        self.source.health(refresh)
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::{set_with_kids, RecordingListener, ScriptedSource};
    use super::*;

    fn at(seconds: i64) -> OffsetDateTime {
        OffsetDateTime::from_unix_timestamp(seconds).unwrap()
    }

    #[test]
    fn forced_refreshes_drain_the_bucket() {
        let listener = Arc::new(RecordingListener::default());
        let source = RateLimitedJWKSetSource::new(
            ScriptedSource::constant(set_with_kids(&["a"])),
            2,
            Duration::seconds(30),
            listener.clone(),
        );

        source.jwk_set(true, at(0)).unwrap();
        source.jwk_set(true, at(1)).unwrap();
        assert_eq!(
            source.jwk_set(true, at(2)).unwrap_err(),
            SourceError::RateLimitReached
        );
        assert_eq!(
            listener.0.lock().unwrap().as_slice(),
            &[SourceEvent::RateLimited]
        );
    }

    #[test]
    fn unforced_reads_are_never_limited() {
        let source = RateLimitedJWKSetSource::new(
            ScriptedSource::constant(set_with_kids(&["a"])),
            0,
            Duration::seconds(30),
            Arc::new(super::super::NoopListener),
        );
        for i in 0..10 {
            source.jwk_set(false, at(i)).unwrap();
        }
    }

    #[test]
    fn the_bucket_refills_over_time() {
        let source = RateLimitedJWKSetSource::new(
            ScriptedSource::constant(set_with_kids(&["a"])),
            1,
            Duration::seconds(30),
            Arc::new(super::super::NoopListener),
        );
        source.jwk_set(true, at(0)).unwrap();
        assert!(source.jwk_set(true, at(10)).is_err());
        source.jwk_set(true, at(31)).unwrap();
    }
}

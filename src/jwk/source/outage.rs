//! Outage tolerance: bridge transient upstream failures with the last
//! known set for a bounded time.

use std::sync::{Arc, Mutex};

use time::{Duration, OffsetDateTime};

use super::{JWKSetSource, SourceError, SourceEvent, SourceEventListener, SourceHealth};
use crate::jwk::JWKSet;

/// Serves the last successfully fetched set when the inner source reports
/// [`SourceError::Unavailable`] on an unforced read, for at most
/// `outage_ttl` after that fetch. Forced refreshes and fatal errors
/// propagate untouched.
pub struct OutageTolerantJWKSetSource<S> {
    source: S,
    outage_ttl: Duration,
    last_good: Mutex<Option<(Arc<JWKSet>, OffsetDateTime)>>,
    listener: Arc<dyn SourceEventListener>,
}

impl<S: JWKSetSource> OutageTolerantJWKSetSource<S> {
    pub fn new(
        source: S,
        outage_ttl: Duration,
        listener: Arc<dyn SourceEventListener>,
    ) -> Self {
        OutageTolerantJWKSetSource {
            source,
            outage_ttl,
            last_good: Mutex::new(None),
            listener,
        }
    }
}

impl<S: JWKSetSource> JWKSetSource for OutageTolerantJWKSetSource<S> {
    fn jwk_set(
        &self,
        force_refresh: bool,
        now: OffsetDateTime,
    ) -> Result<Arc<JWKSet>, SourceError> {
        match self.source.jwk_set(force_refresh, now) {
            Ok(set) => {
                *self.last_good.lock().expect("lock poisoned") = Some((Arc::clone(&set), now));
                Ok(set)
            }
            Err(SourceError::Unavailable(cause)) if !force_refresh => {
                let last_good = self.last_good.lock().expect("lock poisoned");
                match &*last_good {
                    Some((set, obtained_at)) if now <= *obtained_at + self.outage_ttl => {
                        let remaining = *obtained_at + self.outage_ttl - now;
                        tracing::warn!(
                            cause = %cause,
                            remaining_seconds = remaining.whole_seconds(),
                            "JWK set source outage, serving the last known set"
                        );
                        self.listener.on_event(&SourceEvent::Outage { remaining });
                        Ok(Arc::clone(set))
                    }
                    _ => Err(SourceError::Unavailable(cause)),
                }
            }
            Err(error) => Err(error),
        }
    }

    fn health(&self, refresh: bool) -> Option<SourceHealth> {
        self.source.health(refresh)
    }
}

//! Background refresh ahead of cache expiry.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, Weak};

use time::{Duration, OffsetDateTime};

use super::caching::CachingJWKSetSource;
use super::{JWKSetSource, SourceError, SourceEvent, SourceEventListener, SourceHealth};
use crate::jwk::JWKSet;

/// Wraps a caching source and, after every successful fetch, schedules a
/// background thread to force a refresh at `expires_at - refresh_ahead`.
/// Schedules are coalesced: a newer fetch supersedes an older pending
/// refresh, and the refresh itself goes through the cache's single-flight.
pub struct RefreshAheadJWKSetSource<S> {
    source: Arc<CachingJWKSetSource<S>>,
    refresh_ahead: Duration,
    generation: Arc<AtomicU64>,
    scheduled_for: Mutex<Option<OffsetDateTime>>,
    listener: Arc<dyn SourceEventListener>,
}

impl<S: JWKSetSource + 'static> RefreshAheadJWKSetSource<S> {
    pub fn new(
        source: Arc<CachingJWKSetSource<S>>,
        refresh_ahead: Duration,
        listener: Arc<dyn SourceEventListener>,
    ) -> Self {
        RefreshAheadJWKSetSource {
            source,
            refresh_ahead,
            generation: Arc::new(AtomicU64::new(0)),
            scheduled_for: Mutex::new(None),
            listener,
        }
    }

    fn schedule(&self, now: OffsetDateTime) {
        let Some(expires_at) = self.source.cache_expiry() else {
            return;
        };
        let refresh_at = expires_at - self.refresh_ahead;

        {
            let mut scheduled = self.scheduled_for.lock().expect("lock poisoned");
            if *scheduled == Some(refresh_at) {
                return;
            }
            *scheduled = Some(refresh_at);
        }

        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let generation_handle = Arc::clone(&self.generation);
        let source: Weak<CachingJWKSetSource<S>> = Arc::downgrade(&self.source);
        let listener = Arc::clone(&self.listener);
        let sleep = (refresh_at - now).max(Duration::ZERO);

        self.listener
            .on_event(&SourceEvent::RefreshScheduled { at: refresh_at });
        tracing::debug!(at = %refresh_at, "scheduled background JWK set refresh");

        std::thread::spawn(move || {
            std::thread::sleep(
                sleep
                    .try_into()
                    .unwrap_or(std::time::Duration::ZERO),
            );
            // superseded by a newer fetch, or the pipeline is gone
            if generation_handle.load(Ordering::SeqCst) != generation {
                return;
            }
            let Some(source) = source.upgrade() else {
                return;
            };
            match source.jwk_set(true, OffsetDateTime::now_utc()) {
                Ok(_) => listener.on_event(&SourceEvent::RefreshCompleted),
                Err(error) => {
                    tracing::warn!(error = %error, "background JWK set refresh failed");
                    listener.on_event(&SourceEvent::RefreshFailed);
                }
            }
        });
    }
}

impl<S: JWKSetSource + 'static> JWKSetSource for RefreshAheadJWKSetSource<S> {
    fn jwk_set(
        &self,
        force_refresh: bool,
        now: OffsetDateTime,
    ) -> Result<Arc<JWKSet>, SourceError> {
        let set = self.source.jwk_set(force_refresh, now)?;
        self.schedule(now);
        Ok(set)
    }

    fn health(&self, refresh: bool) -> Option<SourceHealth> {
        self.source.health(refresh)
    }
}

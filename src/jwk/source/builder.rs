//! Fluent assembly of the sourcing pipeline.

use std::sync::Arc;

use time::Duration;
use url::Url;

use super::{
    CachingJWKSetSource, FailoverJWKSource, JWKSetBasedJWKSource, JWKSetSource, JWKSource,
    NoopListener, OutageTolerantJWKSetSource, RateLimitedJWKSetSource, RefreshAheadJWKSetSource,
    SourceError, SourceEventListener, UrlJWKSetSource,
};

/// Timeouts and size cap of the HTTP retrieval.
#[derive(Debug, Clone, Copy)]
pub struct HttpConfig {
    pub connect_timeout: std::time::Duration,
    pub read_timeout: std::time::Duration,
    /// Maximum accepted response size in bytes
    pub size_limit: usize,
}

impl Default for HttpConfig {
    fn default() -> Self {
        HttpConfig {
            connect_timeout: std::time::Duration::from_millis(500),
            read_timeout: std::time::Duration::from_millis(500),
            size_limit: 50 * 1024,
        }
    }
}

/// Builds the decorator chain around a remote JWK set URL:
/// URL → outage tolerance → rate limiting → caching (+ refresh-ahead),
/// adapted into a [`JWKSource`], optionally with a failover source.
///
/// Defaults: 5 minute cache TTL with a 15 second refresh timeout, refresh
/// 30 seconds ahead of expiry, 2 forced refreshes per 30 seconds, no
/// outage tolerance, no failover.
pub struct JWKSourceBuilder {
    url: Url,
    http: HttpConfig,
    cache_ttl: Duration,
    refresh_timeout: std::time::Duration,
    refresh_ahead: Option<Duration>,
    rate_limit: Option<(u32, Duration)>,
    outage_ttl: Option<Duration>,
    listener: Arc<dyn SourceEventListener>,
    failover: Option<Arc<dyn JWKSource>>,
}

impl JWKSourceBuilder {
    pub fn new(url: Url) -> Self {
        JWKSourceBuilder {
            url,
            http: HttpConfig::default(),
            cache_ttl: Duration::minutes(5),
            refresh_timeout: std::time::Duration::from_secs(15),
            refresh_ahead: Some(Duration::seconds(30)),
            rate_limit: Some((2, Duration::seconds(30))),
            outage_ttl: None,
            listener: Arc::new(NoopListener),
            failover: None,
        }
    }

    /// HTTP timeouts and response size cap.
    pub fn http(mut self, http: HttpConfig) -> Self {
        self.http = http;
        self
    }

    /// Cache TTL and the maximum a caller waits on another thread's
    /// refresh.
    pub fn cache(mut self, ttl: Duration, refresh_timeout: std::time::Duration) -> Self {
        self.cache_ttl = ttl;
        self.refresh_timeout = refresh_timeout;
        self
    }

    /// How long before expiry the background refresh runs. `None`
    /// disables refresh-ahead.
    pub fn refresh_ahead(mut self, ahead: Option<Duration>) -> Self {
        self.refresh_ahead = ahead;
        self
    }

    /// Forced-refresh budget per interval. `None` disables rate limiting.
    pub fn rate_limited(mut self, limit: Option<(u32, Duration)>) -> Self {
        self.rate_limit = limit;
        self
    }

    /// Serve the last known set for up to `ttl` across transient outages.
    pub fn outage_tolerant(mut self, ttl: Duration) -> Self {
        self.outage_ttl = Some(ttl);
        self
    }

    /// Serve the last known set indefinitely across transient outages.
    pub fn outage_tolerant_forever(mut self) -> Self {
        self.outage_ttl = Some(Duration::seconds(i64::MAX / 2));
        self
    }

    /// Receive pipeline events.
    pub fn listener(mut self, listener: Arc<dyn SourceEventListener>) -> Self {
        self.listener = listener;
        self
    }

    /// Consult this source when the whole primary pipeline fails.
    pub fn fail_over(mut self, source: Arc<dyn JWKSource>) -> Self {
        self.failover = Some(source);
        self
    }

    /// Assemble the pipeline.
    pub fn build(self) -> Result<Arc<dyn JWKSource>, SourceError> {
        let url_source = UrlJWKSetSource::new(
            self.url,
            self.http.connect_timeout,
            self.http.read_timeout,
            self.http.size_limit,
        )?;

        let mut source: Box<dyn JWKSetSource> = Box::new(url_source);
        if let Some(outage_ttl) = self.outage_ttl {
            source = Box::new(OutageTolerantJWKSetSource::new(
                source,
                outage_ttl,
                Arc::clone(&self.listener),
            ));
        }
        if let Some((bucket_size, refill_interval)) = self.rate_limit {
            source = Box::new(RateLimitedJWKSetSource::new(
                source,
                bucket_size,
                refill_interval,
                Arc::clone(&self.listener),
            ));
        }

        let caching = Arc::new(CachingJWKSetSource::new(
            source,
            self.cache_ttl,
            self.refresh_timeout,
        ));
        let set_source: Box<dyn JWKSetSource> = match self.refresh_ahead {
            Some(ahead) => Box::new(RefreshAheadJWKSetSource::new(
                caching,
                ahead,
                Arc::clone(&self.listener),
            )),
            None => Box::new(caching),
        };

        let primary = JWKSetBasedJWKSource::new(set_source);
        Ok(match self.failover {
            Some(failover) => Arc::new(FailoverJWKSource::new(primary, failover)),
            None => Arc::new(primary),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_with_every_layer_enabled() {
        let source = JWKSourceBuilder::new("https://example.com/jwks.json".parse().unwrap())
            .cache(Duration::minutes(10), std::time::Duration::from_secs(5))
            .refresh_ahead(Some(Duration::minutes(1)))
            .rate_limited(Some((5, Duration::minutes(1))))
            .outage_tolerant(Duration::hours(1))
            .build()
            .unwrap();
        assert!(source.health(false).is_none());
    }

    #[test]
    fn builds_the_minimal_chain() {
        let failover = Arc::new(super::super::ImmutableJWKSet::new(
            super::super::test_support::set_with_kids(&["backup"]),
        ));
        let source = JWKSourceBuilder::new("https://example.com/jwks.json".parse().unwrap())
            .refresh_ahead(None)
            .rate_limited(None)
            .fail_over(failover)
            .build()
            .unwrap();

        // the primary URL is unreachable in tests; the failover serves
        let keys = source
            .get(&crate::jwk::JWKSelector::new(
                crate::jwk::JWKMatcher::new().key_id("backup"),
            ))
            .unwrap();
        assert_eq!(keys.len(), 1);
    }
}

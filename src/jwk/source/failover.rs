//! Failover between two assembled key sources.

use super::{JWKSource, SourceError, SourceHealth};
use crate::jwk::{JWKSelector, JWK};

/// Tries the primary source; on any failure, tries the failover. When both
/// fail the two causes are reported together as a single
/// [`SourceError::Remote`].
pub struct FailoverJWKSource<A, B> {
    primary: A,
    failover: B,
}

impl<A: JWKSource, B: JWKSource> FailoverJWKSource<A, B> {
    pub fn new(primary: A, failover: B) -> Self {
        FailoverJWKSource { primary, failover }
    }
}

impl<A: JWKSource, B: JWKSource> JWKSource for FailoverJWKSource<A, B> {
    fn get(&self, selector: &JWKSelector) -> Result<Vec<JWK>, SourceError> {
        let primary_error = match self.primary.get(selector) {
            Ok(keys) => return Ok(keys),
            Err(error) => error,
        };
        tracing::warn!(error = %primary_error, "primary JWK source failed, trying failover");
        match self.failover.get(selector) {
            Ok(keys) => Ok(keys),
            Err(failover_error) => Err(SourceError::Remote(format!(
                "primary failed ({primary_error}); failover failed ({failover_error})"
            ))),
        }
    }

    fn health(&self, refresh: bool) -> Option<SourceHealth> {
        self.primary.health(refresh)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::super::test_support::set_with_kids;
    use super::super::ImmutableJWKSet;
    use super::*;
    use crate::jwk::JWKMatcher;

    struct FailingSource {
        calls: AtomicUsize,
    }

    impl JWKSource for FailingSource {
        fn get(&self, _selector: &JWKSelector) -> Result<Vec<JWK>, SourceError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(SourceError::Unavailable("primary down".to_string()))
        }
    }

    fn selector() -> JWKSelector {
        JWKSelector::new(JWKMatcher::new().key_id("a"))
    }

    #[test]
    fn healthy_primary_is_preferred() {
        let source = FailoverJWKSource::new(
            ImmutableJWKSet::new(set_with_kids(&["a"])),
            ImmutableJWKSet::new(set_with_kids(&["b"])),
        );
        let keys = source.get(&selector()).unwrap();
        assert_eq!(keys[0].common.key_id.as_deref(), Some("a"));
    }

    #[test]
    fn failover_kicks_in_when_the_primary_fails() {
        let primary = FailingSource {
            calls: AtomicUsize::new(0),
        };
        let source =
            FailoverJWKSource::new(primary, ImmutableJWKSet::new(set_with_kids(&["a"])));
        let keys = source.get(&selector()).unwrap();
        assert_eq!(keys.len(), 1);
        assert_eq!(source.primary.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn both_failing_report_both_causes() {
        let source = FailoverJWKSource::new(
            FailingSource {
                calls: AtomicUsize::new(0),
            },
            FailingSource {
                calls: AtomicUsize::new(0),
            },
        );
        match source.get(&selector()) {
            Err(SourceError::Remote(message)) => {
                assert!(message.contains("primary failed"));
                assert!(message.contains("failover failed"));
            }
            other => panic!("expected a remote error, got {other:?}"),
        }
    }
}

//! A source over a fixed, in-memory JWK set. Never fails.

use std::sync::Arc;

use time::OffsetDateTime;

use super::{JWKSetSource, JWKSource, SourceError};
use crate::jwk::{JWKSelector, JWKSet, JWK};

/// Wraps a static JWK set, serving it both as a set source and as a
/// selector-driven key source.
#[derive(Debug, Clone)]
pub struct ImmutableJWKSet {
    set: Arc<JWKSet>,
}

impl ImmutableJWKSet {
    pub fn new(set: JWKSet) -> Self {
        ImmutableJWKSet { set: Arc::new(set) }
    }

    /// The wrapped set.
    pub fn jwks(&self) -> &JWKSet {
        &self.set
    }
}

impl JWKSetSource for ImmutableJWKSet {
    fn jwk_set(
        &self,
        _force_refresh: bool,
        _now: OffsetDateTime,
    ) -> Result<Arc<JWKSet>, SourceError> {
        Ok(Arc::clone(&self.set))
    }
}

impl JWKSource for ImmutableJWKSet {
    fn get(&self, selector: &JWKSelector) -> Result<Vec<JWK>, SourceError> {
        Ok(selector.select(&self.set))
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::set_with_kids;
    use super::*;
    use crate::jwk::JWKMatcher;

    #[test]
    fn selects_by_owner_key_id() {
        let source = ImmutableJWKSet::new(set_with_kids(&["123"]));

        let matches = source
            .get(&JWKSelector::new(JWKMatcher::new().key_id("123")))
            .unwrap();
        assert_eq!(matches.len(), 1);

        let matches = source
            .get(&JWKSelector::new(JWKMatcher::new().key_id("xxx")))
            .unwrap();
        assert!(matches.is_empty());
    }

    #[test]
    fn set_source_never_fails() {
        let source = ImmutableJWKSet::new(set_with_kids(&["a"]));
        let set = JWKSetSource::jwk_set(&source, true, OffsetDateTime::now_utc()).unwrap();
        assert_eq!(set.len(), 1);
    }
}

//! Predicate-based JWK selection.
//!
//! A [`JWKMatcher`] is built from any subset of key properties; a
//! [`JWKSelector`] runs one against a [`JWKSet`] and returns the matching
//! keys in set order.

use super::{JWKSet, KeyOperation, KeyType, PublicKeyUse, JWK};
use crate::jwa::Algorithm;
use crate::jwk::{AlgorithmParameters, EllipticCurve, OkpCurve};

/// A curve of either key family, as used in matching.
#[derive(Debug, Eq, PartialEq, Copy, Clone)]
pub enum Curve {
    /// An `EC` curve
    Ec(EllipticCurve),
    /// An `OKP` curve
    Okp(OkpCurve),
}

/// A predicate over JWKs. An empty matcher matches every key; each
/// constraint added narrows the match.
#[derive(Debug, Clone, Default)]
pub struct JWKMatcher {
    key_types: Option<Vec<KeyType>>,
    // `None` entries match keys that declare no `use` / no `key_ops`
    public_key_uses: Option<Vec<Option<PublicKeyUse>>>,
    key_operations: Option<Vec<Option<KeyOperation>>>,
    algorithms: Option<Vec<Algorithm>>,
    key_ids: Option<Vec<String>>,
    curves: Option<Vec<Curve>>,
    min_key_size_bits: Option<usize>,
    has_x509_sha1_fingerprint: Option<bool>,
    has_x509_chain: Option<bool>,
    private_only: bool,
    public_only: bool,
}

impl JWKMatcher {
    /// A matcher with no constraints.
    pub fn new() -> Self {
        Self::default()
    }

    /// Match only the given key type.
    pub fn key_type(mut self, kty: KeyType) -> Self {
        self.key_types.get_or_insert_with(Vec::new).push(kty);
        self
    }

    /// Match keys whose `use` is one of the given values; a `None` entry
    /// admits keys that declare no `use`.
    pub fn key_uses(mut self, uses: impl IntoIterator<Item = Option<PublicKeyUse>>) -> Self {
        self.public_key_uses = Some(uses.into_iter().collect());
        self
    }

    /// Match keys whose `key_ops` contains one of the given values; a
    /// `None` entry admits keys that declare no `key_ops`.
    pub fn key_operations(
        mut self,
        ops: impl IntoIterator<Item = Option<KeyOperation>>,
    ) -> Self {
        self.key_operations = Some(ops.into_iter().collect());
        self
    }

    /// Match keys whose `alg` is the given algorithm or absent.
    pub fn algorithm(mut self, alg: Algorithm) -> Self {
        self.algorithms.get_or_insert_with(Vec::new).push(alg);
        self
    }

    /// Match only the given key ID.
    pub fn key_id(mut self, kid: impl Into<String>) -> Self {
        self.key_ids.get_or_insert_with(Vec::new).push(kid.into());
        self
    }

    /// Match only the given curve.
    pub fn curve(mut self, curve: Curve) -> Self {
        self.curves.get_or_insert_with(Vec::new).push(curve);
        self
    }

    /// Match keys of at least the given size in bits.
    pub fn min_key_size(mut self, bits: usize) -> Self {
        self.min_key_size_bits = Some(bits);
        self
    }

    /// Match only keys that carry (or do not carry) an `x5t` member.
    pub fn has_x509_sha1_fingerprint(mut self, present: bool) -> Self {
        self.has_x509_sha1_fingerprint = Some(present);
        self
    }

    /// Match only keys that carry (or do not carry) an `x5c` member.
    pub fn has_x509_chain(mut self, present: bool) -> Self {
        self.has_x509_chain = Some(present);
        self
    }

    /// Match only keys with private material (symmetric keys included).
    pub fn private_only(mut self) -> Self {
        self.private_only = true;
        self
    }

    /// Match only keys without private material (symmetric keys excluded).
    pub fn public_only(mut self) -> Self {
        self.public_only = true;
        self
    }

    /// Whether the key satisfies every constraint of this matcher.
    pub fn matches(&self, jwk: &JWK) -> bool {
        if let Some(ktys) = &self.key_types {
            if !ktys.contains(&jwk.key_type()) {
                return false;
            }
        }
        if let Some(uses) = &self.public_key_uses {
            if !uses.contains(&jwk.common.public_key_use) {
                return false;
            }
        }
        if let Some(ops) = &self.key_operations {
            let matched = match &jwk.common.key_operations {
                None => ops.contains(&None),
                Some(declared) => declared
                    .iter()
                    .any(|op| ops.iter().any(|want| want.as_ref() == Some(op))),
            };
            if !matched {
                return false;
            }
        }
        if let Some(algs) = &self.algorithms {
            match jwk.common.algorithm {
                None => {}
                Some(alg) if algs.contains(&alg) => {}
                Some(_) => return false,
            }
        }
        if let Some(kids) = &self.key_ids {
            match &jwk.common.key_id {
                Some(kid) if kids.contains(kid) => {}
                _ => return false,
            }
        }
        if let Some(curves) = &self.curves {
            let curve = match &jwk.algorithm {
                AlgorithmParameters::EC(p) => Some(Curve::Ec(p.curve)),
                AlgorithmParameters::OctetKeyPair(p) => Some(Curve::Okp(p.curve)),
                _ => None,
            };
            match curve {
                Some(c) if curves.contains(&c) => {}
                _ => return false,
            }
        }
        if let Some(min) = self.min_key_size_bits {
            if jwk.key_size_bits() < min {
                return false;
            }
        }
        if let Some(want) = self.has_x509_sha1_fingerprint {
            if jwk.common.x509_sha1_fingerprint.is_some() != want {
                return false;
            }
        }
        if let Some(want) = self.has_x509_chain {
            if jwk.common.x509_chain.is_some() != want {
                return false;
            }
        }
        if self.private_only && !jwk.is_private() {
            return false;
        }
        if self.public_only && jwk.is_private() {
            return false;
        }
        true
    }
}

/// Runs a [`JWKMatcher`] against a set.
#[derive(Debug, Clone)]
pub struct JWKSelector {
    matcher: JWKMatcher,
}

impl JWKSelector {
    pub fn new(matcher: JWKMatcher) -> Self {
        Self { matcher }
    }

    /// The matcher this selector applies.
    pub fn matcher(&self) -> &JWKMatcher {
        &self.matcher
    }

    /// The ordered sublist of keys matching the predicate.
    pub fn select(&self, set: &JWKSet) -> Vec<JWK> {
        set.keys
            .iter()
            .filter(|jwk| self.matcher.matches(jwk))
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jwa::SignatureAlgorithm;
    use crate::jwk::CommonParameters;
    use std::collections::BTreeMap;

    fn oct(kid: &str, len: usize, use_: Option<PublicKeyUse>) -> JWK {
        JWK {
            common: CommonParameters {
                key_id: Some(kid.to_string()),
                public_key_use: use_,
                ..Default::default()
            },
            ..JWK::new_octet_key(&vec![0; len])
        }
    }

    fn set() -> JWKSet {
        JWKSet {
            keys: vec![
                oct("small", 16, Some(PublicKeyUse::Signature)),
                oct("big", 32, Some(PublicKeyUse::Encryption)),
                oct("bare", 32, None),
            ],
            additional: BTreeMap::new(),
        }
    }

    #[test]
    fn empty_matcher_matches_everything() {
        let selected = JWKSelector::new(JWKMatcher::new()).select(&set());
        assert_eq!(selected.len(), 3);
    }

    #[test]
    fn matches_by_kid_and_preserves_order() {
        let matcher = JWKMatcher::new().key_id("big").key_id("small");
        let selected = JWKSelector::new(matcher).select(&set());
        let kids: Vec<_> = selected
            .iter()
            .map(|k| k.common.key_id.clone().unwrap())
            .collect();
        assert_eq!(kids, ["small", "big"]);
    }

    #[test]
    fn use_constraint_with_none_entry_admits_undeclared() {
        let matcher =
            JWKMatcher::new().key_uses([Some(PublicKeyUse::Signature), None]);
        let selected = JWKSelector::new(matcher).select(&set());
        let kids: Vec<_> = selected
            .iter()
            .map(|k| k.common.key_id.clone().unwrap())
            .collect();
        assert_eq!(kids, ["small", "bare"]);
    }

    #[test]
    fn min_key_size_filters() {
        let matcher = JWKMatcher::new().min_key_size(256);
        let selected = JWKSelector::new(matcher).select(&set());
        assert_eq!(selected.len(), 2);
    }

    #[test]
    fn alg_constraint_admits_keys_without_alg() {
        let matcher = JWKMatcher::new().algorithm(crate::jwa::Algorithm::Signature(
            SignatureAlgorithm::HS256,
        ));
        let selected = JWKSelector::new(matcher).select(&set());
        assert_eq!(selected.len(), 3);
    }

    #[test]
    fn public_only_excludes_symmetric_keys() {
        let matcher = JWKMatcher::new().public_only();
        assert!(JWKSelector::new(matcher).select(&set()).is_empty());
    }
}

//! Known COSE header and key parameters.
//!
//! Entries are keyed by `(principal, label)`, where the principal is the value of the entry that
//! gives the rest of the map its meaning: the algorithm for header maps, the key type for key
//! maps. Both happen to live under label 1. A lookup tries the exact principal first and falls back
//! to the entry registered without one.
use edhoc_lens_shared::*;
use std::collections::HashMap;
use std::sync::OnceLock;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Label {
    Int(i64),
    Text(String),
}

impl core::fmt::Display for Label {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Label::Int(n) => write!(f, "{n}"),
            Label::Text(s) => write!(f, "{s:?}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ParamKey {
    pub principal: Option<i64>,
    pub label: Label,
}

/// How the value of a parameter is shown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamDecoder {
    /// Algorithm code point (or text name).
    Algorithm,
    /// Array of header labels.
    CriticalList,
    /// CoAP content format number or media type string.
    ContentType,
    Bytes,
    Text,
    /// One certificate as a byte string, or an array of them.
    CertificateChain,
    /// `[hash algorithm, hash value]`
    Thumbprint,
    KeyType,
    Curve,
    KeyOps,
    /// A COSE_Key map, decoded with the key parameter registry.
    CoseKey,
    /// Whatever CBOR is there.
    Generic,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParamSpec {
    pub name: &'static str,
    pub decoder: ParamDecoder,
}

#[derive(Debug, Default)]
pub struct Registry {
    entries: HashMap<ParamKey, ParamSpec>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an entry. Registering the same key twice with a different meaning is a programming
    /// error.
    pub fn register(&mut self, principal: Option<i64>, label: Label, spec: ParamSpec) {
        let previous = self.entries.insert(ParamKey { principal, label }, spec);
        debug_assert!(
            previous.is_none() || previous == Some(spec),
            "conflicting registration for {}",
            spec.name
        );
    }

    pub fn lookup(&self, principal: Option<i64>, label: &Label) -> Option<&ParamSpec> {
        let mut key = ParamKey {
            principal,
            label: label.clone(),
        };
        if principal.is_some() {
            if let Some(spec) = self.entries.get(&key) {
                return Some(spec);
            }
            key.principal = None;
        }
        self.entries.get(&key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Registries for COSE header maps and COSE_Key maps.
#[derive(Debug)]
pub struct Registries {
    pub headers: Registry,
    pub keys: Registry,
}

static REGISTRIES: OnceLock<Registries> = OnceLock::new();

const fn spec(name: &'static str, decoder: ParamDecoder) -> ParamSpec {
    ParamSpec { name, decoder }
}

impl Registries {
    /// The built-in registries, created on first use and shared process-wide.
    pub fn global() -> &'static Registries {
        REGISTRIES.get_or_init(Registries::builtin)
    }

    pub fn builtin() -> Registries {
        use ParamDecoder::*;

        let mut headers = Registry::new();
        for (label, entry) in [
            (HEADER_ALG, spec("alg", Algorithm)),
            (HEADER_CRIT, spec("crit", CriticalList)),
            (HEADER_CONTENT_TYPE, spec("content type", ContentType)),
            (HEADER_KID, spec("kid", Bytes)),
            (HEADER_IV, spec("IV", Bytes)),
            (HEADER_PARTIAL_IV, spec("Partial IV", Bytes)),
            (HEADER_KCWT, spec("kcwt", Generic)),
            (HEADER_KCCS, spec("kccs", Generic)),
            (HEADER_X5BAG, spec("x5bag", CertificateChain)),
            (HEADER_X5CHAIN, spec("x5chain", CertificateChain)),
            (HEADER_X5T, spec("x5t", Thumbprint)),
            (HEADER_X5U, spec("x5u", Text)),
        ] {
            headers.register(None, Label::Int(label), entry);
        }
        // RFC 9053, Section 6.3.1 and 6.4
        for alg in (-34..=-25).chain(-13..=-10) {
            for (label, entry) in [
                (-20, spec("salt", Bytes)),
                (-21, spec("PartyU identity", Bytes)),
                (-22, spec("PartyU nonce", Generic)),
                (-23, spec("PartyU other", Bytes)),
                (-24, spec("PartyV identity", Bytes)),
                (-25, spec("PartyV nonce", Generic)),
                (-26, spec("PartyV other", Bytes)),
            ] {
                headers.register(Some(alg), Label::Int(label), entry);
            }
        }
        for alg in -34..=-25 {
            for (label, entry) in [
                (-1, spec("ephemeral key", CoseKey)),
                (-2, spec("static key", CoseKey)),
                (-3, spec("static key id", Bytes)),
            ] {
                headers.register(Some(alg), Label::Int(label), entry);
            }
        }

        let mut keys = Registry::new();
        for (label, entry) in [
            (KEY_KTY, spec("kty", KeyType)),
            (KEY_KID, spec("kid", Bytes)),
            (KEY_ALG, spec("alg", Algorithm)),
            (KEY_OPS, spec("key_ops", KeyOps)),
            (KEY_BASE_IV, spec("Base IV", Bytes)),
        ] {
            keys.register(None, Label::Int(label), entry);
        }
        let okp = edhoc_lens_shared::KeyType::Okp.code();
        let ec2 = edhoc_lens_shared::KeyType::Ec2.code();
        let rsa = edhoc_lens_shared::KeyType::Rsa.code();
        let symmetric = edhoc_lens_shared::KeyType::Symmetric.code();
        for (kty, label, entry) in [
            (okp, -1, spec("crv", Curve)),
            (okp, -2, spec("x", Bytes)),
            (okp, -4, spec("d", Bytes)),
            (ec2, -1, spec("crv", Curve)),
            (ec2, -2, spec("x", Bytes)),
            // y is either the coordinate or a sign bit
            (ec2, -3, spec("y", Generic)),
            (ec2, -4, spec("d", Bytes)),
            (rsa, -1, spec("n", Bytes)),
            (rsa, -2, spec("e", Bytes)),
            (symmetric, -1, spec("k", Bytes)),
        ] {
            keys.register(Some(kty), Label::Int(label), entry);
        }

        Registries { headers, keys }
    }
}

#[cfg(test)]
mod test_registry {
    use super::*;
    use rstest::rstest;

    #[test]
    fn test_exact_match_wins() {
        let mut registry = Registry::new();
        registry.register(None, Label::Int(-1), spec("generic", ParamDecoder::Generic));
        registry.register(Some(2), Label::Int(-1), spec("crv", ParamDecoder::Curve));

        assert_eq!("crv", registry.lookup(Some(2), &Label::Int(-1)).unwrap().name);
        assert_eq!("generic", registry.lookup(Some(3), &Label::Int(-1)).unwrap().name);
        assert_eq!("generic", registry.lookup(None, &Label::Int(-1)).unwrap().name);
        assert!(registry.lookup(Some(2), &Label::Int(-2)).is_none());
        assert!(registry.lookup(None, &Label::Text("-1".into())).is_none());
    }

    #[rstest]
    #[case(Some(2), -3, Some("y"))]
    #[case(Some(1), -3, None)]
    #[case(Some(1), -1, Some("crv"))]
    #[case(Some(4), -1, Some("k"))]
    #[case(None, -1, None)]
    #[case(Some(2), 1, Some("kty"))]
    fn test_builtin_key_parameters(
        #[case] kty: Option<i64>,
        #[case] label: i64,
        #[case] expected: Option<&str>,
    ) {
        let keys = &Registries::global().keys;
        assert_eq!(
            expected,
            keys.lookup(kty, &Label::Int(label)).map(|spec| spec.name)
        );
    }

    #[rstest]
    #[case(Some(-25), -1, Some("ephemeral key"))]
    #[case(Some(-10), -1, None)]
    #[case(Some(-10), -20, Some("salt"))]
    #[case(Some(10), 4, Some("kid"))]
    #[case(Some(10), -1, None)]
    #[case(None, 33, Some("x5chain"))]
    fn test_builtin_header_parameters(
        #[case] alg: Option<i64>,
        #[case] label: i64,
        #[case] expected: Option<&str>,
    ) {
        let headers = &Registries::global().headers;
        assert_eq!(
            expected,
            headers.lookup(alg, &Label::Int(label)).map(|spec| spec.name)
        );
    }

    #[test]
    #[cfg(debug_assertions)]
    #[should_panic(expected = "conflicting registration")]
    fn test_conflicting_registration() {
        let mut registry = Registry::new();
        registry.register(None, Label::Int(1), spec("alg", ParamDecoder::Algorithm));
        registry.register(None, Label::Int(1), spec("other", ParamDecoder::Bytes));
    }
}

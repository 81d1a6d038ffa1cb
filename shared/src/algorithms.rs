//! Property tables for the COSE algorithms, curves and key types this crate knows about.
//!
//! Code points are from the IANA COSE registries.

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HashAlgorithm {
    Sha256,
    Sha384,
    Sha512,
    Shake256,
}

impl HashAlgorithm {
    pub const fn code(self) -> i64 {
        match self {
            HashAlgorithm::Sha256 => -16,
            HashAlgorithm::Sha384 => -43,
            HashAlgorithm::Sha512 => -44,
            HashAlgorithm::Shake256 => -45,
        }
    }

    pub const fn from_code(code: i64) -> Option<Self> {
        match code {
            -16 => Some(HashAlgorithm::Sha256),
            -43 => Some(HashAlgorithm::Sha384),
            -44 => Some(HashAlgorithm::Sha512),
            -45 => Some(HashAlgorithm::Shake256),
            _ => None,
        }
    }

    /// Output length in bytes. For SHAKE256 this is the length EDHOC uses.
    pub const fn output_len(self) -> usize {
        match self {
            HashAlgorithm::Sha256 => 32,
            HashAlgorithm::Sha384 => 48,
            HashAlgorithm::Sha512 => 64,
            HashAlgorithm::Shake256 => 64,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AeadAlgorithm {
    A128Gcm,
    A192Gcm,
    A256Gcm,
    AesCcm16_64_128,
    AesCcm16_64_256,
    AesCcm64_64_128,
    AesCcm64_64_256,
    AesCcm16_128_128,
    AesCcm16_128_256,
    AesCcm64_128_128,
    AesCcm64_128_256,
    ChaCha20Poly1305,
}

impl AeadAlgorithm {
    pub const ALL: [AeadAlgorithm; 12] = [
        AeadAlgorithm::A128Gcm,
        AeadAlgorithm::A192Gcm,
        AeadAlgorithm::A256Gcm,
        AeadAlgorithm::AesCcm16_64_128,
        AeadAlgorithm::AesCcm16_64_256,
        AeadAlgorithm::AesCcm64_64_128,
        AeadAlgorithm::AesCcm64_64_256,
        AeadAlgorithm::AesCcm16_128_128,
        AeadAlgorithm::AesCcm16_128_256,
        AeadAlgorithm::AesCcm64_128_128,
        AeadAlgorithm::AesCcm64_128_256,
        AeadAlgorithm::ChaCha20Poly1305,
    ];

    pub const fn code(self) -> i64 {
        match self {
            AeadAlgorithm::A128Gcm => 1,
            AeadAlgorithm::A192Gcm => 2,
            AeadAlgorithm::A256Gcm => 3,
            AeadAlgorithm::AesCcm16_64_128 => 10,
            AeadAlgorithm::AesCcm16_64_256 => 11,
            AeadAlgorithm::AesCcm64_64_128 => 12,
            AeadAlgorithm::AesCcm64_64_256 => 13,
            AeadAlgorithm::ChaCha20Poly1305 => 24,
            AeadAlgorithm::AesCcm16_128_128 => 30,
            AeadAlgorithm::AesCcm16_128_256 => 31,
            AeadAlgorithm::AesCcm64_128_128 => 32,
            AeadAlgorithm::AesCcm64_128_256 => 33,
        }
    }

    pub fn from_code(code: i64) -> Option<Self> {
        Self::ALL.into_iter().find(|alg| alg.code() == code)
    }

    pub const fn key_len(self) -> usize {
        match self {
            AeadAlgorithm::A128Gcm
            | AeadAlgorithm::AesCcm16_64_128
            | AeadAlgorithm::AesCcm64_64_128
            | AeadAlgorithm::AesCcm16_128_128
            | AeadAlgorithm::AesCcm64_128_128 => 16,
            AeadAlgorithm::A192Gcm => 24,
            AeadAlgorithm::A256Gcm
            | AeadAlgorithm::AesCcm16_64_256
            | AeadAlgorithm::AesCcm64_64_256
            | AeadAlgorithm::AesCcm16_128_256
            | AeadAlgorithm::AesCcm64_128_256
            | AeadAlgorithm::ChaCha20Poly1305 => 32,
        }
    }

    /// Nonce length. For CCM it is 15 minus the size of the length field (16 or 64 bits).
    pub const fn iv_len(self) -> usize {
        match self {
            AeadAlgorithm::A128Gcm
            | AeadAlgorithm::A192Gcm
            | AeadAlgorithm::A256Gcm
            | AeadAlgorithm::ChaCha20Poly1305 => 12,
            AeadAlgorithm::AesCcm16_64_128
            | AeadAlgorithm::AesCcm16_64_256
            | AeadAlgorithm::AesCcm16_128_128
            | AeadAlgorithm::AesCcm16_128_256 => 13,
            AeadAlgorithm::AesCcm64_64_128
            | AeadAlgorithm::AesCcm64_64_256
            | AeadAlgorithm::AesCcm64_128_128
            | AeadAlgorithm::AesCcm64_128_256 => 7,
        }
    }

    pub const fn tag_len(self) -> usize {
        match self {
            AeadAlgorithm::AesCcm16_64_128
            | AeadAlgorithm::AesCcm16_64_256
            | AeadAlgorithm::AesCcm64_64_128
            | AeadAlgorithm::AesCcm64_64_256 => 8,
            _ => 16,
        }
    }
}

/// Elliptic curves from the COSE Elliptic Curves registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Curve {
    P256,
    P384,
    P521,
    X25519,
    X448,
    Ed25519,
    Ed448,
}

impl Curve {
    pub const fn code(self) -> i64 {
        match self {
            Curve::P256 => 1,
            Curve::P384 => 2,
            Curve::P521 => 3,
            Curve::X25519 => 4,
            Curve::X448 => 5,
            Curve::Ed25519 => 6,
            Curve::Ed448 => 7,
        }
    }

    pub const fn from_code(code: i64) -> Option<Self> {
        match code {
            1 => Some(Curve::P256),
            2 => Some(Curve::P384),
            3 => Some(Curve::P521),
            4 => Some(Curve::X25519),
            5 => Some(Curve::X448),
            6 => Some(Curve::Ed25519),
            7 => Some(Curve::Ed448),
            _ => None,
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            Curve::P256 => "P-256",
            Curve::P384 => "P-384",
            Curve::P521 => "P-521",
            Curve::X25519 => "X25519",
            Curve::X448 => "X448",
            Curve::Ed25519 => "Ed25519",
            Curve::Ed448 => "Ed448",
        }
    }

    /// Length of an ephemeral public key as EDHOC carries it (x-coordinate only for EC2 curves).
    pub const fn public_key_len(self) -> usize {
        match self {
            Curve::P256 | Curve::X25519 | Curve::Ed25519 => 32,
            Curve::P384 => 48,
            Curve::P521 => 66,
            Curve::X448 => 56,
            Curve::Ed448 => 57,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyType {
    Okp,
    Ec2,
    Rsa,
    Symmetric,
    HssLms,
    WalnutDsa,
}

impl KeyType {
    pub const fn code(self) -> i64 {
        match self {
            KeyType::Okp => 1,
            KeyType::Ec2 => 2,
            KeyType::Rsa => 3,
            KeyType::Symmetric => 4,
            KeyType::HssLms => 5,
            KeyType::WalnutDsa => 6,
        }
    }

    pub const fn from_code(code: i64) -> Option<Self> {
        match code {
            1 => Some(KeyType::Okp),
            2 => Some(KeyType::Ec2),
            3 => Some(KeyType::Rsa),
            4 => Some(KeyType::Symmetric),
            5 => Some(KeyType::HssLms),
            6 => Some(KeyType::WalnutDsa),
            _ => None,
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            KeyType::Okp => "OKP",
            KeyType::Ec2 => "EC2",
            KeyType::Rsa => "RSA",
            KeyType::Symmetric => "Symmetric",
            KeyType::HssLms => "HSS-LMS",
            KeyType::WalnutDsa => "WalnutDSA",
        }
    }
}

const ALGORITHM_NAMES: &[(i64, &str)] = &[
    (-259, "RS512"),
    (-258, "RS384"),
    (-257, "RS256"),
    (-47, "ES256K"),
    (-46, "HSS-LMS"),
    (-45, "SHAKE256"),
    (-44, "SHA-512"),
    (-43, "SHA-384"),
    (-42, "RSAES-OAEP w/ SHA-512"),
    (-41, "RSAES-OAEP w/ SHA-256"),
    (-40, "RSAES-OAEP w/ RFC 8017 default parameters"),
    (-39, "PS512"),
    (-38, "PS384"),
    (-37, "PS256"),
    (-36, "ES512"),
    (-35, "ES384"),
    (-34, "ECDH-SS + A256KW"),
    (-33, "ECDH-SS + A192KW"),
    (-32, "ECDH-SS + A128KW"),
    (-31, "ECDH-ES + A256KW"),
    (-30, "ECDH-ES + A192KW"),
    (-29, "ECDH-ES + A128KW"),
    (-28, "ECDH-SS + HKDF-512"),
    (-27, "ECDH-SS + HKDF-256"),
    (-26, "ECDH-ES + HKDF-512"),
    (-25, "ECDH-ES + HKDF-256"),
    (-18, "SHAKE128"),
    (-17, "SHA-512/256"),
    (-16, "SHA-256"),
    (-15, "SHA-256/64"),
    (-14, "SHA-1"),
    (-13, "direct+HKDF-AES-256"),
    (-12, "direct+HKDF-AES-128"),
    (-11, "direct+HKDF-SHA-512"),
    (-10, "direct+HKDF-SHA-256"),
    (-8, "EdDSA"),
    (-7, "ES256"),
    (-6, "direct"),
    (-5, "A256KW"),
    (-4, "A192KW"),
    (-3, "A128KW"),
    (1, "A128GCM"),
    (2, "A192GCM"),
    (3, "A256GCM"),
    (4, "HMAC 256/64"),
    (5, "HMAC 256/256"),
    (6, "HMAC 384/384"),
    (7, "HMAC 512/512"),
    (10, "AES-CCM-16-64-128"),
    (11, "AES-CCM-16-64-256"),
    (12, "AES-CCM-64-64-128"),
    (13, "AES-CCM-64-64-256"),
    (14, "AES-MAC 128/64"),
    (15, "AES-MAC 256/64"),
    (24, "ChaCha20/Poly1305"),
    (25, "AES-MAC 128/128"),
    (26, "AES-MAC 256/128"),
    (30, "AES-CCM-16-128-128"),
    (31, "AES-CCM-16-128-256"),
    (32, "AES-CCM-64-128-128"),
    (33, "AES-CCM-64-128-256"),
];

/// Name of a COSE algorithm code point.
pub fn algorithm_name(code: i64) -> Option<&'static str> {
    ALGORITHM_NAMES
        .iter()
        .find(|(c, _)| *c == code)
        .map(|(_, name)| *name)
}

/// Name of a COSE key operation (`key_ops` entry).
pub fn key_operation_name(code: i64) -> Option<&'static str> {
    match code {
        1 => Some("sign"),
        2 => Some("verify"),
        3 => Some("encrypt"),
        4 => Some("decrypt"),
        5 => Some("wrap key"),
        6 => Some("unwrap key"),
        7 => Some("derive key"),
        8 => Some("derive bits"),
        9 => Some("MAC create"),
        10 => Some("MAC verify"),
        _ => None,
    }
}

/// ECDH-ES and ECDH-SS key agreement algorithms, with HKDF or key wrap.
pub const fn is_ecdh(code: i64) -> bool {
    matches!(code, -34..=-25)
}

/// The static-static subset of [`is_ecdh`].
pub const fn is_ecdh_static(code: i64) -> bool {
    matches!(code, -28 | -27 | -34 | -33 | -32)
}

/// Direct key agreement with HKDF, which carries the same context parameters as ECDH + HKDF.
pub const fn is_direct_hkdf(code: i64) -> bool {
    matches!(code, -13..=-10)
}

#[cfg(test)]
mod test_algorithms {
    use super::*;
    use rstest::rstest;

    #[test]
    fn test_sha256_output_len() {
        assert_eq!(32, HashAlgorithm::from_code(-16).unwrap().output_len());
    }

    #[test]
    fn test_ccm_16_64_128_sizes() {
        let alg = AeadAlgorithm::from_code(10).unwrap();
        assert_eq!(16, alg.key_len());
        assert_eq!(13, alg.iv_len());
        assert_eq!(8, alg.tag_len());
    }

    #[rstest]
    #[case(1, 16, 12, 16)]
    #[case(3, 32, 12, 16)]
    #[case(12, 16, 7, 8)]
    #[case(24, 32, 12, 16)]
    #[case(33, 32, 7, 16)]
    fn test_aead_table(
        #[case] code: i64,
        #[case] key_len: usize,
        #[case] iv_len: usize,
        #[case] tag_len: usize,
    ) {
        let alg = AeadAlgorithm::from_code(code).unwrap();
        assert_eq!(code, alg.code());
        assert_eq!((key_len, iv_len, tag_len), (alg.key_len(), alg.iv_len(), alg.tag_len()));
    }

    #[test]
    fn test_unknown_codes() {
        assert_eq!(None, AeadAlgorithm::from_code(-7));
        assert_eq!(None, HashAlgorithm::from_code(10));
        assert_eq!(None, algorithm_name(9999));
        assert_eq!(Some("ES256"), algorithm_name(-7));
    }

    #[test]
    fn test_public_key_lengths() {
        assert_eq!(32, Curve::P256.public_key_len());
        assert_eq!(56, Curve::from_code(5).unwrap().public_key_len());
    }
}

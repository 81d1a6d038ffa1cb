use crate::algorithms::{AeadAlgorithm, Curve, HashAlgorithm};

/// EDHOC authentication method: which party authenticates with a signature key and which with a
/// static Diffie-Hellman key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EDHOCMethod {
    SigSig = 0,
    SigStat = 1,
    StatSig = 2,
    StatStat = 3,
}

impl EDHOCMethod {
    pub const fn from_u64(method: u64) -> Option<Self> {
        match method {
            0 => Some(EDHOCMethod::SigSig),
            1 => Some(EDHOCMethod::SigStat),
            2 => Some(EDHOCMethod::StatSig),
            3 => Some(EDHOCMethod::StatStat),
            _ => None,
        }
    }

    pub const fn initiator_static_dh(self) -> bool {
        matches!(self, EDHOCMethod::StatSig | EDHOCMethod::StatStat)
    }

    pub const fn responder_static_dh(self) -> bool {
        matches!(self, EDHOCMethod::SigStat | EDHOCMethod::StatStat)
    }

    pub const fn name(self) -> &'static str {
        match self {
            EDHOCMethod::SigSig => "Signature Key / Signature Key",
            EDHOCMethod::SigStat => "Signature Key / Static DH Key",
            EDHOCMethod::StatSig => "Static DH Key / Signature Key",
            EDHOCMethod::StatStat => "Static DH Key / Static DH Key",
        }
    }
}

impl From<EDHOCMethod> for u8 {
    fn from(method: EDHOCMethod) -> u8 {
        method as u8
    }
}

/// Algorithms selected by one EDHOC cipher suite.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CipherSuite {
    pub id: u8,
    pub edhoc_aead: AeadAlgorithm,
    pub edhoc_hash: HashAlgorithm,
    pub mac_length: usize,
    pub curve: Curve,
    pub signature: i64,
    pub app_aead: AeadAlgorithm,
    pub app_hash: HashAlgorithm,
}

pub static CIPHER_SUITES: [CipherSuite; 9] = [
    CipherSuite {
        id: 0,
        edhoc_aead: AeadAlgorithm::AesCcm16_64_128,
        edhoc_hash: HashAlgorithm::Sha256,
        mac_length: 8,
        curve: Curve::X25519,
        signature: -8,
        app_aead: AeadAlgorithm::AesCcm16_64_128,
        app_hash: HashAlgorithm::Sha256,
    },
    CipherSuite {
        id: 1,
        edhoc_aead: AeadAlgorithm::AesCcm16_128_128,
        edhoc_hash: HashAlgorithm::Sha256,
        mac_length: 16,
        curve: Curve::X25519,
        signature: -8,
        app_aead: AeadAlgorithm::AesCcm16_64_128,
        app_hash: HashAlgorithm::Sha256,
    },
    CipherSuite {
        id: 2,
        edhoc_aead: AeadAlgorithm::AesCcm16_64_128,
        edhoc_hash: HashAlgorithm::Sha256,
        mac_length: 8,
        curve: Curve::P256,
        signature: -7,
        app_aead: AeadAlgorithm::AesCcm16_64_128,
        app_hash: HashAlgorithm::Sha256,
    },
    CipherSuite {
        id: 3,
        edhoc_aead: AeadAlgorithm::AesCcm16_128_128,
        edhoc_hash: HashAlgorithm::Sha256,
        mac_length: 16,
        curve: Curve::P256,
        signature: -7,
        app_aead: AeadAlgorithm::AesCcm16_64_128,
        app_hash: HashAlgorithm::Sha256,
    },
    CipherSuite {
        id: 4,
        edhoc_aead: AeadAlgorithm::ChaCha20Poly1305,
        edhoc_hash: HashAlgorithm::Sha256,
        mac_length: 16,
        curve: Curve::X25519,
        signature: -8,
        app_aead: AeadAlgorithm::ChaCha20Poly1305,
        app_hash: HashAlgorithm::Sha256,
    },
    CipherSuite {
        id: 5,
        edhoc_aead: AeadAlgorithm::ChaCha20Poly1305,
        edhoc_hash: HashAlgorithm::Sha256,
        mac_length: 16,
        curve: Curve::P256,
        signature: -7,
        app_aead: AeadAlgorithm::ChaCha20Poly1305,
        app_hash: HashAlgorithm::Sha256,
    },
    CipherSuite {
        id: 6,
        edhoc_aead: AeadAlgorithm::A128Gcm,
        edhoc_hash: HashAlgorithm::Sha256,
        mac_length: 16,
        curve: Curve::X25519,
        signature: -7,
        app_aead: AeadAlgorithm::A128Gcm,
        app_hash: HashAlgorithm::Sha256,
    },
    CipherSuite {
        id: 24,
        edhoc_aead: AeadAlgorithm::A256Gcm,
        edhoc_hash: HashAlgorithm::Sha384,
        mac_length: 16,
        curve: Curve::P384,
        signature: -35,
        app_aead: AeadAlgorithm::A256Gcm,
        app_hash: HashAlgorithm::Sha384,
    },
    CipherSuite {
        id: 25,
        edhoc_aead: AeadAlgorithm::ChaCha20Poly1305,
        edhoc_hash: HashAlgorithm::Shake256,
        mac_length: 16,
        curve: Curve::X448,
        signature: -8,
        app_aead: AeadAlgorithm::ChaCha20Poly1305,
        app_hash: HashAlgorithm::Shake256,
    },
];

/// Look up a registered cipher suite. Private-use suites (-24, -23, -22) are not known.
pub fn cipher_suite(id: i64) -> Option<&'static CipherSuite> {
    CIPHER_SUITES.iter().find(|suite| suite.id as i64 == id)
}

/// ERR_CODE values of EDHOC error messages.
pub fn error_code_name(code: i64) -> Option<&'static str> {
    match code {
        0 => Some("Success"),
        1 => Some("Unspecified Error"),
        2 => Some("Wrong Selected Cipher Suite"),
        3 => Some("Unknown Credential Referenced"),
        _ => None,
    }
}

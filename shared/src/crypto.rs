//! Cryptography trait back-end for the edhoc-lens-crypto crate

use crate::algorithms::{AeadAlgorithm, HashAlgorithm};
use crate::error::CryptoError;

/// Interface between the decoder and any implementations of the required crypto primitives.
///
/// Only the primitives needed to follow a captured handshake are part of it: hashing, HKDF and
/// AEAD. Key agreement never happens here, the results of it are supplied as secrets.
///
/// The crypto trait itself operates on an exclusive reference, which is useful for the hardware
/// implementations that can only perform a single operation at a time.
pub trait Crypto: core::fmt::Debug {
    /// Returns the list of cipher suites whose EDHOC algorithms the back-end implements.
    fn supported_suites(&self) -> Vec<u8>;
    fn hash(&mut self, alg: HashAlgorithm, message: &[u8]) -> Result<Vec<u8>, CryptoError>;
    /// HKDF-Expand. `prk` must be at least as long as the hash output.
    fn hkdf_expand(
        &mut self,
        alg: HashAlgorithm,
        prk: &[u8],
        info: &[u8],
        result: &mut [u8],
    ) -> Result<(), CryptoError>;
    fn hkdf_extract(
        &mut self,
        alg: HashAlgorithm,
        salt: &[u8],
        ikm: &[u8],
    ) -> Result<Vec<u8>, CryptoError>;
    /// Encrypt and append the tag.
    fn aead_encrypt(
        &mut self,
        alg: AeadAlgorithm,
        key: &[u8],
        iv: &[u8],
        ad: &[u8],
        plaintext: &[u8],
    ) -> Result<Vec<u8>, CryptoError>;
    /// Verify the trailing tag, then return the plaintext. Nothing is returned on mismatch.
    fn aead_decrypt(
        &mut self,
        alg: AeadAlgorithm,
        key: &[u8],
        iv: &[u8],
        ad: &[u8],
        ciphertext: &[u8],
    ) -> Result<Vec<u8>, CryptoError>;
}

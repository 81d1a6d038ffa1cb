//! COSE_Encrypt0 style authenticated encryption as used by message_3 and message_4.
use crate::key_schedule::{compute_k_3_iv_3, compute_k_4_iv_4, crypto_error};
use defmt_or_log::trace;
use edhoc_lens_shared::{Crypto as CryptoTrait, *};

fn check_lengths(alg: AeadAlgorithm, key: &[u8], iv: &[u8]) -> Result<(), DissectError> {
    if key.len() != alg.key_len() {
        return Err(DissectError::InvalidLength(key.len()));
    }
    if iv.len() != alg.iv_len() {
        return Err(DissectError::InvalidLength(iv.len()));
    }
    Ok(())
}

/// Decrypt `ciphertext` (with its trailing tag) under `Enc_structure = ["Encrypt0", h'',
/// external_aad]`.
///
/// The plaintext is only returned after the tag checked out; any failure yields no output at all.
pub fn decrypt(
    crypto: &mut impl CryptoTrait,
    alg: AeadAlgorithm,
    key: &[u8],
    iv: &[u8],
    external_aad: &[u8],
    ciphertext: &[u8],
) -> Result<Vec<u8>, DissectError> {
    check_lengths(alg, key, iv)?;
    if ciphertext.len() < alg.tag_len() {
        return Err(DissectError::AuthenticationFailed);
    }
    let enc_structure = encode_enc_structure(external_aad);
    crypto
        .aead_decrypt(alg, key, iv, &enc_structure, ciphertext)
        .map_err(|e| crypto_error(e, alg.code(), ciphertext.len()))
}

pub fn encrypt(
    crypto: &mut impl CryptoTrait,
    alg: AeadAlgorithm,
    key: &[u8],
    iv: &[u8],
    external_aad: &[u8],
    plaintext: &[u8],
) -> Result<Vec<u8>, DissectError> {
    check_lengths(alg, key, iv)?;
    let enc_structure = encode_enc_structure(external_aad);
    crypto
        .aead_encrypt(alg, key, iv, &enc_structure, plaintext)
        .map_err(|e| crypto_error(e, alg.code(), plaintext.len()))
}

pub fn decrypt_message_3(
    crypto: &mut impl CryptoTrait,
    suite: &CipherSuite,
    prk_3e2m: &[u8],
    th_3: &[u8],
    ciphertext_3: &[u8],
) -> Result<Vec<u8>, DissectError> {
    trace!("Enter decrypt_message_3");
    let (k_3, iv_3) = compute_k_3_iv_3(crypto, suite, prk_3e2m, th_3)?;
    decrypt(crypto, suite.edhoc_aead, &k_3, &iv_3, th_3, ciphertext_3)
}

pub fn encrypt_message_3(
    crypto: &mut impl CryptoTrait,
    suite: &CipherSuite,
    prk_3e2m: &[u8],
    th_3: &[u8],
    plaintext_3: &[u8],
) -> Result<Vec<u8>, DissectError> {
    let (k_3, iv_3) = compute_k_3_iv_3(crypto, suite, prk_3e2m, th_3)?;
    encrypt(crypto, suite.edhoc_aead, &k_3, &iv_3, th_3, plaintext_3)
}

pub fn decrypt_message_4(
    crypto: &mut impl CryptoTrait,
    suite: &CipherSuite,
    prk_4e3m: &[u8],
    th_4: &[u8],
    ciphertext_4: &[u8],
) -> Result<Vec<u8>, DissectError> {
    trace!("Enter decrypt_message_4");
    let (k_4, iv_4) = compute_k_4_iv_4(crypto, suite, prk_4e3m, th_4)?;
    decrypt(crypto, suite.edhoc_aead, &k_4, &iv_4, th_4, ciphertext_4)
}

pub fn encrypt_message_4(
    crypto: &mut impl CryptoTrait,
    suite: &CipherSuite,
    prk_4e3m: &[u8],
    th_4: &[u8],
    plaintext_4: &[u8],
) -> Result<Vec<u8>, DissectError> {
    let (k_4, iv_4) = compute_k_4_iv_4(crypto, suite, prk_4e3m, th_4)?;
    encrypt(crypto, suite.edhoc_aead, &k_4, &iv_4, th_4, plaintext_4)
}

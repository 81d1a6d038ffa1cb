use edhoc_lens_shared::{
    AeadAlgorithm, Crypto as CryptoTrait, CryptoError, HashAlgorithm, CIPHER_SUITES,
};

use aead::generic_array::typenum::Unsigned;
use aead::generic_array::GenericArray;
use aead::{AeadCore, AeadInPlace, KeyInit};
use ccm::consts::{U12, U13, U16, U7, U8};
use digest::Digest;
use zeroize::Zeroizing;

type AesCcm16_64_128 = ccm::Ccm<aes::Aes128, U8, U13>;
type AesCcm16_64_256 = ccm::Ccm<aes::Aes256, U8, U13>;
type AesCcm64_64_128 = ccm::Ccm<aes::Aes128, U8, U7>;
type AesCcm64_64_256 = ccm::Ccm<aes::Aes256, U8, U7>;
type AesCcm16_128_128 = ccm::Ccm<aes::Aes128, U16, U13>;
type AesCcm16_128_256 = ccm::Ccm<aes::Aes256, U16, U13>;
type AesCcm64_128_128 = ccm::Ccm<aes::Aes128, U16, U7>;
type AesCcm64_128_256 = ccm::Ccm<aes::Aes256, U16, U7>;
type Aes192Gcm = aes_gcm::AesGcm<aes::Aes192, U12>;

/// A type representing cryptographic operations through various RustCrypto crates (eg. [aes],
/// [ccm], [aes_gcm], [chacha20poly1305], [hkdf], [sha2]).
#[derive(Debug, Default, Clone, Copy)]
pub struct Crypto;

impl Crypto {
    pub const fn new() -> Self {
        Self
    }
}

macro_rules! hkdf_expand_with {
    ($hash:ty, $prk:expr, $info:expr, $result:expr) => {
        hkdf::Hkdf::<$hash>::from_prk($prk)
            .map_err(|_| CryptoError::InvalidLength)?
            .expand($info, $result)
            .map_err(|_| CryptoError::InvalidLength)
    };
}

macro_rules! hkdf_extract_with {
    ($hash:ty, $salt:expr, $ikm:expr) => {
        hkdf::Hkdf::<$hash>::extract(Some($salt), $ikm).0.to_vec()
    };
}

fn hash_with<D: Digest>(message: &[u8]) -> Vec<u8> {
    D::digest(message).to_vec()
}

fn seal<A: AeadInPlace + KeyInit>(
    key: &[u8],
    iv: &[u8],
    ad: &[u8],
    plaintext: &[u8],
) -> Result<Vec<u8>, CryptoError> {
    let cipher = A::new_from_slice(key).map_err(|_| CryptoError::InvalidLength)?;
    if iv.len() != <A as AeadCore>::NonceSize::USIZE {
        return Err(CryptoError::InvalidLength);
    }
    let mut buffer = plaintext.to_vec();
    let tag = cipher
        .encrypt_in_place_detached(GenericArray::from_slice(iv), ad, &mut buffer)
        .map_err(|_| CryptoError::InvalidLength)?;
    buffer.extend_from_slice(&tag);
    Ok(buffer)
}

fn open<A: AeadInPlace + KeyInit>(
    key: &[u8],
    iv: &[u8],
    ad: &[u8],
    ciphertext: &[u8],
) -> Result<Vec<u8>, CryptoError> {
    let cipher = A::new_from_slice(key).map_err(|_| CryptoError::InvalidLength)?;
    if iv.len() != <A as AeadCore>::NonceSize::USIZE {
        return Err(CryptoError::InvalidLength);
    }
    let tag_len = <A as AeadCore>::TagSize::USIZE;
    let Some(plaintext_len) = ciphertext.len().checked_sub(tag_len) else {
        return Err(CryptoError::MacVerificationFailed);
    };
    let (ciphertext, tag) = ciphertext.split_at(plaintext_len);
    // the scratch buffer is wiped when dropped on the error path
    let mut buffer = Zeroizing::new(ciphertext.to_vec());
    cipher
        .decrypt_in_place_detached(
            GenericArray::from_slice(iv),
            ad,
            &mut buffer,
            GenericArray::from_slice(tag),
        )
        .map_err(|_| CryptoError::MacVerificationFailed)?;
    Ok(core::mem::take(&mut *buffer))
}

impl CryptoTrait for Crypto {
    fn supported_suites(&self) -> Vec<u8> {
        CIPHER_SUITES
            .iter()
            .filter(|suite| suite.edhoc_hash != HashAlgorithm::Shake256)
            .map(|suite| suite.id)
            .collect()
    }

    fn hash(&mut self, alg: HashAlgorithm, message: &[u8]) -> Result<Vec<u8>, CryptoError> {
        match alg {
            HashAlgorithm::Sha256 => Ok(hash_with::<sha2::Sha256>(message)),
            HashAlgorithm::Sha384 => Ok(hash_with::<sha2::Sha384>(message)),
            HashAlgorithm::Sha512 => Ok(hash_with::<sha2::Sha512>(message)),
            HashAlgorithm::Shake256 => Err(CryptoError::UnsupportedAlgorithm),
        }
    }

    fn hkdf_expand(
        &mut self,
        alg: HashAlgorithm,
        prk: &[u8],
        info: &[u8],
        result: &mut [u8],
    ) -> Result<(), CryptoError> {
        match alg {
            HashAlgorithm::Sha256 => hkdf_expand_with!(sha2::Sha256, prk, info, result),
            HashAlgorithm::Sha384 => hkdf_expand_with!(sha2::Sha384, prk, info, result),
            HashAlgorithm::Sha512 => hkdf_expand_with!(sha2::Sha512, prk, info, result),
            HashAlgorithm::Shake256 => Err(CryptoError::UnsupportedAlgorithm),
        }
    }

    fn hkdf_extract(
        &mut self,
        alg: HashAlgorithm,
        salt: &[u8],
        ikm: &[u8],
    ) -> Result<Vec<u8>, CryptoError> {
        match alg {
            HashAlgorithm::Sha256 => Ok(hkdf_extract_with!(sha2::Sha256, salt, ikm)),
            HashAlgorithm::Sha384 => Ok(hkdf_extract_with!(sha2::Sha384, salt, ikm)),
            HashAlgorithm::Sha512 => Ok(hkdf_extract_with!(sha2::Sha512, salt, ikm)),
            HashAlgorithm::Shake256 => Err(CryptoError::UnsupportedAlgorithm),
        }
    }

    fn aead_encrypt(
        &mut self,
        alg: AeadAlgorithm,
        key: &[u8],
        iv: &[u8],
        ad: &[u8],
        plaintext: &[u8],
    ) -> Result<Vec<u8>, CryptoError> {
        match alg {
            AeadAlgorithm::A128Gcm => seal::<aes_gcm::Aes128Gcm>(key, iv, ad, plaintext),
            AeadAlgorithm::A192Gcm => seal::<Aes192Gcm>(key, iv, ad, plaintext),
            AeadAlgorithm::A256Gcm => seal::<aes_gcm::Aes256Gcm>(key, iv, ad, plaintext),
            AeadAlgorithm::AesCcm16_64_128 => seal::<AesCcm16_64_128>(key, iv, ad, plaintext),
            AeadAlgorithm::AesCcm16_64_256 => seal::<AesCcm16_64_256>(key, iv, ad, plaintext),
            AeadAlgorithm::AesCcm64_64_128 => seal::<AesCcm64_64_128>(key, iv, ad, plaintext),
            AeadAlgorithm::AesCcm64_64_256 => seal::<AesCcm64_64_256>(key, iv, ad, plaintext),
            AeadAlgorithm::AesCcm16_128_128 => seal::<AesCcm16_128_128>(key, iv, ad, plaintext),
            AeadAlgorithm::AesCcm16_128_256 => seal::<AesCcm16_128_256>(key, iv, ad, plaintext),
            AeadAlgorithm::AesCcm64_128_128 => seal::<AesCcm64_128_128>(key, iv, ad, plaintext),
            AeadAlgorithm::AesCcm64_128_256 => seal::<AesCcm64_128_256>(key, iv, ad, plaintext),
            AeadAlgorithm::ChaCha20Poly1305 => {
                seal::<chacha20poly1305::ChaCha20Poly1305>(key, iv, ad, plaintext)
            }
        }
    }

    fn aead_decrypt(
        &mut self,
        alg: AeadAlgorithm,
        key: &[u8],
        iv: &[u8],
        ad: &[u8],
        ciphertext: &[u8],
    ) -> Result<Vec<u8>, CryptoError> {
        match alg {
            AeadAlgorithm::A128Gcm => open::<aes_gcm::Aes128Gcm>(key, iv, ad, ciphertext),
            AeadAlgorithm::A192Gcm => open::<Aes192Gcm>(key, iv, ad, ciphertext),
            AeadAlgorithm::A256Gcm => open::<aes_gcm::Aes256Gcm>(key, iv, ad, ciphertext),
            AeadAlgorithm::AesCcm16_64_128 => open::<AesCcm16_64_128>(key, iv, ad, ciphertext),
            AeadAlgorithm::AesCcm16_64_256 => open::<AesCcm16_64_256>(key, iv, ad, ciphertext),
            AeadAlgorithm::AesCcm64_64_128 => open::<AesCcm64_64_128>(key, iv, ad, ciphertext),
            AeadAlgorithm::AesCcm64_64_256 => open::<AesCcm64_64_256>(key, iv, ad, ciphertext),
            AeadAlgorithm::AesCcm16_128_128 => open::<AesCcm16_128_128>(key, iv, ad, ciphertext),
            AeadAlgorithm::AesCcm16_128_256 => open::<AesCcm16_128_256>(key, iv, ad, ciphertext),
            AeadAlgorithm::AesCcm64_128_128 => open::<AesCcm64_128_128>(key, iv, ad, ciphertext),
            AeadAlgorithm::AesCcm64_128_256 => open::<AesCcm64_128_256>(key, iv, ad, ciphertext),
            AeadAlgorithm::ChaCha20Poly1305 => {
                open::<chacha20poly1305::ChaCha20Poly1305>(key, iv, ad, ciphertext)
            }
        }
    }
}

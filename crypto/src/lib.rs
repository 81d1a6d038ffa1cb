//! Cryptography dispatch for the edhoc-lens crate
//!
//! This crate is used by edhoc-lens users to decide which cryptographic back-end to use. Its
//! presence avoids the need for every caller to name a back-end type; the dissector itself only
//! ever sees the [`CryptoTrait`].

/// Convenience re-export
pub use edhoc_lens_shared::Crypto as CryptoTrait;

#[cfg(feature = "rustcrypto")]
pub type Crypto = edhoc_lens_crypto_rustcrypto::Crypto;

#[cfg(feature = "rustcrypto")]
pub const fn default_crypto() -> Crypto {
    edhoc_lens_crypto_rustcrypto::Crypto::new()
}

/// See test_implements_crypto
#[allow(dead_code)]
fn test_helper<T: CryptoTrait>() {}

/// Ensure at build time that whichever type as selected for Crypto actually implements the Crypto
/// trait, and that one is actually defined.
#[allow(dead_code)]
fn test_implements_crypto() {
    test_helper::<Crypto>()
}

#[cfg(test)]
mod tests {
    use edhoc_lens_shared::HashAlgorithm;
    use hexlit::hex;
    use rstest::rstest;

    use super::*;

    // Test vectors from RFC 5869, covering Test Cases 1 and 2
    #[rstest]
    #[case(
        &hex!("077709362c2e32df0ddc3f0dc47bba6390b6c73bb50f9c3122ec844ad7c2b3e5"),
        &hex!("f0f1f2f3f4f5f6f7f8f9"),
        42,
        &hex!("3cb25f25faacd57a90434f64d0362f2a2d2d0a90cf1a5a4c5db02d56ecc4c5bf34007208d5b887185865")
    )]
    #[case(
        &hex!("06a6b88c5853361a06104c9ceb35b45cef760014904671014a193f40c15fc244"),
        &hex!("b0b1b2b3b4b5b6b7b8b9babbbcbdbebfc0c1c2c3c4c5c6c7c8c9cacbcccdcecfd0d1d2d3d4d5d6d7d8d9dadbdcdddedfe0e1e2e3e4e5e6e7e8e9eaebecedeeeff0f1f2f3f4f5f6f7f8f9fafbfcfdfeff"),
        82,
        &hex!("b11e398dc80327a1c8e7f78c596a49344f012eda2d4efad8a050cc4c19afa97c59045a99cac7827271cb41c65e590e09da3275600c2f09b8367793a9aca3db71cc30c58179ec3e87c14c01d5c1f3434f1d87")
    )]
    fn test_hkdf_expand(
        #[case] prk: &[u8],
        #[case] info: &[u8],
        #[case] output_length: usize,
        #[case] expected_okm: &[u8],
    ) {
        let mut crypto = default_crypto();

        let mut okm = vec![0; output_length];
        crypto
            .hkdf_expand(HashAlgorithm::Sha256, prk, info, &mut okm)
            .unwrap();
        assert_eq!(okm, expected_okm);
    }

    #[test]
    fn test_hkdf_expand_too_long() {
        let mut crypto = default_crypto();
        let mut okm = vec![0; 255 * 32 + 1];
        assert!(crypto
            .hkdf_expand(HashAlgorithm::Sha256, &[0; 32], &[], &mut okm)
            .is_err());
    }
}

//! EDHOC_KDF and the values derived with it (RFC 9528, Section 4).
//!
//! Everything here is a pure function of its inputs. The Diffie-Hellman based steps only appear
//! as HKDF-Extract over a shared secret that was supplied from outside.
use defmt_or_log::trace;
use edhoc_lens_shared::{Crypto as CryptoTrait, *};

pub(crate) fn crypto_error(error: CryptoError, algorithm: i64, length: usize) -> DissectError {
    match error {
        CryptoError::UnsupportedAlgorithm => DissectError::UnknownAlgorithm(algorithm),
        CryptoError::InvalidLength => DissectError::InvalidLength(length),
        CryptoError::MacVerificationFailed => DissectError::AuthenticationFailed,
    }
}

/// EDHOC_KDF(PRK, label, context, length) = HKDF-Expand(PRK, info, length)
///
/// `info` is the CBOR sequence `label, bstr context, uint length`. Fails when no PRK is given,
/// when the back-end does not implement `hash`, or for an empty output.
pub fn edhoc_kdf(
    crypto: &mut impl CryptoTrait,
    hash: HashAlgorithm,
    prk: Option<&[u8]>,
    label: u64,
    context: &[u8],
    length: usize,
) -> Result<Vec<u8>, DissectError> {
    let prk = prk.ok_or(DissectError::MissingSecret("PRK"))?;
    if length == 0 {
        return Err(DissectError::InvalidLength(length));
    }
    let info = encode_info(label, context, length);
    let mut result = vec![0; length];
    crypto
        .hkdf_expand(hash, prk, &info, &mut result)
        .map_err(|e| crypto_error(e, hash.code(), length))?;
    Ok(result)
}

fn kdf(
    crypto: &mut impl CryptoTrait,
    hash: HashAlgorithm,
    prk: &[u8],
    label: u64,
    context: &[u8],
    length: usize,
) -> Result<Vec<u8>, DissectError> {
    edhoc_kdf(crypto, hash, Some(prk), label, context, length)
}

fn extract(
    crypto: &mut impl CryptoTrait,
    hash: HashAlgorithm,
    salt: &[u8],
    ikm: &[u8],
) -> Result<Vec<u8>, DissectError> {
    crypto
        .hkdf_extract(hash, salt, ikm)
        .map_err(|e| crypto_error(e, hash.code(), hash.output_len()))
}

fn digest(
    crypto: &mut impl CryptoTrait,
    hash: HashAlgorithm,
    message: &[u8],
) -> Result<Vec<u8>, DissectError> {
    crypto
        .hash(hash, message)
        .map_err(|e| crypto_error(e, hash.code(), message.len()))
}

pub fn compute_h_message_1(
    crypto: &mut impl CryptoTrait,
    hash: HashAlgorithm,
    message_1: &[u8],
) -> Result<Vec<u8>, DissectError> {
    digest(crypto, hash, message_1)
}

/// TH_2 = H( G_Y, H(message_1) )
pub fn compute_th_2(
    crypto: &mut impl CryptoTrait,
    hash: HashAlgorithm,
    g_y: &[u8],
    h_message_1: &[u8],
) -> Result<Vec<u8>, DissectError> {
    trace!("Enter compute_th_2");
    let mut message = CBOREncoder::new();
    message.bytes(g_y).bytes(h_message_1);
    digest(crypto, hash, message.as_slice())
}

/// TH_3 = H( TH_2, PLAINTEXT_2, CRED_R )
pub fn compute_th_3(
    crypto: &mut impl CryptoTrait,
    hash: HashAlgorithm,
    th_2: &[u8],
    plaintext_2: &[u8],
    cred_r: &[u8],
) -> Result<Vec<u8>, DissectError> {
    trace!("Enter compute_th_3");
    let mut message = CBOREncoder::new();
    message.bytes(th_2).raw(plaintext_2).raw(cred_r);
    digest(crypto, hash, message.as_slice())
}

/// TH_4 = H( TH_3, PLAINTEXT_3, CRED_I )
pub fn compute_th_4(
    crypto: &mut impl CryptoTrait,
    hash: HashAlgorithm,
    th_3: &[u8],
    plaintext_3: &[u8],
    cred_i: &[u8],
) -> Result<Vec<u8>, DissectError> {
    trace!("Enter compute_th_4");
    let mut message = CBOREncoder::new();
    message.bytes(th_3).raw(plaintext_3).raw(cred_i);
    digest(crypto, hash, message.as_slice())
}

/// PRK_2e = EDHOC_Extract( TH_2, G_XY )
pub fn compute_prk_2e(
    crypto: &mut impl CryptoTrait,
    hash: HashAlgorithm,
    th_2: &[u8],
    g_xy: &[u8],
) -> Result<Vec<u8>, DissectError> {
    extract(crypto, hash, th_2, g_xy)
}

pub fn compute_salt_3e2m(
    crypto: &mut impl CryptoTrait,
    hash: HashAlgorithm,
    prk_2e: &[u8],
    th_2: &[u8],
) -> Result<Vec<u8>, DissectError> {
    kdf(crypto, hash, prk_2e, KDF_LABEL_SALT_3E2M, th_2, hash.output_len())
}

/// PRK_3e2m = EDHOC_Extract( SALT_3e2m, G_RX )
pub fn compute_prk_3e2m(
    crypto: &mut impl CryptoTrait,
    hash: HashAlgorithm,
    salt_3e2m: &[u8],
    g_rx: &[u8],
) -> Result<Vec<u8>, DissectError> {
    extract(crypto, hash, salt_3e2m, g_rx)
}

pub fn compute_salt_4e3m(
    crypto: &mut impl CryptoTrait,
    hash: HashAlgorithm,
    prk_3e2m: &[u8],
    th_3: &[u8],
) -> Result<Vec<u8>, DissectError> {
    kdf(crypto, hash, prk_3e2m, KDF_LABEL_SALT_4E3M, th_3, hash.output_len())
}

/// PRK_4e3m = EDHOC_Extract( SALT_4e3m, G_IY )
pub fn compute_prk_4e3m(
    crypto: &mut impl CryptoTrait,
    hash: HashAlgorithm,
    salt_4e3m: &[u8],
    g_iy: &[u8],
) -> Result<Vec<u8>, DissectError> {
    extract(crypto, hash, salt_4e3m, g_iy)
}

/// Apply the XOR encryption of CIPHERTEXT_2. As XOR is its own inverse, this both encrypts and
/// decrypts.
pub fn encrypt_decrypt_ciphertext_2(
    crypto: &mut impl CryptoTrait,
    hash: HashAlgorithm,
    prk_2e: &[u8],
    th_2: &[u8],
    ciphertext_2: &[u8],
) -> Result<Vec<u8>, DissectError> {
    trace!("Enter encrypt_decrypt_ciphertext_2");
    if ciphertext_2.is_empty() {
        return Ok(Vec::new());
    }
    // KEYSTREAM_2 = EDHOC_KDF( PRK_2e, 0, TH_2, plaintext_length )
    let keystream_2 = kdf(
        crypto,
        hash,
        prk_2e,
        KDF_LABEL_KEYSTREAM_2,
        th_2,
        ciphertext_2.len(),
    )?;
    Ok(ciphertext_2
        .iter()
        .zip(keystream_2.iter())
        .map(|(c, k)| c ^ k)
        .collect())
}

pub fn compute_k_3_iv_3(
    crypto: &mut impl CryptoTrait,
    suite: &CipherSuite,
    prk_3e2m: &[u8],
    th_3: &[u8],
) -> Result<(Vec<u8>, Vec<u8>), DissectError> {
    let hash = suite.edhoc_hash;
    let aead = suite.edhoc_aead;
    // K_3 = EDHOC_KDF( PRK_3e2m, 3, TH_3, key_length )
    let k_3 = kdf(crypto, hash, prk_3e2m, KDF_LABEL_K_3, th_3, aead.key_len())?;
    // IV_3 = EDHOC_KDF( PRK_3e2m, 4, TH_3, iv_length )
    let iv_3 = kdf(crypto, hash, prk_3e2m, KDF_LABEL_IV_3, th_3, aead.iv_len())?;
    Ok((k_3, iv_3))
}

pub fn compute_k_4_iv_4(
    crypto: &mut impl CryptoTrait,
    suite: &CipherSuite,
    prk_4e3m: &[u8],
    th_4: &[u8],
) -> Result<(Vec<u8>, Vec<u8>), DissectError> {
    let hash = suite.edhoc_hash;
    let aead = suite.edhoc_aead;
    // K_4 = EDHOC_KDF( PRK_4e3m, 8, TH_4, key_length )
    let k_4 = kdf(crypto, hash, prk_4e3m, KDF_LABEL_K_4, th_4, aead.key_len())?;
    // IV_4 = EDHOC_KDF( PRK_4e3m, 9, TH_4, iv_length )
    let iv_4 = kdf(crypto, hash, prk_4e3m, KDF_LABEL_IV_4, th_4, aead.iv_len())?;
    Ok((k_4, iv_4))
}

/// PRK_out = EDHOC_KDF( PRK_4e3m, 7, TH_4, hash_length )
pub fn compute_prk_out(
    crypto: &mut impl CryptoTrait,
    hash: HashAlgorithm,
    prk_4e3m: &[u8],
    th_4: &[u8],
) -> Result<Vec<u8>, DissectError> {
    kdf(crypto, hash, prk_4e3m, KDF_LABEL_PRK_OUT, th_4, hash.output_len())
}

/// PRK_exporter = EDHOC_KDF( PRK_out, 10, h'', hash_length )
pub fn compute_prk_exporter(
    crypto: &mut impl CryptoTrait,
    hash: HashAlgorithm,
    prk_out: &[u8],
) -> Result<Vec<u8>, DissectError> {
    kdf(crypto, hash, prk_out, KDF_LABEL_PRK_EXPORTER, &[], hash.output_len())
}

/// EDHOC_Exporter( label, context, length ) = EDHOC_KDF( PRK_exporter, label, context, length )
pub fn edhoc_exporter(
    crypto: &mut impl CryptoTrait,
    hash: HashAlgorithm,
    prk_exporter: &[u8],
    label: u64,
    context: &[u8],
    length: usize,
) -> Result<Vec<u8>, DissectError> {
    kdf(crypto, hash, prk_exporter, label, context, length)
}

/// PRK_out' = EDHOC_KDF( PRK_out, 11, context, hash_length ); returns PRK_out' and the
/// PRK_exporter derived from it.
pub fn edhoc_key_update(
    crypto: &mut impl CryptoTrait,
    hash: HashAlgorithm,
    prk_out: &[u8],
    context: &[u8],
) -> Result<(Vec<u8>, Vec<u8>), DissectError> {
    let prk_out_new = kdf(
        crypto,
        hash,
        prk_out,
        KDF_LABEL_KEY_UPDATE,
        context,
        hash.output_len(),
    )?;
    let prk_exporter = compute_prk_exporter(crypto, hash, &prk_out_new)?;
    Ok((prk_out_new, prk_exporter))
}

/// OSCORE Master Secret and Master Salt (RFC 9528, Appendix A.1).
pub fn compute_oscore_master(
    crypto: &mut impl CryptoTrait,
    suite: &CipherSuite,
    prk_exporter: &[u8],
) -> Result<(Vec<u8>, Vec<u8>), DissectError> {
    let master_secret = edhoc_exporter(
        crypto,
        suite.edhoc_hash,
        prk_exporter,
        EXPORTER_LABEL_OSCORE_MASTER_SECRET,
        &[],
        suite.app_aead.key_len(),
    )?;
    let master_salt = edhoc_exporter(
        crypto,
        suite.edhoc_hash,
        prk_exporter,
        EXPORTER_LABEL_OSCORE_MASTER_SALT,
        &[],
        OSCORE_MASTER_SALT_LEN,
    )?;
    Ok((master_secret, master_salt))
}

#[cfg(test)]
pub(crate) mod test_vectors {
    // RFC 9529, Section 3: method 3, cipher suite 2
    use hexlit::hex;

    pub const MESSAGE_1_TV: [u8; 39] =
        hex!("0382060258208af6f430ebe18d34184017a9a11bf511c8dff8f834730b96c1b7c8dbca2fc3b637");
    pub const G_X_TV: [u8; 32] =
        hex!("8af6f430ebe18d34184017a9a11bf511c8dff8f834730b96c1b7c8dbca2fc3b6");
    pub const H_MESSAGE_1_TV: [u8; 32] =
        hex!("ca02cabda5a8902749b42f711050bb4dbd52153e87527594b39f50cdf019888c");
    pub const MESSAGE_2_TV: [u8; 45] = hex!("582b419701d7f00a26c2dc587a36dd752549f33763c893422c8ea0f955a13a4ff5d59862a1eef9e0e7e1886fcd");
    pub const G_Y_TV: [u8; 32] =
        hex!("419701d7f00a26c2dc587a36dd752549f33763c893422c8ea0f955a13a4ff5d5");
    pub const CIPHERTEXT_2_TV: [u8; 11] = hex!("9862a1eef9e0e7e1886fcd");
    pub const PLAINTEXT_2_TV: [u8; 11] = hex!("2732480943305c899f5c54");
    pub const KEYSTREAM_2_TV: [u8; 11] = hex!("bf50e9e7bad0bb68173399");
    pub const G_XY_TV: [u8; 32] =
        hex!("2f0cb7e860ba538fbf5c8bded009f6259b4b628fe1eb7dbe9378e5ecf7a824ba");
    pub const TH_2_TV: [u8; 32] =
        hex!("356efd53771425e008f3fe3a86c83ff4c6b16e57028ff39d5236c182b202084b");
    pub const PRK_2E_TV: [u8; 32] =
        hex!("5aa0d69f3e3d1e0c479f0b8a486690c9802630c3466b1dc92371c982563170b5");
    pub const SALT_3E2M_TV: [u8; 32] =
        hex!("af4e103a47cb3cf32570d5c25ad27732bd8d8178e9a69d061c31a27f8e3ca926");
    pub const PRK_3E2M_TV: [u8; 32] =
        hex!("0ca3d3398296b3c03900987620c11f6fce70781c1d1219720f9ec08c122d8434");
    pub const CRED_R_TV: [u8; 95] = hex!("a2026b6578616d706c652e65647508a101a501020241322001215820bbc34960526ea4d32e940cad2a234148ddc21791a12afbcbac93622046dd44f02258204519e257236b2a0ce2023f0931f1f386ca7afda64fcde0108c224c51eabf6072");
    pub const TH_3_TV: [u8; 32] =
        hex!("adaf67a78a4bcc91e018f8882762a722000b2507039df0bc1bbf0c161bb3155c");
    pub const MESSAGE_3_TV: [u8; 19] = hex!("52e562097bc417dd5919485ac7891ffd90a9fc");
    pub const PLAINTEXT_3_TV: [u8; 10] = hex!("2b48623c91df41e34c2f");
    pub const SALT_4E3M_TV: [u8; 32] =
        hex!("cfddf9515a7e46e7b4dbff31cbd56cd04ba332250de9ea5de1caf9f6d13914a7");
    pub const PRK_4E3M_TV: [u8; 32] =
        hex!("81cc8a298e357044e3c466bb5c0a1e507e01d49238aeba138df94635407c0ff7");
    pub const CRED_I_TV: [u8; 107] = hex!("a2027734322d35302d33312d46462d45462d33372d33322d333908a101a5010202412b2001215820ac75e9ece3e50bfc8ed60399889522405c47bf16df96660a41298cb4307f7eb62258206e5de611388a4b8a8211334ac7d37ecb52a387d257e6db3c2a93df21ff3affc8");
    pub const TH_4_TV: [u8; 32] =
        hex!("c902b1e3a4326c93c5551f5f3aa6c5ecc0246806765612e52b5d99e6059d6b6e");
    pub const MESSAGE_4_TV: [u8; 9] = hex!("4828c966b7ca304f83");
    pub const K_4_TV: [u8; 16] = hex!("d3c77872b6eeb508911bdbd308b2e6a0");
    pub const IV_4_TV: [u8; 13] = hex!("04ff0f44456e96e217853c3601");
    pub const PRK_OUT_TV: [u8; 32] =
        hex!("2c71afc1a9338a940bb3529ca734b886f30d1aba0b4dc51beeaeabdfea9ecbf8");
    pub const PRK_EXPORTER_TV: [u8; 32] =
        hex!("e14d06699cee248c5a04bf9227bbcd4ce394de7dcb56db43555474171e6446db");
    pub const OSCORE_MASTER_SECRET_TV: [u8; 16] = hex!("f9868f6a3aca78a05d1485b35030b162");
    pub const OSCORE_MASTER_SALT_TV: [u8; 8] = hex!("ada24c7dbfc85eeb");
}

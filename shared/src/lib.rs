//! Common data structures used by [edhoc-lens] and its dependent crates
//!
//! This crate is separate from edhoc-lens so that EAD decoders and crypto back-ends can be
//! written against the item source, the record types and the traits without depending on the
//! dissector itself. It is recommended to use its types through the public re-export in
//! edhoc-lens wherever possible.
//!
//! [edhoc-lens]: https://docs.rs/edhoc-lens/

pub use algorithms::*;
pub use cbor::*;
pub use crypto::*;
pub use ead::*;
pub use error::*;
pub use helpers::*;
pub use record::*;
pub use suites::*;

mod algorithms;
mod cbor;
mod crypto;
mod ead;
mod error;
mod record;
mod suites;

pub const CBOR_TRUE: u8 = 0xf5;
pub const CBOR_NULL: u8 = 0xf6;
pub const CBOR_UINT_1BYTE_START: u8 = 0x0u8;
pub const CBOR_UINT_1BYTE_END: u8 = 0x17u8;
pub const CBOR_NEG_INT_1BYTE_START: u8 = 0x20u8;
pub const CBOR_NEG_INT_1BYTE_END: u8 = 0x37u8;

// COSE header parameters (RFC 9052, RFC 9360, RFC 9528)
pub const HEADER_ALG: i64 = 1;
pub const HEADER_CRIT: i64 = 2;
pub const HEADER_CONTENT_TYPE: i64 = 3;
pub const HEADER_KID: i64 = 4;
pub const HEADER_IV: i64 = 5;
pub const HEADER_PARTIAL_IV: i64 = 6;
pub const HEADER_KCWT: i64 = 13;
pub const HEADER_KCCS: i64 = 14;
pub const HEADER_X5BAG: i64 = 32;
pub const HEADER_X5CHAIN: i64 = 33;
pub const HEADER_X5T: i64 = 34;
pub const HEADER_X5U: i64 = 35;

// COSE key parameters
pub const KEY_KTY: i64 = 1;
pub const KEY_KID: i64 = 2;
pub const KEY_ALG: i64 = 3;
pub const KEY_OPS: i64 = 4;
pub const KEY_BASE_IV: i64 = 5;

// COSE message tags
pub const TAG_COSE_ENCRYPT0: u64 = 16;
pub const TAG_COSE_MAC0: u64 = 17;
pub const TAG_COSE_SIGN1: u64 = 18;
pub const TAG_COSE_ENCRYPT: u64 = 96;
pub const TAG_COSE_MAC: u64 = 97;
pub const TAG_COSE_SIGN: u64 = 98;

// EDHOC_KDF labels (RFC 9528, Section 4.1.2 and Appendix A)
pub const KDF_LABEL_KEYSTREAM_2: u64 = 0;
pub const KDF_LABEL_SALT_3E2M: u64 = 1;
pub const KDF_LABEL_MAC_2: u64 = 2;
pub const KDF_LABEL_K_3: u64 = 3;
pub const KDF_LABEL_IV_3: u64 = 4;
pub const KDF_LABEL_SALT_4E3M: u64 = 5;
pub const KDF_LABEL_MAC_3: u64 = 6;
pub const KDF_LABEL_PRK_OUT: u64 = 7;
pub const KDF_LABEL_K_4: u64 = 8;
pub const KDF_LABEL_IV_4: u64 = 9;
pub const KDF_LABEL_PRK_EXPORTER: u64 = 10;
pub const KDF_LABEL_KEY_UPDATE: u64 = 11;

// EDHOC_Exporter labels for OSCORE (RFC 9528, Appendix A.1)
pub const EXPORTER_LABEL_OSCORE_MASTER_SECRET: u64 = 0;
pub const EXPORTER_LABEL_OSCORE_MASTER_SALT: u64 = 1;
pub const OSCORE_MASTER_SALT_LEN: usize = 8;

pub const EAD_PADDING_LABEL: u64 = 0;

/// Value of C_R or C_I, as chosen by a peer.
///
/// Semantically, this is a byte string of some length. On the wire, the 48 one-byte identifiers
/// that are also the CBOR encoding of an integer in -24..=23 are sent as that integer, all others
/// as a byte string.
#[derive(Debug, PartialEq, Eq, Clone, Default, Hash)]
pub struct ConnId(Vec<u8>);

impl ConnId {
    /// Construct a ConnId from the value of a compact integer identifier.
    pub fn from_int(value: i64) -> Option<Self> {
        match value {
            0..=23 => Some(Self(vec![value as u8])),
            -24..=-1 => Some(Self(vec![CBOR_NEG_INT_1BYTE_START + (-1 - value) as u8])),
            _ => None,
        }
    }

    /// Construct a ConnId from the content of a byte string identifier.
    pub fn from_slice(input: &[u8]) -> Self {
        Self(input.to_vec())
    }

    /// The bytes that form the identifier (an arbitrary byte string)
    pub fn as_slice(&self) -> &[u8] {
        &self.0
    }

    /// The CBOR encoding of the identifier.
    ///
    /// For the 48 compact connection identifiers -24..=23, this is identical to the slice
    /// representation:
    ///
    /// ```
    /// # use edhoc_lens_shared::ConnId;
    /// let c_i = ConnId::from_int(-8).unwrap();
    /// assert_eq!(c_i.as_cbor(), &[0x27]);
    /// ```
    ///
    /// For other IDs, this contains an extra byte header:
    ///
    /// ```
    /// # use edhoc_lens_shared::ConnId;
    /// let c_i = ConnId::from_slice(&[0xff]);
    /// assert_eq!(c_i.as_cbor(), &[0x41, 0xff]);
    /// ```
    pub fn as_cbor(&self) -> Vec<u8> {
        match self.0.as_slice() {
            [b] if Self::is_compact(*b) => vec![*b],
            bytes => {
                let mut encoder = CBOREncoder::new();
                encoder.bytes(bytes);
                encoder.into_vec()
            }
        }
    }

    fn is_compact(byte: u8) -> bool {
        (CBOR_UINT_1BYTE_START..=CBOR_UINT_1BYTE_END).contains(&byte)
            || (CBOR_NEG_INT_1BYTE_START..=CBOR_NEG_INT_1BYTE_END).contains(&byte)
    }
}

mod helpers {
    use super::*;

    /// Build the `info` input of EDHOC_KDF: the CBOR sequence `label, bstr context, uint length`.
    pub fn encode_info(label: u64, context: &[u8], length: usize) -> Vec<u8> {
        let mut info = CBOREncoder::new();
        info.uint(label).bytes(context).uint(length as u64);
        info.into_vec()
    }

    /// Build `Enc_structure = ["Encrypt0", h'', external_aad]` (RFC 9052, Section 5.3).
    pub fn encode_enc_structure(external_aad: &[u8]) -> Vec<u8> {
        let mut enc_structure = CBOREncoder::new();
        enc_structure
            .array(3)
            .text("Encrypt0")
            .bytes(&[])
            .bytes(external_aad);
        enc_structure.into_vec()
    }
}

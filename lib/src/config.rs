/// Default limit on nested recipients, key maps and generic containers.
pub const DEFAULT_MAX_NESTING_DEPTH: usize = 16;

/// Settings a host picks once for a [`crate::Dissector`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DissectorConfig {
    /// Deepest nesting level decoded before `RecursionLimitExceeded` is reported.
    pub max_nesting_depth: usize,
    /// Decode EAD values that have no registered decoder as embedded CBOR, if they parse as such.
    pub ead_heuristic_cbor: bool,
    /// Derive keys and decrypt handshake ciphertexts whenever secrets allow it.
    pub decrypt: bool,
}

impl Default for DissectorConfig {
    fn default() -> Self {
        DissectorConfig {
            max_nesting_depth: DEFAULT_MAX_NESTING_DEPTH,
            ead_heuristic_cbor: false,
            decrypt: true,
        }
    }
}

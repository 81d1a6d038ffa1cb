use crate::cbor::{CBORError, MajorType};

/// Everything that can go wrong while decoding one item or deriving one key.
///
/// None of these stop a dissection run. Structural kinds abort the container being decoded and are
/// attached to its record; content kinds are notes on an otherwise complete record.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[non_exhaustive]
pub enum DissectError {
    #[error("truncated input")]
    TruncatedInput,
    #[error("malformed item head 0x{0:02x}")]
    MalformedHead(u8),
    #[error("expected {expected}, found {found}")]
    UnexpectedMajorType {
        expected: MajorType,
        found: MajorType,
    },
    #[error("expected {expected} elements, found {found}")]
    ArityMismatch { expected: &'static str, found: u64 },
    #[error("declared {declared} elements, input ends after {decoded}")]
    MalformedCount { declared: u64, decoded: u64 },
    #[error("nesting exceeds the limit of {limit}")]
    RecursionLimitExceeded { limit: usize },
    #[error("unknown or unsupported algorithm {0}")]
    UnknownAlgorithm(i64),
    #[error("no secret available for {0}")]
    MissingSecret(&'static str),
    #[error("authentication tag mismatch")]
    AuthenticationFailed,
    #[error("decoder consumed {consumed} of {total} bytes")]
    PartialDecode { consumed: usize, total: usize },
    #[error("integer out of range")]
    OutOfRange,
    #[error("invalid length {0}")]
    InvalidLength(usize),
    #[error("internal error: {0}")]
    Internal(&'static str),
}

impl DissectError {
    /// Whether the error stops decoding of the surrounding container.
    ///
    /// Besides truncation, malformed heads, arity, count and nesting errors, this includes
    /// `UnexpectedMajorType` and `OutOfRange`: an item of the wrong type or an integer that does
    /// not fit leaves the container undecodable in the same way.
    pub fn is_structural(&self) -> bool {
        matches!(
            self,
            DissectError::TruncatedInput
                | DissectError::MalformedHead(_)
                | DissectError::UnexpectedMajorType { .. }
                | DissectError::ArityMismatch { .. }
                | DissectError::MalformedCount { .. }
                | DissectError::RecursionLimitExceeded { .. }
                | DissectError::OutOfRange
        )
    }

    pub fn severity(&self) -> Severity {
        match self {
            DissectError::MissingSecret(_) | DissectError::UnknownAlgorithm(_) => Severity::Note,
            DissectError::AuthenticationFailed | DissectError::PartialDecode { .. } => {
                Severity::Warning
            }
            _ => Severity::Error,
        }
    }
}

impl From<CBORError> for DissectError {
    fn from(error: CBORError) -> Self {
        match error {
            CBORError::TruncatedInput => DissectError::TruncatedInput,
            CBORError::MalformedHead(b) => DissectError::MalformedHead(b),
            CBORError::UnexpectedMajorType { expected, found } => {
                DissectError::UnexpectedMajorType { expected, found }
            }
            CBORError::OutOfRange => DissectError::OutOfRange,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Severity {
    Note,
    Warning,
    Error,
}

impl core::fmt::Display for Severity {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(match self {
            Severity::Note => "note",
            Severity::Warning => "warning",
            Severity::Error => "error",
        })
    }
}

/// Failures reported by a [`crate::Crypto`] back-end.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum CryptoError {
    #[error("algorithm not supported by the crypto back-end")]
    UnsupportedAlgorithm,
    #[error("key, nonce or output length does not match the algorithm")]
    InvalidLength,
    #[error("authentication tag mismatch")]
    MacVerificationFailed,
}

#[cfg(test)]
mod test_error {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(DissectError::TruncatedInput, true)]
    #[case(DissectError::MalformedHead(0x1f), true)]
    #[case(DissectError::ArityMismatch { expected: "4", found: 3 }, true)]
    #[case(DissectError::MalformedCount { declared: 2, decoded: 1 }, true)]
    #[case(DissectError::RecursionLimitExceeded { limit: 16 }, true)]
    #[case(
        DissectError::UnexpectedMajorType { expected: MajorType::Bytes, found: MajorType::Text },
        true
    )]
    #[case(DissectError::OutOfRange, true)]
    #[case(DissectError::UnknownAlgorithm(-65535), false)]
    #[case(DissectError::MissingSecret("PRK_2e"), false)]
    #[case(DissectError::AuthenticationFailed, false)]
    #[case(DissectError::PartialDecode { consumed: 1, total: 2 }, false)]
    fn test_structural_kinds(#[case] error: DissectError, #[case] structural: bool) {
        assert_eq!(structural, error.is_structural());
    }

    #[test]
    fn test_content_kinds_are_not_errors() {
        assert_eq!(Severity::Note, DissectError::MissingSecret("TH_3").severity());
        assert_eq!(Severity::Warning, DissectError::AuthenticationFailed.severity());
        assert_eq!(Severity::Error, DissectError::TruncatedInput.severity());
    }
}

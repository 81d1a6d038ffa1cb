//! COSE message and key structures (RFC 9052).
use crate::config::DissectorConfig;
use crate::header::{list, param_map, protected, typed, MapKind};
use crate::item::{head_len, Walker};
use crate::registry::Registries;
use defmt_or_log::{debug, trace};
use edhoc_lens_shared::*;
use std::borrow::Cow;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EnvelopeKind {
    Sign,
    Sign1,
    Encrypt,
    Encrypt0,
    Mac,
    Mac0,
    Key,
    KeySet,
}

impl EnvelopeKind {
    pub const ALL: [EnvelopeKind; 8] = [
        EnvelopeKind::Sign,
        EnvelopeKind::Sign1,
        EnvelopeKind::Encrypt,
        EnvelopeKind::Encrypt0,
        EnvelopeKind::Mac,
        EnvelopeKind::Mac0,
        EnvelopeKind::Key,
        EnvelopeKind::KeySet,
    ];

    pub const fn name(self) -> &'static str {
        match self {
            EnvelopeKind::Sign => "COSE_Sign",
            EnvelopeKind::Sign1 => "COSE_Sign1",
            EnvelopeKind::Encrypt => "COSE_Encrypt",
            EnvelopeKind::Encrypt0 => "COSE_Encrypt0",
            EnvelopeKind::Mac => "COSE_Mac",
            EnvelopeKind::Mac0 => "COSE_Mac0",
            EnvelopeKind::Key => "COSE_Key",
            EnvelopeKind::KeySet => "COSE_KeySet",
        }
    }

    /// Number of array members of a message structure; keys are maps.
    pub const fn arity(self) -> Option<u64> {
        match self {
            EnvelopeKind::Encrypt0 => Some(3),
            EnvelopeKind::Mac => Some(5),
            EnvelopeKind::Sign
            | EnvelopeKind::Sign1
            | EnvelopeKind::Encrypt
            | EnvelopeKind::Mac0 => Some(4),
            EnvelopeKind::Key | EnvelopeKind::KeySet => None,
        }
    }

    const fn arity_text(self) -> &'static str {
        match self {
            EnvelopeKind::Encrypt0 => "3",
            EnvelopeKind::Mac => "5",
            _ => "4",
        }
    }

    pub const fn tag(self) -> Option<u64> {
        match self {
            EnvelopeKind::Sign => Some(TAG_COSE_SIGN),
            EnvelopeKind::Sign1 => Some(TAG_COSE_SIGN1),
            EnvelopeKind::Encrypt => Some(TAG_COSE_ENCRYPT),
            EnvelopeKind::Encrypt0 => Some(TAG_COSE_ENCRYPT0),
            EnvelopeKind::Mac => Some(TAG_COSE_MAC),
            EnvelopeKind::Mac0 => Some(TAG_COSE_MAC0),
            EnvelopeKind::Key | EnvelopeKind::KeySet => None,
        }
    }

    pub fn from_tag(tag: u64) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.tag() == Some(tag))
    }

    /// Kind selected by a media type, e.g. `application/cose; cose-type="cose-sign1"`.
    pub fn from_media_type(media_type: &str) -> Option<Self> {
        let mut parts = media_type.split(';').map(str::trim);
        let essence = parts.next()?.to_ascii_lowercase();
        match essence.as_str() {
            "application/cose-key" => Some(EnvelopeKind::Key),
            "application/cose-key-set" => Some(EnvelopeKind::KeySet),
            "application/cose" => {
                let cose_type = parts.find_map(|parameter| {
                    let (key, value) = parameter.split_once('=')?;
                    key.trim()
                        .eq_ignore_ascii_case("cose-type")
                        .then(|| value.trim().trim_matches('"').to_ascii_lowercase())
                })?;
                match cose_type.as_str() {
                    "cose-sign" => Some(EnvelopeKind::Sign),
                    "cose-sign1" => Some(EnvelopeKind::Sign1),
                    "cose-encrypt" => Some(EnvelopeKind::Encrypt),
                    "cose-encrypt0" => Some(EnvelopeKind::Encrypt0),
                    "cose-mac" => Some(EnvelopeKind::Mac),
                    "cose-mac0" => Some(EnvelopeKind::Mac0),
                    _ => None,
                }
            }
            _ => None,
        }
    }
}

/// Decode `buffer` as one COSE structure of the given kind.
pub fn decode<'a>(
    kind: EnvelopeKind,
    buffer: &'a [u8],
    config: &DissectorConfig,
) -> Dissection<'a> {
    trace!("Enter decode");
    let mut walker = Walker::new(
        Registries::global(),
        SourceId::FRAME,
        config.max_nesting_depth,
    );
    let mut d = CBORDecoder::new(buffer);
    let root = decode_at(&mut walker, &mut d, kind);
    Dissection::new(buffer, root)
}

/// Decode one structure at the cursor and flag anything behind it.
pub(crate) fn decode_at(w: &mut Walker, d: &mut CBORDecoder, kind: EnvelopeKind) -> Record {
    let extent = d.clone().skip();
    let mut root = structure(w, d, kind);
    if let Ok(extent) = extent {
        d.seek(extent.end);
        if !d.finished() {
            debug!("{} bytes after {}", d.remaining_buffer().len(), kind.name());
            root.note(
                Severity::Warning,
                format!("trailing bytes after {}", kind.name()),
                d.position()..d.buffer().len(),
            );
        }
    }
    root
}

fn structure(w: &mut Walker, d: &mut CBORDecoder, kind: EnvelopeKind) -> Record {
    match kind {
        EnvelopeKind::Key => param_map(w, d, kind.name(), MapKind::Key, None).0,
        EnvelopeKind::KeySet => list(w, d, kind.name(), |w, d, _| {
            param_map(w, d, EnvelopeKind::Key.name(), MapKind::Key, None).0
        }),
        _ => message(w, d, kind),
    }
}

/// Sequential decoding of the members of a fixed-layout array.
struct Members<'p> {
    parent: &'p mut Record,
    declared: u64,
    decoded: u64,
    stopped: bool,
}

impl<'p> Members<'p> {
    fn new(parent: &'p mut Record, declared: u64) -> Self {
        Members {
            parent,
            declared,
            decoded: 0,
            stopped: false,
        }
    }

    fn next<'r, 'a>(
        &mut self,
        w: &mut Walker<'r>,
        d: &mut CBORDecoder<'a>,
        decode: impl FnOnce(&mut Walker<'r>, &mut CBORDecoder<'a>) -> Record,
    ) {
        if self.stopped {
            return;
        }
        if d.finished() {
            let range = self.parent.range.start..d.position();
            self.parent.error(
                DissectError::MalformedCount {
                    declared: self.declared,
                    decoded: self.decoded,
                },
                range,
            );
            self.stopped = true;
            return;
        }
        if w.child(self.parent, d, decode) {
            self.decoded += 1;
        } else {
            self.stopped = true;
        }
    }

    fn finish(self, d: &CBORDecoder) {
        if !self.stopped {
            self.parent.close(d.position());
        }
    }
}

/// Read an array head, checking the member count against `expected`. Tags in front of the head
/// become records of their own.
fn array_head(
    w: &mut Walker,
    d: &mut CBORDecoder,
    name: impl Into<Cow<'static, str>>,
    expected: impl Fn(u64) -> bool,
    expected_text: &'static str,
) -> Result<(Record, u64), Record> {
    let name = name.into();
    let start = d.position();
    let chunk = match d.require(MajorType::Array) {
        Ok(chunk) => chunk,
        Err(error) => return Err(w.failed(name, error.into(), start..d.position())),
    };
    let head_start = chunk.span.end - head_len(chunk.minor);
    let mut record = w.record(name, Value::Array(chunk.argument), start..chunk.span.end);
    for &tag in &chunk.tags {
        record.push(w.record("tag", Value::Tag(tag), start..head_start));
    }
    if !expected(chunk.argument) {
        record.error(
            DissectError::ArityMismatch {
                expected: expected_text,
                found: chunk.argument,
            },
            start..chunk.span.end,
        );
        return Err(record);
    }
    Ok((record, chunk.argument))
}

fn message(w: &mut Walker, d: &mut CBORDecoder, kind: EnvelopeKind) -> Record {
    trace!("Enter message");
    let arity = kind.arity().unwrap_or_default();
    let (mut record, count) =
        match array_head(w, d, kind.name(), |n| n == arity, kind.arity_text()) {
            Ok(head) => head,
            Err(record) => return record,
        };
    // the innermost tag is the one that names the structure
    if let Some(Value::Tag(tag)) = record.children.last().map(|tag| tag.value.clone()) {
        if let Some(other) = EnvelopeKind::from_tag(tag).filter(|other| *other != kind) {
            let range = record.range.clone();
            record.note(
                Severity::Warning,
                format!("tag {tag} is that of {}, decoding as {}", other.name(), kind.name()),
                range,
            );
        }
    }

    let mut members = Members::new(&mut record, count);
    let mut principal = None;
    members.next(w, d, |w, d| {
        let (record, alg) = protected(w, d);
        principal = alg;
        record
    });
    members.next(w, d, |w, d| {
        param_map(w, d, "unprotected", MapKind::Header, principal).0
    });
    match kind {
        EnvelopeKind::Sign => {
            members.next(w, d, |w, d| content(w, d, "payload"));
            members.next(w, d, |w, d| {
                list(w, d, "signatures", |w, d, _| signature(w, d))
            });
        }
        EnvelopeKind::Sign1 => {
            members.next(w, d, |w, d| content(w, d, "payload"));
            members.next(w, d, |w, d| typed(w, d, "signature", MajorType::Bytes));
        }
        EnvelopeKind::Encrypt => {
            members.next(w, d, |w, d| content(w, d, "ciphertext"));
            members.next(w, d, recipients);
        }
        EnvelopeKind::Encrypt0 => {
            members.next(w, d, |w, d| content(w, d, "ciphertext"));
        }
        EnvelopeKind::Mac => {
            members.next(w, d, |w, d| content(w, d, "payload"));
            members.next(w, d, |w, d| typed(w, d, "tag", MajorType::Bytes));
            members.next(w, d, recipients);
        }
        EnvelopeKind::Mac0 => {
            members.next(w, d, |w, d| content(w, d, "payload"));
            members.next(w, d, |w, d| typed(w, d, "tag", MajorType::Bytes));
        }
        EnvelopeKind::Key | EnvelopeKind::KeySet => {}
    }
    members.finish(d);
    record
}

/// Payload or ciphertext: a byte string, or nil when it is transported separately.
fn content(w: &mut Walker, d: &mut CBORDecoder, name: &'static str) -> Record {
    let detached = d
        .peek()
        .is_ok_and(|chunk| chunk.tags.is_empty() && chunk.major == MajorType::Simple && chunk.minor == 22);
    if detached {
        let start = d.position();
        d.seek(start + 1);
        let mut record = w.record(name, Value::Null, start..start + 1);
        record.note(Severity::Note, "detached content", start..start + 1);
        return record;
    }
    typed(w, d, name, MajorType::Bytes)
}

fn signature(w: &mut Walker, d: &mut CBORDecoder) -> Record {
    let (mut record, count) = match array_head(w, d, "COSE_Signature", |n| n == 3, "3") {
        Ok(head) => head,
        Err(record) => return record,
    };
    let mut members = Members::new(&mut record, count);
    let mut principal = None;
    members.next(w, d, |w, d| {
        let (record, alg) = protected(w, d);
        principal = alg;
        record
    });
    members.next(w, d, |w, d| {
        param_map(w, d, "unprotected", MapKind::Header, principal).0
    });
    members.next(w, d, |w, d| typed(w, d, "signature", MajorType::Bytes));
    members.finish(d);
    record
}

fn recipients(w: &mut Walker, d: &mut CBORDecoder) -> Record {
    list(w, d, "recipients", |w, d, _| recipient(w, d))
}

fn recipient(w: &mut Walker, d: &mut CBORDecoder) -> Record {
    let (mut record, count) =
        match array_head(w, d, "COSE_recipient", |n| n == 3 || n == 4, "3 or 4") {
            Ok(head) => head,
            Err(record) => return record,
        };
    let mut members = Members::new(&mut record, count);
    let mut principal = None;
    members.next(w, d, |w, d| {
        let (record, alg) = protected(w, d);
        principal = alg;
        record
    });
    members.next(w, d, |w, d| {
        param_map(w, d, "unprotected", MapKind::Header, principal).0
    });
    members.next(w, d, |w, d| content(w, d, "ciphertext"));
    if count == 4 {
        members.next(w, d, recipients);
    }
    members.finish(d);
    record
}

#[cfg(test)]
mod test_envelope {
    use super::*;
    use hexlit::hex;
    use rstest::rstest;

    // RFC 9052 C.2.1: COSE_Sign1 with ES256, kid '11'
    const SIGN1_TV: &[u8] = &hex!("d28443a10126a10442313154546869732069732074686520636f6e74656e742e58408eb33e4ca31d1c465ab05aac34cc6b23d58fef5c083106c4d25a91aef0b0117e2af9a291aa32e14ab834dc56ed2a223444547e01f11d3b0916e5a4c345cacb36");

    // RFC 9052 C.4.2: COSE_Encrypt0 with AES-CCM-16-64-128, Partial IV 61a7
    const ENCRYPT0_TV: &[u8] = &hex!("d08343a1010aa1064261a7581c252a8911d465c125b6764739700f0141ed09192de139e053bd09abca");

    fn config() -> DissectorConfig {
        DissectorConfig::default()
    }

    fn errors(dissection: &Dissection) -> Vec<DissectError> {
        dissection
            .diagnostics()
            .iter()
            .filter_map(|d| d.kind.clone())
            .collect()
    }

    #[test]
    fn test_sign1() {
        let dissection = decode(EnvelopeKind::Sign1, SIGN1_TV, &config());
        let root = &dissection.root;
        assert!(dissection.diagnostics().is_empty());
        assert_eq!("COSE_Sign1", root.name);
        assert_eq!(0..SIGN1_TV.len(), root.range);
        assert_eq!(Value::Tag(18), root.children[0].value);
        assert_eq!(
            Value::Named {
                code: -7,
                name: "ES256"
            },
            root.find("alg").unwrap().value
        );
        assert_eq!(Value::Bytes(9..11), root.find("kid").unwrap().value);
        assert_eq!(64, match &root.find("signature").unwrap().value {
            Value::Bytes(range) => range.len(),
            _ => 0,
        });
    }

    #[test]
    fn test_encrypt0() {
        let dissection = decode(EnvelopeKind::Encrypt0, ENCRYPT0_TV, &config());
        let root = &dissection.root;
        assert!(dissection.diagnostics().is_empty());
        assert_eq!(
            Value::Named {
                code: 10,
                name: "AES-CCM-16-64-128"
            },
            root.find("alg").unwrap().value
        );
        assert!(root.find("Partial IV").is_some());
        assert!(root.find("ciphertext").is_some());
    }

    #[test]
    fn test_tag_of_other_kind() {
        let dissection = decode(EnvelopeKind::Mac0, SIGN1_TV, &config());
        let warning = &dissection.root.diagnostics[0];
        assert_eq!(Severity::Warning, warning.severity);
        assert!(warning.message.contains("COSE_Sign1"));
    }

    #[test]
    fn test_arity_mismatch() {
        let dissection = decode(EnvelopeKind::Encrypt0, SIGN1_TV, &config());
        assert_eq!(
            vec![DissectError::ArityMismatch {
                expected: "3",
                found: 4
            }],
            errors(&dissection)
        );
        assert_eq!(1, dissection.root.children.len());
    }

    #[test]
    fn test_detached_payload_and_trailing_bytes() {
        // [h'', {}, nil, h'00'], 0
        let input = hex!("8440a0f6410000");
        let dissection = decode(EnvelopeKind::Mac0, &input, &config());
        let payload = dissection.root.find("payload").unwrap();
        assert_eq!(Value::Null, payload.value);
        let trailing = dissection.root.diagnostics.last().unwrap();
        assert_eq!(6..7, trailing.range);
        assert!(errors(&dissection).is_empty());
    }

    #[test]
    fn test_truncated_members() {
        // COSE_Encrypt0 declaring 3 members, holding 2
        let input = hex!("8340a0");
        let dissection = decode(EnvelopeKind::Encrypt0, &input, &config());
        assert_eq!(
            vec![DissectError::MalformedCount {
                declared: 3,
                decoded: 2
            }],
            errors(&dissection)
        );
    }

    #[test]
    fn test_recipients() {
        // COSE_Encrypt: [h'', {}, h'aa', [[h'', {1: -25, -1: {1: 1}}, h'']]]
        let input = hex!("8440a041aa818340a201381820a1010140");
        let dissection = decode(EnvelopeKind::Encrypt, &input, &config());
        assert!(dissection.diagnostics().is_empty(), "{}", dissection.render());
        let recipient = dissection.root.find("COSE_recipient").unwrap();
        assert_eq!(
            Value::Named {
                code: -25,
                name: "ECDH-ES + HKDF-256"
            },
            recipient.find("alg").unwrap().value
        );
        assert!(recipient.find("ephemeral key").unwrap().find("kty").is_some());
    }

    #[rstest]
    #[case(3, false)]
    #[case(20, true)]
    #[case(1000, true)]
    #[case(100_000, true)]
    fn test_recipient_nesting_limit(#[case] depth: usize, #[case] limited: bool) {
        // COSE_Encrypt whose recipient chain is `depth` levels deep
        let mut input = hex!("8440a040").to_vec();
        for _ in 0..depth {
            input.extend_from_slice(&hex!("818440a040"));
        }
        input.push(0x80);
        let dissection = decode(EnvelopeKind::Encrypt, &input, &config());
        assert_eq!(
            limited,
            dissection.has_error(|e| matches!(e, DissectError::RecursionLimitExceeded { .. }))
        );
        assert!(!dissection.has_error(|e| e.is_structural()
            && !matches!(e, DissectError::RecursionLimitExceeded { .. })));
    }

    #[test]
    fn test_key_set() {
        // [{1: 1, -1: 6, -2: h'01'}, {1: 4, -1: h'02'}]
        let input = hex!("82a301012006214101a20104204102");
        let dissection = decode(EnvelopeKind::KeySet, &input, &config());
        assert!(dissection.diagnostics().is_empty());
        let keys = &dissection.root.children;
        assert_eq!(2, keys.len());
        assert_eq!(
            Value::Named {
                code: 6,
                name: "Ed25519"
            },
            keys[0].children[1].value
        );
        assert_eq!("k", keys[1].children[1].name);
    }

    #[rstest]
    #[case("application/cose; cose-type=\"cose-sign1\"", Some(EnvelopeKind::Sign1))]
    #[case("Application/COSE;cose-type=cose-mac", Some(EnvelopeKind::Mac))]
    #[case("application/cose-key-set", Some(EnvelopeKind::KeySet))]
    #[case("application/cose", None)]
    #[case("application/cbor", None)]
    fn test_media_types(#[case] media_type: &str, #[case] expected: Option<EnvelopeKind>) {
        assert_eq!(expected, EnvelopeKind::from_media_type(media_type));
    }

    #[test]
    fn test_tags() {
        for kind in EnvelopeKind::ALL {
            if let Some(tag) = kind.tag() {
                assert_eq!(Some(kind), EnvelopeKind::from_tag(tag));
            }
        }
        assert_eq!(None, EnvelopeKind::from_tag(61));
    }
}

//! Header maps and COSE_Key maps, decoded through the parameter registries.
use crate::item::{generic, label_name, read_label, Walker};
use crate::registry::{Label, ParamDecoder, Registry};
use defmt_or_log::trace;
use edhoc_lens_shared::*;
use std::borrow::Cow;
use std::collections::HashSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum MapKind {
    Header,
    Key,
}

impl MapKind {
    fn registry<'r>(self, w: &Walker<'r>) -> &'r Registry {
        match self {
            MapKind::Header => &w.registries.headers,
            MapKind::Key => &w.registries.keys,
        }
    }

    fn principal_label(self) -> Label {
        match self {
            MapKind::Header => Label::Int(HEADER_ALG),
            MapKind::Key => Label::Int(KEY_KTY),
        }
    }
}

#[derive(Debug, Default)]
struct Prescan {
    principal: Option<i64>,
    duplicates: Vec<Label>,
}

/// Look over the labels of a map before decoding it, so that parameters listed ahead of the
/// algorithm (or key type) are still interpreted in its light.
fn prescan(mut d: CBORDecoder, declared: u64, principal_label: &Label) -> Prescan {
    let mut result = Prescan::default();
    let mut seen = HashSet::new();
    for _ in 0..declared {
        if d.finished() {
            break;
        }
        match read_label(&mut d) {
            Ok(Some(label)) => {
                if label == *principal_label {
                    // the last occurrence counts, as for every duplicate label
                    result.principal = d.clone().int().ok();
                }
                if !seen.insert(label.clone()) && !result.duplicates.contains(&label) {
                    result.duplicates.push(label);
                }
            }
            Ok(None) => {
                if d.skip().is_err() {
                    break;
                }
            }
            Err(_) => break,
        }
        if d.skip().is_err() {
            break;
        }
    }
    result
}

/// Decode a header or key map. Returns the record and the principal in effect for the map:
/// its own algorithm (or key type), or `inherited` if it has none.
pub(crate) fn param_map(
    w: &mut Walker,
    d: &mut CBORDecoder,
    name: impl Into<Cow<'static, str>>,
    kind: MapKind,
    inherited: Option<i64>,
) -> (Record, Option<i64>) {
    let name = name.into();
    let start = d.position();
    let chunk = match d.require(MajorType::Map) {
        Ok(chunk) => chunk,
        Err(error) => return (w.failed(name, error.into(), start..d.position()), inherited),
    };
    let mut record = w.record(name, Value::Map(chunk.argument), chunk.span.clone());
    let scan = prescan(d.clone(), chunk.argument, &kind.principal_label());
    for label in &scan.duplicates {
        record.note(
            Severity::Warning,
            format!("label {label} appears more than once, the last one applies"),
            chunk.span.clone(),
        );
    }
    let principal = scan.principal.or(inherited);
    let nested = w.nested(|w| {
        w.entries(&mut record, d, chunk.argument, |w, d, label| {
            param_value(w, d, kind, principal, label)
        })
    });
    if let Err(error) = nested {
        record.error(error, chunk.span.clone());
    }
    (record, principal)
}

fn param_value(
    w: &mut Walker,
    d: &mut CBORDecoder,
    kind: MapKind,
    principal: Option<i64>,
    label: Option<&Label>,
) -> Record {
    let spec = label.and_then(|label| kind.registry(w).lookup(principal, label).copied());
    match spec {
        Some(spec) => param(w, d, spec.name, spec.decoder),
        None => generic(w, d, label_name(label)),
    }
}

fn is_int(major: MajorType) -> bool {
    matches!(major, MajorType::Unsigned | MajorType::Negative)
}

/// Decode one parameter value with the decoder its registry entry names.
///
/// A value of the wrong type is still shown, with an error attached.
fn param(w: &mut Walker, d: &mut CBORDecoder, name: &'static str, decoder: ParamDecoder) -> Record {
    let chunk = match d.peek() {
        Ok(chunk) if chunk.tags.is_empty() => chunk,
        _ => return generic(w, d, name),
    };
    let major = chunk.major;
    match decoder {
        ParamDecoder::Generic => generic(w, d, name),
        ParamDecoder::Algorithm if is_int(major) => {
            let mut record = named_int(w, d, name, algorithm_name);
            if let Value::Integer(code) = record.value {
                let range = record.range.clone();
                record.error(DissectError::UnknownAlgorithm(code as i64), range);
            }
            record
        }
        ParamDecoder::KeyType if is_int(major) => {
            named_int(w, d, name, |code| KeyType::from_code(code).map(KeyType::name))
        }
        ParamDecoder::Curve if is_int(major) => {
            named_int(w, d, name, |code| Curve::from_code(code).map(Curve::name))
        }
        ParamDecoder::Algorithm
        | ParamDecoder::KeyType
        | ParamDecoder::Curve
        | ParamDecoder::ContentType
        | ParamDecoder::Text
            if major == MajorType::Text =>
        {
            generic(w, d, name)
        }
        ParamDecoder::ContentType if major == MajorType::Unsigned => generic(w, d, name),
        ParamDecoder::Bytes | ParamDecoder::CertificateChain if major == MajorType::Bytes => {
            generic(w, d, name)
        }
        ParamDecoder::CertificateChain if major == MajorType::Array => {
            list(w, d, name, |w, d, _| typed(w, d, "certificate", MajorType::Bytes))
        }
        ParamDecoder::CriticalList if major == MajorType::Array => {
            list(w, d, name, |w, d, _| generic(w, d, "label"))
        }
        ParamDecoder::KeyOps if major == MajorType::Array => list(w, d, name, |w, d, _| {
            if d.peek().is_ok_and(|c| c.is_int()) {
                named_int(w, d, "operation", key_operation_name)
            } else {
                generic(w, d, "operation")
            }
        }),
        ParamDecoder::Thumbprint if major == MajorType::Array => {
            list(w, d, name, |w, d, index| match index {
                0 if d.peek().is_ok_and(|c| c.is_int()) => {
                    named_int(w, d, "hash algorithm", algorithm_name)
                }
                0 => generic(w, d, "hash algorithm"),
                _ => typed(w, d, "hash value", MajorType::Bytes),
            })
        }
        ParamDecoder::CoseKey if major == MajorType::Map => {
            param_map(w, d, name, MapKind::Key, None).0
        }
        _ => {
            let expected = match decoder {
                ParamDecoder::CriticalList
                | ParamDecoder::KeyOps
                | ParamDecoder::Thumbprint
                | ParamDecoder::CertificateChain => MajorType::Array,
                ParamDecoder::Text => MajorType::Text,
                ParamDecoder::CoseKey => MajorType::Map,
                ParamDecoder::Bytes => MajorType::Bytes,
                _ => MajorType::Unsigned,
            };
            typed(w, d, name, expected)
        }
    }
}

/// Decode an item of any type, with an error attached unless it is of the `expected` type.
pub(crate) fn typed(
    w: &mut Walker,
    d: &mut CBORDecoder,
    name: impl Into<Cow<'static, str>>,
    expected: MajorType,
) -> Record {
    let found = d.peek().map(|chunk| chunk.major);
    let mut record = generic(w, d, name);
    if let Ok(found) = found {
        if found != expected && !(expected == MajorType::Unsigned && found == MajorType::Negative)
        {
            let range = record.range.clone();
            record.error(DissectError::UnexpectedMajorType { expected, found }, range);
        }
    }
    record
}

/// Decode an integer and show the name registered for it, if there is one.
pub(crate) fn named_int(
    w: &mut Walker,
    d: &mut CBORDecoder,
    name: impl Into<Cow<'static, str>>,
    lookup: impl Fn(i64) -> Option<&'static str>,
) -> Record {
    let start = d.position();
    match d.int() {
        Ok(code) => {
            let value = match lookup(code) {
                Some(label) => Value::Named {
                    code: code as i128,
                    name: label,
                },
                None => Value::Integer(code as i128),
            };
            w.record(name, value, start..d.position())
        }
        Err(error) => w.failed(name, error.into(), start..d.position()),
    }
}

/// Decode an array, each element with `element`.
pub(crate) fn list<'a>(
    w: &mut Walker,
    d: &mut CBORDecoder<'a>,
    name: impl Into<Cow<'static, str>>,
    mut element: impl FnMut(&mut Walker, &mut CBORDecoder<'a>, u64) -> Record,
) -> Record {
    let name = name.into();
    let start = d.position();
    let count = match d.array() {
        Ok(count) => count,
        Err(error) => return w.failed(name, error.into(), start..d.position()),
    };
    let mut record = w.record(name, Value::Array(count), start..d.position());
    let nested = w.nested(|w| w.elements(&mut record, d, count, |w, d, i| element(w, d, i)));
    if let Err(error) = nested {
        let range = record.range.clone();
        record.error(error, range);
    }
    record
}

/// Decode a protected header: a byte string wrapping a header map, or empty.
pub(crate) fn protected(w: &mut Walker, d: &mut CBORDecoder) -> (Record, Option<i64>) {
    trace!("Enter protected");
    let start = d.position();
    let chunk = match d.require(MajorType::Bytes) {
        Ok(chunk) => chunk,
        Err(error) => return (w.failed("protected", error.into(), start..d.position()), None),
    };
    let mut record = w.record("protected", Value::Bytes(chunk.content.clone()), chunk.span.clone());
    if chunk.content.is_empty() {
        return (record, None);
    }
    // positions stay those of the outer buffer
    let mut inner = CBORDecoder::at(&d.buffer()[..chunk.content.end], chunk.content.start);
    let (map, principal) = param_map(w, &mut inner, "header map", MapKind::Header, None);
    let complete = map.iter().all(|r| r.diagnostics.iter().all(|diag| diag.kind.is_none()));
    if complete && !inner.finished() {
        record.note(
            Severity::Warning,
            "trailing bytes after the protected header map",
            inner.position()..chunk.content.end,
        );
    }
    record.push(map);
    (record, principal)
}

//! Decoding of EDHOC messages and plaintexts (RFC 9528, Section 5 and 6).
//!
//! Each parser appends the records of the fields it decodes to a parent record and returns what
//! the session tracker needs from them. Parsers stop at the first field whose extent is unknown;
//! everything up to that point stays in the tree.
use crate::header::{list, named_int, param_map, typed, MapKind};
use crate::item::{generic, Walker};
use defmt_or_log::trace;
use edhoc_lens_shared::*;
use std::ops::Range;

/// Rough shape of a captured buffer, before its message number is known.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Shape {
    Message1,
    Error,
    Other,
}

/// Guess whether a CBOR sequence is a message_1, an error, or something else.
///
/// An error has exactly two items, the first an integer. A message_1 starts with a method
/// (unsigned), SUITES_I (integer or array) and G_X (byte string), followed by at least C_I.
pub(crate) fn classify(buffer: &[u8], start: usize) -> Shape {
    let mut d = CBORDecoder::at(buffer, start);
    let mut items = Vec::new();
    while !d.finished() && items.len() < 5 {
        let Ok(chunk) = d.peek() else { break };
        if d.skip().is_err() {
            break;
        }
        items.push(chunk);
    }
    match items.as_slice() {
        [first, _] if first.is_int() && first.tags.is_empty() => Shape::Error,
        [method, suites, g_x, _, ..]
            if method.major == MajorType::Unsigned
                && (suites.is_int() || suites.major == MajorType::Array)
                && g_x.major == MajorType::Bytes =>
        {
            Shape::Message1
        }
        _ => Shape::Other,
    }
}

/// Fields of a CBOR sequence, decoded one after the other into `parent`.
pub(crate) struct Sequence<'p> {
    parent: &'p mut Record,
    complete: bool,
}

impl<'p> Sequence<'p> {
    pub fn new(parent: &'p mut Record) -> Self {
        Sequence {
            parent,
            complete: true,
        }
    }

    /// Decode a field that has to be present.
    pub fn required<'r, 'a, T>(
        &mut self,
        w: &mut Walker<'r>,
        d: &mut CBORDecoder<'a>,
        name: &'static str,
        decode: impl FnOnce(&mut Walker<'r>, &mut CBORDecoder<'a>) -> (Record, Option<T>),
    ) -> Option<T> {
        if !self.complete {
            return None;
        }
        if d.finished() {
            let end = d.position();
            self.parent.error(DissectError::TruncatedInput, end..end);
            self.parent
                .note(Severity::Error, format!("{name} is missing"), end..end);
            self.complete = false;
            return None;
        }
        let mut value = None;
        self.complete = w.child(self.parent, d, |w, d| {
            let (record, extracted) = decode(w, d);
            value = extracted;
            record
        });
        value
    }

    /// Whether every field so far could be delimited.
    pub fn complete(&self) -> bool {
        self.complete
    }
}

fn int_of(record: &Record) -> Option<i64> {
    match record.value {
        Value::Integer(n) | Value::Named { code: n, .. } => i64::try_from(n).ok(),
        _ => None,
    }
}

fn bytes_of(buffer: &[u8], record: &Record) -> Option<Vec<u8>> {
    match &record.value {
        Value::Bytes(range) if record.diagnostics.is_empty() => {
            buffer.get(range.clone()).map(<[u8]>::to_vec)
        }
        _ => None,
    }
}

fn method_field(w: &mut Walker, d: &mut CBORDecoder) -> (Record, Option<u64>) {
    let record = named_int(w, d, "METHOD", |code| {
        u64::try_from(code)
            .ok()
            .and_then(EDHOCMethod::from_u64)
            .map(EDHOCMethod::name)
    });
    let method = int_of(&record).and_then(|n| u64::try_from(n).ok());
    (record, method)
}

/// SUITES_I: the selected suite, or an array of supported suites ending with the selected one.
fn suites_field(
    w: &mut Walker,
    d: &mut CBORDecoder,
    name: &'static str,
) -> (Record, Option<Vec<i64>>) {
    let is_array = d.peek().is_ok_and(|chunk| chunk.major == MajorType::Array);
    let record = if is_array {
        list(w, d, name, |w, d, _| typed(w, d, "suite", MajorType::Unsigned))
    } else {
        typed(w, d, name, MajorType::Unsigned)
    };
    let suites = if is_array {
        record.children.iter().filter_map(int_of).collect()
    } else {
        int_of(&record).into_iter().collect()
    };
    (record, Some(suites))
}

/// A connection identifier: a compact integer in -24..=23, or a byte string.
pub(crate) fn conn_id_field(
    w: &mut Walker,
    d: &mut CBORDecoder,
    name: &'static str,
) -> (Record, Option<ConnId>) {
    let chunk = d.peek().ok();
    match chunk.as_ref().map(|chunk| chunk.major) {
        Some(MajorType::Unsigned | MajorType::Negative) => {
            let mut record = generic(w, d, name);
            let id = int_of(&record).and_then(ConnId::from_int);
            if id.is_none() {
                let range = record.range.clone();
                record.error(DissectError::OutOfRange, range);
            }
            (record, id)
        }
        _ => {
            let record = typed(w, d, name, MajorType::Bytes);
            let id = bytes_of(d.buffer(), &record).map(|bytes| ConnId::from_slice(&bytes));
            (record, id)
        }
    }
}

fn bytes_field(
    w: &mut Walker,
    d: &mut CBORDecoder,
    name: &'static str,
) -> (Record, Option<Range<usize>>) {
    let record = typed(w, d, name, MajorType::Bytes);
    let range = match &record.value {
        Value::Bytes(range) if record.diagnostics.is_empty() => Some(range.clone()),
        _ => None,
    };
    (record, range)
}

/// ID_CRED_x: a header map, or the compact form of a lone `kid`.
fn id_cred_field(
    w: &mut Walker,
    d: &mut CBORDecoder,
    name: &'static str,
) -> (Record, Option<Vec<u8>>) {
    let is_map = d.peek().is_ok_and(|chunk| chunk.major == MajorType::Map);
    if is_map {
        let start = d.position();
        let (record, _) = param_map(w, d, name, MapKind::Header, None);
        let credential = credential_by_value(&d.buffer()[..d.position()], start);
        (record, credential)
    } else {
        let mut record = generic(w, d, name);
        let range = record.range.clone();
        record.note(Severity::Note, "compact kid", range);
        (record, None)
    }
}

/// The encoded `kccs` value of an ID_CRED_x map, which then is CRED_x itself.
fn credential_by_value(buffer: &[u8], map_start: usize) -> Option<Vec<u8>> {
    // walk the map again to find the extent of the value, behind its label
    let mut d = CBORDecoder::at(buffer, map_start);
    let entries = d.map().ok()?;
    for _ in 0..entries {
        let label = d.peek().ok()?.int();
        d.skip().ok()?;
        let value = d.skip().ok()?;
        if label == Some(HEADER_KCCS as i128) {
            return buffer.get(value).map(<[u8]>::to_vec);
        }
    }
    None
}

#[derive(Debug, Default)]
pub(crate) struct Message1 {
    pub method: Option<u64>,
    pub suites: Vec<i64>,
    pub g_x: Option<Vec<u8>>,
    pub c_i: Option<ConnId>,
    pub complete: bool,
}

impl Message1 {
    /// The selected cipher suite is the last one listed.
    pub fn selected_suite(&self) -> Option<i64> {
        self.suites.last().copied()
    }
}

/// message_1 = (METHOD, SUITES_I, G_X, C_I, ? EAD_1). The cursor is left at EAD_1.
pub(crate) fn message_1(w: &mut Walker, d: &mut CBORDecoder, parent: &mut Record) -> Message1 {
    trace!("Enter message_1");
    let mut fields = Sequence::new(parent);
    let method = fields.required(w, d, "METHOD", method_field);
    let suites = fields.required(w, d, "SUITES_I", |w, d| suites_field(w, d, "SUITES_I"));
    let g_x = fields.required(w, d, "G_X", |w, d| {
        let (record, range) = bytes_field(w, d, "G_X");
        let g_x = range.and_then(|range| d.buffer().get(range)).map(<[u8]>::to_vec);
        (record, g_x)
    });
    let c_i = fields.required(w, d, "C_I", |w, d| conn_id_field(w, d, "C_I"));
    Message1 {
        method,
        suites: suites.unwrap_or_default(),
        g_x,
        c_i,
        complete: fields.complete(),
    }
}

#[derive(Debug, Default)]
pub(crate) struct Message2 {
    pub g_y: Option<Vec<u8>>,
    /// Position of CIPHERTEXT_2 in the buffer.
    pub ciphertext_2: Option<Range<usize>>,
}

/// message_2 = (bstr G_Y || CIPHERTEXT_2). G_Y is as long as a public key of the suite curve.
pub(crate) fn message_2(
    w: &mut Walker,
    d: &mut CBORDecoder,
    parent: &mut Record,
    g_y_len: usize,
) -> Message2 {
    trace!("Enter message_2");
    let mut fields = Sequence::new(parent);
    let split = fields.required(w, d, "G_Y_CIPHERTEXT_2", |w, d| {
        let (mut record, range) = bytes_field(w, d, "G_Y_CIPHERTEXT_2");
        let Some(range) = range else {
            return (record, None);
        };
        if range.len() <= g_y_len {
            let whole = record.range.clone();
            record.error(DissectError::InvalidLength(range.len()), whole);
            return (record, None);
        }
        let middle = range.start + g_y_len;
        let g_y = w.record("G_Y", Value::Bytes(range.start..middle), range.start..middle);
        let ciphertext = w.record(
            "CIPHERTEXT_2",
            Value::Bytes(middle..range.end),
            middle..range.end,
        );
        record.push(g_y);
        record.push(ciphertext);
        (record, Some((range.start..middle, middle..range.end)))
    });
    match split {
        Some((g_y, ciphertext_2)) => Message2 {
            g_y: d.buffer().get(g_y).map(<[u8]>::to_vec),
            ciphertext_2: Some(ciphertext_2),
        },
        None => Message2::default(),
    }
}

/// message_3 = (CIPHERTEXT_3) and message_4 = (CIPHERTEXT_4); returns the ciphertext position.
pub(crate) fn message_3_or_4(
    w: &mut Walker,
    d: &mut CBORDecoder,
    parent: &mut Record,
    name: &'static str,
) -> Option<Range<usize>> {
    trace!("Enter message_3_or_4");
    let mut fields = Sequence::new(parent);
    fields.required(w, d, name, |w, d| bytes_field(w, d, name))
}

#[derive(Debug, Default)]
pub(crate) struct Plaintext2 {
    pub c_r: Option<ConnId>,
    /// CRED_R, when ID_CRED_R carries it by value.
    pub cred_r: Option<Vec<u8>>,
    pub complete: bool,
}

/// PLAINTEXT_2 = (C_R, ID_CRED_R, Signature_or_MAC_2, ? EAD_2). The cursor is left at EAD_2.
pub(crate) fn plaintext_2(w: &mut Walker, d: &mut CBORDecoder, parent: &mut Record) -> Plaintext2 {
    trace!("Enter plaintext_2");
    let mut fields = Sequence::new(parent);
    let c_r = fields.required(w, d, "C_R", |w, d| conn_id_field(w, d, "C_R"));
    let cred_r = fields.required(w, d, "ID_CRED_R", |w, d| id_cred_field(w, d, "ID_CRED_R"));
    fields.required(w, d, "Signature_or_MAC_2", |w, d| {
        bytes_field(w, d, "Signature_or_MAC_2")
    });
    Plaintext2 {
        c_r,
        cred_r,
        complete: fields.complete(),
    }
}

#[derive(Debug, Default)]
pub(crate) struct Plaintext3 {
    pub cred_i: Option<Vec<u8>>,
    pub complete: bool,
}

/// PLAINTEXT_3 = (ID_CRED_I, Signature_or_MAC_3, ? EAD_3). The cursor is left at EAD_3.
pub(crate) fn plaintext_3(w: &mut Walker, d: &mut CBORDecoder, parent: &mut Record) -> Plaintext3 {
    trace!("Enter plaintext_3");
    let mut fields = Sequence::new(parent);
    let cred_i = fields.required(w, d, "ID_CRED_I", |w, d| id_cred_field(w, d, "ID_CRED_I"));
    fields.required(w, d, "Signature_or_MAC_3", |w, d| {
        bytes_field(w, d, "Signature_or_MAC_3")
    });
    Plaintext3 {
        cred_i,
        complete: fields.complete(),
    }
}

/// error = (ERR_CODE, ERR_INFO).
pub(crate) fn error(w: &mut Walker, d: &mut CBORDecoder, parent: &mut Record) -> Option<i64> {
    trace!("Enter error");
    let mut fields = Sequence::new(parent);
    let code = fields.required(w, d, "ERR_CODE", |w, d| {
        let record = named_int(w, d, "ERR_CODE", error_code_name);
        let code = int_of(&record);
        (record, code)
    });
    fields.required(w, d, "ERR_INFO", |w, d| {
        let record = match code {
            Some(1) => typed(w, d, "DIAG_MSG", MajorType::Text),
            Some(2) => suites_field(w, d, "SUITES_R").0,
            Some(3) => {
                let mut record = generic(w, d, "ERR_INFO");
                if record.value != Value::Bool(true) {
                    let range = record.range.clone();
                    record.note(Severity::Warning, "expected true", range);
                }
                record
            }
            _ => generic(w, d, "ERR_INFO"),
        };
        (record, Some(()))
    });
    code
}

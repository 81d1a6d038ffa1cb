//! Depth-bounded walk over CBOR items, producing records.
//!
//! Every decoder here takes the cursor it should read from and returns a record, never an error:
//! problems become diagnostics on the record they concern. Containers measure the extent of each
//! member up front (with the iterative skip of the item source) so that one broken member does
//! not prevent decoding the rest.
use crate::registry::{Label, Registries};
use edhoc_lens_shared::*;
use std::borrow::Cow;
use std::ops::Range;

pub(crate) struct Walker<'r> {
    pub registries: &'r Registries,
    pub source: SourceId,
    depth: usize,
    max_depth: usize,
}

impl<'r> Walker<'r> {
    pub fn new(registries: &'r Registries, source: SourceId, max_depth: usize) -> Self {
        Walker {
            registries,
            source,
            depth: 0,
            max_depth,
        }
    }

    /// Run `f` one nesting level deeper, or refuse once the limit is reached.
    pub fn nested<T>(&mut self, f: impl FnOnce(&mut Self) -> T) -> Result<T, DissectError> {
        if self.depth >= self.max_depth {
            return Err(DissectError::RecursionLimitExceeded {
                limit: self.max_depth,
            });
        }
        self.depth += 1;
        let result = f(self);
        self.depth -= 1;
        Ok(result)
    }

    pub fn record(
        &self,
        name: impl Into<Cow<'static, str>>,
        value: Value,
        range: Range<usize>,
    ) -> Record {
        Record::new(name, value, self.source, range)
    }

    /// Record standing in for an item that could not be decoded.
    pub fn failed(
        &self,
        name: impl Into<Cow<'static, str>>,
        error: DissectError,
        range: Range<usize>,
    ) -> Record {
        let mut record = self.record(name, Value::None, range.clone());
        record.error(error, range);
        record
    }

    /// Decode one item with `decode` and append the result to `parent`.
    ///
    /// Afterwards `d` is positioned behind the item, however far `decode` got. Returns false when
    /// the extent of the item cannot be determined; the caller has to stop decoding the
    /// container then.
    pub fn child<'a>(
        &mut self,
        parent: &mut Record,
        d: &mut CBORDecoder<'a>,
        decode: impl FnOnce(&mut Self, &mut CBORDecoder<'a>) -> Record,
    ) -> bool {
        let start = d.position();
        let extent = d.clone().skip();
        let record = decode(self, d);
        let reported = record.iter().any(|r| !r.diagnostics.is_empty());
        parent.push(record);
        match extent {
            Ok(range) => {
                d.seek(range.end);
                true
            }
            Err(error) => {
                if !reported {
                    parent.error(error.into(), start..d.buffer().len());
                }
                false
            }
        }
    }

    /// Decode the `declared` elements of an array whose head was already read.
    pub fn elements<'a>(
        &mut self,
        parent: &mut Record,
        d: &mut CBORDecoder<'a>,
        declared: u64,
        mut decode: impl FnMut(&mut Self, &mut CBORDecoder<'a>, u64) -> Record,
    ) {
        for index in 0..declared {
            if d.finished() {
                let range = parent.range.start..d.position();
                parent.error(
                    DissectError::MalformedCount {
                        declared,
                        decoded: index,
                    },
                    range,
                );
                return;
            }
            if !self.child(parent, d, |w, d| decode(w, d, index)) {
                return;
            }
        }
        parent.close(d.position());
    }

    /// Decode the `declared` entries of a map whose head was already read.
    ///
    /// Integer and text keys become the name of the value's record; other keys are kept as a
    /// record of their own.
    pub fn entries<'a>(
        &mut self,
        parent: &mut Record,
        d: &mut CBORDecoder<'a>,
        declared: u64,
        mut decode: impl FnMut(&mut Self, &mut CBORDecoder<'a>, Option<&Label>) -> Record,
    ) {
        for index in 0..declared {
            let malformed = DissectError::MalformedCount {
                declared,
                decoded: index,
            };
            if d.finished() {
                let range = parent.range.start..d.position();
                parent.error(malformed, range);
                return;
            }
            let key_start = d.position();
            let label = match read_label(d) {
                Ok(label) => label,
                Err(error) => {
                    parent.error(error, key_start..d.buffer().len());
                    return;
                }
            };
            if label.is_none() && !self.child(parent, d, |w, d| generic(w, d, "key")) {
                return;
            }
            if d.finished() {
                let range = parent.range.start..d.position();
                parent.error(malformed, range);
                return;
            }
            let label = label.as_ref();
            let resumable = self.child(parent, d, |w, d| {
                let mut record = decode(w, d, label);
                if label.is_some() {
                    record.range.start = key_start;
                }
                record
            });
            if !resumable {
                return;
            }
        }
        parent.close(d.position());
    }
}

/// Read a map key if it is a plain integer or text label; other keys are left in place.
pub(crate) fn read_label(d: &mut CBORDecoder) -> Result<Option<Label>, DissectError> {
    let chunk = d.peek()?;
    if !chunk.tags.is_empty() {
        return Ok(None);
    }
    let label = match chunk.major {
        MajorType::Unsigned | MajorType::Negative => {
            match chunk.int().and_then(|n| i64::try_from(n).ok()) {
                Some(n) => Label::Int(n),
                None => return Ok(None),
            }
        }
        MajorType::Text => {
            Label::Text(String::from_utf8_lossy(&d.buffer()[chunk.content.clone()]).into_owned())
        }
        _ => return Ok(None),
    };
    d.seek(chunk.span.end);
    Ok(Some(label))
}

pub(crate) fn label_name(label: Option<&Label>) -> Cow<'static, str> {
    match label {
        Some(label) => Cow::Owned(label.to_string()),
        None => Cow::Borrowed("value"),
    }
}

/// Length of an item head, given its additional information.
pub(crate) fn head_len(minor: u8) -> usize {
    match minor {
        24 => 2,
        25 => 3,
        26 => 5,
        27 => 9,
        _ => 1,
    }
}

fn half_to_f64(bits: u16) -> f64 {
    let exponent = (bits >> 10) & 0x1f;
    let mantissa = (bits & 0x3ff) as f64;
    let magnitude = match exponent {
        0 => mantissa * 2f64.powi(-24),
        31 if mantissa == 0.0 => f64::INFINITY,
        31 => f64::NAN,
        e => (1.0 + mantissa / 1024.0) * 2f64.powi(e as i32 - 15),
    };
    if bits & 0x8000 != 0 {
        -magnitude
    } else {
        magnitude
    }
}

/// Value of a decoded head, without any children.
pub(crate) fn chunk_value(buffer: &[u8], chunk: &Chunk) -> Value {
    match chunk.major {
        MajorType::Unsigned | MajorType::Negative => {
            chunk.int().map(Value::Integer).unwrap_or(Value::None)
        }
        MajorType::Bytes => Value::Bytes(chunk.content.clone()),
        MajorType::Text => {
            Value::Text(String::from_utf8_lossy(&buffer[chunk.content.clone()]).into_owned())
        }
        MajorType::Array => Value::Array(chunk.argument),
        MajorType::Map => Value::Map(chunk.argument),
        MajorType::Tag => Value::Tag(chunk.argument),
        MajorType::Simple => match chunk.minor {
            20 => Value::Bool(false),
            21 => Value::Bool(true),
            22 => Value::Null,
            23 => Value::Undefined,
            25 => Value::Float(half_to_f64(chunk.argument as u16)),
            26 => Value::Float(f32::from_bits(chunk.argument as u32) as f64),
            27 => Value::Float(f64::from_bits(chunk.argument)),
            _ => Value::Simple(chunk.argument),
        },
    }
}

/// Wrap `record` in one record per tag, outermost first.
fn wrap_tags(w: &Walker, record: Record, tags: &[u64], start: usize) -> Record {
    let mut current = record;
    for &tag in tags.iter().rev() {
        let range = start..current.range.end;
        let name = std::mem::replace(&mut current.name, Cow::Borrowed("content"));
        current = w.record(name, Value::Tag(tag), range).with_child(current);
    }
    current
}

/// Decode any item, however it is structured.
pub(crate) fn generic(
    w: &mut Walker,
    d: &mut CBORDecoder,
    name: impl Into<Cow<'static, str>>,
) -> Record {
    let name = name.into();
    let start = d.position();
    let chunk = match d.chunk() {
        Ok(chunk) => chunk,
        Err(error) => return w.failed(name, error.into(), start..d.position()),
    };
    let content_start = chunk.span.end - head_len(chunk.minor)
        - (chunk.content.end - chunk.content.start);
    let mut record = w.record(
        name,
        chunk_value(d.buffer(), &chunk),
        content_start..chunk.span.end,
    );
    let nested = match chunk.major {
        MajorType::Array => w.nested(|w| {
            w.elements(&mut record, d, chunk.argument, |w, d, _| {
                generic(w, d, "element")
            })
        }),
        MajorType::Map => w.nested(|w| {
            w.entries(&mut record, d, chunk.argument, |w, d, label| {
                generic(w, d, label_name(label))
            })
        }),
        _ => Ok(()),
    };
    if let Err(error) = nested {
        let range = record.range.clone();
        record.error(error, range);
    }
    wrap_tags(w, record, &chunk.tags, start)
}

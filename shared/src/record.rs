//! Output of a dissection: a tree of records over one or more data sources, with diagnostics
//! attached to the records they concern.
use crate::error::{DissectError, Severity};
use std::borrow::Cow;
use std::fmt::Write;
use std::ops::Range;

/// Index of the buffer a byte range refers to.
///
/// [`SourceId::FRAME`] is the captured buffer; higher ids are buffers derived during dissection
/// (decrypted plaintexts), in the order they were added to the [`Dissection`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SourceId(pub usize);

impl SourceId {
    pub const FRAME: SourceId = SourceId(0);
}

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// Grouping record without a value of its own.
    None,
    Integer(i128),
    /// Byte string; the range covers the string content in the record's source.
    Bytes(Range<usize>),
    Text(String),
    Array(u64),
    Map(u64),
    Tag(u64),
    Bool(bool),
    Null,
    Undefined,
    Simple(u64),
    Float(f64),
    /// A code point together with its registered name.
    Named { code: i128, name: &'static str },
    /// Reference to another captured frame.
    Frame(u32),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub severity: Severity,
    pub kind: Option<DissectError>,
    pub message: String,
    pub source: SourceId,
    pub range: Range<usize>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    pub name: Cow<'static, str>,
    pub value: Value,
    pub source: SourceId,
    pub range: Range<usize>,
    pub children: Vec<Record>,
    pub diagnostics: Vec<Diagnostic>,
}

impl Record {
    pub fn new(
        name: impl Into<Cow<'static, str>>,
        value: Value,
        source: SourceId,
        range: Range<usize>,
    ) -> Self {
        Record {
            name: name.into(),
            value,
            source,
            range,
            children: Vec::new(),
            diagnostics: Vec::new(),
        }
    }

    pub fn push(&mut self, child: Record) {
        self.children.push(child);
    }

    pub fn with_child(mut self, child: Record) -> Self {
        self.children.push(child);
        self
    }

    /// Attach an error to this record.
    pub fn error(&mut self, error: DissectError, range: Range<usize>) {
        self.diagnostics.push(Diagnostic {
            severity: error.severity(),
            message: error.to_string(),
            kind: Some(error),
            source: self.source,
            range,
        });
    }

    /// Attach a free-form diagnostic to this record.
    pub fn note(&mut self, severity: Severity, message: impl Into<String>, range: Range<usize>) {
        self.diagnostics.push(Diagnostic {
            severity,
            kind: None,
            message: message.into(),
            source: self.source,
            range,
        });
    }

    /// Extend the record's range to `end`, e.g. once a container has been fully decoded.
    pub fn close(&mut self, end: usize) {
        if end > self.range.start {
            self.range.end = end;
        }
    }

    /// Pre-order iteration over this record and all of its descendants.
    pub fn iter(&self) -> impl Iterator<Item = &Record> {
        let mut stack = vec![self];
        core::iter::from_fn(move || {
            let record = stack.pop()?;
            stack.extend(record.children.iter().rev());
            Some(record)
        })
    }

    /// First record (in pre-order) with the given name.
    pub fn find(&self, name: &str) -> Option<&Record> {
        self.iter().find(|record| record.name == name)
    }

    /// Move a subtree decoded over a standalone slice into `source`, starting at `offset`.
    pub fn rebase(&mut self, source: SourceId, offset: usize) {
        let mut stack = vec![self];
        while let Some(record) = stack.pop() {
            record.source = source;
            record.range = shift(&record.range, offset);
            if let Value::Bytes(content) = &mut record.value {
                *content = shift(content, offset);
            }
            for diagnostic in record.diagnostics.iter_mut() {
                diagnostic.source = source;
                diagnostic.range = shift(&diagnostic.range, offset);
            }
            stack.extend(record.children.iter_mut());
        }
    }
}

fn shift(range: &Range<usize>, offset: usize) -> Range<usize> {
    range.start + offset..range.end + offset
}

/// A buffer produced during dissection, e.g. a decrypted plaintext.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataSource {
    pub name: Cow<'static, str>,
    pub bytes: Vec<u8>,
}

/// Result of dissecting one captured buffer.
#[derive(Debug, Clone, PartialEq)]
pub struct Dissection<'a> {
    pub frame: &'a [u8],
    pub sources: Vec<DataSource>,
    pub root: Record,
}

impl<'a> Dissection<'a> {
    pub fn new(frame: &'a [u8], root: Record) -> Self {
        Dissection {
            frame,
            sources: Vec::new(),
            root,
        }
    }

    /// Register a derived buffer and return the id records use to refer to it.
    pub fn add_source(&mut self, name: impl Into<Cow<'static, str>>, bytes: Vec<u8>) -> SourceId {
        self.sources.push(DataSource {
            name: name.into(),
            bytes,
        });
        SourceId(self.sources.len())
    }

    pub fn bytes(&self, source: SourceId) -> &[u8] {
        match source.0 {
            0 => self.frame,
            n => self
                .sources
                .get(n - 1)
                .map(|s| s.bytes.as_slice())
                .unwrap_or_default(),
        }
    }

    pub fn source_named(&self, name: &str) -> Option<&DataSource> {
        self.sources.iter().find(|source| source.name == name)
    }

    /// All diagnostics in the tree, in pre-order of the records carrying them.
    pub fn diagnostics(&self) -> Vec<&Diagnostic> {
        self.root
            .iter()
            .flat_map(|record| record.diagnostics.iter())
            .collect()
    }

    pub fn has_error(&self, predicate: impl Fn(&DissectError) -> bool) -> bool {
        self.diagnostics()
            .iter()
            .any(|d| d.kind.as_ref().is_some_and(&predicate))
    }

    /// Deterministic text rendering of the whole tree.
    pub fn render(&self) -> String {
        let mut out = String::new();
        for (index, source) in self.sources.iter().enumerate() {
            let _ = writeln!(
                out,
                "# source {}: {} ({} bytes)",
                index + 1,
                source.name,
                source.bytes.len()
            );
        }
        let mut stack = vec![(&self.root, 0usize)];
        while let Some((record, depth)) = stack.pop() {
            let indent = "  ".repeat(depth);
            let _ = write!(out, "{indent}{}", record.name);
            self.render_value(&mut out, record);
            let _ = writeln!(
                out,
                " [{}:{}..{}]",
                record.source.0, record.range.start, record.range.end
            );
            for d in &record.diagnostics {
                let _ = writeln!(
                    out,
                    "{indent}  ! {}: {} [{}:{}..{}]",
                    d.severity, d.message, d.source.0, d.range.start, d.range.end
                );
            }
            stack.extend(record.children.iter().rev().map(|c| (c, depth + 1)));
        }
        out
    }

    fn render_value(&self, out: &mut String, record: &Record) {
        let _ = match &record.value {
            Value::None => Ok(()),
            Value::Integer(n) => write!(out, ": {n}"),
            Value::Bytes(content) => {
                let bytes = self.bytes(record.source);
                match bytes.get(content.clone()) {
                    Some(b) => write!(out, ": h'{}'", hex::encode(b)),
                    None => write!(out, ": <{} bytes>", content.len()),
                }
            }
            Value::Text(s) => write!(out, ": {s:?}"),
            Value::Array(n) => write!(out, ": array({n})"),
            Value::Map(n) => write!(out, ": map({n})"),
            Value::Tag(n) => write!(out, ": tag({n})"),
            Value::Bool(b) => write!(out, ": {b}"),
            Value::Null => write!(out, ": null"),
            Value::Undefined => write!(out, ": undefined"),
            Value::Simple(n) => write!(out, ": simple({n})"),
            Value::Float(x) => write!(out, ": {x:?}"),
            Value::Named { code, name } => write!(out, ": {name} ({code})"),
            Value::Frame(n) => write!(out, ": frame {n}"),
        };
    }
}

//! Decoder inspired by the [minicbor](https://crates.io/crates/minicbor) crate, plus a minimal
//! encoder for the few structures that get built locally (KDF info, Enc_structure, transcript
//! hash input).
//!
//! The decoder is a cursor over an immutable buffer. Cloning it yields an independent cursor,
//! which is how non-destructive look-ahead is done.
use core::fmt;
use core::ops::Range;

/// CBOR major type, the highest 3 bits of an initial byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MajorType {
    Unsigned,
    Negative,
    Bytes,
    Text,
    Array,
    Map,
    Tag,
    Simple,
}

impl MajorType {
    pub const fn from_initial_byte(b: u8) -> Self {
        match b >> 5 {
            0 => MajorType::Unsigned,
            1 => MajorType::Negative,
            2 => MajorType::Bytes,
            3 => MajorType::Text,
            4 => MajorType::Array,
            5 => MajorType::Map,
            6 => MajorType::Tag,
            _ => MajorType::Simple,
        }
    }

    const fn bits(self) -> u8 {
        match self {
            MajorType::Unsigned => 0,
            MajorType::Negative => 1,
            MajorType::Bytes => 2,
            MajorType::Text => 3,
            MajorType::Array => 4,
            MajorType::Map => 5,
            MajorType::Tag => 6,
            MajorType::Simple => 7,
        }
    }
}

impl fmt::Display for MajorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            MajorType::Unsigned => "unsigned integer",
            MajorType::Negative => "negative integer",
            MajorType::Bytes => "byte string",
            MajorType::Text => "text string",
            MajorType::Array => "array",
            MajorType::Map => "map",
            MajorType::Tag => "tag",
            MajorType::Simple => "simple value",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum CBORError {
    #[error("input ends inside an item")]
    TruncatedInput,
    #[error("malformed item head 0x{0:02x}")]
    MalformedHead(u8),
    #[error("expected {expected}, found {found}")]
    UnexpectedMajorType {
        expected: MajorType,
        found: MajorType,
    },
    #[error("integer does not fit the supported range")]
    OutOfRange,
}

/// One decoded item head, with the tags that preceded it.
///
/// For byte and text strings, `content` covers the string payload and `span` ends with it. For
/// every other major type `content` is empty and `span` ends after the head; the children of
/// arrays, maps and tags follow in the buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    pub major: MajorType,
    pub minor: u8,
    pub argument: u64,
    pub tags: Vec<u64>,
    pub span: Range<usize>,
    pub content: Range<usize>,
}

impl Chunk {
    pub fn is_int(&self) -> bool {
        matches!(self.major, MajorType::Unsigned | MajorType::Negative)
    }

    /// Integer value of an unsigned or negative integer head.
    pub fn int(&self) -> Option<i128> {
        match self.major {
            MajorType::Unsigned => Some(self.argument as i128),
            MajorType::Negative => Some(-1 - self.argument as i128),
            _ => None,
        }
    }

    pub fn bool(&self) -> Option<bool> {
        match (self.major, self.minor) {
            (MajorType::Simple, 20) => Some(false),
            (MajorType::Simple, 21) => Some(true),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct CBORDecoder<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> CBORDecoder<'a> {
    pub fn new(bytes: &'a [u8]) -> Self {
        CBORDecoder { buf: bytes, pos: 0 }
    }

    /// Cursor over `bytes` that starts at `pos`, so that positions stay absolute in `bytes`.
    pub fn at(bytes: &'a [u8], pos: usize) -> Self {
        CBORDecoder {
            buf: bytes,
            pos: pos.min(bytes.len()),
        }
    }

    fn read(&mut self) -> Result<u8, CBORError> {
        if let Some(b) = self.buf.get(self.pos) {
            self.pos += 1;
            Ok(*b)
        } else {
            Err(CBORError::TruncatedInput)
        }
    }

    /// Consume and return *n* bytes starting at the current position.
    fn read_slice(&mut self, n: usize) -> Result<&'a [u8], CBORError> {
        if let Some(b) = self
            .pos
            .checked_add(n)
            .and_then(|end| self.buf.get(self.pos..end))
        {
            self.pos += n;
            Ok(b)
        } else {
            Err(CBORError::TruncatedInput)
        }
    }

    pub fn buffer(&self) -> &'a [u8] {
        self.buf
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    /// Move the cursor to an absolute position, e.g. past an item whose extent was measured on a
    /// cloned cursor.
    pub fn seek(&mut self, pos: usize) {
        self.pos = pos.min(self.buf.len());
    }

    pub fn finished(&self) -> bool {
        self.pos == self.buf.len()
    }

    pub fn ensure_finished(&self) -> Result<(), CBORError> {
        if self.finished() {
            Ok(())
        } else {
            Err(CBORError::MalformedHead(self.buf[self.pos]))
        }
    }

    pub fn remaining_buffer(&self) -> &'a [u8] {
        &self.buf[self.pos..]
    }

    /// Get the byte at the current position.
    pub fn current(&self) -> Result<u8, CBORError> {
        if let Some(b) = self.buf.get(self.pos) {
            Ok(*b)
        } else {
            Err(CBORError::TruncatedInput)
        }
    }

    /// Read an initial byte and its argument.
    ///
    /// Indefinite lengths and the break marker are rejected: every container this crate decodes
    /// is definite-length, which keeps skipping bounded by the buffer size.
    fn head(&mut self) -> Result<(MajorType, u8, u64), CBORError> {
        let initial = self.read()?;
        let major = MajorType::from_initial_byte(initial);
        let minor = Self::info_of(initial);
        let argument = match minor {
            0..=23 => minor as u64,
            24 => self.read()? as u64,
            25 => u16::from_be_bytes([self.read()?, self.read()?]) as u64,
            26 => {
                let b = self.read_slice(4)?;
                u32::from_be_bytes([b[0], b[1], b[2], b[3]]) as u64
            }
            27 => {
                let b = self.read_slice(8)?;
                u64::from_be_bytes([b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7]])
            }
            // 28..=30 are reserved, 31 is indefinite length or break
            _ => return Err(CBORError::MalformedHead(initial)),
        };
        if major == MajorType::Simple && minor == 24 && argument < 32 {
            // two-byte encoding of a simple value that has a one-byte form
            return Err(CBORError::MalformedHead(initial));
        }
        Ok((major, minor, argument))
    }

    /// Decode the next item head (and the payload of a string), collecting any tags in front.
    pub fn chunk(&mut self) -> Result<Chunk, CBORError> {
        let start = self.pos;
        let mut tags = Vec::new();
        loop {
            let (major, minor, argument) = self.head()?;
            if major == MajorType::Tag {
                tags.push(argument);
                continue;
            }
            let content = match major {
                MajorType::Bytes | MajorType::Text => {
                    let len = usize::try_from(argument).map_err(|_| CBORError::TruncatedInput)?;
                    let content_start = self.pos;
                    self.read_slice(len)?;
                    content_start..self.pos
                }
                _ => self.pos..self.pos,
            };
            return Ok(Chunk {
                major,
                minor,
                argument,
                tags,
                span: start..self.pos,
                content,
            });
        }
    }

    /// Look at the next item head without moving the cursor.
    pub fn peek(&self) -> Result<Chunk, CBORError> {
        self.clone().chunk()
    }

    /// Decode the next item head and check its major type.
    pub fn require(&mut self, expected: MajorType) -> Result<Chunk, CBORError> {
        let chunk = self.chunk()?;
        if chunk.major == expected {
            Ok(chunk)
        } else {
            Err(CBORError::UnexpectedMajorType {
                expected,
                found: chunk.major,
            })
        }
    }

    /// Decode an unsigned integer.
    pub fn uint(&mut self) -> Result<u64, CBORError> {
        Ok(self.require(MajorType::Unsigned)?.argument)
    }

    /// Decode an unsigned or negative integer that fits an `i64`.
    pub fn int(&mut self) -> Result<i64, CBORError> {
        let chunk = self.chunk()?;
        match chunk.int() {
            Some(n) => i64::try_from(n).map_err(|_| CBORError::OutOfRange),
            None => Err(CBORError::UnexpectedMajorType {
                expected: MajorType::Unsigned,
                found: chunk.major,
            }),
        }
    }

    /// Decode a string slice.
    pub fn str(&mut self) -> Result<&'a [u8], CBORError> {
        let chunk = self.require(MajorType::Text)?;
        Ok(&self.buf[chunk.content])
    }

    /// Decode a byte slice.
    pub fn bytes(&mut self) -> Result<&'a [u8], CBORError> {
        let chunk = self.require(MajorType::Bytes)?;
        Ok(&self.buf[chunk.content])
    }

    /// Begin decoding an array, returning its declared element count.
    pub fn array(&mut self) -> Result<u64, CBORError> {
        Ok(self.require(MajorType::Array)?.argument)
    }

    /// Begin decoding a map, returning its declared number of entries.
    pub fn map(&mut self) -> Result<u64, CBORError> {
        Ok(self.require(MajorType::Map)?.argument)
    }

    /// Get the major type info of the given byte (highest 3 bits).
    pub fn type_of(b: u8) -> u8 {
        b & 0b111_00000
    }

    /// Get the additional type info of the given byte (lowest 5 bits).
    pub fn info_of(b: u8) -> u8 {
        b & 0b000_11111
    }

    /// Skip one complete item, however deeply nested, and return its byte range.
    ///
    /// This does not recurse: nesting only increases a counter of items still to be read. As
    /// every iteration consumes at least one byte, the loop is bounded by the buffer length no
    /// matter what counts the input declares.
    pub fn skip(&mut self) -> Result<Range<usize>, CBORError> {
        let start = self.pos;
        let mut remaining_items: u64 = 1;
        while remaining_items > 0 {
            remaining_items -= 1;
            let (major, _, argument) = self.head()?;
            match major {
                MajorType::Unsigned | MajorType::Negative | MajorType::Simple => (),
                MajorType::Tag => remaining_items = remaining_items.saturating_add(1),
                MajorType::Bytes | MajorType::Text => {
                    let len = usize::try_from(argument).map_err(|_| CBORError::TruncatedInput)?;
                    self.read_slice(len)?;
                }
                MajorType::Array => remaining_items = remaining_items.saturating_add(argument),
                MajorType::Map => {
                    remaining_items = remaining_items.saturating_add(argument.saturating_mul(2))
                }
            }
        }
        Ok(start..self.pos)
    }

    /// Decode any (supported) CBOR item, but ignore its internal structure and just return the
    /// encoded data.
    pub fn any_as_encoded(&mut self) -> Result<&'a [u8], CBORError> {
        let range = self.skip()?;
        Ok(&self.buf[range])
    }
}

/// Append-only CBOR writer for the structures built locally.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CBOREncoder {
    buf: Vec<u8>,
}

impl CBOREncoder {
    pub fn new() -> Self {
        Self::default()
    }

    fn head(&mut self, major: MajorType, argument: u64) -> &mut Self {
        let major = major.bits() << 5;
        if argument < 24 {
            self.buf.push(major | argument as u8);
        } else if argument <= u8::MAX as u64 {
            self.buf.extend_from_slice(&[major | 24, argument as u8]);
        } else if argument <= u16::MAX as u64 {
            self.buf.push(major | 25);
            self.buf.extend_from_slice(&(argument as u16).to_be_bytes());
        } else if argument <= u32::MAX as u64 {
            self.buf.push(major | 26);
            self.buf.extend_from_slice(&(argument as u32).to_be_bytes());
        } else {
            self.buf.push(major | 27);
            self.buf.extend_from_slice(&argument.to_be_bytes());
        }
        self
    }

    pub fn uint(&mut self, value: u64) -> &mut Self {
        self.head(MajorType::Unsigned, value)
    }

    pub fn int(&mut self, value: i64) -> &mut Self {
        if value >= 0 {
            self.head(MajorType::Unsigned, value as u64)
        } else {
            self.head(MajorType::Negative, (-1 - value) as u64)
        }
    }

    pub fn bytes(&mut self, value: &[u8]) -> &mut Self {
        self.head(MajorType::Bytes, value.len() as u64);
        self.buf.extend_from_slice(value);
        self
    }

    pub fn text(&mut self, value: &str) -> &mut Self {
        self.head(MajorType::Text, value.len() as u64);
        self.buf.extend_from_slice(value.as_bytes());
        self
    }

    pub fn array(&mut self, len: u64) -> &mut Self {
        self.head(MajorType::Array, len)
    }

    pub fn map(&mut self, len: u64) -> &mut Self {
        self.head(MajorType::Map, len)
    }

    pub fn tag(&mut self, tag: u64) -> &mut Self {
        self.head(MajorType::Tag, tag)
    }

    /// Append an already encoded item.
    pub fn raw(&mut self, encoded: &[u8]) -> &mut Self {
        self.buf.extend_from_slice(encoded);
        self
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.buf
    }

    pub fn into_vec(self) -> Vec<u8> {
        self.buf
    }
}

#[cfg(test)]
mod test_cbor_decoder {
    use super::*;
    use hexlit::hex;
    use rstest::rstest;

    #[test]
    fn test_cbor_decoder() {
        // CBOR sequence: 1, -1, "hi", h'fefe'
        let input = [0x01, 0x20, 0x62, 0x68, 0x69, 0x42, 0xFE, 0xFE];
        let mut decoder = CBORDecoder::new(&input);

        assert_eq!(1, decoder.uint().unwrap());
        assert_eq!(-1, decoder.int().unwrap());
        assert_eq!([0x68, 0x69], decoder.str().unwrap()); // "hi"
        assert_eq!([0xFE, 0xFE], decoder.bytes().unwrap());
        assert!(decoder.finished());
    }

    #[rstest]
    #[case(&hex!("17"), 23)]
    #[case(&hex!("1818"), 24)]
    #[case(&hex!("190100"), 256)]
    #[case(&hex!("1a00010000"), 65536)]
    #[case(&hex!("1b0000000100000000"), 4294967296)]
    fn test_head_widths(#[case] input: &[u8], #[case] expected: u64) {
        let mut decoder = CBORDecoder::new(input);
        assert_eq!(expected, decoder.uint().unwrap());
        assert!(decoder.finished());
    }

    #[test]
    fn test_chunk_collects_tags_and_content() {
        // 18(h'0102')
        let input = hex!("d2420102");
        let chunk = CBORDecoder::new(&input).chunk().unwrap();
        assert_eq!(MajorType::Bytes, chunk.major);
        assert_eq!(vec![18], chunk.tags);
        assert_eq!(0..4, chunk.span);
        assert_eq!(2..4, chunk.content);
    }

    #[test]
    fn test_peek_does_not_advance() {
        let input = hex!("8301020304");
        let decoder = CBORDecoder::new(&input);
        assert_eq!(MajorType::Array, decoder.peek().unwrap().major);
        assert_eq!(0, decoder.position());
    }

    #[rstest]
    #[case(&hex!("5f"), CBORError::MalformedHead(0x5f))] // indefinite byte string
    #[case(&hex!("1c"), CBORError::MalformedHead(0x1c))] // reserved minor
    #[case(&hex!("19ff"), CBORError::TruncatedInput)]
    #[case(&hex!("43aabb"), CBORError::TruncatedInput)]
    fn test_malformed(#[case] input: &[u8], #[case] expected: CBORError) {
        assert_eq!(Err(expected), CBORDecoder::new(input).chunk());
    }

    #[test]
    fn test_require_reports_found_type() {
        let input = hex!("a0");
        assert_eq!(
            Err(CBORError::UnexpectedMajorType {
                expected: MajorType::Array,
                found: MajorType::Map
            }),
            CBORDecoder::new(&input).require(MajorType::Array)
        );
    }

    #[test]
    fn test_cbor_decoder_any_as_decoded() {
        // {"bytes": 'val', "n": 123, "tagged": 255(["a", -1]), "deep": [[[[[[[[[[[[[[[[[[[[[[]]]]]]]]]]]]]]]]]]]]], {1: {2: {3: {4: [simple(0), true, null, simple(128)]}}}}]}
        let input = hex!("A46562797465734376616C616E187B66746167676564D8FF82616120646465657082818181818181818181818181818181818181818180A101A102A103A10484E0F5F6F880");
        let mut decoder = CBORDecoder::new(&input);

        assert_eq!(input, decoder.any_as_encoded().unwrap());
        assert!(decoder.finished())
    }

    #[test]
    fn test_skip_deep_nesting_is_iterative() {
        let depth = 100_000;
        let mut input = vec![0x81; depth];
        input.push(0x00);
        let mut decoder = CBORDecoder::new(&input);
        assert_eq!(0..input.len(), decoder.skip().unwrap());
    }

    #[test]
    fn test_skip_huge_declared_count() {
        // array of 2^64-1 elements with a single element present
        let input = hex!("9bffffffffffffffff01");
        assert_eq!(
            Err(CBORError::TruncatedInput),
            CBORDecoder::new(&input).skip()
        );
    }

    #[test]
    fn test_encoder() {
        let mut encoder = CBOREncoder::new();
        encoder
            .array(4)
            .text("Encrypt0")
            .bytes(&[])
            .int(-24)
            .uint(500);
        assert_eq!(
            &hex!("8468456e63727970743040371901f4"),
            encoder.as_slice()
        );
    }
}

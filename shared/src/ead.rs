//! Extension point for decoders of External Authorization Data items.
use crate::record::Record;
use crate::suites::{CipherSuite, EDHOCMethod};

/// The EDHOC message kinds a captured buffer can be.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EdhocMessage {
    Message1,
    Message2,
    Message3,
    Message4,
    Error,
}

impl EdhocMessage {
    pub const fn name(self) -> &'static str {
        match self {
            EdhocMessage::Message1 => "message_1",
            EdhocMessage::Message2 => "message_2",
            EdhocMessage::Message3 => "message_3",
            EdhocMessage::Message4 => "message_4",
            EdhocMessage::Error => "error",
        }
    }

    pub const fn from_number(n: u64) -> Option<Self> {
        match n {
            1 => Some(EdhocMessage::Message1),
            2 => Some(EdhocMessage::Message2),
            3 => Some(EdhocMessage::Message3),
            4 => Some(EdhocMessage::Message4),
            _ => None,
        }
    }
}

/// What an EAD decoder gets to know about the handshake the item was found in.
#[derive(Debug, Clone, Copy)]
pub struct SessionView<'a> {
    pub session: u32,
    pub message: EdhocMessage,
    pub method: Option<EDHOCMethod>,
    pub suite: Option<&'static CipherSuite>,
    /// Correlator of the session (G_X from message_1), empty when unknown.
    pub correlator: &'a [u8],
    /// The item was sent with a negative label.
    pub critical: bool,
}

/// Fields decoded from one EAD value.
///
/// Record ranges are relative to the start of the value; the caller moves them into place.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct EadDecoded {
    pub consumed: usize,
    pub fields: Vec<Record>,
}

/// A decoder for the value of EAD items with one label.
///
/// Decoders are registered against the absolute value of the label, so the critical and
/// non-critical forms of an item share one decoder.
pub trait EadDecoder: Send + Sync + core::fmt::Debug {
    fn name(&self) -> &'static str;
    fn decode(&self, value: &[u8], session: &SessionView) -> EadDecoded;
}

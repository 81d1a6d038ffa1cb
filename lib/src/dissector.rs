//! Entry point of a dissection: pick the decoder for a captured buffer, run it, and feed the
//! session tracker.
use crate::config::DissectorConfig;
use crate::ead::{ead_items, EadRegistry};
use crate::envelope::{decode_at, EnvelopeKind};
use crate::item::{generic, Walker};
use crate::messages::{self, classify, conn_id_field};
use crate::registry::Registries;
use crate::secrets::{SecretStore, SharedSecretStore};
use crate::session::{CaptureContext, Session};
use defmt_or_log::{debug, trace};
use edhoc_lens_shared::{Crypto as CryptoTrait, *};
use std::sync::Arc;

pub const MEDIA_TYPE_EDHOC: &str = "application/edhoc+cbor-seq";
/// EDHOC messages prefixed with a connection identifier, or `true` for message_1 (RFC 9528,
/// Appendix A.2).
pub const MEDIA_TYPE_CID_EDHOC: &str = "application/cid-edhoc+cbor-seq";

/// What a buffer is, as far as the host knows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKind {
    Envelope(EnvelopeKind),
    /// An EDHOC message; its number, if the host knows it.
    Edhoc(Option<EdhocMessage>),
}

/// Hint from the transport about how to decode a buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Discriminator<'s> {
    /// CBOR tag the transport associated with the payload.
    Tag(u64),
    /// Content format, e.g. of a CoAP message.
    MediaType(&'s str),
    Kind(MessageKind),
}

/// Position of a buffer in the capture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FrameInfo {
    /// Frame number, increasing in capture order.
    pub frame: u32,
    /// Conversation (e.g. address and port pair) the frame belongs to.
    pub conversation: u64,
}

#[derive(Debug)]
pub struct Dissector {
    config: DissectorConfig,
    registries: &'static Registries,
    ead: EadRegistry,
    secrets: SharedSecretStore,
}

impl Default for Dissector {
    fn default() -> Self {
        Self::new(DissectorConfig::default())
    }
}

/// How an EDHOC buffer has to be taken apart before its fields.
#[derive(Debug, Clone, Copy)]
struct Framing {
    forced: Option<EdhocMessage>,
    prefixed: bool,
}

impl Dissector {
    pub fn new(config: DissectorConfig) -> Self {
        Self::with_secrets(config, SharedSecretStore::default())
    }

    /// A dissector sharing `secrets` with whoever else holds the handle.
    pub fn with_secrets(config: DissectorConfig, secrets: SharedSecretStore) -> Self {
        Dissector {
            config,
            registries: Registries::global(),
            ead: EadRegistry::new(),
            secrets,
        }
    }

    /// Decode header and key parameters with `registries` instead of the built-in ones.
    pub fn with_registries(mut self, registries: &'static Registries) -> Self {
        self.registries = registries;
        self
    }

    pub fn config(&self) -> &DissectorConfig {
        &self.config
    }

    /// Decode the values of EAD items with label `label` (or `-label`) with `decoder`.
    pub fn register_ead(&mut self, label: u64, decoder: Arc<dyn EadDecoder>) {
        self.ead.register(label, decoder);
    }

    pub fn secrets(&self) -> &SharedSecretStore {
        &self.secrets
    }

    /// Dissect one captured buffer.
    ///
    /// Dissecting a frame a second time gives the same result and leaves `capture` as it was.
    pub fn dissect<'a>(
        &self,
        crypto: &mut impl CryptoTrait,
        capture: &mut CaptureContext,
        frame: FrameInfo,
        discriminator: Option<Discriminator>,
        bytes: &'a [u8],
    ) -> Dissection<'a> {
        trace!("Enter dissect");
        match self.resolve(discriminator, bytes) {
            Ok(kind) => self.envelope(kind, bytes),
            Err(framing) => self.edhoc(crypto, capture, frame, framing, bytes),
        }
    }

    /// Envelope kind of the buffer, or else how to frame it as EDHOC.
    fn resolve(
        &self,
        discriminator: Option<Discriminator>,
        bytes: &[u8],
    ) -> Result<EnvelopeKind, Framing> {
        let mut framing = Framing {
            forced: None,
            prefixed: false,
        };
        match discriminator {
            Some(Discriminator::Kind(MessageKind::Envelope(kind))) => return Ok(kind),
            Some(Discriminator::Kind(MessageKind::Edhoc(forced))) => {
                framing.forced = forced;
                return Err(framing);
            }
            Some(Discriminator::MediaType(media_type)) => {
                if let Some(kind) = EnvelopeKind::from_media_type(media_type) {
                    return Ok(kind);
                }
                let essence = media_type.split(';').next().unwrap_or_default().trim();
                if essence.eq_ignore_ascii_case(MEDIA_TYPE_CID_EDHOC) {
                    framing.prefixed = true;
                    return Err(framing);
                }
                if essence.eq_ignore_ascii_case(MEDIA_TYPE_EDHOC) {
                    return Err(framing);
                }
                debug!("Unknown media type {}, guessing", media_type);
            }
            Some(Discriminator::Tag(tag)) => {
                if let Some(kind) = EnvelopeKind::from_tag(tag) {
                    return Ok(kind);
                }
                debug!("Tag {} is not a COSE tag, guessing", tag);
            }
            None => {}
        }
        // a tagged COSE structure says what it is, everything else is taken for EDHOC
        let tagged = CBORDecoder::new(bytes)
            .peek()
            .ok()
            .and_then(|chunk| chunk.tags.iter().find_map(|tag| EnvelopeKind::from_tag(*tag)));
        tagged.ok_or(framing)
    }

    fn envelope<'a>(&self, kind: EnvelopeKind, bytes: &'a [u8]) -> Dissection<'a> {
        let mut w = Walker::new(self.registries, SourceId::FRAME, self.config.max_nesting_depth);
        let root = decode_at(&mut w, &mut CBORDecoder::new(bytes), kind);
        Dissection::new(bytes, root)
    }

    fn edhoc<'a>(
        &self,
        crypto: &mut impl CryptoTrait,
        capture: &mut CaptureContext,
        frame: FrameInfo,
        framing: Framing,
        bytes: &'a [u8],
    ) -> Dissection<'a> {
        trace!("Enter edhoc");
        let store = self.secrets.snapshot();
        let mut w = Walker::new(self.registries, SourceId::FRAME, self.config.max_nesting_depth);
        let mut d = CBORDecoder::new(bytes);
        let mut root = Record::new("EDHOC", Value::None, SourceId::FRAME, 0..bytes.len());
        let placeholder = Record::new("EDHOC", Value::None, SourceId::FRAME, 0..0);
        let mut dissection = Dissection::new(bytes, placeholder);

        let mut forced = framing.forced;
        let mut prefix = None;
        if framing.prefixed && !d.finished() {
            if d.peek().is_ok_and(|chunk| chunk.bool() == Some(true)) {
                w.child(&mut root, &mut d, |w, d| generic(w, d, "C_x"));
                forced.get_or_insert(EdhocMessage::Message1);
            } else {
                w.child(&mut root, &mut d, |w, d| {
                    let (record, id) = conn_id_field(w, d, "C_x");
                    prefix = id;
                    record
                });
            }
        }

        let body = d.position();
        let shape = classify(bytes, body);
        let assignment = capture.assign(
            frame.conversation,
            frame.frame,
            shape,
            forced,
            prefix.as_ref().map(ConnId::as_slice),
        );
        root.name = format!("EDHOC {}", assignment.message.name()).into();

        let Some(session) = capture.session_mut(assignment.session) else {
            root.error(DissectError::Internal("session vanished"), 0..bytes.len());
            dissection.root = root;
            return dissection;
        };
        root.children.insert(0, session_record(session, frame.frame));

        let mut stage = Stage {
            dissector: self,
            store: &store,
            dissection: &mut dissection,
            session,
        };
        match assignment.message {
            EdhocMessage::Message1 => stage.message_1(&mut w, &mut d, &mut root, &bytes[body..]),
            EdhocMessage::Message2 => stage.message_2(crypto, &mut w, &mut d, &mut root),
            EdhocMessage::Message3 => stage.message_3(crypto, &mut w, &mut d, &mut root),
            EdhocMessage::Message4 => stage.message_4(crypto, &mut w, &mut d, &mut root),
            EdhocMessage::Error => {
                if messages::error(&mut w, &mut d, &mut root).is_some() {
                    trailing(&d, &mut root, "error");
                }
            }
        }
        dissection.root = root;
        dissection
    }
}

/// Cross references of the session a frame belongs to.
///
/// Only frames before `frame` are listed, so that later frames do not change how an earlier one
/// renders.
fn session_record(session: &Session, frame: u32) -> Record {
    let mut record = Record::new(
        "session",
        Value::Integer(session.id().into()),
        SourceId::FRAME,
        0..0,
    );
    for (message, seen) in session.frames().filter(|(_, seen)| *seen < frame) {
        record.push(Record::new(message.name(), Value::Frame(seen), SourceId::FRAME, 0..0));
    }
    if let Some(prev) = session.prev() {
        record.push(Record::new(
            "previous session",
            Value::Integer(prev.into()),
            SourceId::FRAME,
            0..0,
        ));
    }
    record
}

fn trailing(d: &CBORDecoder, root: &mut Record, what: &str) {
    if !d.finished() {
        root.note(
            Severity::Warning,
            format!("trailing bytes after {what}"),
            d.position()..d.buffer().len(),
        );
    }
}

/// Decoding of one EDHOC message within its session.
struct Stage<'s, 'd, 'a> {
    dissector: &'s Dissector,
    store: &'s SecretStore,
    dissection: &'d mut Dissection<'a>,
    session: &'s mut Session,
}

impl Stage<'_, '_, '_> {
    fn message_1(
        &mut self,
        w: &mut Walker,
        d: &mut CBORDecoder,
        root: &mut Record,
        message_1: &[u8],
    ) {
        let fields = messages::message_1(w, d, root);
        self.session.saw_message_1(
            message_1,
            fields.method.and_then(EDHOCMethod::from_u64),
            fields.g_x.clone(),
            fields.c_i.clone(),
        );
        if let Some(selected) = fields.selected_suite() {
            match cipher_suite(selected) {
                Some(suite) => self.session.set_suite(suite),
                None => root.note(
                    Severity::Note,
                    format!("cipher suite {selected} is not supported"),
                    0..0,
                ),
            }
        }
        if fields.complete {
            let view = self.session.view(EdhocMessage::Message1);
            ead_items(w, d, root, &self.dissector.ead, view, &self.dissector.config);
        }
    }

    fn message_2(
        &mut self,
        crypto: &mut impl CryptoTrait,
        w: &mut Walker,
        d: &mut CBORDecoder,
        root: &mut Record,
    ) {
        let g_y_len = match self.session.suite() {
            Some(suite) => suite.curve.public_key_len(),
            None => {
                root.note(
                    Severity::Note,
                    "cipher suite not known, assuming a 32 byte G_Y",
                    0..0,
                );
                32
            }
        };
        let fields = messages::message_2(w, d, root, g_y_len);
        self.session.saw_g_y(fields.g_y);
        let Some(ciphertext_2) = fields.ciphertext_2 else {
            return;
        };
        trailing(d, root, "message_2");
        if !self.dissector.config.decrypt {
            return;
        }
        let ciphertext = &d.buffer()[ciphertext_2.clone()];
        match self.session.decrypt_2(crypto, self.store, ciphertext) {
            Ok(plaintext) => {
                let session = &*self.session;
                let dissector = self.dissector;
                let (record, fields) = decode_plaintext(
                    self.dissection,
                    dissector,
                    "PLAINTEXT_2",
                    plaintext,
                    |w, d, record| {
                        let fields = messages::plaintext_2(w, d, record);
                        if fields.complete {
                            let view = session.view(EdhocMessage::Message2);
                            ead_items(w, d, record, &dissector.ead, view, &dissector.config);
                        }
                        fields
                    },
                );
                let plaintext = self.dissection.bytes(record.source).to_vec();
                self.session.saw_plaintext_2(&plaintext, fields.c_r, fields.cred_r);
                root.push(record);
            }
            Err(error) => root.error(error, ciphertext_2),
        }
    }

    fn message_3(
        &mut self,
        crypto: &mut impl CryptoTrait,
        w: &mut Walker,
        d: &mut CBORDecoder,
        root: &mut Record,
    ) {
        let Some(ciphertext_3) = messages::message_3_or_4(w, d, root, "CIPHERTEXT_3") else {
            return;
        };
        trailing(d, root, "message_3");
        if !self.dissector.config.decrypt {
            return;
        }
        let ciphertext = &d.buffer()[ciphertext_3.clone()];
        match self.session.decrypt_3(crypto, self.store, ciphertext) {
            Ok(plaintext) => {
                let session = &*self.session;
                let dissector = self.dissector;
                let (record, fields) = decode_plaintext(
                    self.dissection,
                    dissector,
                    "PLAINTEXT_3",
                    plaintext,
                    |w, d, record| {
                        let fields = messages::plaintext_3(w, d, record);
                        if fields.complete {
                            let view = session.view(EdhocMessage::Message3);
                            ead_items(w, d, record, &dissector.ead, view, &dissector.config);
                        }
                        fields
                    },
                );
                let plaintext = self.dissection.bytes(record.source).to_vec();
                self.session.saw_plaintext_3(&plaintext, fields.cred_i);
                root.push(record);
            }
            Err(error) => root.error(error, ciphertext_3),
        }
    }

    fn message_4(
        &mut self,
        crypto: &mut impl CryptoTrait,
        w: &mut Walker,
        d: &mut CBORDecoder,
        root: &mut Record,
    ) {
        let Some(ciphertext_4) = messages::message_3_or_4(w, d, root, "CIPHERTEXT_4") else {
            return;
        };
        trailing(d, root, "message_4");
        if !self.dissector.config.decrypt {
            return;
        }
        let ciphertext = &d.buffer()[ciphertext_4.clone()];
        match self.session.decrypt_4(crypto, self.store, ciphertext) {
            Ok(plaintext) => {
                let session = &*self.session;
                let dissector = self.dissector;
                let (record, ()) = decode_plaintext(
                    self.dissection,
                    dissector,
                    "PLAINTEXT_4",
                    plaintext,
                    |w, d, record| {
                        let view = session.view(EdhocMessage::Message4);
                        ead_items(w, d, record, &dissector.ead, view, &dissector.config);
                    },
                );
                root.push(record);
            }
            Err(error) => root.error(error, ciphertext_4),
        }
    }
}

/// Register `plaintext` as a data source and decode it into a record named after it.
fn decode_plaintext<T>(
    dissection: &mut Dissection,
    dissector: &Dissector,
    name: &'static str,
    plaintext: Vec<u8>,
    decode: impl FnOnce(&mut Walker, &mut CBORDecoder, &mut Record) -> T,
) -> (Record, T) {
    let len = plaintext.len();
    let source = dissection.add_source(name, plaintext);
    let mut w = Walker::new(dissector.registries, source, dissector.config.max_nesting_depth);
    let mut record = Record::new(name, Value::None, source, 0..len);
    let mut d = CBORDecoder::new(dissection.bytes(source));
    let decoded = decode(&mut w, &mut d, &mut record);
    (record, decoded)
}

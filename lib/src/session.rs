//! Handshake state accumulated across the captured messages of one EDHOC session.
//!
//! A passive observer sees each message in isolation. The tracker decides which session a
//! captured buffer belongs to and which message it is, and keeps what later messages need from
//! earlier ones: the suite, message_1 for TH_2, G_Y, the plaintexts and credentials for TH_3 and
//! TH_4. Keys are derived lazily from that state and the secret store, and cached per store
//! generation.
use crate::aead::{decrypt_message_3, decrypt_message_4};
use crate::key_schedule::*;
use crate::messages::Shape;
use crate::secrets::{SecretRecord, SecretStore};
use defmt_or_log::debug;
use edhoc_lens_shared::{Crypto as CryptoTrait, *};
use std::collections::{BTreeMap, HashMap};
use zeroize::Zeroizing;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Unstarted,
    SawMsg1,
    SawMsg2,
    SawMsg3,
    SawMsg4,
    SawError,
}

impl SessionState {
    pub fn is_terminal(self) -> bool {
        matches!(self, SessionState::SawMsg4 | SessionState::SawError)
    }

    /// The message that moves a session on from this state, if any.
    fn next_message(self) -> Option<EdhocMessage> {
        match self {
            SessionState::Unstarted | SessionState::SawMsg1 => Some(EdhocMessage::Message2),
            SessionState::SawMsg2 => Some(EdhocMessage::Message3),
            SessionState::SawMsg3 => Some(EdhocMessage::Message4),
            SessionState::SawMsg4 | SessionState::SawError => None,
        }
    }
}

/// Keys and hashes derived for a session, valid for one secret store generation.
#[derive(Default)]
struct DerivedKeys {
    generation: u64,
    th_2: Option<Vec<u8>>,
    th_3: Option<Vec<u8>>,
    th_4: Option<Vec<u8>>,
    prk_2e: Option<Zeroizing<Vec<u8>>>,
    prk_3e2m: Option<Zeroizing<Vec<u8>>>,
    prk_4e3m: Option<Zeroizing<Vec<u8>>>,
    prk_out: Option<Zeroizing<Vec<u8>>>,
    prk_exporter: Option<Zeroizing<Vec<u8>>>,
}

impl core::fmt::Debug for DerivedKeys {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("DerivedKeys")
            .field("generation", &self.generation)
            .field("prk_2e", &self.prk_2e.is_some())
            .field("prk_3e2m", &self.prk_3e2m.is_some())
            .field("prk_4e3m", &self.prk_4e3m.is_some())
            .field("prk_out", &self.prk_out.is_some())
            .finish_non_exhaustive()
    }
}

/// OSCORE Security Context parameters derived from a completed handshake (RFC 9528,
/// Appendix A.1), from the initiator's point of view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OscoreContext {
    pub master_secret: Zeroizing<Vec<u8>>,
    pub master_salt: Vec<u8>,
    /// C_R
    pub sender_id: Vec<u8>,
    /// C_I
    pub recipient_id: Vec<u8>,
}

#[derive(Debug)]
pub struct Session {
    id: u32,
    conversation: u64,
    method: Option<EDHOCMethod>,
    suite: Option<&'static CipherSuite>,
    correlator: Option<Vec<u8>>,
    c_i: Option<ConnId>,
    c_r: Option<ConnId>,
    frames: BTreeMap<EdhocMessage, u32>,
    prev: Option<u32>,
    next: Option<u32>,
    message_1: Option<Vec<u8>>,
    g_y: Option<Vec<u8>>,
    plaintext_2: Option<Vec<u8>>,
    plaintext_3: Option<Vec<u8>>,
    cred_r: Option<Vec<u8>>,
    cred_i: Option<Vec<u8>>,
    key_updates: Vec<Vec<u8>>,
    keys: DerivedKeys,
}

fn missing(what: &'static str) -> DissectError {
    DissectError::MissingSecret(what)
}

fn set_once<T>(slot: &mut Option<T>, value: Option<T>) {
    if slot.is_none() {
        *slot = value;
    }
}

impl Session {
    fn new(id: u32, conversation: u64, prev: Option<u32>) -> Self {
        Session {
            id,
            conversation,
            method: None,
            suite: None,
            correlator: None,
            c_i: None,
            c_r: None,
            frames: BTreeMap::new(),
            prev,
            next: None,
            message_1: None,
            g_y: None,
            plaintext_2: None,
            plaintext_3: None,
            cred_r: None,
            cred_i: None,
            key_updates: Vec::new(),
            keys: DerivedKeys::default(),
        }
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn conversation(&self) -> u64 {
        self.conversation
    }

    pub fn state(&self) -> SessionState {
        if self.frames.contains_key(&EdhocMessage::Error) {
            SessionState::SawError
        } else if self.frames.contains_key(&EdhocMessage::Message4) {
            SessionState::SawMsg4
        } else if self.frames.contains_key(&EdhocMessage::Message3) {
            SessionState::SawMsg3
        } else if self.frames.contains_key(&EdhocMessage::Message2) {
            SessionState::SawMsg2
        } else if self.frames.contains_key(&EdhocMessage::Message1) {
            SessionState::SawMsg1
        } else {
            SessionState::Unstarted
        }
    }

    pub fn method(&self) -> Option<EDHOCMethod> {
        self.method
    }

    pub fn suite(&self) -> Option<&'static CipherSuite> {
        self.suite
    }

    /// G_X of message_1, which keys the secret store.
    pub fn correlator(&self) -> Option<&[u8]> {
        self.correlator.as_deref()
    }

    pub fn c_i(&self) -> Option<&ConnId> {
        self.c_i.as_ref()
    }

    pub fn c_r(&self) -> Option<&ConnId> {
        self.c_r.as_ref()
    }

    /// Frame the given message of this session was first seen in.
    pub fn frame(&self, message: EdhocMessage) -> Option<u32> {
        self.frames.get(&message).copied()
    }

    pub fn frames(&self) -> impl Iterator<Item = (EdhocMessage, u32)> + '_ {
        self.frames.iter().map(|(message, frame)| (*message, *frame))
    }

    pub fn prev(&self) -> Option<u32> {
        self.prev
    }

    pub fn next(&self) -> Option<u32> {
        self.next
    }

    pub(crate) fn view(&self, message: EdhocMessage) -> SessionView<'_> {
        SessionView {
            session: self.id,
            message,
            method: self.method,
            suite: self.suite,
            correlator: self.correlator.as_deref().unwrap_or_default(),
            critical: false,
        }
    }

    /// Resolve the suite. Once set, it never changes.
    pub(crate) fn set_suite(&mut self, suite: &'static CipherSuite) {
        if self.suite.is_none() {
            debug!("Session {} uses cipher suite {}", self.id, suite.id);
            self.suite = Some(suite);
        }
    }

    pub(crate) fn saw_message_1(
        &mut self,
        message_1: &[u8],
        method: Option<EDHOCMethod>,
        g_x: Option<Vec<u8>>,
        c_i: Option<ConnId>,
    ) {
        set_once(&mut self.message_1, Some(message_1.to_vec()));
        set_once(&mut self.method, method);
        set_once(&mut self.correlator, g_x);
        set_once(&mut self.c_i, c_i);
    }

    pub(crate) fn saw_g_y(&mut self, g_y: Option<Vec<u8>>) {
        set_once(&mut self.g_y, g_y);
    }

    pub(crate) fn saw_plaintext_2(
        &mut self,
        plaintext_2: &[u8],
        c_r: Option<ConnId>,
        cred_r: Option<Vec<u8>>,
    ) {
        set_once(&mut self.plaintext_2, Some(plaintext_2.to_vec()));
        set_once(&mut self.c_r, c_r);
        set_once(&mut self.cred_r, cred_r);
    }

    pub(crate) fn saw_plaintext_3(&mut self, plaintext_3: &[u8], cred_i: Option<Vec<u8>>) {
        set_once(&mut self.plaintext_3, Some(plaintext_3.to_vec()));
        set_once(&mut self.cred_i, cred_i);
    }

    fn record<'s>(&self, store: &'s SecretStore) -> Option<&'s SecretRecord> {
        store.get(self.correlator.as_deref()?)
    }

    fn resolved_suite(&self) -> Result<&'static CipherSuite, DissectError> {
        self.suite.ok_or(missing("cipher suite"))
    }

    /// Drop everything derived from a store other than `store`.
    fn sync(&mut self, store: &SecretStore) {
        if self.keys.generation != store.generation() {
            self.keys = DerivedKeys {
                generation: store.generation(),
                ..Default::default()
            };
        }
    }

    pub fn th_2(
        &mut self,
        crypto: &mut impl CryptoTrait,
        store: &SecretStore,
    ) -> Result<Vec<u8>, DissectError> {
        self.sync(store);
        if let Some(th_2) = self.record(store).and_then(|r| r.th_2.clone()) {
            return Ok(th_2);
        }
        if let Some(th_2) = &self.keys.th_2 {
            return Ok(th_2.clone());
        }
        let hash = self.resolved_suite()?.edhoc_hash;
        let message_1 = self.message_1.as_deref().ok_or(missing("TH_2"))?;
        let g_y = self.g_y.as_deref().ok_or(missing("TH_2"))?;
        let h_message_1 = compute_h_message_1(crypto, hash, message_1)?;
        let th_2 = compute_th_2(crypto, hash, g_y, &h_message_1)?;
        self.keys.th_2 = Some(th_2.clone());
        Ok(th_2)
    }

    pub fn th_3(
        &mut self,
        crypto: &mut impl CryptoTrait,
        store: &SecretStore,
    ) -> Result<Vec<u8>, DissectError> {
        self.sync(store);
        let record = self.record(store);
        if let Some(th_3) = record.and_then(|r| r.th_3.clone()) {
            return Ok(th_3);
        }
        if let Some(th_3) = &self.keys.th_3 {
            return Ok(th_3.clone());
        }
        let cred_r = record
            .and_then(|r| r.cred_r.clone())
            .or_else(|| self.cred_r.clone())
            .ok_or(missing("CRED_R"))?;
        let plaintext_2 = self.plaintext_2.clone().ok_or(missing("TH_3"))?;
        let th_2 = self.th_2(crypto, store)?;
        let hash = self.resolved_suite()?.edhoc_hash;
        let th_3 = compute_th_3(crypto, hash, &th_2, &plaintext_2, &cred_r)?;
        self.keys.th_3 = Some(th_3.clone());
        Ok(th_3)
    }

    pub fn th_4(
        &mut self,
        crypto: &mut impl CryptoTrait,
        store: &SecretStore,
    ) -> Result<Vec<u8>, DissectError> {
        self.sync(store);
        let record = self.record(store);
        if let Some(th_4) = record.and_then(|r| r.th_4.clone()) {
            return Ok(th_4);
        }
        if let Some(th_4) = &self.keys.th_4 {
            return Ok(th_4.clone());
        }
        let cred_i = record
            .and_then(|r| r.cred_i.clone())
            .or_else(|| self.cred_i.clone())
            .ok_or(missing("CRED_I"))?;
        let plaintext_3 = self.plaintext_3.clone().ok_or(missing("TH_4"))?;
        let th_3 = self.th_3(crypto, store)?;
        let hash = self.resolved_suite()?.edhoc_hash;
        let th_4 = compute_th_4(crypto, hash, &th_3, &plaintext_3, &cred_i)?;
        self.keys.th_4 = Some(th_4.clone());
        Ok(th_4)
    }

    pub fn prk_2e(
        &mut self,
        crypto: &mut impl CryptoTrait,
        store: &SecretStore,
    ) -> Result<Zeroizing<Vec<u8>>, DissectError> {
        self.sync(store);
        let record = self.record(store).ok_or(missing("PRK_2e"))?;
        if let Some(prk) = &record.prk_2e {
            return Ok(Zeroizing::new(prk.clone()));
        }
        if let Some(prk) = &self.keys.prk_2e {
            return Ok(prk.clone());
        }
        let g_xy = Zeroizing::new(record.g_xy.clone().ok_or(missing("PRK_2e"))?);
        let hash = self.resolved_suite()?.edhoc_hash;
        let th_2 = self.th_2(crypto, store)?;
        let prk = Zeroizing::new(compute_prk_2e(crypto, hash, &th_2, &g_xy)?);
        self.keys.prk_2e = Some(prk.clone());
        Ok(prk)
    }

    /// PRK_3e2m: supplied, equal to PRK_2e when the responder authenticates with a signature,
    /// or extracted from G_RX otherwise.
    pub fn prk_3e2m(
        &mut self,
        crypto: &mut impl CryptoTrait,
        store: &SecretStore,
    ) -> Result<Zeroizing<Vec<u8>>, DissectError> {
        self.sync(store);
        let record = self.record(store).ok_or(missing("PRK_3e2m"))?;
        if let Some(prk) = &record.prk_3e2m {
            return Ok(Zeroizing::new(prk.clone()));
        }
        if let Some(prk) = &self.keys.prk_3e2m {
            return Ok(prk.clone());
        }
        let g_rx = record.g_rx.clone().map(Zeroizing::new);
        let prk = match self.method {
            Some(method) if !method.responder_static_dh() => self.prk_2e(crypto, store)?,
            Some(_) => {
                let g_rx = g_rx.ok_or(missing("PRK_3e2m"))?;
                let hash = self.resolved_suite()?.edhoc_hash;
                let prk_2e = self.prk_2e(crypto, store)?;
                let th_2 = self.th_2(crypto, store)?;
                let salt = Zeroizing::new(compute_salt_3e2m(crypto, hash, &prk_2e, &th_2)?);
                Zeroizing::new(compute_prk_3e2m(crypto, hash, &salt, &g_rx)?)
            }
            None => return Err(missing("PRK_3e2m")),
        };
        self.keys.prk_3e2m = Some(prk.clone());
        Ok(prk)
    }

    /// PRK_4e3m: supplied, equal to PRK_3e2m when the initiator authenticates with a signature,
    /// or extracted from G_IY otherwise.
    pub fn prk_4e3m(
        &mut self,
        crypto: &mut impl CryptoTrait,
        store: &SecretStore,
    ) -> Result<Zeroizing<Vec<u8>>, DissectError> {
        self.sync(store);
        let record = self.record(store).ok_or(missing("PRK_4e3m"))?;
        if let Some(prk) = &record.prk_4e3m {
            return Ok(Zeroizing::new(prk.clone()));
        }
        if let Some(prk) = &self.keys.prk_4e3m {
            return Ok(prk.clone());
        }
        let g_iy = record.g_iy.clone().map(Zeroizing::new);
        let prk = match self.method {
            Some(method) if !method.initiator_static_dh() => self.prk_3e2m(crypto, store)?,
            Some(_) => {
                let g_iy = g_iy.ok_or(missing("PRK_4e3m"))?;
                let hash = self.resolved_suite()?.edhoc_hash;
                let prk_3e2m = self.prk_3e2m(crypto, store)?;
                let th_3 = self.th_3(crypto, store)?;
                let salt = Zeroizing::new(compute_salt_4e3m(crypto, hash, &prk_3e2m, &th_3)?);
                Zeroizing::new(compute_prk_4e3m(crypto, hash, &salt, &g_iy)?)
            }
            None => return Err(missing("PRK_4e3m")),
        };
        self.keys.prk_4e3m = Some(prk.clone());
        Ok(prk)
    }

    /// PRK_out, after all key updates applied so far.
    pub fn prk_out(
        &mut self,
        crypto: &mut impl CryptoTrait,
        store: &SecretStore,
    ) -> Result<Zeroizing<Vec<u8>>, DissectError> {
        self.sync(store);
        if let Some(prk) = &self.keys.prk_out {
            return Ok(prk.clone());
        }
        let hash = self.resolved_suite()?.edhoc_hash;
        let prk_4e3m = self.prk_4e3m(crypto, store)?;
        let th_4 = self.th_4(crypto, store)?;
        let mut prk = Zeroizing::new(compute_prk_out(crypto, hash, &prk_4e3m, &th_4)?);
        for context in &self.key_updates {
            let (prk_out, _) = edhoc_key_update(crypto, hash, &prk, context)?;
            prk = Zeroizing::new(prk_out);
        }
        self.keys.prk_out = Some(prk.clone());
        Ok(prk)
    }

    pub fn prk_exporter(
        &mut self,
        crypto: &mut impl CryptoTrait,
        store: &SecretStore,
    ) -> Result<Zeroizing<Vec<u8>>, DissectError> {
        self.sync(store);
        if let Some(prk) = &self.keys.prk_exporter {
            return Ok(prk.clone());
        }
        let hash = self.resolved_suite()?.edhoc_hash;
        let prk_out = self.prk_out(crypto, store)?;
        let prk = Zeroizing::new(compute_prk_exporter(crypto, hash, &prk_out)?);
        self.keys.prk_exporter = Some(prk.clone());
        Ok(prk)
    }

    /// EDHOC_Exporter(label, context, length)
    pub fn export(
        &mut self,
        crypto: &mut impl CryptoTrait,
        store: &SecretStore,
        label: u64,
        context: &[u8],
        length: usize,
    ) -> Result<Zeroizing<Vec<u8>>, DissectError> {
        let hash = self.resolved_suite()?.edhoc_hash;
        let prk_exporter = self.prk_exporter(crypto, store)?;
        edhoc_exporter(crypto, hash, &prk_exporter, label, context, length).map(Zeroizing::new)
    }

    /// EDHOC_KeyUpdate(context): replace PRK_out and PRK_exporter. Returns the new PRK_out.
    pub fn key_update(
        &mut self,
        crypto: &mut impl CryptoTrait,
        store: &SecretStore,
        context: &[u8],
    ) -> Result<Zeroizing<Vec<u8>>, DissectError> {
        let hash = self.resolved_suite()?.edhoc_hash;
        let prk_out = self.prk_out(crypto, store)?;
        let (prk_out, prk_exporter) = edhoc_key_update(crypto, hash, &prk_out, context)?;
        self.key_updates.push(context.to_vec());
        let prk_out = Zeroizing::new(prk_out);
        self.keys.prk_out = Some(prk_out.clone());
        self.keys.prk_exporter = Some(Zeroizing::new(prk_exporter));
        Ok(prk_out)
    }

    pub fn oscore_context(
        &mut self,
        crypto: &mut impl CryptoTrait,
        store: &SecretStore,
    ) -> Result<OscoreContext, DissectError> {
        let suite = self.resolved_suite()?;
        let prk_exporter = self.prk_exporter(crypto, store)?;
        let (master_secret, master_salt) = compute_oscore_master(crypto, suite, &prk_exporter)?;
        Ok(OscoreContext {
            master_secret: Zeroizing::new(master_secret),
            master_salt,
            sender_id: self.c_r.as_ref().map(|c| c.as_slice().to_vec()).unwrap_or_default(),
            recipient_id: self.c_i.as_ref().map(|c| c.as_slice().to_vec()).unwrap_or_default(),
        })
    }

    /// PLAINTEXT_2 = CIPHERTEXT_2 XOR KEYSTREAM_2
    pub(crate) fn decrypt_2(
        &mut self,
        crypto: &mut impl CryptoTrait,
        store: &SecretStore,
        ciphertext_2: &[u8],
    ) -> Result<Vec<u8>, DissectError> {
        let hash = self.resolved_suite()?.edhoc_hash;
        let prk_2e = self.prk_2e(crypto, store)?;
        let th_2 = self.th_2(crypto, store)?;
        encrypt_decrypt_ciphertext_2(crypto, hash, &prk_2e, &th_2, ciphertext_2)
    }

    pub(crate) fn decrypt_3(
        &mut self,
        crypto: &mut impl CryptoTrait,
        store: &SecretStore,
        ciphertext_3: &[u8],
    ) -> Result<Vec<u8>, DissectError> {
        let suite = self.resolved_suite()?;
        let prk_3e2m = self.prk_3e2m(crypto, store)?;
        let th_3 = self.th_3(crypto, store)?;
        decrypt_message_3(crypto, suite, &prk_3e2m, &th_3, ciphertext_3)
    }

    pub(crate) fn decrypt_4(
        &mut self,
        crypto: &mut impl CryptoTrait,
        store: &SecretStore,
        ciphertext_4: &[u8],
    ) -> Result<Vec<u8>, DissectError> {
        let suite = self.resolved_suite()?;
        let prk_4e3m = self.prk_4e3m(crypto, store)?;
        let th_4 = self.th_4(crypto, store)?;
        decrypt_message_4(crypto, suite, &prk_4e3m, &th_4, ciphertext_4)
    }
}

/// Which session a frame belongs to, and which message it is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Assignment {
    pub session: u32,
    pub message: EdhocMessage,
}

#[derive(Debug, Default)]
struct Conversation {
    current: Option<u32>,
    assignments: BTreeMap<u32, Assignment>,
}

/// Sessions of one capture.
///
/// Frames are assigned when first seen; dissecting a frame again reuses its assignment and
/// advances nothing.
#[derive(Debug, Default)]
pub struct CaptureContext {
    sessions: Vec<Session>,
    conversations: HashMap<u64, Conversation>,
}

impl CaptureContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Forget every session, e.g. when a capture is reloaded.
    pub fn clear(&mut self) {
        self.sessions.clear();
        self.conversations.clear();
    }

    pub fn sessions(&self) -> &[Session] {
        &self.sessions
    }

    pub fn session(&self, id: u32) -> Option<&Session> {
        self.sessions.get(id as usize)
    }

    pub fn session_mut(&mut self, id: u32) -> Option<&mut Session> {
        self.sessions.get_mut(id as usize)
    }

    /// Assignment made for `frame` earlier, if any.
    pub fn assignment(&self, conversation: u64, frame: u32) -> Option<Assignment> {
        self.conversations
            .get(&conversation)?
            .assignments
            .get(&frame)
            .copied()
    }

    /// Latest session of `conversation` that uses `c_r` as C_R.
    fn session_by_c_r(&self, conversation: u64, c_r: &[u8]) -> Option<u32> {
        self.sessions
            .iter()
            .rev()
            .filter(|s| s.conversation == conversation)
            .find(|s| s.c_r().is_some_and(|c| c.as_slice() == c_r))
            .map(Session::id)
    }

    /// Decide which session and message `frame` is.
    ///
    /// `forced` is the message number the host knows from elsewhere. `c_r` is a connection
    /// identifier prefixed to the message by the transport, which selects the session.
    pub(crate) fn assign(
        &mut self,
        conversation: u64,
        frame: u32,
        shape: Shape,
        forced: Option<EdhocMessage>,
        c_r: Option<&[u8]>,
    ) -> Assignment {
        if let Some(assignment) = self.assignment(conversation, frame) {
            return assignment;
        }
        let selected = c_r.and_then(|c_r| self.session_by_c_r(conversation, c_r));
        let current = selected.or_else(|| {
            self.conversations
                .get(&conversation)
                .and_then(|c| c.current)
        });
        let state = current
            .and_then(|id| self.session(id))
            .map(Session::state)
            .unwrap_or(SessionState::Unstarted);

        let message = forced.unwrap_or(match (shape, state) {
            // before message_3, a message_1 shape continues the running handshake
            (Shape::Message1, SessionState::SawMsg1) => EdhocMessage::Message2,
            (Shape::Message1, SessionState::SawMsg2) => EdhocMessage::Message3,
            (Shape::Message1, _) => EdhocMessage::Message1,
            (Shape::Error, _) => EdhocMessage::Error,
            (Shape::Other, _) => state.next_message().unwrap_or(EdhocMessage::Message2),
        });
        let reuse = current.filter(|id| {
            let Some(session) = self.session(*id) else {
                return false;
            };
            match message {
                EdhocMessage::Message1 => false,
                EdhocMessage::Error => !session.state().is_terminal(),
                _ => !session.state().is_terminal() && session.frame(message).is_none(),
            }
        });
        let session = match reuse {
            Some(id) => id,
            None => self.start_session(conversation),
        };
        debug!(
            "Frame {} is {} of session {}",
            frame,
            message.name(),
            session
        );

        let assignment = Assignment { session, message };
        let entry = self.conversations.entry(conversation).or_default();
        entry.current = Some(session);
        entry.assignments.insert(frame, assignment);
        if let Some(s) = self.session_mut(session) {
            s.frames.entry(message).or_insert(frame);
        }
        assignment
    }

    fn start_session(&mut self, conversation: u64) -> u32 {
        let id = self.sessions.len() as u32;
        let prev = self
            .conversations
            .get(&conversation)
            .and_then(|c| c.current);
        if let Some(previous) = prev.and_then(|prev| self.session_mut(prev)) {
            previous.next = Some(id);
        }
        self.sessions.push(Session::new(id, conversation, prev));
        id
    }
}

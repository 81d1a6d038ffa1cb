//! Externally supplied handshake secrets, keyed by the correlator of a session.
//!
//! Passive decoding cannot perform the Diffie-Hellman steps of EDHOC, so anything that depends on
//! them has to come from outside: either the intermediate PRKs directly, or the shared secrets
//! they are extracted from. Transcript hashes and credentials can be supplied as well, for
//! captures that lack the messages needed to compute them.
use defmt_or_log::{debug, warn};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use zeroize::Zeroize;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{field} is not valid hex: {source}")]
    InvalidHex {
        field: &'static str,
        #[source]
        source: hex::FromHexError,
    },
    #[error("secret entry without a correlator")]
    MissingCorrelator,
}

/// One row of secret configuration, as a host loads it: every value hex encoded, empty when not
/// known.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SecretEntry {
    /// G_X of message_1.
    pub correlator: String,
    pub prk_2e: String,
    pub th_2: String,
    pub prk_3e2m: String,
    pub th_3: String,
    pub prk_4e3m: String,
    pub th_4: String,
    pub g_xy: String,
    pub g_rx: String,
    pub g_iy: String,
    pub cred_i: String,
    pub cred_r: String,
}

/// Decoded secrets of one session. Wiped when dropped.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct SecretRecord {
    pub prk_2e: Option<Vec<u8>>,
    pub th_2: Option<Vec<u8>>,
    pub prk_3e2m: Option<Vec<u8>>,
    pub th_3: Option<Vec<u8>>,
    pub prk_4e3m: Option<Vec<u8>>,
    pub th_4: Option<Vec<u8>>,
    /// Ephemeral-ephemeral shared secret, input of PRK_2e.
    pub g_xy: Option<Vec<u8>>,
    /// Responder static / initiator ephemeral shared secret, input of PRK_3e2m.
    pub g_rx: Option<Vec<u8>>,
    /// Initiator static / responder ephemeral shared secret, input of PRK_4e3m.
    pub g_iy: Option<Vec<u8>>,
    pub cred_i: Option<Vec<u8>>,
    pub cred_r: Option<Vec<u8>>,
}

impl SecretRecord {
    pub fn from_entry(entry: &SecretEntry) -> Result<Self, ConfigError> {
        Ok(SecretRecord {
            prk_2e: decode_field("PRK_2e", &entry.prk_2e)?,
            th_2: decode_field("TH_2", &entry.th_2)?,
            prk_3e2m: decode_field("PRK_3e2m", &entry.prk_3e2m)?,
            th_3: decode_field("TH_3", &entry.th_3)?,
            prk_4e3m: decode_field("PRK_4e3m", &entry.prk_4e3m)?,
            th_4: decode_field("TH_4", &entry.th_4)?,
            g_xy: decode_field("G_XY", &entry.g_xy)?,
            g_rx: decode_field("G_RX", &entry.g_rx)?,
            g_iy: decode_field("G_IY", &entry.g_iy)?,
            cred_i: decode_field("CRED_I", &entry.cred_i)?,
            cred_r: decode_field("CRED_R", &entry.cred_r)?,
        })
    }
}

impl core::fmt::Debug for SecretRecord {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        // only presence is shown, never the key material
        let present = |value: &Option<Vec<u8>>| value.is_some();
        f.debug_struct("SecretRecord")
            .field("prk_2e", &present(&self.prk_2e))
            .field("th_2", &present(&self.th_2))
            .field("prk_3e2m", &present(&self.prk_3e2m))
            .field("th_3", &present(&self.th_3))
            .field("prk_4e3m", &present(&self.prk_4e3m))
            .field("th_4", &present(&self.th_4))
            .field("g_xy", &present(&self.g_xy))
            .field("g_rx", &present(&self.g_rx))
            .field("g_iy", &present(&self.g_iy))
            .field("cred_i", &present(&self.cred_i))
            .field("cred_r", &present(&self.cred_r))
            .finish()
    }
}

impl Drop for SecretRecord {
    fn drop(&mut self) {
        self.prk_2e.zeroize();
        self.prk_3e2m.zeroize();
        self.prk_4e3m.zeroize();
        self.g_xy.zeroize();
        self.g_rx.zeroize();
        self.g_iy.zeroize();
    }
}

fn decode_field(field: &'static str, value: &str) -> Result<Option<Vec<u8>>, ConfigError> {
    let compact: String = value
        .chars()
        .filter(|c| !c.is_whitespace() && *c != ':')
        .collect();
    if compact.is_empty() {
        return Ok(None);
    }
    hex::decode(compact)
        .map(Some)
        .map_err(|source| ConfigError::InvalidHex { field, source })
}

static NEXT_GENERATION: AtomicU64 = AtomicU64::new(1);

/// Immutable set of secret records.
///
/// Every store gets a process-unique generation number, which sessions use to notice that keys
/// they derived earlier came from a store that has since been replaced.
#[derive(Debug)]
pub struct SecretStore {
    records: HashMap<Vec<u8>, SecretRecord>,
    generation: u64,
}

impl Default for SecretStore {
    fn default() -> Self {
        Self::new()
    }
}

impl SecretStore {
    pub fn new() -> Self {
        SecretStore {
            records: HashMap::new(),
            generation: NEXT_GENERATION.fetch_add(1, Ordering::Relaxed),
        }
    }

    /// Decode a list of entries. A correlator listed twice keeps its last entry.
    pub fn from_entries(entries: &[SecretEntry]) -> Result<Self, ConfigError> {
        let mut store = Self::new();
        for entry in entries {
            let correlator = decode_field("correlator", &entry.correlator)?
                .ok_or(ConfigError::MissingCorrelator)?;
            let record = SecretRecord::from_entry(entry)?;
            if store.records.insert(correlator, record).is_some() {
                warn!("Duplicate secret entry for correlator {}", entry.correlator);
            }
        }
        debug!("Loaded {} secret records", store.records.len());
        Ok(store)
    }

    pub fn insert(&mut self, correlator: Vec<u8>, record: SecretRecord) {
        self.records.insert(correlator, record);
    }

    pub fn get(&self, correlator: &[u8]) -> Option<&SecretRecord> {
        self.records.get(correlator)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }
}

/// Process-wide handle to the current [`SecretStore`].
///
/// Readers take a snapshot once per frame and keep using it even if the store is replaced in the
/// meantime, so a decode never sees half of an old and half of a new configuration.
#[derive(Debug, Clone, Default)]
pub struct SharedSecretStore(Arc<RwLock<Arc<SecretStore>>>);

impl SharedSecretStore {
    pub fn new(store: SecretStore) -> Self {
        SharedSecretStore(Arc::new(RwLock::new(Arc::new(store))))
    }

    pub fn snapshot(&self) -> Arc<SecretStore> {
        self.0.read().clone()
    }

    pub fn replace(&self, store: SecretStore) {
        debug!("Replacing secret store, generation {}", store.generation());
        *self.0.write() = Arc::new(store);
    }

    /// Decode `entries` and install them. On error the current store stays in place.
    pub fn load(&self, entries: &[SecretEntry]) -> Result<(), ConfigError> {
        let store = SecretStore::from_entries(entries)?;
        self.replace(store);
        Ok(())
    }
}

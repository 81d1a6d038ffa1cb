//! Passive decoding of COSE structures and EDHOC handshakes
//!
//! A [`Dissector`] turns a captured buffer into a [`Dissection`]: a tree of records, each naming
//! a field, its value and the bytes it came from, with diagnostics attached where decoding went
//! wrong. Nothing a buffer contains stops a dissection; malformed parts are reported on the
//! record of the container they occur in, and decoding continues with its siblings.
//!
//! EDHOC messages are tracked across a capture in a [`CaptureContext`]. When the
//! [`SharedSecretStore`] has secrets for a session, handshake keys are derived and the encrypted
//! parts of messages 2 to 4 are decoded too. Completed sessions offer the EDHOC exporter, key
//! update and the derived OSCORE context.
//!
//! ```
//! use edhoc_lens::*;
//! use hexlit::hex;
//!
//! let dissector = Dissector::default();
//! let mut capture = CaptureContext::new();
//! let mut crypto = edhoc_lens_crypto::default_crypto();
//! // message_1 of RFC 9529, Section 2
//! let message_1 = hexlit::hex!("0382060258208af6f430ebe18d34184017a9a11bf511c8dff8f834730b96c1b7c8dbca2fc3b637");
//! let dissection = dissector.dissect(
//!     &mut crypto,
//!     &mut capture,
//!     FrameInfo::default(),
//!     None,
//!     &message_1,
//! );
//! assert_eq!("EDHOC message_1", dissection.root.name);
//! ```
pub use {
    config::*, dissector::*, ead::EadRegistry, envelope::decode, envelope::EnvelopeKind,
    registry::*, secrets::*, session::*,
};

pub use edhoc_lens_shared::*;

pub mod aead;
mod config;
mod dissector;
mod ead;
mod envelope;
mod header;
mod item;
pub mod key_schedule;
mod messages;
mod registry;
mod secrets;
mod session;

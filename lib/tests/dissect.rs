use edhoc_lens::key_schedule::*;
use edhoc_lens::*;
use edhoc_lens_crypto::default_crypto;
use edhoc_lens_ead_authz::{ZeroTouchVoucherDecoder, EAD_AUTHZ_LABEL};
use hexlit::hex;
use std::sync::{Arc, OnceLock};

// RFC 9529, Section 3: method 3, cipher suite 2
const MESSAGE_1_TV: &[u8] =
    &hex!("0382060258208af6f430ebe18d34184017a9a11bf511c8dff8f834730b96c1b7c8dbca2fc3b637");
const G_X_TV: &str = "8af6f430ebe18d34184017a9a11bf511c8dff8f834730b96c1b7c8dbca2fc3b6";
const MESSAGE_2_TV: &[u8] = &hex!("582b419701d7f00a26c2dc587a36dd752549f33763c893422c8ea0f955a13a4ff5d59862a1eef9e0e7e1886fcd");
const PLAINTEXT_2_TV: &[u8] = &hex!("2732480943305c899f5c54");
const MESSAGE_3_TV: &[u8] = &hex!("52e562097bc417dd5919485ac7891ffd90a9fc");
const PLAINTEXT_3_TV: &[u8] = &hex!("2b48623c91df41e34c2f");
const MESSAGE_4_TV: &[u8] = &hex!("4828c966b7ca304f83");
const PRK_2E_TV: &str = "5aa0d69f3e3d1e0c479f0b8a486690c9802630c3466b1dc92371c982563170b5";
const PRK_3E2M_TV: &str = "0ca3d3398296b3c03900987620c11f6fce70781c1d1219720f9ec08c122d8434";
const PRK_4E3M_TV: &str = "81cc8a298e357044e3c466bb5c0a1e507e01d49238aeba138df94635407c0ff7";
const CRED_R_TV: &str = "a2026b6578616d706c652e65647508a101a501020241322001215820bbc34960526ea4d32e940cad2a234148ddc21791a12afbcbac93622046dd44f02258204519e257236b2a0ce2023f0931f1f386ca7afda64fcde0108c224c51eabf6072";
const CRED_I_TV: &str = "a2027734322d35302d33312d46462d45462d33372d33322d333908a101a5010202412b2001215820ac75e9ece3e50bfc8ed60399889522405c47bf16df96660a41298cb4307f7eb62258206e5de611388a4b8a8211334ac7d37ecb52a387d257e6db3c2a93df21ff3affc8";
const PRK_OUT_TV: &[u8] =
    &hex!("2c71afc1a9338a940bb3529ca734b886f30d1aba0b4dc51beeaeabdfea9ecbf8");
const OSCORE_MASTER_SECRET_TV: &[u8] = &hex!("f9868f6a3aca78a05d1485b35030b162");
const OSCORE_MASTER_SALT_TV: &[u8] = &hex!("ada24c7dbfc85eeb");

fn trace_dissector() -> Dissector {
    let dissector = Dissector::default();
    dissector
        .secrets()
        .load(&[SecretEntry {
            correlator: G_X_TV.into(),
            prk_2e: PRK_2E_TV.into(),
            prk_3e2m: PRK_3E2M_TV.into(),
            prk_4e3m: PRK_4E3M_TV.into(),
            cred_r: CRED_R_TV.into(),
            cred_i: CRED_I_TV.into(),
            ..Default::default()
        }])
        .unwrap();
    dissector
}

fn frame(frame: u32) -> FrameInfo {
    FrameInfo {
        frame,
        conversation: 1,
    }
}

#[test]
fn test_rfc9529_trace() {
    let dissector = trace_dissector();
    let mut capture = CaptureContext::new();
    let mut crypto = default_crypto();

    let mut dissect = |n: u32, bytes: &'static [u8]| {
        dissector.dissect(&mut crypto, &mut capture, frame(n), None, bytes)
    };
    let message_1 = dissect(1, MESSAGE_1_TV);
    let message_2 = dissect(2, MESSAGE_2_TV);
    let message_3 = dissect(3, MESSAGE_3_TV);
    let message_4 = dissect(4, MESSAGE_4_TV);

    assert_eq!("EDHOC message_1", message_1.root.name);
    assert_eq!(
        Some(&Value::Integer(-24)),
        message_1.root.find("C_I").map(|r| &r.value)
    );

    assert_eq!("EDHOC message_2", message_2.root.name);
    assert_eq!(
        PLAINTEXT_2_TV,
        message_2.source_named("PLAINTEXT_2").unwrap().bytes
    );
    let c_r = message_2.root.find("C_R").unwrap();
    assert_eq!(Value::Integer(-8), c_r.value);
    assert_eq!(SourceId(1), c_r.source);
    assert_eq!(0..1, c_r.range);

    assert_eq!(
        PLAINTEXT_3_TV,
        message_3.source_named("PLAINTEXT_3").unwrap().bytes
    );
    assert!(message_3.root.find("Signature_or_MAC_3").is_some());

    let plaintext_4 = message_4.source_named("PLAINTEXT_4").unwrap();
    assert!(plaintext_4.bytes.is_empty());

    for dissection in [&message_1, &message_2, &message_3, &message_4] {
        assert!(!dissection.has_error(|_| true), "{}", dissection.render());
    }

    assert_eq!(1, capture.sessions().len());
    let session = capture.session_mut(0).unwrap();
    assert_eq!(SessionState::SawMsg4, session.state());
    assert_eq!(Some(4), session.frame(EdhocMessage::Message4));

    let store = dissector.secrets().snapshot();
    assert_eq!(
        PRK_OUT_TV,
        session.prk_out(&mut crypto, &store).unwrap().as_slice()
    );
    let oscore = session.oscore_context(&mut crypto, &store).unwrap();
    assert_eq!(OSCORE_MASTER_SECRET_TV, oscore.master_secret.as_slice());
    assert_eq!(OSCORE_MASTER_SALT_TV, oscore.master_salt);
    assert_eq!(vec![0x27], oscore.sender_id);
    assert_eq!(vec![0x37], oscore.recipient_id);
    assert_eq!(
        OSCORE_MASTER_SECRET_TV,
        session
            .export(&mut crypto, &store, 0, &[], 16)
            .unwrap()
            .as_slice()
    );
}

#[test]
fn test_redissection_is_idempotent() {
    let dissector = trace_dissector();
    let mut capture = CaptureContext::new();
    let mut crypto = default_crypto();

    let frames: [&[u8]; 4] = [MESSAGE_1_TV, MESSAGE_2_TV, MESSAGE_3_TV, MESSAGE_4_TV];
    let first: Vec<String> = frames
        .iter()
        .zip(1..)
        .map(|(bytes, n)| {
            dissector
                .dissect(&mut crypto, &mut capture, frame(n), None, bytes)
                .render()
        })
        .collect();

    // go back in the capture, in an arbitrary order
    for (n, bytes) in [(2, MESSAGE_2_TV), (1, MESSAGE_1_TV), (4, MESSAGE_4_TV), (3, MESSAGE_3_TV)] {
        let again = dissector.dissect(&mut crypto, &mut capture, frame(n), None, bytes);
        assert_eq!(first[n as usize - 1], again.render());
    }
    assert_eq!(1, capture.sessions().len());
    assert_eq!(
        SessionState::SawMsg4,
        capture.session(0).unwrap().state()
    );
}

#[test]
fn test_message_1_shape_starts_session_after_message_3() {
    let dissector = Dissector::default();
    let mut capture = CaptureContext::new();
    let mut crypto = default_crypto();

    let frames: [&[u8]; 5] = [
        MESSAGE_1_TV,
        MESSAGE_1_TV,
        MESSAGE_2_TV,
        MESSAGE_1_TV,
        MESSAGE_2_TV,
    ];
    let names: Vec<_> = frames
        .iter()
        .zip(1..)
        .map(|(bytes, n)| {
            let dissection = dissector.dissect(&mut crypto, &mut capture, frame(n), None, bytes);
            dissection.root.name.into_owned()
        })
        .collect();

    assert_eq!(
        vec![
            "EDHOC message_1",
            "EDHOC message_2",
            "EDHOC message_3",
            "EDHOC message_1",
            "EDHOC message_2",
        ],
        names
    );
    let sessions: Vec<_> = (1..=5)
        .map(|n| capture.assignment(1, n).map(|a| a.session))
        .collect();
    assert_eq!(
        vec![Some(0), Some(0), Some(0), Some(1), Some(1)],
        sessions
    );
    assert_eq!(SessionState::SawMsg3, capture.session(0).unwrap().state());
    assert_eq!(Some(0), capture.session(1).unwrap().prev());
}

#[test]
fn test_connection_identifier_prefix() {
    let dissector = trace_dissector();
    let mut capture = CaptureContext::new();
    let mut crypto = default_crypto();
    let cid = Some(Discriminator::MediaType("application/cid-edhoc+cbor-seq"));
    let plain = Some(Discriminator::MediaType("application/edhoc+cbor-seq"));

    let message_1 = [&[0xf5][..], MESSAGE_1_TV].concat();
    let message_3 = [&[0x27][..], MESSAGE_3_TV].concat();
    // an unrelated handshake in between
    let other = hex!("0302582000000000000000000000000000000000000000000000000000000000000000000e");

    dissector.dissect(&mut crypto, &mut capture, frame(1), cid, &message_1);
    let message_2 = dissector.dissect(&mut crypto, &mut capture, frame(2), plain, MESSAGE_2_TV);
    dissector.dissect(&mut crypto, &mut capture, frame(3), cid, &[&[0xf5][..], &other[..]].concat());
    let message_3 = dissector.dissect(&mut crypto, &mut capture, frame(4), cid, &message_3);

    // message_1 is hashed without its prefix, or PLAINTEXT_2 would be garbage
    assert_eq!(
        PLAINTEXT_2_TV,
        message_2.source_named("PLAINTEXT_2").unwrap().bytes
    );
    assert_eq!("EDHOC message_3", message_3.root.name);
    assert_eq!(
        PLAINTEXT_3_TV,
        message_3.source_named("PLAINTEXT_3").unwrap().bytes
    );
    assert_eq!(Some(0), capture.assignment(1, 4).map(|a| a.session));
    assert_eq!(2, capture.sessions().len());
}

/// Method 0 (signatures only), suite 2, an empty C_I, and CRED_R sent by value.
struct SignatureSession {
    message_1: Vec<u8>,
    message_2: Vec<u8>,
    plaintext_2: Vec<u8>,
    message_3: Vec<u8>,
    plaintext_3: Vec<u8>,
}

const G_X_CHAIN: [u8; 32] = [0x5a; 32];
const G_Y_CHAIN: [u8; 32] = [0xa5; 32];
const PRK_2E_CHAIN: [u8; 32] = [0x0f; 32];

fn signature_session() -> SignatureSession {
    let mut crypto = default_crypto();
    let suite = cipher_suite(2).unwrap();
    let hash = suite.edhoc_hash;
    let cred_r = hex::decode(CRED_R_TV).unwrap();

    let mut message_1 = CBOREncoder::new();
    message_1.uint(0).uint(2).bytes(&G_X_CHAIN).bytes(&[]);
    let message_1 = message_1.into_vec();

    let mut plaintext_2 = CBOREncoder::new();
    plaintext_2
        .int(-8)
        .map(1)
        .int(HEADER_KCCS)
        .raw(&cred_r)
        .bytes(&[0x22; 64]);
    let plaintext_2 = plaintext_2.into_vec();

    let h_message_1 = compute_h_message_1(&mut crypto, hash, &message_1).unwrap();
    let th_2 = compute_th_2(&mut crypto, hash, &G_Y_CHAIN, &h_message_1).unwrap();
    let ciphertext_2 =
        encrypt_decrypt_ciphertext_2(&mut crypto, hash, &PRK_2E_CHAIN, &th_2, &plaintext_2)
            .unwrap();
    let mut message_2 = CBOREncoder::new();
    message_2.bytes(&[&G_Y_CHAIN[..], &ciphertext_2].concat());
    let message_2 = message_2.into_vec();

    let mut plaintext_3 = CBOREncoder::new();
    plaintext_3.int(-12).bytes(&[0x33; 64]);
    let plaintext_3 = plaintext_3.into_vec();

    // signatures on both sides: PRK_3e2m = PRK_2e
    let th_3 = compute_th_3(&mut crypto, hash, &th_2, &plaintext_2, &cred_r).unwrap();
    let ciphertext_3 =
        aead::encrypt_message_3(&mut crypto, suite, &PRK_2E_CHAIN, &th_3, &plaintext_3).unwrap();
    let mut message_3 = CBOREncoder::new();
    message_3.bytes(&ciphertext_3);
    let message_3 = message_3.into_vec();

    SignatureSession {
        message_1,
        message_2,
        plaintext_2,
        message_3,
        plaintext_3,
    }
}

#[test]
fn test_session_chain_decrypts() {
    let chain = signature_session();
    let dissector = Dissector::default();
    dissector
        .secrets()
        .load(&[SecretEntry {
            correlator: hex::encode(G_X_CHAIN),
            prk_2e: hex::encode(PRK_2E_CHAIN),
            ..Default::default()
        }])
        .unwrap();
    let mut capture = CaptureContext::new();
    let mut crypto = default_crypto();

    let message_1 = dissector.dissect(&mut crypto, &mut capture, frame(1), None, &chain.message_1);
    let message_2 = dissector.dissect(&mut crypto, &mut capture, frame(2), None, &chain.message_2);
    let message_3 = dissector.dissect(&mut crypto, &mut capture, frame(3), None, &chain.message_3);

    assert_eq!(
        Some(&Value::Bytes(37..37)),
        message_1.root.find("C_I").map(|r| &r.value)
    );
    assert_eq!(
        chain.plaintext_2,
        message_2.source_named("PLAINTEXT_2").unwrap().bytes
    );
    assert!(message_2.root.find("kccs").is_some());
    assert_eq!(
        chain.plaintext_3,
        message_3.source_named("PLAINTEXT_3").unwrap().bytes
    );
    for dissection in [&message_1, &message_2, &message_3] {
        assert!(!dissection.has_error(|_| true), "{}", dissection.render());
    }
    assert_eq!(
        SessionState::SawMsg3,
        capture.session(0).unwrap().state()
    );
}

#[test]
fn test_session_chain_without_secrets() {
    let chain = signature_session();
    let dissector = Dissector::default();
    let mut capture = CaptureContext::new();
    let mut crypto = default_crypto();

    dissector.dissect(&mut crypto, &mut capture, frame(1), None, &chain.message_1);
    let message_2 = dissector.dissect(&mut crypto, &mut capture, frame(2), None, &chain.message_2);
    let message_3 = dissector.dissect(&mut crypto, &mut capture, frame(3), None, &chain.message_3);

    for dissection in [&message_2, &message_3] {
        assert!(dissection.sources.is_empty());
        assert!(dissection.has_error(|e| matches!(e, DissectError::MissingSecret(_))));
        assert!(!dissection.has_error(DissectError::is_structural));
    }
    // the structure is there all the same
    assert!(message_2.root.find("CIPHERTEXT_2").is_some());
    assert!(message_3.root.find("CIPHERTEXT_3").is_some());
    assert_eq!(
        SessionState::SawMsg3,
        capture.session(0).unwrap().state()
    );
}

#[test]
fn test_decryption_can_be_disabled() {
    let config = DissectorConfig {
        decrypt: false,
        ..Default::default()
    };
    let dissector = Dissector::with_secrets(config, trace_dissector().secrets().clone());
    let mut capture = CaptureContext::new();
    let mut crypto = default_crypto();

    dissector.dissect(&mut crypto, &mut capture, frame(1), None, MESSAGE_1_TV);
    let message_2 = dissector.dissect(&mut crypto, &mut capture, frame(2), None, MESSAGE_2_TV);
    assert!(message_2.sources.is_empty());
    assert!(message_2.diagnostics().is_empty());
}

#[test]
fn test_deep_nesting_in_envelope() {
    // COSE_Sign1 with an unprotected parameter nested 1000 arrays deep
    let mut sign1 = hex!("d28440a11863").to_vec();
    sign1.extend(std::iter::repeat(0x81).take(1000));
    sign1.extend(hex!("004040"));

    let dissector = Dissector::default();
    let dissection = dissector.dissect(
        &mut default_crypto(),
        &mut CaptureContext::new(),
        frame(1),
        None,
        &sign1,
    );

    assert_eq!("COSE_Sign1", dissection.root.name);
    assert!(dissection.has_error(|e| matches!(
        e,
        DissectError::RecursionLimitExceeded {
            limit: DEFAULT_MAX_NESTING_DEPTH
        }
    )));
    // siblings after the deep item are decoded
    assert!(dissection.root.find("payload").is_some());
    assert!(dissection.root.find("signature").is_some());
}

static SIGNER_REGISTRIES: OnceLock<Registries> = OnceLock::new();

#[test]
fn test_registry_precedence() {
    let registries = SIGNER_REGISTRIES.get_or_init(|| {
        let mut registries = Registries::builtin();
        registries.headers.register(
            Some(-7),
            Label::Int(HEADER_KID),
            ParamSpec {
                name: "ES256 kid",
                decoder: ParamDecoder::Bytes,
            },
        );
        registries
    });
    let dissector = Dissector::default().with_registries(registries);
    let dissect = |bytes: &[u8]| {
        let kind = Some(Discriminator::Kind(MessageKind::Envelope(EnvelopeKind::Sign1)));
        let dissection = dissector.dissect(
            &mut default_crypto(),
            &mut CaptureContext::new(),
            frame(1),
            kind,
            bytes,
        );
        dissection.root.iter().map(|r| r.name.to_string()).collect::<Vec<_>>()
    };

    // alg ES256 selects the context-specific entry, ES384 falls back to the generic one
    let es256 = dissect(&hex!("d28443a10126a10441114040"));
    let es384 = dissect(&hex!("d28444a1013822a10441114040"));
    assert!(es256.contains(&"ES256 kid".to_string()));
    assert!(es384.contains(&"kid".to_string()));
    assert!(!es384.contains(&"ES256 kid".to_string()));
}

#[test]
fn test_authorization_ead() {
    let mut dissector = Dissector::default();
    dissector.register_ead(EAD_AUTHZ_LABEL, Arc::new(ZeroTouchVoucherDecoder));
    let message_1 = [
        MESSAGE_1_TV,
        &hex!("015828")[..],
        &hex!("7818636f61703a2f2f656e726f6c6c6d656e742e7365727665724d71fb72788b180ebe332697d711")[..],
    ]
    .concat();

    let dissection = dissector.dissect(
        &mut default_crypto(),
        &mut CaptureContext::new(),
        frame(1),
        None,
        &message_1,
    );

    let loc_w = dissection.root.find("LOC_W").unwrap();
    assert_eq!(Value::Text("coap://enrollment.server".into()), loc_w.value);
    assert_eq!(42..68, loc_w.range);
    assert_eq!(
        Some(&Value::Bytes(69..82)),
        dissection.root.find("ENC_ID").map(|r| &r.value)
    );
    assert!(dissection.diagnostics().is_empty(), "{}", dissection.render());
}

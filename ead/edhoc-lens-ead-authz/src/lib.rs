//! Decoder for the zero touch authorization EAD of draft-ietf-lake-authz
//!
//! In message_1 the device sends the location of its enrollment server and its encrypted
//! identity; in message_2 the authenticator relays the server's voucher. Neither can be
//! decrypted or verified by an observer, so the decoder only names the fields.
use defmt_or_log::trace;
use edhoc_lens_shared::*;

/// Label of the authorization EAD item.
pub const EAD_AUTHZ_LABEL: u64 = 0x1; // NOTE: still TBD1 in the draft

#[derive(Debug, Default, Clone, Copy)]
pub struct ZeroTouchVoucherDecoder;

impl ZeroTouchVoucherDecoder {
    /// EAD_1 value = (LOC_W: tstr, ENC_ID: bstr)
    fn ead_1(value: &[u8]) -> EadDecoded {
        let mut d = CBORDecoder::new(value);
        let mut decoded = EadDecoded::default();

        let Ok(loc_w) = d.require(MajorType::Text) else {
            return decoded;
        };
        decoded.fields.push(Record::new(
            "LOC_W",
            Value::Text(String::from_utf8_lossy(&value[loc_w.content]).into_owned()),
            SourceId::FRAME,
            loc_w.span,
        ));
        decoded.consumed = d.position();

        let Ok(enc_id) = d.require(MajorType::Bytes) else {
            return decoded;
        };
        decoded.fields.push(Record::new(
            "ENC_ID",
            Value::Bytes(enc_id.content),
            SourceId::FRAME,
            enc_id.span,
        ));
        decoded.consumed = d.position();
        decoded
    }

    /// EAD_2 value = (Voucher: bstr)
    fn ead_2(value: &[u8]) -> EadDecoded {
        let mut d = CBORDecoder::new(value);
        match d.require(MajorType::Bytes) {
            Ok(voucher) => EadDecoded {
                consumed: d.position(),
                fields: vec![Record::new(
                    "Voucher",
                    Value::Bytes(voucher.content),
                    SourceId::FRAME,
                    voucher.span,
                )],
            },
            Err(_) => EadDecoded::default(),
        }
    }
}

impl EadDecoder for ZeroTouchVoucherDecoder {
    fn name(&self) -> &'static str {
        "zero touch authorization"
    }

    fn decode(&self, value: &[u8], session: &SessionView) -> EadDecoded {
        trace!("Enter decode");
        match session.message {
            EdhocMessage::Message1 => Self::ead_1(value),
            EdhocMessage::Message2 => Self::ead_2(value),
            _ => EadDecoded::default(),
        }
    }
}

#[cfg(test)]
mod test_authz {
    use super::*;
    use hexlit::hex;
    use rstest::rstest;

    // (LOC_W "coap://enrollment.server", ENC_ID)
    const EAD_1_VALUE_TV: &[u8] =
        &hex!("7818636f61703a2f2f656e726f6c6c6d656e742e7365727665724d71fb72788b180ebe332697d711");
    const VOUCHER_TV: &[u8] = &hex!("48ee1f4a82ab6a4a40");

    fn view(message: EdhocMessage) -> SessionView<'static> {
        SessionView {
            session: 0,
            message,
            method: None,
            suite: None,
            correlator: &[],
            critical: true,
        }
    }

    #[test]
    fn test_ead_1() {
        let decoded =
            ZeroTouchVoucherDecoder.decode(EAD_1_VALUE_TV, &view(EdhocMessage::Message1));

        assert_eq!(EAD_1_VALUE_TV.len(), decoded.consumed);
        assert_eq!(
            Value::Text("coap://enrollment.server".into()),
            decoded.fields[0].value
        );
        assert_eq!(0..26, decoded.fields[0].range);
        assert_eq!(Value::Bytes(27..40), decoded.fields[1].value);
    }

    #[test]
    fn test_ead_1_without_enc_id() {
        let decoded =
            ZeroTouchVoucherDecoder.decode(&EAD_1_VALUE_TV[..26], &view(EdhocMessage::Message1));
        assert_eq!(26, decoded.consumed);
        assert_eq!(1, decoded.fields.len());
    }

    #[test]
    fn test_ead_2() {
        let decoded = ZeroTouchVoucherDecoder.decode(VOUCHER_TV, &view(EdhocMessage::Message2));
        assert_eq!(9, decoded.consumed);
        assert_eq!("Voucher", decoded.fields[0].name);
        assert_eq!(Value::Bytes(1..9), decoded.fields[0].value);
    }

    #[rstest]
    #[case(EdhocMessage::Message1, VOUCHER_TV)]
    #[case(EdhocMessage::Message2, EAD_1_VALUE_TV)]
    #[case(EdhocMessage::Message3, VOUCHER_TV)]
    fn test_unexpected_value(#[case] message: EdhocMessage, #[case] value: &[u8]) {
        let decoded = ZeroTouchVoucherDecoder.decode(value, &view(message));
        assert_eq!(0, decoded.consumed);
        assert!(decoded.fields.is_empty());
    }
}

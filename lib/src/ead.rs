//! External Authorization Data items and the registry of decoders for their values.
use crate::config::DissectorConfig;
use crate::item::{generic, Walker};
use defmt_or_log::{debug, trace};
use edhoc_lens_shared::*;
use std::collections::HashMap;
use std::sync::Arc;

/// EAD decoders by the absolute value of their label.
#[derive(Debug, Clone, Default)]
pub struct EadRegistry {
    decoders: HashMap<u64, Arc<dyn EadDecoder>>,
}

impl EadRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `decoder` for the items with label `label` and `-label`.
    pub fn register(&mut self, label: u64, decoder: Arc<dyn EadDecoder>) {
        debug!("Registering EAD decoder {} for label {}", decoder.name(), label);
        if let Some(previous) = self.decoders.insert(label, decoder) {
            debug!("EAD decoder {} for label {} replaced", previous.name(), label);
        }
    }

    pub fn get(&self, label: u64) -> Option<&Arc<dyn EadDecoder>> {
        self.decoders.get(&label)
    }
}

/// Decode the EAD items that make up the rest of the sequence, each into a record of `parent`.
///
/// An item is a label (negative when critical) optionally followed by a byte string value.
pub(crate) fn ead_items(
    w: &mut Walker,
    d: &mut CBORDecoder,
    parent: &mut Record,
    registry: &EadRegistry,
    view: SessionView,
    config: &DissectorConfig,
) {
    trace!("Enter ead_items");
    while !d.finished() {
        let start = d.position();
        let label = match d.int() {
            Ok(label) => label,
            Err(error) => {
                parent.error(error.into(), start..d.position());
                return;
            }
        };
        let mut item = w.record("EAD item", Value::None, start..d.position());
        let critical = label < 0;
        let absolute = label.unsigned_abs();
        let mut label_record =
            w.record("ead_label", Value::Integer(label as i128), start..d.position());
        if critical {
            label_record.note(Severity::Note, "critical", start..d.position());
        }
        item.push(label_record);

        let has_value = d
            .peek()
            .is_ok_and(|chunk| chunk.major == MajorType::Bytes && chunk.tags.is_empty());
        let value = if has_value {
            match d.require(MajorType::Bytes) {
                Ok(chunk) => Some(chunk),
                Err(error) => {
                    item.error(error.into(), start..d.position());
                    parent.push(item);
                    return;
                }
            }
        } else {
            None
        };
        item.close(d.position());

        let view = SessionView { critical, ..view };
        match value {
            Some(chunk) => {
                let mut value_record = w.record(
                    "ead_value",
                    Value::Bytes(chunk.content.clone()),
                    chunk.span.clone(),
                );
                ead_value(
                    w,
                    d.buffer(),
                    chunk.content,
                    absolute,
                    &mut value_record,
                    registry,
                    &view,
                    config,
                );
                item.push(value_record);
            }
            None if absolute == EAD_PADDING_LABEL => {}
            None => {
                if let Some(decoder) = registry.get(absolute) {
                    // items without a value still get a say, e.g. to be named
                    let decoded = decoder.decode(&[], &view);
                    item.children.extend(decoded.fields.into_iter().map(|mut field| {
                        field.rebase(w.source, start);
                        field
                    }));
                }
            }
        }
        if critical && absolute != EAD_PADDING_LABEL && registry.get(absolute).is_none() {
            let range = item.range.clone();
            item.note(
                Severity::Warning,
                format!("critical EAD item {absolute} is not understood"),
                range,
            );
        }
        parent.push(item);
    }
}

#[allow(clippy::too_many_arguments)]
fn ead_value(
    w: &mut Walker,
    buffer: &[u8],
    content: std::ops::Range<usize>,
    label: u64,
    record: &mut Record,
    registry: &EadRegistry,
    view: &SessionView,
    config: &DissectorConfig,
) {
    let value = &buffer[content.clone()];
    if label == EAD_PADDING_LABEL {
        record.name = "padding".into();
        return;
    }
    if let Some(decoder) = registry.get(label) {
        trace!("Decoding EAD {} with {}", label, decoder.name());
        let decoded = decoder.decode(value, view);
        for mut field in decoded.fields {
            field.rebase(w.source, content.start);
            record.push(field);
        }
        if decoded.consumed < value.len() {
            record.error(
                DissectError::PartialDecode {
                    consumed: decoded.consumed,
                    total: value.len(),
                },
                content.start + decoded.consumed..content.end,
            );
        }
        return;
    }
    if config.ead_heuristic_cbor && is_cbor_sequence(buffer, &content) {
        let mut d = CBORDecoder::at(&buffer[..content.end], content.start);
        while !d.finished() {
            if !w.child(record, &mut d, |w, d| generic(w, d, "embedded CBOR")) {
                break;
            }
        }
    }
}

/// Whether `content` holds nothing but well-formed CBOR items.
fn is_cbor_sequence(buffer: &[u8], content: &std::ops::Range<usize>) -> bool {
    let mut d = CBORDecoder::at(&buffer[..content.end], content.start);
    if d.finished() {
        return false;
    }
    while !d.finished() {
        if d.skip().is_err() {
            return false;
        }
    }
    true
}

#[cfg(test)]
mod test_ead {
    use super::*;
    use crate::registry::Registries;
    use hexlit::hex;

    /// Reads one text string and leaves the rest.
    #[derive(Debug)]
    struct FirstText;

    impl EadDecoder for FirstText {
        fn name(&self) -> &'static str {
            "first text"
        }

        fn decode(&self, value: &[u8], _session: &SessionView) -> EadDecoded {
            let mut d = CBORDecoder::new(value);
            match d.require(MajorType::Text) {
                Ok(chunk) => EadDecoded {
                    consumed: d.position(),
                    fields: vec![Record::new(
                        "text",
                        Value::Text(String::from_utf8_lossy(&value[chunk.content]).into()),
                        SourceId::FRAME,
                        chunk.span,
                    )],
                },
                Err(_) => EadDecoded::default(),
            }
        }
    }

    fn view() -> SessionView<'static> {
        SessionView {
            session: 0,
            message: EdhocMessage::Message1,
            method: None,
            suite: None,
            correlator: &[],
            critical: false,
        }
    }

    fn decode(input: &[u8], registry: &EadRegistry, config: &DissectorConfig) -> Record {
        let mut w = Walker::new(Registries::global(), SourceId::FRAME, 16);
        let mut parent = Record::new("EAD", Value::None, SourceId::FRAME, 0..input.len());
        ead_items(&mut w, &mut CBORDecoder::new(input), &mut parent, registry, view(), config);
        parent
    }

    #[test]
    fn test_registered_decoder_is_rebased() {
        let mut registry = EadRegistry::new();
        registry.register(5, Arc::new(FirstText));
        // padding, then -5 with << "ab", 0 >>
        let input = hex!("004100244462616200");
        let parent = decode(&input, &registry, &DissectorConfig::default());

        assert_eq!(2, parent.children.len());
        assert_eq!("padding", parent.children[0].children[1].name);
        let value = &parent.children[1].children[1];
        assert_eq!(5..8, value.children[0].range);
        assert_eq!(
            Some(DissectError::PartialDecode {
                consumed: 3,
                total: 4
            }),
            value.diagnostics[0].kind
        );
        // the critical label is understood, so no warning
        assert!(parent.children[1].diagnostics.is_empty());
    }

    #[test]
    fn test_unknown_critical_item() {
        let input = hex!("2a");
        let parent = decode(&input, &EadRegistry::new(), &DissectorConfig::default());
        let item = &parent.children[0];
        assert_eq!(Value::Integer(-11), item.children[0].value);
        assert_eq!(Severity::Warning, item.diagnostics[0].severity);
    }

    #[test]
    fn test_heuristic_cbor() {
        // 7 with << [1, 2] >>, then 8 with << 0xff >>
        let input = hex!("07438201020841ff");
        let mut config = DissectorConfig::default();
        config.ead_heuristic_cbor = true;
        let parent = decode(&input, &EadRegistry::new(), &config);

        let first = &parent.children[0].children[1];
        assert_eq!("embedded CBOR", first.children[0].name);
        assert_eq!(Value::Array(2), first.children[0].value);
        assert!(parent.children[1].children[1].children.is_empty());

        let parent = decode(&input, &EadRegistry::new(), &DissectorConfig::default());
        assert!(parent.children[0].children[1].children.is_empty());
    }

    #[test]
    fn test_malformed_label() {
        let input = hex!("4100");
        let parent = decode(&input, &EadRegistry::new(), &DissectorConfig::default());
        assert!(parent.children.is_empty());
        assert!(parent.diagnostics[0].kind.as_ref().is_some_and(DissectError::is_structural));
    }
}

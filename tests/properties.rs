use prefixed_compact::*;
use proptest::prelude::*;

fn arb_bytes() -> impl Strategy<Value = Vec<u8>> {
    prop_oneof![
        8 => prop::collection::vec(any::<u8>(), 0..40),
        1 => prop::collection::vec(any::<u8>(), 4090..4200),
    ]
}

fn arb_value() -> impl Strategy<Value = Value> {
    let leaf = arb_bytes().prop_map(Value::Bytes);
    leaf.prop_recursive(
        8,  // max depth
        64, // max nodes
        10, // max items per collection
        |inner| {
            prop_oneof![
                (arb_bytes(), inner.clone()).prop_map(|(k, v)| Value::key_value(k, v)),
                prop::collection::vec(inner.clone(), 0..10).prop_map(Value::Sequence),
                prop::collection::btree_map(arb_bytes(), inner, 0..10).prop_map(Value::Map),
            ]
        },
    )
}

fn decodes_fully(data: &[u8], options: DecodeOptions) -> Result<usize> {
    let mut decoder = Decoder::with_options(data, options);
    let mut count = 0;
    while !decoder.is_empty() {
        decoder.decode_ref()?;
        count += 1;
    }
    Ok(count)
}

fn arb_options() -> impl Strategy<Value = DecodeOptions> {
    (
        0usize..12,
        prop_oneof![Just(DuplicateKeys::LastWins), Just(DuplicateKeys::Reject)],
        prop_oneof![Just(HeaderWidths::Minimal), Just(HeaderWidths::Lenient)],
    )
        .prop_map(|(max_depth, dup, widths)| {
            DecodeOptions::new()
                .with_max_depth(max_depth)
                .with_duplicate_keys(dup)
                .with_header_widths(widths)
        })
}

proptest! {
    #![proptest_config(ProptestConfig { cases: 200, ..ProptestConfig::default() })]

    #[test]
    fn encode_decode(value in arb_value()) {
        let enc = encode_to_vec(&value).unwrap();
        prop_assert_eq!(enc.len(), encoded_len(&value));
        let (used, dec) = decode(&enc).unwrap();
        prop_assert_eq!(used, enc.len());
        prop_assert_eq!(dec, value);
    }

    #[test]
    fn borrowed_matches_owned(value in arb_value()) {
        let enc = encode_to_vec(&value).unwrap();
        let (_, dec) = decode_ref(&enc).unwrap();
        prop_assert_eq!(dec, value);
    }

    #[test]
    fn prefixes_are_truncated(value in arb_value(), cut in any::<prop::sample::Index>()) {
        let enc = encode_to_vec(&value).unwrap();
        let len = cut.index(enc.len());
        let err = decode(&enc[..len]).unwrap_err();
        prop_assert_eq!(err.kind(), ErrorKind::Truncated);
        prop_assert!(err.is_recoverable());
    }

    #[test]
    fn validator_counts_values(values in prop::collection::vec(arb_value(), 0..5)) {
        let mut enc = Vec::new();
        for value in &values {
            encode(&mut enc, value).unwrap();
        }
        prop_assert_eq!(validate_slice(&enc).unwrap(), values.len());
        prop_assert_eq!(decode_all(&enc).unwrap(), values);
    }

    #[test]
    fn validator_agrees_on_noise(
        data in prop::collection::vec(any::<u8>(), 0..64),
        options in arb_options(),
    ) {
        let decoded = decodes_fully(&data, options);
        let validated = validate_with_options(&data[..], options);
        match (decoded, validated) {
            (Ok(a), Ok(b)) => prop_assert_eq!(a, b),
            (Err(a), Err(b)) => prop_assert_eq!(a.kind(), b.kind()),
            (a, b) => prop_assert!(false, "decoder gave {:?}, validator gave {:?}", a, b),
        }
    }

    #[test]
    fn validator_agrees_on_damaged_values(
        value in arb_value(),
        at in any::<prop::sample::Index>(),
        byte in any::<u8>(),
        options in arb_options(),
    ) {
        let mut enc = encode_to_vec(&value).unwrap();
        let i = at.index(enc.len());
        enc[i] = byte;
        let decoded = decodes_fully(&enc, options);
        let validated = validate_with_options(&enc[..], options);
        prop_assert_eq!(decoded.is_ok(), validated.is_ok());
        if let (Err(a), Err(b)) = (decoded, validated) {
            prop_assert_eq!(a.kind(), b.kind());
        }
    }
}

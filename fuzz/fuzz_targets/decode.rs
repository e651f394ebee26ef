#![no_main]
use libfuzzer_sys::fuzz_target;
use prefixed_compact::{encode_to_vec, validate_slice, Decoder, Value};

fuzz_target!(|data: &[u8]| {
    let mut decoder = Decoder::new(data);
    let mut values = Vec::new();
    let decoded = loop {
        if decoder.is_empty() {
            break Ok(values.len());
        }
        match decoder.decode_value() {
            Ok(value) => values.push(value),
            Err(e) => break Err(e),
        }
    };
    let validated = validate_slice(data);
    match (&decoded, &validated) {
        (Ok(a), Ok(b)) => assert_eq!(a, b),
        (Err(a), Err(b)) => assert_eq!(a.kind(), b.kind()),
        _ => panic!("decoder gave {:?}, validator gave {:?}", decoded, validated),
    }
    // Anything accepted must re-encode to something that decodes the same
    for value in values {
        let enc = encode_to_vec(&value).unwrap();
        let mut again = Decoder::new(&enc);
        let back: Value = again.decode_value().unwrap();
        assert_eq!(back, value);
    }
});

use prefixed_compact::*;
use serde::{Deserialize, Serialize};
use std::error::Error;

#[derive(Debug, PartialEq, Serialize, Deserialize)]
struct Post<'a> {
    author: &'a str,
    text: String,
    time: u64,
    tags: Vec<String>,
}

fn main() -> Result<(), Box<dyn Error>> {
    // Build an untyped value directly
    let greeting: Value = vec![
        ("test1", Value::from("hello")),
        ("test2", Value::from("world")),
    ]
    .into_iter()
    .collect();
    let mut stream = encode_to_vec(&greeting)?;
    let greeting_len = stream.len();
    println!("greeting encodes to {:02x?}", stream);

    // Typed data goes through serde, and can be appended to the same stream
    let post = Post {
        author: "someone",
        text: "This is my very first post.".into(),
        time: 1_700_000_000,
        tags: vec!["intro".into()],
    };
    to_writer(&mut stream, &post)?;

    // A large payload is split into 4096-byte chunks on the way out
    encode(&mut stream, &Value::Bytes(vec![0xab; 10_000]))?;

    // Check the whole stream without building anything
    let count = validate(&stream[..])?;
    println!("stream holds {} values in {} bytes", count, stream.len());

    // Then walk it value by value
    let mut decoder = Decoder::new(&stream);
    let first = decoder.decode_ref()?;
    assert_eq!(first, greeting);
    let second = decoder.decode_ref()?;
    let decoded: Post = from_value_ref(second)?;
    assert_eq!(decoded, post);
    let third = decoder.decode_ref()?;
    println!(
        "third value is {} bytes, borrowed from the stream: {}",
        third.byte_length(),
        third.is_borrowed()
    );
    assert!(decoder.is_empty());

    // A cut-off stream can be retried once more data arrives
    if let Err(err) = decode(&stream[..greeting_len - 1]) {
        println!("partial value: {} (recoverable: {})", err, err.is_recoverable());
    }
    Ok(())
}

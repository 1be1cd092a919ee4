//! Stream framing vector tests: raw reads -> UTF-8 carry -> frames -> packets.

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

use std::fs;

use netlog_core::protocol::{FrameDecoder, Packet, Utf8Carry};

use vector_loader::TestVector;

const FILES: [&str; 5] = [
    "frame_concat.json",
    "frame_split_utf8.json",
    "frame_braces_in_strings.json",
    "frame_noise.json",
    "frame_malformed.json",
];

fn load(name: &str) -> TestVector {
    let s = fs::read_to_string(format!("tests/vectors/{name}")).unwrap();
    serde_json::from_str(&s).unwrap()
}

fn run(v: &TestVector, reads: &[Vec<u8>]) -> Vec<String> {
    let mut carry = Utf8Carry::new();
    let mut decoder = FrameDecoder::new();
    let mut frames = Vec::new();
    for read in reads {
        if let Some(text) = carry.push(read) {
            decoder.push(&text);
        }
        for f in decoder.frames() {
            frames.push(f.unwrap_or_else(|e| panic!("{}: {e}", v.description)));
        }
    }
    assert_eq!(carry.pending_len(), 0, "{}", v.description);
    frames
}

#[test]
fn frame_vectors() {
    for f in FILES {
        let v = load(f);
        let reads: Vec<Vec<u8>> = v.chunks.iter().map(|c| c.decode()).collect();
        let frames = run(&v, &reads);
        assert_eq!(frames, v.expect_frames, "{f}: {}", v.description);

        assert_eq!(frames.len(), v.expect_packets.len(), "{f}");
        for (frame, want) in frames.iter().zip(&v.expect_packets) {
            match (Packet::parse(frame), &want.action, &want.error) {
                (Ok(p), Some(action), None) => assert_eq!(p.action(), action.as_str(), "{f}"),
                (Err(e), None, Some(code)) => assert_eq!(e.code().as_str(), code.as_str(), "{f}"),
                (got, _, _) => panic!("{f}: unexpected outcome {got:?}"),
            }
        }
    }
}

#[test]
fn frame_vectors_byte_at_a_time() {
    for f in FILES {
        let v = load(f);
        let whole: Vec<u8> = v.chunks.iter().flat_map(|c| c.decode()).collect();
        let reads: Vec<Vec<u8>> = whole.iter().map(|b| vec![*b]).collect();
        assert_eq!(run(&v, &reads), v.expect_frames, "{f}");
    }
}

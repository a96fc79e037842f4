//! Property-based tests using proptest
//!
//! Framing invariants over randomly generated payloads, protocol ids and
//! stream chunkings.

#![allow(clippy::expect_used, clippy::unwrap_used)]

use bytes::BytesMut;
use orbit::core::codec::PacketCodec;
use orbit::core::packet::{decode_header, encode, HEADER_SIZE};
use orbit::error::ProtocolError;
use orbit::Message;
use proptest::prelude::*;
use tokio_util::codec::Decoder;

// Property: the header carries the payload length and protocol id, little-endian
proptest! {
    #[test]
    fn prop_header_layout(protocol in any::<u32>(), payload in prop::collection::vec(any::<u8>(), 0..2048)) {
        let frame = encode(&Message::new(protocol, payload.clone())).unwrap();

        prop_assert_eq!(frame.len(), HEADER_SIZE + payload.len());
        prop_assert_eq!(&frame[..4], &(payload.len() as u32).to_le_bytes()[..]);
        prop_assert_eq!(&frame[4..8], &protocol.to_le_bytes()[..]);
        prop_assert_eq!(&frame[HEADER_SIZE..], &payload[..]);

        let header = decode_header(&frame, 0).unwrap();
        prop_assert_eq!(header.protocol(), protocol);
        prop_assert_eq!(header.length() as usize, payload.len());
    }
}

// Property: a limit L accepts lengths up to L and rejects L + 1; 0 accepts anything
proptest! {
    #[test]
    fn prop_size_limit_boundary(max in 1u32..1_000_000, protocol in any::<u32>()) {
        let header = |len: u32| {
            let mut h = [0u8; HEADER_SIZE];
            h[..4].copy_from_slice(&len.to_le_bytes());
            h[4..].copy_from_slice(&protocol.to_le_bytes());
            h
        };

        prop_assert!(decode_header(&header(max - 1), max).is_ok());
        prop_assert!(decode_header(&header(max), max).is_ok());
        let rejected = matches!(
            decode_header(&header(max + 1), max),
            Err(ProtocolError::FrameTooLarge { size, max: m }) if size == max + 1 && m == max
        );
        prop_assert!(rejected);
        prop_assert!(decode_header(&header(u32::MAX), 0).is_ok());
    }
}

// Property: truncated headers are malformed, never a panic
proptest! {
    #[test]
    fn prop_short_header_malformed(bytes in prop::collection::vec(any::<u8>(), 0..HEADER_SIZE)) {
        prop_assert!(matches!(decode_header(&bytes, 0), Err(ProtocolError::MalformedHeader)));
    }
}

// Property: the codec yields the same frames however the stream is split
proptest! {
    #[test]
    fn prop_codec_chunking_invariant(
        frames in prop::collection::vec((any::<u32>(), prop::collection::vec(any::<u8>(), 0..256)), 1..16),
        chunk in 1usize..64,
    ) {
        let mut wire = Vec::new();
        for (protocol, payload) in &frames {
            wire.extend_from_slice(&encode(&Message::new(*protocol, payload.clone())).unwrap());
        }

        let mut codec = PacketCodec::new(256);
        let mut buf = BytesMut::new();
        let mut decoded = Vec::new();
        for piece in wire.chunks(chunk) {
            buf.extend_from_slice(piece);
            while let Some(msg) = codec.decode(&mut buf).unwrap() {
                decoded.push((msg.protocol(), msg.payload().to_vec()));
            }
        }

        prop_assert!(buf.is_empty());
        prop_assert_eq!(decoded, frames);
    }
}

// Property: arbitrary bytes never make the codec panic
proptest! {
    #[test]
    fn prop_codec_never_panics(bytes in prop::collection::vec(any::<u8>(), 0..4096), max in 0u32..1024) {
        let mut codec = PacketCodec::new(max);
        let mut buf = BytesMut::from(&bytes[..]);
        while let Ok(Some(_)) = codec.decode(&mut buf) {}
    }
}

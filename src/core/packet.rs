//! # Packet Framing
//!
//! Wire format for every frame exchanged with a client:
//!
//! ```text
//! [Length(4, LE)] [Protocol(4, LE)] [Payload(Length)]
//! ```
//!
//! There is no magic number, version byte or checksum. A frame whose length is
//! zero has no bytes after the header.
//!
//! Decoding is two-phase: [`decode_header`] validates the declared length
//! against the configured maximum before any payload storage is allocated, and
//! the caller then reads exactly `length` more bytes.

use bytes::{BufMut, Bytes, BytesMut};

use crate::core::message::Message;
use crate::error::{ProtocolError, Result};

/// Size of the fixed frame header in bytes
pub const HEADER_SIZE: usize = 8;

/// Header length as exposed to collaborators that size their own reads.
#[inline]
pub const fn header_size() -> usize {
    HEADER_SIZE
}

/// Encode a full frame (header followed by payload).
///
/// Fails with [`ProtocolError::Pack`] when the payload cannot be described by
/// a 32-bit length.
pub fn encode(msg: &Message) -> Result<Bytes> {
    let mut buf = BytesMut::with_capacity(HEADER_SIZE + msg.payload().len());
    encode_into(msg, &mut buf)?;
    Ok(buf.freeze())
}

/// Append a full frame to `dst`.
pub fn encode_into(msg: &Message, dst: &mut BytesMut) -> Result<()> {
    let length = u32::try_from(msg.payload().len()).map_err(|_| {
        ProtocolError::Pack(format!(
            "payload of {} bytes exceeds the 32-bit length field",
            msg.payload().len()
        ))
    })?;

    dst.reserve(HEADER_SIZE + msg.payload().len());
    dst.put_u32_le(length);
    dst.put_u32_le(msg.protocol());
    dst.extend_from_slice(msg.payload());
    Ok(())
}

/// Decode the 8-byte header of a frame.
///
/// Returns a [`Message`] with an empty payload and the declared length. When
/// `max_frame_size > 0` and the declared length exceeds it, fails with
/// [`ProtocolError::FrameTooLarge`]. Fewer than [`HEADER_SIZE`] bytes is a
/// [`ProtocolError::MalformedHeader`].
pub fn decode_header(header: &[u8], max_frame_size: u32) -> Result<Message> {
    let header: &[u8; HEADER_SIZE] = header
        .get(..HEADER_SIZE)
        .and_then(|h| h.try_into().ok())
        .ok_or(ProtocolError::MalformedHeader)?;

    let length = u32::from_le_bytes([header[0], header[1], header[2], header[3]]);
    let protocol = u32::from_le_bytes([header[4], header[5], header[6], header[7]]);

    if max_frame_size > 0 && length > max_frame_size {
        return Err(ProtocolError::FrameTooLarge {
            size: length,
            max: max_frame_size,
        });
    }

    Ok(Message::header(protocol, length))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_layout_is_little_endian() {
        let frame = encode(&Message::new(0x0102_0304, &b"ab"[..])).unwrap();
        assert_eq!(
            frame.as_ref(),
            &[2, 0, 0, 0, 0x04, 0x03, 0x02, 0x01, b'a', b'b']
        );
    }

    #[test]
    fn test_empty_payload_is_header_only() {
        let frame = encode(&Message::new(9, Bytes::new())).unwrap();
        assert_eq!(frame.len(), HEADER_SIZE);

        let header = decode_header(&frame, 0).unwrap();
        assert_eq!(header.protocol(), 9);
        assert_eq!(header.length(), 0);
    }

    #[test]
    fn test_oversize_boundaries() {
        let frame = encode(&Message::new(1, vec![0u8; 32])).unwrap();

        assert!(matches!(
            decode_header(&frame, 31),
            Err(ProtocolError::FrameTooLarge { size: 32, max: 31 })
        ));
        assert_eq!(decode_header(&frame, 32).unwrap().length(), 32);
        assert_eq!(decode_header(&frame, 0).unwrap().length(), 32);
    }

    #[test]
    fn test_truncated_header_rejected() {
        assert!(matches!(
            decode_header(&[1, 0, 0, 0, 1], 0),
            Err(ProtocolError::MalformedHeader)
        ));
        assert!(matches!(
            decode_header(&[], 0),
            Err(ProtocolError::MalformedHeader)
        ));
    }

    #[test]
    fn test_header_payload_left_to_caller() {
        let frame = encode(&Message::new(5, &b"pong"[..])).unwrap();
        let header = decode_header(&frame[..HEADER_SIZE], 4096).unwrap();
        assert!(header.payload().is_empty());
        assert_eq!(&frame[HEADER_SIZE..], b"pong");
    }
}

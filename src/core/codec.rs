use bytes::{Buf, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use crate::core::message::Message;
use crate::core::packet::{self, HEADER_SIZE};
use crate::error::{ProtocolError, Result};

/// Streaming codec for the length-prefixed frame format.
///
/// Declared lengths are checked as soon as the header is buffered, so an
/// oversized frame is rejected before any payload space is reserved.
#[derive(Debug, Clone, Copy, Default)]
pub struct PacketCodec {
    max_frame_size: u32,
}

impl PacketCodec {
    /// `max_frame_size == 0` disables the limit.
    pub fn new(max_frame_size: u32) -> Self {
        Self { max_frame_size }
    }

    pub fn max_frame_size(&self) -> u32 {
        self.max_frame_size
    }
}

impl Decoder for PacketCodec {
    type Item = Message;
    type Error = ProtocolError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>> {
        if src.len() < HEADER_SIZE {
            return Ok(None);
        }

        let mut msg = packet::decode_header(&src[..HEADER_SIZE], self.max_frame_size)?;
        let total = HEADER_SIZE + msg.length() as usize;

        if src.len() < total {
            src.reserve(total - src.len());
            return Ok(None);
        }

        src.advance(HEADER_SIZE);
        let payload = src.split_to(msg.length() as usize).freeze();
        msg.set_payload(payload);
        Ok(Some(msg))
    }
}

impl Encoder<Message> for PacketCodec {
    type Error = ProtocolError;

    fn encode(&mut self, item: Message, dst: &mut BytesMut) -> Result<()> {
        packet::encode_into(&item, dst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_header_waits() {
        let mut codec = PacketCodec::new(0);
        let mut buf = BytesMut::from(&[4u8, 0, 0][..]);
        assert!(codec.decode(&mut buf).unwrap().is_none());
        assert_eq!(buf.len(), 3);
    }

    #[test]
    fn test_partial_body_waits_then_completes() {
        let mut codec = PacketCodec::new(0);
        let frame = packet::encode(&Message::new(2, &b"ping"[..])).unwrap();

        let mut buf = BytesMut::from(&frame[..HEADER_SIZE + 2]);
        assert!(codec.decode(&mut buf).unwrap().is_none());

        buf.extend_from_slice(&frame[HEADER_SIZE + 2..]);
        let msg = codec.decode(&mut buf).unwrap().unwrap();
        assert_eq!(msg.protocol(), 2);
        assert_eq!(msg.payload().as_ref(), b"ping");
        assert!(buf.is_empty());
    }

    #[test]
    fn test_oversize_rejected_before_body_arrives() {
        let mut codec = PacketCodec::new(8);
        let mut buf = BytesMut::from(&[200u8, 0, 0, 0, 1, 0, 0, 0][..]);
        assert!(matches!(
            codec.decode(&mut buf),
            Err(ProtocolError::FrameTooLarge { size: 200, max: 8 })
        ));
    }

    #[test]
    fn test_back_to_back_frames() {
        let mut codec = PacketCodec::default();
        let mut buf = BytesMut::new();
        codec.encode(Message::new(1, &b"a"[..]), &mut buf).unwrap();
        codec.encode(Message::new(2, &b""[..]), &mut buf).unwrap();

        let first = codec.decode(&mut buf).unwrap().unwrap();
        let second = codec.decode(&mut buf).unwrap().unwrap();
        assert_eq!((first.protocol(), first.length()), (1, 1));
        assert_eq!((second.protocol(), second.length()), (2, 0));
        assert!(codec.decode(&mut buf).unwrap().is_none());
    }
}

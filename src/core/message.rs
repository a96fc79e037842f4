use bytes::Bytes;

/// One protocol message: a protocol id plus its raw payload.
///
/// After a full decode `length == payload.len()`. A message produced by
/// [`decode_header`](crate::core::packet::decode_header) carries an empty
/// payload and the length declared on the wire, which sizes the body read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    protocol: u32,
    length: u32,
    payload: Bytes,
}

impl Message {
    /// Build a message whose length is taken from the payload.
    ///
    /// Payloads longer than `u32::MAX` saturate the length field; encoding
    /// such a message fails with [`ProtocolError::Pack`](crate::error::ProtocolError::Pack).
    pub fn new(protocol: u32, payload: impl Into<Bytes>) -> Self {
        let payload = payload.into();
        Self {
            protocol,
            length: u32::try_from(payload.len()).unwrap_or(u32::MAX),
            payload,
        }
    }

    /// Header-only message: declared length, no payload yet.
    pub(crate) fn header(protocol: u32, length: u32) -> Self {
        Self {
            protocol,
            length,
            payload: Bytes::new(),
        }
    }

    pub fn protocol(&self) -> u32 {
        self.protocol
    }

    pub fn length(&self) -> u32 {
        self.length
    }

    pub fn payload(&self) -> &Bytes {
        &self.payload
    }

    /// Attach the body read after the header; keeps `length` in step.
    pub fn set_payload(&mut self, payload: impl Into<Bytes>) {
        self.payload = payload.into();
        self.length = u32::try_from(self.payload.len()).unwrap_or(u32::MAX);
    }

    pub fn into_parts(self) -> (u32, Bytes) {
        (self.protocol, self.payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_length_tracks_payload() {
        let msg = Message::new(7, &b"hello"[..]);
        assert_eq!(msg.protocol(), 7);
        assert_eq!(msg.length(), 5);
        assert_eq!(msg.payload().as_ref(), b"hello");
    }

    #[test]
    fn test_header_then_payload() {
        let mut msg = Message::header(3, 4);
        assert!(msg.payload().is_empty());
        assert_eq!(msg.length(), 4);

        msg.set_payload(vec![1, 2, 3, 4]);
        assert_eq!(msg.length(), 4);
        assert_eq!(msg.into_parts(), (3, Bytes::from_static(&[1, 2, 3, 4])));
    }
}

#![no_main]

use bytes::BytesMut;
use libfuzzer_sys::fuzz_target;
use orbit::core::codec::PacketCodec;
use orbit::core::packet::decode_header;
use tokio_util::codec::Decoder;

fuzz_target!(|data: &[u8]| {
    // Header decode and streaming decode must never panic on arbitrary input
    let _ = decode_header(data, 4096);

    let mut codec = PacketCodec::new(4096);
    let mut buf = BytesMut::from(data);
    while let Ok(Some(_)) = codec.decode(&mut buf) {}
});

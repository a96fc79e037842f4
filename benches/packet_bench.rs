use bytes::BytesMut;
use criterion::{criterion_group, criterion_main, BatchSize, Criterion, Throughput};
use orbit::core::codec::PacketCodec;
use orbit::core::packet::{decode_header, encode};
use orbit::Message;
use tokio_util::codec::{Decoder, Encoder};

#[allow(clippy::unwrap_used)]
fn bench_packet_encode_decode(c: &mut Criterion) {
    let mut group = c.benchmark_group("packet_encode_decode");
    let payload_sizes = [0usize, 64, 512, 4096, 65536];

    for &size in &payload_sizes {
        let frame = encode(&Message::new(1, vec![0u8; size])).unwrap();
        group.throughput(Throughput::Bytes(frame.len() as u64));

        group.bench_function(format!("encode_{size}b"), |b| {
            b.iter_batched(
                || Message::new(1, vec![0u8; size]),
                |msg| {
                    let mut buf = BytesMut::with_capacity(size + 8);
                    PacketCodec::default().encode(msg, &mut buf).unwrap();
                    buf
                },
                BatchSize::SmallInput,
            )
        });

        group.bench_function(format!("decode_header_{size}b"), |b| {
            b.iter(|| decode_header(&frame, 0).unwrap())
        });

        group.bench_function(format!("codec_decode_{size}b"), |b| {
            b.iter_batched(
                || BytesMut::from(&frame[..]),
                |mut buf| PacketCodec::new(0).decode(&mut buf).unwrap(),
                BatchSize::SmallInput,
            )
        });
    }

    group.finish();
}

criterion_group!(benches, bench_packet_encode_decode);
criterion_main!(benches);

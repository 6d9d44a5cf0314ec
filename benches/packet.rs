use criterion::{Criterion, black_box, criterion_group, criterion_main};
use std::net::{IpAddr, Ipv4Addr};
use turntable::crypto::{AEAD_KEY_LEN, EncryptMode};
use turntable::packet::{PacketCodec, PacketCounters};
use turntable::voice::VoiceConnectionInfo;

fn encode_packets(c: &mut Criterion) {
    const SECRET_KEY: &str = "fb5e9f96f291742023f321c7f4f967a2d90f4e7dadb2d9bd66774ad3ebb3ac5d";

    let secret_key: [u8; AEAD_KEY_LEN] = hex::decode(SECRET_KEY)
        .expect("valid hex encoded bytes")
        .try_into()
        .expect("valid secret key");

    let codec = PacketCodec::new(&VoiceConnectionInfo {
        host: IpAddr::V4(Ipv4Addr::LOCALHOST),
        port: 50004,
        ssrc: 1,
        secret_key,
        mode: EncryptMode::XSalsa20Poly1305Lite,
    });

    // Typical sizes of a 20 ms Opus frame, from silence to dense music.
    for size in [3, 120, 320] {
        let mut frame = vec![0u8; size];
        fastrand::fill(&mut frame);

        let mut counters = PacketCounters::random();
        c.bench_function(&format!("encode packet (frame: {size} bytes)"), |b| {
            b.iter(|| {
                black_box(
                    codec
                        .encode(black_box(&frame), 960, &mut counters)
                        .expect("should seal frame"),
                )
            });
        });

        let packet = codec
            .encode(&frame, 960, &mut counters)
            .expect("should seal frame");
        c.bench_function(&format!("decode packet (frame: {size} bytes)"), |b| {
            b.iter(|| black_box(codec.decode(black_box(&packet)).expect("should open packet")));
        });
    }
}

criterion_group!(benches, encode_packets);
criterion_main!(benches);

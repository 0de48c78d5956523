use criterion::{black_box, criterion_group, criterion_main, Criterion};

use txtap_protocol::{
    build_frame, checksum, decode_frame, encode_message, ChecksumPolicy, Command,
    InventoryAnnouncement, Payload, VersionPayload,
};
use txtap_types::{Hash256, InventoryType, NetworkMagic};

fn checksum_bench(c: &mut Criterion) {
    let data = vec![0xABu8; 4096];

    c.bench_function("checksum_4KB", |b| b.iter(|| checksum(black_box(&data))));
}

fn version_frame_bench(c: &mut Criterion) {
    let version = VersionPayload::local(10333, "/Neo:2.10.2/");

    c.bench_function("encode_version_frame", |b| {
        b.iter(|| encode_message(NetworkMagic::MAIN, &Command::Version, black_box(&version)))
    });
}

fn inv_decode_bench(c: &mut Criterion) {
    let hashes = (0..255u8).map(|i| Hash256::new([i; 32])).collect();
    let inv = match InventoryAnnouncement::new(InventoryType::Transaction, hashes) {
        Ok(inv) => inv,
        Err(e) => panic!("bench setup: {e}"),
    };
    let frame = match build_frame(NetworkMagic::MAIN, &Command::Inv, Some(&inv.to_bytes())) {
        Ok(bytes) => bytes,
        Err(e) => panic!("bench setup: {e}"),
    };

    c.bench_function("decode_inv_255_hashes", |b| {
        b.iter(|| {
            let (frame, _) = decode_frame(black_box(&frame), ChecksumPolicy::Strict).ok()?;
            frame.decode_payload::<InventoryAnnouncement>().ok()
        })
    });
}

criterion_group!(benches, checksum_bench, version_frame_bench, inv_decode_bench);
criterion_main!(benches);

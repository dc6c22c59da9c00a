//! Envelope throughput benchmarks.
//!
//! Run with: cargo bench -p fiks-cms

use std::io::Write;

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use fiks_cms::CryptoService;

const ALICE_CRT: &str = include_str!("../tests/data/alice.crt");
const ALICE_KEY: &str = include_str!("../tests/data/alice.key");

fn bench_envelope(c: &mut Criterion) {
    let svc = CryptoService::from_pem(ALICE_CRT, ALICE_KEY).unwrap();
    let mut group = c.benchmark_group("envelope");

    for size in [1024usize, 64 * 1024, 1024 * 1024] {
        let data = vec![0xA5u8; size];
        let envelope = svc.encrypt(data.as_slice()).unwrap().into_inner();
        group.throughput(Throughput::Bytes(size as u64));

        group.bench_with_input(BenchmarkId::new("encrypt", size), &size, |bench, _| {
            bench.iter(|| svc.encrypt(data.as_slice()).unwrap());
        });

        group.bench_with_input(BenchmarkId::new("stream", size), &size, |bench, _| {
            bench.iter(|| {
                let mut stream = svc.create_encryption_stream().unwrap();
                for piece in data.chunks(8192) {
                    stream.write_all(piece).unwrap();
                }
                stream.finish().unwrap()
            });
        });

        group.bench_with_input(BenchmarkId::new("decrypt", size), &size, |bench, _| {
            bench.iter(|| svc.decrypt_to_vec(envelope.as_slice()).unwrap());
        });
    }

    group.finish();
}

criterion_group!(benches, bench_envelope);
criterion_main!(benches);

//! Benchmarks for the submit hot path.
//!
//! Run with: cargo bench --bench encoder

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use esmed::encoder::{encode, Encoding, OutboundMessage, Receipt, Report, SubmitDefaults, Udh};
use esmed::throttle::{ThrottleConfig, ThrottleGate};
use std::sync::Arc;
use std::time::Duration;

fn defaults() -> SubmitDefaults {
    SubmitDefaults {
        service_type: String::new(),
        source_addr: "INFO".to_string(),
        source_addr_ton: 5,
        source_addr_npi: 0,
        dest_addr_ton: 1,
        dest_addr_npi: 1,
    }
}

fn bench_encode(c: &mut Criterion) {
    let defaults = defaults();
    let mut group = c.benchmark_group("encoder/encode");

    let text = OutboundMessage::text("+258841234567", "Your verification code is 482910");
    group.bench_function("text", |b| b.iter(|| black_box(encode(black_box(&text), &defaults))));

    let ucs2 = OutboundMessage::text("+258841234567", "Código de verificação: 482910")
        .with_encoding(Encoding::Ucs2)
        .with_report(Report {
            receipt: Some(Receipt::Final),
            ..Default::default()
        });
    group.bench_function("ucs2_with_report", |b| {
        b.iter(|| black_box(encode(black_box(&ucs2), &defaults)))
    });

    for octets in [16usize, 64, 128] {
        let binary = OutboundMessage::text("+258841234567", "ab".repeat(octets))
            .with_encoding(Encoding::Binary)
            .with_udh(Udh::port(0, 2948));
        group.throughput(Throughput::Bytes(octets as u64));
        group.bench_with_input(BenchmarkId::new("binary_udh", octets), &binary, |b, msg| {
            b.iter(|| black_box(encode(black_box(msg), &defaults)))
        });
    }

    group.finish();
}

fn bench_validate(c: &mut Criterion) {
    let msg = OutboundMessage::text("+258841234567", "ab".repeat(120))
        .with_encoding(Encoding::Binary)
        .with_udh(Udh::concat(0x1234, 3, 2));

    c.bench_function("encoder/validate_binary", |b| {
        b.iter(|| black_box(black_box(&msg).validate()))
    });
}

fn bench_throttle_reserve(c: &mut Criterion) {
    let gate = ThrottleGate::new(ThrottleConfig::new(u32::MAX, Duration::from_secs(1)));

    c.bench_function("throttle/reserve", |b| b.iter(|| black_box(gate.reserve())));
}

fn bench_throttle_contended(c: &mut Criterion) {
    let mut group = c.benchmark_group("throttle/reserve_contended");

    for threads in [2usize, 4, 8] {
        group.bench_with_input(BenchmarkId::from_parameter(threads), &threads, |b, &threads| {
            let gate = Arc::new(ThrottleGate::new(ThrottleConfig::new(
                u32::MAX,
                Duration::from_secs(1),
            )));
            b.iter(|| {
                let handles: Vec<_> = (0..threads)
                    .map(|_| {
                        let gate = gate.clone();
                        std::thread::spawn(move || {
                            for _ in 0..100 {
                                black_box(gate.reserve());
                            }
                        })
                    })
                    .collect();
                for handle in handles {
                    let _ = handle.join();
                }
            })
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_encode,
    bench_validate,
    bench_throttle_reserve,
    bench_throttle_contended,
);
criterion_main!(benches);

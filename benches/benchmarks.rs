// benches/benchmarks.rs — Performance benchmarks (criterion)
//
// Hot paths of a monitor cycle:
//   1. Payload normalization across the supported response shapes
//   2. Fingerprinting and snapshot diffing for a large listing

use chrono::{NaiveDate, NaiveTime};
use criterion::{black_box, criterion_group, criterion_main, Criterion};
use serde_json::{json, Value};
use std::sync::Arc;

use slotwatch::detect::store::MemorySnapshotStore;
use slotwatch::detect::ChangeDetector;
use slotwatch::slots::fingerprint;
use slotwatch::slots::normalize::{MissingFieldPolicy, ResponseNormalizer};

// ─── Helpers ────────────────────────────────────────────────────────────────

const TIMES: &[&str] = &["17:30", "18:00", "18:30", "19:00", "20:00", "20:30", "21:00"];

/// `days` days of evening slots as a flat list.
fn flat_payload(days: u32) -> Value {
    let mut items = Vec::new();
    for day in 1..=days {
        for t in TIMES {
            items.push(json!({
                "date": format!("2024-07-{day:02}"),
                "time": t,
                "party_size": 2,
                "price": 22000,
            }));
        }
    }
    Value::Array(items)
}

/// The same slots grouped by date under an alias-heavy item layout.
fn grouped_payload(days: u32) -> Value {
    let mut groups = serde_json::Map::new();
    for day in 1..=days {
        let items: Vec<Value> = TIMES
            .iter()
            .map(|t| json!({"start_time": t, "seat": 2, "amount": "¥22,000"}))
            .collect();
        groups.insert(format!("2024-07-{day:02}"), Value::Array(items));
    }
    Value::Object(groups)
}

// ─── Benchmark: Normalization ───────────────────────────────────────────────

fn bench_normalize(c: &mut Criterion) {
    let normalizer = ResponseNormalizer::new(MissingFieldPolicy::FailClosed);
    let flat = flat_payload(30);
    let grouped = grouped_payload(30);
    let nested = json!({"data": {"online_stock_groups": grouped_payload(30)}});

    let mut group = c.benchmark_group("normalize");

    group.bench_function("flat_30_days", |b| {
        b.iter(|| normalizer.normalize("bench", black_box(&flat)).expect("normalize"))
    });

    group.bench_function("grouped_30_days", |b| {
        b.iter(|| normalizer.normalize("bench", black_box(&grouped)).expect("normalize"))
    });

    group.bench_function("nested_grouped_30_days", |b| {
        b.iter(|| normalizer.normalize("bench", black_box(&nested)).expect("normalize"))
    });

    group.finish();
}

// ─── Benchmark: Change detection ────────────────────────────────────────────

fn bench_detect(c: &mut Criterion) {
    let mut group = c.benchmark_group("detect");

    let date = NaiveDate::from_ymd_opt(2024, 7, 1).expect("date");
    let time = NaiveTime::from_hms_opt(18, 0, 0).expect("time");
    group.bench_function("fingerprint", |b| {
        b.iter(|| fingerprint(black_box("bu286225"), date, time, Some(2)))
    });

    let records = ResponseNormalizer::new(MissingFieldPolicy::FailClosed)
        .normalize("bench", &flat_payload(60))
        .expect("normalize");
    let detector = ChangeDetector::new(Arc::new(MemorySnapshotStore::new()));
    detector.diff("bench", &records).expect("seed snapshot");

    group.bench_function("diff_unchanged_420_slots", |b| {
        b.iter(|| detector.diff("bench", black_box(&records)).expect("diff"))
    });

    group.finish();
}

// ─── Main ───────────────────────────────────────────────────────────────────

criterion_group!(benches, bench_normalize, bench_detect);
criterion_main!(benches);

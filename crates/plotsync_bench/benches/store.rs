//! State store benchmarks.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use plotsync_bench::{collection_json, point_json};
use plotsync_core::{DocumentId, Feature, FeatureId, SelectionState};
use plotsync_protocol::{Command, RequestEnvelope};
use plotsync_store::{from_plot, to_plot, CommandService, StateStore};
use serde_json::json;
use std::sync::Arc;

fn loaded_store(tracks: usize) -> (Arc<StateStore>, DocumentId) {
    let store = Arc::new(StateStore::new());
    let document = DocumentId::new("bench");
    let state = from_plot(&collection_json(tracks, 50), &Default::default()).unwrap();
    store.load_document(&document, state).unwrap();
    store.set_active_document(&document).unwrap();
    (store, document)
}

/// Benchmark historic commits and cheap selection changes.
fn bench_apply(c: &mut Criterion) {
    let mut group = c.benchmark_group("apply");

    for tracks in [10, 100] {
        let (store, document) = loaded_store(tracks);
        group.bench_with_input(BenchmarkId::new("select", tracks), &tracks, |b, _| {
            let mut n = 0usize;
            b.iter(|| {
                n += 1;
                let id = FeatureId::from(format!("track-{}", n % tracks));
                let command = Command::SetSelection(SelectionState::new(vec![id]));
                black_box(store.apply_command(&document, command).unwrap());
            });
        });

        let (store, document) = loaded_store(tracks);
        let feature: Feature = serde_json::from_value(point_json(0)).unwrap();
        group.bench_with_input(BenchmarkId::new("update", tracks), &tracks, |b, _| {
            b.iter(|| {
                let command = Command::UpdateFeatures(vec![black_box(&feature).clone()]);
                black_box(store.apply_command(&document, command).unwrap());
            });
        });
    }

    group.finish();
}

/// Benchmark the envelope path, including decode and the response cache.
fn bench_service(c: &mut Criterion) {
    let (store, _) = loaded_store(10);
    let service = CommandService::new(store);
    let viewport = RequestEnvelope::new("setViewport")
        .with_param("viewport", json!({"bounds": [-6.0, 49.0, -3.0, 52.0]}));

    c.bench_function("service/set_viewport", |b| {
        b.iter(|| black_box(service.handle(black_box(&viewport))));
    });

    let keyed = viewport.clone().with_request_id("fixed");
    c.bench_function("service/replay", |b| {
        b.iter(|| black_box(service.handle(black_box(&keyed))));
    });
}

/// Benchmark plot persistence.
fn bench_persist(c: &mut Criterion) {
    let (store, document) = loaded_store(100);
    let state = store.snapshot(&document).unwrap();
    let plot = to_plot(&state).unwrap();

    c.bench_function("persist/to_plot", |b| {
        b.iter(|| black_box(to_plot(black_box(&state)).unwrap()));
    });
    c.bench_function("persist/from_plot", |b| {
        b.iter(|| black_box(from_plot(black_box(&plot), &Default::default()).unwrap()));
    });
}

criterion_group!(benches, bench_apply, bench_service, bench_persist);
criterion_main!(benches);

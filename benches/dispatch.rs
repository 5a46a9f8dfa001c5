use std::sync::Arc;

use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};

use switchboard::{
    DefaultingAccessor, InMemoryAccessor, MatchEngine, ObservableCell, Predicate,
};

fn make_engine(cases: u32) -> MatchEngine<u32, u32> {
    let mut engine = MatchEngine::new();
    for i in 0..cases {
        let lower = i * 10;
        engine
            .add_case(Predicate::range(lower, lower + 9).unwrap(), move |_| i)
            .unwrap();
    }
    engine.set_default(|_| u32::MAX).unwrap();
    engine.seal();
    engine
}

fn bench_evaluate(c: &mut Criterion) {
    let mut group = c.benchmark_group("dispatch/evaluate");
    for cases in [4u32, 32, 256] {
        let engine = make_engine(cases);
        // Worst case: the subject only matches the last case.
        let subject = (cases - 1) * 10;
        group.throughput(Throughput::Elements(u64::from(cases)));
        group.bench_function(format!("last_of_{cases}"), |b| {
            b.iter(|| engine.evaluate(black_box(&subject)).unwrap());
        });
    }
    group.finish();
}

fn bench_cell_set(c: &mut Criterion) {
    let cell = ObservableCell::new(0u64);
    cell.on_before_change(|v| {
        black_box(v);
    });
    cell.on_after_change(|v| {
        black_box(v);
    });

    c.bench_function("dispatch/cell_set", |b| {
        let mut next = 0u64;
        b.iter(|| {
            next += 1;
            cell.set(next).unwrap();
        });
    });
}

fn bench_increment(c: &mut Criterion) {
    let store: Arc<InMemoryAccessor<u32, u64>> = Arc::new(InMemoryAccessor::new());
    c.bench_function("dispatch/increment_or_insert", |b| {
        let mut key = 0u32;
        b.iter(|| {
            key = (key + 1) % 1024;
            store.increment_or_insert(black_box(key), 0, 1)
        });
    });
}

criterion_group!(benches, bench_evaluate, bench_cell_set, bench_increment);
criterion_main!(benches);

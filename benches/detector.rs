use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use kuba_burst::detector::{MidasConfig, MidasR, ScoreMode};
use kuba_burst::sketch::{CountMinSketch, SketchKey};
use kuba_burst::types::NodeId;

/// Synthetic stream: `nodes` endpoints, 100 events per tick
fn stream(len: usize, nodes: i64) -> Vec<(NodeId, NodeId, f64)> {
    (0..len)
        .map(|i| {
            let i = i as i64;
            let src = NodeId::from((i * 7919) % nodes);
            let dst = NodeId::from((i * 104_729 + 13) % nodes);
            (src, dst, (i / 100) as f64)
        })
        .collect()
}

fn bench_sketch(c: &mut Criterion) {
    let mut group = c.benchmark_group("count_min");
    let (a, b) = (NodeId::from(1), NodeId::from(2));

    for error_rate in [0.1, 0.01, 0.001] {
        let mut sketch = CountMinSketch::new(error_rate, 0.99);
        group.bench_with_input(BenchmarkId::new("add_edge", error_rate), &error_rate, |bench, _| {
            bench.iter(|| sketch.add(&SketchKey::edge(black_box(&a), black_box(&b)), 1.0))
        });
        group.bench_with_input(BenchmarkId::new("decay", error_rate), &error_rate, |bench, _| {
            bench.iter(|| sketch.decay(black_box(0.5)))
        });
    }
    group.finish();
}

fn bench_update_detect(c: &mut Criterion) {
    let events = stream(10_000, 500);
    let mut group = c.benchmark_group("midas_r");
    group.throughput(Throughput::Elements(events.len() as u64));

    for mode in ScoreMode::ALL {
        group.bench_with_input(BenchmarkId::new("update_detect_score", mode), &mode, |bench, &mode| {
            bench.iter(|| {
                let mut midas = MidasR::new(MidasConfig::default().with_mode(mode)).unwrap();
                for (src, dst, t) in &events {
                    black_box(midas.update_detect_score(src, dst, 1, *t));
                }
            })
        });
    }

    group.bench_function("update_detect_score_cached", |bench| {
        bench.iter(|| {
            let config = MidasConfig::default().with_score_cache(4096);
            let mut midas = MidasR::new(config).unwrap();
            for (src, dst, t) in &events {
                black_box(midas.update_detect_score(src, dst, 1, *t));
            }
        })
    });
    group.finish();
}

criterion_group!(benches, bench_sketch, bench_update_detect);
criterion_main!(benches);

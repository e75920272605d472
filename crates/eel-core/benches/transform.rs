use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

use eel_core::natives;
use eel_core::{MdctPlan, RamConfig, RamRegistry, TransformCache};

fn signal(len: usize) -> Vec<f64> {
    let mut rng = SmallRng::seed_from_u64(42);
    (0..len).map(|_| rng.random_range(-1.0..1.0)).collect()
}

fn bench_forward(c: &mut Criterion) {
    let mut group = c.benchmark_group("mdct_forward");
    for n in [64, 256, 1024, 4096] {
        let plan = MdctPlan::new(n).unwrap();
        let input = signal(n);
        let mut out = vec![0.0; n / 2];
        group.bench_with_input(BenchmarkId::new("fast", n), &input, |b, input| {
            b.iter(|| {
                plan.forward(input, &mut out);
                black_box(&out);
            });
        });
        if n <= 1024 {
            group.bench_with_input(BenchmarkId::new("direct", n), &input, |b, input| {
                b.iter(|| {
                    plan.forward_direct(input, &mut out);
                    black_box(&out);
                });
            });
        }
    }
    group.finish();
}

fn bench_script_round_trip(c: &mut Criterion) {
    let mut group = c.benchmark_group("script_mdct_imdct");
    let registry = RamRegistry::new(RamConfig::default());
    let ram = registry.new_table();
    let cache = TransformCache::new();
    for n in [256, 1024, 4096] {
        natives::mem_set_values(&ram, 0.0, &signal(n));
        group.bench_function(BenchmarkId::from_parameter(n), |b| {
            b.iter(|| {
                natives::mdct(&ram, &cache, 0.0, n as f64);
                black_box(natives::imdct(&ram, &cache, 0.0, n as f64));
            });
        });
    }
    group.finish();
}

criterion_group!(benches, bench_forward, bench_script_round_trip);
criterion_main!(benches);

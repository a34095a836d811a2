use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use nalgebra::DMatrix;
use varx_rs::{cross_validate, Batch, VarxConfig};

struct Lcg(u64);

impl Lcg {
    fn next(&mut self) -> f64 {
        self.0 = self.0.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
        ((self.0 >> 11) as f64 / (1u64 << 53) as f64) * 2.0 - 1.0
    }
}

fn make_batches(n_batches: usize, n: usize) -> Vec<Batch> {
    let mut rng = Lcg(11);
    (0..n_batches)
        .map(|_| {
            let u = DMatrix::from_fn(1, n, |_, _| rng.next());
            let mut y = DMatrix::<f64>::zeros(1, n);
            for k in 2..n {
                y[(0, k)] = 1.5 * y[(0, k - 1)] - 0.7 * y[(0, k - 2)] + u[(0, k - 1)] + 0.1 * rng.next();
            }
            Batch::new(u, y).unwrap()
        })
        .collect()
}

fn bench_cv_grid(c: &mut Criterion) {
    let config = VarxConfig::new(10, 2);
    let grid: Vec<f64> = (-3..=6).map(|e| 10f64.powi(e)).collect();
    let mut group = c.benchmark_group("cross_validation");
    for n_batches in [4, 16] {
        let batches = make_batches(n_batches, 1000);
        group.bench_with_input(BenchmarkId::from_parameter(n_batches), &batches, |b, batches| {
            b.iter(|| cross_validate(std::hint::black_box(batches), &config, &grid).unwrap())
        });
    }
    group.finish();
}

criterion_group!(benches, bench_cv_grid);
criterion_main!(benches);

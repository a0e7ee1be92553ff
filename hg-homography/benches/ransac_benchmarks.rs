use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use hg_homography::{Homography, HomographyEstimator, RansacConfig};
use rand::{Rng, SeedableRng};

fn contaminated_pairs(n: usize, outlier_ratio: f64) -> (Vec<[f64; 2]>, Vec<[f64; 2]>) {
    let h = Homography::from_rows([
        [1.05, 0.04, 80.0],
        [-0.03, 0.98, 40.0],
        [0.0001, 0.00005, 1.0],
    ]);
    let mut rng = rand::rngs::StdRng::seed_from_u64(17);
    let mut src = Vec::with_capacity(n);
    let mut dst = Vec::with_capacity(n);
    for i in 0..n {
        let s = [rng.gen_range(0.0..640.0), rng.gen_range(0.0..480.0)];
        let d = if (i as f64) < outlier_ratio * n as f64 {
            [rng.gen_range(0.0..1280.0), rng.gen_range(0.0..960.0)]
        } else {
            h.project(s).unwrap_or(s)
        };
        src.push(s);
        dst.push(d);
    }
    (src, dst)
}

fn bench_estimate(c: &mut Criterion) {
    let mut group = c.benchmark_group("ransac_estimate");
    group.sample_size(20);

    for &outliers in &[0.2f64, 0.5, 0.7] {
        let (src, dst) = contaminated_pairs(400, outliers);
        for &parallel in &[false, true] {
            let estimator = HomographyEstimator::new(RansacConfig {
                parallel,
                ..RansacConfig::default().with_seed(7)
            })
            .expect("estimator");
            let label = if parallel { "parallel" } else { "serial" };
            group.bench_with_input(
                BenchmarkId::new(label, format!("{:.0}%", outliers * 100.0)),
                &(src.clone(), dst.clone()),
                |b, (src, dst)| b.iter(|| estimator.estimate(black_box(src), black_box(dst))),
            );
        }
    }
    group.finish();
}

criterion_group!(benches, bench_estimate);
criterion_main!(benches);

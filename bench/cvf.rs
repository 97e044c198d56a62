use criterion::{black_box, criterion_group, criterion_main, Criterion};

use cv_costvolume::prelude::*;

fn textured_pair(width: usize, height: usize, shift: usize) -> StereoPair {
    let texture = |x: usize, y: usize, b: usize| ((x * 37 + y * 91 + b * 53) % 251) as f64;
    let left = Image::from_fn(width, height, 3, |x, y, b| texture(x + shift, y, b));
    let right = Image::from_fn(width, height, 3, |x, y, b| texture(x, y, b));
    StereoPair::new(left, right).unwrap()
}

fn cvf_bench(c: &mut Criterion) {
    // Build frame
    let pair = textured_pair(160, 120, 6);

    // Build disparity alg
    let mut cvf = CostVolumeFilter::new(Params {
        min_disparity: 0,
        max_disparity: 15,
        median_radius: 7,
        ..Default::default()
    })
    .unwrap();

    // Benchmark compute function
    c.bench_function("cvf textured 160x120", |b| b.iter(|| cvf.compute(black_box(&pair))));
}

criterion_group!(benches, cvf_bench);
criterion_main!(benches);

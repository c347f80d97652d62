//! Benchmarks for the per-pixel mosaic stages.
//!
//! Run with: `cargo bench`
//!
//! Inputs are synthetic overlapping tiles so no data files are needed.

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use std::hint::black_box;

use geomosaic::mosaic::{
    aggregate, build_transform, composite, extrema, normalize, BlendPolicy, CompositeOptions, Resampling,
};
use geomosaic::{DegenerateRangePolicy, GeoTransform, RasterTile};

/// `n` x `n` tiles of 256 x 256 pixels, each overlapping its neighbours by a quarter.
fn tile_grid(n: usize) -> Vec<RasterTile> {
    let size = 256;
    let mut tiles = Vec::with_capacity(n * n);
    for ty in 0..n {
        for tx in 0..n {
            #[allow(clippy::cast_precision_loss)]
            let (x0, y0) = (tx as f64 * 0.75 * 256.0, -(ty as f64) * 0.75 * 256.0);
            #[allow(clippy::cast_precision_loss)]
            let pixels = (0..size * size).map(|i| ((i * 7 + tx * 13 + ty) % 251) as f32).collect();
            tiles.push(RasterTile::new(
                format!("t{tx}_{ty}"),
                size,
                size,
                pixels,
                GeoTransform::from_origin(x0, y0, 1.0, -1.0),
            ));
        }
    }
    tiles
}

fn bench_composite(c: &mut Criterion) {
    let tiles = tile_grid(3);
    let envelope = aggregate(&tiles).unwrap();
    let grid = build_transform(&envelope, 1.0, -1.0).unwrap();

    let mut group = c.benchmark_group("composite");
    group.sample_size(20);

    for (name, resampling, blend) in [
        ("nearest_overlay", Resampling::Nearest, BlendPolicy::Overlay),
        ("bilinear_overlay", Resampling::Bilinear, BlendPolicy::Overlay),
        ("nearest_blend", Resampling::Nearest, BlendPolicy::Blend),
    ] {
        let options = CompositeOptions {
            resampling,
            blend,
            blend_margin: 16.0,
            nodata: f32::NAN,
        };
        group.bench_with_input(BenchmarkId::new("kernel", name), &options, |b, options| {
            b.iter(|| composite(black_box(&tiles), &grid, options).unwrap());
        });
    }

    group.finish();
}

fn bench_extrema_and_normalize(c: &mut Criterion) {
    let tiles = tile_grid(3);
    let envelope = aggregate(&tiles).unwrap();
    let grid = build_transform(&envelope, 1.0, -1.0).unwrap();
    let canvas = composite(&tiles, &grid, &CompositeOptions::default()).unwrap();
    let stats = extrema::scan(&tiles, None).unwrap();

    c.bench_function("extrema_scan", |b| {
        b.iter(|| extrema::scan(black_box(&tiles), None).unwrap());
    });

    c.bench_function("normalize", |b| {
        b.iter(|| normalize(black_box(&canvas), &stats, None, DegenerateRangePolicy::Midpoint).unwrap());
    });
}

criterion_group!(benches, bench_composite, bench_extrema_and_normalize);
criterion_main!(benches);

use criterion::{criterion_group, criterion_main, BatchSize, Criterion};
use image::{DynamicImage, RgbImage};
use shrink_to_size::engine::{search_quality, shrink_to_budget};
use shrink_to_size::{compress_image, CompressOptions, EncodeParams, OutputFormat, SearchBounds};
use std::hint::black_box;

fn create_photo_like(width: u32, height: u32) -> DynamicImage {
    DynamicImage::ImageRgb8(RgbImage::from_fn(width, height, |x, y| {
        let fx = x as f32;
        let fy = y as f32;
        let r = (fx / width as f32 * 200.0 + (fy * 0.3).sin() * 25.0) as u8;
        let g = (fy / height as f32 * 200.0 + (fx * 0.17).cos() * 25.0) as u8;
        let b = (((fx + fy) * 0.05).sin() * 60.0 + 120.0) as u8;
        image::Rgb([r, g, b])
    }))
}

pub fn quality_search_benchmark(c: &mut Criterion) {
    let img = create_photo_like(800, 600);
    let bounds = SearchBounds::default();
    let params = EncodeParams::default();
    let budget = 40 * 1024;

    let mut group = c.benchmark_group("search_quality");
    group.sample_size(10);
    for format in [OutputFormat::Jpeg, OutputFormat::WebP] {
        group.bench_function(format.name(), |b| {
            b.iter(|| search_quality(black_box(&img), format, budget, &bounds, &params))
        });
    }
    group.finish();
}

pub fn backoff_benchmark(c: &mut Criterion) {
    let img = create_photo_like(1200, 900);
    let bounds = SearchBounds::default();
    let params = EncodeParams::default();

    let mut group = c.benchmark_group("shrink_to_budget");
    group.sample_size(10);
    group.bench_function("jpeg_4kb", |b| {
        b.iter_batched(
            || img.clone(),
            |img| shrink_to_budget(img, OutputFormat::Jpeg, 4 * 1024, &bounds, &params),
            BatchSize::LargeInput,
        )
    });
    group.finish();
}

pub fn compress_image_benchmark(c: &mut Criterion) {
    let img = create_photo_like(1600, 1200);
    let options = CompressOptions::default().with_max_width(1024);

    let mut group = c.benchmark_group("compress_image");
    group.sample_size(10);
    group.bench_function("jpeg_70kb_max_width_1024", |b| {
        b.iter_batched(
            || img.clone(),
            |img| compress_image(img, &options),
            BatchSize::LargeInput,
        )
    });
    group.finish();
}

criterion_group!(
    benches,
    quality_search_benchmark,
    backoff_benchmark,
    compress_image_benchmark
);
criterion_main!(benches);

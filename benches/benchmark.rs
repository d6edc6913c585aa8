use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use image::{Rgba, RgbaImage};
use imagoid::{
    AlphaStrategy, AlphaTransformation, Color, ImageFormat, ImageResource, PasteTransformation,
    Raster, ResizeMode, ResizeTransformation, Transformation,
};
use std::hint::black_box;

fn create_test_image(width: u32, height: u32) -> ImageResource {
    ImageResource::from_raster(Raster::from_rgba(RgbaImage::from_fn(width, height, |x, y| {
        Rgba([(x % 256) as u8, (y % 256) as u8, 128, ((x + y) % 256) as u8])
    })))
}

fn bench_resize(c: &mut Criterion) {
    let source = create_test_image(1600, 1200);
    let mut group = c.benchmark_group("resize");
    for mode in [ResizeMode::Fit, ResizeMode::Crop, ResizeMode::Exact] {
        group.bench_with_input(BenchmarkId::from_parameter(mode), &mode, |b, &mode| {
            let mut resize = ResizeTransformation::new(400, 400, mode);
            b.iter(|| resize.apply_copy(black_box(&source)).unwrap());
        });
    }
    group.finish();
}

fn bench_alpha(c: &mut Criterion) {
    let source = create_test_image(1600, 1200);
    let mut group = c.benchmark_group("alpha");
    for strategy in [AlphaStrategy::Fast, AlphaStrategy::Pixelwise] {
        group.bench_with_input(
            BenchmarkId::from_parameter(strategy.as_str()),
            &strategy,
            |b, &strategy| {
                let mut alpha = AlphaTransformation::new("60%").unwrap().with_strategy(strategy);
                b.iter(|| alpha.apply_copy(black_box(&source)).unwrap());
            },
        );
    }
    group.finish();
}

fn bench_paste(c: &mut Criterion) {
    let source = create_test_image(1600, 1200);
    let mark = ImageResource::create(200, 80, Some(&Color::WHITE)).unwrap();
    let mut paste = PasteTransformation::new(mark);
    paste.set_alpha("40%").unwrap();
    c.bench_function("paste watermark", |b| {
        b.iter(|| paste.apply_copy(black_box(&source)).unwrap())
    });
}

fn bench_encode(c: &mut Criterion) {
    let mut source = create_test_image(800, 600);
    let mut group = c.benchmark_group("encode");
    group.sample_size(10);
    for format in [ImageFormat::Jpeg, ImageFormat::Png, ImageFormat::Gif] {
        group.bench_with_input(BenchmarkId::from_parameter(format), &format, |b, &format| {
            b.iter(|| source.get_bytes(Some(format), None).unwrap());
        });
    }
    group.finish();
}

criterion_group!(benches, bench_resize, bench_alpha, bench_paste, bench_encode);
criterion_main!(benches);

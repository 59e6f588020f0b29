use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use image::RgbImage;
use preprocess::{DISPLAY_HEIGHT, LetterboxPreProcessor, resize_to_height};

/// Gradient test image, closer to real content than a flat fill
fn create_test_image(width: u32, height: u32) -> RgbImage {
    RgbImage::from_fn(width, height, |x, y| {
        image::Rgb([(x % 256) as u8, (y % 256) as u8, ((x + y) % 256) as u8])
    })
}

// Typical X-ray exports: portrait film scans and landscape phone photos
const RESOLUTIONS: [(u32, u32); 4] = [(800, 600), (1024, 1280), (2048, 2500), (3000, 4000)];

fn benchmark_display_resize(c: &mut Criterion) {
    let mut group = c.benchmark_group("display_resize");

    for (width, height) in RESOLUTIONS {
        let image = create_test_image(width, height);

        group.bench_with_input(
            BenchmarkId::new("resize_to_height", format!("{}x{}", width, height)),
            &image,
            |b, image| {
                b.iter(|| resize_to_height(black_box(image), DISPLAY_HEIGHT).unwrap());
            },
        );
    }

    group.finish();
}

fn benchmark_letterbox(c: &mut Criterion) {
    let mut group = c.benchmark_group("letterbox");

    let mut preprocessor = LetterboxPreProcessor::new((640, 640));

    for (width, height) in RESOLUTIONS {
        let image = create_test_image(width, height);

        group.bench_with_input(
            BenchmarkId::new("preprocess", format!("{}x{}", width, height)),
            &image,
            |b, image| {
                b.iter(|| preprocessor.preprocess(black_box(image)).unwrap());
            },
        );
    }

    group.finish();
}

criterion_group!(benches, benchmark_display_resize, benchmark_letterbox);
criterion_main!(benches);

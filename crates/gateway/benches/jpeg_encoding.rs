use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};
use gateway::page::{PageView, ResultPanel, jpeg_data_uri, render};
use image::{Rgb, RgbImage};

/// Create a test image with a gradient pattern (more realistic than solid color)
fn gradient_image(width: u32, height: u32) -> RgbImage {
    RgbImage::from_fn(width, height, |x, y| {
        Rgb([
            ((x * 255) / width) as u8,
            ((y * 255) / height) as u8,
            (((x + y) * 127) / (width + height)) as u8,
        ])
    })
}

fn benchmark_data_uri(c: &mut Criterion) {
    let mut group = c.benchmark_group("jpeg_data_uri");

    // Display images are always 420 high; width depends on the aspect ratio
    let sizes = [(315, 420, "portrait"), (560, 420, "4:3"), (747, 420, "16:9")];

    for (width, height, label) in sizes {
        let image = gradient_image(width, height);
        group.throughput(Throughput::Elements((width * height) as u64));

        group.bench_with_input(BenchmarkId::new("encode", label), &image, |b, image| {
            b.iter(|| jpeg_data_uri(black_box(image)).unwrap());
        });
    }

    group.finish();
}

fn benchmark_page_render(c: &mut Criterion) {
    let image = gradient_image(560, 420);
    let uri = jpeg_data_uri(&image).unwrap();
    let view = PageView {
        original: Some(uri.clone()),
        result: ResultPanel::Annotated(uri),
        notice: None,
    };

    c.bench_function("render_results_page", |b| {
        b.iter(|| render(black_box(&view)));
    });
}

criterion_group!(benches, benchmark_data_uri, benchmark_page_render);
criterion_main!(benches);

//! Benchmarks for structmd conversion performance.
//!
//! Run with: cargo bench
//!
//! These benchmarks run the full pipeline over synthetic pages.

use criterion::{black_box, criterion_group, criterion_main, Criterion};

use structmd::analyze::{classify, normalize, AnalyzeOptions};
use structmd::{BBox, CancelToken, Converter, Diagnostics, PageInput, RawImage, RawSpan};

/// Creates synthetic pages with headings, body text, lists, and a figure.
fn create_test_pages(page_count: usize) -> Vec<PageInput> {
    let png = vec![0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 0, 0, 0, 13];

    (0..page_count)
        .map(|i| {
            let mut page = PageInput::new(i as u32).with_span(
                RawSpan::new(format!("Chapter {}", i + 1), 20.0)
                    .with_bold(true)
                    .with_bbox(BBox::new(72.0, 72.0, 300.0, 96.0)),
            );

            let mut y = 110.0;
            for line in 0..30 {
                let text = match line % 6 {
                    4 => format!("• Point {} on page {}", line, i + 1),
                    5 => format!("  - Detail {} for the point above", line),
                    _ => format!(
                        "Line {} of the benchmark body text, long enough to vote.",
                        line
                    ),
                };
                page = page.with_span(
                    RawSpan::new(text, 12.0).with_bbox(BBox::new(72.0, y, 520.0, y + 14.0)),
                );
                y += 16.0;
            }

            page.with_image(RawImage::new(
                png.clone(),
                BBox::new(72.0, 600.0, 300.0, 700.0),
            ))
        })
        .collect()
}

/// Benchmark normalization and heuristic classification.
fn bench_classification(c: &mut Criterion) {
    let pages = create_test_pages(10);
    let options = AnalyzeOptions::default();

    c.bench_function("normalize_classify_10_pages", |b| {
        b.iter(|| {
            let mut diag = Diagnostics::new();
            let doc = normalize(
                black_box(pages.clone()),
                &options,
                &CancelToken::new(),
                &mut diag,
            )
            .unwrap();
            classify(&doc.spans, &doc.images, &options)
        });
    });
}

/// Benchmark the whole pipeline at various sizes.
fn bench_conversion(c: &mut Criterion) {
    let mut group = c.benchmark_group("conversion");

    for page_count in [1, 10, 50].iter() {
        let pages = create_test_pages(*page_count);
        let converter = Converter::new();

        group.bench_function(format!("{}_pages", page_count), |b| {
            b.iter(|| converter.convert(black_box(pages.clone())).unwrap());
        });
    }

    group.finish();
}

/// Benchmark builder pattern overhead.
fn bench_builder_creation(c: &mut Criterion) {
    c.bench_function("builder_creation", |b| {
        b.iter(|| {
            let _converter = Converter::new()
                .with_heading_ratio(1.2)
                .with_captions(false)
                .with_page_anchors(true);
        });
    });
}

criterion_group!(
    benches,
    bench_classification,
    bench_conversion,
    bench_builder_creation,
);
criterion_main!(benches);

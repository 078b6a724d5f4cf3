//! Criterion microbenches for mark list IO and component labeling.
//!
//! Run with: `cargo bench`

use criterion::{criterion_group, criterion_main, Criterion, Throughput};
use std::hint::black_box;

use scoremark::geom::{label_components, Connectivity, IntBBox, Mask, Raster};
use scoremark::io::{from_mark_list_slice, from_mark_list_str, to_mark_list_string, MarkList, Refs};
use scoremark::model::Mark;

const MARK_LIST_FIXTURE: &str = include_str!("../tests/fixtures/marks_b.xml");

/// A few hundred masked marks laid out on a grid.
fn synthetic_mark_list() -> MarkList {
    let marks = (0..400u64)
        .map(|id| {
            let top = (id / 20) as i64 * 16;
            let left = (id % 20) as i64 * 16;
            let mask = Mask::from_vec(
                12,
                12,
                (0..144).map(|i| u8::from((i / 12 + i % 12) % 3 != 0)).collect(),
            )
            .expect("12x12 mask");
            Mark::new(id, 1 + id % 4, "notehead-full", IntBBox::from_origin_size(top, left, 12, 12))
                .with_mask(mask)
                .expect("mask matches box")
        })
        .collect();
    MarkList {
        refs: Refs {
            class_list: Some("classes.xml".into()),
            image: Some("score.png".into()),
        },
        marks,
    }
}

/// Staff-like raster: horizontal lines crossed by short vertical strokes.
fn synthetic_raster(height: usize, width: usize) -> Raster {
    let mut raster = Raster::zeros(height, width);
    for row in 0..height {
        for col in 0..width {
            let staff_line = row % 12 == 0;
            let stroke = col % 9 == 0 && row % 40 < 25;
            if staff_line || stroke {
                raster.set(row, col, 255);
            }
        }
    }
    raster
}

fn bench_mark_list_parse(c: &mut Criterion) {
    let mut group = c.benchmark_group("mark_list_parse");
    group.throughput(Throughput::Bytes(MARK_LIST_FIXTURE.len() as u64));

    group.bench_function("from_mark_list_str", |b| {
        b.iter(|| {
            let list = from_mark_list_str(black_box(MARK_LIST_FIXTURE)).unwrap();
            black_box(list)
        })
    });

    let large = to_mark_list_string(&synthetic_mark_list());
    group.throughput(Throughput::Bytes(large.len() as u64));
    group.bench_function("from_mark_list_slice_400", |b| {
        b.iter(|| {
            let list = from_mark_list_slice(black_box(large.as_bytes())).unwrap();
            black_box(list)
        })
    });

    group.finish();
}

fn bench_mark_list_write(c: &mut Criterion) {
    let list = synthetic_mark_list();

    let mut group = c.benchmark_group("mark_list_write");
    group.throughput(Throughput::Elements(list.marks.len() as u64));

    group.bench_function("to_mark_list_string", |b| {
        b.iter(|| {
            let xml = to_mark_list_string(black_box(&list));
            black_box(xml)
        })
    });

    group.finish();
}

fn bench_label_components(c: &mut Criterion) {
    let raster = synthetic_raster(600, 800);

    let mut group = c.benchmark_group("label_components");
    group.throughput(Throughput::Elements((raster.height() * raster.width()) as u64));

    for (name, connectivity) in [("four", Connectivity::Four), ("eight", Connectivity::Eight)] {
        group.bench_function(name, |b| {
            b.iter(|| {
                let labeling = label_components(black_box(&raster), connectivity);
                black_box(labeling.count())
            })
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_mark_list_parse,
    bench_mark_list_write,
    bench_label_components,
);
criterion_main!(benches);

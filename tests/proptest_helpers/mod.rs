#![allow(dead_code)]

use std::collections::{BTreeMap, BTreeSet};

use proptest::prelude::*;
use proptest::strategy::BoxedStrategy;
use proptest::test_runner::{Config as ProptestConfig, FileFailurePersistence};
use scoremark::geom::{IntBBox, Mask, Raster};
use scoremark::model::{DataValue, Mark, MarkId};

pub fn proptest_config() -> ProptestConfig {
    let cases = std::env::var("PROPTEST_CASES")
        .ok()
        .and_then(|v| v.parse::<u32>().ok())
        .unwrap_or(64);

    let mut config = ProptestConfig::with_failure_persistence(FileFailurePersistence::WithSource(
        "proptest-regressions",
    ));
    config.cases = cases;
    config.max_shrink_iters = 1024;
    config
}

/// A non-empty box fully inside a `height` x `width` image.
pub fn arb_bbox_within(height: usize, width: usize) -> BoxedStrategy<IntBBox> {
    (0..height as i64, 0..width as i64)
        .prop_flat_map(move |(top, left)| {
            (
                Just(top),
                Just(left),
                (top + 1)..=height as i64,
                (left + 1)..=width as i64,
            )
        })
        .prop_map(|(top, left, bottom, right)| IntBBox::new(top, left, bottom, right))
        .boxed()
}

pub fn arb_mask(height: usize, width: usize) -> BoxedStrategy<Mask> {
    proptest::collection::vec(any::<bool>(), height * width)
        .prop_map(move |bits| {
            let values = bits.into_iter().map(u8::from).collect();
            Mask::from_vec(height, width, values).expect("mask shape")
        })
        .boxed()
}

pub fn arb_raster(max_height: usize, max_width: usize) -> BoxedStrategy<Raster> {
    (1..=max_height, 1..=max_width)
        .prop_flat_map(|(height, width)| {
            proptest::collection::vec(prop_oneof![3 => Just(0u8), 1 => 1u8..=255], height * width)
                .prop_map(move |data| Raster::from_vec(height, width, data).expect("raster shape"))
        })
        .boxed()
}

pub fn arb_data_value() -> BoxedStrategy<DataValue> {
    prop_oneof![
        any::<i64>().prop_map(DataValue::Int),
        (-1.0e9f64..1.0e9).prop_map(DataValue::Float),
        "[A-Za-z0-9 &<>_-]{0,12}".prop_map(DataValue::Str),
    ]
    .boxed()
}

/// A mark with arbitrary position, optional mask, links and data. Links
/// are not made consistent with any other mark.
pub fn arb_mark(id: u64) -> BoxedStrategy<Mark> {
    (
        1u64..20,
        "[a-z][a-z_-]{0,10}",
        -50i64..500,
        -50i64..500,
        1usize..8,
        1usize..8,
        any::<bool>(),
    )
        .prop_flat_map(move |(class_id, class_name, top, left, height, width, masked)| {
            let mask = if masked {
                arb_mask(height, width).prop_map(Some).boxed()
            } else {
                Just(None).boxed()
            };
            (
                Just(Mark::new(
                    id,
                    class_id,
                    class_name,
                    IntBBox::from_origin_size(top, left, height, width),
                )),
                mask,
                proptest::collection::btree_map("[a-z]{1,6}", arb_data_value(), 0..3),
            )
        })
        .prop_map(|(mut mark, mask, data)| {
            mark.set_mask(mask).expect("mask matches box");
            mark.data = data;
            mark
        })
        .boxed()
}

/// Marks with ids `0..n` in order.
pub fn arb_marks(max: usize) -> BoxedStrategy<Vec<Mark>> {
    (0..=max)
        .prop_flat_map(|n| (0..n as u64).map(arb_mark).collect::<Vec<_>>())
        .boxed()
}

/// Edges between marks `0..n`, without self loops.
pub fn arb_edges(n: usize, max_edges: usize) -> BoxedStrategy<BTreeSet<(u64, u64)>> {
    if n < 2 {
        return Just(BTreeSet::new()).boxed();
    }
    proptest::collection::btree_set((0..n as u64, 0..n as u64), 0..=max_edges)
        .prop_map(|pairs| pairs.into_iter().filter(|(a, b)| a != b).collect())
        .boxed()
}

/// Pixel coordinates covered by a mark.
pub fn covered_pixels(mark: &Mark) -> BTreeSet<(i64, i64)> {
    let bbox = mark.bbox();
    let mut pixels = BTreeSet::new();
    for row in bbox.top..bbox.bottom {
        for col in bbox.left..bbox.right {
            if mark.covers(row, col) {
                pixels.insert((row, col));
            }
        }
    }
    pixels
}

/// `from -> to` pairs recorded in the outlink mirrors.
pub fn outlink_pairs<'a>(marks: impl IntoIterator<Item = &'a Mark>) -> BTreeSet<(MarkId, MarkId)> {
    marks
        .into_iter()
        .flat_map(|mark| mark.outlinks().iter().map(move |to| (mark.id, *to)))
        .collect()
}

/// Checks that every outlink has the matching inlink and vice versa.
pub fn assert_mirrors_consistent<'a>(marks: impl IntoIterator<Item = &'a Mark>) -> Result<(), String> {
    let by_id: BTreeMap<MarkId, &Mark> = marks.into_iter().map(|mark| (mark.id, mark)).collect();
    for mark in by_id.values() {
        for to in mark.outlinks() {
            let target = by_id
                .get(to)
                .ok_or_else(|| format!("mark {} links to missing mark {}", mark.id, to))?;
            if !target.inlinks().contains(&mark.id) {
                return Err(format!("edge {} -> {} has no inlink mirror", mark.id, to));
            }
        }
        for from in mark.inlinks() {
            let source = by_id
                .get(from)
                .ok_or_else(|| format!("mark {} has inlink from missing mark {}", mark.id, from))?;
            if !source.outlinks().contains(&mark.id) {
                return Err(format!("edge {} -> {} has no outlink mirror", from, mark.id));
            }
        }
    }
    Ok(())
}

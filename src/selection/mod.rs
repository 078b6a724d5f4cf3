//! Selectors: turn widget-space pointer input into model-space regions.
//!
//! Every selector returns `Ok(None)` when the input selects nothing,
//! including boxes with non-finite edges. When an image is loaded, results
//! are clipped to it; selectors that read pixels or build masks fail with
//! [`ScoremarkError::NoImage`] without one.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::error::ScoremarkError;
use crate::geom::{round_bbox, BBox, Coord, IntBBox, Mask, Model, Raster, Region, Scaler, Widget};
use crate::model::AnnotationModel;

/// Tuning shared by the mask-producing selectors.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectionPolicy {
    /// Lasso masks keep only pixels that are nonzero in the image.
    pub mask_nonzero_only: bool,
}

impl Default for SelectionPolicy {
    fn default() -> Self {
        Self {
            mask_nonzero_only: true,
        }
    }
}

/// The rectangle as drawn, in model space.
pub fn select_bbox(
    model: &AnnotationModel,
    scaler: &Scaler,
    bbox: &BBox<Widget>,
) -> Result<Option<Region>, ScoremarkError> {
    if !bbox.is_finite() {
        return Ok(None);
    }
    let bbox = scaler.bbox_widget_to_model(bbox);
    Ok(clip(model, bbox).map(Region::from_bbox))
}

/// The tightest rectangle around the nonzero pixels inside the drawn box.
pub fn select_trimmed_bbox(
    model: &AnnotationModel,
    scaler: &Scaler,
    bbox: &BBox<Widget>,
) -> Result<Option<Region>, ScoremarkError> {
    let image = model.require_image()?;
    if !bbox.is_finite() {
        return Ok(None);
    }
    let Some(bbox) = clip(model, scaler.bbox_widget_to_model(bbox)) else {
        return Ok(None);
    };
    Ok(image.nonzero_bbox_in(&bbox).map(Region::from_bbox))
}

/// The union of the boxes of every image component touching the drawn box.
pub fn select_connected_components(
    model: &AnnotationModel,
    scaler: &Scaler,
    bbox: &BBox<Widget>,
) -> Result<Option<Region>, ScoremarkError> {
    let labeling = model.components()?;
    if !bbox.is_finite() {
        return Ok(None);
    }
    let Some(bbox) = clip(model, scaler.bbox_widget_to_model(bbox)) else {
        return Ok(None);
    };
    let labels = labeling.labels_in(&bbox);
    tracing::trace!(labels = labels.len(), "components under selection");
    let union = IntBBox::union_all(labels.into_iter().filter_map(|label| labeling.bbox_of(label)));
    Ok(union.map(Region::from_bbox))
}

/// A closed polygon rasterized by pixel centers.
///
/// The box is the polygon's tight box within the image; the mask is the
/// polygon, ANDed with the image when the policy asks for it.
pub fn select_lasso(
    model: &AnnotationModel,
    scaler: &Scaler,
    points: &[Coord<Widget>],
    policy: &SelectionPolicy,
) -> Result<Option<Region>, ScoremarkError> {
    let image = model.require_image()?;
    let Some((bbox, mask)) = rasterize_lasso(image, scaler, points) else {
        return Ok(None);
    };
    let mut region = match Region::new(bbox, Some(mask)) {
        Some(region) => region,
        None => return Ok(None),
    };
    if policy.mask_nonzero_only {
        region = region.and_nonzero(image);
    }
    Ok((region.pixel_count() > 0).then_some(region))
}

/// A polygon ANDed with the image and trimmed to the result.
pub fn select_trimmed_lasso(
    model: &AnnotationModel,
    scaler: &Scaler,
    points: &[Coord<Widget>],
) -> Result<Option<Region>, ScoremarkError> {
    let image = model.require_image()?;
    let Some((bbox, mask)) = rasterize_lasso(image, scaler, points) else {
        return Ok(None);
    };
    let Some(polygon) = Region::new(bbox, Some(mask)) else {
        return Ok(None);
    };
    let inked = polygon.and_nonzero(image);
    Ok(inked
        .mask
        .as_ref()
        .and_then(|mask| Region::from_local_mask(inked.bbox.top, inked.bbox.left, mask)))
}

/// Vertical ink runs crossed by a roughly horizontal stroke.
///
/// Runs much longer than the median run (for instance, a stem crossed by a
/// stroke along a staff line) and single-pixel runs are rejected.
pub fn select_gesture(
    model: &AnnotationModel,
    scaler: &Scaler,
    points: &[Coord<Widget>],
) -> Result<Option<Region>, ScoremarkError> {
    let image = model.require_image()?;
    let pixels = to_pixels(scaler, points);
    let Some(first) = pixels.first().copied() else {
        return Ok(None);
    };

    let (mut min_row, mut max_row, mut min_col, mut max_col) = (first.0, first.0, first.1, first.1);
    for (row, col) in &pixels {
        min_row = min_row.min(*row);
        max_row = max_row.max(*row);
        min_col = min_col.min(*col);
        max_col = max_col.max(*col);
    }
    if max_row - min_row > max_col - min_col {
        return Err(ScoremarkError::NotImplementedOrientation);
    }

    let mut traced = vec![first];
    for pair in pixels.windows(2) {
        traced.extend(bresenham(pair[0], pair[1]).into_iter().skip(1));
    }

    // One run per traced point: a run crossed twice weighs twice in the median.
    let runs: Vec<(i64, i64, i64)> = traced
        .into_iter()
        .filter_map(|(row, col)| vertical_run(image, row, col))
        .collect();
    if runs.is_empty() {
        return Ok(None);
    }

    let mut lengths: Vec<i64> = runs.iter().map(|(_, top, bottom)| bottom - top).collect();
    lengths.sort_unstable();
    let median = median_of_sorted(&lengths);
    let max_len = (1.1 * median).floor() as i64 + 1;
    let accepted: BTreeSet<(i64, i64, i64)> = runs
        .into_iter()
        .filter(|(_, top, bottom)| (2..=max_len).contains(&(bottom - top)))
        .collect();
    tracing::trace!(median, accepted = accepted.len(), "gesture runs");

    let Some(bbox) = IntBBox::union_all(
        accepted
            .iter()
            .map(|(col, top, bottom)| IntBBox::new(*top, *col, *bottom, col + 1)),
    ) else {
        return Ok(None);
    };
    let mut mask = Mask::try_empty(bbox.height(), bbox.width())?;
    for (col, top, bottom) in &accepted {
        for row in *top..*bottom {
            mask.set((row - bbox.top) as usize, (col - bbox.left) as usize, true);
        }
    }
    Ok(Region::new(bbox, Some(mask)))
}

fn clip(model: &AnnotationModel, bbox: IntBBox) -> Option<IntBBox> {
    let bbox = match model.image() {
        Some(image) => bbox.clip_to(image.height(), image.width())?,
        None => bbox,
    };
    (!bbox.is_empty()).then_some(bbox)
}

/// The polygon's pixels inside `image`, as a tight box and its mask.
fn rasterize_lasso(
    image: &Raster,
    scaler: &Scaler,
    points: &[Coord<Widget>],
) -> Option<(IntBBox, Mask)> {
    let polygon: Vec<Coord<Model>> = points
        .iter()
        .filter(|point| point.is_finite())
        .map(|point| scaler.point_widget_to_model(point))
        .collect();
    if polygon.len() < 3 {
        return None;
    }

    let (mut top, mut left, mut bottom, mut right) = (f64::MAX, f64::MAX, f64::MIN, f64::MIN);
    for point in &polygon {
        top = top.min(point.y);
        left = left.min(point.x);
        bottom = bottom.max(point.y);
        right = right.max(point.x);
    }
    let bbox = round_bbox(top, left, bottom, right).clip_to(image.height(), image.width())?;

    let mut mask = Mask::empty(bbox.height(), bbox.width());
    for row in 0..bbox.height() {
        for col in 0..bbox.width() {
            let center_y = (bbox.top + row as i64) as f64 + 0.5;
            let center_x = (bbox.left + col as i64) as f64 + 0.5;
            if point_in_polygon(center_x, center_y, &polygon) {
                mask.set(row, col, true);
            }
        }
    }
    let covered = mask.tight_bbox()?;
    let bbox = IntBBox::new(
        bbox.top + covered.top,
        bbox.left + covered.left,
        bbox.top + covered.bottom,
        bbox.left + covered.right,
    );
    Some((bbox, mask.crop(&covered)?))
}

/// Even-odd rule.
fn point_in_polygon(x: f64, y: f64, polygon: &[Coord<Model>]) -> bool {
    let mut inside = false;
    let mut j = polygon.len() - 1;
    for (i, a) in polygon.iter().enumerate() {
        let b = &polygon[j];
        if (a.y > y) != (b.y > y) && x < (b.x - a.x) * (y - a.y) / (b.y - a.y) + a.x {
            inside = !inside;
        }
        j = i;
    }
    inside
}

/// Model pixels `(row, col)` under the points, consecutive repeats removed.
fn to_pixels(scaler: &Scaler, points: &[Coord<Widget>]) -> Vec<(i64, i64)> {
    let mut pixels: Vec<(i64, i64)> = Vec::with_capacity(points.len());
    for point in points.iter().filter(|point| point.is_finite()) {
        let model = scaler.point_widget_to_model(point);
        let pixel = (model.y.floor() as i64, model.x.floor() as i64);
        if pixels.last() != Some(&pixel) {
            pixels.push(pixel);
        }
    }
    pixels
}

/// Pixels on the segment from `start` to `end`, both included.
fn bresenham(start: (i64, i64), end: (i64, i64)) -> Vec<(i64, i64)> {
    let (mut row, mut col) = start;
    let d_row = (end.0 - start.0).abs();
    let d_col = -(end.1 - start.1).abs();
    let step_row = if start.0 < end.0 { 1 } else { -1 };
    let step_col = if start.1 < end.1 { 1 } else { -1 };
    let mut err = d_row + d_col;

    let mut line = Vec::new();
    loop {
        line.push((row, col));
        if (row, col) == end {
            break;
        }
        let doubled = 2 * err;
        if doubled >= d_col {
            err += d_col;
            row += step_row;
        }
        if doubled <= d_row {
            err += d_row;
            col += step_col;
        }
    }
    line
}

/// The maximal vertical run of nonzero pixels through `(row, col)`, as
/// `(col, top, bottom)` with `bottom` exclusive.
fn vertical_run(image: &Raster, row: i64, col: i64) -> Option<(i64, i64, i64)> {
    if image.get_signed(row, col) == 0 {
        return None;
    }
    let mut top = row;
    while image.get_signed(top - 1, col) != 0 {
        top -= 1;
    }
    let mut bottom = row + 1;
    while image.get_signed(bottom, col) != 0 {
        bottom += 1;
    }
    Some((col, top, bottom))
}

fn median_of_sorted(values: &[i64]) -> f64 {
    let mid = values.len() / 2;
    if values.len() % 2 == 0 {
        (values[mid - 1] + values[mid]) as f64 / 2.0
    } else {
        values[mid] as f64
    }
}

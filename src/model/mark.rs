//! The mark entity: one labeled region of the score image.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use super::ids::{ClassId, MarkId};
use crate::error::ScoremarkError;
use crate::geom::{label_components, round_bbox, Connectivity, IntBBox, Mask, Raster, Region};

/// A scalar auxiliary attribute attached to a mark.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DataValue {
    Int(i64),
    Float(f64),
    Str(String),
}

impl DataValue {
    /// The type tag used by the mark list format.
    pub fn type_name(&self) -> &'static str {
        match self {
            DataValue::Int(_) => "int",
            DataValue::Float(_) => "float",
            DataValue::Str(_) => "str",
        }
    }
}

impl fmt::Display for DataValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataValue::Int(value) => write!(f, "{value}"),
            DataValue::Float(value) => write!(f, "{value}"),
            DataValue::Str(value) => write!(f, "{value}"),
        }
    }
}

/// A single annotation instance.
///
/// The box is stored as integers: `top` is the row of the first covered
/// pixel (the legacy `x`), `left` the column (the legacy `y`). The mask,
/// when present, always has shape `(height, width)`; without one the whole
/// box is covered.
///
/// `inlinks` and `outlinks` mirror the relationship graph and are only
/// changed by [`Graph`](super::Graph) methods.
#[derive(Clone, Debug, PartialEq)]
pub struct Mark {
    pub id: MarkId,
    pub class_id: ClassId,
    pub class_name: String,
    top: i64,
    left: i64,
    height: usize,
    width: usize,
    mask: Option<Mask>,
    inlinks: BTreeSet<MarkId>,
    outlinks: BTreeSet<MarkId>,
    pub data: BTreeMap<String, DataValue>,
}

impl Mark {
    /// Creates a maskless mark covering `bbox`.
    pub fn new(
        id: impl Into<MarkId>,
        class_id: impl Into<ClassId>,
        class_name: impl Into<String>,
        bbox: IntBBox,
    ) -> Self {
        Self {
            id: id.into(),
            class_id: class_id.into(),
            class_name: class_name.into(),
            top: bbox.top,
            left: bbox.left,
            height: bbox.height(),
            width: bbox.width(),
            mask: None,
            inlinks: BTreeSet::new(),
            outlinks: BTreeSet::new(),
            data: BTreeMap::new(),
        }
    }

    /// Creates a mark from real-valued edges, rounding with [`round_bbox`].
    pub fn from_float_bounds(
        id: impl Into<MarkId>,
        class_id: impl Into<ClassId>,
        class_name: impl Into<String>,
        (top, left, bottom, right): (f64, f64, f64, f64),
    ) -> Self {
        Self::new(id, class_id, class_name, round_bbox(top, left, bottom, right))
    }

    /// Creates a mark covering exactly a selected region.
    pub fn from_region(
        id: impl Into<MarkId>,
        class_id: impl Into<ClassId>,
        class_name: impl Into<String>,
        region: &Region,
    ) -> Self {
        let mut mark = Self::new(id, class_id, class_name, region.bbox);
        mark.mask = region.mask.clone();
        mark
    }

    /// Attaches a mask, consuming and returning the mark.
    pub fn with_mask(mut self, mask: Mask) -> Result<Self, ScoremarkError> {
        self.set_mask(Some(mask))?;
        Ok(self)
    }

    #[inline]
    pub fn top(&self) -> i64 {
        self.top
    }

    #[inline]
    pub fn left(&self) -> i64 {
        self.left
    }

    #[inline]
    pub fn bottom(&self) -> i64 {
        self.top + self.height as i64
    }

    #[inline]
    pub fn right(&self) -> i64 {
        self.left + self.width as i64
    }

    #[inline]
    pub fn height(&self) -> usize {
        self.height
    }

    #[inline]
    pub fn width(&self) -> usize {
        self.width
    }

    /// The mark's box in model coordinates.
    pub fn bbox(&self) -> IntBBox {
        IntBBox::from_origin_size(self.top, self.left, self.height, self.width)
    }

    pub fn mask(&self) -> Option<&Mask> {
        self.mask.as_ref()
    }

    /// Replaces the mask. Fails without changing anything when the shape
    /// does not match the box.
    pub fn set_mask(&mut self, mask: Option<Mask>) -> Result<(), ScoremarkError> {
        if let Some(mask) = &mask {
            if mask.shape() != (self.height, self.width) {
                return Err(ScoremarkError::MaskShapeMismatch {
                    expected: (self.height, self.width),
                    actual: mask.shape(),
                });
            }
        }
        self.mask = mask;
        Ok(())
    }

    /// Ids of the marks with an edge into this one.
    pub fn inlinks(&self) -> &BTreeSet<MarkId> {
        &self.inlinks
    }

    /// Ids of the marks this one has an edge to.
    pub fn outlinks(&self) -> &BTreeSet<MarkId> {
        &self.outlinks
    }

    pub(crate) fn inlinks_mut(&mut self) -> &mut BTreeSet<MarkId> {
        &mut self.inlinks
    }

    pub(crate) fn outlinks_mut(&mut self) -> &mut BTreeSet<MarkId> {
        &mut self.outlinks
    }

    pub(crate) fn clear_links(&mut self) {
        self.inlinks.clear();
        self.outlinks.clear();
    }

    /// The mark's footprint as a region.
    pub fn to_region(&self) -> Region {
        Region {
            bbox: self.bbox(),
            mask: self.mask.clone(),
        }
    }

    /// Returns true if the mark covers the image pixel `(row, col)`.
    pub fn covers(&self, row: i64, col: i64) -> bool {
        if !self.bbox().contains(row, col) {
            return false;
        }
        match &self.mask {
            Some(mask) => mask.get((row - self.top) as usize, (col - self.left) as usize),
            None => true,
        }
    }

    /// Number of pixels the mark covers.
    pub fn pixel_count(&self) -> usize {
        self.mask
            .as_ref()
            .map_or(self.height.saturating_mul(self.width), Mask::count)
    }

    /// The image crop under the mark, with pixels outside the mask zeroed.
    pub fn project_to(&self, image: &Raster) -> Result<Raster, ScoremarkError> {
        let mut crop = image
            .crop(&self.bbox())
            .ok_or_else(|| self.out_of_bounds(image))?;
        if let Some(mask) = &self.mask {
            for row in 0..self.height {
                for col in 0..self.width {
                    if !mask.get(row, col) {
                        crop.set(row, col, 0);
                    }
                }
            }
        }
        Ok(crop)
    }

    /// An image-sized raster that is zero except for the projection of the
    /// mark at its own offset.
    pub fn project_onto(&self, image: &Raster) -> Result<Raster, ScoremarkError> {
        let crop = self.project_to(image)?;
        let mut canvas = Raster::zeros(image.height(), image.width());
        for row in 0..self.height {
            for col in 0..self.width {
                canvas.set(
                    self.top as usize + row,
                    self.left as usize + col,
                    crop.get(row, col),
                );
            }
        }
        Ok(canvas)
    }

    /// Splits the mask into 4-connected components.
    ///
    /// Each component becomes a new mark with the component's tight box
    /// and cropped mask, the same class and data, and ids counting up from
    /// `starting_id` in scan order. A maskless mark is a single component.
    /// Callers should treat a single-element result as a no-op.
    pub fn split_on_connected_components(&self, starting_id: impl Into<MarkId>) -> Vec<Mark> {
        let starting_id = starting_id.into();
        let Some(mask) = &self.mask else {
            let mut whole = self.clone();
            whole.id = starting_id;
            whole.clear_links();
            return vec![whole];
        };

        let labeling = label_components(mask.as_raster(), Connectivity::Four);
        (1..=labeling.count() as u32)
            .filter_map(|label| {
                let local = labeling.bbox_of(label)?;
                let component = labeling.component_mask(label)?;
                Some((local, component))
            })
            .enumerate()
            .map(|(idx, (local, component))| {
                let bbox = IntBBox::new(
                    self.top + local.top,
                    self.left + local.left,
                    self.top + local.bottom,
                    self.left + local.right,
                );
                let mut part = Mark::new(
                    starting_id.as_u64() + idx as u64,
                    self.class_id,
                    self.class_name.clone(),
                    bbox,
                );
                part.mask = Some(component);
                part.data = self.data.clone();
                part
            })
            .collect()
    }

    /// Alpha-blends a filled rectangle of the mark's box into `canvas`.
    ///
    /// The mask is not consulted. `rgb` components are in `[0, 1]`; the
    /// rectangle is clipped to the canvas.
    pub fn render(&self, canvas: &mut image::RgbImage, alpha: f32, rgb: [f32; 3]) {
        let (canvas_width, canvas_height) = canvas.dimensions();
        let Some(clipped) = self
            .bbox()
            .clip_to(canvas_height as usize, canvas_width as usize)
        else {
            return;
        };
        let alpha = alpha.clamp(0.0, 1.0);
        let color = rgb.map(|channel| channel.clamp(0.0, 1.0) * 255.0);

        for row in clipped.top..clipped.bottom {
            for col in clipped.left..clipped.right {
                let pixel = canvas.get_pixel_mut(col as u32, row as u32);
                for (channel, target) in pixel.0.iter_mut().zip(color) {
                    let blended = (1.0 - alpha) * f32::from(*channel) + alpha * target;
                    *channel = blended.round().clamp(0.0, 255.0) as u8;
                }
            }
        }
    }

    fn out_of_bounds(&self, image: &Raster) -> ScoremarkError {
        ScoremarkError::OutOfBounds {
            mark: self.id,
            bbox: self.bbox(),
            image_height: image.height(),
            image_width: image.width(),
        }
    }
}

// Summary form used by activity-log extractors; masks and links are left out.
impl Serialize for Mark {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        use serde::ser::SerializeStruct;
        let mut state = serializer.serialize_struct("Mark", 8)?;
        state.serialize_field("id", &self.id)?;
        state.serialize_field("class_id", &self.class_id)?;
        state.serialize_field("class_name", &self.class_name)?;
        state.serialize_field("top", &self.top)?;
        state.serialize_field("left", &self.left)?;
        state.serialize_field("height", &self.height)?;
        state.serialize_field("width", &self.width)?;
        state.serialize_field("masked", &self.mask.is_some())?;
        state.end()
    }
}

/// The smallest box enclosing every mark, or `None` for no marks.
pub fn merge_bbox(marks: &[&Mark]) -> Option<IntBBox> {
    IntBBox::union_all(marks.iter().map(|mark| mark.bbox()))
}

/// The OR of all masks, placed inside the merged box.
///
/// Returns `Ok(None)` when no mark has a mask and fails with
/// [`ScoremarkError::MixedMaskPresence`] when only some do, or with
/// [`ScoremarkError::RasterTooLarge`] when the merged box has too many
/// pixels for one mask.
pub fn merge_masks(marks: &[&Mark]) -> Result<Option<Mask>, ScoremarkError> {
    let masked = marks.iter().filter(|mark| mark.mask.is_some()).count();
    if masked == 0 {
        return Ok(None);
    }
    if masked != marks.len() {
        return Err(ScoremarkError::MixedMaskPresence);
    }
    let Some(merged) = merge_bbox(marks) else {
        return Ok(None);
    };

    let mut out = Mask::try_empty(merged.height(), merged.width())?;
    for mark in marks {
        let Some(mask) = &mark.mask else { continue };
        let dr = (mark.top - merged.top) as usize;
        let dc = (mark.left - merged.left) as usize;
        for row in 0..mark.height {
            for col in 0..mark.width {
                if mask.get(row, col) {
                    out.set(dr + row, dc + col, true);
                }
            }
        }
    }
    Ok(Some(out))
}

/// True iff some pixel is set in `region` and covered by `mark`.
///
/// With `use_mark_mask == false` the mark's whole box counts as covered;
/// otherwise only pixels set in the mark's own mask do.
pub fn mask_overlaps_region(region: &Region, mark: &Mark, use_mark_mask: bool) -> bool {
    let Some(overlap) = region.bbox.intersection(&mark.bbox()) else {
        return false;
    };
    for row in overlap.top..overlap.bottom {
        for col in overlap.left..overlap.right {
            if !region.covers(row, col) {
                continue;
            }
            if !use_mark_mask || mark.covers(row, col) {
                return true;
            }
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    fn block_mask() -> Mask {
        let mut mask = Mask::empty(10, 10);
        for (r0, c0) in [(0usize, 0usize), (7, 7)] {
            for row in r0..r0 + 3 {
                for col in c0..c0 + 3 {
                    mask.set(row, col, true);
                }
            }
        }
        mask
    }

    #[test]
    fn set_mask_rejects_wrong_shape_and_keeps_old_mask() {
        let mut mark = Mark::new(0u64, 1u64, "stem", IntBBox::new(0, 0, 4, 2));
        mark.set_mask(Some(Mask::full(4, 2))).expect("matching mask");

        let err = mark.set_mask(Some(Mask::full(2, 4))).unwrap_err();
        assert!(matches!(
            err,
            ScoremarkError::MaskShapeMismatch {
                expected: (4, 2),
                actual: (2, 4)
            }
        ));
        assert_eq!(mark.mask().map(Mask::shape), Some((4, 2)));
    }

    #[test]
    fn from_float_bounds_rounds_outward() {
        let mark = Mark::from_float_bounds(0u64, 1u64, "stem", (1.5, 2.2, 3.1, 4.0));
        assert_eq!(mark.bbox(), IntBBox::new(1, 2, 4, 4));
    }

    #[test]
    fn split_on_connected_components_yields_tight_parts() {
        let mark = Mark::new(0u64, 3u64, "notehead_full", IntBBox::new(0, 0, 10, 10))
            .with_mask(block_mask())
            .expect("mask");
        let parts = mark.split_on_connected_components(5u64);

        assert_eq!(parts.len(), 2);
        assert_eq!(parts[0].id, MarkId(5));
        assert_eq!(parts[0].bbox(), IntBBox::new(0, 0, 3, 3));
        assert_eq!(parts[1].id, MarkId(6));
        assert_eq!(parts[1].bbox(), IntBBox::new(7, 7, 10, 10));
        assert!(parts.iter().all(|part| part.class_name == "notehead_full"));
        assert!(parts
            .iter()
            .all(|part| part.mask().map(Mask::count) == Some(9)));
    }

    #[test]
    fn split_without_mask_is_single_component() {
        let mark = Mark::new(2u64, 1u64, "stem", IntBBox::new(3, 3, 9, 4));
        let parts = mark.split_on_connected_components(8u64);
        assert_eq!(parts.len(), 1);
        assert_eq!(parts[0].bbox(), mark.bbox());
    }

    #[test]
    fn project_to_applies_mask() {
        let image = Raster::from_rows(&[vec![5, 6, 7], vec![8, 9, 10]]).expect("image");
        let mark = Mark::new(0u64, 1u64, "dot", IntBBox::new(0, 1, 2, 3))
            .with_mask(Mask::from_rows(&[vec![1, 0], vec![0, 1]]).expect("mask"))
            .expect("mark");
        assert_eq!(mark.project_to(&image).expect("crop").data(), &[6, 0, 0, 10]);

        let onto = mark.project_onto(&image).expect("onto");
        assert_eq!(onto.data(), &[0, 6, 0, 0, 0, 10]);
    }

    #[test]
    fn project_to_fails_outside_image() {
        let image = Raster::zeros(4, 4);
        let mark = Mark::new(9u64, 1u64, "dot", IntBBox::new(2, 2, 6, 3));
        assert!(matches!(
            mark.project_to(&image),
            Err(ScoremarkError::OutOfBounds { .. })
        ));
    }

    #[test]
    fn merge_masks_ors_offset_masks() {
        let a = Mark::new(0u64, 1u64, "a", IntBBox::new(0, 0, 1, 2))
            .with_mask(Mask::from_rows(&[vec![1, 0]]).expect("mask"))
            .expect("a");
        let b = Mark::new(1u64, 1u64, "b", IntBBox::new(1, 1, 2, 3))
            .with_mask(Mask::from_rows(&[vec![0, 1]]).expect("mask"))
            .expect("b");

        assert_eq!(merge_bbox(&[&a, &b]), Some(IntBBox::new(0, 0, 2, 3)));
        let merged = merge_masks(&[&a, &b]).expect("merge").expect("mask");
        assert_eq!(merged.values(), &[1, 0, 0, 0, 0, 1]);
    }

    #[test]
    fn merge_masks_rejects_mixed_presence() {
        let a = Mark::new(0u64, 1u64, "a", IntBBox::new(0, 0, 1, 1));
        let b = Mark::new(1u64, 1u64, "b", IntBBox::new(0, 0, 1, 1))
            .with_mask(Mask::full(1, 1))
            .expect("b");
        assert!(matches!(
            merge_masks(&[&a, &b]),
            Err(ScoremarkError::MixedMaskPresence)
        ));
        assert_eq!(merge_masks(&[&a]).expect("unmasked"), None);
    }

    #[test]
    fn mask_overlaps_region_respects_mark_mask() {
        let mark = Mark::new(0u64, 1u64, "a", IntBBox::new(0, 0, 2, 2))
            .with_mask(Mask::from_rows(&[vec![1, 0], vec![0, 0]]).expect("mask"))
            .expect("mark");
        let region = Region::from_bbox(IntBBox::new(1, 1, 3, 3));

        assert!(mask_overlaps_region(&region, &mark, false));
        assert!(!mask_overlaps_region(&region, &mark, true));
        assert!(!mask_overlaps_region(
            &Region::from_bbox(IntBBox::new(5, 5, 6, 6)),
            &mark,
            false
        ));
    }

    #[test]
    fn render_blends_rectangle_ignoring_mask() {
        let mut canvas = image::RgbImage::new(4, 4);
        let mark = Mark::new(0u64, 1u64, "a", IntBBox::new(1, 1, 3, 3))
            .with_mask(Mask::empty(2, 2))
            .expect("mark");
        mark.render(&mut canvas, 0.5, [1.0, 0.0, 0.0]);

        assert_eq!(canvas.get_pixel(1, 1).0, [128, 0, 0]);
        assert_eq!(canvas.get_pixel(0, 0).0, [0, 0, 0]);
        assert_eq!(canvas.get_pixel(2, 2).0, [128, 0, 0]);
    }
}

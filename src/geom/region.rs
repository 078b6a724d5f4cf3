//! Model-space regions: an integer box with an optional mask.

use super::bbox::IntBBox;
use super::raster::{Mask, Raster};

/// A model-space region, as produced by the selectors.
///
/// When `mask` is present its shape is `(bbox.height(), bbox.width())`;
/// otherwise the whole box is covered.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Region {
    pub bbox: IntBBox,
    pub mask: Option<Mask>,
}

impl Region {
    /// A region covering its entire box.
    pub fn from_bbox(bbox: IntBBox) -> Self {
        Self { bbox, mask: None }
    }

    /// Builds a region from a box and an optional mask. Returns `None` if
    /// the mask shape does not match the box.
    pub fn new(bbox: IntBBox, mask: Option<Mask>) -> Option<Self> {
        match &mask {
            Some(mask) if mask.shape() != (bbox.height(), bbox.width()) => None,
            _ => Some(Self { bbox, mask }),
        }
    }

    /// Builds a region from a local mask; the box is the mask's tight box
    /// shifted by `(top, left)` and the mask is cropped to match. Returns
    /// `None` for an empty mask.
    pub fn from_local_mask(top: i64, left: i64, mask: &Mask) -> Option<Self> {
        let local = mask.tight_bbox()?;
        let cropped = mask.crop(&local)?;
        let bbox = IntBBox::new(
            top + local.top,
            left + local.left,
            top + local.bottom,
            left + local.right,
        );
        Some(Self {
            bbox,
            mask: Some(cropped),
        })
    }

    /// Returns true if the region covers the image pixel `(row, col)`.
    #[inline]
    pub fn covers(&self, row: i64, col: i64) -> bool {
        if !self.bbox.contains(row, col) {
            return false;
        }
        match &self.mask {
            Some(mask) => mask.get(
                (row - self.bbox.top) as usize,
                (col - self.bbox.left) as usize,
            ),
            None => true,
        }
    }

    /// Number of covered pixels.
    pub fn pixel_count(&self) -> usize {
        self.mask
            .as_ref()
            .map_or_else(|| self.bbox.area(), Mask::count)
    }

    /// Intersects the region with the nonzero pixels of `image`.
    pub fn and_nonzero(&self, image: &Raster) -> Region {
        let mut mask = Mask::empty(self.bbox.height(), self.bbox.width());
        for row in 0..self.bbox.height() {
            for col in 0..self.bbox.width() {
                let (r, c) = (self.bbox.top + row as i64, self.bbox.left + col as i64);
                if self.covers(r, c) && image.get_signed(r, c) != 0 {
                    mask.set(row, col, true);
                }
            }
        }
        Region {
            bbox: self.bbox,
            mask: Some(mask),
        }
    }
}

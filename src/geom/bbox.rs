//! Bounding box types: real-valued boxes tagged with a coordinate space,
//! and the integer model-space boxes that marks are stored with.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::space::Model;

/// A real-valued axis-aligned box given by its four edges.
///
/// In [`Model`] space `top <= bottom`. In [`Widget`](super::Widget) space
/// the vertical axis is flipped, so a box converted from model space has
/// `bottom < top`. The type does not enforce ordering.
#[derive(Clone, Copy, PartialEq)]
pub struct BBox<TSpace> {
    pub top: f64,
    pub left: f64,
    pub bottom: f64,
    pub right: f64,
    _space: std::marker::PhantomData<TSpace>,
}

impl<TSpace> BBox<TSpace> {
    /// Creates a box from its edges in `(top, left, bottom, right)` order.
    #[inline]
    pub fn new(top: f64, left: f64, bottom: f64, right: f64) -> Self {
        Self {
            top,
            left,
            bottom,
            right,
            _space: std::marker::PhantomData,
        }
    }

    /// Returns true if all edges are finite (not NaN or infinite).
    #[inline]
    pub fn is_finite(&self) -> bool {
        self.top.is_finite()
            && self.left.is_finite()
            && self.bottom.is_finite()
            && self.right.is_finite()
    }

    /// Returns the same box with edges swapped so that `top <= bottom`
    /// and `left <= right`.
    pub fn ordered(&self) -> Self {
        Self::new(
            self.top.min(self.bottom),
            self.left.min(self.right),
            self.top.max(self.bottom),
            self.left.max(self.right),
        )
    }
}

impl<TSpace> fmt::Debug for BBox<TSpace> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BBox")
            .field("top", &self.top)
            .field("left", &self.left)
            .field("bottom", &self.bottom)
            .field("right", &self.right)
            .finish()
    }
}

impl From<IntBBox> for BBox<Model> {
    fn from(bbox: IntBBox) -> Self {
        BBox::new(
            bbox.top as f64,
            bbox.left as f64,
            bbox.bottom as f64,
            bbox.right as f64,
        )
    }
}

/// An integer model-space box, half-open: rows `top..bottom`, columns
/// `left..right`.
///
/// Boxes extending beyond the image or with negative coordinates are
/// representable; validation reports them instead of construction
/// refusing them.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct IntBBox {
    pub top: i64,
    pub left: i64,
    pub bottom: i64,
    pub right: i64,
}

impl IntBBox {
    #[inline]
    pub fn new(top: i64, left: i64, bottom: i64, right: i64) -> Self {
        Self {
            top,
            left,
            bottom,
            right,
        }
    }

    /// Creates a box from its top-left corner and size.
    ///
    /// Edges that would leave the `i64` range saturate; use
    /// [`checked_from_origin_size`](Self::checked_from_origin_size) for
    /// untrusted input.
    #[inline]
    pub fn from_origin_size(top: i64, left: i64, height: usize, width: usize) -> Self {
        let extend = |start: i64, len: usize| {
            i64::try_from(len).map_or(i64::MAX, |len| start.saturating_add(len))
        };
        Self::new(top, left, extend(top, height), extend(left, width))
    }

    /// Like [`from_origin_size`](Self::from_origin_size), but `None` when an
    /// edge does not fit in `i64`.
    pub fn checked_from_origin_size(
        top: i64,
        left: i64,
        height: usize,
        width: usize,
    ) -> Option<Self> {
        let bottom = top.checked_add(i64::try_from(height).ok()?)?;
        let right = left.checked_add(i64::try_from(width).ok()?)?;
        Some(Self::new(top, left, bottom, right))
    }

    /// Number of rows covered; zero for inverted boxes.
    #[inline]
    pub fn height(&self) -> usize {
        span(self.top, self.bottom)
    }

    /// Number of columns covered; zero for inverted boxes.
    #[inline]
    pub fn width(&self) -> usize {
        span(self.left, self.right)
    }

    /// Number of pixels covered, saturating at `usize::MAX`.
    #[inline]
    pub fn area(&self) -> usize {
        self.height().saturating_mul(self.width())
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.area() == 0
    }

    /// Returns true if `(row, col)` lies inside the half-open box.
    #[inline]
    pub fn contains(&self, row: i64, col: i64) -> bool {
        row >= self.top && row < self.bottom && col >= self.left && col < self.right
    }

    /// Returns true if `other` lies entirely inside this box.
    pub fn encloses(&self, other: &IntBBox) -> bool {
        self.top <= other.top
            && self.left <= other.left
            && self.bottom >= other.bottom
            && self.right >= other.right
    }

    /// Returns true if the box lies inside an image of the given shape.
    pub fn is_within(&self, image_height: usize, image_width: usize) -> bool {
        self.top >= 0
            && self.left >= 0
            && self.bottom <= image_height as i64
            && self.right <= image_width as i64
    }

    /// The smallest box enclosing both boxes.
    pub fn union(&self, other: &IntBBox) -> IntBBox {
        IntBBox::new(
            self.top.min(other.top),
            self.left.min(other.left),
            self.bottom.max(other.bottom),
            self.right.max(other.right),
        )
    }

    /// The overlap of both boxes, or `None` when they do not share a pixel.
    pub fn intersection(&self, other: &IntBBox) -> Option<IntBBox> {
        let clipped = IntBBox::new(
            self.top.max(other.top),
            self.left.max(other.left),
            self.bottom.min(other.bottom),
            self.right.min(other.right),
        );
        (clipped.top < clipped.bottom && clipped.left < clipped.right).then_some(clipped)
    }

    /// Clips the box to an image of the given shape.
    pub fn clip_to(&self, image_height: usize, image_width: usize) -> Option<IntBBox> {
        self.intersection(&IntBBox::new(
            0,
            0,
            image_height as i64,
            image_width as i64,
        ))
    }

    /// The smallest box enclosing every box of the iterator, or `None` if
    /// the iterator is empty.
    pub fn union_all<I>(boxes: I) -> Option<IntBBox>
    where
        I: IntoIterator<Item = IntBBox>,
    {
        boxes.into_iter().reduce(|acc, bbox| acc.union(&bbox))
    }
}

impl fmt::Display for IntBBox {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "({}, {}, {}, {})",
            self.top, self.left, self.bottom, self.right
        )
    }
}

/// Rounds real-valued edges to integer bounds without shrinking the area.
///
/// `top` and `left` round down. `bottom` and `right` keep their integer
/// part when they have no fractional part and round up otherwise.
/// Integer input is returned unchanged.
pub fn round_bbox(ftop: f64, fleft: f64, fbottom: f64, fright: f64) -> IntBBox {
    IntBBox::new(
        ftop.floor() as i64,
        fleft.floor() as i64,
        round_up_fractional(fbottom),
        round_up_fractional(fright),
    )
}

fn round_up_fractional(value: f64) -> i64 {
    let floored = value.floor() as i64;
    if value.is_finite() && value.fract() != 0.0 {
        floored.saturating_add(1)
    } else {
        floored
    }
}

/// `end - start` as a length; zero when inverted.
fn span(start: i64, end: i64) -> usize {
    if end <= start {
        return 0;
    }
    usize::try_from(i128::from(end) - i128::from(start)).unwrap_or(usize::MAX)
}

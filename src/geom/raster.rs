//! Row-major 8-bit rasters: the score image and binary mark masks.

use std::fmt;

use super::bbox::IntBBox;
use crate::error::ScoremarkError;

/// A 2-D grid of `u8` values stored row-major.
///
/// The score image is a `Raster` where any nonzero value is foreground.
#[derive(Clone, PartialEq, Eq, Default)]
pub struct Raster {
    height: usize,
    width: usize,
    data: Vec<u8>,
}

/// `height * width`, or [`ScoremarkError::RasterTooLarge`] when it
/// overflows `usize`.
fn pixel_len(height: usize, width: usize) -> Result<usize, ScoremarkError> {
    height
        .checked_mul(width)
        .ok_or(ScoremarkError::RasterTooLarge { height, width })
}

impl Raster {
    /// Creates a zero-filled raster.
    ///
    /// # Panics
    ///
    /// When `height * width` overflows `usize`. Sizes from untrusted input
    /// go through [`try_zeros`](Self::try_zeros).
    pub fn zeros(height: usize, width: usize) -> Self {
        match Self::try_zeros(height, width) {
            Ok(raster) => raster,
            Err(err) => panic!("{err}"),
        }
    }

    /// Creates a zero-filled raster, failing when the size overflows.
    pub fn try_zeros(height: usize, width: usize) -> Result<Self, ScoremarkError> {
        Ok(Self {
            height,
            width,
            data: vec![0; pixel_len(height, width)?],
        })
    }

    /// Wraps row-major data; fails if `data.len() != height * width`.
    pub fn from_vec(height: usize, width: usize, data: Vec<u8>) -> Result<Self, ScoremarkError> {
        let expected = pixel_len(height, width)?;
        if data.len() != expected {
            return Err(ScoremarkError::RasterLength {
                expected,
                actual: data.len(),
            });
        }
        Ok(Self {
            height,
            width,
            data,
        })
    }

    /// Builds a raster from equally long rows.
    pub fn from_rows(rows: &[Vec<u8>]) -> Result<Self, ScoremarkError> {
        let height = rows.len();
        let width = rows.first().map(Vec::len).unwrap_or(0);
        let data: Vec<u8> = rows.iter().flatten().copied().collect();
        Self::from_vec(height, width, data)
    }

    /// Converts a decoded grayscale image.
    pub fn from_luma(image: image::GrayImage) -> Self {
        let (width, height) = image.dimensions();
        Self {
            height: height as usize,
            width: width as usize,
            data: image.into_raw(),
        }
    }

    #[inline]
    pub fn height(&self) -> usize {
        self.height
    }

    #[inline]
    pub fn width(&self) -> usize {
        self.width
    }

    /// Returns `(height, width)`.
    #[inline]
    pub fn shape(&self) -> (usize, usize) {
        (self.height, self.width)
    }

    /// The full extent of the raster as a box anchored at the origin.
    pub fn bounds(&self) -> IntBBox {
        IntBBox::from_origin_size(0, 0, self.height, self.width)
    }

    /// Reads the pixel at `(row, col)`.
    ///
    /// # Panics
    ///
    /// When the pixel lies outside the raster.
    #[inline]
    pub fn get(&self, row: usize, col: usize) -> u8 {
        self.data[row * self.width + col]
    }

    /// Reads a pixel by signed coordinates; out-of-range pixels read as 0.
    #[inline]
    pub fn get_signed(&self, row: i64, col: i64) -> u8 {
        if row < 0 || col < 0 || row as usize >= self.height || col as usize >= self.width {
            return 0;
        }
        self.get(row as usize, col as usize)
    }

    /// Writes the pixel at `(row, col)`. Panics outside the raster.
    #[inline]
    pub fn set(&mut self, row: usize, col: usize, value: u8) {
        self.data[row * self.width + col] = value;
    }

    /// Row-major pixel values.
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Pixels of one row, left to right.
    pub fn row(&self, row: usize) -> &[u8] {
        &self.data[row * self.width..(row + 1) * self.width]
    }

    /// Number of pixels with a non-zero value.
    pub fn count_nonzero(&self) -> usize {
        self.data.iter().filter(|value| **value != 0).count()
    }

    /// Copies the pixels of `bbox`; `None` unless the box lies inside.
    pub fn crop(&self, bbox: &IntBBox) -> Option<Raster> {
        if !bbox.is_within(self.height, self.width) {
            return None;
        }
        let (top, left) = (bbox.top as usize, bbox.left as usize);
        let width = bbox.width();
        let mut data = Vec::with_capacity(bbox.area());
        for row in top..top + bbox.height() {
            data.extend_from_slice(&self.row(row)[left..left + width]);
        }
        Some(Raster {
            height: bbox.height(),
            width,
            data,
        })
    }

    /// Tightest box of nonzero pixels inside `bbox` (clipped to the raster).
    pub fn nonzero_bbox_in(&self, bbox: &IntBBox) -> Option<IntBBox> {
        let clipped = bbox.clip_to(self.height, self.width)?;
        let mut found: Option<IntBBox> = None;
        for row in clipped.top..clipped.bottom {
            for col in clipped.left..clipped.right {
                if self.get(row as usize, col as usize) != 0 {
                    let pixel = IntBBox::new(row, col, row + 1, col + 1);
                    found = Some(found.map_or(pixel, |acc| acc.union(&pixel)));
                }
            }
        }
        found
    }
}

impl fmt::Debug for Raster {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Raster")
            .field("height", &self.height)
            .field("width", &self.width)
            .field("nonzero", &self.count_nonzero())
            .finish()
    }
}

/// A binary raster: every value is 0 or 1.
///
/// Construction clamps nonzero input values to 1.
#[derive(Clone, PartialEq, Eq)]
pub struct Mask(Raster);

impl Mask {
    /// Clamps an arbitrary raster to {0, 1}.
    pub fn from_raster(mut raster: Raster) -> Self {
        for value in &mut raster.data {
            *value = u8::from(*value != 0);
        }
        Self(raster)
    }

    /// Wraps row-major values, clamping every non-zero value to 1.
    pub fn from_vec(height: usize, width: usize, data: Vec<u8>) -> Result<Self, ScoremarkError> {
        Raster::from_vec(height, width, data).map(Self::from_raster)
    }

    pub fn from_rows(rows: &[Vec<u8>]) -> Result<Self, ScoremarkError> {
        Raster::from_rows(rows).map(Self::from_raster)
    }

    /// A mask with every pixel set.
    ///
    /// # Panics
    ///
    /// When `height * width` overflows `usize`; see [`try_full`](Self::try_full).
    pub fn full(height: usize, width: usize) -> Self {
        match Self::try_full(height, width) {
            Ok(mask) => mask,
            Err(err) => panic!("{err}"),
        }
    }

    /// A mask with every pixel set, failing when the size overflows.
    pub fn try_full(height: usize, width: usize) -> Result<Self, ScoremarkError> {
        Ok(Self(Raster {
            height,
            width,
            data: vec![1; pixel_len(height, width)?],
        }))
    }

    /// A mask with no pixel set.
    ///
    /// # Panics
    ///
    /// When `height * width` overflows `usize`; see [`try_empty`](Self::try_empty).
    pub fn empty(height: usize, width: usize) -> Self {
        Self(Raster::zeros(height, width))
    }

    /// A mask with no pixel set, failing when the size overflows.
    pub fn try_empty(height: usize, width: usize) -> Result<Self, ScoremarkError> {
        Raster::try_zeros(height, width).map(Self)
    }

    #[inline]
    pub fn height(&self) -> usize {
        self.0.height
    }

    #[inline]
    pub fn width(&self) -> usize {
        self.0.width
    }

    #[inline]
    pub fn shape(&self) -> (usize, usize) {
        self.0.shape()
    }

    /// Whether the pixel at `(row, col)` is set.
    #[inline]
    pub fn get(&self, row: usize, col: usize) -> bool {
        self.0.get(row, col) != 0
    }

    #[inline]
    pub fn set(&mut self, row: usize, col: usize, value: bool) {
        self.0.set(row, col, u8::from(value));
    }

    /// Row-major 0/1 values.
    pub fn values(&self) -> &[u8] {
        &self.0.data
    }

    /// The mask as a 0/1 raster.
    pub fn as_raster(&self) -> &Raster {
        &self.0
    }

    /// Number of set pixels.
    pub fn count(&self) -> usize {
        self.0.count_nonzero()
    }

    /// Pixel-wise AND; `None` when the shapes differ.
    pub fn and(&self, other: &Mask) -> Option<Mask> {
        if self.shape() != other.shape() {
            return None;
        }
        let mut out = self.clone();
        for (value, other) in out.0.data.iter_mut().zip(&other.0.data) {
            *value &= *other;
        }
        Some(out)
    }

    /// Tightest local box of set pixels, or `None` for an empty mask.
    pub fn tight_bbox(&self) -> Option<IntBBox> {
        self.0.nonzero_bbox_in(&self.0.bounds())
    }

    /// Copies the local box `bbox`; `None` unless it lies inside the mask.
    pub fn crop(&self, bbox: &IntBBox) -> Option<Mask> {
        self.0.crop(bbox).map(Self)
    }
}

impl fmt::Debug for Mask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Mask")
            .field("height", &self.height())
            .field("width", &self.width())
            .field("set", &self.count())
            .finish()
    }
}

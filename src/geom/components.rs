//! Connected-component labeling of rasters.

use std::collections::{BTreeSet, VecDeque};

use super::bbox::IntBBox;
use super::raster::{Mask, Raster};

/// Pixel neighbourhood used when growing components.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Connectivity {
    /// Edge neighbours only (up, down, left, right).
    Four,
    /// Edge and corner neighbours.
    Eight,
}

impl Connectivity {
    fn offsets(self) -> &'static [(i64, i64)] {
        const FOUR: [(i64, i64); 4] = [(-1, 0), (1, 0), (0, -1), (0, 1)];
        const EIGHT: [(i64, i64); 8] = [
            (-1, -1),
            (-1, 0),
            (-1, 1),
            (0, -1),
            (0, 1),
            (1, -1),
            (1, 0),
            (1, 1),
        ];
        match self {
            Connectivity::Four => &FOUR,
            Connectivity::Eight => &EIGHT,
        }
    }
}

/// The result of labeling a raster.
///
/// Label 0 is background. Labels `1..=count` are assigned in raster scan
/// order of each component's first pixel.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Labeling {
    height: usize,
    width: usize,
    labels: Vec<u32>,
    bboxes: Vec<IntBBox>,
}

impl Labeling {
    /// Number of foreground components.
    pub fn count(&self) -> usize {
        self.bboxes.len()
    }

    pub fn shape(&self) -> (usize, usize) {
        (self.height, self.width)
    }

    #[inline]
    pub fn label_at(&self, row: usize, col: usize) -> u32 {
        self.labels[row * self.width + col]
    }

    /// Tight box of a component, in the labeled raster's coordinates.
    pub fn bbox_of(&self, label: u32) -> Option<IntBBox> {
        if label == 0 {
            return None;
        }
        self.bboxes.get(label as usize - 1).copied()
    }

    /// Foreground labels having at least one pixel inside `bbox`.
    pub fn labels_in(&self, bbox: &IntBBox) -> BTreeSet<u32> {
        let mut found = BTreeSet::new();
        let Some(clipped) = bbox.clip_to(self.height, self.width) else {
            return found;
        };
        for row in clipped.top..clipped.bottom {
            for col in clipped.left..clipped.right {
                let label = self.label_at(row as usize, col as usize);
                if label != 0 {
                    found.insert(label);
                }
            }
        }
        found
    }

    /// Mask of one component cropped to its own tight box.
    pub fn component_mask(&self, label: u32) -> Option<Mask> {
        let bbox = self.bbox_of(label)?;
        let mut mask = Mask::empty(bbox.height(), bbox.width());
        for row in 0..bbox.height() {
            for col in 0..bbox.width() {
                let src_row = bbox.top as usize + row;
                let src_col = bbox.left as usize + col;
                if self.label_at(src_row, src_col) == label {
                    mask.set(row, col, true);
                }
            }
        }
        Some(mask)
    }
}

/// Labels the nonzero pixels of `raster` into connected components.
pub fn label_components(raster: &Raster, connectivity: Connectivity) -> Labeling {
    let (height, width) = raster.shape();
    let mut labels = vec![0u32; height * width];
    let mut bboxes = Vec::new();
    let mut queue = VecDeque::new();

    for start in 0..height * width {
        if raster.data()[start] == 0 || labels[start] != 0 {
            continue;
        }

        let label = bboxes.len() as u32 + 1;
        let (row, col) = ((start / width) as i64, (start % width) as i64);
        let mut bbox = IntBBox::new(row, col, row + 1, col + 1);
        labels[start] = label;
        queue.push_back((row, col));

        while let Some((row, col)) = queue.pop_front() {
            bbox = bbox.union(&IntBBox::new(row, col, row + 1, col + 1));
            for (dr, dc) in connectivity.offsets() {
                let (nr, nc) = (row + dr, col + dc);
                if nr < 0 || nc < 0 || nr as usize >= height || nc as usize >= width {
                    continue;
                }
                let idx = nr as usize * width + nc as usize;
                if raster.data()[idx] != 0 && labels[idx] == 0 {
                    labels[idx] = label;
                    queue.push_back((nr, nc));
                }
            }
        }

        bboxes.push(bbox);
    }

    Labeling {
        height,
        width,
        labels,
        bboxes,
    }
}

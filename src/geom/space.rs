//! Coordinate space marker types.
//!
//! These are zero-sized types (ZSTs) used as type parameters to keep
//! image (model) coordinates and display (widget) coordinates apart at
//! compile time.

use std::fmt;

/// Marker type for model coordinates.
///
/// Model space is the pixel grid of the score image: origin at the
/// top-left corner, rows growing downward.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub enum Model {}

/// Marker type for widget coordinates.
///
/// Widget space is the display surface: origin at the bottom-left corner,
/// rows growing upward, scaled independently on each axis.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub enum Widget {}

impl fmt::Debug for Model {
    fn fmt(&self, _: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {}
    }
}

impl fmt::Debug for Widget {
    fn fmt(&self, _: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {}
    }
}

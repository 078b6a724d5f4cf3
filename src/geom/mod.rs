//! Geometry primitives shared by the annotation model and the selectors.
//!
//! # Design Principles
//!
//! 1. **Type Safety**: points and real-valued boxes carry a zero-sized
//!    marker for their coordinate space, so model (image) and widget
//!    (display) coordinates cannot be mixed by accident.
//!
//! 2. **Integer storage**: marks store integer boxes produced by
//!    [`round_bbox`], which never shrinks the covered area.
//!
//! 3. **Permissive construction**: boxes outside the image are
//!    representable so that validation can report them.

mod bbox;
mod components;
mod coord;
mod raster;
mod region;
mod scaler;
mod space;

pub use bbox::{round_bbox, BBox, IntBBox};
pub use components::{label_components, Connectivity, Labeling};
pub use coord::Coord;
pub use raster::{Mask, Raster};
pub use region::Region;
pub use scaler::Scaler;
pub use space::{Model, Widget};

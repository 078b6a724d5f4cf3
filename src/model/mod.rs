//! The annotation model: marks, the class catalog and the relationship
//! graph between marks.
//!
//! [`AnnotationModel`] is the single owner of this state. Marks and edges
//! are changed only through its methods, which keep the graph and the
//! per-mark link mirrors consistent and notify subscribers after every
//! committed change.

mod annotation;
mod catalog;
mod events;
mod graph;
mod ids;
mod mark;

pub use annotation::AnnotationModel;
pub use catalog::{parse_hex_color, to_hex_color, Catalog, ClassDef};
pub use events::{Listener, ModelEvent};
pub use graph::{EdgeKey, EdgeLabel, Graph};
pub use ids::{ClassId, MarkId};
pub use mark::{mask_overlaps_region, merge_bbox, merge_masks, DataValue, Mark};

//! File formats: mark lists, class lists and score images.

mod class_list_xml;
mod image;
mod mark_list_xml;
mod xml;

pub use self::image::read_grayscale;
pub use class_list_xml::{
    from_class_list_slice, from_class_list_str, read_class_list, to_class_list_string,
    write_class_list,
};
pub use mark_list_xml::{
    disk_xy_to_top_left, from_mark_list_slice, from_mark_list_str, read_mark_list,
    to_mark_list_string, top_left_to_disk_xy, write_mark_list, MarkList, Refs,
};

use std::path::{Path, PathBuf};

use crate::config::Roots;

/// Mark list references turned into paths.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ResolvedRefs {
    pub class_list: Option<PathBuf>,
    pub image: Option<PathBuf>,
}

/// Resolves the references of a mark list read from `mark_list_path`.
///
/// Relative references are looked up under the configured roots first and
/// then next to the mark list.
pub fn resolve_refs(refs: &Refs, mark_list_path: &Path, roots: &Roots) -> ResolvedRefs {
    let base = mark_list_path.parent().unwrap_or(Path::new("."));
    ResolvedRefs {
        class_list: refs
            .class_list
            .as_deref()
            .map(|reference| roots.class_list(reference, base)),
        image: refs
            .image
            .as_deref()
            .map(|reference| roots.image(reference, base)),
    }
}

//! The class catalog: the set of labels marks may carry.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

use super::ids::ClassId;
use crate::error::ScoremarkError;

/// A single class definition.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ClassDef {
    pub class_id: ClassId,
    pub name: String,
    /// Grouping folder inherited from the class list file.
    #[serde(default)]
    pub folder: String,
    /// Display color, each channel in `[0, 1]`.
    pub color: [f32; 3],
}

impl ClassDef {
    /// A class with a white color and no folder.
    pub fn new(class_id: impl Into<ClassId>, name: impl Into<String>) -> Self {
        Self {
            class_id: class_id.into(),
            name: name.into(),
            folder: String::new(),
            color: [1.0, 1.0, 1.0],
        }
    }

    pub fn with_color(mut self, color: [f32; 3]) -> Self {
        self.color = color;
        self
    }

    pub fn with_folder(mut self, folder: impl Into<String>) -> Self {
        self.folder = folder.into();
        self
    }
}

/// Class definitions indexed by id and by name.
///
/// A catalog is immutable once built; loading a new class list replaces
/// the whole catalog.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Catalog {
    by_id: BTreeMap<ClassId, ClassDef>,
    by_name: BTreeMap<String, ClassId>,
}

impl Catalog {
    /// Builds a catalog, rejecting duplicate ids or names.
    pub fn from_defs(defs: Vec<ClassDef>) -> Result<Self, ScoremarkError> {
        let mut catalog = Catalog::default();
        for def in defs {
            if catalog.by_id.contains_key(&def.class_id) {
                return Err(malformed(format!("duplicate class id {}", def.class_id)));
            }
            if catalog.by_name.contains_key(&def.name) {
                return Err(malformed(format!("duplicate class name '{}'", def.name)));
            }
            catalog.by_name.insert(def.name.clone(), def.class_id);
            catalog.by_id.insert(def.class_id, def);
        }
        Ok(catalog)
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }

    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    /// Looks up a class by id.
    pub fn by_id(&self, class_id: ClassId) -> Option<&ClassDef> {
        self.by_id.get(&class_id)
    }

    /// Looks up a class by its exact name.
    pub fn by_name(&self, name: &str) -> Option<&ClassDef> {
        self.by_name.get(name).and_then(|id| self.by_id.get(id))
    }

    pub fn contains(&self, class_id: ClassId) -> bool {
        self.by_id.contains_key(&class_id)
    }

    /// Class definitions in id order.
    pub fn iter(&self) -> impl Iterator<Item = &ClassDef> {
        self.by_id.values()
    }

    /// Class names in lexicographic order; the grammar alphabet.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.by_name.keys().map(String::as_str)
    }
}

fn malformed(message: String) -> ScoremarkError {
    ScoremarkError::MalformedClassList {
        path: PathBuf::from("<catalog>"),
        message,
    }
}

/// Parses a `#RRGGBB` color into channels in `[0, 1]`.
pub fn parse_hex_color(raw: &str) -> Option<[f32; 3]> {
    let hex = raw.trim().strip_prefix('#')?;
    if hex.len() != 6 || !hex.is_ascii() {
        return None;
    }
    let channel = |range: std::ops::Range<usize>| {
        u8::from_str_radix(&hex[range], 16)
            .ok()
            .map(|value| f32::from(value) / 255.0)
    };
    Some([channel(0..2)?, channel(2..4)?, channel(4..6)?])
}

/// Formats channels in `[0, 1]` as `#RRGGBB`.
pub fn to_hex_color(color: [f32; 3]) -> String {
    let [r, g, b] = color.map(|channel| (channel.clamp(0.0, 1.0) * 255.0).round() as u8);
    format!("#{r:02X}{g:02X}{b:02X}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_hex_color_reads_channels() {
        assert_eq!(parse_hex_color("#FF0000"), Some([1.0, 0.0, 0.0]));
        assert_eq!(parse_hex_color(" #000000 "), Some([0.0, 0.0, 0.0]));
        assert_eq!(parse_hex_color("FF0000"), None);
        assert_eq!(parse_hex_color("#FF00"), None);
        assert_eq!(parse_hex_color("#GG0000"), None);
    }

    #[test]
    fn hex_color_round_trips() {
        let color = parse_hex_color("#1A2B3C").expect("color");
        assert_eq!(to_hex_color(color), "#1A2B3C");
    }

    #[test]
    fn catalog_indexes_by_id_and_name() {
        let catalog = Catalog::from_defs(vec![
            ClassDef::new(1u64, "notehead_full"),
            ClassDef::new(2u64, "stem"),
        ])
        .expect("catalog");
        assert_eq!(catalog.len(), 2);
        assert_eq!(
            catalog.by_id(ClassId(2)).map(|c| c.name.as_str()),
            Some("stem")
        );
        assert_eq!(
            catalog.by_name("notehead_full").map(|c| c.class_id),
            Some(ClassId(1))
        );
        let names: Vec<&str> = catalog.names().collect();
        assert_eq!(names, vec!["notehead_full", "stem"]);
    }

    #[test]
    fn catalog_rejects_duplicates() {
        let dup_id = Catalog::from_defs(vec![ClassDef::new(1u64, "a"), ClassDef::new(1u64, "b")]);
        assert!(matches!(
            dup_id,
            Err(ScoremarkError::MalformedClassList { .. })
        ));
        let dup_name = Catalog::from_defs(vec![ClassDef::new(1u64, "a"), ClassDef::new(2u64, "a")]);
        assert!(dup_name.is_err());
    }
}

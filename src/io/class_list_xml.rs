//! Class list XML reader and writer.
//!
//! ```text
//! <ClassList>
//!   <MLClass>
//!     <Id>1</Id> <Name>stem</Name> <Folder>notation</Folder>
//!     <Color>#FF8000</Color>
//!   </MLClass>
//! </ClassList>
//! ```
//!
//! The legacy `<MLClassList>` root and an `<MLClasses>` wrapper around
//! the entries are accepted on read.

use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};

use roxmltree::{Document, Node};

use super::xml::{child_element, child_elements, optional_child_text, xml_escape};
use crate::error::ScoremarkError;
use crate::model::{parse_hex_color, to_hex_color, ClassDef};

const ROOT_TAGS: &[&str] = &["ClassList", "MLClassList"];
const WRAPPER_TAGS: &[&str] = &["MLClasses"];
const CLASS_TAGS: &[&str] = &["MLClass"];

pub fn read_class_list(path: &Path) -> Result<Vec<ClassDef>, ScoremarkError> {
    let xml = fs::read_to_string(path).map_err(ScoremarkError::Io)?;
    parse_class_list_str(&xml, path)
}

pub fn write_class_list(path: &Path, classes: &[ClassDef]) -> Result<(), ScoremarkError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(ScoremarkError::Io)?;
    }
    fs::write(path, build_class_list_xml(classes)).map_err(ScoremarkError::Io)
}

pub fn from_class_list_str(xml: &str) -> Result<Vec<ClassDef>, ScoremarkError> {
    parse_class_list_str(xml, Path::new("<string>"))
}

/// Parses a class list from bytes (must be valid UTF-8).
pub fn from_class_list_slice(bytes: &[u8]) -> Result<Vec<ClassDef>, ScoremarkError> {
    let xml = std::str::from_utf8(bytes).map_err(|source| ScoremarkError::MalformedClassList {
        path: PathBuf::from("<bytes>"),
        message: format!("input is not valid UTF-8: {source}"),
    })?;
    parse_class_list_str(xml, Path::new("<bytes>"))
}

pub fn to_class_list_string(classes: &[ClassDef]) -> String {
    build_class_list_xml(classes)
}

fn parse_class_list_str(xml: &str, path: &Path) -> Result<Vec<ClassDef>, ScoremarkError> {
    let malformed = |message: String| ScoremarkError::MalformedClassList {
        path: path.to_path_buf(),
        message,
    };

    let document = Document::parse(xml).map_err(|source| malformed(source.to_string()))?;
    let root = document.root_element();
    if !ROOT_TAGS.contains(&root.tag_name().name()) {
        return Err(malformed(format!(
            "unexpected root <{}>; expected <ClassList>",
            root.tag_name().name()
        )));
    }
    let holder = child_element(root, WRAPPER_TAGS).unwrap_or(root);

    let classes = child_elements(holder, CLASS_TAGS)
        .enumerate()
        .map(|(idx, node)| parse_class(node, idx).map_err(malformed))
        .collect::<Result<Vec<_>, _>>()?;
    tracing::debug!(path = %path.display(), classes = classes.len(), "read class list");
    Ok(classes)
}

fn parse_class(node: Node<'_, '_>, idx: usize) -> Result<ClassDef, String> {
    let raw_id = optional_child_text(node, &["Id"])
        .ok_or_else(|| format!("missing <Id> in <MLClass> #{idx}"))?;
    let class_id: u64 = raw_id
        .parse()
        .map_err(|_| format!("invalid <Id> value '{raw_id}' in <MLClass> #{idx}"))?;
    let name = optional_child_text(node, &["Name"])
        .ok_or_else(|| format!("missing <Name> in <MLClass> with id {class_id}"))?;

    let mut def = ClassDef::new(class_id, name);
    if let Some(folder) = optional_child_text(node, &["Folder"]) {
        def = def.with_folder(folder);
    }
    if let Some(raw) = optional_child_text(node, &["Color"]) {
        let color = parse_hex_color(&raw)
            .ok_or_else(|| format!("invalid <Color> '{raw}' in <MLClass> with id {class_id}"))?;
        def = def.with_color(color);
    }
    Ok(def)
}

fn build_class_list_xml(classes: &[ClassDef]) -> String {
    let mut xml = String::new();
    writeln!(xml, "<?xml version=\"1.0\" encoding=\"utf-8\"?>").expect("write to string");
    writeln!(xml, "<ClassList>").expect("write to string");
    for def in classes {
        writeln!(xml, "  <MLClass>").expect("write to string");
        writeln!(xml, "    <Id>{}</Id>", def.class_id).expect("write to string");
        writeln!(xml, "    <Name>{}</Name>", xml_escape(&def.name)).expect("write to string");
        writeln!(xml, "    <Folder>{}</Folder>", xml_escape(&def.folder)).expect("write to string");
        writeln!(xml, "    <Color>{}</Color>", to_hex_color(def.color)).expect("write to string");
        writeln!(xml, "  </MLClass>").expect("write to string");
    }
    writeln!(xml, "</ClassList>").expect("write to string");
    xml
}

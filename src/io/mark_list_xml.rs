//! Mark list XML reader and writer.
//!
//! The on-disk layout:
//!
//! ```text
//! <?xml version="1.0" encoding="utf-8"?>
//! <!--Refs: ClassList="classes.xml" image="score.png" -->
//! <MarkList>
//!   <Marks>
//!     <Mark>
//!       <Id>0</Id> <ClassId>3</ClassId> <ClassName>stem</ClassName>
//!       <X>12</X> <Y>40</Y> <Width>2</Width> <Height>30</Height>
//!       <Selected>false</Selected>
//!       <Mask>None</Mask>
//!       <Outlinks>4 5</Outlinks>
//!       <Data><DataItem key="staff" type="int">1</DataItem></Data>
//!     </Mark>
//!   </Marks>
//! </MarkList>
//! ```
//!
//! `<X>` is the horizontal coordinate (the mark's `left`) and `<Y>` the
//! vertical one (its `top`). The conversion lives in
//! [`disk_xy_to_top_left`] and [`top_left_to_disk_xy`] only.
//!
//! Legacy files are accepted: `<MLClassId>`/`<MLClassName>` instead of
//! `<ClassId>`/`<ClassName>`, and the older `CropObjectList` /
//! `CropObjects` / `CropObject` element names.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};

use roxmltree::{Document, Node};

use super::xml::{child_element, child_elements, optional_child_text, xml_escape};
use crate::error::ScoremarkError;
use crate::geom::{IntBBox, Mask};
use crate::model::{DataValue, Mark, MarkId};

const ROOT_TAGS: &[&str] = &["MarkList", "CropObjectList"];
const CONTAINER_TAGS: &[&str] = &["Marks", "CropObjects"];
const MARK_TAGS: &[&str] = &["Mark", "CropObject"];
const CLASS_ID_TAGS: &[&str] = &["ClassId", "MLClassId"];
const CLASS_NAME_TAGS: &[&str] = &["ClassName", "MLClassName"];

/// Files referenced from a mark list header.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Refs {
    pub class_list: Option<String>,
    pub image: Option<String>,
}

/// The contents of a mark list file.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct MarkList {
    pub refs: Refs,
    pub marks: Vec<Mark>,
}

/// On-disk `(X, Y)` to in-memory `(top, left)`.
#[inline]
pub fn disk_xy_to_top_left(x: i64, y: i64) -> (i64, i64) {
    (y, x)
}

/// In-memory `(top, left)` to on-disk `(X, Y)`.
#[inline]
pub fn top_left_to_disk_xy(top: i64, left: i64) -> (i64, i64) {
    (left, top)
}

/// Reads a mark list file.
pub fn read_mark_list(path: &Path) -> Result<MarkList, ScoremarkError> {
    let xml = fs::read_to_string(path).map_err(ScoremarkError::Io)?;
    parse_mark_list_str(&xml, path)
}

/// Writes a mark list file, creating parent directories as needed.
pub fn write_mark_list(path: &Path, list: &MarkList) -> Result<(), ScoremarkError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(ScoremarkError::Io)?;
    }
    fs::write(path, build_mark_list_xml(list)).map_err(ScoremarkError::Io)
}

pub fn from_mark_list_str(xml: &str) -> Result<MarkList, ScoremarkError> {
    parse_mark_list_str(xml, Path::new("<string>"))
}

/// Parses a mark list from bytes (must be valid UTF-8).
pub fn from_mark_list_slice(bytes: &[u8]) -> Result<MarkList, ScoremarkError> {
    let xml = std::str::from_utf8(bytes).map_err(|source| ScoremarkError::MalformedMarkList {
        path: PathBuf::from("<bytes>"),
        message: format!("input is not valid UTF-8: {source}"),
    })?;
    parse_mark_list_str(xml, Path::new("<bytes>"))
}

pub fn to_mark_list_string(list: &MarkList) -> String {
    build_mark_list_xml(list)
}

fn parse_mark_list_str(xml: &str, path: &Path) -> Result<MarkList, ScoremarkError> {
    let malformed = |message: String| ScoremarkError::MalformedMarkList {
        path: path.to_path_buf(),
        message,
    };

    let document = Document::parse(xml).map_err(|source| malformed(source.to_string()))?;
    let root = document.root_element();
    if !ROOT_TAGS.contains(&root.tag_name().name()) {
        return Err(malformed(format!(
            "unexpected root <{}>; expected <MarkList>",
            root.tag_name().name()
        )));
    }

    let refs = document
        .root()
        .descendants()
        .filter(|node| node.is_comment())
        .filter_map(|node| node.text())
        .find_map(parse_refs_comment)
        .unwrap_or_default();

    let mut marks = Vec::new();
    let mut seen = BTreeSet::new();
    if let Some(container) = child_element(root, CONTAINER_TAGS) {
        for (idx, node) in child_elements(container, MARK_TAGS).enumerate() {
            let mark = parse_mark(node, idx).map_err(malformed)?;
            if !seen.insert(mark.id) {
                return Err(malformed(format!("duplicate mark id {}", mark.id)));
            }
            marks.push(mark);
        }
    }

    tracing::debug!(path = %path.display(), marks = marks.len(), "read mark list");
    Ok(MarkList { refs, marks })
}

fn parse_mark(node: Node<'_, '_>, idx: usize) -> Result<Mark, String> {
    let context = format!("<Mark> #{idx}");
    let id: u64 = required_number(node, &["Id"], &context)?;
    let context = format!("<Mark> with id {id}");
    let class_id: u64 = required_number(node, CLASS_ID_TAGS, &context)?;
    let class_name = optional_child_text(node, CLASS_NAME_TAGS).unwrap_or_default();
    let x: i64 = required_number(node, &["X"], &context)?;
    let y: i64 = required_number(node, &["Y"], &context)?;
    let width: usize = required_number(node, &["Width"], &context)?;
    let height: usize = required_number(node, &["Height"], &context)?;

    let (top, left) = disk_xy_to_top_left(x, y);
    let bbox = IntBBox::checked_from_origin_size(top, left, height, width)
        .ok_or_else(|| format!("box of {context} does not fit in 64-bit coordinates"))?;
    let mut mark = Mark::new(id, class_id, class_name, bbox);

    if let Some(mask) = parse_mask(node, height, width, &context)? {
        mark.set_mask(Some(mask)).map_err(|err| err.to_string())?;
    }
    mark.inlinks_mut()
        .extend(parse_id_list(node, "Inlinks", &context)?);
    mark.outlinks_mut()
        .extend(parse_id_list(node, "Outlinks", &context)?);
    mark.data = parse_data(node, &context)?;
    Ok(mark)
}

fn required_number<T: std::str::FromStr>(
    node: Node<'_, '_>,
    tags: &[&str],
    context: &str,
) -> Result<T, String> {
    let raw = optional_child_text(node, tags)
        .ok_or_else(|| format!("missing <{}> in {context}", tags[0]))?;
    raw.parse::<T>()
        .map_err(|_| format!("invalid <{}> value '{raw}' in {context}", tags[0]))
}

fn parse_mask(
    node: Node<'_, '_>,
    height: usize,
    width: usize,
    context: &str,
) -> Result<Option<Mask>, String> {
    let Some(raw) = optional_child_text(node, &["Mask"]) else {
        return Ok(None);
    };
    if raw == "None" {
        return Ok(None);
    }
    let values = raw
        .split_whitespace()
        .map(|token| {
            token
                .parse::<u8>()
                .map_err(|_| format!("invalid mask value '{token}' in {context}"))
        })
        .collect::<Result<Vec<u8>, String>>()?;
    Mask::from_vec(height, width, values)
        .map(Some)
        .map_err(|err| format!("{err} in {context}"))
}

fn parse_id_list(node: Node<'_, '_>, tag: &str, context: &str) -> Result<Vec<MarkId>, String> {
    let Some(raw) = optional_child_text(node, &[tag]) else {
        return Ok(Vec::new());
    };
    raw.split_whitespace()
        .map(|token| {
            token
                .parse::<u64>()
                .map(MarkId)
                .map_err(|_| format!("invalid id '{token}' in <{tag}> of {context}"))
        })
        .collect()
}

fn parse_data(node: Node<'_, '_>, context: &str) -> Result<BTreeMap<String, DataValue>, String> {
    let mut data = BTreeMap::new();
    let Some(container) = child_element(node, &["Data"]) else {
        return Ok(data);
    };
    for item in child_elements(container, &["DataItem"]) {
        let key = item
            .attribute("key")
            .ok_or_else(|| format!("<DataItem> without key in {context}"))?;
        let text = item.text().unwrap_or("");
        let value = match item.attribute("type").unwrap_or("str") {
            "int" => text
                .trim()
                .parse()
                .map(DataValue::Int)
                .map_err(|_| format!("invalid int '{text}' for data key '{key}' in {context}"))?,
            "float" => text
                .trim()
                .parse()
                .map(DataValue::Float)
                .map_err(|_| format!("invalid float '{text}' for data key '{key}' in {context}"))?,
            "str" => DataValue::Str(text.to_string()),
            other => return Err(format!("unknown data type '{other}' in {context}")),
        };
        data.insert(key.to_string(), value);
    }
    Ok(data)
}

/// Reads `Refs: ClassList="..." image="..."`.
fn parse_refs_comment(text: &str) -> Option<Refs> {
    let body = text.trim().strip_prefix("Refs:")?;
    let quoted = |key: &str| -> Option<String> {
        let start = body.find(&format!("{key}=\""))? + key.len() + 2;
        let len = body[start..].find('"')?;
        Some(body[start..start + len].to_string())
    };
    Some(Refs {
        class_list: quoted("ClassList"),
        image: quoted("image"),
    })
}

fn build_mark_list_xml(list: &MarkList) -> String {
    let mut xml = String::new();
    writeln!(xml, "<?xml version=\"1.0\" encoding=\"utf-8\"?>").expect("write to string");
    if let (Some(class_list), Some(image)) = (&list.refs.class_list, &list.refs.image) {
        writeln!(
            xml,
            "<!--Refs: ClassList=\"{}\" image=\"{}\" -->",
            comment_safe(class_list),
            comment_safe(image)
        )
        .expect("write to string");
    }
    writeln!(xml, "<MarkList>").expect("write to string");
    writeln!(xml, "  <Marks>").expect("write to string");

    for mark in &list.marks {
        let (x, y) = top_left_to_disk_xy(mark.top(), mark.left());
        writeln!(xml, "    <Mark>").expect("write to string");
        writeln!(xml, "      <Id>{}</Id>", mark.id).expect("write to string");
        writeln!(xml, "      <ClassId>{}</ClassId>", mark.class_id).expect("write to string");
        writeln!(
            xml,
            "      <ClassName>{}</ClassName>",
            xml_escape(&mark.class_name)
        )
        .expect("write to string");
        writeln!(xml, "      <X>{x}</X>").expect("write to string");
        writeln!(xml, "      <Y>{y}</Y>").expect("write to string");
        writeln!(xml, "      <Width>{}</Width>", mark.width()).expect("write to string");
        writeln!(xml, "      <Height>{}</Height>", mark.height()).expect("write to string");
        writeln!(xml, "      <Selected>false</Selected>").expect("write to string");
        match mark.mask() {
            Some(mask) => {
                let values: Vec<String> = mask.values().iter().map(u8::to_string).collect();
                writeln!(xml, "      <Mask>{}</Mask>", values.join(" ")).expect("write to string");
            }
            None => writeln!(xml, "      <Mask>None</Mask>").expect("write to string"),
        }
        write_id_list(&mut xml, "Inlinks", mark.inlinks());
        write_id_list(&mut xml, "Outlinks", mark.outlinks());

        if !mark.data.is_empty() {
            writeln!(xml, "      <Data>").expect("write to string");
            for (key, value) in &mark.data {
                writeln!(
                    xml,
                    "        <DataItem key=\"{}\" type=\"{}\">{}</DataItem>",
                    xml_escape(key),
                    value.type_name(),
                    xml_escape(&value.to_string())
                )
                .expect("write to string");
            }
            writeln!(xml, "      </Data>").expect("write to string");
        }
        writeln!(xml, "    </Mark>").expect("write to string");
    }

    writeln!(xml, "  </Marks>").expect("write to string");
    writeln!(xml, "</MarkList>").expect("write to string");
    xml
}

fn write_id_list(xml: &mut String, tag: &str, ids: &BTreeSet<MarkId>) {
    if ids.is_empty() {
        return;
    }
    let joined: Vec<String> = ids.iter().map(ToString::to_string).collect();
    writeln!(xml, "      <{tag}>{}</{tag}>", joined.join(" ")).expect("write to string");
}

// A comment may not contain "--" and the refs are quoted.
fn comment_safe(raw: &str) -> String {
    raw.replace("--", "- -").replace('"', "'")
}

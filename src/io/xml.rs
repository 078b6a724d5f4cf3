//! roxmltree lookups and escaping shared by the XML readers and writers.

use roxmltree::Node;

/// First child element with one of the given tag names.
pub(crate) fn child_element<'a, 'input>(
    node: Node<'a, 'input>,
    tags: &[&str],
) -> Option<Node<'a, 'input>> {
    node.children()
        .find(|child| child.is_element() && tags.contains(&child.tag_name().name()))
}

/// Child elements with one of the given tag names, in document order.
pub(crate) fn child_elements<'a, 'input: 'a>(
    node: Node<'a, 'input>,
    tags: &'a [&'a str],
) -> impl Iterator<Item = Node<'a, 'input>> + 'a {
    node.children()
        .filter(move |child| child.is_element() && tags.contains(&child.tag_name().name()))
}

/// Trimmed, non-empty text of the first matching child.
pub(crate) fn optional_child_text(node: Node<'_, '_>, tags: &[&str]) -> Option<String> {
    child_element(node, tags)
        .and_then(|child| child.text())
        .map(str::trim)
        .filter(|text| !text.is_empty())
        .map(ToOwned::to_owned)
}

pub(crate) fn xml_escape(raw: &str) -> String {
    raw.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}

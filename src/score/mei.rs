//! Helpers shared by everything that reads MEI documents.
//!
//! Notes and rests are matched by local name, so documents with or without
//! the MEI namespace declaration read the same way.

use roxmltree::{Document, Node, NodeId};
use std::collections::HashMap;

pub const XML_NS: &str = "http://www.w3.org/XML/1998/namespace";

/// Tag of an element that carries musical time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimedTag {
    Note,
    Rest,
}

impl TimedTag {
    pub fn of(node: Node) -> Option<Self> {
        if !node.is_element() {
            return None;
        }
        match node.tag_name().name() {
            "note" => Some(TimedTag::Note),
            "rest" => Some(TimedTag::Rest),
            _ => None,
        }
    }

    fn label(self) -> &'static str {
        match self {
            TimedTag::Note => "note",
            TimedTag::Rest => "rest",
        }
    }
}

/// `@xml:id` of an element.
pub fn xml_id<'a>(node: Node<'a, '_>) -> Option<&'a str> {
    node.attribute((XML_NS, "id"))
}

/// Local-name check for elements.
pub fn is(node: Node, name: &str) -> bool {
    node.is_element() && node.tag_name().name() == name
}

/// Identifier of every note and rest in document order.
///
/// Elements without `@xml:id` get `{tag}-gen{ordinal}`, where `ordinal`
/// counts notes and rests in document order. The scheme is deterministic,
/// so a timing pass and a later measure lookup over the same markup agree
/// on generated identifiers.
pub fn element_ids(doc: &Document) -> HashMap<NodeId, String> {
    doc.descendants()
        .filter_map(|node| TimedTag::of(node).map(|tag| (node, tag)))
        .enumerate()
        .map(|(ordinal, (node, tag))| {
            let id = match xml_id(node) {
                Some(id) => id.to_string(),
                None => format!("{}-gen{ordinal}", tag.label()),
            };
            (node.id(), id)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_ids_fill_gaps_only() {
        let xml = r#"<mei xmlns="http://www.music-encoding.org/ns/mei">
            <layer><note xml:id="a"/><rest/><clef/><note/></layer></mei>"#;
        let doc = Document::parse(xml).unwrap();
        let ids = element_ids(&doc);
        let mut values: Vec<_> = ids.values().cloned().collect();
        values.sort();
        assert_eq!(values, vec!["a", "note-gen2", "rest-gen1"]);
    }

    #[test]
    fn timed_tag_ignores_other_elements() {
        let doc = Document::parse("<layer><chord/><note/></layer>").unwrap();
        let tags: Vec<_> = doc.descendants().filter_map(TimedTag::of).collect();
        assert_eq!(tags, vec![TimedTag::Note]);
    }
}

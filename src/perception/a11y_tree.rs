//! Accessibility tree ingestion.
//!
//! The platform exporters hand the tree over as an XML document whose state
//! and geometry live in namespaced attributes. This module turns it into an
//! owned `RawTreeNode` hierarchy so the filter can prune it freely.
use crate::errors::{DeskGroundError, DeskGroundResult};
use crate::perception::types::{qualified, RawTreeNode};

/// Parse an XML accessibility tree. Any XML error is reported as
/// `TreeMalformed`.
pub fn parse_tree(xml: &str) -> DeskGroundResult<RawTreeNode> {
    let doc = roxmltree::Document::parse(xml)
        .map_err(|e| DeskGroundError::TreeMalformed(e.to_string()))?;
    Ok(convert(doc.root_element()))
}

fn convert(node: roxmltree::Node<'_, '_>) -> RawTreeNode {
    let tag = match node.tag_name().namespace() {
        Some(ns) => qualified(ns, node.tag_name().name()),
        None => node.tag_name().name().to_string(),
    };

    let attributes = node
        .attributes()
        .map(|a| {
            let key = match a.namespace() {
                Some(ns) => qualified(ns, a.name()),
                None => a.name().to_string(),
            };
            (key, a.value().to_string())
        })
        .collect();

    RawTreeNode {
        tag,
        attributes,
        text: node.text().map(str::to_string),
        children: node
            .children()
            .filter(|c| c.is_element())
            .map(convert)
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::perception::types::Platform;

    const TREE: &str = r#"<?xml version="1.0"?>
<desktop-frame xmlns:st="https://accessibility.ubuntu.example.org/ns/state"
               xmlns:cp="https://accessibility.ubuntu.example.org/ns/component">
  <application name="gedit">
    <frame name="Untitled" st:active="true">
      <push-button name="Save" st:showing="true" cp:screencoord="(10, 20)" cp:size="(30, 40)">label</push-button>
    </frame>
  </application>
</desktop-frame>"#;

    #[test]
    fn test_parse_namespaced_attributes() {
        let ns = Platform::Ubuntu.namespaces();
        let root = parse_tree(TREE).unwrap();
        assert_eq!(root.tag, "desktop-frame");
        let app = &root.children[0];
        assert_eq!(app.name(), "gedit");
        let frame = &app.children[0];
        assert!(frame.flag(ns.state, "active"));
        let button = &frame.children[0];
        assert_eq!(button.tag, "push-button");
        assert_eq!(button.ns_attr(ns.component, "screencoord"), Some("(10, 20)"));
        assert_eq!(button.text.as_deref(), Some("label"));
    }

    #[test]
    fn test_text_is_none_without_leading_text() {
        let root = parse_tree("<root><child/></root>").unwrap();
        assert_eq!(root.text, None);
        assert_eq!(root.children.len(), 1);
    }

    #[test]
    fn test_malformed_xml_is_tree_malformed() {
        let err = parse_tree("<root><unclosed></root>").unwrap_err();
        assert!(matches!(err, DeskGroundError::TreeMalformed(_)));
    }
}

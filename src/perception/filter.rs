//! Accessibility tree filtering.
//!
//! Two passes: first drop every top-level application that is not in the
//! foreground, then admit individual nodes that are visible, carry some
//! content and have usable on-screen geometry.
use std::sync::LazyLock;

use regex::Regex;

use crate::errors::{DeskGroundError, DeskGroundResult};
use crate::perception::types::{Platform, RawTreeNode};

/// Application kept alongside whatever is active (panels, notifications).
pub const SHELL_APPLICATION: &str = "gnome-shell";

/// Applications kept when nothing reports itself as active.
pub const FALLBACK_APPLICATIONS: &[&str] = &["gjs", "gnome-shell"];

const TAG_SUFFIXES: &[&str] = &[
    "item",
    "button",
    "heading",
    "label",
    "scrollbar",
    "searchbox",
    "textbox",
    "link",
    "tabelement",
    "textfield",
    "textarea",
    "menu",
];

const TAG_EXACT: &[&str] = &[
    "alert",
    "canvas",
    "check-box",
    "combo-box",
    "entry",
    "icon",
    "image",
    "paragraph",
    "scroll-bar",
    "section",
    "slider",
    "static",
    "table-cell",
    "terminal",
    "text",
    // Windows shell chrome
    "netuiribbontab",
    "start",
    "trayclockwclass",
    "traydummysearchcontrol",
    "uiimage",
    "uiproperty",
    "uiribboncommandbar",
];

static PAIR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*\(\s*(-?\d+)\s*,\s*(-?\d+)\s*\)\s*$").expect("pair regex compilation failed"));

/// Parse an integer pair such as `(12, -3)`.
pub fn parse_pair(raw: &str) -> DeskGroundResult<(i64, i64)> {
    let caps = PAIR_RE
        .captures(raw)
        .ok_or_else(|| DeskGroundError::NodeGeometryInvalid(format!("not a pair: {raw:?}")))?;
    let a = caps[1]
        .parse::<i64>()
        .map_err(|e| DeskGroundError::NodeGeometryInvalid(e.to_string()))?;
    let b = caps[2]
        .parse::<i64>()
        .map_err(|e| DeskGroundError::NodeGeometryInvalid(e.to_string()))?;
    Ok((a, b))
}

/// Names of the applications to keep: every application with an active frame
/// plus the shell, or the fallback set when none is active.
pub fn find_active_applications(root: &RawTreeNode, platform: Platform) -> Vec<String> {
    let state_ns = platform.namespaces().state;
    let mut active: Vec<String> = Vec::new();
    for application in &root.children {
        for frame in &application.children {
            if frame.flag(state_ns, "active") {
                active.push(application.name().to_string());
            }
        }
    }

    if active.is_empty() {
        FALLBACK_APPLICATIONS.iter().map(|s| s.to_string()).collect()
    } else {
        active.push(SHELL_APPLICATION.to_string());
        active
    }
}

/// Remove every top-level application subtree that is not in the keep list.
/// Returns the keep list that was applied.
pub fn prune_inactive_applications(root: &mut RawTreeNode, platform: Platform) -> Vec<String> {
    let keep = find_active_applications(root, platform);
    let before = root.children.len();
    root.children
        .retain(|app| app.attr("name").is_some_and(|name| keep.iter().any(|k| k == name)));
    tracing::debug!(
        kept = root.children.len(),
        dropped = before - root.children.len(),
        keep = ?keep,
        "pruned inactive applications"
    );
    keep
}

fn tag_allowed(tag: &str) -> bool {
    tag.starts_with("document")
        || TAG_SUFFIXES.iter().any(|s| tag.ends_with(s))
        || TAG_EXACT.contains(&tag)
}

fn is_visible(node: &RawTreeNode, platform: Platform) -> bool {
    let state_ns = platform.namespaces().state;
    match platform {
        Platform::Ubuntu => node.flag(state_ns, "showing") && node.flag(state_ns, "visible"),
        Platform::Windows => node.flag(state_ns, "visible"),
    }
}

fn has_content(node: &RawTreeNode, check_image: bool) -> bool {
    !node.name().is_empty()
        || node.text.as_deref().is_some_and(|t| !t.is_empty())
        || (check_image && node.attr("image") == Some("true"))
}

fn has_geometry(node: &RawTreeNode, platform: Platform) -> DeskGroundResult<bool> {
    let component_ns = platform.namespaces().component;
    let (x, y) = parse_pair(node.ns_attr(component_ns, "screencoord").unwrap_or("(-1, -1)"))?;
    let (w, h) = parse_pair(node.ns_attr(component_ns, "size").unwrap_or("(-1, -1)"))?;
    Ok(x >= 0 && y >= 0 && w > 0 && h > 0)
}

/// Decide whether a single node belongs in the linearized view.
///
/// A node whose geometry attributes cannot be parsed is rejected rather than
/// failing the pass.
pub fn judge_node(node: &RawTreeNode, platform: Platform, check_image: bool) -> bool {
    if !(tag_allowed(&node.tag) && is_visible(node, platform) && has_content(node, check_image)) {
        return false;
    }
    match has_geometry(node, platform) {
        Ok(ok) => ok,
        Err(e) => {
            tracing::debug!(tag = %node.tag, error = %e, "node skipped");
            false
        }
    }
}

/// All admitted nodes in document order, root included.
pub fn filter_nodes(root: &RawTreeNode, platform: Platform, check_image: bool) -> Vec<&RawTreeNode> {
    root.iter()
        .filter(|node| judge_node(node, platform, check_image))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn visible_button(name: &str, coord: &str, size: &str) -> RawTreeNode {
        let ns = Platform::Ubuntu.namespaces();
        RawTreeNode::new("push-button")
            .with_attr("name", name)
            .with_ns_attr(ns.state, "showing", "true")
            .with_ns_attr(ns.state, "visible", "true")
            .with_ns_attr(ns.component, "screencoord", coord)
            .with_ns_attr(ns.component, "size", size)
    }

    fn application(name: &str, active: bool) -> RawTreeNode {
        let ns = Platform::Ubuntu.namespaces();
        let frame = RawTreeNode::new("frame")
            .with_ns_attr(ns.state, "active", if active { "true" } else { "false" });
        RawTreeNode::new("application")
            .with_attr("name", name)
            .with_child(frame)
    }

    #[test]
    fn test_judge_node_accepts_visible_named_button() {
        let node = visible_button("OK", "(10, 10)", "(20, 20)");
        assert!(judge_node(&node, Platform::Ubuntu, false));
    }

    #[test]
    fn test_judge_node_rejects_unknown_tag() {
        let mut node = visible_button("OK", "(10, 10)", "(20, 20)");
        node.tag = "panel".into();
        assert!(!judge_node(&node, Platform::Ubuntu, false));
    }

    #[test]
    fn test_judge_node_tag_rules() {
        assert!(tag_allowed("document-web"));
        assert!(tag_allowed("menu-item"));
        assert!(tag_allowed("table-cell"));
        assert!(tag_allowed("trayclockwclass"));
        assert!(!tag_allowed("filler"));
    }

    #[test]
    fn test_ubuntu_requires_showing_and_visible() {
        let ns = Platform::Ubuntu.namespaces();
        let mut node = visible_button("OK", "(10, 10)", "(20, 20)");
        node.attributes
            .insert(crate::perception::types::qualified(ns.state, "showing"), "false".into());
        assert!(!judge_node(&node, Platform::Ubuntu, false));
    }

    #[test]
    fn test_windows_requires_only_visible() {
        let ns = Platform::Windows.namespaces();
        let node = RawTreeNode::new("button")
            .with_attr("name", "Start")
            .with_ns_attr(ns.state, "visible", "true")
            .with_ns_attr(ns.component, "screencoord", "(0, 0)")
            .with_ns_attr(ns.component, "size", "(5, 5)");
        assert!(judge_node(&node, Platform::Windows, false));
    }

    #[test]
    fn test_content_rules() {
        let mut node = visible_button("", "(10, 10)", "(20, 20)");
        assert!(!judge_node(&node, Platform::Ubuntu, false));

        node.attributes.insert("image".into(), "true".into());
        assert!(!judge_node(&node, Platform::Ubuntu, false));
        assert!(judge_node(&node, Platform::Ubuntu, true));

        node.attributes.remove("image");
        node.text = Some("caption".into());
        assert!(judge_node(&node, Platform::Ubuntu, false));
    }

    #[test]
    fn test_geometry_rules() {
        assert!(!judge_node(&visible_button("a", "(-1, 10)", "(20, 20)"), Platform::Ubuntu, false));
        assert!(!judge_node(&visible_button("a", "(10, 10)", "(0, 20)"), Platform::Ubuntu, false));
        assert!(judge_node(&visible_button("a", "(0, 0)", "(1, 1)"), Platform::Ubuntu, false));
    }

    #[test]
    fn test_unparseable_geometry_skips_node() {
        let bad = visible_button("a", "garbage", "(20, 20)");
        assert!(!judge_node(&bad, Platform::Ubuntu, false));

        let root = RawTreeNode::new("root")
            .with_child(bad)
            .with_child(visible_button("b", "(1, 1)", "(2, 2)"));
        let kept = filter_nodes(&root, Platform::Ubuntu, false);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].name(), "b");
    }

    #[test]
    fn test_active_applications_plus_shell() {
        let root = RawTreeNode::new("desktop-frame")
            .with_child(application("gedit", true))
            .with_child(application("nautilus", false));
        assert_eq!(
            find_active_applications(&root, Platform::Ubuntu),
            vec!["gedit".to_string(), "gnome-shell".to_string()]
        );
    }

    #[test]
    fn test_fallback_when_nothing_active() {
        let root = RawTreeNode::new("desktop-frame").with_child(application("gedit", false));
        assert_eq!(
            find_active_applications(&root, Platform::Ubuntu),
            vec!["gjs".to_string(), "gnome-shell".to_string()]
        );
    }

    #[test]
    fn test_prune_removes_inactive_subtrees() {
        let mut root = RawTreeNode::new("desktop-frame")
            .with_child(application("gedit", true))
            .with_child(application("nautilus", false))
            .with_child(application("gnome-shell", false))
            .with_child(RawTreeNode::new("application"));
        prune_inactive_applications(&mut root, Platform::Ubuntu);
        let names: Vec<&str> = root.children.iter().map(|a| a.name()).collect();
        assert_eq!(names, vec!["gedit", "gnome-shell"]);
    }

    #[test]
    fn test_parse_pair() {
        assert_eq!(parse_pair("(3, 4)").unwrap(), (3, 4));
        assert_eq!(parse_pair("(-1,-1)").unwrap(), (-1, -1));
        assert!(parse_pair("(3; 4)").is_err());
    }
}

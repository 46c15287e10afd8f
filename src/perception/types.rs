use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

/// Accessibility backend that produced the tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum Platform {
    #[default]
    Ubuntu,
    Windows,
}

/// Attribute namespaces used by one platform's accessibility export.
#[derive(Debug, Clone, Copy)]
pub struct PlatformNamespaces {
    pub attributes: &'static str,
    pub state: &'static str,
    pub component: &'static str,
    pub value: &'static str,
}

// The Ubuntu export reuses the Windows attributes namespace; only state,
// component and value differ between the two.
const UBUNTU_NAMESPACES: PlatformNamespaces = PlatformNamespaces {
    attributes: "https://accessibility.windows.example.org/ns/attributes",
    state: "https://accessibility.ubuntu.example.org/ns/state",
    component: "https://accessibility.ubuntu.example.org/ns/component",
    value: "https://accessibility.ubuntu.example.org/ns/value",
};

const WINDOWS_NAMESPACES: PlatformNamespaces = PlatformNamespaces {
    attributes: "https://accessibility.windows.example.org/ns/attributes",
    state: "https://accessibility.windows.example.org/ns/state",
    component: "https://accessibility.windows.example.org/ns/component",
    value: "https://accessibility.windows.example.org/ns/value",
};

impl Platform {
    pub fn namespaces(self) -> PlatformNamespaces {
        match self {
            Platform::Ubuntu => UBUNTU_NAMESPACES,
            Platform::Windows => WINDOWS_NAMESPACES,
        }
    }
}

/// Physical screen dimensions in pixels. Serialized as `[width, height]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "[u32; 2]", into = "[u32; 2]")]
pub struct ScreenSize {
    pub width: u32,
    pub height: u32,
}

impl ScreenSize {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

impl Default for ScreenSize {
    fn default() -> Self {
        Self::new(1920, 1080)
    }
}

impl From<[u32; 2]> for ScreenSize {
    fn from([width, height]: [u32; 2]) -> Self {
        Self { width, height }
    }
}

impl From<ScreenSize> for [u32; 2] {
    fn from(size: ScreenSize) -> Self {
        [size.width, size.height]
    }
}

/// Unit system shared by the linearized tree and the model's actions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CoordinateMode {
    /// Fractions of the screen in `[0, 1]`, converted to pixels at execution time.
    Relative,
    /// Screen pixels.
    Absolute,
}

impl CoordinateMode {
    pub fn from_relative_flag(relative: bool) -> Self {
        if relative {
            CoordinateMode::Relative
        } else {
            CoordinateMode::Absolute
        }
    }

    pub fn is_relative(self) -> bool {
        matches!(self, CoordinateMode::Relative)
    }
}

/// One element of the raw accessibility tree.
///
/// Namespaced attributes are keyed as `{namespace}local`, plain ones by their
/// bare name.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawTreeNode {
    pub tag: String,
    pub attributes: HashMap<String, String>,
    pub text: Option<String>,
    pub children: Vec<RawTreeNode>,
}

impl RawTreeNode {
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            ..Self::default()
        }
    }

    pub fn with_attr(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    pub fn with_ns_attr(self, ns: &str, local: &str, value: impl Into<String>) -> Self {
        self.with_attr(qualified(ns, local), value)
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    pub fn with_child(mut self, child: RawTreeNode) -> Self {
        self.children.push(child);
        self
    }

    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(String::as_str)
    }

    pub fn ns_attr(&self, ns: &str, local: &str) -> Option<&str> {
        self.attr(&qualified(ns, local))
    }

    /// `true` when the namespaced flag is literally `"true"`.
    pub fn flag(&self, ns: &str, local: &str) -> bool {
        self.ns_attr(ns, local) == Some("true")
    }

    pub fn name(&self) -> &str {
        self.attr("name").unwrap_or("")
    }

    /// Pre-order traversal including `self`.
    pub fn iter(&self) -> impl Iterator<Item = &RawTreeNode> {
        let mut stack = vec![self];
        std::iter::from_fn(move || {
            let node = stack.pop()?;
            stack.extend(node.children.iter().rev());
            Some(node)
        })
    }
}

pub fn qualified(ns: &str, local: &str) -> String {
    format!("{{{ns}}}{local}")
}

/// A node admitted by the tree filter, with geometry already parsed.
#[derive(Debug, Clone, PartialEq)]
pub struct FilteredNode {
    pub tag: String,
    pub text: String,
    /// Absolute centre in pixels.
    pub center: (i64, i64),
    /// Absolute size in pixels.
    pub size: (i64, i64),
}

/// A value in a linear record, either pixels or a screen fraction.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Unit {
    Pixels(i64),
    Fraction(f64),
}

impl Unit {
    pub fn value(self) -> f64 {
        match self {
            Unit::Pixels(v) => v as f64,
            Unit::Fraction(v) => v,
        }
    }
}

/// One row of the linearized tree table.
#[derive(Debug, Clone, PartialEq)]
pub struct LinearRecord {
    pub tag: String,
    pub text: String,
    pub center: (Unit, Unit),
    pub size: (Unit, Unit),
}

/// A window listed in the observation, keyed by window id.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppWindow {
    pub app_name: String,
    pub title: String,
}

/// Everything the environment hands over for one step.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Observation {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub screenshot: Option<Vec<u8>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub previous_screenshot: Option<Vec<u8>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub accessibility_tree: Option<String>,
    #[serde(default)]
    pub apps: BTreeMap<String, AppWindow>,
    #[serde(default)]
    pub cur_window_id: String,
    #[serde(default)]
    pub cur_app: String,
    #[serde(default)]
    pub app_info: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exe_result: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_iter_is_preorder() {
        let tree = RawTreeNode::new("root")
            .with_child(RawTreeNode::new("a").with_child(RawTreeNode::new("a1")))
            .with_child(RawTreeNode::new("b"));
        let tags: Vec<&str> = tree.iter().map(|n| n.tag.as_str()).collect();
        assert_eq!(tags, vec!["root", "a", "a1", "b"]);
    }

    #[test]
    fn test_namespaced_flag() {
        let ns = Platform::Ubuntu.namespaces();
        let node = RawTreeNode::new("button").with_ns_attr(ns.state, "visible", "true");
        assert!(node.flag(ns.state, "visible"));
        assert!(!node.flag(ns.state, "showing"));
    }

    #[test]
    fn test_screen_size_serde_as_pair() {
        let size: ScreenSize = serde_json::from_str("[1280, 720]").unwrap();
        assert_eq!(size, ScreenSize::new(1280, 720));
        assert_eq!(serde_json::to_string(&size).unwrap(), "[1280,720]");
    }

    #[test]
    fn test_platform_attribute_namespace_is_shared() {
        assert_eq!(
            Platform::Ubuntu.namespaces().attributes,
            Platform::Windows.namespaces().attributes
        );
        assert_ne!(
            Platform::Ubuntu.namespaces().state,
            Platform::Windows.namespaces().state
        );
    }
}

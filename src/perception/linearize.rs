//! Linearization of filtered accessibility nodes into a tab-separated table.
//!
//! Row format: `tag\ttext\t(cx, cy)\t(w, h)`, where the centre and size are
//! either screen pixels or screen fractions rounded to three decimals.
use std::sync::LazyLock;

use regex::Regex;

use crate::errors::{DeskGroundError, DeskGroundResult};
use crate::perception::types::{
    CoordinateMode, FilteredNode, LinearRecord, Platform, RawTreeNode, ScreenSize, Unit,
};

/// First line of every linearized tree.
pub const HEADER: &str = "tag\ttext\tposition (center x & y)\tsize (w & h)";

static GEOMETRY_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\((\d+), (\d+)\)").expect("geometry regex compilation failed"));

fn parse_geometry(raw: &str) -> DeskGroundResult<(i64, i64)> {
    let caps = GEOMETRY_RE
        .captures(raw)
        .ok_or_else(|| DeskGroundError::NodeGeometryInvalid(format!("bad geometry {raw:?}")))?;
    let a = caps[1]
        .parse()
        .map_err(|e: std::num::ParseIntError| DeskGroundError::NodeGeometryInvalid(e.to_string()))?;
    let b = caps[2]
        .parse()
        .map_err(|e: std::num::ParseIntError| DeskGroundError::NodeGeometryInvalid(e.to_string()))?;
    Ok((a, b))
}

/// Text shown for a node: its text, else its name, or `name (text)` when both
/// are present and differ. Newlines are escaped so a record stays on one line.
pub fn display_text(node: &RawTreeNode) -> String {
    let text = node.text.as_deref().unwrap_or("").trim();
    let name = node.name().trim();
    let combined = if text.is_empty() {
        name.to_string()
    } else if !name.is_empty() && text != name {
        format!("{name} ({text})")
    } else {
        text.to_string()
    };
    combined.replace('\n', "\\n")
}

impl FilteredNode {
    /// Derive the absolute geometry of an admitted node.
    pub fn from_raw(node: &RawTreeNode, platform: Platform) -> DeskGroundResult<Self> {
        let component_ns = platform.namespaces().component;
        let (x, y) = parse_geometry(node.ns_attr(component_ns, "screencoord").unwrap_or(""))?;
        let (w, h) = parse_geometry(node.ns_attr(component_ns, "size").unwrap_or(""))?;
        Ok(Self {
            tag: node.tag.clone(),
            text: display_text(node),
            center: (x + w / 2, y + h / 2),
            size: (w, h),
        })
    }
}

/// Round to three decimals and keep inside the unit interval.
pub fn to_fraction(pixels: i64, extent: u32) -> f64 {
    let extent = extent.max(1) as f64;
    ((pixels as f64 / extent * 1000.0).round() / 1000.0).clamp(0.0, 1.0)
}

/// Inverse of [`to_fraction`] as performed at execution time (`int(rel * extent)`).
pub fn to_pixels(fraction: f64, extent: u32) -> i64 {
    (fraction * extent as f64).floor() as i64
}

/// Render a unit the way the table has always shown it: integers for pixels,
/// shortest decimal with at least one fractional digit for fractions.
pub fn format_unit(unit: Unit) -> String {
    match unit {
        Unit::Pixels(v) => v.to_string(),
        Unit::Fraction(v) => format_float(v),
    }
}

pub(crate) fn format_float(v: f64) -> String {
    if v.fract() == 0.0 && v.is_finite() {
        format!("{v:.1}")
    } else {
        format!("{v}")
    }
}

impl LinearRecord {
    pub fn from_filtered(node: &FilteredNode, mode: CoordinateMode, screen: ScreenSize) -> Self {
        let (center, size) = match mode {
            CoordinateMode::Relative => (
                (
                    Unit::Fraction(to_fraction(node.center.0, screen.width)),
                    Unit::Fraction(to_fraction(node.center.1, screen.height)),
                ),
                (
                    Unit::Fraction(to_fraction(node.size.0, screen.width)),
                    Unit::Fraction(to_fraction(node.size.1, screen.height)),
                ),
            ),
            CoordinateMode::Absolute => (
                (Unit::Pixels(node.center.0), Unit::Pixels(node.center.1)),
                (Unit::Pixels(node.size.0), Unit::Pixels(node.size.1)),
            ),
        };
        Self {
            tag: node.tag.clone(),
            text: node.text.clone(),
            center,
            size,
        }
    }

    pub fn to_line(&self) -> String {
        format!(
            "{}\t{}\t({}, {})\t({}, {})",
            self.tag,
            self.text,
            format_unit(self.center.0),
            format_unit(self.center.1),
            format_unit(self.size.0),
            format_unit(self.size.1),
        )
    }
}

/// Header plus one row per node. Nodes whose geometry cannot be read are
/// skipped.
pub fn linearize_nodes(
    nodes: &[&RawTreeNode],
    platform: Platform,
    mode: CoordinateMode,
    screen: ScreenSize,
) -> Vec<String> {
    let mut lines = Vec::with_capacity(nodes.len() + 1);
    lines.push(HEADER.to_string());
    for node in nodes {
        match FilteredNode::from_raw(node, platform) {
            Ok(filtered) => lines.push(LinearRecord::from_filtered(&filtered, mode, screen).to_line()),
            Err(e) => tracing::debug!(tag = %node.tag, error = %e, "skipping node during linearization"),
        }
    }
    lines
}

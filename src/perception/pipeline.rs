//! Perception pipeline: turns a raw XML accessibility tree into the
//! deduplicated table the prompt carries.
//!
//! 1. Parse the XML into an owned tree.
//! 2. Prune applications that are not in the foreground.
//! 3. Admit visible, labelled nodes with usable geometry.
//! 4. Linearize into `tag / text / centre / size` rows.
//! 5. Suppress near-duplicate rows.
//!
//! A tree that cannot be parsed yields an empty string; the step continues
//! without it.
use crate::perception::a11y_tree::parse_tree;
use crate::perception::dedup::filter_similar_nodes;
use crate::perception::filter::{filter_nodes, prune_inactive_applications};
use crate::perception::linearize::linearize_nodes;
use crate::perception::types::{CoordinateMode, Platform, ScreenSize};

/// Options for one linearization pass.
#[derive(Debug, Clone, Copy)]
pub struct LinearizeOptions {
    pub platform: Platform,
    pub mode: CoordinateMode,
    pub screen: ScreenSize,
    /// Keep nameless nodes flagged as images.
    pub check_image: bool,
}

impl Default for LinearizeOptions {
    fn default() -> Self {
        Self {
            platform: Platform::Ubuntu,
            mode: CoordinateMode::Relative,
            screen: ScreenSize::default(),
            check_image: true,
        }
    }
}

pub fn linearize_accessibility_tree(xml: &str, opts: &LinearizeOptions) -> String {
    let mut root = match parse_tree(xml) {
        Ok(root) => root,
        Err(e) => {
            tracing::warn!(error = %e, "accessibility tree unusable, continuing without it");
            return String::new();
        }
    };

    prune_inactive_applications(&mut root, opts.platform);
    let nodes = filter_nodes(&root, opts.platform, opts.check_image);
    let lines = linearize_nodes(&nodes, opts.platform, opts.mode, opts.screen);
    tracing::debug!(nodes = nodes.len(), rows = lines.len() - 1, "accessibility tree linearized");

    filter_similar_nodes(&lines.join("\n"))
}

//! Near-duplicate suppression for linearized accessibility records.
//!
//! Two records are duplicates when their boxes overlap with IoU above
//! [`IOU_THRESHOLD`] and their normalised texts are identical. The pass is a
//! single forward sweep: the earliest record of a pair wins, and suppression is
//! not transitive.
use std::sync::LazyLock;

use regex::Regex;

pub const IOU_THRESHOLD: f64 = 0.2;

static LINE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^(\S+)\s+(.+?)\s+\((\d+(?:\.\d+)?),\s*(\d+(?:\.\d+)?)\)\s+\((\d+(?:\.\d+)?),\s*(\d+(?:\.\d+)?)\)",
    )
    .expect("record regex compilation failed")
});

/// Axis-aligned box `(x1, y1, x2, y2)`.
pub type BBox = [f64; 4];

/// A record recovered from its text form.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedRecord {
    pub tag: String,
    pub text: String,
    pub center: (f64, f64),
    pub size: (f64, f64),
    pub bbox: BBox,
}

/// Parse one table row. Returns `None` for the header and any other line that
/// does not look like a record.
pub fn parse_line(line: &str) -> Option<ParsedRecord> {
    let caps = LINE_RE.captures(line)?;
    let num = |i: usize| caps[i].parse::<f64>().ok();
    let (cx, cy, w, h) = (num(3)?, num(4)?, num(5)?, num(6)?);
    Some(ParsedRecord {
        tag: caps[1].to_string(),
        text: caps[2].trim().to_string(),
        center: (cx, cy),
        size: (w, h),
        bbox: [cx - w / 2.0, cy - h / 2.0, cx + w / 2.0, cy + h / 2.0],
    })
}

/// Intersection over union. A zero-area union yields `0.0`.
pub fn iou(a: &BBox, b: &BBox) -> f64 {
    let ix1 = a[0].max(b[0]);
    let iy1 = a[1].max(b[1]);
    let ix2 = a[2].min(b[2]);
    let iy2 = a[3].min(b[3]);
    let inter = (ix2 - ix1).max(0.0) * (iy2 - iy1).max(0.0);
    let area_a = (a[2] - a[0]) * (a[3] - a[1]);
    let area_b = (b[2] - b[0]) * (b[3] - b[1]);
    let union = area_a + area_b - inter;
    if union <= 0.0 {
        0.0
    } else {
        inter / union
    }
}

/// Lowercase with all whitespace removed.
pub fn norm_text(s: &str) -> String {
    s.to_lowercase().chars().filter(|c| !c.is_whitespace()).collect()
}

fn is_duplicate(a: &ParsedRecord, b: &ParsedRecord) -> bool {
    iou(&a.bbox, &b.bbox) > IOU_THRESHOLD && norm_text(&a.text) == norm_text(&b.text)
}

/// Drop near-duplicate records from a linearized tree, keeping blank-free
/// lines in their original order. Lines that do not parse always survive.
pub fn filter_similar_nodes(linearized: &str) -> String {
    let lines: Vec<&str> = linearized.split('\n').filter(|l| !l.trim().is_empty()).collect();
    let parsed: Vec<Option<ParsedRecord>> = lines.iter().map(|l| parse_line(l)).collect();
    let mut removed = vec![false; lines.len()];

    for i in 0..lines.len() {
        let Some(ni) = &parsed[i] else { continue };
        if removed[i] {
            continue;
        }
        for j in (i + 1)..lines.len() {
            if let Some(nj) = &parsed[j] {
                if is_duplicate(ni, nj) {
                    removed[j] = true;
                }
            }
        }
    }

    let dropped = removed.iter().filter(|r| **r).count();
    if dropped > 0 {
        tracing::debug!(dropped, total = lines.len(), "suppressed duplicate records");
    }

    lines
        .iter()
        .zip(&removed)
        .filter(|(_, removed)| !**removed)
        .map(|(line, _)| *line)
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::perception::linearize::HEADER;

    #[test]
    fn test_iou_identity_and_disjoint() {
        let a = [0.0, 0.0, 10.0, 10.0];
        let b = [20.0, 20.0, 30.0, 30.0];
        assert_eq!(iou(&a, &a), 1.0);
        assert_eq!(iou(&a, &b), 0.0);
    }

    #[test]
    fn test_iou_zero_union_is_zero() {
        let p = [5.0, 5.0, 5.0, 5.0];
        assert_eq!(iou(&p, &p), 0.0);
    }

    #[test]
    fn test_iou_half_overlap() {
        // Same height, shifted by a third of the width: inter 20x30, union 40x30.
        let a = [0.0, 0.0, 30.0, 30.0];
        let b = [10.0, 0.0, 40.0, 30.0];
        assert!((iou(&a, &b) - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_parse_line_recovers_geometry() {
        let rec = parse_line("push-button\tSave file\t(450, 425)\t(100, 50)").unwrap();
        assert_eq!(rec.tag, "push-button");
        assert_eq!(rec.text, "Save file");
        assert_eq!(rec.center, (450.0, 425.0));
        assert_eq!(rec.size, (100.0, 50.0));
        assert_eq!(rec.bbox, [400.0, 400.0, 500.0, 450.0]);
    }

    #[test]
    fn test_parse_line_accepts_fractions() {
        let rec = parse_line("label\tName\t(0.5, 0.25)\t(0.1, 0.05)").unwrap();
        assert_eq!(rec.center, (0.5, 0.25));
        assert!((rec.bbox[0] - 0.45).abs() < 1e-9);
    }

    #[test]
    fn test_header_is_not_a_record() {
        assert!(parse_line(HEADER).is_none());
    }

    #[test]
    fn test_overlapping_same_text_keeps_first() {
        let input = [
            HEADER,
            "push-button\tOK\t(15, 15)\t(30, 30)",
            "label\t o k \t(25, 15)\t(30, 30)",
        ]
        .join("\n");
        let out = filter_similar_nodes(&input);
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines, vec![HEADER, "push-button\tOK\t(15, 15)\t(30, 30)"]);
    }

    #[test]
    fn test_overlapping_different_text_both_survive() {
        let input = "push-button\tOK\t(15, 15)\t(30, 30)\nlabel\tCancel\t(25, 15)\t(30, 30)";
        assert_eq!(filter_similar_nodes(input), input);
    }

    #[test]
    fn test_low_overlap_same_text_both_survive() {
        // IoU = 100 / 1700 < 0.2
        let input = "label\tOK\t(15, 15)\t(30, 30)\nlabel\tOK\t(35, 35)\t(30, 30)";
        assert_eq!(filter_similar_nodes(input), input);
    }

    #[test]
    fn test_unparseable_lines_pass_through() {
        let input = "garbage line\n\nlabel\tOK\t(15, 15)\t(30, 30)\nlabel\tOK\t(15, 15)\t(30, 30)";
        assert_eq!(filter_similar_nodes(input), "garbage line\nlabel\tOK\t(15, 15)\t(30, 30)");
    }

    #[test]
    fn test_suppression_is_not_transitive() {
        // A overlaps B, B overlaps C, A does not overlap C.
        let a = "label\tX\t(15, 15)\t(30, 30)";
        let b = "label\tX\t(30, 15)\t(30, 30)";
        let c = "label\tX\t(45, 15)\t(30, 30)";
        let out = filter_similar_nodes(&[a, b, c].join("\n"));
        // B is suppressed by A; C is never compared against a surviving B.
        assert_eq!(out, [a, c].join("\n"));
    }

    #[test]
    fn test_dedup_is_idempotent() {
        let input = [
            HEADER,
            "push-button\tOK\t(15, 15)\t(30, 30)",
            "label\tok\t(16, 15)\t(30, 30)",
            "label\tCancel\t(100, 100)\t(30, 30)",
            "label\tX\t(215, 15)\t(30, 30)",
            "label\tX\t(230, 15)\t(30, 30)",
            "label\tX\t(245, 15)\t(30, 30)",
        ]
        .join("\n");
        let once = filter_similar_nodes(&input);
        assert_eq!(filter_similar_nodes(&once), once);
    }
}

/// Marker appended when the table was cut short.
pub const ELLIPSIS_LINE: &str = "...";

/// Keep at most `max_items` lines; when anything is cut, append a `...` line.
pub fn trim_accessibility_tree(linearized: &str, max_items: usize) -> String {
    let lines: Vec<&str> = linearized.trim().split('\n').collect();
    if lines.len() <= max_items {
        return linearized.to_string();
    }
    tracing::debug!(total = lines.len(), max_items, "trimming accessibility tree");
    let mut out = lines[..max_items].join("\n");
    out.push('\n');
    out.push_str(ELLIPSIS_LINE);
    out
}

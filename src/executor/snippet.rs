//! Helpers for writing Python automation snippets.

use crate::perception::linearize::format_float;

/// Single-quoted Python string literal, escaped the way `repr()` would.
pub fn py_str(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('\'');
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\'' => out.push_str("\\'"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if (c as u32) < 0x20 || c as u32 == 0x7f => {
                out.push_str(&format!("\\x{:02x}", c as u32));
            }
            c => out.push(c),
        }
    }
    out.push('\'');
    out
}

/// `['a', 'b']`
pub fn py_str_list<S: AsRef<str>>(items: &[S]) -> String {
    let inner: Vec<String> = items.iter().map(|s| py_str(s.as_ref())).collect();
    format!("[{}]", inner.join(", "))
}

/// Float literal; integral values keep a trailing `.0`.
pub fn py_float(v: f64) -> String {
    format_float(v)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_py_str_escapes() {
        assert_eq!(py_str("hello"), "'hello'");
        assert_eq!(py_str("it's"), r"'it\'s'");
        assert_eq!(py_str("a\\b"), r"'a\\b'");
        assert_eq!(py_str("line1\nline2\t"), r"'line1\nline2\t'");
        assert_eq!(py_str("\u{1b}"), r"'\x1b'");
    }

    #[test]
    fn test_py_str_keeps_unicode() {
        assert_eq!(py_str("café 你好"), "'café 你好'");
    }

    #[test]
    fn test_py_str_list() {
        assert_eq!(py_str_list(&["wmctrl", "-ia"]), "['wmctrl', '-ia']");
        assert_eq!(py_str_list::<&str>(&[]), "[]");
    }

    #[test]
    fn test_py_float() {
        assert_eq!(py_float(1.0), "1.0");
        assert_eq!(py_float(0.25), "0.25");
    }
}

//! Parser for one-line action calls such as
//! `Agent.click([0.5, 0.3], num_clicks=2, button_type="left")`.
//!
//! Only literal arguments are accepted: numbers, quoted strings, `True`,
//! `False`, `None`, and lists or tuples of those. Nothing is evaluated.

use std::iter::Peekable;
use std::str::CharIndices;

use serde_json::Value;

use crate::errors::{DeskGroundError, DeskGroundResult};

/// Deepest list/tuple nesting accepted in an argument.
pub const MAX_DEPTH: usize = 32;

/// A parsed call. `namespace` is everything before the last dot and is empty
/// for a bare function call.
#[derive(Debug, Clone, PartialEq)]
pub struct ActionCall {
    pub namespace: String,
    pub method: String,
    pub args: Vec<Value>,
    pub kwargs: Vec<(String, Value)>,
}

impl ActionCall {
    /// `Namespace.method` as written.
    pub fn qualified_name(&self) -> String {
        if self.namespace.is_empty() {
            self.method.clone()
        } else {
            format!("{}.{}", self.namespace, self.method)
        }
    }
}

/// Parse a single call expression. A trailing `;` is tolerated.
pub fn parse_call(src: &str) -> DeskGroundResult<ActionCall> {
    let mut p = CallParser::new(src);
    p.skip_ws();
    let mut path = vec![p.ident()?];
    p.skip_ws();
    while p.eat('.') {
        p.skip_ws();
        path.push(p.ident()?);
        p.skip_ws();
    }
    p.expect('(')?;
    let (args, kwargs) = p.arguments()?;
    p.skip_ws();
    p.eat(';');
    p.skip_ws();
    if let Some((pos, c)) = p.chars.peek().copied() {
        return Err(p.error_at(pos, &format!("unexpected '{c}' after call")));
    }

    let method = path.pop().unwrap_or_default();
    Ok(ActionCall {
        namespace: path.join("."),
        method,
        args,
        kwargs,
    })
}

struct CallParser<'a> {
    src: &'a str,
    chars: Peekable<CharIndices<'a>>,
    depth: usize,
}

impl<'a> CallParser<'a> {
    fn new(src: &'a str) -> Self {
        Self {
            src,
            chars: src.char_indices().peekable(),
            depth: 0,
        }
    }

    fn pos(&mut self) -> usize {
        self.chars.peek().map(|(i, _)| *i).unwrap_or(self.src.len())
    }

    fn peek(&mut self) -> Option<char> {
        self.chars.peek().map(|(_, c)| *c)
    }

    fn error_at(&self, pos: usize, msg: &str) -> DeskGroundError {
        DeskGroundError::Grounding(format!("cannot parse action call at byte {pos}: {msg}"))
    }

    fn error(&mut self, msg: &str) -> DeskGroundError {
        let pos = self.pos();
        self.error_at(pos, msg)
    }

    fn skip_ws(&mut self) {
        while self.peek().is_some_and(char::is_whitespace) {
            self.chars.next();
        }
    }

    fn eat(&mut self, expected: char) -> bool {
        self.chars.next_if(|(_, c)| *c == expected).is_some()
    }

    fn expect(&mut self, expected: char) -> DeskGroundResult<()> {
        if self.eat(expected) {
            Ok(())
        } else {
            Err(self.error(&format!("expected '{expected}'")))
        }
    }

    fn ident(&mut self) -> DeskGroundResult<String> {
        let mut out = String::new();
        match self.peek() {
            Some(c) if c.is_alphabetic() || c == '_' => {}
            _ => return Err(self.error("expected identifier")),
        }
        while let Some((_, c)) = self.chars.next_if(|(_, c)| c.is_alphanumeric() || *c == '_') {
            out.push(c);
        }
        Ok(out)
    }

    /// Everything between the parentheses of the call; the opening `(` has
    /// already been consumed.
    fn arguments(&mut self) -> DeskGroundResult<(Vec<Value>, Vec<(String, Value)>)> {
        let mut args = Vec::new();
        let mut kwargs: Vec<(String, Value)> = Vec::new();
        loop {
            self.skip_ws();
            if self.eat(')') {
                return Ok((args, kwargs));
            }

            if let Some(name) = self.keyword_name()? {
                if kwargs.iter().any(|(k, _)| *k == name) {
                    return Err(self.error(&format!("keyword argument '{name}' repeated")));
                }
                self.skip_ws();
                let value = self.value()?;
                kwargs.push((name, value));
            } else {
                if !kwargs.is_empty() {
                    return Err(self.error("positional argument follows keyword argument"));
                }
                args.push(self.value()?);
            }

            self.skip_ws();
            if self.eat(',') {
                continue;
            }
            self.expect(')')?;
            return Ok((args, kwargs));
        }
    }

    /// Consumes `name =` if the next tokens form a keyword argument, leaving
    /// the input untouched otherwise.
    fn keyword_name(&mut self) -> DeskGroundResult<Option<String>> {
        let start = self.pos();
        let rest = &self.src[start..];
        let ident_len: usize = rest
            .chars()
            .take_while(|c| c.is_alphanumeric() || *c == '_')
            .map(char::len_utf8)
            .sum();
        if ident_len == 0 || rest.starts_with(|c: char| c.is_ascii_digit()) {
            return Ok(None);
        }
        let after = rest[ident_len..].trim_start();
        if !after.starts_with('=') || after.starts_with("==") {
            return Ok(None);
        }
        let name = self.ident()?;
        self.skip_ws();
        self.expect('=')?;
        Ok(Some(name))
    }

    fn value(&mut self) -> DeskGroundResult<Value> {
        self.skip_ws();
        match self.peek() {
            Some('[') => {
                self.chars.next();
                self.sequence(']')
            }
            Some('(') => {
                self.chars.next();
                self.sequence(')')
            }
            Some('\'') | Some('"') => self.string(false).map(Value::String),
            Some('r') | Some('R') if self.is_raw_prefix() => {
                self.chars.next();
                self.string(true).map(Value::String)
            }
            Some(c) if c.is_ascii_digit() || c == '-' || c == '+' || c == '.' => self.number(),
            Some(c) if c.is_alphabetic() || c == '_' => {
                let word = self.ident()?;
                match word.as_str() {
                    "True" => Ok(Value::Bool(true)),
                    "False" => Ok(Value::Bool(false)),
                    "None" => Ok(Value::Null),
                    other => Err(self.error(&format!("'{other}' is not a literal"))),
                }
            }
            Some(c) => Err(self.error(&format!("unexpected '{c}'"))),
            None => Err(self.error("unexpected end of input")),
        }
    }

    fn is_raw_prefix(&mut self) -> bool {
        let pos = self.pos();
        matches!(self.src[pos..].chars().nth(1), Some('\'') | Some('"'))
    }

    fn sequence(&mut self, close: char) -> DeskGroundResult<Value> {
        if self.depth >= MAX_DEPTH {
            return Err(self.error("literal nested too deeply"));
        }
        self.depth += 1;
        let items = self.sequence_items(close);
        self.depth -= 1;
        items
    }

    fn sequence_items(&mut self, close: char) -> DeskGroundResult<Value> {
        let mut items = Vec::new();
        loop {
            self.skip_ws();
            if self.eat(close) {
                return Ok(Value::Array(items));
            }
            items.push(self.value()?);
            self.skip_ws();
            if !self.eat(',') {
                self.expect(close)?;
                return Ok(Value::Array(items));
            }
        }
    }

    fn number(&mut self) -> DeskGroundResult<Value> {
        let start = self.pos();
        let mut text = String::new();
        if let Some((_, c)) = self.chars.next_if(|(_, c)| *c == '-' || *c == '+') {
            text.push(c);
        }
        let mut is_float = false;
        while let Some((_, c)) = self.chars.next_if(|(_, c)| {
            c.is_ascii_digit() || *c == '.' || *c == '_' || *c == 'e' || *c == 'E'
        }) {
            match c {
                '_' => continue,
                '.' | 'e' | 'E' => is_float = true,
                _ => {}
            }
            text.push(c);
            if c == 'e' || c == 'E' {
                if let Some((_, sign)) = self.chars.next_if(|(_, c)| *c == '-' || *c == '+') {
                    text.push(sign);
                }
            }
        }

        if !is_float {
            if let Ok(i) = text.parse::<i64>() {
                return Ok(Value::from(i));
            }
        }
        text.parse::<f64>()
            .ok()
            .and_then(serde_json::Number::from_f64)
            .map(Value::Number)
            .ok_or_else(|| self.error_at(start, &format!("invalid number '{text}'")))
    }

    fn string(&mut self, raw: bool) -> DeskGroundResult<String> {
        let start = self.pos();
        let quote = match self.chars.next() {
            Some((_, c)) if c == '\'' || c == '"' => c,
            _ => return Err(self.error_at(start, "expected string")),
        };
        let triple = self.src[start..].starts_with(&quote.to_string().repeat(3));
        if triple {
            self.chars.next();
            self.chars.next();
        }

        let mut out = String::new();
        loop {
            let Some((_, c)) = self.chars.next() else {
                return Err(self.error_at(start, "unterminated string"));
            };
            if c == quote {
                if !triple {
                    return Ok(out);
                }
                let pos = self.pos();
                if self.src[pos..].starts_with(&quote.to_string().repeat(2)) {
                    self.chars.next();
                    self.chars.next();
                    return Ok(out);
                }
                out.push(c);
                continue;
            }
            if c == '\n' && !triple {
                return Err(self.error_at(start, "unterminated string"));
            }
            if c != '\\' {
                out.push(c);
                continue;
            }

            let Some((_, esc)) = self.chars.next() else {
                return Err(self.error_at(start, "unterminated string"));
            };
            if raw {
                out.push('\\');
                out.push(esc);
                continue;
            }
            match esc {
                '\n' => {}
                '\\' => out.push('\\'),
                '\'' => out.push('\''),
                '"' => out.push('"'),
                'n' => out.push('\n'),
                't' => out.push('\t'),
                'r' => out.push('\r'),
                '0' => out.push('\0'),
                'x' => out.push(self.hex_escape(2)?),
                'u' => out.push(self.hex_escape(4)?),
                'U' => out.push(self.hex_escape(8)?),
                other => {
                    out.push('\\');
                    out.push(other);
                }
            }
        }
    }

    fn hex_escape(&mut self, digits: usize) -> DeskGroundResult<char> {
        let mut code = 0u32;
        for _ in 0..digits {
            let d = self
                .chars
                .next()
                .and_then(|(_, c)| c.to_digit(16))
                .ok_or_else(|| self.error("invalid escape sequence"))?;
            code = code * 16 + d;
        }
        char::from_u32(code).ok_or_else(|| self.error("invalid code point"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_click_with_kwargs() {
        let call = parse_call("Agent.click([0.5, 0.3], num_clicks=2, button_type='right')").unwrap();
        assert_eq!(call.namespace, "Agent");
        assert_eq!(call.method, "click");
        assert_eq!(call.args, vec![json!([0.5, 0.3])]);
        assert_eq!(
            call.kwargs,
            vec![
                ("num_clicks".to_string(), json!(2)),
                ("button_type".to_string(), json!("right")),
            ]
        );
    }

    #[test]
    fn test_literals() {
        let call = parse_call(r#"Agent.type(None, "a \"b\"\n", overwrite=True, enter=False)"#).unwrap();
        assert_eq!(call.args, vec![Value::Null, json!("a \"b\"\n")]);
        assert_eq!(call.kwargs[0].1, json!(true));
        assert_eq!(call.kwargs[1].1, json!(false));
    }

    #[test]
    fn test_tuple_and_negative_numbers() {
        let call = parse_call("Agent.scroll((-10, 2.5e1), 'down');").unwrap();
        assert_eq!(call.args, vec![json!([-10, 25.0]), json!("down")]);
    }

    #[test]
    fn test_equals_inside_string() {
        let call = parse_call("Agent.type(text='a=b')").unwrap();
        assert_eq!(call.kwargs, vec![("text".to_string(), json!("a=b"))]);
        let call = parse_call("Agent.quote('x = 1')").unwrap();
        assert_eq!(call.args, vec![json!("x = 1")]);
    }

    #[test]
    fn test_triple_quoted_and_raw_strings() {
        let call = parse_call("Agent.quote('''it's\nfine''')").unwrap();
        assert_eq!(call.args, vec![json!("it's\nfine")]);
        let call = parse_call(r"Agent.quote(r'C:\temp')").unwrap();
        assert_eq!(call.args, vec![json!(r"C:\temp")]);
    }

    #[test]
    fn test_nested_namespace_and_bare_call() {
        let call = parse_call("CalcTools.sheet.set_cell('A1', 3)").unwrap();
        assert_eq!(call.namespace, "CalcTools.sheet");
        assert_eq!(call.qualified_name(), "CalcTools.sheet.set_cell");
        let call = parse_call("wait()").unwrap();
        assert_eq!(call.namespace, "");
        assert!(call.args.is_empty());
    }

    #[test]
    fn test_identifiers_are_not_evaluated() {
        assert!(parse_call("Agent.click(coords)").is_err());
        assert!(parse_call("Agent.quote(__import__('os'))").is_err());
    }

    #[test]
    fn test_malformed_calls() {
        assert!(parse_call("Agent.click([0.5, 0.3]").is_err());
        assert!(parse_call("Agent.click(x=1, 2)").is_err());
        assert!(parse_call("Agent.click(x=1, x=2)").is_err());
        assert!(parse_call("Agent.click() + 1").is_err());
        assert!(parse_call("Agent.quote('open").is_err());
        assert!(parse_call("").is_err());
    }

    #[test]
    fn test_nesting_depth_is_bounded() {
        let nested = |n: usize| format!("Agent.quote({}1{})", "[".repeat(n), "]".repeat(n));
        assert!(parse_call(&nested(MAX_DEPTH)).is_ok());
        let err = parse_call(&nested(MAX_DEPTH + 1)).unwrap_err();
        assert!(err.to_string().contains("literal nested too deeply"));

        let runaway = format!("Agent.click({}", "[".repeat(20_000));
        assert!(parse_call(&runaway).is_err());
    }
}

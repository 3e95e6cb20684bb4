//! Instance routes: selector sequences addressing one instance node.
//!
//! Routes are produced by parsing an instance identifier (RFC 7951 §6.11)
//! or a RESTCONF api-path (RFC 8040 §3.5.3, via the data model, which knows
//! list key names), or constructed from a schema route plus values.

use std::fmt;

use indexmap::IndexMap;
use smol_str::SmolStr;

use crate::instance::value::Value;
use crate::parser::ParseError;

/// One selector step of an instance route.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum RouteStep {
    /// Object descent by member name; `module` is present when the name was
    /// written in prefixed form.
    MemberName {
        name: SmolStr,
        module: Option<SmolStr>,
    },
    /// Array descent by position (0-based internally; 1-based in text).
    EntryIndex(usize),
    /// Leaf-list entry selected by value.
    EntryValue(Value),
    /// List entry selected by key values; keys may be written prefixed.
    EntryKeys(Vec<(SmolStr, Value)>),
}

/// An ordered sequence of route steps.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct InstanceRoute {
    pub steps: Vec<RouteStep>,
}

impl InstanceRoute {
    pub fn new(steps: Vec<RouteStep>) -> Self {
        Self { steps }
    }

    pub fn push(&mut self, step: RouteStep) {
        self.steps.push(step);
    }

    pub fn iter(&self) -> std::slice::Iter<'_, RouteStep> {
        self.steps.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

impl fmt::Display for InstanceRoute {
    /// Instance-identifier textual form.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.steps.is_empty() {
            return f.write_str("/");
        }
        for step in &self.steps {
            match step {
                RouteStep::MemberName { name, module } => {
                    f.write_str("/")?;
                    if let Some(module) = module {
                        write!(f, "{module}:")?;
                    }
                    f.write_str(name)?;
                }
                RouteStep::EntryIndex(index) => write!(f, "[{}]", index + 1)?,
                RouteStep::EntryValue(value) => {
                    write!(f, "[.={}]", quote(&value.as_xpath_string()))?
                }
                RouteStep::EntryKeys(keys) => {
                    for (name, value) in keys {
                        write!(f, "[{name}={}]", quote(&value.as_xpath_string()))?;
                    }
                }
            }
        }
        Ok(())
    }
}

fn quote(text: &str) -> String {
    if text.contains('"') {
        format!("'{text}'")
    } else {
        format!("\"{text}\"")
    }
}

/// Parse an instance identifier: an absolute path of `/prefix:name`
/// components, each optionally followed by `[key-name="value"]`,
/// `[.="value"]`, or `[position]` predicates.
pub fn parse_instance_id(text: &str) -> Result<InstanceRoute, ParseError> {
    let mut parser = RouteParser::new(text);
    let mut route = InstanceRoute::default();
    if parser.rest().is_empty() {
        return Err(ParseError::EndOfInput(0));
    }
    while !parser.rest().is_empty() {
        parser.expect('/')?;
        let (module, name) = parser.read_member_name()?;
        route.push(RouteStep::MemberName { name, module });
        if let Some(step) = parser.read_predicates()? {
            route.push(step);
        }
    }
    Ok(route)
}

struct RouteParser<'a> {
    text: &'a str,
    pos: usize,
}

impl<'a> RouteParser<'a> {
    fn new(text: &'a str) -> Self {
        Self { text, pos: 0 }
    }

    fn rest(&self) -> &'a str {
        &self.text[self.pos..]
    }

    fn peek(&self) -> Option<char> {
        self.rest().chars().next()
    }

    fn expect(&mut self, c: char) -> Result<(), ParseError> {
        if self.peek() == Some(c) {
            self.pos += c.len_utf8();
            Ok(())
        } else {
            Err(ParseError::UnexpectedInput {
                offset: self.pos,
                expected: "'/'",
            })
        }
    }

    fn read_identifier(&mut self) -> Result<&'a str, ParseError> {
        let rest = self.rest();
        let end = rest
            .find(|c: char| !(c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-')))
            .unwrap_or(rest.len());
        let word = &rest[..end];
        if !crate::parser::is_identifier(word) {
            return Err(ParseError::invalid(self.pos, "malformed identifier"));
        }
        self.pos += end;
        Ok(word)
    }

    fn read_member_name(&mut self) -> Result<(Option<SmolStr>, SmolStr), ParseError> {
        let first = self.read_identifier()?;
        if self.peek() == Some(':') {
            self.pos += 1;
            let second = self.read_identifier()?;
            Ok((Some(SmolStr::new(first)), SmolStr::new(second)))
        } else {
            Ok((None, SmolStr::new(first)))
        }
    }

    fn read_quoted(&mut self) -> Result<String, ParseError> {
        let quote = match self.peek() {
            Some(c @ ('"' | '\'')) => c,
            _ => {
                return Err(ParseError::UnexpectedInput {
                    offset: self.pos,
                    expected: "quoted value",
                })
            }
        };
        self.pos += 1;
        let rest = self.rest();
        let end = rest
            .find(quote)
            .ok_or_else(|| ParseError::invalid(self.pos, "unterminated string"))?;
        let value = rest[..end].to_string();
        self.pos += end + 1;
        Ok(value)
    }

    /// Zero or more bracketed predicates after a member name, merged into
    /// at most one route step.
    fn read_predicates(&mut self) -> Result<Option<RouteStep>, ParseError> {
        let mut keys: Vec<(SmolStr, Value)> = Vec::new();
        let mut single: Option<RouteStep> = None;
        while self.peek() == Some('[') {
            if single.is_some() {
                return Err(ParseError::invalid(self.pos, "conflicting predicates"));
            }
            self.pos += 1;
            match self.peek() {
                Some(c) if c.is_ascii_digit() => {
                    let rest = self.rest();
                    let end = rest
                        .find(|c: char| !c.is_ascii_digit())
                        .unwrap_or(rest.len());
                    let position: usize = rest[..end]
                        .parse()
                        .map_err(|_| ParseError::invalid(self.pos, "bad position"))?;
                    if position == 0 {
                        return Err(ParseError::invalid(self.pos, "position is 1-based"));
                    }
                    self.pos += end;
                    if !keys.is_empty() {
                        return Err(ParseError::invalid(self.pos, "conflicting predicates"));
                    }
                    single = Some(RouteStep::EntryIndex(position - 1));
                }
                Some('.') => {
                    self.pos += 1;
                    self.expect('=')?;
                    let value = self.read_quoted()?;
                    if !keys.is_empty() {
                        return Err(ParseError::invalid(self.pos, "conflicting predicates"));
                    }
                    single = Some(RouteStep::EntryValue(Value::String(value)));
                }
                _ => {
                    let (module, name) = self.read_member_name()?;
                    self.expect('=')?;
                    let value = self.read_quoted()?;
                    let written = match module {
                        Some(module) => SmolStr::new(format!("{module}:{name}")),
                        None => name,
                    };
                    keys.push((written, Value::String(value)));
                }
            }
            match self.peek() {
                Some(']') => self.pos += 1,
                _ => {
                    return Err(ParseError::UnexpectedInput {
                        offset: self.pos,
                        expected: "']'",
                    })
                }
            }
        }
        if let Some(step) = single {
            return Ok(Some(step));
        }
        if keys.is_empty() {
            Ok(None)
        } else {
            Ok(Some(RouteStep::EntryKeys(keys)))
        }
    }
}

/// Percent-decode one api-path component (RFC 8040 §3.5.3).
pub fn percent_decode(text: &str) -> Result<String, ParseError> {
    let mut out = Vec::with_capacity(text.len());
    let bytes = text.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            let hex = bytes
                .get(i + 1..i + 3)
                .ok_or_else(|| ParseError::invalid(i, "truncated percent-escape"))?;
            let hex = std::str::from_utf8(hex)
                .ok()
                .and_then(|h| u8::from_str_radix(h, 16).ok())
                .ok_or_else(|| ParseError::invalid(i, "bad percent-escape"))?;
            out.push(hex);
            i += 3;
        } else {
            out.push(bytes[i]);
            i += 1;
        }
    }
    String::from_utf8(out).map_err(|_| ParseError::invalid(0, "invalid UTF-8 in api-path"))
}

/// Build an `EntryKeys` step from a key map (e.g. for `look_up`).
pub fn entry_keys(keys: IndexMap<SmolStr, Value>) -> RouteStep {
    RouteStep::EntryKeys(keys.into_iter().collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_plain_path() {
        let route = parse_instance_id("/example-1:greeting").unwrap();
        assert_eq!(
            route.steps,
            vec![RouteStep::MemberName {
                name: "greeting".into(),
                module: Some("example-1".into()),
            }]
        );
    }

    #[test]
    fn test_parse_key_predicates() {
        let route = parse_instance_id(r#"/ex:bag/foo[number="3"][prime="true"]"#).unwrap();
        assert_eq!(route.steps.len(), 3);
        match &route.steps[2] {
            RouteStep::EntryKeys(keys) => {
                assert_eq!(keys[0].0, "number");
                assert_eq!(keys[0].1, Value::String("3".into()));
                assert_eq!(keys[1].0, "prime");
            }
            other => panic!("expected EntryKeys, got {other:?}"),
        }
    }

    #[test]
    fn test_parse_position_and_value_predicates() {
        let route = parse_instance_id(r#"/ex:items[3]"#).unwrap();
        assert_eq!(route.steps[1], RouteStep::EntryIndex(2));
        let route = parse_instance_id(r#"/ex:items[.="x"]"#).unwrap();
        assert_eq!(
            route.steps[1],
            RouteStep::EntryValue(Value::String("x".into()))
        );
    }

    #[test]
    fn test_roundtrip_display() {
        let text = r#"/ex:bag/foo[number="3"]/in-words"#;
        let route = parse_instance_id(text).unwrap();
        assert_eq!(route.to_string(), text);
    }

    #[test]
    fn test_parse_errors() {
        assert!(parse_instance_id("").is_err());
        assert!(parse_instance_id("greeting").is_err());
        assert!(parse_instance_id("/ex:foo[0]").is_err());
        assert!(parse_instance_id("/ex:foo[bad").is_err());
        assert!(parse_instance_id(r#"/ex:foo[k="v"][2]"#).is_err());
    }

    #[test]
    fn test_percent_decode() {
        assert_eq!(percent_decode("a%2Cb").unwrap(), "a,b");
        assert_eq!(percent_decode("plain").unwrap(), "plain");
        assert!(percent_decode("bad%2").is_err());
        assert!(percent_decode("bad%zz").is_err());
    }
}

//! YANG pattern translation.
//!
//! YANG patterns use XSD regular-expression syntax: matching is implicitly
//! anchored to the whole string, `^` and `$` are ordinary characters, and
//! the multi-character escapes `\i`/`\I`/`\c`/`\C` denote XML name
//! character classes. Patterns are translated into the `regex` crate's
//! dialect at type-build time and the compiled object is cached.

use regex::Regex;

/// XML initial name characters (ASCII subset).
const INITIAL_NAME_CHARS: &str = "A-Za-z_:";
/// XML name characters (ASCII subset).
const NAME_CHARS: &str = "A-Za-z0-9._:\\-";

/// Translate a YANG pattern and compile it, anchored to the whole string.
pub fn compile_pattern(yang_pattern: &str) -> Result<Regex, String> {
    let translated = translate(yang_pattern)?;
    Regex::new(&format!("^(?:{translated})$"))
        .map_err(|e| format!("invalid pattern {yang_pattern:?}: {e}"))
}

fn translate(pattern: &str) -> Result<String, String> {
    let mut out = String::with_capacity(pattern.len() + 8);
    let mut chars = pattern.chars();
    let mut in_class = false;
    while let Some(c) = chars.next() {
        match c {
            '\\' => {
                let escaped = chars
                    .next()
                    .ok_or_else(|| format!("trailing backslash in pattern {pattern:?}"))?;
                match escaped {
                    'i' if !in_class => out.push_str(&format!("[{INITIAL_NAME_CHARS}]")),
                    'I' if !in_class => out.push_str(&format!("[^{INITIAL_NAME_CHARS}]")),
                    'c' if !in_class => out.push_str(&format!("[{NAME_CHARS}]")),
                    'C' if !in_class => out.push_str(&format!("[^{NAME_CHARS}]")),
                    'i' => out.push_str(INITIAL_NAME_CHARS),
                    'c' => out.push_str(NAME_CHARS),
                    other => {
                        out.push('\\');
                        out.push(other);
                    }
                }
            }
            '[' if !in_class => {
                in_class = true;
                out.push('[');
            }
            ']' if in_class => {
                in_class = false;
                out.push(']');
            }
            // Ordinary characters in XSD, anchors in the target dialect.
            '^' if !in_class => out.push_str("\\^"),
            '$' if !in_class => out.push_str("\\$"),
            other => out.push(other),
        }
    }
    if in_class {
        return Err(format!("unterminated character class in pattern {pattern:?}"));
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_implicit_anchoring() {
        let re = compile_pattern("[a-z]+").unwrap();
        assert!(re.is_match("abc"));
        assert!(!re.is_match("abc1"));
        assert!(!re.is_match("1abc"));
    }

    #[test]
    fn test_number_in_words() {
        let re = compile_pattern(r"[a-z][a-z\-]+[a-z]").unwrap();
        assert!(re.is_match("three"));
        assert!(re.is_match("forty-two"));
        assert!(!re.is_match("INFINITY"));
        assert!(!re.is_match("ab"));
    }

    #[test]
    fn test_caret_and_dollar_are_literal() {
        let re = compile_pattern(r"a^b").unwrap();
        assert!(re.is_match("a^b"));
        let re = compile_pattern(r"a$b").unwrap();
        assert!(re.is_match("a$b"));
    }

    #[test]
    fn test_name_char_escapes() {
        let re = compile_pattern(r"\i\c*").unwrap();
        assert!(re.is_match("_name"));
        assert!(re.is_match("a.b-c"));
        assert!(!re.is_match("1name"));
        let re = compile_pattern(r"[\c]+").unwrap();
        assert!(re.is_match("a.b"));
    }

    #[test]
    fn test_bad_pattern() {
        assert!(compile_pattern(r"a\").is_err());
        assert!(compile_pattern("[a-z").is_err());
        assert!(compile_pattern("(a").is_err());
    }
}

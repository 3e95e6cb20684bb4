//! Recursive descent parser for YANG compact syntax
//!
//! Consumes the token stream from [`super::lexer`] and builds a
//! [`StatementTree`]. Comments are tolerated and discarded. Quoted string
//! arguments support escape processing and `+` concatenation.

use smol_str::SmolStr;

use super::error::ParseError;
use super::lexer::{tokenize, Token, TokenKind};
use super::statement::{StatementTree, StmtId};

/// Parse YANG source text into a statement tree.
///
/// `expected_name` and `expected_revision` check the top-level statement:
/// the module name must match, and the most recent `revision` substatement
/// must match a non-empty expected revision.
pub fn parse(
    text: &str,
    expected_name: Option<&str>,
    expected_revision: Option<&str>,
) -> Result<StatementTree, ParseError> {
    let tokens = tokenize(text);
    let mut parser = Parser::new(&tokens);
    let mut tree = StatementTree::new();
    let root = parser.parse_statement(&mut tree, None)?;
    parser.skip_trivia();
    if let Some(tok) = parser.peek() {
        return Err(ParseError::UnexpectedInput {
            offset: tok.offset,
            expected: "end of input",
        });
    }
    tree.set_root(root);

    let module = tree.root();
    if !matches!(module.keyword(), "module" | "submodule") || !module.is_builtin() {
        return Err(ParseError::invalid(
            0,
            format!("expected module or submodule, found {}", module.keyword()),
        ));
    }
    if let Some(expected) = expected_name {
        let found = module.argument().unwrap_or_default();
        if found != expected {
            return Err(ParseError::ModuleNameMismatch {
                expected: expected.to_string(),
                found: found.to_string(),
            });
        }
    }
    if let Some(expected) = expected_revision.filter(|r| !r.is_empty()) {
        // Revision substatements are in reverse chronological order by
        // convention, but take the lexicographic maximum to be safe.
        let found = module
            .find_all("revision")
            .filter_map(|r| r.argument())
            .max()
            .unwrap_or_default();
        if found != expected {
            return Err(ParseError::ModuleRevisionMismatch {
                expected: expected.to_string(),
                found: found.to_string(),
            });
        }
    }
    Ok(tree)
}

struct Parser<'t, 'a> {
    tokens: &'t [Token<'a>],
    pos: usize,
}

impl<'t, 'a> Parser<'t, 'a> {
    fn new(tokens: &'t [Token<'a>]) -> Self {
        Self { tokens, pos: 0 }
    }

    fn peek(&self) -> Option<&'t Token<'a>> {
        self.tokens[self.pos..]
            .iter()
            .find(|t| !t.kind.is_trivia())
    }

    fn skip_trivia(&mut self) {
        while self
            .tokens
            .get(self.pos)
            .is_some_and(|t| t.kind.is_trivia())
        {
            self.pos += 1;
        }
    }

    fn bump(&mut self) -> Option<&'t Token<'a>> {
        self.skip_trivia();
        let tok = self.tokens.get(self.pos);
        if tok.is_some() {
            self.pos += 1;
        }
        tok
    }

    fn offset(&self) -> usize {
        self.tokens
            .get(self.pos)
            .map(|t| t.offset)
            .unwrap_or_else(|| self.tokens.last().map(|t| t.offset + t.text.len()).unwrap_or(0))
    }

    /// statement := keyword [argument] (';' | '{' statement* '}')
    fn parse_statement(
        &mut self,
        tree: &mut StatementTree,
        parent: Option<StmtId>,
    ) -> Result<StmtId, ParseError> {
        let end = self.offset();
        let tok = self.bump().ok_or(ParseError::EndOfInput(end))?;
        if tok.kind != TokenKind::Word {
            return Err(ParseError::UnexpectedInput {
                offset: tok.offset,
                expected: "statement keyword",
            });
        }
        let (prefix, keyword) = parse_keyword(tok)?;

        let argument = self.parse_argument()?;
        let id = tree.alloc(keyword, prefix, argument, parent);

        let end = self.offset();
        let tok = self.bump().ok_or(ParseError::EndOfInput(end))?;
        match tok.kind {
            TokenKind::Semicolon => {}
            TokenKind::LBrace => loop {
                match self.peek() {
                    Some(t) if t.kind == TokenKind::RBrace => {
                        self.bump();
                        break;
                    }
                    Some(_) => {
                        self.parse_statement(tree, Some(id))?;
                    }
                    None => return Err(ParseError::EndOfInput(self.offset())),
                }
            },
            _ => {
                return Err(ParseError::UnexpectedInput {
                    offset: tok.offset,
                    expected: "';' or '{'",
                })
            }
        }
        Ok(id)
    }

    /// argument := quoted ('+' quoted)* | word
    ///
    /// Returns `None` when the next token already terminates the statement.
    fn parse_argument(&mut self) -> Result<Option<String>, ParseError> {
        let Some(tok) = self.peek() else {
            return Err(ParseError::EndOfInput(self.offset()));
        };
        match tok.kind {
            TokenKind::Semicolon | TokenKind::LBrace => Ok(None),
            TokenKind::DoubleQuoted | TokenKind::SingleQuoted => {
                let mut arg = unquote(self.bump().unwrap())?;
                // `+` merges adjacent string tokens into one argument.
                loop {
                    match self.peek() {
                        Some(t) if t.kind == TokenKind::Word && t.text == "+" => {
                            self.bump();
                            let end = self.offset();
                            let next = self.bump().ok_or(ParseError::EndOfInput(end))?;
                            if !matches!(
                                next.kind,
                                TokenKind::DoubleQuoted | TokenKind::SingleQuoted
                            ) {
                                return Err(ParseError::UnexpectedInput {
                                    offset: next.offset,
                                    expected: "quoted string after '+'",
                                });
                            }
                            arg.push_str(&unquote(next)?);
                        }
                        _ => break,
                    }
                }
                Ok(Some(arg))
            }
            TokenKind::Word => {
                let tok = self.bump().unwrap();
                if tok.text.starts_with("/*") {
                    return Err(ParseError::invalid(tok.offset, "unterminated comment"));
                }
                Ok(Some(tok.text.to_string()))
            }
            TokenKind::UnterminatedComment => {
                Err(ParseError::invalid(tok.offset, "unterminated comment"))
            }
            _ => Err(ParseError::UnexpectedInput {
                offset: tok.offset,
                expected: "argument, ';' or '{'",
            }),
        }
    }
}

/// Keywords are either built-in or extension (`prefix:local`); extension
/// keyword prefixes are recorded but not resolved here.
fn parse_keyword(tok: &Token<'_>) -> Result<(Option<SmolStr>, SmolStr), ParseError> {
    if tok.text.starts_with("/*") || tok.text.starts_with("//") {
        return Err(ParseError::invalid(tok.offset, "unterminated comment"));
    }
    let (prefix, local) = match tok.text.split_once(':') {
        Some((prefix, local)) => (Some(prefix), local),
        None => (None, tok.text),
    };
    if let Some(prefix) = prefix {
        if !is_identifier(prefix) {
            return Err(ParseError::invalid(
                tok.offset,
                format!("malformed keyword prefix: {prefix}"),
            ));
        }
    }
    if !is_identifier(local) {
        return Err(ParseError::invalid(
            tok.offset,
            format!("malformed keyword: {}", tok.text),
        ));
    }
    Ok((prefix.map(SmolStr::new), SmolStr::new(local)))
}

/// YANG identifier: `[A-Za-z_][A-Za-z0-9_.-]*`.
pub fn is_identifier(text: &str) -> bool {
    let mut chars = text.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-'))
}

/// Strip quotes and, for double-quoted strings, process escapes.
///
/// Double-quoted supports `\n`, `\t`, `\\`, `\"`; single-quoted is literal.
fn unquote(tok: &Token<'_>) -> Result<String, ParseError> {
    let inner = &tok.text[1..tok.text.len() - 1];
    match tok.kind {
        TokenKind::SingleQuoted => Ok(inner.to_string()),
        TokenKind::DoubleQuoted => {
            let mut out = String::with_capacity(inner.len());
            let mut chars = inner.chars();
            while let Some(c) = chars.next() {
                if c != '\\' {
                    out.push(c);
                    continue;
                }
                match chars.next() {
                    Some('n') => out.push('\n'),
                    Some('t') => out.push('\t'),
                    Some('\\') => out.push('\\'),
                    Some('"') => out.push('"'),
                    other => {
                        return Err(ParseError::invalid(
                            tok.offset,
                            match other {
                                Some(c) => format!("bad escape: \\{c}"),
                                None => "unterminated string".to_string(),
                            },
                        ))
                    }
                }
            }
            Ok(out)
        }
        _ => unreachable!("unquote called on non-string token"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_simple_module() {
        let tree = parse(
            "module example-1 { namespace \"urn:example:1\"; prefix ex1; \
             leaf greeting { type string; } }",
            None,
            None,
        )
        .unwrap();
        let root = tree.root();
        assert_eq!(root.keyword(), "module");
        assert_eq!(root.argument(), Some("example-1"));
        assert_eq!(root.arg_of("prefix"), Some("ex1"));
        let leaf = root.find1("leaf").unwrap();
        assert_eq!(leaf.argument(), Some("greeting"));
        assert_eq!(leaf.arg_of("type"), Some("string"));
    }

    #[test]
    fn test_substatement_order_preserved() {
        let tree = parse(
            "module m { prefix m; namespace \"urn:m\"; leaf b { type string; } \
             leaf a { type string; } }",
            None,
            None,
        )
        .unwrap();
        let leaves: Vec<_> = tree
            .root()
            .find_all("leaf")
            .filter_map(|s| s.argument())
            .collect();
        assert_eq!(leaves, vec!["b", "a"]);
    }

    #[test]
    fn test_string_concatenation() {
        let tree = parse(
            "module m { prefix m; namespace 'urn:m'; description \"one \" + 'two' + \" three\"; }",
            None,
            None,
        )
        .unwrap();
        assert_eq!(tree.root().arg_of("description"), Some("one two three"));
    }

    #[test]
    fn test_escapes() {
        let tree = parse(
            r#"module m { prefix m; namespace "urn:m"; description "tab\there\nand \"quote\" \\"; }"#,
            None,
            None,
        )
        .unwrap();
        assert_eq!(
            tree.root().arg_of("description"),
            Some("tab\there\nand \"quote\" \\")
        );
    }

    #[test]
    fn test_bad_escape() {
        let err = parse(
            r#"module m { prefix m; namespace "urn:m"; description "bad \q"; }"#,
            None,
            None,
        )
        .unwrap_err();
        assert!(matches!(err, ParseError::InvalidStatement { .. }));
    }

    #[test]
    fn test_single_quoted_literal() {
        let tree = parse(
            r"module m { prefix m; namespace 'urn:m'; description 'no \n escapes'; }",
            None,
            None,
        )
        .unwrap();
        assert_eq!(tree.root().arg_of("description"), Some(r"no \n escapes"));
    }

    #[test]
    fn test_extension_keyword() {
        let tree = parse(
            "module m { prefix m; namespace 'urn:m'; md:annotation last-modified { \
             type string; } }",
            None,
            None,
        )
        .unwrap();
        let ext = tree
            .root()
            .children()
            .find(|c| c.keyword() == "annotation")
            .unwrap();
        assert_eq!(ext.prefix(), Some("md"));
        assert!(!ext.is_builtin());
    }

    #[test]
    fn test_name_mismatch() {
        let err = parse("module actual { prefix a; }", Some("expected"), None).unwrap_err();
        assert!(matches!(err, ParseError::ModuleNameMismatch { .. }));
    }

    #[test]
    fn test_revision_mismatch() {
        let err = parse(
            "module m { prefix m; revision 2019-01-01; }",
            Some("m"),
            Some("2020-01-01"),
        )
        .unwrap_err();
        assert!(matches!(err, ParseError::ModuleRevisionMismatch { .. }));
    }

    #[test]
    fn test_latest_revision_wins() {
        let tree = parse(
            "module m { prefix m; revision 2020-01-01; revision 2019-01-01; }",
            Some("m"),
            Some("2020-01-01"),
        )
        .unwrap();
        assert_eq!(tree.root().keyword(), "module");
    }

    #[test]
    fn test_missing_semicolon() {
        let err = parse("module m { prefix m }", None, None).unwrap_err();
        assert!(matches!(err, ParseError::UnexpectedInput { .. }));
    }

    #[test]
    fn test_trailing_garbage() {
        let err = parse("module m { prefix m; } extra", None, None).unwrap_err();
        assert!(matches!(err, ParseError::UnexpectedInput { .. }));
    }

    #[test]
    fn test_comments_discarded() {
        let tree = parse(
            "// header\nmodule m { /* block */ prefix m; // eol\n namespace 'urn:m'; }",
            None,
            None,
        )
        .unwrap();
        assert_eq!(tree.root().arg_of("prefix"), Some("m"));
        assert_eq!(tree.root().children().count(), 2);
    }
}

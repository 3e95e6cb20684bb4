//! Logos-based lexer for YANG compact syntax
//!
//! Fast tokenization using the logos crate.

use logos::Logos;

/// A token with its kind, text, and byte offset
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token<'a> {
    pub kind: TokenKind,
    pub text: &'a str,
    pub offset: usize,
}

/// Lexer wrapping the logos-generated tokenizer
pub struct Lexer<'a> {
    inner: logos::Lexer<'a, LogosToken>,
}

impl<'a> Lexer<'a> {
    pub fn new(input: &'a str) -> Self {
        Self {
            inner: LogosToken::lexer(input),
        }
    }
}

impl<'a> Iterator for Lexer<'a> {
    type Item = Token<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        let logos_token = self.inner.next()?;
        let text = self.inner.slice();
        let offset = self.inner.span().start;

        let kind = match logos_token {
            Ok(t) => t.into(),
            Err(()) => TokenKind::Error,
        };

        Some(Token { kind, text, offset })
    }
}

/// Tokenize an entire string into a Vec
pub fn tokenize(input: &str) -> Vec<Token<'_>> {
    Lexer::new(input).collect()
}

/// Token kinds exposed to the statement parser
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Word,
    DoubleQuoted,
    SingleQuoted,
    LBrace,
    RBrace,
    Semicolon,
    LineComment,
    BlockComment,
    UnterminatedComment,
    Error,
}

impl TokenKind {
    /// Trivia tokens are discarded by the statement parser.
    pub fn is_trivia(self) -> bool {
        matches!(self, TokenKind::LineComment | TokenKind::BlockComment)
    }
}

/// Logos token enum - maps to TokenKind
#[derive(Logos, Debug, Clone, Copy, PartialEq)]
#[logos(skip r"[ \t\r\n]+")]
enum LogosToken {
    // =========================================================================
    // TRIVIA
    // =========================================================================
    #[regex(r"//[^\n]*", priority = 10, allow_greedy = true)]
    LineComment,

    #[regex(r"/\*([^*]|\*[^/])*\*+/", priority = 10)]
    BlockComment,

    // A bare comment opener only survives when the closing `*/` is missing.
    #[token("/*", priority = 3)]
    UnterminatedComment,

    // =========================================================================
    // STRINGS
    // =========================================================================
    #[regex(r#""([^"\\]|\\.)*""#)]
    DoubleQuoted,

    #[regex(r"'[^']*'")]
    SingleQuoted,

    // =========================================================================
    // STRUCTURE
    // =========================================================================
    #[token("{")]
    LBrace,
    #[token("}")]
    RBrace,
    #[token(";")]
    Semicolon,

    // =========================================================================
    // WORDS
    // =========================================================================
    // Unquoted strings: keywords, identifiers, and unquoted arguments
    // (dates, numbers, schema paths). Terminated by whitespace, braces,
    // semicolons, or quotes.
    #[regex(r#"[^ \t\r\n;{}"']+"#, priority = 2)]
    Word,
}

impl From<LogosToken> for TokenKind {
    fn from(token: LogosToken) -> Self {
        use LogosToken::*;
        match token {
            LineComment => TokenKind::LineComment,
            BlockComment => TokenKind::BlockComment,
            UnterminatedComment => TokenKind::UnterminatedComment,
            DoubleQuoted => TokenKind::DoubleQuoted,
            SingleQuoted => TokenKind::SingleQuoted,
            LBrace => TokenKind::LBrace,
            RBrace => TokenKind::RBrace,
            Semicolon => TokenKind::Semicolon,
            Word => TokenKind::Word,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lex_leaf() {
        let kinds: Vec<_> = tokenize("leaf greeting { type string; }")
            .into_iter()
            .map(|t| t.kind)
            .collect();
        assert_eq!(
            kinds,
            vec![
                TokenKind::Word,
                TokenKind::Word,
                TokenKind::LBrace,
                TokenKind::Word,
                TokenKind::Word,
                TokenKind::Semicolon,
                TokenKind::RBrace,
            ]
        );
    }

    #[test]
    fn test_lex_strings() {
        let tokens = tokenize(r#"pattern "[a-z]+" + 'suffix';"#);
        assert_eq!(tokens[0].kind, TokenKind::Word);
        assert_eq!(tokens[1].kind, TokenKind::DoubleQuoted);
        assert_eq!(tokens[2].kind, TokenKind::Word);
        assert_eq!(tokens[2].text, "+");
        assert_eq!(tokens[3].kind, TokenKind::SingleQuoted);
        assert_eq!(tokens[4].kind, TokenKind::Semicolon);
    }

    #[test]
    fn test_lex_comments() {
        let tokens = tokenize("// line\nmodule /* block\nspanning */ m");
        assert_eq!(tokens[0].kind, TokenKind::LineComment);
        assert_eq!(tokens[1].kind, TokenKind::Word);
        assert_eq!(tokens[2].kind, TokenKind::BlockComment);
        assert_eq!(tokens[3].kind, TokenKind::Word);
    }

    #[test]
    fn test_lex_unterminated_comment() {
        let tokens = tokenize("/* never closed");
        assert_eq!(tokens[0].kind, TokenKind::UnterminatedComment);
    }

    #[test]
    fn test_lex_unquoted_path() {
        let tokens = tokenize("augment /sys:system/sys:clock {");
        assert_eq!(tokens[1].text, "/sys:system/sys:clock");
        assert_eq!(tokens[1].kind, TokenKind::Word);
    }

    #[test]
    fn test_lex_escaped_quote() {
        let tokens = tokenize(r#"description "a \"quoted\" word";"#);
        assert_eq!(tokens[1].kind, TokenKind::DoubleQuoted);
        assert_eq!(tokens[1].text, r#""a \"quoted\" word""#);
    }
}

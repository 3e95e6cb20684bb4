//! Logos-based lexer for XPath 1.0 expressions.

use logos::Logos;

/// A token with its kind and text.
#[derive(Debug, Clone, PartialEq)]
pub struct Token<'a> {
    pub kind: TokenKind,
    pub text: &'a str,
    pub offset: usize,
}

pub fn tokenize(input: &str) -> Result<Vec<Token<'_>>, usize> {
    let mut lexer = LogosToken::lexer(input);
    let mut tokens = Vec::new();
    while let Some(result) = lexer.next() {
        match result {
            Ok(token) => tokens.push(Token {
                kind: token.into(),
                text: lexer.slice(),
                offset: lexer.span().start,
            }),
            Err(()) => return Err(lexer.span().start),
        }
    }
    Ok(tokens)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Number,
    Literal,
    NCName,
    Dollar,
    LParen,
    RParen,
    LBracket,
    RBracket,
    DoubleSlash,
    Slash,
    DoubleDot,
    Dot,
    DoubleColon,
    Colon,
    Comma,
    At,
    Pipe,
    Plus,
    Minus,
    Star,
    Eq,
    NotEq,
    LtEq,
    GtEq,
    Lt,
    Gt,
}

#[derive(Logos, Debug, Clone, Copy, PartialEq)]
#[logos(skip r"[ \t\r\n]+")]
enum LogosToken {
    #[regex(r"[0-9]+(\.[0-9]*)?|\.[0-9]+")]
    Number,

    #[regex(r#""[^"]*"|'[^']*'"#)]
    Literal,

    #[regex(r"[A-Za-z_][A-Za-z0-9_.\-]*")]
    NCName,

    #[token("$")]
    Dollar,
    #[token("(")]
    LParen,
    #[token(")")]
    RParen,
    #[token("[")]
    LBracket,
    #[token("]")]
    RBracket,
    #[token("//")]
    DoubleSlash,
    #[token("/")]
    Slash,
    #[token("..")]
    DoubleDot,
    #[token(".")]
    Dot,
    #[token("::")]
    DoubleColon,
    #[token(":")]
    Colon,
    #[token(",")]
    Comma,
    #[token("@")]
    At,
    #[token("|")]
    Pipe,
    #[token("+")]
    Plus,
    #[token("-")]
    Minus,
    #[token("*")]
    Star,
    #[token("=")]
    Eq,
    #[token("!=")]
    NotEq,
    #[token("<=")]
    LtEq,
    #[token(">=")]
    GtEq,
    #[token("<")]
    Lt,
    #[token(">")]
    Gt,
}

impl From<LogosToken> for TokenKind {
    fn from(token: LogosToken) -> Self {
        use LogosToken::*;
        match token {
            Number => TokenKind::Number,
            Literal => TokenKind::Literal,
            NCName => TokenKind::NCName,
            Dollar => TokenKind::Dollar,
            LParen => TokenKind::LParen,
            RParen => TokenKind::RParen,
            LBracket => TokenKind::LBracket,
            RBracket => TokenKind::RBracket,
            DoubleSlash => TokenKind::DoubleSlash,
            Slash => TokenKind::Slash,
            DoubleDot => TokenKind::DoubleDot,
            Dot => TokenKind::Dot,
            DoubleColon => TokenKind::DoubleColon,
            Colon => TokenKind::Colon,
            Comma => TokenKind::Comma,
            At => TokenKind::At,
            Pipe => TokenKind::Pipe,
            Plus => TokenKind::Plus,
            Minus => TokenKind::Minus,
            Star => TokenKind::Star,
            Eq => TokenKind::Eq,
            NotEq => TokenKind::NotEq,
            LtEq => TokenKind::LtEq,
            GtEq => TokenKind::GtEq,
            Lt => TokenKind::Lt,
            Gt => TokenKind::Gt,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tokenize_path() {
        let tokens = tokenize("../foo/in-words").unwrap();
        let kinds: Vec<_> = tokens.iter().map(|t| t.kind).collect();
        assert_eq!(
            kinds,
            vec![
                TokenKind::DoubleDot,
                TokenKind::Slash,
                TokenKind::NCName,
                TokenKind::Slash,
                TokenKind::NCName,
            ]
        );
        assert_eq!(tokens[4].text, "in-words");
    }

    #[test]
    fn test_tokenize_predicate() {
        let tokens = tokenize("foo[number = current()/../ref]").unwrap();
        assert!(tokens.iter().any(|t| t.kind == TokenKind::LBracket));
        assert!(tokens.iter().any(|t| t.kind == TokenKind::Eq));
    }

    #[test]
    fn test_tokenize_numbers_and_literals() {
        let tokens = tokenize(r#"3.14 + count("x")"#).unwrap();
        assert_eq!(tokens[0].kind, TokenKind::Number);
        assert_eq!(tokens[1].kind, TokenKind::Plus);
        assert_eq!(tokens[3].kind, TokenKind::LParen);
        assert_eq!(tokens[4].kind, TokenKind::Literal);
    }

    #[test]
    fn test_tokenize_operators() {
        let tokens = tokenize("a != b <= c | d").unwrap();
        let kinds: Vec<_> = tokens.iter().map(|t| t.kind).collect();
        assert!(kinds.contains(&TokenKind::NotEq));
        assert!(kinds.contains(&TokenKind::LtEq));
        assert!(kinds.contains(&TokenKind::Pipe));
    }
}

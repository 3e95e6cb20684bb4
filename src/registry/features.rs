//! `if-feature` boolean expressions.
//!
//! Grammar: identifiers joined by `and`, `or`, `not` with parenthesisation;
//! operator precedence `not` > `and` > `or`.

use crate::base::QualName;

use super::error::RegistryError;

/// Parsed feature expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeatureExpr {
    Feature(QualName),
    Not(Box<FeatureExpr>),
    And(Box<FeatureExpr>, Box<FeatureExpr>),
    Or(Box<FeatureExpr>, Box<FeatureExpr>),
}

impl FeatureExpr {
    /// Evaluate against the set of supported features.
    pub fn holds(&self, supported: &dyn Fn(&QualName) -> bool) -> bool {
        match self {
            FeatureExpr::Feature(name) => supported(name),
            FeatureExpr::Not(inner) => !inner.holds(supported),
            FeatureExpr::And(a, b) => a.holds(supported) && b.holds(supported),
            FeatureExpr::Or(a, b) => a.holds(supported) || b.holds(supported),
        }
    }

    /// Qualified names of every feature the expression references.
    pub fn references(&self, out: &mut Vec<QualName>) {
        match self {
            FeatureExpr::Feature(name) => out.push(name.clone()),
            FeatureExpr::Not(inner) => inner.references(out),
            FeatureExpr::And(a, b) | FeatureExpr::Or(a, b) => {
                a.references(out);
                b.references(out);
            }
        }
    }
}

/// Parse a feature expression, resolving `[prefix:]name` references through
/// `resolve` (prefix → namespace module name).
pub fn parse_feature_expr(
    text: &str,
    resolve: &dyn Fn(Option<&str>, &str) -> Result<QualName, RegistryError>,
) -> Result<FeatureExpr, RegistryError> {
    let tokens = lex(text)?;
    let mut parser = ExprParser {
        tokens: &tokens,
        pos: 0,
        resolve,
    };
    let expr = parser.parse_or()?;
    if parser.pos != parser.tokens.len() {
        return Err(RegistryError::InvalidFeatureExpression(text.to_string()));
    }
    Ok(expr)
}

#[derive(Debug, PartialEq)]
enum ExprToken<'a> {
    Name(&'a str),
    LParen,
    RParen,
}

fn lex(text: &str) -> Result<Vec<ExprToken<'_>>, RegistryError> {
    let mut tokens = Vec::new();
    let mut rest = text;
    loop {
        rest = rest.trim_start();
        if rest.is_empty() {
            break;
        }
        if let Some(tail) = rest.strip_prefix('(') {
            tokens.push(ExprToken::LParen);
            rest = tail;
        } else if let Some(tail) = rest.strip_prefix(')') {
            tokens.push(ExprToken::RParen);
            rest = tail;
        } else {
            let end = rest
                .find(|c: char| c.is_whitespace() || c == '(' || c == ')')
                .unwrap_or(rest.len());
            let (word, tail) = rest.split_at(end);
            if word.is_empty() {
                return Err(RegistryError::InvalidFeatureExpression(text.to_string()));
            }
            tokens.push(ExprToken::Name(word));
            rest = tail;
        }
    }
    Ok(tokens)
}

struct ExprParser<'t, 'a> {
    tokens: &'t [ExprToken<'a>],
    pos: usize,
    resolve: &'t dyn Fn(Option<&str>, &str) -> Result<QualName, RegistryError>,
}

impl ExprParser<'_, '_> {
    fn peek_name(&self) -> Option<&str> {
        match self.tokens.get(self.pos) {
            Some(ExprToken::Name(n)) => Some(n),
            _ => None,
        }
    }

    fn parse_or(&mut self) -> Result<FeatureExpr, RegistryError> {
        let mut left = self.parse_and()?;
        while self.peek_name() == Some("or") {
            self.pos += 1;
            let right = self.parse_and()?;
            left = FeatureExpr::Or(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> Result<FeatureExpr, RegistryError> {
        let mut left = self.parse_not()?;
        while self.peek_name() == Some("and") {
            self.pos += 1;
            let right = self.parse_not()?;
            left = FeatureExpr::And(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_not(&mut self) -> Result<FeatureExpr, RegistryError> {
        if self.peek_name() == Some("not") {
            self.pos += 1;
            return Ok(FeatureExpr::Not(Box::new(self.parse_not()?)));
        }
        self.parse_atom()
    }

    fn parse_atom(&mut self) -> Result<FeatureExpr, RegistryError> {
        match self.tokens.get(self.pos) {
            Some(ExprToken::LParen) => {
                self.pos += 1;
                let inner = self.parse_or()?;
                match self.tokens.get(self.pos) {
                    Some(ExprToken::RParen) => {
                        self.pos += 1;
                        Ok(inner)
                    }
                    _ => Err(RegistryError::InvalidFeatureExpression(
                        "missing ')'".to_string(),
                    )),
                }
            }
            Some(ExprToken::Name(word)) if !matches!(*word, "and" | "or" | "not") => {
                self.pos += 1;
                let (prefix, local) = match word.split_once(':') {
                    Some((p, l)) => (Some(p), l),
                    None => (None, *word),
                };
                if !crate::parser::is_identifier(local) {
                    return Err(RegistryError::InvalidFeatureExpression(word.to_string()));
                }
                Ok(FeatureExpr::Feature((self.resolve)(prefix, local)?))
            }
            _ => Err(RegistryError::InvalidFeatureExpression(
                "expected feature name".to_string(),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resolve(prefix: Option<&str>, local: &str) -> Result<QualName, RegistryError> {
        match prefix {
            None | Some("m") => Ok(QualName::new(local, "m")),
            Some(other) => Err(RegistryError::UnknownPrefix(other.to_string())),
        }
    }

    fn eval(text: &str, supported: &[&str]) -> bool {
        let expr = parse_feature_expr(text, &resolve).unwrap();
        expr.holds(&|qn: &QualName| supported.contains(&qn.name.as_str()))
    }

    #[test]
    fn test_single_feature() {
        assert!(eval("a", &["a"]));
        assert!(!eval("a", &[]));
        assert!(eval("m:a", &["a"]));
    }

    #[test]
    fn test_precedence_not_and_or() {
        // not a and b or c == ((not a) and b) or c
        assert!(eval("not a and b or c", &["b"]));
        assert!(eval("not a and b or c", &["a", "c"]));
        assert!(!eval("not a and b or c", &["a", "b"]));
    }

    #[test]
    fn test_parentheses() {
        assert!(!eval("not (a or b)", &["b"]));
        assert!(eval("not (a or b)", &[]));
        assert!(eval("a and (b or c)", &["a", "c"]));
    }

    #[test]
    fn test_invalid() {
        assert!(parse_feature_expr("and a", &resolve).is_err());
        assert!(parse_feature_expr("a b", &resolve).is_err());
        assert!(parse_feature_expr("(a", &resolve).is_err());
        assert!(parse_feature_expr("", &resolve).is_err());
    }

    #[test]
    fn test_unknown_prefix() {
        assert!(matches!(
            parse_feature_expr("x:a", &resolve),
            Err(RegistryError::UnknownPrefix(_))
        ));
    }
}

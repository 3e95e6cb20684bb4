//! Recursive descent parser for XPath 1.0 with YANG extensions.

use std::sync::Arc;

use smol_str::SmolStr;

use crate::base::QualName;

use super::ast::*;
use super::error::XPathError;
use super::lexer::{tokenize, Token, TokenKind};

/// Parse an XPath expression against a schema context.
pub fn parse_xpath(text: &str, context: SchemaContext) -> Result<CompiledExpr, XPathError> {
    parse_xpath_shared(text, Arc::new(context))
}

/// Parse with an already-shared schema context (several expressions of one
/// schema node reuse it).
pub fn parse_xpath_shared(
    text: &str,
    context: Arc<SchemaContext>,
) -> Result<CompiledExpr, XPathError> {
    let tokens =
        tokenize(text).map_err(|offset| XPathError::InvalidXPath(format!("{text} @{offset}")))?;
    let mut parser = Parser {
        tokens: &tokens,
        pos: 0,
        context: &context,
    };
    let expr = parser.parse_or()?;
    if parser.pos != parser.tokens.len() {
        return Err(XPathError::InvalidXPath(format!(
            "trailing input in {text:?}"
        )));
    }
    Ok(CompiledExpr {
        source: text.to_string(),
        context,
        expr,
    })
}

struct Parser<'t, 'a> {
    tokens: &'t [Token<'a>],
    pos: usize,
    context: &'t SchemaContext,
}

impl<'t, 'a> Parser<'t, 'a> {
    fn peek(&self) -> Option<&'t Token<'a>> {
        self.tokens.get(self.pos)
    }

    fn peek2(&self) -> Option<&'t Token<'a>> {
        self.tokens.get(self.pos + 1)
    }

    fn bump(&mut self) -> Result<&'t Token<'a>, XPathError> {
        let token = self.tokens.get(self.pos).ok_or(XPathError::EndOfInput)?;
        self.pos += 1;
        Ok(token)
    }

    fn eat(&mut self, kind: TokenKind) -> bool {
        if self.peek().is_some_and(|t| t.kind == kind) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, kind: TokenKind, what: &str) -> Result<(), XPathError> {
        if self.eat(kind) {
            Ok(())
        } else {
            Err(XPathError::InvalidXPath(format!("expected {what}")))
        }
    }

    /// An NCName in operator position (`or`, `and`, `div`, `mod`).
    fn at_word(&self, word: &str) -> bool {
        self.peek()
            .is_some_and(|t| t.kind == TokenKind::NCName && t.text == word)
    }

    fn resolve_name(&self, prefix: Option<&str>, local: &str) -> Result<QualName, XPathError> {
        let module = match prefix {
            None => self.context.default_module.clone(),
            Some(prefix) => self
                .context
                .prefixes
                .get(prefix)
                .cloned()
                .ok_or_else(|| XPathError::UnknownPrefix(prefix.to_string()))?,
        };
        Ok(QualName::new(local, module))
    }

    // ===== expression grammar =====

    fn parse_or(&mut self) -> Result<Expr, XPathError> {
        let mut left = self.parse_and()?;
        while self.at_word("or") {
            self.pos += 1;
            let right = self.parse_and()?;
            left = Expr::Or(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> Result<Expr, XPathError> {
        let mut left = self.parse_equality()?;
        while self.at_word("and") {
            self.pos += 1;
            let right = self.parse_equality()?;
            left = Expr::And(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_equality(&mut self) -> Result<Expr, XPathError> {
        let mut left = self.parse_relational()?;
        loop {
            let op = match self.peek().map(|t| t.kind) {
                Some(TokenKind::Eq) => CompareOp::Eq,
                Some(TokenKind::NotEq) => CompareOp::NotEq,
                _ => break,
            };
            self.pos += 1;
            let right = self.parse_relational()?;
            left = Expr::Compare(op, Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_relational(&mut self) -> Result<Expr, XPathError> {
        let mut left = self.parse_additive()?;
        loop {
            let op = match self.peek().map(|t| t.kind) {
                Some(TokenKind::Lt) => CompareOp::Lt,
                Some(TokenKind::LtEq) => CompareOp::LtEq,
                Some(TokenKind::Gt) => CompareOp::Gt,
                Some(TokenKind::GtEq) => CompareOp::GtEq,
                _ => break,
            };
            self.pos += 1;
            let right = self.parse_additive()?;
            left = Expr::Compare(op, Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_additive(&mut self) -> Result<Expr, XPathError> {
        let mut left = self.parse_multiplicative()?;
        loop {
            let op = match self.peek().map(|t| t.kind) {
                Some(TokenKind::Plus) => ArithOp::Add,
                Some(TokenKind::Minus) => ArithOp::Sub,
                _ => break,
            };
            self.pos += 1;
            let right = self.parse_multiplicative()?;
            left = Expr::Arith(op, Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_multiplicative(&mut self) -> Result<Expr, XPathError> {
        let mut left = self.parse_unary()?;
        loop {
            let op = if self.peek().is_some_and(|t| t.kind == TokenKind::Star) {
                ArithOp::Mul
            } else if self.at_word("div") {
                ArithOp::Div
            } else if self.at_word("mod") {
                ArithOp::Mod
            } else {
                break;
            };
            self.pos += 1;
            let right = self.parse_unary()?;
            left = Expr::Arith(op, Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_unary(&mut self) -> Result<Expr, XPathError> {
        if self.eat(TokenKind::Minus) {
            return Ok(Expr::Neg(Box::new(self.parse_unary()?)));
        }
        self.parse_union()
    }

    fn parse_union(&mut self) -> Result<Expr, XPathError> {
        let mut left = self.parse_path()?;
        while self.eat(TokenKind::Pipe) {
            let right = self.parse_path()?;
            left = Expr::Union(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    /// PathExpr: a location path, or a filter expression optionally
    /// followed by `/` RelativeLocationPath.
    fn parse_path(&mut self) -> Result<Expr, XPathError> {
        if self.at_primary_start()? {
            let primary = self.parse_primary()?;
            let mut predicates = Vec::new();
            while self.peek().is_some_and(|t| t.kind == TokenKind::LBracket) {
                predicates.push(self.parse_predicate()?);
            }
            let mut steps = Vec::new();
            loop {
                if self.eat(TokenKind::DoubleSlash) {
                    steps.push(Step::descendant_or_self());
                } else if !self.eat(TokenKind::Slash) {
                    break;
                }
                steps.push(self.parse_step()?);
            }
            if predicates.is_empty() && steps.is_empty() {
                return Ok(primary);
            }
            return Ok(Expr::Filter {
                primary: Box::new(primary),
                predicates,
                steps,
            });
        }
        self.parse_location_path().map(Expr::Path)
    }

    /// Does the next token open a primary expression rather than a
    /// location path?
    fn at_primary_start(&self) -> Result<bool, XPathError> {
        let Some(token) = self.peek() else {
            return Err(XPathError::EndOfInput);
        };
        Ok(match token.kind {
            TokenKind::Literal | TokenKind::Number | TokenKind::Dollar | TokenKind::LParen => true,
            TokenKind::NCName => {
                // A function call, unless the name is a node-type test.
                self.peek2().is_some_and(|t| t.kind == TokenKind::LParen)
                    && !matches!(token.text, "node" | "text")
            }
            _ => false,
        })
    }

    fn parse_primary(&mut self) -> Result<Expr, XPathError> {
        let token = self.bump()?;
        match token.kind {
            TokenKind::Literal => Ok(Expr::Literal(token.text[1..token.text.len() - 1].into())),
            TokenKind::Number => token
                .text
                .parse()
                .map(Expr::Number)
                .map_err(|_| XPathError::InvalidXPath(format!("bad number {}", token.text))),
            TokenKind::Dollar => {
                let name = self.bump()?;
                if name.kind != TokenKind::NCName {
                    return Err(XPathError::InvalidXPath("bad variable reference".into()));
                }
                Ok(Expr::VariableRef(name.text.to_string()))
            }
            TokenKind::LParen => {
                let inner = self.parse_or()?;
                self.expect(TokenKind::RParen, "')'")?;
                Ok(inner)
            }
            TokenKind::NCName => {
                let function = Function::from_name(token.text).ok_or_else(|| {
                    XPathError::NotSupported(format!("function {}()", token.text))
                })?;
                self.expect(TokenKind::LParen, "'('")?;
                let mut args = Vec::new();
                if !self.peek().is_some_and(|t| t.kind == TokenKind::RParen) {
                    loop {
                        args.push(self.parse_or()?);
                        if !self.eat(TokenKind::Comma) {
                            break;
                        }
                    }
                }
                self.expect(TokenKind::RParen, "')'")?;
                let (min, max) = function.arity();
                if args.len() < min || args.len() > max {
                    return Err(XPathError::InvalidXPath(format!(
                        "wrong number of arguments to {}()",
                        token.text
                    )));
                }
                Ok(Expr::FunctionCall(function, args))
            }
            _ => Err(XPathError::InvalidXPath(format!(
                "unexpected token {:?}",
                token.text
            ))),
        }
    }

    fn parse_location_path(&mut self) -> Result<PathExpr, XPathError> {
        let mut steps = Vec::new();
        let absolute = match self.peek().map(|t| t.kind) {
            Some(TokenKind::Slash) => {
                self.pos += 1;
                // A lone '/' selects the root.
                if !self.at_step_start() {
                    return Ok(PathExpr {
                        absolute: true,
                        steps,
                    });
                }
                true
            }
            Some(TokenKind::DoubleSlash) => {
                self.pos += 1;
                steps.push(Step::descendant_or_self());
                true
            }
            _ => false,
        };
        steps.push(self.parse_step()?);
        loop {
            if self.eat(TokenKind::DoubleSlash) {
                steps.push(Step::descendant_or_self());
            } else if !self.eat(TokenKind::Slash) {
                break;
            }
            steps.push(self.parse_step()?);
        }
        Ok(PathExpr { absolute, steps })
    }

    fn at_step_start(&self) -> bool {
        matches!(
            self.peek().map(|t| t.kind),
            Some(
                TokenKind::NCName
                    | TokenKind::Star
                    | TokenKind::Dot
                    | TokenKind::DoubleDot
                    | TokenKind::At
            )
        )
    }

    fn parse_step(&mut self) -> Result<Step, XPathError> {
        // Abbreviated steps.
        if self.eat(TokenKind::Dot) {
            return Ok(Step {
                axis: Axis::SelfAxis,
                test: NodeTest::Node,
                predicates: Vec::new(),
            });
        }
        if self.eat(TokenKind::DoubleDot) {
            return Ok(Step {
                axis: Axis::Parent,
                test: NodeTest::Node,
                predicates: Vec::new(),
            });
        }

        let axis = if self.eat(TokenKind::At) {
            Axis::Attribute
        } else if self.peek().is_some_and(|t| t.kind == TokenKind::NCName)
            && self.peek2().is_some_and(|t| t.kind == TokenKind::DoubleColon)
        {
            let name = self.bump()?.text;
            self.pos += 1; // '::'
            match name {
                "ancestor" => Axis::Ancestor,
                "ancestor-or-self" => Axis::AncestorOrSelf,
                "attribute" => Axis::Attribute,
                "child" => Axis::Child,
                "descendant" => Axis::Descendant,
                "descendant-or-self" => Axis::DescendantOrSelf,
                "following" => Axis::Following,
                "following-sibling" => Axis::FollowingSibling,
                "parent" => Axis::Parent,
                "preceding-sibling" => Axis::PrecedingSibling,
                "self" => Axis::SelfAxis,
                "preceding" | "namespace" => {
                    return Err(XPathError::NotSupported(format!("{name} axis")))
                }
                other => {
                    return Err(XPathError::InvalidXPath(format!("unknown axis {other}")))
                }
            }
        } else {
            Axis::Child
        };

        let test = self.parse_node_test()?;
        let mut predicates = Vec::new();
        while self.peek().is_some_and(|t| t.kind == TokenKind::LBracket) {
            predicates.push(self.parse_predicate()?);
        }
        Ok(Step {
            axis,
            test,
            predicates,
        })
    }

    fn parse_node_test(&mut self) -> Result<NodeTest, XPathError> {
        if self.eat(TokenKind::Star) {
            return Ok(NodeTest::AnyName);
        }
        let token = self.bump()?;
        if token.kind != TokenKind::NCName {
            return Err(XPathError::InvalidXPath(format!(
                "expected node test, found {:?}",
                token.text
            )));
        }
        // Node-type tests.
        if self.peek().is_some_and(|t| t.kind == TokenKind::LParen) {
            let test = match token.text {
                "node" => NodeTest::Node,
                "text" => NodeTest::Text,
                "comment" | "processing-instruction" => {
                    return Err(XPathError::NotSupported(format!("{}()", token.text)))
                }
                other => {
                    return Err(XPathError::InvalidXPath(format!("bad node test {other}()")))
                }
            };
            self.pos += 1;
            self.expect(TokenKind::RParen, "')'")?;
            return Ok(test);
        }
        if self.eat(TokenKind::Colon) {
            if self.eat(TokenKind::Star) {
                let module = self
                    .context
                    .prefixes
                    .get(token.text)
                    .cloned()
                    .ok_or_else(|| XPathError::UnknownPrefix(token.text.to_string()))?;
                return Ok(NodeTest::AnyInModule(SmolStr::from(module)));
            }
            let local = self.bump()?;
            if local.kind != TokenKind::NCName {
                return Err(XPathError::InvalidXPath("expected local name".into()));
            }
            return Ok(NodeTest::Name(
                self.resolve_name(Some(token.text), local.text)?,
            ));
        }
        Ok(NodeTest::Name(self.resolve_name(None, token.text)?))
    }

    fn parse_predicate(&mut self) -> Result<Expr, XPathError> {
        self.expect(TokenKind::LBracket, "'['")?;
        let inner = self.parse_or()?;
        self.expect(TokenKind::RBracket, "']'")?;
        Ok(inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn context() -> SchemaContext {
        let mut prefixes = rustc_hash::FxHashMap::default();
        prefixes.insert(SmolStr::new("ex"), SmolStr::new("example-2"));
        SchemaContext {
            default_module: SmolStr::new("example-2"),
            prefixes,
        }
    }

    fn parse(text: &str) -> CompiledExpr {
        parse_xpath(text, context()).unwrap()
    }

    #[test]
    fn test_parse_relative_path() {
        let compiled = parse("../foo/in-words");
        let Expr::Path(path) = &compiled.expr else {
            panic!("expected path");
        };
        assert!(!path.absolute);
        assert_eq!(path.steps.len(), 3);
        assert_eq!(path.steps[0].axis, Axis::Parent);
        assert_eq!(
            path.steps[1].test,
            NodeTest::Name(QualName::new("foo", "example-2"))
        );
    }

    #[test]
    fn test_default_namespace_rule() {
        let compiled = parse("bar");
        let Expr::Path(path) = &compiled.expr else {
            panic!("expected path");
        };
        // Unprefixed name-tests resolve in the context module's namespace.
        assert_eq!(
            path.steps[0].test,
            NodeTest::Name(QualName::new("bar", "example-2"))
        );
    }

    #[test]
    fn test_prefixed_name() {
        let compiled = parse("/ex:bag/foo");
        let Expr::Path(path) = &compiled.expr else {
            panic!("expected path");
        };
        assert!(path.absolute);
        assert_eq!(
            path.steps[0].test,
            NodeTest::Name(QualName::new("bag", "example-2"))
        );
    }

    #[test]
    fn test_unknown_prefix() {
        assert!(matches!(
            parse_xpath("/zz:bag", context()),
            Err(XPathError::UnknownPrefix(_))
        ));
    }

    #[test]
    fn test_operators_and_precedence() {
        let compiled = parse("not(../foo/in-words = 'forty-two')");
        let Expr::FunctionCall(Function::Not, args) = &compiled.expr else {
            panic!("expected function call");
        };
        assert!(matches!(args[0], Expr::Compare(CompareOp::Eq, _, _)));

        let compiled = parse("1 + 2 * 3");
        let Expr::Arith(ArithOp::Add, _, right) = &compiled.expr else {
            panic!("expected addition at the top");
        };
        assert!(matches!(**right, Expr::Arith(ArithOp::Mul, _, _)));
    }

    #[test]
    fn test_star_disambiguation() {
        // First '*' is a name test, second is multiplication.
        let compiled = parse_xpath("count(*) * 2", context()).unwrap();
        assert!(matches!(compiled.expr, Expr::Arith(ArithOp::Mul, _, _)));
    }

    #[test]
    fn test_predicates_and_position() {
        let compiled = parse("foo[number = 3][position() = last()]");
        let Expr::Path(path) = &compiled.expr else {
            panic!("expected path");
        };
        assert_eq!(path.steps[0].predicates.len(), 2);
    }

    #[test]
    fn test_double_slash_expansion() {
        let compiled = parse("//in-words");
        let Expr::Path(path) = &compiled.expr else {
            panic!("expected path");
        };
        assert_eq!(path.steps.len(), 2);
        assert_eq!(path.steps[0].axis, Axis::DescendantOrSelf);
        assert_eq!(path.steps[0].test, NodeTest::Node);
    }

    #[test]
    fn test_unsupported_constructs() {
        assert!(matches!(
            parse_xpath("preceding::foo", context()),
            Err(XPathError::NotSupported(_))
        ));
        assert!(matches!(
            parse_xpath("namespace::foo", context()),
            Err(XPathError::NotSupported(_))
        ));
        assert!(matches!(
            parse_xpath("id('x')", context()),
            Err(XPathError::NotSupported(_))
        ));
    }

    #[test]
    fn test_filter_with_path() {
        let compiled = parse("current()/../fooref");
        assert!(matches!(compiled.expr, Expr::Filter { .. }));
    }

    #[test]
    fn test_arity_errors() {
        assert!(parse_xpath("count()", context()).is_err());
        assert!(parse_xpath("substring('a')", context()).is_err());
        assert!(parse_xpath("true(1)", context()).is_err());
    }

    #[test]
    fn test_variable_reference() {
        let compiled = parse("$start + 1");
        assert!(matches!(compiled.expr, Expr::Arith(ArithOp::Add, _, _)));
    }
}

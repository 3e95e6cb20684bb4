//! XPath abstract syntax.
//!
//! The schema context known at parse time of the enclosing statement
//! (default namespace module and prefix map) is captured here, so the
//! evaluator needs only an instance focus: unprefixed name tests are
//! already resolved against the correct module.

use std::sync::Arc;

use rustc_hash::FxHashMap;
use smol_str::SmolStr;

use crate::base::QualName;

/// Prefix resolution context captured at parse time.
#[derive(Debug, Clone, Default)]
pub struct SchemaContext {
    /// Module whose namespace unprefixed name-tests resolve in.
    pub default_module: SmolStr,
    /// Prefix → module name.
    pub prefixes: FxHashMap<SmolStr, SmolStr>,
}

/// A parsed expression plus its captured schema context.
#[derive(Debug, Clone)]
pub struct CompiledExpr {
    pub source: String,
    pub context: Arc<SchemaContext>,
    pub expr: Expr,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Or(Box<Expr>, Box<Expr>),
    And(Box<Expr>, Box<Expr>),
    Compare(CompareOp, Box<Expr>, Box<Expr>),
    Arith(ArithOp, Box<Expr>, Box<Expr>),
    Neg(Box<Expr>),
    Union(Box<Expr>, Box<Expr>),
    Path(PathExpr),
    /// A primary expression filtered by predicates, optionally followed by
    /// a relative location path.
    Filter {
        primary: Box<Expr>,
        predicates: Vec<Expr>,
        steps: Vec<Step>,
    },
    Literal(String),
    Number(f64),
    FunctionCall(Function, Vec<Expr>),
    /// Parsed for future extensibility; evaluation reports NotSupported.
    VariableRef(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArithOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PathExpr {
    pub absolute: bool,
    pub steps: Vec<Step>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Step {
    pub axis: Axis,
    pub test: NodeTest,
    pub predicates: Vec<Expr>,
}

impl Step {
    /// `descendant-or-self::node()`, the expansion of `//`.
    pub fn descendant_or_self() -> Self {
        Step {
            axis: Axis::DescendantOrSelf,
            test: NodeTest::Node,
            predicates: Vec::new(),
        }
    }
}

/// Supported axes. `preceding::` and `namespace::` are rejected at parse
/// time with NotSupported.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    Ancestor,
    AncestorOrSelf,
    Attribute,
    Child,
    Descendant,
    DescendantOrSelf,
    Following,
    FollowingSibling,
    Parent,
    PrecedingSibling,
    SelfAxis,
}

#[derive(Debug, Clone, PartialEq)]
pub enum NodeTest {
    /// Name test, fully resolved against the schema context.
    Name(QualName),
    /// `*`
    AnyName,
    /// `prefix:*`
    AnyInModule(SmolStr),
    /// `node()`
    Node,
    /// `text()`
    Text,
}

/// Supported function library: XPath 1.0 core plus the YANG 1.1 additions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Function {
    // XPath 1.0 core
    Boolean,
    Ceiling,
    Concat,
    Contains,
    Count,
    False,
    Floor,
    Last,
    LocalName,
    Name,
    NamespaceUri,
    NormalizeSpace,
    Not,
    Number,
    Position,
    Round,
    StartsWith,
    String,
    StringLength,
    Substring,
    SubstringAfter,
    SubstringBefore,
    Sum,
    Translate,
    True,
    // YANG 1.1 (RFC 7950 §10)
    BitIsSet,
    Current,
    Deref,
    DerivedFrom,
    DerivedFromOrSelf,
    EnumValue,
    ReMatch,
}

impl Function {
    /// Look up a function by name; `None` for unknown names.
    pub fn from_name(name: &str) -> Option<Function> {
        Some(match name {
            "boolean" => Function::Boolean,
            "ceiling" => Function::Ceiling,
            "concat" => Function::Concat,
            "contains" => Function::Contains,
            "count" => Function::Count,
            "false" => Function::False,
            "floor" => Function::Floor,
            "last" => Function::Last,
            "local-name" => Function::LocalName,
            "name" => Function::Name,
            "namespace-uri" => Function::NamespaceUri,
            "normalize-space" => Function::NormalizeSpace,
            "not" => Function::Not,
            "number" => Function::Number,
            "position" => Function::Position,
            "round" => Function::Round,
            "starts-with" => Function::StartsWith,
            "string" => Function::String,
            "string-length" => Function::StringLength,
            "substring" => Function::Substring,
            "substring-after" => Function::SubstringAfter,
            "substring-before" => Function::SubstringBefore,
            "sum" => Function::Sum,
            "translate" => Function::Translate,
            "true" => Function::True,
            "bit-is-set" => Function::BitIsSet,
            "current" => Function::Current,
            "deref" => Function::Deref,
            "derived-from" => Function::DerivedFrom,
            "derived-from-or-self" => Function::DerivedFromOrSelf,
            "enum-value" => Function::EnumValue,
            "re-match" => Function::ReMatch,
            _ => return None,
        })
    }

    /// Inclusive argument-count bounds.
    pub fn arity(self) -> (usize, usize) {
        match self {
            Function::Current | Function::False | Function::Last | Function::Position
            | Function::True => (0, 0),
            Function::Boolean
            | Function::Ceiling
            | Function::Count
            | Function::Deref
            | Function::EnumValue
            | Function::Floor
            | Function::Round
            | Function::Sum => (1, 1),
            Function::LocalName
            | Function::Name
            | Function::NamespaceUri
            | Function::NormalizeSpace
            | Function::Number
            | Function::String
            | Function::StringLength => (0, 1),
            Function::Not => (1, 1),
            Function::BitIsSet
            | Function::Contains
            | Function::DerivedFrom
            | Function::DerivedFromOrSelf
            | Function::ReMatch
            | Function::StartsWith
            | Function::SubstringAfter
            | Function::SubstringBefore => (2, 2),
            Function::Substring => (2, 3),
            Function::Translate => (3, 3),
            Function::Concat => (2, usize::MAX),
        }
    }
}

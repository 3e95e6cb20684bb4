//! Tree-walking XPath evaluator over instance foci.
//!
//! Each `evaluate` call is self-contained: the focus carries the data
//! model, and the schema context captured at parse time resolves names
//! and identity arguments. Type conversions follow XPath 1.0.

use rustc_hash::FxHashSet;

use crate::instance::{Focus, Value};
use crate::types::{compile_pattern, TypeSpec};

use super::ast::*;
use super::error::XPathError;

type Result<T> = std::result::Result<T, XPathError>;

/// The XPath value domain: node-set, boolean, number, or string.
#[derive(Debug, Clone)]
pub enum XPathValue {
    NodeSet(Vec<Focus>),
    Boolean(bool),
    Number(f64),
    String(String),
}

impl XPathValue {
    pub fn boolean(&self) -> bool {
        match self {
            XPathValue::NodeSet(nodes) => !nodes.is_empty(),
            XPathValue::Boolean(b) => *b,
            XPathValue::Number(n) => *n != 0.0 && !n.is_nan(),
            XPathValue::String(s) => !s.is_empty(),
        }
    }

    pub fn number(&self) -> f64 {
        match self {
            XPathValue::NodeSet(_) => str_to_number(&self.string()),
            XPathValue::Boolean(b) => {
                if *b {
                    1.0
                } else {
                    0.0
                }
            }
            XPathValue::Number(n) => *n,
            XPathValue::String(s) => str_to_number(s),
        }
    }

    pub fn string(&self) -> String {
        match self {
            XPathValue::NodeSet(nodes) => nodes
                .first()
                .map(|node| node.string_value())
                .unwrap_or_default(),
            XPathValue::Boolean(b) => b.to_string(),
            XPathValue::Number(n) => format_number(*n),
            XPathValue::String(s) => s.clone(),
        }
    }

    fn node_set(self, what: &str) -> Result<Vec<Focus>> {
        match self {
            XPathValue::NodeSet(nodes) => Ok(nodes),
            _ => Err(XPathError::TypeError(format!("{what} requires a node-set"))),
        }
    }
}

/// XPath number → string (XPath 1.0 §4.2).
pub(crate) fn format_number(n: f64) -> String {
    if n.is_nan() {
        "NaN".to_string()
    } else if n.is_infinite() {
        if n > 0.0 {
            "Infinity".to_string()
        } else {
            "-Infinity".to_string()
        }
    } else if n == n.trunc() && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        format!("{n}")
    }
}

fn str_to_number(s: &str) -> f64 {
    s.trim().parse().unwrap_or(f64::NAN)
}

/// Evaluate a compiled expression with `focus` as both the context node
/// and the `current()` node.
pub fn evaluate(expr: &CompiledExpr, focus: &Focus) -> Result<XPathValue> {
    let evaluator = Evaluator {
        current: focus,
        context: &expr.context,
    };
    evaluator.eval(&expr.expr, focus, 1, 1)
}

struct Evaluator<'a> {
    /// The initial context node, returned by `current()`.
    current: &'a Focus,
    context: &'a SchemaContext,
}

impl Evaluator<'_> {
    fn eval(&self, expr: &Expr, node: &Focus, position: usize, size: usize) -> Result<XPathValue> {
        match expr {
            Expr::Or(a, b) => {
                let left = self.eval(a, node, position, size)?.boolean();
                Ok(XPathValue::Boolean(
                    left || self.eval(b, node, position, size)?.boolean(),
                ))
            }
            Expr::And(a, b) => {
                let left = self.eval(a, node, position, size)?.boolean();
                Ok(XPathValue::Boolean(
                    left && self.eval(b, node, position, size)?.boolean(),
                ))
            }
            Expr::Compare(op, a, b) => {
                let left = self.eval(a, node, position, size)?;
                let right = self.eval(b, node, position, size)?;
                Ok(XPathValue::Boolean(compare(*op, &left, &right)))
            }
            Expr::Arith(op, a, b) => {
                let left = self.eval(a, node, position, size)?.number();
                let right = self.eval(b, node, position, size)?.number();
                Ok(XPathValue::Number(match op {
                    ArithOp::Add => left + right,
                    ArithOp::Sub => left - right,
                    ArithOp::Mul => left * right,
                    ArithOp::Div => left / right,
                    ArithOp::Mod => left % right,
                }))
            }
            Expr::Neg(inner) => Ok(XPathValue::Number(
                -self.eval(inner, node, position, size)?.number(),
            )),
            Expr::Union(a, b) => {
                let mut left = self.eval(a, node, position, size)?.node_set("union")?;
                let right = self.eval(b, node, position, size)?.node_set("union")?;
                left.extend(right);
                Ok(XPathValue::NodeSet(dedup(left)))
            }
            Expr::Path(path) => {
                let start = if path.absolute {
                    vec![node.top()]
                } else {
                    vec![node.clone()]
                };
                Ok(XPathValue::NodeSet(self.eval_steps(&path.steps, start)?))
            }
            Expr::Filter {
                primary,
                predicates,
                steps,
            } => {
                let value = self.eval(primary, node, position, size)?;
                if predicates.is_empty() && steps.is_empty() {
                    return Ok(value);
                }
                let nodes = value.node_set("a filtered expression")?;
                let nodes = self.apply_predicates(predicates, nodes)?;
                Ok(XPathValue::NodeSet(self.eval_steps(steps, nodes)?))
            }
            Expr::Literal(s) => Ok(XPathValue::String(s.clone())),
            Expr::Number(n) => Ok(XPathValue::Number(*n)),
            Expr::VariableRef(name) => {
                Err(XPathError::NotSupported(format!("variable ${name}")))
            }
            Expr::FunctionCall(function, args) => {
                self.call(*function, args, node, position, size)
            }
        }
    }

    fn eval_steps(&self, steps: &[Step], mut current: Vec<Focus>) -> Result<Vec<Focus>> {
        for step in steps {
            let mut next = Vec::new();
            for node in &current {
                let mut candidates = Vec::new();
                self.axis_nodes(step.axis, node, &mut candidates);
                candidates.retain(|candidate| self.test(&step.test, candidate));
                let filtered = self.apply_predicates(&step.predicates, candidates)?;
                next.extend(filtered);
            }
            current = dedup(next);
        }
        Ok(current)
    }

    /// Predicates evaluate in position-order; `position()` and `last()`
    /// are relative to the current step's node-set.
    fn apply_predicates(&self, predicates: &[Expr], mut nodes: Vec<Focus>) -> Result<Vec<Focus>> {
        for predicate in predicates {
            let size = nodes.len();
            let mut kept = Vec::with_capacity(nodes.len());
            for (index, node) in nodes.iter().enumerate() {
                let value = self.eval(predicate, node, index + 1, size)?;
                let keep = match value {
                    // A numeric predicate selects by position.
                    XPathValue::Number(n) => (index + 1) as f64 == n,
                    other => other.boolean(),
                };
                if keep {
                    kept.push(node.clone());
                }
            }
            nodes = kept;
        }
        Ok(nodes)
    }

    fn axis_nodes(&self, axis: Axis, node: &Focus, out: &mut Vec<Focus>) {
        match axis {
            Axis::Child => out.extend(node.child_nodes()),
            Axis::Descendant => descendants(node, out),
            Axis::DescendantOrSelf => {
                out.push(node.clone());
                descendants(node, out);
            }
            Axis::Parent => out.extend(node.xpath_parent()),
            Axis::Ancestor => {
                let mut current = node.xpath_parent();
                while let Some(parent) = current {
                    current = parent.xpath_parent();
                    out.push(parent);
                }
            }
            Axis::AncestorOrSelf => {
                out.push(node.clone());
                self.axis_nodes(Axis::Ancestor, node, out);
            }
            Axis::SelfAxis => out.push(node.clone()),
            Axis::FollowingSibling => out.extend(self.siblings(node, true)),
            Axis::PrecedingSibling => out.extend(self.siblings(node, false)),
            Axis::Following => {
                let mut current = node.clone();
                loop {
                    for sibling in self.siblings(&current, true) {
                        out.push(sibling.clone());
                        descendants(&sibling, out);
                    }
                    match current.xpath_parent() {
                        Some(parent) => current = parent,
                        None => break,
                    }
                }
            }
            // Instance data has no attributes; the axis is empty.
            Axis::Attribute => {}
        }
    }

    fn siblings(&self, node: &Focus, following: bool) -> Vec<Focus> {
        let Some(parent) = node.xpath_parent() else {
            return Vec::new();
        };
        let children = parent.child_nodes();
        let own = node.route();
        let Some(index) = children.iter().position(|c| c.route() == own) else {
            return Vec::new();
        };
        if following {
            children[index + 1..].to_vec()
        } else {
            let mut before = children[..index].to_vec();
            before.reverse();
            before
        }
    }

    fn test(&self, test: &NodeTest, node: &Focus) -> bool {
        match test {
            NodeTest::Node => true,
            // Leaves carry their text; interior nodes have no text of
            // their own.
            NodeTest::Text => !node.value().is_structured(),
            NodeTest::AnyName => node.node_name().is_some(),
            NodeTest::AnyInModule(module) => node
                .node_name()
                .is_some_and(|(_, m)| m == *module),
            NodeTest::Name(qn) => node
                .node_name()
                .is_some_and(|(local, module)| local == qn.name && module == qn.module),
        }
    }

    // ===== function library =====

    fn call(
        &self,
        function: Function,
        args: &[Expr],
        node: &Focus,
        position: usize,
        size: usize,
    ) -> Result<XPathValue> {
        let arg = |index: usize| -> Result<XPathValue> {
            self.eval(&args[index], node, position, size)
        };
        match function {
            Function::True => Ok(XPathValue::Boolean(true)),
            Function::False => Ok(XPathValue::Boolean(false)),
            Function::Not => Ok(XPathValue::Boolean(!arg(0)?.boolean())),
            Function::Boolean => Ok(XPathValue::Boolean(arg(0)?.boolean())),
            Function::Number => Ok(XPathValue::Number(match args.is_empty() {
                true => str_to_number(&node.string_value()),
                false => arg(0)?.number(),
            })),
            Function::String => Ok(XPathValue::String(match args.is_empty() {
                true => node.string_value(),
                false => arg(0)?.string(),
            })),
            Function::Position => Ok(XPathValue::Number(position as f64)),
            Function::Last => Ok(XPathValue::Number(size as f64)),
            Function::Count => Ok(XPathValue::Number(
                arg(0)?.node_set("count()")?.len() as f64
            )),
            Function::Sum => {
                let nodes = arg(0)?.node_set("sum()")?;
                Ok(XPathValue::Number(
                    nodes
                        .iter()
                        .map(|n| str_to_number(&n.string_value()))
                        .sum(),
                ))
            }
            Function::Floor => Ok(XPathValue::Number(arg(0)?.number().floor())),
            Function::Ceiling => Ok(XPathValue::Number(arg(0)?.number().ceil())),
            Function::Round => {
                let n = arg(0)?.number();
                // round(-0.5) is -0 per XPath; plain rounding is fine here.
                Ok(XPathValue::Number((n + 0.5).floor()))
            }
            Function::Concat => {
                let mut out = String::new();
                for index in 0..args.len() {
                    out.push_str(&arg(index)?.string());
                }
                Ok(XPathValue::String(out))
            }
            Function::StartsWith => Ok(XPathValue::Boolean(
                arg(0)?.string().starts_with(&arg(1)?.string()),
            )),
            Function::Contains => Ok(XPathValue::Boolean(
                arg(0)?.string().contains(&arg(1)?.string()),
            )),
            Function::SubstringBefore => {
                let haystack = arg(0)?.string();
                let needle = arg(1)?.string();
                Ok(XPathValue::String(
                    haystack
                        .split_once(&needle)
                        .map(|(before, _)| before.to_string())
                        .unwrap_or_default(),
                ))
            }
            Function::SubstringAfter => {
                let haystack = arg(0)?.string();
                let needle = arg(1)?.string();
                Ok(XPathValue::String(
                    haystack
                        .split_once(&needle)
                        .map(|(_, after)| after.to_string())
                        .unwrap_or_default(),
                ))
            }
            Function::Substring => {
                let s: Vec<char> = arg(0)?.string().chars().collect();
                let start = arg(1)?.number();
                let length = if args.len() == 3 {
                    arg(2)?.number()
                } else {
                    f64::INFINITY
                };
                if start.is_nan() || length.is_nan() {
                    return Ok(XPathValue::String(String::new()));
                }
                let begin = (start + 0.5).floor();
                let end = begin + if length.is_infinite() {
                    f64::INFINITY
                } else {
                    (length + 0.5).floor()
                };
                let out: String = s
                    .iter()
                    .enumerate()
                    .filter(|(i, _)| {
                        let pos = (*i + 1) as f64;
                        pos >= begin && pos < end
                    })
                    .map(|(_, c)| c)
                    .collect();
                Ok(XPathValue::String(out))
            }
            Function::StringLength => {
                let s = if args.is_empty() {
                    node.string_value()
                } else {
                    arg(0)?.string()
                };
                Ok(XPathValue::Number(s.chars().count() as f64))
            }
            Function::NormalizeSpace => {
                let s = if args.is_empty() {
                    node.string_value()
                } else {
                    arg(0)?.string()
                };
                Ok(XPathValue::String(
                    s.split_whitespace().collect::<Vec<_>>().join(" "),
                ))
            }
            Function::Translate => {
                let input = arg(0)?.string();
                let from: Vec<char> = arg(1)?.string().chars().collect();
                let to: Vec<char> = arg(2)?.string().chars().collect();
                let out: String = input
                    .chars()
                    .filter_map(|c| match from.iter().position(|&f| f == c) {
                        Some(index) => to.get(index).copied(),
                        None => Some(c),
                    })
                    .collect();
                Ok(XPathValue::String(out))
            }
            Function::LocalName | Function::Name | Function::NamespaceUri => {
                let target = if args.is_empty() {
                    Some(node.clone())
                } else {
                    arg(0)?.node_set("name()")?.into_iter().next()
                };
                let Some((local, module)) = target.and_then(|t| t.node_name()) else {
                    return Ok(XPathValue::String(String::new()));
                };
                Ok(XPathValue::String(match function {
                    Function::LocalName => local.to_string(),
                    Function::Name => format!("{module}:{local}"),
                    _ => module.to_string(),
                }))
            }
            Function::Current => Ok(XPathValue::NodeSet(vec![self.current.clone()])),
            Function::Deref => self.deref(arg(0)?),
            Function::DerivedFrom => self.derived_from(arg(0)?, &arg(1)?.string(), false),
            Function::DerivedFromOrSelf => self.derived_from(arg(0)?, &arg(1)?.string(), true),
            Function::EnumValue => {
                let nodes = arg(0)?.node_set("enum-value()")?;
                Ok(XPathValue::Number(self.enum_value(nodes.first())))
            }
            Function::BitIsSet => {
                let nodes = arg(0)?.node_set("bit-is-set()")?;
                let bit = arg(1)?.string();
                let set = nodes.first().is_some_and(|n| match n.value() {
                    Value::Bits(names) => names.iter().any(|name| name.as_str() == bit),
                    _ => false,
                });
                Ok(XPathValue::Boolean(set))
            }
            Function::ReMatch => {
                let subject = arg(0)?.string();
                let pattern = arg(1)?.string();
                let regex = compile_pattern(&pattern)
                    .map_err(|e| XPathError::InvalidXPath(format!("re-match: {e}")))?;
                Ok(XPathValue::Boolean(regex.is_match(&subject)))
            }
        }
    }

    /// YANG 1.1 `deref()`: follow a leafref or instance-identifier leaf to
    /// the node(s) it refers to.
    fn deref(&self, value: XPathValue) -> Result<XPathValue> {
        let nodes = value.node_set("deref()")?;
        let Some(node) = nodes.first() else {
            return Ok(XPathValue::NodeSet(Vec::new()));
        };
        let model = node.model().clone();
        let schema_node = model.schema.node(node.schema());
        let Some(data_type) = schema_node.data_type() else {
            return Err(XPathError::TypeError("deref() of a non-leaf".to_string()));
        };
        match &data_type.spec {
            TypeSpec::Leafref {
                compiled_path,
                target,
                ..
            } => {
                let wanted = match target {
                    Some(target) => target.canonical_string(node.value()),
                    None => node.value().as_xpath_string(),
                };
                let targets = evaluate(compiled_path, node)?.node_set("leafref path")?;
                let matching = targets
                    .into_iter()
                    .filter(|t| t.string_value() == wanted)
                    .collect();
                Ok(XPathValue::NodeSet(matching))
            }
            TypeSpec::InstanceIdentifier { .. } => {
                let Value::InstanceRef(route) = node.value() else {
                    return Ok(XPathValue::NodeSet(Vec::new()));
                };
                match node.top().goto(route) {
                    Ok(target) => Ok(XPathValue::NodeSet(vec![target])),
                    Err(_) => Ok(XPathValue::NodeSet(Vec::new())),
                }
            }
            _ => Err(XPathError::TypeError(
                "deref() of a leaf that is neither leafref nor instance-identifier".to_string(),
            )),
        }
    }

    /// `derived-from(-or-self)()`: identity derivation test against the
    /// schema context's namespace rules.
    fn derived_from(
        &self,
        value: XPathValue,
        identity: &str,
        or_self: bool,
    ) -> Result<XPathValue> {
        let nodes = value.node_set("derived-from()")?;
        let base = match identity.split_once(':') {
            Some((prefix, local)) => {
                let module = self
                    .context
                    .prefixes
                    .get(prefix)
                    .ok_or_else(|| XPathError::UnknownPrefix(prefix.to_string()))?;
                crate::base::QualName::new(local, module.clone())
            }
            None => crate::base::QualName::new(
                identity,
                self.context.default_module.clone(),
            ),
        };
        let result = nodes.iter().any(|node| {
            let Value::IdentityRef(qn) = node.value() else {
                return false;
            };
            let registry = &node.model().registry;
            if or_self {
                registry.is_derived_or_self(qn, &base)
            } else {
                registry.is_derived_from(qn, &base)
            }
        });
        Ok(XPathValue::Boolean(result))
    }

    fn enum_value(&self, node: Option<&Focus>) -> f64 {
        let Some(node) = node else {
            return f64::NAN;
        };
        let model = node.model();
        let Some(data_type) = model.schema.node(node.schema()).data_type() else {
            return f64::NAN;
        };
        let (TypeSpec::Enumeration { values }, Value::String(name)) =
            (&data_type.spec, node.value())
        else {
            return f64::NAN;
        };
        values
            .get(name.as_str())
            .map(|&v| v as f64)
            .unwrap_or(f64::NAN)
    }
}

fn descendants(node: &Focus, out: &mut Vec<Focus>) {
    for child in node.child_nodes() {
        out.push(child.clone());
        descendants(&child, out);
    }
}

fn dedup(nodes: Vec<Focus>) -> Vec<Focus> {
    let mut seen = FxHashSet::default();
    let mut out = Vec::with_capacity(nodes.len());
    for node in nodes {
        if seen.insert(node.path()) {
            out.push(node);
        }
    }
    out
}

/// XPath 1.0 comparison semantics, including node-set existential rules.
fn compare(op: CompareOp, left: &XPathValue, right: &XPathValue) -> bool {
    use XPathValue::*;
    match (left, right) {
        (NodeSet(a), NodeSet(b)) => {
            let values: Vec<std::string::String> = b.iter().map(|n| n.string_value()).collect();
            a.iter().any(|na| {
                let sa = na.string_value();
                values.iter().any(|sb| cmp_strings(op, &sa, sb))
            })
        }
        (NodeSet(nodes), Boolean(_)) => {
            compare_scalars(op, &Boolean(!nodes.is_empty()), right)
        }
        (Boolean(_), NodeSet(nodes)) => {
            compare_scalars(op, left, &Boolean(!nodes.is_empty()))
        }
        (NodeSet(nodes), other) => nodes.iter().any(|n| {
            let node_value = match other {
                Number(_) => Number(str_to_number(&n.string_value())),
                _ => String(n.string_value()),
            };
            compare_scalars(op, &node_value, other)
        }),
        (other, NodeSet(nodes)) => nodes.iter().any(|n| {
            let node_value = match other {
                Number(_) => Number(str_to_number(&n.string_value())),
                _ => String(n.string_value()),
            };
            compare_scalars(op, other, &node_value)
        }),
        _ => compare_scalars(op, left, right),
    }
}

fn compare_scalars(op: CompareOp, left: &XPathValue, right: &XPathValue) -> bool {
    use XPathValue::*;
    match op {
        CompareOp::Eq | CompareOp::NotEq => {
            let equal = match (left, right) {
                (Boolean(_), _) | (_, Boolean(_)) => left.boolean() == right.boolean(),
                (Number(_), _) | (_, Number(_)) => left.number() == right.number(),
                _ => left.string() == right.string(),
            };
            (op == CompareOp::Eq) == equal
        }
        _ => {
            let a = left.number();
            let b = right.number();
            match op {
                CompareOp::Lt => a < b,
                CompareOp::LtEq => a <= b,
                CompareOp::Gt => a > b,
                CompareOp::GtEq => a >= b,
                _ => unreachable!(),
            }
        }
    }
}

fn cmp_strings(op: CompareOp, a: &str, b: &str) -> bool {
    match op {
        CompareOp::Eq => a == b,
        CompareOp::NotEq => a != b,
        CompareOp::Lt => str_to_number(a) < str_to_number(b),
        CompareOp::LtEq => str_to_number(a) <= str_to_number(b),
        CompareOp::Gt => str_to_number(a) > str_to_number(b),
        CompareOp::GtEq => str_to_number(a) >= str_to_number(b),
    }
}

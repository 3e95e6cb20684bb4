//! Cooked instance values.
//!
//! Raw JSON-parsed values (`serde_json::Value`) are a separate type; cooking
//! happens exactly once, driven by the schema node that applies. Structured
//! values are shared through `Arc`, so copy-on-write edits duplicate exactly
//! one chain of objects per mutation.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use std::time::SystemTime;

use indexmap::IndexMap;
use rustc_hash::FxHasher;
use smol_str::SmolStr;

use crate::base::{InstanceName, QualName};
use crate::instance::route::InstanceRoute;

/// A typed value after schema-driven conversion.
#[derive(Debug, Clone)]
pub enum Value {
    /// JSON null inside anydata subtrees.
    Null,
    /// Cooked form of the `empty` type (raw `[null]`).
    Empty,
    Boolean(bool),
    Int8(i8),
    Int16(i16),
    Int32(i32),
    Int64(i64),
    Uint8(u8),
    Uint16(u16),
    Uint32(u32),
    Uint64(u64),
    Decimal64(Decimal64),
    String(String),
    Binary(Vec<u8>),
    /// Ordered set of bit names.
    Bits(Vec<SmolStr>),
    IdentityRef(QualName),
    InstanceRef(Box<InstanceRoute>),
    Object(Arc<ObjectValue>),
    Array(Arc<ArrayValue>),
}

/// A fixed-precision decimal: `digits * 10^-fraction_digits`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Decimal64 {
    pub digits: i64,
    pub fraction_digits: u8,
}

impl Decimal64 {
    pub fn new(digits: i64, fraction_digits: u8) -> Self {
        Self {
            digits,
            fraction_digits,
        }
    }

    /// Parse a decimal string into a value scaled to `fraction_digits`.
    pub fn parse(text: &str, fraction_digits: u8) -> Option<Self> {
        let text = text.trim();
        let (sign, rest) = match text.strip_prefix('-') {
            Some(rest) => (-1i64, rest),
            None => (1i64, text.strip_prefix('+').unwrap_or(text)),
        };
        let (int_part, frac_part) = match rest.split_once('.') {
            Some((i, f)) => (i, f),
            None => (rest, ""),
        };
        if int_part.is_empty() && frac_part.is_empty() {
            return None;
        }
        if !int_part.chars().all(|c| c.is_ascii_digit())
            || !frac_part.chars().all(|c| c.is_ascii_digit())
            || frac_part.len() > fraction_digits as usize
        {
            return None;
        }
        let mut digits: i64 = if int_part.is_empty() {
            0
        } else {
            int_part.parse().ok()?
        };
        for c in frac_part
            .chars()
            .chain(std::iter::repeat('0'))
            .take(fraction_digits as usize)
        {
            digits = digits
                .checked_mul(10)?
                .checked_add(c.to_digit(10)? as i64)?;
        }
        Some(Self::new(sign * digits, fraction_digits))
    }

    pub fn as_f64(self) -> f64 {
        self.digits as f64 / 10f64.powi(self.fraction_digits as i32)
    }
}

impl fmt::Display for Decimal64 {
    /// Canonical lexical form: exactly `fraction_digits` digits after the
    /// decimal point.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let scale = 10i64.pow(self.fraction_digits as u32);
        let sign = if self.digits < 0 { "-" } else { "" };
        let magnitude = self.digits.unsigned_abs();
        let int_part = magnitude / scale as u64;
        let frac_part = magnitude % scale as u64;
        if self.fraction_digits == 0 {
            write!(f, "{sign}{int_part}")
        } else {
            write!(
                f,
                "{sign}{int_part}.{frac_part:0width$}",
                width = self.fraction_digits as usize
            )
        }
    }
}

/// Mapping from instance name to value; insertion order preserved.
#[derive(Debug, Clone)]
pub struct ObjectValue {
    pub members: IndexMap<InstanceName, Value>,
    /// Last-modification timestamp of this subtree.
    pub timestamp: SystemTime,
}

impl ObjectValue {
    pub fn new(members: IndexMap<InstanceName, Value>) -> Self {
        Self {
            members,
            timestamp: SystemTime::now(),
        }
    }

    pub fn with_timestamp(members: IndexMap<InstanceName, Value>, timestamp: SystemTime) -> Self {
        Self { members, timestamp }
    }
}

/// Ordered sequence of entry values.
#[derive(Debug, Clone)]
pub struct ArrayValue {
    pub entries: Vec<Value>,
    /// Last-modification timestamp of this subtree.
    pub timestamp: SystemTime,
}

impl ArrayValue {
    pub fn new(entries: Vec<Value>) -> Self {
        Self {
            entries,
            timestamp: SystemTime::now(),
        }
    }

    pub fn with_timestamp(entries: Vec<Value>, timestamp: SystemTime) -> Self {
        Self { entries, timestamp }
    }
}

impl Value {
    pub fn object(members: IndexMap<InstanceName, Value>) -> Self {
        Value::Object(Arc::new(ObjectValue::new(members)))
    }

    pub fn array(entries: Vec<Value>) -> Self {
        Value::Array(Arc::new(ArrayValue::new(entries)))
    }

    pub fn is_structured(&self) -> bool {
        matches!(self, Value::Object(_) | Value::Array(_))
    }

    pub fn as_object(&self) -> Option<&ObjectValue> {
        match self {
            Value::Object(obj) => Some(obj),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&ArrayValue> {
        match self {
            Value::Array(arr) => Some(arr),
            _ => None,
        }
    }

    /// Timestamp of a structured value, if any.
    pub fn timestamp(&self) -> Option<SystemTime> {
        match self {
            Value::Object(obj) => Some(obj.timestamp),
            Value::Array(arr) => Some(arr.timestamp),
            _ => None,
        }
    }

    /// Stable structural hash over the value, ignoring timestamps.
    pub fn structural_hash(&self) -> u64 {
        let mut hasher = FxHasher::default();
        self.hash(&mut hasher);
        hasher.finish()
    }

    /// The value as an XPath string (canonical scalar form; structured
    /// values stringify to empty, as they have no lexical representation).
    pub fn as_xpath_string(&self) -> String {
        match self {
            Value::Null | Value::Empty | Value::Object(_) | Value::Array(_) => String::new(),
            Value::Boolean(b) => b.to_string(),
            Value::Int8(n) => n.to_string(),
            Value::Int16(n) => n.to_string(),
            Value::Int32(n) => n.to_string(),
            Value::Int64(n) => n.to_string(),
            Value::Uint8(n) => n.to_string(),
            Value::Uint16(n) => n.to_string(),
            Value::Uint32(n) => n.to_string(),
            Value::Uint64(n) => n.to_string(),
            Value::Decimal64(d) => d.to_string(),
            Value::String(s) => s.clone(),
            Value::Binary(bytes) => {
                use base64::Engine;
                base64::engine::general_purpose::STANDARD.encode(bytes)
            }
            Value::Bits(names) => names
                .iter()
                .map(|n| n.as_str())
                .collect::<Vec<_>>()
                .join(" "),
            Value::IdentityRef(qn) => qn.to_string(),
            Value::InstanceRef(route) => route.to_string(),
        }
    }

    /// Numeric interpretation for XPath comparisons.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Int8(n) => Some(*n as f64),
            Value::Int16(n) => Some(*n as f64),
            Value::Int32(n) => Some(*n as f64),
            Value::Int64(n) => Some(*n as f64),
            Value::Uint8(n) => Some(*n as f64),
            Value::Uint16(n) => Some(*n as f64),
            Value::Uint32(n) => Some(*n as f64),
            Value::Uint64(n) => Some(*n as f64),
            Value::Decimal64(d) => Some(d.as_f64()),
            _ => None,
        }
    }
}

/// Structural equality; timestamps do not participate.
impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        use Value::*;
        match (self, other) {
            (Null, Null) | (Empty, Empty) => true,
            (Boolean(a), Boolean(b)) => a == b,
            (Int8(a), Int8(b)) => a == b,
            (Int16(a), Int16(b)) => a == b,
            (Int32(a), Int32(b)) => a == b,
            (Int64(a), Int64(b)) => a == b,
            (Uint8(a), Uint8(b)) => a == b,
            (Uint16(a), Uint16(b)) => a == b,
            (Uint32(a), Uint32(b)) => a == b,
            (Uint64(a), Uint64(b)) => a == b,
            (Decimal64(a), Decimal64(b)) => a == b,
            (String(a), String(b)) => a == b,
            (Binary(a), Binary(b)) => a == b,
            (Bits(a), Bits(b)) => a == b,
            (IdentityRef(a), IdentityRef(b)) => a == b,
            (InstanceRef(a), InstanceRef(b)) => a == b,
            (Object(a), Object(b)) => {
                Arc::ptr_eq(a, b)
                    || (a.members.len() == b.members.len()
                        && a.members
                            .iter()
                            .all(|(k, v)| b.members.get(k).is_some_and(|w| v == w)))
            }
            (Array(a), Array(b)) => Arc::ptr_eq(a, b) || a.entries == b.entries,
            _ => false,
        }
    }
}

impl Eq for Value {}

impl Hash for Value {
    fn hash<H: Hasher>(&self, state: &mut H) {
        use Value::*;
        std::mem::discriminant(self).hash(state);
        match self {
            Null | Empty => {}
            Boolean(b) => b.hash(state),
            Int8(n) => n.hash(state),
            Int16(n) => n.hash(state),
            Int32(n) => n.hash(state),
            Int64(n) => n.hash(state),
            Uint8(n) => n.hash(state),
            Uint16(n) => n.hash(state),
            Uint32(n) => n.hash(state),
            Uint64(n) => n.hash(state),
            Decimal64(d) => d.hash(state),
            String(s) => s.hash(state),
            Binary(bytes) => bytes.hash(state),
            Bits(names) => names.hash(state),
            IdentityRef(qn) => qn.hash(state),
            InstanceRef(route) => route.hash(state),
            Object(obj) => {
                // Order-independent member hash.
                let mut combined: u64 = 0;
                for (name, value) in &obj.members {
                    let mut h = FxHasher::default();
                    name.hash(&mut h);
                    value.hash(&mut h);
                    combined ^= h.finish();
                }
                combined.hash(state);
            }
            Array(arr) => {
                arr.entries.len().hash(state);
                for entry in &arr.entries {
                    entry.hash(state);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decimal64_parse_and_display() {
        let d = Decimal64::parse("3.14", 7).unwrap();
        assert_eq!(d.digits, 31_400_000);
        assert_eq!(d.to_string(), "3.1400000");
        assert_eq!(Decimal64::parse("0", 7).unwrap().to_string(), "0.0000000");
        assert_eq!(Decimal64::parse("-1.5", 2).unwrap().to_string(), "-1.50");
        assert_eq!(Decimal64::parse("7", 0).unwrap().to_string(), "7");
        assert!(Decimal64::parse("1.234", 2).is_none());
        assert!(Decimal64::parse("abc", 2).is_none());
        assert!(Decimal64::parse("", 2).is_none());
    }

    #[test]
    fn test_structural_equality_ignores_timestamps() {
        let mut members = IndexMap::new();
        members.insert(SmolStr::new("a"), Value::String("x".into()));
        let v1 = Value::object(members.clone());
        std::thread::sleep(std::time::Duration::from_millis(2));
        let v2 = Value::object(members);
        assert_eq!(v1, v2);
        assert_eq!(v1.structural_hash(), v2.structural_hash());
    }

    #[test]
    fn test_object_hash_member_order_independent() {
        let mut forward = IndexMap::new();
        forward.insert(SmolStr::new("a"), Value::Uint8(1));
        forward.insert(SmolStr::new("b"), Value::Uint8(2));
        let mut backward = IndexMap::new();
        backward.insert(SmolStr::new("b"), Value::Uint8(2));
        backward.insert(SmolStr::new("a"), Value::Uint8(1));
        assert_eq!(
            Value::object(forward).structural_hash(),
            Value::object(backward).structural_hash()
        );
    }

    #[test]
    fn test_array_order_matters() {
        let a = Value::array(vec![Value::Uint8(1), Value::Uint8(2)]);
        let b = Value::array(vec![Value::Uint8(2), Value::Uint8(1)]);
        assert_ne!(a, b);
    }
}

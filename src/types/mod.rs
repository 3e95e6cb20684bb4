//! The type system: built-in and derived YANG types with restrictions.
//!
//! A [`DataType`] is constructed for every `type` statement encountered
//! (see [`build_type`]). Derived-type chains are compressed into a single
//! value whose spec is a built-in with the union of all restrictions
//! applied.
//!
//! Conversions cross the raw↔cooked boundary exactly once: `from_raw`
//! cooks a JSON-parsed value, `to_raw` emits the RFC 7951 encoding,
//! `parse_value` reads values appearing in YANG source, and
//! `canonical_string` produces the canonical lexical form used for key
//! uniqueness comparisons.

mod build;
mod pattern;

pub use build::build_type;
pub use pattern::compile_pattern;

use std::sync::Arc;

use base64::Engine;
use indexmap::IndexMap;
use regex::Regex;
use serde_json::Value as RawValue;
use smol_str::SmolStr;

use crate::base::QualName;
use crate::instance::route::parse_instance_id;
use crate::instance::{Decimal64, Value};
use crate::registry::ModuleRegistry;
use crate::xpath::CompiledExpr;

const BASE64: base64::engine::GeneralPurpose = base64::engine::general_purpose::STANDARD;

/// A failed type-restriction check: stable error tag plus the optional
/// custom message from `error-app-tag`/`error-message`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeViolation {
    pub error_tag: String,
    pub error_message: Option<String>,
}

impl TypeViolation {
    pub fn invalid_type() -> Self {
        Self {
            error_tag: "invalid-type".to_string(),
            error_message: None,
        }
    }

    fn with_message(message: impl Into<String>) -> Self {
        Self {
            error_tag: "invalid-type".to_string(),
            error_message: Some(message.into()),
        }
    }

    /// Override tag/message from a restriction's error substatements.
    fn customized(tag: Option<&str>, message: Option<&str>, default_message: String) -> Self {
        Self {
            error_tag: tag.unwrap_or("invalid-type").to_string(),
            error_message: Some(message.map(str::to_string).unwrap_or(default_message)),
        }
    }
}

/// Width and signedness of an integer built-in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntKind {
    Int8,
    Int16,
    Int32,
    Int64,
    Uint8,
    Uint16,
    Uint32,
    Uint64,
}

impl IntKind {
    pub fn from_name(name: &str) -> Option<Self> {
        Some(match name {
            "int8" => IntKind::Int8,
            "int16" => IntKind::Int16,
            "int32" => IntKind::Int32,
            "int64" => IntKind::Int64,
            "uint8" => IntKind::Uint8,
            "uint16" => IntKind::Uint16,
            "uint32" => IntKind::Uint32,
            "uint64" => IntKind::Uint64,
            _ => return None,
        })
    }

    pub fn min(self) -> i128 {
        match self {
            IntKind::Int8 => i8::MIN as i128,
            IntKind::Int16 => i16::MIN as i128,
            IntKind::Int32 => i32::MIN as i128,
            IntKind::Int64 => i64::MIN as i128,
            _ => 0,
        }
    }

    pub fn max(self) -> i128 {
        match self {
            IntKind::Int8 => i8::MAX as i128,
            IntKind::Int16 => i16::MAX as i128,
            IntKind::Int32 => i32::MAX as i128,
            IntKind::Int64 => i64::MAX as i128,
            IntKind::Uint8 => u8::MAX as i128,
            IntKind::Uint16 => u16::MAX as i128,
            IntKind::Uint32 => u32::MAX as i128,
            IntKind::Uint64 => u64::MAX as i128,
        }
    }

    /// 64-bit integers are transmitted as JSON strings (RFC 7951 §6.1).
    pub fn uses_string_encoding(self) -> bool {
        matches!(self, IntKind::Int64 | IntKind::Uint64)
    }

    fn make_value(self, n: i128) -> Option<Value> {
        if n < self.min() || n > self.max() {
            return None;
        }
        Some(match self {
            IntKind::Int8 => Value::Int8(n as i8),
            IntKind::Int16 => Value::Int16(n as i16),
            IntKind::Int32 => Value::Int32(n as i32),
            IntKind::Int64 => Value::Int64(n as i64),
            IntKind::Uint8 => Value::Uint8(n as u8),
            IntKind::Uint16 => Value::Uint16(n as u16),
            IntKind::Uint32 => Value::Uint32(n as u32),
            IntKind::Uint64 => Value::Uint64(n as u64),
        })
    }

    fn extract(self, value: &Value) -> Option<i128> {
        Some(match (self, value) {
            (IntKind::Int8, Value::Int8(n)) => *n as i128,
            (IntKind::Int16, Value::Int16(n)) => *n as i128,
            (IntKind::Int32, Value::Int32(n)) => *n as i128,
            (IntKind::Int64, Value::Int64(n)) => *n as i128,
            (IntKind::Uint8, Value::Uint8(n)) => *n as i128,
            (IntKind::Uint16, Value::Uint16(n)) => *n as i128,
            (IntKind::Uint32, Value::Uint32(n)) => *n as i128,
            (IntKind::Uint64, Value::Uint64(n)) => *n as i128,
            _ => return None,
        })
    }
}

/// Disjoint range intervals over a numeric domain (scaled integers for
/// decimal64), with optional custom error reporting.
#[derive(Debug, Clone)]
pub struct RangeConstraint {
    pub parts: Vec<(i128, i128)>,
    pub error_tag: Option<String>,
    pub error_message: Option<String>,
}

impl RangeConstraint {
    fn contains(&self, n: i128) -> bool {
        self.parts.iter().any(|&(lo, hi)| lo <= n && n <= hi)
    }

    /// Extreme values, used to resolve the `min`/`max` keywords of a
    /// narrowing restriction.
    fn bounds(&self) -> (i128, i128) {
        let lo = self.parts.iter().map(|p| p.0).min().unwrap_or(0);
        let hi = self.parts.iter().map(|p| p.1).max().unwrap_or(0);
        (lo, hi)
    }
}

/// Length intervals for string/binary types.
#[derive(Debug, Clone)]
pub struct LengthConstraint {
    pub parts: Vec<(u64, u64)>,
    pub error_tag: Option<String>,
    pub error_message: Option<String>,
}

impl LengthConstraint {
    fn contains(&self, n: u64) -> bool {
        self.parts.iter().any(|&(lo, hi)| lo <= n && n <= hi)
    }

    fn bounds(&self) -> (u64, u64) {
        let lo = self.parts.iter().map(|p| p.0).min().unwrap_or(0);
        let hi = self.parts.iter().map(|p| p.1).max().unwrap_or(u64::MAX);
        (lo, hi)
    }
}

/// One compiled pattern restriction. Positive-match patterns must all
/// match; inverted-match patterns must all fail to match.
#[derive(Debug, Clone)]
pub struct CompiledPattern {
    pub source: String,
    pub regex: Regex,
    pub invert: bool,
    pub error_tag: Option<String>,
    pub error_message: Option<String>,
}

/// Built-in type with accumulated restrictions.
#[derive(Debug, Clone)]
pub enum TypeSpec {
    Integer {
        kind: IntKind,
        range: Option<RangeConstraint>,
    },
    Decimal64 {
        fraction_digits: u8,
        range: Option<RangeConstraint>,
    },
    String {
        length: Option<LengthConstraint>,
        patterns: Vec<CompiledPattern>,
    },
    Binary {
        length: Option<LengthConstraint>,
    },
    Boolean,
    Empty,
    /// Bit name → position.
    Bits { positions: IndexMap<SmolStr, u32> },
    /// Enum name → value.
    Enumeration { values: IndexMap<SmolStr, i32> },
    /// Allowed base identities; values must derive from at least one.
    Identityref { bases: Vec<QualName> },
    InstanceIdentifier { require_instance: bool },
    Leafref {
        path: String,
        compiled_path: Arc<CompiledExpr>,
        require_instance: bool,
        /// Type of the referred-to leaf, resolved after the schema tree is
        /// built.
        target: Option<Box<DataType>>,
    },
    /// Member types in declaration order; the first member whose operation
    /// succeeds wins.
    Union { members: Vec<DataType> },
}

/// A compiled data type: a built-in spec plus restrictions, an optional
/// default, units, and a diagnostic name for derived types.
#[derive(Debug, Clone)]
pub struct DataType {
    /// Human-readable derived-type name, used only in diagnostics.
    pub name: Option<QualName>,
    pub units: Option<String>,
    pub default: Option<Value>,
    pub spec: TypeSpec,
}

impl DataType {
    pub fn new(spec: TypeSpec) -> Self {
        Self {
            name: None,
            units: None,
            default: None,
            spec,
        }
    }

    /// Cook a raw (JSON-parsed) value. `ctx_module` is the namespace of
    /// the containing data node, used for unprefixed identityref values.
    pub fn from_raw(&self, raw: &RawValue, ctx_module: &str) -> Result<Value, String> {
        match &self.spec {
            TypeSpec::Integer { kind, .. } => {
                let n: i128 = if kind.uses_string_encoding() {
                    let s = raw.as_str().ok_or("expected string-encoded integer")?;
                    s.trim()
                        .parse()
                        .map_err(|_| format!("not a decimal integer: {s}"))?
                } else {
                    match raw {
                        RawValue::Number(n) => n
                            .as_i64()
                            .map(i128::from)
                            .or_else(|| n.as_u64().map(i128::from))
                            .ok_or("not an integer")?,
                        _ => return Err("expected number".to_string()),
                    }
                };
                kind.make_value(n)
                    .ok_or_else(|| format!("integer out of type range: {n}"))
            }
            TypeSpec::Decimal64 {
                fraction_digits, ..
            } => {
                // Accepted as number or string; emitted as string.
                let text = match raw {
                    RawValue::String(s) => s.clone(),
                    RawValue::Number(n) => n.to_string(),
                    _ => return Err("expected decimal64 number or string".to_string()),
                };
                Decimal64::parse(&text, *fraction_digits)
                    .map(Value::Decimal64)
                    .ok_or_else(|| format!("not a decimal64 value: {text}"))
            }
            TypeSpec::String { .. } => raw
                .as_str()
                .map(|s| Value::String(s.to_string()))
                .ok_or_else(|| "expected string".to_string()),
            TypeSpec::Binary { .. } => {
                let s = raw.as_str().ok_or("expected base64 string")?;
                BASE64
                    .decode(s)
                    .map(Value::Binary)
                    .map_err(|e| format!("invalid base64: {e}"))
            }
            TypeSpec::Boolean => raw
                .as_bool()
                .map(Value::Boolean)
                .ok_or_else(|| "expected boolean".to_string()),
            TypeSpec::Empty => match raw {
                RawValue::Array(entries) if entries.len() == 1 && entries[0].is_null() => {
                    Ok(Value::Empty)
                }
                _ => Err("empty type is encoded as [null]".to_string()),
            },
            TypeSpec::Bits { .. } => {
                let s = raw.as_str().ok_or("expected bits string")?;
                Ok(Value::Bits(
                    s.split_whitespace().map(SmolStr::new).collect(),
                ))
            }
            TypeSpec::Enumeration { .. } => raw
                .as_str()
                .map(|s| Value::String(s.to_string()))
                .ok_or_else(|| "expected enumeration string".to_string()),
            TypeSpec::Identityref { .. } => {
                let s = raw.as_str().ok_or("expected identityref string")?;
                Ok(Value::IdentityRef(QualName::parse(s, ctx_module)))
            }
            TypeSpec::InstanceIdentifier { .. } => {
                let s = raw.as_str().ok_or("expected instance-identifier string")?;
                let route = parse_instance_id(s).map_err(|e| e.to_string())?;
                Ok(Value::InstanceRef(Box::new(route)))
            }
            TypeSpec::Leafref { target, .. } => match target {
                Some(target) => target.from_raw(raw, ctx_module),
                None => raw
                    .as_str()
                    .map(|s| Value::String(s.to_string()))
                    .ok_or_else(|| "expected string".to_string()),
            },
            TypeSpec::Union { members } => {
                let mut last_err = "empty union".to_string();
                for member in members {
                    match member.from_raw(raw, ctx_module) {
                        Ok(value) => return Ok(value),
                        Err(e) => last_err = e,
                    }
                }
                Err(last_err)
            }
        }
    }

    /// Emit the RFC 7951 raw encoding of a cooked value.
    pub fn to_raw(&self, value: &Value) -> Result<RawValue, String> {
        match (&self.spec, value) {
            (TypeSpec::Integer { kind, .. }, _) => {
                let n = kind
                    .extract(value)
                    .ok_or_else(|| "value does not match integer type".to_string())?;
                if kind.uses_string_encoding() {
                    Ok(RawValue::String(n.to_string()))
                } else {
                    Ok(serde_json::json!(n as i64))
                }
            }
            (TypeSpec::Decimal64 { .. }, Value::Decimal64(d)) => {
                Ok(RawValue::String(d.to_string()))
            }
            (TypeSpec::String { .. }, Value::String(s)) => Ok(RawValue::String(s.clone())),
            (TypeSpec::Binary { .. }, Value::Binary(bytes)) => {
                Ok(RawValue::String(BASE64.encode(bytes)))
            }
            (TypeSpec::Boolean, Value::Boolean(b)) => Ok(RawValue::Bool(*b)),
            (TypeSpec::Empty, Value::Empty) => Ok(RawValue::Array(vec![RawValue::Null])),
            (TypeSpec::Bits { .. }, Value::Bits(_)) => {
                Ok(RawValue::String(self.canonical_string(value)))
            }
            (TypeSpec::Enumeration { .. }, Value::String(s)) => Ok(RawValue::String(s.clone())),
            (TypeSpec::Identityref { .. }, Value::IdentityRef(qn)) => {
                Ok(RawValue::String(qn.to_string()))
            }
            (TypeSpec::InstanceIdentifier { .. }, Value::InstanceRef(route)) => {
                Ok(RawValue::String(route.to_string()))
            }
            (TypeSpec::Leafref { target, .. }, _) => match target {
                Some(target) => target.to_raw(value),
                None => Ok(RawValue::String(value.as_xpath_string())),
            },
            (TypeSpec::Union { members }, _) => {
                let mut last_err = "empty union".to_string();
                for member in members {
                    match member.to_raw(value) {
                        Ok(raw) => return Ok(raw),
                        Err(e) => last_err = e,
                    }
                }
                Err(last_err)
            }
            _ => Err("value does not match type".to_string()),
        }
    }

    /// Parse a value appearing as a string in YANG source (defaults,
    /// predicate values). Integer types allow leading zeroes and sign.
    pub fn parse_value(&self, text: &str, ctx_module: &str) -> Result<Value, String> {
        match &self.spec {
            TypeSpec::Integer { kind, .. } => {
                let n: i128 = text
                    .trim()
                    .parse()
                    .map_err(|_| format!("not a decimal integer: {text}"))?;
                kind.make_value(n)
                    .ok_or_else(|| format!("integer out of type range: {text}"))
            }
            TypeSpec::Decimal64 {
                fraction_digits, ..
            } => Decimal64::parse(text, *fraction_digits)
                .map(Value::Decimal64)
                .ok_or_else(|| format!("not a decimal64 value: {text}")),
            TypeSpec::String { .. } => Ok(Value::String(text.to_string())),
            TypeSpec::Binary { .. } => BASE64
                .decode(text)
                .map(Value::Binary)
                .map_err(|e| format!("invalid base64: {e}")),
            TypeSpec::Boolean => match text {
                "true" => Ok(Value::Boolean(true)),
                "false" => Ok(Value::Boolean(false)),
                _ => Err(format!("not a boolean: {text}")),
            },
            TypeSpec::Empty => Err("empty type has no lexical values".to_string()),
            TypeSpec::Bits { .. } => Ok(Value::Bits(
                text.split_whitespace().map(SmolStr::new).collect(),
            )),
            TypeSpec::Enumeration { .. } => Ok(Value::String(text.to_string())),
            TypeSpec::Identityref { .. } => {
                Ok(Value::IdentityRef(QualName::parse(text, ctx_module)))
            }
            TypeSpec::InstanceIdentifier { .. } => {
                let route = parse_instance_id(text).map_err(|e| e.to_string())?;
                Ok(Value::InstanceRef(Box::new(route)))
            }
            TypeSpec::Leafref { target, .. } => match target {
                Some(target) => target.parse_value(text, ctx_module),
                None => Ok(Value::String(text.to_string())),
            },
            TypeSpec::Union { members } => {
                let mut last_err = "empty union".to_string();
                for member in members {
                    match member.parse_value(text, ctx_module) {
                        Ok(value) => return Ok(value),
                        Err(e) => last_err = e,
                    }
                }
                Err(last_err)
            }
        }
    }

    /// Canonical lexical form (YANG §9); used for key uniqueness
    /// comparisons.
    pub fn canonical_string(&self, value: &Value) -> String {
        match (&self.spec, value) {
            (TypeSpec::Bits { positions }, Value::Bits(names)) => {
                // Canonical order is by bit position.
                let mut sorted: Vec<&SmolStr> = names.iter().collect();
                sorted.sort_by_key(|name| positions.get(*name).copied().unwrap_or(u32::MAX));
                sorted
                    .iter()
                    .map(|n| n.as_str())
                    .collect::<Vec<_>>()
                    .join(" ")
            }
            (TypeSpec::Leafref { target, .. }, _) => match target {
                Some(target) => target.canonical_string(value),
                None => value.as_xpath_string(),
            },
            (TypeSpec::Union { members }, _) => {
                for member in members {
                    if member.matches_shape(value) {
                        return member.canonical_string(value);
                    }
                }
                value.as_xpath_string()
            }
            _ => value.as_xpath_string(),
        }
    }

    /// Full type-restriction check. On failure the violation carries the
    /// stable error tag and the custom message if the restriction defines
    /// one.
    pub fn check(&self, value: &Value, registry: &ModuleRegistry) -> Result<(), TypeViolation> {
        match &self.spec {
            TypeSpec::Integer { kind, range } => {
                let n = kind.extract(value).ok_or_else(TypeViolation::invalid_type)?;
                if let Some(range) = range {
                    if !range.contains(n) {
                        return Err(TypeViolation::customized(
                            range.error_tag.as_deref(),
                            range.error_message.as_deref(),
                            format!("value {n} out of range"),
                        ));
                    }
                }
                Ok(())
            }
            TypeSpec::Decimal64 {
                fraction_digits,
                range,
            } => match value {
                Value::Decimal64(d) if d.fraction_digits == *fraction_digits => {
                    if let Some(range) = range {
                        if !range.contains(d.digits as i128) {
                            return Err(TypeViolation::customized(
                                range.error_tag.as_deref(),
                                range.error_message.as_deref(),
                                format!("value {d} out of range"),
                            ));
                        }
                    }
                    Ok(())
                }
                _ => Err(TypeViolation::invalid_type()),
            },
            TypeSpec::String { length, patterns } => {
                let Value::String(s) = value else {
                    return Err(TypeViolation::invalid_type());
                };
                if let Some(length) = length {
                    let chars = s.chars().count() as u64;
                    if !length.contains(chars) {
                        return Err(TypeViolation::customized(
                            length.error_tag.as_deref(),
                            length.error_message.as_deref(),
                            format!("string length {chars} out of range"),
                        ));
                    }
                }
                for pattern in patterns {
                    let matched = pattern.regex.is_match(s);
                    if matched == pattern.invert {
                        return Err(TypeViolation::customized(
                            pattern.error_tag.as_deref(),
                            pattern.error_message.as_deref(),
                            format!("pattern mismatch: {}", pattern.source),
                        ));
                    }
                }
                Ok(())
            }
            TypeSpec::Binary { length } => {
                let Value::Binary(bytes) = value else {
                    return Err(TypeViolation::invalid_type());
                };
                if let Some(length) = length {
                    if !length.contains(bytes.len() as u64) {
                        return Err(TypeViolation::customized(
                            length.error_tag.as_deref(),
                            length.error_message.as_deref(),
                            format!("binary length {} out of range", bytes.len()),
                        ));
                    }
                }
                Ok(())
            }
            TypeSpec::Boolean => match value {
                Value::Boolean(_) => Ok(()),
                _ => Err(TypeViolation::invalid_type()),
            },
            TypeSpec::Empty => match value {
                Value::Empty => Ok(()),
                _ => Err(TypeViolation::invalid_type()),
            },
            TypeSpec::Bits { positions } => {
                let Value::Bits(names) = value else {
                    return Err(TypeViolation::invalid_type());
                };
                for name in names {
                    if !positions.contains_key(name) {
                        return Err(TypeViolation::with_message(format!("unknown bit: {name}")));
                    }
                }
                Ok(())
            }
            TypeSpec::Enumeration { values } => {
                let Value::String(s) = value else {
                    return Err(TypeViolation::invalid_type());
                };
                if values.contains_key(s.as_str()) {
                    Ok(())
                } else {
                    Err(TypeViolation::with_message(format!(
                        "unknown enumeration member: {s}"
                    )))
                }
            }
            TypeSpec::Identityref { bases } => {
                let Value::IdentityRef(qn) = value else {
                    return Err(TypeViolation::invalid_type());
                };
                if bases.iter().any(|base| registry.is_derived_from(qn, base)) {
                    Ok(())
                } else {
                    Err(TypeViolation::with_message(format!(
                        "identity {qn} does not derive from an allowed base"
                    )))
                }
            }
            TypeSpec::InstanceIdentifier { .. } => match value {
                Value::InstanceRef(_) => Ok(()),
                _ => Err(TypeViolation::invalid_type()),
            },
            TypeSpec::Leafref { target, .. } => match target {
                Some(target) => target.check(value, registry),
                None => Ok(()),
            },
            TypeSpec::Union { members } => {
                let mut last = TypeViolation::invalid_type();
                for member in members {
                    match member.check(value, registry) {
                        Ok(()) => return Ok(()),
                        Err(violation) => last = violation,
                    }
                }
                Err(last)
            }
        }
    }

    /// Does the value satisfy all type restrictions?
    pub fn contains(&self, value: &Value, registry: &ModuleRegistry) -> bool {
        self.check(value, registry).is_ok()
    }

    /// Cheap shape test: does the value's variant correspond to this type?
    fn matches_shape(&self, value: &Value) -> bool {
        match (&self.spec, value) {
            (TypeSpec::Integer { kind, .. }, _) => kind.extract(value).is_some(),
            (TypeSpec::Decimal64 { .. }, Value::Decimal64(_))
            | (TypeSpec::String { .. }, Value::String(_))
            | (TypeSpec::Binary { .. }, Value::Binary(_))
            | (TypeSpec::Boolean, Value::Boolean(_))
            | (TypeSpec::Empty, Value::Empty)
            | (TypeSpec::Bits { .. }, Value::Bits(_))
            | (TypeSpec::Enumeration { .. }, Value::String(_))
            | (TypeSpec::Identityref { .. }, Value::IdentityRef(_))
            | (TypeSpec::InstanceIdentifier { .. }, Value::InstanceRef(_)) => true,
            (TypeSpec::Leafref { target, .. }, _) => target
                .as_ref()
                .is_some_and(|target| target.matches_shape(value)),
            (TypeSpec::Union { members }, _) => {
                members.iter().any(|member| member.matches_shape(value))
            }
            _ => false,
        }
    }

    /// Name shown in diagnostics and the ASCII schema tree.
    pub fn display_name(&self) -> String {
        if let Some(name) = &self.name {
            return name.name.to_string();
        }
        match &self.spec {
            TypeSpec::Integer { kind, .. } => match kind {
                IntKind::Int8 => "int8",
                IntKind::Int16 => "int16",
                IntKind::Int32 => "int32",
                IntKind::Int64 => "int64",
                IntKind::Uint8 => "uint8",
                IntKind::Uint16 => "uint16",
                IntKind::Uint32 => "uint32",
                IntKind::Uint64 => "uint64",
            }
            .to_string(),
            TypeSpec::Decimal64 { .. } => "decimal64".to_string(),
            TypeSpec::String { .. } => "string".to_string(),
            TypeSpec::Binary { .. } => "binary".to_string(),
            TypeSpec::Boolean => "boolean".to_string(),
            TypeSpec::Empty => "empty".to_string(),
            TypeSpec::Bits { .. } => "bits".to_string(),
            TypeSpec::Enumeration { .. } => "enumeration".to_string(),
            TypeSpec::Identityref { .. } => "identityref".to_string(),
            TypeSpec::InstanceIdentifier { .. } => "instance-identifier".to_string(),
            TypeSpec::Leafref { path, .. } => format!("-> {path}"),
            TypeSpec::Union { .. } => "union".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> ModuleRegistry {
        ModuleRegistry::default()
    }

    fn uint64() -> DataType {
        DataType::new(TypeSpec::Integer {
            kind: IntKind::Uint64,
            range: None,
        })
    }

    #[test]
    fn test_int64_string_encoding() {
        let t = uint64();
        let cooked = t.from_raw(&serde_json::json!("3"), "m").unwrap();
        assert_eq!(cooked, Value::Uint64(3));
        assert_eq!(t.to_raw(&cooked).unwrap(), serde_json::json!("3"));
        assert!(t.from_raw(&serde_json::json!(3), "m").is_err());
    }

    #[test]
    fn test_int32_number_encoding() {
        let t = DataType::new(TypeSpec::Integer {
            kind: IntKind::Int32,
            range: None,
        });
        let cooked = t.from_raw(&serde_json::json!(-7), "m").unwrap();
        assert_eq!(cooked, Value::Int32(-7));
        assert_eq!(t.to_raw(&cooked).unwrap(), serde_json::json!(-7));
        assert!(t.from_raw(&serde_json::json!("7"), "m").is_err());
        assert!(t
            .from_raw(&serde_json::json!(4_000_000_000i64), "m")
            .is_err());
    }

    #[test]
    fn test_parse_value_leading_zeroes_and_sign() {
        let t = DataType::new(TypeSpec::Integer {
            kind: IntKind::Uint8,
            range: None,
        });
        assert_eq!(t.parse_value("007", "m").unwrap(), Value::Uint8(7));
        assert_eq!(t.parse_value("+7", "m").unwrap(), Value::Uint8(7));
        assert!(t.parse_value("256", "m").is_err());
    }

    #[test]
    fn test_range_check() {
        let t = DataType::new(TypeSpec::Integer {
            kind: IntKind::Uint8,
            range: Some(RangeConstraint {
                parts: vec![(1, 10), (20, 30)],
                error_tag: None,
                error_message: None,
            }),
        });
        let reg = registry();
        assert!(t.contains(&Value::Uint8(5), &reg));
        assert!(t.contains(&Value::Uint8(20), &reg));
        assert!(!t.contains(&Value::Uint8(15), &reg));
        assert_eq!(
            t.check(&Value::Uint8(15), &reg).unwrap_err().error_tag,
            "invalid-type"
        );
    }

    #[test]
    fn test_pattern_custom_error() {
        let t = DataType::new(TypeSpec::String {
            length: None,
            patterns: vec![CompiledPattern {
                source: r"[a-z][a-z\-]+[a-z]".to_string(),
                regex: compile_pattern(r"[a-z][a-z\-]+[a-z]").unwrap(),
                invert: false,
                error_tag: None,
                error_message: Some("must be number in words".to_string()),
            }],
        });
        let reg = registry();
        assert!(t.contains(&Value::String("forty-two".into()), &reg));
        let violation = t
            .check(&Value::String("INFINITY".into()), &reg)
            .unwrap_err();
        assert_eq!(violation.error_tag, "invalid-type");
        assert_eq!(
            violation.error_message.as_deref(),
            Some("must be number in words")
        );
    }

    #[test]
    fn test_inverted_pattern() {
        let t = DataType::new(TypeSpec::String {
            length: None,
            patterns: vec![CompiledPattern {
                source: "xml.*".to_string(),
                regex: compile_pattern("xml.*").unwrap(),
                invert: true,
                error_tag: None,
                error_message: None,
            }],
        });
        let reg = registry();
        assert!(t.contains(&Value::String("name".into()), &reg));
        assert!(!t.contains(&Value::String("xmlfoo".into()), &reg));
    }

    #[test]
    fn test_decimal64_raw_forms() {
        let t = DataType::new(TypeSpec::Decimal64 {
            fraction_digits: 7,
            range: None,
        });
        let from_string = t.from_raw(&serde_json::json!("0"), "m").unwrap();
        let from_number = t.from_raw(&serde_json::json!(0.25), "m").unwrap();
        assert_eq!(from_string, Value::Decimal64(Decimal64::new(0, 7)));
        assert_eq!(t.canonical_string(&from_string), "0.0000000");
        assert_eq!(t.canonical_string(&from_number), "0.2500000");
        assert_eq!(
            t.to_raw(&from_number).unwrap(),
            serde_json::json!("0.2500000")
        );
    }

    #[test]
    fn test_binary_roundtrip() {
        let t = DataType::new(TypeSpec::Binary { length: None });
        let cooked = t.from_raw(&serde_json::json!("aGVsbG8="), "m").unwrap();
        assert_eq!(cooked, Value::Binary(b"hello".to_vec()));
        assert_eq!(t.to_raw(&cooked).unwrap(), serde_json::json!("aGVsbG8="));
    }

    #[test]
    fn test_empty_encoding() {
        let t = DataType::new(TypeSpec::Empty);
        let cooked = t
            .from_raw(&serde_json::json!([null]), "m")
            .unwrap();
        assert_eq!(cooked, Value::Empty);
        assert_eq!(t.to_raw(&cooked).unwrap(), serde_json::json!([null]));
        assert!(t.from_raw(&serde_json::json!(null), "m").is_err());
    }

    #[test]
    fn test_bits_canonical_order() {
        let mut positions = IndexMap::new();
        positions.insert(SmolStr::new("ten"), 10u32);
        positions.insert(SmolStr::new("two"), 2u32);
        let t = DataType::new(TypeSpec::Bits { positions });
        let cooked = t.from_raw(&serde_json::json!("ten two"), "m").unwrap();
        assert_eq!(t.canonical_string(&cooked), "two ten");
        let reg = registry();
        assert!(t.contains(&cooked, &reg));
        assert!(!t.contains(&Value::Bits(vec![SmolStr::new("three")]), &reg));
    }

    #[test]
    fn test_enumeration_membership() {
        let mut values = IndexMap::new();
        values.insert(SmolStr::new("up"), 0i32);
        values.insert(SmolStr::new("down"), 1i32);
        let t = DataType::new(TypeSpec::Enumeration { values });
        let reg = registry();
        assert!(t.contains(&Value::String("up".into()), &reg));
        assert!(!t.contains(&Value::String("sideways".into()), &reg));
    }

    #[test]
    fn test_union_member_order() {
        let t = DataType::new(TypeSpec::Union {
            members: vec![
                DataType::new(TypeSpec::Integer {
                    kind: IntKind::Uint8,
                    range: None,
                }),
                DataType::new(TypeSpec::String {
                    length: None,
                    patterns: vec![],
                }),
            ],
        });
        // A JSON number only cooks through the first member.
        assert_eq!(
            t.from_raw(&serde_json::json!(5), "m").unwrap(),
            Value::Uint8(5)
        );
        assert_eq!(
            t.from_raw(&serde_json::json!("five"), "m").unwrap(),
            Value::String("five".into())
        );
    }

    #[test]
    fn test_instance_identifier_cooking() {
        let t = DataType::new(TypeSpec::InstanceIdentifier {
            require_instance: true,
        });
        let cooked = t
            .from_raw(&serde_json::json!("/ex:bag/foo[number=\"3\"]"), "m")
            .unwrap();
        assert!(matches!(cooked, Value::InstanceRef(_)));
        assert_eq!(
            t.to_raw(&cooked).unwrap(),
            serde_json::json!("/ex:bag/foo[number=\"3\"]")
        );
    }
}


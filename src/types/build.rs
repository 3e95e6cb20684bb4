//! Type construction from `type` statements.
//!
//! Derived-type chains (`typedef`) are resolved through the registry and
//! compressed into a single [`DataType`] whose base is a built-in; each
//! link's restrictions are applied in order and may only narrow.

use std::sync::Arc;

use indexmap::IndexMap;
use smol_str::SmolStr;
use tracing::trace;

use crate::base::QualName;
use crate::error::SchemaBuildError;
use crate::parser::Stmt;
use crate::registry::ModuleRegistry;
use crate::xpath::parse_xpath;

use super::pattern::compile_pattern;
use super::{
    CompiledPattern, DataType, IntKind, LengthConstraint, RangeConstraint, TypeSpec,
};

type Result<T> = std::result::Result<T, SchemaBuildError>;

/// Build the compiled type for a `type` statement in the given registry
/// entry's context.
pub fn build_type(
    registry: &ModuleRegistry,
    context: usize,
    type_stmt: Stmt<'_>,
) -> Result<DataType> {
    let mut chain = Vec::new();
    build_inner(registry, context, type_stmt, &mut chain)
}

fn build_inner(
    registry: &ModuleRegistry,
    context: usize,
    type_stmt: Stmt<'_>,
    chain: &mut Vec<QualName>,
) -> Result<DataType> {
    let tname = type_stmt.argument().ok_or_else(|| {
        SchemaBuildError::InvalidTypeRestriction("type statement without a name".into())
    })?;

    if let Some(spec) = builtin_spec(registry, context, tname, type_stmt, chain)? {
        let mut data_type = DataType::new(spec);
        apply_restrictions(&mut data_type, registry, context, type_stmt)?;
        return Ok(data_type);
    }

    // Derived type: resolve the typedef and compress the chain.
    let (def_context, def_id) = registry.get_definition(type_stmt, context)?;
    let def = registry.entry(def_context).tree.get(def_id);
    let qname = QualName::new(
        def.argument().unwrap_or_default(),
        registry.namespace(def_context).clone(),
    );
    if chain.contains(&qname) {
        return Err(SchemaBuildError::CircularDefinition(qname.to_string()));
    }
    chain.push(qname.clone());
    trace!(typedef = %qname, "resolving derived type");

    let inner_stmt = def.find1("type").ok_or_else(|| {
        SchemaBuildError::InvalidTypeRestriction(format!("typedef {qname} without type"))
    })?;
    let mut data_type = build_inner(registry, def_context, inner_stmt, chain)?;
    chain.pop();

    data_type.name = Some(qname);
    if data_type.units.is_none() {
        data_type.units = def.arg_of("units").map(String::from);
    }
    if let Some(default) = def.arg_of("default") {
        let cooked = data_type
            .parse_value(default, registry.namespace(def_context))
            .map_err(SchemaBuildError::InvalidTypeRestriction)?;
        data_type.default = Some(cooked);
    }
    apply_restrictions(&mut data_type, registry, context, type_stmt)?;
    Ok(data_type)
}

/// Initial spec for a built-in type name, consuming constructor-required
/// substatements; `None` when the name is not a built-in.
fn builtin_spec(
    registry: &ModuleRegistry,
    context: usize,
    tname: &str,
    type_stmt: Stmt<'_>,
    chain: &mut Vec<QualName>,
) -> Result<Option<TypeSpec>> {
    if let Some(kind) = IntKind::from_name(tname) {
        return Ok(Some(TypeSpec::Integer { kind, range: None }));
    }
    Ok(Some(match tname {
        "decimal64" => {
            let digits = type_stmt.arg_of("fraction-digits").ok_or_else(|| {
                SchemaBuildError::InvalidTypeRestriction("decimal64 without fraction-digits".into())
            })?;
            let fraction_digits: u8 = digits
                .parse()
                .ok()
                .filter(|d| (1..=18).contains(d))
                .ok_or_else(|| {
                    SchemaBuildError::InvalidTypeRestriction(format!(
                        "bad fraction-digits: {digits}"
                    ))
                })?;
            TypeSpec::Decimal64 {
                fraction_digits,
                range: None,
            }
        }
        "string" => TypeSpec::String {
            length: None,
            patterns: Vec::new(),
        },
        "binary" => TypeSpec::Binary { length: None },
        "boolean" => TypeSpec::Boolean,
        "empty" => TypeSpec::Empty,
        "bits" => TypeSpec::Bits {
            positions: collect_bits(registry, context, type_stmt, None)?,
        },
        "enumeration" => TypeSpec::Enumeration {
            values: collect_enums(registry, context, type_stmt, None)?,
        },
        "identityref" => {
            let mut bases = Vec::new();
            for base in type_stmt.find_all("base") {
                if let Some(arg) = base.argument() {
                    bases.push(registry.translate_pname(arg, context)?);
                }
            }
            if bases.is_empty() {
                return Err(SchemaBuildError::InvalidTypeRestriction(
                    "identityref without base".into(),
                ));
            }
            TypeSpec::Identityref { bases }
        }
        "instance-identifier" => TypeSpec::InstanceIdentifier {
            require_instance: require_instance(type_stmt)?,
        },
        "leafref" => {
            let path = type_stmt.arg_of("path").ok_or_else(|| {
                SchemaBuildError::InvalidTypeRestriction("leafref without path".into())
            })?;
            let compiled = parse_xpath(path, registry.schema_context(context))
                .map_err(|_| SchemaBuildError::InvalidLeafrefPath(path.to_string()))?;
            TypeSpec::Leafref {
                path: path.to_string(),
                compiled_path: Arc::new(compiled),
                require_instance: require_instance(type_stmt)?,
                target: None,
            }
        }
        "union" => {
            let mut members = Vec::new();
            for member in type_stmt.find_all("type") {
                members.push(build_inner(registry, context, member, chain)?);
            }
            if members.is_empty() {
                return Err(SchemaBuildError::InvalidTypeRestriction(
                    "union without member types".into(),
                ));
            }
            TypeSpec::Union { members }
        }
        _ => return Ok(None),
    }))
}

fn require_instance(type_stmt: Stmt<'_>) -> Result<bool> {
    match type_stmt.arg_of("require-instance") {
        None | Some("true") => Ok(true),
        Some("false") => Ok(false),
        Some(other) => Err(SchemaBuildError::InvalidTypeRestriction(format!(
            "bad require-instance: {other}"
        ))),
    }
}

/// Bit positions with auto-assignment: the next highest unused
/// non-negative integer; explicit positions must not conflict. A parent
/// map makes this a subset restriction.
fn collect_bits(
    registry: &ModuleRegistry,
    context: usize,
    type_stmt: Stmt<'_>,
    parent: Option<&IndexMap<SmolStr, u32>>,
) -> Result<IndexMap<SmolStr, u32>> {
    let mut positions: IndexMap<SmolStr, u32> = IndexMap::new();
    let mut next: u32 = 0;
    for bit in type_stmt.find_all("bit") {
        let Some(name) = bit.argument() else { continue };
        if !registry.if_features(bit, context)? {
            continue;
        }
        if let Some(parent) = parent {
            let position = *parent.get(name).ok_or_else(|| {
                SchemaBuildError::InvalidTypeRestriction(format!("bit {name} not in base type"))
            })?;
            positions.insert(SmolStr::new(name), position);
            continue;
        }
        let position = match bit.arg_of("position") {
            Some(text) => {
                let position: u32 = text.parse().map_err(|_| {
                    SchemaBuildError::InvalidTypeRestriction(format!("bad position: {text}"))
                })?;
                if positions.values().any(|&p| p == position) {
                    return Err(SchemaBuildError::InvalidTypeRestriction(format!(
                        "conflicting bit position {position}"
                    )));
                }
                position
            }
            None => next,
        };
        next = next.max(position + 1);
        positions.insert(SmolStr::new(name), position);
    }
    Ok(positions)
}

/// Enum values, with the same auto-assignment discipline over `i32`.
fn collect_enums(
    registry: &ModuleRegistry,
    context: usize,
    type_stmt: Stmt<'_>,
    parent: Option<&IndexMap<SmolStr, i32>>,
) -> Result<IndexMap<SmolStr, i32>> {
    let mut values: IndexMap<SmolStr, i32> = IndexMap::new();
    let mut next: i32 = 0;
    for member in type_stmt.find_all("enum") {
        let Some(name) = member.argument() else {
            continue;
        };
        if !registry.if_features(member, context)? {
            continue;
        }
        if let Some(parent) = parent {
            let value = *parent.get(name).ok_or_else(|| {
                SchemaBuildError::InvalidTypeRestriction(format!("enum {name} not in base type"))
            })?;
            values.insert(SmolStr::new(name), value);
            continue;
        }
        let value = match member.arg_of("value") {
            Some(text) => {
                let value: i32 = text.parse().map_err(|_| {
                    SchemaBuildError::InvalidTypeRestriction(format!("bad enum value: {text}"))
                })?;
                if values.values().any(|&v| v == value) {
                    return Err(SchemaBuildError::InvalidTypeRestriction(format!(
                        "conflicting enum value {value}"
                    )));
                }
                value
            }
            None => next,
        };
        next = next.max(value.saturating_add(1));
        values.insert(SmolStr::new(name), value);
    }
    Ok(values)
}

/// Apply the restriction substatements of `type_stmt` onto an inherited
/// type, narrowing only.
fn apply_restrictions(
    data_type: &mut DataType,
    registry: &ModuleRegistry,
    context: usize,
    type_stmt: Stmt<'_>,
) -> Result<()> {
    for sub in type_stmt.children() {
        if !sub.is_builtin() {
            continue;
        }
        match sub.keyword() {
            "range" => apply_range(data_type, sub)?,
            "length" => apply_length(data_type, sub)?,
            "pattern" => apply_pattern(data_type, sub)?,
            "enum" => {
                if let TypeSpec::Enumeration { values } = &mut data_type.spec {
                    if data_type.name.is_some() {
                        let parent = values.clone();
                        *values = collect_enums(registry, context, type_stmt, Some(&parent))?;
                    }
                }
            }
            "bit" => {
                if let TypeSpec::Bits { positions } = &mut data_type.spec {
                    if data_type.name.is_some() {
                        let parent = positions.clone();
                        *positions = collect_bits(registry, context, type_stmt, Some(&parent))?;
                    }
                }
            }
            "require-instance" => {
                let value = require_instance(type_stmt)?;
                match &mut data_type.spec {
                    TypeSpec::InstanceIdentifier { require_instance } => {
                        *require_instance = value;
                    }
                    TypeSpec::Leafref {
                        require_instance, ..
                    } => *require_instance = value,
                    _ => {
                        return Err(SchemaBuildError::InvalidTypeRestriction(
                            "require-instance on a non-reference type".into(),
                        ))
                    }
                }
            }
            _ => {}
        }
    }
    Ok(())
}

fn apply_range(data_type: &mut DataType, range_stmt: Stmt<'_>) -> Result<()> {
    let text = range_stmt.argument().unwrap_or_default();
    let (error_tag, error_message) = error_overrides(range_stmt);
    match &mut data_type.spec {
        TypeSpec::Integer { kind, range } => {
            let parent = range
                .as_ref()
                .map(|r| r.parts.clone())
                .unwrap_or_else(|| vec![(kind.min(), kind.max())]);
            let parts = parse_intervals(text, &parent, &|s| s.trim().parse::<i128>().ok())?;
            *range = Some(RangeConstraint {
                parts,
                error_tag,
                error_message,
            });
            Ok(())
        }
        TypeSpec::Decimal64 {
            fraction_digits,
            range,
        } => {
            let fd = *fraction_digits;
            let parent = range
                .as_ref()
                .map(|r| r.parts.clone())
                .unwrap_or_else(|| vec![(i64::MIN as i128, i64::MAX as i128)]);
            let parts = parse_intervals(text, &parent, &|s| {
                crate::instance::Decimal64::parse(s, fd).map(|d| d.digits as i128)
            })?;
            *range = Some(RangeConstraint {
                parts,
                error_tag,
                error_message,
            });
            Ok(())
        }
        _ => Err(SchemaBuildError::InvalidTypeRestriction(
            "range on a non-numeric type".into(),
        )),
    }
}

fn apply_length(data_type: &mut DataType, length_stmt: Stmt<'_>) -> Result<()> {
    let text = length_stmt.argument().unwrap_or_default();
    let (error_tag, error_message) = error_overrides(length_stmt);
    let slot = match &mut data_type.spec {
        TypeSpec::String { length, .. } => length,
        TypeSpec::Binary { length } => length,
        _ => {
            return Err(SchemaBuildError::InvalidTypeRestriction(
                "length on a non-string type".into(),
            ))
        }
    };
    let parent = slot
        .as_ref()
        .map(|l| {
            l.parts
                .iter()
                .map(|&(lo, hi)| (lo as i128, hi as i128))
                .collect()
        })
        .unwrap_or_else(|| vec![(0, u64::MAX as i128)]);
    let parts = parse_intervals(text, &parent, &|s| s.trim().parse::<u64>().ok().map(i128::from))?;
    *slot = Some(LengthConstraint {
        parts: parts.iter().map(|&(lo, hi)| (lo as u64, hi as u64)).collect(),
        error_tag,
        error_message,
    });
    Ok(())
}

fn apply_pattern(data_type: &mut DataType, pattern_stmt: Stmt<'_>) -> Result<()> {
    let TypeSpec::String { patterns, .. } = &mut data_type.spec else {
        return Err(SchemaBuildError::InvalidTypeRestriction(
            "pattern on a non-string type".into(),
        ));
    };
    let source = pattern_stmt.argument().unwrap_or_default();
    let regex = compile_pattern(source).map_err(SchemaBuildError::InvalidTypeRestriction)?;
    let invert = pattern_stmt.arg_of("modifier") == Some("invert-match");
    let (error_tag, error_message) = error_overrides(pattern_stmt);
    patterns.push(CompiledPattern {
        source: source.to_string(),
        regex,
        invert,
        error_tag,
        error_message,
    });
    Ok(())
}

fn error_overrides(stmt: Stmt<'_>) -> (Option<String>, Option<String>) {
    (
        stmt.arg_of("error-app-tag").map(String::from),
        stmt.arg_of("error-message").map(String::from),
    )
}

/// Parse `part | part | ...` where each part is `value`, `lo..hi`, `min`,
/// or `max`; every new interval must lie within some parent interval
/// (restrictions may only further restrict).
fn parse_intervals(
    text: &str,
    parent: &[(i128, i128)],
    parse_bound: &dyn Fn(&str) -> Option<i128>,
) -> Result<Vec<(i128, i128)>> {
    let parent_lo = parent.iter().map(|p| p.0).min().unwrap_or(0);
    let parent_hi = parent.iter().map(|p| p.1).max().unwrap_or(0);
    let bound = |word: &str| -> Result<i128> {
        match word.trim() {
            "min" => Ok(parent_lo),
            "max" => Ok(parent_hi),
            other => parse_bound(other).ok_or_else(|| {
                SchemaBuildError::InvalidTypeRestriction(format!("bad bound: {other}"))
            }),
        }
    };
    let mut parts = Vec::new();
    for part in text.split('|') {
        let (lo, hi) = match part.split_once("..") {
            Some((lo, hi)) => (bound(lo)?, bound(hi)?),
            None => {
                let single = bound(part)?;
                (single, single)
            }
        };
        if lo > hi {
            return Err(SchemaBuildError::InvalidTypeRestriction(format!(
                "empty interval in {text:?}"
            )));
        }
        if !parent.iter().any(|&(plo, phi)| plo <= lo && hi <= phi) {
            return Err(SchemaBuildError::InvalidTypeRestriction(format!(
                "interval {lo}..{hi} widens the parent type"
            )));
        }
        parts.push((lo, hi));
    }
    if parts.is_empty() {
        return Err(SchemaBuildError::InvalidTypeRestriction(
            "empty range".into(),
        ));
    }
    Ok(parts)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instance::Value;
    use crate::library::YangLibrary;
    use tempfile::TempDir;

    /// Registry with one implemented module `m` wrapping the given body.
    fn registry_for(body: &str) -> (ModuleRegistry, TempDir) {
        let dir = TempDir::new().unwrap();
        std::fs::write(
            dir.path().join("m.yang"),
            format!("module m {{ prefix m; namespace 'urn:m'; {body} }}"),
        )
        .unwrap();
        let library = YangLibrary::from_str(
            r#"{"ietf-yang-library:modules-state": {"module-set-id": "",
                "module": [{"name": "m", "revision": "", "namespace": "urn:m",
                            "conformance-type": "implement"}]}}"#,
        )
        .unwrap();
        let registry =
            ModuleRegistry::register_modules(&library, &[dir.path().to_path_buf()]).unwrap();
        (registry, dir)
    }

    /// Build the type of the first leaf in the module.
    fn leaf_type(body: &str) -> DataType {
        let (registry, _dir) = registry_for(body);
        let root = registry.entry(0).tree.root();
        let leaf = root.find1("leaf").unwrap();
        build_type(&registry, 0, leaf.find1("type").unwrap()).unwrap()
    }

    #[test]
    fn test_builtin_with_range() {
        let t = leaf_type("leaf x { type uint8 { range \"1..10|20\"; } }");
        let (registry, _dir) = registry_for("");
        assert!(t.contains(&Value::Uint8(5), &registry));
        assert!(t.contains(&Value::Uint8(20), &registry));
        assert!(!t.contains(&Value::Uint8(11), &registry));
    }

    #[test]
    fn test_derived_chain_compression() {
        let t = leaf_type(
            "typedef percent { type uint8 { range \"0..100\"; } }
             leaf x { type percent { range \"10..max\"; } }",
        );
        assert_eq!(t.name.as_ref().unwrap().name, "percent");
        let (registry, _dir) = registry_for("");
        assert!(t.contains(&Value::Uint8(50), &registry));
        assert!(t.contains(&Value::Uint8(100), &registry));
        assert!(!t.contains(&Value::Uint8(5), &registry));
    }

    #[test]
    fn test_range_widening_rejected() {
        let (registry, _dir) = registry_for(
            "typedef percent { type uint8 { range \"0..100\"; } }
             leaf x { type percent { range \"0..200\"; } }",
        );
        let root = registry.entry(0).tree.root();
        let leaf = root.find1("leaf").unwrap();
        let err = build_type(&registry, 0, leaf.find1("type").unwrap()).unwrap_err();
        assert!(matches!(err, SchemaBuildError::InvalidTypeRestriction(_)));
    }

    #[test]
    fn test_typedef_default_and_units() {
        let t = leaf_type(
            "typedef answer { type uint8; default 42; units \"things\"; }
             leaf x { type answer; }",
        );
        assert_eq!(t.default, Some(Value::Uint8(42)));
        assert_eq!(t.units.as_deref(), Some("things"));
    }

    #[test]
    fn test_circular_typedef() {
        let (registry, _dir) = registry_for(
            "typedef a { type b; } typedef b { type a; }
             leaf x { type a; }",
        );
        let root = registry.entry(0).tree.root();
        let leaf = root.find1("leaf").unwrap();
        let err = build_type(&registry, 0, leaf.find1("type").unwrap()).unwrap_err();
        assert!(matches!(err, SchemaBuildError::CircularDefinition(_)));
    }

    #[test]
    fn test_enum_auto_assignment() {
        let t = leaf_type(
            "leaf x { type enumeration {
               enum zero; enum ten { value 10; } enum eleven; } }",
        );
        let TypeSpec::Enumeration { values } = &t.spec else {
            panic!("expected enumeration");
        };
        assert_eq!(values.get("zero"), Some(&0));
        assert_eq!(values.get("ten"), Some(&10));
        assert_eq!(values.get("eleven"), Some(&11));
    }

    #[test]
    fn test_bits_auto_positions() {
        let t = leaf_type(
            "leaf x { type bits { bit a; bit b { position 5; } bit c; } }",
        );
        let TypeSpec::Bits { positions } = &t.spec else {
            panic!("expected bits");
        };
        assert_eq!(positions.get("a"), Some(&0));
        assert_eq!(positions.get("b"), Some(&5));
        assert_eq!(positions.get("c"), Some(&6));
    }

    #[test]
    fn test_decimal64_requires_fraction_digits() {
        let (registry, _dir) = registry_for("leaf x { type decimal64; }");
        let root = registry.entry(0).tree.root();
        let leaf = root.find1("leaf").unwrap();
        assert!(build_type(&registry, 0, leaf.find1("type").unwrap()).is_err());
    }

    #[test]
    fn test_leafref_spec() {
        let t = leaf_type(
            "leaf x { type leafref { path \"../foo/number\"; require-instance true; } }",
        );
        let TypeSpec::Leafref {
            path,
            require_instance,
            target,
            ..
        } = &t.spec
        else {
            panic!("expected leafref");
        };
        assert_eq!(path, "../foo/number");
        assert!(require_instance);
        assert!(target.is_none());
    }

    #[test]
    fn test_union_members() {
        let t = leaf_type(
            "leaf x { type union { type uint8; type string; } }",
        );
        let TypeSpec::Union { members } = &t.spec else {
            panic!("expected union");
        };
        assert_eq!(members.len(), 2);
    }

    #[test]
    fn test_pattern_invert_modifier() {
        let t = leaf_type(
            "leaf x { type string {
               pattern \"xml.*\" { modifier invert-match; } } }",
        );
        let TypeSpec::String { patterns, .. } = &t.spec else {
            panic!("expected string");
        };
        assert!(patterns[0].invert);
    }
}

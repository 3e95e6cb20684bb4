//! End-to-end scenarios over complete data models.

mod helpers;

use helpers::{example_2, model_from, EXAMPLE_2_INSTANCE};
use yangcore::base::ContentType;
use yangcore::instance::Value;
use yangcore::validation::{ValidationScope, ViolationKind};
use yangcore::xpath::{evaluate, parse_xpath, SchemaContext};
use yangcore::YangLibrary;

// ============================================================================
// Greeting round trip
// ============================================================================

#[test]
fn test_greeting() {
    let fixture = model_from(&[(
        "example-1",
        "module example-1 { namespace 'urn:example:1'; prefix ex1;
           leaf greeting { type string; } }",
    )]);
    let root = fixture
        .model
        .from_raw_str(r#"{"example-1:greeting": "Hi!"}"#)
        .unwrap();
    fixture
        .model
        .validate(&root, ValidationScope::All, ContentType::All)
        .unwrap();
    let route = fixture
        .model
        .parse_instance_id("/example-1:greeting")
        .unwrap();
    assert_eq!(root.peek(&route), Some(&Value::String("Hi!".into())));
}

// ============================================================================
// List keys, unique, pattern, conditional default
// ============================================================================

#[test]
fn test_bag_valid_instance() {
    let fixture = example_2();
    let root = fixture.model.from_raw_str(EXAMPLE_2_INSTANCE).unwrap();
    fixture
        .model
        .validate(&root, ValidationScope::All, ContentType::All)
        .unwrap();
}

#[test]
fn test_pattern_violation_custom_message() {
    let fixture = example_2();
    let root = fixture.model.from_raw_str(EXAMPLE_2_INSTANCE).unwrap();
    let in_words = root
        .member("example-2:bag")
        .unwrap()
        .member("foo")
        .unwrap()
        .entry(0)
        .unwrap()
        .member("in-words")
        .unwrap();
    let broken = in_words.update(Value::String("INFINITY".into())).top();
    let error = fixture
        .model
        .validate(&broken, ValidationScope::All, ContentType::All)
        .unwrap_err();
    assert_eq!(error.tag, "invalid-type");
    assert_eq!(error.message.as_deref(), Some("must be number in words"));
    assert_eq!(error.kind, ViolationKind::Schema);
}

#[test]
fn test_duplicate_key() {
    let fixture = example_2();
    let root = fixture.model.from_raw_str(EXAMPLE_2_INSTANCE).unwrap();
    let foo = root
        .member("example-2:bag")
        .unwrap()
        .member("foo")
        .unwrap();
    let doubled = foo
        .update_from_raw(&serde_json::json!([
            {"number": "3", "in-words": "three", "prime": true},
            {"number": "3", "in-words": "four"}
        ]))
        .unwrap()
        .top();
    let error = fixture
        .model
        .validate(&doubled, ValidationScope::All, ContentType::All)
        .unwrap_err();
    assert_eq!(error.tag, "non-unique-key");
    assert_eq!(error.message.as_deref(), Some("3"));
}

#[test]
fn test_unique_violation() {
    let fixture = example_2();
    let root = fixture.model.from_raw_str(EXAMPLE_2_INSTANCE).unwrap();
    let foo = root
        .member("example-2:bag")
        .unwrap()
        .member("foo")
        .unwrap();
    let doubled = foo
        .update_from_raw(&serde_json::json!([
            {"number": "3", "in-words": "three"},
            {"number": "4", "in-words": "three"}
        ]))
        .unwrap()
        .top();
    let error = fixture
        .model
        .validate(&doubled, ValidationScope::All, ContentType::All)
        .unwrap_err();
    assert_eq!(error.tag, "data-not-unique");
}

#[test]
fn test_add_defaults_inserts_conditional_default() {
    let fixture = example_2();
    let root = fixture.model.from_raw_str(EXAMPLE_2_INSTANCE).unwrap();
    let bag = root.member("example-2:bag").unwrap();
    let defaulted = bag.add_defaults().unwrap();
    let baz = defaulted.member("baz").unwrap();
    assert_eq!(
        baz.value(),
        &Value::Decimal64(yangcore::instance::Decimal64::new(0, 7))
    );
    // The canonical form keeps exactly fraction-digits digits.
    let schema = fixture.model.schema();
    let data_type = schema.node(baz.schema()).data_type().unwrap();
    assert_eq!(data_type.canonical_string(baz.value()), "0.0000000");
    fixture
        .model
        .validate(&defaulted.top(), ValidationScope::All, ContentType::All)
        .unwrap();
}

#[test]
fn test_default_suppressed_when_condition_false() {
    let fixture = example_2();
    let root = fixture.model.from_raw_str(EXAMPLE_2_INSTANCE).unwrap();
    let changed = root
        .member("example-2:bag")
        .unwrap()
        .member("foo")
        .unwrap()
        .entry(0)
        .unwrap()
        .member("in-words")
        .unwrap()
        .update(Value::String("forty-two".into()))
        .top();
    let bag = changed.member("example-2:bag").unwrap();
    let defaulted = bag.add_defaults().unwrap();
    assert!(defaulted.member("baz").is_err());
    fixture
        .model
        .validate(&defaulted.top(), ValidationScope::All, ContentType::All)
        .unwrap();
}

// ============================================================================
// Leafref integrity
// ============================================================================

const EXAMPLE_3: &str = r#"module example-3 {
  yang-version 1.1;
  namespace "urn:example:3";
  prefix ex3;

  container bag {
    list foo {
      key "number";
      leaf number {
        type uint64;
      }
    }
    leaf fooref {
      type leafref {
        path "../foo/number";
        require-instance true;
      }
    }
  }
}
"#;

#[test]
fn test_leafref_missing_target() {
    let fixture = model_from(&[("example-3", EXAMPLE_3)]);
    let root = fixture
        .model
        .from_raw_str(
            r#"{"example-3:bag": {"foo": [{"number": "3"}], "fooref": "5"}}"#,
        )
        .unwrap();
    let error = fixture
        .model
        .validate(&root, ValidationScope::All, ContentType::All)
        .unwrap_err();
    assert_eq!(error.tag, "instance-required");
    assert_eq!(error.kind, ViolationKind::Semantic);
}

#[test]
fn test_leafref_present_target() {
    let fixture = model_from(&[("example-3", EXAMPLE_3)]);
    let root = fixture
        .model
        .from_raw_str(
            r#"{"example-3:bag": {"foo": [{"number": "3"}], "fooref": "3"}}"#,
        )
        .unwrap();
    fixture
        .model
        .validate(&root, ValidationScope::All, ContentType::All)
        .unwrap();
}

// ============================================================================
// Identity derivation
// ============================================================================

const EXAMPLE_4: &str = r#"module example-4 {
  yang-version 1.1;
  namespace "urn:example:4";
  prefix ex4;

  identity A;
  identity B {
    base A;
  }
  identity C {
    base B;
  }
  leaf kind {
    type identityref {
      base A;
    }
  }
}
"#;

#[test]
fn test_derived_from_functions() {
    let fixture = model_from(&[("example-4", EXAMPLE_4)]);

    let eval_on = |value: &str, expr: &str| -> bool {
        let root = fixture
            .model
            .from_raw_str(&format!(r#"{{"example-4:kind": "{value}"}}"#))
            .unwrap();
        let focus = root.member("example-4:kind").unwrap();
        let compiled = parse_xpath(
            expr,
            SchemaContext {
                default_module: "example-4".into(),
                prefixes: Default::default(),
            },
        )
        .unwrap();
        evaluate(&compiled, &focus).unwrap().boolean()
    };

    assert!(eval_on("C", "derived-from(., 'A')"));
    assert!(eval_on("C", "derived-from-or-self(., 'A')"));
    assert!(!eval_on("A", "derived-from(., 'A')"));
    assert!(eval_on("A", "derived-from-or-self(., 'A')"));
}

#[test]
fn test_identityref_validation() {
    let fixture = model_from(&[("example-4", EXAMPLE_4)]);
    let good = fixture
        .model
        .from_raw_str(r#"{"example-4:kind": "C"}"#)
        .unwrap();
    fixture
        .model
        .validate(&good, ValidationScope::All, ContentType::All)
        .unwrap();

    // `A` itself does not derive from `A`.
    let bad = fixture
        .model
        .from_raw_str(r#"{"example-4:kind": "A"}"#)
        .unwrap();
    let error = fixture
        .model
        .validate(&bad, ValidationScope::All, ContentType::All)
        .unwrap_err();
    assert_eq!(error.tag, "invalid-type");
}

// ============================================================================
// Module-set id
// ============================================================================

#[test]
fn test_module_set_id_known_value() {
    let library = YangLibrary::from_str(
        r#"{"ietf-yang-library:modules-state": {"module-set-id": "", "module": [
            {"name": "foo", "revision": "2020-01-01", "namespace": "urn:f",
             "conformance-type": "import"},
            {"name": "bar", "revision": "", "namespace": "urn:b",
             "conformance-type": "implement"}
        ]}}"#,
    )
    .unwrap();
    // sha1("bar@foo@2020-01-01")
    assert_eq!(
        library.module_set_id(),
        "9b9b8f642d3b8372a757218e5ca793cf4530fb6c"
    );
}

#[test]
fn test_module_set_id_permutation_stable() {
    let forward = YangLibrary::from_str(
        r#"{"ietf-yang-library:modules-state": {"module-set-id": "", "module": [
            {"name": "foo", "revision": "2020-01-01", "namespace": "urn:f",
             "conformance-type": "import"},
            {"name": "bar", "revision": "", "namespace": "urn:b",
             "conformance-type": "implement"}
        ]}}"#,
    )
    .unwrap();
    let backward = YangLibrary::from_str(
        r#"{"ietf-yang-library:modules-state": {"module-set-id": "", "module": [
            {"name": "bar", "revision": "", "namespace": "urn:b",
             "conformance-type": "implement"},
            {"name": "foo", "revision": "2020-01-01", "namespace": "urn:f",
             "conformance-type": "import"}
        ]}}"#,
    )
    .unwrap();
    assert_eq!(forward.module_set_id(), backward.module_set_id());
}

// ============================================================================
// Instance identifiers and api-paths
// ============================================================================

#[test]
fn test_goto_by_instance_identifier() {
    let fixture = example_2();
    let root = fixture.model.from_raw_str(EXAMPLE_2_INSTANCE).unwrap();
    let route = fixture
        .model
        .parse_instance_id(r#"/example-2:bag/foo[number="3"]/in-words"#)
        .unwrap();
    let focus = root.goto(&route).unwrap();
    assert_eq!(focus.value(), &Value::String("three".into()));
    assert_eq!(root.peek(&route), Some(&Value::String("three".into())));
}

#[test]
fn test_goto_by_resource_identifier() {
    let fixture = example_2();
    let root = fixture.model.from_raw_str(EXAMPLE_2_INSTANCE).unwrap();
    let route = fixture
        .model
        .parse_resource_id("/example-2:bag/foo=3/in-words")
        .unwrap();
    let focus = root.goto(&route).unwrap();
    assert_eq!(focus.value(), &Value::String("three".into()));

    // The final component may address the entire list.
    let whole = fixture
        .model
        .parse_resource_id("/example-2:bag/foo")
        .unwrap();
    let foo = root.goto(&whole).unwrap();
    assert!(matches!(foo.value(), Value::Array(_)));
}

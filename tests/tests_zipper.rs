//! Persistent zipper laws: structural sharing, zip-up identity,
//! last-write-wins, and navigation.

mod helpers;

use std::sync::Arc;

use helpers::{example_2, model_from, Fixture, EXAMPLE_2_INSTANCE};
use yangcore::instance::Value;

const TWO_MEMBERS: &str = "module two { namespace 'urn:two'; prefix two;
  leaf a { type string; }
  container b { leaf inner { type string; } } }";

fn two_member_fixture() -> Fixture {
    model_from(&[("two", TWO_MEMBERS)])
}

const TWO_INSTANCE: &str = r#"{"two:a": "original", "two:b": {"inner": "kept"}}"#;

// ============================================================================
// Persistence and structural sharing
// ============================================================================

#[test]
fn test_update_leaves_original_reachable() {
    let fixture = two_member_fixture();
    let root = fixture.model.from_raw_str(TWO_INSTANCE).unwrap();
    let focus = root.member("two:a").unwrap();
    let updated = focus.update(Value::String("x".into()));

    let old_top = focus.top();
    let new_top = updated.top();
    assert_eq!(
        old_top.value().as_object().unwrap().members["two:a"],
        Value::String("original".into())
    );
    assert_eq!(
        new_top.value().as_object().unwrap().members["two:a"],
        Value::String("x".into())
    );
}

#[test]
fn test_unmodified_subtree_is_shared() {
    let fixture = two_member_fixture();
    let root = fixture.model.from_raw_str(TWO_INSTANCE).unwrap();
    let focus = root.member("two:a").unwrap();
    let new_top = focus.update(Value::String("x".into())).top();

    let old_b = root.value().as_object().unwrap().members["two:b"].clone();
    let new_b = new_top.value().as_object().unwrap().members["two:b"].clone();
    let (Value::Object(old_b), Value::Object(new_b)) = (old_b, new_b) else {
        panic!("b should be an object");
    };
    // Path-copying duplicates only the mutated chain; `b` is untouched.
    assert!(Arc::ptr_eq(&old_b, &new_b));
}

// ============================================================================
// Zip-up and update laws
// ============================================================================

#[test]
fn test_zip_up_reflects_mutation_only_at_focus() {
    let fixture = example_2();
    let root = fixture.model.from_raw_str(EXAMPLE_2_INSTANCE).unwrap();
    let prime = root
        .member("example-2:bag")
        .unwrap()
        .member("foo")
        .unwrap()
        .entry(0)
        .unwrap()
        .member("prime")
        .unwrap();
    let new_top = prime.update(Value::Boolean(false)).top();

    let route = fixture
        .model
        .parse_instance_id(r#"/example-2:bag/foo[1]/prime"#)
        .unwrap();
    assert_eq!(new_top.peek(&route), Some(&Value::Boolean(false)));
    // Everything else zips up unchanged.
    let words = fixture
        .model
        .parse_instance_id(r#"/example-2:bag/foo[1]/in-words"#)
        .unwrap();
    assert_eq!(new_top.peek(&words), Some(&Value::String("three".into())));
}

#[test]
fn test_update_then_peek_roundtrip() {
    let fixture = two_member_fixture();
    let root = fixture.model.from_raw_str(TWO_INSTANCE).unwrap();
    let focus = root.member("two:a").unwrap();
    let value = Value::String("fresh".into());
    let route = focus.route();
    let top = focus.update(value.clone()).top();
    assert_eq!(top.peek(&route), Some(&value));
}

#[test]
fn test_last_write_wins() {
    let fixture = two_member_fixture();
    let root = fixture.model.from_raw_str(TWO_INSTANCE).unwrap();
    let focus = root.member("two:a").unwrap();
    let twice = focus
        .update(Value::String("v1".into()))
        .update(Value::String("v2".into()))
        .top();
    let once = focus.update(Value::String("v2".into())).top();
    assert_eq!(twice.value(), once.value());
}

// ============================================================================
// put_member/delete_member round trip
// ============================================================================

#[test]
fn test_put_then_delete_is_structurally_identity() {
    let fixture = example_2();
    let root = fixture.model.from_raw_str(EXAMPLE_2_INSTANCE).unwrap();
    let bag = root.member("example-2:bag").unwrap();
    let roundtrip = bag
        .put_member(
            "baz",
            Value::Decimal64(yangcore::instance::Decimal64::new(42, 7)),
        )
        .unwrap()
        .delete_member("baz")
        .unwrap();
    // Structural equality ignores the bumped object timestamps.
    assert_eq!(roundtrip.value(), bag.value());

    // Unmodified member subtrees still share storage.
    let (Value::Object(before), Value::Object(after)) = (bag.value(), roundtrip.value()) else {
        panic!("bag should be an object");
    };
    let (Value::Array(foo_before), Value::Array(foo_after)) =
        (&before.members["foo"], &after.members["foo"])
    else {
        panic!("foo should be an array");
    };
    assert!(Arc::ptr_eq(foo_before, foo_after));
    // The object timestamp was bumped by both operations.
    assert!(after.timestamp >= before.timestamp);
}

// ============================================================================
// Navigation
// ============================================================================

#[test]
fn test_array_navigation() {
    let fixture = example_2();
    let root = fixture.model.from_raw_str(EXAMPLE_2_INSTANCE).unwrap();
    let foo = root
        .member("example-2:bag")
        .unwrap()
        .member("foo")
        .unwrap();
    let extended = foo
        .update_from_raw(&serde_json::json!([
            {"number": "2", "in-words": "two"},
            {"number": "3", "in-words": "three"},
            {"number": "5", "in-words": "five"}
        ]))
        .unwrap();

    let first = extended.entry(0).unwrap();
    let second = first.next().unwrap();
    assert_eq!(second.entry_index(), Some(1));
    let back = second.previous().unwrap();
    assert_eq!(back.entry_index(), Some(0));
    assert!(back.previous().is_err());

    let last = extended.last_entry().unwrap();
    assert_eq!(last.entry_index(), Some(2));
    assert!(last.next().is_err());

    let looked = extended
        .look_up(&[("number".into(), Value::String("3".into()))])
        .unwrap();
    assert_eq!(looked.entry_index(), Some(1));
}

#[test]
fn test_insert_and_delete_entries() {
    let fixture = example_2();
    let root = fixture.model.from_raw_str(EXAMPLE_2_INSTANCE).unwrap();
    let foo = root
        .member("example-2:bag")
        .unwrap()
        .member("foo")
        .unwrap();
    let entry = foo.entry(0).unwrap();

    let five = fixture
        .model
        .schema()
        .from_raw(
            fixture.model.registry(),
            entry.schema(),
            &serde_json::json!([{"number": "5", "in-words": "five"}]),
        )
        .unwrap();
    let Value::Array(five) = five else {
        panic!("expected array")
    };
    let five = five.entries[0].clone();

    let with_new = entry.insert_after(five.clone()).unwrap();
    assert_eq!(with_new.entry_index(), Some(1));
    let array = with_new.up().unwrap();
    assert_eq!(array.value().as_array().unwrap().entries.len(), 2);

    let pruned = array.delete_entry(0).unwrap();
    assert_eq!(pruned.value().as_array().unwrap().entries.len(), 1);
    assert_eq!(pruned.value().as_array().unwrap().entries[0], five);
}

#[test]
fn test_sibling_switch() {
    let fixture = example_2();
    let root = fixture.model.from_raw_str(EXAMPLE_2_INSTANCE).unwrap();
    let bag = root.member("example-2:bag").unwrap();
    let bar = bag.member("bar").unwrap();
    let foo = bar.sibling("foo").unwrap();
    assert!(matches!(foo.value(), Value::Array(_)));
}

#[test]
fn test_member_errors() {
    let fixture = example_2();
    let root = fixture.model.from_raw_str(EXAMPLE_2_INSTANCE).unwrap();
    let bag = root.member("example-2:bag").unwrap();

    // Schema forbids unknown members.
    assert!(matches!(
        bag.member("nonsense"),
        Err(yangcore::instance::ZipperError::NonexistentSchemaNode { .. })
    ));
    // Known member, absent in this instance.
    assert!(matches!(
        bag.member("baz"),
        Err(yangcore::instance::ZipperError::NonexistentInstance { .. })
    ));
    // Root has no parent.
    assert!(root.up().is_err());
}

#[test]
fn test_update_from_raw_error() {
    let fixture = example_2();
    let root = fixture.model.from_raw_str(EXAMPLE_2_INSTANCE).unwrap();
    let number = root
        .member("example-2:bag")
        .unwrap()
        .member("foo")
        .unwrap()
        .entry(0)
        .unwrap()
        .member("number")
        .unwrap();
    // uint64 travels as a JSON string; a bare number is a raw type error.
    assert!(matches!(
        number.update_from_raw(&serde_json::json!(3)),
        Err(yangcore::instance::RawError::TypeError { .. })
    ));
}

#[test]
fn test_timestamps_bubble_on_mutation() {
    let fixture = two_member_fixture();
    let root = fixture.model.from_raw_str(TWO_INSTANCE).unwrap();
    let before = root.value().timestamp().unwrap();
    std::thread::sleep(std::time::Duration::from_millis(2));

    let inner = root
        .member("two:b")
        .unwrap()
        .member("inner")
        .unwrap();
    let new_top = inner.update(Value::String("changed".into())).top();
    let after_root = new_top.value().timestamp().unwrap();
    let after_b = new_top.value().as_object().unwrap().members["two:b"]
        .timestamp()
        .unwrap();
    // Every ancestor on the modified path gets the new stamp.
    assert!(after_root > before);
    assert!(after_b > before);
}

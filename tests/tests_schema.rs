//! Schema compilation: tree shape, uses/augment/deviation expansion,
//! feature pruning, and schema output.

mod helpers;

use helpers::{example_2, model_from, try_model_from};
use yangcore::base::ContentType;
use yangcore::validation::ValidationScope;
use yangcore::TreeOptions;

// ============================================================================
// ASCII tree
// ============================================================================

#[test]
fn test_ascii_tree_shape() {
    let fixture = example_2();
    let tree = fixture.model.ascii_tree(TreeOptions::default());
    let lines: Vec<&str> = tree.lines().collect();
    assert_eq!(lines[0], "+--rw example-2:bag");
    // The list line carries the system-ordered marker and no type.
    assert!(lines.iter().any(|l| l.trim_start().starts_with("+--rw foo*")));
    // Key leaves are not optional; plain leaves are.
    assert!(tree.contains("+--rw number <uint64>"));
    assert!(tree.contains("+--rw in-words? <string>"));
    // Nonconfig nodes print as ro.
    assert!(tree.contains("+--ro bar <boolean>"));
    assert!(tree.contains("+--rw baz? <decimal64>"));
}

#[test]
fn test_ascii_tree_no_types() {
    let fixture = example_2();
    let tree = fixture.model.ascii_tree(TreeOptions {
        types: false,
        val_counts: false,
    });
    assert!(!tree.contains('<'));
    assert!(tree.contains("+--rw number"));
}

#[test]
fn test_ascii_tree_markers() {
    let fixture = model_from(&[(
        "m",
        "module m { namespace 'urn:m'; prefix m;
           container session { presence \"session exists\"; }
           leaf-list servers { type string; ordered-by user; } }",
    )]);
    let tree = fixture.model.ascii_tree(TreeOptions::default());
    assert!(tree.contains("+--rw m:session!"));
    // User-ordered leaf-lists use # instead of *.
    assert!(tree.contains("+--rw m:servers# <string>"));
}

// ============================================================================
// Digest
// ============================================================================

#[test]
fn test_schema_digest() {
    let fixture = example_2();
    let digest = fixture.model.schema_digest();
    let bag = &digest["children"]["example-2:bag"];
    assert_eq!(bag["kind"], "container");
    let foo = &bag["children"]["foo"];
    assert_eq!(foo["kind"], "list");
    assert_eq!(foo["keys"][0], "number");
    let bar = &bag["children"]["bar"];
    assert_eq!(bar["config"], false);
    assert_eq!(bar["mandatory"], true);
    let baz = &bag["children"]["baz"];
    assert_eq!(baz["type"], "decimal64");
    assert_eq!(baz["default"], "0.0000000");
}

// ============================================================================
// Features
// ============================================================================

#[test]
fn test_if_feature_prunes_nodes() {
    let module = "module m { yang-version 1.1; namespace 'urn:m'; prefix m;
        feature extras;
        leaf plain { type string; }
        leaf extra { if-feature extras; type string; } }";

    // The manifest supports no features, so `extra` disappears.
    let fixture = model_from(&[("m", module)]);
    let tree = fixture.model.ascii_tree(TreeOptions::default());
    assert!(tree.contains("m:plain"));
    assert!(!tree.contains("m:extra"));
    assert!(fixture.model.from_raw_str(r#"{"m:extra": "x"}"#).is_err());
}

// ============================================================================
// Groupings and uses
// ============================================================================

#[test]
fn test_uses_expands_grouping_with_refine() {
    let fixture = model_from(&[(
        "m",
        "module m { namespace 'urn:m'; prefix m;
           grouping endpoint {
             leaf host { type string; }
             leaf port { type uint16; default 8080; }
           }
           container server {
             uses endpoint {
               refine port { default 80; }
             }
           } }",
    )]);
    let digest = fixture.model.schema_digest();
    let server = &digest["children"]["m:server"]["children"];
    assert_eq!(server["host"]["kind"], "leaf");
    assert_eq!(server["port"]["default"], "80");
}

#[test]
fn test_missing_grouping_is_fatal() {
    let error = try_model_from(&[(
        "m",
        "module m { namespace 'urn:m'; prefix m; uses ghost; }",
    )])
    .err()
    .expect("build should fail");
    assert!(error.to_string().contains("grouping not found"));
}

#[test]
fn test_circular_uses_is_fatal() {
    let error = try_model_from(&[(
        "m",
        "module m { namespace 'urn:m'; prefix m;
           grouping a { uses b; }
           grouping b { uses a; }
           uses a; }",
    )])
    .err()
    .expect("build should fail");
    assert!(error.to_string().contains("circular"));
}

// ============================================================================
// Augment and deviation
// ============================================================================

#[test]
fn test_augment_from_other_module() {
    let fixture = model_from(&[
        (
            "base",
            "module base { namespace 'urn:base'; prefix b;
               container box { leaf kept { type string; } } }",
        ),
        (
            "extra",
            "module extra { yang-version 1.1; namespace 'urn:extra'; prefix e;
               import base { prefix b; }
               augment /b:box {
                 leaf added { type string; }
               } }",
        ),
    ]);
    // The augmented member carries the augmenting module's namespace.
    let root = fixture
        .model
        .from_raw_str(r#"{"base:box": {"kept": "k", "extra:added": "a"}}"#)
        .unwrap();
    fixture
        .model
        .validate(&root, ValidationScope::All, ContentType::All)
        .unwrap();
}

#[test]
fn test_conditional_augment_gates_members() {
    let fixture = model_from(&[
        (
            "base",
            "module base { namespace 'urn:base'; prefix b;
               container box { leaf mode { type string; } } }",
        ),
        (
            "extra",
            "module extra { yang-version 1.1; namespace 'urn:extra'; prefix e;
               import base { prefix b; }
               augment /b:box {
                 when \"b:mode = 'on'\";
                 leaf added { type string; }
               } }",
        ),
    ]);
    let active = fixture
        .model
        .from_raw_str(r#"{"base:box": {"mode": "on", "extra:added": "a"}}"#)
        .unwrap();
    fixture
        .model
        .validate(&active, ValidationScope::All, ContentType::All)
        .unwrap();

    // With the condition false the augmented member is not allowed.
    let inactive = fixture
        .model
        .from_raw_str(r#"{"base:box": {"mode": "off", "extra:added": "a"}}"#)
        .unwrap();
    let error = fixture
        .model
        .validate(&inactive, ValidationScope::All, ContentType::All)
        .unwrap_err();
    assert_eq!(error.tag, "member-not-allowed");
}

#[test]
fn test_augment_nonexistent_target() {
    let error = try_model_from(&[
        (
            "base",
            "module base { namespace 'urn:base'; prefix b; container box; }",
        ),
        (
            "extra",
            "module extra { namespace 'urn:extra'; prefix e;
               import base { prefix b; }
               augment /b:ghost { leaf added { type string; } } }",
        ),
    ])
    .err()
    .expect("build should fail");
    assert!(error.to_string().contains("nonexistent schema node"));
}

#[test]
fn test_deviation_not_supported() {
    let fixture = model_from(&[
        (
            "base",
            "module base { namespace 'urn:base'; prefix b;
               container box { leaf kept { type string; } leaf gone { type string; } } }",
        ),
        (
            "dev",
            "module dev { namespace 'urn:dev'; prefix d;
               import base { prefix b; }
               deviation /b:box/b:gone { deviate not-supported; } }",
        ),
    ]);
    let tree = fixture.model.ascii_tree(TreeOptions::default());
    assert!(tree.contains("kept"));
    assert!(!tree.contains("gone"));
    assert!(fixture
        .model
        .from_raw_str(r#"{"base:box": {"gone": "x"}}"#)
        .is_err());
}

#[test]
fn test_deviation_replace_default() {
    let fixture = model_from(&[
        (
            "base",
            "module base { namespace 'urn:base'; prefix b;
               leaf timeout { type uint32; default 30; } }",
        ),
        (
            "dev",
            "module dev { namespace 'urn:dev'; prefix d;
               import base { prefix b; }
               deviation /b:timeout { deviate replace { default 60; } } }",
        ),
    ]);
    let digest = fixture.model.schema_digest();
    assert_eq!(digest["children"]["base:timeout"]["default"], "60");
}

// ============================================================================
// Submodules
// ============================================================================

#[test]
fn test_submodule_contributes_nodes() {
    let dir = tempfile::TempDir::new().unwrap();
    std::fs::write(
        dir.path().join("main.yang"),
        "module main { namespace 'urn:main'; prefix mn;
           include sub;
           leaf own { type string; } }",
    )
    .unwrap();
    std::fs::write(
        dir.path().join("sub.yang"),
        "submodule sub { belongs-to main { prefix mn; }
           leaf borrowed { type string; } }",
    )
    .unwrap();
    let library = r#"{"ietf-yang-library:modules-state": {"module-set-id": "",
        "module": [{"name": "main", "revision": "", "namespace": "urn:main",
                    "conformance-type": "implement",
                    "submodule": [{"name": "sub", "revision": ""}]}]}}"#;
    let model =
        yangcore::DataModel::from_library_str(library, &[dir.path().to_path_buf()]).unwrap();
    let tree = model.ascii_tree(TreeOptions::default());
    assert!(tree.contains("main:own"));
    // Submodule definitions live in the main module's namespace.
    assert!(tree.contains("main:borrowed"));
}

// ============================================================================
// RFC 8525 yang-library input
// ============================================================================

#[test]
fn test_model_from_8525_library() {
    let dir = tempfile::TempDir::new().unwrap();
    std::fs::write(
        dir.path().join("m.yang"),
        "module m { namespace 'urn:m'; prefix m; leaf x { type string; } }",
    )
    .unwrap();
    let library = r#"{"ietf-yang-library:yang-library": {
        "module-set": [{"name": "ms",
            "module": [{"name": "m", "revision": "", "namespace": "urn:m"}]}],
        "schema": [{"name": "s", "module-set": ["ms"]}],
        "datastore": [{"name": "ietf-datastores:running", "schema": "s"}],
        "content-id": "c1"}}"#;
    let model =
        yangcore::DataModel::from_library_str(library, &[dir.path().to_path_buf()]).unwrap();
    assert!(model.ascii_tree(TreeOptions::default()).contains("m:x"));
}

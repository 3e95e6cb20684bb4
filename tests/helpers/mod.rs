//! Shared test fixtures.
//!
//! Builds data models from inline YANG module text staged in a temporary
//! search directory.
#![allow(dead_code)]

use std::path::PathBuf;

use once_cell::sync::Lazy;
use tempfile::TempDir;
use yangcore::DataModel;

/// A built data model plus the directory its modules live in.
pub struct Fixture {
    pub model: DataModel,
    _dir: TempDir,
}

/// Stage the given `(name, text)` modules and build a data model where
/// all of them are implemented.
pub fn model_from(modules: &[(&str, &str)]) -> Fixture {
    try_model_from(modules).expect("data model should build")
}

pub fn try_model_from(modules: &[(&str, &str)]) -> yangcore::Result<Fixture> {
    let dir = TempDir::new().unwrap();
    for (name, text) in modules {
        std::fs::write(dir.path().join(format!("{name}.yang")), text).unwrap();
    }
    let entries: Vec<String> = modules
        .iter()
        .map(|(name, _)| {
            format!(
                r#"{{"name": "{name}", "revision": "", "namespace": "urn:{name}",
                    "conformance-type": "implement"}}"#
            )
        })
        .collect();
    let library = format!(
        r#"{{"ietf-yang-library:modules-state":
            {{"module-set-id": "", "module": [{}]}}}}"#,
        entries.join(",")
    );
    let search: Vec<PathBuf> = vec![dir.path().to_path_buf()];
    let model = DataModel::from_library_str(&library, &search)?;
    Ok(Fixture { model, _dir: dir })
}

/// A module exercising list keys, unique, a pattern with a
/// custom error message, a nonconfig mandatory leaf, and a conditional
/// default.
pub const EXAMPLE_2: &str = r#"module example-2 {
  yang-version 1.1;
  namespace "urn:example:2";
  prefix ex2;

  container bag {
    list foo {
      key "number";
      unique "in-words";
      leaf number {
        type uint64;
      }
      leaf in-words {
        type string {
          pattern "[a-z][a-z\\-]+[a-z]" {
            error-message "must be number in words";
          }
        }
      }
      leaf prime {
        type boolean;
      }
    }
    leaf bar {
      type boolean;
      config false;
      mandatory true;
    }
    leaf baz {
      when "not(../foo/in-words = 'forty-two')";
      type decimal64 {
        fraction-digits 7;
      }
      default "0";
    }
  }
}
"#;

pub fn example_2() -> Fixture {
    model_from(&[("example-2", EXAMPLE_2)])
}

/// Shared example-2 fixture for read-only tests.
pub static EXAMPLE_2_FIXTURE: Lazy<Fixture> = Lazy::new(example_2);

/// A valid instance document for example-2.
pub const EXAMPLE_2_INSTANCE: &str = r#"{
  "example-2:bag": {
    "bar": true,
    "foo": [
      {"number": "3", "in-words": "three", "prime": true}
    ]
  }
}"#;

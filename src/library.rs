//! YANG-library manifests.
//!
//! The data model is described by a YANG-library document in the RFC 7895
//! (`modules-state`) form. The newer RFC 8525 (`yang-library`) form is
//! accepted through [`YangLibrary::from_8525`], which selects one datastore
//! or schema and rewrites it into `modules-state` shape.

use serde::Deserialize;
use sha1::{Digest, Sha1};

/// Parsed YANG-library manifest (RFC 7895 form).
#[derive(Debug, Clone, Deserialize)]
pub struct YangLibrary {
    #[serde(rename = "ietf-yang-library:modules-state")]
    pub modules_state: ModulesState,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ModulesState {
    /// Opaque identifier supplied by the manifest; [`YangLibrary::module_set_id`]
    /// computes the canonical one.
    #[serde(rename = "module-set-id", default)]
    pub module_set_id: String,
    #[serde(default)]
    pub module: Vec<LibraryModule>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LibraryModule {
    pub name: String,
    #[serde(default)]
    pub revision: String,
    #[serde(default)]
    pub namespace: String,
    #[serde(rename = "conformance-type")]
    pub conformance_type: ConformanceType,
    #[serde(default)]
    pub feature: Vec<String>,
    #[serde(default)]
    pub deviation: Vec<LibraryDeviation>,
    #[serde(default)]
    pub submodule: Vec<LibrarySubmodule>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub enum ConformanceType {
    /// The module contributes data nodes to the data model.
    #[serde(rename = "implement")]
    Implement,
    /// Only the module's definitions (typedefs, groupings, identities)
    /// are available, via import.
    #[serde(rename = "import")]
    Import,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LibraryDeviation {
    pub name: String,
    #[serde(default)]
    pub revision: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LibrarySubmodule {
    pub name: String,
    #[serde(default)]
    pub revision: String,
}

impl YangLibrary {
    /// Parse a YANG-library document in RFC 7895 form.
    pub fn from_str(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }

    /// Parse an RFC 8525 document, selecting `datastore` (or the first
    /// listed datastore, falling back to the first schema).
    pub fn from_8525(text: &str, datastore: Option<&str>) -> Result<Self, String> {
        let lib: Lib8525Top =
            serde_json::from_str(text).map_err(|e| format!("invalid yang-library: {e}"))?;
        lib.yang_library.into_modules_state(datastore)
    }

    /// SHA-1 hex digest over the alphabetical join of `name@revision`
    /// entries for every listed module and submodule.
    ///
    /// Stable across permutations of the module list.
    pub fn module_set_id(&self) -> String {
        let mut entries: Vec<String> = Vec::new();
        for module in &self.modules_state.module {
            entries.push(format!("{}@{}", module.name, module.revision));
            for submodule in &module.submodule {
                entries.push(format!("{}@{}", submodule.name, submodule.revision));
            }
        }
        entries.sort();
        let mut hasher = Sha1::new();
        hasher.update(entries.concat().as_bytes());
        let digest = hasher.finalize();
        digest.iter().map(|b| format!("{b:02x}")).collect()
    }
}

// ===== RFC 8525 input shape =====

#[derive(Debug, Deserialize)]
struct Lib8525Top {
    #[serde(rename = "ietf-yang-library:yang-library")]
    yang_library: Lib8525,
}

#[derive(Debug, Deserialize)]
struct Lib8525 {
    #[serde(rename = "module-set", default)]
    module_set: Vec<Lib8525ModuleSet>,
    #[serde(default)]
    schema: Vec<Lib8525Schema>,
    #[serde(default)]
    datastore: Vec<Lib8525Datastore>,
    #[serde(rename = "content-id", default)]
    content_id: String,
}

#[derive(Debug, Deserialize)]
struct Lib8525ModuleSet {
    name: String,
    #[serde(default)]
    module: Vec<Lib8525Module>,
    #[serde(rename = "import-only-module", default)]
    import_only_module: Vec<Lib8525Module>,
}

#[derive(Debug, Deserialize)]
struct Lib8525Module {
    name: String,
    #[serde(default)]
    revision: String,
    #[serde(default)]
    namespace: String,
    #[serde(default)]
    feature: Vec<String>,
    #[serde(default)]
    deviation: Vec<String>,
    #[serde(default)]
    submodule: Vec<LibrarySubmodule>,
}

#[derive(Debug, Deserialize)]
struct Lib8525Schema {
    name: String,
    #[serde(rename = "module-set", default)]
    module_set: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct Lib8525Datastore {
    name: String,
    schema: String,
}

impl Lib8525 {
    fn into_modules_state(self, datastore: Option<&str>) -> Result<YangLibrary, String> {
        let schema_name = match datastore {
            Some(wanted) => self
                .datastore
                .iter()
                .find(|d| d.name == wanted)
                .map(|d| d.schema.clone())
                .ok_or_else(|| format!("datastore not found: {wanted}"))?,
            None => match self.datastore.first() {
                Some(d) => d.schema.clone(),
                None => self
                    .schema
                    .first()
                    .map(|s| s.name.clone())
                    .ok_or("yang-library lists no schema")?,
            },
        };
        let schema = self
            .schema
            .iter()
            .find(|s| s.name == schema_name)
            .ok_or_else(|| format!("schema not found: {schema_name}"))?;

        let mut modules = Vec::new();
        for set_name in &schema.module_set {
            let set = self
                .module_set
                .iter()
                .find(|s| &s.name == set_name)
                .ok_or_else(|| format!("module-set not found: {set_name}"))?;
            for module in &set.module {
                modules.push(module.to_7895(ConformanceType::Implement));
            }
            for module in &set.import_only_module {
                modules.push(module.to_7895(ConformanceType::Import));
            }
        }
        Ok(YangLibrary {
            modules_state: ModulesState {
                module_set_id: self.content_id,
                module: modules,
            },
        })
    }
}

impl Lib8525Module {
    fn to_7895(&self, conformance_type: ConformanceType) -> LibraryModule {
        LibraryModule {
            name: self.name.clone(),
            revision: self.revision.clone(),
            namespace: self.namespace.clone(),
            conformance_type,
            feature: self.feature.clone(),
            deviation: self
                .deviation
                .iter()
                .map(|name| LibraryDeviation {
                    name: name.clone(),
                    revision: String::new(),
                })
                .collect(),
            submodule: self.submodule.clone(),
        }
    }
}

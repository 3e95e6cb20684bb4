//! Module registry and name resolution.
//!
//! [`ModuleRegistry::register_modules`] locates, parses, and stages every
//! (sub)module listed in a YANG-library manifest, builds per-module prefix
//! maps, detects import cycles, validates feature prerequisites, and
//! collects the identity graph. The registry is then consulted throughout
//! schema compilation and is immutable afterwards.

mod error;
mod features;

pub use error::RegistryError;
pub use features::{parse_feature_expr, FeatureExpr};

use std::path::{Path, PathBuf};

use rustc_hash::{FxHashMap, FxHashSet};
use smol_str::SmolStr;
use tracing::{debug, trace};

use crate::base::{ModuleId, QualName};
use crate::library::{ConformanceType, YangLibrary};
use crate::parser::{self, ParseError, Stmt, StmtId};

type Result<T> = std::result::Result<T, RegistryError>;

/// One staged (sub)module.
#[derive(Debug)]
pub struct ModuleEntry {
    pub id: ModuleId,
    pub tree: parser::StatementTree,
    pub conformance: ConformanceType,
    /// Main-module identifier: self for main modules, the parent for
    /// submodules.
    pub main: ModuleId,
    /// Prefix → module identifier for the names this (sub)module imports
    /// (including its own prefix).
    pub prefix_map: FxHashMap<SmolStr, ModuleId>,
    /// Submodules of this module.
    pub submodules: FxHashSet<ModuleId>,
}

impl ModuleEntry {
    pub fn is_submodule(&self) -> bool {
        self.id != self.main
    }
}

/// Identity graph node: base identities and directly-derived identities.
#[derive(Debug, Default)]
pub struct IdentityInfo {
    pub bases: Vec<QualName>,
    pub derived: Vec<QualName>,
}

/// The module registry consulted throughout schema compilation.
#[derive(Debug, Default)]
pub struct ModuleRegistry {
    entries: Vec<ModuleEntry>,
    by_id: FxHashMap<ModuleId, usize>,
    /// Module name → revisions present, ascending.
    revisions: FxHashMap<SmolStr, Vec<SmolStr>>,
    /// Main modules with `conformance-type: implement`, in registration
    /// order.
    implemented: Vec<usize>,
    implemented_by_name: FxHashMap<SmolStr, usize>,
    /// All features the manifest declares supported.
    features: FxHashSet<QualName>,
    identities: FxHashMap<QualName, IdentityInfo>,
}

impl ModuleRegistry {
    /// Locate, parse, and stage every (sub)module the manifest lists, then
    /// resolve prefixes, check import cycles and feature prerequisites, and
    /// collect identities.
    pub fn register_modules(library: &YangLibrary, search_dirs: &[PathBuf]) -> Result<Self> {
        let mut registry = ModuleRegistry::default();
        for module in &library.modules_state.module {
            let id = ModuleId::new(module.name.as_str(), module.revision.as_str());
            let implement = module.conformance_type == ConformanceType::Implement;
            if implement && registry.implemented_by_name.contains_key(id.name.as_str()) {
                return Err(RegistryError::MultipleImplementedRevisions(
                    module.name.clone(),
                ));
            }
            debug!(module = %id, implement, "registering module");
            let index = registry.stage(&id, id.clone(), module.conformance_type, search_dirs)?;
            if implement {
                registry.implemented.push(index);
                registry
                    .implemented_by_name
                    .insert(id.name.clone(), index);
            }
            for feature in &module.feature {
                registry
                    .features
                    .insert(QualName::new(feature.as_str(), id.name.clone()));
            }
            for submodule in &module.submodule {
                let sub_id = ModuleId::new(submodule.name.as_str(), submodule.revision.as_str());
                let sub_index =
                    registry.stage(&sub_id, id.clone(), module.conformance_type, search_dirs)?;
                registry.entries[index].submodules.insert(sub_id);
                let _ = sub_index;
            }
        }
        registry.build_prefix_maps()?;
        registry.check_import_cycles()?;
        registry.check_feature_prerequisites()?;
        registry.collect_identities()?;
        Ok(registry)
    }

    fn stage(
        &mut self,
        id: &ModuleId,
        main: ModuleId,
        conformance: ConformanceType,
        search_dirs: &[PathBuf],
    ) -> Result<usize> {
        let path = locate(id, search_dirs)
            .ok_or_else(|| RegistryError::ModuleNotFound(id.to_string()))?;
        let text = std::fs::read_to_string(&path).map_err(|source| RegistryError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let tree = parser::parse(&text, Some(&id.name), Some(&id.revision))?;
        let index = self.entries.len();
        self.entries.push(ModuleEntry {
            id: id.clone(),
            tree,
            conformance,
            main,
            prefix_map: FxHashMap::default(),
            submodules: FxHashSet::default(),
        });
        self.by_id.insert(id.clone(), index);
        let revisions = self.revisions.entry(id.name.clone()).or_default();
        revisions.push(id.revision.clone());
        revisions.sort();
        Ok(index)
    }

    fn build_prefix_maps(&mut self) -> Result<()> {
        for index in 0..self.entries.len() {
            let mut prefix_map = FxHashMap::default();
            let entry = &self.entries[index];
            let root = entry.tree.root();

            // The module's own prefix maps to its main module.
            if entry.is_submodule() {
                let belongs = root.find1("belongs-to").ok_or_else(|| {
                    ParseError::invalid(0, format!("submodule {} lacks belongs-to", entry.id))
                })?;
                if belongs.argument() != Some(entry.main.name.as_str()) {
                    return Err(RegistryError::BadSubmodule {
                        submodule: entry.id.to_string(),
                        module: entry.main.to_string(),
                    });
                }
                if let Some(prefix) = belongs.arg_of("prefix") {
                    prefix_map.insert(SmolStr::new(prefix), entry.main.clone());
                }
            } else if let Some(prefix) = root.arg_of("prefix") {
                prefix_map.insert(SmolStr::new(prefix), entry.id.clone());
            }

            for import in root.find_all("import") {
                let name = import.argument().unwrap_or_default();
                let prefix = import.arg_of("prefix").ok_or_else(|| {
                    ParseError::invalid(0, format!("import of {name} lacks a prefix"))
                })?;
                let target = match import.arg_of("revision-date") {
                    Some(revision) => {
                        let id = ModuleId::new(name, revision);
                        if !self.by_id.contains_key(&id) {
                            return Err(RegistryError::ModuleNotFound(id.to_string()));
                        }
                        id
                    }
                    None => self
                        .last_revision(name)
                        .ok_or_else(|| RegistryError::ModuleNotFound(name.to_string()))?,
                };
                trace!(module = %entry.id, prefix, target = %target, "import");
                prefix_map.insert(SmolStr::new(prefix), target);
            }
            self.entries[index].prefix_map = prefix_map;
        }
        Ok(())
    }

    fn check_import_cycles(&self) -> Result<()> {
        // Adjacency over main-module names; submodule imports count as
        // imports of their main module.
        let mut graph: FxHashMap<&str, FxHashSet<&str>> = FxHashMap::default();
        for entry in &self.entries {
            let from = entry.main.name.as_str();
            let adj = graph.entry(from).or_default();
            for imported in entry.tree.root().find_all("import") {
                if let Some(name) = imported.argument() {
                    adj.insert(name);
                }
            }
        }
        let mut done: FxHashSet<&str> = FxHashSet::default();
        let mut in_progress: FxHashSet<&str> = FxHashSet::default();
        fn visit<'a>(
            node: &'a str,
            graph: &FxHashMap<&'a str, FxHashSet<&'a str>>,
            done: &mut FxHashSet<&'a str>,
            in_progress: &mut FxHashSet<&'a str>,
        ) -> Result<()> {
            if done.contains(node) {
                return Ok(());
            }
            if !in_progress.insert(node) {
                return Err(RegistryError::CyclicImports(node.to_string()));
            }
            if let Some(next) = graph.get(node) {
                for n in next {
                    visit(n, graph, done, in_progress)?;
                }
            }
            in_progress.remove(node);
            done.insert(node);
            Ok(())
        }
        for node in graph.keys() {
            visit(node, &graph, &mut done, &mut in_progress)?;
        }
        Ok(())
    }

    /// A supported feature whose declaration carries `if-feature` must have
    /// every referenced feature supported too.
    fn check_feature_prerequisites(&self) -> Result<()> {
        for (index, entry) in self.entries.iter().enumerate() {
            for feature in entry.tree.root().find_all("feature") {
                let Some(name) = feature.argument() else {
                    continue;
                };
                let qname = QualName::new(name, entry.main.name.clone());
                if !self.features.contains(&qname) {
                    continue;
                }
                for condition in feature.find_all("if-feature") {
                    let expr = self.parse_if_feature(condition, index)?;
                    let mut refs = Vec::new();
                    expr.references(&mut refs);
                    if refs.iter().any(|r| !self.features.contains(r)) {
                        return Err(RegistryError::FeaturePrerequisiteError {
                            feature: qname.to_string(),
                        });
                    }
                }
            }
        }
        Ok(())
    }

    fn collect_identities(&mut self) -> Result<()> {
        let mut edges: Vec<(QualName, Vec<QualName>)> = Vec::new();
        for (index, entry) in self.entries.iter().enumerate() {
            for identity in entry.tree.root().find_all("identity") {
                let Some(name) = identity.argument() else {
                    continue;
                };
                if !self.if_features(identity, index)? {
                    trace!(identity = name, "discarded by if-feature");
                    continue;
                }
                let qname = QualName::new(name, entry.main.name.clone());
                let mut bases = Vec::new();
                for base in identity.find_all("base") {
                    if let Some(arg) = base.argument() {
                        bases.push(self.translate_pname(arg, index)?);
                    }
                }
                edges.push((qname, bases));
            }
        }
        for (qname, bases) in edges {
            for base in &bases {
                self.identities
                    .entry(base.clone())
                    .or_default()
                    .derived
                    .push(qname.clone());
            }
            self.identities.entry(qname).or_default().bases = bases;
        }
        Ok(())
    }

    // ===== lookup operations =====

    pub fn entries(&self) -> &[ModuleEntry] {
        &self.entries
    }

    pub fn entry(&self, index: usize) -> &ModuleEntry {
        &self.entries[index]
    }

    /// Indices of implemented main modules, in registration order.
    pub fn implemented(&self) -> &[usize] {
        &self.implemented
    }

    pub fn implemented_by_name(&self, name: &str) -> Option<usize> {
        self.implemented_by_name.get(name).copied()
    }

    pub fn index_of(&self, id: &ModuleId) -> Option<usize> {
        self.by_id.get(id).copied()
    }

    /// Namespace (main-module name) of the given entry.
    pub fn namespace(&self, index: usize) -> &SmolStr {
        &self.entries[index].main.name
    }

    /// The most recent revision of `module` present in the registry.
    pub fn last_revision(&self, module: &str) -> Option<ModuleId> {
        let revisions = self.revisions.get(module)?;
        revisions
            .last()
            .map(|rev| ModuleId::new(module, rev.clone()))
    }

    /// Resolve a prefix through the context entry's prefix map.
    pub fn prefix_to_module_id(&self, prefix: &str, context: usize) -> Result<ModuleId> {
        self.entries[context]
            .prefix_map
            .get(prefix)
            .cloned()
            .ok_or_else(|| RegistryError::UnknownPrefix(prefix.to_string()))
    }

    /// Resolve `[prefix:]name` to the local name plus the entry index of the
    /// defining module. Unprefixed names resolve to the context entry.
    pub fn resolve_pname<'a>(&self, pname: &'a str, context: usize) -> Result<(&'a str, usize)> {
        match pname.split_once(':') {
            Some((prefix, local)) => {
                let id = self.prefix_to_module_id(prefix, context)?;
                let index = self
                    .by_id
                    .get(&id)
                    .copied()
                    .ok_or_else(|| RegistryError::ModuleNotFound(id.to_string()))?;
                Ok((local, index))
            }
            None => Ok((pname, context)),
        }
    }

    /// Translate `[prefix:]name` into a qualified name.
    pub fn translate_pname(&self, pname: &str, context: usize) -> Result<QualName> {
        let (local, index) = self.resolve_pname(pname, context)?;
        Ok(QualName::new(local, self.namespace(index).clone()))
    }

    /// Find the `grouping` or `typedef` statement a `uses`/`type` statement
    /// refers to, searching the lexically-enclosing scope chain outwards,
    /// then the module-wide scope (main module plus submodules). Returns
    /// the definition statement with its own entry index as schema context.
    pub fn get_definition(&self, reference: Stmt<'_>, context: usize) -> Result<(usize, StmtId)> {
        let dkw = match reference.keyword() {
            "uses" => "grouping",
            _ => "typedef",
        };
        let pname = reference.argument().unwrap_or_default();
        let (local, target) = self.resolve_pname(pname, context)?;

        if self.entries[target].main == self.entries[context].main {
            // Same module: lexical scope chain first.
            for ancestor in reference.ancestors() {
                if let Some(found) = ancestor.find1_arg(dkw, local) {
                    return Ok((context, found.id()));
                }
            }
        }
        // Module-wide scope of the target: its main module and submodules.
        for index in self.module_scope(target) {
            if let Some(found) = self.entries[index].tree.root().find1_arg(dkw, local) {
                return Ok((index, found.id()));
            }
        }
        Err(RegistryError::DefinitionNotFound {
            kind: dkw,
            name: pname.to_string(),
        })
    }

    /// Entry indices forming a module's whole-module scope: the main module
    /// followed by its submodules.
    pub fn module_scope(&self, index: usize) -> Vec<usize> {
        let main_id = self.entries[index].main.clone();
        let mut scope = Vec::new();
        if let Some(main_index) = self.by_id.get(&main_id) {
            scope.push(*main_index);
            for sub in &self.entries[*main_index].submodules {
                if let Some(sub_index) = self.by_id.get(sub) {
                    scope.push(*sub_index);
                }
            }
        }
        scope
    }

    /// XPath schema context for expressions written in the given entry:
    /// unprefixed names default to the entry's namespace, prefixes map to
    /// module names.
    pub fn schema_context(&self, index: usize) -> crate::xpath::SchemaContext {
        crate::xpath::SchemaContext {
            default_module: self.namespace(index).clone(),
            prefixes: self.entries[index]
                .prefix_map
                .iter()
                .map(|(prefix, id)| (prefix.clone(), id.name.clone()))
                .collect(),
        }
    }

    // ===== features =====

    pub fn supports_feature(&self, feature: &QualName) -> bool {
        self.features.contains(feature)
    }

    fn parse_if_feature(&self, stmt: Stmt<'_>, context: usize) -> Result<FeatureExpr> {
        let text = stmt.argument().unwrap_or_default();
        let default_module = self.namespace(context).clone();
        parse_feature_expr(text, &|prefix, local| match prefix {
            None => Ok(QualName::new(local, default_module.clone())),
            Some(prefix) => {
                let id = self.prefix_to_module_id(prefix, context)?;
                Ok(QualName::new(local, id.name))
            }
        })
    }

    /// Evaluate all `if-feature` substatements of `stmt`; true iff all hold.
    pub fn if_features(&self, stmt: Stmt<'_>, context: usize) -> Result<bool> {
        for condition in stmt.find_all("if-feature") {
            let expr = self.parse_if_feature(condition, context)?;
            if !expr.holds(&|qn| self.features.contains(qn)) {
                return Ok(false);
            }
        }
        Ok(true)
    }

    // ===== identities =====

    pub fn identity(&self, name: &QualName) -> Option<&IdentityInfo> {
        self.identities.get(name)
    }

    /// Transitive identity-derivation test: is `child` derived from
    /// `ancestor` through one or more `base` links?
    pub fn is_derived_from(&self, child: &QualName, ancestor: &QualName) -> bool {
        let mut seen: FxHashSet<&QualName> = FxHashSet::default();
        let mut stack: Vec<&QualName> = vec![child];
        while let Some(current) = stack.pop() {
            let Some(info) = self.identities.get(current) else {
                continue;
            };
            for base in &info.bases {
                if base == ancestor {
                    return true;
                }
                if seen.insert(base) {
                    stack.push(base);
                }
            }
        }
        false
    }

    pub fn is_derived_or_self(&self, child: &QualName, ancestor: &QualName) -> bool {
        child == ancestor || self.is_derived_from(child, ancestor)
    }
}

/// Find `name[@revision].yang` in the search directories; a revisionless
/// file name is accepted as a fallback.
pub(crate) fn locate(id: &ModuleId, search_dirs: &[PathBuf]) -> Option<PathBuf> {
    let candidates = if id.revision.is_empty() {
        vec![format!("{}.yang", id.name)]
    } else {
        vec![id.file_name(), format!("{}.yang", id.name)]
    };
    for dir in search_dirs {
        for candidate in &candidates {
            let path: PathBuf = Path::new(dir).join(candidate);
            if path.is_file() {
                return Some(path);
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn stage_files(files: &[(&str, &str)]) -> TempDir {
        let dir = TempDir::new().unwrap();
        for (name, text) in files {
            std::fs::write(dir.path().join(name), text).unwrap();
        }
        dir
    }

    fn library(modules: &[(&str, &str, &str, &[&str])]) -> YangLibrary {
        let entries: Vec<String> = modules
            .iter()
            .map(|(name, revision, conformance, features)| {
                let features: Vec<String> =
                    features.iter().map(|f| format!("\"{f}\"")).collect();
                format!(
                    r#"{{"name": "{name}", "revision": "{revision}", "namespace": "urn:{name}",
                        "conformance-type": "{conformance}", "feature": [{}]}}"#,
                    features.join(",")
                )
            })
            .collect();
        YangLibrary::from_str(&format!(
            r#"{{"ietf-yang-library:modules-state":
                {{"module-set-id": "", "module": [{}]}}}}"#,
            entries.join(",")
        ))
        .unwrap()
    }

    fn register(
        files: &[(&str, &str)],
        modules: &[(&str, &str, &str, &[&str])],
    ) -> Result<ModuleRegistry> {
        let dir = stage_files(files);
        ModuleRegistry::register_modules(&library(modules), &[dir.path().to_path_buf()])
    }

    #[test]
    fn test_register_and_resolve() {
        let registry = register(
            &[
                (
                    "a.yang",
                    "module a { prefix a; namespace 'urn:a';
                       import b { prefix bee; } leaf x { type bee:t; } }",
                ),
                (
                    "b@2020-01-01.yang",
                    "module b { prefix b; namespace 'urn:b'; revision 2020-01-01;
                       typedef t { type string; } }",
                ),
            ],
            &[
                ("a", "", "implement", &[]),
                ("b", "2020-01-01", "import", &[]),
            ],
        )
        .unwrap();

        assert_eq!(registry.implemented().len(), 1);
        let bee = registry.prefix_to_module_id("bee", 0).unwrap();
        assert_eq!(bee, ModuleId::new("b", "2020-01-01"));
        assert_eq!(
            registry.translate_pname("bee:t", 0).unwrap(),
            QualName::new("t", "b")
        );
        assert_eq!(
            registry.translate_pname("x", 0).unwrap(),
            QualName::new("x", "a")
        );
        assert!(matches!(
            registry.prefix_to_module_id("nope", 0),
            Err(RegistryError::UnknownPrefix(_))
        ));
    }

    #[test]
    fn test_module_not_found() {
        let err = register(&[], &[("ghost", "", "implement", &[])]).unwrap_err();
        assert!(matches!(err, RegistryError::ModuleNotFound(_)));
    }

    #[test]
    fn test_multiple_implemented_revisions() {
        let err = register(
            &[
                (
                    "m@2020-01-01.yang",
                    "module m { prefix m; namespace 'urn:m'; revision 2020-01-01; }",
                ),
                (
                    "m@2021-01-01.yang",
                    "module m { prefix m; namespace 'urn:m'; revision 2021-01-01; }",
                ),
            ],
            &[
                ("m", "2020-01-01", "implement", &[]),
                ("m", "2021-01-01", "implement", &[]),
            ],
        )
        .unwrap_err();
        assert!(matches!(
            err,
            RegistryError::MultipleImplementedRevisions(_)
        ));
    }

    #[test]
    fn test_cyclic_imports() {
        let err = register(
            &[
                (
                    "a.yang",
                    "module a { prefix a; namespace 'urn:a'; import b { prefix b; } }",
                ),
                (
                    "b.yang",
                    "module b { prefix b; namespace 'urn:b'; import a { prefix a; } }",
                ),
            ],
            &[("a", "", "implement", &[]), ("b", "", "import", &[])],
        )
        .unwrap_err();
        assert!(matches!(err, RegistryError::CyclicImports(_)));
    }

    #[test]
    fn test_feature_prerequisites() {
        let files = [(
            "m.yang",
            "module m { prefix m; namespace 'urn:m';
               feature base;
               feature extra { if-feature base; } }",
        )];
        // Supporting `extra` without `base` is an error.
        let err = register(&files, &[("m", "", "implement", &["extra"])]).unwrap_err();
        assert!(matches!(
            err,
            RegistryError::FeaturePrerequisiteError { .. }
        ));
        // Supporting both is fine, as is supporting neither.
        assert!(register(&files, &[("m", "", "implement", &["base", "extra"])]).is_ok());
        assert!(register(&files, &[("m", "", "implement", &[])]).is_ok());
    }

    #[test]
    fn test_identity_derivation() {
        let registry = register(
            &[(
                "m.yang",
                "module m { prefix m; namespace 'urn:m';
                   identity a; identity b { base a; } identity c { base b; } }",
            )],
            &[("m", "", "implement", &[])],
        )
        .unwrap();
        let a = QualName::new("a", "m");
        let b = QualName::new("b", "m");
        let c = QualName::new("c", "m");
        assert!(registry.is_derived_from(&c, &a));
        assert!(registry.is_derived_from(&b, &a));
        assert!(!registry.is_derived_from(&a, &a));
        assert!(registry.is_derived_or_self(&a, &a));
        assert!(!registry.is_derived_from(&a, &c));
        assert_eq!(registry.identity(&a).unwrap().derived, vec![b]);
    }

    #[test]
    fn test_identity_discarded_by_if_feature() {
        let registry = register(
            &[(
                "m.yang",
                "module m { prefix m; namespace 'urn:m';
                   feature f;
                   identity a; identity b { if-feature f; base a; } }",
            )],
            &[("m", "", "implement", &[])],
        )
        .unwrap();
        assert!(registry.identity(&QualName::new("b", "m")).is_none());
    }

    #[test]
    fn test_get_definition_scope_chain() {
        let registry = register(
            &[(
                "m.yang",
                "module m { prefix m; namespace 'urn:m';
                   typedef t { type string; }
                   container c {
                     typedef t { type uint8; }
                     leaf x { type t; } } }",
            )],
            &[("m", "", "implement", &[])],
        )
        .unwrap();
        let root = registry.entry(0).tree.root();
        let container = root.find1("container").unwrap();
        let leaf = container.find1("leaf").unwrap();
        let type_stmt = leaf.find1("type").unwrap();
        let (index, def) = registry.get_definition(type_stmt, 0).unwrap();
        // The lexically-closer typedef wins.
        let def = registry.entry(index).tree.get(def);
        assert_eq!(def.arg_of("type"), Some("uint8"));
    }

    #[test]
    fn test_last_revision() {
        let registry = register(
            &[
                (
                    "m@2020-01-01.yang",
                    "module m { prefix m; namespace 'urn:m'; revision 2020-01-01; }",
                ),
                (
                    "m@2021-06-01.yang",
                    "module m { prefix m; namespace 'urn:m'; revision 2021-06-01; }",
                ),
            ],
            &[
                ("m", "2021-06-01", "implement", &[]),
                ("m", "2020-01-01", "import", &[]),
            ],
        )
        .unwrap();
        assert_eq!(
            registry.last_revision("m"),
            Some(ModuleId::new("m", "2021-06-01"))
        );
    }
}

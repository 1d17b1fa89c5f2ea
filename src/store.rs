//! Central project store
//!
//! Owns every derived structure for one project root: the file tree, the
//! components (which own their fields and methods), the method and package
//! indexes, the string index, parse errors and the call graph. Reverse
//! lookups go through FQNs and method keys rather than references.
//!
//! Parse workers never touch the store. Each returns a [`FileFragment`]
//! and the coordinating thread merges fragments in file order.

use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

use crate::callgraph::{self, CallGraph};
use crate::models::{AnalysisStats, Component, FileNode, Method, ParseError};
use crate::resolver::{resolve_supertypes, Resolver};
use crate::strings::{StringHit, StringIndex};

/// Everything one parse worker produced for one file
#[derive(Debug, Default)]
pub struct FileFragment {
    pub path: PathBuf,
    pub components: Vec<Component>,
    pub errors: Vec<ParseError>,
    pub strings: Vec<(String, StringHit)>,
}

#[derive(Debug)]
pub struct ProjectStore {
    pub root: PathBuf,
    pub tree: FileNode,
    /// FQN -> component, sorted
    pub components: BTreeMap<String, Component>,
    /// Method key -> (component FQN, key in the component's method map)
    method_index: HashMap<String, (String, String)>,
    /// Package -> top-level component FQNs
    pub packages: BTreeMap<String, Vec<String>>,
    pub strings: StringIndex,
    pub parse_errors: Vec<ParseError>,
    pub graph: CallGraph,
    /// Start of the analysis pass that produced this state
    pub built_at: DateTime<Utc>,
    pub files_parsed: usize,
    pub from_cache: bool,
}

impl ProjectStore {
    pub fn new(root: PathBuf, tree: FileNode, built_at: DateTime<Utc>) -> Self {
        Self {
            root,
            tree,
            components: BTreeMap::new(),
            method_index: HashMap::new(),
            packages: BTreeMap::new(),
            strings: StringIndex::new(),
            parse_errors: Vec::new(),
            graph: CallGraph::default(),
            built_at,
            files_parsed: 0,
            from_cache: false,
        }
    }

    /// Merge one worker fragment; a repeated FQN keeps the first declaration
    pub fn merge(&mut self, fragment: FileFragment) {
        self.files_parsed += 1;
        self.parse_errors.extend(fragment.errors);
        self.strings.extend(fragment.strings);

        for component in fragment.components {
            if let Some(existing) = self.components.get(&component.fqn) {
                log::warn!(
                    "Duplicate component {} in {} (keeping {})",
                    component.fqn,
                    fragment.path.display(),
                    existing.file_path.display()
                );
                continue;
            }
            self.insert_component(component);
        }
    }

    /// Insert a component and index its methods and package
    pub fn insert_component(&mut self, component: Component) {
        for (member_key, method) in &component.methods {
            self.method_index
                .insert(method.key.clone(), (component.fqn.clone(), member_key.clone()));
        }
        if !component.is_nested() {
            self.packages
                .entry(component.package.clone())
                .or_default()
                .push(component.fqn.clone());
        }
        self.components.insert(component.fqn.clone(), component);
    }

    /// Qualify supertypes, then build the call graph
    ///
    /// Runs single-threaded after every fragment has been merged.
    pub fn link(&mut self) {
        let resolver = Resolver::new(self.components.keys().map(String::as_str));
        resolve_supertypes(&resolver, self.components.values_mut());
        self.graph = callgraph::build(&mut self.components, &resolver);
    }

    pub fn component(&self, fqn: &str) -> Option<&Component> {
        self.components.get(fqn)
    }

    pub fn method(&self, key: &str) -> Option<&Method> {
        let (fqn, member_key) = self.method_index.get(key)?;
        self.components.get(fqn)?.methods.get(member_key)
    }

    /// Component owning the method `key`
    pub fn method_owner(&self, key: &str) -> Option<&Component> {
        let (fqn, _) = self.method_index.get(key)?;
        self.components.get(fqn)
    }

    pub fn method_keys(&self) -> impl Iterator<Item = &String> {
        self.method_index.keys()
    }

    pub fn method_count(&self) -> usize {
        self.method_index.len()
    }

    /// Top-level components declared in `package`
    pub fn package(&self, package: &str) -> &[String] {
        self.packages.get(package).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Parse errors recorded for one file
    pub fn errors_for(&self, path: &Path) -> Vec<&ParseError> {
        self.parse_errors.iter().filter(|e| e.path == path).collect()
    }

    pub fn stats(&self) -> AnalysisStats {
        AnalysisStats {
            files_parsed: self.files_parsed,
            components: self.components.len(),
            methods: self.method_count(),
            call_edges: self.graph.edge_count(),
            string_terms: self.strings.len(),
            parse_errors: self.parse_errors.len(),
            from_cache: self.from_cache,
        }
    }
}

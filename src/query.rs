//! Read-only query API over a populated [`ProjectStore`]
//!
//! Every result type is `Serialize` so callers can print JSON directly.

use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;

use crate::models::{Component, FileKind, FileNode, LineSpan, Method, ParseError};
use crate::parsers::read_source;
use crate::store::ProjectStore;
use crate::strings::StringHit;
use crate::tree;

/// Component listing filter; all parts are optional and combine with AND
#[derive(Debug, Clone, Default)]
pub struct ComponentFilter {
    /// Kind name, case-insensitive (`controller` also admits `RestController`)
    pub kind: Option<String>,
    /// Case-insensitive substring of the simple name
    pub name: Option<String>,
    /// Only components carrying a Spring stereotype
    pub spring_only: bool,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ComponentSummary {
    pub name: String,
    pub fqn: String,
    pub kind: String,
    pub file_path: PathBuf,
    pub line: usize,
    pub annotations: Vec<String>,
    pub extends: Vec<String>,
    pub implements: Vec<String>,
    pub fields: usize,
    pub methods: usize,
}

impl From<&Component> for ComponentSummary {
    fn from(c: &Component) -> Self {
        Self {
            name: c.name.clone(),
            fqn: c.fqn.clone(),
            kind: c.kind.to_string(),
            file_path: c.file_path.clone(),
            line: c.line,
            annotations: c.annotations.clone(),
            extends: c.extends.clone(),
            implements: c.implements.clone(),
            fields: c.fields.len(),
            methods: c.methods.len(),
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct MethodSummary {
    pub key: String,
    pub display_name: String,
    pub component: String,
    pub return_type: String,
    pub file_path: PathBuf,
    pub line: usize,
}

impl MethodSummary {
    fn new(component: &Component, method: &Method) -> Self {
        Self {
            key: method.key.clone(),
            display_name: method.display_name(&component.name),
            component: component.fqn.clone(),
            return_type: method.return_type.clone(),
            file_path: component.file_path.clone(),
            line: method.lines.start,
        }
    }
}

/// One node of a call tree
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct CallNode {
    pub key: String,
    pub display_name: String,
    /// Already on the path from the root; not expanded again
    pub recursive: bool,
    pub children: Vec<CallNode>,
}

/// Everything known about one method
#[derive(Debug, Clone, Serialize)]
pub struct MethodFlow {
    pub display_name: String,
    pub key: String,
    pub component_name: String,
    pub component_fqn: String,
    pub component_kind: String,
    pub file_path: PathBuf,
    pub signature: String,
    pub return_type: String,
    pub modifiers: Vec<String>,
    pub annotations: Vec<String>,
    pub throws: Vec<String>,
    pub lines: LineSpan,
    /// Source lines of the method, empty if the file can't be read
    pub source: Vec<String>,
    pub callees: Vec<CallNode>,
    pub callers: Vec<CallNode>,
}

/// Outcome of a method-flow lookup
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", content = "result", rename_all = "snake_case")]
pub enum FlowLookup {
    Found(Box<MethodFlow>),
    /// More than one method matched; pick one of these keys
    Ambiguous(Vec<MethodSummary>),
    NotFound,
}

/// Depths of the call trees in a method flow
///
/// Direct callees (or callers) are always listed; a depth of N expands
/// them N more levels, so the default callee tree shows four levels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlowOptions {
    pub callee_depth: usize,
    pub caller_depth: usize,
}

impl Default for FlowOptions {
    fn default() -> Self {
        Self { callee_depth: 3, caller_depth: 1 }
    }
}

#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct AnnotationSummary {
    /// Unique annotations over components, fields and methods
    pub annotations: Vec<String>,
    /// Component count per kind
    pub kinds: BTreeMap<String, usize>,
}

pub struct QueryEngine<'a> {
    store: &'a ProjectStore,
}

impl<'a> QueryEngine<'a> {
    pub fn new(store: &'a ProjectStore) -> Self {
        Self { store }
    }

    /// Components matching `filter`, sorted by FQN
    pub fn components(&self, filter: &ComponentFilter) -> Vec<&'a Component> {
        let name = filter.name.as_ref().map(|n| n.to_lowercase());
        self.store
            .components
            .values()
            .filter(|c| !filter.spring_only || c.kind.is_stereotype())
            .filter(|c| filter.kind.as_deref().is_none_or(|k| c.kind.matches_filter(k)))
            .filter(|c| name.as_deref().is_none_or(|n| c.name.to_lowercase().contains(n)))
            .collect()
    }

    /// Methods whose name contains `term`, case-insensitive
    ///
    /// Sorted by component FQN, then method name, then key.
    pub fn search_methods(&self, term: &str) -> Vec<MethodSummary> {
        let needle = term.to_lowercase();
        let mut hits: Vec<(&Component, &Method)> = self
            .store
            .components
            .values()
            .flat_map(|c| c.methods.values().map(move |m| (c, m)))
            .filter(|(_, m)| m.name.to_lowercase().contains(&needle))
            .collect();
        hits.sort_by(|(ca, ma), (cb, mb)| {
            ca.fqn
                .cmp(&cb.fqn)
                .then_with(|| ma.name.cmp(&mb.name))
                .then_with(|| ma.key.cmp(&mb.key))
        });
        hits.into_iter().map(|(c, m)| MethodSummary::new(c, m)).collect()
    }

    /// Identifier and literal occurrences of `term`
    pub fn search_string(&self, term: &str) -> &'a [StringHit] {
        self.store.strings.lookup(term)
    }

    /// Top-level components of a package
    pub fn package(&self, package: &str) -> &'a [String] {
        self.store.package(package)
    }

    pub fn parse_errors(&self) -> &'a [ParseError] {
        &self.store.parse_errors
    }

    pub fn annotation_summary(&self) -> AnnotationSummary {
        let mut annotations = BTreeSet::new();
        let mut kinds: BTreeMap<String, usize> = BTreeMap::new();

        for component in self.store.components.values() {
            *kinds.entry(component.kind.to_string()).or_default() += 1;
            annotations.extend(component.annotations.iter().cloned());
            for field in component.fields.values() {
                annotations.extend(field.annotations.iter().cloned());
            }
            for method in component.methods.values() {
                annotations.extend(method.annotations.iter().cloned());
            }
        }

        AnnotationSummary {
            annotations: annotations.into_iter().collect(),
            kinds,
        }
    }

    pub fn node(&self, index: &str) -> Option<&'a FileNode> {
        tree::find(&self.store.tree, index)
    }

    pub fn parent(&self, index: &str) -> Option<&'a FileNode> {
        tree::parent_index(index).and_then(|p| self.node(p))
    }

    /// Files of one kind under the node at `index`
    pub fn files_of_kind(&self, index: &str, kind: FileKind) -> Vec<&'a FileNode> {
        self.node(index)
            .map(|n| tree::files_of_kind(n, kind))
            .unwrap_or_default()
    }

    /// Resolve `query` to one method key
    ///
    /// Stages: exact key, case-insensitive equality, case-insensitive
    /// substring. The first stage with any match decides.
    pub fn lookup_method(&self, query: &str) -> Result<&'a str, Vec<MethodSummary>> {
        if let Some(method) = self.store.method(query) {
            return Ok(method.key.as_str());
        }

        let lowered = query.to_lowercase();
        let mut keys: Vec<&'a String> = self.store.method_keys().collect();
        keys.sort();

        let stages: [&dyn Fn(&str) -> bool; 2] = [
            &|k: &str| k.to_lowercase() == lowered,
            &|k: &str| k.to_lowercase().contains(&lowered),
        ];

        for matches in stages {
            let hits: Vec<&'a String> = keys.iter().copied().filter(|k| matches(k.as_str())).collect();
            match hits.len() {
                0 => continue,
                1 => return Ok(hits[0].as_str()),
                _ => {
                    return Err(hits
                        .into_iter()
                        .filter_map(|k| self.summary(k))
                        .collect());
                }
            }
        }

        Err(Vec::new())
    }

    pub fn method_flow(&self, query: &str, options: FlowOptions) -> FlowLookup {
        let key = match self.lookup_method(query) {
            Ok(key) => key,
            Err(candidates) if candidates.is_empty() => return FlowLookup::NotFound,
            Err(candidates) => return FlowLookup::Ambiguous(candidates),
        };

        let (Some(component), Some(method)) = (self.store.method_owner(key), self.store.method(key)) else {
            return FlowLookup::NotFound;
        };

        let mut path = vec![key.to_string()];
        let callees = self.call_tree(key, options.callee_depth + 1, Direction::Callees, &mut path);
        let callers = self.call_tree(key, options.caller_depth + 1, Direction::Callers, &mut path);

        FlowLookup::Found(Box::new(MethodFlow {
            display_name: method.display_name(&component.name),
            key: method.key.clone(),
            component_name: component.name.clone(),
            component_fqn: component.fqn.clone(),
            component_kind: component.kind.to_string(),
            file_path: component.file_path.clone(),
            signature: method.signature.clone(),
            return_type: method.return_type.clone(),
            modifiers: method.modifiers.clone(),
            annotations: method.annotations.clone(),
            throws: method.throws.clone(),
            lines: method.lines,
            source: source_lines(component, method),
            callees,
            callers,
        }))
    }

    fn summary(&self, key: &str) -> Option<MethodSummary> {
        let component = self.store.method_owner(key)?;
        let method = self.store.method(key)?;
        Some(MethodSummary::new(component, method))
    }

    /// Tree of at most `levels` levels; revisits are checked against the current path only
    fn call_tree(&self, key: &str, levels: usize, direction: Direction, path: &mut Vec<String>) -> Vec<CallNode> {
        if levels == 0 {
            return Vec::new();
        }

        let next = match direction {
            Direction::Callees => self.store.graph.callees(key),
            Direction::Callers => self.store.graph.callers(key),
        };

        next.into_iter()
            .map(|child| {
                let display_name = self.display_name(child);
                if path.iter().any(|p| p == child) {
                    return CallNode {
                        key: child.to_string(),
                        display_name,
                        recursive: true,
                        children: Vec::new(),
                    };
                }
                path.push(child.to_string());
                let children = self.call_tree(child, levels - 1, direction, path);
                path.pop();
                CallNode {
                    key: child.to_string(),
                    display_name,
                    recursive: false,
                    children,
                }
            })
            .collect()
    }

    fn display_name(&self, key: &str) -> String {
        match (self.store.method_owner(key), self.store.method(key)) {
            (Some(component), Some(method)) => method.display_name(&component.name),
            _ => key.to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Direction {
    Callees,
    Callers,
}

/// Best-effort source snippet for a method
fn source_lines(component: &Component, method: &Method) -> Vec<String> {
    if !method.lines.is_known() {
        return Vec::new();
    }
    match read_source(&component.file_path) {
        Ok(text) => text
            .lines()
            .skip(method.lines.start - 1)
            .take(method.lines.end - method.lines.start + 1)
            .map(str::to_string)
            .collect(),
        Err(e) => {
            log::debug!("No source snippet for {}: {:#}", method.key, e);
            Vec::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indexer::{CacheMode, Indexer};
    use std::fs;
    use tempfile::TempDir;

    fn store(files: &[(&str, &str)]) -> (TempDir, ProjectStore) {
        let temp = TempDir::new().unwrap();
        for (rel, content) in files {
            let path = temp.path().join(rel);
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(path, content).unwrap();
        }
        let store = Indexer::new(temp.path()).analyze(CacheMode::Ignore, false).unwrap();
        (temp, store)
    }

    #[test]
    fn test_component_filters() {
        let (_temp, store) = store(&[
            ("a/UserController.java", "package a; @RestController public class UserController {}"),
            ("a/AdminController.java", "package a; @Controller public class AdminController {}"),
            ("a/UserService.java", "package a; @Service public class UserService {}"),
            ("a/Util.java", "package a; public class Util {}"),
        ]);
        let q = QueryEngine::new(&store);

        let controllers = q.components(&ComponentFilter { kind: Some("controller".into()), ..Default::default() });
        let fqns: Vec<_> = controllers.iter().map(|c| c.fqn.as_str()).collect();
        assert_eq!(fqns, vec!["a.AdminController", "a.UserController"]);

        let users = q.components(&ComponentFilter { name: Some("USER".into()), ..Default::default() });
        assert_eq!(users.len(), 2);

        let both = q.components(&ComponentFilter {
            kind: Some("service".into()),
            name: Some("user".into()),
            spring_only: false,
        });
        assert_eq!(both.len(), 1);

        assert_eq!(q.components(&ComponentFilter::default()).len(), 4);

        let spring = q.components(&ComponentFilter { spring_only: true, ..Default::default() });
        let fqns: Vec<_> = spring.iter().map(|c| c.fqn.as_str()).collect();
        assert_eq!(fqns, vec!["a.AdminController", "a.UserController", "a.UserService"]);
        let plain = q.components(&ComponentFilter {
            kind: Some("class".into()),
            spring_only: true,
            ..Default::default()
        });
        assert!(plain.is_empty());
    }

    #[test]
    fn test_method_lookup_stages() {
        let (_temp, store) = store(&[(
            "p/Repo.java",
            "package p; class Repo { void save(){} void saveAll(){} void load(int id){} }",
        )]);
        let q = QueryEngine::new(&store);

        assert_eq!(q.lookup_method("p.Repo.save()"), Ok("p.Repo.save()"));
        assert_eq!(q.lookup_method("P.REPO.LOAD(INT)"), Ok("p.Repo.load(int)"));
        assert_eq!(q.lookup_method("load"), Ok("p.Repo.load(int)"));

        let ambiguous = q.lookup_method("save").unwrap_err();
        let keys: Vec<_> = ambiguous.iter().map(|m| m.key.as_str()).collect();
        assert_eq!(keys, vec!["p.Repo.save()", "p.Repo.saveAll()"]);

        assert_eq!(q.lookup_method("nothing"), Err(Vec::new()));
        assert!(matches!(q.method_flow("nothing", FlowOptions::default()), FlowLookup::NotFound));
        assert!(matches!(q.method_flow("save", FlowOptions::default()), FlowLookup::Ambiguous(_)));
    }

    #[test]
    fn test_method_flow_trees() {
        let (_temp, store) = store(&[(
            "p/Chain.java",
            r#"package p;
public class Chain {
    @Deprecated
    public void a() {
        b();
    }
    void b() { c(); }
    void c() { d(); a(); }
    void d() { }
    void entry() { a(); }
}
"#,
        )]);
        let q = QueryEngine::new(&store);

        let FlowLookup::Found(flow) = q.method_flow("p.Chain.a()", FlowOptions::default()) else {
            panic!("expected a match");
        };

        assert_eq!(flow.display_name, "Chain.a()");
        assert_eq!(flow.component_kind, "Class");
        assert_eq!(flow.annotations, vec!["@Deprecated"]);
        assert_eq!(flow.lines, LineSpan { start: 4, end: 6, approximate: false });
        assert_eq!(flow.source, vec!["    public void a() {", "        b();", "    }"]);

        // a -> b -> c -> {a (recursive), d}
        assert_eq!(flow.callees.len(), 1);
        let b = &flow.callees[0];
        assert_eq!(b.key, "p.Chain.b()");
        let c = &b.children[0];
        assert_eq!(c.key, "p.Chain.c()");
        let c_children: Vec<_> = c.children.iter().map(|n| (n.key.as_str(), n.recursive)).collect();
        assert_eq!(c_children, vec![("p.Chain.a()", true), ("p.Chain.d()", false)]);
        assert!(c.children[1].children.is_empty());

        // callers plus their callers
        let callers: Vec<_> = flow.callers.iter().map(|n| n.key.as_str()).collect();
        assert_eq!(callers, vec!["p.Chain.c()", "p.Chain.entry()"]);
        let c_callers: Vec<_> = flow.callers[0].children.iter().map(|n| n.key.as_str()).collect();
        assert_eq!(c_callers, vec!["p.Chain.b()"]);
        assert!(flow.callers[0].children[0].children.is_empty());
        assert!(flow.callers[1].children.is_empty());
    }

    #[test]
    fn test_flow_depth_expands_beyond_direct_calls() {
        let (_temp, store) = store(&[(
            "p/C.java",
            "package p; class C { void top(){ mid(); } void mid(){ leaf(); } void leaf(){} void root(){ top(); } }",
        )]);
        let q = QueryEngine::new(&store);

        let FlowLookup::Found(flow) = q.method_flow("p.C.leaf()", FlowOptions::default()) else {
            panic!("expected a match");
        };
        let mid = &flow.callers[0];
        assert_eq!(mid.key, "p.C.mid()");
        let top: Vec<_> = mid.children.iter().map(|n| n.key.as_str()).collect();
        assert_eq!(top, vec!["p.C.top()"]);
        // caller depth 1 stops after the callers' callers
        assert!(mid.children[0].children.is_empty());

        let shallow = FlowOptions { callee_depth: 0, caller_depth: 0 };
        let FlowLookup::Found(flow) = q.method_flow("p.C.mid()", shallow) else {
            panic!("expected a match");
        };
        assert_eq!(flow.callers.len(), 1);
        assert!(flow.callers[0].children.is_empty());
        assert_eq!(flow.callees[0].key, "p.C.leaf()");
    }

    #[test]
    fn test_method_search_matches_names_only() {
        let (_temp, store) = store(&[
            ("p/UserService.java", "package p; class UserService { void save(){} void load(){} void findUser(String user){} }"),
            ("p/Audit.java", "package p; class Audit { void saveAll(){} void save(int n){} }"),
        ]);
        let q = QueryEngine::new(&store);

        let users: Vec<_> = q.search_methods("user").into_iter().map(|m| m.key).collect();
        assert_eq!(users, vec!["p.UserService.findUser(String)"]);

        let saves: Vec<_> = q.search_methods("SAVE").into_iter().map(|m| m.key).collect();
        assert_eq!(saves, vec!["p.Audit.save(int)", "p.Audit.saveAll()", "p.UserService.save()"]);
    }

    #[test]
    fn test_annotation_summary() {
        let (_temp, store) = store(&[(
            "p/Svc.java",
            "package p; @Service class Svc { @Autowired Repo repo; @Transactional void run(){} } interface Repo {}",
        )]);
        let summary = QueryEngine::new(&store).annotation_summary();

        assert_eq!(summary.annotations, vec!["@Autowired", "@Service", "@Transactional"]);
        assert_eq!(summary.kinds.get("Service"), Some(&1));
        assert_eq!(summary.kinds.get("Interface"), Some(&1));
    }

    #[test]
    fn test_search_and_tree_queries() {
        let (_temp, store) = store(&[
            ("src/p/Api.java", "package p; class Api { String route() { return \"/api/v1\"; } }"),
            ("src/application.yml", "server: {}"),
        ]);
        let q = QueryEngine::new(&store);

        assert_eq!(q.search_methods("ROUTE").len(), 1);
        assert!(q.search_methods("api").is_empty());
        assert_eq!(q.search_string("/api/v1").len(), 1);
        assert!(q.search_string("absent").is_empty());
        assert_eq!(q.package("p"), ["p.Api".to_string()]);

        let src = q.node("0.1").unwrap();
        assert_eq!(src.name, "src");
        assert_eq!(q.parent("0.1").unwrap().index, "0");
        assert!(q.parent("0").is_none());
        assert_eq!(q.files_of_kind("0", FileKind::Config).len(), 1);
        assert!(q.files_of_kind("0.9", FileKind::Config).is_empty());
    }
}

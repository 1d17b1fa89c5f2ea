//! Call graph construction
//!
//! Nodes are the complete method-key universe, fixed before any edge is
//! added. Each raw invocation is classified by its qualifier to find a
//! target component, then resolved by searching that component's
//! hierarchy for methods with a matching name and arity:
//!
//! - upward: breadth-first over resolved `extends` / `implements`
//! - downward: known subtypes of the target, transitively, so a call
//!   through an interface reaches its implementations
//!
//! Every match is accepted; without argument types there is no way to pick
//! a single overload. Constructor calls and `super.` calls only search
//! upward from their target.

use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::Direction;
use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};

use crate::models::{enclosing_fqn, Component, Field, Invocation, Method, CONSTRUCTOR_NAME};
use crate::resolver::{base_type, Resolver, ROOT_OBJECT};

/// Directed caller -> callee graph over method keys
#[derive(Debug, Default)]
pub struct CallGraph {
    graph: DiGraph<String, ()>,
    id_to_index: HashMap<String, NodeIndex>,
}

impl CallGraph {
    /// Create a graph whose node set is exactly `keys`
    pub fn with_nodes(keys: impl IntoIterator<Item = String>) -> Self {
        let mut graph = Self::default();
        for key in keys {
            if !graph.id_to_index.contains_key(&key) {
                let idx = graph.graph.add_node(key.clone());
                graph.id_to_index.insert(key, idx);
            }
        }
        graph
    }

    pub fn contains(&self, key: &str) -> bool {
        self.id_to_index.contains_key(key)
    }

    /// Add `from -> to`; returns false if either node is unknown or the edge exists
    pub fn add_edge(&mut self, from: &str, to: &str) -> bool {
        let (Some(&src), Some(&dst)) = (self.id_to_index.get(from), self.id_to_index.get(to)) else {
            log::trace!("Dropping edge with unknown endpoint: {} -> {}", from, to);
            return false;
        };
        if self.graph.find_edge(src, dst).is_some() {
            return false;
        }
        self.graph.add_edge(src, dst, ());
        true
    }

    /// Sorted keys called by `key`
    pub fn callees(&self, key: &str) -> Vec<&str> {
        self.neighbors(key, Direction::Outgoing)
    }

    /// Sorted keys calling `key`
    pub fn callers(&self, key: &str) -> Vec<&str> {
        self.neighbors(key, Direction::Incoming)
    }

    fn neighbors(&self, key: &str, direction: Direction) -> Vec<&str> {
        let Some(&idx) = self.id_to_index.get(key) else {
            return Vec::new();
        };
        let mut out: Vec<&str> = self
            .graph
            .neighbors_directed(idx, direction)
            .map(|n| self.graph[n].as_str())
            .collect();
        out.sort_unstable();
        out.dedup();
        out
    }

    /// All edges as `(caller, callee)`, sorted
    pub fn edges(&self) -> Vec<(String, String)> {
        let mut out: Vec<(String, String)> = self
            .graph
            .edge_indices()
            .filter_map(|e| self.graph.edge_endpoints(e))
            .map(|(a, b)| (self.graph[a].clone(), self.graph[b].clone()))
            .collect();
        out.sort();
        out
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }
}

/// Supertype and subtype lookups over the extracted components
pub struct Hierarchy<'a> {
    components: &'a BTreeMap<String, Component>,
    subtypes: HashMap<String, Vec<String>>,
}

impl<'a> Hierarchy<'a> {
    pub fn new(components: &'a BTreeMap<String, Component>) -> Self {
        let mut subtypes: HashMap<String, Vec<String>> = HashMap::new();
        for component in components.values() {
            for supertype in component.supertypes() {
                subtypes
                    .entry(base_type(supertype).to_string())
                    .or_default()
                    .push(component.fqn.clone());
            }
        }
        Self { components, subtypes }
    }

    /// Keys of methods named `member` with `arity` parameters (if known)
    /// reachable from `target`
    pub fn search(&self, target: &str, member: &str, arity: Option<usize>, dispatch: bool) -> Vec<String> {
        let mut found = Vec::new();

        let mut visited: HashSet<&str> = HashSet::new();
        let mut queue: VecDeque<&str> = VecDeque::from([target]);
        while let Some(fqn) = queue.pop_front() {
            if !visited.insert(fqn) {
                continue;
            }
            let Some(component) = self.components.get(fqn) else {
                continue;
            };
            collect_matches(component, member, arity, &mut found);
            // Constructors are not inherited
            if member == CONSTRUCTOR_NAME {
                break;
            }
            for supertype in component.supertypes() {
                queue.push_back(base_type(supertype));
            }
        }

        if dispatch && member != CONSTRUCTOR_NAME {
            let mut visited: HashSet<&str> = HashSet::from([target]);
            let mut queue: VecDeque<&str> = self.subtypes_of(target).collect();
            while let Some(fqn) = queue.pop_front() {
                if !visited.insert(fqn) {
                    continue;
                }
                if let Some(component) = self.components.get(fqn) {
                    collect_matches(component, member, arity, &mut found);
                }
                queue.extend(self.subtypes_of(fqn));
            }
        }

        let mut seen = HashSet::new();
        found.retain(|key| seen.insert(key.clone()));
        found
    }

    fn subtypes_of(&self, fqn: &str) -> impl Iterator<Item = &str> {
        self.subtypes
            .get(fqn)
            .into_iter()
            .flatten()
            .map(String::as_str)
    }
}

fn collect_matches(component: &Component, member: &str, arity: Option<usize>, found: &mut Vec<String>) {
    for method in component.methods.values() {
        if method.name == member && arity.is_none_or(|n| n == method.parameters.len()) {
            found.push(method.key.clone());
        }
    }
}

/// How an invocation's target component was determined
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    /// `this`, no qualifier, or a field/parameter/type reference
    Dispatch(String),
    /// `super.` calls and explicit constructor calls: upward only
    Static(String),
}

/// Classify an invocation's qualifier into a target component FQN
pub fn classify(
    components: &BTreeMap<String, Component>,
    resolver: &Resolver,
    component: &Component,
    method: &Method,
    invocation: &Invocation,
) -> Option<Target> {
    let qualifier = invocation.qualifier.as_deref().map(|q| q.strip_prefix("this.").unwrap_or(q));

    let qualifier = match qualifier {
        None | Some("this") => {
            return Some(if invocation.member == CONSTRUCTOR_NAME {
                Target::Static(component.fqn.clone())
            } else {
                Target::Dispatch(component.fqn.clone())
            });
        }
        Some("super") => {
            let parent = component
                .extends
                .first()
                .map(|s| base_type(s).to_string())
                .unwrap_or_else(|| ROOT_OBJECT.to_string());
            return Some(Target::Static(parent));
        }
        Some(q) => q,
    };

    if let Some((owner, field)) = find_field(components, component, qualifier) {
        let ty = resolver.resolve(owner, &field.type_name);
        return Some(Target::Dispatch(base_type(&ty).to_string()));
    }

    if let Some(param) = method.parameters.iter().find(|p| p.name == qualifier) {
        let ty = resolver.resolve(component, param.type_name.trim_end_matches("..."));
        return Some(Target::Dispatch(base_type(&ty).to_string()));
    }

    // Static-call heuristic: the qualifier names a type
    let resolved = resolver.resolve(component, qualifier);
    if resolved != qualifier || resolved.contains('.') {
        return Some(Target::Dispatch(base_type(&resolved).to_string()));
    }

    log::trace!(
        "Unresolved qualifier `{}` for {} in {}",
        qualifier,
        invocation.member,
        method.key
    );
    None
}

/// Field named `name` on `component` or any enclosing component
fn find_field<'c>(
    components: &'c BTreeMap<String, Component>,
    component: &'c Component,
    name: &str,
) -> Option<(&'c Component, &'c Field)> {
    if let Some(field) = component.fields.get(name) {
        return Some((component, field));
    }
    let mut scope = enclosing_fqn(&component.fqn);
    while let Some(fqn) = scope {
        if let Some(owner) = components.get(fqn) {
            if let Some(field) = owner.fields.get(name) {
                return Some((owner, field));
            }
        }
        scope = enclosing_fqn(fqn);
    }
    None
}

/// Build the call graph and fill every method's call lists
pub fn build(components: &mut BTreeMap<String, Component>, resolver: &Resolver) -> CallGraph {
    let mut graph = CallGraph::with_nodes(
        components
            .values()
            .flat_map(|c| c.methods.values().map(|m| m.key.clone())),
    );

    let mut unresolved = 0usize;
    {
        let hierarchy = Hierarchy::new(components);
        for component in components.values() {
            for method in component.methods.values() {
                for invocation in &method.invocations {
                    let targets = match classify(components, resolver, component, method, invocation) {
                        Some(Target::Dispatch(fqn)) => {
                            hierarchy.search(&fqn, &invocation.member, invocation.arg_count, true)
                        }
                        Some(Target::Static(fqn)) => {
                            hierarchy.search(&fqn, &invocation.member, invocation.arg_count, false)
                        }
                        None => Vec::new(),
                    };
                    if targets.is_empty() {
                        unresolved += 1;
                    }
                    for target in targets {
                        graph.add_edge(&method.key, &target);
                    }
                }
            }
        }
    }

    log::debug!(
        "Call graph: {} nodes, {} edges, {} unresolved invocations",
        graph.node_count(),
        graph.edge_count(),
        unresolved
    );

    apply_call_lists(components, &graph);
    graph
}

/// Overwrite every method's `calls` / `called_by` from the graph
///
/// Raw invocation captures are dropped here; they are only needed to build
/// edges.
pub fn apply_call_lists(components: &mut BTreeMap<String, Component>, graph: &CallGraph) {
    for component in components.values_mut() {
        for method in component.methods.values_mut() {
            method.calls = graph.callees(&method.key).into_iter().map(str::to_string).collect();
            method.called_by = graph.callers(&method.key).into_iter().map(str::to_string).collect();
            method.invocations.clear();
        }
    }
}

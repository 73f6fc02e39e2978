//! Dependency networks: observables, their analyses, and the DAG that says
//! which observables condition which.
//!
//! A [`NetworkDefinition`] is the declarative, serialisable input. It is
//! validated into a [`DependencyGraph`] (petgraph-backed) that the compiler
//! analyses. Validation rejects cycles, unknown references, and any input
//! vertex other than the designated root.

pub mod analysis;
pub mod horizon;
pub mod signature;

use std::borrow::Borrow;
use std::cmp::Reverse;
use std::collections::{BTreeSet, BinaryHeap, HashMap, HashSet};
use std::fmt;
use std::path::Path;
use std::sync::Arc;

use petgraph::Direction;
use petgraph::algo::toposort;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use serde::{Deserialize, Serialize};

use crate::error::{ConfigResult, NetworkError, NetworkResult};

pub use analysis::{Analysis, Value};
pub use horizon::{Horizon, HorizonAnalyzer};
pub use signature::Signature;

/// Identifier of an observable, e.g. `scientificName`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ObservableId(String);

impl ObservableId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ObservableId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ObservableId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for ObservableId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl Borrow<str> for ObservableId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

/// Declared value type of an observable.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueType {
    #[default]
    Text,
    Integer,
    Boolean,
}

/// How stored and queried values are compared.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Style {
    /// Exact identity (identifiers, codes).
    Identifier,
    /// Case-, diacritic- and whitespace-insensitive.
    #[default]
    Normalized,
}

/// Serialisable observable declaration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObservableDef {
    pub id: ObservableId,
    #[serde(default, rename = "type")]
    pub value_type: ValueType,
    #[serde(default)]
    pub style: Style,
    #[serde(default)]
    pub description: String,
}

impl ObservableDef {
    pub fn new(id: impl Into<ObservableId>, style: Style) -> Self {
        Self {
            id: id.into(),
            value_type: ValueType::Text,
            style,
            description: String::new(),
        }
    }
}

/// A named variable of the network. Immutable and shared by `Arc`.
#[derive(Debug, Clone)]
pub struct Observable {
    pub id: ObservableId,
    pub value_type: ValueType,
    pub style: Style,
    analysis: Arc<dyn Analysis>,
}

impl Observable {
    pub fn new(def: &ObservableDef) -> Self {
        Self {
            id: def.id.clone(),
            value_type: def.value_type,
            style: def.style,
            analysis: analysis::analysis_for(def.value_type, def.style),
        }
    }

    pub fn analysis(&self) -> &dyn Analysis {
        self.analysis.as_ref()
    }
}

impl PartialEq for Observable {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Observable {}

/// A dependency edge: `target` is conditioned on `source`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EdgeDef {
    pub source: ObservableId,
    pub target: ObservableId,
}

/// A named set of optional observables that records may lack as a whole.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErasureGroup {
    pub name: String,
    pub observables: Vec<ObservableId>,
}

/// Serialisable network description, read once at startup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkDefinition {
    pub name: String,
    /// The identifying variable whose posterior is computed.
    pub root: ObservableId,
    pub observables: Vec<ObservableDef>,
    #[serde(default)]
    pub edges: Vec<EdgeDef>,
    #[serde(default)]
    pub erasures: Vec<ErasureGroup>,
}

impl NetworkDefinition {
    /// Load from a TOML or JSON file (chosen by extension).
    pub fn load(path: &Path) -> ConfigResult<Self> {
        crate::config::read_structured(path)
    }

    pub fn observable(&self, id: &str) -> Option<&ObservableDef> {
        self.observables.iter().find(|o| o.id.as_str() == id)
    }

    /// Validate into the full (nothing erased) dependency graph.
    pub fn graph(&self) -> NetworkResult<DependencyGraph> {
        for group in &self.erasures {
            for id in &group.observables {
                if self.observable(id.as_str()).is_none() {
                    return Err(NetworkError::UnknownObservable { id: id.to_string() });
                }
                if *id == self.root {
                    return Err(NetworkError::RootErased { id: id.to_string() });
                }
            }
        }
        let observables = self
            .observables
            .iter()
            .map(|def| Arc::new(Observable::new(def)))
            .collect();
        let edges: Vec<(ObservableId, ObservableId)> = self
            .edges
            .iter()
            .map(|e| (e.source.clone(), e.target.clone()))
            .collect();
        DependencyGraph::build(&self.name, observables, &edges, &self.root)
    }
}

/// Validated dependency DAG. Edges run from conditioning to conditioned
/// observable.
#[derive(Debug, Clone)]
pub struct DependencyGraph {
    name: String,
    graph: DiGraph<Arc<Observable>, ()>,
    index: HashMap<ObservableId, NodeIndex>,
    root: NodeIndex,
    order: Vec<NodeIndex>,
}

impl DependencyGraph {
    /// Validate observables and edges into a graph rooted at `root`.
    ///
    /// Vertex indices follow the declaration order of `observables`.
    pub fn build(
        name: &str,
        observables: Vec<Arc<Observable>>,
        edges: &[(ObservableId, ObservableId)],
        root: &ObservableId,
    ) -> NetworkResult<Self> {
        let mut graph = DiGraph::with_capacity(observables.len(), edges.len());
        let mut index = HashMap::with_capacity(observables.len());
        for observable in observables {
            let id = observable.id.clone();
            if index.contains_key(&id) {
                return Err(NetworkError::DuplicateObservable { id: id.to_string() });
            }
            index.insert(id, graph.add_node(observable));
        }

        let lookup = |id: &ObservableId| {
            index
                .get(id)
                .copied()
                .ok_or_else(|| NetworkError::UnknownObservable { id: id.to_string() })
        };

        let mut seen = HashSet::new();
        for (source, target) in edges {
            let (s, t) = (lookup(source)?, lookup(target)?);
            if s == t {
                return Err(NetworkError::Cycle { id: source.to_string() });
            }
            if !seen.insert((s, t)) {
                return Err(NetworkError::DuplicateEdge {
                    source_id: source.to_string(),
                    target: target.to_string(),
                });
            }
            graph.add_edge(s, t, ());
        }

        if let Err(cycle) = toposort(&graph, None) {
            return Err(NetworkError::Cycle {
                id: graph[cycle.node_id()].id.to_string(),
            });
        }

        let root = lookup(root)?;
        for v in graph.node_indices() {
            let has_parents = graph
                .neighbors_directed(v, Direction::Incoming)
                .next()
                .is_some();
            if v == root && has_parents {
                return Err(NetworkError::RootNotInput {
                    id: graph[v].id.to_string(),
                });
            }
            if v != root && !has_parents {
                return Err(NetworkError::ExtraInput {
                    id: graph[v].id.to_string(),
                });
            }
        }

        let order = stable_order(&graph);
        Ok(Self {
            name: name.to_string(),
            graph,
            index,
            root,
            order,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn root(&self) -> NodeIndex {
        self.root
    }

    pub fn len(&self) -> usize {
        self.graph.node_count()
    }

    pub fn is_empty(&self) -> bool {
        self.graph.node_count() == 0
    }

    pub fn graph(&self) -> &DiGraph<Arc<Observable>, ()> {
        &self.graph
    }

    pub fn observable(&self, vertex: NodeIndex) -> &Arc<Observable> {
        &self.graph[vertex]
    }

    pub fn vertex(&self, id: &str) -> Option<NodeIndex> {
        self.index.get(id).copied()
    }

    /// Topological order, ties broken by declaration order.
    pub fn order(&self) -> &[NodeIndex] {
        &self.order
    }

    /// Conditioning observables of `vertex`, in declaration order.
    pub fn parents(&self, vertex: NodeIndex) -> Vec<NodeIndex> {
        self.sorted_neighbors(vertex, Direction::Incoming)
    }

    /// Observables conditioned on `vertex`, in declaration order.
    pub fn children(&self, vertex: NodeIndex) -> Vec<NodeIndex> {
        self.sorted_neighbors(vertex, Direction::Outgoing)
    }

    fn sorted_neighbors(&self, vertex: NodeIndex, dir: Direction) -> Vec<NodeIndex> {
        let mut out: Vec<NodeIndex> = self.graph.neighbors_directed(vertex, dir).collect();
        out.sort();
        out
    }

    /// The same graph with every edge pointing from a vertex to the
    /// observables it is conditioned on.
    pub fn reversed(&self) -> DiGraph<NodeIndex, ()> {
        let mut rev = self.graph.map(|v, _| v, |_, _| ());
        rev.reverse();
        rev
    }

    /// Edges as `(source, target)` observable id pairs.
    pub fn edges(&self) -> Vec<(ObservableId, ObservableId)> {
        self.graph
            .edge_references()
            .map(|e| {
                (
                    self.graph[e.source()].id.clone(),
                    self.graph[e.target()].id.clone(),
                )
            })
            .collect()
    }

    /// A sub-network without the `erased` observables. Each erased vertex is
    /// bypassed: its parents become parents of each of its children.
    pub fn erase(&self, erased: &BTreeSet<ObservableId>) -> NetworkResult<Self> {
        if erased.contains(&self.graph[self.root].id) {
            return Err(NetworkError::RootErased {
                id: self.graph[self.root].id.to_string(),
            });
        }
        let mut edges: Vec<(ObservableId, ObservableId)> = self.edges();
        for &v in &self.order {
            let id = &self.graph[v].id;
            if !erased.contains(id) {
                continue;
            }
            let parents: Vec<ObservableId> = edges
                .iter()
                .filter(|(_, t)| t == id)
                .map(|(s, _)| s.clone())
                .collect();
            let children: Vec<ObservableId> = edges
                .iter()
                .filter(|(s, _)| s == id)
                .map(|(_, t)| t.clone())
                .collect();
            edges.retain(|(s, t)| s != id && t != id);
            for p in &parents {
                for c in &children {
                    if !edges.iter().any(|(s, t)| s == p && t == c) {
                        edges.push((p.clone(), c.clone()));
                    }
                }
            }
        }

        let observables = self
            .graph
            .node_indices()
            .map(|v| self.graph[v].clone())
            .filter(|o| !erased.contains(&o.id))
            .collect();
        Self::build(&self.name, observables, &edges, &self.graph[self.root].id)
    }
}

/// Kahn's algorithm with a min-heap so the order is independent of petgraph's
/// adjacency list layout.
fn stable_order<N, E>(graph: &DiGraph<N, E>) -> Vec<NodeIndex> {
    let mut indegree: Vec<usize> = graph
        .node_indices()
        .map(|v| graph.neighbors_directed(v, Direction::Incoming).count())
        .collect();
    let mut ready: BinaryHeap<Reverse<NodeIndex>> = graph
        .node_indices()
        .filter(|v| indegree[v.index()] == 0)
        .map(Reverse)
        .collect();
    let mut order = Vec::with_capacity(graph.node_count());
    while let Some(Reverse(v)) = ready.pop() {
        order.push(v);
        for c in graph.neighbors(v) {
            indegree[c.index()] -= 1;
            if indegree[c.index()] == 0 {
                ready.push(Reverse(c));
            }
        }
    }
    order
}

#[cfg(test)]
mod tests {
    use super::*;

    fn def(edges: &[(&str, &str)]) -> NetworkDefinition {
        let mut ids: Vec<&str> = Vec::new();
        for (s, t) in edges {
            for id in [s, t] {
                if !ids.contains(id) {
                    ids.push(id);
                }
            }
        }
        NetworkDefinition {
            name: "test".into(),
            root: ObservableId::new(ids[0]),
            observables: ids
                .iter()
                .map(|id| ObservableDef::new(*id, Style::Normalized))
                .collect(),
            edges: edges
                .iter()
                .map(|(s, t)| EdgeDef {
                    source: (*s).into(),
                    target: (*t).into(),
                })
                .collect(),
            erasures: Vec::new(),
        }
    }

    #[test]
    fn builds_sprinkler_network() {
        let g = def(&[("rain", "sprinkler"), ("rain", "wet"), ("sprinkler", "wet")])
            .graph()
            .unwrap();
        let wet = g.vertex("wet").unwrap();
        assert_eq!(g.root(), g.vertex("rain").unwrap());
        assert_eq!(g.parents(wet).len(), 2);
        let names: Vec<&str> = g
            .order()
            .iter()
            .map(|v| g.observable(*v).id.as_str())
            .collect();
        assert_eq!(names, vec!["rain", "sprinkler", "wet"]);
    }

    #[test]
    fn rejects_cycles() {
        let err = def(&[("a", "b"), ("b", "c"), ("c", "b")]).graph().unwrap_err();
        assert!(matches!(err, NetworkError::Cycle { .. } | NetworkError::ExtraInput { .. }));

        let err = def(&[("a", "b"), ("b", "b")]).graph().unwrap_err();
        assert!(matches!(err, NetworkError::Cycle { .. }));
    }

    #[test]
    fn rejects_second_input() {
        let mut d = def(&[("a", "b")]);
        d.observables.push(ObservableDef::new("orphan", Style::Identifier));
        assert!(matches!(
            d.graph().unwrap_err(),
            NetworkError::ExtraInput { id } if id == "orphan"
        ));
    }

    #[test]
    fn rejects_unknown_and_duplicate_edges() {
        let mut d = def(&[("a", "b")]);
        d.edges.push(EdgeDef {
            source: "a".into(),
            target: "missing".into(),
        });
        assert!(matches!(
            d.graph().unwrap_err(),
            NetworkError::UnknownObservable { .. }
        ));

        let d = def(&[("a", "b"), ("a", "b")]);
        assert!(matches!(
            d.graph().unwrap_err(),
            NetworkError::DuplicateEdge { .. }
        ));
    }

    #[test]
    fn erase_bypasses_removed_vertex() {
        let g = def(&[("root", "mid"), ("mid", "leaf"), ("root", "other")])
            .graph()
            .unwrap();
        let erased: BTreeSet<ObservableId> = [ObservableId::new("mid")].into();
        let sub = g.erase(&erased).unwrap();
        assert_eq!(sub.len(), 3);
        assert!(sub.vertex("mid").is_none());
        let leaf = sub.vertex("leaf").unwrap();
        assert_eq!(sub.parents(leaf), vec![sub.root()]);
    }

    #[test]
    fn root_cannot_be_erased() {
        let g = def(&[("root", "leaf")]).graph().unwrap();
        let erased: BTreeSet<ObservableId> = [ObservableId::new("root")].into();
        assert!(matches!(
            g.erase(&erased).unwrap_err(),
            NetworkError::RootErased { .. }
        ));
    }

    #[test]
    fn definition_from_toml() {
        let text = r#"
            name = "taxon"
            root = "taxonId"

            [[observables]]
            id = "taxonId"
            style = "identifier"

            [[observables]]
            id = "scientificName"

            [[edges]]
            source = "taxonId"
            target = "scientificName"
        "#;
        let d: NetworkDefinition = toml::from_str(text).unwrap();
        assert_eq!(d.observables[1].style, Style::Normalized);
        let g = d.graph().unwrap();
        assert_eq!(g.len(), 2);
    }
}

//! Horizon analysis: the minimal boundary of reconverging ancestors.
//!
//! Starting from the direct successors of a vertex, a level-ordered frontier is
//! expanded for as long as the branches being explored share descendants.
//! Vertices whose descendant sets reconverge with another branch of the
//! expansion are *interior* and must be summed over jointly; the frontier
//! vertices that end the expansion form the *horizon*, whose contributions can
//! be multiplied independently.
//!
//! The analyzer follows outgoing edges of whatever graph it is given. The
//! compiler hands it the reverse dependency graph, so there the "successors"
//! of a vertex are the observables it is conditioned on.

use std::collections::{BTreeSet, HashSet};

use petgraph::Direction;
use petgraph::algo::toposort;
use petgraph::graph::{DiGraph, NodeIndex};

use crate::error::{NetworkError, NetworkResult};

/// Interior and horizon vertices of one analysis, in discovery order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Horizon {
    vertices: Vec<NodeIndex>,
    split: usize,
}

impl Horizon {
    pub fn new(interior: Vec<NodeIndex>, horizon: Vec<NodeIndex>) -> Self {
        let split = interior.len();
        let mut vertices = interior;
        vertices.extend(horizon);
        Self { vertices, split }
    }

    /// Convenience for one-off analyses. Prefer [`HorizonAnalyzer`] when
    /// analysing several vertices of the same graph.
    pub fn compute<N, E>(graph: &DiGraph<N, E>, vertex: NodeIndex) -> NetworkResult<Self> {
        Ok(HorizonAnalyzer::new(graph)?.horizon(vertex))
    }

    pub fn interior(&self) -> &[NodeIndex] {
        &self.vertices[..self.split]
    }

    pub fn horizon(&self) -> &[NodeIndex] {
        &self.vertices[self.split..]
    }

    /// Interior followed by horizon. This is the signature bit order used for
    /// derived factors.
    pub fn vertices(&self) -> &[NodeIndex] {
        &self.vertices
    }

    /// Index in [`Horizon::vertices`] where the horizon part starts.
    pub fn split(&self) -> usize {
        self.split
    }

    pub fn position(&self, vertex: NodeIndex) -> Option<usize> {
        self.vertices.iter().position(|v| *v == vertex)
    }

    pub fn is_interior(&self, vertex: NodeIndex) -> bool {
        self.interior().contains(&vertex)
    }

    pub fn has_interior(&self) -> bool {
        self.split > 0
    }

    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty()
    }
}

/// Horizon analysis over one graph, with levels and descendant sets memoised.
pub struct HorizonAnalyzer<'g, N, E> {
    graph: &'g DiGraph<N, E>,
    levels: Vec<usize>,
    descendants: Vec<HashSet<NodeIndex>>,
}

impl<'g, N, E> HorizonAnalyzer<'g, N, E> {
    /// Compute levels and strict descendant sets. Fails on cyclic input.
    pub fn new(graph: &'g DiGraph<N, E>) -> NetworkResult<Self> {
        let order = toposort(graph, None).map_err(|cycle| NetworkError::Cycle {
            id: format!("vertex #{}", cycle.node_id().index()),
        })?;

        let n = graph.node_count();
        let mut levels = vec![0usize; n];
        for &v in &order {
            for p in graph.neighbors_directed(v, Direction::Incoming) {
                levels[v.index()] = levels[v.index()].max(levels[p.index()] + 1);
            }
        }

        let mut descendants: Vec<HashSet<NodeIndex>> = vec![HashSet::new(); n];
        for &v in order.iter().rev() {
            let mut reach = HashSet::new();
            for s in graph.neighbors(v) {
                reach.insert(s);
                reach.extend(descendants[s.index()].iter().copied());
            }
            descendants[v.index()] = reach;
        }

        Ok(Self {
            graph,
            levels,
            descendants,
        })
    }

    /// `1 + max(level of predecessors)`, 0 for sources.
    pub fn level(&self, vertex: NodeIndex) -> usize {
        self.levels[vertex.index()]
    }

    /// Strict descendants of `vertex` (not including itself).
    pub fn descendants(&self, vertex: NodeIndex) -> &HashSet<NodeIndex> {
        &self.descendants[vertex.index()]
    }

    /// Horizon of `vertex`, seeded with its direct successors.
    pub fn horizon(&self, vertex: NodeIndex) -> Horizon {
        self.from_seeds(self.graph.neighbors(vertex))
    }

    /// Horizon of an explicit seed set.
    pub fn from_seeds(&self, seeds: impl IntoIterator<Item = NodeIndex>) -> Horizon {
        let mut queue: BTreeSet<(usize, NodeIndex)> = BTreeSet::new();
        let mut seen: HashSet<NodeIndex> = HashSet::new();
        for seed in seeds {
            if seen.insert(seed) {
                queue.insert((self.level(seed), seed));
            }
        }

        let mut interior = Vec::new();
        let mut horizon = Vec::new();
        while let Some((_, v)) = queue.pop_first() {
            if self.is_interior(v, &queue, &interior) {
                interior.push(v);
                for s in self.graph.neighbors(v) {
                    if seen.insert(s) {
                        queue.insert((self.level(s), s));
                    }
                }
            } else {
                horizon.push(v);
            }
        }
        Horizon::new(interior, horizon)
    }

    /// `v` is interior when its descendants reconverge with those of another
    /// pending branch or of a branch already expanded as interior.
    fn is_interior(
        &self,
        v: NodeIndex,
        queue: &BTreeSet<(usize, NodeIndex)>,
        interior: &[NodeIndex],
    ) -> bool {
        let reach = self.descendants(v);
        if reach.is_empty() {
            return false;
        }
        queue
            .iter()
            .map(|(_, w)| *w)
            .chain(interior.iter().copied())
            .any(|w| !reach.is_disjoint(self.descendants(w)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn graph(n: usize, edges: &[(usize, usize)]) -> (DiGraph<(), ()>, Vec<NodeIndex>) {
        let mut g = DiGraph::new();
        let nodes: Vec<NodeIndex> = (0..n).map(|_| g.add_node(())).collect();
        for &(a, b) in edges {
            g.add_edge(nodes[a], nodes[b], ());
        }
        (g, nodes)
    }

    #[test]
    fn diamond_reconverges() {
        // A→B, A→C, B→D, C→D
        let (g, n) = graph(4, &[(0, 1), (0, 2), (1, 3), (2, 3)]);
        let h = Horizon::compute(&g, n[0]).unwrap();
        assert_eq!(h.interior(), &[n[1], n[2]]);
        assert_eq!(h.horizon(), &[n[3]]);
        assert_eq!(h.vertices(), &[n[1], n[2], n[3]]);
        assert_eq!(h.split(), 2);
    }

    #[test]
    fn chain_with_branch() {
        // A→B, B→C, B→D, C→D
        let (g, n) = graph(4, &[(0, 1), (1, 2), (1, 3), (2, 3)]);
        let analyzer = HorizonAnalyzer::new(&g).unwrap();

        let a = analyzer.horizon(n[0]);
        assert!(a.interior().is_empty());
        assert_eq!(a.horizon(), &[n[1]]);

        let b = analyzer.horizon(n[1]);
        assert!(!b.has_interior());
        assert_eq!(b.horizon(), &[n[2], n[3]]);
    }

    #[test]
    fn levels_follow_longest_path() {
        let (g, n) = graph(4, &[(0, 1), (1, 2), (1, 3), (2, 3)]);
        let analyzer = HorizonAnalyzer::new(&g).unwrap();
        assert_eq!(analyzer.level(n[0]), 0);
        assert_eq!(analyzer.level(n[1]), 1);
        assert_eq!(analyzer.level(n[2]), 2);
        assert_eq!(analyzer.level(n[3]), 3);
        assert_eq!(analyzer.descendants(n[1]).len(), 2);
    }

    #[test]
    fn sink_vertex_has_empty_horizon() {
        let (g, n) = graph(2, &[(0, 1)]);
        let h = Horizon::compute(&g, n[1]).unwrap();
        assert!(h.is_empty());
    }

    #[test]
    fn independent_branches_stay_on_horizon() {
        // A→B, A→C with no reconvergence.
        let (g, n) = graph(3, &[(0, 1), (0, 2)]);
        let h = Horizon::compute(&g, n[0]).unwrap();
        assert!(!h.has_interior());
        assert_eq!(h.horizon(), &[n[1], n[2]]);
    }

    #[test]
    fn cycle_is_rejected() {
        let (g, _) = graph(3, &[(0, 1), (1, 2), (2, 0)]);
        assert!(matches!(
            HorizonAnalyzer::new(&g),
            Err(NetworkError::Cycle { .. })
        ));
    }

    #[test]
    fn explicit_seeds() {
        // Two leaves sharing a parent: both interior, parent on the horizon.
        let (g, n) = graph(3, &[(1, 0), (2, 0)]);
        let analyzer = HorizonAnalyzer::new(&g).unwrap();
        let h = analyzer.from_seeds([n[1], n[2]]);
        assert_eq!(h.interior(), &[n[1], n[2]]);
        assert_eq!(h.horizon(), &[n[0]]);
    }
}

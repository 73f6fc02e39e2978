//! Network compiler: turns a validated [`DependencyGraph`] into the parameter
//! table and factor lists the inference evaluator runs over.
//!
//! Compilation happens once per network variant and produces an immutable
//! [`CompiledNetwork`]. Steps, each depending on the previous:
//!
//! 1. Horizon analysis of every vertex over the reverse dependency graph.
//! 2. Prior and complement for the input vertex.
//! 3. Positive and complementary negative parameters for every signature over
//!    each vertex's direct parents.
//! 4. Derived factors over `interior ++ horizon` for vertices whose horizon has
//!    an interior.
//! 5. Evidence sinks, one per independent component of the network once the
//!    root is removed.

pub mod parameter;

use std::collections::HashMap;
use std::sync::Arc;

use petgraph::graph::NodeIndex;
use petgraph::unionfind::UnionFind;

use crate::error::{CompileError, CompileResult, NetworkError};
use crate::network::{DependencyGraph, Horizon, HorizonAnalyzer, Observable, Signature};

pub use parameter::{
    Contributor, InferenceParameter, ParameterId, ParameterKind, ParameterSchema,
};

/// Maximum in-degree; direct tables hold `2^n` rows.
pub const MAX_PARENTS: usize = 16;

/// Maximum `interior ++ horizon` width; derived tables hold `2^n` rows.
pub const MAX_HORIZON: usize = 20;

/// A multiplicand of a factor term.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operand {
    /// The accumulated mass of a horizon vertex for the given value.
    Mass { vertex: NodeIndex, value: bool },
    /// 1 when the evidence on an interior vertex admits the value, else 0.
    Evidence { vertex: NodeIndex, value: bool },
}

/// One term of a vertex's accumulator: `value(parameter) * Π operands`.
#[derive(Debug, Clone, PartialEq)]
pub struct Factor {
    pub parameter: ParameterId,
    pub outcome: bool,
    pub operands: Vec<Operand>,
}

/// Compiled record for one observable.
#[derive(Debug, Clone)]
pub struct Node {
    pub observable: Arc<Observable>,
    pub vertex: NodeIndex,
    /// No incoming edges: carries a prior.
    pub input: bool,
    /// Output, or on some other vertex's horizon list.
    pub source: bool,
    /// No outgoing edges.
    pub output: bool,
    /// Prior and its complement (inputs only).
    pub prior: Option<(ParameterId, ParameterId)>,
    pub parents: Vec<NodeIndex>,
    /// Positive and negative parameter per parent signature.
    pub direct: Vec<Factor>,
    pub horizon: Horizon,
    /// Positive and negative derived factor per horizon signature.
    pub derived: Vec<Factor>,
}

impl Node {
    /// The terms the evaluator sums for this vertex.
    pub fn factors(&self) -> &[Factor] {
        if self.derived.is_empty() {
            &self.direct
        } else {
            &self.derived
        }
    }
}

/// One row of an evidence sink: `product(derivation) * Π operands`.
#[derive(Debug, Clone, PartialEq)]
pub struct SinkTerm {
    pub derivation: Vec<ParameterId>,
    pub operands: Vec<Operand>,
}

/// Likelihood of the evidence on one component of the network given the root.
#[derive(Debug, Clone)]
pub struct EvidenceSink {
    pub members: Vec<NodeIndex>,
    pub horizon: Horizon,
    pub terms: Vec<SinkTerm>,
}

/// Immutable output of [`NetworkCompiler::analyse`].
#[derive(Debug, Clone)]
pub struct CompiledNetwork {
    graph: DependencyGraph,
    nodes: Vec<Node>,
    parameters: Vec<InferenceParameter>,
    lookup: HashMap<(Contributor, Vec<Contributor>), ParameterId>,
    sinks: Vec<EvidenceSink>,
    schema: ParameterSchema,
    prior: (ParameterId, ParameterId),
}

impl CompiledNetwork {
    pub fn graph(&self) -> &DependencyGraph {
        &self.graph
    }

    pub fn name(&self) -> &str {
        self.graph.name()
    }

    pub fn root(&self) -> NodeIndex {
        self.graph.root()
    }

    /// Erasure variant signature this network was compiled for.
    pub fn signature(&self) -> &str {
        &self.schema.signature
    }

    /// Prior of the root and its complement.
    pub fn prior(&self) -> (ParameterId, ParameterId) {
        self.prior
    }

    pub fn node(&self, vertex: NodeIndex) -> &Node {
        &self.nodes[vertex.index()]
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn order(&self) -> &[NodeIndex] {
        self.graph.order()
    }

    pub fn horizon(&self, vertex: NodeIndex) -> &Horizon {
        &self.nodes[vertex.index()].horizon
    }

    /// Derived factors if the vertex has any, else its direct parameters.
    pub fn factors(&self, vertex: NodeIndex) -> &[Factor] {
        self.nodes[vertex.index()].factors()
    }

    pub fn parameters(&self) -> &[InferenceParameter] {
        &self.parameters
    }

    pub fn parameter(&self, id: ParameterId) -> &InferenceParameter {
        &self.parameters[id.index()]
    }

    pub fn formula(&self, id: ParameterId) -> String {
        self.parameters[id.index()].formula()
    }

    pub fn schema(&self) -> &ParameterSchema {
        &self.schema
    }

    pub fn sinks(&self) -> &[EvidenceSink] {
        &self.sinks
    }

    /// Vertex of an observable in this variant.
    pub fn observable(&self, id: &str) -> Option<NodeIndex> {
        self.graph.vertex(id)
    }

    /// Prior or conditional parameter with exactly this outcome and
    /// contributor set.
    pub fn find_parameter(
        &self,
        outcome: &Contributor,
        contributors: &[Contributor],
    ) -> Option<ParameterId> {
        self.lookup
            .get(&parameter::lookup_key(outcome, contributors))
            .copied()
    }
}

/// Builds a [`CompiledNetwork`] from a dependency graph.
pub struct NetworkCompiler<'g> {
    graph: &'g DependencyGraph,
    parameters: Vec<InferenceParameter>,
    lookup: HashMap<(Contributor, Vec<Contributor>), ParameterId>,
}

impl<'g> NetworkCompiler<'g> {
    /// Compile the full network (no erasure groups).
    pub fn analyse(graph: &'g DependencyGraph) -> CompileResult<CompiledNetwork> {
        Self::analyse_variant(graph, "")
    }

    /// Compile one erasure variant, recording its signature in the schema.
    pub fn analyse_variant(
        graph: &'g DependencyGraph,
        signature: &str,
    ) -> CompileResult<CompiledNetwork> {
        let mut compiler = Self {
            graph,
            parameters: Vec::new(),
            lookup: HashMap::new(),
        };
        compiler.run(signature)
    }

    fn run(&mut self, signature: &str) -> CompileResult<CompiledNetwork> {
        let graph = self.graph;
        let reversed = graph.reversed();
        let analyzer = HorizonAnalyzer::new(&reversed)?;

        let mut horizons = Vec::with_capacity(graph.len());
        for v in graph.graph().node_indices() {
            let horizon = analyzer.horizon(v);
            if horizon.vertices().len() > MAX_HORIZON {
                return Err(CompileError::HorizonTooWide {
                    id: self.id(v),
                    count: horizon.vertices().len(),
                    max: MAX_HORIZON,
                });
            }
            tracing::debug!(
                observable = %self.id(v),
                interior = horizon.interior().len(),
                horizon = horizon.horizon().len(),
                "horizon computed"
            );
            horizons.push(horizon);
        }

        let mut priors: Vec<Option<(ParameterId, ParameterId)>> = vec![None; graph.len()];
        let mut direct: Vec<Vec<Factor>> = vec![Vec::new(); graph.len()];
        for &v in graph.order() {
            let parents = graph.parents(v);
            if parents.len() > MAX_PARENTS {
                return Err(CompileError::TooManyParents {
                    id: self.id(v),
                    count: parents.len(),
                    max: MAX_PARENTS,
                });
            }
            if parents.is_empty() {
                priors[v.index()] = Some(self.prior(v));
            } else {
                direct[v.index()] = self.conditionals(v, &parents);
            }
        }

        let mut derived: Vec<Vec<Factor>> = vec![Vec::new(); graph.len()];
        for &v in graph.order() {
            let horizon = &horizons[v.index()];
            if horizon.has_interior() {
                derived[v.index()] = self.derive(v, horizon)?;
            }
        }

        let sinks = self.sinks(&analyzer)?;
        let prior = priors[graph.root().index()].ok_or_else(|| NetworkError::RootNotInput {
            id: self.id(graph.root()),
        })?;

        let mut on_horizon = vec![false; graph.len()];
        for h in &horizons {
            for w in h.horizon() {
                on_horizon[w.index()] = true;
            }
        }

        let nodes: Vec<Node> = graph
            .graph()
            .node_indices()
            .zip(horizons)
            .zip(priors.into_iter().zip(direct.into_iter().zip(derived)))
            .map(|((v, horizon), (prior, (direct, derived)))| {
                let parents = graph.parents(v);
                let output = graph.children(v).is_empty();
                Node {
                    observable: graph.observable(v).clone(),
                    vertex: v,
                    input: parents.is_empty(),
                    source: output || on_horizon[v.index()],
                    output,
                    prior,
                    parents,
                    direct,
                    horizon,
                    derived,
                }
            })
            .collect();

        let schema = ParameterSchema {
            tag: parameter::schema_tag(&self.parameters),
            signature: signature.to_string(),
            base: self
                .parameters
                .iter()
                .filter(|p| p.is_base())
                .map(|p| p.id)
                .collect(),
        };

        tracing::info!(
            network = graph.name(),
            variant = signature,
            vertices = graph.len(),
            parameters = self.parameters.len(),
            base = schema.base.len(),
            sinks = sinks.len(),
            tag = %schema.tag,
            "network compiled"
        );

        Ok(CompiledNetwork {
            graph: graph.clone(),
            nodes,
            parameters: std::mem::take(&mut self.parameters),
            lookup: std::mem::take(&mut self.lookup),
            sinks,
            schema,
            prior,
        })
    }

    fn id(&self, v: NodeIndex) -> String {
        self.graph.observable(v).id.to_string()
    }

    fn contributor(&self, v: NodeIndex, value: bool) -> Contributor {
        Contributor::new(self.graph.observable(v).id.clone(), value)
    }

    fn push(
        &mut self,
        kind: ParameterKind,
        outcome: Contributor,
        contributors: Vec<Contributor>,
        derived_from: Vec<ParameterId>,
        inverted: bool,
    ) -> ParameterId {
        let id = ParameterId::new(self.parameters.len());
        let param = InferenceParameter {
            id,
            kind,
            outcome,
            contributors,
            derived_from,
            inverted,
        };
        if kind != ParameterKind::Derived {
            self.lookup.insert(param.lookup_key(), id);
        }
        self.parameters.push(param);
        id
    }

    fn prior(&mut self, v: NodeIndex) -> (ParameterId, ParameterId) {
        let positive = self.push(
            ParameterKind::Prior,
            self.contributor(v, true),
            Vec::new(),
            Vec::new(),
            false,
        );
        let negative = self.push(
            ParameterKind::Prior,
            self.contributor(v, false),
            Vec::new(),
            vec![positive],
            true,
        );
        (positive, negative)
    }

    fn conditionals(&mut self, v: NodeIndex, parents: &[NodeIndex]) -> Vec<Factor> {
        let mut factors = Vec::with_capacity(2 << parents.len());
        for sig in Signature::all(parents.len()) {
            let contributors: Vec<Contributor> = parents
                .iter()
                .zip(sig.bits())
                .map(|(p, bit)| self.contributor(*p, *bit))
                .collect();
            let operands: Vec<Operand> = parents
                .iter()
                .zip(sig.bits())
                .map(|(p, bit)| Operand::Mass {
                    vertex: *p,
                    value: *bit,
                })
                .collect();
            let positive = self.push(
                ParameterKind::Conditional,
                self.contributor(v, true),
                contributors.clone(),
                Vec::new(),
                false,
            );
            let negative = self.push(
                ParameterKind::Conditional,
                self.contributor(v, false),
                contributors,
                vec![positive],
                true,
            );
            factors.push(Factor {
                parameter: positive,
                outcome: true,
                operands: operands.clone(),
            });
            factors.push(Factor {
                parameter: negative,
                outcome: false,
                operands,
            });
        }
        factors
    }

    /// Local parameter of `vertex` with outcome `value`, its parents' values
    /// read from `sig` over `horizon.vertices()`.
    fn local(
        &self,
        owner: NodeIndex,
        vertex: NodeIndex,
        value: bool,
        horizon: &Horizon,
        sig: &Signature,
    ) -> CompileResult<ParameterId> {
        let outcome = self.contributor(vertex, value);
        let mut contributors = Vec::new();
        let mut complete = true;
        for p in self.graph.parents(vertex) {
            match horizon.position(p) {
                Some(pos) => contributors.push(self.contributor(p, sig.get(pos))),
                None => complete = false,
            }
        }
        let missing = || CompileError::MissingParameter {
            vertex: self.id(owner),
            outcome: outcome.to_string(),
            contributors: contributors
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join(", "),
        };
        if !complete {
            return Err(missing());
        }
        self.lookup
            .get(&parameter::lookup_key(&outcome, &contributors))
            .copied()
            .ok_or_else(missing)
    }

    fn operands(horizon: &Horizon, sig: &Signature) -> Vec<Operand> {
        horizon
            .vertices()
            .iter()
            .enumerate()
            .map(|(pos, &w)| {
                let value = sig.get(pos);
                if pos < horizon.split() {
                    Operand::Evidence { vertex: w, value }
                } else {
                    Operand::Mass { vertex: w, value }
                }
            })
            .collect()
    }

    fn derive(&mut self, v: NodeIndex, horizon: &Horizon) -> CompileResult<Vec<Factor>> {
        let width = horizon.vertices().len();
        let mut factors = Vec::with_capacity(2 << width);
        for sig in Signature::all(width) {
            let mut interior = Vec::with_capacity(horizon.split());
            for (pos, &i) in horizon.interior().iter().enumerate() {
                interior.push(self.local(v, i, sig.get(pos), horizon, &sig)?);
            }
            let contributors: Vec<Contributor> = horizon
                .vertices()
                .iter()
                .zip(sig.bits())
                .map(|(w, bit)| self.contributor(*w, *bit))
                .collect();
            let operands = Self::operands(horizon, &sig);

            for outcome in [true, false] {
                let own = self.local(v, v, outcome, horizon, &sig)?;
                let mut derived_from = Vec::with_capacity(interior.len() + 1);
                derived_from.push(own);
                derived_from.extend(interior.iter().copied());
                let parameter = self.push(
                    ParameterKind::Derived,
                    self.contributor(v, outcome),
                    contributors.clone(),
                    derived_from,
                    false,
                );
                factors.push(Factor {
                    parameter,
                    outcome,
                    operands: operands.clone(),
                });
            }
        }
        tracing::debug!(
            observable = %self.id(v),
            factors = factors.len(),
            "derived factors built"
        );
        Ok(factors)
    }

    /// Weakly connected components of the non-root vertices, each with a
    /// horizon seeded from its outputs.
    fn sinks(
        &self,
        analyzer: &HorizonAnalyzer<'_, NodeIndex, ()>,
    ) -> CompileResult<Vec<EvidenceSink>> {
        let graph = self.graph;
        let root = graph.root();
        let mut components = UnionFind::<usize>::new(graph.len());
        for v in graph.graph().node_indices() {
            if v == root {
                continue;
            }
            for c in graph.children(v) {
                components.union(v.index(), c.index());
            }
        }

        let mut groups: Vec<Vec<NodeIndex>> = Vec::new();
        let mut by_label: HashMap<usize, usize> = HashMap::new();
        for v in graph.graph().node_indices() {
            if v == root {
                continue;
            }
            let label = components.find(v.index());
            let slot = *by_label.entry(label).or_insert_with(|| {
                groups.push(Vec::new());
                groups.len() - 1
            });
            groups[slot].push(v);
        }

        let mut sinks = Vec::with_capacity(groups.len());
        for members in groups {
            let outputs = members
                .iter()
                .copied()
                .filter(|m| graph.children(*m).is_empty());
            let horizon = analyzer.from_seeds(outputs);
            let width = horizon.vertices().len();
            if width > MAX_HORIZON {
                return Err(CompileError::HorizonTooWide {
                    id: self.id(members[0]),
                    count: width,
                    max: MAX_HORIZON,
                });
            }
            let mut terms = Vec::with_capacity(1 << width);
            for sig in Signature::all(width) {
                let mut derivation = Vec::with_capacity(horizon.split());
                for (pos, &i) in horizon.interior().iter().enumerate() {
                    derivation.push(self.local(members[0], i, sig.get(pos), &horizon, &sig)?);
                }
                terms.push(SinkTerm {
                    derivation,
                    operands: Self::operands(&horizon, &sig),
                });
            }
            tracing::debug!(
                members = members.len(),
                width,
                terms = terms.len(),
                "evidence sink built"
            );
            sinks.push(EvidenceSink {
                members,
                horizon,
                terms,
            });
        }
        Ok(sinks)
    }
}

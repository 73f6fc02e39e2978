//! The flattened evaluation plan of one compiled network variant.
//!
//! For each trial value of the root, masses are accumulated forward in
//! topological order: `c[v]` is the probability of `v = true` jointly with the
//! evidence on its ancestors, `nc[v]` the same for `v = false`. Fixed evidence
//! zeroes the opposite accumulator. The likelihood of all evidence given the
//! trial is the product over evidence sinks, which partition the non-root
//! vertices into components that are independent given the root.

use std::collections::HashMap;
use std::sync::Arc;

use crate::compile::{CompiledNetwork, Operand, ParameterSchema};
use crate::error::{InferError, InferResult};
use crate::network::ObservableId;

use super::parameters::{ParameterValues, Parameters};
use super::{Evidence, Inference};

#[derive(Debug, Clone, Copy)]
enum Term {
    Mass { index: usize, value: bool },
    Evidence { index: usize, value: bool },
}

impl From<&Operand> for Term {
    fn from(op: &Operand) -> Self {
        match *op {
            Operand::Mass { vertex, value } => Term::Mass {
                index: vertex.index(),
                value,
            },
            Operand::Evidence { vertex, value } => Term::Evidence {
                index: vertex.index(),
                value,
            },
        }
    }
}

#[derive(Debug, Clone)]
struct StepFactor {
    parameter: usize,
    outcome: bool,
    terms: Vec<Term>,
}

#[derive(Debug, Clone)]
struct Step {
    vertex: usize,
    factors: Vec<StepFactor>,
}

#[derive(Debug, Clone)]
struct SinkRow {
    derivation: Vec<usize>,
    terms: Vec<Term>,
}

/// Exact evaluator for one compiled variant. Immutable and shareable.
#[derive(Debug, Clone)]
pub struct Inferencer {
    network: Arc<CompiledNetwork>,
    index: HashMap<ObservableId, usize>,
    root: usize,
    prior: (usize, usize),
    steps: Vec<Step>,
    sinks: Vec<Vec<SinkRow>>,
}

/// Scratch accumulators for one evaluation.
struct Masses {
    state: Vec<Option<bool>>,
    c: Vec<f64>,
    nc: Vec<f64>,
}

impl Masses {
    fn term(&self, term: Term) -> f64 {
        match term {
            Term::Mass { index, value } => {
                if value {
                    self.c[index]
                } else {
                    self.nc[index]
                }
            }
            Term::Evidence { index, value } => {
                if admits(self.state[index], value) {
                    1.0
                } else {
                    0.0
                }
            }
        }
    }

    fn product(&self, terms: &[Term]) -> f64 {
        let mut acc = 1.0;
        for t in terms {
            acc *= self.term(*t);
            if acc == 0.0 {
                break;
            }
        }
        acc
    }
}

fn admits(evidence: Option<bool>, value: bool) -> bool {
    evidence.is_none_or(|e| e == value)
}

impl Inferencer {
    /// Flatten a compiled network into an evaluation plan.
    pub fn new(network: Arc<CompiledNetwork>) -> Self {
        let graph = network.graph();
        let index = graph
            .graph()
            .node_indices()
            .map(|v| (graph.observable(v).id.clone(), v.index()))
            .collect();
        let root = network.root();
        let (positive, negative) = network.prior();

        let steps = network
            .order()
            .iter()
            .filter(|v| **v != root)
            .map(|&v| Step {
                vertex: v.index(),
                factors: network
                    .factors(v)
                    .iter()
                    .map(|f| StepFactor {
                        parameter: f.parameter.index(),
                        outcome: f.outcome,
                        terms: f.operands.iter().map(Term::from).collect(),
                    })
                    .collect(),
            })
            .collect();

        let sinks = network
            .sinks()
            .iter()
            .map(|sink| {
                sink.terms
                    .iter()
                    .map(|t| SinkRow {
                        derivation: t.derivation.iter().map(|d| d.index()).collect(),
                        terms: t.operands.iter().map(Term::from).collect(),
                    })
                    .collect()
            })
            .collect();

        Self {
            index,
            root: root.index(),
            prior: (positive.index(), negative.index()),
            steps,
            sinks,
            network,
        }
    }

    pub fn network(&self) -> &Arc<CompiledNetwork> {
        &self.network
    }

    pub fn schema(&self) -> &ParameterSchema {
        self.network.schema()
    }

    pub fn signature(&self) -> &str {
        self.network.signature()
    }

    /// Whether an observable is part of this variant.
    pub fn contains(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    /// Posterior of the root given `evidence` under a record's parameters.
    pub fn infer(&self, evidence: &Evidence, parameters: &Parameters) -> InferResult<Inference> {
        let values = ParameterValues::expand(&self.network, parameters)?;
        self.evaluate(evidence, &values)
    }

    /// As [`Inferencer::infer`] with an already expanded value table.
    pub fn evaluate(&self, evidence: &Evidence, values: &ParameterValues) -> InferResult<Inference> {
        let mut state = vec![None; self.index.len()];
        for (id, value) in evidence.iter() {
            let Some(&i) = self.index.get(id.as_str()) else {
                return Err(InferError::UnknownObservable {
                    id: id.to_string(),
                    variant: self.signature().to_string(),
                });
            };
            state[i] = Some(value);
        }

        let prior = values.at(self.prior.0);
        if state.iter().all(Option::is_none) {
            return Ok(Inference {
                prior,
                conditional: 1.0,
                evidence: 1.0,
                posterior: prior,
            });
        }

        let mut masses = Masses {
            c: vec![0.0; state.len()],
            nc: vec![0.0; state.len()],
            state,
        };
        let likely = self.likelihood(true, &mut masses, values);
        let unlikely = self.likelihood(false, &mut masses, values);

        let ph = prior * likely;
        let pe = ph + values.at(self.prior.1) * unlikely;
        let posterior = if pe == 0.0 { 0.0 } else { ph / pe };
        Ok(Inference {
            prior,
            conditional: likely,
            evidence: pe,
            posterior,
        })
    }

    /// `P(evidence | root = trial)`.
    fn likelihood(&self, trial: bool, m: &mut Masses, values: &ParameterValues) -> f64 {
        if !admits(m.state[self.root], trial) {
            return 0.0;
        }
        m.c.fill(0.0);
        m.nc.fill(0.0);
        if trial {
            m.c[self.root] = 1.0;
        } else {
            m.nc[self.root] = 1.0;
        }

        for step in &self.steps {
            let evidence = m.state[step.vertex];
            let (mut c, mut nc) = (0.0, 0.0);
            for f in &step.factors {
                if !admits(evidence, f.outcome) {
                    continue;
                }
                let coefficient = values.at(f.parameter);
                if coefficient == 0.0 {
                    continue;
                }
                let term = coefficient * m.product(&f.terms);
                if f.outcome {
                    c += term;
                } else {
                    nc += term;
                }
            }
            m.c[step.vertex] = c;
            m.nc[step.vertex] = nc;
        }

        let mut likelihood = 1.0;
        for rows in &self.sinks {
            let mut sum = 0.0;
            for row in rows {
                let coefficient: f64 = row.derivation.iter().map(|d| values.at(*d)).product();
                if coefficient == 0.0 {
                    continue;
                }
                sum += coefficient * m.product(&row.terms);
            }
            likelihood *= sum;
        }
        likelihood
    }
}

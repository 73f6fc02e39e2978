//! Parameter estimation from observed assignments.
//!
//! Base parameters are estimated by counting: a prior from the root's
//! frequency, a conditional from the frequency of its outcome among samples
//! agreeing with its contributors. Additive smoothing keeps unseen signatures
//! away from 0 and 1.

use std::collections::HashMap;
use std::sync::Arc;

use crate::compile::{CompiledNetwork, Contributor};
use crate::infer::Parameters;
use crate::network::ObservableId;

/// Default additive smoothing.
pub const DEFAULT_SMOOTHING: f64 = 1.0;

/// Accumulates counts against one compiled variant.
#[derive(Debug, Clone)]
pub struct Calibrator {
    network: Arc<CompiledNetwork>,
    smoothing: f64,
    hits: Vec<f64>,
    totals: Vec<f64>,
    samples: usize,
}

impl Calibrator {
    pub fn new(network: Arc<CompiledNetwork>, smoothing: f64) -> Self {
        let n = network.schema().len();
        Self {
            network,
            smoothing: smoothing.max(0.0),
            hits: vec![0.0; n],
            totals: vec![0.0; n],
            samples: 0,
        }
    }

    pub fn samples(&self) -> usize {
        self.samples
    }

    /// Count one sample. Parameters whose variables are not all present in
    /// the sample are left untouched.
    pub fn observe(&mut self, sample: &HashMap<ObservableId, bool>) {
        let holds = |c: &Contributor| sample.get(c.observable.as_str()).map(|v| *v == c.value);
        for (slot, id) in self.network.schema().base.iter().enumerate() {
            let p = self.network.parameter(*id);
            let mut given = Some(true);
            for c in &p.contributors {
                match holds(c) {
                    Some(true) => {}
                    Some(false) => given = Some(false),
                    None => {
                        given = None;
                        break;
                    }
                }
            }
            let outcome = holds(&p.outcome);
            if let (Some(true), Some(outcome)) = (given, outcome) {
                self.totals[slot] += 1.0;
                if outcome {
                    self.hits[slot] += 1.0;
                }
            }
        }
        self.samples += 1;
    }

    pub fn observe_all<'a>(&mut self, samples: impl IntoIterator<Item = &'a HashMap<ObservableId, bool>>) {
        for s in samples {
            self.observe(s);
        }
    }

    /// Smoothed estimates in schema order.
    pub fn parameters(&self) -> Parameters {
        let alpha = self.smoothing;
        let values: Vec<f64> = self
            .hits
            .iter()
            .zip(&self.totals)
            .map(|(hits, total)| {
                let denominator = total + 2.0 * alpha;
                if denominator == 0.0 {
                    0.5
                } else {
                    (hits + alpha) / denominator
                }
            })
            .collect();
        tracing::debug!(
            variant = self.network.signature(),
            samples = self.samples,
            parameters = values.len(),
            "parameters estimated"
        );
        let mut values = values.into_iter();
        Parameters::from_fn(&self.network, |_| values.next().unwrap_or(0.5))
    }
}

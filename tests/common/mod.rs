//! Shared network and record fixtures for the integration tests.

#![allow(dead_code)]

use std::sync::Arc;

use petgraph::graph::NodeIndex;

use taxolink::compile::{CompiledNetwork, Contributor, InferenceParameter, NetworkCompiler};
use taxolink::infer::{Evidence, Inferencer, NetworkVariants, ParameterValues, Parameters};
use taxolink::network::{EdgeDef, ErasureGroup, NetworkDefinition, ObservableDef, Style};
use taxolink::store::Record;

/// A definition over every vertex named in `edges`, rooted at `root`.
pub fn definition(name: &str, root: &str, edges: &[(&str, &str)]) -> NetworkDefinition {
    let mut ids: Vec<&str> = vec![root];
    for (s, t) in edges {
        for id in [s, t] {
            if !ids.contains(id) {
                ids.push(id);
            }
        }
    }
    NetworkDefinition {
        name: name.into(),
        root: root.into(),
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

pub fn compile(definition: &NetworkDefinition) -> Arc<CompiledNetwork> {
    let graph = definition.graph().unwrap();
    Arc::new(NetworkCompiler::analyse(&graph).unwrap())
}

pub fn sprinkler() -> Inferencer {
    let def = definition(
        "sprinkler",
        "rain",
        &[("rain", "sprinkler"), ("rain", "wet"), ("sprinkler", "wet")],
    );
    Inferencer::new(compile(&def))
}

pub fn sprinkler_parameters(inferencer: &Inferencer) -> Parameters {
    Parameters::new(
        inferencer.schema(),
        vec![0.2, 0.01, 0.4, 0.99, 0.8, 0.9, 0.01],
    )
    .unwrap()
}

/// `r -> a, r -> b, a -> c, b -> c`: `c` has two correlated non-root parents.
pub fn diamond() -> NetworkDefinition {
    definition("diamond", "r", &[("r", "a"), ("r", "b"), ("a", "c"), ("b", "c")])
}

/// Diamond followed by a second reconvergence through `a`, plus an
/// independent branch hanging off the root.
pub fn braided() -> NetworkDefinition {
    definition(
        "braided",
        "r",
        &[
            ("r", "a"),
            ("r", "b"),
            ("a", "c"),
            ("b", "c"),
            ("c", "d"),
            ("a", "d"),
            ("r", "u"),
            ("u", "v"),
        ],
    )
}

pub const TAXON_ID: &str = "taxonId";
pub const RANK: &str = "taxonRank";
pub const NAME: &str = "scientificName";
pub const AUTHORSHIP: &str = "scientificNameAuthorship";
pub const GENUS: &str = "genus";
pub const FAMILY: &str = "family";

/// Six-field taxon network with an optional authorship group.
pub fn taxon_definition() -> NetworkDefinition {
    let mut def = definition(
        "taxon",
        TAXON_ID,
        &[
            (TAXON_ID, RANK),
            (TAXON_ID, NAME),
            (NAME, AUTHORSHIP),
            (TAXON_ID, GENUS),
            (NAME, GENUS),
            (GENUS, FAMILY),
        ],
    );
    def.observables[0].style = Style::Identifier;
    def.erasures.push(ErasureGroup {
        name: "authorship".into(),
        observables: vec![AUTHORSHIP.into()],
    });
    def
}

/// Hand-set conditional probabilities for the taxon network.
pub fn taxon_value(p: &InferenceParameter) -> f64 {
    let given = |id: &str| {
        p.contributors
            .iter()
            .find(|c| c.observable.as_str() == id)
            .map(|c| c.value)
    };
    let when = |id: &str, yes: f64, no: f64| if given(id) == Some(true) { yes } else { no };
    match p.outcome.observable.as_str() {
        TAXON_ID => 1e-4,
        RANK => when(TAXON_ID, 0.9, 0.2),
        NAME => when(TAXON_ID, 1.0, 1e-7),
        AUTHORSHIP => when(NAME, 0.8, 0.01),
        GENUS => match (given(TAXON_ID), given(NAME)) {
            (Some(true), Some(true)) => 1.0,
            (Some(true), _) => 0.5,
            (_, Some(true)) => 0.9,
            _ => 0.001,
        },
        FAMILY => when(GENUS, 0.95, 0.01),
        other => panic!("unexpected parameter outcome {other}"),
    }
}

pub fn taxon_parameters(variants: &NetworkVariants, signature: &str) -> Parameters {
    let inferencer = variants.variant(signature).unwrap();
    Parameters::from_fn(inferencer.network(), taxon_value)
}

/// A reference record calibrated with the taxon fixture parameters for the
/// full variant.
pub fn taxon_record(variants: &NetworkVariants, id: &str, name: &str, rank: &str) -> Record {
    Record::new(id)
        .with_value(TAXON_ID, id)
        .with_value(NAME, name)
        .with_value(RANK, rank)
        .with_parameters(taxon_parameters(variants, &variants.full_signature()))
}

/// `(P(evidence), P(root | evidence))` by summing the joint distribution over
/// every assignment of the network.
pub fn brute_force(
    network: &CompiledNetwork,
    values: &ParameterValues,
    evidence: &Evidence,
) -> (f64, f64) {
    let graph = network.graph();
    let root = graph.root();
    let vertices: Vec<NodeIndex> = graph.graph().node_indices().collect();
    let (mut pe, mut ph) = (0.0, 0.0);

    for bits in 0u64..(1 << vertices.len()) {
        let value = |v: NodeIndex| (bits >> v.index()) & 1 == 1;
        let consistent = vertices.iter().all(|&v| {
            evidence
                .get(graph.observable(v).id.as_str())
                .is_none_or(|e| e == value(v))
        });
        if !consistent {
            continue;
        }
        let mut joint = 1.0;
        for &v in graph.order() {
            let outcome = Contributor::new(graph.observable(v).id.clone(), true);
            let given: Vec<Contributor> = graph
                .parents(v)
                .into_iter()
                .map(|p| Contributor::new(graph.observable(p).id.clone(), value(p)))
                .collect();
            let id = network.find_parameter(&outcome, &given).unwrap();
            let p = values.get(id);
            joint *= if value(v) { p } else { 1.0 - p };
        }
        pe += joint;
        if value(root) {
            ph += joint;
        }
    }
    let posterior = if pe == 0.0 { 0.0 } else { ph / pe };
    (pe, posterior)
}

//! End-to-end inference tests: compiled networks evaluated against hand
//! computed scenarios and against brute-force enumeration of the joint
//! distribution.

mod common;

use std::collections::HashMap;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use taxolink::calibrate::Calibrator;
use taxolink::compile::ParameterKind;
use taxolink::error::InferError;
use taxolink::infer::{Evidence, Inferencer, NetworkVariants, ParameterValues, Parameters};
use taxolink::network::{NetworkDefinition, ObservableId};
use taxolink::store::{DurableStore, Record};

use common::*;

#[test]
fn sprinkler_scenario() {
    let inf = sprinkler();
    let params = sprinkler_parameters(&inf);

    let none = inf.infer(&Evidence::new(), &params).unwrap();
    assert!((none.posterior - 0.2).abs() < 1e-4);

    let off = Evidence::new().with("sprinkler", false);
    let out = inf.infer(&off, &params).unwrap();
    assert!((out.posterior - 0.2920).abs() < 1e-4, "{}", out.posterior);

    let wet = Evidence::new().with("wet", true).with("sprinkler", false);
    let out = inf.infer(&wet, &params).unwrap();
    assert!((out.posterior - 0.9706).abs() < 1e-4, "{}", out.posterior);
}

#[test]
fn all_unknown_returns_the_prior_in_every_variant() {
    let variants = NetworkVariants::compile(&taxon_definition()).unwrap();
    for signature in variants.signatures() {
        let inf = variants.variant(signature).unwrap();
        let params = taxon_parameters(&variants, signature);
        let out = inf.infer(&Evidence::new(), &params).unwrap();
        assert_eq!(out.posterior, 1e-4);
        assert_eq!(out.prior, 1e-4);
    }
}

#[test]
fn taxon_fixture_name_match() {
    let variants = NetworkVariants::compile(&taxon_definition()).unwrap();
    let full = variants.full().unwrap();
    let params = taxon_parameters(&variants, &variants.full_signature());

    let out = full
        .infer(&Evidence::new().with(NAME, true), &params)
        .unwrap();
    assert!((out.evidence - 1.0009999e-4).abs() < 1e-12, "{}", out.evidence);
    assert!((out.conditional - 1.0).abs() < 1e-12);
    assert!((out.posterior - 0.999001).abs() < 1e-6, "{}", out.posterior);
}

fn random_evidence(rng: &mut StdRng, inf: &Inferencer) -> Evidence {
    let graph = inf.network().graph();
    let mut evidence = Evidence::new();
    for v in graph.graph().node_indices() {
        let value = match rng.gen_range(0..4) {
            0 => Some(true),
            1 => Some(false),
            _ => None,
        };
        evidence.set(graph.observable(v).id.clone(), value);
    }
    evidence
}

fn assert_exact(definition: &NetworkDefinition, seed: u64) {
    let network = compile(definition);
    let inf = Inferencer::new(network.clone());
    let mut rng = StdRng::seed_from_u64(seed);

    for _ in 0..20 {
        let params = Parameters::from_fn(&network, |_| rng.gen_range(0.05..0.95));
        let values = ParameterValues::expand(&network, &params).unwrap();
        for _ in 0..30 {
            let evidence = random_evidence(&mut rng, &inf);
            let out = inf.evaluate(&evidence, &values).unwrap();
            let (pe, posterior) = brute_force(&network, &values, &evidence);
            if evidence.is_empty() {
                assert_eq!(out.posterior, out.prior);
                continue;
            }
            assert!(
                (out.evidence - pe).abs() < 1e-12,
                "{}: P(e) {} vs {} for {:?}",
                definition.name,
                out.evidence,
                pe,
                evidence
            );
            assert!(
                (out.posterior - posterior).abs() < 1e-9,
                "{}: posterior {} vs {} for {:?}",
                definition.name,
                out.posterior,
                posterior,
                evidence
            );
        }
    }
}

#[test]
fn exact_on_sprinkler() {
    let def = definition(
        "sprinkler",
        "rain",
        &[("rain", "sprinkler"), ("rain", "wet"), ("sprinkler", "wet")],
    );
    assert_exact(&def, 1);
}

#[test]
fn exact_on_diamond() {
    assert_exact(&diamond(), 2);
}

#[test]
fn exact_on_braided_network() {
    assert_exact(&braided(), 3);
}

#[test]
fn exact_on_taxon_network() {
    assert_exact(&taxon_definition(), 4);
}

#[test]
fn expanded_values_are_complementary() {
    let network = compile(&braided());
    let mut rng = StdRng::seed_from_u64(7);
    let params = Parameters::from_fn(&network, |_| rng.r#gen::<f64>());
    let values = ParameterValues::expand(&network, &params).unwrap();

    for p in network.parameters() {
        if !p.inverted || p.kind == ParameterKind::Derived {
            continue;
        }
        let positive = p.derived_from[0];
        assert_eq!(values.get(positive) + values.get(p.id), 1.0, "{}", p.formula());
    }
}

#[test]
fn consistent_evidence_moves_posterior_monotonically() {
    let variants = NetworkVariants::compile(&taxon_definition()).unwrap();
    let full = variants.full().unwrap();
    let params = taxon_parameters(&variants, &variants.full_signature());

    let towards_match = [NAME, RANK, GENUS, FAMILY, AUTHORSHIP];
    let mut evidence = Evidence::new();
    let mut last = full.infer(&evidence, &params).unwrap().posterior;
    for id in towards_match {
        evidence = evidence.with(id, true);
        let posterior = full.infer(&evidence, &params).unwrap().posterior;
        assert!(posterior >= last - 1e-12, "{id}: {posterior} < {last}");
        last = posterior;
    }
    assert!(last > 0.999);

    let towards_mismatch = [RANK, GENUS, NAME, FAMILY];
    let mut evidence = Evidence::new();
    let mut last = full.infer(&evidence, &params).unwrap().posterior;
    for id in towards_mismatch {
        evidence = evidence.with(id, false);
        let posterior = full.infer(&evidence, &params).unwrap().posterior;
        assert!(posterior <= last + 1e-12, "{id}: {posterior} > {last}");
        last = posterior;
    }
    assert_eq!(last, 0.0);
}

#[test]
fn impossible_evidence_yields_zero_not_nan() {
    let variants = NetworkVariants::compile(&taxon_definition()).unwrap();
    let full = variants.full().unwrap();
    let zeros = Parameters::new(full.schema(), vec![0.0; full.schema().len()]).unwrap();

    let evidence = Evidence::new().with(NAME, true).with(GENUS, true);
    let out = full.infer(&evidence, &zeros).unwrap();
    assert_eq!(out.evidence, 0.0);
    assert_eq!(out.posterior, 0.0);
    assert!(!out.posterior.is_nan());
}

#[test]
fn parameter_round_trip_is_bit_identical() {
    let variants = NetworkVariants::compile(&taxon_definition()).unwrap();
    let full = variants.full().unwrap();
    let mut rng = StdRng::seed_from_u64(11);
    let params = Parameters::from_fn(full.network(), |_| rng.gen_range(0.0..1.0));
    let evidence = Evidence::new()
        .with(NAME, true)
        .with(GENUS, false)
        .with(AUTHORSHIP, true);
    let before = full.infer(&evidence, &params).unwrap();

    let reloaded = Parameters::from_bytes(&params.to_bytes().unwrap()).unwrap();
    assert_eq!(reloaded, params);
    let after = full.infer(&evidence, &reloaded).unwrap();
    assert_eq!(before.posterior.to_bits(), after.posterior.to_bits());
    assert_eq!(before.evidence.to_bits(), after.evidence.to_bits());

    let dir = tempfile::TempDir::new().unwrap();
    {
        let store = DurableStore::open(dir.path()).unwrap();
        store
            .put(&Record::new("T1").with_parameters(params.clone()))
            .unwrap();
    }
    let store = DurableStore::open(dir.path()).unwrap();
    let record = store.require("T1").unwrap();
    let stored = full.infer(&evidence, record.load_parameters().unwrap()).unwrap();
    assert_eq!(before.posterior.to_bits(), stored.posterior.to_bits());
}

#[test]
fn erased_variant_matches_full_network_with_unknown_authorship() {
    let variants = NetworkVariants::compile(&taxon_definition()).unwrap();
    let full = variants.full().unwrap();
    let bare = variants.variant("F").unwrap();
    assert!(!bare.contains(AUTHORSHIP));
    assert_ne!(full.schema().tag, bare.schema().tag);

    let evidence = Evidence::new().with(NAME, true).with(RANK, false);
    let a = full
        .infer(&evidence, &taxon_parameters(&variants, "T"))
        .unwrap();
    let b = bare
        .infer(&evidence, &taxon_parameters(&variants, "F"))
        .unwrap();
    assert!((a.posterior - b.posterior).abs() < 1e-12);

    let with_author = evidence.clone().with(AUTHORSHIP, true);
    let err = bare
        .infer(&with_author, &taxon_parameters(&variants, "F"))
        .unwrap_err();
    assert!(matches!(err, InferError::UnknownObservable { .. }));

    // parameters of one variant never evaluate under another
    let err = full
        .infer(&evidence, &taxon_parameters(&variants, "F"))
        .unwrap_err();
    assert!(matches!(
        err,
        InferError::LengthMismatch { .. } | InferError::SchemaMismatch { .. }
    ));
}

#[test]
fn calibrated_parameters_evaluate() {
    let inf = sprinkler();
    let mut rng = StdRng::seed_from_u64(5);
    let samples: Vec<HashMap<ObservableId, bool>> = (0..500)
        .map(|_| {
            let rain = rng.gen_bool(0.2);
            let sprinkler = rng.gen_bool(if rain { 0.01 } else { 0.4 });
            let wet = rng.gen_bool(match (rain, sprinkler) {
                (true, true) => 0.99,
                (true, false) => 0.8,
                (false, true) => 0.9,
                (false, false) => 0.01,
            });
            HashMap::from([
                ("rain".into(), rain),
                ("sprinkler".into(), sprinkler),
                ("wet".into(), wet),
            ])
        })
        .collect();

    let mut calibrator = Calibrator::new(inf.network().clone(), 1.0);
    calibrator.observe_all(&samples);
    assert_eq!(calibrator.samples(), 500);
    let params = calibrator.parameters();

    let prior = inf.infer(&Evidence::new(), &params).unwrap().prior;
    assert!((prior - 0.2).abs() < 0.06, "{prior}");
    let wet = Evidence::new().with("wet", true).with("sprinkler", false);
    let out = inf.infer(&wet, &params).unwrap();
    assert!(out.posterior > 0.8, "{}", out.posterior);
}

#[test]
fn definition_loads_from_toml() {
    let dir = tempfile::TempDir::new().unwrap();
    let path = dir.path().join("taxon.toml");
    std::fs::write(
        &path,
        r#"
name = "names"
root = "taxonId"

[[observables]]
id = "taxonId"
style = "identifier"

[[observables]]
id = "scientificName"

[[observables]]
id = "scientificNameAuthorship"

[[edges]]
source = "taxonId"
target = "scientificName"

[[edges]]
source = "scientificName"
target = "scientificNameAuthorship"

[[erasures]]
name = "authorship"
observables = ["scientificNameAuthorship"]
"#,
    )
    .unwrap();

    let def = NetworkDefinition::load(&path).unwrap();
    assert_eq!(def.observables.len(), 3);
    let variants = NetworkVariants::compile(&def).unwrap();
    let sigs: Vec<&str> = variants.signatures().collect();
    assert_eq!(sigs, vec!["F", "T"]);
    assert!(variants.full().unwrap().contains("scientificNameAuthorship"));
}

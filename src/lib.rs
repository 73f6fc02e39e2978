// thiserror's #[error("...{field}...")] format strings reference struct fields,
// but the compiler doesn't see through the derive macro and reports false positives.
#![allow(unused_assignments)]

//! # taxolink
//!
//! Probabilistic record linkage for taxonomic names: a Bayesian network
//! compiler, an exact inference evaluator, and a classification matcher that
//! drives them over candidate records.
//!
//! ## Architecture
//!
//! - **Networks** (`network`): observables, value analyses and the validated dependency DAG
//! - **Horizon analysis** (`network::horizon`): reconverging ancestor boundaries per vertex
//! - **Compiler** (`compile`): parameter identity and shape, derived factors, evidence sinks
//! - **Inference** (`infer`): per-variant evaluation plans over per-record parameters
//! - **Matching** (`matcher`): candidate evaluation, ranking, synonymy and validity
//! - **Storage** (`store`): in-memory candidate index and redb-backed record store
//!
//! ## Library usage
//!
//! ```no_run
//! use std::path::Path;
//! use std::sync::Arc;
//!
//! use taxolink::config::MatcherConfig;
//! use taxolink::infer::NetworkVariants;
//! use taxolink::matcher::{Classification, ClassificationMatcher};
//! use taxolink::network::NetworkDefinition;
//! use taxolink::store::open_searcher;
//!
//! let definition = NetworkDefinition::load(Path::new("taxon.toml")).unwrap();
//! let variants = Arc::new(NetworkVariants::compile(&definition).unwrap());
//! let config = MatcherConfig::default();
//! let searcher = open_searcher(&config.searcher).unwrap();
//! let matcher = ClassificationMatcher::new(variants, searcher, config).unwrap();
//!
//! let query = Classification::new().with("scientificName", "Acacia congesta wonganensis");
//! let found = matcher.find_match(&query, &matcher.options()).unwrap();
//! println!("valid={} posterior={}", found.valid, found.posterior());
//! ```

pub mod backtrack;
pub mod calibrate;
pub mod compile;
pub mod config;
pub mod error;
pub mod infer;
pub mod matcher;
pub mod network;
pub mod store;

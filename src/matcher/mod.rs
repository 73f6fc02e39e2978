//! Classification matching: find the reference record a query most likely
//! denotes.
//!
//! For each query attempt the matcher asks the [`Searcher`] for a bounded
//! candidate set, derives tri-state evidence per candidate, evaluates the
//! candidate's network variant under its own parameters, and ranks by
//! posterior. The best candidate is resolved through synonymy and checked
//! against the validity gate. When no attempt produces a valid match,
//! configured fields are dropped one combination at a time (broadening).
//!
//! "No match" is a normal result ([`Match::invalid`]); errors are reserved for
//! search infrastructure failures.

pub mod cache;
pub mod classification;
pub mod rank;

use std::collections::BTreeSet;
use std::sync::Arc;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::backtrack::{Backtrack, Choice};
use crate::config::MatcherConfig;
use crate::error::{InferResult, MatchResult};
use crate::infer::{Evidence, Inference, NetworkVariants};
use crate::network::ObservableId;
use crate::store::{Record, Searcher};

pub use cache::BoundedCache;
pub use classification::Classification;
pub use rank::Rank;

/// Memoised match results keyed by the structured query plus options.
pub type MatchCache = BoundedCache<MatchKey, Match>;

/// Cache key: the query itself and every option that affects the result.
/// Floats are keyed by their bit patterns.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MatchKey {
    query: Classification,
    min_posterior: u64,
    max_candidates: usize,
    ambiguity_tolerance: u64,
    required: Vec<ObservableId>,
    broaden: bool,
}

/// Diagnostic flags attached to a [`Match`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Issue {
    /// No candidate was found or none could be evaluated.
    NoMatch,
    /// Best posterior does not exceed the minimum.
    LowPosterior,
    /// None of the required observables matched.
    NoRequiredField,
    /// The resolved concept ranks above the query.
    HigherOrderMatch,
    /// The resolved concept ranks below the query.
    LowerOrderMatch,
    /// A runner-up with a different accepted concept scored as well.
    Ambiguous,
    /// The match came from a broadened query.
    Broadened,
    /// At least one candidate failed to evaluate.
    CandidateFailed,
    /// The synonym's accepted record could not be found.
    AcceptedNotFound,
}

/// Caller-supplied matching thresholds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchOptions {
    pub min_posterior: f64,
    pub max_candidates: usize,
    pub ambiguity_tolerance: f64,
    pub required: Vec<ObservableId>,
    /// Try broadened queries when the full query yields no valid match.
    pub broaden: bool,
}

impl Default for MatchOptions {
    fn default() -> Self {
        Self::from(&MatcherConfig::default())
    }
}

impl From<&MatcherConfig> for MatchOptions {
    fn from(config: &MatcherConfig) -> Self {
        Self {
            min_posterior: config.min_posterior,
            max_candidates: config.max_candidates,
            ambiguity_tolerance: config.ambiguity_tolerance,
            required: config.required.clone(),
            broaden: true,
        }
    }
}

impl MatchOptions {
    fn cache_key(&self, query: &Classification) -> MatchKey {
        MatchKey {
            query: query.clone(),
            min_posterior: self.min_posterior.to_bits(),
            max_candidates: self.max_candidates,
            ambiguity_tolerance: self.ambiguity_tolerance.to_bits(),
            required: self.required.clone(),
            broaden: self.broaden,
        }
    }
}

/// Outcome of [`ClassificationMatcher::find_match`].
///
/// An invalid match may still carry the best candidate and its inference so
/// callers can see why it was rejected.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Match {
    pub valid: bool,
    /// The query attempt that produced this result.
    pub query: Classification,
    pub record: Option<Record>,
    /// Accepted record when `record` is a synonym.
    pub accepted: Option<Record>,
    pub inference: Option<Inference>,
    pub evidence: Evidence,
    /// Fraction of compared query fields that matched.
    pub fidelity: f64,
    pub issues: BTreeSet<Issue>,
    /// Candidates evaluated for this attempt.
    pub candidates: usize,
}

impl Match {
    pub fn invalid(query: Classification, issues: impl IntoIterator<Item = Issue>) -> Self {
        Self {
            valid: false,
            query,
            record: None,
            accepted: None,
            inference: None,
            evidence: Evidence::new(),
            fidelity: 0.0,
            issues: issues.into_iter().collect(),
            candidates: 0,
        }
    }

    pub fn posterior(&self) -> f64 {
        self.inference.map_or(0.0, |i| i.posterior)
    }

    pub fn has(&self, issue: Issue) -> bool {
        self.issues.contains(&issue)
    }

    /// The concept this match resolves to: the accepted record for a
    /// synonym, else the matched record.
    pub fn concept(&self) -> Option<&Record> {
        self.accepted.as_ref().or(self.record.as_ref())
    }
}

/// One evaluated candidate.
#[derive(Debug, Clone)]
struct Scored {
    position: usize,
    record: Arc<Record>,
    evidence: Evidence,
    inference: Inference,
}

fn concept_id(record: &Record) -> &str {
    record.accepted.as_deref().unwrap_or(&record.id)
}

/// Stateless apart from its memo cache; safe to share across threads.
pub struct ClassificationMatcher {
    variants: Arc<NetworkVariants>,
    searcher: Arc<dyn Searcher>,
    config: MatcherConfig,
    key: ObservableId,
    cache: MatchCache,
}

impl ClassificationMatcher {
    pub fn new(
        variants: Arc<NetworkVariants>,
        searcher: Arc<dyn Searcher>,
        config: MatcherConfig,
    ) -> InferResult<Self> {
        let key = match &config.key_observable {
            Some(key) => key.clone(),
            None => {
                let full = variants.full()?.network();
                full.graph().observable(full.root()).id.clone()
            }
        };
        Ok(Self {
            cache: MatchCache::new(config.cache_capacity),
            variants,
            searcher,
            config,
            key,
        })
    }

    /// Options derived from the configuration.
    pub fn options(&self) -> MatchOptions {
        MatchOptions::from(&self.config)
    }

    pub fn cache(&self) -> &MatchCache {
        &self.cache
    }

    pub fn variants(&self) -> &NetworkVariants {
        &self.variants
    }

    /// Best match for `query`. Always returns a structured result; `Err` only
    /// for search failures, which are retryable.
    pub fn find_match(&self, query: &Classification, options: &MatchOptions) -> MatchResult<Match> {
        if query.is_empty() {
            return Ok(Match::invalid(query.clone(), [Issue::NoMatch]));
        }
        let key = options.cache_key(query);
        if let Some(hit) = self.cache.get(&key) {
            tracing::debug!(query = %query, "match cache hit");
            return Ok(hit);
        }

        let mut result: Option<Match> = None;
        for (n, attempt) in self.attempts(query, options.broaden).enumerate() {
            if attempt.is_empty() {
                continue;
            }
            let mut found = self.attempt(&attempt, options)?;
            if n > 0 {
                found.issues.insert(Issue::Broadened);
            }
            tracing::debug!(
                attempt = n,
                query = %attempt,
                valid = found.valid,
                posterior = found.posterior(),
                "match attempt"
            );
            if found.valid {
                result = Some(found);
                break;
            }
            if result.is_none() {
                result = Some(found);
            }
        }
        let result = result.unwrap_or_else(|| Match::invalid(query.clone(), [Issue::NoMatch]));

        tracing::info!(
            query = %query,
            valid = result.valid,
            record = result.record.as_ref().map(|r| r.id.as_str()).unwrap_or("-"),
            posterior = result.posterior(),
            issues = result.issues.len(),
            "match complete"
        );
        self.cache.insert(key, result.clone());
        Ok(result)
    }

    /// The query followed by its broadenings, in odometer order over the
    /// configured broadening fields.
    fn attempts(&self, query: &Classification, broaden: bool) -> Backtrack<Classification> {
        let mut attempts = Backtrack::new(query.clone());
        if broaden {
            for field in &self.config.broaden {
                let field = field.clone();
                let drop: Choice<Classification> = Box::new(move |q| q.without(field.as_str()));
                attempts.push_level(vec![drop]);
            }
        }
        attempts
    }

    fn attempt(&self, query: &Classification, options: &MatchOptions) -> MatchResult<Match> {
        let candidates = self.searcher.search(query, options.max_candidates)?;
        if candidates.is_empty() {
            return Ok(Match::invalid(query.clone(), [Issue::NoMatch]));
        }

        let results: Vec<(usize, InferResult<Scored>)> = candidates
            .par_iter()
            .enumerate()
            .map(|(position, record)| (position, self.score(query, position, record)))
            .collect();

        let mut failed = false;
        let mut scored: Vec<Scored> = Vec::with_capacity(results.len());
        for (position, result) in results {
            match result {
                Ok(s) => scored.push(s),
                Err(e) => {
                    failed = true;
                    tracing::warn!(
                        record = %candidates[position].id,
                        error = %e,
                        "candidate evaluation failed"
                    );
                }
            }
        }
        if scored.is_empty() {
            let mut m = Match::invalid(query.clone(), [Issue::NoMatch, Issue::CandidateFailed]);
            m.candidates = candidates.len();
            return Ok(m);
        }
        scored.sort_by(|a, b| {
            b.inference
                .posterior
                .total_cmp(&a.inference.posterior)
                .then(a.position.cmp(&b.position))
        });

        let mut issues = BTreeSet::new();
        if failed {
            issues.insert(Issue::CandidateFailed);
        }
        let best = &scored[0];

        let accepted = if best.record.is_synonym() {
            let target = best.record.accepted.as_deref().unwrap_or_default();
            let found = self.searcher.get(&self.key, target)?;
            if found.is_none() {
                issues.insert(Issue::AcceptedNotFound);
            }
            found.map(|r| (*r).clone())
        } else {
            None
        };

        if let Some(flag) = self.rank_flag(query, accepted.as_ref().unwrap_or(best.record.as_ref())) {
            issues.insert(flag);
        }

        if let Some(second) = scored.get(1) {
            let close = (best.inference.posterior - second.inference.posterior).abs()
                <= options.ambiguity_tolerance;
            if close && concept_id(&second.record) != concept_id(&best.record) {
                issues.insert(Issue::Ambiguous);
            }
        }

        if !(best.inference.posterior > options.min_posterior) {
            issues.insert(Issue::LowPosterior);
        }
        let required_matched = if options.required.is_empty() {
            best.evidence.matched() > 0
        } else {
            options
                .required
                .iter()
                .any(|id| best.evidence.get(id.as_str()) == Some(true))
        };
        if !required_matched {
            issues.insert(Issue::NoRequiredField);
        }

        let valid = !issues.contains(&Issue::LowPosterior) && !issues.contains(&Issue::NoRequiredField);
        let fidelity = if best.evidence.is_empty() {
            0.0
        } else {
            best.evidence.matched() as f64 / best.evidence.len() as f64
        };

        Ok(Match {
            valid,
            query: query.clone(),
            record: Some((*best.record).clone()),
            accepted,
            inference: Some(best.inference),
            evidence: best.evidence.clone(),
            fidelity,
            issues,
            candidates: candidates.len(),
        })
    }

    /// Evidence and inference for one candidate under its own variant.
    fn score(
        &self,
        query: &Classification,
        position: usize,
        record: &Arc<Record>,
    ) -> InferResult<Scored> {
        let parameters = record.load_parameters()?;
        let inferencer = self.variants.variant(parameters.signature())?;
        let network = inferencer.network();

        let mut evidence = Evidence::new();
        for (id, value) in query.iter() {
            // fields erased in this variant carry no evidence
            let Some(vertex) = network.observable(id.as_str()) else {
                continue;
            };
            let observable = network.graph().observable(vertex);
            evidence.set(id.clone(), record.match_value(observable, value));
        }

        let inference = inferencer.infer(&evidence, parameters)?;
        tracing::debug!(
            record = %record.id,
            variant = parameters.signature(),
            posterior = inference.posterior,
            "candidate evaluated"
        );
        Ok(Scored {
            position,
            record: record.clone(),
            evidence,
            inference,
        })
    }

    fn rank_flag(&self, query: &Classification, concept: &Record) -> Option<Issue> {
        let field = self.config.rank_observable.as_ref()?;
        let wanted = Rank::parse(query.get(field.as_str())?)?;
        let found = Rank::parse(concept.first(field.as_str())?)?;
        if found.is_broader_than(wanted) {
            Some(Issue::HigherOrderMatch)
        } else if wanted.is_broader_than(found) {
            Some(Issue::LowerOrderMatch)
        } else {
            None
        }
    }
}

impl std::fmt::Debug for ClassificationMatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClassificationMatcher")
            .field("network", &self.variants.name())
            .field("key", &self.key)
            .field("cached", &self.cache.len())
            .finish()
    }
}

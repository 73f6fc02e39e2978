//! Rich diagnostic error types for taxolink.
//!
//! Each subsystem defines its own error type with miette `#[diagnostic]` derives,
//! providing error codes, help text, and source chains so callers can tell a
//! broken network definition from a corrupt parameter vector from a store outage.

use miette::Diagnostic;
use thiserror::Error;

/// Top-level error type for taxolink.
///
/// Each variant wraps a subsystem-specific error, preserving the full diagnostic
/// chain (error codes, help text) through to the user.
#[derive(Debug, Error, Diagnostic)]
pub enum LinkError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Network(#[from] NetworkError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Compile(#[from] CompileError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Infer(#[from] InferError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Match(#[from] MatchError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Config(#[from] ConfigError),
}

/// Convenience alias for top-level results.
pub type LinkResult<T> = std::result::Result<T, LinkError>;

// ---------------------------------------------------------------------------
// Network definition errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum NetworkError {
    #[error("unknown observable: {id}")]
    #[diagnostic(
        code(taxolink::network::unknown_observable),
        help(
            "An edge, erasure group or root refers to an observable that is not \
             declared in the `observables` list. Check the spelling of \"{id}\"."
        )
    )]
    UnknownObservable { id: String },

    #[error("duplicate observable: {id}")]
    #[diagnostic(
        code(taxolink::network::duplicate_observable),
        help("Each observable id may only be declared once.")
    )]
    DuplicateObservable { id: String },

    #[error("duplicate dependency edge: {source_id} -> {target}")]
    #[diagnostic(
        code(taxolink::network::duplicate_edge),
        help("Remove the repeated edge; a dependency is either present or not.")
    )]
    DuplicateEdge { source_id: String, target: String },

    #[error("dependency graph contains a cycle through {id}")]
    #[diagnostic(
        code(taxolink::network::cycle),
        help(
            "The dependency network must be a DAG. Horizon analysis does not \
             terminate on cyclic input, so the definition is rejected at load time."
        )
    )]
    Cycle { id: String },

    #[error("root observable {id} has incoming dependencies")]
    #[diagnostic(
        code(taxolink::network::root_not_input),
        help("The root is the identifying variable and must not be conditioned on anything.")
    )]
    RootNotInput { id: String },

    #[error("observable {id} has no dependencies but is not the root")]
    #[diagnostic(
        code(taxolink::network::extra_input),
        help(
            "Every observable other than the root must depend, directly or \
             indirectly, on the root. Add an edge from the root or from another \
             observable to \"{id}\"."
        )
    )]
    ExtraInput { id: String },

    #[error("the root observable {id} cannot be erased")]
    #[diagnostic(
        code(taxolink::network::root_erased),
        help("Remove the root from every erasure group.")
    )]
    RootErased { id: String },

    #[error("invalid network definition: {message}")]
    #[diagnostic(
        code(taxolink::network::invalid),
        help("The network definition file is malformed or missing required fields.")
    )]
    InvalidDefinition { message: String },
}

/// Result type for network definition operations.
pub type NetworkResult<T> = std::result::Result<T, NetworkError>;

// ---------------------------------------------------------------------------
// Compilation errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum CompileError {
    #[error("no parameter for {outcome} given [{contributors}] while deriving factors of {vertex}")]
    #[diagnostic(
        code(taxolink::compile::missing_parameter),
        help(
            "The horizon of \"{vertex}\" references a signature that no interior \
             vertex parameter matches. This indicates a malformed network or a \
             compiler bug; the compilation is aborted to avoid producing a \
             parameter schema that would corrupt stored records."
        )
    )]
    MissingParameter {
        vertex: String,
        outcome: String,
        contributors: String,
    },

    #[error("observable {id} has {count} parents, more than the supported {max}")]
    #[diagnostic(
        code(taxolink::compile::too_many_parents),
        help("Conditional tables grow as 2^n. Split the dependency through an intermediate observable.")
    )]
    TooManyParents { id: String, count: usize, max: usize },

    #[error("horizon of {id} spans {count} vertices, more than the supported {max}")]
    #[diagnostic(
        code(taxolink::compile::horizon_too_wide),
        help("Derived factor tables grow as 2^n over the horizon. Reduce converging paths.")
    )]
    HorizonTooWide { id: String, count: usize, max: usize },

    #[error(transparent)]
    #[diagnostic(transparent)]
    Network(#[from] NetworkError),
}

/// Result type for compilation.
pub type CompileResult<T> = std::result::Result<T, CompileError>;

// ---------------------------------------------------------------------------
// Inference errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum InferError {
    #[error("parameter vector has {actual} values, schema expects {expected}")]
    #[diagnostic(
        code(taxolink::infer::length_mismatch),
        help(
            "The stored parameters were computed for a different network layout. \
             Recalibrate the record against the current network."
        )
    )]
    LengthMismatch { expected: usize, actual: usize },

    #[error("parameter schema mismatch: stored {stored}, network {expected}")]
    #[diagnostic(
        code(taxolink::infer::schema_mismatch),
        help(
            "The parameter vector was produced by a different compiler version or \
             network definition. Its values cannot be interpreted safely."
        )
    )]
    SchemaMismatch { expected: String, stored: String },

    #[error("evidence refers to observable {id}, which is not in network variant {variant}")]
    #[diagnostic(
        code(taxolink::infer::unknown_observable),
        help("Only observables present in the selected variant may carry evidence.")
    )]
    UnknownObservable { id: String, variant: String },

    #[error("no network variant with signature \"{signature}\"")]
    #[diagnostic(
        code(taxolink::infer::unknown_variant),
        help("The record was calibrated against an erasure variant this network does not declare.")
    )]
    UnknownVariant { signature: String },

    #[error("record {record} carries no parameters")]
    #[diagnostic(
        code(taxolink::infer::missing_parameters),
        help("Calibrate the record against its network variant before matching against it.")
    )]
    MissingParameters { record: String },

    #[error("failed to decode parameters: {message}")]
    #[diagnostic(
        code(taxolink::infer::decode),
        help("The stored parameter buffer is truncated or was written in another format.")
    )]
    Decode { message: String },
}

/// Result type for inference operations.
pub type InferResult<T> = std::result::Result<T, InferError>;

// ---------------------------------------------------------------------------
// Store errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum StoreError {
    #[error("I/O error: {source}")]
    #[diagnostic(
        code(taxolink::store::io),
        help(
            "A filesystem operation failed. Check that the data directory exists, \
             has correct permissions, and that the disk is not full."
        )
    )]
    Io {
        #[source]
        source: std::io::Error,
    },

    #[error("redb transaction error: {message}")]
    #[diagnostic(
        code(taxolink::store::redb),
        help(
            "The embedded database encountered a transaction error. \
             The operation may be retried; if it persists, rebuild the store."
        )
    )]
    Redb { message: String },

    #[error("serialization error: {message}")]
    #[diagnostic(
        code(taxolink::store::serde),
        help(
            "Failed to serialize or deserialize a record. \
             This usually means the stored format changed between versions."
        )
    )]
    Serialization { message: String },

    #[error("record not found: {key}")]
    #[diagnostic(
        code(taxolink::store::not_found),
        help("The requested record does not exist in the store.")
    )]
    NotFound { key: String },
}

/// Result type for store operations.
pub type StoreResult<T> = std::result::Result<T, StoreError>;

// ---------------------------------------------------------------------------
// Matching errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum MatchError {
    #[error("candidate search failed: {source}")]
    #[diagnostic(
        code(taxolink::matcher::search),
        help("The record store or search index failed. This is transient; retry the query.")
    )]
    Search {
        #[source]
        source: StoreError,
    },

    #[error(transparent)]
    #[diagnostic(transparent)]
    Compile(#[from] CompileError),
}

impl MatchError {
    /// Whether retrying the same query may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, MatchError::Search { .. })
    }
}

impl From<StoreError> for MatchError {
    fn from(source: StoreError) -> Self {
        MatchError::Search { source }
    }
}

/// Result type for matching.
pub type MatchResult<T> = std::result::Result<T, MatchError>;

// ---------------------------------------------------------------------------
// Configuration errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    #[diagnostic(
        code(taxolink::config::io),
        help("Check that the file exists and is readable.")
    )]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {path}: {message}")]
    #[diagnostic(
        code(taxolink::config::parse),
        help("The file must be valid TOML (or JSON for `.json` files) matching the expected schema.")
    )]
    Parse { path: String, message: String },
}

/// Result type for configuration loading.
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

//! Error types for manifest loading and schema generation.
//!
//! Per-type problems never show up here: they are recorded on the
//! diagnostics tree and compilation carries on. Everything in this module
//! aborts the run.

use thiserror::Error;

use crate::registry::Owner;

/// Result type for engine operations
pub type Result<T, E = EngineError> = std::result::Result<T, E>;

/// The type-system manifest could not be produced.
#[derive(Error, Debug)]
pub enum ManifestError {
    #[error("failed to read manifest {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid input pattern {pattern}: {message}")]
    Pattern { pattern: String, message: String },

    #[error("glob pattern matched no files: {0}")]
    NoMatches(String),

    #[error("failed to decode manifest {origin} at JSON path {path}: {message}")]
    Decode {
        origin: String,
        path: String,
        message: String,
    },

    #[error("failed to apply jq expression to manifest {origin}: {message}")]
    Jq { origin: String, message: String },

    #[error("type {fqn} is declared by both {first} and {second}")]
    DuplicateType {
        fqn: String,
        first: String,
        second: String,
    },

    #[error("base class {0} is not declared in the manifest")]
    UnknownBaseClass(String),
}

/// Internal invariant violations and malformed run inputs.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error(transparent)]
    Manifest(#[from] ManifestError),

    #[error("definition {0} was never resolved")]
    UnresolvedDefinition(String),

    #[error("definition {0} is already resolved")]
    AlreadyResolved(String),

    #[error("definition {0} was resolved without being reserved")]
    NotReserved(String),

    #[error("symbolic alternative {0} is not registered by any extension")]
    MissingAlternative(String),

    #[error("definition key {key} belongs to the {held_by} definitions, not the {requested_by} definitions")]
    KeyClash {
        key: String,
        held_by: Owner,
        requested_by: Owner,
    },

    #[error("envelope is malformed: {0}")]
    Envelope(String),
}

use anoncreds_issuance_registry::errors::error::RegistrarError;
use anoncreds_issuance_store::errors::error::StoreError;
use anoncreds_issuance_types::ValidationError;
use thiserror::Error as ThisError;

pub type IssuanceResult<T> = Result<T, IssuanceError>;

#[derive(Debug, ThisError)]
pub enum IssuanceError {
    /// Fatal misconfiguration (malformed tails URL, missing base setting).
    /// Never retried.
    #[error("Invalid configuration: {0}")]
    Configuration(String),
    /// A record expected under a known key is absent. Callers may recover
    /// by re-resolving state.
    #[error("Not found: {0}")]
    NotFound(String),
    /// Distinguished expected-and-retried condition: the targeted registry
    /// has no free revocation index left. Drives the issuance retry loop
    /// and registry rotation, it is not a true failure.
    #[error("Revocation registry full: {0}")]
    RevocationRegistryFull(String),
    /// Generic revocation failure: wrapped store/engine faults, tails hash
    /// mismatches, missing backup registries, stale-list rejections.
    #[error("Revocation error: {0}")]
    Revocation(String),
    /// Duplicate-key on insert. Surfaced as its own variant because the
    /// issuance-adjacent paths treat it as a retry signal.
    #[error("Duplicate record: {0}")]
    DuplicateRecord(String),
    /// Lost an optimistic-concurrency race; internal retry signal, mapped
    /// to [`IssuanceError::Revocation`] once the retry budget is spent.
    #[error("Concurrent update conflict: {0}")]
    Conflict(String),
    #[error("{context}: {source}")]
    Store {
        context: String,
        #[source]
        source: StoreError,
    },
    #[error("{context}: {source}")]
    Registrar {
        context: String,
        #[source]
        source: RegistrarError,
    },
    #[error("Crypto engine error: {0}")]
    Engine(String),
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    #[error("Invalid JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
    #[error("IO error: {0}")]
    IO(#[from] std::io::Error),
}

impl IssuanceError {
    /// Wrap a store failure with a domain message. Duplicate-key keeps its
    /// own variant so callers can classify it as retryable.
    pub fn from_store(context: impl Into<String>, err: StoreError) -> Self {
        match err {
            StoreError::DuplicateRecord(msg) => Self::DuplicateRecord(msg),
            err => Self::Store {
                context: context.into(),
                source: err,
            },
        }
    }

    pub fn from_registrar(context: impl Into<String>, err: RegistrarError) -> Self {
        Self::Registrar {
            context: context.into(),
            source: err,
        }
    }
}

use thiserror::Error as ThisError;

pub type RegistrarResult<T> = Result<T, RegistrarError>;

#[derive(Debug, ThisError)]
pub enum RegistrarError {
    #[error("Registry rejected the write: {0}")]
    Rejected(String),
    #[error("Registry unavailable: {0}")]
    Unavailable(String),
    #[error("Unsupported registry identifier: {0}")]
    UnsupportedIdentifier(String),
    #[error("Invalid registrar response: {0}")]
    InvalidResponse(String),
    #[error("Invalid JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),
    #[error("Unknown error: {0}")]
    Unknown(Box<dyn std::error::Error + Send + Sync>),
}

impl RegistrarError {
    pub fn unknown_error(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Unknown(Box::new(err))
    }
}

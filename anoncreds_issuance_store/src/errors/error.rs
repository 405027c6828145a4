use std::fmt;

use thiserror::Error as ThisError;

use crate::store::base_store::record_category::RecordCategory;

pub type StoreResult<T> = Result<T, StoreError>;

pub struct NotFoundInfo(Option<(RecordCategory, String)>);

impl NotFoundInfo {
    pub fn new(category: RecordCategory, name: &str) -> Self {
        Self(Some((category, name.to_string())))
    }

    pub fn new_without_details() -> Self {
        Self(None)
    }
}

impl fmt::Debug for NotFoundInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.0 {
            None => write!(f, "no details provided"),
            Some(payload) => write!(f, "category: {}, name: {}", payload.0, payload.1),
        }
    }
}

impl fmt::Display for NotFoundInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

#[derive(Debug, ThisError)]
pub enum StoreError {
    #[error("Duplicate record error: {0}")]
    DuplicateRecord(String),
    #[error("Could not find record in store: {0}")]
    RecordNotFound(NotFoundInfo),
    #[error("Unknown record category: {0}")]
    UnknownRecordCategory(String),
    #[error("Invalid JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),
    #[error("Store backend error: {0}")]
    Backend(Box<dyn std::error::Error + Send + Sync>),
}

impl StoreError {
    pub fn duplicate_record(category: RecordCategory, name: &str) -> Self {
        Self::DuplicateRecord(format!("category: {category}, name: {name}"))
    }

    pub fn record_not_found(category: RecordCategory, name: &str) -> Self {
        Self::RecordNotFound(NotFoundInfo::new(category, name))
    }

    pub fn backend_error(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Backend(Box::new(err))
    }
}

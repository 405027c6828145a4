use std::{
    path::Path,
    sync::{
        atomic::{AtomicU32, Ordering},
        Mutex,
    },
};

use anoncreds_issuance::{
    errors::error::{IssuanceError, IssuanceResult},
    tails::BaseTailsServer,
};
use anoncreds_issuance_types::data_types::ledger::rev_reg_def::RevocationRegistryDefinition;
use async_trait::async_trait;

/// Tails distribution server double: records uploads, can fail the first N
/// attempts (for retry coverage) or report a bogus final location.
#[derive(Debug, Default)]
pub struct MockTailsServer {
    uploads: Mutex<Vec<String>>,
    failures_remaining: AtomicU32,
    report_wrong_location: bool,
}

impl MockTailsServer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_times(failures: u32) -> Self {
        Self {
            failures_remaining: AtomicU32::new(failures),
            ..Self::default()
        }
    }

    pub fn reporting_wrong_location() -> Self {
        Self {
            report_wrong_location: true,
            ..Self::default()
        }
    }

    pub fn upload_count(&self) -> usize {
        self.uploads.lock().unwrap().len()
    }
}

#[async_trait]
impl BaseTailsServer for MockTailsServer {
    async fn upload(
        &self,
        rev_reg_def: &RevocationRegistryDefinition,
        tails_path: &Path,
    ) -> IssuanceResult<String> {
        if self
            .failures_remaining
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |remaining| {
                remaining.checked_sub(1)
            })
            .is_ok()
        {
            return Err(IssuanceError::Revocation(
                "mock tails server unavailable".into(),
            ));
        }

        if !tails_path.exists() {
            return Err(IssuanceError::Revocation(format!(
                "no tails file at {}",
                tails_path.display()
            )));
        }

        if self.report_wrong_location {
            return Ok("https://tails.example.org/wrong-location".into());
        }

        let location = rev_reg_def.value.tails_location.clone();
        self.uploads.lock().unwrap().push(location.clone());
        Ok(location)
    }
}

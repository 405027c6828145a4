use std::{
    sync::Mutex,
    time::{SystemTime, UNIX_EPOCH},
};

use anoncreds_issuance_registry::{
    errors::error::RegistrarResult,
    registrar::base_registrar::{
        BaseRegistrar, RegistrationOptions, RegistrationState, RevListRegistrationResult,
        RevRegDefRegistrationResult,
    },
};
use anoncreds_issuance_types::data_types::ledger::{
    rev_reg_def::RevocationRegistryDefinition, rev_status_list::RevocationStatusList,
};
use async_trait::async_trait;
use uuid::Uuid;

fn now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum Mode {
    /// Registrations finish synchronously under the submitted id.
    Immediate,
    /// Definition registrations come back `wait` under a fresh job id, as
    /// an endorsement-gated ledger would answer.
    Deferred,
}

/// In-memory registrar recording every write it is asked to perform.
#[derive(Debug)]
pub struct MockRegistrar {
    mode: Mode,
    registered_defs: Mutex<Vec<String>>,
    published_updates: Mutex<Vec<(String, Vec<u32>)>>,
}

impl Default for MockRegistrar {
    fn default() -> Self {
        Self::new()
    }
}

impl MockRegistrar {
    pub fn new() -> Self {
        Self {
            mode: Mode::Immediate,
            registered_defs: Mutex::new(Vec::new()),
            published_updates: Mutex::new(Vec::new()),
        }
    }

    pub fn deferred() -> Self {
        Self {
            mode: Mode::Deferred,
            ..Self::new()
        }
    }

    pub fn registered_defs(&self) -> Vec<String> {
        self.registered_defs.lock().unwrap().clone()
    }

    /// Revocation list updates published so far, as
    /// `(rev_reg_def_id, revoked indices)` pairs in submission order.
    pub fn published_updates(&self) -> Vec<(String, Vec<u32>)> {
        self.published_updates.lock().unwrap().clone()
    }
}

#[async_trait]
impl BaseRegistrar for MockRegistrar {
    async fn register_revocation_registry_definition(
        &self,
        rev_reg_def: &RevocationRegistryDefinition,
        _options: &RegistrationOptions,
    ) -> RegistrarResult<RevRegDefRegistrationResult> {
        self.registered_defs
            .lock()
            .unwrap()
            .push(rev_reg_def.id.to_string());

        Ok(match self.mode {
            Mode::Immediate => RevRegDefRegistrationResult {
                state: RegistrationState::Finished,
                job_id: None,
                rev_reg_def_id: Some(rev_reg_def.id.clone()),
            },
            Mode::Deferred => RevRegDefRegistrationResult {
                state: RegistrationState::Wait,
                job_id: Some(Uuid::new_v4().to_string()),
                rev_reg_def_id: None,
            },
        })
    }

    async fn register_revocation_list(
        &self,
        _rev_reg_def: &RevocationRegistryDefinition,
        _rev_list: &RevocationStatusList,
        _options: &RegistrationOptions,
    ) -> RegistrarResult<RevListRegistrationResult> {
        Ok(RevListRegistrationResult {
            state: RegistrationState::Finished,
            job_id: None,
            timestamp: Some(now()),
        })
    }

    async fn update_revocation_list(
        &self,
        rev_reg_def: &RevocationRegistryDefinition,
        _prev_list: &RevocationStatusList,
        _curr_list: &RevocationStatusList,
        revoked: &[u32],
        _options: &RegistrationOptions,
    ) -> RegistrarResult<RevListRegistrationResult> {
        self.published_updates
            .lock()
            .unwrap()
            .push((rev_reg_def.id.to_string(), revoked.to_vec()));

        Ok(RevListRegistrationResult {
            state: RegistrationState::Finished,
            job_id: None,
            timestamp: Some(now()),
        })
    }
}

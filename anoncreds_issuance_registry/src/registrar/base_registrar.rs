use std::str::FromStr;

use anoncreds_issuance_types::data_types::{
    identifiers::rev_reg_def_id::RevocationRegistryDefinitionId,
    ledger::{rev_reg_def::RevocationRegistryDefinition, rev_status_list::RevocationStatusList},
};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::errors::error::{RegistrarError, RegistrarResult};

/// Registration state reported by a registrar for a submitted object.
///
/// `Wait` and `Action` mean the write is still in flight (e.g. awaiting an
/// endorser signature) and the object is only addressable by its job id;
/// `Finished` means the object resolved to its final on-ledger identifier.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RegistrationState {
    Wait,
    Action,
    Finished,
    Failed,
}

impl std::fmt::Display for RegistrationState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = match self {
            Self::Wait => "wait",
            Self::Action => "action",
            Self::Finished => "finished",
            Self::Failed => "failed",
        };
        write!(f, "{state}")
    }
}

impl FromStr for RegistrationState {
    type Err = RegistrarError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "wait" => Ok(Self::Wait),
            "action" => Ok(Self::Action),
            "finished" => Ok(Self::Finished),
            "failed" => Ok(Self::Failed),
            other => Err(RegistrarError::InvalidResponse(format!(
                "unknown registration state: {other}"
            ))),
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct RegistrationOptions {
    /// DID of the transaction endorser, for registries that require
    /// endorsed writes.
    pub endorser_did: Option<String>,
}

#[derive(Clone, Debug)]
pub struct RevRegDefRegistrationResult {
    pub state: RegistrationState,
    /// Temporary handle while the registration is pending; `None` once
    /// (or if) the write finished immediately.
    pub job_id: Option<String>,
    /// Final on-ledger identifier; `None` while pending.
    pub rev_reg_def_id: Option<RevocationRegistryDefinitionId>,
}

#[derive(Clone, Debug)]
pub struct RevListRegistrationResult {
    pub state: RegistrationState,
    pub job_id: Option<String>,
    /// Ledger-anchored time of the published list, when known.
    pub timestamp: Option<u64>,
}

/// Pluggable registrar performing the actual ledger writes for revocation
/// registry definitions and status lists.
#[async_trait]
pub trait BaseRegistrar: std::fmt::Debug + Send + Sync {
    async fn register_revocation_registry_definition(
        &self,
        rev_reg_def: &RevocationRegistryDefinition,
        options: &RegistrationOptions,
    ) -> RegistrarResult<RevRegDefRegistrationResult>;

    async fn register_revocation_list(
        &self,
        rev_reg_def: &RevocationRegistryDefinition,
        rev_list: &RevocationStatusList,
        options: &RegistrationOptions,
    ) -> RegistrarResult<RevListRegistrationResult>;

    async fn update_revocation_list(
        &self,
        rev_reg_def: &RevocationRegistryDefinition,
        prev_list: &RevocationStatusList,
        curr_list: &RevocationStatusList,
        revoked: &[u32],
        options: &RegistrationOptions,
    ) -> RegistrarResult<RevListRegistrationResult>;
}

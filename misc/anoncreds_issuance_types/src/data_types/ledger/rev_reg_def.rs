use std::str::FromStr;

use crate::{
    data_types::identifiers::{
        cred_def_id::CredentialDefinitionId, issuer_id::IssuerId,
        rev_reg_def_id::RevocationRegistryDefinitionId,
    },
    error::ValidationError,
    utils::validation::Validatable,
};

pub const CL_ACCUM: &str = "CL_ACCUM";

#[allow(non_camel_case_types)]
#[derive(Copy, Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub enum RegistryType {
    CL_ACCUM,
}

impl FromStr for RegistryType {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            CL_ACCUM => Ok(Self::CL_ACCUM),
            other => Err(ValidationError::from_msg(format!(
                "Invalid registry type: {other}"
            ))),
        }
    }
}

impl std::fmt::Display for RegistryType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::CL_ACCUM => write!(f, "{CL_ACCUM}"),
        }
    }
}

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RevocationRegistryDefinitionValue {
    pub max_cred_num: u32,
    pub public_keys: serde_json::Value,
    pub tails_hash: String,
    pub tails_location: String,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RevocationRegistryDefinition {
    pub id: RevocationRegistryDefinitionId,
    pub issuer_id: IssuerId,
    pub revoc_def_type: RegistryType,
    pub tag: String,
    pub cred_def_id: CredentialDefinitionId,
    pub value: RevocationRegistryDefinitionValue,
}

impl Validatable for RevocationRegistryDefinition {
    fn validate(&self) -> Result<(), ValidationError> {
        self.cred_def_id.validate()?;
        self.issuer_id.validate()?;

        Ok(())
    }
}

/// Private key material paired 1:1 with a [`RevocationRegistryDefinition`].
/// Opaque to everything but the crypto engine; never transmitted.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct RevocationRegistryDefinitionPrivate {
    pub value: serde_json::Value,
}

/// Lifecycle state of a revocation registry definition.
///
/// `Wait` and `Action` denote a ledger registration still keyed by a job id;
/// `Finished` denotes a resolvable on-ledger identifier. `Full` and
/// `Decommissioned` are terminal issuance states, registries in either are
/// kept for historical credential lookups. The `Display`/`FromStr` strings
/// double as storage tag values.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RevocationRegistryDefinitionState {
    Wait,
    Action,
    Finished,
    Full,
    Decommissioned,
    Failed,
}

impl std::fmt::Display for RevocationRegistryDefinitionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = match self {
            Self::Wait => "wait",
            Self::Action => "action",
            Self::Finished => "finished",
            Self::Full => "full",
            Self::Decommissioned => "decommissioned",
            Self::Failed => "failed",
        };
        write!(f, "{state}")
    }
}

impl FromStr for RevocationRegistryDefinitionState {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "wait" => Ok(Self::Wait),
            "action" => Ok(Self::Action),
            "finished" => Ok(Self::Finished),
            "full" => Ok(Self::Full),
            "decommissioned" => Ok(Self::Decommissioned),
            "failed" => Ok(Self::Failed),
            other => Err(ValidationError::from_msg(format!(
                "Invalid revocation registry state: {other}"
            ))),
        }
    }
}

use std::{collections::BTreeSet, path::Path};

use anoncreds_issuance_types::data_types::{
    identifiers::{issuer_id::IssuerId, rev_reg_def_id::RevocationRegistryDefinitionId},
    ledger::{
        cred_def::{CredentialDefinition, CredentialDefinitionPrivate},
        rev_reg_def::{
            RegistryType, RevocationRegistryDefinition, RevocationRegistryDefinitionPrivate,
        },
        rev_status_list::RevocationStatusList,
    },
    messages::{
        cred_offer::CredentialOffer,
        cred_request::CredentialRequest,
        credential::{Credential, CredentialValues},
    },
};
use async_trait::async_trait;

use crate::errors::error::IssuanceResult;

/// Revocation binding for a credential about to be minted: the registry's
/// public and private halves, the accumulator state to issue against, the
/// reserved one-based index and the local tails file.
#[derive(Debug)]
pub struct CredentialRevocationConfig<'a> {
    pub rev_reg_def: &'a RevocationRegistryDefinition,
    pub rev_reg_def_private: &'a RevocationRegistryDefinitionPrivate,
    pub rev_status_list: &'a RevocationStatusList,
    pub registry_index: u32,
    pub tails_path: &'a Path,
}

/// Opaque AnonCreds primitives. Accumulator creation and update are
/// CPU-bound; implementations are expected to dispatch them off the
/// request-handling path (e.g. `spawn_blocking`) so concurrent intake is
/// not starved.
#[async_trait]
pub trait BaseCryptoEngine: std::fmt::Debug + Send + Sync {
    /// Mint a registry definition plus its private key, writing a fresh
    /// tails file under `tails_dir` and recording its content hash and
    /// (initially local) location in the returned definition.
    async fn create_registry(
        &self,
        cred_def: &CredentialDefinition,
        issuer_id: &IssuerId,
        tag: &str,
        registry_type: RegistryType,
        max_cred_num: u32,
        tails_dir: &Path,
    ) -> IssuanceResult<(
        RevocationRegistryDefinition,
        RevocationRegistryDefinitionPrivate,
    )>;

    /// Mint the initial accumulator over an all-zero bit-vector.
    async fn create_status_list(
        &self,
        cred_def: &CredentialDefinition,
        rev_reg_def_id: &RevocationRegistryDefinitionId,
        rev_reg_def: &RevocationRegistryDefinition,
        rev_reg_def_private: &RevocationRegistryDefinitionPrivate,
        issuer_id: &IssuerId,
    ) -> IssuanceResult<RevocationStatusList>;

    /// Fold `revoked` (one-based indices) into `current_list`, returning new
    /// immutable accumulator state stamped with `timestamp`.
    async fn update_status_list(
        &self,
        cred_def: &CredentialDefinition,
        rev_reg_def: &RevocationRegistryDefinition,
        rev_reg_def_private: &RevocationRegistryDefinitionPrivate,
        current_list: &RevocationStatusList,
        revoked: &BTreeSet<u32>,
        timestamp: u64,
    ) -> IssuanceResult<RevocationStatusList>;

    async fn create_credential(
        &self,
        cred_def: &CredentialDefinition,
        cred_def_private: &CredentialDefinitionPrivate,
        cred_offer: &CredentialOffer,
        cred_request: &CredentialRequest,
        cred_values: &CredentialValues,
        revocation_config: Option<CredentialRevocationConfig<'_>>,
    ) -> IssuanceResult<Credential>;
}

use std::{collections::BTreeSet, path::Path};

use anoncreds_issuance::{
    engine::base_engine::{BaseCryptoEngine, CredentialRevocationConfig},
    errors::error::{IssuanceError, IssuanceResult},
};
use anoncreds_issuance_types::data_types::{
    identifiers::{issuer_id::IssuerId, rev_reg_def_id::RevocationRegistryDefinitionId},
    ledger::{
        cred_def::{CredentialDefinition, CredentialDefinitionPrivate},
        rev_reg_def::{
            RegistryType, RevocationRegistryDefinition, RevocationRegistryDefinitionPrivate,
            RevocationRegistryDefinitionValue,
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
use bitvec::vec::BitVec;
use serde_json::json;
use sha2::{Digest, Sha256};

/// Deterministic, non-cryptographic stand-in for the AnonCreds primitives.
///
/// Registry ids are derived from the issuer and tag, the tails file is real
/// (content-addressed by an actual SHA-256 digest, so the tails manager's
/// verification works against it), and accumulator values chain
/// deterministically so concurrent-update tests can compare states.
#[derive(Debug, Default)]
pub struct MockCryptoEngine;

fn mock_accumulator(seed: &str) -> String {
    let digest = Sha256::digest(seed.as_bytes());
    format!("21 {}", bs58::encode(&digest[..16]).into_string())
}

#[async_trait]
impl BaseCryptoEngine for MockCryptoEngine {
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
    )> {
        let id = RevocationRegistryDefinitionId::new_unchecked(format!(
            "{issuer_id}/rev-reg/{tag}"
        ));

        let tails_content = format!("tails:{id}:{max_cred_num}").into_bytes();
        let tails_hash = bs58::encode(Sha256::digest(&tails_content)).into_string();
        tokio::fs::create_dir_all(tails_dir).await?;
        let tails_path = tails_dir.join(&tails_hash);
        tokio::fs::write(&tails_path, &tails_content).await?;

        let rev_reg_def = RevocationRegistryDefinition {
            id,
            issuer_id: issuer_id.clone(),
            revoc_def_type: registry_type,
            tag: tag.to_string(),
            cred_def_id: cred_def.id.clone(),
            value: RevocationRegistryDefinitionValue {
                max_cred_num,
                public_keys: json!({ "accumKey": { "z": mock_accumulator(tag) } }),
                tails_hash,
                tails_location: tails_path.display().to_string(),
            },
        };
        let private = RevocationRegistryDefinitionPrivate {
            value: json!({ "gamma": format!("mock-gamma-{tag}") }),
        };
        Ok((rev_reg_def, private))
    }

    async fn create_status_list(
        &self,
        _cred_def: &CredentialDefinition,
        rev_reg_def_id: &RevocationRegistryDefinitionId,
        rev_reg_def: &RevocationRegistryDefinition,
        _rev_reg_def_private: &RevocationRegistryDefinitionPrivate,
        issuer_id: &IssuerId,
    ) -> IssuanceResult<RevocationStatusList> {
        let mut revocation_list = BitVec::new();
        revocation_list.resize(rev_reg_def.value.max_cred_num as usize, false);
        Ok(RevocationStatusList::new(
            rev_reg_def_id.clone(),
            issuer_id.clone(),
            revocation_list,
            mock_accumulator(&format!("init:{rev_reg_def_id}")),
            0,
        ))
    }

    async fn update_status_list(
        &self,
        _cred_def: &CredentialDefinition,
        rev_reg_def: &RevocationRegistryDefinition,
        _rev_reg_def_private: &RevocationRegistryDefinitionPrivate,
        current_list: &RevocationStatusList,
        revoked: &BTreeSet<u32>,
        timestamp: u64,
    ) -> IssuanceResult<RevocationStatusList> {
        for crid in revoked {
            if *crid == 0 || *crid > rev_reg_def.value.max_cred_num {
                return Err(IssuanceError::Engine(format!(
                    "revocation index {crid} outside registry capacity"
                )));
            }
        }

        let mut next = current_list.clone();
        for crid in revoked {
            next.set_revoked(*crid);
        }
        next.current_accumulator = mock_accumulator(&format!(
            "{}|{revoked:?}",
            current_list.current_accumulator
        ));
        next.timestamp = timestamp;
        Ok(next)
    }

    async fn create_credential(
        &self,
        cred_def: &CredentialDefinition,
        _cred_def_private: &CredentialDefinitionPrivate,
        _cred_offer: &CredentialOffer,
        _cred_request: &CredentialRequest,
        cred_values: &CredentialValues,
        revocation_config: Option<CredentialRevocationConfig<'_>>,
    ) -> IssuanceResult<Credential> {
        let revocation = match revocation_config {
            Some(config) => {
                if !config.tails_path.exists() {
                    return Err(IssuanceError::Engine(format!(
                        "tails file missing at {}",
                        config.tails_path.display()
                    )));
                }
                json!({
                    "rev_reg_id": config.rev_reg_def.id.to_string(),
                    "cred_rev_id": config.registry_index,
                    "accum": config.rev_status_list.current_accumulator,
                })
            }
            None => serde_json::Value::Null,
        };

        Ok(Credential(json!({
            "cred_def_id": cred_def.id.to_string(),
            "values": serde_json::to_value(cred_values)?,
            "signature": { "p_credential": "mock", "r_credential": revocation },
        })))
    }
}

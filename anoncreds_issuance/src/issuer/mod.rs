use std::sync::Arc;

use anoncreds_issuance_store::store::base_store::{
    record_category::RecordCategory, BaseStore, StoreTransaction,
};
use anoncreds_issuance_types::data_types::{
    identifiers::{cred_def_id::CredentialDefinitionId, rev_reg_def_id::RevocationRegistryDefinitionId},
    ledger::{
        cred_def::{CredentialDefinition, CredentialDefinitionPrivate},
        rev_reg_def::{RevocationRegistryDefinition, RevocationRegistryDefinitionPrivate},
        rev_status_list::RevocationStatusList,
    },
    messages::{
        cred_offer::CredentialOffer,
        cred_request::CredentialRequest,
        credential::{Credential, CredentialValues},
    },
};
use uuid::Uuid;

use crate::{
    engine::base_engine::{BaseCryptoEngine, CredentialRevocationConfig},
    errors::error::{IssuanceError, IssuanceResult},
    revocation::{
        records::{fetch_required, IssuerCredRevRecord, RevListRecord},
        registry::RevocationRegistryManager,
    },
    tails::TailsManager,
    utils::retry::{retry, ISSUANCE_RETRY},
};

/// Inputs of one revocable credential issuance.
#[derive(Clone, Debug)]
pub struct CredentialIssuanceRequest {
    pub cred_def_id: CredentialDefinitionId,
    pub cred_offer: CredentialOffer,
    pub cred_request: CredentialRequest,
    pub cred_values: CredentialValues,
    /// Credential-exchange identifier used to key the issued-credential
    /// record; generated when absent.
    pub cred_ex_id: Option<String>,
}

#[derive(Clone, Debug)]
pub struct IssuedCredential {
    pub credential: Credential,
    pub cred_ex_id: String,
    pub rev_reg_def_id: RevocationRegistryDefinitionId,
    pub cred_rev_id: u32,
}

/// Reserved registry slot plus the snapshot of registry state the
/// credential will be minted against, taken under the allocation lock.
#[derive(Debug)]
pub struct IndexAllocation {
    pub index: u32,
    pub rev_reg_def: RevocationRegistryDefinition,
    pub rev_reg_def_private: RevocationRegistryDefinitionPrivate,
    pub rev_list: RevocationStatusList,
}

/// Coordinates revocable credential issuance: resolves the active registry,
/// reserves a revocation index under a single-writer transaction, mints the
/// credential outside the lock, and triggers rotation when a registry
/// fills.
#[derive(Debug)]
pub struct CredentialIssuer {
    store: Arc<dyn BaseStore>,
    engine: Arc<dyn BaseCryptoEngine>,
    registries: Arc<RevocationRegistryManager>,
    tails: Arc<TailsManager>,
}

impl CredentialIssuer {
    pub fn new(
        store: Arc<dyn BaseStore>,
        engine: Arc<dyn BaseCryptoEngine>,
        registries: Arc<RevocationRegistryManager>,
        tails: Arc<TailsManager>,
    ) -> Self {
        Self {
            store,
            engine,
            registries,
            tails,
        }
    }

    /// Issue a revocable credential against the credential definition's
    /// active registry.
    ///
    /// Races where a concurrent issuer fills the registry, or the active
    /// registry changes between resolution and reservation, surface as
    /// retryable errors; each attempt re-resolves the active registry so
    /// registry identity and allocated slot are always consistent within
    /// one attempt. Exhausting the budget fails with a `Revocation` error
    /// naming the credential definition.
    pub async fn create_credential(
        &self,
        request: &CredentialIssuanceRequest,
    ) -> IssuanceResult<IssuedCredential> {
        trace!(
            "CredentialIssuer::create_credential >>> cred_def_id: {}",
            request.cred_def_id
        );

        let issued = retry(
            ISSUANCE_RETRY,
            |err| {
                matches!(
                    err,
                    IssuanceError::RevocationRegistryFull(_) | IssuanceError::DuplicateRecord(_)
                )
            },
            |attempt| async move { self.try_create_credential(request, attempt).await },
        )
        .await;

        match issued {
            Err(IssuanceError::RevocationRegistryFull(_)) => {
                Err(IssuanceError::Revocation(format!(
                    "issuance retries exhausted for credential definition {}",
                    request.cred_def_id
                )))
            }
            other => other,
        }
    }

    async fn try_create_credential(
        &self,
        request: &CredentialIssuanceRequest,
        attempt: u32,
    ) -> IssuanceResult<IssuedCredential> {
        // re-resolved every attempt: rotation is discovered through the
        // full error, not a pre-check
        let active = self.registries.get_active_registry(&request.cred_def_id).await?;
        let rev_reg_def_id = active.rev_reg_def_id();
        debug!(
            "try_create_credential >>> attempt {attempt} against registry {rev_reg_def_id}"
        );

        let allocation = match self.allocate_index(&rev_reg_def_id).await {
            Ok(allocation) => allocation,
            Err(err @ IssuanceError::RevocationRegistryFull(_)) => {
                warn!("try_create_credential >>> {err}");
                if let Err(rotate_err) =
                    self.registries.handle_full_registry(&rev_reg_def_id).await
                {
                    warn!(
                        "try_create_credential >>> rotation of {rev_reg_def_id} failed: \
                         {rotate_err}"
                    );
                }
                return Err(err);
            }
            Err(err) => return Err(err),
        };

        let (cred_def, cred_def_private) = self.load_cred_def(&request.cred_def_id).await?;
        let tails_path = self.tails.local_path(&allocation.rev_reg_def);

        let revocation_config = CredentialRevocationConfig {
            rev_reg_def: &allocation.rev_reg_def,
            rev_reg_def_private: &allocation.rev_reg_def_private,
            rev_status_list: &allocation.rev_list,
            registry_index: allocation.index,
            tails_path: &tails_path,
        };
        let credential = self
            .engine
            .create_credential(
                &cred_def,
                &cred_def_private,
                &request.cred_offer,
                &request.cred_request,
                &request.cred_values,
                Some(revocation_config),
            )
            .await?;

        // the slot just consumed was the final one: rotate now so
        // subsequent callers are routed elsewhere
        if allocation.index >= allocation.rev_reg_def.value.max_cred_num {
            info!(
                "try_create_credential >>> registry {rev_reg_def_id} consumed its final slot, \
                 rotating"
            );
            if let Err(err) = self.registries.handle_full_registry(&rev_reg_def_id).await {
                warn!("try_create_credential >>> rotation of {rev_reg_def_id} failed: {err}");
            }
        }

        let cred_ex_id = request
            .cred_ex_id
            .clone()
            .unwrap_or_else(|| Uuid::new_v4().to_string());
        let cred_rev_record =
            IssuerCredRevRecord::new(cred_ex_id.clone(), rev_reg_def_id.clone(), allocation.index);

        let mut txn = self.store.transaction().await.map_err(|err| {
            IssuanceError::from_store("failed to open store transaction", err)
        })?;
        txn.insert(cred_rev_record.to_record()?).await.map_err(|err| {
            IssuanceError::from_store(
                format!("failed to store issued-credential record {cred_ex_id}"),
                err,
            )
        })?;
        txn.commit().await.map_err(|err| {
            IssuanceError::from_store("failed to commit issued-credential record", err)
        })?;

        info!(
            "try_create_credential <<< issued credential {cred_ex_id} with revocation id {} in \
             {rev_reg_def_id}",
            allocation.index
        );

        Ok(IssuedCredential {
            credential,
            cred_ex_id,
            rev_reg_def_id,
            cred_rev_id: allocation.index,
        })
    }

    /// Reserve the next revocation index of a registry.
    ///
    /// One transaction fetches the list, definition and private-key rows
    /// exclusively, checks the cursor against capacity, and writes the
    /// incremented cursor back before any cryptographic work happens. A
    /// reserved-but-unused index (when the later credential creation fails)
    /// is an accepted cost; the same index can never be handed out twice.
    pub async fn allocate_index(
        &self,
        rev_reg_def_id: &RevocationRegistryDefinitionId,
    ) -> IssuanceResult<IndexAllocation> {
        let mut txn = self.store.transaction().await.map_err(|err| {
            IssuanceError::from_store("failed to open store transaction", err)
        })?;

        let list_record =
            fetch_required(&mut *txn, RecordCategory::RevList, &rev_reg_def_id.0, true).await?;
        let def_record =
            fetch_required(&mut *txn, RecordCategory::RevRegDef, &rev_reg_def_id.0, true).await?;
        let priv_record =
            fetch_required(&mut *txn, RecordCategory::RevRegDefPriv, &rev_reg_def_id.0, true)
                .await?;

        let mut list = RevListRecord::from_record(&list_record)?;
        let def = crate::revocation::records::RevRegDefRecord::from_record(&def_record)?;
        let rev_reg_def_private: RevocationRegistryDefinitionPrivate =
            serde_json::from_str(priv_record.value())?;

        let max_cred_num = def.rev_reg_def.value.max_cred_num;
        if list.next_index > max_cred_num {
            // dropping the transaction releases the row locks
            return Err(IssuanceError::RevocationRegistryFull(format!(
                "revocation registry {rev_reg_def_id} is full ({max_cred_num} slots)"
            )));
        }

        let index = list.next_index;
        list.next_index += 1;
        txn.replace(list.to_record(&rev_reg_def_id.0)?)
            .await
            .map_err(|err| {
                IssuanceError::from_store("failed to reserve revocation index", err)
            })?;
        txn.commit().await.map_err(|err| {
            IssuanceError::from_store("failed to commit index reservation", err)
        })?;

        debug!("allocate_index <<< reserved index {index} in {rev_reg_def_id}");
        Ok(IndexAllocation {
            index,
            rev_reg_def: def.rev_reg_def,
            rev_reg_def_private,
            rev_list: list.rev_list,
        })
    }

    async fn load_cred_def(
        &self,
        cred_def_id: &CredentialDefinitionId,
    ) -> IssuanceResult<(CredentialDefinition, CredentialDefinitionPrivate)> {
        let mut session = self.store.session().await.map_err(|err| {
            IssuanceError::from_store("failed to open store session", err)
        })?;
        let cred_def_record = fetch_required(
            session.as_mut(),
            RecordCategory::CredDef,
            &cred_def_id.0,
            false,
        )
        .await?;
        let cred_def_priv_record = fetch_required(
            session.as_mut(),
            RecordCategory::CredDefPriv,
            &cred_def_id.0,
            false,
        )
        .await?;
        Ok((
            serde_json::from_str(cred_def_record.value())?,
            serde_json::from_str(cred_def_priv_record.value())?,
        ))
    }
}

use std::sync::Arc;

use anoncreds_issuance_registry::registrar::base_registrar::{
    BaseRegistrar, RegistrationOptions, RegistrationState,
};
use anoncreds_issuance_store::store::{
    base_store::{record_category::RecordCategory, BaseStore, StoreSession, StoreTransaction},
    record_tags::{RecordTag, RecordTags},
};
use anoncreds_issuance_types::data_types::{
    identifiers::rev_reg_def_id::RevocationRegistryDefinitionId,
    ledger::{
        cred_def::CredentialDefinition,
        rev_reg_def::{RevocationRegistryDefinition, RevocationRegistryDefinitionPrivate},
    },
};

use crate::{
    engine::base_engine::BaseCryptoEngine,
    errors::error::{IssuanceError, IssuanceResult},
    events::{BaseEventNotifier, IssuanceEvent},
    revocation::records::{fetch_required, RevListRecord, TAG_PENDING},
};

/// Creates and incrementally maintains the accumulator-backed revocation
/// list of a registry: the pending (locally revoked, unpublished) index set
/// and the published bit-vector.
#[derive(Debug)]
pub struct RevocationListManager {
    store: Arc<dyn BaseStore>,
    engine: Arc<dyn BaseCryptoEngine>,
    registrar: Arc<dyn BaseRegistrar>,
    notifier: Arc<dyn BaseEventNotifier>,
}

impl RevocationListManager {
    pub fn new(
        store: Arc<dyn BaseStore>,
        engine: Arc<dyn BaseCryptoEngine>,
        registrar: Arc<dyn BaseRegistrar>,
        notifier: Arc<dyn BaseEventNotifier>,
    ) -> Self {
        Self {
            store,
            engine,
            registrar,
            notifier,
        }
    }

    /// Mint the initial all-zero status list for a finished registry,
    /// submit it for registration and persist it with `next_index` starting
    /// at 1.
    ///
    /// The one-based cursor aligns with the credential-revocation-id
    /// convention of the issuance path even though the underlying
    /// bit-vector is zero-based; index `i` corresponds to bit `i - 1`.
    pub async fn create_and_register(
        &self,
        rev_reg_def_id: &RevocationRegistryDefinitionId,
    ) -> IssuanceResult<RevListRecord> {
        trace!("RevocationListManager::create_and_register >>> {rev_reg_def_id}");

        let (rev_reg_def, rev_reg_def_private, cred_def) =
            self.load_registry_parts(rev_reg_def_id).await?;

        let mut rev_list = self
            .engine
            .create_status_list(
                &cred_def,
                rev_reg_def_id,
                &rev_reg_def,
                &rev_reg_def_private,
                &rev_reg_def.issuer_id,
            )
            .await?;

        let registration = self
            .registrar
            .register_revocation_list(&rev_reg_def, &rev_list, &RegistrationOptions::default())
            .await
            .map_err(|err| {
                IssuanceError::from_registrar(
                    format!("failed to register revocation list for {rev_reg_def_id}"),
                    err,
                )
            })?;
        if registration.state == RegistrationState::Failed {
            return Err(IssuanceError::Revocation(format!(
                "registration of revocation list failed for registry {rev_reg_def_id}"
            )));
        }
        if let Some(timestamp) = registration.timestamp {
            rev_list.timestamp = timestamp;
        }

        let record = RevListRecord::new(rev_list);

        let mut txn = self.store.transaction().await.map_err(|err| {
            IssuanceError::from_store("failed to open store transaction", err)
        })?;
        txn.insert(record.to_record(&rev_reg_def_id.0)?)
            .await
            .map_err(|err| {
                IssuanceError::from_store(
                    format!("failed to store revocation list {rev_reg_def_id}"),
                    err,
                )
            })?;
        txn.commit().await.map_err(|err| {
            IssuanceError::from_store("failed to commit revocation list", err)
        })?;

        info!("RevocationListManager::create_and_register <<< stored list for {rev_reg_def_id}");

        if let Err(err) = self
            .notifier
            .notify(IssuanceEvent::RevocationListFinished {
                rev_reg_def_id: rev_reg_def_id.clone(),
            })
            .await
        {
            warn!("create_and_register >>> notifier failed: {err}");
        }

        Ok(record)
    }

    /// Append credential revocation ids to the pending set under an
    /// exclusive read-modify-write. Ids already pending are kept once.
    pub async fn mark_pending(
        &self,
        rev_reg_def_id: &RevocationRegistryDefinitionId,
        crids: &[u32],
    ) -> IssuanceResult<()> {
        trace!("RevocationListManager::mark_pending >>> {rev_reg_def_id}, crids: {crids:?}");

        let mut txn = self.store.transaction().await.map_err(|err| {
            IssuanceError::from_store("failed to open store transaction", err)
        })?;
        let record =
            fetch_required(&mut *txn, RecordCategory::RevList, &rev_reg_def_id.0, true).await?;
        let mut list = RevListRecord::from_record(&record)?;

        let mut pending = list.pending_crids();
        for crid in crids {
            if !pending.contains(crid) {
                pending.push(*crid);
            }
        }
        list.set_pending(pending);

        txn.replace(list.to_record(&rev_reg_def_id.0)?)
            .await
            .map_err(|err| IssuanceError::from_store("failed to store pending set", err))?;
        txn.commit()
            .await
            .map_err(|err| IssuanceError::from_store("failed to commit pending set", err))?;
        Ok(())
    }

    /// Remove the masked ids (or all, when `crid_mask` is `None`) from the
    /// pending set, within the caller's transaction.
    pub async fn clear_pending(
        txn: &mut dyn StoreTransaction,
        rev_reg_def_id: &RevocationRegistryDefinitionId,
        crid_mask: Option<&[u32]>,
    ) -> IssuanceResult<()> {
        let record =
            fetch_required(txn, RecordCategory::RevList, &rev_reg_def_id.0, true).await?;
        let mut list = RevListRecord::from_record(&record)?;

        let pending = match crid_mask {
            None => Vec::new(),
            Some(mask) => list
                .pending_crids()
                .into_iter()
                .filter(|crid| !mask.contains(crid))
                .collect(),
        };
        list.set_pending(pending);

        txn.replace(list.to_record(&rev_reg_def_id.0)?)
            .await
            .map_err(|err| IssuanceError::from_store("failed to clear pending set", err))?;
        Ok(())
    }

    pub async fn get_pending(
        &self,
        rev_reg_def_id: &RevocationRegistryDefinitionId,
    ) -> IssuanceResult<Vec<u32>> {
        Ok(self.get_revocation_list(rev_reg_def_id).await?.pending_crids())
    }

    pub async fn get_revocation_list(
        &self,
        rev_reg_def_id: &RevocationRegistryDefinitionId,
    ) -> IssuanceResult<RevListRecord> {
        let mut session = self.store.session().await.map_err(|err| {
            IssuanceError::from_store("failed to open store session", err)
        })?;
        let record = fetch_required(
            session.as_mut(),
            RecordCategory::RevList,
            &rev_reg_def_id.0,
            false,
        )
        .await?;
        RevListRecord::from_record(&record)
    }

    /// Registries with at least one locally revoked, unpublished index.
    pub async fn get_lists_with_pending(
        &self,
    ) -> IssuanceResult<Vec<RevocationRegistryDefinitionId>> {
        let filter = RecordTags::new(vec![RecordTag::new(TAG_PENDING, "true")]);

        let mut session = self.store.session().await.map_err(|err| {
            IssuanceError::from_store("failed to open store session", err)
        })?;
        let records = session
            .fetch_all(RecordCategory::RevList, Some(&filter), None, false)
            .await
            .map_err(|err| IssuanceError::from_store("failed to query pending lists", err))?;

        Ok(records
            .iter()
            .map(|record| RevocationRegistryDefinitionId::new_unchecked(record.name()))
            .collect())
    }

    pub(crate) async fn load_registry_parts(
        &self,
        rev_reg_def_id: &RevocationRegistryDefinitionId,
    ) -> IssuanceResult<(
        RevocationRegistryDefinition,
        RevocationRegistryDefinitionPrivate,
        CredentialDefinition,
    )> {
        let mut session = self.store.session().await.map_err(|err| {
            IssuanceError::from_store("failed to open store session", err)
        })?;

        let def_record = fetch_required(
            session.as_mut(),
            RecordCategory::RevRegDef,
            &rev_reg_def_id.0,
            false,
        )
        .await?;
        let def = crate::revocation::records::RevRegDefRecord::from_record(&def_record)?;

        let priv_record = fetch_required(
            session.as_mut(),
            RecordCategory::RevRegDefPriv,
            &rev_reg_def_id.0,
            false,
        )
        .await?;
        let rev_reg_def_private: RevocationRegistryDefinitionPrivate =
            serde_json::from_str(priv_record.value())?;

        let cred_def_record = fetch_required(
            session.as_mut(),
            RecordCategory::CredDef,
            &def.rev_reg_def.cred_def_id.0,
            false,
        )
        .await?;
        let cred_def: CredentialDefinition = serde_json::from_str(cred_def_record.value())?;

        Ok((def.rev_reg_def, rev_reg_def_private, cred_def))
    }
}

use std::sync::Arc;

use anoncreds_issuance_registry::registrar::base_registrar::{
    BaseRegistrar, RegistrationOptions, RegistrationState,
};
use anoncreds_issuance_store::store::{
    base_store::{record::Record, record_category::RecordCategory, BaseStore, StoreSession, StoreTransaction},
    record_tags::{RecordTag, RecordTags},
};
use anoncreds_issuance_types::data_types::{
    identifiers::{
        cred_def_id::CredentialDefinitionId, issuer_id::IssuerId,
        rev_reg_def_id::RevocationRegistryDefinitionId,
    },
    ledger::{
        cred_def::CredentialDefinition,
        rev_reg_def::{
            RegistryType, RevocationRegistryDefinition, RevocationRegistryDefinitionPrivate,
            RevocationRegistryDefinitionState,
        },
    },
};
use uuid::Uuid;

use crate::{
    config::IssuanceConfig,
    engine::base_engine::BaseCryptoEngine,
    errors::error::{IssuanceError, IssuanceResult},
    events::{BaseEventNotifier, IssuanceEvent},
    revocation::records::{
        fetch_required, RevRegDefRecord, TAG_ACTIVE, TAG_CRED_DEF_ID, TAG_STATE,
    },
};

/// Outcome of creating or resolving a revocation registry definition. While
/// registration with the ledger is pending the record is only addressable
/// by `job_id`; `key` is whichever of the two identifiers the record is
/// stored under.
#[derive(Clone, Debug)]
pub struct RevRegDefResult {
    pub key: String,
    pub job_id: Option<String>,
    pub rev_reg_def: RevocationRegistryDefinition,
    pub state: RevocationRegistryDefinitionState,
    pub active: bool,
}

impl RevRegDefResult {
    pub fn rev_reg_def_id(&self) -> RevocationRegistryDefinitionId {
        self.rev_reg_def.id.clone()
    }
}

/// Creates, activates, rotates and decommissions revocation registry
/// definitions, and tracks their fill state.
///
/// At most one registry per credential definition should be `active` at a
/// time; the flag is advisory (best-effort single-writer through the store
/// transaction), not a hard ledger constraint.
#[derive(Debug)]
pub struct RevocationRegistryManager {
    store: Arc<dyn BaseStore>,
    engine: Arc<dyn BaseCryptoEngine>,
    registrar: Arc<dyn BaseRegistrar>,
    notifier: Arc<dyn BaseEventNotifier>,
    config: IssuanceConfig,
}

impl RevocationRegistryManager {
    pub fn new(
        store: Arc<dyn BaseStore>,
        engine: Arc<dyn BaseCryptoEngine>,
        registrar: Arc<dyn BaseRegistrar>,
        notifier: Arc<dyn BaseEventNotifier>,
        config: IssuanceConfig,
    ) -> Self {
        Self {
            store,
            engine,
            registrar,
            notifier,
            config,
        }
    }

    async fn emit(&self, event: IssuanceEvent) {
        if let Err(err) = self.notifier.notify(event).await {
            warn!("RevocationRegistryManager::emit >>> notifier failed: {err}");
        }
    }

    async fn load_cred_def(
        &self,
        cred_def_id: &CredentialDefinitionId,
    ) -> IssuanceResult<CredentialDefinition> {
        let mut session = self.store.session().await.map_err(|err| {
            IssuanceError::from_store("failed to open store session", err)
        })?;
        let record = fetch_required(
            session.as_mut(),
            RecordCategory::CredDef,
            &cred_def_id.0,
            false,
        )
        .await?;
        serde_json::from_str(record.value()).map_err(IssuanceError::from)
    }

    /// Create a registry definition (with a fresh local tails file), submit
    /// it for registration, and persist definition plus private key in one
    /// transaction, keyed by the final id or, while registration is
    /// pending, by the registrar's job id.
    pub async fn create_and_register(
        &self,
        issuer_id: &IssuerId,
        cred_def_id: &CredentialDefinitionId,
        registry_type: RegistryType,
        tag: &str,
        max_cred_num: u32,
    ) -> IssuanceResult<RevRegDefResult> {
        trace!(
            "RevocationRegistryManager::create_and_register >>> issuer_id: {issuer_id}, \
             cred_def_id: {cred_def_id}, tag: {tag}, max_cred_num: {max_cred_num}"
        );

        let cred_def = self.load_cred_def(cred_def_id).await?;

        let (mut rev_reg_def, rev_reg_def_private) = self
            .engine
            .create_registry(
                &cred_def,
                issuer_id,
                tag,
                registry_type,
                max_cred_num,
                self.config.tails_dir(),
            )
            .await?;

        // publish under the distribution URI, not the local path the engine
        // wrote the tails file to
        rev_reg_def.value.tails_location = self
            .config
            .public_tails_uri(&rev_reg_def.value.tails_hash)?;

        let registration = self
            .registrar
            .register_revocation_registry_definition(&rev_reg_def, &RegistrationOptions::default())
            .await
            .map_err(|err| {
                IssuanceError::from_registrar(
                    format!("failed to register revocation registry definition for {cred_def_id}"),
                    err,
                )
            })?;

        let (state, key, job_id) = match registration.state {
            RegistrationState::Finished => {
                if let Some(id) = registration.rev_reg_def_id {
                    rev_reg_def.id = id;
                }
                (
                    RevocationRegistryDefinitionState::Finished,
                    rev_reg_def.id.to_string(),
                    None,
                )
            }
            RegistrationState::Wait | RegistrationState::Action => {
                let job_id = registration.job_id.ok_or_else(|| {
                    IssuanceError::InvalidInput(
                        "registrar reported a pending registration without a job id".into(),
                    )
                })?;
                let state = if registration.state == RegistrationState::Wait {
                    RevocationRegistryDefinitionState::Wait
                } else {
                    RevocationRegistryDefinitionState::Action
                };
                (state, job_id.clone(), Some(job_id))
            }
            RegistrationState::Failed => {
                return Err(IssuanceError::Revocation(format!(
                    "registration of revocation registry definition failed for credential \
                     definition {cred_def_id}"
                )))
            }
        };

        let def_record = RevRegDefRecord::new(rev_reg_def.clone(), state);

        let mut txn = self.store.transaction().await.map_err(|err| {
            IssuanceError::from_store("failed to open store transaction", err)
        })?;
        txn.insert(def_record.to_record(&key)?).await.map_err(|err| {
            IssuanceError::from_store(
                format!("failed to store revocation registry definition {key}"),
                err,
            )
        })?;
        txn.insert(private_key_record(&key, &rev_reg_def_private, state)?)
            .await
            .map_err(|err| {
                IssuanceError::from_store(
                    format!("failed to store revocation registry private key {key}"),
                    err,
                )
            })?;
        txn.commit().await.map_err(|err| {
            IssuanceError::from_store("failed to commit revocation registry definition", err)
        })?;

        info!(
            "RevocationRegistryManager::create_and_register <<< stored registry {key} in state \
             {state}"
        );

        if state == RevocationRegistryDefinitionState::Finished {
            self.emit(IssuanceEvent::RevocationRegistryDefinitionFinished {
                cred_def_id: cred_def_id.clone(),
                rev_reg_def_id: rev_reg_def.id.clone(),
            })
            .await;
        }

        Ok(RevRegDefResult {
            key,
            job_id,
            rev_reg_def,
            state,
            active: false,
        })
    }

    /// Atomically move the definition and private key from the `job_id` key
    /// to the resolved `rev_reg_def_id`, tagging the definition `finished`.
    ///
    /// A second call after success fails with `NotFound`, like any call for
    /// an unknown job id; completion is not idempotent.
    pub async fn finish_registration(
        &self,
        job_id: &str,
        rev_reg_def_id: &RevocationRegistryDefinitionId,
    ) -> IssuanceResult<RevRegDefResult> {
        trace!(
            "RevocationRegistryManager::finish_registration >>> job_id: {job_id}, \
             rev_reg_def_id: {rev_reg_def_id}"
        );

        let mut txn = self.store.transaction().await.map_err(|err| {
            IssuanceError::from_store("failed to open store transaction", err)
        })?;

        let def_record =
            fetch_required(&mut *txn, RecordCategory::RevRegDef, job_id, true).await?;
        let priv_record =
            fetch_required(&mut *txn, RecordCategory::RevRegDefPriv, job_id, true).await?;

        let mut def = RevRegDefRecord::from_record(&def_record)?;
        def.rev_reg_def.id = rev_reg_def_id.clone();
        def.state = RevocationRegistryDefinitionState::Finished;

        let mut priv_moved = priv_record.clone();
        priv_moved.set_name(rev_reg_def_id.to_string());

        txn.remove(RecordCategory::RevRegDef, job_id)
            .await
            .map_err(|err| IssuanceError::from_store("failed to re-key definition", err))?;
        txn.remove(RecordCategory::RevRegDefPriv, job_id)
            .await
            .map_err(|err| IssuanceError::from_store("failed to re-key private key", err))?;
        txn.insert(def.to_record(&rev_reg_def_id.0)?)
            .await
            .map_err(|err| IssuanceError::from_store("failed to re-key definition", err))?;
        txn.insert(priv_moved)
            .await
            .map_err(|err| IssuanceError::from_store("failed to re-key private key", err))?;
        txn.commit()
            .await
            .map_err(|err| IssuanceError::from_store("failed to commit re-keyed registry", err))?;

        self.emit(IssuanceEvent::RevocationRegistryDefinitionFinished {
            cred_def_id: def.rev_reg_def.cred_def_id.clone(),
            rev_reg_def_id: rev_reg_def_id.clone(),
        })
        .await;

        Ok(RevRegDefResult {
            key: rev_reg_def_id.to_string(),
            job_id: None,
            rev_reg_def: def.rev_reg_def,
            state: def.state,
            active: def.active,
        })
    }

    /// Make `rev_reg_def_id` the active registry for its credential
    /// definition, demoting every sibling currently tagged active, in one
    /// transaction.
    ///
    /// If the target is already active this is a no-op; sibling actives are
    /// not corrected in that branch, only logged as an anomaly.
    pub async fn set_active_registry(
        &self,
        rev_reg_def_id: &RevocationRegistryDefinitionId,
    ) -> IssuanceResult<()> {
        trace!("RevocationRegistryManager::set_active_registry >>> {rev_reg_def_id}");

        let mut txn = self.store.transaction().await.map_err(|err| {
            IssuanceError::from_store("failed to open store transaction", err)
        })?;

        let target_record =
            fetch_required(&mut *txn, RecordCategory::RevRegDef, &rev_reg_def_id.0, true).await?;
        let mut target = RevRegDefRecord::from_record(&target_record)?;

        let active_filter = RecordTags::new(vec![
            RecordTag::new(TAG_CRED_DEF_ID, &target.rev_reg_def.cred_def_id.0),
            RecordTag::new(TAG_ACTIVE, "true"),
        ]);

        if target.active {
            let actives = txn
                .fetch_all(RecordCategory::RevRegDef, Some(&active_filter), None, false)
                .await
                .map_err(|err| {
                    IssuanceError::from_store("failed to query active registries", err)
                })?;
            if actives.len() > 1 {
                warn!(
                    "set_active_registry >>> {} registries tagged active for credential \
                     definition {}, target {rev_reg_def_id} already among them",
                    actives.len(),
                    target.rev_reg_def.cred_def_id
                );
            }
            return Ok(());
        }

        let siblings = txn
            .fetch_all(RecordCategory::RevRegDef, Some(&active_filter), None, true)
            .await
            .map_err(|err| IssuanceError::from_store("failed to query active registries", err))?;
        for sibling in siblings {
            let mut record = RevRegDefRecord::from_record(&sibling)?;
            record.active = false;
            txn.replace(record.to_record(sibling.name())?)
                .await
                .map_err(|err| {
                    IssuanceError::from_store("failed to demote active registry", err)
                })?;
        }

        target.active = true;
        txn.replace(target.to_record(&rev_reg_def_id.0)?)
            .await
            .map_err(|err| IssuanceError::from_store("failed to promote registry", err))?;
        txn.commit()
            .await
            .map_err(|err| IssuanceError::from_store("failed to commit activation", err))?;

        info!("set_active_registry <<< {rev_reg_def_id} is now active");
        Ok(())
    }

    /// Rotate away from a registry that has reached capacity: promote a
    /// pre-provisioned backup, mark the full registry `full`, then create a
    /// replacement backup so the *next* full event also finds one.
    ///
    /// Fails fast with a `Revocation` error when no backup exists; a full
    /// registry must not grow a new sibling synchronously on the issuance
    /// path.
    pub async fn handle_full_registry(
        &self,
        rev_reg_def_id: &RevocationRegistryDefinitionId,
    ) -> IssuanceResult<RevRegDefResult> {
        trace!("RevocationRegistryManager::handle_full_registry >>> {rev_reg_def_id}");

        let mut session = self.store.session().await.map_err(|err| {
            IssuanceError::from_store("failed to open store session", err)
        })?;
        let full_record = fetch_required(
            session.as_mut(),
            RecordCategory::RevRegDef,
            &rev_reg_def_id.0,
            false,
        )
        .await?;
        let full = RevRegDefRecord::from_record(&full_record)?;
        let cred_def_id = full.rev_reg_def.cred_def_id.clone();

        let backup_filter = RecordTags::new(vec![
            RecordTag::new(TAG_CRED_DEF_ID, &cred_def_id.0),
            RecordTag::new(
                TAG_STATE,
                &RevocationRegistryDefinitionState::Finished.to_string(),
            ),
            RecordTag::new(TAG_ACTIVE, "false"),
        ]);
        let backups = session
            .fetch_all(RecordCategory::RevRegDef, Some(&backup_filter), None, false)
            .await
            .map_err(|err| IssuanceError::from_store("failed to query backup registries", err))?;
        drop(session);

        let backup = backups
            .into_iter()
            .find(|record| record.name() != rev_reg_def_id.0)
            .ok_or_else(|| {
                IssuanceError::Revocation(format!(
                    "no backup registry available for credential definition {cred_def_id}"
                ))
            })?;
        let backup_id = RevocationRegistryDefinitionId::new_unchecked(backup.name());
        let backup_def = RevRegDefRecord::from_record(&backup)?;

        self.set_active_registry(&backup_id).await?;

        let mut txn = self.store.transaction().await.map_err(|err| {
            IssuanceError::from_store("failed to open store transaction", err)
        })?;
        let full_record =
            fetch_required(&mut *txn, RecordCategory::RevRegDef, &rev_reg_def_id.0, true).await?;
        let mut full = RevRegDefRecord::from_record(&full_record)?;
        full.state = RevocationRegistryDefinitionState::Full;
        full.active = false;
        txn.replace(full.to_record(&rev_reg_def_id.0)?)
            .await
            .map_err(|err| IssuanceError::from_store("failed to mark registry full", err))?;
        txn.commit()
            .await
            .map_err(|err| IssuanceError::from_store("failed to commit full transition", err))?;

        info!(
            "handle_full_registry <<< {rev_reg_def_id} is full, promoted backup {backup_id} for \
             credential definition {cred_def_id}"
        );

        // replacement backup; the rotation itself already succeeded, so a
        // failure here is logged and not surfaced
        if let Err(err) = self
            .create_and_register(
                &full.rev_reg_def.issuer_id,
                &cred_def_id,
                full.rev_reg_def.revoc_def_type,
                &Uuid::new_v4().to_string(),
                full.rev_reg_def.value.max_cred_num,
            )
            .await
        {
            warn!(
                "handle_full_registry >>> failed to create replacement backup for {cred_def_id}: \
                 {err}"
            );
        }

        Ok(RevRegDefResult {
            key: backup_id.to_string(),
            job_id: None,
            rev_reg_def: backup_def.rev_reg_def,
            state: RevocationRegistryDefinitionState::Finished,
            active: true,
        })
    }

    /// Retire every current registry of a credential definition: provision
    /// a fresh active registry plus a backup, then mark all other
    /// non-`wait` registries decommissioned and inactive in one
    /// transaction. In-flight registrations (`wait`) are left untouched.
    pub async fn decommission_registry(
        &self,
        cred_def_id: &CredentialDefinitionId,
    ) -> IssuanceResult<RevRegDefResult> {
        trace!("RevocationRegistryManager::decommission_registry >>> {cred_def_id}");

        let existing = self.get_created_registries(cred_def_id, None).await?;
        if existing.is_empty() {
            return Err(IssuanceError::NotFound(format!(
                "no revocation registries found for credential definition {cred_def_id}"
            )));
        }
        // parameters follow the registry being replaced, preferring the
        // currently active one
        let template = self
            .get_active_registry(cred_def_id)
            .await
            .unwrap_or_else(|_| existing[0].clone());
        let old_keys: Vec<String> = existing.iter().map(|r| r.key.clone()).collect();

        let replacement = self
            .create_and_register(
                &template.rev_reg_def.issuer_id,
                cred_def_id,
                template.rev_reg_def.revoc_def_type,
                &Uuid::new_v4().to_string(),
                template.rev_reg_def.value.max_cred_num,
            )
            .await?;
        let backup = self
            .create_and_register(
                &template.rev_reg_def.issuer_id,
                cred_def_id,
                template.rev_reg_def.revoc_def_type,
                &Uuid::new_v4().to_string(),
                template.rev_reg_def.value.max_cred_num,
            )
            .await?;

        let mut txn = self.store.transaction().await.map_err(|err| {
            IssuanceError::from_store("failed to open store transaction", err)
        })?;
        for key in &old_keys {
            if *key == replacement.key || *key == backup.key {
                continue;
            }
            let record = fetch_required(&mut *txn, RecordCategory::RevRegDef, key, true).await?;
            let mut def = RevRegDefRecord::from_record(&record)?;
            if def.state == RevocationRegistryDefinitionState::Wait {
                continue;
            }
            def.state = RevocationRegistryDefinitionState::Decommissioned;
            def.active = false;
            txn.replace(def.to_record(key)?).await.map_err(|err| {
                IssuanceError::from_store("failed to decommission registry", err)
            })?;
        }
        txn.commit().await.map_err(|err| {
            IssuanceError::from_store("failed to commit decommissioning", err)
        })?;

        if replacement.state == RevocationRegistryDefinitionState::Finished {
            self.set_active_registry(&replacement.rev_reg_def.id).await?;
        } else {
            info!(
                "decommission_registry >>> replacement {} still pending registration, \
                 activation deferred",
                replacement.key
            );
        }

        info!(
            "decommission_registry <<< decommissioned old registries for {cred_def_id}, \
             replacement {} backup {}",
            replacement.key, backup.key
        );
        Ok(replacement)
    }

    /// Resolve the unique active and finished registry for a credential
    /// definition.
    ///
    /// More than one active registry is an anomaly that should not occur;
    /// when observed, the lexicographically smallest id wins and the
    /// anomaly is healed by re-running the activation for the winner, which
    /// demotes the others.
    pub async fn get_active_registry(
        &self,
        cred_def_id: &CredentialDefinitionId,
    ) -> IssuanceResult<RevRegDefResult> {
        trace!("RevocationRegistryManager::get_active_registry >>> {cred_def_id}");

        let filter = RecordTags::new(vec![
            RecordTag::new(TAG_CRED_DEF_ID, &cred_def_id.0),
            RecordTag::new(TAG_ACTIVE, "true"),
            RecordTag::new(
                TAG_STATE,
                &RevocationRegistryDefinitionState::Finished.to_string(),
            ),
        ]);

        let mut session = self.store.session().await.map_err(|err| {
            IssuanceError::from_store("failed to open store session", err)
        })?;
        let mut actives = session
            .fetch_all(RecordCategory::RevRegDef, Some(&filter), None, false)
            .await
            .map_err(|err| IssuanceError::from_store("failed to query active registries", err))?;
        drop(session);

        if actives.is_empty() {
            return Err(IssuanceError::Revocation(format!(
                "no active revocation registry for credential definition {cred_def_id}"
            )));
        }

        // fetch_all returns name order, so the winner is the first
        let winner = actives.remove(0);
        if !actives.is_empty() {
            warn!(
                "get_active_registry >>> {} registries tagged active for credential definition \
                 {cred_def_id}, healing in favour of {}",
                actives.len() + 1,
                winner.name()
            );
            let mut txn = self.store.transaction().await.map_err(|err| {
                IssuanceError::from_store("failed to open store transaction", err)
            })?;
            for loser in &actives {
                let record =
                    fetch_required(&mut *txn, RecordCategory::RevRegDef, loser.name(), true)
                        .await?;
                let mut def = RevRegDefRecord::from_record(&record)?;
                def.active = false;
                txn.replace(def.to_record(loser.name())?).await.map_err(|err| {
                    IssuanceError::from_store("failed to demote anomalous active registry", err)
                })?;
            }
            txn.commit().await.map_err(|err| {
                IssuanceError::from_store("failed to commit active-registry healing", err)
            })?;
        }

        let def = RevRegDefRecord::from_record(&winner)?;
        Ok(RevRegDefResult {
            key: winner.name().to_string(),
            job_id: None,
            rev_reg_def: def.rev_reg_def,
            state: def.state,
            active: def.active,
        })
    }

    /// Read-only listing of stored registries for a credential definition,
    /// optionally restricted to one lifecycle state.
    pub async fn get_created_registries(
        &self,
        cred_def_id: &CredentialDefinitionId,
        state: Option<RevocationRegistryDefinitionState>,
    ) -> IssuanceResult<Vec<RevRegDefResult>> {
        let mut tags = vec![RecordTag::new(TAG_CRED_DEF_ID, &cred_def_id.0)];
        if let Some(state) = state {
            tags.push(RecordTag::new(TAG_STATE, &state.to_string()));
        }
        let filter = RecordTags::new(tags);

        let mut session = self.store.session().await.map_err(|err| {
            IssuanceError::from_store("failed to open store session", err)
        })?;
        let records = session
            .fetch_all(RecordCategory::RevRegDef, Some(&filter), None, false)
            .await
            .map_err(|err| IssuanceError::from_store("failed to query registries", err))?;

        records
            .iter()
            .map(|record| {
                let def = RevRegDefRecord::from_record(record)?;
                Ok(RevRegDefResult {
                    key: record.name().to_string(),
                    job_id: None,
                    rev_reg_def: def.rev_reg_def,
                    state: def.state,
                    active: def.active,
                })
            })
            .collect()
    }
}

fn private_key_record(
    key: &str,
    private: &RevocationRegistryDefinitionPrivate,
    state: RevocationRegistryDefinitionState,
) -> IssuanceResult<Record> {
    Ok(Record::builder()
        .category(RecordCategory::RevRegDefPriv)
        .name(key.to_string())
        .value(serde_json::to_string(private)?)
        .tags(RecordTags::new(vec![RecordTag::new(
            TAG_STATE,
            &state.to_string(),
        )]))
        .build())
}

use std::{
    collections::{BTreeSet, HashMap},
    sync::Arc,
    time::{SystemTime, UNIX_EPOCH},
};

use anoncreds_issuance_registry::registrar::base_registrar::{
    BaseRegistrar, RegistrationOptions, RegistrationState,
};
use anoncreds_issuance_store::store::{
    base_store::{record_category::RecordCategory, BaseStore, StoreSession, StoreTransaction},
    record_tags::{RecordTag, RecordTags},
};
use anoncreds_issuance_types::data_types::{
    identifiers::rev_reg_def_id::RevocationRegistryDefinitionId,
    ledger::rev_status_list::RevocationStatusList,
};

use crate::{
    engine::base_engine::BaseCryptoEngine,
    errors::error::{IssuanceError, IssuanceResult},
    events::{BaseEventNotifier, IssuanceEvent},
    revocation::{
        list::RevocationListManager,
        records::{
            fetch_required, IssuerCredRevRecord, IssuerCredRevState, RevListRecord,
            TAG_CRED_REV_ID, TAG_REV_REG_DEF_ID,
        },
    },
    utils::retry::{retry, PUBLISH_RETRY},
};

/// Outcome of a publication pass over one registry.
#[derive(Clone, Debug)]
pub struct RevokeResult {
    /// Accumulator state the pass started from.
    pub prev: RevocationStatusList,
    /// Newly published state, or `None` when nothing valid was left to
    /// revoke (a no-op, not an error).
    pub curr: Option<RevocationStatusList>,
    /// Indices folded into `curr`, ascending.
    pub revoked: Vec<u32>,
    /// Indices rejected with a logged reason: out of range, not yet
    /// issued, or already revoked.
    pub failed: Vec<String>,
}

/// Batches pending revocations into accumulator updates and publishes them
/// through the registrar.
///
/// Publication is optimistically concurrent: any number of publishers may
/// compute candidate updates in parallel, but a commit only lands if the
/// stored list still matches the snapshot the update was computed from;
/// losers retry from fresh state.
#[derive(Debug)]
pub struct RevocationPublisher {
    store: Arc<dyn BaseStore>,
    engine: Arc<dyn BaseCryptoEngine>,
    registrar: Arc<dyn BaseRegistrar>,
    notifier: Arc<dyn BaseEventNotifier>,
    lists: Arc<RevocationListManager>,
}

impl RevocationPublisher {
    pub fn new(
        store: Arc<dyn BaseStore>,
        engine: Arc<dyn BaseCryptoEngine>,
        registrar: Arc<dyn BaseRegistrar>,
        notifier: Arc<dyn BaseEventNotifier>,
        lists: Arc<RevocationListManager>,
    ) -> Self {
        Self {
            store,
            engine,
            registrar,
            notifier,
            lists,
        }
    }

    /// Publish the registry's pending revocations (plus `additional_crids`)
    /// as one accumulator update.
    ///
    /// `limit_crids`, when given, restricts which valid indices are
    /// published now; the rest stay pending. Conflicts with concurrent
    /// publishers are retried internally; exhausting the budget surfaces a
    /// single `Revocation` error.
    pub async fn revoke_pending(
        &self,
        rev_reg_def_id: &RevocationRegistryDefinitionId,
        additional_crids: &[u32],
        limit_crids: Option<&[u32]>,
    ) -> IssuanceResult<RevokeResult> {
        trace!(
            "RevocationPublisher::revoke_pending >>> {rev_reg_def_id}, additional: \
             {additional_crids:?}, limit: {limit_crids:?}"
        );

        let result = retry(
            PUBLISH_RETRY,
            |err| matches!(err, IssuanceError::Conflict(_)),
            |attempt| async move {
                self.try_revoke_pending(rev_reg_def_id, additional_crids, limit_crids, attempt)
                    .await
            },
        )
        .await;

        match result {
            Err(IssuanceError::Conflict(_)) => Err(IssuanceError::Revocation(format!(
                "repeated conflict attempting to update registry {rev_reg_def_id}"
            ))),
            other => other,
        }
    }

    async fn try_revoke_pending(
        &self,
        rev_reg_def_id: &RevocationRegistryDefinitionId,
        additional_crids: &[u32],
        limit_crids: Option<&[u32]>,
        attempt: u32,
    ) -> IssuanceResult<RevokeResult> {
        let stored = self.lists.get_revocation_list(rev_reg_def_id).await?;
        let snapshot = serde_json::to_string(&stored.rev_list)?;

        let (rev_reg_def, rev_reg_def_private, cred_def) =
            self.lists.load_registry_parts(rev_reg_def_id).await?;
        let max_cred_num = rev_reg_def.value.max_cred_num;

        let mut candidates: BTreeSet<u32> = stored.pending_crids().into_iter().collect();
        candidates.extend(additional_crids.iter().copied());

        let mut failed = Vec::new();
        let mut rev_crids = BTreeSet::new();
        for crid in candidates {
            if crid == 0 || crid > max_cred_num {
                warn!(
                    "revoke_pending >>> crid {crid} out of range for {rev_reg_def_id} (max \
                     {max_cred_num})"
                );
                failed.push(crid.to_string());
            } else if crid >= stored.next_index {
                warn!(
                    "revoke_pending >>> crid {crid} not yet issued by {rev_reg_def_id} \
                     (next_index {})",
                    stored.next_index
                );
                failed.push(crid.to_string());
            } else if stored.rev_list.is_revoked(crid) {
                warn!("revoke_pending >>> crid {crid} already revoked in {rev_reg_def_id}");
                failed.push(crid.to_string());
            } else {
                rev_crids.insert(crid);
            }
        }

        let (publish, skipped): (BTreeSet<u32>, BTreeSet<u32>) = match limit_crids {
            None => (rev_crids, BTreeSet::new()),
            Some(limit) => rev_crids.into_iter().partition(|crid| limit.contains(crid)),
        };
        if !skipped.is_empty() {
            info!(
                "revoke_pending >>> {} crid(s) outside the requested limit stay pending",
                skipped.len()
            );
        }

        if publish.is_empty() {
            return Ok(RevokeResult {
                prev: stored.rev_list,
                curr: None,
                revoked: Vec::new(),
                failed,
            });
        }

        let curr = self
            .engine
            .update_status_list(
                &cred_def,
                &rev_reg_def,
                &rev_reg_def_private,
                &stored.rev_list,
                &publish,
                unix_timestamp(),
            )
            .await?;
        let revoked: Vec<u32> = publish.iter().copied().collect();

        // commit only if the stored list is still the one the update was
        // computed from
        let mut txn = self.store.transaction().await.map_err(|err| {
            IssuanceError::from_store("failed to open store transaction", err)
        })?;
        let current_record =
            fetch_required(&mut *txn, RecordCategory::RevList, &rev_reg_def_id.0, true).await?;
        let mut current = RevListRecord::from_record(&current_record)?;
        if serde_json::to_string(&current.rev_list)? != snapshot {
            drop(txn);
            return Err(IssuanceError::Conflict(format!(
                "revocation list for {rev_reg_def_id} changed during update (attempt {attempt})"
            )));
        }

        // pending is re-read from the current record so marks placed while
        // the accumulator was recomputed survive the publish; skipped ids
        // stay pending even when they only arrived via additional_crids
        let mut new_pending: Vec<u32> = current
            .pending_crids()
            .into_iter()
            .filter(|crid| !publish.contains(crid))
            .collect();
        for crid in &skipped {
            if !new_pending.contains(crid) {
                new_pending.push(*crid);
            }
        }
        current.rev_list = curr.clone();
        current.set_pending(new_pending);
        txn.replace(current.to_record(&rev_reg_def_id.0)?)
            .await
            .map_err(|err| {
                IssuanceError::from_store("failed to store updated revocation list", err)
            })?;

        set_cred_rev_records_revoked(&mut *txn, rev_reg_def_id, &revoked).await?;

        txn.commit().await.map_err(|err| {
            IssuanceError::from_store("failed to commit revocation list update", err)
        })?;

        let registration = self
            .registrar
            .update_revocation_list(
                &rev_reg_def,
                &stored.rev_list,
                &curr,
                &revoked,
                &RegistrationOptions::default(),
            )
            .await
            .map_err(|err| {
                IssuanceError::from_registrar(
                    format!("failed to publish revocation list update for {rev_reg_def_id}"),
                    err,
                )
            })?;
        if registration.state == RegistrationState::Failed {
            return Err(IssuanceError::Revocation(format!(
                "registry rejected the revocation list update for {rev_reg_def_id}"
            )));
        }

        info!(
            "revoke_pending <<< published {} revocation(s) for {rev_reg_def_id}",
            revoked.len()
        );

        if let Err(err) = self
            .notifier
            .notify(IssuanceEvent::RevocationListUpdated {
                rev_reg_def_id: rev_reg_def_id.clone(),
                revoked: revoked.clone(),
            })
            .await
        {
            warn!("revoke_pending >>> notifier failed: {err}");
        }

        Ok(RevokeResult {
            prev: stored.rev_list,
            curr: Some(curr),
            revoked,
            failed,
        })
    }

    /// Flush every registry with pending revocations, optionally restricted
    /// to the given registries and index subsets. Per-registry failures are
    /// logged and skipped so one broken registry cannot stall the batch.
    pub async fn publish_pending_for_all(
        &self,
        restrict: Option<&HashMap<RevocationRegistryDefinitionId, Vec<u32>>>,
    ) -> IssuanceResult<HashMap<RevocationRegistryDefinitionId, RevokeResult>> {
        trace!("RevocationPublisher::publish_pending_for_all >>>");

        let mut results = HashMap::new();
        for rev_reg_def_id in self.lists.get_lists_with_pending().await? {
            let limit: Option<&[u32]> = match restrict {
                Some(map) => match map.get(&rev_reg_def_id) {
                    Some(crids) => Some(crids.as_slice()),
                    None => continue,
                },
                None => None,
            };
            match self.revoke_pending(&rev_reg_def_id, &[], limit).await {
                Ok(result) => {
                    results.insert(rev_reg_def_id, result);
                }
                Err(err) => {
                    warn!("publish_pending_for_all >>> skipping {rev_reg_def_id}: {err}");
                }
            }
        }
        Ok(results)
    }

    /// Apply an update whose `prev`/`curr` accumulators were computed out
    /// of band (e.g. an endorsement flow). The stored list must match
    /// `prev` bit for bit, guarding against updates computed from stale
    /// state.
    pub async fn update_revocation_list(
        &self,
        rev_reg_def_id: &RevocationRegistryDefinitionId,
        prev: &RevocationStatusList,
        curr: &RevocationStatusList,
        revoked: &[u32],
    ) -> IssuanceResult<()> {
        trace!(
            "RevocationPublisher::update_revocation_list >>> {rev_reg_def_id}, revoked: \
             {revoked:?}"
        );

        let (rev_reg_def, _, _) = self.lists.load_registry_parts(rev_reg_def_id).await?;

        let mut txn = self.store.transaction().await.map_err(|err| {
            IssuanceError::from_store("failed to open store transaction", err)
        })?;
        let record =
            fetch_required(&mut *txn, RecordCategory::RevList, &rev_reg_def_id.0, true).await?;
        let mut stored = RevListRecord::from_record(&record)?;

        if serde_json::to_string(&stored.rev_list)? != serde_json::to_string(prev)? {
            return Err(IssuanceError::Revocation(format!(
                "passed revocation list does not match stored list for {rev_reg_def_id}"
            )));
        }

        let new_pending: Vec<u32> = stored
            .pending_crids()
            .into_iter()
            .filter(|crid| !revoked.contains(crid))
            .collect();
        stored.rev_list = curr.clone();
        stored.set_pending(new_pending);
        txn.replace(stored.to_record(&rev_reg_def_id.0)?)
            .await
            .map_err(|err| {
                IssuanceError::from_store("failed to store updated revocation list", err)
            })?;

        set_cred_rev_records_revoked(&mut *txn, rev_reg_def_id, revoked).await?;

        txn.commit().await.map_err(|err| {
            IssuanceError::from_store("failed to commit revocation list update", err)
        })?;

        let registration = self
            .registrar
            .update_revocation_list(
                &rev_reg_def,
                prev,
                curr,
                revoked,
                &RegistrationOptions::default(),
            )
            .await
            .map_err(|err| {
                IssuanceError::from_registrar(
                    format!("failed to publish revocation list update for {rev_reg_def_id}"),
                    err,
                )
            })?;
        if registration.state == RegistrationState::Failed {
            return Err(IssuanceError::Revocation(format!(
                "registry rejected the revocation list update for {rev_reg_def_id}"
            )));
        }

        if let Err(err) = self
            .notifier
            .notify(IssuanceEvent::RevocationListUpdated {
                rev_reg_def_id: rev_reg_def_id.clone(),
                revoked: revoked.to_vec(),
            })
            .await
        {
            warn!("update_revocation_list >>> notifier failed: {err}");
        }

        Ok(())
    }
}

/// Flip matching issued-credential records to `revoked`. Indices issued
/// without an exchange record (e.g. revoked via `additional_crids`) are
/// skipped silently.
async fn set_cred_rev_records_revoked(
    txn: &mut dyn StoreTransaction,
    rev_reg_def_id: &RevocationRegistryDefinitionId,
    revoked: &[u32],
) -> IssuanceResult<()> {
    for crid in revoked {
        let filter = RecordTags::new(vec![
            RecordTag::new(TAG_REV_REG_DEF_ID, &rev_reg_def_id.0),
            RecordTag::new(TAG_CRED_REV_ID, &crid.to_string()),
        ]);
        let matches = txn
            .fetch_all(RecordCategory::IssuerCredRev, Some(&filter), None, true)
            .await
            .map_err(|err| {
                IssuanceError::from_store("failed to query issued-credential records", err)
            })?;
        for record in matches {
            let mut cred_rev = IssuerCredRevRecord::from_record(&record)?;
            cred_rev.state = IssuerCredRevState::Revoked;
            txn.replace(cred_rev.to_record()?).await.map_err(|err| {
                IssuanceError::from_store("failed to update issued-credential record", err)
            })?;
        }
    }
    Ok(())
}

fn unix_timestamp() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

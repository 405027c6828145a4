use std::{
    collections::BTreeSet,
    path::Path,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, Mutex,
    },
};

use anoncreds_issuance::{
    engine::base_engine::{BaseCryptoEngine, CredentialRevocationConfig},
    errors::error::{IssuanceError, IssuanceResult},
    revocation::records::RevListRecord,
};
use anoncreds_issuance_store::store::{
    base_store::{record_category::RecordCategory, BaseStore, StoreSession, StoreTransaction},
    in_memory::InMemoryStore,
};
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
use test_utils::{
    devsetup::{build_custom_setup, build_provisioned_setup},
    mockdata::{
        mock_engine::MockCryptoEngine, mock_registrar::MockRegistrar,
        mock_tails_server::MockTailsServer,
    },
};

#[tokio::test]
async fn created_list_round_trips_bit_for_bit() {
    let setup = build_provisioned_setup(4).await;
    let rev_reg_def_id = setup
        .registries
        .get_active_registry(&setup.cred_def_id)
        .await
        .unwrap()
        .rev_reg_def_id();

    let stored = setup.lists.get_revocation_list(&rev_reg_def_id).await.unwrap();
    assert_eq!(stored.next_index, 1);
    assert!(stored.pending.is_none());
    assert_eq!(stored.rev_list.revocation_list.len(), 4);
    assert!(stored.rev_list.revocation_list.not_any());

    // the stored serialization is stable across a fetch round trip
    let fetched_again = setup.lists.get_revocation_list(&rev_reg_def_id).await.unwrap();
    assert_eq!(
        serde_json::to_string(&stored.rev_list).unwrap(),
        serde_json::to_string(&fetched_again.rev_list).unwrap()
    );
}

#[tokio::test]
async fn revoking_index_one_sets_bit_zero() {
    let setup = build_provisioned_setup(4).await;
    let rev_reg_def_id = setup
        .registries
        .get_active_registry(&setup.cred_def_id)
        .await
        .unwrap()
        .rev_reg_def_id();

    assert_eq!(setup.issuer.allocate_index(&rev_reg_def_id).await.unwrap().index, 1);

    let result = setup
        .publisher
        .revoke_pending(&rev_reg_def_id, &[1], None)
        .await
        .unwrap();
    assert_eq!(result.revoked, vec![1]);
    assert!(result.failed.is_empty());

    let stored = setup.lists.get_revocation_list(&rev_reg_def_id).await.unwrap();
    // one-based credential revocation id 1 lands on zero-based bit 0
    assert!(stored.rev_list.revocation_list[0]);
    assert!(!stored.rev_list.revocation_list[1]);
    assert!(stored.rev_list.is_revoked(1));
}

#[tokio::test]
async fn revoking_a_never_issued_index_fails_without_mutating_state() {
    let setup = build_provisioned_setup(4).await;
    let rev_reg_def_id = setup
        .registries
        .get_active_registry(&setup.cred_def_id)
        .await
        .unwrap()
        .rev_reg_def_id();

    // next_index is still 1: index 1 was never issued
    let result = setup
        .publisher
        .revoke_pending(&rev_reg_def_id, &[1], None)
        .await
        .unwrap();
    assert_eq!(result.failed, vec!["1".to_string()]);
    assert!(result.revoked.is_empty());
    assert!(result.curr.is_none());

    assert!(setup.lists.get_pending(&rev_reg_def_id).await.unwrap().is_empty());
    assert!(setup.registrar.published_updates().is_empty());
}

#[tokio::test]
async fn revoking_an_already_revoked_index_reports_it_failed() {
    let setup = build_provisioned_setup(4).await;
    let rev_reg_def_id = setup
        .registries
        .get_active_registry(&setup.cred_def_id)
        .await
        .unwrap()
        .rev_reg_def_id();

    setup.issuer.allocate_index(&rev_reg_def_id).await.unwrap();

    let first = setup
        .publisher
        .revoke_pending(&rev_reg_def_id, &[1], None)
        .await
        .unwrap();
    assert_eq!(first.revoked, vec![1]);

    let second = setup
        .publisher
        .revoke_pending(&rev_reg_def_id, &[1], None)
        .await
        .unwrap();
    assert_eq!(second.failed, vec!["1".to_string()]);
    assert!(second.revoked.is_empty());
    assert!(second.curr.is_none());
    assert_eq!(setup.registrar.published_updates().len(), 1);
}

#[tokio::test]
async fn marking_the_same_index_pending_twice_keeps_it_once() {
    let setup = build_provisioned_setup(4).await;
    let rev_reg_def_id = setup
        .registries
        .get_active_registry(&setup.cred_def_id)
        .await
        .unwrap()
        .rev_reg_def_id();

    setup.issuer.allocate_index(&rev_reg_def_id).await.unwrap();

    setup.lists.mark_pending(&rev_reg_def_id, &[1]).await.unwrap();
    setup.lists.mark_pending(&rev_reg_def_id, &[1]).await.unwrap();
    assert_eq!(setup.lists.get_pending(&rev_reg_def_id).await.unwrap(), vec![1]);

    assert_eq!(
        setup.lists.get_lists_with_pending().await.unwrap(),
        vec![rev_reg_def_id.clone()]
    );

    let result = setup
        .publisher
        .revoke_pending(&rev_reg_def_id, &[], None)
        .await
        .unwrap();
    assert_eq!(result.revoked, vec![1]);
    assert!(setup.lists.get_pending(&rev_reg_def_id).await.unwrap().is_empty());
    assert!(setup.lists.get_lists_with_pending().await.unwrap().is_empty());
}

#[tokio::test]
async fn clear_pending_honours_the_mask() {
    use anoncreds_issuance::revocation::list::RevocationListManager;

    let setup = build_provisioned_setup(4).await;
    let rev_reg_def_id = setup
        .registries
        .get_active_registry(&setup.cred_def_id)
        .await
        .unwrap()
        .rev_reg_def_id();

    for _ in 0..3 {
        setup.issuer.allocate_index(&rev_reg_def_id).await.unwrap();
    }
    setup
        .lists
        .mark_pending(&rev_reg_def_id, &[1, 2, 3])
        .await
        .unwrap();

    {
        let mut txn = setup.store.transaction().await.unwrap();
        RevocationListManager::clear_pending(&mut *txn, &rev_reg_def_id, Some(&[2]))
            .await
            .unwrap();
        txn.commit().await.unwrap();
    }
    assert_eq!(
        setup.lists.get_pending(&rev_reg_def_id).await.unwrap(),
        vec![1, 3]
    );

    {
        let mut txn = setup.store.transaction().await.unwrap();
        RevocationListManager::clear_pending(&mut *txn, &rev_reg_def_id, None)
            .await
            .unwrap();
        txn.commit().await.unwrap();
    }
    assert!(setup.lists.get_pending(&rev_reg_def_id).await.unwrap().is_empty());
    assert!(setup.lists.get_lists_with_pending().await.unwrap().is_empty());
}

#[tokio::test]
async fn limit_crids_defers_unselected_indices() {
    let setup = build_provisioned_setup(4).await;
    let rev_reg_def_id = setup
        .registries
        .get_active_registry(&setup.cred_def_id)
        .await
        .unwrap()
        .rev_reg_def_id();

    for _ in 0..3 {
        setup.issuer.allocate_index(&rev_reg_def_id).await.unwrap();
    }
    setup
        .lists
        .mark_pending(&rev_reg_def_id, &[1, 2, 3])
        .await
        .unwrap();

    let result = setup
        .publisher
        .revoke_pending(&rev_reg_def_id, &[], Some(&[2]))
        .await
        .unwrap();
    assert_eq!(result.revoked, vec![2]);
    assert!(result.failed.is_empty());

    let stored = setup.lists.get_revocation_list(&rev_reg_def_id).await.unwrap();
    assert_eq!(stored.pending_crids(), vec![1, 3]);
    assert!(stored.rev_list.is_revoked(2));
    assert!(!stored.rev_list.is_revoked(1));
    assert!(!stored.rev_list.is_revoked(3));
}

#[tokio::test]
async fn publish_pending_for_all_flushes_every_marked_registry() {
    let setup = build_provisioned_setup(4).await;
    let rev_reg_def_id = setup
        .registries
        .get_active_registry(&setup.cred_def_id)
        .await
        .unwrap()
        .rev_reg_def_id();

    setup.issuer.allocate_index(&rev_reg_def_id).await.unwrap();
    setup.issuer.allocate_index(&rev_reg_def_id).await.unwrap();
    setup.lists.mark_pending(&rev_reg_def_id, &[1, 2]).await.unwrap();

    let results = setup.publisher.publish_pending_for_all(None).await.unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[&rev_reg_def_id].revoked, vec![1, 2]);
    assert!(setup.lists.get_lists_with_pending().await.unwrap().is_empty());
}

#[tokio::test]
async fn update_revocation_list_rejects_a_stale_prev_list() {
    let setup = build_provisioned_setup(4).await;
    let rev_reg_def_id = setup
        .registries
        .get_active_registry(&setup.cred_def_id)
        .await
        .unwrap()
        .rev_reg_def_id();

    setup.issuer.allocate_index(&rev_reg_def_id).await.unwrap();
    let stored = setup.lists.get_revocation_list(&rev_reg_def_id).await.unwrap();

    let mut curr = stored.rev_list.clone();
    curr.set_revoked(1);
    curr.current_accumulator = "21 EXTERNALLYCOMPUTED".to_string();
    curr.timestamp += 1;

    // a prev that differs from the stored list must be rejected
    let mut stale_prev = stored.rev_list.clone();
    stale_prev.current_accumulator = "21 SOMETHINGOLDER".to_string();
    let err = setup
        .publisher
        .update_revocation_list(&rev_reg_def_id, &stale_prev, &curr, &[1])
        .await
        .unwrap_err();
    match err {
        IssuanceError::Revocation(msg) => {
            assert!(msg.contains("does not match stored"));
        }
        other => panic!("expected Revocation, got {other:?}"),
    }

    // the matching prev is accepted and the stored list becomes curr
    setup
        .publisher
        .update_revocation_list(&rev_reg_def_id, &stored.rev_list, &curr, &[1])
        .await
        .unwrap();
    let after = setup.lists.get_revocation_list(&rev_reg_def_id).await.unwrap();
    assert_eq!(
        serde_json::to_string(&after.rev_list).unwrap(),
        serde_json::to_string(&curr).unwrap()
    );
}

/// Engine wrapper staging a lost optimistic-concurrency race: the first
/// accumulator recomputation commits a competing update to the stored list
/// before returning, so the caller's commit attempt must detect the
/// conflict and retry from fresh state.
#[derive(Debug, Default)]
struct ConflictingEngine {
    inner: MockCryptoEngine,
    store: Mutex<Option<Arc<InMemoryStore>>>,
    fired: AtomicBool,
}

impl ConflictingEngine {
    fn attach_store(&self, store: Arc<InMemoryStore>) {
        *self.store.lock().unwrap() = Some(store);
    }
}

#[async_trait]
impl BaseCryptoEngine for ConflictingEngine {
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
        self.inner
            .create_registry(cred_def, issuer_id, tag, registry_type, max_cred_num, tails_dir)
            .await
    }

    async fn create_status_list(
        &self,
        cred_def: &CredentialDefinition,
        rev_reg_def_id: &RevocationRegistryDefinitionId,
        rev_reg_def: &RevocationRegistryDefinition,
        rev_reg_def_private: &RevocationRegistryDefinitionPrivate,
        issuer_id: &IssuerId,
    ) -> IssuanceResult<RevocationStatusList> {
        self.inner
            .create_status_list(cred_def, rev_reg_def_id, rev_reg_def, rev_reg_def_private, issuer_id)
            .await
    }

    async fn update_status_list(
        &self,
        cred_def: &CredentialDefinition,
        rev_reg_def: &RevocationRegistryDefinition,
        rev_reg_def_private: &RevocationRegistryDefinitionPrivate,
        current_list: &RevocationStatusList,
        revoked: &BTreeSet<u32>,
        timestamp: u64,
    ) -> IssuanceResult<RevocationStatusList> {
        let store = self.store.lock().unwrap().clone();
        if let Some(store) = store {
            if !self.fired.swap(true, Ordering::SeqCst) {
                let mut txn = store.transaction().await.unwrap();
                let record = txn
                    .fetch(RecordCategory::RevList, &rev_reg_def.id.0, true)
                    .await
                    .unwrap()
                    .unwrap();
                let mut competing = RevListRecord::from_record(&record).unwrap();
                competing.rev_list.current_accumulator =
                    format!("{} COMPETING", competing.rev_list.current_accumulator);
                txn.replace(competing.to_record(record.name()).unwrap())
                    .await
                    .unwrap();
                txn.commit().await.unwrap();
            }
        }
        self.inner
            .update_status_list(
                cred_def,
                rev_reg_def,
                rev_reg_def_private,
                current_list,
                revoked,
                timestamp,
            )
            .await
    }

    async fn create_credential(
        &self,
        cred_def: &CredentialDefinition,
        cred_def_private: &CredentialDefinitionPrivate,
        cred_offer: &CredentialOffer,
        cred_request: &CredentialRequest,
        cred_values: &CredentialValues,
        revocation_config: Option<CredentialRevocationConfig<'_>>,
    ) -> IssuanceResult<Credential> {
        self.inner
            .create_credential(
                cred_def,
                cred_def_private,
                cred_offer,
                cred_request,
                cred_values,
                revocation_config,
            )
            .await
    }
}

#[tokio::test]
async fn a_lost_publication_race_is_retried_from_fresh_state() {
    let engine = Arc::new(ConflictingEngine::default());
    let setup = build_custom_setup(
        engine.clone(),
        MockRegistrar::new(),
        MockTailsServer::new(),
    )
    .await;
    setup
        .setup
        .on_credential_definition_finished(&setup.cred_def_id, &setup.issuer_id, Some(4))
        .await
        .unwrap();
    engine.attach_store(setup.store.clone());

    let rev_reg_def_id = setup
        .registries
        .get_active_registry(&setup.cred_def_id)
        .await
        .unwrap()
        .rev_reg_def_id();
    setup.issuer.allocate_index(&rev_reg_def_id).await.unwrap();

    // attempt 1 computes an update, loses to the competing commit, and is
    // discarded; attempt 2 recomputes from the winner's state and lands
    let result = setup
        .publisher
        .revoke_pending(&rev_reg_def_id, &[1], None)
        .await
        .unwrap();
    assert_eq!(result.revoked, vec![1]);

    let stored = setup.lists.get_revocation_list(&rev_reg_def_id).await.unwrap();
    assert!(stored.rev_list.is_revoked(1));
    // the surviving accumulator chains from the competing value, proving
    // the losing computation was thrown away
    assert!(result
        .prev
        .current_accumulator
        .ends_with("COMPETING"));

    // only the winning attempt reached the registrar
    assert_eq!(setup.registrar.published_updates().len(), 1);
}

use anoncreds_issuance::{errors::error::IssuanceError, revocation::records::RevRegDefRecord};
use anoncreds_issuance_store::store::base_store::{
    record_category::RecordCategory, BaseStore, StoreSession, StoreTransaction,
};
use anoncreds_issuance_types::data_types::ledger::rev_reg_def::{
    RegistryType, RevocationRegistryDefinitionState,
};
use test_utils::{
    devsetup::{build_custom_setup, build_issuance_setup, build_provisioned_setup},
    mockdata::{
        mock_engine::MockCryptoEngine, mock_registrar::MockRegistrar,
        mock_tails_server::MockTailsServer,
    },
};

#[tokio::test]
async fn create_and_register_provisions_an_immediately_finished_registry() {
    let setup = build_issuance_setup().await;

    let result = setup
        .registries
        .create_and_register(
            &setup.issuer_id,
            &setup.cred_def_id,
            RegistryType::CL_ACCUM,
            "tag0",
            5,
        )
        .await
        .unwrap();

    assert_eq!(result.state, RevocationRegistryDefinitionState::Finished);
    assert!(result.job_id.is_none());
    assert_eq!(result.key, result.rev_reg_def_id().0);

    // the finished event cascades: tails uploaded, list registered, and the
    // first finished registry becomes active
    assert_eq!(setup.tails_server.upload_count(), 1);
    let list = setup
        .lists
        .get_revocation_list(&result.rev_reg_def_id())
        .await
        .unwrap();
    assert_eq!(list.next_index, 1);
    assert!(list.pending.is_none());

    let active = setup
        .registries
        .get_active_registry(&setup.cred_def_id)
        .await
        .unwrap();
    assert_eq!(active.key, result.key);
}

#[tokio::test]
async fn pending_registration_is_keyed_by_job_id_until_finished() {
    let setup = build_custom_setup(
        std::sync::Arc::new(MockCryptoEngine),
        MockRegistrar::deferred(),
        MockTailsServer::new(),
    )
    .await;

    let result = setup
        .registries
        .create_and_register(
            &setup.issuer_id,
            &setup.cred_def_id,
            RegistryType::CL_ACCUM,
            "tag0",
            5,
        )
        .await
        .unwrap();

    assert_eq!(result.state, RevocationRegistryDefinitionState::Wait);
    let job_id = result.job_id.clone().unwrap();
    assert_eq!(result.key, job_id);

    // not resolvable as active while pending, no tails upload yet
    assert!(setup
        .registries
        .get_active_registry(&setup.cred_def_id)
        .await
        .is_err());
    assert_eq!(setup.tails_server.upload_count(), 0);

    let rev_reg_def_id = result.rev_reg_def_id();
    let finished = setup
        .registries
        .finish_registration(&job_id, &rev_reg_def_id)
        .await
        .unwrap();
    assert_eq!(finished.state, RevocationRegistryDefinitionState::Finished);
    assert_eq!(finished.key, rev_reg_def_id.0);

    // both records were re-keyed: the finished event provisioned the
    // registry end to end
    assert_eq!(setup.tails_server.upload_count(), 1);
    assert!(setup
        .lists
        .get_revocation_list(&rev_reg_def_id)
        .await
        .is_ok());
    let active = setup
        .registries
        .get_active_registry(&setup.cred_def_id)
        .await
        .unwrap();
    assert_eq!(active.key, rev_reg_def_id.0);

    // completion is not idempotent: a second call finds nothing under the
    // job id and fails cleanly
    let err = setup
        .registries
        .finish_registration(&job_id, &rev_reg_def_id)
        .await
        .unwrap_err();
    assert!(matches!(err, IssuanceError::NotFound(_)));
}

#[tokio::test]
async fn set_active_registry_demotes_the_previous_active() {
    let setup = build_provisioned_setup(5).await;

    let active = setup
        .registries
        .get_active_registry(&setup.cred_def_id)
        .await
        .unwrap();
    let registries = setup
        .registries
        .get_created_registries(&setup.cred_def_id, None)
        .await
        .unwrap();
    assert_eq!(registries.len(), 2);
    let backup = registries
        .iter()
        .find(|result| result.key != active.key)
        .unwrap();

    setup
        .registries
        .set_active_registry(&backup.rev_reg_def.id)
        .await
        .unwrap();

    let registries = setup
        .registries
        .get_created_registries(&setup.cred_def_id, None)
        .await
        .unwrap();
    let actives: Vec<_> = registries.iter().filter(|r| r.active).collect();
    assert_eq!(actives.len(), 1);
    assert_eq!(actives[0].key, backup.key);
}

#[tokio::test]
async fn set_active_registry_is_a_no_op_for_the_current_active() {
    let setup = build_provisioned_setup(5).await;

    let active = setup
        .registries
        .get_active_registry(&setup.cred_def_id)
        .await
        .unwrap();
    setup
        .registries
        .set_active_registry(&active.rev_reg_def.id)
        .await
        .unwrap();

    let resolved = setup
        .registries
        .get_active_registry(&setup.cred_def_id)
        .await
        .unwrap();
    assert_eq!(resolved.key, active.key);
}

#[tokio::test]
async fn handle_full_registry_promotes_the_backup_and_replaces_it() {
    let setup = build_provisioned_setup(2).await;

    let active = setup
        .registries
        .get_active_registry(&setup.cred_def_id)
        .await
        .unwrap();

    let promoted = setup
        .registries
        .handle_full_registry(&active.rev_reg_def.id)
        .await
        .unwrap();
    assert_ne!(promoted.key, active.key);

    let registries = setup
        .registries
        .get_created_registries(&setup.cred_def_id, None)
        .await
        .unwrap();
    let old = registries.iter().find(|r| r.key == active.key).unwrap();
    assert_eq!(old.state, RevocationRegistryDefinitionState::Full);
    assert!(!old.active);

    let now_active = setup
        .registries
        .get_active_registry(&setup.cred_def_id)
        .await
        .unwrap();
    assert_eq!(now_active.key, promoted.key);

    // a replacement backup was provisioned before returning: one finished
    // non-active sibling is available for the next rotation
    let finished = setup
        .registries
        .get_created_registries(
            &setup.cred_def_id,
            Some(RevocationRegistryDefinitionState::Finished),
        )
        .await
        .unwrap();
    let backups: Vec<_> = finished.iter().filter(|r| !r.active).collect();
    assert_eq!(backups.len(), 1);
    assert!(setup
        .lists
        .get_revocation_list(&backups[0].rev_reg_def.id)
        .await
        .is_ok());
}

#[tokio::test]
async fn handle_full_registry_without_backup_fails_fast() {
    let setup = build_issuance_setup().await;

    // a single registry, no pre-provisioned sibling
    let only = setup
        .registries
        .create_and_register(
            &setup.issuer_id,
            &setup.cred_def_id,
            RegistryType::CL_ACCUM,
            "tag0",
            2,
        )
        .await
        .unwrap();

    let err = setup
        .registries
        .handle_full_registry(&only.rev_reg_def.id)
        .await
        .unwrap_err();
    match err {
        IssuanceError::Revocation(msg) => assert!(msg.contains("no backup registry")),
        other => panic!("expected Revocation, got {other:?}"),
    }

    // the failed rotation left the registry untouched
    let registries = setup
        .registries
        .get_created_registries(&setup.cred_def_id, None)
        .await
        .unwrap();
    assert_eq!(
        registries[0].state,
        RevocationRegistryDefinitionState::Finished
    );
    assert!(registries[0].active);
}

#[tokio::test]
async fn decommission_retires_everything_and_provisions_replacements() {
    let setup = build_provisioned_setup(5).await;

    let before = setup
        .registries
        .get_created_registries(&setup.cred_def_id, None)
        .await
        .unwrap();
    assert_eq!(before.len(), 2);

    let replacement = setup
        .registries
        .decommission_registry(&setup.cred_def_id)
        .await
        .unwrap();

    let after = setup
        .registries
        .get_created_registries(&setup.cred_def_id, None)
        .await
        .unwrap();
    assert_eq!(after.len(), 4);

    let decommissioned: Vec<_> = after
        .iter()
        .filter(|r| r.state == RevocationRegistryDefinitionState::Decommissioned)
        .collect();
    assert_eq!(decommissioned.len(), 2);
    assert!(decommissioned.iter().all(|r| !r.active));
    assert!(before
        .iter()
        .all(|old| decommissioned.iter().any(|d| d.key == old.key)));

    let active = setup
        .registries
        .get_active_registry(&setup.cred_def_id)
        .await
        .unwrap();
    assert_eq!(active.key, replacement.key);
}

#[tokio::test]
async fn get_active_registry_heals_an_active_sibling_anomaly() {
    let setup = build_provisioned_setup(5).await;

    let active = setup
        .registries
        .get_active_registry(&setup.cred_def_id)
        .await
        .unwrap();
    let registries = setup
        .registries
        .get_created_registries(&setup.cred_def_id, None)
        .await
        .unwrap();
    let backup = registries.iter().find(|r| r.key != active.key).unwrap();

    // forge the anomaly: tag the backup active without demoting the winner
    {
        let mut txn = setup.store.transaction().await.unwrap();
        let record = txn
            .fetch(RecordCategory::RevRegDef, &backup.key, true)
            .await
            .unwrap()
            .unwrap();
        let mut def = RevRegDefRecord::from_record(&record).unwrap();
        def.active = true;
        txn.replace(def.to_record(&backup.key).unwrap()).await.unwrap();
        txn.commit().await.unwrap();
    }

    let expected_winner = std::cmp::min(active.key.clone(), backup.key.clone());
    let resolved = setup
        .registries
        .get_active_registry(&setup.cred_def_id)
        .await
        .unwrap();
    assert_eq!(resolved.key, expected_winner);

    // the anomaly was healed: exactly one registry is still tagged active
    let registries = setup
        .registries
        .get_created_registries(&setup.cred_def_id, None)
        .await
        .unwrap();
    let actives: Vec<_> = registries.iter().filter(|r| r.active).collect();
    assert_eq!(actives.len(), 1);
    assert_eq!(actives[0].key, expected_winner);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn provisioning_retries_transient_tails_upload_failures() {
    let setup = build_custom_setup(
        std::sync::Arc::new(MockCryptoEngine),
        MockRegistrar::new(),
        MockTailsServer::failing_times(2),
    )
    .await;

    setup
        .setup
        .on_credential_definition_finished(&setup.cred_def_id, &setup.issuer_id, Some(5))
        .await
        .unwrap();

    // the first upload absorbed both transient failures, both registries
    // ended up published
    assert_eq!(setup.tails_server.upload_count(), 2);
    assert!(setup
        .registries
        .get_active_registry(&setup.cred_def_id)
        .await
        .is_ok());
}

#[tokio::test]
async fn a_mislocated_tails_upload_leaves_the_registry_unprovisioned() {
    let setup = build_custom_setup(
        std::sync::Arc::new(MockCryptoEngine),
        MockRegistrar::new(),
        MockTailsServer::reporting_wrong_location(),
    )
    .await;

    // registry creation itself succeeds; the cascaded provisioning fails on
    // the location check and is only logged
    let result = setup
        .registries
        .create_and_register(
            &setup.issuer_id,
            &setup.cred_def_id,
            RegistryType::CL_ACCUM,
            "tag0",
            5,
        )
        .await
        .unwrap();
    assert_eq!(result.state, RevocationRegistryDefinitionState::Finished);

    // no list was registered and nothing became active
    assert!(setup
        .lists
        .get_revocation_list(&result.rev_reg_def_id())
        .await
        .is_err());
    assert!(setup
        .registries
        .get_active_registry(&setup.cred_def_id)
        .await
        .is_err());
}

#[tokio::test]
async fn get_active_registry_fails_when_none_is_provisioned() {
    let setup = build_issuance_setup().await;

    let err = setup
        .registries
        .get_active_registry(&setup.cred_def_id)
        .await
        .unwrap_err();
    assert!(matches!(err, IssuanceError::Revocation(_)));
}

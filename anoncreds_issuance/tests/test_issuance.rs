use std::{collections::HashMap, sync::Arc};

use anoncreds_issuance::{
    errors::error::IssuanceError,
    issuer::CredentialIssuanceRequest,
    revocation::records::IssuerCredRevRecord,
};
use anoncreds_issuance_store::store::base_store::{
    record_category::RecordCategory, BaseStore, StoreSession,
};
use anoncreds_issuance_types::data_types::{
    ledger::rev_reg_def::RevocationRegistryDefinitionState,
    messages::{
        cred_offer::CredentialOffer,
        cred_request::CredentialRequest,
        credential::{CredentialValue, CredentialValues},
    },
};
use serde_json::json;
use test_utils::devsetup::{build_provisioned_setup, IssuanceTestSetup};

fn issuance_request(setup: &IssuanceTestSetup) -> CredentialIssuanceRequest {
    let mut values = HashMap::new();
    values.insert(
        "name".to_string(),
        CredentialValue {
            raw: "alice".into(),
            encoded: "27034640024117331033063128044004318218486816931520886405535659934417438781507"
                .into(),
        },
    );
    CredentialIssuanceRequest {
        cred_def_id: setup.cred_def_id.clone(),
        cred_offer: CredentialOffer(json!({ "nonce": "1234567890", "key_correctness_proof": {} })),
        cred_request: CredentialRequest(json!({ "blinded_ms": {}, "nonce": "0987654321" })),
        cred_values: CredentialValues(values),
        cred_ex_id: None,
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_allocations_yield_distinct_indices() {
    let setup = Arc::new(build_provisioned_setup(16).await);
    let rev_reg_def_id = setup
        .registries
        .get_active_registry(&setup.cred_def_id)
        .await
        .unwrap()
        .rev_reg_def_id();

    let mut handles = Vec::new();
    for _ in 0..8 {
        let setup = Arc::clone(&setup);
        let rev_reg_def_id = rev_reg_def_id.clone();
        handles.push(tokio::spawn(async move {
            setup.issuer.allocate_index(&rev_reg_def_id).await.unwrap().index
        }));
    }

    let mut indices = Vec::new();
    for handle in handles {
        indices.push(handle.await.unwrap());
    }
    indices.sort_unstable();

    // exactly N distinct indices, all within capacity
    assert_eq!(indices, (1..=8).collect::<Vec<u32>>());

    // the cursor moved monotonically to one past the last allocation
    let list = setup.lists.get_revocation_list(&rev_reg_def_id).await.unwrap();
    assert_eq!(list.next_index, 9);
}

#[tokio::test]
async fn allocation_against_a_full_registry_fails_before_rotation() {
    let setup = build_provisioned_setup(2).await;
    let rev_reg_def_id = setup
        .registries
        .get_active_registry(&setup.cred_def_id)
        .await
        .unwrap()
        .rev_reg_def_id();

    assert_eq!(setup.issuer.allocate_index(&rev_reg_def_id).await.unwrap().index, 1);
    assert_eq!(setup.issuer.allocate_index(&rev_reg_def_id).await.unwrap().index, 2);

    let err = setup.issuer.allocate_index(&rev_reg_def_id).await.unwrap_err();
    assert!(matches!(err, IssuanceError::RevocationRegistryFull(_)));

    // the stored state flips to full only once handle_full_registry ran,
    // not on the failed allocation itself
    let registries = setup
        .registries
        .get_created_registries(&setup.cred_def_id, None)
        .await
        .unwrap();
    let full = registries.iter().find(|r| r.key == rev_reg_def_id.0).unwrap();
    assert_eq!(full.state, RevocationRegistryDefinitionState::Finished);

    setup
        .registries
        .handle_full_registry(&rev_reg_def_id)
        .await
        .unwrap();
    let registries = setup
        .registries
        .get_created_registries(&setup.cred_def_id, None)
        .await
        .unwrap();
    let full = registries.iter().find(|r| r.key == rev_reg_def_id.0).unwrap();
    assert_eq!(full.state, RevocationRegistryDefinitionState::Full);
}

#[tokio::test]
async fn create_credential_reserves_a_slot_and_records_the_exchange() {
    let setup = build_provisioned_setup(5).await;
    let active = setup
        .registries
        .get_active_registry(&setup.cred_def_id)
        .await
        .unwrap();

    let issued = setup
        .issuer
        .create_credential(&issuance_request(&setup))
        .await
        .unwrap();

    assert_eq!(issued.cred_rev_id, 1);
    assert_eq!(issued.rev_reg_def_id, active.rev_reg_def_id());

    let mut session = setup.store.session().await.unwrap();
    let record = session
        .fetch(RecordCategory::IssuerCredRev, &issued.cred_ex_id, false)
        .await
        .unwrap()
        .unwrap();
    let cred_rev = IssuerCredRevRecord::from_record(&record).unwrap();
    assert_eq!(cred_rev.cred_rev_id, 1);
    assert_eq!(cred_rev.rev_reg_def_id, issued.rev_reg_def_id);
}

#[tokio::test]
async fn issuance_rotates_after_consuming_the_final_slot() {
    let setup = build_provisioned_setup(2).await;
    let first_active = setup
        .registries
        .get_active_registry(&setup.cred_def_id)
        .await
        .unwrap();

    let request = issuance_request(&setup);
    let first = setup.issuer.create_credential(&request).await.unwrap();
    let second = setup.issuer.create_credential(&request).await.unwrap();
    assert_eq!(first.cred_rev_id, 1);
    assert_eq!(second.cred_rev_id, 2);
    assert_eq!(second.rev_reg_def_id, first_active.rev_reg_def_id());

    // consuming the final slot rotated proactively: the next issuance runs
    // against the promoted backup, starting at its own cursor
    let third = setup.issuer.create_credential(&request).await.unwrap();
    assert_ne!(third.rev_reg_def_id, first_active.rev_reg_def_id());
    assert_eq!(third.cred_rev_id, 1);

    let registries = setup
        .registries
        .get_created_registries(&setup.cred_def_id, None)
        .await
        .unwrap();
    let old = registries.iter().find(|r| r.key == first_active.key).unwrap();
    assert_eq!(old.state, RevocationRegistryDefinitionState::Full);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn create_credential_retries_after_discovering_a_full_registry() {
    let setup = build_provisioned_setup(2).await;
    let first_active = setup
        .registries
        .get_active_registry(&setup.cred_def_id)
        .await
        .unwrap();
    let rev_reg_def_id = first_active.rev_reg_def_id();

    // exhaust the active registry without triggering the proactive
    // rotation of the issuance path
    setup.issuer.allocate_index(&rev_reg_def_id).await.unwrap();
    setup.issuer.allocate_index(&rev_reg_def_id).await.unwrap();

    // the first attempt hits the full registry, rotates, and the retry
    // succeeds against the promoted backup
    let issued = setup
        .issuer
        .create_credential(&issuance_request(&setup))
        .await
        .unwrap();
    assert_ne!(issued.rev_reg_def_id, rev_reg_def_id);
    assert_eq!(issued.cred_rev_id, 1);
}

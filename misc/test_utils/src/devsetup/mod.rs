use std::{path::PathBuf, sync::Arc};

use anoncreds_issuance::{
    config::IssuanceConfig,
    engine::base_engine::BaseCryptoEngine,
    errors::error::{IssuanceError, IssuanceResult},
    events::{BaseEventNotifier, EventRelay},
    issuer::CredentialIssuer,
    revocation::{
        list::RevocationListManager, publish::RevocationPublisher,
        registry::RevocationRegistryManager,
    },
    setup::RevocationSetup,
    tails::{BaseTailsServer, TailsManager},
};
use anoncreds_issuance_registry::registrar::base_registrar::BaseRegistrar;
use anoncreds_issuance_store::store::{
    base_store::{record::Record, record_category::RecordCategory, BaseStore, StoreTransaction},
    in_memory::InMemoryStore,
};
use anoncreds_issuance_types::data_types::{
    identifiers::{cred_def_id::CredentialDefinitionId, issuer_id::IssuerId},
    ledger::cred_def::{CredentialDefinition, CredentialDefinitionPrivate},
};
use serde_json::json;
use uuid::Uuid;

use crate::{
    logger::init_logger,
    mockdata::{
        mock_engine::MockCryptoEngine, mock_registrar::MockRegistrar,
        mock_tails_server::MockTailsServer,
    },
};

pub const DEFAULT_ISSUER_ID: &str = "did:web:example.org:issuer";

/// Fully wired issuance stack over the in-memory store and the mock
/// collaborators, with one revocable credential definition seeded.
#[derive(Debug)]
pub struct IssuanceTestSetup {
    pub store: Arc<InMemoryStore>,
    pub registrar: Arc<MockRegistrar>,
    pub tails_server: Arc<MockTailsServer>,
    pub config: IssuanceConfig,
    pub registries: Arc<RevocationRegistryManager>,
    pub lists: Arc<RevocationListManager>,
    pub publisher: Arc<RevocationPublisher>,
    pub issuer: Arc<CredentialIssuer>,
    pub setup: Arc<RevocationSetup>,
    pub issuer_id: IssuerId,
    pub cred_def_id: CredentialDefinitionId,
    pub tails_dir: PathBuf,
}

/// Build the stack. Events emitted by the managers cascade into
/// [`RevocationSetup`] through an [`EventRelay`], the way a deployed event
/// bus would route them.
pub async fn build_issuance_setup() -> IssuanceTestSetup {
    build_custom_setup(Arc::new(MockCryptoEngine), MockRegistrar::new(), MockTailsServer::new())
        .await
}

/// [`build_issuance_setup`] with caller-supplied collaborator doubles, for
/// tests that need a deferred registrar, a failing tails server or an
/// engine wrapper.
pub async fn build_custom_setup(
    engine: Arc<dyn BaseCryptoEngine>,
    registrar: MockRegistrar,
    tails_server: MockTailsServer,
) -> IssuanceTestSetup {
    init_logger();

    let tails_dir = std::env::temp_dir().join(format!("tails-{}", Uuid::new_v4()));
    let config = IssuanceConfig::new("https://tails.example.org", &tails_dir, 5)
        .expect("static test config must be valid");

    let store = Arc::new(InMemoryStore::new());
    let registrar = Arc::new(registrar);
    let tails_server = Arc::new(tails_server);
    let relay = Arc::new(EventRelay::new());

    let dyn_store: Arc<dyn BaseStore> = store.clone();
    let dyn_engine: Arc<dyn BaseCryptoEngine> = engine;
    let dyn_registrar: Arc<dyn BaseRegistrar> = registrar.clone();
    let dyn_notifier: Arc<dyn BaseEventNotifier> = relay.clone();
    let dyn_tails_server: Arc<dyn BaseTailsServer> = tails_server.clone();

    let registries = Arc::new(RevocationRegistryManager::new(
        dyn_store.clone(),
        dyn_engine.clone(),
        dyn_registrar.clone(),
        dyn_notifier.clone(),
        config.clone(),
    ));
    let lists = Arc::new(RevocationListManager::new(
        dyn_store.clone(),
        dyn_engine.clone(),
        dyn_registrar.clone(),
        dyn_notifier.clone(),
    ));
    let tails = Arc::new(TailsManager::new(config.clone()));
    let publisher = Arc::new(RevocationPublisher::new(
        dyn_store.clone(),
        dyn_engine.clone(),
        dyn_registrar.clone(),
        dyn_notifier.clone(),
        lists.clone(),
    ));
    let issuer = Arc::new(CredentialIssuer::new(
        dyn_store.clone(),
        dyn_engine.clone(),
        registries.clone(),
        tails.clone(),
    ));
    let setup = Arc::new(RevocationSetup::new(
        registries.clone(),
        lists.clone(),
        tails,
        dyn_tails_server,
        config.clone(),
    ));
    relay.set_target(setup.clone()).await;

    let issuer_id = IssuerId::new_unchecked(DEFAULT_ISSUER_ID);
    let cred_def_id = CredentialDefinitionId::new_unchecked(format!(
        "{DEFAULT_ISSUER_ID}/cred-def/{}",
        Uuid::new_v4()
    ));
    seed_cred_def(store.as_ref(), &cred_def_id, &issuer_id)
        .await
        .expect("seeding the credential definition must succeed");

    IssuanceTestSetup {
        store,
        registrar,
        tails_server,
        config,
        registries,
        lists,
        publisher,
        issuer,
        setup,
        issuer_id,
        cred_def_id,
        tails_dir,
    }
}

/// [`build_issuance_setup`] plus the credential-definition-finished event,
/// leaving one active registry of the given capacity and one backup, both
/// with uploaded tails files and registered lists.
pub async fn build_provisioned_setup(max_cred_num: u32) -> IssuanceTestSetup {
    let setup = build_issuance_setup().await;
    setup
        .setup
        .on_credential_definition_finished(
            &setup.cred_def_id,
            &setup.issuer_id,
            Some(max_cred_num),
        )
        .await
        .expect("provisioning registries must succeed");
    setup
}

/// Store the public and private halves of a mock credential definition
/// under the given id, as the out-of-scope credential-definition flow
/// would have.
pub async fn seed_cred_def(
    store: &InMemoryStore,
    cred_def_id: &CredentialDefinitionId,
    issuer_id: &IssuerId,
) -> IssuanceResult<()> {
    let cred_def = CredentialDefinition {
        id: cred_def_id.clone(),
        schema_id: format!("{issuer_id}/schema/0"),
        signature_type: "CL".into(),
        tag: "default".into(),
        issuer_id: issuer_id.clone(),
        value: json!({ "primary": { "n": "mock", "s": "mock", "z": "mock" } }),
    };
    let cred_def_private = CredentialDefinitionPrivate {
        value: json!({ "p_key": "mock", "r_key": null }),
    };

    let mut txn = store
        .transaction()
        .await
        .map_err(|err| IssuanceError::from_store("failed to open store transaction", err))?;
    txn.insert(
        Record::builder()
            .category(RecordCategory::CredDef)
            .name(cred_def_id.0.clone())
            .value(serde_json::to_string(&cred_def)?)
            .build(),
    )
    .await
    .map_err(|err| IssuanceError::from_store("failed to seed credential definition", err))?;
    txn.insert(
        Record::builder()
            .category(RecordCategory::CredDefPriv)
            .name(cred_def_id.0.clone())
            .value(serde_json::to_string(&cred_def_private)?)
            .build(),
    )
    .await
    .map_err(|err| {
        IssuanceError::from_store("failed to seed credential definition private key", err)
    })?;
    txn.commit()
        .await
        .map_err(|err| {
            IssuanceError::from_store("failed to commit seeded credential definition", err)
        })?;
    Ok(())
}

use std::sync::Arc;

use anoncreds_issuance_types::data_types::{
    identifiers::{
        cred_def_id::CredentialDefinitionId, issuer_id::IssuerId,
        rev_reg_def_id::RevocationRegistryDefinitionId,
    },
    ledger::rev_reg_def::{RegistryType, RevocationRegistryDefinitionState},
};
use async_trait::async_trait;
use uuid::Uuid;

use crate::{
    config::IssuanceConfig,
    errors::error::{IssuanceError, IssuanceResult},
    events::{BaseEventNotifier, IssuanceEvent},
    revocation::{list::RevocationListManager, registry::RevocationRegistryManager},
    tails::{BaseTailsServer, TailsManager},
};

/// Event-driven provisioning: keeps every revocable credential definition
/// supplied with an active registry and one pre-provisioned backup, and
/// finishes freshly registered registries (tails upload, initial list,
/// activation).
///
/// Intended to be attached as the managers' event subscriber (see
/// [`crate::events::EventRelay`]): registry creation then cascades into
/// list provisioning through the emitted events.
#[derive(Debug)]
pub struct RevocationSetup {
    registries: Arc<RevocationRegistryManager>,
    lists: Arc<RevocationListManager>,
    tails: Arc<TailsManager>,
    tails_server: Arc<dyn BaseTailsServer>,
    config: IssuanceConfig,
}

impl RevocationSetup {
    pub fn new(
        registries: Arc<RevocationRegistryManager>,
        lists: Arc<RevocationListManager>,
        tails: Arc<TailsManager>,
        tails_server: Arc<dyn BaseTailsServer>,
        config: IssuanceConfig,
    ) -> Self {
        Self {
            registries,
            lists,
            tails,
            tails_server,
            config,
        }
    }

    pub async fn handle_event(&self, event: &IssuanceEvent) -> IssuanceResult<()> {
        match event {
            IssuanceEvent::CredentialDefinitionFinished {
                cred_def_id,
                issuer_id,
                support_revocation,
                max_cred_num,
            } => {
                if !support_revocation {
                    debug!(
                        "handle_event >>> credential definition {cred_def_id} does not support \
                         revocation, nothing to provision"
                    );
                    return Ok(());
                }
                self.on_credential_definition_finished(cred_def_id, issuer_id, *max_cred_num)
                    .await
            }
            IssuanceEvent::RevocationRegistryDefinitionFinished {
                cred_def_id,
                rev_reg_def_id,
            } => {
                self.on_registry_definition_finished(cred_def_id, rev_reg_def_id)
                    .await
            }
            IssuanceEvent::RevocationListFinished { rev_reg_def_id } => {
                debug!("handle_event >>> revocation list finished for {rev_reg_def_id}");
                Ok(())
            }
            IssuanceEvent::RevocationListUpdated {
                rev_reg_def_id,
                revoked,
            } => {
                debug!(
                    "handle_event >>> revocation list updated for {rev_reg_def_id}, {} index(es)",
                    revoked.len()
                );
                Ok(())
            }
        }
    }

    /// Provision the initial active registry plus one backup for a freshly
    /// finished revocable credential definition.
    pub async fn on_credential_definition_finished(
        &self,
        cred_def_id: &CredentialDefinitionId,
        issuer_id: &IssuerId,
        max_cred_num: Option<u32>,
    ) -> IssuanceResult<()> {
        info!(
            "RevocationSetup::on_credential_definition_finished >>> provisioning registries for \
             {cred_def_id}"
        );
        let max_cred_num = max_cred_num.unwrap_or(self.config.default_max_cred_num());

        for _ in 0..2 {
            self.registries
                .create_and_register(
                    issuer_id,
                    cred_def_id,
                    RegistryType::CL_ACCUM,
                    &Uuid::new_v4().to_string(),
                    max_cred_num,
                )
                .await?;
        }
        Ok(())
    }

    /// Finish a registry whose definition registration completed: upload
    /// the tails file, create and register the initial list, and activate
    /// the registry if its credential definition has no active one yet.
    /// Safe to re-run for an already provisioned registry.
    pub async fn on_registry_definition_finished(
        &self,
        cred_def_id: &CredentialDefinitionId,
        rev_reg_def_id: &RevocationRegistryDefinitionId,
    ) -> IssuanceResult<()> {
        info!(
            "RevocationSetup::on_registry_definition_finished >>> provisioning {rev_reg_def_id}"
        );

        let registries = self
            .registries
            .get_created_registries(
                cred_def_id,
                Some(RevocationRegistryDefinitionState::Finished),
            )
            .await?;
        let def = registries
            .into_iter()
            .find(|result| result.key == rev_reg_def_id.0)
            .ok_or_else(|| {
                IssuanceError::NotFound(format!(
                    "finished revocation registry definition {rev_reg_def_id}"
                ))
            })?;

        self.tails
            .upload(&def.rev_reg_def, self.tails_server.as_ref())
            .await?;

        match self.lists.get_revocation_list(rev_reg_def_id).await {
            Ok(_) => debug!(
                "on_registry_definition_finished >>> list for {rev_reg_def_id} already exists"
            ),
            Err(IssuanceError::NotFound(_)) => {
                self.lists.create_and_register(rev_reg_def_id).await?;
            }
            Err(err) => return Err(err),
        }

        match self.registries.get_active_registry(cred_def_id).await {
            Ok(active) => debug!(
                "on_registry_definition_finished >>> {} already active for {cred_def_id}, \
                 keeping {rev_reg_def_id} as backup",
                active.key
            ),
            Err(IssuanceError::Revocation(_)) => {
                self.registries.set_active_registry(rev_reg_def_id).await?;
            }
            Err(err) => return Err(err),
        }

        Ok(())
    }
}

#[async_trait]
impl BaseEventNotifier for RevocationSetup {
    async fn notify(&self, event: IssuanceEvent) -> IssuanceResult<()> {
        self.handle_event(&event).await
    }
}

use anoncreds_issuance_types::data_types::identifiers::{
    cred_def_id::CredentialDefinitionId, issuer_id::IssuerId,
    rev_reg_def_id::RevocationRegistryDefinitionId,
};
use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::errors::error::IssuanceResult;

#[derive(Clone, Debug, PartialEq)]
pub enum IssuanceEvent {
    CredentialDefinitionFinished {
        cred_def_id: CredentialDefinitionId,
        issuer_id: IssuerId,
        support_revocation: bool,
        max_cred_num: Option<u32>,
    },
    RevocationRegistryDefinitionFinished {
        cred_def_id: CredentialDefinitionId,
        rev_reg_def_id: RevocationRegistryDefinitionId,
    },
    RevocationListFinished {
        rev_reg_def_id: RevocationRegistryDefinitionId,
    },
    RevocationListUpdated {
        rev_reg_def_id: RevocationRegistryDefinitionId,
        revoked: Vec<u32>,
    },
}

/// Pub/sub seam towards downstream listeners. Emission is best-effort:
/// managers log and carry on when a notifier fails.
#[async_trait]
pub trait BaseEventNotifier: std::fmt::Debug + Send + Sync {
    async fn notify(&self, event: IssuanceEvent) -> IssuanceResult<()>;
}

#[derive(Debug, Default)]
pub struct NoopNotifier;

#[async_trait]
impl BaseEventNotifier for NoopNotifier {
    async fn notify(&self, _event: IssuanceEvent) -> IssuanceResult<()> {
        Ok(())
    }
}

/// Late-bound forwarder. Managers are constructed against the relay, the
/// subscriber (typically [`crate::setup::RevocationSetup`]) is attached once
/// the managers exist. Events emitted before a target is attached are
/// dropped with a debug log.
#[derive(Debug, Default)]
pub struct EventRelay {
    target: RwLock<Option<std::sync::Arc<dyn BaseEventNotifier>>>,
}

impl EventRelay {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn set_target(&self, target: std::sync::Arc<dyn BaseEventNotifier>) {
        *self.target.write().await = Some(target);
    }
}

#[async_trait]
impl BaseEventNotifier for EventRelay {
    async fn notify(&self, event: IssuanceEvent) -> IssuanceResult<()> {
        let target = self.target.read().await.clone();
        match target {
            Some(target) => target.notify(event).await,
            None => {
                debug!("EventRelay::notify >>> no subscriber attached, dropping {event:?}");
                Ok(())
            }
        }
    }
}

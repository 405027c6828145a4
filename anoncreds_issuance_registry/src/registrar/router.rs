use std::{collections::HashMap, sync::Arc};

use anoncreds_issuance_types::data_types::{
    identifiers::issuer_id::IssuerId,
    ledger::{rev_reg_def::RevocationRegistryDefinition, rev_status_list::RevocationStatusList},
};
use async_trait::async_trait;

use super::base_registrar::{
    BaseRegistrar, RegistrationOptions, RevListRegistrationResult, RevRegDefRegistrationResult,
};
use crate::errors::error::{RegistrarError, RegistrarResult};

/// Closed set of supported registry backends. The kind is derived from the
/// issuer identifier's method once, at routing time, by prefix; there is no
/// runtime pattern discovery.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum RegistrarKind {
    Indy,
    Web,
    Legacy,
}

impl RegistrarKind {
    pub fn for_issuer(issuer_id: &IssuerId) -> RegistrarResult<Self> {
        if issuer_id.0.starts_with("did:indy:") || issuer_id.0.starts_with("did:sov:") {
            Ok(Self::Indy)
        } else if issuer_id.0.starts_with("did:web:") {
            Ok(Self::Web)
        } else if issuer_id.is_legacy() {
            Ok(Self::Legacy)
        } else {
            Err(RegistrarError::UnsupportedIdentifier(issuer_id.to_string()))
        }
    }
}

impl std::fmt::Display for RegistrarKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let kind = match self {
            Self::Indy => "indy",
            Self::Web => "web",
            Self::Legacy => "legacy",
        };
        write!(f, "{kind}")
    }
}

/// Registry of registrar strategies, populated once at configuration time.
/// The router itself implements [`BaseRegistrar`] by delegating to the
/// strategy matching the submitted object's issuer.
#[derive(Debug, Default)]
pub struct RegistrarRouter {
    strategies: HashMap<RegistrarKind, Arc<dyn BaseRegistrar>>,
}

impl RegistrarRouter {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn register(mut self, kind: RegistrarKind, registrar: Arc<dyn BaseRegistrar>) -> Self {
        self.strategies.insert(kind, registrar);
        self
    }

    fn resolve(&self, issuer_id: &IssuerId) -> RegistrarResult<&Arc<dyn BaseRegistrar>> {
        let kind = RegistrarKind::for_issuer(issuer_id)?;
        trace!("RegistrarRouter::resolve >>> issuer_id: {issuer_id}, kind: {kind}");
        self.strategies.get(&kind).ok_or_else(|| {
            RegistrarError::UnsupportedIdentifier(format!(
                "no registrar configured for kind: {kind}"
            ))
        })
    }
}

#[async_trait]
impl BaseRegistrar for RegistrarRouter {
    async fn register_revocation_registry_definition(
        &self,
        rev_reg_def: &RevocationRegistryDefinition,
        options: &RegistrationOptions,
    ) -> RegistrarResult<RevRegDefRegistrationResult> {
        self.resolve(&rev_reg_def.issuer_id)?
            .register_revocation_registry_definition(rev_reg_def, options)
            .await
    }

    async fn register_revocation_list(
        &self,
        rev_reg_def: &RevocationRegistryDefinition,
        rev_list: &RevocationStatusList,
        options: &RegistrationOptions,
    ) -> RegistrarResult<RevListRegistrationResult> {
        self.resolve(&rev_reg_def.issuer_id)?
            .register_revocation_list(rev_reg_def, rev_list, options)
            .await
    }

    async fn update_revocation_list(
        &self,
        rev_reg_def: &RevocationRegistryDefinition,
        prev_list: &RevocationStatusList,
        curr_list: &RevocationStatusList,
        revoked: &[u32],
        options: &RegistrationOptions,
    ) -> RegistrarResult<RevListRegistrationResult> {
        self.resolve(&rev_reg_def.issuer_id)?
            .update_revocation_list(rev_reg_def, prev_list, curr_list, revoked, options)
            .await
    }
}

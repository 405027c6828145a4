use crate::{
    data_types::identifiers::{cred_def_id::CredentialDefinitionId, issuer_id::IssuerId},
    error::ValidationError,
    utils::validation::Validatable,
};

/// Public credential definition as resolvable from the ledger. The key
/// material under `value` is opaque to this workspace, only the crypto
/// engine interprets it.
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CredentialDefinition {
    pub id: CredentialDefinitionId,
    pub schema_id: String,
    #[serde(rename = "type")]
    pub signature_type: String,
    pub tag: String,
    pub issuer_id: IssuerId,
    pub value: serde_json::Value,
}

impl Validatable for CredentialDefinition {
    fn validate(&self) -> Result<(), ValidationError> {
        self.id.validate()?;
        self.issuer_id.validate()?;

        Ok(())
    }
}

/// Private counterpart of a [`CredentialDefinition`]; opaque key material
/// consumed by the crypto engine at issuance time.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct CredentialDefinitionPrivate {
    pub value: serde_json::Value,
}

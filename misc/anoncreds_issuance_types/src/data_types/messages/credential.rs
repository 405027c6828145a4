use std::collections::HashMap;

/// Attribute name to raw/encoded value mapping signed into a credential.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
#[serde(transparent)]
pub struct CredentialValues(pub HashMap<String, CredentialValue>);

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct CredentialValue {
    pub raw: String,
    pub encoded: String,
}

/// Signed credential as returned by the crypto engine.
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(transparent)]
pub struct Credential(pub serde_json::Value);

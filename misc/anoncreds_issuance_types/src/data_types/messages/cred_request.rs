/// Credential request payload received from a holder, opaque outside the
/// crypto engine.
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(transparent)]
pub struct CredentialRequest(pub serde_json::Value);

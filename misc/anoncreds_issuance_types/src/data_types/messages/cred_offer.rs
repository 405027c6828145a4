/// Credential offer payload exchanged with a holder. Produced and consumed
/// by the crypto engine; carried through this workspace verbatim.
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(transparent)]
pub struct CredentialOffer(pub serde_json::Value);

use bitvec::vec::BitVec;

use crate::data_types::identifiers::{
    issuer_id::IssuerId, rev_reg_def_id::RevocationRegistryDefinitionId,
};

/// Accumulator-backed revocation list for a single revocation registry.
///
/// `revocation_list` holds one bit per credential slot (1 = revoked) and is
/// zero-based, while credential revocation ids handed out by the issuance
/// path are one-based: cred_rev_id `i` maps to bit `i - 1`.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RevocationStatusList {
    pub rev_reg_def_id: RevocationRegistryDefinitionId,
    pub issuer_id: IssuerId,
    #[serde(with = "serde_revocation_list")]
    pub revocation_list: BitVec,
    pub current_accumulator: String,
    pub timestamp: u64,
}

impl RevocationStatusList {
    pub fn new(
        rev_reg_def_id: RevocationRegistryDefinitionId,
        issuer_id: IssuerId,
        revocation_list: BitVec,
        current_accumulator: String,
        timestamp: u64,
    ) -> Self {
        Self {
            rev_reg_def_id,
            issuer_id,
            revocation_list,
            current_accumulator,
            timestamp,
        }
    }

    pub fn max_cred_num(&self) -> u32 {
        self.revocation_list.len() as u32
    }

    /// Whether the one-based credential revocation id is revoked.
    pub fn is_revoked(&self, cred_rev_id: u32) -> bool {
        if cred_rev_id == 0 {
            return false;
        }
        self.revocation_list
            .get((cred_rev_id - 1) as usize)
            .map(|bit| *bit)
            .unwrap_or(false)
    }

    /// Set the bit backing the one-based credential revocation id.
    /// Out-of-range ids are ignored.
    pub fn set_revoked(&mut self, cred_rev_id: u32) {
        if cred_rev_id == 0 {
            return;
        }
        let idx = (cred_rev_id - 1) as usize;
        if idx < self.revocation_list.len() {
            self.revocation_list.set(idx, true);
        }
    }
}

pub mod serde_revocation_list {
    use bitvec::vec::BitVec;
    use serde::{
        de::{Deserializer, Error as DeError, SeqAccess, Visitor},
        ser::{SerializeSeq, Serializer},
    };

    pub fn serialize<S>(state: &BitVec, s: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut seq = s.serialize_seq(Some(state.len()))?;
        for element in state {
            let element = u8::from(*element);
            seq.serialize_element(&element)?;
        }
        seq.end()
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<BitVec, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct JsonBitStringVisitor;

        impl<'de> Visitor<'de> for JsonBitStringVisitor {
            type Value = BitVec;

            fn expecting(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(formatter, "a sequence of 0s and 1s")
            }

            fn visit_seq<S>(self, mut v: S) -> Result<Self::Value, S::Error>
            where
                S: SeqAccess<'de>,
            {
                let mut bv = BitVec::with_capacity(v.size_hint().unwrap_or_default());
                while let Some(ele) = v.next_element::<u8>()? {
                    match ele {
                        0 => bv.push(false),
                        1 => bv.push(true),
                        other => {
                            return Err(S::Error::custom(format!(
                                "invalid revocation list entry: {other}"
                            )))
                        }
                    }
                }
                Ok(bv)
            }
        }

        deserializer.deserialize_seq(JsonBitStringVisitor)
    }
}

#[cfg(test)]
mod tests {
    use bitvec::bitvec;

    use super::*;

    fn test_list() -> RevocationStatusList {
        RevocationStatusList {
            rev_reg_def_id: RevocationRegistryDefinitionId::new_unchecked(
                "did:web:example.org:issuer/rev-reg/0",
            ),
            issuer_id: IssuerId::new_unchecked("did:web:example.org:issuer"),
            revocation_list: bitvec![0, 1, 0, 0],
            current_accumulator: "21 12E8C".to_string(),
            timestamp: 1_711_000_000,
        }
    }

    #[test]
    fn serializes_bits_as_integer_array() {
        let json = serde_json::to_value(test_list()).unwrap();
        assert_eq!(json["revocationList"], serde_json::json!([0, 1, 0, 0]));
    }

    #[test]
    fn round_trips_bit_for_bit() {
        let list = test_list();
        let json = serde_json::to_string(&list).unwrap();
        let restored: RevocationStatusList = serde_json::from_str(&json).unwrap();
        assert_eq!(restored, list);
    }

    #[test]
    fn rejects_non_binary_entries() {
        let json = serde_json::json!({
            "revRegDefId": "did:web:example.org:issuer/rev-reg/0",
            "issuerId": "did:web:example.org:issuer",
            "revocationList": [0, 2],
            "currentAccumulator": "21 12E8C",
            "timestamp": 0,
        });
        assert!(serde_json::from_value::<RevocationStatusList>(json).is_err());
    }

    #[test]
    fn one_based_ids_map_to_zero_based_bits() {
        let mut list = test_list();
        assert!(list.is_revoked(2));
        assert!(!list.is_revoked(1));

        list.set_revoked(1);
        assert!(list.revocation_list[0]);
        assert!(!list.is_revoked(0));
    }
}

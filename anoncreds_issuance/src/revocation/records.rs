use anoncreds_issuance_store::store::{
    base_store::{record::Record, record_category::RecordCategory, StoreSession},
    record_tags::{RecordTag, RecordTags},
};
use anoncreds_issuance_types::data_types::{
    identifiers::rev_reg_def_id::RevocationRegistryDefinitionId,
    ledger::{
        rev_reg_def::{RevocationRegistryDefinition, RevocationRegistryDefinitionState},
        rev_status_list::RevocationStatusList,
    },
};
use serde::{Deserialize, Serialize};

use crate::errors::error::{IssuanceError, IssuanceResult};

pub const TAG_STATE: &str = "state";
pub const TAG_CRED_DEF_ID: &str = "cred_def_id";
pub const TAG_ACTIVE: &str = "active";
pub const TAG_PENDING: &str = "pending";
pub const TAG_REV_REG_DEF_ID: &str = "rev_reg_def_id";
pub const TAG_CRED_REV_ID: &str = "cred_rev_id";

/// Fetch a record that must exist, wrapping store faults with a domain
/// message and mapping absence to [`IssuanceError::NotFound`].
pub(crate) async fn fetch_required<S>(
    session: &mut S,
    category: RecordCategory,
    name: &str,
    for_update: bool,
) -> IssuanceResult<Record>
where
    S: StoreSession + ?Sized,
{
    session
        .fetch(category, name, for_update)
        .await
        .map_err(|err| {
            IssuanceError::from_store(format!("failed to fetch {category} record {name}"), err)
        })?
        .ok_or_else(|| IssuanceError::NotFound(format!("{category} record {name}")))
}

fn parse_record<T: serde::de::DeserializeOwned>(record: &Record) -> IssuanceResult<T> {
    serde_json::from_str(record.value()).map_err(|err| {
        IssuanceError::Revocation(format!(
            "stored {} record {} does not deserialize: {err}",
            record.category(),
            record.name()
        ))
    })
}

/// Stored shape of a revocation registry definition, carrying the lifecycle
/// state and the advisory `active` flag alongside the ledger object.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RevRegDefRecord {
    pub rev_reg_def: RevocationRegistryDefinition,
    pub state: RevocationRegistryDefinitionState,
    pub active: bool,
}

impl RevRegDefRecord {
    pub fn new(
        rev_reg_def: RevocationRegistryDefinition,
        state: RevocationRegistryDefinitionState,
    ) -> Self {
        Self {
            rev_reg_def,
            state,
            active: false,
        }
    }

    pub fn tags(&self) -> RecordTags {
        RecordTags::new(vec![
            RecordTag::new(TAG_STATE, &self.state.to_string()),
            RecordTag::new(TAG_CRED_DEF_ID, &self.rev_reg_def.cred_def_id.0),
            RecordTag::new(TAG_ACTIVE, if self.active { "true" } else { "false" }),
        ])
    }

    pub fn to_record(&self, name: &str) -> IssuanceResult<Record> {
        Ok(Record::builder()
            .category(RecordCategory::RevRegDef)
            .name(name.to_string())
            .value(serde_json::to_string(self)?)
            .tags(self.tags())
            .build())
    }

    pub fn from_record(record: &Record) -> IssuanceResult<Self> {
        parse_record(record)
    }
}

/// Stored shape of the accumulator-backed revocation list.
///
/// `next_index` is the one-based allocator cursor: it only ever increases
/// and each value is handed out at most once. `pending` holds indices
/// revoked locally but not yet folded into the published accumulator.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RevListRecord {
    pub rev_list: RevocationStatusList,
    pub pending: Option<Vec<u32>>,
    pub next_index: u32,
}

impl RevListRecord {
    pub fn new(rev_list: RevocationStatusList) -> Self {
        Self {
            rev_list,
            pending: None,
            next_index: 1,
        }
    }

    pub fn has_pending(&self) -> bool {
        self.pending.as_ref().is_some_and(|p| !p.is_empty())
    }

    pub fn pending_crids(&self) -> Vec<u32> {
        self.pending.clone().unwrap_or_default()
    }

    pub fn set_pending(&mut self, pending: Vec<u32>) {
        self.pending = if pending.is_empty() {
            None
        } else {
            Some(pending)
        };
    }

    pub fn tags(&self) -> RecordTags {
        RecordTags::new(vec![RecordTag::new(
            TAG_PENDING,
            if self.has_pending() { "true" } else { "false" },
        )])
    }

    pub fn to_record(&self, name: &str) -> IssuanceResult<Record> {
        Ok(Record::builder()
            .category(RecordCategory::RevList)
            .name(name.to_string())
            .value(serde_json::to_string(self)?)
            .tags(self.tags())
            .build())
    }

    pub fn from_record(record: &Record) -> IssuanceResult<Self> {
        parse_record(record)
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IssuerCredRevState {
    Issued,
    Revoked,
}

impl std::fmt::Display for IssuerCredRevState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Issued => write!(f, "issued"),
            Self::Revoked => write!(f, "revoked"),
        }
    }
}

/// Maps a credential exchange to the registry slot its credential was
/// issued against; flipped to `revoked` when the slot's revocation is
/// published.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct IssuerCredRevRecord {
    pub cred_ex_id: String,
    pub rev_reg_def_id: RevocationRegistryDefinitionId,
    pub cred_rev_id: u32,
    pub state: IssuerCredRevState,
}

impl IssuerCredRevRecord {
    pub fn new(
        cred_ex_id: String,
        rev_reg_def_id: RevocationRegistryDefinitionId,
        cred_rev_id: u32,
    ) -> Self {
        Self {
            cred_ex_id,
            rev_reg_def_id,
            cred_rev_id,
            state: IssuerCredRevState::Issued,
        }
    }

    pub fn tags(&self) -> RecordTags {
        RecordTags::new(vec![
            RecordTag::new(TAG_REV_REG_DEF_ID, &self.rev_reg_def_id.0),
            RecordTag::new(TAG_CRED_REV_ID, &self.cred_rev_id.to_string()),
            RecordTag::new(TAG_STATE, &self.state.to_string()),
        ])
    }

    pub fn to_record(&self) -> IssuanceResult<Record> {
        Ok(Record::builder()
            .category(RecordCategory::IssuerCredRev)
            .name(self.cred_ex_id.clone())
            .value(serde_json::to_string(self)?)
            .tags(self.tags())
            .build())
    }

    pub fn from_record(record: &Record) -> IssuanceResult<Self> {
        parse_record(record)
    }
}

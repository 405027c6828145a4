use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::errors::error::StoreError;

pub const CATEGORY_REV_REG_DEF: &str = "REV_REG_DEF";
pub const CATEGORY_REV_REG_DEF_PRIV: &str = "REV_REG_DEF_PRIV";
pub const CATEGORY_REV_LIST: &str = "REV_LIST";
pub const CATEGORY_ISSUER_CRED_REV: &str = "ISSUER_CRED_REV";
pub const CATEGORY_CRED_DEF: &str = "CRED_DEF";
pub const CATEGORY_CRED_DEF_PRIV: &str = "CRED_DEF_PRIV";

#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum RecordCategory {
    RevRegDef,
    RevRegDefPriv,
    RevList,
    IssuerCredRev,
    CredDef,
    CredDefPriv,
}

impl std::fmt::Display for RecordCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let value = match self {
            Self::RevRegDef => CATEGORY_REV_REG_DEF,
            Self::RevRegDefPriv => CATEGORY_REV_REG_DEF_PRIV,
            Self::RevList => CATEGORY_REV_LIST,
            Self::IssuerCredRev => CATEGORY_ISSUER_CRED_REV,
            Self::CredDef => CATEGORY_CRED_DEF,
            Self::CredDefPriv => CATEGORY_CRED_DEF_PRIV,
        };
        write!(f, "{value}")
    }
}

impl FromStr for RecordCategory {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            CATEGORY_REV_REG_DEF => Ok(Self::RevRegDef),
            CATEGORY_REV_REG_DEF_PRIV => Ok(Self::RevRegDefPriv),
            CATEGORY_REV_LIST => Ok(Self::RevList),
            CATEGORY_ISSUER_CRED_REV => Ok(Self::IssuerCredRev),
            CATEGORY_CRED_DEF => Ok(Self::CredDef),
            CATEGORY_CRED_DEF_PRIV => Ok(Self::CredDefPriv),
            other => Err(StoreError::UnknownRecordCategory(other.to_string())),
        }
    }
}

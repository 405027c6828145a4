use std::path::{Path, PathBuf};

use url::Url;

use crate::errors::error::{IssuanceError, IssuanceResult};

pub const DEFAULT_MAX_CRED_NUM: u32 = 1000;

/// Static issuance settings, validated at construction and passed explicitly
/// to every manager.
#[derive(Clone, Debug)]
pub struct IssuanceConfig {
    tails_base_url: Url,
    tails_dir: PathBuf,
    default_max_cred_num: u32,
}

impl IssuanceConfig {
    pub fn new(
        tails_base_url: &str,
        tails_dir: impl Into<PathBuf>,
        default_max_cred_num: u32,
    ) -> IssuanceResult<Self> {
        let tails_base_url = Url::parse(tails_base_url).map_err(|err| {
            IssuanceError::Configuration(format!(
                "malformed tails base URL `{tails_base_url}`: {err}"
            ))
        })?;
        if !matches!(tails_base_url.scheme(), "http" | "https") {
            return Err(IssuanceError::Configuration(format!(
                "tails base URL must be http(s), got `{tails_base_url}`"
            )));
        }
        if default_max_cred_num == 0 {
            return Err(IssuanceError::Configuration(
                "default registry size must be at least 1".into(),
            ));
        }
        Ok(Self {
            tails_base_url,
            tails_dir: tails_dir.into(),
            default_max_cred_num,
        })
    }

    pub fn tails_dir(&self) -> &Path {
        &self.tails_dir
    }

    pub fn default_max_cred_num(&self) -> u32 {
        self.default_max_cred_num
    }

    /// Public distribution URI for a tails file, derived from its content
    /// hash. The result must itself parse as a well-formed URL.
    pub fn public_tails_uri(&self, tails_hash: &str) -> IssuanceResult<String> {
        let uri = format!(
            "{}/{}",
            self.tails_base_url.as_str().trim_end_matches('/'),
            tails_hash
        );
        Url::parse(&uri).map_err(|err| {
            IssuanceError::Configuration(format!("derived tails URI `{uri}` is invalid: {err}"))
        })?;
        Ok(uri)
    }
}

use std::path::{Path, PathBuf};

use anoncreds_issuance_types::data_types::ledger::rev_reg_def::RevocationRegistryDefinition;
use async_trait::async_trait;
use sha2::{Digest, Sha256};
use tokio::io::AsyncWriteExt;

use crate::{
    config::IssuanceConfig,
    errors::error::{IssuanceError, IssuanceResult},
    utils::retry::{retry, TAILS_UPLOAD_RETRY},
};

/// Distribution server accepting tails files for public download.
#[async_trait]
pub trait BaseTailsServer: std::fmt::Debug + Send + Sync {
    /// Upload the tails file backing `rev_reg_def`, returning the public
    /// location the server stored it under.
    async fn upload(
        &self,
        rev_reg_def: &RevocationRegistryDefinition,
        tails_path: &Path,
    ) -> IssuanceResult<String>;
}

/// Local tails-file handling: deterministic content-addressed paths,
/// hash-verified download, retried upload.
#[derive(Debug)]
pub struct TailsManager {
    client: reqwest::Client,
    config: IssuanceConfig,
}

impl TailsManager {
    pub fn new(config: IssuanceConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            config,
        }
    }

    /// Filesystem path of the registry's tails file, derived from the
    /// content hash.
    pub fn local_path(&self, rev_reg_def: &RevocationRegistryDefinition) -> PathBuf {
        self.config.tails_dir().join(&rev_reg_def.value.tails_hash)
    }

    /// Download the tails file from its public location, verifying the
    /// streamed SHA-256 digest against the definition's base58 content
    /// hash. A mismatch deletes the partial file and fails.
    ///
    /// Non-2xx responses are logged but do not abort by themselves; only a
    /// network failure or a hash mismatch is fatal.
    pub async fn retrieve(
        &self,
        rev_reg_def: &RevocationRegistryDefinition,
    ) -> IssuanceResult<PathBuf> {
        let url = &rev_reg_def.value.tails_location;
        let target = self.local_path(rev_reg_def);
        trace!("TailsManager::retrieve >>> url: {url}, target: {}", target.display());

        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let mut response = self.client.get(url).send().await.map_err(|err| {
            IssuanceError::Revocation(format!("tails download from {url} failed: {err}"))
        })?;
        if !response.status().is_success() {
            warn!(
                "retrieve >>> tails server returned {} for {url}",
                response.status()
            );
        }

        let mut file = tokio::fs::File::create(&target).await?;
        let mut hasher = Sha256::new();
        loop {
            match response.chunk().await {
                Ok(Some(chunk)) => {
                    hasher.update(&chunk);
                    file.write_all(&chunk).await?;
                }
                Ok(None) => break,
                Err(err) => {
                    drop(file);
                    tokio::fs::remove_file(&target).await.ok();
                    return Err(IssuanceError::Revocation(format!(
                        "tails download from {url} failed: {err}"
                    )));
                }
            }
        }
        file.flush().await?;
        drop(file);

        let digest = bs58::encode(hasher.finalize()).into_string();
        if digest != rev_reg_def.value.tails_hash {
            tokio::fs::remove_file(&target).await.ok();
            return Err(IssuanceError::Revocation(format!(
                "tails file hash mismatch: expected {}, got {digest}",
                rev_reg_def.value.tails_hash
            )));
        }

        info!("TailsManager::retrieve <<< verified tails file at {}", target.display());
        Ok(target)
    }

    /// Upload the registry's local tails file through the injected server,
    /// under the bounded upload retry policy, and verify the server stored
    /// it at the expected public location.
    pub async fn upload(
        &self,
        rev_reg_def: &RevocationRegistryDefinition,
        tails_server: &dyn BaseTailsServer,
    ) -> IssuanceResult<()> {
        let path = self.local_path(rev_reg_def);
        trace!("TailsManager::upload >>> path: {}", path.display());

        if !path.exists() {
            return Err(IssuanceError::Revocation(format!(
                "no local tails file at {}",
                path.display()
            )));
        }

        let location = retry(TAILS_UPLOAD_RETRY, |_| true, |attempt| {
            let path = path.clone();
            async move {
                debug!("upload >>> attempt {attempt}");
                tails_server.upload(rev_reg_def, &path).await
            }
        })
        .await?;

        if location != rev_reg_def.value.tails_location {
            return Err(IssuanceError::Revocation(format!(
                "tails server reported location {location}, expected {}",
                rev_reg_def.value.tails_location
            )));
        }

        info!("TailsManager::upload <<< published tails file at {location}");
        Ok(())
    }
}

use std::fs;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use tracing::info;

use crate::ai::ValueModel;
use crate::checkpoint::metadata::CheckpointMetadata;
use crate::config::CheckpointConfig;
use crate::error::CheckpointError;

/// Persists the learner's model once per completed epoch.
///
/// Checkpoint `n` lives in `<dir>/<prefix>_<n>.model/` and holds the network
/// weights plus `metadata.json`; `<dir>/latest` points at the newest one.
#[derive(Debug, Clone)]
pub struct Checkpointer {
    epoch_size: usize,
    dir: PathBuf,
    prefix: String,
}

impl Checkpointer {
    pub fn new(epoch_size: usize, config: &CheckpointConfig) -> Self {
        assert!(epoch_size > 0, "epoch size must be positive");
        Checkpointer {
            epoch_size,
            dir: config.dir.clone(),
            prefix: config.prefix.clone(),
        }
    }

    /// Whether `step` closes an epoch.
    pub fn is_due(&self, step: usize) -> bool {
        step > 0 && step % self.epoch_size == 0
    }

    pub fn epoch_index(&self, step: usize) -> usize {
        step / self.epoch_size
    }

    pub fn checkpoint_name(&self, epoch: usize) -> String {
        format!("{}_{}.model", self.prefix, epoch)
    }

    /// Seconds since the unix epoch, for metadata timestamps.
    pub fn timestamp() -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or_default()
    }

    /// Save `model` as the checkpoint for `metadata.epoch`, replacing any
    /// previous checkpoint of the same epoch.
    pub fn save(
        &self,
        model: &dyn ValueModel,
        metadata: &CheckpointMetadata,
    ) -> Result<PathBuf, CheckpointError> {
        let dir_name = self.checkpoint_name(metadata.epoch);
        let tmp_dir = self.dir.join(format!("{}.tmp", dir_name));
        let final_dir = self.dir.join(&dir_name);

        if tmp_dir.exists() {
            fs::remove_dir_all(&tmp_dir)?;
        }
        fs::create_dir_all(&tmp_dir)?;

        model.save(&tmp_dir)?;
        let meta_json = serde_json::to_string_pretty(metadata)?;
        fs::write(tmp_dir.join("metadata.json"), meta_json)?;

        if final_dir.exists() {
            fs::remove_dir_all(&final_dir)?;
        }
        fs::rename(&tmp_dir, &final_dir)?;
        self.update_latest_symlink(&dir_name)?;

        info!(
            epoch = metadata.epoch,
            step = metadata.step,
            path = %final_dir.display(),
            "checkpoint saved"
        );
        Ok(final_dir)
    }

    /// Read `metadata.json` from a checkpoint directory.
    pub fn load_metadata(dir: &Path) -> Result<CheckpointMetadata, CheckpointError> {
        let meta_path = dir.join("metadata.json");
        let meta_json =
            fs::read_to_string(&meta_path).map_err(|e| CheckpointError::MetadataRead {
                path: meta_path.clone(),
                source: e,
            })?;
        serde_json::from_str(&meta_json).map_err(|e| CheckpointError::MetadataParse {
            path: meta_path,
            source: e,
        })
    }

    /// Metadata of the checkpoint `latest` points to.
    pub fn load_latest(&self) -> Result<(PathBuf, CheckpointMetadata), CheckpointError> {
        let latest_link = self.dir.join("latest");
        if latest_link.symlink_metadata().is_err() {
            return Err(CheckpointError::NoLatestSymlink(self.dir.clone()));
        }
        let resolved = fs::read_link(&latest_link)?;
        let target = if resolved.is_relative() {
            self.dir.join(resolved)
        } else {
            resolved
        };
        let metadata = Self::load_metadata(&target)?;
        Ok((target, metadata))
    }

    /// List all checkpoints sorted by epoch (ascending).
    pub fn list_checkpoints(&self) -> Result<Vec<(PathBuf, CheckpointMetadata)>, CheckpointError> {
        let mut results = Vec::new();
        if !self.dir.exists() {
            return Ok(results);
        }
        let prefix = format!("{}_", self.prefix);
        for entry in fs::read_dir(&self.dir)? {
            let entry = entry?;
            let path = entry.path();
            let name = entry.file_name();
            let name_str = name.to_string_lossy();
            if !path.is_dir() || !name_str.starts_with(&prefix) || !name_str.ends_with(".model") {
                continue;
            }
            if path.join("metadata.json").exists() {
                let metadata = Self::load_metadata(&path)?;
                results.push((path, metadata));
            }
        }
        results.sort_by_key(|(_, m)| m.epoch);
        Ok(results)
    }

    #[cfg(unix)]
    fn update_latest_symlink(&self, dir_name: &str) -> Result<(), CheckpointError> {
        let link_path = self.dir.join("latest");
        if link_path.symlink_metadata().is_ok() {
            fs::remove_file(&link_path)?;
        }
        std::os::unix::fs::symlink(dir_name, &link_path)?;
        Ok(())
    }

    #[cfg(not(unix))]
    fn update_latest_symlink(&self, _dir_name: &str) -> Result<(), CheckpointError> {
        Ok(())
    }
}

//! Configuration for pipeline tuning knobs.
//!
//! Settings are loaded from TOML. Every field has a serde default so a
//! partial file (or an empty table) is valid.

use crate::error::{PipelineError, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{info, warn};

/// Hard upper bound on the partitioned cursor's batch size.
pub const MAX_BATCH: usize = 1 << 25;

fn default_unlink_hop_threshold() -> usize {
    2
}

fn default_initial_batch() -> usize {
    1
}

fn default_max_batch() -> usize {
    MAX_BATCH
}

/// Tuning parameters of a [`Pipeline`](crate::Pipeline).
///
/// Defaults:
/// - `unlink_hop_threshold`: 2
/// - `initial_batch`: 1
/// - `max_batch`: 2^25
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Interior removals that had to walk fewer hops than this to reach live
    /// neighbours on both sides leave the physical unlink to later traversals.
    #[serde(default = "default_unlink_hop_threshold")]
    pub unlink_hop_threshold: usize,
    /// Size of the first batch handed out by a partitioned cursor.
    #[serde(default = "default_initial_batch")]
    pub initial_batch: usize,
    /// Largest batch a partitioned cursor hands out.
    #[serde(default = "default_max_batch")]
    pub max_batch: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            unlink_hop_threshold: default_unlink_hop_threshold(),
            initial_batch: default_initial_batch(),
            max_batch: default_max_batch(),
        }
    }
}

impl PipelineConfig {
    pub fn with_unlink_hop_threshold(mut self, hops: usize) -> Self {
        self.unlink_hop_threshold = hops;
        self
    }

    pub fn with_batch_bounds(mut self, initial: usize, max: usize) -> Self {
        self.initial_batch = initial;
        self.max_batch = max;
        self
    }

    /// Checks the settings for consistency.
    pub fn validate(&self) -> Result<()> {
        if self.initial_batch == 0 {
            return Err(PipelineError::InvalidConfig(
                "initial_batch must be at least 1".to_string(),
            ));
        }
        if self.max_batch < self.initial_batch {
            return Err(PipelineError::InvalidConfig(format!(
                "max_batch ({}) must not be smaller than initial_batch ({})",
                self.max_batch, self.initial_batch
            )));
        }
        if self.max_batch > MAX_BATCH {
            return Err(PipelineError::InvalidConfig(format!(
                "max_batch ({}) exceeds the supported maximum of {MAX_BATCH}",
                self.max_batch
            )));
        }
        Ok(())
    }

    /// Returns a copy with out-of-range values pulled back into range.
    pub(crate) fn sanitized(&self) -> Self {
        if let Err(e) = self.validate() {
            warn!("⚠️ {}; clamping pipeline settings", e);
        }
        let initial_batch = self.initial_batch.clamp(1, MAX_BATCH);
        Self {
            unlink_hop_threshold: self.unlink_hop_threshold,
            initial_batch,
            max_batch: self.max_batch.clamp(initial_batch, MAX_BATCH),
        }
    }

    /// Loads configuration from a TOML file, writing the defaults to `path`
    /// when the file does not exist yet.
    pub async fn load_from_file(path: impl AsRef<Path>) -> Result<Self> {
        let config: Self = load_toml_or_default(path.as_ref()).await?;
        config.validate()?;
        Ok(config)
    }
}

/// Reads a TOML config from `path`, or writes `T::default()` there and
/// returns it when the file is missing.
pub async fn load_toml_or_default<T>(path: &Path) -> Result<T>
where
    T: Serialize + DeserializeOwned + Default,
{
    if path.exists() {
        let content = tokio::fs::read_to_string(path).await?;
        Ok(toml::from_str(&content)?)
    } else {
        let default_config = T::default();
        let toml_content = toml::to_string_pretty(&default_config)?;
        tokio::fs::write(path, toml_content).await?;
        info!("📝 Created default configuration file: {}", path.display());
        Ok(default_config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::{tempdir, NamedTempFile};
    use tokio::fs;

    #[test]
    fn test_defaults() {
        let config = PipelineConfig::default();
        assert_eq!(config.unlink_hop_threshold, 2);
        assert_eq!(config.initial_batch, 1);
        assert_eq!(config.max_batch, 1 << 25);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validation() {
        assert!(PipelineConfig::default()
            .with_batch_bounds(0, 8)
            .validate()
            .is_err());
        assert!(PipelineConfig::default()
            .with_batch_bounds(16, 8)
            .validate()
            .is_err());
        assert!(PipelineConfig::default()
            .with_batch_bounds(1, MAX_BATCH + 1)
            .validate()
            .is_err());
        assert!(PipelineConfig::default()
            .with_unlink_hop_threshold(0)
            .validate()
            .is_ok());
    }

    #[test]
    fn test_sanitized_clamps() {
        let config = PipelineConfig::default().with_batch_bounds(0, 0).sanitized();
        assert_eq!(config.initial_batch, 1);
        assert_eq!(config.max_batch, 1);
    }

    #[tokio::test]
    async fn test_load_partial_file() {
        let temp_file = NamedTempFile::new().unwrap();
        fs::write(temp_file.path(), "unlink_hop_threshold = 5\n")
            .await
            .unwrap();

        let config = PipelineConfig::load_from_file(temp_file.path()).await.unwrap();
        assert_eq!(config.unlink_hop_threshold, 5);
        assert_eq!(config.initial_batch, 1);
        assert_eq!(config.max_batch, MAX_BATCH);
    }

    #[tokio::test]
    async fn test_missing_file_writes_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("pipeline.toml");

        let config = PipelineConfig::load_from_file(&path).await.unwrap();
        assert_eq!(config, PipelineConfig::default());
        assert!(path.exists());

        let reloaded = PipelineConfig::load_from_file(&path).await.unwrap();
        assert_eq!(reloaded, config);
    }

    #[tokio::test]
    async fn test_invalid_file_is_rejected() {
        let temp_file = NamedTempFile::new().unwrap();
        fs::write(temp_file.path(), "initial_batch = 0\n").await.unwrap();
        let result = PipelineConfig::load_from_file(temp_file.path()).await;
        assert!(matches!(result, Err(PipelineError::InvalidConfig(_))));

        fs::write(temp_file.path(), "initial_batch = \"many\"\n")
            .await
            .unwrap();
        let result = PipelineConfig::load_from_file(temp_file.path()).await;
        assert!(matches!(result, Err(PipelineError::ConfigParse(_))));
    }
}

use crate::error::EventError;
use horizon_pipeline::config::load_toml_or_default;
use horizon_pipeline::PipelineConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;

fn default_collect_timings() -> bool {
    true
}

/// Settings of an [`EventPipeline`](crate::EventPipeline).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventPipelineConfig {
    /// Record per-handler execution times during dispatch.
    #[serde(default = "default_collect_timings")]
    pub collect_timings: bool,
    /// Tuning of the handler pipeline itself.
    #[serde(default)]
    pub pipeline: PipelineConfig,
}

impl Default for EventPipelineConfig {
    fn default() -> Self {
        Self {
            collect_timings: default_collect_timings(),
            pipeline: PipelineConfig::default(),
        }
    }
}

impl EventPipelineConfig {
    pub fn with_collect_timings(mut self, collect: bool) -> Self {
        self.collect_timings = collect;
        self
    }

    pub fn with_pipeline(mut self, pipeline: PipelineConfig) -> Self {
        self.pipeline = pipeline;
        self
    }

    pub fn validate(&self) -> Result<(), EventError> {
        self.pipeline.validate()?;
        Ok(())
    }

    /// Loads configuration from a TOML file, writing the defaults when the
    /// file does not exist yet.
    pub async fn load_from_file(path: impl AsRef<Path>) -> Result<Self, EventError> {
        let config: Self = load_toml_or_default(path.as_ref()).await?;
        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_defaults() {
        let config = EventPipelineConfig::default();
        assert!(config.collect_timings);
        assert_eq!(config.pipeline, PipelineConfig::default());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_nested_pipeline_table() {
        let config: EventPipelineConfig = toml::from_str(
            r#"
            collect_timings = false

            [pipeline]
            unlink_hop_threshold = 8
            "#,
        )
        .unwrap();
        assert!(!config.collect_timings);
        assert_eq!(config.pipeline.unlink_hop_threshold, 8);
        assert_eq!(config.pipeline.initial_batch, 1);
    }

    #[test]
    fn test_invalid_pipeline_settings() {
        let config = EventPipelineConfig::default()
            .with_pipeline(PipelineConfig::default().with_batch_bounds(0, 4));
        assert!(matches!(config.validate(), Err(EventError::Pipeline(_))));
    }

    #[tokio::test]
    async fn test_load_writes_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("events.toml");

        let config = EventPipelineConfig::load_from_file(&path).await.unwrap();
        assert_eq!(config, EventPipelineConfig::default());
        assert!(path.exists());

        let reloaded = EventPipelineConfig::load_from_file(&path).await.unwrap();
        assert_eq!(reloaded, config);
    }
}

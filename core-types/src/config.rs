// Copyright (c) James Kassemi, SC, US. All rights reserved.
use std::path::{Path, PathBuf};

use config::{Config, ConfigError};
use serde::{Deserialize, Serialize};

const CONFIG_FILE: &str = "sectorsplit.toml";
const ENV_PREFIX: &str = "SECTORSPLIT";

/// Run configuration. Every key has a default, so an empty environment is valid.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Shard root; shards live under `<target_dir>/edsm`.
    #[serde(default = "default_target_dir")]
    pub target_dir: PathBuf,
    #[serde(default = "default_source_path")]
    pub source_path: PathBuf,
    #[serde(default = "default_delta_path")]
    pub delta_path: PathBuf,
    /// Named-sector CSV used to enrich the catalog.
    #[serde(default = "default_reference_path")]
    pub reference_path: PathBuf,
    #[serde(default = "default_catalog_path")]
    pub catalog_path: PathBuf,
    #[serde(default = "default_export_path")]
    pub export_path: PathBuf,
    #[serde(default)]
    pub merge: MergeConfig,
    #[serde(default)]
    pub partition: PartitionConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MergeConfig {
    /// Worker count; 0 means one per detected core.
    #[serde(default)]
    pub pool_size: usize,
    #[serde(default = "default_progress_update_ms")]
    pub progress_update_ms: u64,
    #[serde(default = "default_compression_level")]
    pub compression_level: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PartitionConfig {
    #[serde(default = "default_max_open_shards")]
    pub max_open_shards: usize,
    #[serde(default = "default_progress_update_ms")]
    pub progress_update_ms: u64,
    #[serde(default = "default_compression_level")]
    pub compression_level: u32,
    #[serde(default = "default_verify_coordinates")]
    pub verify_coordinates: bool,
    /// Maximum records inspected by a survey pass; 0 means the whole source.
    #[serde(default)]
    pub survey_limit: usize,
}

fn default_target_dir() -> PathBuf {
    PathBuf::from(".")
}

fn default_source_path() -> PathBuf {
    PathBuf::from("systemsWithCoordinates.json.gz")
}

fn default_delta_path() -> PathBuf {
    PathBuf::from("systemsWithCoordinates7days.json.gz")
}

fn default_reference_path() -> PathBuf {
    PathBuf::from("sector-list.csv")
}

fn default_catalog_path() -> PathBuf {
    PathBuf::from("sectors.catalog.json")
}

fn default_export_path() -> PathBuf {
    PathBuf::from("docs/sectors.json")
}

fn default_progress_update_ms() -> u64 {
    2_000
}

fn default_compression_level() -> u32 {
    9
}

fn default_max_open_shards() -> usize {
    256
}

fn default_verify_coordinates() -> bool {
    true
}

impl Default for MergeConfig {
    fn default() -> Self {
        Self {
            pool_size: 0,
            progress_update_ms: default_progress_update_ms(),
            compression_level: default_compression_level(),
        }
    }
}

impl Default for PartitionConfig {
    fn default() -> Self {
        Self {
            max_open_shards: default_max_open_shards(),
            progress_update_ms: default_progress_update_ms(),
            compression_level: default_compression_level(),
            verify_coordinates: default_verify_coordinates(),
            survey_limit: 0,
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            target_dir: default_target_dir(),
            source_path: default_source_path(),
            delta_path: default_delta_path(),
            reference_path: default_reference_path(),
            catalog_path: default_catalog_path(),
            export_path: default_export_path(),
            merge: MergeConfig::default(),
            partition: PartitionConfig::default(),
        }
    }
}

impl AppConfig {
    /// Loads `sectorsplit.toml` from the working directory (optional) layered under
    /// `SECTORSPLIT_*` environment variables.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(Path::new(CONFIG_FILE))
    }

    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let settings = Config::builder()
            .add_source(config::File::from(path).required(false))
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;
        let config: Self = settings.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        for level in [
            self.merge.compression_level,
            self.partition.compression_level,
        ] {
            if level > 9 {
                return Err(ConfigError::Message(format!(
                    "compression_level must be between 0 and 9, got {level}"
                )));
            }
        }
        if self.partition.max_open_shards == 0 {
            return Err(ConfigError::Message(
                "partition.max_open_shards must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    pub fn shard_root(&self) -> PathBuf {
        self.target_dir.join("edsm")
    }
}

impl MergeConfig {
    pub fn workers(&self) -> usize {
        resolve_pool_size(self.pool_size, num_cpus::get())
    }
}

/// `0` selects the detected core count; explicit sizes are capped to it.
pub fn resolve_pool_size(configured: usize, detected_cores: usize) -> usize {
    let detected = detected_cores.max(1);
    match configured {
        0 => detected,
        n => n.max(1).min(detected),
    }
}

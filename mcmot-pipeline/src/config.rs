use frame_sync::{FrameSyncType, SyncConfig};
use serde::Deserialize;

use crate::error::{Error, Result};

/// Which model-bound stage this process instance runs. Only the stage's
/// invocation contract (`StageCallback`) is this crate's concern; the
/// model behind each stage is out of scope here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StageKind {
    Capture,
    Detection,
    Reid,
    Tracking,
    Unify,
    Analytics,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BusSettings {
    pub bootstrap_servers: Vec<String>,
    pub topic: String,
    pub group_id: String,
    #[serde(default)]
    pub key: Option<String>,
}

/// Mirrors [`frame_sync::SyncConfigBuilder`]'s fields one-to-one so a
/// `[sync]` TOML table can be validated into a [`SyncConfig`] at load time.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct SyncSettings {
    #[serde(default)]
    pub backlog_threshold: u64,
    #[serde(default)]
    pub backlog_check_interval: f64,
    pub frame_sync_type: FrameSyncType,
    #[serde(default)]
    pub fps: u32,
    #[serde(default = "default_retention_time")]
    pub retention_time: f64,
    #[serde(default = "default_latency_threshold")]
    pub latency_threshold: f64,
    #[serde(default)]
    pub ignore_initial_delay: bool,
    #[serde(default)]
    pub enable_sequencing: bool,
    #[serde(default)]
    pub seek_to_end: bool,
    #[serde(default)]
    pub unify: bool,
}

fn default_retention_time() -> f64 {
    60.0
}

fn default_latency_threshold() -> f64 {
    60.0
}

impl SyncSettings {
    pub fn build(&self) -> Result<SyncConfig> {
        SyncConfig::builder()
            .backlog_threshold(self.backlog_threshold)
            .backlog_check_interval(self.backlog_check_interval)
            .frame_sync_type(self.frame_sync_type)
            .fps(self.fps)
            .retention_time(self.retention_time)
            .latency_threshold(self.latency_threshold)
            .ignore_initial_delay(self.ignore_initial_delay)
            .enable_sequencing(self.enable_sequencing)
            .seek_to_end(self.seek_to_end)
            .unify(self.unify)
            .build()
            .map_err(Error::from)
    }
}

/// Top-level `mcmot-pipeline` process configuration, loaded from a single
/// TOML file named on the command line.
#[derive(Debug, Clone, Deserialize)]
pub struct PipelineConfig {
    pub stage: StageKind,
    pub bus: BusSettings,
    /// Present only for the `tracking` stage, which joins a capture feed
    /// against a detection feed through a shared `FrameCache` (SPEC_FULL.md
    /// §5) instead of running a single consumer loop.
    #[serde(default)]
    pub detection_bus: Option<BusSettings>,
    #[serde(default)]
    pub sync: Option<SyncSettings>,
    #[serde(default = "default_cache_size")]
    pub frame_cache_size: usize,
}

fn default_cache_size() -> usize {
    1000
}

impl PipelineConfig {
    pub fn load(path: &std::path::Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            Error::Configuration(format!("could not read pipeline config '{}': {e}", path.display()))
        })?;
        let config: PipelineConfig = toml::from_str(&text)?;
        if config.stage == StageKind::Tracking && config.detection_bus.is_none() {
            return Err(Error::Configuration(
                "stage 'tracking' requires a [detection_bus] table".to_string(),
            ));
        }
        Ok(config)
    }
}

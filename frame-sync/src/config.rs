use crate::error::{Error, Result};

/// Selects which policy groups frames across cameras. `None` disables
/// grouping entirely: the facade is not constructed and the consumer loop
/// skips synchronizer-dependent steps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FrameSyncType {
    Timestamp,
    Number,
    None,
}

/// Validated configuration for a [`crate::facade::SynchronizationFacade`].
///
/// Constructed only through [`SyncConfig::new`], which enforces the
/// invariants the source's `FrameSyncConfiguration.__init__` checks
/// (fatal `Error::Configuration` on violation, at construction time).
#[derive(Debug, Clone)]
pub struct SyncConfig {
    pub backlog_threshold: u64,
    pub backlog_check_interval: f64,
    pub frame_sync_type: FrameSyncType,
    pub fps: u32,
    pub retention_time: f64,
    pub latency_threshold: f64,
    pub ignore_initial_delay: bool,
    pub enable_sequencing: bool,
    pub seek_to_end: bool,
    pub unify: bool,
}

#[derive(Debug, Clone)]
pub struct SyncConfigBuilder {
    backlog_threshold: u64,
    backlog_check_interval: f64,
    frame_sync_type: FrameSyncType,
    fps: u32,
    retention_time: f64,
    latency_threshold: f64,
    ignore_initial_delay: bool,
    enable_sequencing: bool,
    seek_to_end: bool,
    unify: bool,
}

impl Default for SyncConfigBuilder {
    fn default() -> Self {
        Self {
            backlog_threshold: 0,
            backlog_check_interval: 0.0,
            frame_sync_type: FrameSyncType::None,
            fps: 0,
            retention_time: 60.0,
            latency_threshold: 60.0,
            ignore_initial_delay: false,
            enable_sequencing: false,
            seek_to_end: false,
            unify: false,
        }
    }
}

macro_rules! setter {
    ($name:ident, $ty:ty) => {
        pub fn $name(mut self, value: $ty) -> Self {
            self.$name = value;
            self
        }
    };
}

impl SyncConfigBuilder {
    setter!(backlog_threshold, u64);
    setter!(backlog_check_interval, f64);
    setter!(frame_sync_type, FrameSyncType);
    setter!(fps, u32);
    setter!(retention_time, f64);
    setter!(latency_threshold, f64);
    setter!(ignore_initial_delay, bool);
    setter!(enable_sequencing, bool);
    setter!(seek_to_end, bool);
    setter!(unify, bool);

    pub fn build(self) -> Result<SyncConfig> {
        if self.retention_time <= 0.0 {
            return Err(Error::Configuration(format!(
                "'retention_time' must be greater than 0, got '{}' instead",
                self.retention_time
            )));
        }
        if self.ignore_initial_delay && self.backlog_threshold == 0 && self.backlog_check_interval <= 0.0
        {
            return Err(Error::Configuration(
                "if 'ignore_initial_delay' is true, either 'backlog_threshold' or \
                 'backlog_check_interval' must be greater than 0"
                    .to_string(),
            ));
        }
        if self.latency_threshold < 0.0 {
            return Err(Error::Configuration(format!(
                "'latency_threshold' must be >= 0, got '{}' instead",
                self.latency_threshold
            )));
        }
        if self.backlog_check_interval < 0.0 {
            return Err(Error::Configuration(format!(
                "'backlog_check_interval' must be >= 0, got '{}' instead",
                self.backlog_check_interval
            )));
        }
        Ok(SyncConfig {
            backlog_threshold: self.backlog_threshold,
            backlog_check_interval: self.backlog_check_interval,
            frame_sync_type: self.frame_sync_type,
            fps: self.fps,
            retention_time: self.retention_time,
            latency_threshold: self.latency_threshold,
            ignore_initial_delay: self.ignore_initial_delay,
            enable_sequencing: self.enable_sequencing,
            seek_to_end: self.seek_to_end,
            unify: self.unify,
        })
    }
}

impl SyncConfig {
    pub fn builder() -> SyncConfigBuilder {
        SyncConfigBuilder::default()
    }
}

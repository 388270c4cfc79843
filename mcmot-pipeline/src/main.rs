mod config;
mod error;
mod stage;

use std::path::PathBuf;
use std::sync::Arc;

use frame_sync::FrameCache;
use mcmot_bus::{ConsumerLoop, KafkaBus, OffsetReset};
use parking_lot::Mutex;
use tracing::info;

use config::{BusSettings, PipelineConfig, StageKind};
use error::{Error, Result};
use stage::{CacheJoinStage, LoggingStage};

fn offset_reset_for(ignore_initial_delay: bool) -> OffsetReset {
    if ignore_initial_delay {
        OffsetReset::Latest
    } else {
        OffsetReset::Earliest
    }
}

fn build_bus(settings: &BusSettings, ignore_initial_delay: bool) -> Result<KafkaBus> {
    Ok(KafkaBus::new(
        &settings.bootstrap_servers,
        &settings.topic,
        &settings.group_id,
        offset_reset_for(ignore_initial_delay),
    )?)
}

#[tokio::main]
async fn main() -> Result<()> {
    let _logging_guard = env_tracing_logger::init();

    let config_path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .ok_or_else(|| Error::Configuration("usage: mcmot-pipeline <config.toml>".to_string()))?;
    let config = PipelineConfig::load(&config_path)?;

    let sync_config = config.sync.as_ref().map(|s| s.build()).transpose()?;
    let ignore_initial_delay = sync_config.as_ref().map(|s| s.ignore_initial_delay).unwrap_or(false);

    info!(stage = ?config.stage, "starting mcmot-pipeline stage");

    if config.stage == StageKind::Tracking {
        let detection_settings = config
            .detection_bus
            .as_ref()
            .expect("PipelineConfig::load enforces detection_bus for the tracking stage");

        let capture_cache = Arc::new(Mutex::new(FrameCache::new(config.frame_cache_size)));
        let detection_cache = Arc::new(Mutex::new(FrameCache::new(config.frame_cache_size)));
        let downstream: Arc<dyn mcmot_bus::StageCallback> = Arc::new(LoggingStage { name: "tracking" });

        let capture_bus = build_bus(&config.bus, ignore_initial_delay)?;
        let capture_callback = Arc::new(CacheJoinStage::new(
            capture_cache.clone(),
            detection_cache.clone(),
            downstream.clone(),
        ));
        let capture_loop = ConsumerLoop::new(capture_bus, capture_callback, config.bus.key.clone(), sync_config.clone());

        let detection_bus = build_bus(detection_settings, ignore_initial_delay)?;
        let detection_callback = Arc::new(CacheJoinStage::new(detection_cache, capture_cache, downstream));
        let detection_loop = ConsumerLoop::new(
            detection_bus,
            detection_callback,
            detection_settings.key.clone(),
            sync_config.clone(),
        );

        let (capture_result, detection_result) = tokio::join!(capture_loop.run(), detection_loop.run());
        capture_result?;
        detection_result?;
    } else {
        let bus = build_bus(&config.bus, ignore_initial_delay)?;
        let callback: Arc<dyn mcmot_bus::StageCallback> = Arc::new(LoggingStage {
            name: stage_name(config.stage),
        });
        let consumer_loop = ConsumerLoop::new(bus, callback, config.bus.key.clone(), sync_config);
        consumer_loop.run().await?;
    }

    Ok(())
}

fn stage_name(stage: StageKind) -> &'static str {
    match stage {
        StageKind::Capture => "capture",
        StageKind::Detection => "detection",
        StageKind::Reid => "reid",
        StageKind::Tracking => "tracking",
        StageKind::Unify => "unify",
        StageKind::Analytics => "analytics",
    }
}

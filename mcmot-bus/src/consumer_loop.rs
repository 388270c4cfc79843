use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use frame_sync::{FrameRecord, FrameSyncType, Group, GroupingKey, Sampling, Sequencer, SyncConfig, SynchronizationFacade};
use parking_lot::Mutex;
use tokio::sync::Semaphore;
use tracing::{debug, error, warn};

use crate::bus::Bus;
use crate::callback::StageCallback;
use crate::envelope::FrameEnvelope;
use crate::error::Result;

fn now_secs() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs_f64()
}

/// Drives one bus subscription through key filtering, optional
/// synchronization/sequencing, and a stage callback.
///
/// Grounded in `MessageConsumer.start()`: the infinite poll loop, skip-count
/// enforcement, `ignore_initial_delay`/`seek_to_end` seek policies, and
/// backlog-triggered unified synchronization, all carried over with the
/// `threading.Thread` dispatch replaced by `tokio::spawn` coalesced through
/// a single-permit `Semaphore` (SPEC_FULL.md §9 — no unbounded thread
/// fan-out per backlog check).
pub struct ConsumerLoop<B: Bus> {
    bus: B,
    callback: Arc<dyn StageCallback>,
    key: Option<String>,
    config: Option<SyncConfig>,
}

impl<B: Bus + 'static> ConsumerLoop<B> {
    pub fn new(bus: B, callback: Arc<dyn StageCallback>, key: Option<String>, config: Option<SyncConfig>) -> Self {
        Self {
            bus,
            callback,
            key,
            config,
        }
    }

    pub async fn run(&self) -> Result<()> {
        let facade: Mutex<Option<Arc<SynchronizationFacade<FrameEnvelope>>>> = Mutex::new(None);
        let sequencer: Mutex<Option<Arc<Sequencer<FrameEnvelope>>>> = Mutex::new(None);

        let mut skip_count: u64 = 0;
        let mut seek_to_end_done = false;
        let mut backlog_time_prev = now_secs();
        let mut seq_check_time = now_secs();
        let sync_permit = Arc::new(Semaphore::new(1));

        let outcome = loop {
            let raw = match self.bus.poll(Duration::from_millis(500)).await {
                Ok(Some(message)) => message,
                Ok(None) => {
                    tokio::task::yield_now().await;
                    continue;
                }
                Err(e) => break Err(e),
            };

            if let Some(expected) = &self.key {
                if raw.key.as_deref() != Some(expected.as_str()) {
                    continue;
                }
            }

            let envelope: FrameEnvelope = match serde_json::from_slice(&raw.payload) {
                Ok(envelope) => envelope,
                Err(e) => {
                    let transient = crate::error::Error::TransientMessage(e.to_string());
                    warn!(error = %transient, "failed to decode frame envelope, skipping message");
                    if let Err(e) = self.bus.commit(&raw) {
                        error!(error = %e, "failed to commit past an undecodable message");
                    }
                    continue;
                }
            };

            if let Some(config) = &self.config {
                if config.frame_sync_type != FrameSyncType::None {
                    let mut guard = facade.lock();
                    if guard.is_none() {
                        *guard = Some(Arc::new(SynchronizationFacade::new(config)?));
                    }
                }
                if config.enable_sequencing {
                    let mut guard = sequencer.lock();
                    if guard.is_none() {
                        *guard = Some(Arc::new(Sequencer::new()));
                    }
                }
            }

            let now = now_secs();
            let active_facade = facade.lock().clone();
            let active_sequencer = sequencer.lock().clone();

            if let Some(facade) = &active_facade {
                if skip_count == 0 {
                    facade.collect(
                        envelope.camera_id(),
                        envelope.frame_number,
                        envelope.frame_timestamp,
                        envelope.frame_metadata.fps,
                        envelope.clone(),
                        now,
                    );
                }
            }

            if let Some(sequencer) = &active_sequencer {
                sequencer.collect(Group {
                    grouping_key: GroupingKey::from(envelope.frame_timestamp),
                    records: vec![FrameRecord {
                        camera_id: envelope.camera_id().to_string(),
                        frame_number: envelope.frame_number,
                        frame_timestamp: envelope.frame_timestamp,
                        fps: envelope.frame_metadata.fps,
                        payload: envelope.clone(),
                        entry_time: now,
                    }],
                });

                let config = self.config.as_ref().expect("sequencer only built when config is present");
                if config.backlog_check_interval > 0.0 && now - seq_check_time >= config.backlog_check_interval {
                    let sequencer = sequencer.clone();
                    let callback = self.callback.clone();
                    tokio::spawn(async move {
                        sequencer.sequence();
                        while let Some(group) = sequencer.next() {
                            for record in group.records {
                                if let Err(e) = callback.handle(record.payload) {
                                    error!(error = %e, "stage callback failed during sequenced dispatch");
                                }
                            }
                        }
                    });
                    seq_check_time = now;
                }
            } else {
                if skip_count > 0 {
                    skip_count -= 1;
                    continue;
                }

                let config = self.config.as_ref();
                let unify = config.map(|c| c.unify).unwrap_or(false);
                if !unify {
                    if let Err(e) = self.callback.handle(envelope.clone()) {
                        error!(error = %e, "stage callback failed");
                    }
                }

                if let Some(facade) = &active_facade {
                    let config = config.expect("facade only built when config is present");

                    if config.ignore_initial_delay && !seek_to_end_done {
                        self.bus.commit(&raw)?;
                        self.bus.seek_to_end()?;
                        seek_to_end_done = true;
                        continue;
                    }
                    if config.seek_to_end {
                        self.bus.commit(&raw)?;
                        self.bus.seek_to_end()?;
                        continue;
                    }

                    if config.backlog_check_interval > 0.0 && now - backlog_time_prev >= config.backlog_check_interval {
                        let backlog = self.bus.backlog().unwrap_or(0);
                        debug!(backlog, "sampled bus backlog");
                        backlog_time_prev = now;
                        if config.unify {
                            let facade = facade.clone();
                            let callback = self.callback.clone();
                            let permit = sync_permit.clone();
                            tokio::spawn(async move {
                                let Ok(_permit) = permit.try_acquire_owned() else {
                                    return;
                                };
                                facade.synchronize(now_secs(), |group| {
                                    for record in group.records {
                                        if let Err(e) = callback.handle(record.payload) {
                                            error!(error = %e, "stage callback failed during synchronization dispatch");
                                        }
                                    }
                                });
                            });
                        }
                    }

                    if !config.ignore_initial_delay && !config.unify {
                        match facade.sampling(envelope.camera_id(), now) {
                            Ok(Sampling::Skip(n)) => skip_count = n,
                            Ok(Sampling::Wait(wait)) => tokio::time::sleep(wait).await,
                            Err(e) => warn!(error = %e, "sampling failed for camera"),
                        }
                    }
                }
            }

            self.bus.commit(&raw)?;
        };

        self.bus.close();
        outcome
    }
}

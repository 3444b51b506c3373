//! Replay of recorded trigger primitives from a file.
//!
//! The source reads a JSON-lines file of primitives at `conf` time (the
//! whole file is parsed up front, and any malformed row fails the command),
//! then, once started, emits the rows as time-partitioned payload sets with a
//! trailing heartbeat per pass. Intended for exercising a pipeline without a
//! live detector upstream.

use crate::channel::{SendError, StreamSender};
use crate::message::SliceSet;
use datatypes::{SourceId, Timestamp, TriggerPrimitive};
use serde::Deserialize;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{info, warn};

#[derive(Debug, thiserror::Error)]
pub enum ReplayError {
    #[error("invalid replay configuration: {0}")]
    InvalidConfig(String),
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed row at {path}:{line}: {source}")]
    Malformed {
        path: PathBuf,
        line: usize,
        #[source]
        source: serde_json::Error,
    },
    #[error("replay source {0} is already running")]
    AlreadyRunning(String),
    #[error("replay source {0} has no output attached")]
    NotConnected(String),
    #[error("replay source {0} is not configured")]
    NotConfigured(String),
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ReplayConfig {
    /// JSON-lines file of trigger primitives.
    pub filename: PathBuf,
    /// Width of the emitted payload slices, in ticks.
    pub slice_time: Timestamp,
    /// How many passes over the file to make.
    pub number_of_loops: u64,
    /// Pause between consecutive sets.
    pub send_interval_ms: u64,
    /// Origin stamped on emitted sets.
    pub sourceid: u32,
}

impl Default for ReplayConfig {
    fn default() -> Self {
        Self {
            filename: PathBuf::new(),
            slice_time: 625_000,
            number_of_loops: 1,
            send_interval_ms: 0,
            sourceid: 0,
        }
    }
}

/// File-backed source of `SliceSet<TriggerPrimitive>`.
pub struct ReplaySource {
    id: String,
    config: Option<ReplayConfig>,
    primitives: Vec<TriggerPrimitive>,
    output: Option<StreamSender<SliceSet<TriggerPrimitive>>>,
    send_timeout: Duration,
    running: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl ReplaySource {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            config: None,
            primitives: Vec::new(),
            output: None,
            send_timeout: crate::channel::DEFAULT_QUEUE_TIMEOUT,
            running: Arc::new(AtomicBool::new(false)),
            handle: None,
        }
    }

    pub fn set_output(&mut self, output: StreamSender<SliceSet<TriggerPrimitive>>) {
        self.output = Some(output);
    }

    /// Parse the configuration payload and load the whole replay file.
    /// Any unreadable or malformed row refuses the command.
    pub fn configure(&mut self, payload: serde_json::Value) -> Result<(), ReplayError> {
        if self.handle.is_some() {
            return Err(ReplayError::AlreadyRunning(self.id.clone()));
        }
        let config: ReplayConfig = serde_json::from_value(payload)
            .map_err(|err| ReplayError::InvalidConfig(err.to_string()))?;
        if config.slice_time == 0 {
            return Err(ReplayError::InvalidConfig(
                "slice_time must be positive".to_string(),
            ));
        }
        let raw = std::fs::read_to_string(&config.filename).map_err(|source| ReplayError::Io {
            path: config.filename.clone(),
            source,
        })?;
        let mut primitives = Vec::new();
        for (index, line) in raw.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            let tp: TriggerPrimitive =
                serde_json::from_str(line).map_err(|source| ReplayError::Malformed {
                    path: config.filename.clone(),
                    line: index + 1,
                    source,
                })?;
            primitives.push(tp);
        }
        // Guarantee the in-set ordering invariant even for unsorted files.
        primitives.sort_by_key(|tp| tp.time_start);
        info!(
            source_id = %self.id,
            rows = primitives.len(),
            file = %config.filename.display(),
            "replay file loaded"
        );
        self.primitives = primitives;
        self.config = Some(config);
        Ok(())
    }

    /// Number of rows loaded at `conf` time.
    pub fn row_count(&self) -> usize {
        self.primitives.len()
    }

    /// Partition the loaded rows into contiguous payload sets of
    /// `slice_time` width, skipping empty slices, with a trailing heartbeat
    /// covering everything emitted.
    fn build_sets(&self, config: &ReplayConfig) -> Vec<SliceSet<TriggerPrimitive>> {
        let mut sets: Vec<SliceSet<TriggerPrimitive>> = Vec::new();
        for tp in &self.primitives {
            let start = tp.time_start / config.slice_time * config.slice_time;
            match sets.last_mut() {
                Some(set) if set.start_time == start => set.objects.push(*tp),
                _ => {
                    let mut set =
                        SliceSet::payload(start, start + config.slice_time, vec![*tp]);
                    set.origin = SourceId::new(config.sourceid);
                    sets.push(set);
                }
            }
        }
        if let Some(last) = sets.last() {
            let horizon = last.end_time;
            let mut heartbeat = SliceSet::heartbeat(horizon, horizon);
            heartbeat.origin = SourceId::new(config.sourceid);
            sets.push(heartbeat);
        }
        sets
    }

    /// Launch the emitting task.
    pub fn start(&mut self) -> Result<(), ReplayError> {
        if self.handle.is_some() {
            return Err(ReplayError::AlreadyRunning(self.id.clone()));
        }
        let config = self
            .config
            .clone()
            .ok_or_else(|| ReplayError::NotConfigured(self.id.clone()))?;
        let output = self
            .output
            .clone()
            .ok_or_else(|| ReplayError::NotConnected(self.id.clone()))?;
        let sets = self.build_sets(&config);
        let id = self.id.clone();
        let running = Arc::new(AtomicBool::new(true));
        self.running = Arc::clone(&running);
        let send_timeout = self.send_timeout;
        let interval = Duration::from_millis(config.send_interval_ms);

        self.handle = Some(tokio::spawn(async move {
            let mut seqno = 0u64;
            let mut sent = 0u64;
            'replay: for pass in 0..config.number_of_loops {
                for template in &sets {
                    if !running.load(Ordering::Acquire) {
                        break 'replay;
                    }
                    if !interval.is_zero() {
                        tokio::time::sleep(interval).await;
                    }
                    let mut set = template.clone();
                    set.seqno = seqno;
                    seqno += 1;
                    // Retry while running; a stalled consumer only delays
                    // replay, it never drops recorded data.
                    loop {
                        match output.send_timeout(set.clone(), send_timeout).await {
                            Ok(()) => {
                                sent += 1;
                                break;
                            }
                            Err(SendError::Timeout) => {
                                if !running.load(Ordering::Acquire) {
                                    break 'replay;
                                }
                                warn!(source_id = %id, "output full, retrying send");
                            }
                            Err(SendError::Closed) => break 'replay,
                        }
                    }
                }
                info!(source_id = %id, pass = pass + 1, "replay pass complete");
            }
            info!(source_id = %id, sent, "replay source exiting");
        }));
        Ok(())
    }

    pub async fn stop(&mut self) {
        self.running.store(false, Ordering::Release);
        if let Some(handle) = self.handle.take() {
            let _ = handle.await;
        }
    }
}

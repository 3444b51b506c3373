//! Stage lifecycle: configure, start, stop, scrap.
//!
//! A `PipelineStage` owns one worker task and the channel endpoints it runs
//! between. Configuration is stashed at `conf` and the algorithm is only
//! built at `start`, so no algorithm state survives from one run into the
//! next.

use crate::algorithm::{Algorithm, AlgorithmError, AlgorithmFactory};
use crate::channel::{ChannelHub, ChannelHubError, StreamReceiver, StreamSender, DEFAULT_QUEUE_TIMEOUT};
use crate::report::{StageReporter, TracingReporter};
use crate::worker::{
    run_worker, DirectWorker, StageIo, StageStats, UnwindowedSliceWorker, WindowedSliceWorker,
    Worker,
};
use datatypes::{SourceId, Timestamp, Timestamped};
use serde::Deserialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

/// Default output window width in ticks.
pub const DEFAULT_WINDOW_TIME: Timestamp = 625_000;

/// Recognized stage configuration, deserialized from a `conf` payload.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StageConfig {
    /// Input channel uid.
    pub input: String,
    /// Output channel uid.
    pub output: String,
    /// Origin stamped on outgoing sliced messages.
    pub sourceid: u32,
    /// Output window width in ticks.
    pub window_time: Timestamp,
    /// Grace beyond the watermark before a window may close.
    pub buffer_time: Timestamp,
    /// Display name for diagnostics.
    pub algorithm_name: String,
    /// Opaque sub-object handed to the algorithm factory at start.
    pub algorithm: serde_json::Value,
}

impl Default for StageConfig {
    fn default() -> Self {
        Self {
            input: String::new(),
            output: String::new(),
            sourceid: 0,
            window_time: DEFAULT_WINDOW_TIME,
            buffer_time: 0,
            algorithm_name: String::new(),
            algorithm: serde_json::Value::Null,
        }
    }
}

impl StageConfig {
    fn validate(&self) -> Result<(), StageError> {
        if self.window_time == 0 {
            return Err(StageError::InvalidConfig(
                "window_time must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StageError {
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("stage {0} is not configured")]
    NotConfigured(String),
    #[error("stage {0} has no attached channels")]
    NotConnected(String),
    #[error("stage {0} is already running")]
    AlreadyRunning(String),
    #[error("stage {0} is running, stop it first")]
    StillRunning(String),
    #[error("algorithm construction failed: {0}")]
    Algorithm(#[from] AlgorithmError),
    #[error(transparent)]
    Channel(#[from] ChannelHubError),
    #[error("worker task failed: {0}")]
    Runtime(String),
    #[error("unknown command: {0}")]
    UnknownCommand(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageStatus {
    Stopped,
    Running,
}

type WorkerBuilder<W> = Box<dyn Fn(&StageConfig) -> Result<W, StageError> + Send + Sync>;

/// One pipeline stage: an input endpoint, a worker strategy wrapping the
/// per-run algorithm, and an output endpoint.
pub struct PipelineStage<W: Worker> {
    name: String,
    build: WorkerBuilder<W>,
    config: Option<StageConfig>,
    input: Option<StreamReceiver<W::In>>,
    output: Option<StreamSender<W::Out>>,
    queue_timeout: Duration,
    reporter: Arc<dyn StageReporter>,
    stats: Arc<StageStats>,
    running: Arc<AtomicBool>,
    handle: Option<JoinHandle<StreamReceiver<W::In>>>,
    status: StageStatus,
}

impl<M: Algorithm> PipelineStage<DirectWorker<M>> {
    /// Atomic-in, atomic-out stage.
    pub fn direct(name: impl Into<String>, factory: AlgorithmFactory<M>) -> Self {
        Self::with_builder(
            name,
            Box::new(move |config| {
                let algorithm = factory(&config.algorithm)?;
                Ok(DirectWorker::new(algorithm, config.algorithm_name.clone()))
            }),
        )
    }
}

impl<M: Algorithm> PipelineStage<WindowedSliceWorker<M>>
where
    M::Out: Timestamped,
{
    /// Sliced-in, sliced-out stage with windowed output.
    pub fn windowed(name: impl Into<String>, factory: AlgorithmFactory<M>) -> Self {
        Self::with_builder(
            name,
            Box::new(move |config| {
                let algorithm = factory(&config.algorithm)?;
                Ok(WindowedSliceWorker::new(
                    algorithm,
                    config.algorithm_name.clone(),
                    config.window_time,
                    config.buffer_time,
                ))
            }),
        )
    }
}

impl<M: Algorithm> PipelineStage<UnwindowedSliceWorker<M>> {
    /// Sliced-in, atomic-out stage; outputs are forwarded as produced.
    pub fn unwindowed(name: impl Into<String>, factory: AlgorithmFactory<M>) -> Self {
        Self::with_builder(
            name,
            Box::new(move |config| {
                let algorithm = factory(&config.algorithm)?;
                Ok(UnwindowedSliceWorker::new(
                    algorithm,
                    config.algorithm_name.clone(),
                ))
            }),
        )
    }
}

impl<W: Worker> PipelineStage<W> {
    fn with_builder(name: impl Into<String>, build: WorkerBuilder<W>) -> Self {
        Self {
            name: name.into(),
            build,
            config: None,
            input: None,
            output: None,
            queue_timeout: DEFAULT_QUEUE_TIMEOUT,
            reporter: Arc::new(TracingReporter),
            stats: Arc::new(StageStats::default()),
            running: Arc::new(AtomicBool::new(false)),
            handle: None,
            status: StageStatus::Stopped,
        }
    }

    pub fn with_reporter(mut self, reporter: Arc<dyn StageReporter>) -> Self {
        self.reporter = reporter;
        self
    }

    pub fn with_queue_timeout(mut self, timeout: Duration) -> Self {
        self.queue_timeout = timeout;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn status(&self) -> StageStatus {
        self.status
    }

    pub fn received(&self) -> u64 {
        self.stats.received()
    }

    pub fn sent(&self) -> u64 {
        self.stats.sent()
    }

    /// Wire endpoints directly; used by tests and programmatic assembly.
    pub fn connect(&mut self, input: StreamReceiver<W::In>, output: StreamSender<W::Out>) {
        self.input = Some(input);
        self.output = Some(output);
    }

    /// Resolve the configured channel uids against a hub.
    pub fn attach(&mut self, hub: &ChannelHub) -> Result<(), StageError> {
        let config = self
            .config
            .as_ref()
            .ok_or_else(|| StageError::NotConfigured(self.name.clone()))?;
        if config.input.is_empty() || config.output.is_empty() {
            return Err(StageError::NotConnected(self.name.clone()));
        }
        let input = hub.take_receiver::<W::In>(&config.input)?;
        let output = hub.sender::<W::Out>(&config.output)?;
        self.connect(input, output);
        Ok(())
    }

    /// Stash and validate configuration. Nothing is built here.
    pub fn configure(&mut self, payload: serde_json::Value) -> Result<(), StageError> {
        if self.handle.is_some() {
            return Err(StageError::StillRunning(self.name.clone()));
        }
        let config: StageConfig = serde_json::from_value(payload)
            .map_err(|err| StageError::InvalidConfig(err.to_string()))?;
        config.validate()?;
        self.config = Some(config);
        Ok(())
    }

    /// Zero the counters, build a fresh algorithm from the stashed
    /// configuration, and launch the worker task.
    pub fn start(&mut self) -> Result<(), StageError> {
        if self.handle.is_some() {
            return Err(StageError::AlreadyRunning(self.name.clone()));
        }
        let config = self
            .config
            .as_ref()
            .ok_or_else(|| StageError::NotConfigured(self.name.clone()))?;
        let output = self
            .output
            .as_ref()
            .cloned()
            .ok_or_else(|| StageError::NotConnected(self.name.clone()))?;
        let worker = (self.build)(config)?;
        let input = self
            .input
            .take()
            .ok_or_else(|| StageError::NotConnected(self.name.clone()))?;

        self.stats.reset();
        self.running.store(true, Ordering::Release);
        let io = StageIo {
            stage: self.name.clone(),
            origin: SourceId::new(config.sourceid),
            output,
            send_timeout: self.queue_timeout,
            stats: Arc::clone(&self.stats),
            reporter: Arc::clone(&self.reporter),
        };
        self.handle = Some(tokio::spawn(run_worker(
            worker,
            input,
            io,
            Arc::clone(&self.running),
            self.queue_timeout,
        )));
        self.status = StageStatus::Running;
        tracing::info!(stage = %self.name, "stage started");
        Ok(())
    }

    /// Signal the worker to exit and join it. The worker drains buffered
    /// inputs through the algorithm but discards the resulting outputs.
    pub async fn stop(&mut self) -> Result<(), StageError> {
        self.running.store(false, Ordering::Release);
        if let Some(handle) = self.handle.take() {
            match handle.await {
                Ok(input) => self.input = Some(input),
                Err(err) => {
                    self.status = StageStatus::Stopped;
                    return Err(StageError::Runtime(err.to_string()));
                }
            }
            tracing::info!(
                stage = %self.name,
                received = self.stats.received(),
                sent = self.stats.sent(),
                "stage stopped"
            );
        }
        self.status = StageStatus::Stopped;
        Ok(())
    }

    /// Drop stashed configuration; only valid while stopped.
    pub fn scrap(&mut self) -> Result<(), StageError> {
        if self.handle.is_some() {
            return Err(StageError::StillRunning(self.name.clone()));
        }
        self.config = None;
        Ok(())
    }

    /// Dispatch a lifecycle command with a generic payload.
    pub async fn handle_command(
        &mut self,
        command: &str,
        payload: serde_json::Value,
    ) -> Result<(), StageError> {
        match command {
            "conf" => self.configure(payload),
            "start" => self.start(),
            "stop" => self.stop().await,
            "scrap" => self.scrap(),
            other => Err(StageError::UnknownCommand(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algorithm::Identity;
    use serde_json::json;

    fn identity_stage() -> PipelineStage<DirectWorker<Identity<u64>>> {
        PipelineStage::direct(
            "test_stage",
            Box::new(|_| Ok(Identity::<u64>::new())),
        )
    }

    #[test]
    fn configure_rejects_zero_window() {
        let mut stage = identity_stage();
        let err = stage
            .configure(json!({"window_time": 0}))
            .expect_err("zero window must be refused");
        assert!(matches!(err, StageError::InvalidConfig(_)));
    }

    #[test]
    fn configure_rejects_malformed_payload() {
        let mut stage = identity_stage();
        let err = stage
            .configure(json!({"window_time": "not a number"}))
            .expect_err("malformed payload must be refused");
        assert!(matches!(err, StageError::InvalidConfig(_)));
    }

    #[test]
    fn configure_applies_defaults() {
        let mut stage = identity_stage();
        stage.configure(json!({})).unwrap();
        let config = stage.config.as_ref().unwrap();
        assert_eq!(config.window_time, DEFAULT_WINDOW_TIME);
        assert_eq!(config.buffer_time, 0);
        assert_eq!(config.sourceid, 0);
    }

    #[tokio::test]
    async fn start_requires_configuration_and_channels() {
        let mut stage = identity_stage();
        assert!(matches!(stage.start(), Err(StageError::NotConfigured(_))));

        stage.configure(json!({})).unwrap();
        assert!(matches!(stage.start(), Err(StageError::NotConnected(_))));
    }

    #[tokio::test]
    async fn unknown_command_is_refused() {
        let mut stage = identity_stage();
        let err = stage
            .handle_command("restart", json!({}))
            .await
            .expect_err("unknown command");
        assert!(matches!(err, StageError::UnknownCommand(_)));
    }
}

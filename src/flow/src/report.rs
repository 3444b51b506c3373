//! Stage diagnostics.
//!
//! Workers never propagate errors upward; every anomaly becomes a
//! `StageEvent` handed to the stage's reporter. The default reporter forwards
//! to `tracing`; tests install a recording reporter instead.

use datatypes::Timestamp;
use parking_lot::Mutex;
use std::sync::Arc;

/// Anomalies a running stage can observe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StageEvent {
    /// An output could not be handed downstream within the send timeout and
    /// was dropped.
    SendTimedOut,
    /// An incoming payload set started before the previous one. Accepted and
    /// processed anyway.
    OutOfOrderSets {
        previous: Timestamp,
        received: Timestamp,
    },
    /// A force-flushed slice extends past the heartbeat that triggered the
    /// flush. The slice is discarded.
    SliceBeyondHeartbeat {
        slice_end: Timestamp,
        heartbeat: Timestamp,
    },
    /// A set with `kind == Unknown` arrived and was skipped.
    UnknownSetKind,
    /// The algorithm returned an error; the current batch or slice is
    /// abandoned.
    AlgorithmFault { algorithm: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Warning,
    Error,
    Fatal,
}

impl StageEvent {
    pub fn severity(&self) -> Severity {
        match self {
            StageEvent::SendTimedOut | StageEvent::OutOfOrderSets { .. } => Severity::Warning,
            StageEvent::UnknownSetKind => Severity::Error,
            StageEvent::SliceBeyondHeartbeat { .. } | StageEvent::AlgorithmFault { .. } => {
                Severity::Fatal
            }
        }
    }
}

impl std::fmt::Display for StageEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StageEvent::SendTimedOut => write!(f, "output dropped: send timed out"),
            StageEvent::OutOfOrderSets { previous, received } => write!(
                f,
                "out-of-order sets: received start {received} after {previous}"
            ),
            StageEvent::SliceBeyondHeartbeat {
                slice_end,
                heartbeat,
            } => write!(
                f,
                "flushed slice ends at {slice_end}, past heartbeat {heartbeat}"
            ),
            StageEvent::UnknownSetKind => write!(f, "set with unknown kind skipped"),
            StageEvent::AlgorithmFault { algorithm } => {
                write!(f, "algorithm {algorithm} faulted")
            }
        }
    }
}

/// Sink for stage events, injected so the core stays testable under mocked
/// reporters.
pub trait StageReporter: Send + Sync {
    fn report(&self, stage: &str, event: StageEvent);
}

/// Default reporter: forwards events to `tracing` at their severity.
#[derive(Debug, Default)]
pub struct TracingReporter;

impl StageReporter for TracingReporter {
    fn report(&self, stage: &str, event: StageEvent) {
        match event.severity() {
            Severity::Warning => tracing::warn!(stage = %stage, "{event}"),
            Severity::Error => tracing::error!(stage = %stage, "{event}"),
            Severity::Fatal => tracing::error!(stage = %stage, fatal = true, "{event}"),
        }
    }
}

/// Reporter that records events for inspection in tests.
#[derive(Debug, Default)]
pub struct RecordingReporter {
    events: Mutex<Vec<(String, StageEvent)>>,
}

impl RecordingReporter {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn events(&self) -> Vec<(String, StageEvent)> {
        self.events.lock().clone()
    }

    pub fn count(&self, matches: impl Fn(&StageEvent) -> bool) -> usize {
        self.events
            .lock()
            .iter()
            .filter(|(_, event)| matches(event))
            .count()
    }
}

impl StageReporter for RecordingReporter {
    fn report(&self, stage: &str, event: StageEvent) {
        self.events.lock().push((stage.to_string(), event));
    }
}

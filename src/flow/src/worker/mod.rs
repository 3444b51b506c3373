//! Worker strategies and the shared receive loop.
//!
//! A stage's worker owns the algorithm and buffers for the duration of one
//! run. The loop keeps receiving with a bounded timeout, rechecking the
//! running flag after each quiet period; on exit it drains whatever is still
//! buffered (discarding the results, which are stale by the time a stop
//! propagates here) and hands the input endpoint back for the next run.

pub mod direct;
pub mod unwindowed;
pub mod windowed;

pub use direct::DirectWorker;
pub use unwindowed::UnwindowedSliceWorker;
pub use windowed::WindowedSliceWorker;

use crate::channel::{RecvError, StreamReceiver, StreamSender};
use crate::report::{StageEvent, StageReporter};
use datatypes::SourceId;
use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Shared received/sent counters for one stage.
#[derive(Debug, Default)]
pub struct StageStats {
    received: AtomicU64,
    sent: AtomicU64,
}

impl StageStats {
    pub fn received(&self) -> u64 {
        self.received.load(Ordering::Relaxed)
    }

    pub fn sent(&self) -> u64 {
        self.sent.load(Ordering::Relaxed)
    }

    pub(crate) fn reset(&self) {
        self.received.store(0, Ordering::Relaxed);
        self.sent.store(0, Ordering::Relaxed);
    }

    fn record_received(&self) {
        self.received.fetch_add(1, Ordering::Relaxed);
    }

    fn record_sent(&self) {
        self.sent.fetch_add(1, Ordering::Relaxed);
    }
}

/// Capabilities a worker borrows from its stage: the send helper, counters,
/// identity and the diagnostics reporter. Workers never hold a reference back
/// to the stage itself.
pub struct StageIo<Out> {
    pub(crate) stage: String,
    pub(crate) origin: SourceId,
    pub(crate) output: StreamSender<Out>,
    pub(crate) send_timeout: Duration,
    pub(crate) stats: Arc<StageStats>,
    pub(crate) reporter: Arc<dyn StageReporter>,
}

impl<Out: Send> StageIo<Out> {
    /// Send one output downstream. A timed-out send drops the output with a
    /// warning and the stream continues; only successful sends count.
    pub async fn send(&self, out: Out) -> bool {
        match self.output.send_timeout(out, self.send_timeout).await {
            Ok(()) => {
                self.stats.record_sent();
                true
            }
            Err(_) => {
                self.report(StageEvent::SendTimedOut);
                false
            }
        }
    }

    /// Running count of successfully sent outputs; used as the next seqno.
    pub fn sent(&self) -> u64 {
        self.stats.sent()
    }

    pub fn origin(&self) -> SourceId {
        self.origin
    }

    pub fn report(&self, event: StageEvent) {
        self.reporter.report(&self.stage, event);
    }

    pub(crate) fn stage_name(&self) -> &str {
        &self.stage
    }

    pub(crate) fn reporter(&self) -> &dyn StageReporter {
        self.reporter.as_ref()
    }
}

/// One of the three processing strategies, selected at stage build time.
pub trait Worker: Send + 'static {
    type In: Send + 'static;
    type Out: Send + 'static;

    /// Handle one received message, emitting through `io` as outputs become
    /// ready.
    fn process(&mut self, msg: Self::In, io: &StageIo<Self::Out>)
        -> impl Future<Output = ()> + Send;

    /// Push everything still buffered through the algorithm; results are
    /// discarded when `drop_outputs` is set.
    fn drain(
        &mut self,
        drop_outputs: bool,
        io: &StageIo<Self::Out>,
    ) -> impl Future<Output = ()> + Send;

    /// Forget any run-scoped state.
    fn reset(&mut self);
}

/// The loop every stage worker runs: receive until timeout, recheck the
/// running flag, and on shutdown drain with outputs dropped. Returns the
/// input endpoint so the stage can start again.
pub(crate) async fn run_worker<W: Worker>(
    mut worker: W,
    mut input: StreamReceiver<W::In>,
    io: StageIo<W::Out>,
    running: Arc<AtomicBool>,
    queue_timeout: Duration,
) -> StreamReceiver<W::In> {
    'outer: while running.load(Ordering::Acquire) {
        loop {
            match input.recv_timeout(queue_timeout).await {
                Ok(msg) => {
                    io.stats.record_received();
                    worker.process(msg, &io).await;
                }
                // A quiet period is normal; go back and recheck the flag.
                Err(RecvError::Timeout) => break,
                // All producers gone; nothing further can arrive.
                Err(RecvError::Closed) => break 'outer,
            }
        }
    }
    worker.drain(true, &io).await;
    tracing::info!(
        stage = %io.stage,
        received = io.stats.received(),
        sent = io.stats.sent(),
        "worker exiting"
    );
    worker.reset();
    input
}

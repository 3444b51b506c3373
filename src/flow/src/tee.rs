//! Stream duplication: one sliced input forwarded to every registered
//! output. No algorithm is involved; a stalled output only loses its own
//! copy.

use crate::channel::{RecvError, StreamReceiver, StreamSender, DEFAULT_QUEUE_TIMEOUT};
use crate::message::SliceSet;
use crate::report::{StageEvent, StageReporter, TracingReporter};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

pub struct Tee<T> {
    name: String,
    input: Option<StreamReceiver<SliceSet<T>>>,
    outputs: Vec<StreamSender<SliceSet<T>>>,
    queue_timeout: Duration,
    reporter: Arc<dyn StageReporter>,
    running: Arc<AtomicBool>,
    handle: Option<JoinHandle<StreamReceiver<SliceSet<T>>>>,
}

impl<T: Clone + Send + 'static> Tee<T> {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            input: None,
            outputs: Vec::new(),
            queue_timeout: DEFAULT_QUEUE_TIMEOUT,
            reporter: Arc::new(TracingReporter),
            running: Arc::new(AtomicBool::new(false)),
            handle: None,
        }
    }

    pub fn with_reporter(mut self, reporter: Arc<dyn StageReporter>) -> Self {
        self.reporter = reporter;
        self
    }

    pub fn set_input(&mut self, input: StreamReceiver<SliceSet<T>>) {
        self.input = Some(input);
    }

    pub fn add_output(&mut self, output: StreamSender<SliceSet<T>>) {
        self.outputs.push(output);
    }

    pub fn start(&mut self) -> bool {
        let Some(mut input) = self.input.take() else {
            return false;
        };
        let outputs = self.outputs.clone();
        let name = self.name.clone();
        let reporter = Arc::clone(&self.reporter);
        let queue_timeout = self.queue_timeout;
        self.running.store(true, Ordering::Release);
        let running = Arc::clone(&self.running);

        self.handle = Some(tokio::spawn(async move {
            'outer: while running.load(Ordering::Acquire) {
                loop {
                    match input.recv_timeout(queue_timeout).await {
                        Ok(set) => {
                            for output in &outputs {
                                if output
                                    .send_timeout(set.clone(), queue_timeout)
                                    .await
                                    .is_err()
                                {
                                    reporter.report(&name, StageEvent::SendTimedOut);
                                }
                            }
                        }
                        Err(RecvError::Timeout) => break,
                        Err(RecvError::Closed) => break 'outer,
                    }
                }
            }
            tracing::info!(stage = %name, "tee exiting");
            input
        }));
        true
    }

    pub async fn stop(&mut self) {
        self.running.store(false, Ordering::Release);
        if let Some(handle) = self.handle.take() {
            if let Ok(input) = handle.await {
                self.input = Some(input);
            }
        }
    }
}

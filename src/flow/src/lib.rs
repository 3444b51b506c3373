//! Streaming trigger-data pipeline core.
//!
//! A stage reads typed messages from an input channel, feeds them through a
//! user-supplied algorithm, and writes typed messages to an output channel.
//! Three worker strategies cover the input/output shapes:
//! - atomic to atomic: plain pass-through driving,
//! - sliced to sliced: slice reassembly, heartbeat watermarking and windowed
//!   output,
//! - sliced to atomic: slice reassembly with immediate forwarding.

pub mod algorithm;
pub mod channel;
pub mod message;
pub mod replay;
pub mod report;
pub mod slice_input_buffer;
pub mod stage;
pub mod tee;
pub mod window_output_buffer;
pub mod worker;

mod driver;

pub use algorithm::{Algorithm, AlgorithmConfig, AlgorithmError, AlgorithmFactory, Identity};
pub use channel::{
    channel, ChannelHub, ChannelHubError, RecvError, SendError, StreamReceiver, StreamSender,
    DEFAULT_CHANNEL_CAPACITY, DEFAULT_QUEUE_TIMEOUT,
};
pub use message::{SetKind, SliceSet};
pub use replay::{ReplayConfig, ReplayError, ReplaySource};
pub use report::{RecordingReporter, Severity, StageEvent, StageReporter, TracingReporter};
pub use slice_input_buffer::{CompletedSlice, SliceInputBuffer};
pub use stage::{PipelineStage, StageConfig, StageError, StageStatus, DEFAULT_WINDOW_TIME};
pub use tee::Tee;
pub use window_output_buffer::{WindowOutput, WindowOutputBuffer};
pub use worker::{
    DirectWorker, StageIo, StageStats, UnwindowedSliceWorker, WindowedSliceWorker, Worker,
};

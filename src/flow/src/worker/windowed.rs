//! Sliced-in, sliced-out strategy: reassembles logical slices, drives the
//! algorithm over each element, and re-partitions the produced elements into
//! fixed-width output windows released by watermark or heartbeat.

use super::{StageIo, Worker};
use crate::algorithm::Algorithm;
use crate::driver::AlgorithmDriver;
use crate::message::{SetKind, SliceSet};
use crate::report::StageEvent;
use crate::slice_input_buffer::SliceInputBuffer;
use crate::window_output_buffer::{WindowOutput, WindowOutputBuffer};
use datatypes::{Timestamp, Timestamped};

pub struct WindowedSliceWorker<M: Algorithm>
where
    M::Out: Timestamped,
{
    driver: AlgorithmDriver<M>,
    in_buffer: SliceInputBuffer<M::In>,
    out_buffer: WindowOutputBuffer<M::Out>,
    /// Start time of the last seen payload set; zero means none seen yet.
    prev_slice_start: Timestamp,
}

impl<M: Algorithm> WindowedSliceWorker<M>
where
    M::Out: Timestamped,
{
    pub(crate) fn new(
        algorithm: M,
        algorithm_name: impl Into<String>,
        window_time: Timestamp,
        buffer_time: Timestamp,
    ) -> Self {
        Self {
            driver: AlgorithmDriver::new(algorithm, algorithm_name),
            in_buffer: SliceInputBuffer::new(),
            out_buffer: WindowOutputBuffer::new(window_time, buffer_time),
            prev_slice_start: 0,
        }
    }

}

/// Send one released window downstream. Empty payload windows are
/// suppressed to spare downstream the traffic; the windows that are sent
/// stay contiguous in start/end times regardless.
async fn emit<T: Timestamped + Send + 'static>(
    output: WindowOutput<T>,
    io: &StageIo<SliceSet<T>>,
) {
    if let WindowOutput::Payload { objects, .. } = &output {
        if objects.is_empty() {
            return;
        }
    }
    let mut set = output.into_set();
    set.seqno = io.sent();
    set.origin = io.origin();
    io.send(set).await;
}

impl<M: Algorithm> Worker for WindowedSliceWorker<M>
where
    M::Out: Timestamped,
{
    type In = SliceSet<M::In>;
    type Out = SliceSet<M::Out>;

    async fn process(&mut self, set: SliceSet<M::In>, io: &StageIo<SliceSet<M::Out>>) {
        let mut elems = Vec::new();
        match set.kind {
            SetKind::Payload => {
                if self.prev_slice_start != 0 && set.start_time < self.prev_slice_start {
                    io.report(StageEvent::OutOfOrderSets {
                        previous: self.prev_slice_start,
                        received: set.start_time,
                    });
                }
                self.prev_slice_start = set.start_time;
                if let Some(slice) = self.in_buffer.accept(set) {
                    self.driver.call_slice(
                        &slice.elements,
                        &mut elems,
                        io.stage_name(),
                        io.reporter(),
                    );
                }
            }
            SetKind::Heartbeat => {
                // The heartbeat promises no more payload before its start
                // time, and the input is time-ordered, so the held slice is
                // complete and can go through the algorithm now.
                if let Some(slice) = self.in_buffer.flush() {
                    if slice.end_time > set.start_time {
                        io.report(StageEvent::SliceBeyondHeartbeat {
                            slice_end: slice.end_time,
                            heartbeat: set.start_time,
                        });
                    } else {
                        self.driver.call_slice(
                            &slice.elements,
                            &mut elems,
                            io.stage_name(),
                            io.reporter(),
                        );
                    }
                }
                self.out_buffer.buffer_heartbeat(set.start_time, set.end_time);
                self.driver
                    .flush(set.end_time, &mut elems, io.stage_name(), io.reporter());
            }
            SetKind::Unknown => {
                io.report(StageEvent::UnknownSetKind);
            }
        }

        if !elems.is_empty() {
            self.out_buffer.buffer(elems);
        }

        while self.out_buffer.ready() {
            let Some(output) = self.out_buffer.flush() else {
                break;
            };
            emit(output, io).await;
        }
    }

    async fn drain(&mut self, drop_outputs: bool, io: &StageIo<SliceSet<M::Out>>) {
        // Residual input first, so the algorithm sees every element.
        if let Some(slice) = self.in_buffer.flush() {
            let mut elems = Vec::new();
            self.driver
                .call_slice(&slice.elements, &mut elems, io.stage_name(), io.reporter());
            if !elems.is_empty() {
                self.out_buffer.buffer(elems);
            }
        }
        // Then empty the window buffer. These windows may not be fully
        // formed, but no more data is coming.
        while !self.out_buffer.is_empty() {
            let Some(output) = self.out_buffer.flush() else {
                break;
            };
            if !drop_outputs {
                emit(output, io).await;
            }
        }
    }

    fn reset(&mut self) {
        self.prev_slice_start = 0;
        self.out_buffer.reset();
    }
}

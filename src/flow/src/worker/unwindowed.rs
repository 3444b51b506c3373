//! Sliced-in, atomic-out strategy: reassembles logical slices and forwards
//! every produced output as soon as the algorithm emits it. Heartbeats still
//! flush the input buffer and the algorithm, but the atomic output type has
//! no heartbeat representation, so nothing is emitted for them.

use super::{StageIo, Worker};
use crate::algorithm::Algorithm;
use crate::driver::AlgorithmDriver;
use crate::message::{SetKind, SliceSet};
use crate::report::StageEvent;
use crate::slice_input_buffer::SliceInputBuffer;

pub struct UnwindowedSliceWorker<M: Algorithm> {
    driver: AlgorithmDriver<M>,
    in_buffer: SliceInputBuffer<M::In>,
}

impl<M: Algorithm> UnwindowedSliceWorker<M> {
    pub(crate) fn new(algorithm: M, algorithm_name: impl Into<String>) -> Self {
        Self {
            driver: AlgorithmDriver::new(algorithm, algorithm_name),
            in_buffer: SliceInputBuffer::new(),
        }
    }
}

impl<M: Algorithm> Worker for UnwindowedSliceWorker<M> {
    type In = SliceSet<M::In>;
    type Out = M::Out;

    async fn process(&mut self, set: SliceSet<M::In>, io: &StageIo<M::Out>) {
        let mut out_vec = Vec::new();
        match set.kind {
            SetKind::Payload => {
                if let Some(slice) = self.in_buffer.accept(set) {
                    self.driver.call_slice(
                        &slice.elements,
                        &mut out_vec,
                        io.stage_name(),
                        io.reporter(),
                    );
                }
            }
            SetKind::Heartbeat => {
                // No more payload with end_time <= heartbeat start will
                // arrive, so the held slice is complete.
                if let Some(slice) = self.in_buffer.flush() {
                    if slice.end_time > set.start_time {
                        io.report(StageEvent::SliceBeyondHeartbeat {
                            slice_end: slice.end_time,
                            heartbeat: set.start_time,
                        });
                    } else {
                        self.driver.call_slice(
                            &slice.elements,
                            &mut out_vec,
                            io.stage_name(),
                            io.reporter(),
                        );
                    }
                }
                self.driver
                    .flush(set.end_time, &mut out_vec, io.stage_name(), io.reporter());
            }
            SetKind::Unknown => {
                io.report(StageEvent::UnknownSetKind);
            }
        }

        for out in out_vec {
            io.send(out).await;
        }
    }

    async fn drain(&mut self, drop_outputs: bool, io: &StageIo<M::Out>) {
        if let Some(slice) = self.in_buffer.flush() {
            let mut out_vec = Vec::new();
            self.driver.call_slice(
                &slice.elements,
                &mut out_vec,
                io.stage_name(),
                io.reporter(),
            );
            if !drop_outputs {
                for out in out_vec {
                    io.send(out).await;
                }
            }
        }
    }

    fn reset(&mut self) {
        self.in_buffer = SliceInputBuffer::new();
    }
}

//! Atomic-in, atomic-out strategy: every received message goes straight
//! through the algorithm and each produced output is forwarded in order.

use super::{StageIo, Worker};
use crate::algorithm::Algorithm;
use crate::driver::AlgorithmDriver;

pub struct DirectWorker<M: Algorithm> {
    driver: AlgorithmDriver<M>,
}

impl<M: Algorithm> DirectWorker<M> {
    pub(crate) fn new(algorithm: M, algorithm_name: impl Into<String>) -> Self {
        Self {
            driver: AlgorithmDriver::new(algorithm, algorithm_name),
        }
    }
}

impl<M: Algorithm> Worker for DirectWorker<M> {
    type In = M::In;
    type Out = M::Out;

    async fn process(&mut self, msg: M::In, io: &StageIo<M::Out>) {
        let mut out_vec = Vec::new();
        if !self
            .driver
            .call(&msg, &mut out_vec, io.stage_name(), io.reporter())
        {
            return;
        }
        for out in out_vec {
            io.send(out).await;
        }
    }

    async fn drain(&mut self, _drop_outputs: bool, _io: &StageIo<M::Out>) {}

    fn reset(&mut self) {}
}

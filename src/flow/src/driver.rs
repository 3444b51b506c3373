//! Fault-isolating adaptor over the opaque algorithm.
//!
//! Upstream recovery is not possible for an algorithm fault, so the driver
//! sheds the current batch instead of letting the error reach the worker
//! loop: the fault is reported as fatal and the caller gets `false`.

use crate::algorithm::Algorithm;
use crate::report::{StageEvent, StageReporter};
use datatypes::Timestamp;

pub(crate) struct AlgorithmDriver<M> {
    algorithm: M,
    name: String,
}

impl<M: Algorithm> AlgorithmDriver<M> {
    pub fn new(algorithm: M, name: impl Into<String>) -> Self {
        Self {
            algorithm,
            name: name.into(),
        }
    }

    /// Run the algorithm over one element. Returns false if it faulted.
    pub fn call(
        &mut self,
        input: &M::In,
        out: &mut Vec<M::Out>,
        stage: &str,
        reporter: &dyn StageReporter,
    ) -> bool {
        match self.algorithm.process(input, out) {
            Ok(()) => true,
            Err(_) => {
                reporter.report(
                    stage,
                    StageEvent::AlgorithmFault {
                        algorithm: self.name.clone(),
                    },
                );
                false
            }
        }
    }

    /// Run the algorithm over every element of a completed slice, in order.
    /// Stops at the first fault; the remainder of the slice is abandoned.
    pub fn call_slice(
        &mut self,
        elements: &[M::In],
        out: &mut Vec<M::Out>,
        stage: &str,
        reporter: &dyn StageReporter,
    ) -> bool {
        for element in elements {
            if !self.call(element, out, stage, reporter) {
                return false;
            }
        }
        true
    }

    /// Let the algorithm emit stragglers for times before `watermark`.
    pub fn flush(
        &mut self,
        watermark: Timestamp,
        out: &mut Vec<M::Out>,
        stage: &str,
        reporter: &dyn StageReporter,
    ) -> bool {
        match self.algorithm.flush(watermark, out) {
            Ok(()) => true,
            Err(_) => {
                reporter.report(
                    stage,
                    StageEvent::AlgorithmFault {
                        algorithm: self.name.clone(),
                    },
                );
                false
            }
        }
    }
}

//! The opaque algorithm capability plugged into a pipeline stage.
//!
//! An algorithm maps one input element to zero or more output elements and
//! may emit stragglers when flushed up to a watermark. Instances live for
//! exactly one run: the stage builds a fresh one from the stashed opaque
//! configuration at `start` and drops it at `stop`, so no state leaks
//! between runs.

use datatypes::Timestamp;
use std::marker::PhantomData;

/// Opaque configuration sub-object handed to the factory at start.
pub type AlgorithmConfig = serde_json::Value;

/// Failure raised by an algorithm invocation. Escalated by the driver as a
/// fatal stage event; never tears down the worker.
#[derive(Debug, thiserror::Error)]
#[error("{message}")]
pub struct AlgorithmError {
    message: String,
}

impl AlgorithmError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Per-element stream transformer owned by the driver for the life of one run.
pub trait Algorithm: Send + 'static {
    type In: Send + 'static;
    type Out: Send + 'static;

    /// Append zero or more outputs for one input element.
    fn process(&mut self, input: &Self::In, out: &mut Vec<Self::Out>) -> Result<(), AlgorithmError>;

    /// No more outputs will be requested for times strictly before
    /// `watermark`; append any final outputs now.
    fn flush(
        &mut self,
        _watermark: Timestamp,
        _out: &mut Vec<Self::Out>,
    ) -> Result<(), AlgorithmError> {
        Ok(())
    }
}

/// Constructor invoked at every `start` so algorithm state is per-run.
pub type AlgorithmFactory<M> =
    Box<dyn Fn(&AlgorithmConfig) -> Result<M, AlgorithmError> + Send + Sync>;

/// Pass-through algorithm: emits every input unchanged.
#[derive(Debug, Default)]
pub struct Identity<T> {
    _marker: PhantomData<fn(T)>,
}

impl<T> Identity<T> {
    pub fn new() -> Self {
        Self {
            _marker: PhantomData,
        }
    }
}

impl<T: Clone + Send + 'static> Algorithm for Identity<T> {
    type In = T;
    type Out = T;

    fn process(&mut self, input: &T, out: &mut Vec<T>) -> Result<(), AlgorithmError> {
        out.push(input.clone());
        Ok(())
    }
}

//! Shared leaf types for the trigger pipeline: timestamps, source
//! identification, and the concrete trigger record types carried between
//! stages.

mod records;

pub use records::{TriggerActivity, TriggerCandidate, TriggerPrimitive};

use serde::{Deserialize, Serialize};

/// Monotonic hardware-clock tick count. All stream ordering is by this value.
pub type Timestamp = u64;

/// Contract for elements that can be partitioned into time windows.
///
/// `time_start` is the ordering key; the pipeline core never inspects
/// anything else about an element.
pub trait Timestamped {
    fn time_start(&self) -> Timestamp;
}

/// Identifier of the component that emitted a sliced message.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct SourceId(pub u32);

impl SourceId {
    pub fn new(id: u32) -> Self {
        Self(id)
    }

    pub fn id(&self) -> u32 {
        self.0
    }
}

impl std::fmt::Display for SourceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "source_{}", self.0)
    }
}

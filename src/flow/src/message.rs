//! Message type flowing between sliced pipeline stages.
//!
//! A `SliceSet` describes one subrange `[start_time, end_time)` of a
//! time-partitioned stream. Adjacent sets sharing the same time range are
//! fragments of a single logical slice and are re-joined by the receiver.

use datatypes::{SourceId, Timestamp};

/// What a set carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SetKind {
    /// Elements for the set's time range.
    Payload,
    /// A promise that no payload with `end_time <= start_time` follows.
    Heartbeat,
    /// Default-constructed or corrupted set.
    #[default]
    Unknown,
}

/// One subrange of a time-partitioned stream of `T`.
#[derive(Debug, Clone, PartialEq)]
pub struct SliceSet<T> {
    pub kind: SetKind,
    pub start_time: Timestamp,
    pub end_time: Timestamp,
    pub origin: SourceId,
    /// Monotonic counter assigned by the emitter.
    pub seqno: u64,
    /// Time-ordered elements; empty unless `kind == Payload`.
    pub objects: Vec<T>,
}

impl<T> Default for SliceSet<T> {
    fn default() -> Self {
        Self {
            kind: SetKind::Unknown,
            start_time: 0,
            end_time: 0,
            origin: SourceId::default(),
            seqno: 0,
            objects: Vec::new(),
        }
    }
}

impl<T> SliceSet<T> {
    /// Create a payload set for `[start_time, end_time)`.
    pub fn payload(start_time: Timestamp, end_time: Timestamp, objects: Vec<T>) -> Self {
        Self {
            kind: SetKind::Payload,
            start_time,
            end_time,
            objects,
            ..Self::default()
        }
    }

    /// Create a heartbeat marker. Carries no elements.
    pub fn heartbeat(start_time: Timestamp, end_time: Timestamp) -> Self {
        Self {
            kind: SetKind::Heartbeat,
            start_time,
            end_time,
            ..Self::default()
        }
    }

    pub fn is_payload(&self) -> bool {
        matches!(self.kind, SetKind::Payload)
    }

    pub fn is_heartbeat(&self) -> bool {
        matches!(self.kind, SetKind::Heartbeat)
    }

    /// Time range `(start_time, end_time)` as a pair.
    pub fn time_range(&self) -> (Timestamp, Timestamp) {
        (self.start_time, self.end_time)
    }
}

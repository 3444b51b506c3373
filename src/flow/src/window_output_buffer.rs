//! Fixed-width output windowing with heartbeat-driven release.
//!
//! Produced elements are bucketed into adjacent windows `[kW, (k+1)W)`. A
//! window closes once the high watermark has moved `buffer_time` past its
//! end, so late (but per-source in-order) elements can still join it, or once
//! a heartbeat proves no earlier payload is coming. Heartbeats are emitted in
//! receipt order, interleaved before any window that starts after them.

use crate::message::SliceSet;
use datatypes::{Timestamp, Timestamped};
use std::collections::{BTreeMap, VecDeque};

/// One item released by the buffer.
#[derive(Debug, Clone, PartialEq)]
pub enum WindowOutput<T> {
    /// A closed window. `objects` may be empty; suppressing empty windows is
    /// the caller's choice.
    Payload {
        start_time: Timestamp,
        end_time: Timestamp,
        objects: Vec<T>,
    },
    /// A pass-through heartbeat marker.
    Heartbeat {
        start_time: Timestamp,
        end_time: Timestamp,
    },
}

#[derive(Debug)]
pub struct WindowOutputBuffer<T> {
    window_time: Timestamp,
    buffer_time: Timestamp,
    next_window_start: Option<Timestamp>,
    buckets: BTreeMap<u64, Vec<T>>,
    heartbeats: VecDeque<(Timestamp, Timestamp)>,
    high_watermark: Timestamp,
}

impl<T: Timestamped> WindowOutputBuffer<T> {
    /// `window_time` must be positive; validated by stage configuration.
    pub fn new(window_time: Timestamp, buffer_time: Timestamp) -> Self {
        Self {
            window_time: window_time.max(1),
            buffer_time,
            next_window_start: None,
            buckets: BTreeMap::new(),
            heartbeats: VecDeque::new(),
            high_watermark: 0,
        }
    }

    /// Bucket newly produced elements and advance the high watermark.
    pub fn buffer(&mut self, elements: impl IntoIterator<Item = T>) {
        for element in elements {
            let time = element.time_start();
            let next = *self
                .next_window_start
                .get_or_insert(time / self.window_time * self.window_time);
            // An element for an already-advanced window would wedge the drain
            // loop; in-order input makes this unreachable, but clamp anyway.
            let index = (time / self.window_time).max(next / self.window_time);
            self.buckets.entry(index).or_default().push(element);
            self.high_watermark = self.high_watermark.max(time);
        }
    }

    /// Queue a heartbeat; it is released in receipt order by `flush`.
    pub fn buffer_heartbeat(&mut self, start_time: Timestamp, end_time: Timestamp) {
        self.heartbeats.push_back((start_time, end_time));
    }

    /// True when `flush` can release something: any queued heartbeat, or
    /// enough payload past the current window to declare it closed.
    pub fn ready(&self) -> bool {
        if !self.heartbeats.is_empty() {
            return true;
        }
        match self.next_window_start {
            Some(next) => self.high_watermark >= next + self.window_time + self.buffer_time,
            None => false,
        }
    }

    /// Release the next item: the earliest heartbeat if it precedes the
    /// current window's end (without advancing the window), otherwise the
    /// current window itself.
    pub fn flush(&mut self) -> Option<WindowOutput<T>> {
        let window_end = self.next_window_start.map(|next| next + self.window_time);
        if let Some(&(start_time, end_time)) = self.heartbeats.front() {
            if window_end.map_or(true, |end| start_time < end) {
                self.heartbeats.pop_front();
                return Some(WindowOutput::Heartbeat {
                    start_time,
                    end_time,
                });
            }
        }
        let start_time = self.next_window_start?;
        let index = start_time / self.window_time;
        let objects = self.buckets.remove(&index).unwrap_or_default();
        let end_time = start_time + self.window_time;
        self.next_window_start = Some(end_time);
        Some(WindowOutput::Payload {
            start_time,
            end_time,
            objects,
        })
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty() && self.heartbeats.is_empty()
    }

    /// Wipe buckets, heartbeats and watermarks for a fresh run.
    pub fn reset(&mut self) {
        self.next_window_start = None;
        self.buckets.clear();
        self.heartbeats.clear();
        self.high_watermark = 0;
    }
}

impl<T: Timestamped> WindowOutput<T> {
    /// Convert into the outgoing set representation. Seqno and origin are
    /// stamped by the sender.
    pub fn into_set(self) -> SliceSet<T> {
        match self {
            WindowOutput::Payload {
                start_time,
                end_time,
                objects,
            } => SliceSet::payload(start_time, end_time, objects),
            WindowOutput::Heartbeat {
                start_time,
                end_time,
            } => SliceSet::heartbeat(start_time, end_time),
        }
    }
}

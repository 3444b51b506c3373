//! Concrete trigger record types.
//!
//! A primitive is a single above-threshold pulse on one channel. Activities
//! group primitives that are close in time and space; candidates group
//! activities. The pipeline core treats all three as opaque `Timestamped`
//! payloads.

use crate::{Timestamp, Timestamped};
use serde::{Deserialize, Serialize};

/// A single above-threshold pulse reconstructed from one detector channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TriggerPrimitive {
    pub time_start: Timestamp,
    #[serde(default)]
    pub time_over_threshold: Timestamp,
    #[serde(default)]
    pub time_peak: Timestamp,
    pub channel: u32,
    #[serde(default)]
    pub adc_integral: u32,
    #[serde(default)]
    pub adc_peak: u16,
    #[serde(default)]
    pub detid: u16,
}

impl Timestamped for TriggerPrimitive {
    fn time_start(&self) -> Timestamp {
        self.time_start
    }
}

/// A cluster of primitives, localized in time and channel range.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TriggerActivity {
    pub time_start: Timestamp,
    pub time_end: Timestamp,
    #[serde(default)]
    pub time_peak: Timestamp,
    #[serde(default)]
    pub channel_start: u32,
    #[serde(default)]
    pub channel_end: u32,
    #[serde(default)]
    pub adc_integral: u64,
    #[serde(default)]
    pub inputs: Vec<TriggerPrimitive>,
}

impl Timestamped for TriggerActivity {
    fn time_start(&self) -> Timestamp {
        self.time_start
    }
}

/// A trigger decision candidate built from one or more activities.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TriggerCandidate {
    pub time_start: Timestamp,
    pub time_end: Timestamp,
    #[serde(default)]
    pub detid: u16,
    #[serde(default)]
    pub inputs: Vec<TriggerActivity>,
}

impl Timestamped for TriggerCandidate {
    fn time_start(&self) -> Timestamp {
        self.time_start
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn primitive_roundtrips_through_json() {
        let tp = TriggerPrimitive {
            time_start: 1000,
            time_over_threshold: 20,
            time_peak: 1010,
            channel: 42,
            adc_integral: 5000,
            adc_peak: 900,
            detid: 3,
        };
        let encoded = serde_json::to_string(&tp).unwrap();
        let decoded: TriggerPrimitive = serde_json::from_str(&encoded).unwrap();
        assert_eq!(tp, decoded);
    }

    #[test]
    fn primitive_decodes_with_missing_optional_fields() {
        let decoded: TriggerPrimitive =
            serde_json::from_str(r#"{"time_start": 7, "channel": 1}"#).unwrap();
        assert_eq!(decoded.time_start, 7);
        assert_eq!(decoded.channel, 1);
        assert_eq!(decoded.adc_integral, 0);
    }

    #[test]
    fn records_expose_time_start() {
        let ta = TriggerActivity {
            time_start: 55,
            time_end: 70,
            ..Default::default()
        };
        assert_eq!(ta.time_start(), 55);
        let tc = TriggerCandidate {
            time_start: 90,
            time_end: 120,
            ..Default::default()
        };
        assert_eq!(tc.time_start(), 90);
    }
}

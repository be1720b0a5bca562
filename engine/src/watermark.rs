//! Importer watermark: the highest external sequence number and timestamp
//! already merged.

use crate::Timestamp;
use serde::{Deserialize, Serialize};

/// Persisted high-water marks for the external feed.
///
/// Both marks only ever move forward.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncWatermark {
    /// Highest external sequence number merged
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sequence: Option<u64>,
    /// Highest last-modified time merged (milliseconds since epoch)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<Timestamp>,
}

impl SyncWatermark {
    /// True if a row with this sequence number was already merged.
    pub fn covers_sequence(&self, sequence: u64) -> bool {
        self.sequence.is_some_and(|mark| sequence <= mark)
    }

    /// True if a row modified at `at` was already merged.
    pub fn covers_timestamp(&self, at: Timestamp) -> bool {
        self.timestamp.is_some_and(|mark| at <= mark)
    }

    pub fn observe_sequence(&mut self, sequence: u64) {
        self.sequence = Some(self.sequence.map_or(sequence, |mark| mark.max(sequence)));
    }

    pub fn observe_timestamp(&mut self, at: Timestamp) {
        self.timestamp = Some(self.timestamp.map_or(at, |mark| mark.max(at)));
    }

    /// Combine with another watermark, keeping the higher of each mark.
    pub fn merge(&mut self, other: &SyncWatermark) {
        if let Some(seq) = other.sequence {
            self.observe_sequence(seq);
        }
        if let Some(at) = other.timestamp {
            self.observe_timestamp(at);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.sequence.is_none() && self.timestamp.is_none()
    }
}

use std::collections::BTreeSet;

/// Default segment length in seconds.
pub const DEFAULT_SEGMENT_LENGTH: f64 = 5.0;

/// Remembers which fixed-length segments of the timeline have every bucket decoded.
#[derive(Debug, Clone)]
pub struct SegmentTracker {
    segment_length: f64,
    completed: BTreeSet<u64>,
}

impl SegmentTracker {
    pub fn new(segment_length: f64) -> Self {
        let segment_length = if segment_length.is_finite() && segment_length > 0.0 {
            segment_length
        } else {
            DEFAULT_SEGMENT_LENGTH
        };
        Self {
            segment_length,
            completed: BTreeSet::new(),
        }
    }

    pub fn segment_length(&self) -> f64 {
        self.segment_length
    }

    /// `floor(timestamp / segment_length)`, with negative times mapped to segment zero.
    pub fn segment_index_for(&self, timestamp: f64) -> u64 {
        if !timestamp.is_finite() || timestamp <= 0.0 {
            return 0;
        }
        (timestamp / self.segment_length).floor() as u64
    }

    pub fn segment_start(&self, index: u64) -> f64 {
        index as f64 * self.segment_length
    }

    /// Number of segments needed to cover `duration` seconds.
    pub fn segment_count(&self, duration: f64) -> u64 {
        if !duration.is_finite() || duration <= 0.0 {
            return 0;
        }
        (duration / self.segment_length).ceil() as u64
    }

    pub fn is_complete(&self, index: u64) -> bool {
        self.completed.contains(&index)
    }

    /// Returns `false` if the segment was already complete.
    pub fn mark_complete(&mut self, index: u64) -> bool {
        self.completed.insert(index)
    }

    /// Time ranges of the completed segments, ascending, clipped to `duration`.
    /// Adjacent segments are merged into one span.
    pub fn completed_spans(&self, duration: f64) -> Vec<(f64, f64)> {
        let mut spans: Vec<(f64, f64)> = Vec::new();
        for &index in &self.completed {
            let start = self.segment_start(index);
            let end = (start + self.segment_length).min(duration);
            if start >= end {
                continue;
            }
            match spans.last_mut() {
                Some(last) if last.1 >= start => last.1 = end,
                _ => spans.push((start, end)),
            }
        }
        spans
    }

    pub fn completed_count(&self) -> usize {
        self.completed.len()
    }

    pub fn reset(&mut self) {
        self.completed.clear();
    }
}

impl Default for SegmentTracker {
    fn default() -> Self {
        Self::new(DEFAULT_SEGMENT_LENGTH)
    }
}

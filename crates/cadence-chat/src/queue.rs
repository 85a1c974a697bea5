//! FIFO of segments waiting to be shown

use std::collections::VecDeque;

/// Segments extracted from the stream but not yet delivered.
#[derive(Debug, Clone, Default)]
pub struct SegmentQueue {
    segments: VecDeque<String>,
}

impl SegmentQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a segment. Blank segments are ignored; returns whether the
    /// segment was queued.
    pub fn enqueue(&mut self, segment: impl Into<String>) -> bool {
        let segment = segment.into();
        if segment.trim().is_empty() {
            return false;
        }
        self.segments.push_back(segment);
        true
    }

    /// Remove and return the oldest segment
    pub fn dequeue(&mut self) -> Option<String> {
        self.segments.pop_front()
    }

    /// Look at the oldest segment without removing it
    pub fn peek(&self) -> Option<&str> {
        self.segments.front().map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn clear(&mut self) {
        self.segments.clear();
    }
}

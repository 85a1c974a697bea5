//! Delimiter-based segmentation of the raw response stream

/// Delimiter the backend places between segments
pub const DEFAULT_DELIMITER: &str = "<chunk>";

/// Accumulates text deltas and splits off complete segments.
///
/// After every `append_chunk` the pending text contains no complete
/// delimiter; a delimiter split across deltas is recognised once its last
/// piece arrives.
#[derive(Debug, Clone)]
pub struct StreamBuffer {
    delimiter: String,
    pending: String,
}

impl StreamBuffer {
    /// Create a buffer splitting on `delimiter`. An empty delimiter never
    /// splits; everything is delivered by `flush`.
    pub fn new(delimiter: impl Into<String>) -> Self {
        Self {
            delimiter: delimiter.into(),
            pending: String::new(),
        }
    }

    pub fn delimiter(&self) -> &str {
        &self.delimiter
    }

    /// Text received but not yet cut into a segment
    pub fn pending(&self) -> &str {
        &self.pending
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Append a delta and return every segment it completed, in stream order.
    ///
    /// Segments that are blank after trimming are consumed but not returned.
    pub fn append_chunk(&mut self, delta: &str) -> Vec<String> {
        let mut segments = Vec::new();
        self.pending.push_str(delta);

        if self.delimiter.is_empty() {
            return segments;
        }

        while let Some(idx) = self.pending.find(&self.delimiter) {
            let segment = self.pending[..idx].to_string();
            self.pending.drain(..idx + self.delimiter.len());

            if !segment.trim().is_empty() {
                segments.push(segment);
            }
        }

        segments
    }

    /// Take whatever is left, delimiter or not
    pub fn flush(&mut self) -> String {
        std::mem::take(&mut self.pending)
    }

    pub fn clear(&mut self) {
        self.pending.clear();
    }
}

impl Default for StreamBuffer {
    fn default() -> Self {
        Self::new(DEFAULT_DELIMITER)
    }
}

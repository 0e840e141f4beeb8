//! Pattern buffer with incremental tail search.
//!
//! Only the bytes appended since the last unsuccessful search (plus an
//! overlap of `search_depth` bytes, so a match straddling two reads is not
//! missed) are scanned. For large outputs such as full routing tables this
//! keeps each poll proportional to the new data, not the whole buffer.

use regex::bytes::Regex;

use super::ansi::AnsiStripper;

/// Device output read so far, searched incrementally.
///
/// The first match in buffer order is reported as long as it is shorter
/// than `search_depth`.
#[derive(Debug)]
pub struct PatternBuffer {
    buffer: Vec<u8>,

    /// Overlap re-scanned before the unsearched region.
    search_depth: usize,

    /// Bytes already scanned without a match.
    searched: usize,

    /// ANSI stripper, present when the dialect emits escape codes.
    stripper: Option<AnsiStripper>,
}

impl PatternBuffer {
    /// Empty buffer re-scanning `search_depth` bytes of overlap.
    pub fn new(search_depth: usize) -> Self {
        Self {
            buffer: Vec::with_capacity(4096),
            search_depth,
            searched: 0,
            stripper: None,
        }
    }

    /// Strip ANSI escape codes from every extension.
    pub fn with_ansi_stripping(mut self, enabled: bool) -> Self {
        self.stripper = enabled.then(AnsiStripper::new);
        self
    }

    /// Append freshly read bytes.
    pub fn extend(&mut self, data: &[u8]) {
        if let Some(stripper) = self.stripper.as_mut() {
            let cleaned = stripper.strip(data);
            self.buffer.extend_from_slice(&cleaned);
        } else {
            self.buffer.extend_from_slice(data);
        }
    }

    /// Find the first match not yet reported, returning its byte range.
    ///
    /// Anchors such as `^` see the full buffer as context.
    pub fn find_next(&mut self, pattern: &Regex) -> Option<(usize, usize)> {
        let start = self.searched.saturating_sub(self.search_depth);
        match pattern.find_at(&self.buffer, start) {
            Some(m) => Some((m.start(), m.end())),
            None => {
                self.searched = self.buffer.len();
                None
            }
        }
    }

    /// Split off and return everything up to `end`, keeping the remainder.
    pub fn split_to(&mut self, end: usize) -> Vec<u8> {
        let end = end.min(self.buffer.len());
        let rest = self.buffer.split_off(end);
        self.searched = 0;
        std::mem::replace(&mut self.buffer, rest)
    }

    /// Drain everything.
    pub fn take(&mut self) -> Vec<u8> {
        self.searched = 0;
        std::mem::take(&mut self.buffer)
    }

    /// Buffered bytes.
    pub fn as_slice(&self) -> &[u8] {
        &self.buffer
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }
}

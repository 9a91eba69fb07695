//! Boundary-safe content detection over streamed document text.

use regex::Regex;
use tracing::debug;

use crate::errors::ConfigError;
use crate::html::{DocumentHandler, ScanFlow};
use crate::login::LoginParameters;

use super::TargetResult;

/// Default accumulation capacity, in characters.
pub const DEFAULT_CAPACITY: usize = 65_536;
/// Default chunk-boundary overlap, in characters.
pub const DEFAULT_OVERLAP: usize = 16_384;

/// Detects whether any of a set of patterns occurs in a document's
/// rendered text, without buffering the whole document.
///
/// Consecutive printable characters (tab, or anything at or above space)
/// accumulate into a bounded buffer; any other character flushes the
/// buffer and forces an evaluation. When the buffer reaches capacity,
/// every pattern is tested; on a miss the last `overlap` characters are
/// retained so a match spanning the chunk boundary is still seen on the
/// next evaluation. A final evaluation runs at end of document.
///
/// A match is detected iff a pattern occurs in the full printable-text
/// concatenation, independent of chunk boundaries, provided the match is
/// no longer than the overlap.
#[derive(Debug)]
pub struct ContentRegionMatcher {
    patterns: Vec<Regex>,
    capacity: usize,
    overlap: usize,
    buffer: String,
    buffered_chars: usize,
    result: TargetResult,
}

impl ContentRegionMatcher {
    /// Creates a matcher with the default window configuration.
    #[must_use]
    pub fn new(patterns: Vec<Regex>) -> Self {
        // The defaults satisfy overlap < capacity by construction.
        Self {
            patterns,
            capacity: DEFAULT_CAPACITY,
            overlap: DEFAULT_OVERLAP,
            buffer: String::new(),
            buffered_chars: 0,
            result: TargetResult::Unset,
        }
    }

    /// Creates a matcher with an explicit window configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::OverlapNotBelowCapacity`] unless
    /// `overlap < capacity`; the retained-suffix step is undefined
    /// otherwise.
    pub fn with_window(
        patterns: Vec<Regex>,
        capacity: usize,
        overlap: usize,
    ) -> Result<Self, ConfigError> {
        if overlap >= capacity {
            return Err(ConfigError::OverlapNotBelowCapacity { overlap, capacity });
        }
        Ok(Self {
            patterns,
            capacity,
            overlap,
            buffer: String::new(),
            buffered_chars: 0,
            result: TargetResult::Unset,
        })
    }

    /// The scan result so far.
    #[must_use]
    pub fn result(&self) -> &TargetResult {
        &self.result
    }

    /// Applies the login rule's explicit override URL and returns the
    /// final result.
    #[must_use]
    pub fn into_result(mut self, params: Option<&LoginParameters>) -> TargetResult {
        self.result
            .apply_override(params.and_then(LoginParameters::override_target_url));
        self.result
    }

    fn evaluate(&mut self) {
        if self.result.is_set() || self.buffer.is_empty() {
            return;
        }
        if self.patterns.iter().any(|p| p.is_match(&self.buffer)) {
            debug!(buffered = self.buffered_chars, "content pattern matched");
            self.result = TargetResult::FoundUnspecified;
        }
    }

    /// Drops everything but the last `overlap` characters of the buffer.
    fn retain_overlap(&mut self) {
        if self.buffered_chars <= self.overlap {
            return;
        }
        let cut_chars = self.buffered_chars - self.overlap;
        if let Some((byte_offset, _)) = self.buffer.char_indices().nth(cut_chars) {
            self.buffer.drain(..byte_offset);
            self.buffered_chars = self.overlap;
        }
    }

    fn flush(&mut self) {
        self.evaluate();
        self.buffer.clear();
        self.buffered_chars = 0;
    }
}

impl DocumentHandler for ContentRegionMatcher {
    fn text_char(&mut self, c: char) -> ScanFlow {
        if self.result.is_set() {
            return ScanFlow::Stop;
        }
        if c == '\t' || c >= ' ' {
            self.buffer.push(c);
            self.buffered_chars += 1;
            if self.buffered_chars >= self.capacity {
                self.evaluate();
                if self.result.is_set() {
                    return ScanFlow::Stop;
                }
                self.retain_overlap();
            }
        } else {
            // Newlines and other control characters end the region.
            self.flush();
            if self.result.is_set() {
                return ScanFlow::Stop;
            }
        }
        ScanFlow::Continue
    }

    fn finish(&mut self) {
        self.evaluate();
    }
}

//! Decoding policy.
//!
//! The decoder and the validator share one [`DecodeOptions`], so a buffer accepted by one is
//! accepted by the other under the same options.

use serde::{Deserialize, Serialize};

use crate::MAX_DEPTH;

/// What to do when a map repeats a key.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DuplicateKeys {
    /// Keep the value that appeared last.
    #[default]
    LastWins,
    /// Fail with a protocol violation.
    Reject,
}

/// Whether 2-byte headers holding a size of 15 or less are accepted.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HeaderWidths {
    /// Only the shortest header form is accepted.
    #[default]
    Minimal,
    /// Any header form is accepted.
    Lenient,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct DecodeOptions {
    /// Maximum nesting of sequences, maps, and key-value pairs.
    pub max_depth: usize,
    pub duplicate_keys: DuplicateKeys,
    pub header_widths: HeaderWidths,
}

impl Default for DecodeOptions {
    fn default() -> Self {
        Self {
            max_depth: MAX_DEPTH,
            duplicate_keys: DuplicateKeys::default(),
            header_widths: HeaderWidths::default(),
        }
    }
}

impl DecodeOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    pub fn with_duplicate_keys(mut self, policy: DuplicateKeys) -> Self {
        self.duplicate_keys = policy;
        self
    }

    pub fn with_header_widths(mut self, policy: HeaderWidths) -> Self {
        self.header_widths = policy;
        self
    }

    pub(crate) fn requires_minimal_headers(&self) -> bool {
        self.header_widths == HeaderWidths::Minimal
    }

    pub(crate) fn rejects_duplicate_keys(&self) -> bool {
        self.duplicate_keys == DuplicateKeys::Reject
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn defaults() {
        let opts = DecodeOptions::default();
        assert_eq!(opts.max_depth, MAX_DEPTH);
        assert_eq!(opts.duplicate_keys, DuplicateKeys::LastWins);
        assert_eq!(opts.header_widths, HeaderWidths::Minimal);
        assert!(opts.requires_minimal_headers());
        assert!(!opts.rejects_duplicate_keys());
    }

    #[test]
    fn builder() {
        let opts = DecodeOptions::new()
            .with_max_depth(4)
            .with_duplicate_keys(DuplicateKeys::Reject)
            .with_header_widths(HeaderWidths::Lenient);
        assert_eq!(opts.max_depth, 4);
        assert!(opts.rejects_duplicate_keys());
        assert!(!opts.requires_minimal_headers());
    }
}

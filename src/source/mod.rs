//! External collaborator boundaries: where alignment records and reference
//! sequence come from.
//!
//! Container-format parsing and random-access retrieval live outside this
//! crate; these traits are the seam. A TSV-backed source ships for the
//! binary and tests.

pub mod tsv;

use ahash::AHashMap;
use anyhow::Result;

use crate::core::alignment::AlignmentRecord;

pub use tsv::TsvAlignmentSource;

/// Supplies alignment records for a genomic interval. The core only reads.
pub trait AlignmentSource: Send + Sync {
    /// Lazy, single-pass sequence of records overlapping the interval.
    fn fetch<'a>(
        &'a self,
        chrom: &str,
        start: i64,
        end: i64,
    ) -> Result<Box<dyn Iterator<Item = AlignmentRecord> + 'a>>;

    /// Chromosomes present, with an upper bound on their extent.
    fn chromosomes(&self) -> Vec<(String, i64)>;
}

/// A slice of reference sequence anchored at an absolute coordinate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReferenceWindow {
    pub start: i64,
    pub sequence: Vec<u8>,
}

/// Supplies reference neighborhoods for breakpoint refinement. Returning
/// None routes the component down the degraded (graph-estimate) path.
pub trait ReferenceSource: Send + Sync {
    fn window(&self, chrom: &str, start: i64, end: i64) -> Option<ReferenceWindow>;
}

/// Whole-sequence in-memory reference, for tests and small runs.
#[derive(Debug, Clone, Default)]
pub struct InMemoryReference {
    sequences: AHashMap<String, Vec<u8>>,
}

impl InMemoryReference {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_sequence(mut self, chrom: &str, sequence: &[u8]) -> Self {
        self.sequences.insert(chrom.to_string(), sequence.to_vec());
        self
    }
}

impl ReferenceSource for InMemoryReference {
    fn window(&self, chrom: &str, start: i64, end: i64) -> Option<ReferenceWindow> {
        let sequence = self.sequences.get(chrom)?;
        let lo = start.max(0) as usize;
        let hi = (end.max(0) as usize).min(sequence.len());
        if lo >= hi {
            return None;
        }
        Some(ReferenceWindow {
            start: lo as i64,
            sequence: sequence[lo..hi].to_vec(),
        })
    }
}

/// Reference source that never has a window: every component falls back to
/// graph-estimated breakpoints.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoReference;

impl ReferenceSource for NoReference {
    fn window(&self, _chrom: &str, _start: i64, _end: i64) -> Option<ReferenceWindow> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn in_memory_window_clamps_to_sequence() {
        let reference = InMemoryReference::new().with_sequence("chr1", b"ACGTACGTACGT");
        let window = reference.window("chr1", 4, 100).unwrap();
        assert_eq!(window.start, 4);
        assert_eq!(window.sequence, b"ACGTACGT");
        assert!(reference.window("chr2", 0, 10).is_none());
        assert!(reference.window("chr1", 20, 30).is_none());
    }
}

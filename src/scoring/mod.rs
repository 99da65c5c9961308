//! Sequence-alignment scoring collaborator.
//!
//! The assembler treats scoring as an oracle: a deterministic, pure
//! function from two sequences to a local-alignment score plus coordinates
//! and edit distance. The default implementation wraps the `bio` crate's
//! pairwise aligner.

use bio::alignment::pairwise::Aligner;
use bio::alignment::AlignmentOperation;
use serde::{Deserialize, Serialize};

/// Result of locally aligning sequence `a` against sequence `b`.
/// Coordinates are half-open ranges into each input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalAlignment {
    pub score: i32,
    pub a_start: usize,
    pub a_end: usize,
    pub b_start: usize,
    pub b_end: usize,
    /// Substitutions plus indel bases inside the aligned region.
    pub edit_distance: u32,
}

impl LocalAlignment {
    /// Aligned length on `a`.
    pub fn aligned_len(&self) -> usize {
        self.a_end - self.a_start
    }

    /// Fraction of aligned columns that match, in [0, 1].
    pub fn identity(&self) -> f64 {
        let len = self.aligned_len().max(self.b_end - self.b_start);
        if len == 0 {
            return 0.0;
        }
        1.0 - (self.edit_distance as f64 / len as f64).min(1.0)
    }
}

/// Scoring oracle used by local reassembly.
pub trait AlignmentScorer: Send + Sync {
    fn local_align(&self, a: &[u8], b: &[u8]) -> LocalAlignment;
}

/// Smith-Waterman scorer built on `bio`'s pairwise aligner.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PairwiseScorer {
    pub match_score: i32,
    pub mismatch_score: i32,
    pub gap_open: i32,
    pub gap_extend: i32,
}

impl Default for PairwiseScorer {
    fn default() -> Self {
        Self {
            match_score: 2,
            mismatch_score: -3,
            gap_open: -5,
            gap_extend: -1,
        }
    }
}

impl AlignmentScorer for PairwiseScorer {
    fn local_align(&self, a: &[u8], b: &[u8]) -> LocalAlignment {
        if a.is_empty() || b.is_empty() {
            return LocalAlignment {
                score: 0,
                a_start: 0,
                a_end: 0,
                b_start: 0,
                b_end: 0,
                edit_distance: 0,
            };
        }

        let match_score = self.match_score;
        let mismatch_score = self.mismatch_score;
        let score_fn =
            |x: u8, y: u8| if x.eq_ignore_ascii_case(&y) { match_score } else { mismatch_score };
        let mut aligner =
            Aligner::with_capacity(a.len(), b.len(), self.gap_open, self.gap_extend, score_fn);
        let alignment = aligner.local(a, b);

        let edit_distance = alignment
            .operations
            .iter()
            .filter(|op| {
                matches!(
                    op,
                    AlignmentOperation::Subst
                        | AlignmentOperation::Del
                        | AlignmentOperation::Ins
                )
            })
            .count() as u32;

        LocalAlignment {
            score: alignment.score,
            a_start: alignment.xstart,
            a_end: alignment.xend,
            b_start: alignment.ystart,
            b_end: alignment.yend,
            edit_distance,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn perfect_overlap_scores_full_identity() {
        let scorer = PairwiseScorer::default();
        let alignment = scorer.local_align(b"ACGTACGTACGT", b"ACGTACGTACGT");
        assert_eq!(alignment.aligned_len(), 12);
        assert_eq!(alignment.edit_distance, 0);
        assert!((alignment.identity() - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn suffix_prefix_overlap_is_located() {
        let scorer = PairwiseScorer::default();
        // Suffix of a == prefix of b.
        let alignment = scorer.local_align(b"TTTTTTACGTACGT", b"ACGTACGTCCCCCC");
        assert_eq!(alignment.a_end, 14);
        assert_eq!(alignment.b_start, 0);
        assert_eq!(alignment.aligned_len(), 8);
    }

    #[test]
    fn scoring_is_deterministic() {
        let scorer = PairwiseScorer::default();
        let first = scorer.local_align(b"ACGTACGTGGGG", b"CCACGTACGTGG");
        let second = scorer.local_align(b"ACGTACGTGGGG", b"CCACGTACGTGG");
        assert_eq!(first, second);
    }

    #[test]
    fn empty_input_scores_zero() {
        let scorer = PairwiseScorer::default();
        let alignment = scorer.local_align(b"", b"ACGT");
        assert_eq!(alignment.score, 0);
        assert_eq!(alignment.aligned_len(), 0);
    }
}

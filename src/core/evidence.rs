//! Typed evidence events extracted from read alignments.
//!
//! Each event is one signal from one read. Events are immutable once
//! created; the evidence graph references them by index into the region's
//! event arena rather than owning copies.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Strand {
    Forward,
    Reverse,
}

impl Strand {
    pub fn from_reverse_flag(is_reverse: bool) -> Self {
        if is_reverse {
            Strand::Reverse
        } else {
            Strand::Forward
        }
    }
}

/// The kind of structural-variant signal a read contributed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EvidenceKind {
    /// CIGAR deletion above the minimum length.
    Deletion,
    /// CIGAR insertion above the minimum length.
    Insertion,
    /// Read pair with unexpected orientation or separation.
    DiscordantPair,
    /// Primary + supplementary alignment of the same read.
    SplitRead,
    /// Soft-clipped read end carrying the clipped bases.
    SoftClip,
    /// Everted (outward-facing) pair, the tandem-duplication signature.
    DuplicationSignal,
}

impl EvidenceKind {
    /// Merge tolerance when clustering an event of this kind into an
    /// existing anchor node. CIGAR-derived coordinates are exact, clip and
    /// split coordinates are near-exact, discordant-pair breakpoints are
    /// only known to within the fragment-size spread until assembly
    /// refines them.
    pub fn cluster_tolerance(&self) -> i64 {
        match self {
            EvidenceKind::Deletion | EvidenceKind::Insertion => 15,
            EvidenceKind::SoftClip | EvidenceKind::SplitRead => 50,
            EvidenceKind::DiscordantPair | EvidenceKind::DuplicationSignal => 350,
        }
    }

    /// Whether events of this kind anchor at two genomic positions.
    pub fn is_two_anchor(&self) -> bool {
        matches!(
            self,
            EvidenceKind::Deletion
                | EvidenceKind::DiscordantPair
                | EvidenceKind::SplitRead
                | EvidenceKind::DuplicationSignal
        )
    }
}

/// One signal extracted from one read alignment. Immutable after creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvidenceEvent {
    pub kind: EvidenceKind,
    pub chrom: String,
    /// Primary anchor coordinate (0-based).
    pub pos: i64,
    /// Secondary coordinate on the same chromosome: deletion end, insertion
    /// site (== pos), or the second anchor of an intra-chromosomal pair.
    pub end_pos: i64,
    pub strand: Strand,
    /// Partner coordinates for pair/split evidence. Same chromosome for
    /// intra-chromosomal rearrangements, different for translocations.
    pub mate_chrom: Option<String>,
    pub mate_pos: Option<i64>,
    pub mate_strand: Option<Strand>,
    pub read_id: String,
    pub mapq: u8,
    /// Clipped or inserted bases available for local reassembly.
    pub clip_sequence: Option<String>,
}

impl EvidenceEvent {
    /// True when the partner anchor lies on a different chromosome.
    pub fn is_interchromosomal(&self) -> bool {
        match &self.mate_chrom {
            Some(mc) => *mc != self.chrom,
            None => false,
        }
    }

    /// The second anchor for two-anchor events, if it lives on the same
    /// chromosome and can therefore join this region's graph.
    pub fn local_mate_anchor(&self) -> Option<i64> {
        if !self.kind.is_two_anchor() {
            return None;
        }
        if self.is_interchromosomal() {
            return None;
        }
        match self.kind {
            EvidenceKind::Deletion => Some(self.end_pos),
            _ => self.mate_pos,
        }
    }

    /// Fragment usable by the assembler, if long enough to seed an overlap.
    pub fn assembly_fragment(&self, min_len: usize) -> Option<&str> {
        self.clip_sequence
            .as_deref()
            .filter(|s| s.len() >= min_len)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(kind: EvidenceKind) -> EvidenceEvent {
        EvidenceEvent {
            kind,
            chrom: "chr1".to_string(),
            pos: 1000,
            end_pos: 5000,
            strand: Strand::Forward,
            mate_chrom: Some("chr1".to_string()),
            mate_pos: Some(5000),
            mate_strand: Some(Strand::Reverse),
            read_id: "r1".to_string(),
            mapq: 60,
            clip_sequence: None,
        }
    }

    #[test]
    fn tolerance_tightens_with_positional_precision() {
        assert!(
            EvidenceKind::Deletion.cluster_tolerance()
                < EvidenceKind::SoftClip.cluster_tolerance()
        );
        assert!(
            EvidenceKind::SoftClip.cluster_tolerance()
                < EvidenceKind::DiscordantPair.cluster_tolerance()
        );
    }

    #[test]
    fn deletion_mate_anchor_is_cigar_end() {
        let ev = event(EvidenceKind::Deletion);
        assert_eq!(ev.local_mate_anchor(), Some(5000));
    }

    #[test]
    fn interchromosomal_pair_has_no_local_anchor() {
        let mut ev = event(EvidenceKind::DiscordantPair);
        ev.mate_chrom = Some("chr9".to_string());
        assert!(ev.is_interchromosomal());
        assert_eq!(ev.local_mate_anchor(), None);
    }

    #[test]
    fn soft_clip_is_single_anchor() {
        let ev = event(EvidenceKind::SoftClip);
        assert_eq!(ev.local_mate_anchor(), None);
    }

    #[test]
    fn short_fragment_is_rejected() {
        let mut ev = event(EvidenceKind::SoftClip);
        ev.clip_sequence = Some("ACGTACGT".to_string());
        assert!(ev.assembly_fragment(12).is_none());
        assert_eq!(ev.assembly_fragment(8), Some("ACGTACGT"));
    }
}

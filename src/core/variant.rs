//! Variant call records handed to the classifier and serializer.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::core::evidence::EvidenceKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SvType {
    Deletion,
    Insertion,
    Inversion,
    Duplication,
    Translocation,
}

impl SvType {
    pub fn symbol(&self) -> &'static str {
        match self {
            SvType::Deletion => "DEL",
            SvType::Insertion => "INS",
            SvType::Inversion => "INV",
            SvType::Duplication => "DUP",
            SvType::Translocation => "BND",
        }
    }
}

/// Outcome of local reassembly inside one component. Read-only after
/// creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssemblyResult {
    pub consensus_sequence: String,
    /// Refined breakpoints, ordered low to high.
    pub breakpoint_positions: (i64, i64),
    /// Bases present in the consensus but absent from the reference
    /// neighborhood at the junction.
    pub insertion_sequence: Option<String>,
    /// Fragments merged into the consensus.
    pub contig_support_count: usize,
    /// Mean overlap identity across merges, scaled into [0, 1].
    pub assembly_quality: f64,
}

/// Per-component support statistics: the feature vector fed to the
/// classifier collaborator.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SupportMetrics {
    pub n_deletion: u32,
    pub n_insertion: u32,
    pub n_discordant: u32,
    pub n_split: u32,
    pub n_soft_clip: u32,
    pub n_duplication: u32,
    /// Distinct supporting reads.
    pub supporting_reads: u32,
    pub mean_mapq: f64,
    pub min_mapq: u8,
    pub mapq_stddev: f64,
    /// Fraction of evidence on the forward strand.
    pub strand_bias: f64,
    /// Breakpoint depth divided by the local background depth.
    pub depth_ratio: f64,
    pub contig_length: u32,
    pub contig_quality: f64,
}

impl SupportMetrics {
    pub fn count_for(&self, kind: EvidenceKind) -> u32 {
        match kind {
            EvidenceKind::Deletion => self.n_deletion,
            EvidenceKind::Insertion => self.n_insertion,
            EvidenceKind::DiscordantPair => self.n_discordant,
            EvidenceKind::SplitRead => self.n_split,
            EvidenceKind::SoftClip => self.n_soft_clip,
            EvidenceKind::DuplicationSignal => self.n_duplication,
        }
    }

    pub fn total_events(&self) -> u32 {
        self.n_deletion
            + self.n_insertion
            + self.n_discordant
            + self.n_split
            + self.n_soft_clip
            + self.n_duplication
    }

    /// Flatten into the classifier input. Field order is part of the
    /// classifier contract and must stay stable.
    pub fn feature_vector(&self) -> Vec<f64> {
        vec![
            self.n_deletion as f64,
            self.n_insertion as f64,
            self.n_discordant as f64,
            self.n_split as f64,
            self.n_soft_clip as f64,
            self.n_duplication as f64,
            self.supporting_reads as f64,
            self.mean_mapq,
            self.min_mapq as f64,
            self.mapq_stddev,
            self.strand_bias,
            self.depth_ratio,
            self.contig_length as f64,
            self.contig_quality,
        ]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Genotype {
    Heterozygous,
    Homozygous,
}

impl Genotype {
    pub fn vcf_label(&self) -> &'static str {
        match self {
            Genotype::Heterozygous => "0/1",
            Genotype::Homozygous => "1/1",
        }
    }
}

/// Final output record. Field semantics round-trip losslessly through
/// whatever serializer is attached downstream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariantCall {
    pub chrom: String,
    pub pos: i64,
    /// For translocations this is `pos + 1` and the partner locus lives in
    /// `mate_chrom`/`mate_pos`.
    pub end: i64,
    pub sv_type: SvType,
    pub sv_length: i64,
    pub mate_chrom: Option<String>,
    pub mate_pos: Option<i64>,
    pub support_metrics: SupportMetrics,
    pub assembly: Option<AssemblyResult>,
    /// Names of the reads contributing evidence; overlap-merge unions these
    /// so support is never double counted. Ordered so serialized output is
    /// reproducible.
    pub supporting_read_names: BTreeSet<String>,
    pub raw_component_id: usize,
    pub genotype: Option<Genotype>,
    pub confidence: Option<f64>,
}

impl VariantCall {
    /// Coordinate invariant from the data model: non-translocation calls
    /// span forward.
    pub fn coordinates_valid(&self) -> bool {
        match self.sv_type {
            SvType::Translocation => self.mate_chrom.is_some() && self.mate_pos.is_some(),
            _ => self.end >= self.pos && self.sv_length > 0,
        }
    }
}

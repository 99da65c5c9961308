//! Read-evidence extraction: one alignment record in, zero or more typed
//! evidence events out.
//!
//! The returned iterator is single-pass and consumed immediately by the
//! evidence graph. Filtering here is a contract, not an error path: records
//! below the mapping-quality floor, duplicates, and secondary alignments
//! emit nothing, and malformed records are skipped with a counter bump.

pub mod insert_size;

pub use insert_size::estimate_insert_size;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::core::alignment::{AlignmentRecord, CigarOp};
use crate::core::evidence::{EvidenceEvent, EvidenceKind, Strand};
use crate::utils::configuration::ExtractConfig;

/// Per-region extraction tallies, absorbed into the run report.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractCounters {
    pub records_seen: u64,
    pub records_malformed: u64,
    pub records_below_mapq: u64,
    pub records_filtered_flags: u64,
    pub events_emitted: u64,
}

impl ExtractCounters {
    pub fn absorb(&mut self, other: &ExtractCounters) {
        self.records_seen += other.records_seen;
        self.records_malformed += other.records_malformed;
        self.records_below_mapq += other.records_below_mapq;
        self.records_filtered_flags += other.records_filtered_flags;
        self.events_emitted += other.events_emitted;
    }
}

pub struct EvidenceExtractor {
    config: ExtractConfig,
}

impl EvidenceExtractor {
    pub fn new(config: ExtractConfig) -> Self {
        Self { config }
    }

    /// Extract all evidence events from one record. Single pass; the
    /// iterator is not restartable.
    pub fn extract(
        &self,
        record: &AlignmentRecord,
        counters: &mut ExtractCounters,
    ) -> impl Iterator<Item = EvidenceEvent> {
        counters.records_seen += 1;

        if !record.is_well_formed() {
            counters.records_malformed += 1;
            debug!(read = %record.read_name, "skipping malformed alignment record");
            return Vec::new().into_iter();
        }
        if record.is_secondary() || record.is_duplicate() {
            counters.records_filtered_flags += 1;
            return Vec::new().into_iter();
        }
        if record.mapq < self.config.min_mapq {
            counters.records_below_mapq += 1;
            return Vec::new().into_iter();
        }

        let mut events = Vec::new();
        self.extract_cigar_events(record, &mut events);
        self.extract_clip_events(record, &mut events);
        self.extract_pair_events(record, &mut events);

        counters.events_emitted += events.len() as u64;
        events.into_iter()
    }

    /// Intra-alignment indels at exact reference coordinates.
    fn extract_cigar_events(&self, record: &AlignmentRecord, events: &mut Vec<EvidenceEvent>) {
        let strand = Strand::from_reverse_flag(record.is_reverse());
        let mut ref_cursor = record.pos;
        let mut query_cursor = 0usize;

        for (op, len) in &record.cigar {
            match op {
                CigarOp::Del => {
                    if *len >= self.config.min_indel_len {
                        events.push(EvidenceEvent {
                            kind: EvidenceKind::Deletion,
                            chrom: record.chrom.clone(),
                            pos: ref_cursor,
                            end_pos: ref_cursor + *len as i64,
                            strand,
                            mate_chrom: None,
                            mate_pos: None,
                            mate_strand: None,
                            read_id: record.read_name.clone(),
                            mapq: record.mapq,
                            clip_sequence: None,
                        });
                    }
                }
                CigarOp::Ins => {
                    if *len >= self.config.min_indel_len {
                        let inserted = record
                            .sequence
                            .get(query_cursor..query_cursor + *len as usize)
                            .map(str::to_string);
                        events.push(EvidenceEvent {
                            kind: EvidenceKind::Insertion,
                            chrom: record.chrom.clone(),
                            pos: ref_cursor,
                            end_pos: ref_cursor,
                            strand,
                            mate_chrom: None,
                            mate_pos: None,
                            mate_strand: None,
                            read_id: record.read_name.clone(),
                            mapq: record.mapq,
                            clip_sequence: inserted,
                        });
                    }
                }
                _ => {}
            }
            if op.consumes_reference() {
                ref_cursor += *len as i64;
            }
            if op.consumes_query() {
                query_cursor += *len as usize;
            }
        }
    }

    /// Soft-clip events at the clip junction, carrying the clipped bases
    /// for assembly. Supplementary alignments report as split-read
    /// evidence; the graph joins them to their primary via the read id.
    fn extract_clip_events(&self, record: &AlignmentRecord, events: &mut Vec<EvidenceEvent>) {
        let strand = Strand::from_reverse_flag(record.is_reverse());
        let kind = if record.is_supplementary() {
            EvidenceKind::SplitRead
        } else {
            EvidenceKind::SoftClip
        };

        let leading = record.leading_clip();
        if leading >= self.config.min_clip_len {
            let clip = record
                .sequence
                .get(..leading as usize)
                .map(str::to_string);
            events.push(EvidenceEvent {
                kind,
                chrom: record.chrom.clone(),
                pos: record.pos,
                end_pos: record.pos,
                strand,
                mate_chrom: None,
                mate_pos: None,
                mate_strand: None,
                read_id: record.read_name.clone(),
                mapq: record.mapq,
                clip_sequence: clip,
            });
        }

        let trailing = record.trailing_clip();
        if trailing >= self.config.min_clip_len {
            let junction = record.reference_end();
            let clip = record
                .sequence
                .len()
                .checked_sub(trailing as usize)
                .and_then(|start| record.sequence.get(start..))
                .map(str::to_string);
            events.push(EvidenceEvent {
                kind,
                chrom: record.chrom.clone(),
                pos: junction,
                end_pos: junction,
                strand,
                mate_chrom: None,
                mate_pos: None,
                mate_strand: None,
                read_id: record.read_name.clone(),
                mapq: record.mapq,
                clip_sequence: clip,
            });
        }
    }

    /// Discordant-pair evidence, anchored at the breakpoint-facing end of
    /// this read with the mate's position as the partner anchor. Emitted
    /// from the lower-coordinate end of the pair only, so one pair
    /// contributes one event.
    fn extract_pair_events(&self, record: &AlignmentRecord, events: &mut Vec<EvidenceEvent>) {
        if !record.is_paired() || record.mate_unmapped() || record.is_supplementary() {
            return;
        }
        let (mate_chrom, mate_pos) = match (&record.mate_chrom, record.mate_pos) {
            (Some(c), Some(p)) => (c.clone(), p),
            _ => return,
        };

        let interchromosomal = mate_chrom != record.chrom;
        let span = (mate_pos - record.pos).abs();
        let same_strand = record.is_reverse() == record.mate_reverse();
        // Everted pair: leftmost read reverse, rightmost forward.
        let everted = !interchromosomal
            && !same_strand
            && ((record.pos < mate_pos && record.is_reverse())
                || (record.pos > mate_pos && !record.is_reverse()));
        let distance_anomaly = !interchromosomal && span > self.config.insert_size.max_normal;

        let discordant = !record.is_proper_pair()
            && (interchromosomal || distance_anomaly || same_strand || everted);
        if !discordant {
            return;
        }

        // One event per pair: defer to the lower-coordinate end.
        let this_key = (record.chrom.as_str(), record.pos);
        let mate_key = (mate_chrom.as_str(), mate_pos);
        if this_key > mate_key {
            return;
        }

        let strand = Strand::from_reverse_flag(record.is_reverse());
        let anchor = if record.is_reverse() {
            record.pos
        } else {
            record.reference_end()
        };
        let kind = if everted {
            EvidenceKind::DuplicationSignal
        } else {
            EvidenceKind::DiscordantPair
        };

        events.push(EvidenceEvent {
            kind,
            chrom: record.chrom.clone(),
            pos: anchor,
            end_pos: anchor,
            strand,
            mate_chrom: Some(mate_chrom),
            mate_pos: Some(mate_pos),
            mate_strand: Some(Strand::from_reverse_flag(record.mate_reverse())),
            read_id: record.read_name.clone(),
            mapq: record.mapq,
            clip_sequence: None,
        });
    }
}

//! Variant-type inference from a component's evidence mix.
//!
//! Each event casts a vote based on its kind and pair orientation; the
//! majority wins. Ties resolve in a fixed order (deletion, insertion,
//! duplication, inversion) so inference is deterministic.

use crate::cluster::Component;
use crate::core::evidence::EvidenceKind;
use crate::core::variant::{AssemblyResult, SvType};

pub fn infer_sv_type(component: &Component, assembly: Option<&AssemblyResult>) -> SvType {
    // Any cross-chromosome partner makes this a translocation site.
    if component.iter_events().any(|e| e.is_interchromosomal()) {
        return SvType::Translocation;
    }

    let mut votes = [0u32; 4]; // DEL, INS, DUP, INV
    for event in component.iter_events() {
        match event.kind {
            EvidenceKind::Deletion => votes[0] += 1,
            EvidenceKind::Insertion => votes[1] += 1,
            EvidenceKind::DuplicationSignal => votes[2] += 1,
            EvidenceKind::DiscordantPair => {
                // Same-strand pairs are the inversion signature; opposed
                // strands at excess distance imply deleted sequence.
                match event.mate_strand {
                    Some(mate_strand) if mate_strand == event.strand => votes[3] += 1,
                    _ => votes[0] += 1,
                }
            }
            // Clips and splits locate breakpoints but do not discriminate
            // the variant class on their own.
            EvidenceKind::SoftClip | EvidenceKind::SplitRead => {}
        }
    }

    let best = votes.iter().copied().max().unwrap_or(0);
    if best > 0 {
        let winner = votes.iter().position(|&v| v == best).unwrap_or(0);
        return [
            SvType::Deletion,
            SvType::Insertion,
            SvType::Duplication,
            SvType::Inversion,
        ][winner];
    }

    // Clip-only component: novel assembled sequence at the junction reads
    // as an insertion, otherwise assume missing sequence.
    match assembly {
        Some(a) if a.insertion_sequence.is_some() => SvType::Insertion,
        _ => SvType::Deletion,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::evidence::{EvidenceEvent, Strand};
    use std::sync::Arc;

    fn pair_event(read: &str, strand: Strand, mate_strand: Strand) -> EvidenceEvent {
        EvidenceEvent {
            kind: EvidenceKind::DiscordantPair,
            chrom: "chr1".to_string(),
            pos: 1000,
            end_pos: 1000,
            strand,
            mate_chrom: Some("chr1".to_string()),
            mate_pos: Some(5000),
            mate_strand: Some(mate_strand),
            read_id: read.to_string(),
            mapq: 60,
            clip_sequence: None,
        }
    }

    fn component(events: Vec<EvidenceEvent>) -> Component {
        let n = events.len();
        Component {
            id: 0,
            chrom: "chr1".to_string(),
            nodes: vec![crate::graph::SnapshotNode {
                id: 0,
                chrom: "chr1".to_string(),
                pos_estimate: 1000,
                event_indices: (0..n).collect(),
            }],
            edges: Vec::new(),
            events: Arc::new(events),
            event_indices: (0..n).collect(),
        }
    }

    #[test]
    fn opposed_strand_pairs_call_deletion() {
        let c = component(vec![
            pair_event("r1", Strand::Forward, Strand::Reverse),
            pair_event("r2", Strand::Forward, Strand::Reverse),
        ]);
        assert_eq!(infer_sv_type(&c, None), SvType::Deletion);
    }

    #[test]
    fn same_strand_pairs_call_inversion() {
        let c = component(vec![
            pair_event("r1", Strand::Forward, Strand::Forward),
            pair_event("r2", Strand::Reverse, Strand::Reverse),
        ]);
        assert_eq!(infer_sv_type(&c, None), SvType::Inversion);
    }

    #[test]
    fn cross_chromosome_evidence_wins_over_everything() {
        let mut ev = pair_event("r1", Strand::Forward, Strand::Reverse);
        ev.mate_chrom = Some("chr9".to_string());
        let c = component(vec![ev]);
        assert_eq!(infer_sv_type(&c, None), SvType::Translocation);
    }

    #[test]
    fn clip_only_component_with_novel_sequence_is_insertion() {
        let mut clip = pair_event("r1", Strand::Forward, Strand::Reverse);
        clip.kind = EvidenceKind::SoftClip;
        clip.mate_chrom = None;
        clip.mate_pos = None;
        clip.mate_strand = None;
        let c = component(vec![clip]);
        let assembly = AssemblyResult {
            consensus_sequence: "ACGT".to_string(),
            breakpoint_positions: (1000, 1000),
            insertion_sequence: Some("GGGG".to_string()),
            contig_support_count: 2,
            assembly_quality: 0.8,
        };
        assert_eq!(infer_sv_type(&c, Some(&assembly)), SvType::Insertion);
        assert_eq!(infer_sv_type(&c, None), SvType::Deletion);
    }
}

//! Local reassembly inside one component.
//!
//! Greedy overlap assembly: repeatedly merge the pair of fragments with
//! the best-scoring local-alignment overlap until nothing clears the
//! threshold, then re-anchor the consensus against the reference
//! neighborhood to read off refined breakpoint coordinates. Failure to
//! assemble is a degraded-result path, not an error: the component falls
//! back to its graph-estimated breakpoints.

use tracing::debug;

use crate::cluster::Component;
use crate::core::variant::AssemblyResult;
use crate::scoring::{AlignmentScorer, LocalAlignment};
use crate::source::ReferenceWindow;
use crate::utils::configuration::AssemblyConfig;

/// Unaligned consensus flank long enough to mark a junction.
const MIN_JUNCTION_CLIP: usize = 5;
/// Minimum aligned consensus length for a trustworthy re-anchoring.
const MIN_ANCHOR_LEN: usize = 20;

#[derive(Debug, Clone)]
struct Contig {
    sequence: String,
    support: usize,
    merge_identities: Vec<f64>,
}

pub struct ConsensusAssembler<'a> {
    config: AssemblyConfig,
    scorer: &'a dyn AlignmentScorer,
}

impl<'a> ConsensusAssembler<'a> {
    pub fn new(config: AssemblyConfig, scorer: &'a dyn AlignmentScorer) -> Self {
        Self { config, scorer }
    }

    /// Assemble a consensus for the component and refine its breakpoints.
    /// Returns None when the component cannot be assembled; the scorer is
    /// never consulted for components with fewer than two usable
    /// fragments.
    pub fn assemble(
        &self,
        component: &Component,
        reference: Option<&ReferenceWindow>,
    ) -> Option<AssemblyResult> {
        let fragments: Vec<String> = component
            .iter_events()
            .filter_map(|e| e.assembly_fragment(self.config.min_fragment_len))
            .map(str::to_string)
            .collect();
        if fragments.len() < 2 {
            debug!(
                component = component.id,
                fragments = fragments.len(),
                "skipping assembly: not enough fragments"
            );
            return None;
        }

        let consensus = self.greedy_merge(fragments)?;
        if consensus.support < 2 {
            return None;
        }

        let mean_identity = consensus.merge_identities.iter().sum::<f64>()
            / consensus.merge_identities.len() as f64;
        let support_term = 1.0 - 1.0 / (1.0 + consensus.support as f64);
        let assembly_quality = (mean_identity * support_term).clamp(0.0, 1.0);

        let refined = reference.and_then(|window| self.refine(&consensus.sequence, window));
        let (breakpoint_positions, insertion_sequence) = match refined {
            Some(r) => r,
            None => (component.anchor_span(), None),
        };

        Some(AssemblyResult {
            consensus_sequence: consensus.sequence,
            breakpoint_positions,
            insertion_sequence,
            contig_support_count: consensus.support,
            assembly_quality,
        })
    }

    /// Iteratively merge the best-overlapping pair until no merge clears
    /// the score threshold, then pick the best-supported contig.
    fn greedy_merge(&self, fragments: Vec<String>) -> Option<Contig> {
        let mut contigs: Vec<Contig> = fragments
            .into_iter()
            .map(|sequence| Contig {
                sequence,
                support: 1,
                merge_identities: Vec::new(),
            })
            .collect();

        while contigs.len() > 1 {
            let mut best: Option<(i32, usize, usize, LocalAlignment)> = None;
            for i in 0..contigs.len() {
                for j in 0..contigs.len() {
                    if i == j {
                        continue;
                    }
                    let alignment = self.scorer.local_align(
                        contigs[i].sequence.as_bytes(),
                        contigs[j].sequence.as_bytes(),
                    );
                    if alignment.score < self.config.min_overlap_score {
                        continue;
                    }
                    // Strict improvement only: loop order breaks ties at
                    // lowest (i, j), keeping merges deterministic.
                    if best.map_or(true, |(score, _, _, _)| alignment.score > score) {
                        best = Some((alignment.score, i, j, alignment));
                    }
                }
            }

            let (_, i, j, alignment) = match best {
                Some(found) => found,
                None => break,
            };
            let merged_sequence = splice(&contigs[i].sequence, &contigs[j].sequence, &alignment);
            let identity = alignment.identity();

            let (keep, drop) = if i < j { (i, j) } else { (j, i) };
            let dropped = contigs.remove(drop);
            let kept = &mut contigs[keep];
            kept.support += dropped.support;
            kept.merge_identities.extend(dropped.merge_identities);
            kept.merge_identities.push(identity);
            kept.sequence = merged_sequence;
        }

        // Several unmergeable contigs may remain; the one with the most
        // pooled support wins, longest then lexicographic on ties.
        contigs.into_iter().max_by(|a, b| {
            (a.support, a.sequence.len())
                .cmp(&(b.support, b.sequence.len()))
                .then_with(|| b.sequence.cmp(&a.sequence))
        })
    }

    /// Align the consensus back to the reference neighborhood and read the
    /// clip junctions off as breakpoints. None means the re-anchoring was
    /// not trustworthy and the graph estimate stands.
    fn refine(
        &self,
        consensus: &str,
        window: &ReferenceWindow,
    ) -> Option<((i64, i64), Option<String>)> {
        let alignment = self
            .scorer
            .local_align(consensus.as_bytes(), &window.sequence);
        if alignment.aligned_len() < MIN_ANCHOR_LEN.min(consensus.len()) {
            return None;
        }

        let leading = alignment.a_start;
        let trailing = consensus.len() - alignment.a_end;
        let left_junction = window.start + alignment.b_start as i64;
        let right_junction = window.start + alignment.b_end as i64;

        let breakpoints = if leading >= MIN_JUNCTION_CLIP && trailing >= MIN_JUNCTION_CLIP {
            (left_junction.min(right_junction), left_junction.max(right_junction))
        } else if trailing >= MIN_JUNCTION_CLIP {
            (right_junction, right_junction)
        } else if leading >= MIN_JUNCTION_CLIP {
            (left_junction, left_junction)
        } else {
            // Consensus aligned end to end: no junction to read.
            return None;
        };

        let prefix = &consensus[..alignment.a_start];
        let suffix = &consensus[alignment.a_end..];
        let novel = if prefix.len() >= suffix.len() { prefix } else { suffix };
        let insertion_sequence = if novel.len() >= MIN_JUNCTION_CLIP {
            Some(novel.to_string())
        } else {
            None
        };

        Some((breakpoints, insertion_sequence))
    }
}

/// Join two contigs across their best local overlap: everything of `a` up
/// to the end of its aligned region, then everything of `b` after its
/// aligned region.
fn splice(a: &str, b: &str, alignment: &LocalAlignment) -> String {
    let mut merged = String::with_capacity(alignment.a_end + b.len().saturating_sub(alignment.b_end));
    merged.push_str(&a[..alignment.a_end]);
    merged.push_str(&b[alignment.b_end..]);
    merged
}

//! Call construction and duplicate resolution.
//!
//! Two components can independently describe the same breakpoint from
//! opposite evidence directions; the emitter merges same-type calls whose
//! breakpoints fall within tolerance and whose supporting read sets
//! overlap, keeping the union of evidence and the better assembly. Final
//! output is strictly (chrom, pos, end)-sorted.

pub mod svtype;

use std::collections::BTreeSet;
use tracing::debug;

use crate::cluster::Component;
use crate::core::variant::{AssemblyResult, SupportMetrics, SvType, VariantCall};
use crate::utils::configuration::CallConfig;
pub use svtype::infer_sv_type;

pub struct CallEmitter {
    config: CallConfig,
}

impl CallEmitter {
    pub fn new(config: CallConfig) -> Self {
        Self { config }
    }

    /// Assemble a component's outputs into one variant call.
    pub fn build_call(
        &self,
        component: &Component,
        assembly: Option<AssemblyResult>,
        support_metrics: SupportMetrics,
    ) -> VariantCall {
        let sv_type = infer_sv_type(component, assembly.as_ref());
        let (graph_lo, graph_hi) = component.anchor_span();
        let (mut pos, mut end) = assembly
            .as_ref()
            .map(|a| a.breakpoint_positions)
            .unwrap_or((graph_lo, graph_hi));
        if end < pos {
            std::mem::swap(&mut pos, &mut end);
        }

        let (mate_chrom, mate_pos) = if sv_type == SvType::Translocation {
            partner_locus(component)
        } else {
            (None, None)
        };

        let sv_length = match sv_type {
            SvType::Insertion => assembly
                .as_ref()
                .and_then(|a| a.insertion_sequence.as_ref())
                .map(|s| s.len() as i64)
                .unwrap_or_else(|| insertion_length_estimate(component))
                .max(1),
            SvType::Translocation => 0,
            _ => (end - pos).max(1),
        };

        // Translocations report the local breakend; the partner locus is
        // carried separately.
        if sv_type == SvType::Translocation {
            end = pos + 1;
        } else if sv_type == SvType::Insertion {
            end = pos;
        }

        let supporting_read_names: BTreeSet<String> = component
            .supporting_reads()
            .into_iter()
            .map(str::to_string)
            .collect();

        VariantCall {
            chrom: component.chrom.clone(),
            pos,
            end,
            sv_type,
            sv_length,
            mate_chrom,
            mate_pos,
            support_metrics,
            assembly,
            supporting_read_names,
            raw_component_id: component.id,
            genotype: None,
            confidence: None,
        }
    }

    /// Resolve overlapping duplicates and emit in sorted order.
    pub fn emit(&self, mut calls: Vec<VariantCall>) -> Vec<VariantCall> {
        calls.sort_by(|a, b| {
            (a.chrom.as_str(), a.pos, a.end).cmp(&(b.chrom.as_str(), b.pos, b.end))
        });

        let tolerance = self.config.merge_tolerance;
        let mut merged: Vec<VariantCall> = Vec::with_capacity(calls.len());
        'next_call: for call in calls {
            // Only the sorted tail can still be within tolerance.
            for existing in merged.iter_mut().rev() {
                if existing.chrom != call.chrom || call.pos - existing.pos > tolerance {
                    break;
                }
                if existing.sv_type == call.sv_type
                    && (existing.end - call.end).abs() <= tolerance
                    && shares_reads(existing, &call)
                {
                    debug!(
                        chrom = %call.chrom,
                        pos = call.pos,
                        "merging duplicate call from opposite evidence direction"
                    );
                    merge_into(existing, call);
                    continue 'next_call;
                }
            }
            merged.push(call);
        }

        merged.sort_by(|a, b| {
            (a.chrom.as_str(), a.pos, a.end).cmp(&(b.chrom.as_str(), b.pos, b.end))
        });
        merged
    }
}

fn shares_reads(a: &VariantCall, b: &VariantCall) -> bool {
    let (small, large) = if a.supporting_read_names.len() <= b.supporting_read_names.len() {
        (&a.supporting_read_names, &b.supporting_read_names)
    } else {
        (&b.supporting_read_names, &a.supporting_read_names)
    };
    small.iter().any(|r| large.contains(r))
}

/// Union `other` into `base`: read sets union (support is never double
/// counted), per-kind counts take the element-wise maximum as the union
/// estimate, and the higher-quality assembly survives.
fn merge_into(base: &mut VariantCall, other: VariantCall) {
    for read in other.supporting_read_names {
        base.supporting_read_names.insert(read);
    }
    base.support_metrics.supporting_reads = base.supporting_read_names.len() as u32;

    let m = &mut base.support_metrics;
    let o = &other.support_metrics;
    m.n_deletion = m.n_deletion.max(o.n_deletion);
    m.n_insertion = m.n_insertion.max(o.n_insertion);
    m.n_discordant = m.n_discordant.max(o.n_discordant);
    m.n_split = m.n_split.max(o.n_split);
    m.n_soft_clip = m.n_soft_clip.max(o.n_soft_clip);
    m.n_duplication = m.n_duplication.max(o.n_duplication);
    m.mean_mapq = (m.mean_mapq + o.mean_mapq) / 2.0;
    m.min_mapq = m.min_mapq.min(o.min_mapq);
    m.mapq_stddev = m.mapq_stddev.max(o.mapq_stddev);
    m.strand_bias = (m.strand_bias + o.strand_bias) / 2.0;
    m.depth_ratio = if (m.depth_ratio - 1.0).abs() >= (o.depth_ratio - 1.0).abs() {
        m.depth_ratio
    } else {
        o.depth_ratio
    };

    let other_quality = other
        .assembly
        .as_ref()
        .map(|a| a.assembly_quality)
        .unwrap_or(f64::MIN);
    let base_quality = base
        .assembly
        .as_ref()
        .map(|a| a.assembly_quality)
        .unwrap_or(f64::MIN);
    if other_quality > base_quality {
        base.assembly = other.assembly;
        if let Some(a) = base.assembly.as_ref() {
            m.contig_length = a.consensus_sequence.len() as u32;
            m.contig_quality = a.assembly_quality;
        }
    }
}

/// Majority partner chromosome and its median coordinate, for
/// translocation calls.
fn partner_locus(component: &Component) -> (Option<String>, Option<i64>) {
    let mut partners: Vec<(&str, i64)> = component
        .iter_events()
        .filter(|e| e.is_interchromosomal())
        .filter_map(|e| match (&e.mate_chrom, e.mate_pos) {
            (Some(c), Some(p)) => Some((c.as_str(), p)),
            _ => None,
        })
        .collect();
    if partners.is_empty() {
        return (None, None);
    }

    partners.sort();
    let mut best: (&str, usize) = ("", 0);
    let mut i = 0;
    while i < partners.len() {
        let chrom = partners[i].0;
        let run = partners[i..].iter().take_while(|(c, _)| *c == chrom).count();
        if run > best.1 {
            best = (chrom, run);
        }
        i += run;
    }

    let positions: Vec<i64> = partners
        .iter()
        .filter(|(c, _)| *c == best.0)
        .map(|(_, p)| *p)
        .collect();
    let median = positions[positions.len() / 2];
    (Some(best.0.to_string()), Some(median))
}

/// Average clipped-insert length across the component's insertion events,
/// used when no assembly pinned down the inserted sequence.
fn insertion_length_estimate(component: &Component) -> i64 {
    let lens: Vec<usize> = component
        .iter_events()
        .filter_map(|e| e.clip_sequence.as_ref().map(String::len))
        .collect();
    if lens.is_empty() {
        return 1;
    }
    (lens.iter().sum::<usize>() / lens.len()) as i64
}

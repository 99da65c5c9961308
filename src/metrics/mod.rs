//! Per-component support statistics.
//!
//! The aggregator turns a component (plus its coverage context and any
//! assembly result) into the feature vector handed to the classifier. It
//! makes no accept/reject decision of its own; structural thresholds
//! belong to the partitioner.

pub mod coverage;

pub use coverage::CoverageTrack;

use ahash::AHashSet;

use crate::cluster::Component;
use crate::core::evidence::{EvidenceKind, Strand};
use crate::core::variant::{AssemblyResult, SupportMetrics};
use crate::utils::configuration::MetricsConfig;

pub struct MetricAggregator {
    config: MetricsConfig,
}

impl MetricAggregator {
    pub fn new(config: MetricsConfig) -> Self {
        Self { config }
    }

    pub fn aggregate(
        &self,
        component: &Component,
        coverage: &CoverageTrack,
        assembly: Option<&AssemblyResult>,
    ) -> SupportMetrics {
        let mut metrics = SupportMetrics {
            min_mapq: u8::MAX,
            ..Default::default()
        };

        let mut reads: AHashSet<&str> = AHashSet::new();
        let mut forward = 0u32;
        let mut mapq_sum = 0f64;
        let mut mapq_sq_sum = 0f64;
        let mut n = 0u32;

        for event in component.iter_events() {
            match event.kind {
                EvidenceKind::Deletion => metrics.n_deletion += 1,
                EvidenceKind::Insertion => metrics.n_insertion += 1,
                EvidenceKind::DiscordantPair => metrics.n_discordant += 1,
                EvidenceKind::SplitRead => metrics.n_split += 1,
                EvidenceKind::SoftClip => metrics.n_soft_clip += 1,
                EvidenceKind::DuplicationSignal => metrics.n_duplication += 1,
            }
            reads.insert(event.read_id.as_str());
            if event.strand == Strand::Forward {
                forward += 1;
            }
            let mapq = event.mapq as f64;
            mapq_sum += mapq;
            mapq_sq_sum += mapq * mapq;
            metrics.min_mapq = metrics.min_mapq.min(event.mapq);
            n += 1;
        }

        if n == 0 {
            metrics.min_mapq = 0;
            return metrics;
        }

        metrics.supporting_reads = reads.len() as u32;
        metrics.mean_mapq = mapq_sum / n as f64;
        let variance = (mapq_sq_sum / n as f64) - metrics.mean_mapq * metrics.mean_mapq;
        metrics.mapq_stddev = variance.max(0.0).sqrt();
        metrics.strand_bias = forward as f64 / n as f64;

        // Depth at both breakends, each normalized against its own
        // neighborhood; keep the more anomalous of the two.
        let (lo, hi) = component.anchor_span();
        let flank = self.config.background_flank;
        let ratio_lo = coverage.depth_ratio(lo, flank);
        let ratio_hi = coverage.depth_ratio(hi, flank);
        metrics.depth_ratio = if (ratio_lo - 1.0).abs() >= (ratio_hi - 1.0).abs() {
            ratio_lo
        } else {
            ratio_hi
        };

        if let Some(assembly) = assembly {
            metrics.contig_length = assembly.consensus_sequence.len() as u32;
            metrics.contig_quality = assembly.assembly_quality;
        }

        metrics
    }
}

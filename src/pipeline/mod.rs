//! Region-parallel calling pipeline.
//!
//! Work is partitioned by genomic region (one region per chromosome by
//! default). Within a region, graph construction is single-writer because
//! merge decisions depend on prior state; component assembly and metric
//! aggregation then fan out on the shared thread pool against a read-only
//! snapshot. Cross-region discordant evidence lands in a shared
//! append-only translocation index reconciled once after all regions
//! finish.

use anyhow::{Context, Result};
use parking_lot::Mutex;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{info, warn};

use crate::assembly::ConsensusAssembler;
use crate::call::CallEmitter;
use crate::classify::{HeuristicClassifier, VariantClassifier};
use crate::cluster::{ComponentPartitioner, PartitionStats};
use crate::core::evidence::{EvidenceEvent, Strand};
use crate::core::variant::{SupportMetrics, SvType, VariantCall};
use crate::extract::{EvidenceExtractor, ExtractCounters};
use crate::graph::EvidenceGraph;
use crate::metrics::{CoverageTrack, MetricAggregator};
use crate::scoring::{AlignmentScorer, PairwiseScorer};
use crate::source::{AlignmentSource, ReferenceSource};
use crate::utils::configuration::CallerConfig;

/// One unit of parallel work.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegionSpec {
    pub chrom: String,
    pub start: i64,
    pub end: i64,
}

impl fmt::Display for RegionSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}-{}", self.chrom, self.start, self.end)
    }
}

/// Whole-run tallies, summed over regions.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct RunStats {
    pub extract: ExtractCounters,
    pub partition: PartitionStats,
    pub regions_processed: usize,
    pub regions_aborted: usize,
    pub components_assembled: usize,
    pub translocation_evidence: usize,
    pub calls_emitted: usize,
}

#[derive(Debug)]
struct RegionOutcome {
    region: RegionSpec,
    calls: Vec<VariantCall>,
    extract: ExtractCounters,
    partition: PartitionStats,
    components_assembled: usize,
    aborted: bool,
}

/// Cross-region discordant-pair evidence awaiting reconciliation.
#[derive(Debug, Clone, PartialEq)]
struct TranslocationEvidence {
    chrom: String,
    pos: i64,
    mate_chrom: String,
    mate_pos: i64,
    read_id: String,
    mapq: u8,
    strand: Strand,
}

#[derive(Debug)]
pub struct RunOutput {
    pub calls: Vec<VariantCall>,
    pub stats: RunStats,
    pub aborted_regions: Vec<String>,
}

pub struct SvCallerPipeline {
    config: CallerConfig,
    scorer: Box<dyn AlignmentScorer>,
    classifier: Box<dyn VariantClassifier>,
}

impl SvCallerPipeline {
    pub fn new(config: CallerConfig) -> Self {
        Self {
            config,
            scorer: Box::new(PairwiseScorer::default()),
            classifier: Box::new(HeuristicClassifier::default()),
        }
    }

    pub fn with_scorer(mut self, scorer: Box<dyn AlignmentScorer>) -> Self {
        self.scorer = scorer;
        self
    }

    pub fn with_classifier(mut self, classifier: Box<dyn VariantClassifier>) -> Self {
        self.classifier = classifier;
        self
    }

    /// One region per chromosome reported by the source.
    pub fn default_regions<S: AlignmentSource>(source: &S) -> Vec<RegionSpec> {
        source
            .chromosomes()
            .into_iter()
            .map(|(chrom, extent)| RegionSpec {
                chrom,
                start: 0,
                end: extent + 1,
            })
            .collect()
    }

    /// Run the full pipeline over `regions`. Source failure is fatal;
    /// per-region resource exhaustion aborts only that region.
    pub fn run<S: AlignmentSource, R: ReferenceSource>(
        &self,
        source: &S,
        reference: &R,
        regions: &[RegionSpec],
    ) -> Result<RunOutput> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.config.worker_threads())
            .thread_name(|i| format!("sv-region-{i}"))
            .build()
            .context("building region worker pool")?;

        let translocation_index: Mutex<Vec<TranslocationEvidence>> = Mutex::new(Vec::new());

        let outcomes: Result<Vec<RegionOutcome>> = pool.install(|| {
            regions
                .par_iter()
                .map(|region| self.process_region(source, reference, region, &translocation_index))
                .collect()
        });
        let outcomes = outcomes?;

        let mut stats = RunStats::default();
        let mut aborted_regions = Vec::new();
        let mut calls = Vec::new();
        for outcome in outcomes {
            stats.extract.absorb(&outcome.extract);
            stats.partition.accepted += outcome.partition.accepted;
            stats.partition.rejected_low_support += outcome.partition.rejected_low_support;
            stats.partition.rejected_weak_edges += outcome.partition.rejected_weak_edges;
            stats.components_assembled += outcome.components_assembled;
            stats.regions_processed += 1;
            if outcome.aborted {
                stats.regions_aborted += 1;
                aborted_regions.push(outcome.region.to_string());
            }
            calls.extend(outcome.calls);
        }

        let translocation_evidence = translocation_index.into_inner();
        stats.translocation_evidence = translocation_evidence.len();
        calls.extend(self.reconcile_translocations(translocation_evidence));

        let emitter = CallEmitter::new(self.config.call.clone());
        let mut calls = emitter.emit(calls);
        for call in &mut calls {
            let (genotype, confidence) = self
                .classifier
                .classify(&call.support_metrics.feature_vector());
            call.genotype = Some(genotype);
            call.confidence = Some(confidence);
        }
        stats.calls_emitted = calls.len();

        info!(
            calls = stats.calls_emitted,
            regions = stats.regions_processed,
            aborted = stats.regions_aborted,
            "run complete"
        );
        Ok(RunOutput {
            calls,
            stats,
            aborted_regions,
        })
    }

    fn process_region<S: AlignmentSource, R: ReferenceSource>(
        &self,
        source: &S,
        reference: &R,
        region: &RegionSpec,
        translocation_index: &Mutex<Vec<TranslocationEvidence>>,
    ) -> Result<RegionOutcome> {
        let records = source
            .fetch(&region.chrom, region.start, region.end)
            .with_context(|| format!("fetching alignments for {region}"))?;

        let extractor = EvidenceExtractor::new(self.config.extract.clone());
        let mut counters = ExtractCounters::default();
        let mut coverage = CoverageTrack::new(
            &region.chrom,
            region.start,
            region.end,
            self.config.metrics.bin_size,
        );
        let mut graph = EvidenceGraph::new(self.config.graph.clone());
        let mut crossers: Vec<TranslocationEvidence> = Vec::new();
        let mut aborted = false;

        for record in records {
            if !record.is_secondary() && !record.is_duplicate() && record.is_well_formed() {
                coverage.add_alignment(record.pos, record.reference_end());
            }
            for event in extractor.extract(&record, &mut counters) {
                if event.is_interchromosomal() {
                    crossers.push(cross_region_evidence(&event));
                } else {
                    graph.insert(event);
                }
            }
            if graph.event_count() + crossers.len() > self.config.pipeline.max_events_per_region {
                warn!(%region, cap = self.config.pipeline.max_events_per_region,
                    "event cap exceeded, abandoning region");
                aborted = true;
                break;
            }
        }

        // The crossers are appended even on abort so the partner region's
        // evidence is not silently lost.
        if !crossers.is_empty() {
            translocation_index.lock().extend(crossers);
        }

        if aborted {
            return Ok(RegionOutcome {
                region: region.clone(),
                calls: Vec::new(),
                extract: counters,
                partition: PartitionStats::default(),
                components_assembled: 0,
                aborted: true,
            });
        }

        graph.consolidate(self.config.graph.consolidate_tolerance);
        let snapshot = graph.finalize();

        let partitioner = ComponentPartitioner::new(self.config.cluster.clone());
        let (components, partition) = partitioner.partition(&snapshot);

        // Components are independent: fan out on the shared pool against
        // the read-only snapshot and coverage track.
        let assembler = ConsensusAssembler::new(self.config.assembly.clone(), self.scorer.as_ref());
        let aggregator = MetricAggregator::new(self.config.metrics.clone());
        let emitter = CallEmitter::new(self.config.call.clone());
        let flank = self.config.assembly.reference_flank;

        let calls: Vec<VariantCall> = components
            .par_iter()
            .map(|component| {
                let (lo, hi) = component.anchor_span();
                let window = reference.window(&component.chrom, lo - flank, hi + flank);
                let assembly = assembler.assemble(component, window.as_ref());
                let metrics = aggregator.aggregate(component, &coverage, assembly.as_ref());
                emitter.build_call(component, assembly, metrics)
            })
            .collect();
        let components_assembled = calls.iter().filter(|c| c.assembly.is_some()).count();

        Ok(RegionOutcome {
            region: region.clone(),
            calls,
            extract: counters,
            partition,
            components_assembled,
            aborted: false,
        })
    }

    /// Pair up cross-region discordant evidence into translocation calls.
    /// Runs once, on the main thread, after every region worker has
    /// finished; sorting first makes the outcome independent of worker
    /// scheduling.
    fn reconcile_translocations(
        &self,
        mut evidence: Vec<TranslocationEvidence>,
    ) -> Vec<VariantCall> {
        // Canonical orientation: the lexicographically smaller chromosome
        // holds the primary breakend.
        for e in &mut evidence {
            if e.mate_chrom < e.chrom {
                std::mem::swap(&mut e.chrom, &mut e.mate_chrom);
                std::mem::swap(&mut e.pos, &mut e.mate_pos);
            }
        }
        evidence.sort_by(|a, b| {
            (&a.chrom, &a.mate_chrom, a.pos, a.mate_pos, &a.read_id)
                .cmp(&(&b.chrom, &b.mate_chrom, b.pos, b.mate_pos, &b.read_id))
        });

        let tolerance = self.config.call.merge_tolerance.max(500);
        let mut calls = Vec::new();
        let mut cluster: Vec<&TranslocationEvidence> = Vec::new();

        let mut flush = |cluster: &mut Vec<&TranslocationEvidence>, calls: &mut Vec<VariantCall>| {
            if cluster.is_empty() {
                return;
            }
            let reads: std::collections::BTreeSet<String> =
                cluster.iter().map(|e| e.read_id.clone()).collect();
            if reads.len() >= self.config.call.min_translocation_support {
                calls.push(translocation_call(cluster, reads));
            }
            cluster.clear();
        };

        for e in &evidence {
            let breaks_cluster = match cluster.last() {
                Some(last) => {
                    last.chrom != e.chrom
                        || last.mate_chrom != e.mate_chrom
                        || e.pos - last.pos > tolerance
                        || (e.mate_pos - last.mate_pos).abs() > tolerance
                }
                None => false,
            };
            if breaks_cluster {
                flush(&mut cluster, &mut calls);
            }
            cluster.push(e);
        }
        flush(&mut cluster, &mut calls);
        calls
    }
}

fn cross_region_evidence(event: &EvidenceEvent) -> TranslocationEvidence {
    TranslocationEvidence {
        chrom: event.chrom.clone(),
        pos: event.pos,
        mate_chrom: event.mate_chrom.clone().unwrap_or_default(),
        mate_pos: event.mate_pos.unwrap_or(event.pos),
        read_id: event.read_id.clone(),
        mapq: event.mapq,
        strand: event.strand,
    }
}

fn translocation_call(
    cluster: &[&TranslocationEvidence],
    reads: std::collections::BTreeSet<String>,
) -> VariantCall {
    let positions: Vec<i64> = cluster.iter().map(|e| e.pos).collect();
    let mate_positions: Vec<i64> = {
        let mut v: Vec<i64> = cluster.iter().map(|e| e.mate_pos).collect();
        v.sort_unstable();
        v
    };
    let pos = positions[positions.len() / 2];
    let mate_pos = mate_positions[mate_positions.len() / 2];

    let n = cluster.len() as u32;
    let mapq_sum: f64 = cluster.iter().map(|e| e.mapq as f64).sum();
    let mean_mapq = mapq_sum / n as f64;
    let variance = cluster
        .iter()
        .map(|e| (e.mapq as f64 - mean_mapq).powi(2))
        .sum::<f64>()
        / n as f64;
    let forward = cluster
        .iter()
        .filter(|e| e.strand == Strand::Forward)
        .count() as f64;

    let metrics = SupportMetrics {
        n_discordant: n,
        supporting_reads: reads.len() as u32,
        mean_mapq,
        min_mapq: cluster.iter().map(|e| e.mapq).min().unwrap_or(0),
        mapq_stddev: variance.sqrt(),
        strand_bias: forward / n as f64,
        depth_ratio: 1.0,
        ..Default::default()
    };

    VariantCall {
        chrom: cluster[0].chrom.clone(),
        pos,
        end: pos + 1,
        sv_type: SvType::Translocation,
        sv_length: 0,
        mate_chrom: Some(cluster[0].mate_chrom.clone()),
        mate_pos: Some(mate_pos),
        support_metrics: metrics,
        assembly: None,
        supporting_read_names: reads,
        raw_component_id: usize::MAX,
        genotype: None,
        confidence: None,
    }
}

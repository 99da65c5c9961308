//! Classifier collaborator boundary.
//!
//! The production genotype model is external; the core hands it a feature
//! vector and takes back a label with a confidence score. The bundled
//! default is a transparent heuristic so the pipeline is usable without
//! the model attached.

use serde::{Deserialize, Serialize};

use crate::core::variant::Genotype;

/// Opaque `feature_vector -> (label, score)` contract.
pub trait VariantClassifier: Send + Sync {
    fn classify(&self, features: &[f64]) -> (Genotype, f64);
}

/// Feature indices the heuristic inspects. Must track
/// `SupportMetrics::feature_vector` order.
const IDX_SUPPORTING_READS: usize = 6;
const IDX_MEAN_MAPQ: usize = 7;
const IDX_DEPTH_RATIO: usize = 11;
const IDX_CONTIG_QUALITY: usize = 13;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HeuristicClassifierConfig {
    /// Depth ratio at the breakpoint below which a deletion looks
    /// homozygous.
    pub hom_depth_ratio: f64,
    /// Supporting reads for full confidence.
    pub saturating_support: f64,
}

impl Default for HeuristicClassifierConfig {
    fn default() -> Self {
        Self {
            hom_depth_ratio: 0.25,
            saturating_support: 10.0,
        }
    }
}

/// Support/depth-threshold classifier standing in for the external model.
#[derive(Debug, Clone, Default)]
pub struct HeuristicClassifier {
    config: HeuristicClassifierConfig,
}

impl HeuristicClassifier {
    pub fn new(config: HeuristicClassifierConfig) -> Self {
        Self { config }
    }
}

impl VariantClassifier for HeuristicClassifier {
    fn classify(&self, features: &[f64]) -> (Genotype, f64) {
        let get = |i: usize| features.get(i).copied().unwrap_or(0.0);
        let support = get(IDX_SUPPORTING_READS);
        let mean_mapq = get(IDX_MEAN_MAPQ);
        let depth_ratio = get(IDX_DEPTH_RATIO);
        let contig_quality = get(IDX_CONTIG_QUALITY);

        let genotype = if depth_ratio > 0.0 && depth_ratio <= self.config.hom_depth_ratio {
            Genotype::Homozygous
        } else {
            Genotype::Heterozygous
        };

        let support_term = (support / self.config.saturating_support).min(1.0);
        let mapq_term = (mean_mapq / 60.0).min(1.0);
        let assembly_term = 0.5 + contig_quality / 2.0;
        let confidence = (support_term * mapq_term * assembly_term).clamp(0.0, 1.0);

        (genotype, confidence)
    }
}

//! # sv-forge - Structural Variant Evidence Engine
//!
//! Detects structural variants (deletions, insertions, inversions,
//! duplications, translocations) from aligned sequencing reads by building
//! a streaming evidence graph, partitioning it into candidate variant
//! sites, locally reassembling breakpoint sequence, and scoring each site
//! with support metrics for a downstream classifier.

pub mod assembly;
pub mod call;
pub mod classify;
pub mod cluster;
pub mod core;
pub mod extract;
pub mod graph;
pub mod metrics;
pub mod pipeline;
pub mod scoring;
pub mod source;
pub mod utils;

// Re-export commonly used types at crate level
pub use crate::core::{
    AlignmentRecord, AssemblyResult, EvidenceEvent, EvidenceKind, Genotype, SupportMetrics,
    SvType, VariantCall,
};
pub use crate::pipeline::{RegionSpec, RunOutput, SvCallerPipeline};
pub use crate::utils::configuration::CallerConfig;

/// Result type used throughout the crate
pub type Result<T> = anyhow::Result<T>;

/// Error type used throughout the crate
pub type Error = anyhow::Error;

use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{info, warn};

/// Configuration for the whole caller, one section per pipeline stage.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct CallerConfig {
    pub extract: ExtractConfig,
    pub graph: GraphConfig,
    pub cluster: ClusterConfig,
    pub assembly: AssemblyConfig,
    pub metrics: MetricsConfig,
    pub call: CallConfig,
    pub pipeline: PipelineConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractConfig {
    /// Records below this mapping quality emit no events.
    pub min_mapq: u8,
    /// Minimum CIGAR deletion/insertion length to count as evidence.
    pub min_indel_len: u32,
    /// Minimum soft-clip length to count as evidence.
    pub min_clip_len: u32,
    /// Insert-size model used to flag discordant pairs.
    pub insert_size: InsertSizeModel,
}

impl Default for ExtractConfig {
    fn default() -> Self {
        Self {
            min_mapq: 10,
            min_indel_len: 30,
            min_clip_len: 15,
            insert_size: InsertSizeModel::default(),
        }
    }
}

/// Expected paired-end fragment geometry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InsertSizeModel {
    pub median: i64,
    pub stddev: i64,
    /// Pairs separated by more than this are discordant.
    pub max_normal: i64,
}

impl Default for InsertSizeModel {
    fn default() -> Self {
        Self {
            median: 400,
            stddev: 100,
            max_normal: 800,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphConfig {
    /// Scale factor applied to each evidence kind's base tolerance.
    pub tolerance_scale: f64,
    /// Post-stream consolidation distance for imprecise (pair) anchors.
    pub consolidate_tolerance: i64,
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            tolerance_scale: 1.0,
            consolidate_tolerance: 150,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClusterConfig {
    /// Components with fewer supporting events are rejected.
    pub min_support: usize,
    /// Components whose edges all weigh less than this are rejected.
    pub min_edge_weight: u32,
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            min_support: 3,
            min_edge_weight: 2,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssemblyConfig {
    /// Minimum local-alignment score for a greedy merge.
    pub min_overlap_score: i32,
    /// Fragments shorter than this never enter assembly.
    pub min_fragment_len: usize,
    /// Reference bases fetched on each side of the graph-estimated
    /// breakpoint for consensus re-anchoring.
    pub reference_flank: i64,
}

impl Default for AssemblyConfig {
    fn default() -> Self {
        Self {
            min_overlap_score: 20,
            min_fragment_len: 12,
            reference_flank: 500,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsConfig {
    /// Coverage bin width in bases.
    pub bin_size: usize,
    /// Flanking window for the background depth estimate.
    pub background_flank: i64,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            bin_size: 10,
            background_flank: 10_000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallConfig {
    /// Same-type calls with breakpoints within this distance and shared
    /// supporting reads merge into one.
    pub merge_tolerance: i64,
    /// Minimum read pairs supporting a translocation partner cluster.
    pub min_translocation_support: usize,
}

impl Default for CallConfig {
    fn default() -> Self {
        Self {
            merge_tolerance: 150,
            min_translocation_support: 3,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Worker threads for region-level parallelism. Zero means one per
    /// logical CPU.
    pub threads: usize,
    /// A region whose event count exceeds this cap is abandoned; other
    /// regions continue.
    pub max_events_per_region: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            threads: 0,
            max_events_per_region: 2_000_000,
        }
    }
}

/// Typed validation errors for configuration loading.
#[derive(Error, Debug)]
pub enum CallerConfigError {
    #[error("configuration error: {0}")]
    Load(#[from] ConfigError),

    #[error("validation error: {field} is invalid: {reason}")]
    Validation { field: String, reason: String },
}

impl CallerConfig {
    /// Load configuration: built-in defaults, optionally overridden by a
    /// file, always overridable through `SV_FORGE__`-prefixed environment
    /// variables.
    pub fn load(config_path: Option<&Path>) -> Result<Self, CallerConfigError> {
        let mut builder = Config::builder();

        if let Some(path) = config_path {
            builder = builder.add_source(File::from(path.to_path_buf()));
        }
        builder = builder.add_source(Environment::with_prefix("SV_FORGE").separator("__"));

        let config: CallerConfig = match builder.build() {
            Ok(built) => match built.try_deserialize() {
                Ok(config) => config,
                Err(e) if config_path.is_none() => {
                    warn!("failed to deserialize configuration: {e}, using built-in defaults");
                    CallerConfig::default()
                }
                Err(e) => return Err(e.into()),
            },
            Err(e) if config_path.is_none() => {
                warn!("failed to build configuration: {e}, using built-in defaults");
                CallerConfig::default()
            }
            Err(e) => return Err(e.into()),
        };

        config.validate()?;
        info!("configuration loaded");
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), CallerConfigError> {
        if self.extract.min_clip_len == 0 {
            return Err(CallerConfigError::Validation {
                field: "extract.min_clip_len".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }
        if self.extract.insert_size.max_normal <= self.extract.insert_size.median {
            return Err(CallerConfigError::Validation {
                field: "extract.insert_size.max_normal".to_string(),
                reason: "must exceed the insert-size median".to_string(),
            });
        }
        if self.graph.tolerance_scale <= 0.0 {
            return Err(CallerConfigError::Validation {
                field: "graph.tolerance_scale".to_string(),
                reason: "must be positive".to_string(),
            });
        }
        if self.cluster.min_support == 0 {
            return Err(CallerConfigError::Validation {
                field: "cluster.min_support".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }
        if self.assembly.min_fragment_len < 4 {
            return Err(CallerConfigError::Validation {
                field: "assembly.min_fragment_len".to_string(),
                reason: "must be at least 4".to_string(),
            });
        }
        if self.metrics.bin_size == 0 {
            return Err(CallerConfigError::Validation {
                field: "metrics.bin_size".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }
        if self.call.merge_tolerance < 0 {
            return Err(CallerConfigError::Validation {
                field: "call.merge_tolerance".to_string(),
                reason: "must be non-negative".to_string(),
            });
        }
        if self.pipeline.max_events_per_region == 0 {
            return Err(CallerConfigError::Validation {
                field: "pipeline.max_events_per_region".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }
        Ok(())
    }

    /// Worker-thread count with the zero-means-autodetect rule applied.
    pub fn worker_threads(&self) -> usize {
        if self.pipeline.threads == 0 {
            num_cpus::get()
        } else {
            self.pipeline.threads
        }
    }

    pub fn write_template<P: AsRef<Path>>(&self, path: P) -> anyhow::Result<PathBuf> {
        let path = path.as_ref().to_path_buf();
        let body = serde_json::to_string_pretty(self)?;
        std::fs::write(&path, body)?;
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_validate() {
        CallerConfig::default().validate().unwrap();
    }

    #[test]
    fn rejects_zero_min_support() {
        let mut config = CallerConfig::default();
        config.cluster.min_support = 0;
        assert!(matches!(
            config.validate(),
            Err(CallerConfigError::Validation { .. })
        ));
    }

    #[test]
    fn rejects_inverted_insert_size_model() {
        let mut config = CallerConfig::default();
        config.extract.insert_size.max_normal = 100;
        assert!(config.validate().is_err());
    }

    #[test]
    fn load_without_file_uses_defaults() {
        let config = CallerConfig::load(None).unwrap();
        assert_eq!(config.cluster.min_support, 3);
        assert_eq!(config.extract.min_mapq, 10);
    }
}

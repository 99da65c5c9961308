pub mod alignment;
pub mod evidence;
pub mod variant;

// Re-export the types that flow between pipeline stages.
pub use alignment::{parse_cigar, AlignmentRecord, CigarOp};
pub use evidence::{EvidenceEvent, EvidenceKind, Strand};
pub use variant::{AssemblyResult, Genotype, SupportMetrics, SvType, VariantCall};

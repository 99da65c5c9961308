//! Insert-size model estimation from observed pair separations.
//!
//! Discordance calling needs the expected fragment geometry. When the
//! caller does not supply one, the model is bootstrapped from a sample of
//! mapped pairs: outliers beyond an IQR band are trimmed first so the
//! estimate is not dragged by the very structural variants being hunted.

use tracing::{debug, info};

use crate::core::alignment::AlignmentRecord;
use crate::utils::configuration::InsertSizeModel;

/// Pairs needed before an estimate is trusted.
const MIN_SAMPLES: usize = 50;
/// IQR multiplier for outlier trimming.
const OUTLIER_BOUND: f64 = 2.0;
/// Standard deviations above the median that still count as a normal pair.
const MAX_STDDEV: f64 = 4.0;

/// Estimate an [`InsertSizeModel`] from up to `max_samples` same-chromosome
/// pairs. Returns None when too few usable pairs are seen; callers keep
/// their configured model in that case.
pub fn estimate_insert_size(
    records: impl Iterator<Item = AlignmentRecord>,
    max_samples: usize,
) -> Option<InsertSizeModel> {
    let mut spans: Vec<i64> = Vec::new();
    for record in records {
        if spans.len() >= max_samples {
            break;
        }
        if !record.is_paired()
            || record.mate_unmapped()
            || record.is_secondary()
            || record.is_duplicate()
            || record.is_supplementary()
        {
            continue;
        }
        let (mate_chrom, mate_pos) = match (&record.mate_chrom, record.mate_pos) {
            (Some(c), Some(p)) => (c, p),
            _ => continue,
        };
        // Lower-coordinate end only, so each pair is sampled once.
        if *mate_chrom != record.chrom || mate_pos <= record.pos {
            continue;
        }
        spans.push(mate_pos - record.pos);
    }

    if spans.len() < MIN_SAMPLES {
        debug!(
            sampled = spans.len(),
            needed = MIN_SAMPLES,
            "not enough pairs to estimate insert size"
        );
        return None;
    }

    spans.sort_unstable();
    let q1 = spans[spans.len() / 4] as f64;
    let q3 = spans[(spans.len() * 3) / 4] as f64;
    let iqr = q3 - q1;
    let lo = q1 - OUTLIER_BOUND * iqr;
    let hi = q3 + OUTLIER_BOUND * iqr;

    let trimmed: Vec<i64> = spans
        .iter()
        .copied()
        .filter(|&s| (s as f64) >= lo && (s as f64) <= hi)
        .collect();
    if trimmed.len() < MIN_SAMPLES {
        return None;
    }

    let median = trimmed[trimmed.len() / 2];
    let mean = trimmed.iter().sum::<i64>() as f64 / trimmed.len() as f64;
    let variance = trimmed
        .iter()
        .map(|&s| (s as f64 - mean).powi(2))
        .sum::<f64>()
        / trimmed.len() as f64;
    let stddev = variance.sqrt().max(1.0);
    let max_normal = median + (MAX_STDDEV * stddev).ceil() as i64;

    let model = InsertSizeModel {
        median,
        stddev: stddev.round() as i64,
        max_normal,
    };
    info!(
        sampled = spans.len(),
        trimmed = trimmed.len(),
        median = model.median,
        stddev = model.stddev,
        max_normal = model.max_normal,
        "estimated insert-size model"
    );
    Some(model)
}

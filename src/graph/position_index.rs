//! Ordered spatial index over anchor positions.
//!
//! The graph's merge-on-insert path needs nearest-anchor lookups that stay
//! cheap when a chromosome's event density varies by orders of magnitude,
//! so the index is an ordered map per chromosome rather than a linear scan.

use ahash::AHashMap;
use std::collections::BTreeMap;

use super::NodeId;

/// Nearest-anchor lookup interface used by the evidence graph.
pub trait PositionIndex {
    /// Closest indexed node within `tolerance` of `pos`, or None. Ties on
    /// distance resolve to the lowest node id so merge decisions are
    /// reproducible for any insertion order.
    fn nearest(&self, chrom: &str, pos: i64, tolerance: i64) -> Option<NodeId>;

    fn insert(&mut self, chrom: &str, pos: i64, id: NodeId);

    fn remove(&mut self, chrom: &str, pos: i64, id: NodeId);

    /// Move one node's entry after its position estimate shifted.
    fn relocate(&mut self, chrom: &str, old_pos: i64, new_pos: i64, id: NodeId) {
        self.remove(chrom, old_pos, id);
        self.insert(chrom, new_pos, id);
    }
}

/// `BTreeMap`-backed implementation: one ordered position map per
/// chromosome, multiple nodes allowed at the same coordinate.
#[derive(Debug, Default)]
pub struct BTreePositionIndex {
    by_chrom: AHashMap<String, BTreeMap<i64, Vec<NodeId>>>,
}

impl BTreePositionIndex {
    pub fn new() -> Self {
        Self::default()
    }
}

impl PositionIndex for BTreePositionIndex {
    fn nearest(&self, chrom: &str, pos: i64, tolerance: i64) -> Option<NodeId> {
        let positions = self.by_chrom.get(chrom)?;
        let lo = pos.saturating_sub(tolerance);
        let hi = pos.saturating_add(tolerance);

        let mut best: Option<(i64, NodeId)> = None;
        for (&indexed_pos, ids) in positions.range(lo..=hi) {
            let distance = (indexed_pos - pos).abs();
            let candidate = match ids.iter().copied().min() {
                Some(id) => id,
                None => continue,
            };
            best = match best {
                None => Some((distance, candidate)),
                Some((best_distance, best_id)) => {
                    if distance < best_distance
                        || (distance == best_distance && candidate < best_id)
                    {
                        Some((distance, candidate))
                    } else {
                        Some((best_distance, best_id))
                    }
                }
            };
        }
        best.map(|(_, id)| id)
    }

    fn insert(&mut self, chrom: &str, pos: i64, id: NodeId) {
        self.by_chrom
            .entry(chrom.to_string())
            .or_default()
            .entry(pos)
            .or_default()
            .push(id);
    }

    fn remove(&mut self, chrom: &str, pos: i64, id: NodeId) {
        if let Some(positions) = self.by_chrom.get_mut(chrom) {
            if let Some(ids) = positions.get_mut(&pos) {
                ids.retain(|&other| other != id);
                if ids.is_empty() {
                    positions.remove(&pos);
                }
            }
        }
    }
}

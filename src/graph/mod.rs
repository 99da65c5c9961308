//! Streaming evidence graph.
//!
//! Nodes are clustered anchor positions; edges record that two anchors are
//! evidentially connected. Insertion merges each incoming event into the
//! nearest existing anchor within a kind-specific tolerance, or creates a
//! new anchor. Nodes are never deleted, only merged; merged nodes leave a
//! forwarding id behind so edges stay resolvable.

pub mod position_index;

use ahash::AHashMap;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::core::evidence::{EvidenceEvent, EvidenceKind};
use crate::utils::configuration::GraphConfig;
use position_index::{BTreePositionIndex, PositionIndex};

pub type NodeId = u32;

/// Why two anchors are connected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EdgeKind {
    /// The two ends of a discordant or everted read pair.
    MatePair,
    /// Both breakends of one CIGAR-derived indel.
    IntraAlignment,
    /// Two anchors touched by the same read or read pair (split reads,
    /// clipped mates).
    ReadLink,
}

/// A clustered anchor position. Mutated by merge operations only.
#[derive(Debug, Clone)]
struct AnchorNode {
    id: NodeId,
    chrom: String,
    pos_estimate: i64,
    weighted_pos_sum: f64,
    weight_sum: f64,
    event_indices: Vec<usize>,
    merged_into: Option<NodeId>,
}

/// Immutable per-node view handed to the partitioner.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotNode {
    pub id: NodeId,
    pub chrom: String,
    pub pos_estimate: i64,
    pub event_indices: Vec<usize>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotEdge {
    pub a: NodeId,
    pub b: NodeId,
    pub kind: EdgeKind,
    pub weight: u32,
}

/// Read-only view of the graph (or a genomic slice of it), shared across
/// component workers.
#[derive(Debug, Clone)]
pub struct GraphSnapshot {
    pub events: Arc<Vec<EvidenceEvent>>,
    /// Sorted by node id ascending.
    pub nodes: Vec<SnapshotNode>,
    /// Sorted by (a, b, kind) ascending.
    pub edges: Vec<SnapshotEdge>,
}

pub struct EvidenceGraph {
    config: GraphConfig,
    events: Vec<EvidenceEvent>,
    nodes: Vec<AnchorNode>,
    edges: AHashMap<(NodeId, NodeId, EdgeKind), u32>,
    index: BTreePositionIndex,
    /// Nodes already touched by each read, for same-read edge upserts.
    read_nodes: AHashMap<String, Vec<NodeId>>,
}

/// How strongly an event's coordinate pins down the true breakpoint.
/// CIGAR-derived positions are exact; pair positions are fuzzy.
fn precision_weight(kind: EvidenceKind) -> f64 {
    match kind {
        EvidenceKind::Deletion | EvidenceKind::Insertion => 4.0,
        EvidenceKind::SoftClip | EvidenceKind::SplitRead => 2.0,
        EvidenceKind::DiscordantPair | EvidenceKind::DuplicationSignal => 1.0,
    }
}

impl EvidenceGraph {
    pub fn new(config: GraphConfig) -> Self {
        Self {
            config,
            events: Vec::new(),
            nodes: Vec::new(),
            edges: AHashMap::new(),
            index: BTreePositionIndex::new(),
            read_nodes: AHashMap::new(),
        }
    }

    pub fn node_count(&self) -> usize {
        self.nodes.iter().filter(|n| n.merged_into.is_none()).count()
    }

    pub fn event_count(&self) -> usize {
        self.events.len()
    }

    fn tolerance_for(&self, kind: EvidenceKind) -> i64 {
        (kind.cluster_tolerance() as f64 * self.config.tolerance_scale).round() as i64
    }

    /// Insert one event: merge into the nearest anchor within tolerance or
    /// create a new anchor, then upsert the edges the event implies.
    /// Returns the primary anchor id.
    pub fn insert(&mut self, event: EvidenceEvent) -> NodeId {
        let tolerance = self.tolerance_for(event.kind);
        let event_idx = self.events.len();

        let primary = self.anchor_for(&event.chrom, event.pos, event.kind, tolerance, event_idx);

        if let Some(mate_pos) = event.local_mate_anchor() {
            let chrom = event.chrom.clone();
            let secondary = self.anchor_for(&chrom, mate_pos, event.kind, tolerance, event_idx);
            let primary = self.resolve(primary);
            let secondary = self.resolve(secondary);
            if primary != secondary {
                let edge_kind = match event.kind {
                    EvidenceKind::Deletion | EvidenceKind::Insertion => EdgeKind::IntraAlignment,
                    EvidenceKind::DiscordantPair | EvidenceKind::DuplicationSignal => {
                        EdgeKind::MatePair
                    }
                    EvidenceKind::SplitRead | EvidenceKind::SoftClip => EdgeKind::ReadLink,
                };
                self.edge_upsert(primary, secondary, edge_kind);
            }
        }

        self.link_read(&event.read_id, primary);
        self.events.push(event);
        self.resolve(primary)
    }

    /// Connect this anchor to every other anchor the same read (or read
    /// pair) has already touched.
    fn link_read(&mut self, read_id: &str, node: NodeId) {
        let node = self.resolve(node);
        let prior: Vec<NodeId> = self
            .read_nodes
            .get(read_id)
            .map(|ids| ids.iter().map(|&n| self.resolve(n)).collect())
            .unwrap_or_default();
        for other in prior {
            if other != node {
                self.edge_upsert(other, node, EdgeKind::ReadLink);
            }
        }
        let entry = self.read_nodes.entry(read_id.to_string()).or_default();
        if !entry.contains(&node) && entry.len() < 8 {
            entry.push(node);
        }
    }

    /// Locate-or-create the anchor for one coordinate.
    fn anchor_for(
        &mut self,
        chrom: &str,
        pos: i64,
        kind: EvidenceKind,
        tolerance: i64,
        event_idx: usize,
    ) -> NodeId {
        match self.index.nearest(chrom, pos, tolerance) {
            Some(id) => {
                let id = self.resolve(id);
                self.absorb_position(id, pos, kind, event_idx);
                id
            }
            None => {
                let id = self.nodes.len() as NodeId;
                let weight = precision_weight(kind);
                self.nodes.push(AnchorNode {
                    id,
                    chrom: chrom.to_string(),
                    pos_estimate: pos,
                    weighted_pos_sum: pos as f64 * weight,
                    weight_sum: weight,
                    event_indices: vec![event_idx],
                    merged_into: None,
                });
                self.index.insert(chrom, pos, id);
                id
            }
        }
    }

    /// Fold one more observed position into a node's weighted-mean
    /// estimate, relocating its index entry when the estimate moves.
    fn absorb_position(&mut self, id: NodeId, pos: i64, kind: EvidenceKind, event_idx: usize) {
        let weight = precision_weight(kind);
        let node = &mut self.nodes[id as usize];
        node.event_indices.push(event_idx);
        node.weighted_pos_sum += pos as f64 * weight;
        node.weight_sum += weight;
        let old_estimate = node.pos_estimate;
        let new_estimate = (node.weighted_pos_sum / node.weight_sum).round() as i64;
        if new_estimate != old_estimate {
            node.pos_estimate = new_estimate;
            let chrom = node.chrom.clone();
            self.index.relocate(&chrom, old_estimate, new_estimate, id);
        }
    }

    /// Increment the weight of the edge between `a` and `b` of this kind,
    /// creating it with weight 1 if absent. Endpoints must already exist.
    pub fn edge_upsert(&mut self, a: NodeId, b: NodeId, kind: EdgeKind) {
        debug_assert!((a as usize) < self.nodes.len() && (b as usize) < self.nodes.len());
        if a == b || (a as usize) >= self.nodes.len() || (b as usize) >= self.nodes.len() {
            return;
        }
        let key = if a < b { (a, b, kind) } else { (b, a, kind) };
        *self.edges.entry(key).or_insert(0) += 1;
    }

    /// Merge every anchor within `tolerance` of `node` into one canonical
    /// anchor (the lowest id among them). Returns the canonical id.
    pub fn merge_candidates(&mut self, node: NodeId, tolerance: i64) -> NodeId {
        let node = self.resolve(node);
        let (chrom, estimate) = {
            let n = &self.nodes[node as usize];
            (n.chrom.clone(), n.pos_estimate)
        };

        // Sweep up every indexed anchor inside the window, unindexing each
        // hit so the next probe sees the rest. Only live nodes are indexed,
        // so the sweep terminates.
        self.index.remove(&chrom, estimate, node);
        let mut candidates = vec![node];
        while let Some(hit) = self.index.nearest(&chrom, estimate, tolerance) {
            let pos = self.nodes[hit as usize].pos_estimate;
            self.index.remove(&chrom, pos, hit);
            if !candidates.contains(&hit) {
                candidates.push(hit);
            }
        }

        let target = candidates.iter().copied().min().unwrap_or(node);
        let target_pos = self.nodes[target as usize].pos_estimate;
        self.index.insert(&chrom, target_pos, target);

        for &source in candidates.iter().filter(|&&c| c != target) {
            self.merge_nodes(target, source);
        }
        target
    }

    /// Merge `source` into `target`: pool events and position mass, leave a
    /// forwarding id. Never deletes.
    fn merge_nodes(&mut self, target: NodeId, source: NodeId) {
        debug_assert_ne!(target, source);
        let (src_chrom, src_pos, src_events, src_sum, src_weight) = {
            let src = &mut self.nodes[source as usize];
            src.merged_into = Some(target);
            (
                src.chrom.clone(),
                src.pos_estimate,
                std::mem::take(&mut src.event_indices),
                src.weighted_pos_sum,
                src.weight_sum,
            )
        };
        self.index.remove(&src_chrom, src_pos, source);

        let tgt = &mut self.nodes[target as usize];
        let old_estimate = tgt.pos_estimate;
        tgt.event_indices.extend(src_events);
        tgt.weighted_pos_sum += src_sum;
        tgt.weight_sum += src_weight;
        let new_estimate = (tgt.weighted_pos_sum / tgt.weight_sum).round() as i64;
        if new_estimate != old_estimate {
            tgt.pos_estimate = new_estimate;
            let chrom = tgt.chrom.clone();
            self.index.relocate(&chrom, old_estimate, new_estimate, target);
        }
    }

    /// Consolidate anchors that drifted within `tolerance` of each other
    /// after streaming finished. Ascending-id order keeps the result
    /// independent of insertion order.
    pub fn consolidate(&mut self, tolerance: i64) {
        for id in 0..self.nodes.len() as NodeId {
            if self.nodes[id as usize].merged_into.is_none() {
                self.merge_candidates(id, tolerance);
            }
        }
    }

    fn resolve(&self, mut id: NodeId) -> NodeId {
        while let Some(next) = self.nodes[id as usize].merged_into {
            id = next;
        }
        id
    }

    fn canonical_edges(&self) -> Vec<SnapshotEdge> {
        let mut folded: AHashMap<(NodeId, NodeId, EdgeKind), u32> = AHashMap::new();
        for (&(a, b, kind), &weight) in &self.edges {
            let (a, b) = (self.resolve(a), self.resolve(b));
            if a == b {
                continue;
            }
            let key = if a < b { (a, b, kind) } else { (b, a, kind) };
            *folded.entry(key).or_insert(0) += weight;
        }
        let mut edges: Vec<SnapshotEdge> = folded
            .into_iter()
            .map(|((a, b, kind), weight)| SnapshotEdge { a, b, kind, weight })
            .collect();
        edges.sort_unstable_by_key(|e| (e.a, e.b, e.kind));
        edges
    }

    fn snapshot_nodes<F: Fn(&AnchorNode) -> bool>(&self, keep: F) -> Vec<SnapshotNode> {
        let mut nodes: Vec<SnapshotNode> = self
            .nodes
            .iter()
            .filter(|n| n.merged_into.is_none() && keep(n))
            .map(|n| {
                let mut event_indices = n.event_indices.clone();
                event_indices.sort_unstable();
                SnapshotNode {
                    id: n.id,
                    chrom: n.chrom.clone(),
                    pos_estimate: n.pos_estimate,
                    event_indices,
                }
            })
            .collect();
        nodes.sort_unstable_by_key(|n| n.id);
        nodes
    }

    /// Immutable view of the anchors inside one genomic interval, with the
    /// edges both of whose endpoints fall inside it.
    pub fn snapshot_region(&self, chrom: &str, start: i64, end: i64) -> GraphSnapshot {
        let nodes = self.snapshot_nodes(|n| {
            n.chrom == chrom && n.pos_estimate >= start && n.pos_estimate < end
        });
        let keep: ahash::AHashSet<NodeId> = nodes.iter().map(|n| n.id).collect();
        let edges = self
            .canonical_edges()
            .into_iter()
            .filter(|e| keep.contains(&e.a) && keep.contains(&e.b))
            .collect();
        GraphSnapshot {
            events: Arc::new(self.events.clone()),
            nodes,
            edges,
        }
    }

    /// Finalize the whole graph into a read-only snapshot, consuming it.
    pub fn finalize(self) -> GraphSnapshot {
        let nodes = self.snapshot_nodes(|_| true);
        let edges = self.canonical_edges();
        GraphSnapshot {
            events: Arc::new(self.events),
            nodes,
            edges,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::evidence::Strand;

    fn soft_clip(read: &str, pos: i64) -> EvidenceEvent {
        EvidenceEvent {
            kind: EvidenceKind::SoftClip,
            chrom: "chr1".to_string(),
            pos,
            end_pos: pos,
            strand: Strand::Forward,
            mate_chrom: None,
            mate_pos: None,
            mate_strand: None,
            read_id: read.to_string(),
            mapq: 60,
            clip_sequence: None,
        }
    }

    fn discordant(read: &str, pos: i64, mate_pos: i64) -> EvidenceEvent {
        EvidenceEvent {
            kind: EvidenceKind::DiscordantPair,
            chrom: "chr1".to_string(),
            pos,
            end_pos: pos,
            strand: Strand::Forward,
            mate_chrom: Some("chr1".to_string()),
            mate_pos: Some(mate_pos),
            mate_strand: Some(Strand::Reverse),
            read_id: read.to_string(),
            mapq: 60,
            clip_sequence: None,
        }
    }

    #[test]
    fn close_events_merge_into_one_anchor() {
        let mut graph = EvidenceGraph::new(GraphConfig::default());
        graph.insert(soft_clip("r1", 1000));
        graph.insert(soft_clip("r2", 1020));
        graph.insert(soft_clip("r3", 990));
        assert_eq!(graph.node_count(), 1);
    }

    #[test]
    fn distant_events_stay_separate() {
        let mut graph = EvidenceGraph::new(GraphConfig::default());
        graph.insert(soft_clip("r1", 1000));
        graph.insert(soft_clip("r2", 5000));
        assert_eq!(graph.node_count(), 2);
    }

    #[test]
    fn pair_event_creates_both_anchors_and_an_edge() {
        let mut graph = EvidenceGraph::new(GraphConfig::default());
        graph.insert(discordant("r1", 1000, 5000));
        let snapshot = graph.finalize();
        assert_eq!(snapshot.nodes.len(), 2);
        assert_eq!(snapshot.edges.len(), 1);
        assert_eq!(snapshot.edges[0].kind, EdgeKind::MatePair);
        assert_eq!(snapshot.edges[0].weight, 1);
    }

    #[test]
    fn edge_weight_is_insertion_order_independent() {
        let events = vec![
            discordant("r1", 1000, 5000),
            discordant("r2", 1010, 5020),
            discordant("r3", 990, 4980),
        ];

        let mut forward = EvidenceGraph::new(GraphConfig::default());
        for e in events.clone() {
            forward.insert(e);
        }
        let forward = forward.finalize();

        let mut reverse = EvidenceGraph::new(GraphConfig::default());
        for e in events.into_iter().rev() {
            reverse.insert(e);
        }
        let reverse = reverse.finalize();

        let fw: Vec<(EdgeKind, u32)> =
            forward.edges.iter().map(|e| (e.kind, e.weight)).collect();
        let rv: Vec<(EdgeKind, u32)> =
            reverse.edges.iter().map(|e| (e.kind, e.weight)).collect();
        assert_eq!(fw, rv);
        let pair_weight = forward
            .edges
            .iter()
            .find(|e| e.kind == EdgeKind::MatePair)
            .map(|e| e.weight);
        assert_eq!(pair_weight, Some(3));
    }

    #[test]
    fn pos_estimate_tracks_weighted_mean() {
        let mut graph = EvidenceGraph::new(GraphConfig::default());
        graph.insert(soft_clip("r1", 1000));
        graph.insert(soft_clip("r2", 1040));
        let snapshot = graph.finalize();
        assert_eq!(snapshot.nodes[0].pos_estimate, 1020);
    }

    #[test]
    fn precise_evidence_outweighs_fuzzy_evidence() {
        let mut graph = EvidenceGraph::new(GraphConfig::default());
        // A fuzzy pair anchor at 1200, then exact CIGAR evidence nearby.
        graph.insert(discordant("r1", 1200, 9000));
        graph.insert(EvidenceEvent {
            kind: EvidenceKind::Deletion,
            chrom: "chr1".to_string(),
            pos: 1190,
            end_pos: 5000,
            strand: Strand::Forward,
            mate_chrom: None,
            mate_pos: None,
            mate_strand: None,
            read_id: "r2".to_string(),
            mapq: 60,
            clip_sequence: None,
        });
        let snapshot = graph.finalize();
        let anchor = snapshot.nodes.iter().find(|n| n.id == 0).unwrap();
        // Weighted mean (1200*1 + 1190*4) / 5 = 1192.
        assert_eq!(anchor.pos_estimate, 1192);
    }

    #[test]
    fn same_read_links_anchors() {
        let mut graph = EvidenceGraph::new(GraphConfig::default());
        graph.insert(soft_clip("r1", 1000));
        graph.insert(soft_clip("r1", 8000));
        let snapshot = graph.finalize();
        assert_eq!(snapshot.edges.len(), 1);
        assert_eq!(snapshot.edges[0].kind, EdgeKind::ReadLink);
    }

    #[test]
    fn merge_candidates_pools_nearby_anchors() {
        let mut graph = EvidenceGraph::new(GraphConfig::default());
        let a = graph.insert(soft_clip("r1", 1000));
        graph.insert(soft_clip("r2", 1150));
        assert_eq!(graph.node_count(), 2);
        let canonical = graph.merge_candidates(a, 300);
        assert_eq!(graph.node_count(), 1);
        assert_eq!(canonical, 0);
    }

    #[test]
    fn snapshot_region_bounds_nodes_and_edges() {
        let mut graph = EvidenceGraph::new(GraphConfig::default());
        graph.insert(discordant("r1", 1000, 5000));
        graph.insert(soft_clip("r2", 90_000));
        let snapshot = graph.snapshot_region("chr1", 0, 10_000);
        assert_eq!(snapshot.nodes.len(), 2);
        assert_eq!(snapshot.edges.len(), 1);
        let far = graph.snapshot_region("chr1", 50_000, 100_000);
        assert_eq!(far.nodes.len(), 1);
        assert!(far.edges.is_empty());
    }
}

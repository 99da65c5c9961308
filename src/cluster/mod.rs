//! Component partitioning: connected subgraphs of the evidence graph, each
//! a candidate variant site.
//!
//! Traversal is union-find over node ids in ascending order, so the
//! partition of a given snapshot is identical across runs regardless of the
//! order evidence arrived in. Accepted components are ordered by
//! (chromosome, leftmost anchor) before downstream processing.

use ahash::{AHashMap, AHashSet};
use petgraph::unionfind::UnionFind;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

use crate::core::evidence::EvidenceEvent;
use crate::graph::{GraphSnapshot, NodeId, SnapshotEdge, SnapshotNode};
use crate::utils::configuration::ClusterConfig;

/// One connected subgraph: a candidate variant site. Transient — consumed
/// by assembly and metric aggregation, then discarded.
#[derive(Debug, Clone)]
pub struct Component {
    pub id: usize,
    pub chrom: String,
    pub nodes: Vec<SnapshotNode>,
    pub edges: Vec<SnapshotEdge>,
    /// Shared event arena for the snapshot this component came from.
    pub events: Arc<Vec<EvidenceEvent>>,
    /// Sorted, deduplicated indices into `events`. Two-anchor events occur
    /// in two nodes but are counted once here.
    pub event_indices: Vec<usize>,
}

impl Component {
    pub fn event_count(&self) -> usize {
        self.event_indices.len()
    }

    pub fn iter_events(&self) -> impl Iterator<Item = &EvidenceEvent> {
        self.event_indices.iter().map(|&i| &self.events[i])
    }

    /// Distinct reads contributing evidence.
    pub fn supporting_reads(&self) -> AHashSet<&str> {
        self.iter_events().map(|e| e.read_id.as_str()).collect()
    }

    /// Leftmost and rightmost anchor estimates.
    pub fn anchor_span(&self) -> (i64, i64) {
        let mut lo = i64::MAX;
        let mut hi = i64::MIN;
        for node in &self.nodes {
            lo = lo.min(node.pos_estimate);
            hi = hi.max(node.pos_estimate);
        }
        (lo, hi)
    }

    pub fn max_edge_weight(&self) -> u32 {
        self.edges.iter().map(|e| e.weight).max().unwrap_or(0)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartitionStats {
    pub accepted: usize,
    pub rejected_low_support: usize,
    pub rejected_weak_edges: usize,
}

pub struct ComponentPartitioner {
    config: ClusterConfig,
}

impl ComponentPartitioner {
    pub fn new(config: ClusterConfig) -> Self {
        Self { config }
    }

    /// Extract connected components from a finalized snapshot, dropping
    /// noise components. No node lands in two components of the same pass.
    pub fn partition(&self, snapshot: &GraphSnapshot) -> (Vec<Component>, PartitionStats) {
        let mut stats = PartitionStats::default();
        if snapshot.nodes.is_empty() {
            return (Vec::new(), stats);
        }

        // Snapshot node ids can be sparse after merges; work in dense
        // indices. Snapshot nodes are already sorted ascending by id.
        let dense: AHashMap<NodeId, usize> = snapshot
            .nodes
            .iter()
            .enumerate()
            .map(|(i, n)| (n.id, i))
            .collect();

        let mut uf = UnionFind::<usize>::new(snapshot.nodes.len());
        for edge in &snapshot.edges {
            if let (Some(&a), Some(&b)) = (dense.get(&edge.a), dense.get(&edge.b)) {
                uf.union(a, b);
            }
        }

        // Group members by root, first-seen in ascending node-id order.
        let mut root_order: Vec<usize> = Vec::new();
        let mut members: AHashMap<usize, Vec<usize>> = AHashMap::new();
        for i in 0..snapshot.nodes.len() {
            let root = uf.find(i);
            let entry = members.entry(root).or_default();
            if entry.is_empty() {
                root_order.push(root);
            }
            entry.push(i);
        }

        let mut accepted = Vec::new();
        for root in root_order {
            let node_ids: AHashSet<NodeId> = members[&root]
                .iter()
                .map(|&i| snapshot.nodes[i].id)
                .collect();
            let nodes: Vec<SnapshotNode> = members[&root]
                .iter()
                .map(|&i| snapshot.nodes[i].clone())
                .collect();
            let edges: Vec<SnapshotEdge> = snapshot
                .edges
                .iter()
                .filter(|e| node_ids.contains(&e.a) && node_ids.contains(&e.b))
                .copied()
                .collect();

            let mut event_indices: Vec<usize> = nodes
                .iter()
                .flat_map(|n| n.event_indices.iter().copied())
                .collect();
            event_indices.sort_unstable();
            event_indices.dedup();

            let component = Component {
                id: 0, // assigned after ordering
                chrom: nodes[0].chrom.clone(),
                nodes,
                edges,
                events: Arc::clone(&snapshot.events),
                event_indices,
            };

            if component.event_count() < self.config.min_support {
                stats.rejected_low_support += 1;
                debug!(
                    events = component.event_count(),
                    "rejecting component: below minimum support"
                );
                continue;
            }
            // The edge-weight floor targets multi-anchor noise; a single
            // anchor has no edges to weigh.
            if component.nodes.len() > 1
                && component.max_edge_weight() < self.config.min_edge_weight
            {
                stats.rejected_weak_edges += 1;
                debug!("rejecting component: all edge weights below threshold");
                continue;
            }
            accepted.push(component);
        }

        // Stable output ordering independent of insertion order.
        accepted.sort_by(|a, b| {
            let (a_lo, _) = a.anchor_span();
            let (b_lo, _) = b.anchor_span();
            (a.chrom.as_str(), a_lo).cmp(&(b.chrom.as_str(), b_lo))
        });
        for (i, component) in accepted.iter_mut().enumerate() {
            component.id = i;
        }

        stats.accepted = accepted.len();
        (accepted, stats)
    }
}

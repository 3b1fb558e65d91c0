//! Published snapshots and the atomic publisher.
//!
//! A [`Snapshot`] is immutable once built. The [`SnapshotPublisher`] holds the
//! current one behind a single `Arc`; publishing swaps that pointer, so readers
//! see either the previous snapshot or the new one and never a mix.
//!
//! # JSON layout (serde feature)
//!
//! ```text
//! { "strikes":  [ {"lat", "lon", "time"} ],
//!   "clusters": [ {"id", "center": {"lat", "lon"}, "count", "members", "mstWeight"} ],
//!   "mstEdges": [ {"from", "to", "weight"} ],
//!   "hotspots": [ {"lat", "lon", "density"} ],
//!   "systems":  [ [cluster id] ],
//!   "stats":    { "totalStrikes", "rawClusters", "merges", "clusters",
//!                 "excludedClusters", "systems", "mstTotalWeight" },
//!   "generatedAt": ms }
//! ```

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;

use crate::buffer::StrikeEvent;
use crate::clustering::Cluster;
use crate::geo::GeoPoint;
use crate::hotspot::Hotspot;
use crate::mst::{MinimumSpanningTree, MstEdge};

/// Published view of one cluster.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase"))]
pub struct ClusterSummary {
    /// Cluster id, stable within one snapshot.
    pub id: u32,
    /// Weighted centroid of the members.
    pub center: GeoPoint,
    /// Number of member strikes.
    pub count: usize,
    /// Indices into [`Snapshot::strikes`], ascending.
    pub members: Vec<usize>,
    /// Distance to the nearest other cluster along the MST; `None` when alone.
    pub mst_weight: Option<f64>,
}

impl ClusterSummary {
    /// Summarise `cluster` with its MST annotation.
    pub fn from_cluster(cluster: &Cluster, mst: &MinimumSpanningTree) -> Self {
        Self {
            id: cluster.id,
            center: cluster.center(),
            count: cluster.count(),
            members: cluster.members().to_vec(),
            mst_weight: mst.nearest_link(cluster.id),
        }
    }
}

/// Per-cycle counters.
#[derive(Clone, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase"))]
pub struct SnapshotStats {
    /// Strikes published.
    pub total_strikes: usize,
    /// Connected components before consolidation.
    pub raw_clusters: usize,
    /// Merges performed by the consolidator.
    pub merges: usize,
    /// Clusters published.
    pub clusters: usize,
    /// Consolidated clusters dropped for being under the minimum size.
    pub excluded_clusters: usize,
    /// Storm systems after cutting long MST edges.
    pub systems: usize,
    /// Sum of MST edge weights in kilometres.
    pub mst_total_weight: f64,
}

/// One complete, immutable result of the clustering pipeline.
#[derive(Clone, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase"))]
pub struct Snapshot {
    /// Strikes the clusters index into, in buffer order.
    pub strikes: Vec<StrikeEvent>,
    /// Consolidated clusters at or above the minimum size, ascending by id.
    pub clusters: Vec<ClusterSummary>,
    /// Spanning tree over the published cluster centers.
    pub mst_edges: Vec<MstEdge>,
    /// Densest strikes.
    pub hotspots: Vec<Hotspot>,
    /// Groups of cluster ids linked by short MST edges.
    pub systems: Vec<Vec<u32>>,
    /// Counters for this cycle.
    pub stats: SnapshotStats,
    /// Generation time, ms since the Unix epoch.
    #[cfg_attr(feature = "serde", serde(rename = "generatedAt"))]
    pub generated_at_ms: u64,
}

impl Snapshot {
    /// Snapshot with no strikes and no clusters.
    pub fn empty(generated_at_ms: u64) -> Self {
        Self {
            generated_at_ms,
            ..Self::default()
        }
    }

    /// Look up a published cluster by id.
    pub fn cluster(&self, id: u32) -> Option<&ClusterSummary> {
        self.clusters
            .binary_search_by_key(&id, |c| c.id)
            .ok()
            .map(|i| &self.clusters[i])
    }

    /// Serialise to the JSON document served to map clients.
    #[cfg(feature = "serde")]
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

// ─── SnapshotPublisher ───────────────────────────────────────────────────────

/// Holder of the current snapshot.
#[derive(Debug)]
pub struct SnapshotPublisher {
    current: RwLock<Arc<Snapshot>>,
    published: AtomicU64,
}

impl SnapshotPublisher {
    /// Publisher serving an empty snapshot until the first publish.
    pub fn new() -> Self {
        Self {
            current: RwLock::new(Arc::new(Snapshot::empty(0))),
            published: AtomicU64::new(0),
        }
    }

    /// Replace the current snapshot.
    pub fn publish(&self, snapshot: Snapshot) {
        let snapshot = Arc::new(snapshot);
        *self.current.write() = snapshot;
        self.published.fetch_add(1, Ordering::Release);
    }

    /// The current snapshot. Cheap: clones an `Arc`.
    pub fn latest(&self) -> Arc<Snapshot> {
        Arc::clone(&self.current.read())
    }

    /// True once anything has been published.
    pub fn has_published(&self) -> bool {
        self.publish_count() > 0
    }

    /// Number of snapshots published so far.
    pub fn publish_count(&self) -> u64 {
        self.published.load(Ordering::Acquire)
    }
}

impl Default for SnapshotPublisher {
    fn default() -> Self {
        Self::new()
    }
}

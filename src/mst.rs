//! Minimum spanning tree over cluster centers (Prim, array frontier).
//!
//! The graph is complete: every pair of centers is joined by an edge weighted
//! with their haversine distance. With k in the tens, the O(k²) array form of
//! Prim's algorithm beats a heap and needs no edge list.
//!
//! # Algorithm
//!
//! ```text
//! in_tree = {lowest id}
//! best[v] = w(start, v), parent[v] = start        for every other v
//! repeat k-1 times:
//!     u = argmin best[v] over v ∉ in_tree           (ties → lowest position)
//!     emit edge (parent[u] → u, best[u]); in_tree += u
//!     for v ∉ in_tree: if w(u, v) < best[v]: best[v] = w(u, v), parent[v] = u
//! ```

use crate::clustering::link_weight;
use crate::geo::GeoPoint;

/// One tree edge between two cluster ids.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MstEdge {
    /// Cluster already in the tree when the edge was chosen.
    pub from: u32,
    /// Cluster the edge brought into the tree.
    pub to: u32,
    /// Center-to-center distance in kilometres.
    #[cfg_attr(feature = "serde", serde(rename = "weight"))]
    pub weight_km: f64,
}

/// Spanning tree plus the node set it was built over.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct MinimumSpanningTree {
    ids: Vec<u32>,
    edges: Vec<MstEdge>,
}

impl MinimumSpanningTree {
    /// Build the tree over `(cluster id, center)` nodes.
    ///
    /// Nodes are processed in ascending id order regardless of input order.
    /// Produces `k - 1` edges for `k >= 1` nodes and none otherwise.
    pub fn build(nodes: &[(u32, GeoPoint)]) -> Self {
        let mut nodes = nodes.to_vec();
        nodes.sort_by_key(|&(id, _)| id);
        let ids: Vec<u32> = nodes.iter().map(|&(id, _)| id).collect();
        let k = nodes.len();
        if k <= 1 {
            return Self {
                ids,
                edges: Vec::new(),
            };
        }

        let weight =
            |a: usize, b: usize| link_weight(nodes[a].0, nodes[a].1, nodes[b].0, nodes[b].1);

        let mut in_tree = vec![false; k];
        let mut best = vec![f64::INFINITY; k];
        let mut parent = vec![0usize; k];
        in_tree[0] = true;
        for v in 1..k {
            best[v] = weight(0, v);
        }

        let mut edges = Vec::with_capacity(k - 1);
        for _ in 1..k {
            let mut next: Option<usize> = None;
            for v in 0..k {
                if in_tree[v] {
                    continue;
                }
                match next {
                    Some(u) if best[v].total_cmp(&best[u]).is_ge() => {}
                    _ => next = Some(v),
                }
            }
            let Some(u) = next else { break };

            in_tree[u] = true;
            edges.push(MstEdge {
                from: ids[parent[u]],
                to: ids[u],
                weight_km: best[u],
            });

            for v in 0..k {
                if !in_tree[v] {
                    let w = weight(u, v);
                    if w < best[v] {
                        best[v] = w;
                        parent[v] = u;
                    }
                }
            }
        }

        tracing::debug!(nodes = k, edges = edges.len(), "minimum spanning tree built");
        Self { ids, edges }
    }

    /// Tree edges in the order they were added.
    pub fn edges(&self) -> &[MstEdge] {
        &self.edges
    }

    /// Number of nodes the tree spans.
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    /// True when built over no nodes.
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Sum of edge weights in kilometres.
    pub fn total_weight(&self) -> f64 {
        self.edges.iter().map(|e| e.weight_km).sum()
    }

    /// Weight of the lightest tree edge incident to `id`, if any.
    ///
    /// This is the distance from the cluster to its nearest neighbouring
    /// cluster: every nearest-neighbour link is an MST edge.
    pub fn nearest_link(&self, id: u32) -> Option<f64> {
        self.edges
            .iter()
            .filter(|e| e.from == id || e.to == id)
            .map(|e| e.weight_km)
            .min_by(f64::total_cmp)
    }

    /// Connected groups after cutting every edge heavier than `max_edge_km`.
    ///
    /// Each group is sorted; groups are ordered by their smallest id.
    pub fn systems(&self, max_edge_km: f64) -> Vec<Vec<u32>> {
        let k = self.ids.len();
        let mut dsu = DisjointSet::new(k);
        for e in &self.edges {
            if e.weight_km <= max_edge_km {
                if let (Some(a), Some(b)) = (self.position(e.from), self.position(e.to)) {
                    dsu.union(a, b);
                }
            }
        }

        // Positions are in id order, so the first position seen for a root
        // carries that group's smallest id.
        let mut group_of_root = vec![usize::MAX; k];
        let mut groups: Vec<Vec<u32>> = Vec::new();
        for pos in 0..k {
            let root = dsu.find(pos);
            if group_of_root[root] == usize::MAX {
                group_of_root[root] = groups.len();
                groups.push(Vec::new());
            }
            groups[group_of_root[root]].push(self.ids[pos]);
        }
        groups
    }

    fn position(&self, id: u32) -> Option<usize> {
        self.ids.binary_search(&id).ok()
    }
}

/// Union-find with path halving.
struct DisjointSet {
    parent: Vec<usize>,
}

impl DisjointSet {
    fn new(n: usize) -> Self {
        Self {
            parent: (0..n).collect(),
        }
    }

    fn find(&mut self, mut x: usize) -> usize {
        while self.parent[x] != x {
            self.parent[x] = self.parent[self.parent[x]];
            x = self.parent[x];
        }
        x
    }

    fn union(&mut self, a: usize, b: usize) {
        let (ra, rb) = (self.find(a), self.find(b));
        if ra != rb {
            // Lower root wins so roots stay at the smallest position.
            let (lo, hi) = if ra < rb { (ra, rb) } else { (rb, ra) };
            self.parent[hi] = lo;
        }
    }
}

//! Connected components of the proximity graph by breadth-first search.
//!
//! # Algorithm
//!
//! ```text
//! for seed in buffer order:
//!     if visited[seed]: continue
//!     visited[seed] = true; queue = [seed]
//!     while queue not empty:
//!         u = queue.pop_front(); component += u
//!         for v in neighbours(u):          # grid query, deterministic order
//!             if not visited[v]:
//!                 visited[v] = true        # mark on enqueue, never twice
//!                 queue.push_back(v)
//! ```
//!
//! Each strike is enqueued exactly once and each query touches only the 3×3
//! cell block around it, so the pass is near-linear in the strike count.
//! Component ids are 0, 1, 2… in seed order.

use std::collections::VecDeque;

use crate::geo::Centroid;
use crate::proximity::NeighborQuery;

use super::cluster::Cluster;

/// Partition the points of `graph` into connected components.
///
/// Every point belongs to exactly one returned cluster, singletons included.
/// Output is ordered by id, which equals the position of each component's
/// first-seen seed.
pub fn detect_components<Q: NeighborQuery>(graph: &Q) -> Vec<Cluster> {
    let n = graph.len();
    let mut visited = vec![false; n];
    let mut queue = VecDeque::new();
    let mut neighbors = Vec::new();
    let mut clusters = Vec::new();

    for seed in 0..n {
        if visited[seed] {
            continue;
        }
        visited[seed] = true;
        queue.push_back(seed);

        let mut members = Vec::new();
        let mut centroid = Centroid::new();
        while let Some(u) = queue.pop_front() {
            members.push(u);
            centroid.add(graph.point(u));

            neighbors.clear();
            graph.neighbors_into(u, &mut neighbors);
            for &v in &neighbors {
                if !visited[v] {
                    visited[v] = true;
                    queue.push_back(v);
                }
            }
        }

        let id = clusters.len() as u32;
        // members holds at least the seed, so the centroid is defined.
        if let Some(cluster) = Cluster::new(id, members, centroid) {
            clusters.push(cluster);
        }
    }

    tracing::debug!(points = n, components = clusters.len(), "proximity components detected");
    clusters
}

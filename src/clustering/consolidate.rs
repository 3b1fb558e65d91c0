//! Greedy closest-pair consolidation of raw clusters.
//!
//! Repeatedly merges the two active clusters whose centers are closest, as
//! long as that distance is within the merge radius. Equal distances are
//! broken by the lexicographically smaller `(lower id, higher id)` pair. The
//! lower id survives every merge.
//!
//! [`consolidate`] keeps candidate pairs in a lazy min-heap so each merge costs
//! O(k log k) instead of a full O(k²) rescan. [`consolidate_naive`] is the
//! literal rescan and exists as the reference the heap version is tested
//! against; both produce identical output for any input.

use core::cmp::Ordering;
use std::collections::BinaryHeap;

use crate::geo::GeoPoint;
use crate::proximity::GridIndex;

use super::cluster::Cluster;

/// Relative enlargement of the seeding grid radius. Exact membership is
/// decided afterwards by [`Cluster::distance_to`].
const SEED_SLACK: f64 = 1.0 + 1e-6;

/// Result of a consolidation pass.
#[derive(Clone, Debug, PartialEq)]
pub struct Consolidation {
    /// Surviving clusters, ascending by id.
    pub clusters: Vec<Cluster>,
    /// Number of merges performed.
    pub merges: usize,
}

// ─── candidate heap ──────────────────────────────────────────────────────────

/// A mergeable pair as it looked when pushed.
///
/// Slots are positions in the working vector; `lo_gen`/`hi_gen` are the
/// slot generations at push time. A candidate whose generations no longer
/// match describes a center that has since moved and is discarded on pop.
#[derive(Clone, Copy, Debug)]
struct Candidate {
    distance_km: f64,
    lo_id: u32,
    hi_id: u32,
    lo_slot: usize,
    hi_slot: usize,
    lo_gen: u32,
    hi_gen: u32,
}

impl Candidate {
    fn key(&self) -> (f64, u32, u32) {
        (self.distance_km, self.lo_id, self.hi_id)
    }
}

impl PartialEq for Candidate {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Candidate {}

impl PartialOrd for Candidate {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Candidate {
    /// Reversed so that `BinaryHeap` pops the smallest key first.
    fn cmp(&self, other: &Self) -> Ordering {
        let (da, la, ha) = self.key();
        let (db, lb, hb) = other.key();
        db.total_cmp(&da)
            .then_with(|| lb.cmp(&la))
            .then_with(|| hb.cmp(&ha))
    }
}

struct Workspace {
    slots: Vec<Option<Cluster>>,
    generations: Vec<u32>,
    heap: BinaryHeap<Candidate>,
    merge_radius_km: f64,
}

impl Workspace {
    /// Push the pair `(a, b)` if its current distance qualifies.
    fn offer(&mut self, a: usize, b: usize) {
        let (Some(ca), Some(cb)) = (&self.slots[a], &self.slots[b]) else {
            return;
        };
        let d = ca.distance_to(cb);
        if !(d <= self.merge_radius_km) {
            return;
        }
        let (lo_slot, hi_slot) = if ca.id <= cb.id { (a, b) } else { (b, a) };
        self.heap.push(Candidate {
            distance_km: d,
            lo_id: ca.id.min(cb.id),
            hi_id: ca.id.max(cb.id),
            lo_slot,
            hi_slot,
            lo_gen: self.generations[lo_slot],
            hi_gen: self.generations[hi_slot],
        });
    }

    fn is_current(&self, c: &Candidate) -> bool {
        self.slots[c.lo_slot].is_some()
            && self.slots[c.hi_slot].is_some()
            && self.generations[c.lo_slot] == c.lo_gen
            && self.generations[c.hi_slot] == c.hi_gen
    }
}

/// Merge raw clusters greedily, closest pair first, until no pair of centers
/// lies within `merge_radius_km`.
///
/// Terminates after at most `raw.len() - 1` merges. A negative or NaN radius
/// disables merging.
pub fn consolidate(raw: Vec<Cluster>, merge_radius_km: f64) -> Consolidation {
    let k = raw.len();
    if k < 2 || !(merge_radius_km >= 0.0) {
        return finish(raw.into_iter().map(Some).collect(), 0);
    }

    let centers: Vec<GeoPoint> = raw.iter().map(Cluster::center).collect();
    let mut ws = Workspace {
        slots: raw.into_iter().map(Some).collect(),
        generations: vec![0; k],
        heap: BinaryHeap::new(),
        merge_radius_km,
    };

    // Seed with every qualifying pair. The grid only prunes; offer() re-measures.
    let grid = GridIndex::build(centers.clone(), merge_radius_km * SEED_SLACK + 1e-9);
    for (a, center) in centers.iter().enumerate() {
        let mut near = Vec::new();
        grid.for_each_within(center, |b| {
            if b > a {
                near.push(b);
            }
        });
        for b in near {
            ws.offer(a, b);
        }
    }

    let mut merges = 0;
    while let Some(best) = ws.heap.pop() {
        if !ws.is_current(&best) {
            continue;
        }
        let Some(absorbed) = ws.slots[best.hi_slot].take() else {
            continue;
        };
        let survivor_slot = best.lo_slot;
        if let Some(survivor) = ws.slots[survivor_slot].as_mut() {
            tracing::trace!(
                survivor = survivor.id,
                absorbed = absorbed.id,
                distance_km = best.distance_km,
                "merging clusters"
            );
            survivor.absorb(absorbed);
        }
        ws.generations[survivor_slot] = ws.generations[survivor_slot].wrapping_add(1);
        merges += 1;

        // Only pairs touching the moved center can change; re-offer those.
        for other in 0..k {
            if other != survivor_slot {
                ws.offer(survivor_slot, other);
            }
        }
    }

    finish(ws.slots, merges)
}

/// Reference consolidation by exhaustive pair scan on every step.
///
/// O(k³) overall. Same semantics and output as [`consolidate`].
pub fn consolidate_naive(raw: Vec<Cluster>, merge_radius_km: f64) -> Consolidation {
    let mut slots: Vec<Option<Cluster>> = raw.into_iter().map(Some).collect();
    let mut merges = 0;

    loop {
        let mut best: Option<(f64, u32, u32, usize, usize)> = None;
        for a in 0..slots.len() {
            for b in (a + 1)..slots.len() {
                let (Some(ca), Some(cb)) = (&slots[a], &slots[b]) else {
                    continue;
                };
                let d = ca.distance_to(cb);
                if !(d <= merge_radius_km) {
                    continue;
                }
                let (lo, hi, lo_slot, hi_slot) = if ca.id <= cb.id {
                    (ca.id, cb.id, a, b)
                } else {
                    (cb.id, ca.id, b, a)
                };
                let better = match best {
                    None => true,
                    Some((bd, bl, bh, _, _)) => d
                        .total_cmp(&bd)
                        .then_with(|| lo.cmp(&bl))
                        .then_with(|| hi.cmp(&bh))
                        .is_lt(),
                };
                if better {
                    best = Some((d, lo, hi, lo_slot, hi_slot));
                }
            }
        }

        let Some((_, _, _, lo_slot, hi_slot)) = best else {
            break;
        };
        if let Some(absorbed) = slots[hi_slot].take() {
            if let Some(survivor) = slots[lo_slot].as_mut() {
                survivor.absorb(absorbed);
            }
        }
        merges += 1;
    }

    finish(slots, merges)
}

fn finish(slots: Vec<Option<Cluster>>, merges: usize) -> Consolidation {
    let mut clusters: Vec<Cluster> = slots.into_iter().flatten().collect();
    clusters.sort_by_key(|c| c.id);
    tracing::debug!(clusters = clusters.len(), merges, "consolidation complete");
    Consolidation { clusters, merges }
}

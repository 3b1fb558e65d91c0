//! A group of spatially adjacent strikes.
//!
//! A [`Cluster`] is created by the component detector, mutated only by the
//! consolidator (absorbing another cluster) and treated as frozen afterwards.

use crate::geo::{haversine_km, Centroid, GeoPoint};

// ─── Cluster ─────────────────────────────────────────────────────────────────

/// One density region: a set of strike indices and their spherical centroid.
///
/// `members` are indices into the strike slice the pipeline ran over, kept
/// sorted ascending. The center is recomputed on every membership change.
#[derive(Clone, Debug, PartialEq)]
pub struct Cluster {
    /// Identifier assigned in discovery order. Survives merges as the lower id.
    pub id: u32,
    members: Vec<usize>,
    centroid: Centroid,
    center: GeoPoint,
}

impl Cluster {
    /// Build a cluster from member indices and their accumulated centroid.
    ///
    /// `members` is sorted on construction. Returns `None` when empty.
    pub fn new(id: u32, mut members: Vec<usize>, centroid: Centroid) -> Option<Self> {
        let center = centroid.center()?;
        members.sort_unstable();
        Some(Self {
            id,
            members,
            centroid,
            center,
        })
    }

    /// Single-strike cluster at `position`.
    pub fn singleton(id: u32, strike_index: usize, position: GeoPoint) -> Self {
        let mut centroid = Centroid::new();
        centroid.add(position);
        Self {
            id,
            members: vec![strike_index],
            centroid,
            center: position,
        }
    }

    /// Member strike indices, ascending.
    pub fn members(&self) -> &[usize] {
        &self.members
    }

    /// Number of member strikes.
    pub fn count(&self) -> usize {
        self.members.len()
    }

    /// Weighted centroid of the members.
    pub fn center(&self) -> GeoPoint {
        self.center
    }

    /// Center-to-center distance in kilometres.
    ///
    /// Always evaluated from the lower id to the higher id, so the same pair
    /// yields a bit-identical value whichever side asks.
    pub fn distance_to(&self, other: &Cluster) -> f64 {
        link_weight(self.id, self.center, other.id, other.center)
    }

    /// Union `other` into `self`, recomputing the center weighted by member count.
    pub fn absorb(&mut self, other: Cluster) {
        self.members = merge_sorted(&self.members, &other.members);
        self.centroid.merge(&other.centroid);
        if let Some(center) = self.centroid.center() {
            self.center = center;
        }
    }

    /// Replace member indices through `map` (used when the published strike
    /// list is a filtered view of the buffer).
    pub(crate) fn remap_members<F: Fn(usize) -> usize>(&mut self, map: F) {
        for m in &mut self.members {
            *m = map(*m);
        }
    }
}

/// Haversine distance between two identified centers, evaluated in id order.
pub fn link_weight(id_a: u32, a: GeoPoint, id_b: u32, b: GeoPoint) -> f64 {
    if id_a <= id_b {
        haversine_km(&a, &b)
    } else {
        haversine_km(&b, &a)
    }
}

fn merge_sorted(a: &[usize], b: &[usize]) -> Vec<usize> {
    let mut out = Vec::with_capacity(a.len() + b.len());
    let (mut i, mut j) = (0, 0);
    while i < a.len() && j < b.len() {
        if a[i] <= b[j] {
            out.push(a[i]);
            i += 1;
        } else {
            out.push(b[j]);
            j += 1;
        }
    }
    out.extend_from_slice(&a[i..]);
    out.extend_from_slice(&b[j..]);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_absorb_unions_members_and_moves_center() {
        let mut a = Cluster::singleton(0, 4, GeoPoint::new(0.0, 0.0));
        let mut b = Cluster::singleton(3, 1, GeoPoint::new(0.0, 0.2));
        b.absorb(Cluster::singleton(5, 7, GeoPoint::new(0.0, 0.2)));
        a.absorb(b);
        assert_eq!(a.id, 0);
        assert_eq!(a.members(), &[1, 4, 7]);
        assert_eq!(a.count(), 3);
        // Two of three members sit at 0.2°, so the weighted center is near 0.1333°.
        assert!((a.center().lon - 0.4 / 3.0).abs() < 1e-4, "{:?}", a.center());
    }

    #[test]
    fn test_distance_is_order_independent() {
        let a = Cluster::singleton(2, 0, GeoPoint::new(12.3456, -45.6789));
        let b = Cluster::singleton(9, 1, GeoPoint::new(-33.21, 151.19));
        assert_eq!(a.distance_to(&b).to_bits(), b.distance_to(&a).to_bits());
    }

    #[test]
    fn test_new_rejects_empty() {
        assert!(Cluster::new(0, Vec::new(), Centroid::new()).is_none());
    }

    #[test]
    fn test_new_sorts_members() {
        let mut c = Centroid::new();
        c.add(GeoPoint::new(1.0, 1.0));
        c.add(GeoPoint::new(1.0, 1.0));
        let cluster = Cluster::new(1, vec![9, 2], c).unwrap();
        assert_eq!(cluster.members(), &[2, 9]);
    }

    #[test]
    fn test_merge_sorted() {
        assert_eq!(merge_sorted(&[1, 5, 9], &[2, 3, 10]), vec![1, 2, 3, 5, 9, 10]);
        assert_eq!(merge_sorted(&[], &[4]), vec![4]);
    }
}

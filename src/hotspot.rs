//! Densest individual strikes.
//!
//! A strike's density is the number of buffered strikes within the proximity
//! radius of it, itself included. The hotspots are the `k` densest strikes,
//! ties broken by buffer order.

use crate::proximity::{GridIndex, NeighborQuery};

/// One high-density strike.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Hotspot {
    /// Latitude of the strike.
    pub lat: f64,
    /// Longitude of the strike.
    pub lon: f64,
    /// Strikes within the proximity radius, self included.
    pub density: usize,
    /// Index of the strike in the published strike list.
    #[cfg_attr(feature = "serde", serde(skip))]
    pub strike_index: usize,
}

/// Pick the `k` densest indexed points for which `eligible` holds.
///
/// Result is ordered by density descending, then index ascending. Returns
/// every eligible point (still ranked) when fewer than `k` exist.
pub fn select_hotspots<F>(grid: &GridIndex, k: usize, eligible: F) -> Vec<Hotspot>
where
    F: Fn(usize) -> bool,
{
    if k == 0 {
        return Vec::new();
    }

    let mut ranked: Vec<(usize, usize)> = (0..grid.len())
        .filter(|&i| eligible(i))
        .map(|i| (grid.count_within(&grid.point(i)), i))
        .collect();

    let by_rank = |a: &(usize, usize), b: &(usize, usize)| b.0.cmp(&a.0).then(a.1.cmp(&b.1));
    if ranked.len() > k {
        ranked.select_nth_unstable_by(k - 1, by_rank);
        ranked.truncate(k);
    }
    ranked.sort_unstable_by(by_rank);

    ranked
        .into_iter()
        .map(|(density, i)| {
            let p = grid.point(i);
            Hotspot {
                lat: p.lat,
                lon: p.lon,
                density,
                strike_index: i,
            }
        })
        .collect()
}

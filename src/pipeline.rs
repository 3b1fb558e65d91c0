//! One full clustering cycle over a copy of the buffer.
//!
//! ```text
//! strikes ─► GridIndex ─► detect_components ─► consolidate ─► size filter
//!                │                                                │
//!                └──────────────► select_hotspots        MinimumSpanningTree
//!                                                                 │
//!                                           systems ◄─────────────┘
//! ```
//!
//! [`ClusterEngine::run`] is a pure function of its inputs: the same strikes
//! and configuration always give the same snapshot.

use crate::buffer::StrikeEvent;
use crate::clustering::{consolidate, detect_components, Cluster, Consolidation};
use crate::config::{ClusterConfig, UndersizedStrikes};
use crate::error::{ConfigError, PipelineError};
use crate::geo::GeoPoint;
use crate::hotspot::select_hotspots;
use crate::mst::MinimumSpanningTree;
use crate::proximity::GridIndex;
use crate::snapshot::{ClusterSummary, Snapshot, SnapshotStats};

/// Stateless runner of the clustering pipeline.
#[derive(Clone, Debug)]
pub struct ClusterEngine {
    config: ClusterConfig,
    /// Returned by the next `run` instead of clustering.
    #[cfg(test)]
    pub(crate) injected_fault: Option<PipelineError>,
}

impl ClusterEngine {
    /// Validate `config` and build an engine around it.
    pub fn new(config: ClusterConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            config,
            #[cfg(test)]
            injected_fault: None,
        })
    }

    /// Active configuration.
    pub fn config(&self) -> &ClusterConfig {
        &self.config
    }

    /// Cluster `strikes` and assemble a snapshot stamped `generated_at_ms`.
    pub fn run(
        &self,
        strikes: &[StrikeEvent],
        generated_at_ms: u64,
    ) -> Result<Snapshot, PipelineError> {
        #[cfg(test)]
        if let Some(fault) = &self.injected_fault {
            return Err(fault.clone());
        }

        let cfg = &self.config;
        let positions: Vec<GeoPoint> = strikes.iter().map(StrikeEvent::position).collect();
        let grid = GridIndex::build(positions, cfg.proximity_radius_km);
        tracing::debug!(
            strikes = strikes.len(),
            cells = grid.occupied_cells(),
            "proximity index built"
        );

        let raw = detect_components(&grid);
        let raw_clusters = raw.len();
        let Consolidation { clusters, merges } = consolidate(raw, cfg.merge_radius_km);
        check_consistency(&clusters, strikes.len())?;

        let (mut kept, excluded): (Vec<Cluster>, Vec<Cluster>) = clusters
            .into_iter()
            .partition(|c| c.count() >= cfg.min_cluster_size);
        tracing::debug!(
            kept = kept.len(),
            excluded = excluded.len(),
            min_cluster_size = cfg.min_cluster_size,
            "size filter applied"
        );

        // Which buffer positions make it into the published strike list.
        let published_mask: Vec<bool> = match cfg.undersized_strikes {
            UndersizedStrikes::Keep => vec![true; strikes.len()],
            UndersizedStrikes::Drop => {
                let mut mask = vec![false; strikes.len()];
                for c in &kept {
                    for &m in c.members() {
                        mask[m] = true;
                    }
                }
                mask
            }
        };
        let remap = index_remap(&published_mask);
        let published: Vec<StrikeEvent> = strikes
            .iter()
            .zip(&published_mask)
            .filter_map(|(s, &keep)| keep.then_some(*s))
            .collect();
        if published.len() != strikes.len() {
            for c in &mut kept {
                c.remap_members(|i| remap[i]);
            }
        }

        let nodes: Vec<(u32, GeoPoint)> = kept.iter().map(|c| (c.id, c.center())).collect();
        let mst = MinimumSpanningTree::build(&nodes);
        let systems = mst.systems(cfg.system_link_radius_km);

        let mut hotspots = select_hotspots(&grid, cfg.hotspot_count, |i| published_mask[i]);
        for h in &mut hotspots {
            h.strike_index = remap[h.strike_index];
        }

        let stats = SnapshotStats {
            total_strikes: published.len(),
            raw_clusters,
            merges,
            clusters: kept.len(),
            excluded_clusters: excluded.len(),
            systems: systems.len(),
            mst_total_weight: mst.total_weight(),
        };
        let clusters = kept.iter().map(|c| ClusterSummary::from_cluster(c, &mst)).collect();

        Ok(Snapshot {
            strikes: published,
            clusters,
            mst_edges: mst.edges().to_vec(),
            hotspots,
            systems,
            stats,
            generated_at_ms,
        })
    }
}

fn check_consistency(clusters: &[Cluster], expected: usize) -> Result<(), PipelineError> {
    let assigned: usize = clusters.iter().map(Cluster::count).sum();
    if assigned != expected {
        return Err(PipelineError::ClusterCountMismatch { assigned, expected });
    }
    match clusters
        .iter()
        .find(|c| !(c.center().lat.is_finite() && c.center().lon.is_finite()))
    {
        Some(bad) => Err(PipelineError::non_finite_center(bad.id)),
        None => Ok(()),
    }
}

/// Old position → position among the kept entries. Unkept entries map to
/// the next kept position and are never looked up.
fn index_remap(mask: &[bool]) -> Vec<usize> {
    let mut next = 0;
    mask.iter()
        .map(|&keep| {
            let at = next;
            if keep {
                next += 1;
            }
            at
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const T: u64 = 1_760_000_000_000;

    fn engine(cfg: ClusterConfig) -> ClusterEngine {
        ClusterEngine::new(cfg).unwrap()
    }

    fn scenario() -> Vec<StrikeEvent> {
        vec![
            StrikeEvent::new(0.0, 0.0, T),
            StrikeEvent::new(0.0, 0.001, T),
            StrikeEvent::new(10.0, 10.0, T),
        ]
    }

    #[test]
    fn test_rejects_invalid_config() {
        let cfg = ClusterConfig {
            proximity_radius_km: -1.0,
            ..ClusterConfig::default()
        };
        assert!(ClusterEngine::new(cfg).is_err());
    }

    #[test]
    fn test_keep_publishes_every_strike() {
        let snap = engine(ClusterConfig {
            proximity_radius_km: 5.0,
            merge_radius_km: 1.0,
            ..ClusterConfig::default()
        })
        .run(&scenario(), T)
        .unwrap();
        assert_eq!(snap.strikes.len(), 3);
        assert_eq!(snap.clusters.len(), 1);
        assert_eq!(snap.clusters[0].members, vec![0, 1]);
        assert_eq!(snap.stats.raw_clusters, 2);
        assert_eq!(snap.stats.excluded_clusters, 1);
        assert!(snap.mst_edges.is_empty());
    }

    #[test]
    fn test_drop_remaps_member_indices() {
        let strikes = vec![
            StrikeEvent::new(10.0, 10.0, T),
            StrikeEvent::new(0.0, 0.0, T),
            StrikeEvent::new(0.0, 0.001, T),
        ];
        let snap = engine(ClusterConfig {
            proximity_radius_km: 5.0,
            merge_radius_km: 1.0,
            undersized_strikes: UndersizedStrikes::Drop,
            ..ClusterConfig::default()
        })
        .run(&strikes, T)
        .unwrap();
        assert_eq!(snap.strikes.len(), 2);
        assert_eq!(snap.strikes[0].latitude, 0.0);
        assert_eq!(snap.clusters[0].id, 1);
        assert_eq!(snap.clusters[0].members, vec![0, 1]);
        for h in &snap.hotspots {
            assert!(h.strike_index < snap.strikes.len());
            assert_eq!(snap.strikes[h.strike_index].latitude, h.lat);
        }
    }

    #[test]
    fn test_min_size_one_publishes_singletons_with_mst() {
        let snap = engine(ClusterConfig {
            proximity_radius_km: 5.0,
            merge_radius_km: 1.0,
            min_cluster_size: 1,
            ..ClusterConfig::default()
        })
        .run(&scenario(), T)
        .unwrap();
        assert_eq!(snap.clusters.len(), 2);
        assert_eq!(snap.mst_edges.len(), 1);
        let w = snap.mst_edges[0].weight_km;
        assert_eq!(snap.clusters[0].mst_weight, Some(w));
        assert_eq!(snap.clusters[1].mst_weight, Some(w));
        assert_eq!(snap.systems, vec![vec![0], vec![1]]);
    }

    #[test]
    fn test_empty_input() {
        let snap = engine(ClusterConfig::default()).run(&[], T).unwrap();
        assert!(snap.strikes.is_empty());
        assert!(snap.clusters.is_empty());
        assert!(snap.mst_edges.is_empty());
        assert!(snap.hotspots.is_empty());
        assert_eq!(snap.generated_at_ms, T);
    }

    #[test]
    fn test_consistency_accepts_full_partition() {
        let clusters = vec![
            Cluster::singleton(0, 0, GeoPoint::new(1.0, 1.0)),
            Cluster::singleton(1, 1, GeoPoint::new(2.0, 2.0)),
        ];
        assert_eq!(check_consistency(&clusters, 2), Ok(()));
    }

    #[test]
    fn test_consistency_flags_count_mismatch() {
        let clusters = vec![Cluster::singleton(0, 0, GeoPoint::new(1.0, 1.0))];
        assert_eq!(
            check_consistency(&clusters, 3),
            Err(PipelineError::ClusterCountMismatch {
                assigned: 1,
                expected: 3,
            })
        );
    }

    #[test]
    fn test_consistency_flags_non_finite_center() {
        let clusters = vec![
            Cluster::singleton(0, 0, GeoPoint::new(1.0, 1.0)),
            Cluster::singleton(4, 1, GeoPoint::new(f64::NAN, 1.0)),
            Cluster::singleton(5, 2, GeoPoint::new(1.0, f64::INFINITY)),
        ];
        assert_eq!(
            check_consistency(&clusters, 3),
            Err(PipelineError::NonFiniteCenter { cluster_id: 4 })
        );
    }

    #[test]
    fn test_count_mismatch_is_checked_before_centers() {
        let clusters = vec![Cluster::singleton(7, 0, GeoPoint::new(f64::NAN, 0.0))];
        assert!(matches!(
            check_consistency(&clusters, 2),
            Err(PipelineError::ClusterCountMismatch { .. })
        ));
    }

    #[test]
    fn test_injected_fault_short_circuits_run() {
        let mut e = engine(ClusterConfig::default());
        e.injected_fault = Some(PipelineError::non_finite_center(9));
        assert_eq!(
            e.run(&scenario(), T),
            Err(PipelineError::NonFiniteCenter { cluster_id: 9 })
        );
    }

    #[test]
    fn test_index_remap() {
        assert_eq!(index_remap(&[false, true, false, true, true]), vec![0, 0, 1, 1, 2]);
    }
}

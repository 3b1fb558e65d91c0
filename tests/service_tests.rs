//! Concurrency behaviour of the clustering service.

use std::sync::Arc;
use std::time::Duration;

use strike_cluster::service::{unix_now_ms, RecomputeOutcome, StrikeClusterService};
use strike_cluster::{ClusterConfig, StrikeEvent};

fn fast_service() -> Arc<StrikeClusterService> {
    Arc::new(
        StrikeClusterService::new(ClusterConfig {
            recompute_interval_ms: 10,
            proximity_radius_km: 20.0,
            merge_radius_km: 10.0,
            ..ClusterConfig::default()
        })
        .unwrap(),
    )
}

async fn wait_for<F: Fn() -> bool>(cond: F) -> bool {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while tokio::time::Instant::now() < deadline {
        if cond() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    cond()
}

mod lifecycle {
    use super::*;

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn loop_picks_up_strikes_ingested_after_start() {
        let svc = fast_service();
        let handle = svc.start();

        let now = unix_now_ms();
        svc.ingest(StrikeEvent::new(30.0, -90.0, now)).unwrap();
        svc.ingest(StrikeEvent::new(30.0, -90.05, now)).unwrap();

        assert!(wait_for(|| svc.snapshot().clusters.len() == 1).await);
        assert_eq!(svc.snapshot().clusters[0].count, 2);

        handle.stop().await;
    }

    #[tokio::test]
    async fn stop_ends_the_loop() {
        let svc = fast_service();
        let handle = svc.start();
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert!(!handle.is_finished());
        handle.stop().await;
    }

    #[tokio::test]
    async fn first_tick_publishes_immediately() {
        let svc = Arc::new(
            StrikeClusterService::new(ClusterConfig {
                recompute_interval_ms: 60_000,
                ..ClusterConfig::default()
            })
            .unwrap(),
        );
        svc.ingest(StrikeEvent::new(1.0, 1.0, unix_now_ms())).unwrap();
        let handle = svc.start();
        assert!(wait_for(|| svc.snapshot().strikes.len() == 1).await);
        handle.stop().await;
    }
}

mod concurrency {
    use super::*;

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_ingest_while_recomputing() {
        let svc = fast_service();
        let handle = svc.start();

        let mut writers = Vec::new();
        for w in 0..4 {
            let svc = Arc::clone(&svc);
            writers.push(tokio::spawn(async move {
                for i in 0..250 {
                    let lat = -40.0 + w as f64 * 20.0;
                    let lon = (i % 50) as f64 * 0.05;
                    svc.ingest(StrikeEvent::new(lat, lon, unix_now_ms())).unwrap();
                    if i % 50 == 0 {
                        tokio::task::yield_now().await;
                    }
                }
            }));
        }
        for w in writers {
            w.await.unwrap();
        }
        assert_eq!(svc.buffered(), 1000);

        assert!(wait_for(|| svc.snapshot().strikes.len() == 1000).await);
        let snap = svc.snapshot();
        let covered: usize = snap.clusters.iter().map(|c| c.count).sum();
        assert_eq!(covered, 1000);
        assert_eq!(snap.clusters.len(), 4);

        handle.stop().await;
    }

    #[test]
    fn readers_keep_a_consistent_snapshot_across_publishes() {
        let svc = fast_service();
        let now = unix_now_ms();
        svc.ingest_at(StrikeEvent::new(5.0, 5.0, now), now).unwrap();
        svc.ingest_at(StrikeEvent::new(5.0, 5.01, now), now).unwrap();
        svc.recompute_at(now);
        let held = svc.snapshot();

        svc.ingest_at(StrikeEvent::new(-5.0, -5.0, now), now).unwrap();
        svc.recompute_at(now);

        assert_eq!(held.strikes.len(), 2);
        assert_eq!(svc.snapshot().strikes.len(), 3);
        for c in &held.clusters {
            assert!(c.members.iter().all(|&m| m < held.strikes.len()));
        }
    }

    #[test]
    fn manual_recompute_from_many_threads_never_double_runs() {
        let svc = fast_service();
        let now = unix_now_ms();
        for i in 0..200 {
            svc.ingest_at(StrikeEvent::new(0.0, i as f64 * 0.01, now), now).unwrap();
        }
        let outcomes: Vec<RecomputeOutcome> = std::thread::scope(|s| {
            let handles: Vec<_> = (0..8).map(|_| s.spawn(|| svc.recompute_at(now))).collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });
        let published = outcomes
            .iter()
            .filter(|o| matches!(o, RecomputeOutcome::Published { .. }))
            .count();
        assert_eq!(published, 1);
        assert!(outcomes.iter().all(|o| matches!(
            o,
            RecomputeOutcome::Published { .. }
                | RecomputeOutcome::Unchanged
                | RecomputeOutcome::Skipped
        )));
    }
}

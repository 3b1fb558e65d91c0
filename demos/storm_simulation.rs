//! # Storm Front Simulation
//!
//! Drives three synthetic storms across a 30-minute window: a squall line
//! marching east over the plains, a stationary cell cluster over the coast and
//! a short-lived pop-up storm. Shows regions forming, nearby cells being
//! consolidated, storm systems splitting, and strikes aging out of the window.
//!
//! ```bash
//! cargo run --example storm_simulation
//! ```

use rand::prelude::*;
use rand_chacha::ChaCha8Rng;

use strike_cluster::service::{RecomputeOutcome, StrikeClusterService};
use strike_cluster::{ClusterConfig, Snapshot, StrikeEvent};

const START_MS: u64 = 1_760_000_000_000;
const MINUTE_MS: u64 = 60_000;

// ── Deterministic noise ──────────────────────────────────────────────────────

/// Uniform in [-spread, spread].
fn jitter(rng: &mut ChaCha8Rng, spread: f64) -> f64 {
    rng.gen_range(-spread..=spread)
}

// ── Storms ───────────────────────────────────────────────────────────────────

struct Storm {
    name: &'static str,
    lat: f64,
    lon: f64,
    /// Degrees of longitude per minute.
    drift: f64,
    spread_deg: f64,
    strikes_per_minute: usize,
    active: std::ops::Range<u64>,
}

fn storms() -> Vec<Storm> {
    vec![
        Storm {
            name: "squall line",
            lat: 38.0,
            lon: -100.0,
            drift: 0.03,
            spread_deg: 0.35,
            strikes_per_minute: 12,
            active: 0..30,
        },
        Storm {
            name: "coastal cells",
            lat: 29.5,
            lon: -94.5,
            drift: 0.0,
            spread_deg: 0.15,
            strikes_per_minute: 6,
            active: 0..30,
        },
        Storm {
            name: "pop-up",
            lat: 33.0,
            lon: -84.0,
            drift: 0.01,
            spread_deg: 0.05,
            strikes_per_minute: 4,
            active: 5..12,
        },
    ]
}

// ── Display helpers ──────────────────────────────────────────────────────────

fn bar(count: usize, max: usize) -> String {
    let filled = if max == 0 { 0 } else { (count * 20 + max / 2) / max };
    let empty = 20usize.saturating_sub(filled);
    format!("[{}{}] {:>4}", "█".repeat(filled), "░".repeat(empty), count)
}

fn report(minute: u64, snap: &Snapshot) {
    println!(
        "  t+{:>2} min  strikes {:>4} | raw {:>3} → merged {:>3} (-{} merges, {} too small) | systems {}",
        minute,
        snap.stats.total_strikes,
        snap.stats.raw_clusters,
        snap.stats.clusters,
        snap.stats.merges,
        snap.stats.excluded_clusters,
        snap.stats.systems,
    );
    let max = snap.clusters.iter().map(|c| c.count).max().unwrap_or(0);
    for c in snap.clusters.iter().take(6) {
        let spread = c
            .mst_weight
            .map(|w| format!("{w:>7.1} km"))
            .unwrap_or_else(|| "      —   ".to_string());
        println!(
            "      #{:<3} ({:>6.2}, {:>7.2})  {}  nearest {}",
            c.id,
            c.center.lat,
            c.center.lon,
            bar(c.count, max),
            spread
        );
    }
    if let Some(h) = snap.hotspots.first() {
        println!("      hotspot ({:.2}, {:.2}) density {}", h.lat, h.lon, h.density);
    }
    println!();
}

// ── Main ─────────────────────────────────────────────────────────────────────

fn main() {
    println!("╔══════════════════════════════════════════════════════════════════════╗");
    println!("║  Storm Front Simulation — 30 simulated minutes, 10-minute window     ║");
    println!("╚══════════════════════════════════════════════════════════════════════╝\n");

    let config = ClusterConfig {
        proximity_radius_km: 25.0,
        merge_radius_km: 40.0,
        min_cluster_size: 3,
        system_link_radius_km: 300.0,
        hotspot_count: 3,
        ..ClusterConfig::default()
    };
    let service = match StrikeClusterService::new(config) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("bad config: {e}");
            return;
        }
    };

    let storms = storms();
    let mut rng = ChaCha8Rng::seed_from_u64(0x5EED_CAFE_F00D_D00D);

    for minute in 0..30u64 {
        let now = START_MS + minute * MINUTE_MS;
        let mut batch = Vec::new();
        for s in &storms {
            if !s.active.contains(&minute) {
                continue;
            }
            let lon = s.lon + s.drift * minute as f64;
            for k in 0..s.strikes_per_minute {
                // Spread over the minute leading up to `now`.
                let t = now - (k as u64 * MINUTE_MS) / s.strikes_per_minute as u64;
                batch.push(StrikeEvent::new(
                    s.lat + jitter(&mut rng, s.spread_deg),
                    lon + jitter(&mut rng, s.spread_deg),
                    t,
                ));
            }
        }
        let ingest = service.ingest_batch_at(batch, now);

        let outcome = service.recompute_at(now);
        if minute % 5 == 4 {
            println!(
                "▶  minute {:>2}: +{} strikes ({} rejected), {}",
                minute + 1,
                ingest.accepted,
                ingest.rejected,
                match outcome {
                    RecomputeOutcome::Published { .. } => "published",
                    RecomputeOutcome::Unchanged => "unchanged",
                    RecomputeOutcome::Skipped => "skipped",
                    RecomputeOutcome::Failed(_) => "failed",
                }
            );
            report(minute + 1, &service.snapshot());
        }
    }

    println!("▶  Storm roster");
    for s in &storms {
        println!(
            "  {:<14} {:>3} strikes/min, active minutes {:>2}..{:<2}",
            s.name, s.strikes_per_minute, s.active.start, s.active.end
        );
    }

    // Let the window drain: every strike ages out.
    let drained = START_MS + 45 * MINUTE_MS;
    service.recompute_at(drained);
    let snap = service.snapshot();
    println!(
        "\n▶  t+45 min (no new strikes): {} strikes, {} clusters remain",
        snap.strikes.len(),
        snap.clusters.len()
    );
}

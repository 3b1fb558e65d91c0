//! `strike-clusterd`: live lightning clustering daemon.
//!
//! Buffers strikes posted over HTTP (and optionally read from stdin as feed
//! frames), reclusters them on a fixed interval and serves the latest snapshot
//! at `GET /api/lightning`.
//!
//! ```bash
//! STRIKE_PROXIMITY_RADIUS_KM=30 strike-clusterd --port 8080
//! feed-bridge | strike-clusterd --feed-stdin
//! ```

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use strike_cluster::config::{ClusterConfig, UndersizedStrikes};
use strike_cluster::feed::FeedReader;
use strike_cluster::http::router;
use strike_cluster::service::StrikeClusterService;

#[derive(Parser, Debug)]
#[command(name = "strike-clusterd", version, about = "Live lightning-strike clustering server")]
struct Args {
    /// Address to bind
    #[arg(long, env = "LIGHTNING_HOST", default_value = "0.0.0.0")]
    host: String,

    /// HTTP port for the snapshot API
    #[arg(long, env = "LIGHTNING_PORT", default_value = "8080")]
    port: u16,

    /// Strikes this close (km) are connected
    #[arg(long, env = "STRIKE_PROXIMITY_RADIUS_KM", default_value = "50")]
    proximity_radius_km: f64,

    /// Clusters whose centers are this close (km) are merged
    #[arg(long, env = "STRIKE_MERGE_RADIUS_KM", default_value = "25")]
    merge_radius_km: f64,

    /// Clusters with fewer strikes are not published
    #[arg(long, env = "STRIKE_MIN_CLUSTER_SIZE", default_value = "2")]
    min_cluster_size: usize,

    /// How long strikes are kept (ms)
    #[arg(long, env = "STRIKE_RETENTION_WINDOW_MS", default_value = "600000")]
    retention_window_ms: u64,

    /// Recompute cadence (ms)
    #[arg(long, env = "STRIKE_RECOMPUTE_INTERVAL_MS", default_value = "5000")]
    recompute_interval_ms: u64,

    /// Accepted clock skew for future timestamps (ms)
    #[arg(long, env = "STRIKE_MAX_FUTURE_SKEW_MS", default_value = "30000")]
    max_future_skew_ms: u64,

    /// Hard cap on buffered strikes
    #[arg(long, env = "STRIKE_MAX_BUFFERED", default_value = "50000")]
    max_buffered_strikes: usize,

    /// keep | drop strikes of unpublished clusters
    #[arg(long, env = "STRIKE_UNDERSIZED", default_value = "keep")]
    undersized_strikes: UndersizedStrikes,

    /// Number of hotspots to publish
    #[arg(long, env = "STRIKE_HOTSPOT_COUNT", default_value = "10")]
    hotspot_count: usize,

    /// MST edges longer than this (km) separate storm systems
    #[arg(long, env = "STRIKE_SYSTEM_LINK_RADIUS_KM", default_value = "100")]
    system_link_radius_km: f64,

    /// Read newline-delimited feed frames from stdin
    #[arg(long)]
    feed_stdin: bool,
}

impl Args {
    fn cluster_config(&self) -> ClusterConfig {
        ClusterConfig {
            proximity_radius_km: self.proximity_radius_km,
            merge_radius_km: self.merge_radius_km,
            min_cluster_size: self.min_cluster_size,
            retention_window_ms: self.retention_window_ms,
            recompute_interval_ms: self.recompute_interval_ms,
            max_future_skew_ms: self.max_future_skew_ms,
            max_buffered_strikes: self.max_buffered_strikes,
            undersized_strikes: self.undersized_strikes,
            hotspot_count: self.hotspot_count,
            system_link_radius_km: self.system_link_radius_km,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| "info,tower_http=debug".into()),
        )
        .init();

    let args = Args::parse();
    let service = Arc::new(
        StrikeClusterService::new(args.cluster_config())
            .context("invalid clustering configuration")?,
    );
    let handle = service.start();

    if args.feed_stdin {
        let mut reader = FeedReader::new(Arc::clone(&service));
        tokio::spawn(async move {
            let stdin = tokio::io::BufReader::new(tokio::io::stdin());
            match reader.run(stdin).await {
                Ok(stats) => tracing::info!(?stats, "stdin feed closed"),
                Err(e) => tracing::warn!(error = %e, "stdin feed failed"),
            }
        });
    }

    let addr: SocketAddr = format!("{}:{}", args.host, args.port)
        .parse()
        .with_context(|| format!("invalid bind address {}:{}", args.host, args.port))?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    tracing::info!(%addr, "serving lightning snapshots");

    axum::serve(listener, router(Arc::clone(&service)))
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::warn!(error = %e, "failed to listen for ctrl-c");
            }
            tracing::info!("shutdown signal received");
        })
        .await
        .context("http server failed")?;

    handle.stop().await;
    Ok(())
}

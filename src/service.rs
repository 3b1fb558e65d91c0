//! Long-running clustering service: buffer, recompute loop, published snapshot.
//!
//! Ingestion and recomputation never wait on each other for longer than a
//! buffer append or copy:
//!
//! ```text
//! ingest ──► Mutex<StrikeBuffer> ──copy──► ClusterEngine::run ──► SnapshotPublisher
//!            (append / evict)       (no lock held, blocking pool)     (Arc swap)
//! ```
//!
//! The loop ticks every `recompute_interval_ms` with missed ticks skipped, so a
//! slow cycle delays the next one instead of queueing a backlog. A cycle that
//! starts while another is still running returns [`RecomputeOutcome::Skipped`].

use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use parking_lot::Mutex;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use crate::buffer::{StrikeBuffer, StrikeEvent};
use crate::config::ClusterConfig;
use crate::error::{ConfigError, PipelineError, StrikeError};
use crate::pipeline::ClusterEngine;
use crate::snapshot::{Snapshot, SnapshotPublisher};

/// Current wall-clock time in ms since the Unix epoch.
pub fn unix_now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// Counts from one batch ingest.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct IngestReport {
    /// Strikes admitted to the buffer.
    pub accepted: usize,
    /// Strikes that failed validation.
    pub rejected: usize,
}

/// What a recompute request did.
#[derive(Clone, Debug, PartialEq)]
pub enum RecomputeOutcome {
    /// A new snapshot was published.
    Published {
        /// Strikes in the new snapshot.
        strikes: usize,
        /// Clusters in the new snapshot.
        clusters: usize,
    },
    /// Buffer unchanged since the last publish; nothing to do.
    Unchanged,
    /// Another cycle was already running.
    Skipped,
    /// The pipeline failed; the previous snapshot stays published.
    Failed(PipelineError),
}

/// Shared clustering service. Wrap in an `Arc` to ingest from several tasks.
#[derive(Debug)]
pub struct StrikeClusterService {
    engine: ClusterEngine,
    buffer: Mutex<StrikeBuffer>,
    publisher: SnapshotPublisher,
    in_flight: Mutex<()>,
}

impl StrikeClusterService {
    /// Validate `config` and create an idle service with an empty buffer.
    pub fn new(config: ClusterConfig) -> Result<Self, ConfigError> {
        let buffer = StrikeBuffer::new(&config);
        let engine = ClusterEngine::new(config)?;
        Ok(Self {
            engine,
            buffer: Mutex::new(buffer),
            publisher: SnapshotPublisher::new(),
            in_flight: Mutex::new(()),
        })
    }

    /// Active configuration.
    pub fn config(&self) -> &ClusterConfig {
        self.engine.config()
    }

    /// Validate and buffer one strike against the current clock.
    pub fn ingest(&self, event: StrikeEvent) -> Result<(), StrikeError> {
        self.ingest_at(event, unix_now_ms())
    }

    /// Validate and buffer one strike against `now_ms`.
    pub fn ingest_at(&self, event: StrikeEvent, now_ms: u64) -> Result<(), StrikeError> {
        let result = self.buffer.lock().ingest(event, now_ms);
        if let Err(e) = &result {
            tracing::warn!(error = %e, "strike rejected");
        }
        result
    }

    /// Buffer a batch of strikes under one lock. Invalid strikes are skipped.
    pub fn ingest_batch<I>(&self, events: I) -> IngestReport
    where
        I: IntoIterator<Item = StrikeEvent>,
    {
        self.ingest_batch_at(events, unix_now_ms())
    }

    /// [`Self::ingest_batch`] against an explicit clock.
    pub fn ingest_batch_at<I>(&self, events: I, now_ms: u64) -> IngestReport
    where
        I: IntoIterator<Item = StrikeEvent>,
    {
        let mut report = IngestReport::default();
        let mut buf = self.buffer.lock();
        for event in events {
            match buf.ingest(event, now_ms) {
                Ok(()) => report.accepted += 1,
                Err(e) => {
                    report.rejected += 1;
                    tracing::warn!(error = %e, "strike rejected");
                }
            }
        }
        report
    }

    /// Run one cycle against the current clock.
    pub fn recompute(&self) -> RecomputeOutcome {
        self.recompute_at(unix_now_ms())
    }

    /// Evict expired strikes, then recluster and publish if anything changed.
    pub fn recompute_at(&self, now_ms: u64) -> RecomputeOutcome {
        let Some(_cycle) = self.in_flight.try_lock() else {
            tracing::debug!("recompute already in flight; skipping");
            return RecomputeOutcome::Skipped;
        };

        let strikes = {
            let mut buf = self.buffer.lock();
            let evicted = buf.evict_expired(now_ms);
            if evicted > 0 {
                tracing::debug!(evicted, remaining = buf.len(), "expired strikes evicted");
            }
            if !buf.is_dirty() && self.publisher.has_published() {
                return RecomputeOutcome::Unchanged;
            }
            buf.clear_dirty();
            buf.snapshot_strikes()
        };

        match self.engine.run(&strikes, now_ms) {
            Ok(snapshot) => {
                let outcome = RecomputeOutcome::Published {
                    strikes: snapshot.strikes.len(),
                    clusters: snapshot.clusters.len(),
                };
                tracing::info!(
                    strikes = snapshot.strikes.len(),
                    clusters = snapshot.clusters.len(),
                    merges = snapshot.stats.merges,
                    "snapshot published"
                );
                self.publisher.publish(snapshot);
                outcome
            }
            Err(e) => {
                tracing::warn!(error = %e, "recompute failed; keeping previous snapshot");
                self.buffer.lock().mark_dirty();
                RecomputeOutcome::Failed(e)
            }
        }
    }

    /// The most recently published snapshot.
    pub fn snapshot(&self) -> Arc<Snapshot> {
        self.publisher.latest()
    }

    /// Number of strikes currently buffered.
    pub fn buffered(&self) -> usize {
        self.buffer.lock().len()
    }

    /// Spawn the periodic recompute loop on the current tokio runtime.
    pub fn start(self: &Arc<Self>) -> ServiceHandle {
        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let task = tokio::spawn(run_recompute_loop(Arc::clone(self), shutdown_rx));
        ServiceHandle {
            shutdown: Some(shutdown_tx),
            task,
        }
    }
}

/// Drive `service.recompute()` on its configured interval until `shutdown` fires.
///
/// Each cycle runs on the blocking pool. The first tick fires immediately.
pub async fn run_recompute_loop(
    service: Arc<StrikeClusterService>,
    mut shutdown: oneshot::Receiver<()>,
) {
    let period = service.config().recompute_interval();
    tracing::info!(interval = ?period, "recompute loop starting");

    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = interval.tick() => {
                let svc = Arc::clone(&service);
                match tokio::task::spawn_blocking(move || svc.recompute()).await {
                    Ok(outcome) => tracing::debug!(?outcome, "recompute cycle finished"),
                    Err(e) => tracing::warn!(error = %e, "recompute task panicked"),
                }
            }
            _ = &mut shutdown => {
                tracing::info!("recompute loop shutting down");
                break;
            }
        }
    }
}

/// Handle to a running recompute loop.
#[derive(Debug)]
pub struct ServiceHandle {
    shutdown: Option<oneshot::Sender<()>>,
    task: JoinHandle<()>,
}

impl ServiceHandle {
    /// Signal the loop to stop and wait for it to finish.
    pub async fn stop(mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        if let Err(e) = self.task.await {
            tracing::warn!(error = %e, "recompute loop ended abnormally");
        }
    }

    /// True once the loop task has exited.
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

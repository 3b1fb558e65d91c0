//! # strike-cluster
//!
//! Live lightning-strike clustering for map displays.
//!
//! ---
//!
//! ## What it does
//!
//! A feed delivers geolocated strikes at an unpredictable rate. The crate keeps
//! the last few minutes of them and, every few seconds, turns that window into
//! a map-ready snapshot:
//!
//! **Regions**: strikes closer than the proximity radius are linked, and each
//! connected group becomes one raw cluster. Chains of strikes form one region
//! even when their ends are far apart.
//!
//! **Consolidation**: raw clusters whose centers fall within the merge radius
//! are fused, closest pair first, until no pair qualifies.
//!
//! **Spread**: a minimum spanning tree over the cluster centers gives each
//! cluster its distance to the nearest neighbouring cluster and, cut at the
//! system link radius, groups clusters into storm systems.
//!
//! ---
//!
//! ## The pipeline
//!
//! ```text
//! feed ─► StrikeBuffer ─► GridIndex ─► detect_components ─► consolidate ─► MinimumSpanningTree
//!          (window)       (proximity)      (BFS)            (greedy merge)       (Prim)
//!                                                                                   │
//!                                              SnapshotPublisher ◄── Snapshot ◄─────┘
//! ```
//!
//! ## Module overview
//!
//! | Module | Key types | What it does |
//! |--------|-----------|--------------|
//! | [`geo`] | [`GeoPoint`], [`Centroid`] | Haversine distance and spherical centroids |
//! | [`buffer`] | [`StrikeEvent`], [`StrikeBuffer`] | Validated, time-windowed strike storage |
//! | [`proximity`] | [`GridIndex`], [`NeighborQuery`] | Implicit proximity graph via a lat/lon grid |
//! | [`clustering`] | [`Cluster`], [`detect_components`], [`consolidate`] | BFS regions and greedy merge |
//! | [`mst`] | [`MinimumSpanningTree`], [`MstEdge`] | Prim over cluster centers, storm systems |
//! | [`hotspot`] | [`Hotspot`] | Densest individual strikes |
//! | [`snapshot`] | [`Snapshot`], [`SnapshotPublisher`] | Immutable result and atomic swap |
//! | [`pipeline`] | [`ClusterEngine`] | One full recompute over a strike slice |
//! | [`service`] | [`StrikeClusterService`] | Ingestion, recompute loop, current snapshot |
//! | [`feed`] | [`feed::FeedReader`] | Plain and obfuscated feed frames (requires `serde`) |
//! | [`http`] | [`http::router`] | axum routes for map clients (requires `server`) |
//!
//! ## Features
//!
//! - `serde` (default): JSON snapshots and feed decoding.
//! - `server`: HTTP router and the `strike-clusterd` binary.
//! - `python-ffi`: PyO3 bindings.
//!
//! ## Quick start
//!
//! ```rust
//! use strike_cluster::{ClusterConfig, ClusterEngine, StrikeEvent};
//!
//! let engine = ClusterEngine::new(ClusterConfig {
//!     proximity_radius_km: 5.0,
//!     merge_radius_km: 1.0,
//!     min_cluster_size: 1,
//!     ..ClusterConfig::default()
//! })
//! .unwrap();
//!
//! let strikes = [
//!     StrikeEvent::new(0.0, 0.0, 0),
//!     StrikeEvent::new(0.0, 0.001, 0),
//!     StrikeEvent::new(10.0, 10.0, 0),
//! ];
//! let snapshot = engine.run(&strikes, 0).unwrap();
//! assert_eq!(snapshot.clusters.len(), 2);
//! assert_eq!(snapshot.mst_edges.len(), 1);
//! ```

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![cfg_attr(docsrs, feature(doc_cfg))]

pub mod buffer;
pub mod clustering;
pub mod config;
pub mod error;
pub mod geo;
pub mod hotspot;
pub mod mst;
pub mod pipeline;
pub mod proximity;
pub mod service;
pub mod snapshot;

#[cfg(feature = "serde")]
pub mod feed;

#[cfg(feature = "server")]
pub mod http;

#[cfg(feature = "python-ffi")]
pub mod ffi;

pub use buffer::{StrikeBuffer, StrikeEvent};
pub use clustering::{consolidate, detect_components, Cluster, Consolidation};
pub use config::{ClusterConfig, UndersizedStrikes};
pub use error::{ConfigError, PipelineError, StrikeError};
pub use geo::{haversine_km, Centroid, GeoPoint};
pub use hotspot::Hotspot;
pub use mst::{MinimumSpanningTree, MstEdge};
pub use pipeline::ClusterEngine;
pub use proximity::{GridIndex, NeighborQuery};
pub use service::{RecomputeOutcome, StrikeClusterService};
pub use snapshot::{ClusterSummary, Snapshot, SnapshotPublisher, SnapshotStats};

#[cfg(feature = "serde")]
pub use error::FeedError;

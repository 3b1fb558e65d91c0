//! Python FFI bindings via PyO3.
//!
//! Exposes one-shot clustering to Python: hand in a list of strikes, get the
//! snapshot JSON back. The background service and HTTP surface stay on the
//! Rust side.
//!
//! # Building the Python extension
//!
//! ```bash
//! pip install maturin
//! maturin develop --features python-ffi
//! ```
//!
//! # Usage
//!
//! ```python
//! import json
//! from strike_cluster import ClusterConfig, StrikeClusterer
//!
//! config = ClusterConfig(proximity_radius_km=5.0, merge_radius_km=1.0, min_cluster_size=1)
//! clusterer = StrikeClusterer(config)
//!
//! # (lat, lon, time_ms)
//! strikes = [(0.0, 0.0, 0), (0.0, 0.001, 0), (10.0, 10.0, 0)]
//! snapshot = json.loads(clusterer.cluster(strikes, generated_at_ms=0))
//! print(len(snapshot["clusters"]))   # 2
//! print(snapshot["mstEdges"][0])     # {'from': 0, 'to': 1, 'weight': 1568.5...}
//! ```

use pyo3::exceptions::{PyRuntimeError, PyValueError};
use pyo3::prelude::*;

use crate::buffer::StrikeEvent;
use crate::config::{ClusterConfig as RustClusterConfig, UndersizedStrikes};
use crate::pipeline::ClusterEngine;

// ── ClusterConfig ────────────────────────────────────────────────────────────

/// Clustering parameters. Distances in kilometres.
///
/// Args:
///     proximity_radius_km:   strikes this close are connected (default 50)
///     merge_radius_km:       clusters with centers this close merge (default 25)
///     min_cluster_size:      smaller clusters are not published (default 2)
///     undersized_strikes:    "keep" or "drop" strikes of unpublished clusters
///     hotspot_count:         densest strikes to report (default 10)
///     system_link_radius_km: MST edges longer than this split storm systems (default 100)
#[pyclass(name = "ClusterConfig")]
#[derive(Clone)]
pub struct PyClusterConfig {
    inner: RustClusterConfig,
}

#[pymethods]
impl PyClusterConfig {
    /// Build a config; raises `ValueError` on out-of-range values.
    #[new]
    #[pyo3(signature = (
        proximity_radius_km=50.0,
        merge_radius_km=25.0,
        min_cluster_size=2,
        undersized_strikes="keep",
        hotspot_count=10,
        system_link_radius_km=100.0
    ))]
    pub fn new(
        proximity_radius_km: f64,
        merge_radius_km: f64,
        min_cluster_size: usize,
        undersized_strikes: &str,
        hotspot_count: usize,
        system_link_radius_km: f64,
    ) -> PyResult<Self> {
        let undersized_strikes: UndersizedStrikes = undersized_strikes
            .parse()
            .map_err(|e: crate::error::ConfigError| PyValueError::new_err(e.to_string()))?;
        let inner = RustClusterConfig {
            proximity_radius_km,
            merge_radius_km,
            min_cluster_size,
            undersized_strikes,
            hotspot_count,
            system_link_radius_km,
            ..RustClusterConfig::default()
        };
        inner
            .validate()
            .map_err(|e| PyValueError::new_err(e.to_string()))?;
        Ok(Self { inner })
    }

    /// Proximity radius in km.
    #[getter]
    pub fn proximity_radius_km(&self) -> f64 {
        self.inner.proximity_radius_km
    }

    /// Merge radius in km.
    #[getter]
    pub fn merge_radius_km(&self) -> f64 {
        self.inner.merge_radius_km
    }

    /// Minimum published cluster size.
    #[getter]
    pub fn min_cluster_size(&self) -> usize {
        self.inner.min_cluster_size
    }

    /// Python repr string.
    pub fn __repr__(&self) -> String {
        format!(
            "ClusterConfig(proximity_radius_km={}, merge_radius_km={}, min_cluster_size={})",
            self.inner.proximity_radius_km, self.inner.merge_radius_km, self.inner.min_cluster_size
        )
    }
}

// ── StrikeClusterer ──────────────────────────────────────────────────────────

/// Runs the clustering pipeline over caller-supplied strikes.
#[pyclass(name = "StrikeClusterer")]
pub struct PyStrikeClusterer {
    engine: ClusterEngine,
}

#[pymethods]
impl PyStrikeClusterer {
    /// Create a clusterer; defaults apply when `config` is omitted.
    #[new]
    #[pyo3(signature = (config=None))]
    pub fn new(config: Option<PyClusterConfig>) -> PyResult<Self> {
        let config = config.map(|c| c.inner).unwrap_or_default();
        let engine = ClusterEngine::new(config).map_err(|e| PyValueError::new_err(e.to_string()))?;
        Ok(Self { engine })
    }

    /// Cluster `(lat, lon, time_ms)` tuples and return the snapshot as JSON.
    ///
    /// Raises `ValueError` for out-of-range coordinates.
    #[pyo3(signature = (strikes, generated_at_ms=0))]
    pub fn cluster(&self, strikes: Vec<(f64, f64, u64)>, generated_at_ms: u64) -> PyResult<String> {
        let events: Vec<StrikeEvent> = strikes
            .into_iter()
            .map(|(lat, lon, t)| StrikeEvent::new(lat, lon, t))
            .collect();
        for e in &events {
            e.validate_coordinates()
                .map_err(|err| PyValueError::new_err(err.to_string()))?;
        }
        let snapshot = self
            .engine
            .run(&events, generated_at_ms)
            .map_err(|e| PyRuntimeError::new_err(e.to_string()))?;
        snapshot
            .to_json()
            .map_err(|e| PyRuntimeError::new_err(e.to_string()))
    }

    /// Python repr string.
    pub fn __repr__(&self) -> String {
        format!(
            "StrikeClusterer(proximity_radius_km={}, merge_radius_km={})",
            self.engine.config().proximity_radius_km,
            self.engine.config().merge_radius_km
        )
    }
}

// ── Module entry point ────────────────────────────────────────────────────────

/// Lightning-strike clustering: BFS regions, greedy merge, MST over centers.
#[pymodule]
pub fn strike_cluster(m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add_class::<PyClusterConfig>()?;
    m.add_class::<PyStrikeClusterer>()?;
    m.add("__version__", env!("CARGO_PKG_VERSION"))?;
    Ok(())
}

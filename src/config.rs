//! Engine and service configuration.

use core::time::Duration;

use crate::error::ConfigError;

/// What happens to the strikes of clusters smaller than `min_cluster_size`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum UndersizedStrikes {
    /// Keep them in the published strike list (they just belong to no cluster).
    #[default]
    Keep,
    /// Drop them from the published strike list as well.
    Drop,
}

impl core::str::FromStr for UndersizedStrikes {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "keep" => Ok(Self::Keep),
            "drop" => Ok(Self::Drop),
            other => Err(ConfigError::invalid(
                "undersized_strikes",
                format!("expected `keep` or `drop`, got `{other}`"),
            )),
        }
    }
}

/// Configuration for the clustering engine and the service around it.
///
/// All distances are kilometres, all durations milliseconds.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default, rename_all = "camelCase"))]
pub struct ClusterConfig {
    /// Two strikes closer than this are directly connected.  Default: 50 km.
    pub proximity_radius_km: f64,

    /// Raw clusters whose centers are closer than this are merged.  Default: 25 km.
    pub merge_radius_km: f64,

    /// Consolidated clusters with fewer members are excluded from output.  Default: 2.
    pub min_cluster_size: usize,

    /// Strikes older than `now - retention_window_ms` are evicted.  Default: 10 min.
    pub retention_window_ms: u64,

    /// Cadence of the background recompute loop.  Default: 5 s.
    pub recompute_interval_ms: u64,

    /// How far ahead of the local clock a strike timestamp may be.  Default: 30 s.
    pub max_future_skew_ms: u64,

    /// Hard cap on buffered strikes; the oldest-inserted strike is dropped first.
    /// Default: 50 000.
    pub max_buffered_strikes: usize,

    /// Fate of strikes belonging to excluded clusters.  Default: keep.
    pub undersized_strikes: UndersizedStrikes,

    /// Number of densest strikes published as hotspots.  Default: 10.
    pub hotspot_count: usize,

    /// MST edges longer than this separate storm systems.  Default: 100 km.
    pub system_link_radius_km: f64,
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            proximity_radius_km: 50.0,
            merge_radius_km: 25.0,
            min_cluster_size: 2,
            retention_window_ms: 10 * 60 * 1000,
            recompute_interval_ms: 5_000,
            max_future_skew_ms: 30_000,
            max_buffered_strikes: 50_000,
            undersized_strikes: UndersizedStrikes::Keep,
            hotspot_count: 10,
            system_link_radius_km: 100.0,
        }
    }
}

impl ClusterConfig {
    /// Check every field against its permitted range.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.proximity_radius_km.is_finite() && self.proximity_radius_km > 0.0) {
            return Err(ConfigError::invalid(
                "proximity_radius_km",
                format!("must be finite and > 0, got {}", self.proximity_radius_km),
            ));
        }
        if !(self.merge_radius_km.is_finite() && self.merge_radius_km >= 0.0) {
            return Err(ConfigError::invalid(
                "merge_radius_km",
                format!("must be finite and >= 0, got {}", self.merge_radius_km),
            ));
        }
        if self.min_cluster_size == 0 {
            return Err(ConfigError::invalid("min_cluster_size", "must be at least 1"));
        }
        if self.retention_window_ms == 0 {
            return Err(ConfigError::invalid("retention_window_ms", "must be > 0"));
        }
        if self.recompute_interval_ms == 0 {
            return Err(ConfigError::invalid("recompute_interval_ms", "must be > 0"));
        }
        if self.max_buffered_strikes == 0 {
            return Err(ConfigError::invalid("max_buffered_strikes", "must be at least 1"));
        }
        if !(self.system_link_radius_km.is_finite() && self.system_link_radius_km >= 0.0) {
            return Err(ConfigError::invalid(
                "system_link_radius_km",
                format!("must be finite and >= 0, got {}", self.system_link_radius_km),
            ));
        }
        Ok(())
    }

    /// Retention window as a [`Duration`].
    pub fn retention_window(&self) -> Duration {
        Duration::from_millis(self.retention_window_ms)
    }

    /// Recompute interval as a [`Duration`].
    pub fn recompute_interval(&self) -> Duration {
        Duration::from_millis(self.recompute_interval_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        assert_eq!(ClusterConfig::default().validate(), Ok(()));
    }

    #[test]
    fn test_rejects_non_positive_proximity() {
        let cfg = ClusterConfig {
            proximity_radius_km: 0.0,
            ..ClusterConfig::default()
        };
        assert!(matches!(
            cfg.validate(),
            Err(ConfigError::InvalidParameter { name: "proximity_radius_km", .. })
        ));

        let cfg = ClusterConfig {
            proximity_radius_km: f64::NAN,
            ..ClusterConfig::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_zero_merge_radius_is_allowed() {
        let cfg = ClusterConfig {
            merge_radius_km: 0.0,
            ..ClusterConfig::default()
        };
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn test_rejects_zero_min_cluster_size() {
        let cfg = ClusterConfig {
            min_cluster_size: 0,
            ..ClusterConfig::default()
        };
        assert!(matches!(
            cfg.validate(),
            Err(ConfigError::InvalidParameter { name: "min_cluster_size", .. })
        ));
    }

    #[test]
    fn test_undersized_strikes_from_str() {
        assert_eq!("keep".parse::<UndersizedStrikes>(), Ok(UndersizedStrikes::Keep));
        assert_eq!("DROP".parse::<UndersizedStrikes>(), Ok(UndersizedStrikes::Drop));
        assert!("maybe".parse::<UndersizedStrikes>().is_err());
    }

    #[test]
    fn test_durations() {
        let cfg = ClusterConfig::default();
        assert_eq!(cfg.retention_window(), Duration::from_secs(600));
        assert_eq!(cfg.recompute_interval(), Duration::from_secs(5));
    }
}

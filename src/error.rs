//! Error types for strike ingestion, configuration, feed decoding and the
//! clustering pipeline.
//!
//! None of these are fatal to a running service: rejected strikes are dropped
//! and logged, failed recompute cycles leave the previous snapshot published.

use thiserror::Error;

/// A strike event failed validation and was not admitted to the buffer.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum StrikeError {
    /// Latitude is not finite or lies outside [-90, 90].
    #[error("invalid strike: latitude {0} outside [-90, 90]")]
    LatitudeOutOfRange(f64),

    /// Longitude is not finite or lies outside [-180, 180].
    #[error("invalid strike: longitude {0} outside [-180, 180]")]
    LongitudeOutOfRange(f64),

    /// Timestamp lies further in the future than the configured clock skew allows.
    #[error("invalid strike: timestamp {timestamp_ms} ms is ahead of now ({now_ms} ms) by more than {max_skew_ms} ms")]
    FutureTimestamp {
        /// Offending timestamp (ms since Unix epoch).
        timestamp_ms: u64,
        /// Reference time used for validation.
        now_ms: u64,
        /// Configured tolerance.
        max_skew_ms: u64,
    },

    /// Timestamp is already outside the retention window.
    #[error("invalid strike: timestamp {timestamp_ms} ms is older than retention cutoff {cutoff_ms} ms")]
    StaleTimestamp {
        /// Offending timestamp (ms since Unix epoch).
        timestamp_ms: u64,
        /// Oldest timestamp the buffer still accepts.
        cutoff_ms: u64,
    },
}

/// A configuration value is out of its permitted range.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    /// Named parameter failed validation.
    #[error("invalid parameter `{name}`: {reason}")]
    InvalidParameter {
        /// Field name as it appears in [`crate::config::ClusterConfig`].
        name: &'static str,
        /// Human-readable explanation.
        reason: String,
    },
}

impl ConfigError {
    /// Create an `InvalidParameter` error.
    pub fn invalid(name: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidParameter {
            name,
            reason: reason.into(),
        }
    }
}

/// A recompute cycle could not produce a consistent snapshot.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PipelineError {
    /// A cluster centroid evaluated to NaN or infinity.
    #[error("cluster {cluster_id} has a non-finite center")]
    NonFiniteCenter {
        /// Id of the offending cluster.
        cluster_id: u32,
    },

    /// Member counts after consolidation disagree with the detected components.
    #[error("cluster membership mismatch: {assigned} strikes assigned, {expected} expected")]
    ClusterCountMismatch {
        /// Strikes covered by consolidated clusters.
        assigned: usize,
        /// Strikes covered by raw components.
        expected: usize,
    },
}

/// A feed frame could not be turned into strike events.
#[cfg(feature = "serde")]
#[derive(Debug, Error)]
pub enum FeedError {
    /// Neither plain JSON nor the de-obfuscated form parsed.
    #[error("undecodable feed frame: {0}")]
    Decode(String),

    /// The frame parsed but carries no `lat`/`lon` pair.
    #[error("feed frame has no strike coordinates")]
    MissingCoordinates,

    /// Reading from the feed stream failed.
    #[error("feed read error: {0}")]
    Io(#[from] std::io::Error),
}

impl PipelineError {
    /// Create a `NonFiniteCenter` error.
    pub fn non_finite_center(cluster_id: u32) -> Self {
        Self::NonFiniteCenter { cluster_id }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages_carry_values() {
        let e = StrikeError::LatitudeOutOfRange(91.5);
        assert!(e.to_string().contains("91.5"));

        let e = StrikeError::FutureTimestamp {
            timestamp_ms: 10_000,
            now_ms: 1_000,
            max_skew_ms: 500,
        };
        let msg = e.to_string();
        assert!(msg.contains("10000") && msg.contains("500"), "{msg}");

        let e = ConfigError::invalid("min_cluster_size", "must be at least 1");
        assert_eq!(
            e.to_string(),
            "invalid parameter `min_cluster_size`: must be at least 1"
        );

        let e = PipelineError::non_finite_center(7);
        assert_eq!(e.to_string(), "cluster 7 has a non-finite center");

        let e = PipelineError::ClusterCountMismatch {
            assigned: 3,
            expected: 4,
        };
        assert!(e.to_string().contains("3 strikes assigned, 4 expected"));
    }
}

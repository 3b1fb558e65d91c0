//! Strike events and the time-windowed strike buffer.
//!
//! The buffer is the only mutable state on the ingestion path. It is a plain
//! single-owner structure; the service wraps it in a mutex and holds that lock
//! only for an append, an eviction pass or a copy.
//!
//! # Invariants
//!
//! - Strikes are kept in insertion order; a strike's identity is its position.
//! - After `evict_older_than(cutoff)` no strike with `timestamp_ms < cutoff` remains.
//! - `len() <= capacity` at all times: ingest drops the oldest-inserted strike
//!   when full.
//! - Every successful ingest and every non-empty eviction marks the buffer dirty.

use std::collections::VecDeque;

use crate::config::ClusterConfig;
use crate::error::StrikeError;
use crate::geo::GeoPoint;

// ─── StrikeEvent ─────────────────────────────────────────────────────────────

/// A single recorded lightning discharge.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct StrikeEvent {
    /// Latitude in decimal degrees.
    #[cfg_attr(feature = "serde", serde(rename = "lat"))]
    pub latitude: f64,
    /// Longitude in decimal degrees.
    #[cfg_attr(feature = "serde", serde(rename = "lon"))]
    pub longitude: f64,
    /// Milliseconds since the Unix epoch.
    #[cfg_attr(feature = "serde", serde(rename = "time"))]
    pub timestamp_ms: u64,
    /// Relative discharge strength as reported by the feed; 1.0 when unknown.
    #[cfg_attr(feature = "serde", serde(default = "default_intensity"))]
    pub intensity: f64,
}

/// Intensity assumed for strikes whose source reports none.
pub const DEFAULT_INTENSITY: f64 = 1.0;

#[cfg(feature = "serde")]
fn default_intensity() -> f64 {
    DEFAULT_INTENSITY
}

impl StrikeEvent {
    /// Construct an event with the default intensity. Range checks happen at ingest.
    pub const fn new(latitude: f64, longitude: f64, timestamp_ms: u64) -> Self {
        Self {
            latitude,
            longitude,
            timestamp_ms,
            intensity: DEFAULT_INTENSITY,
        }
    }

    /// Same event with `intensity` attached.
    pub const fn with_intensity(mut self, intensity: f64) -> Self {
        self.intensity = intensity;
        self
    }

    /// Position of the strike.
    pub fn position(&self) -> GeoPoint {
        GeoPoint::new(self.latitude, self.longitude)
    }

    /// Check latitude and longitude ranges.
    pub fn validate_coordinates(&self) -> Result<(), StrikeError> {
        if !(self.latitude.is_finite() && (-90.0..=90.0).contains(&self.latitude)) {
            return Err(StrikeError::LatitudeOutOfRange(self.latitude));
        }
        if !(self.longitude.is_finite() && (-180.0..=180.0).contains(&self.longitude)) {
            return Err(StrikeError::LongitudeOutOfRange(self.longitude));
        }
        Ok(())
    }
}

// ─── StrikeBuffer ────────────────────────────────────────────────────────────

/// Bounded, time-windowed collection of recent strikes.
#[derive(Clone, Debug)]
pub struct StrikeBuffer {
    events: VecDeque<StrikeEvent>,
    retention_window_ms: u64,
    max_future_skew_ms: u64,
    capacity: usize,
    dirty: bool,
    generation: u64,
    rejected: u64,
    overflowed: u64,
}

impl StrikeBuffer {
    /// Create an empty buffer using the limits in `config`.
    pub fn new(config: &ClusterConfig) -> Self {
        Self::with_limits(
            config.retention_window_ms,
            config.max_future_skew_ms,
            config.max_buffered_strikes,
        )
    }

    /// Create an empty buffer with explicit limits.
    pub fn with_limits(retention_window_ms: u64, max_future_skew_ms: u64, capacity: usize) -> Self {
        Self {
            events: VecDeque::new(),
            retention_window_ms,
            max_future_skew_ms,
            capacity: capacity.max(1),
            dirty: false,
            generation: 0,
            rejected: 0,
            overflowed: 0,
        }
    }

    /// Validate and append a strike.
    ///
    /// `now_ms` is the reference clock. Rejected when the coordinates are out
    /// of range, when the timestamp is ahead of `now_ms` by more than the skew
    /// tolerance, or when it is already older than the retention window (a
    /// late, out-of-order delivery that would be evicted immediately).
    pub fn ingest(&mut self, event: StrikeEvent, now_ms: u64) -> Result<(), StrikeError> {
        if let Err(e) = self.check(&event, now_ms) {
            self.rejected += 1;
            return Err(e);
        }
        if self.events.len() >= self.capacity {
            self.events.pop_front();
            self.overflowed += 1;
        }
        self.events.push_back(event);
        self.mark_dirty();
        Ok(())
    }

    fn check(&self, event: &StrikeEvent, now_ms: u64) -> Result<(), StrikeError> {
        event.validate_coordinates()?;
        if event.timestamp_ms > now_ms.saturating_add(self.max_future_skew_ms) {
            return Err(StrikeError::FutureTimestamp {
                timestamp_ms: event.timestamp_ms,
                now_ms,
                max_skew_ms: self.max_future_skew_ms,
            });
        }
        let cutoff_ms = self.retention_cutoff(now_ms);
        if event.timestamp_ms < cutoff_ms {
            return Err(StrikeError::StaleTimestamp {
                timestamp_ms: event.timestamp_ms,
                cutoff_ms,
            });
        }
        Ok(())
    }

    /// Oldest timestamp still inside the retention window at `now_ms`.
    pub fn retention_cutoff(&self, now_ms: u64) -> u64 {
        now_ms.saturating_sub(self.retention_window_ms)
    }

    /// Remove every strike with `timestamp_ms < cutoff_ms`. Returns how many were removed.
    pub fn evict_older_than(&mut self, cutoff_ms: u64) -> usize {
        let before = self.events.len();
        self.events.retain(|e| e.timestamp_ms >= cutoff_ms);
        let removed = before - self.events.len();
        if removed > 0 {
            self.mark_dirty();
        }
        removed
    }

    /// Evict everything outside the retention window at `now_ms`.
    pub fn evict_expired(&mut self, now_ms: u64) -> usize {
        self.evict_older_than(self.retention_cutoff(now_ms))
    }

    /// Copy of the buffered strikes in insertion order.
    pub fn snapshot_strikes(&self) -> Vec<StrikeEvent> {
        self.events.iter().copied().collect()
    }

    /// Number of buffered strikes.
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// True when no strikes are buffered.
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// True when the contents changed since the last [`Self::clear_dirty`].
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Acknowledge the current contents as processed.
    pub fn clear_dirty(&mut self) {
        self.dirty = false;
    }

    /// Monotonic counter bumped on every mutation.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Strikes rejected by validation since creation.
    pub fn rejected_count(&self) -> u64 {
        self.rejected
    }

    /// Strikes dropped because the buffer was full.
    pub fn overflow_count(&self) -> u64 {
        self.overflowed
    }

    /// Force the next recompute to run.
    pub fn mark_dirty(&mut self) {
        self.dirty = true;
        self.generation = self.generation.wrapping_add(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const NOW: u64 = 1_760_000_000_000;

    fn buffer() -> StrikeBuffer {
        StrikeBuffer::with_limits(60_000, 5_000, 4)
    }

    #[test]
    fn test_ingest_marks_dirty_and_keeps_order() {
        let mut b = buffer();
        assert!(!b.is_dirty());
        b.ingest(StrikeEvent::new(1.0, 2.0, NOW), NOW).unwrap();
        b.ingest(StrikeEvent::new(3.0, 4.0, NOW - 10), NOW).unwrap();
        assert!(b.is_dirty());
        assert_eq!(b.generation(), 2);
        let s = b.snapshot_strikes();
        assert_eq!(s.len(), 2);
        assert_eq!(s[0].latitude, 1.0);
        assert_eq!(s[1].latitude, 3.0);
    }

    #[test]
    fn test_rejects_out_of_range_coordinates() {
        let mut b = buffer();
        assert_eq!(
            b.ingest(StrikeEvent::new(91.0, 0.0, NOW), NOW),
            Err(StrikeError::LatitudeOutOfRange(91.0))
        );
        assert_eq!(
            b.ingest(StrikeEvent::new(0.0, -181.0, NOW), NOW),
            Err(StrikeError::LongitudeOutOfRange(-181.0))
        );
        assert!(b.ingest(StrikeEvent::new(f64::NAN, 0.0, NOW), NOW).is_err());
        assert!(b.is_empty());
        assert!(!b.is_dirty());
        assert_eq!(b.rejected_count(), 3);
    }

    #[test]
    fn test_rejects_future_and_stale_timestamps() {
        let mut b = buffer();
        assert!(matches!(
            b.ingest(StrikeEvent::new(0.0, 0.0, NOW + 5_001), NOW),
            Err(StrikeError::FutureTimestamp { .. })
        ));
        assert!(b.ingest(StrikeEvent::new(0.0, 0.0, NOW + 5_000), NOW).is_ok());
        assert!(matches!(
            b.ingest(StrikeEvent::new(0.0, 0.0, NOW - 60_001), NOW),
            Err(StrikeError::StaleTimestamp { cutoff_ms, .. }) if cutoff_ms == NOW - 60_000
        ));
        assert!(b.ingest(StrikeEvent::new(0.0, 0.0, NOW - 60_000), NOW).is_ok());
    }

    #[test]
    fn test_evict_older_than() {
        let mut b = buffer();
        b.ingest(StrikeEvent::new(0.0, 0.0, NOW - 30_000), NOW).unwrap();
        b.ingest(StrikeEvent::new(1.0, 0.0, NOW - 10_000), NOW).unwrap();
        b.ingest(StrikeEvent::new(2.0, 0.0, NOW - 40_000), NOW).unwrap();
        b.clear_dirty();

        assert_eq!(b.evict_older_than(NOW - 20_000), 2);
        assert!(b.is_dirty());
        let s = b.snapshot_strikes();
        assert_eq!(s.len(), 1);
        assert_eq!(s[0].latitude, 1.0);

        b.clear_dirty();
        assert_eq!(b.evict_older_than(NOW - 20_000), 0);
        assert!(!b.is_dirty(), "empty eviction must not mark dirty");
    }

    #[test]
    fn test_evict_expired_uses_retention_window() {
        let mut b = buffer();
        b.ingest(StrikeEvent::new(0.0, 0.0, NOW), NOW).unwrap();
        assert_eq!(b.evict_expired(NOW + 60_000), 0);
        assert_eq!(b.evict_expired(NOW + 60_001), 1);
        assert!(b.is_empty());
    }

    #[test]
    fn test_capacity_drops_oldest_inserted() {
        let mut b = buffer();
        for i in 0..6 {
            b.ingest(StrikeEvent::new(i as f64, 0.0, NOW), NOW).unwrap();
        }
        assert_eq!(b.len(), 4);
        assert_eq!(b.overflow_count(), 2);
        assert_eq!(b.snapshot_strikes()[0].latitude, 2.0);
    }

    #[test]
    fn test_cutoff_saturates_near_epoch() {
        let b = buffer();
        assert_eq!(b.retention_cutoff(10), 0);
    }
}

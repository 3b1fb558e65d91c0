//! Great-circle geometry on a spherical Earth.
//!
//! Strikes span the whole globe, including the poles and the antimeridian,
//! so every distance in the crate is a haversine distance and every centroid
//! is taken on the sphere rather than in the lat/lon plane.

/// Mean Earth radius in kilometres.
pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// A position in decimal degrees.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct GeoPoint {
    /// Latitude in [-90, 90].
    pub lat: f64,
    /// Longitude in [-180, 180].
    pub lon: f64,
}

impl GeoPoint {
    /// Construct a point without range checks.
    pub const fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }

    /// True when both coordinates are finite and within their valid ranges.
    pub fn is_valid(&self) -> bool {
        self.lat.is_finite()
            && self.lon.is_finite()
            && (-90.0..=90.0).contains(&self.lat)
            && (-180.0..=180.0).contains(&self.lon)
    }

    /// Great-circle distance to `other` in kilometres.
    pub fn distance_km(&self, other: &GeoPoint) -> f64 {
        haversine_km(self, other)
    }

    fn to_unit_vector(self) -> [f64; 3] {
        let (lat, lon) = (self.lat.to_radians(), self.lon.to_radians());
        [lat.cos() * lon.cos(), lat.cos() * lon.sin(), lat.sin()]
    }
}

/// Haversine distance between two points in kilometres.
///
/// ```text
/// a = sin²(Δφ/2) + cos φ1 · cos φ2 · sin²(Δλ/2)
/// d = 2R · atan2(√a, √(1 − a))
/// ```
pub fn haversine_km(a: &GeoPoint, b: &GeoPoint) -> f64 {
    let d_lat = (b.lat - a.lat).to_radians();
    let d_lon = (b.lon - a.lon).to_radians();
    let h = (d_lat / 2.0).sin().powi(2)
        + a.lat.to_radians().cos() * b.lat.to_radians().cos() * (d_lon / 2.0).sin().powi(2);
    // Rounding can push h fractionally past 1 for antipodal points.
    let h = h.clamp(0.0, 1.0);
    EARTH_RADIUS_KM * 2.0 * h.sqrt().atan2((1.0 - h).sqrt())
}

/// Central angle in degrees subtended by an arc of `km` kilometres.
pub fn km_to_degrees(km: f64) -> f64 {
    (km / EARTH_RADIUS_KM).to_degrees()
}

// ─── Centroid ────────────────────────────────────────────────────────────────

/// Running weighted centroid of points on the sphere.
///
/// Stores the sum of member unit vectors, so merging two centroids is a vector
/// addition and the result is automatically weighted by member count. For
/// clusters a few hundred kilometres across this agrees with the arithmetic
/// lat/lon mean to well under a metre, and it stays correct for clusters that
/// straddle the antimeridian.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Centroid {
    sum: [f64; 3],
    count: usize,
    /// First point seen; used when the vector sum cancels out.
    anchor: Option<GeoPoint>,
}

impl Centroid {
    /// An empty centroid with no members.
    pub const fn new() -> Self {
        Self {
            sum: [0.0; 3],
            count: 0,
            anchor: None,
        }
    }

    /// Add one member.
    pub fn add(&mut self, p: GeoPoint) {
        let v = p.to_unit_vector();
        for (s, c) in self.sum.iter_mut().zip(v) {
            *s += c;
        }
        self.count += 1;
        if self.anchor.is_none() {
            self.anchor = Some(p);
        }
    }

    /// Absorb all members of `other`.
    pub fn merge(&mut self, other: &Centroid) {
        for (s, c) in self.sum.iter_mut().zip(other.sum) {
            *s += c;
        }
        self.count += other.count;
        if self.anchor.is_none() {
            self.anchor = other.anchor;
        }
    }

    /// Number of members accumulated.
    pub fn count(&self) -> usize {
        self.count
    }

    /// Current center, or `None` when empty.
    ///
    /// If the member vectors cancel (e.g. two antipodal strikes) the first
    /// member's position is returned instead of an undefined direction.
    pub fn center(&self) -> Option<GeoPoint> {
        if self.count == 0 {
            return None;
        }
        let [x, y, z] = self.sum;
        let norm = (x * x + y * y + z * z).sqrt();
        if norm < 1e-12 * self.count as f64 {
            return self.anchor;
        }
        let lat = (z / norm).clamp(-1.0, 1.0).asin().to_degrees();
        let lon = if x.abs() < 1e-15 && y.abs() < 1e-15 {
            0.0
        } else {
            y.atan2(x).to_degrees()
        };
        Some(GeoPoint::new(lat, lon))
    }
}

impl Default for Centroid {
    fn default() -> Self {
        Self::new()
    }
}

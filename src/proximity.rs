//! Implicit proximity graph over strike positions.
//!
//! Two points are neighbours when their haversine distance is at most the
//! index radius. The edge set is never materialised; neighbours are found on
//! demand through a latitude/longitude grid so that each query only touches
//! the 3×3 block of cells around the query point.
//!
//! # Grid layout
//!
//! ```text
//! row height  h  ≥ radius (as a central angle)
//! row r       spans latitudes [-90 + r·h, -90 + (r+1)·h)
//! columns     each row is split into ⌊360 / w_r⌋ equal columns, where
//!             w_r = 2·asin(sin(δ/2) / cos φ_max) and φ_max is the most
//!             poleward latitude of rows r-1..=r+1
//! ```
//!
//! Widening the columns by the poleward cosine keeps every neighbour inside
//! the adjacent column even where meridians converge. Rows touching a pole
//! degenerate to a single column. Column indices wrap at the antimeridian.

use hashbrown::HashMap;
use heapless::Vec as HVec;

use crate::geo::{haversine_km, km_to_degrees, GeoPoint, EARTH_RADIUS_KM};

/// Smallest row height in degrees (about 11 cm at the equator).
const MIN_CELL_DEG: f64 = 1e-6;

/// Relative widening applied to cell sizes to absorb rounding at cell edges.
const CELL_SLACK: f64 = 1.0 + 1e-9;

/// Neighbour lookup over an indexed point set.
///
/// The component detector only needs this capability; the grid index is the
/// production implementation and [`BruteForceNeighbors`] the reference.
pub trait NeighborQuery {
    /// Number of indexed points.
    fn len(&self) -> usize;

    /// True when nothing is indexed.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Position of point `i`.
    fn point(&self, i: usize) -> GeoPoint;

    /// Append every neighbour of point `i` (excluding `i`) to `out`.
    ///
    /// Order must be deterministic for a given point set.
    fn neighbors_into(&self, i: usize, out: &mut Vec<usize>);
}

// ─── CellKey ─────────────────────────────────────────────────────────────────

/// Address of one grid cell.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct CellKey {
    /// Latitude band, 0 at the south pole.
    pub row: u32,
    /// Longitude column within the band, 0 at -180°.
    pub col: u32,
}

// ─── GridIndex ───────────────────────────────────────────────────────────────

/// Grid-bucketed spatial index with a fixed query radius.
#[derive(Clone, Debug)]
pub struct GridIndex {
    points: Vec<GeoPoint>,
    radius_km: f64,
    /// Half of the radius as a central angle, pre-sined.
    sin_half_angle: f64,
    row_height_deg: f64,
    rows: u32,
    cells: HashMap<CellKey, Vec<usize>>,
}

impl GridIndex {
    /// Index `points` for neighbour queries within `radius_km`.
    ///
    /// Buckets are filled in point order, which fixes the order of query results.
    pub fn build(points: Vec<GeoPoint>, radius_km: f64) -> Self {
        let radius_km = radius_km.max(0.0);
        let angle_deg = km_to_degrees(radius_km);
        let row_height_deg = (angle_deg * CELL_SLACK).max(MIN_CELL_DEG);
        let rows = if row_height_deg >= 180.0 {
            1
        } else {
            (180.0 / row_height_deg).ceil() as u32
        };
        let half_angle = (radius_km / EARTH_RADIUS_KM / 2.0).min(core::f64::consts::FRAC_PI_2);
        let sin_half_angle = half_angle.sin();

        let mut index = Self {
            points: Vec::new(),
            radius_km,
            sin_half_angle,
            row_height_deg,
            rows,
            cells: HashMap::new(),
        };
        for (i, p) in points.iter().enumerate() {
            let key = index.cell_of(p);
            index.cells.entry(key).or_insert_with(Vec::new).push(i);
        }
        index.points = points;
        index
    }

    /// Query radius in kilometres.
    pub fn radius_km(&self) -> f64 {
        self.radius_km
    }

    /// Number of occupied cells.
    pub fn occupied_cells(&self) -> usize {
        self.cells.len()
    }

    /// Cell containing `p`.
    pub fn cell_of(&self, p: &GeoPoint) -> CellKey {
        let row = self.row_of(p.lat);
        CellKey {
            row,
            col: self.col_of(row, p.lon),
        }
    }

    /// The (at most nine, deduplicated) cells that can hold neighbours of `p`.
    pub fn neighborhood(&self, p: &GeoPoint) -> HVec<CellKey, 9> {
        let mut out: HVec<CellKey, 9> = HVec::new();
        let row = self.row_of(p.lat) as i64;
        for dr in -1..=1i64 {
            let r = row + dr;
            if r < 0 || r >= self.rows as i64 {
                continue;
            }
            let r = r as u32;
            let cols = self.cols_in_row(r) as i64;
            let c = self.col_of(r, p.lon) as i64;
            for dc in -1..=1i64 {
                let key = CellKey {
                    row: r,
                    col: (c + dc).rem_euclid(cols) as u32,
                };
                if !out.contains(&key) {
                    // 3 rows × 3 columns bounds the count at 9.
                    let _ = out.push(key);
                }
            }
        }
        out
    }

    /// Call `f` with every indexed point within the radius of `p`.
    pub fn for_each_within<F: FnMut(usize)>(&self, p: &GeoPoint, mut f: F) {
        for key in self.neighborhood(p) {
            if let Some(bucket) = self.cells.get(&key) {
                for &j in bucket {
                    if haversine_km(p, &self.points[j]) <= self.radius_km {
                        f(j);
                    }
                }
            }
        }
    }

    /// Number of indexed points within the radius of `p` (a point at `p` counts).
    pub fn count_within(&self, p: &GeoPoint) -> usize {
        let mut n = 0;
        self.for_each_within(p, |_| n += 1);
        n
    }

    fn row_of(&self, lat: f64) -> u32 {
        let r = ((lat + 90.0) / self.row_height_deg).floor();
        if r <= 0.0 {
            0
        } else {
            (r as u32).min(self.rows - 1)
        }
    }

    /// Column count of band `row`, sized so neighbours sit in adjacent columns.
    fn cols_in_row(&self, row: u32) -> u32 {
        let h = self.row_height_deg;
        let lo = (-90.0 + (row as f64 - 1.0) * h).max(-90.0);
        let hi = (-90.0 + (row as f64 + 2.0) * h).min(90.0);
        let poleward = lo.abs().max(hi.abs());
        let cos_min = poleward.to_radians().cos();
        if cos_min <= 0.0 {
            return 1;
        }
        let ratio = self.sin_half_angle / cos_min;
        if ratio >= 1.0 {
            return 1;
        }
        let width_deg = (2.0 * ratio.asin()).to_degrees() * CELL_SLACK;
        if width_deg <= 0.0 {
            return u32::MAX;
        }
        ((360.0 / width_deg).floor() as u32).max(1)
    }

    fn col_of(&self, row: u32, lon: f64) -> u32 {
        let cols = self.cols_in_row(row);
        let width = 360.0 / cols as f64;
        let c = ((lon + 180.0) / width).floor();
        if c <= 0.0 {
            0
        } else {
            (c as u32).min(cols - 1)
        }
    }
}

impl NeighborQuery for GridIndex {
    fn len(&self) -> usize {
        self.points.len()
    }

    fn point(&self, i: usize) -> GeoPoint {
        self.points[i]
    }

    fn neighbors_into(&self, i: usize, out: &mut Vec<usize>) {
        let p = self.points[i];
        self.for_each_within(&p, |j| {
            if j != i {
                out.push(j);
            }
        });
    }
}

// ─── BruteForceNeighbors ─────────────────────────────────────────────────────

/// O(n) per query neighbour scan. Reference implementation for small inputs.
#[derive(Clone, Debug)]
pub struct BruteForceNeighbors {
    points: Vec<GeoPoint>,
    radius_km: f64,
}

impl BruteForceNeighbors {
    /// Wrap `points` for exhaustive neighbour scans within `radius_km`.
    pub fn new(points: Vec<GeoPoint>, radius_km: f64) -> Self {
        Self { points, radius_km }
    }
}

impl NeighborQuery for BruteForceNeighbors {
    fn len(&self) -> usize {
        self.points.len()
    }

    fn point(&self, i: usize) -> GeoPoint {
        self.points[i]
    }

    fn neighbors_into(&self, i: usize, out: &mut Vec<usize>) {
        let p = self.points[i];
        for (j, q) in self.points.iter().enumerate() {
            if j != i && haversine_km(&p, q) <= self.radius_km {
                out.push(j);
            }
        }
    }
}

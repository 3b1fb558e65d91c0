//! Strike clustering: connected components, then greedy consolidation.
//!
//! ```text
//! strikes ──► GridIndex ──► detect_components ──► consolidate ──► clusters
//!             (proximity)   (BFS, raw clusters)   (closest pair first)
//! ```
//!
//! Raw clusters are the connected components of the proximity graph. The
//! consolidator then fuses components whose centers sit within the merge
//! radius, which joins cells of one storm that the proximity radius split.

pub mod cluster;
pub mod components;
pub mod consolidate;

pub use cluster::{link_weight, Cluster};
pub use components::detect_components;
pub use consolidate::{consolidate, consolidate_naive, Consolidation};

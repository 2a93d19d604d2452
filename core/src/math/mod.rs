pub mod edges;
pub mod stats;

pub use edges::{locate_half_max, HalfMaxEdges};
pub use stats::StatsHelper;

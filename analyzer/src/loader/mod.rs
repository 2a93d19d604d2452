pub mod series;

pub use series::{load_series, DEFAULT_SKIP_ROWS};

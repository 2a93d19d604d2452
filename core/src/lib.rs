//! Signal-segmentation and dose-reconstruction core for water-tank scanning
//! dosimetry.
//!
//! Raw two-channel detector recordings flow through baseline zeroing, pulse
//! classification, dose conversion, shot segmentation, position calibration
//! and curve finishing. Each stage yields a new immutable series.

pub mod config;
pub mod math;
pub mod pipeline;
pub mod prelude;
pub mod processing;
pub mod scan_interface;
pub mod telemetry;

pub use config::{AnalysisConfig, Calibration, Preset, Segmentation, ShotDetection};
pub use pipeline::{AnalysisReport, Pipeline, ShotAnalysis};
pub use prelude::{ProcessingStage, StageError, StageResult};

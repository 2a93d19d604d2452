pub mod baseline;
pub mod depth;
pub mod dose;
pub mod finish;
pub mod position;
pub mod pulse;
pub mod segment;

pub use baseline::BaselineStage;
pub use depth::DepthAggregator;
pub use dose::DoseStage;
pub use finish::CurveFinisher;
pub use position::PositionCalibrator;
pub use pulse::PulseStage;
pub use segment::ShotSegmenter;

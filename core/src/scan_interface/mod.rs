pub mod curve;
pub mod series;
pub mod shot;

pub use curve::{
    CurvePoint, DepthCurve, DepthEntry, DepthPoint, ProfileCurve, ScanDirection, ShotDose,
    ShotSummary,
};
pub use series::{
    BaselineWindow, ChannelBaseline, ClassifiedSample, DoseSample, DoseSeries, PulseFlags,
    PulseSeries, PulseStatistics, RawSample, RawSeries, ZeroedSample, ZeroedSeries,
};
pub use shot::{
    CalibrationKind, ChunkAggregate, EdgePair, PositionedSample, PositionedShot,
    SegmentedSeries, Shot, ShotTransitions,
};

use crate::scan_interface::BaselineWindow;

/// Common error type for stage execution.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum StageError {
    #[error("no samples fall inside the baseline window {0}")]
    EmptyBaselineWindow(BaselineWindow),
    #[error("segmentation found {starts} shot starts and {ends} shot ends")]
    SegmentationMismatch { starts: usize, ends: usize },
    #[error("shot {shot} boundaries are misordered or overlap the next shot")]
    MisorderedShot { shot: usize },
    #[error("degenerate scan speed in shot {shot}: {reason}")]
    DegenerateSpeed { shot: usize, reason: String },
    #[error("smoothing window {window} exceeds the {available} pulses of shot {shot}")]
    InsufficientSamplesForSmoothing {
        shot: usize,
        window: usize,
        available: usize,
    },
    #[error("smoothed curve of shot {shot} has no half-maximum crossing")]
    MissingHalfMaxEdge { shot: usize },
    #[error("shot {shot} carries no positive pulse dose")]
    NonPositivePeak { shot: usize },
    #[error("depth table lists {expected} shots but {actual} were detected")]
    DepthTableMismatch { expected: usize, actual: usize },
    #[error("excluded shot {shot} does not exist; {available} shots were detected")]
    ExcludedShotOutOfRange { shot: usize, available: usize },
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

pub type StageResult<T> = Result<T, StageError>;

/// A pipeline stage: reads an immutable input and derives a new output from it.
pub trait ProcessingStage {
    type Input: ?Sized;
    type Output;

    fn name(&self) -> &'static str;
    fn execute(&self, input: &Self::Input) -> StageResult<Self::Output>;
}

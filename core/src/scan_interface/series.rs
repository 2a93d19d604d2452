use crate::prelude::{StageError, StageResult};
use serde::{Deserialize, Serialize};
use std::fmt;

/// One row of a detector recording.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RawSample {
    #[serde(alias = "number")]
    pub index: u64,
    pub time: f64,
    pub ch0: f64,
    pub ch1: f64,
}

/// Time-ordered recording with a contiguous sample index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<RawSample>", into = "Vec<RawSample>")]
pub struct RawSeries {
    samples: Vec<RawSample>,
}

impl RawSeries {
    pub fn new(samples: Vec<RawSample>) -> StageResult<Self> {
        if samples.is_empty() {
            return Err(StageError::InvalidInput("raw series is empty".into()));
        }

        for (position, sample) in samples.iter().enumerate() {
            if !(sample.time.is_finite() && sample.ch0.is_finite() && sample.ch1.is_finite()) {
                return Err(StageError::InvalidInput(format!(
                    "non-finite value at sample {}",
                    sample.index
                )));
            }
            if position == 0 {
                continue;
            }
            let previous = &samples[position - 1];
            if sample.index != previous.index + 1 {
                return Err(StageError::InvalidInput(format!(
                    "sample index jumps from {} to {}",
                    previous.index, sample.index
                )));
            }
            if sample.time < previous.time {
                return Err(StageError::InvalidInput(format!(
                    "time decreases at sample {}",
                    sample.index
                )));
            }
        }

        Ok(Self { samples })
    }

    pub fn samples(&self) -> &[RawSample] {
        &self.samples
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

impl TryFrom<Vec<RawSample>> for RawSeries {
    type Error = StageError;

    fn try_from(samples: Vec<RawSample>) -> Result<Self, Self::Error> {
        Self::new(samples)
    }
}

impl From<RawSeries> for Vec<RawSample> {
    fn from(series: RawSeries) -> Self {
        series.samples
    }
}

/// Interval in which the beam is known to be off.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BaselineWindow {
    /// Every sample strictly before `end`.
    Before { end: f64 },
    /// Every sample strictly before `start` or strictly after `end`.
    Outside { start: f64, end: f64 },
}

impl BaselineWindow {
    pub fn contains(&self, time: f64) -> bool {
        match *self {
            BaselineWindow::Before { end } => time < end,
            BaselineWindow::Outside { start, end } => time < start || time > end,
        }
    }
}

impl fmt::Display for BaselineWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BaselineWindow::Before { end } => write!(f, "t < {end}"),
            BaselineWindow::Outside { start, end } => write!(f, "t < {start} or t > {end}"),
        }
    }
}

/// Per-channel offset measured over the baseline window.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ChannelBaseline {
    pub ch0: f64,
    pub ch1: f64,
    pub sample_count: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ZeroedSample {
    pub index: u64,
    pub time: f64,
    pub ch0: f64,
    pub ch1: f64,
    pub ch0z: f64,
    pub ch1z: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ZeroedSeries {
    pub samples: Vec<ZeroedSample>,
    pub baseline: ChannelBaseline,
    pub window: BaselineWindow,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PulseFlags {
    pub candidate: bool,
    pub coincident_with_next: bool,
    pub coincident_continuation: bool,
    pub accepted: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClassifiedSample {
    pub sample: ZeroedSample,
    pub flags: PulseFlags,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PulseStatistics {
    pub samples: usize,
    pub candidates: usize,
    pub coincident_pairs: usize,
    pub accepted: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PulseSeries {
    pub samples: Vec<ClassifiedSample>,
    pub max_baseline_noise: f64,
    pub threshold: f64,
    pub statistics: PulseStatistics,
}

/// Merged channel charge and the dose derived from it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DoseSample {
    pub index: u64,
    pub time: f64,
    pub ch0_merged: f64,
    pub ch1_merged: f64,
    pub dose: f64,
    pub accepted: bool,
}

impl DoseSample {
    /// Dose of an accepted pulse; `None` for every other row.
    pub fn pulse_dose(&self) -> Option<f64> {
        self.accepted.then_some(self.dose)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DoseSeries {
    pub samples: Vec<DoseSample>,
    pub acr: f64,
}

use crate::scan_interface::series::DoseSample;
use serde::{Deserialize, Serialize};

/// One beam-on interval `(start, end)` together with the samples strictly inside it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Shot {
    pub index: usize,
    pub start: f64,
    pub end: f64,
    pub samples: Vec<DoseSample>,
}

impl Shot {
    pub fn contains(&self, time: f64) -> bool {
        time > self.start && time < self.end
    }

    pub fn pulses(&self) -> impl Iterator<Item = &DoseSample> + '_ {
        self.samples.iter().filter(|sample| sample.accepted)
    }

    pub fn pulse_count(&self) -> usize {
        self.pulses().count()
    }

    pub fn overlaps(&self, other: &Shot) -> bool {
        self.start < other.end && other.start < self.end
    }
}

/// Aggregate of one fixed-size block of sample indices.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ChunkAggregate {
    pub chunk: u64,
    pub min_time: f64,
    pub max_time: f64,
    pub charge: f64,
}

/// Collapsed transition times before padding.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ShotTransitions {
    pub starts: Vec<f64>,
    pub ends: Vec<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SegmentedSeries {
    pub shots: Vec<Shot>,
    /// Shot label per dose sample, `None` outside every shot.
    pub labels: Vec<Option<usize>>,
    pub chunks: Vec<ChunkAggregate>,
    pub transitions: ShotTransitions,
}

impl SegmentedSeries {
    pub fn unlabeled_count(&self) -> usize {
        self.labels.iter().filter(|label| label.is_none()).count()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PositionedSample {
    pub index: u64,
    pub time: f64,
    pub dose: f64,
    pub time_between_samples: f64,
    /// Distance covered since the previous pulse.
    pub distance_traveled: f64,
    /// Cumulative travel from the shot origin (Mode B: remaining depth).
    pub raw_position: f64,
    pub recentered_position: f64,
}

/// Which calibration produced a positioned shot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CalibrationKind {
    FixedFieldSize,
    FixedDepth,
}

/// Half-maximum edges expressed as recentered positions.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EdgePair {
    pub left: f64,
    pub right: f64,
}

impl EdgePair {
    pub fn width(&self) -> f64 {
        self.right - self.left
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PositionedShot {
    pub shot: usize,
    pub kind: CalibrationKind,
    pub speed: f64,
    pub center_offset: f64,
    pub edges: Option<EdgePair>,
    pub sample_count: usize,
    pub distance: f64,
    /// Accepted pulses only, in time order.
    pub samples: Vec<PositionedSample>,
}

impl PositionedShot {
    pub fn pulse_count(&self) -> usize {
        self.samples.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn shot(index: usize, start: f64, end: f64) -> Shot {
        Shot {
            index,
            start,
            end,
            samples: Vec::new(),
        }
    }

    #[test]
    fn shot_interval_is_open() {
        let s = shot(0, 1.0, 2.0);
        assert!(!s.contains(1.0));
        assert!(s.contains(1.5));
        assert!(!s.contains(2.0));
    }

    #[test]
    fn touching_shots_do_not_overlap() {
        assert!(!shot(0, 1.0, 2.0).overlaps(&shot(1, 2.0, 3.0)));
        assert!(shot(0, 1.0, 2.5).overlaps(&shot(1, 2.0, 3.0)));
    }
}

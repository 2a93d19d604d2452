//! Configuration record for one analysis run and the named presets that
//! replace the per-page parameter forks.

use crate::prelude::{StageError, StageResult};
use crate::scan_interface::{BaselineWindow, DepthEntry, ScanDirection};
use serde::{Deserialize, Serialize};

/// Minimum spacing between two distinct transitions, in seconds.
pub const DEFAULT_MIN_GAP: f64 = 2.0;

fn default_min_gap() -> f64 {
    DEFAULT_MIN_GAP
}

/// Parameters of the chunked step detector used to find shots.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ShotDetection {
    pub chunk_size: usize,
    pub cutoff: f64,
    #[serde(default = "default_min_gap")]
    pub min_gap: f64,
    pub padding: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Segmentation {
    /// Detect shots from steps in the accumulated charge.
    Detect(ShotDetection),
    /// Treat the samples strictly inside `(start, end)` as the only shot.
    Window { start: f64, end: f64 },
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Calibration {
    /// Constant-speed profile scan; speed follows from a known field size.
    FixedFieldSize { field_size_mm: f64 },
    /// Single depth scan; speed follows from the total travel over the shot.
    FixedDepth { total_depth_mm: f64 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Preset {
    PddSingleScan,
    PddWithProfiles,
    ProfileScan,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisConfig {
    pub baseline: BaselineWindow,
    pub pulse_threshold: f64,
    pub acr: f64,
    pub segmentation: Segmentation,
    #[serde(default)]
    pub calibration: Option<Calibration>,
    pub peak_percentile: f64,
    pub smoothing_window: usize,
    #[serde(default)]
    pub depth_table: Option<Vec<DepthEntry>>,
    #[serde(default)]
    pub exclude_shot: Option<usize>,
}

impl AnalysisConfig {
    pub fn preset(preset: Preset) -> Self {
        match preset {
            Preset::PddSingleScan => Self {
                baseline: BaselineWindow::Before { end: 1.0 },
                pulse_threshold: 1.40,
                acr: 0.949,
                segmentation: Segmentation::Window {
                    start: 1.0,
                    end: 11.0,
                },
                calibration: Some(Calibration::FixedDepth {
                    total_depth_mm: 250.0,
                }),
                peak_percentile: 0.9,
                smoothing_window: 50,
                depth_table: None,
                exclude_shot: None,
            },
            Preset::PddWithProfiles => Self {
                baseline: BaselineWindow::Before { end: 6.0 },
                pulse_threshold: 1.40,
                acr: 1.0,
                segmentation: Segmentation::Detect(ShotDetection {
                    chunk_size: 300,
                    cutoff: 40.0,
                    min_gap: DEFAULT_MIN_GAP,
                    padding: 0.5,
                }),
                calibration: None,
                peak_percentile: 0.9,
                smoothing_window: 1,
                depth_table: Some(profile_depth_table()),
                exclude_shot: None,
            },
            Preset::ProfileScan => Self {
                baseline: BaselineWindow::Before { end: 2.0 },
                pulse_threshold: 1.05,
                acr: 0.949,
                segmentation: Segmentation::Detect(ShotDetection {
                    chunk_size: 40,
                    cutoff: 40.0,
                    min_gap: DEFAULT_MIN_GAP,
                    padding: 2.0,
                }),
                calibration: Some(Calibration::FixedFieldSize {
                    field_size_mm: 100.0,
                }),
                peak_percentile: 0.9,
                smoothing_window: 5,
                depth_table: None,
                exclude_shot: None,
            },
        }
    }

    pub fn validate(&self) -> StageResult<()> {
        match self.baseline {
            BaselineWindow::Before { end } => finite("baseline end", end)?,
            BaselineWindow::Outside { start, end } => {
                finite("baseline start", start)?;
                finite("baseline end", end)?;
                if start >= end {
                    return invalid("baseline start must precede its end");
                }
            }
        }

        if !(self.pulse_threshold.is_finite() && self.pulse_threshold > 0.0) {
            return invalid("pulse threshold must be positive");
        }
        finite("acr", self.acr)?;

        match self.segmentation {
            Segmentation::Detect(detection) => {
                if detection.chunk_size == 0 {
                    return invalid("chunk size must be at least one sample");
                }
                if !(detection.cutoff.is_finite() && detection.cutoff > 0.0) {
                    return invalid("segmentation cutoff must be positive");
                }
                if !(detection.min_gap.is_finite() && detection.min_gap >= 0.0) {
                    return invalid("minimum transition gap must be non-negative");
                }
                if !(detection.padding.is_finite() && detection.padding >= 0.0) {
                    return invalid("shot padding must be non-negative");
                }
            }
            Segmentation::Window { start, end } => {
                finite("scan window start", start)?;
                finite("scan window end", end)?;
                if start >= end {
                    return invalid("scan window start must precede its end");
                }
            }
        }

        match self.calibration {
            Some(Calibration::FixedFieldSize { field_size_mm }) => {
                if !(field_size_mm.is_finite() && field_size_mm > 0.0) {
                    return invalid("field size must be positive");
                }
            }
            Some(Calibration::FixedDepth { total_depth_mm }) => {
                if !(total_depth_mm.is_finite() && total_depth_mm > 0.0) {
                    return invalid("total depth must be positive");
                }
            }
            None => {}
        }

        if !(self.peak_percentile > 0.5 && self.peak_percentile <= 1.0) {
            return invalid("peak percentile must lie in (0.5, 1.0]");
        }
        if self.smoothing_window == 0 {
            return invalid("smoothing window must be at least one sample");
        }
        if let Some(table) = &self.depth_table {
            if table.is_empty() {
                return invalid("depth table is empty");
            }
            if table.iter().any(|entry| !entry.depth_mm.is_finite()) {
                return invalid("depth table holds a non-finite depth");
            }
        }

        Ok(())
    }
}

/// Depth protocol of the profile-based PDD measurement: two orientations per depth.
pub fn profile_depth_table() -> Vec<DepthEntry> {
    [5.0, 10.0, 15.0, 25.0, 50.0, 100.0, 150.0, 200.0, 250.0]
        .iter()
        .flat_map(|&depth_mm| {
            [ScanDirection::Crossplane, ScanDirection::Inplane]
                .into_iter()
                .map(move |direction| DepthEntry {
                    depth_mm,
                    direction: Some(direction),
                })
        })
        .collect()
}

fn finite(name: &str, value: f64) -> StageResult<()> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(StageError::InvalidConfig(format!("{name} must be finite")))
    }
}

fn invalid(message: &str) -> StageResult<()> {
    Err(StageError::InvalidConfig(message.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn presets_are_valid() {
        for preset in [
            Preset::PddSingleScan,
            Preset::PddWithProfiles,
            Preset::ProfileScan,
        ] {
            AnalysisConfig::preset(preset).validate().unwrap();
        }
    }

    #[test]
    fn profile_table_alternates_orientation() {
        let table = profile_depth_table();
        assert_eq!(table.len(), 18);
        assert_eq!(table[0].direction, Some(ScanDirection::Crossplane));
        assert_eq!(table[1].direction, Some(ScanDirection::Inplane));
        assert_eq!(table[1].depth_mm, 5.0);
        assert_eq!(table[17].depth_mm, 250.0);
    }

    #[test]
    fn zero_threshold_is_rejected() {
        let mut config = AnalysisConfig::preset(Preset::ProfileScan);
        config.pulse_threshold = 0.0;
        assert!(matches!(
            config.validate(),
            Err(StageError::InvalidConfig(_))
        ));
    }

    #[test]
    fn inverted_window_is_rejected() {
        let mut config = AnalysisConfig::preset(Preset::PddSingleScan);
        config.segmentation = Segmentation::Window {
            start: 5.0,
            end: 2.0,
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn config_deserializes_tagged_variants() {
        let json = r#"{
            "baseline": {"kind": "outside", "start": 1.0, "end": 9.0},
            "pulse_threshold": 1.2,
            "acr": 0.95,
            "segmentation": {"kind": "detect", "chunk_size": 60, "cutoff": 30.0, "padding": 1.0},
            "calibration": {"kind": "fixed_field_size", "field_size_mm": 40.0},
            "peak_percentile": 0.9,
            "smoothing_window": 7
        }"#;
        let config: AnalysisConfig = serde_json::from_str(json).unwrap();
        assert_eq!(
            config.segmentation,
            Segmentation::Detect(ShotDetection {
                chunk_size: 60,
                cutoff: 30.0,
                min_gap: DEFAULT_MIN_GAP,
                padding: 1.0,
            })
        );
        assert!(config.depth_table.is_none());
        config.validate().unwrap();
    }
}

use crate::scan_interface::shot::CalibrationKind;
use serde::{Deserialize, Serialize};

/// Orientation of a lateral profile relative to the gantry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScanDirection {
    Crossplane,
    Inplane,
}

/// Maps one detected shot (by order of occurrence) to the depth it was taken at.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DepthEntry {
    pub depth_mm: f64,
    #[serde(default)]
    pub direction: Option<ScanDirection>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CurvePoint {
    pub index: u64,
    pub time: f64,
    pub position: f64,
    pub smoothed_dose: f64,
    pub relative_dose: f64,
}

/// Finished, smoothed and normalized curve of a single shot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfileCurve {
    pub shot: usize,
    pub kind: CalibrationKind,
    pub smoothing_window: usize,
    pub center_offset: f64,
    pub points: Vec<CurvePoint>,
    pub edge1: Option<f64>,
    pub edge2: Option<f64>,
    pub field_size: Option<f64>,
}

impl ProfileCurve {
    pub fn peak(&self) -> Option<&CurvePoint> {
        self.points
            .iter()
            .max_by(|a, b| a.relative_dose.total_cmp(&b.relative_dose))
    }
}

/// Scalar summary reported for every analysed shot.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ShotSummary {
    pub shot: usize,
    pub speed: f64,
    pub field_size: Option<f64>,
    pub samples_per_mm: f64,
    pub pulses_per_mm: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ShotDose {
    pub shot: usize,
    pub depth_mm: f64,
    pub direction: Option<ScanDirection>,
    pub mean_dose: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DepthPoint {
    pub depth_mm: f64,
    pub mean_dose: f64,
    /// Sample standard deviation across the shots at this depth.
    pub std_error: Option<f64>,
    pub pdd_percent: f64,
    pub shots: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DepthCurve {
    pub shot_doses: Vec<ShotDose>,
    pub points: Vec<DepthPoint>,
    pub mean_error: Option<f64>,
}

use crate::workflow::runner::WorkflowResult;
use dosecore::scan_interface::{DepthCurve, ProfileCurve, PulseStatistics, ShotSummary};
use dosecore::telemetry::MetricsSnapshot;
use serde::{Deserialize, Serialize};

/// Latest analysis as served to viewers.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct VisualizationModel {
    pub shot_count: usize,
    pub pulse_statistics: PulseStatistics,
    pub summaries: Vec<ShotSummary>,
    pub curves: Vec<ProfileCurve>,
    pub depth_curve: Option<DepthCurve>,
    pub metrics: MetricsSnapshot,
    pub scenario: Option<String>,
}

impl VisualizationModel {
    pub fn from_result(result: &WorkflowResult) -> Self {
        let shots = &result.report.shots;
        Self {
            shot_count: shots.segmented.shots.len(),
            pulse_statistics: result.report.pulses.statistics,
            summaries: shots.summaries.clone(),
            curves: shots.curves.clone(),
            depth_curve: shots.depth_curve.clone(),
            metrics: result.metrics,
            scenario: None,
        }
    }

    pub fn with_scenario(mut self, scenario: Option<String>) -> Self {
        self.scenario = scenario;
        self
    }
}

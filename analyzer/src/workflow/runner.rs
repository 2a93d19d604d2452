use crate::loader::load_series;
use crate::workflow::config::WorkflowConfig;
use anyhow::Context;
use dosecore::scan_interface::RawSeries;
use dosecore::telemetry::MetricsSnapshot;
use dosecore::{AnalysisConfig, AnalysisReport, Pipeline};
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct WorkflowResult {
    pub report: AnalysisReport,
    pub metrics: MetricsSnapshot,
}

#[derive(Clone)]
pub struct Runner {
    config: AnalysisConfig,
}

impl Runner {
    pub fn new(config: AnalysisConfig) -> Self {
        Self { config }
    }

    pub fn from_workflow(workflow: &WorkflowConfig) -> Self {
        Self::new(workflow.to_analysis_config())
    }

    pub fn execute(&self, raw: &RawSeries) -> anyhow::Result<WorkflowResult> {
        let pipeline =
            Pipeline::new(self.config.clone()).context("validating analysis settings")?;
        let report = pipeline.run(raw).context("running analysis pipeline")?;
        log::info!(
            "analysis finished: {} shots, {} curves",
            report.shots.segmented.shots.len(),
            report.shots.curves.len()
        );
        Ok(WorkflowResult {
            report,
            metrics: pipeline.metrics(),
        })
    }

    /// Loads the workflow's recording and analyses it.
    pub fn execute_workflow(&self, workflow: &WorkflowConfig) -> anyhow::Result<WorkflowResult> {
        let input = workflow
            .input
            .as_ref()
            .context("workflow names no input recording")?;
        let raw = load_series(input, workflow.skip_rows)?;
        self.execute(&raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generator::profile::{build_scan, GeneratorConfig};
    use dosecore::Preset;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn synthetic_profile_scan_round_trip() {
        let generator = GeneratorConfig::default();
        let raw = build_scan(&generator).unwrap();
        let result = Runner::new(generator.analysis_config()).execute(&raw).unwrap();
        let shots = &result.report.shots;

        assert_eq!(shots.segmented.shots.len(), 2);
        assert_eq!(shots.curves.len(), 2);
        assert_eq!(result.metrics.shots, 2);
        assert_eq!(result.metrics.errors, 0);

        for (curve, summary) in shots.curves.iter().zip(&shots.summaries) {
            let field = summary.field_size.unwrap();
            assert!((field - 50.0).abs() < 1.0, "field size {field}");
            assert!((summary.speed - 50.0).abs() < 3.0, "speed {}", summary.speed);

            let peak = curve.peak().unwrap();
            assert_eq!(peak.relative_dose, 100.0);
            assert!(peak.position.abs() < 3.0, "peak at {}", peak.position);
        }

        // Split pulses are merged into one accepted sample each.
        let stats = result.report.pulses.statistics;
        assert!(stats.coincident_pairs > 0);
        assert_eq!(stats.accepted + stats.coincident_pairs, stats.candidates);
    }

    #[test]
    fn runner_reports_stage_failure_with_context() {
        let raw = build_scan(&GeneratorConfig::default()).unwrap();
        let mut config = AnalysisConfig::preset(Preset::PddWithProfiles);
        config.baseline = dosecore::scan_interface::BaselineWindow::Before { end: 2.0 };
        let err = Runner::new(config).execute(&raw).unwrap_err();
        assert!(format!("{err:#}").contains("running analysis pipeline"));
    }

    #[test]
    fn workflow_without_input_is_an_error() {
        let workflow = WorkflowConfig::from_args(Preset::ProfileScan, None, 4, None, None);
        assert!(Runner::from_workflow(&workflow)
            .execute_workflow(&workflow)
            .is_err());
    }

    #[test]
    fn workflow_reads_recording_from_disk() {
        let generator = GeneratorConfig::default();
        let raw = build_scan(&generator).unwrap();
        let mut temp = NamedTempFile::new().unwrap();
        writeln!(temp, "Device: synthetic\nOperator: test\nDate: -\nMode: profile").unwrap();
        writeln!(temp, "number,time,ch0,ch1").unwrap();
        for sample in raw.samples() {
            writeln!(
                temp,
                "{},{},{},{}",
                sample.index, sample.time, sample.ch0, sample.ch1
            )
            .unwrap();
        }

        let mut workflow = WorkflowConfig::from_args(
            Preset::ProfileScan,
            Some(temp.path().to_path_buf()),
            4,
            None,
            None,
        );
        let analysis = generator.analysis_config();
        workflow.baseline = Some(analysis.baseline);
        workflow.pulse_threshold = Some(analysis.pulse_threshold);
        workflow.segmentation = Some(analysis.segmentation);
        workflow.calibration = analysis.calibration;

        let result = Runner::from_workflow(&workflow)
            .execute_workflow(&workflow)
            .unwrap();
        assert_eq!(result.report.shots.curves.len(), 2);
    }
}

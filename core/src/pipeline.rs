//! Orchestrates the stages from a raw recording to finished curves.
//!
//! Every stage derives a fresh value from its input, so any checkpoint
//! (`ZeroedSeries`, `DoseSeries`) can be re-entered with different settings.

use crate::config::AnalysisConfig;
use crate::prelude::{ProcessingStage, StageError, StageResult};
use crate::processing::{
    BaselineStage, CurveFinisher, DepthAggregator, DoseStage, PositionCalibrator, PulseStage,
    ShotSegmenter,
};
use crate::scan_interface::{
    DepthCurve, DoseSeries, PositionedShot, ProfileCurve, PulseSeries, RawSeries,
    SegmentedSeries, ShotSummary, ZeroedSeries,
};
use crate::telemetry::{LogManager, MetricsRecorder, MetricsSnapshot};
use serde::{Deserialize, Serialize};

/// Everything derived from the segmentation checkpoint onwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShotAnalysis {
    pub segmented: SegmentedSeries,
    pub positioned: Vec<PositionedShot>,
    pub curves: Vec<ProfileCurve>,
    pub summaries: Vec<ShotSummary>,
    pub depth_curve: Option<DepthCurve>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisReport {
    pub zeroed: ZeroedSeries,
    pub pulses: PulseSeries,
    pub dose: DoseSeries,
    pub shots: ShotAnalysis,
}

pub struct Pipeline {
    config: AnalysisConfig,
    metrics: MetricsRecorder,
    logger: LogManager,
}

impl Pipeline {
    pub fn new(config: AnalysisConfig) -> StageResult<Self> {
        config.validate()?;
        Ok(Self {
            config,
            metrics: MetricsRecorder::new(),
            logger: LogManager::new("dosecore::pipeline"),
        })
    }

    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    pub fn run(&self, raw: &RawSeries) -> StageResult<AnalysisReport> {
        let zeroed = self.zero(raw)?;
        let (pulses, dose) = self.classify_and_dose(&zeroed)?;
        let shots = self.analyze_shots(&dose)?;
        Ok(AnalysisReport {
            zeroed,
            pulses,
            dose,
            shots,
        })
    }

    pub fn zero(&self, raw: &RawSeries) -> StageResult<ZeroedSeries> {
        self.run_stage(&BaselineStage::new(self.config.baseline), raw)
    }

    pub fn classify_and_dose(
        &self,
        zeroed: &ZeroedSeries,
    ) -> StageResult<(PulseSeries, DoseSeries)> {
        let pulses = self.run_stage(&PulseStage::new(self.config.pulse_threshold), zeroed)?;
        let dose = self.run_stage(&DoseStage::new(self.config.acr), &pulses)?;
        Ok((pulses, dose))
    }

    pub fn analyze_shots(&self, dose: &DoseSeries) -> StageResult<ShotAnalysis> {
        let segmented = self.run_stage(&ShotSegmenter::new(self.config.segmentation), dose)?;
        if let Some(shot) = self
            .config
            .exclude_shot
            .filter(|shot| *shot >= segmented.shots.len())
        {
            let err = StageError::ExcludedShotOutOfRange {
                shot,
                available: segmented.shots.len(),
            };
            self.metrics.record_error();
            self.logger.failure(&err.to_string());
            return Err(err);
        }

        let mut positioned = Vec::new();
        let mut curves = Vec::new();
        let mut summaries = Vec::new();

        if let Some(calibration) = self.config.calibration {
            let calibrator = PositionCalibrator::new(calibration, self.config.peak_percentile);
            let finisher =
                CurveFinisher::new(self.config.smoothing_window, self.config.peak_percentile);

            for shot in &segmented.shots {
                if Some(shot.index) == self.config.exclude_shot {
                    self.logger.detail(&format!("shot {} excluded", shot.index));
                    continue;
                }
                let located = self.run_stage(&calibrator, shot)?;
                let curve = self.run_stage(&finisher, &located)?;
                summaries.push(summarize(&located, &curve));
                positioned.push(located);
                curves.push(curve);
                self.metrics.record_shot();
            }
        }

        let depth_curve = match &self.config.depth_table {
            Some(table) => {
                let aggregator = DepthAggregator::new(
                    table.clone(),
                    self.config.peak_percentile,
                    self.config.exclude_shot,
                );
                Some(self.run_stage(&aggregator, &segmented)?)
            }
            None => None,
        };

        Ok(ShotAnalysis {
            segmented,
            positioned,
            curves,
            summaries,
            depth_curve,
        })
    }

    fn run_stage<S>(&self, stage: &S, input: &S::Input) -> StageResult<S::Output>
    where
        S: ProcessingStage,
    {
        match stage.execute(input) {
            Ok(output) => {
                self.metrics.record_stage();
                Ok(output)
            }
            Err(err) => {
                self.metrics.record_error();
                self.logger
                    .failure(&format!("stage {} failed: {}", stage.name(), err));
                Err(err)
            }
        }
    }
}

fn summarize(located: &PositionedShot, curve: &ProfileCurve) -> ShotSummary {
    let per_mm = |count: usize| {
        if located.distance > 0.0 {
            count as f64 / located.distance
        } else {
            0.0
        }
    };
    ShotSummary {
        shot: located.shot,
        speed: located.speed,
        field_size: curve.field_size,
        samples_per_mm: per_mm(located.sample_count),
        pulses_per_mm: per_mm(located.pulse_count()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Calibration, Preset, Segmentation, ShotDetection, DEFAULT_MIN_GAP};
    use crate::scan_interface::{BaselineWindow, DepthEntry, RawSample};

    /// 100 Hz recording with offsets, small alternating noise and a pulse on
    /// every fourth sample while the beam is on. `amplitude` gives the pulse
    /// height for a time inside a beam interval.
    fn recording(duration: f64, amplitude: impl Fn(f64) -> Option<f64>) -> RawSeries {
        let count = (duration * 100.0).round() as u64;
        let samples = (0..count)
            .map(|index| {
                let time = index as f64 / 100.0;
                let noise = if index % 2 == 0 { 0.05 } else { -0.05 };
                let pulse = match amplitude(time) {
                    Some(height) if index % 4 == 0 => height,
                    _ => 0.0,
                };
                RawSample {
                    index,
                    time,
                    ch0: 3.0 + noise + pulse * 1.1,
                    ch1: 1.0 + noise + pulse * 0.1,
                }
            })
            .collect();
        RawSeries::new(samples).unwrap()
    }

    fn stationary_config(depths: &[f64]) -> AnalysisConfig {
        AnalysisConfig {
            baseline: BaselineWindow::Before { end: 1.0 },
            pulse_threshold: 1.4,
            acr: 1.0,
            segmentation: Segmentation::Detect(ShotDetection {
                chunk_size: 20,
                cutoff: 10.0,
                min_gap: DEFAULT_MIN_GAP,
                padding: 0.5,
            }),
            calibration: None,
            peak_percentile: 0.9,
            smoothing_window: 1,
            depth_table: Some(
                depths
                    .iter()
                    .map(|&depth_mm| DepthEntry {
                        depth_mm,
                        direction: None,
                    })
                    .collect(),
            ),
            exclude_shot: None,
        }
    }

    fn stationary_shots(time: f64) -> Option<f64> {
        if (2.0..4.0).contains(&time) {
            Some(80.0)
        } else if (7.0..9.0).contains(&time) {
            Some(40.0)
        } else {
            None
        }
    }

    #[test]
    fn stationary_shots_build_depth_curve() {
        let raw = recording(12.0, stationary_shots);
        let pipeline = Pipeline::new(stationary_config(&[10.0, 100.0])).unwrap();
        let report = pipeline.run(&raw).unwrap();

        assert_eq!(report.shots.segmented.shots.len(), 2);
        assert!(report.shots.curves.is_empty());
        let depth = report.shots.depth_curve.unwrap();
        assert_eq!(depth.points[0].pdd_percent, 100.0);
        assert!((depth.points[1].pdd_percent - 50.0).abs() < 0.5);
        assert!(depth.mean_error.is_none());
        assert!(report.pulses.statistics.accepted > 0);
        assert_eq!(pipeline.metrics().errors, 0);
    }

    #[test]
    fn rerun_from_dose_checkpoint_is_idempotent() {
        let raw = recording(12.0, stationary_shots);
        let pipeline = Pipeline::new(stationary_config(&[10.0, 100.0])).unwrap();
        let report = pipeline.run(&raw).unwrap();

        let again = pipeline.analyze_shots(&report.dose).unwrap();
        assert_eq!(again, report.shots);
        assert_eq!(pipeline.run(&raw).unwrap(), report);
    }

    #[test]
    fn wrong_depth_table_surfaces_mismatch() {
        let raw = recording(12.0, stationary_shots);
        let pipeline = Pipeline::new(stationary_config(&[10.0, 50.0, 100.0])).unwrap();
        assert_eq!(
            pipeline.run(&raw).unwrap_err(),
            StageError::DepthTableMismatch {
                expected: 3,
                actual: 2,
            }
        );
        assert_eq!(pipeline.metrics().errors, 1);
    }

    #[test]
    fn excluding_unknown_shot_is_an_error() {
        let raw = recording(12.0, stationary_shots);
        let mut config = stationary_config(&[10.0, 100.0]);
        config.exclude_shot = Some(2);
        let pipeline = Pipeline::new(config).unwrap();
        assert_eq!(
            pipeline.run(&raw).unwrap_err(),
            StageError::ExcludedShotOutOfRange {
                shot: 2,
                available: 2,
            }
        );
        assert_eq!(pipeline.metrics().errors, 1);
    }

    #[test]
    fn excluded_shot_is_left_out_of_depth_curve() {
        let raw = recording(12.0, stationary_shots);
        let mut config = stationary_config(&[10.0, 100.0]);
        config.exclude_shot = Some(1);
        let report = Pipeline::new(config).unwrap().run(&raw).unwrap();
        let depth = report.shots.depth_curve.unwrap();
        assert_eq!(depth.shot_doses.len(), 1);
        assert_eq!(depth.points[0].depth_mm, 10.0);
    }

    #[test]
    fn baseline_beyond_series_fails_first() {
        let raw = recording(12.0, stationary_shots);
        let mut config = stationary_config(&[10.0, 100.0]);
        config.baseline = BaselineWindow::Before { end: -5.0 };
        let pipeline = Pipeline::new(config).unwrap();
        assert!(matches!(
            pipeline.run(&raw),
            Err(StageError::EmptyBaselineWindow(_))
        ));
        assert_eq!(pipeline.metrics().stages, 0);
    }

    #[test]
    fn single_scan_depth_profile_runs_from_window() {
        // Dose falls linearly with travel time, as when the detector rises
        // from depth towards the surface.
        let raw = recording(12.0, |time| {
            (2.0..10.0)
                .contains(&time)
                .then(|| 20.0 + 10.0 * (time - 2.0))
        });
        let mut config = AnalysisConfig::preset(Preset::PddSingleScan);
        config.baseline = BaselineWindow::Before { end: 1.5 };
        config.segmentation = Segmentation::Window {
            start: 2.0,
            end: 10.0,
        };
        config.calibration = Some(Calibration::FixedDepth {
            total_depth_mm: 200.0,
        });
        config.smoothing_window = 5;

        let report = Pipeline::new(config).unwrap().run(&raw).unwrap();
        let summary = report.shots.summaries[0];
        assert!((summary.speed - 25.0).abs() < 1e-9);
        assert!(summary.field_size.is_none());
        assert!(summary.pulses_per_mm > 0.0);
        assert!(summary.samples_per_mm > summary.pulses_per_mm);

        let curve = &report.shots.curves[0];
        let peak = curve.peak().unwrap();
        assert_eq!(peak.relative_dose, 100.0);
        // Highest dose arrives last, closest to the surface.
        assert!(peak.position < 10.0);
        assert!(curve.points.first().unwrap().position > 190.0);
    }

    #[test]
    fn invalid_config_is_rejected_up_front() {
        let mut config = AnalysisConfig::preset(Preset::ProfileScan);
        config.peak_percentile = 0.3;
        assert!(matches!(
            Pipeline::new(config),
            Err(StageError::InvalidConfig(_))
        ));
    }
}

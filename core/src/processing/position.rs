use crate::config::Calibration;
use crate::math::edges::locate_half_max;
use crate::prelude::{ProcessingStage, StageError, StageResult};
use crate::scan_interface::{CalibrationKind, EdgePair, PositionedSample, PositionedShot, Shot};
use crate::telemetry::log::LogManager;

/// Maps the time axis of a shot onto detector position.
pub struct PositionCalibrator {
    calibration: Calibration,
    peak_percentile: f64,
    logger: LogManager,
}

impl PositionCalibrator {
    pub fn new(calibration: Calibration, peak_percentile: f64) -> Self {
        Self {
            calibration,
            peak_percentile,
            logger: LogManager::new("dosecore::position"),
        }
    }
}

impl ProcessingStage for PositionCalibrator {
    type Input = Shot;
    type Output = PositionedShot;

    fn name(&self) -> &'static str {
        "position"
    }

    fn execute(&self, shot: &Shot) -> StageResult<PositionedShot> {
        let degenerate = |reason: &str| StageError::DegenerateSpeed {
            shot: shot.index,
            reason: reason.to_string(),
        };

        let (Some(first), Some(last)) = (shot.samples.first(), shot.samples.last()) else {
            return Err(degenerate("shot holds no samples"));
        };
        let origin = first.time;
        let duration = last.time - origin;
        if !(duration > 0.0) {
            return Err(degenerate("shot spans no time"));
        }

        let pulses: Vec<_> = shot.pulses().copied().collect();
        let times: Vec<f64> = pulses.iter().map(|pulse| pulse.time).collect();
        let doses: Vec<f64> = pulses.iter().map(|pulse| pulse.dose).collect();

        let (kind, speed, center_offset, edges) = match self.calibration {
            Calibration::FixedFieldSize { field_size_mm } => {
                let half_max = locate_half_max(&times, &doses, self.peak_percentile)
                    .ok_or_else(|| degenerate("half-maximum edges not found"))?;
                let span = half_max.span();
                if !(span.is_finite() && span > 0.0) {
                    return Err(degenerate("half-maximum edges enclose no time"));
                }
                let speed = field_size_mm / span;
                let left = speed * (half_max.left - origin);
                let right = speed * (half_max.right - origin);
                let offset = (left + right) / 2.0;
                let edges = EdgePair {
                    left: left - offset,
                    right: right - offset,
                };
                (CalibrationKind::FixedFieldSize, speed, offset, Some(edges))
            }
            Calibration::FixedDepth { total_depth_mm } => {
                let travel_time = shot.end - shot.start;
                if !(travel_time.is_finite() && travel_time > 0.0) {
                    return Err(degenerate("shot window encloses no time"));
                }
                (
                    CalibrationKind::FixedDepth,
                    total_depth_mm / travel_time,
                    0.0,
                    None,
                )
            }
        };

        let mut previous_time = origin;
        let samples: Vec<PositionedSample> = pulses
            .iter()
            .map(|pulse| {
                let time_between_samples = pulse.time - previous_time;
                previous_time = pulse.time;
                let distance_traveled = speed * time_between_samples;
                let travelled = speed * (pulse.time - origin);
                let raw_position = match self.calibration {
                    Calibration::FixedFieldSize { .. } => travelled,
                    Calibration::FixedDepth { total_depth_mm } => total_depth_mm - travelled,
                };
                PositionedSample {
                    index: pulse.index,
                    time: pulse.time,
                    dose: pulse.dose,
                    time_between_samples,
                    distance_traveled,
                    raw_position,
                    recentered_position: raw_position - center_offset,
                }
            })
            .collect();

        self.logger.detail(&format!(
            "shot {} speed {:.3} mm/s over {} pulses",
            shot.index,
            speed,
            samples.len()
        ));

        Ok(PositionedShot {
            shot: shot.index,
            kind,
            speed,
            center_offset,
            edges,
            sample_count: shot.samples.len(),
            distance: speed * duration,
            samples,
        })
    }
}

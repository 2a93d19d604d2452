use crate::math::edges::locate_half_max;
use crate::math::stats::StatsHelper;
use crate::prelude::{ProcessingStage, StageError, StageResult};
use crate::scan_interface::{CalibrationKind, CurvePoint, PositionedShot, ProfileCurve};
use crate::telemetry::log::LogManager;

/// Smooths a positioned shot, recenters profiles on the smoothed half-maximum
/// edges and normalizes to a percentage scale.
pub struct CurveFinisher {
    window: usize,
    peak_percentile: f64,
    logger: LogManager,
}

impl CurveFinisher {
    pub fn new(window: usize, peak_percentile: f64) -> Self {
        Self {
            window,
            peak_percentile,
            logger: LogManager::new("dosecore::finish"),
        }
    }
}

impl ProcessingStage for CurveFinisher {
    type Input = PositionedShot;
    type Output = ProfileCurve;

    fn name(&self) -> &'static str {
        "finish"
    }

    fn execute(&self, input: &PositionedShot) -> StageResult<ProfileCurve> {
        let available = input.samples.len();
        if self.window == 0 || self.window > available {
            return Err(StageError::InsufficientSamplesForSmoothing {
                shot: input.shot,
                window: self.window,
                available,
            });
        }

        let doses: Vec<f64> = input.samples.iter().map(|sample| sample.dose).collect();
        let smoothed = StatsHelper::rolling_centered_mean(&doses, self.window);

        let defined: Vec<(usize, f64)> = smoothed
            .iter()
            .enumerate()
            .filter_map(|(idx, value)| value.map(|value| (idx, value)))
            .collect();
        let values: Vec<f64> = defined.iter().map(|&(_, value)| value).collect();
        let raw_positions: Vec<f64> = defined
            .iter()
            .map(|&(idx, _)| input.samples[idx].raw_position)
            .collect();

        let peak = StatsHelper::max(&values)
            .filter(|peak| *peak > 0.0)
            .ok_or(StageError::NonPositivePeak { shot: input.shot })?;

        let (center_offset, edge1, edge2) = match input.kind {
            CalibrationKind::FixedFieldSize => {
                let edges = locate_half_max(&raw_positions, &values, self.peak_percentile)
                    .ok_or(StageError::MissingHalfMaxEdge { shot: input.shot })?;
                let offset = edges.midpoint();
                (offset, Some(edges.left - offset), Some(edges.right - offset))
            }
            CalibrationKind::FixedDepth => (input.center_offset, None, None),
        };

        let points: Vec<CurvePoint> = defined
            .iter()
            .map(|&(idx, smoothed_dose)| {
                let sample = &input.samples[idx];
                CurvePoint {
                    index: sample.index,
                    time: sample.time,
                    position: sample.raw_position - center_offset,
                    smoothed_dose,
                    relative_dose: (smoothed_dose / peak * 100.0).clamp(0.0, 100.0),
                }
            })
            .collect();

        let field_size = edge1.zip(edge2).map(|(left, right)| right - left);
        if let Some(size) = field_size {
            self.logger.detail(&format!(
                "shot {} field size {:.2} mm",
                input.shot, size
            ));
        }

        Ok(ProfileCurve {
            shot: input.shot,
            kind: input.kind,
            smoothing_window: self.window,
            center_offset,
            points,
            edge1,
            edge2,
            field_size,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scan_interface::{EdgePair, PositionedSample};

    fn positioned(kind: CalibrationKind, doses: &[f64]) -> PositionedShot {
        let samples = doses
            .iter()
            .enumerate()
            .map(|(idx, &dose)| PositionedSample {
                index: idx as u64,
                time: idx as f64,
                dose,
                time_between_samples: 1.0,
                distance_traveled: idx as f64 * 2.0,
                raw_position: idx as f64 * 2.0,
                recentered_position: idx as f64 * 2.0,
            })
            .collect();
        PositionedShot {
            shot: 1,
            kind,
            speed: 2.0,
            center_offset: 0.0,
            edges: Some(EdgePair {
                left: -1.0,
                right: 1.0,
            }),
            sample_count: doses.len(),
            distance: doses.len() as f64 * 2.0,
            samples,
        }
    }

    const PROFILE: [f64; 13] = [
        0.0, 1.0, 2.0, 10.0, 50.0, 90.0, 100.0, 90.0, 50.0, 10.0, 2.0, 1.0, 0.0,
    ];

    #[test]
    fn normalized_curve_peaks_at_exactly_one_hundred() {
        let curve = CurveFinisher::new(3, 0.9)
            .execute(&positioned(CalibrationKind::FixedFieldSize, &PROFILE))
            .unwrap();

        assert_eq!(curve.points.len(), PROFILE.len() - 2);
        let peak = curve.peak().unwrap();
        assert_eq!(peak.relative_dose, 100.0);
        assert!(curve
            .points
            .iter()
            .all(|p| (0.0..=100.0).contains(&p.relative_dose)));
    }

    #[test]
    fn smoothed_edges_recenter_symmetric_profile() {
        let curve = CurveFinisher::new(3, 0.9)
            .execute(&positioned(CalibrationKind::FixedFieldSize, &PROFILE))
            .unwrap();

        assert!((curve.center_offset - 12.0).abs() < 1e-9);
        let (edge1, edge2) = (curve.edge1.unwrap(), curve.edge2.unwrap());
        assert!(edge1 < 0.0 && edge2 > 0.0);
        assert!((edge1 + edge2).abs() < 1e-9);
        assert!((curve.field_size.unwrap() - (edge2 - edge1)).abs() < 1e-12);
        assert!(curve.peak().unwrap().position.abs() < 1e-9);
    }

    #[test]
    fn undefined_edges_are_dropped_not_zero_filled() {
        let curve = CurveFinisher::new(4, 0.9)
            .execute(&positioned(CalibrationKind::FixedDepth, &PROFILE))
            .unwrap();
        assert_eq!(curve.points.len(), PROFILE.len() - 3);
        assert_eq!(curve.points[0].index, 2);
        assert!(curve.field_size.is_none());
        assert!(curve.points.iter().all(|p| p.smoothed_dose.is_finite()));
    }

    #[test]
    fn oversized_window_is_rejected() {
        let err = CurveFinisher::new(20, 0.9)
            .execute(&positioned(CalibrationKind::FixedDepth, &PROFILE))
            .unwrap_err();
        assert_eq!(
            err,
            StageError::InsufficientSamplesForSmoothing {
                shot: 1,
                window: 20,
                available: 13,
            }
        );
    }

    #[test]
    fn negative_signal_cannot_be_normalized() {
        let err = CurveFinisher::new(1, 0.9)
            .execute(&positioned(CalibrationKind::FixedDepth, &[-1.0, -2.0, -1.0]))
            .unwrap_err();
        assert_eq!(err, StageError::NonPositivePeak { shot: 1 });
    }
}

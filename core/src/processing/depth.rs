use crate::math::stats::StatsHelper;
use crate::prelude::{ProcessingStage, StageError, StageResult};
use crate::scan_interface::{DepthCurve, DepthEntry, DepthPoint, SegmentedSeries, ShotDose};
use crate::telemetry::log::LogManager;

/// Reduces every shot to one peak dose and builds a percentage depth-dose
/// curve from the shots grouped by depth.
pub struct DepthAggregator {
    table: Vec<DepthEntry>,
    peak_percentile: f64,
    exclude_shot: Option<usize>,
    logger: LogManager,
}

impl DepthAggregator {
    pub fn new(table: Vec<DepthEntry>, peak_percentile: f64, exclude_shot: Option<usize>) -> Self {
        Self {
            table,
            peak_percentile,
            exclude_shot,
            logger: LogManager::new("dosecore::depth"),
        }
    }
}

impl ProcessingStage for DepthAggregator {
    type Input = SegmentedSeries;
    type Output = DepthCurve;

    fn name(&self) -> &'static str {
        "depth"
    }

    fn execute(&self, input: &SegmentedSeries) -> StageResult<DepthCurve> {
        if self.table.len() != input.shots.len() {
            return Err(StageError::DepthTableMismatch {
                expected: self.table.len(),
                actual: input.shots.len(),
            });
        }
        if let Some(shot) = self.exclude_shot.filter(|shot| *shot >= input.shots.len()) {
            return Err(StageError::ExcludedShotOutOfRange {
                shot,
                available: input.shots.len(),
            });
        }

        let mut shot_doses = Vec::with_capacity(input.shots.len());
        for (shot, entry) in input.shots.iter().zip(&self.table) {
            if Some(shot.index) == self.exclude_shot {
                continue;
            }
            let doses: Vec<f64> = shot.pulses().map(|pulse| pulse.dose).collect();
            let max = StatsHelper::max(&doses)
                .filter(|max| *max > 0.0)
                .ok_or(StageError::NonPositivePeak { shot: shot.index })?;
            let cutoff = self.peak_percentile * max;
            let peak: Vec<f64> = doses.into_iter().filter(|dose| *dose >= cutoff).collect();
            let mean_dose =
                StatsHelper::mean(&peak).ok_or(StageError::NonPositivePeak { shot: shot.index })?;

            shot_doses.push(ShotDose {
                shot: shot.index,
                depth_mm: entry.depth_mm,
                direction: entry.direction,
                mean_dose,
            });
        }

        let mut groups: Vec<(f64, Vec<f64>)> = Vec::new();
        for dose in &shot_doses {
            match groups.iter_mut().find(|(depth, _)| *depth == dose.depth_mm) {
                Some((_, members)) => members.push(dose.mean_dose),
                None => groups.push((dose.depth_mm, vec![dose.mean_dose])),
            }
        }
        groups.sort_by(|a, b| a.0.total_cmp(&b.0));

        let means: Vec<f64> = groups
            .iter()
            .filter_map(|(_, members)| StatsHelper::mean(members))
            .collect();
        let reference = StatsHelper::max(&means)
            .filter(|max| *max > 0.0)
            .ok_or_else(|| StageError::InvalidInput("no positive depth dose to normalize".into()))?;

        let points: Vec<DepthPoint> = groups
            .iter()
            .zip(&means)
            .map(|((depth_mm, members), &mean_dose)| DepthPoint {
                depth_mm: *depth_mm,
                mean_dose,
                std_error: StatsHelper::sample_std(members),
                pdd_percent: mean_dose / reference * 100.0,
                shots: members.len(),
            })
            .collect();

        let errors: Vec<f64> = points.iter().filter_map(|point| point.std_error).collect();
        let mean_error = StatsHelper::mean(&errors);

        self.logger.record(&format!(
            "depth curve with {} depths from {} shots, mean error {}",
            points.len(),
            shot_doses.len(),
            mean_error.map_or_else(|| "n/a".to_string(), |error| format!("{error:.3}"))
        ));

        Ok(DepthCurve {
            shot_doses,
            points,
            mean_error,
        })
    }
}

use crate::math::stats::StatsHelper;
use crate::prelude::{ProcessingStage, StageError, StageResult};
use crate::scan_interface::{
    ClassifiedSample, PulseFlags, PulseSeries, PulseStatistics, ZeroedSeries,
};
use crate::telemetry::log::LogManager;

/// Flags radiation pulses on the zeroed ch0 signal and resolves pulses that
/// straddle two consecutive samples.
///
/// Only pairs are resolved. In a run of three or more flagged samples the
/// first sample is the single accepted pulse and every later sample is a
/// continuation.
pub struct PulseStage {
    threshold: f64,
    logger: LogManager,
}

impl PulseStage {
    pub fn new(threshold: f64) -> Self {
        Self {
            threshold,
            logger: LogManager::new("dosecore::pulse"),
        }
    }
}

impl ProcessingStage for PulseStage {
    type Input = ZeroedSeries;
    type Output = PulseSeries;

    fn name(&self) -> &'static str {
        "pulse"
    }

    fn execute(&self, input: &ZeroedSeries) -> StageResult<PulseSeries> {
        let window = input.window;
        let noise: Vec<f64> = input
            .samples
            .iter()
            .filter(|sample| window.contains(sample.time))
            .map(|sample| sample.ch0z)
            .collect();
        let max_baseline_noise =
            StatsHelper::max(&noise).ok_or(StageError::EmptyBaselineWindow(window))?;
        let level = self.threshold * max_baseline_noise;

        let candidates: Vec<bool> = input
            .samples
            .iter()
            .map(|sample| sample.ch0z > level)
            .collect();

        let mut statistics = PulseStatistics {
            samples: candidates.len(),
            ..Default::default()
        };
        let mut samples = Vec::with_capacity(candidates.len());
        let mut previous_coincident = false;

        for (idx, sample) in input.samples.iter().enumerate() {
            let candidate = candidates[idx];
            let coincident_with_next =
                candidate && candidates.get(idx + 1).copied().unwrap_or(false);
            let coincident_continuation = previous_coincident;
            let accepted = candidate && !coincident_continuation;

            statistics.candidates += usize::from(candidate);
            statistics.coincident_pairs += usize::from(coincident_with_next);
            statistics.accepted += usize::from(accepted);

            samples.push(ClassifiedSample {
                sample: *sample,
                flags: PulseFlags {
                    candidate,
                    coincident_with_next,
                    coincident_continuation,
                    accepted,
                },
            });
            previous_coincident = coincident_with_next;
        }

        self.logger.record(&format!(
            "pulses {} of {} candidates, {} coincident, noise {:.4}",
            statistics.accepted,
            statistics.candidates,
            statistics.coincident_pairs,
            max_baseline_noise
        ));

        Ok(PulseSeries {
            samples,
            max_baseline_noise,
            threshold: self.threshold,
            statistics,
        })
    }
}

use crate::prelude::{ProcessingStage, StageError, StageResult};
use crate::scan_interface::{DoseSample, DoseSeries, PulseSeries};
use crate::telemetry::log::LogManager;

/// Merges coincident pulse pairs and converts both channels into dose.
///
/// The first sample of a coincident pair takes the charge of both samples and
/// its successor is zeroed, so a pair keeps its total charge.
pub struct DoseStage {
    acr: f64,
    logger: LogManager,
}

impl DoseStage {
    pub fn new(acr: f64) -> Self {
        Self {
            acr,
            logger: LogManager::new("dosecore::dose"),
        }
    }
}

impl ProcessingStage for DoseStage {
    type Input = PulseSeries;
    type Output = DoseSeries;

    fn name(&self) -> &'static str {
        "dose"
    }

    fn execute(&self, input: &PulseSeries) -> StageResult<DoseSeries> {
        if !self.acr.is_finite() {
            return Err(StageError::InvalidConfig("acr must be finite".into()));
        }

        let classified = &input.samples;
        let mut samples = Vec::with_capacity(classified.len());

        for (idx, current) in classified.iter().enumerate() {
            let flags = current.flags;
            let zeroed = current.sample;

            let (ch0_merged, ch1_merged) = if flags.coincident_continuation {
                (0.0, 0.0)
            } else if flags.coincident_with_next {
                let next = classified[idx + 1].sample;
                (zeroed.ch0z + next.ch0z, zeroed.ch1z + next.ch1z)
            } else {
                (zeroed.ch0z, zeroed.ch1z)
            };

            samples.push(DoseSample {
                index: zeroed.index,
                time: zeroed.time,
                ch0_merged,
                ch1_merged,
                dose: ch0_merged - self.acr * ch1_merged,
                accepted: flags.accepted,
            });
        }

        let pulse_dose: f64 = samples.iter().filter_map(DoseSample::pulse_dose).sum();
        self.logger.record(&format!(
            "dose acr {:.4}, accumulated pulse dose {:.3}",
            self.acr, pulse_dose
        ));

        Ok(DoseSeries {
            samples,
            acr: self.acr,
        })
    }
}

use crate::math::stats::StatsHelper;
use crate::prelude::{ProcessingStage, StageError, StageResult};
use crate::scan_interface::{BaselineWindow, ChannelBaseline, RawSeries, ZeroedSample, ZeroedSeries};
use crate::telemetry::log::LogManager;

/// Removes the per-channel offset measured while the beam is off.
pub struct BaselineStage {
    window: BaselineWindow,
    logger: LogManager,
}

impl BaselineStage {
    pub fn new(window: BaselineWindow) -> Self {
        Self {
            window,
            logger: LogManager::new("dosecore::baseline"),
        }
    }
}

impl ProcessingStage for BaselineStage {
    type Input = RawSeries;
    type Output = ZeroedSeries;

    fn name(&self) -> &'static str {
        "baseline"
    }

    fn execute(&self, input: &RawSeries) -> StageResult<ZeroedSeries> {
        let (ch0, ch1): (Vec<f64>, Vec<f64>) = input
            .samples()
            .iter()
            .filter(|sample| self.window.contains(sample.time))
            .map(|sample| (sample.ch0, sample.ch1))
            .unzip();

        let (Some(ch0_offset), Some(ch1_offset)) =
            (StatsHelper::mean(&ch0), StatsHelper::mean(&ch1))
        else {
            return Err(StageError::EmptyBaselineWindow(self.window));
        };

        let samples = input
            .samples()
            .iter()
            .map(|sample| ZeroedSample {
                index: sample.index,
                time: sample.time,
                ch0: sample.ch0,
                ch1: sample.ch1,
                ch0z: sample.ch0 - ch0_offset,
                ch1z: sample.ch1 - ch1_offset,
            })
            .collect();

        self.logger.record(&format!(
            "baseline ch0 {:.4} ch1 {:.4} from {} samples",
            ch0_offset,
            ch1_offset,
            ch0.len()
        ));

        Ok(ZeroedSeries {
            samples,
            baseline: ChannelBaseline {
                ch0: ch0_offset,
                ch1: ch1_offset,
                sample_count: ch0.len(),
            },
            window: self.window,
        })
    }
}

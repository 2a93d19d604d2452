use crate::config::{Segmentation, ShotDetection};
use crate::prelude::{ProcessingStage, StageError, StageResult};
use crate::scan_interface::{
    ChunkAggregate, DoseSample, DoseSeries, SegmentedSeries, Shot, ShotTransitions,
};
use crate::telemetry::log::LogManager;

/// Partitions the time axis into beam-on shots.
pub struct ShotSegmenter {
    segmentation: Segmentation,
    logger: LogManager,
}

impl ShotSegmenter {
    pub fn new(segmentation: Segmentation) -> Self {
        Self {
            segmentation,
            logger: LogManager::new("dosecore::segment"),
        }
    }

    fn detect(
        &self,
        samples: &[DoseSample],
        detection: &ShotDetection,
    ) -> StageResult<(Vec<(f64, f64)>, Vec<ChunkAggregate>, ShotTransitions)> {
        let chunks = aggregate_chunks(samples, detection.chunk_size);
        let inner = if chunks.len() > 2 {
            &chunks[1..chunks.len() - 1]
        } else {
            &[][..]
        };

        let mut starts = Vec::new();
        let mut ends = Vec::new();
        for pair in inner.windows(2) {
            let step = pair[1].charge - pair[0].charge;
            if step > detection.cutoff {
                starts.push(pair[1].min_time);
            } else if step < -detection.cutoff {
                ends.push(pair[1].max_time);
            }
        }

        let transitions = ShotTransitions {
            starts: collapse(&starts, detection.min_gap),
            ends: collapse(&ends, detection.min_gap),
        };
        if transitions.starts.is_empty() || transitions.starts.len() != transitions.ends.len() {
            return Err(StageError::SegmentationMismatch {
                starts: transitions.starts.len(),
                ends: transitions.ends.len(),
            });
        }

        let bounds = transitions
            .starts
            .iter()
            .zip(&transitions.ends)
            .map(|(start, end)| (start - detection.padding, end + detection.padding))
            .collect();

        Ok((bounds, chunks, transitions))
    }
}

impl ProcessingStage for ShotSegmenter {
    type Input = DoseSeries;
    type Output = SegmentedSeries;

    fn name(&self) -> &'static str {
        "segment"
    }

    fn execute(&self, input: &DoseSeries) -> StageResult<SegmentedSeries> {
        let (bounds, chunks, transitions) = match &self.segmentation {
            Segmentation::Detect(detection) => self.detect(&input.samples, detection)?,
            Segmentation::Window { start, end } => (
                vec![(*start, *end)],
                Vec::new(),
                ShotTransitions {
                    starts: vec![*start],
                    ends: vec![*end],
                },
            ),
        };

        for (shot, &(start, end)) in bounds.iter().enumerate() {
            let overlaps_next = bounds
                .get(shot + 1)
                .map_or(false, |&(next_start, _)| next_start < end);
            if start >= end || overlaps_next {
                return Err(StageError::MisorderedShot { shot });
            }
        }

        let mut shots: Vec<Shot> = bounds
            .iter()
            .enumerate()
            .map(|(index, &(start, end))| Shot {
                index,
                start,
                end,
                samples: Vec::new(),
            })
            .collect();

        let mut labels = Vec::with_capacity(input.samples.len());
        for sample in &input.samples {
            let label = shots.iter().position(|shot| shot.contains(sample.time));
            if let Some(shot) = label {
                shots[shot].samples.push(*sample);
            }
            labels.push(label);
        }

        for shot in &shots {
            self.logger.detail(&format!(
                "shot {} [{:.3}, {:.3}] with {} samples, {} pulses",
                shot.index,
                shot.start,
                shot.end,
                shot.samples.len(),
                shot.pulse_count()
            ));
        }
        self.logger.record(&format!("segmented {} shots", shots.len()));

        Ok(SegmentedSeries {
            shots,
            labels,
            chunks,
            transitions,
        })
    }
}

/// Sums merged ch0 charge over consecutive blocks of `chunk_size` sample indices.
fn aggregate_chunks(samples: &[DoseSample], chunk_size: usize) -> Vec<ChunkAggregate> {
    let size = chunk_size.max(1) as u64;
    let mut chunks: Vec<ChunkAggregate> = Vec::new();
    for sample in samples {
        let chunk = sample.index / size;
        match chunks.last_mut() {
            Some(current) if current.chunk == chunk => {
                current.min_time = current.min_time.min(sample.time);
                current.max_time = current.max_time.max(sample.time);
                current.charge += sample.ch0_merged;
            }
            _ => chunks.push(ChunkAggregate {
                chunk,
                min_time: sample.time,
                max_time: sample.time,
                charge: sample.ch0_merged,
            }),
        }
    }
    chunks
}

/// Keeps the first transition of every run whose neighbours lie within `min_gap`.
fn collapse(times: &[f64], min_gap: f64) -> Vec<f64> {
    let mut kept = Vec::new();
    for (idx, &time) in times.iter().enumerate() {
        if idx == 0 || time - times[idx - 1] > min_gap {
            kept.push(time);
        }
    }
    kept
}

use crate::generator::template::gaussian_profile;
use anyhow::{ensure, Context};
use dosecore::config::{Calibration, Segmentation, ShotDetection, DEFAULT_MIN_GAP};
use dosecore::scan_interface::{BaselineWindow, RawSample, RawSeries};
use dosecore::AnalysisConfig;
use rand::{rngs::StdRng, Rng, SeedableRng};
use serde::{Deserialize, Serialize};

/// Configuration for generating a synthetic profile-scan recording.
///
/// Every shot sweeps the detector at constant speed across a Gaussian field,
/// starting and ending `scan_half_range_mm` either side of the central axis.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneratorConfig {
    pub sample_interval: f64,
    pub duration: f64,
    /// Beam-on times of the shots.
    pub shot_starts: Vec<f64>,
    pub field_size_mm: f64,
    pub scan_speed: f64,
    pub scan_half_range_mm: f64,
    pub peak_dose: f64,
    /// A pulse lands on every `pulse_period`-th sample.
    pub pulse_period: usize,
    /// Every `split_every`-th pulse straddles two adjacent samples; 0 disables.
    pub split_every: usize,
    pub split_fraction: f64,
    pub ch0_offset: f64,
    pub ch1_offset: f64,
    /// Stem signal seen by ch1 as a fraction of the primary signal.
    pub stem_fraction: f64,
    pub acr: f64,
    pub noise: f64,
    pub seed: u64,
    pub scenario: Option<String>,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            sample_interval: 0.002,
            duration: 15.0,
            shot_starts: vec![3.0, 10.0],
            field_size_mm: 50.0,
            scan_speed: 50.0,
            scan_half_range_mm: 60.0,
            peak_dose: 100.0,
            pulse_period: 3,
            split_every: 10,
            split_fraction: 0.6,
            ch0_offset: 2.0,
            ch1_offset: 1.5,
            stem_fraction: 0.05,
            acr: 0.949,
            noise: 0.2,
            seed: 0,
            scenario: None,
        }
    }
}

impl GeneratorConfig {
    pub fn shot_duration(&self) -> f64 {
        2.0 * self.scan_half_range_mm / self.scan_speed
    }

    fn validate(&self) -> anyhow::Result<()> {
        ensure!(
            self.sample_interval > 0.0 && self.duration > self.sample_interval,
            "generator needs a positive sample interval shorter than the duration"
        );
        ensure!(
            self.scan_speed > 0.0 && self.scan_half_range_mm > 0.0,
            "scan speed and range must be positive"
        );
        ensure!(self.field_size_mm > 0.0, "field size must be positive");
        ensure!(!self.shot_starts.is_empty(), "at least one shot is required");
        ensure!(
            self.shot_starts.windows(2).all(|pair| pair[1] > pair[0] + self.shot_duration()),
            "shots must be ordered and must not overlap"
        );
        ensure!(
            self.shot_starts.iter().all(|start| *start > 1.0),
            "first shot must leave at least one second of baseline"
        );
        // A split pulse occupies two samples, so the next pulse must not touch it.
        ensure!(
            self.pulse_period >= 3 || (self.split_every == 0 && self.pulse_period >= 2),
            "pulse period too short to keep pulses apart"
        );
        ensure!(
            (0.0..=1.0).contains(&self.split_fraction),
            "split fraction must lie in [0, 1]"
        );
        ensure!(self.noise >= 0.0, "noise amplitude must be non-negative");
        Ok(())
    }

    /// Analysis settings that recover the generated field.
    pub fn analysis_config(&self) -> AnalysisConfig {
        AnalysisConfig {
            baseline: BaselineWindow::Before {
                end: self.shot_starts.first().copied().unwrap_or(2.0) - 1.0,
            },
            pulse_threshold: 1.4,
            acr: self.acr,
            segmentation: Segmentation::Detect(ShotDetection {
                chunk_size: 200,
                cutoff: 50.0,
                min_gap: DEFAULT_MIN_GAP,
                padding: 2.0,
            }),
            calibration: Some(Calibration::FixedFieldSize {
                field_size_mm: self.field_size_mm,
            }),
            peak_percentile: 0.9,
            smoothing_window: 5,
            depth_table: None,
            exclude_shot: None,
        }
    }
}

/// Primary signal per sample before offsets, stem and noise are added.
fn build_signal(config: &GeneratorConfig, sample_count: usize) -> Vec<f64> {
    let mut signal = vec![0.0; sample_count];
    let dt = config.sample_interval;

    for &start in &config.shot_starts {
        let first = (start / dt).round() as usize;
        let last = (((start + config.shot_duration()) / dt).round() as usize).min(sample_count);
        for (pulse, index) in (first..last).step_by(config.pulse_period).enumerate() {
            let time = index as f64 * dt;
            let position = -config.scan_half_range_mm + config.scan_speed * (time - start);
            let height = config.peak_dose * gaussian_profile(position, config.field_size_mm);

            let split = config.split_every > 0
                && pulse % config.split_every == config.split_every - 1
                && index + 1 < sample_count;
            if split {
                signal[index] += height * config.split_fraction;
                signal[index + 1] += height * (1.0 - config.split_fraction);
            } else {
                signal[index] += height;
            }
        }
    }

    signal
}

pub fn build_scan(config: &GeneratorConfig) -> anyhow::Result<RawSeries> {
    config.validate()?;
    let sample_count = (config.duration / config.sample_interval).round() as usize;
    let signal = build_signal(config, sample_count);

    let mut rng = StdRng::seed_from_u64(config.seed);
    let mut jitter = || {
        if config.noise > 0.0 {
            rng.gen_range(-config.noise..config.noise)
        } else {
            0.0
        }
    };

    let samples = signal
        .iter()
        .enumerate()
        .map(|(index, &primary)| {
            let stem = config.stem_fraction * primary;
            RawSample {
                index: index as u64,
                time: index as f64 * config.sample_interval,
                ch0: config.ch0_offset + primary + config.acr * stem + jitter(),
                ch1: config.ch1_offset + stem + jitter(),
            }
        })
        .collect();

    RawSeries::new(samples).context("assembling synthetic recording")
}

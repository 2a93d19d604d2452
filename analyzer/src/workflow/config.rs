use crate::loader::DEFAULT_SKIP_ROWS;
use anyhow::Context;
use dosecore::config::{Calibration, Segmentation};
use dosecore::scan_interface::{BaselineWindow, DepthEntry};
use dosecore::{AnalysisConfig, Preset};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

fn default_skip_rows() -> usize {
    DEFAULT_SKIP_ROWS
}

/// Command-line values that take precedence over a loaded workflow.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct CliOverrides {
    pub preset: Option<Preset>,
    pub input: Option<PathBuf>,
    pub skip_rows: Option<usize>,
    pub smoothing_window: Option<usize>,
    pub acr: Option<f64>,
}

/// Run description for the offline driver. A preset supplies every analysis
/// setting; any field given here replaces the preset value.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct WorkflowConfig {
    pub preset: Preset,
    #[serde(default)]
    pub input: Option<PathBuf>,
    #[serde(default = "default_skip_rows")]
    pub skip_rows: usize,
    #[serde(default)]
    pub baseline: Option<BaselineWindow>,
    #[serde(default)]
    pub pulse_threshold: Option<f64>,
    #[serde(default)]
    pub acr: Option<f64>,
    #[serde(default)]
    pub segmentation: Option<Segmentation>,
    #[serde(default)]
    pub calibration: Option<Calibration>,
    #[serde(default)]
    pub peak_percentile: Option<f64>,
    #[serde(default)]
    pub smoothing_window: Option<usize>,
    #[serde(default)]
    pub depth_table: Option<Vec<DepthEntry>>,
    #[serde(default)]
    pub exclude_shot: Option<usize>,
}

impl WorkflowConfig {
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path_ref = path.as_ref();
        let contents = fs::read_to_string(path_ref)
            .with_context(|| format!("reading workflow config {}", path_ref.display()))?;
        let config: WorkflowConfig = serde_yaml::from_str(&contents)
            .with_context(|| format!("parsing workflow config {}", path_ref.display()))?;
        Ok(config)
    }

    pub fn from_args(
        preset: Preset,
        input: Option<PathBuf>,
        skip_rows: usize,
        smoothing_window: Option<usize>,
        acr: Option<f64>,
    ) -> Self {
        Self {
            preset,
            input,
            skip_rows,
            baseline: None,
            pulse_threshold: None,
            acr,
            segmentation: None,
            calibration: None,
            peak_percentile: None,
            smoothing_window,
            depth_table: None,
            exclude_shot: None,
        }
    }

    /// Workflow built from the command line alone, on top of the profile-scan preset.
    pub fn from_overrides(overrides: &CliOverrides) -> Self {
        let mut config = Self::from_args(Preset::ProfileScan, None, DEFAULT_SKIP_ROWS, None, None);
        config.apply_overrides(overrides);
        config
    }

    pub fn apply_overrides(&mut self, overrides: &CliOverrides) {
        if let Some(preset) = overrides.preset {
            self.preset = preset;
        }
        if overrides.input.is_some() {
            self.input = overrides.input.clone();
        }
        if let Some(skip_rows) = overrides.skip_rows {
            self.skip_rows = skip_rows;
        }
        if overrides.smoothing_window.is_some() {
            self.smoothing_window = overrides.smoothing_window;
        }
        if overrides.acr.is_some() {
            self.acr = overrides.acr;
        }
    }

    pub fn to_analysis_config(&self) -> AnalysisConfig {
        let mut config = AnalysisConfig::preset(self.preset);
        if let Some(baseline) = self.baseline {
            config.baseline = baseline;
        }
        if let Some(threshold) = self.pulse_threshold {
            config.pulse_threshold = threshold;
        }
        if let Some(acr) = self.acr {
            config.acr = acr;
        }
        if let Some(segmentation) = self.segmentation {
            config.segmentation = segmentation;
        }
        if self.calibration.is_some() {
            config.calibration = self.calibration;
        }
        if let Some(percentile) = self.peak_percentile {
            config.peak_percentile = percentile;
        }
        if let Some(window) = self.smoothing_window {
            config.smoothing_window = window;
        }
        if self.depth_table.is_some() {
            config.depth_table = self.depth_table.clone();
        }
        if self.exclude_shot.is_some() {
            config.exclude_shot = self.exclude_shot;
        }
        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn config_from_args_overrides_preset() {
        let cfg = WorkflowConfig::from_args(Preset::ProfileScan, None, 4, Some(9), None);
        let analysis = cfg.to_analysis_config();
        assert_eq!(analysis.smoothing_window, 9);
        assert_eq!(analysis.acr, 0.949);
        assert!(analysis.validate().is_ok());
    }

    #[test]
    fn config_load_reads_yaml() {
        let mut temp = NamedTempFile::new().unwrap();
        temp.write_all(
            b"preset: pdd_with_profiles\ninput: scans/pdd.csv\nexclude_shot: 3\nsegmentation:\n  kind: detect\n  chunk_size: 250\n  cutoff: 35.0\n  padding: 0.5\n",
        )
        .unwrap();
        let path = temp.into_temp_path();
        let cfg = WorkflowConfig::load(&path).unwrap();
        assert_eq!(cfg.skip_rows, DEFAULT_SKIP_ROWS);
        assert_eq!(cfg.input, Some(PathBuf::from("scans/pdd.csv")));

        let analysis = cfg.to_analysis_config();
        assert_eq!(analysis.exclude_shot, Some(3));
        assert_eq!(analysis.depth_table.as_ref().map(Vec::len), Some(18));
        match analysis.segmentation {
            Segmentation::Detect(detection) => {
                assert_eq!(detection.chunk_size, 250);
                assert_eq!(detection.min_gap, 2.0);
            }
            other => panic!("unexpected segmentation {other:?}"),
        }
    }

    #[test]
    fn command_line_beats_yaml() {
        let mut temp = NamedTempFile::new().unwrap();
        temp.write_all(b"preset: profile_scan
input: scans/a.csv
skip_rows: 6
acr: 0.9
")
            .unwrap();
        let mut cfg = WorkflowConfig::load(temp.path()).unwrap();
        cfg.apply_overrides(&CliOverrides {
            preset: Some(Preset::PddSingleScan),
            skip_rows: Some(0),
            ..Default::default()
        });

        assert_eq!(cfg.preset, Preset::PddSingleScan);
        assert_eq!(cfg.skip_rows, 0);
        assert_eq!(cfg.input, Some(PathBuf::from("scans/a.csv")));
        assert_eq!(cfg.acr, Some(0.9));
        let analysis = cfg.to_analysis_config();
        assert_eq!(analysis.smoothing_window, 50);
        assert_eq!(analysis.acr, 0.9);
    }

    #[test]
    fn absent_flags_keep_yaml_values() {
        let mut temp = NamedTempFile::new().unwrap();
        temp.write_all(b"preset: pdd_with_profiles
skip_rows: 2
").unwrap();
        let mut cfg = WorkflowConfig::load(temp.path()).unwrap();
        let before = cfg.clone();
        cfg.apply_overrides(&CliOverrides::default());
        assert_eq!(cfg, before);
    }

    #[test]
    fn command_line_alone_defaults_to_profile_scan() {
        let cfg = WorkflowConfig::from_overrides(&CliOverrides {
            smoothing_window: Some(7),
            ..Default::default()
        });
        assert_eq!(cfg.preset, Preset::ProfileScan);
        assert_eq!(cfg.skip_rows, DEFAULT_SKIP_ROWS);
        assert_eq!(cfg.to_analysis_config().smoothing_window, 7);
    }

    #[test]
    fn unknown_preset_is_rejected() {
        let mut temp = NamedTempFile::new().unwrap();
        temp.write_all(b"preset: film_scan\n").unwrap();
        assert!(WorkflowConfig::load(temp.path()).is_err());
    }
}

use anyhow::Context;
use clap::Parser;
use dosecore::Preset;
use generator::profile::{build_scan, GeneratorConfig};
use gui_bridge::bridge::{bind_address, GuiBridge};
use gui_bridge::model::VisualizationModel;
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::runtime::Builder as TokioBuilder;
use tokio::signal;
use workflow::config::{CliOverrides, WorkflowConfig};
use workflow::runner::{Runner, WorkflowResult};

mod generator;
mod gui_bridge;
mod loader;
mod workflow;

#[derive(Parser)]
#[command(author, version, about = "Offline driver for scanning dosimetry recordings")]
struct Args {
    /// Recording to analyse; a synthetic profile scan is used when omitted
    #[arg(long)]
    input: Option<PathBuf>,
    /// Load a workflow config from YAML
    #[arg(long)]
    workflow: Option<PathBuf>,
    /// Analysis preset; profile-scan unless the workflow names one
    #[arg(long, value_enum)]
    preset: Option<PresetArg>,
    /// Metadata lines ahead of the CSV header; 4 unless the workflow names a count
    #[arg(long)]
    skip_rows: Option<usize>,
    /// Smoothing window in pulses
    #[arg(long)]
    smooth: Option<usize>,
    /// Air-to-chamber (channel-balance) ratio applied to ch1 in the dose conversion
    #[arg(long)]
    acr: Option<f64>,
    /// Write the full analysis report as JSON
    #[arg(long)]
    report: Option<PathBuf>,
    /// Keep the report bridge alive for incoming recordings
    #[arg(long, default_value_t = false)]
    serve: bool,
    #[arg(long, default_value_t = 9000)]
    port: u16,
}

#[derive(Clone, Copy, clap::ValueEnum)]
enum PresetArg {
    PddSingleScan,
    PddWithProfiles,
    ProfileScan,
}

impl From<PresetArg> for Preset {
    fn from(arg: PresetArg) -> Self {
        match arg {
            PresetArg::PddSingleScan => Preset::PddSingleScan,
            PresetArg::PddWithProfiles => Preset::PddWithProfiles,
            PresetArg::ProfileScan => Preset::ProfileScan,
        }
    }
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let args = Args::parse();

    let overrides = CliOverrides {
        preset: args.preset.map(Preset::from),
        input: args.input.clone(),
        skip_rows: args.skip_rows,
        smoothing_window: args.smooth,
        acr: args.acr,
    };
    let workflow_config = if let Some(path) = &args.workflow {
        let mut config = WorkflowConfig::load(path)?;
        config.apply_overrides(&overrides);
        config
    } else {
        WorkflowConfig::from_overrides(&overrides)
    };

    let (runner, result) = match workflow_config.input.as_ref() {
        Some(path) => {
            log::info!("analysing {}", path.display());
            let runner = Runner::from_workflow(&workflow_config);
            let result = runner.execute_workflow(&workflow_config)?;
            (runner, result)
        }
        None => {
            log::info!("no input recording given, analysing a synthetic profile scan");
            let generator = GeneratorConfig::default();
            let runner = Runner::new(generator.analysis_config());
            let raw = build_scan(&generator)?;
            let result = runner.execute(&raw)?;
            (runner, result)
        }
    };

    print_summary(&result);

    if let Some(path) = &args.report {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(&result).context("serializing report")?;
        fs::write(path, json).with_context(|| format!("writing report {}", path.display()))?;
        log::info!("report written to {}", path.display());
    }

    if args.serve {
        let gui_bridge = GuiBridge::new(Arc::new(runner));
        gui_bridge.publish(&VisualizationModel::from_result(&result));
        gui_bridge.serve(bind_address(args.port));
        println!("Report bridge running on port {} (Ctrl+C to stop)...", args.port);
        let runtime = TokioBuilder::new_current_thread()
            .enable_all()
            .build()
            .context("creating runtime for signal handling")?;
        runtime.block_on(async {
            signal::ctrl_c().await.context("awaiting Ctrl+C to exit")?;
            Ok::<(), anyhow::Error>(())
        })?;
    }

    Ok(())
}

fn print_summary(result: &WorkflowResult) {
    let report = &result.report;
    let stats = report.pulses.statistics;
    println!(
        "pulses: {} candidates, {} coincident pairs, {} accepted (threshold {:.4})",
        stats.candidates, stats.coincident_pairs, stats.accepted, report.pulses.threshold
    );
    println!("shots: {}", report.shots.segmented.shots.len());
    for summary in &report.shots.summaries {
        let field = summary
            .field_size
            .map_or_else(|| "-".to_string(), |size| format!("{size:.2} mm"));
        println!(
            "  shot {}: speed {:.3} mm/s, field {}, {:.2} samples/mm, {:.2} pulses/mm",
            summary.shot, summary.speed, field, summary.samples_per_mm, summary.pulses_per_mm
        );
    }
    if let Some(depth) = &report.shots.depth_curve {
        for point in &depth.points {
            println!(
                "  depth {:>6.1} mm: {:>6.2} %  ({} shots)",
                point.depth_mm, point.pdd_percent, point.shots
            );
        }
        if let Some(error) = depth.mean_error {
            println!("  mean error {error:.4}");
        }
    }
    println!(
        "stages: {}, errors: {}",
        result.metrics.stages, result.metrics.errors
    );
}

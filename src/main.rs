// src/main.rs

use clap::Parser;
use std::error::Error;
use std::fs;
use std::path::{Path, PathBuf};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use MoCap_CSV_Clean::config::{CleaningConfig, CutoffMode};
use MoCap_CSV_Clean::data_analysis::winter_cutoff::CutoffDecision;
use MoCap_CSV_Clean::data_input::trial_parser::parse_trial_file;
use MoCap_CSV_Clean::data_output::export::{export_cleaned_trial, OutputPaths};
use MoCap_CSV_Clean::pipeline::{clean_trial, CleanedTrial};
use MoCap_CSV_Clean::quality::RecordingContext;

#[derive(Parser, Debug)]
#[command(name = "mocap_clean")]
#[command(version = MoCap_CSV_Clean::crate_version())]
#[command(about = "Cleans motion-capture trials: artifact masking, gap filling, Winter filtering and burst tiers", long_about = None)]
struct Args {
    /// Trial CSV files (`time` column plus `<joint>__<suffix>` channels)
    #[arg(value_name = "INPUT", required = true)]
    inputs: Vec<PathBuf>,

    /// Output directory (defaults to each input's own directory)
    #[arg(long, value_name = "DIR")]
    output_dir: Option<PathBuf>,

    /// JSON file overriding any part of the default configuration
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// MAD multiplier for velocity artifact detection
    #[arg(long)]
    mad_multiplier: Option<f64>,

    /// Longest gap to interpolate, in milliseconds
    #[arg(long)]
    max_gap_ms: Option<f64>,

    /// Cutoff assignment: per-signal or trunk-global
    #[arg(long, value_parser = parse_cutoff_mode)]
    cutoff_mode: Option<CutoffMode>,

    /// The recording is expected to contain high-intensity movement
    #[arg(long, default_value_t = false)]
    expect_high_intensity: bool,
}

fn parse_cutoff_mode(value: &str) -> Result<CutoffMode, String> {
    match value.to_ascii_lowercase().replace('_', "-").as_str() {
        "per-signal" => Ok(CutoffMode::PerSignal),
        "trunk-global" => Ok(CutoffMode::TrunkGlobal),
        other => Err(format!("unknown cutoff mode '{other}' (expected per-signal or trunk-global)")),
    }
}

/// Defaults, then the JSON file, then individual flags
fn build_config(args: &Args) -> Result<CleaningConfig, Box<dyn Error>> {
    let mut config = match &args.config {
        Some(path) => CleaningConfig::from_json_str(&fs::read_to_string(path)?)?,
        None => CleaningConfig::default(),
    };
    if let Some(multiplier) = args.mad_multiplier {
        config.artifact.mad_multiplier = multiplier;
    }
    if let Some(max_gap_ms) = args.max_gap_ms {
        config.gap_fill.max_gap_s = max_gap_ms / 1000.0;
    }
    if let Some(mode) = args.cutoff_mode {
        config.winter.mode = mode;
    }
    config.validate()?;
    Ok(config)
}

fn print_summary(input: &Path, cleaned: &CleanedTrial) {
    let report = &cleaned.report;
    println!("\n--- {} ---", input.display());
    match report.sample_rate_hz {
        Some(fs) => println!("Frames: {}  Sample rate: {:.1} Hz", report.frames, fs),
        None => println!("Frames: {}  Sample rate: unknown", report.frames),
    }
    println!("Cutoff mode: {}", report.winter.mode.name());
    for analysis in &report.winter.analyses {
        match analysis.decision {
            CutoffDecision::Selected {
                cutoff_hz,
                raw_knee_hz,
                region,
                guardrail_applied,
            } => println!(
                "  {:<20} {:>5.1} Hz (knee {:.1} Hz{})",
                analysis.signal,
                cutoff_hz,
                raw_knee_hz,
                if guardrail_applied {
                    format!(", clamped to the {} guardrail", region.name())
                } else {
                    String::new()
                }
            ),
            CutoffDecision::Failed {
                reason,
                fallback_cutoff_hz,
            } => println!(
                "  {:<20} {:>5.1} Hz (WINTER ANALYSIS FAILED: {})",
                analysis.signal,
                fallback_cutoff_hz,
                reason.describe()
            ),
        }
    }
    println!(
        "Frame tiers: {} clean, {} burst, {} artifact",
        report.frame_tiers.clean, report.frame_tiers.burst, report.frame_tiers.artifact
    );
    println!(
        "Missing after gap fill: {:.2}%",
        report.grade_inputs.missing_fraction * 100.0
    );
    println!("Status: {:?}  Grade: {}", report.status, report.grade.name());
}

fn process_file(input: &Path, args: &Args, config: &CleaningConfig) -> Result<(), Box<dyn Error>> {
    let trial = parse_trial_file(input)?;
    let context = RecordingContext {
        expected_high_intensity: args.expect_high_intensity,
    };
    let cleaned = clean_trial(&trial, config, context)?;

    let output_dir = match &args.output_dir {
        Some(dir) => dir.clone(),
        None => input
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from(".")),
    };
    fs::create_dir_all(&output_dir)?;
    let paths = OutputPaths::for_input(input, &output_dir);
    export_cleaned_trial(&cleaned, &paths)?;

    print_summary(input, &cleaned);
    println!("Cleaned table: {}", paths.cleaned_csv.display());
    println!("Frame tiers:   {}", paths.tiers_csv.display());
    println!("Report:        {}", paths.report_json.display());
    Ok(())
}

fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let args = Args::parse();
    let config = build_config(&args)?;

    // Each trial is independent; one bad file does not stop the batch
    let mut failures = 0usize;
    for input in &args.inputs {
        if let Err(e) = process_file(input, &args, &config) {
            eprintln!("Error processing {}: {}", input.display(), e);
            failures += 1;
        }
    }

    if failures > 0 {
        return Err(format!("{} of {} trial(s) failed", failures, args.inputs.len()).into());
    }
    Ok(())
}

// src/main.rs

// src/data_output/export.rs

use csv::WriterBuilder;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::data_analysis::burst_classifier::Tier;
use crate::data_input::trial_data::TrialData;
use crate::error::CleaningError;
use crate::pipeline::{CleanedTrial, TrialReport};

/// Output files written for one input trial
#[derive(Debug, Clone)]
pub struct OutputPaths {
    pub cleaned_csv: PathBuf,
    pub tiers_csv: PathBuf,
    pub report_json: PathBuf,
}

impl OutputPaths {
    /// `<stem>_cleaned.csv`, `<stem>_tiers.csv` and `<stem>_report.json` in `output_dir`
    pub fn for_input(input: &Path, output_dir: &Path) -> Self {
        let stem = input
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "trial".to_string());
        Self {
            cleaned_csv: output_dir.join(format!("{stem}_cleaned.csv")),
            tiers_csv: output_dir.join(format!("{stem}_tiers.csv")),
            report_json: output_dir.join(format!("{stem}_report.json")),
        }
    }
}

/// Missing values are written as empty cells, which the reader maps back to NaN
fn format_value(value: f64) -> String {
    if value.is_finite() {
        value.to_string()
    } else {
        String::new()
    }
}

/// Writes a trial table: `time` followed by the `<joint>__<suffix>` columns.
pub fn write_trial_csv<W: Write>(writer: W, trial: &TrialData) -> Result<(), CleaningError> {
    let mut csv_writer = WriterBuilder::new().from_writer(writer);
    let mut header = Vec::with_capacity(trial.channels.len() + 1);
    header.push("time".to_string());
    header.extend(trial.channels.iter().map(|c| c.header()));
    csv_writer.write_record(&header)?;

    for (frame, row) in trial.values.outer_iter().enumerate() {
        let mut record = Vec::with_capacity(row.len() + 1);
        record.push(trial.times[frame].to_string());
        record.extend(row.iter().map(|&v| format_value(v)));
        csv_writer.write_record(&record)?;
    }
    csv_writer.flush()?;
    Ok(())
}

/// Writes per-frame tiers: `time`, `trial`, then one column per joint.
pub fn write_tiers_csv<W: Write>(writer: W, cleaned: &CleanedTrial) -> Result<(), CleaningError> {
    let mut csv_writer = WriterBuilder::new().from_writer(writer);
    let mut header = vec!["time".to_string(), "trial".to_string()];
    header.extend(cleaned.joint_tiers.iter().map(|(joint, _)| joint.clone()));
    csv_writer.write_record(&header)?;

    let tier_at = |tiers: &[Tier], frame: usize| tiers.get(frame).map_or("", |t| t.name());
    for (frame, time) in cleaned.trial.times.iter().enumerate() {
        let mut record = vec![time.to_string(), tier_at(&cleaned.frame_tiers, frame).to_string()];
        record.extend(
            cleaned
                .joint_tiers
                .iter()
                .map(|(_, tiers)| tier_at(tiers, frame).to_string()),
        );
        csv_writer.write_record(&record)?;
    }
    csv_writer.flush()?;
    Ok(())
}

/// Pretty-printed JSON report
pub fn write_report_json<W: Write>(writer: W, report: &TrialReport) -> Result<(), CleaningError> {
    serde_json::to_writer_pretty(writer, report)?;
    Ok(())
}

/// Writes all three outputs for a cleaned trial
pub fn export_cleaned_trial(cleaned: &CleanedTrial, paths: &OutputPaths) -> Result<(), CleaningError> {
    write_trial_csv(BufWriter::new(File::create(&paths.cleaned_csv)?), &cleaned.trial)?;
    write_tiers_csv(BufWriter::new(File::create(&paths.tiers_csv)?), cleaned)?;
    let mut report_writer = BufWriter::new(File::create(&paths.report_json)?);
    write_report_json(&mut report_writer, &cleaned.report)?;
    report_writer.flush()?;
    Ok(())
}


// src/data_output/export.rs

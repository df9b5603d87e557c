// src/data_input/trial_parser.rs

use csv::ReaderBuilder;
use ndarray::{Array1, Array2};
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;
use tracing::{debug, warn};

use crate::data_input::trial_data::{ChannelName, TrialData};
use crate::error::CleaningError;

/// Accepted timestamp headers, in seconds unless marked otherwise
const TIME_HEADERS_SECONDS: [&str; 4] = ["time", "time_s", "timestamp", "time (s)"];
const TIME_HEADERS_MICROS: [&str; 1] = ["time (us)"];

/// Parses a trial CSV file: one timestamp column plus `<joint>__<suffix>` channels.
pub fn parse_trial_file(input_file_path: &Path) -> Result<TrialData, CleaningError> {
    let file = File::open(input_file_path)?;
    parse_trial_reader(BufReader::new(file))
}

/// Parses trial CSV content from any reader.
///
/// Empty or unparseable cells become NaN (treated as missing by every stage).
/// Columns that do not follow the naming convention are skipped with a warning.
/// Rows without a valid timestamp are skipped.
pub fn parse_trial_reader<R: Read>(reader: R) -> Result<TrialData, CleaningError> {
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_reader(reader);
    let header_record = reader.headers()?.clone();

    // --- Header mapping ---
    let mut time_index: Option<(usize, f64)> = None;
    let mut channel_columns: Vec<(usize, ChannelName)> = Vec::new();

    for (csv_idx, header) in header_record.iter().enumerate() {
        let lowered = header.trim().to_ascii_lowercase();
        if time_index.is_none() && TIME_HEADERS_SECONDS.contains(&lowered.as_str()) {
            time_index = Some((csv_idx, 1.0));
            continue;
        }
        if time_index.is_none() && TIME_HEADERS_MICROS.contains(&lowered.as_str()) {
            time_index = Some((csv_idx, 1e-6));
            continue;
        }
        match ChannelName::parse(header) {
            Some(channel) => {
                if channel_columns.iter().any(|(_, c)| c == &channel) {
                    warn!("Duplicate channel column '{}' ignored", header);
                } else {
                    channel_columns.push((csv_idx, channel));
                }
            }
            None => warn!("Skipping column '{}' (not <joint>__<suffix>)", header),
        }
    }

    let (time_idx, time_scale) = time_index.ok_or_else(|| {
        CleaningError::Parse("Could not find a timestamp column (time, time_s, timestamp)".to_string())
    })?;
    if channel_columns.is_empty() {
        return Err(CleaningError::Parse(
            "No <joint>__<suffix> channel columns found".to_string(),
        ));
    }

    // --- Rows ---
    let mut times: Vec<f64> = Vec::new();
    let mut flat_values: Vec<f64> = Vec::new();

    for (row_index, result) in reader.records().enumerate() {
        let record = result?;
        let time = record
            .get(time_idx)
            .and_then(|s| s.parse::<f64>().ok())
            .filter(|t| t.is_finite());
        let Some(time) = time else {
            warn!(
                "Skipping row {} due to missing or invalid timestamp",
                row_index + 1
            );
            continue;
        };
        times.push(time * time_scale);
        for (csv_idx, _) in &channel_columns {
            let value = record
                .get(*csv_idx)
                .and_then(|s| s.parse::<f64>().ok())
                .unwrap_or(f64::NAN);
            flat_values.push(value);
        }
    }

    if times.is_empty() {
        return Err(CleaningError::EmptyInput("trial contains no data rows"));
    }

    let n_frames = times.len();
    let n_channels = channel_columns.len();
    let values = Array2::from_shape_vec((n_frames, n_channels), flat_values)
        .map_err(|e| CleaningError::InvariantViolation(format!("trial table shape: {e}")))?;
    let channels = channel_columns.into_iter().map(|(_, c)| c).collect();

    debug!(
        frames = n_frames,
        channels = n_channels,
        "Parsed trial table"
    );
    TrialData::new(Array1::from(times), values, channels)
}

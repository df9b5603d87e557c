// tests/pipeline_integration_test.rs

use std::f64::consts::PI;
use std::fmt::Write as _;

use MoCap_CSV_Clean::config::{CleaningConfig, CutoffMode};
use MoCap_CSV_Clean::data_analysis::burst_classifier::{ArtifactReason, Tier};
use MoCap_CSV_Clean::data_input::trial_data::TrialData;
use MoCap_CSV_Clean::data_input::trial_parser::parse_trial_reader;
use MoCap_CSV_Clean::data_output::export::write_trial_csv;
use MoCap_CSV_Clean::pipeline::clean_trial;
use MoCap_CSV_Clean::quality::{QualityGrade, RecordingContext, RunStatus};

const FS: f64 = 100.0;
const FRAMES: usize = 400;
const SPIKE_FRAME: usize = 200;

/// Smooth hand path starting at rest (m)
fn hand_truth(i: usize, axis: usize) -> f64 {
    let t = i as f64 / FS;
    0.1 * (axis as f64 + 1.0) * (1.0 - (2.0 * PI * t).cos())
}

/// Slow pelvis sway starting at rest (m)
fn pelvis_truth(i: usize, axis: usize) -> f64 {
    let t = i as f64 / FS;
    0.05 * (axis as f64 + 1.0) * (1.0 - (2.0 * PI * 0.5 * t).cos()) + axis as f64
}

/// Two joints; the hand carries a quaternion, a one-frame marker jump and a long
/// dropout, the pelvis a short dropout.
fn synthetic_trial_csv() -> String {
    let mut csv = String::from(
        "time,Pelvis__px,Pelvis__py,Pelvis__pz,RightHand__px,RightHand__py,RightHand__pz,\
         RightHand__qx,RightHand__qy,RightHand__qz,RightHand__qw\n",
    );
    for i in 0..FRAMES {
        let t = i as f64 / FS;
        let cell = |v: f64, missing: bool| if missing { String::new() } else { format!("{v:.9}") };

        let pelvis_missing = (100..104).contains(&i);
        let hand_missing = (300..330).contains(&i);
        let spike = if i == SPIKE_FRAME { 0.3 } else { 0.0 };
        let half_angle = 0.25 * (2.0 * PI * 0.5 * t).sin();

        let _ = writeln!(
            csv,
            "{t:.4},{},{},{},{},{},{},0,0,{:.9},{:.9}",
            cell(pelvis_truth(i, 0), pelvis_missing),
            cell(pelvis_truth(i, 1), pelvis_missing),
            cell(pelvis_truth(i, 2), pelvis_missing),
            cell(hand_truth(i, 0) + spike, hand_missing),
            cell(hand_truth(i, 1), hand_missing),
            cell(hand_truth(i, 2), hand_missing),
            half_angle.sin(),
            half_angle.cos(),
        );
    }
    csv
}

/// Clean pelvis next to a prop marker that was never tracked (all cells empty)
fn trial_with_untracked_joint_csv() -> String {
    let mut csv = String::from("time,Pelvis__px,Pelvis__py,Pelvis__pz,Prop01__px,Prop01__py,Prop01__pz\n");
    for i in 0..FRAMES {
        let _ = writeln!(
            csv,
            "{:.4},{:.9},{:.9},{:.9},,,",
            i as f64 / FS,
            pelvis_truth(i, 0),
            pelvis_truth(i, 1),
            pelvis_truth(i, 2),
        );
    }
    csv
}

fn load_trial() -> TrialData {
    parse_trial_reader(synthetic_trial_csv().as_bytes()).expect("synthetic trial parses")
}

fn column_of(trial: &TrialData, header: &str) -> usize {
    trial
        .channels
        .iter()
        .position(|c| c.header() == header)
        .expect("column present")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cleaned_trial_keeps_shape_and_channels() {
        let trial = load_trial();
        let cleaned = clean_trial(&trial, &CleaningConfig::default(), RecordingContext::default()).unwrap();
        assert_eq!(cleaned.trial.values.dim(), trial.values.dim());
        assert_eq!(cleaned.trial.channels, trial.channels);
        assert_eq!(cleaned.frame_tiers.len(), FRAMES);
        assert!((cleaned.report.sample_rate_hz.unwrap() - FS).abs() < 1e-6);
    }

    #[test]
    fn test_short_dropout_is_filled_and_long_dropout_is_not() {
        let trial = load_trial();
        let cleaned = clean_trial(&trial, &CleaningConfig::default(), RecordingContext::default()).unwrap();

        let pelvis_x = column_of(&cleaned.trial, "Pelvis__px");
        for i in 100..104 {
            let value = cleaned.trial.values[[i, pelvis_x]];
            assert!((value - pelvis_truth(i, 0)).abs() < 1e-3, "frame {i}: {value}");
        }

        let hand_y = column_of(&cleaned.trial, "RightHand__py");
        for i in 300..330 {
            assert!(cleaned.trial.values[[i, hand_y]].is_nan(), "frame {i} should stay missing");
        }
        let hand_report = &cleaned.report.joints[1];
        assert_eq!(hand_report.joint, "RightHand");
        assert!(hand_report.gap_fill.as_ref().unwrap().long_gaps >= 1);
    }

    #[test]
    fn test_marker_jump_is_removed_and_reported() {
        let trial = load_trial();
        let cleaned = clean_trial(&trial, &CleaningConfig::default(), RecordingContext::default()).unwrap();

        let hand_x = column_of(&cleaned.trial, "RightHand__px");
        let repaired = cleaned.trial.values[[SPIKE_FRAME, hand_x]];
        assert!((repaired - hand_truth(SPIKE_FRAME, 0)).abs() < 0.05, "repaired {repaired}");

        let hand_report = &cleaned.report.joints[1];
        assert!(hand_report.artifact_flags > 0);
        let linear = hand_report.linear_velocity.as_ref().unwrap();
        assert!(linear.has_reason(ArtifactReason::ExtremeSpike));
        assert_eq!(cleaned.frame_tiers[SPIKE_FRAME], Tier::Artifact);
        // Artifact frames are excluded from the clean maximum
        assert!(linear.clean_stats.raw_clean.max < linear.clean_stats.raw_all.max);

        // Pelvis is untouched by the hand's artifact
        assert_eq!(cleaned.report.joints[0].status, RunStatus::Pass);
        assert_eq!(cleaned.report.status, RunStatus::Review);
        assert!(matches!(
            cleaned.report.grade,
            QualityGrade::Silver | QualityGrade::Bronze
        ));
    }

    #[test]
    fn test_untracked_joint_is_skipped_without_downgrading() {
        let trial = parse_trial_reader(trial_with_untracked_joint_csv().as_bytes()).unwrap();
        for mode in [CutoffMode::PerSignal, CutoffMode::TrunkGlobal] {
            let mut config = CleaningConfig::default();
            config.winter.mode = mode;
            let cleaned = clean_trial(&trial, &config, RecordingContext::default()).unwrap();
            let report = &cleaned.report;

            let prop = &report.joints[1];
            assert_eq!(prop.joint, "Prop01");
            assert!(prop.skipped);
            assert!(!prop.winter_analysis_failed);
            assert_eq!(prop.cutoff_hz, None);
            assert!(prop.linear_velocity.is_none());
            assert!(!report.joints[0].skipped);

            assert!(!report.winter.any_failed());
            assert!(!report.grade_inputs.winter_analysis_failed);
            assert_eq!(report.grade_inputs.missing_fraction, 0.0);
            assert_eq!(report.status, RunStatus::Pass);
            assert_eq!(report.grade, QualityGrade::Gold);

            let prop_x = column_of(&cleaned.trial, "Prop01__px");
            assert!(cleaned.trial.values.column(prop_x).iter().all(|v| v.is_nan()));
        }
    }

    #[test]
    fn test_spline_failure_names_joint_and_frames() {
        // Frame 51 repeats frame 50's timestamp inside the pelvis span
        let csv: String = synthetic_trial_csv()
            .lines()
            .enumerate()
            .map(|(line, text)| match line {
                52 => format!("{}\n", text.replacen("0.5100,", "0.5000,", 1)),
                _ => format!("{text}\n"),
            })
            .collect();
        let trial = parse_trial_reader(csv.as_bytes()).unwrap();
        let err = clean_trial(&trial, &CleaningConfig::default(), RecordingContext::default()).unwrap_err();
        let message = err.to_string();
        assert!(message.contains("Joint Pelvis"), "{message}");
        assert!(message.contains("frames 0..=399"), "{message}");
    }

    #[test]
    fn test_quaternions_stay_unit_length() {
        let trial = load_trial();
        let cleaned = clean_trial(&trial, &CleaningConfig::default(), RecordingContext::default()).unwrap();
        let cols: Vec<usize> = ["RightHand__qx", "RightHand__qy", "RightHand__qz", "RightHand__qw"]
            .iter()
            .map(|h| column_of(&cleaned.trial, h))
            .collect();
        for i in 0..FRAMES {
            let norm: f64 = cols
                .iter()
                .map(|&c| cleaned.trial.values[[i, c]].powi(2))
                .sum::<f64>()
                .sqrt();
            assert!((norm - 1.0).abs() < 1e-9);
        }
        let angular = cleaned.report.joints[1].angular_velocity.as_ref().unwrap();
        assert_eq!(angular.worst_tier, Tier::Clean);
    }

    #[test]
    fn test_trunk_global_mode_shares_one_cutoff() {
        let trial = load_trial();
        let mut config = CleaningConfig::default();
        config.winter.mode = CutoffMode::TrunkGlobal;
        let cleaned = clean_trial(&trial, &config, RecordingContext::default()).unwrap();
        assert_eq!(cleaned.report.winter.analyses.len(), 1);
        assert_eq!(cleaned.report.winter.analyses[0].signal, "trunk_global");
        let cutoffs: Vec<Option<f64>> = cleaned.report.joints.iter().map(|j| j.cutoff_hz).collect();
        assert_eq!(cutoffs[0], cutoffs[1]);
    }

    #[test]
    fn test_expected_intensity_changes_only_policy() {
        let trial = load_trial();
        let calm = clean_trial(&trial, &CleaningConfig::default(), RecordingContext::default()).unwrap();
        let intense = clean_trial(
            &trial,
            &CleaningConfig::default(),
            RecordingContext {
                expected_high_intensity: true,
            },
        )
        .unwrap();
        // Same data decisions, same tiers
        assert_eq!(calm.frame_tiers, intense.frame_tiers);
        assert_eq!(calm.report.grade_inputs.missing_fraction, intense.report.grade_inputs.missing_fraction);
    }

    #[test]
    fn test_report_serializes_and_table_round_trips() {
        let trial = load_trial();
        let cleaned = clean_trial(&trial, &CleaningConfig::default(), RecordingContext::default()).unwrap();

        let json = serde_json::to_string(&cleaned.report).unwrap();
        assert!(json.contains("\"winter\""));
        assert!(json.contains("\"grade\""));

        let mut buffer = Vec::new();
        write_trial_csv(&mut buffer, &cleaned.trial).unwrap();
        let reread = parse_trial_reader(buffer.as_slice()).unwrap();
        assert_eq!(reread.frame_count(), FRAMES);
        assert_eq!(reread.channels, cleaned.trial.channels);
    }

    #[test]
    fn test_invalid_config_is_rejected_before_processing() {
        let trial = load_trial();
        let mut config = CleaningConfig::default();
        config.artifact.mad_multiplier = -1.0;
        assert!(clean_trial(&trial, &config, RecordingContext::default()).is_err());
    }
}

// tests/pipeline_integration_test.rs

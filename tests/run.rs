//! Integration tests for the `run` command.
use weathergen::cli::{RunOpts, handle_run_command};
use weathergen::output::{
    CLASSIFIED_FILE_NAME, SCENARIO_FILE_NAME, SCENARIO_SEGMENTS_FILE_NAME,
    SEASONAL_TOTALS_FILE_NAME, TRANSITION_MATRIX_FILE_NAME, read_classified, read_scenario,
};
use weathergen::settings::Settings;
use std::path::PathBuf;
use tempfile::tempdir;

/// Get the path to the demo model.
fn get_model_dir() -> PathBuf {
    PathBuf::from("demos/simple")
}

/// An integration test for the `run` command.
#[test]
fn test_handle_run_command() {
    unsafe { std::env::set_var("WEATHERGEN_LOG_LEVEL", "off") };

    {
        // Save results to non-existent directory to check that directory creation works
        let tempdir = tempdir().unwrap();
        let output_dir = tempdir.path().join("results");
        let opts = RunOpts {
            output_dir: Some(output_dir.clone()),
            ..Default::default()
        };
        handle_run_command(&get_model_dir(), &opts, Some(Settings::default())).unwrap();

        for file_name in [
            "metadata.toml",
            "arma_parameters.toml",
            SEASONAL_TOTALS_FILE_NAME,
            CLASSIFIED_FILE_NAME,
            TRANSITION_MATRIX_FILE_NAME,
            SCENARIO_FILE_NAME,
            SCENARIO_SEGMENTS_FILE_NAME,
        ] {
            assert!(output_dir.join(file_name).is_file(), "{file_name} missing");
        }

        // Ensemble is only saved on request
        assert!(!output_dir.join("ensemble.csv").exists());

        // Every segment of the scenario comes from a simulation of the requested category
        let scenario = read_scenario(&output_dir).unwrap();
        let classified = read_classified(&output_dir.join(CLASSIFIED_FILE_NAME)).unwrap();
        assert_eq!(scenario.segments().len(), 8);
        for segment in scenario.segments() {
            assert_eq!(
                classified.get(segment.simulation, segment.season.as_str()),
                Some(&segment.category)
            );
        }
        assert!(scenario.values().iter().all(|value| *value >= 0.0));
    }

    // Second time will fail because the logging is already initialised
    let tempdir = tempdir().unwrap();
    let opts = RunOpts {
        output_dir: Some(tempdir.path().join("results")),
        ..Default::default()
    };
    assert_eq!(
        handle_run_command(&get_model_dir(), &opts, Some(Settings::default()))
            .unwrap_err()
            .chain()
            .next()
            .unwrap()
            .to_string(),
        "Failed to initialise logging."
    );
}

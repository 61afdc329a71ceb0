//! The module responsible for writing output data to disk and reading it back.
use crate::arma::ArmaModel;
use crate::id::{Category, Season, SimulationID};
use crate::input::{input_err_msg, open_csv};
use crate::markov::TransitionMatrix;
use crate::scenario::{Scenario, Segment};
use crate::series::Ensemble;
use crate::table::{ClassifiedTable, SeasonTable, SeasonalTotals};
use anyhow::{Context, Result, bail, ensure};
use indexmap::IndexSet;
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use std::fs;
use std::iter;
use std::path::{Path, PathBuf};

pub mod metadata;

/// The root folder in which model-specific output folders will be created
const OUTPUT_DIRECTORY_ROOT: &str = "weathergen_results";

/// The output file name for the simulated trajectories
const ENSEMBLE_FILE_NAME: &str = "ensemble.csv";

/// The output file name for seasonal totals
pub const SEASONAL_TOTALS_FILE_NAME: &str = "seasonal_totals.csv";

/// The output file name for the classification of seasonal totals
pub const CLASSIFIED_FILE_NAME: &str = "classified.csv";

/// The output file name for the fitted transition matrix
pub const TRANSITION_MATRIX_FILE_NAME: &str = "transition_matrix.csv";

/// The output file name for a generated category sequence
const MARKOV_SEQUENCE_FILE_NAME: &str = "markov_sequence.csv";

/// The output file name for the assembled scenario
pub const SCENARIO_FILE_NAME: &str = "scenario.csv";

/// The output file name for the provenance of each scenario segment
pub const SCENARIO_SEGMENTS_FILE_NAME: &str = "scenario_segments.csv";

/// The output file name for fitted ARMA parameters
const ARMA_PARAMETERS_FILE_NAME: &str = "arma_parameters.toml";

/// The name of the index column of season tables
const SIMULATION_COLUMN: &str = "simulation";

/// The name of the index column of the transition matrix
const FROM_COLUMN: &str = "from";

/// Get the default output directory for the model in the specified directory
pub fn get_output_dir(model_dir: &Path) -> Result<PathBuf> {
    // Get the model name from the dir path. This ends up being convoluted because we need to check
    // for all possible errors. Ugh.
    let model_dir = model_dir
        .canonicalize() // canonicalise in case the user has specified "."
        .context("Could not resolve path to model")?;

    let model_name = model_dir
        .file_name()
        .context("Model cannot be in root folder")?
        .to_str()
        .context("Invalid chars in model dir name")?;

    // Construct path
    Ok([OUTPUT_DIRECTORY_ROOT, model_name].iter().collect())
}

/// Create a new output directory for the model, optionally overwriting existing data
///
/// # Arguments
///
/// * `output_dir` - The output directory to create/overwrite
/// * `allow_overwrite` - Whether to delete and recreate the folder if it is non-empty
///
/// # Returns
///
/// True if the output directory was overwritten, false otherwise
pub fn create_output_directory(output_dir: &Path, allow_overwrite: bool) -> Result<bool> {
    // If the folder already exists, then delete it
    let overwrite = if let Ok(mut it) = fs::read_dir(output_dir) {
        if it.next().is_none() {
            // Folder exists and is empty: nothing to do
            return Ok(false);
        }

        ensure!(
            allow_overwrite,
            "Output folder already exists and is not empty. Please delete the folder or pass the \
            --overwrite command-line option."
        );

        fs::remove_dir_all(output_dir).context("Could not delete folder")?;
        true
    } else {
        false
    };

    // Try to create the directory, with parents
    fs::create_dir_all(output_dir)?;

    Ok(overwrite)
}

/// Represents a row in the scenario CSV file
#[derive(Serialize, Deserialize, Debug, PartialEq)]
struct ScenarioRow {
    simulated_day: usize,
    precipitation: f64,
}

/// Represents a row in the Markov sequence CSV file
#[derive(Serialize, Deserialize, Debug, PartialEq)]
struct SequenceRow {
    step: usize,
    category: Category,
}

/// An object for writing the results of a run to file
pub struct DataWriter {
    output_path: PathBuf,
    save_ensemble: bool,
}

impl DataWriter {
    /// Create a writer for the given output folder
    ///
    /// # Arguments
    ///
    /// * `output_path` - Folder where files will be saved
    /// * `save_ensemble` - Whether to write every simulated trajectory to file
    pub fn create(output_path: &Path, save_ensemble: bool) -> Result<Self> {
        ensure!(
            output_path.is_dir(),
            "Output folder {} does not exist",
            output_path.display()
        );

        Ok(Self {
            output_path: output_path.to_path_buf(),
            save_ensemble,
        })
    }

    fn file_path(&self, file_name: &str) -> PathBuf {
        self.output_path.join(file_name)
    }

    /// Write the fitted parameters of an ARMA model
    pub fn write_arma_parameters(&self, model: &ArmaModel) -> Result<()> {
        let parameters = model
            .parameters()
            .context("Cannot write parameters of an unfitted model")?;
        fs::write(
            self.file_path(ARMA_PARAMETERS_FILE_NAME),
            toml::to_string(parameters)?,
        )?;

        Ok(())
    }

    /// Write the simulated trajectories, if enabled
    pub fn write_ensemble(&self, ensemble: &Ensemble) -> Result<()> {
        if !self.save_ensemble {
            return Ok(());
        }

        let mut writer = csv::Writer::from_path(self.file_path(ENSEMBLE_FILE_NAME))?;
        writer.write_record(
            iter::once("date".to_string()).chain(ensemble.iter().map(|(id, _)| id.to_string())),
        )?;
        for (i, date) in ensemble.dates().iter().enumerate() {
            writer.write_record(
                iter::once(date.to_string())
                    .chain(ensemble.iter().map(|(_, values)| values[i].to_string())),
            )?;
        }
        writer.flush()?;

        Ok(())
    }

    /// Write seasonal totals
    pub fn write_seasonal_totals(&self, totals: &SeasonalTotals) -> Result<()> {
        write_season_table(&self.file_path(SEASONAL_TOTALS_FILE_NAME), totals)
    }

    /// Write the classification of seasonal totals
    pub fn write_classified(&self, classified: &ClassifiedTable) -> Result<()> {
        write_season_table(&self.file_path(CLASSIFIED_FILE_NAME), classified)
    }

    /// Write a transition matrix
    pub fn write_transition_matrix(&self, matrix: &TransitionMatrix) -> Result<()> {
        let mut writer = csv::Writer::from_path(self.file_path(TRANSITION_MATRIX_FILE_NAME))?;
        writer.write_record(
            iter::once(FROM_COLUMN).chain(matrix.states().iter().map(Category::as_str)),
        )?;
        for (state, row) in matrix.iter() {
            writer.write_record(
                iter::once(state.to_string()).chain(row.iter().map(ToString::to_string)),
            )?;
        }
        writer.flush()?;

        Ok(())
    }

    /// Write a generated category sequence
    pub fn write_markov_sequence(&self, sequence: &[Category]) -> Result<()> {
        let mut writer = csv::Writer::from_path(self.file_path(MARKOV_SEQUENCE_FILE_NAME))?;
        for (i, category) in sequence.iter().enumerate() {
            writer.serialize(SequenceRow {
                step: i + 1,
                category: category.clone(),
            })?;
        }
        writer.flush()?;

        Ok(())
    }

    /// Write a scenario and the provenance of its segments
    pub fn write_scenario(&self, scenario: &Scenario) -> Result<()> {
        let mut writer = csv::Writer::from_path(self.file_path(SCENARIO_FILE_NAME))?;
        for (simulated_day, precipitation) in scenario.iter() {
            writer.serialize(ScenarioRow {
                simulated_day,
                precipitation,
            })?;
        }
        writer.flush()?;

        let mut writer = csv::Writer::from_path(self.file_path(SCENARIO_SEGMENTS_FILE_NAME))?;
        for segment in scenario.segments() {
            writer.serialize(segment)?;
        }
        writer.flush()?;

        Ok(())
    }
}

/// Write a table with a simulation index column and one column per season
fn write_season_table<T: ToString>(file_path: &Path, table: &SeasonTable<T>) -> Result<()> {
    let mut writer = csv::Writer::from_path(file_path)?;
    writer.write_record(
        iter::once(SIMULATION_COLUMN).chain(table.seasons().iter().map(Season::as_str)),
    )?;
    for (id, row) in table.iter() {
        writer
            .write_record(iter::once(id.to_string()).chain(row.iter().map(ToString::to_string)))?;
    }
    writer.flush()?;

    Ok(())
}

/// Read a table written by [`write_season_table`], parsing each cell with `parse`
fn read_season_table<T, F>(file_path: &Path, parse: F) -> Result<SeasonTable<T>>
where
    F: Fn(&str) -> Result<T>,
{
    let mut reader = open_csv(file_path)?;
    let headers = reader.headers()?.clone();
    ensure!(
        headers.get(0) == Some(SIMULATION_COLUMN),
        "{}: first column must be {SIMULATION_COLUMN}",
        input_err_msg(file_path)
    );

    let mut table = SeasonTable::new(headers.iter().skip(1).map(Season::from).collect());
    for record in reader.records() {
        let record = record.with_context(|| input_err_msg(file_path))?;
        let id: u32 = record[0]
            .parse()
            .with_context(|| format!("Invalid simulation ID: {}", &record[0]))?;
        let row: Vec<T> = record.iter().skip(1).map(&parse).try_collect()?;
        table
            .insert_row(SimulationID(id), row)
            .with_context(|| input_err_msg(file_path))?;
    }

    Ok(table)
}

/// Read seasonal totals from a CSV file
pub fn read_seasonal_totals(file_path: &Path) -> Result<SeasonalTotals> {
    read_season_table(file_path, |raw| {
        raw.parse::<f64>()
            .with_context(|| format!("Invalid seasonal total: {raw}"))
    })
}

/// Read a classified table from a CSV file
pub fn read_classified(file_path: &Path) -> Result<ClassifiedTable> {
    read_season_table(file_path, |raw| {
        ensure!(!raw.is_empty(), "Missing category");
        Ok(Category::from(raw))
    })
}

/// Read a transition matrix from a CSV file
pub fn read_transition_matrix(file_path: &Path) -> Result<TransitionMatrix> {
    let mut reader = open_csv(file_path)?;
    let headers = reader.headers()?.clone();
    ensure!(
        headers.get(0) == Some(FROM_COLUMN),
        "{}: first column must be {FROM_COLUMN}",
        input_err_msg(file_path)
    );
    let states: IndexSet<Category> = headers.iter().skip(1).map(Category::from).collect();

    let mut rows = Vec::with_capacity(states.len());
    for (i, record) in reader.records().enumerate() {
        let record = record.with_context(|| input_err_msg(file_path))?;
        let Some(expected) = states.get_index(i) else {
            bail!(
                "{}: found more than {} rows, one for each state",
                input_err_msg(file_path),
                states.len()
            );
        };
        ensure!(
            &record[0] == expected.as_str(),
            "{}: expected row for {expected} but found {}",
            input_err_msg(file_path),
            &record[0]
        );
        let row: Vec<f64> = record
            .iter()
            .skip(1)
            .map(|raw| {
                raw.parse::<f64>()
                    .with_context(|| format!("Invalid probability: {raw}"))
            })
            .try_collect()?;
        rows.push(row);
    }
    ensure!(
        rows.len() == states.len(),
        "{}: expected {} rows, one for each state, but found {}",
        input_err_msg(file_path),
        states.len(),
        rows.len()
    );

    TransitionMatrix::from_rows(states, rows).with_context(|| input_err_msg(file_path))
}

/// Read a scenario and its segments from the files written by [`DataWriter::write_scenario`]
pub fn read_scenario(output_path: &Path) -> Result<Scenario> {
    let file_path = output_path.join(SCENARIO_FILE_NAME);
    let mut values = Vec::new();
    for row in open_csv(&file_path)?.deserialize() {
        let row: ScenarioRow = row.with_context(|| input_err_msg(&file_path))?;
        ensure!(
            row.simulated_day == values.len() + 1,
            "{}: simulated days must be numbered consecutively from 1",
            input_err_msg(&file_path)
        );
        values.push(row.precipitation);
    }

    let file_path = output_path.join(SCENARIO_SEGMENTS_FILE_NAME);
    let segments: Vec<Segment> = open_csv(&file_path)?
        .deserialize()
        .try_collect()
        .with_context(|| input_err_msg(&file_path))?;

    Scenario::new(values, segments).with_context(|| input_err_msg(&file_path))
}

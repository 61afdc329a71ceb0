//! Defines the `ModelParameters` struct, which represents the contents of `model.toml`.
use crate::arma::ArmaOrder;
use crate::id::{Category, Season};
use crate::input::{input_err_msg, read_toml};
use crate::requirement::YearStructure;
use crate::season::{CategoryScheme, DEFAULT_CATEGORIES, DEFAULT_SEASONS, SeasonDefinition};
use crate::series::Resolution;
use anyhow::{Context, Result, ensure};
use chrono::NaiveDate;
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// The name of the model configuration file in a model directory
pub const MODEL_PARAMETERS_FILE_NAME: &str = "model.toml";

fn default_precipitation_column() -> String {
    "precipitation".into()
}

fn default_categories() -> Vec<Category> {
    DEFAULT_CATEGORIES.iter().map(|c| Category::new(c)).collect()
}

fn default_seasons() -> Vec<SeasonParameters> {
    DEFAULT_SEASONS
        .iter()
        .map(|(name, months)| SeasonParameters {
            name: Season::new(name),
            months: months.to_vec(),
        })
        .collect()
}

/// Represents the contents of the entire model file.
#[derive(Debug, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct ModelParameters {
    /// Path to the historical series CSV file, relative to the model directory
    pub input_file: PathBuf,
    /// The name of the column containing precipitation amounts
    #[serde(default = "default_precipitation_column")]
    pub precipitation_column: String,
    /// Ignore observations before this date
    pub start_date: Option<NaiveDate>,
    /// Ignore observations after this date
    pub end_date: Option<NaiveDate>,
    /// Resample the observations to this resolution before fitting
    pub resample: Option<Resolution>,
    /// Seed for the random number generator. A random seed is used if absent.
    pub seed: Option<u64>,
    /// Settings for the trajectory model
    pub trajectory: TrajectoryParameters,
    /// Category labels, from driest to wettest
    #[serde(default = "default_categories")]
    pub categories: Vec<Category>,
    /// The seasons, in order
    #[serde(default = "default_seasons")]
    pub seasons: Vec<SeasonParameters>,
    /// The scenario to assemble
    pub scenario: ScenarioParameters,
    /// Settings for generating a category sequence with a Markov chain
    pub markov: Option<MarkovParameters>,
}

/// The `[trajectory]` section of the model file
#[derive(Debug, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct TrajectoryParameters {
    /// ARMA orders as `[p, q]`
    pub order: ArmaOrder,
    /// Length of each simulated trajectory
    pub steps: u32,
    /// Number of trajectories to simulate
    pub n_simulations: u32,
    /// First date of the simulated trajectories
    pub start_date: Option<NaiveDate>,
}

/// One entry of the `[[seasons]]` array
#[derive(Debug, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct SeasonParameters {
    /// Season name
    pub name: Season,
    /// Calendar months (1-12) belonging to the season
    pub months: Vec<u32>,
}

/// The `[scenario]` section of the model file
#[derive(Debug, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct ScenarioParameters {
    /// The requirements for one year, or for each year
    pub structure: YearStructure,
    /// How many times to repeat a single-year structure
    pub num_years: Option<u32>,
}

/// The `[markov]` section of the model file
#[derive(Debug, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct MarkovParameters {
    /// Number of categories to generate
    pub sequence_length: usize,
    /// The first category of the sequence. Drawn at random if absent.
    pub start_state: Option<Category>,
}

/// Check that the trajectory settings are valid
fn check_trajectory(trajectory: &TrajectoryParameters) -> Result<()> {
    ensure!(trajectory.steps > 0, "trajectory.steps must be at least 1");
    ensure!(
        trajectory.n_simulations > 0,
        "trajectory.n_simulations must be at least 1"
    );

    Ok(())
}

/// Check that the date range is the right way round
fn check_date_range(start_date: Option<NaiveDate>, end_date: Option<NaiveDate>) -> Result<()> {
    if let (Some(start), Some(end)) = (start_date, end_date) {
        ensure!(
            start <= end,
            "start_date ({start}) must not be after end_date ({end})"
        );
    }

    Ok(())
}

impl ModelParameters {
    /// Read a model file from the specified directory.
    ///
    /// # Arguments
    ///
    /// * `model_dir` - Folder containing model configuration files
    ///
    /// # Returns
    ///
    /// The model file contents as a [`ModelParameters`] struct or an error if the file is invalid
    pub fn from_path<P: AsRef<Path>>(model_dir: P) -> Result<ModelParameters> {
        let file_path = model_dir.as_ref().join(MODEL_PARAMETERS_FILE_NAME);
        let model_params: ModelParameters = read_toml(&file_path)?;

        model_params
            .validate()
            .with_context(|| input_err_msg(file_path))?;

        Ok(model_params)
    }

    /// The season definition described by the `seasons` parameter
    pub fn season_definition(&self) -> Result<SeasonDefinition> {
        let seasons = SeasonDefinition::new(
            self.seasons
                .iter()
                .map(|season| (season.name.clone(), season.months.clone())),
        )?;
        Ok(seasons)
    }

    /// The category scheme described by the `categories` parameter
    pub fn category_scheme(&self) -> Result<CategoryScheme> {
        Ok(CategoryScheme::new(self.categories.iter().cloned())?)
    }

    /// Validate parameters after reading in file
    fn validate(&self) -> Result<()> {
        check_date_range(self.start_date, self.end_date)?;
        check_trajectory(&self.trajectory)?;

        let seasons = self.season_definition().context("Invalid seasons")?;
        let categories = self.category_scheme().context("Invalid categories")?;

        // The requirement structure must only refer to known seasons and categories
        let structure = &self.scenario.structure;
        structure
            .check(self.scenario.num_years)
            .context("Invalid scenario")?;
        for requirement in structure.requirements() {
            seasons.get_season(requirement.season.as_str())?;
            categories.get_category(requirement.category.as_str())?;
        }

        if let Some(markov) = &self.markov {
            ensure!(
                markov.sequence_length > 0,
                "markov.sequence_length must be at least 1"
            );
            if let Some(start_state) = &markov.start_state {
                categories
                    .get_category(start_state.as_str())
                    .context("Invalid markov.start_state")?;
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixture::date;
    use rstest::rstest;
    use std::fs::File;
    use std::io::Write;
    use tempfile::tempdir;

    const MINIMAL: &str = r#"
input_file = "precipitation.csv"

[trajectory]
order = [1, 1]
steps = 90
n_simulations = 50

[scenario]
structure = [
    { season = "Winter", category = "wet" },
    { season = "Summer", category = "very_dry" },
]
num_years = 2
"#;

    fn parse(contents: &str) -> ModelParameters {
        toml::from_str(contents).unwrap()
    }

    #[test]
    fn test_model_params_from_path() {
        let dir = tempdir().unwrap();
        {
            let mut file = File::create(dir.path().join(MODEL_PARAMETERS_FILE_NAME)).unwrap();
            write!(file, "{MINIMAL}").unwrap();
        }

        let params = ModelParameters::from_path(dir.path()).unwrap();
        assert_eq!(params.input_file, PathBuf::from("precipitation.csv"));
        assert_eq!(params.precipitation_column, "precipitation");
        assert_eq!(params.trajectory.order, ArmaOrder { p: 1, q: 1 });
        assert_eq!(params.categories.len(), 5);
        assert_eq!(params.season_definition().unwrap().len(), 4);
        assert_eq!(params.scenario.num_years, Some(2));
        assert!(params.markov.is_none());
    }

    #[test]
    fn test_model_params_optional_fields() {
        let contents = format!(
            "start_date = \"2000-01-01\"\nend_date = \"2005-12-31\"\nresample = \"monthly\"\n\
            seed = 42\n{MINIMAL}\n[markov]\nsequence_length = 8\nstart_state = \"dry\"\n"
        );
        let params = parse(&contents);
        assert_eq!(params.start_date, Some(date(2000, 1, 1)));
        assert_eq!(params.end_date, Some(date(2005, 12, 31)));
        assert_eq!(params.resample, Some(Resolution::Monthly));
        assert_eq!(params.seed, Some(42));
        assert!(params.validate().is_ok());
    }

    #[rstest]
    #[case("steps = 90", "steps = 0")]
    #[case("n_simulations = 50", "n_simulations = 0")]
    #[case("\"very_dry\"", "\"parched\"")]
    #[case("num_years = 2", "num_years = 0")]
    #[case("num_years = 2", "num_years = 4000000000")]
    fn test_model_params_invalid(#[case] from: &str, #[case] to: &str) {
        let params = parse(&MINIMAL.replace(from, to));
        assert!(params.validate().is_err());
    }

    #[test]
    fn test_model_params_custom_seasons() {
        let contents = format!(
            "{MINIMAL}\n[[seasons]]\nname = \"Winter\"\nmonths = [10, 11, 12, 1, 2, 3]\n\n\
            [[seasons]]\nname = \"Summer\"\nmonths = [4, 5, 6, 7, 8, 9]\n"
        );
        let params = parse(&contents);
        params.validate().unwrap();
        let seasons = params.season_definition().unwrap();
        assert_eq!(seasons.len(), 2);
        assert_eq!(seasons.months("Winter").unwrap(), [10, 11, 12, 1, 2, 3]);

        // Seasons must cover the whole year
        let contents = format!(
            "{MINIMAL}\n[[seasons]]\nname = \"Winter\"\nmonths = [12, 1, 2]\n\n\
            [[seasons]]\nname = \"Summer\"\nmonths = [6, 7, 8]\n"
        );
        assert!(parse(&contents).validate().is_err());
    }

    #[test]
    fn test_check_date_range() {
        assert!(check_date_range(None, None).is_ok());
        assert!(check_date_range(Some(date(2000, 1, 1)), Some(date(2000, 1, 1))).is_ok());
        assert!(check_date_range(Some(date(2001, 1, 1)), Some(date(2000, 1, 1))).is_err());
    }
}

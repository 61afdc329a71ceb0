//! The model definition: parameters from `model.toml` plus the observed series they refer to.
use crate::input::{input_err_msg, read_series_csv};
use crate::season::{CategoryScheme, SeasonDefinition};
use crate::series::Series;
use anyhow::{Context, Result};
use log::info;
use std::path::{Path, PathBuf};

pub mod parameters;
pub use parameters::ModelParameters;

/// A fully loaded and validated model
#[derive(Debug, PartialEq)]
pub struct Model {
    /// Path to the model directory
    pub model_dir: PathBuf,
    /// Parameters from the model file
    pub parameters: ModelParameters,
    /// The observed series, after slicing and resampling
    pub observed: Series,
    /// The seasons to aggregate over
    pub seasons: SeasonDefinition,
    /// The categories to classify into
    pub categories: CategoryScheme,
}

impl Model {
    /// Read the model in `model_dir`.
    ///
    /// The input file is read relative to the model directory, restricted to the configured date
    /// range and resampled if requested.
    pub fn from_path<P: AsRef<Path>>(model_dir: P) -> Result<Model> {
        let model_dir = model_dir.as_ref();
        let parameters = ModelParameters::from_path(model_dir)?;
        let seasons = parameters.season_definition()?;
        let categories = parameters.category_scheme()?;

        let input_path = model_dir.join(&parameters.input_file);
        let mut observed = read_series_csv(&input_path, &parameters.precipitation_column)?;
        if parameters.start_date.is_some() || parameters.end_date.is_some() {
            observed = observed
                .slice(parameters.start_date, parameters.end_date)
                .with_context(|| input_err_msg(&input_path))?;
        }
        if let Some(resolution) = parameters.resample {
            observed = observed.resample(resolution);
        }
        info!(
            "Read {} observations from {}",
            observed.len(),
            input_path.display()
        );

        Ok(Model {
            model_dir: model_dir.to_path_buf(),
            parameters,
            observed,
            seasons,
            categories,
        })
    }
}

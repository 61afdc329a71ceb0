//! Functionality for running the whole generation pipeline for one model.
use crate::aggregate::SeasonalAggregator;
use crate::arma::ArmaModel;
use crate::classify::QuantileClassifier;
use crate::markov::MarkovChain;
use crate::model::Model;
use crate::output::DataWriter;
use crate::output::metadata::write_metadata;
use crate::scenario::WeatherGenerator;
use crate::validate::validate_scenario;
use anyhow::{Context, Result, ensure};
use log::{info, warn};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use std::path::Path;

/// Pick a seed for a run which didn't specify one.
///
/// Seeds are kept below 2^63 so that they can be written to and read from TOML.
fn random_seed() -> u64 {
    rand::thread_rng().gen_range(0..1_u64 << 63)
}

/// Run the simulation.
///
/// The trajectory model is fitted to the observed series and used to simulate an ensemble,
/// whose seasonal totals are classified and used to assemble the requested scenario. Every
/// intermediate result is written to `output_path`.
///
/// # Arguments:
///
/// * `model` - The model to run
/// * `output_path` - The folder to which output files will be written
/// * `save_ensemble` - Whether to write every simulated trajectory to file
pub fn run(model: &Model, output_path: &Path, save_ensemble: bool) -> Result<()> {
    let parameters = &model.parameters;
    let seed = parameters.seed.unwrap_or_else(random_seed);
    info!("Random seed: {seed}");
    let mut rng = ChaCha8Rng::seed_from_u64(seed);

    write_metadata(output_path, &model.model_dir, seed)
        .context("Failed to save metadata.")?;
    let writer = DataWriter::create(output_path, save_ensemble)?;

    // Fit the trajectory model and simulate an ensemble from it
    let trajectory = &parameters.trajectory;
    let mut arma = ArmaModel::new(trajectory.order, trajectory.steps)?;
    if let Some(start_date) = trajectory.start_date {
        arma = arma.with_start_date(start_date);
    }
    arma.fit(&model.observed)
        .context("Failed to fit trajectory model.")?;
    writer.write_arma_parameters(&arma)?;

    let ensemble = arma.generate(trajectory.n_simulations, &mut rng)?;
    writer.write_ensemble(&ensemble)?;

    // Classify the seasonal behaviour of each simulation
    let totals = SeasonalAggregator::new(model.seasons.clone()).aggregate(&ensemble)?;
    writer.write_seasonal_totals(&totals)?;
    let classified = QuantileClassifier::new(model.categories.clone()).classify(&totals)?;
    writer.write_classified(&classified)?;

    if let Some(markov) = &parameters.markov {
        let mut chain = MarkovChain::from_categories(&model.categories);
        chain
            .fit_from_table(&classified)
            .context("Failed to fit Markov chain.")?;
        if let Some(matrix) = chain.transition_matrix() {
            writer.write_transition_matrix(matrix)?;
        }

        let sequence = chain.generate_sequence(
            markov.sequence_length,
            markov.start_state.as_ref().map(|state| state.as_str()),
            &mut rng,
        )?;
        info!("Generated a sequence of {} categories", sequence.len());
        writer.write_markov_sequence(&sequence)?;
    }

    // Assemble the requested scenario
    let structure = parameters
        .scenario
        .structure
        .expand(parameters.scenario.num_years)?;
    if let Some(num_years) = structure.ignored_num_years {
        warn!(
            "num_years = {num_years} is ignored because the requirement structure already \
            specifies {} years",
            structure.years.len()
        );
    }
    let scenario = WeatherGenerator::new(&ensemble, &classified, &model.seasons)
        .generate(&structure, &mut rng)
        .context("Failed to assemble scenario.")?;

    let report = validate_scenario(&scenario, &structure, &classified);
    ensure!(report.is_valid(), "Assembled scenario is invalid:\n{report}");
    writer.write_scenario(&scenario)?;

    Ok(())
}

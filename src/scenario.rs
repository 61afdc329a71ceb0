//! Assembly of scenarios from classified seasonal segments of an ensemble.
use crate::error::WeatherGenError;
use crate::id::{Category, Season, SimulationID};
use crate::requirement::{ExpandedStructure, YearStructure};
use crate::season::SeasonDefinition;
use crate::series::Ensemble;
use crate::table::ClassifiedTable;
use chrono::Datelike;
use log::{debug, info};
use rand::Rng;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};

/// Where one part of a scenario came from
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Segment {
    /// The season of the segment
    pub season: Season,
    /// The category requested for the segment
    pub category: Category,
    /// The simulation the segment was taken from
    pub simulation: SimulationID,
    /// Number of values in the segment
    pub length: usize,
}

/// A synthetic sequence of values assembled from seasonal segments.
///
/// Values are indexed by simulated day, starting from 1.
#[derive(Debug, Clone, PartialEq)]
pub struct Scenario {
    values: Vec<f64>,
    segments: Vec<Segment>,
}

impl Scenario {
    /// Create a scenario, checking that segment lengths account for every value
    pub fn new(values: Vec<f64>, segments: Vec<Segment>) -> Result<Self, WeatherGenError> {
        let total: usize = segments.iter().map(|s| s.length).sum();
        if total != values.len() {
            return Err(WeatherGenError::Schema(format!(
                "Segments cover {total} values but the scenario has {}",
                values.len()
            )));
        }

        Ok(Self { values, segments })
    }

    /// Number of values
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether the scenario has no values
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// The values in order
    pub fn values(&self) -> &[f64] {
        &self.values
    }

    /// The segments the scenario was built from, in order
    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Iterate over (simulated day, value) pairs. Days are numbered from 1.
    pub fn iter(&self) -> impl Iterator<Item = (usize, f64)> + '_ {
        self.values.iter().copied().enumerate().map(|(i, v)| (i + 1, v))
    }
}

/// Builds scenarios by picking matching seasonal segments from a classified ensemble
#[derive(Debug, Clone, Copy)]
pub struct WeatherGenerator<'a> {
    ensemble: &'a Ensemble,
    classified: &'a ClassifiedTable,
    seasons: &'a SeasonDefinition,
}

impl<'a> WeatherGenerator<'a> {
    /// Create a generator over an ensemble and its classification.
    ///
    /// # Arguments
    ///
    /// * `ensemble` - The simulated trajectories to take segments from
    /// * `classified` - The category of every simulation in every season
    /// * `seasons` - The months belonging to each season
    pub fn new(
        ensemble: &'a Ensemble,
        classified: &'a ClassifiedTable,
        seasons: &'a SeasonDefinition,
    ) -> Self {
        Self {
            ensemble,
            classified,
            seasons,
        }
    }

    /// Assemble a scenario for an expanded requirement structure.
    ///
    /// For each requirement in turn, a simulation classified with the requested category for
    /// that season is chosen uniformly at random and its values for the season's months are
    /// appended to the scenario. Nothing is returned unless every requirement can be met.
    pub fn generate<R: Rng + ?Sized>(
        &self,
        structure: &ExpandedStructure,
        rng: &mut R,
    ) -> Result<Scenario, WeatherGenError> {
        let mut values = Vec::new();
        let mut segments = Vec::with_capacity(structure.num_steps());
        for requirement in structure.steps() {
            let months = self
                .seasons
                .months(requirement.season.as_str())
                .ok_or_else(|| {
                    WeatherGenError::InvalidConfiguration(format!(
                        "Unknown season {}",
                        requirement.season
                    ))
                })?;
            let candidates = self
                .classified
                .matching(requirement.season.as_str(), &requirement.category)?;
            let simulation = *candidates
                .choose(rng)
                .ok_or_else(|| WeatherGenError::NoMatch {
                    season: requirement.season.to_string(),
                    category: requirement.category.to_string(),
                })?;
            let source = self.ensemble.values(simulation).ok_or_else(|| {
                WeatherGenError::Schema(format!("Simulation {simulation} is not in the ensemble"))
            })?;

            let before = values.len();
            values.extend(
                self.ensemble
                    .dates()
                    .iter()
                    .zip(source)
                    .filter(|(date, _)| months.contains(&date.month()))
                    .map(|(_, value)| *value),
            );
            let length = values.len() - before;
            debug!(
                "Took {length} values for {} ({}) from simulation {simulation}",
                requirement.season, requirement.category
            );

            segments.push(Segment {
                season: requirement.season.clone(),
                category: requirement.category.clone(),
                simulation,
                length,
            });
        }
        info!(
            "Assembled scenario of {} values from {} segments",
            values.len(),
            segments.len()
        );

        Scenario::new(values, segments)
    }

    /// Expand `structure` for `num_years` and assemble a scenario from it.
    ///
    /// See [`YearStructure::expand`] for how `num_years` applies.
    pub fn generate_weather<R: Rng + ?Sized>(
        &self,
        structure: &YearStructure,
        num_years: Option<u32>,
        rng: &mut R,
    ) -> Result<Scenario, WeatherGenError> {
        let expanded = structure.expand(num_years)?;
        self.generate(&expanded, rng)
    }
}

//! Reduction of simulated trajectories to seasonal totals.
use crate::error::WeatherGenError;
use crate::season::SeasonDefinition;
use crate::series::Ensemble;
use crate::table::SeasonalTotals;
use chrono::Datelike;
use log::debug;

/// Sums each simulation's values by season.
///
/// The season definition is validated when it is built, so an aggregator always works with a
/// partition of the twelve months.
#[derive(Debug, Clone, PartialEq)]
pub struct SeasonalAggregator {
    seasons: SeasonDefinition,
}

impl SeasonalAggregator {
    /// Create a new aggregator for the given seasons
    pub fn new(seasons: SeasonDefinition) -> Self {
        Self { seasons }
    }

    /// The seasons used for aggregation
    pub fn seasons(&self) -> &SeasonDefinition {
        &self.seasons
    }

    /// Sum every simulation's values per season over the whole horizon.
    ///
    /// A simulation spanning several years contributes all of its years to a single total per
    /// season. Seasons which never occur in the horizon have a total of zero.
    pub fn aggregate(&self, ensemble: &Ensemble) -> Result<SeasonalTotals, WeatherGenError> {
        if ensemble.is_empty() {
            return Err(WeatherGenError::InsufficientData(
                "Cannot aggregate an empty ensemble".into(),
            ));
        }

        // Work out each time step's season once, as all simulations share the date index
        let season_of_step: Vec<usize> = ensemble
            .dates()
            .iter()
            .map(|date| self.seasons.season_index_of_month(date.month()))
            .collect();

        let mut totals = SeasonalTotals::new(self.seasons.seasons().cloned().collect());
        for (id, values) in ensemble.iter() {
            let mut row = vec![0.0; self.seasons.len()];
            for (season_idx, value) in season_of_step.iter().zip(values) {
                row[*season_idx] += value;
            }
            totals.insert_row(id, row)?;
        }
        debug!(
            "Aggregated {} simulations into {} seasons",
            totals.len(),
            self.seasons.len()
        );

        Ok(totals)
    }
}

//! Tables indexed by simulation with one column per season.
use crate::error::WeatherGenError;
use crate::id::{Category, Season, SimulationID};
use indexmap::IndexMap;

/// A table with one row per simulation and one column per season
#[derive(Debug, Clone, PartialEq)]
pub struct SeasonTable<T> {
    seasons: Vec<Season>,
    rows: IndexMap<SimulationID, Vec<T>>,
}

/// The total precipitation for each simulation and season
pub type SeasonalTotals = SeasonTable<f64>;

/// The category label for each simulation and season
pub type ClassifiedTable = SeasonTable<Category>;

impl<T> SeasonTable<T> {
    /// Create an empty table with the given season columns
    pub fn new(seasons: Vec<Season>) -> Self {
        Self {
            seasons,
            rows: IndexMap::new(),
        }
    }

    /// Add a row for a simulation.
    ///
    /// The row must have one cell per season and the simulation must not already be present.
    pub fn insert_row(&mut self, id: SimulationID, row: Vec<T>) -> Result<(), WeatherGenError> {
        if row.len() != self.seasons.len() {
            return Err(WeatherGenError::Schema(format!(
                "Row for simulation {id} has {} cells but there are {} seasons",
                row.len(),
                self.seasons.len()
            )));
        }
        if self.rows.contains_key(&id) {
            return Err(WeatherGenError::Schema(format!(
                "Duplicate row for simulation {id}"
            )));
        }
        self.rows.insert(id, row);

        Ok(())
    }

    /// The season columns
    pub fn seasons(&self) -> &[Season] {
        &self.seasons
    }

    /// Number of simulations (rows)
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Whether the table has no rows
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// The column position of `season`, or a [`WeatherGenError::Schema`] error if it is absent
    pub fn column_index(&self, season: &str) -> Result<usize, WeatherGenError> {
        self.seasons
            .iter()
            .position(|s| s.as_str() == season)
            .ok_or_else(|| WeatherGenError::Schema(format!("No column for season {season}")))
    }

    /// The cell for the given simulation and season
    pub fn get(&self, id: SimulationID, season: &str) -> Option<&T> {
        let col = self.column_index(season).ok()?;
        self.rows.get(&id).map(|row| &row[col])
    }

    /// The cells of one row
    pub fn row(&self, id: SimulationID) -> Option<&[T]> {
        self.rows.get(&id).map(Vec::as_slice)
    }

    /// Iterate over (simulation, row) pairs in insertion order
    pub fn iter(&self) -> impl Iterator<Item = (SimulationID, &[T])> {
        self.rows.iter().map(|(id, row)| (*id, row.as_slice()))
    }

    /// Iterate over (simulation, cell) pairs for one column
    pub fn column(
        &self,
        season: &str,
    ) -> Result<impl Iterator<Item = (SimulationID, &T)>, WeatherGenError> {
        let col = self.column_index(season)?;
        Ok(self.rows.iter().map(move |(id, row)| (*id, &row[col])))
    }
}

impl<T: PartialEq> SeasonTable<T> {
    /// The simulations whose cell for `season` equals `value`
    pub fn matching(&self, season: &str, value: &T) -> Result<Vec<SimulationID>, WeatherGenError> {
        Ok(self
            .column(season)?
            .filter(|(_, cell)| *cell == value)
            .map(|(id, _)| id)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::{fixture, rstest};

    #[fixture]
    fn table() -> ClassifiedTable {
        let mut table = ClassifiedTable::new(vec!["Winter".into(), "Summer".into()]);
        table
            .insert_row(SimulationID(1), vec!["wet".into(), "dry".into()])
            .unwrap();
        table
            .insert_row(SimulationID(2), vec!["dry".into(), "dry".into()])
            .unwrap();
        table
            .insert_row(SimulationID(3), vec!["wet".into(), "wet".into()])
            .unwrap();
        table
    }

    #[rstest]
    fn test_matching(table: ClassifiedTable) {
        assert_eq!(
            table.matching("Winter", &"wet".into()).unwrap(),
            [SimulationID(1), SimulationID(3)]
        );
        assert_eq!(
            table.matching("Summer", &"dry".into()).unwrap(),
            [SimulationID(1), SimulationID(2)]
        );
        assert!(table.matching("Summer", &"very_wet".into()).unwrap().is_empty());
    }

    #[rstest]
    fn test_missing_column(table: ClassifiedTable) {
        assert_eq!(
            table.matching("Spring", &"wet".into()),
            Err(WeatherGenError::Schema("No column for season Spring".into()))
        );
    }

    #[rstest]
    fn test_get(table: ClassifiedTable) {
        assert_eq!(table.get(SimulationID(2), "Winter").unwrap().as_str(), "dry");
        assert!(table.get(SimulationID(4), "Winter").is_none());
        assert!(table.get(SimulationID(1), "Spring").is_none());
    }

    #[rstest]
    fn test_insert_row_invalid(mut table: ClassifiedTable) {
        assert!(matches!(
            table.insert_row(SimulationID(4), vec!["wet".into()]),
            Err(WeatherGenError::Schema(_))
        ));
        assert!(matches!(
            table.insert_row(SimulationID(1), vec!["wet".into(), "wet".into()]),
            Err(WeatherGenError::Schema(_))
        ));
        assert_eq!(table.len(), 3);
    }
}

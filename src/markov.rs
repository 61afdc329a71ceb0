//! Discrete Markov chain over category labels.
use crate::error::{WeatherGenError, invalid_config};
use crate::id::Category;
use crate::season::CategoryScheme;
use crate::table::ClassifiedTable;
use indexmap::IndexSet;
use itertools::Itertools;
use log::debug;
use rand::Rng;
use rand::distributions::{Distribution, WeightedIndex};

/// Tolerance when checking that rows of a transition matrix sum to one
const ROW_SUM_TOLERANCE: f64 = 1e-9;

/// A row-stochastic matrix of transition probabilities between states
#[derive(Debug, Clone, PartialEq)]
pub struct TransitionMatrix {
    states: IndexSet<Category>,
    rows: Vec<Vec<f64>>,
}

impl TransitionMatrix {
    /// Create a matrix from explicit rows, one per state, in state order.
    ///
    /// Each row must have one non-negative entry per state and sum to one.
    pub fn from_rows(
        states: IndexSet<Category>,
        rows: Vec<Vec<f64>>,
    ) -> Result<Self, WeatherGenError> {
        if rows.len() != states.len() {
            return Err(WeatherGenError::Schema(format!(
                "Transition matrix has {} rows but {} states",
                rows.len(),
                states.len()
            )));
        }
        for (state, row) in states.iter().zip(&rows) {
            if row.len() != states.len() {
                return Err(WeatherGenError::Schema(format!(
                    "Row for {state} has {} entries but there are {} states",
                    row.len(),
                    states.len()
                )));
            }
            if row.iter().any(|p| !(p.is_finite() && *p >= 0.0)) {
                invalid_config!("Transition probabilities from {state} must be non-negative");
            }
            let sum: f64 = row.iter().sum();
            if (sum - 1.0).abs() > ROW_SUM_TOLERANCE {
                invalid_config!("Transition probabilities from {state} sum to {sum}, not 1");
            }
        }

        Ok(Self { states, rows })
    }

    /// The states, in row/column order
    pub fn states(&self) -> &IndexSet<Category> {
        &self.states
    }

    /// The probability of moving from `from` to `to`
    pub fn probability(&self, from: &str, to: &str) -> Option<f64> {
        let i = self.states.get_index_of(from)?;
        let j = self.states.get_index_of(to)?;
        Some(self.rows[i][j])
    }

    /// The outgoing probabilities of one state
    pub fn row(&self, from: &str) -> Option<&[f64]> {
        self.states
            .get_index_of(from)
            .map(|i| self.rows[i].as_slice())
    }

    /// Iterate over (state, outgoing probabilities) pairs
    pub fn iter(&self) -> impl Iterator<Item = (&Category, &[f64])> {
        self.states
            .iter()
            .zip(self.rows.iter().map(Vec::as_slice))
    }
}

/// A first-order Markov chain over a finite set of categories.
///
/// The chain must be fitted to observed sequences before it can generate new ones. Refitting
/// replaces the transition matrix; generating only reads it.
#[derive(Debug, Clone, PartialEq)]
pub struct MarkovChain {
    states: IndexSet<Category>,
    matrix: Option<TransitionMatrix>,
}

impl MarkovChain {
    /// Create an unfitted chain with the given states
    pub fn new<I>(states: I) -> Result<Self, WeatherGenError>
    where
        I: IntoIterator<Item = Category>,
    {
        let mut set = IndexSet::new();
        for state in states {
            if set.contains(&state) {
                invalid_config!("Duplicate state {state}");
            }
            set.insert(state);
        }
        if set.is_empty() {
            invalid_config!("A Markov chain needs at least one state");
        }

        Ok(Self {
            states: set,
            matrix: None,
        })
    }

    /// Create an unfitted chain with one state per category
    pub fn from_categories(categories: &CategoryScheme) -> Self {
        Self {
            states: categories.iter().cloned().collect(),
            matrix: None,
        }
    }

    /// The states of the chain
    pub fn states(&self) -> &IndexSet<Category> {
        &self.states
    }

    /// The fitted transition matrix, if any
    pub fn transition_matrix(&self) -> Option<&TransitionMatrix> {
        self.matrix.as_ref()
    }

    /// Estimate the transition matrix by counting consecutive pairs in `sequences`.
    ///
    /// States with no observed outgoing transitions get a uniform row. Sequences shorter than
    /// two contribute nothing, but at least one sequence must be long enough to count a
    /// transition.
    pub fn fit(&mut self, sequences: &[Vec<Category>]) -> Result<(), WeatherGenError> {
        if sequences.iter().all(|sequence| sequence.len() < 2) {
            return Err(WeatherGenError::InsufficientData(
                "At least one sequence with two or more states is needed".into(),
            ));
        }

        let k = self.states.len();
        let mut counts = vec![vec![0u64; k]; k];
        for sequence in sequences {
            let indices: Vec<usize> = sequence
                .iter()
                .map(|state| {
                    self.states.get_index_of(state).ok_or_else(|| {
                        WeatherGenError::InvalidConfiguration(format!("Unknown state {state}"))
                    })
                })
                .try_collect()?;
            for (from, to) in indices.into_iter().tuple_windows() {
                counts[from][to] += 1;
            }
        }

        let rows = self
            .states
            .iter()
            .zip(counts)
            .map(|(state, row)| {
                let total: u64 = row.iter().sum();
                if total == 0 {
                    debug!("No transitions observed from {state}; using a uniform row");
                    return vec![1.0 / k as f64; k];
                }
                row.into_iter()
                    .map(|count| count as f64 / total as f64)
                    .collect()
            })
            .collect();
        self.matrix = Some(TransitionMatrix {
            states: self.states.clone(),
            rows,
        });

        Ok(())
    }

    /// Fit to the rows of a classified table, treating each simulation's labels in season order
    /// as one sequence
    pub fn fit_from_table(&mut self, table: &ClassifiedTable) -> Result<(), WeatherGenError> {
        let sequences = table.iter().map(|(_, row)| row.to_vec()).collect_vec();
        self.fit(&sequences)
    }

    /// Generate a sequence of `length` states.
    ///
    /// The first state is `start_state` if given, otherwise drawn uniformly from all states.
    /// Each later state is drawn from the previous state's row of the transition matrix.
    pub fn generate_sequence<R: Rng + ?Sized>(
        &self,
        length: usize,
        start_state: Option<&str>,
        rng: &mut R,
    ) -> Result<Vec<Category>, WeatherGenError> {
        let matrix = self
            .matrix
            .as_ref()
            .ok_or(WeatherGenError::NotFitted("MarkovChain"))?;
        if length == 0 {
            invalid_config!("Sequence length must be at least 1");
        }

        let mut current = match start_state {
            Some(state) => self.states.get_index_of(state).ok_or_else(|| {
                WeatherGenError::InvalidConfiguration(format!("Unknown start state {state}"))
            })?,
            None => rng.gen_range(0..self.states.len()),
        };

        let distributions: Vec<WeightedIndex<f64>> = matrix
            .rows
            .iter()
            .map(|row| {
                WeightedIndex::new(row)
                    .map_err(|err| WeatherGenError::InvalidConfiguration(err.to_string()))
            })
            .try_collect()?;

        let mut sequence = Vec::with_capacity(length);
        sequence.push(self.states[current].clone());
        for _ in 1..length {
            current = distributions[current].sample(rng);
            sequence.push(self.states[current].clone());
        }

        Ok(sequence)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixture::{assert_core_error, classified_table, rng};
    use crate::id::SimulationID;
    use float_cmp::assert_approx_eq;
    use rand_chacha::ChaCha8Rng;
    use rstest::{fixture, rstest};

    fn labels(raw: &[&str]) -> Vec<Category> {
        raw.iter().map(|c| Category::new(c)).collect()
    }

    #[fixture]
    fn chain() -> MarkovChain {
        MarkovChain::new(labels(&["a", "b", "c"])).unwrap()
    }

    #[rstest]
    fn test_fit(mut chain: MarkovChain) {
        chain.fit(&[labels(&["a", "b", "a", "b", "c"])]).unwrap();
        let matrix = chain.transition_matrix().unwrap();

        assert_approx_eq!(f64, matrix.probability("a", "b").unwrap(), 1.0);
        assert_approx_eq!(f64, matrix.probability("b", "a").unwrap(), 0.5);
        assert_approx_eq!(f64, matrix.probability("b", "c").unwrap(), 0.5);

        // Nothing ever leaves c
        for to in ["a", "b", "c"] {
            assert_approx_eq!(f64, matrix.probability("c", to).unwrap(), 1.0 / 3.0);
        }
    }

    #[rstest]
    fn test_fit_rows_sum_to_one(mut chain: MarkovChain) {
        chain
            .fit(&[
                labels(&["a", "a", "c", "b", "a", "c"]),
                labels(&["c"]),
                labels(&["b", "b", "b", "a"]),
            ])
            .unwrap();
        for (_, row) in chain.transition_matrix().unwrap().iter() {
            let sum: f64 = row.iter().sum();
            assert!((sum - 1.0).abs() <= ROW_SUM_TOLERANCE);
        }
    }

    #[rstest]
    fn test_fit_all_too_short(mut chain: MarkovChain) {
        assert!(matches!(
            chain.fit(&[labels(&["a"]), vec![]]),
            Err(WeatherGenError::InsufficientData(_))
        ));
        assert!(chain.transition_matrix().is_none());
    }

    #[rstest]
    fn test_fit_unknown_state(mut chain: MarkovChain) {
        assert_core_error!(
            chain.fit(&[labels(&["a", "z"])]),
            InvalidConfiguration,
            "Unknown state z"
        );
    }

    #[test]
    fn test_new_invalid() {
        assert_core_error!(
            MarkovChain::new(vec![]),
            InvalidConfiguration,
            "A Markov chain needs at least one state"
        );
        assert_core_error!(
            MarkovChain::new(labels(&["a", "a"])),
            InvalidConfiguration,
            "Duplicate state a"
        );
    }

    #[rstest]
    fn test_fit_from_table(classified_table: ClassifiedTable) {
        let mut chain = MarkovChain::new(labels(&["dry", "wet"])).unwrap();
        chain.fit_from_table(&classified_table).unwrap();

        // Rows are (wet, dry), (dry, dry), (wet, wet)
        let matrix = chain.transition_matrix().unwrap();
        assert_approx_eq!(f64, matrix.probability("wet", "dry").unwrap(), 0.5);
        assert_approx_eq!(f64, matrix.probability("wet", "wet").unwrap(), 0.5);
        assert_approx_eq!(f64, matrix.probability("dry", "dry").unwrap(), 1.0);
        assert_eq!(classified_table.row(SimulationID(1)).unwrap().len(), 2);
    }

    #[rstest]
    fn test_generate_not_fitted(chain: MarkovChain, mut rng: ChaCha8Rng) {
        assert_eq!(
            chain.generate_sequence(3, None, &mut rng),
            Err(WeatherGenError::NotFitted("MarkovChain"))
        );
    }

    #[rstest]
    fn test_generate_sequence(mut chain: MarkovChain, mut rng: ChaCha8Rng) {
        // A deterministic cycle a -> b -> c -> a
        chain
            .fit(&[labels(&["a", "b", "c", "a", "b", "c", "a"])])
            .unwrap();

        let sequence = chain.generate_sequence(5, Some("b"), &mut rng).unwrap();
        assert_eq!(sequence, labels(&["b", "c", "a", "b", "c"]));

        let sequence = chain.generate_sequence(20, None, &mut rng).unwrap();
        assert_eq!(sequence.len(), 20);

        assert!(matches!(
            chain.generate_sequence(0, None, &mut rng),
            Err(WeatherGenError::InvalidConfiguration(_))
        ));
        assert_core_error!(
            chain.generate_sequence(2, Some("z"), &mut rng),
            InvalidConfiguration,
            "Unknown start state z"
        );
    }

    #[rstest]
    fn test_generate_sequence_frequencies(mut chain: MarkovChain, mut rng: ChaCha8Rng) {
        chain.fit(&[labels(&["a", "b", "a", "c"])]).unwrap();

        // From a, b and c are equally likely
        let sequence = chain.generate_sequence(4001, Some("a"), &mut rng).unwrap();
        let after_a = sequence
            .iter()
            .tuple_windows()
            .filter(|(from, _)| from.as_str() == "a")
            .map(|(_, to)| to.as_str())
            .collect_vec();
        let to_b = after_a.iter().filter(|to| **to == "b").count() as f64;
        assert_approx_eq!(f64, to_b / after_a.len() as f64, 0.5, epsilon = 0.05);
    }

    #[test]
    fn test_from_rows_invalid() {
        let states: IndexSet<Category> = labels(&["a", "b"]).into_iter().collect();
        assert!(matches!(
            TransitionMatrix::from_rows(states.clone(), vec![vec![1.0, 0.0]]),
            Err(WeatherGenError::Schema(_))
        ));
        assert!(matches!(
            TransitionMatrix::from_rows(states.clone(), vec![vec![0.5, 0.4], vec![0.0, 1.0]]),
            Err(WeatherGenError::InvalidConfiguration(_))
        ));
        assert!(TransitionMatrix::from_rows(states, vec![vec![0.5, 0.5], vec![0.0, 1.0]]).is_ok());
    }

    #[test]
    fn test_from_categories() {
        let chain = MarkovChain::from_categories(&CategoryScheme::default());
        assert_eq!(chain.states().len(), 5);
        assert!(chain.transition_matrix().is_none());
    }
}

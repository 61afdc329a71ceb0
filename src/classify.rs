//! Classification of seasonal totals into ordinal categories using quantile thresholds.
//!
//! For `k` categories, each season gets `k - 1` thresholds at evenly spaced percentiles of that
//! season's totals across all simulations. A value belongs to the first category whose threshold
//! it does not exceed, so a value exactly equal to a threshold falls in the lower category.
//! Values above the last threshold get the top category.
use crate::error::WeatherGenError;
use crate::season::CategoryScheme;
use crate::table::{ClassifiedTable, SeasonalTotals};
use itertools::Itertools;
use log::{debug, warn};

/// Labels seasonal totals with categories from a [`CategoryScheme`]
#[derive(Debug, Clone, PartialEq)]
pub struct QuantileClassifier {
    categories: CategoryScheme,
}

impl QuantileClassifier {
    /// Create a new classifier for the given categories
    pub fn new(categories: CategoryScheme) -> Self {
        Self { categories }
    }

    /// The categories used for labelling
    pub fn categories(&self) -> &CategoryScheme {
        &self.categories
    }

    /// Classify every simulation's total for every season.
    ///
    /// Thresholds are recomputed for each call from the supplied totals. If every total in a
    /// season is identical, all thresholds coincide and every simulation is assigned the lowest
    /// category for that season.
    pub fn classify(&self, totals: &SeasonalTotals) -> Result<ClassifiedTable, WeatherGenError> {
        if totals.is_empty() {
            return Err(WeatherGenError::InsufficientData(
                "Cannot classify an empty table of seasonal totals".into(),
            ));
        }

        let thresholds: Vec<Vec<f64>> = totals
            .seasons()
            .iter()
            .map(|season| -> Result<Vec<f64>, WeatherGenError> {
                let column: Vec<f64> = totals
                    .column(season.as_str())?
                    .map(|(_, v)| *v)
                    .collect();
                let thresholds = compute_thresholds(&column, self.categories.len())?;
                debug!("Thresholds for {season}: {thresholds:?}");
                if is_constant(&column) {
                    warn!(
                        "All totals for {season} are identical; every simulation will be \
                        classified as {}",
                        self.lowest()
                    );
                }
                Ok(thresholds)
            })
            .try_collect()?;

        let mut classified = ClassifiedTable::new(totals.seasons().to_vec());
        for (id, row) in totals.iter() {
            let labels = row
                .iter()
                .zip(&thresholds)
                .map(|(value, thresholds)| {
                    let idx = classify_value(*value, thresholds);
                    self.categories
                        .get(idx)
                        .cloned()
                        .expect("Category index is always in range")
                })
                .collect();
            classified.insert_row(id, labels)?;
        }

        Ok(classified)
    }

    fn lowest(&self) -> &str {
        self.categories.get(0).map_or("", |c| c.as_str())
    }
}

/// Compute `num_categories - 1` thresholds at evenly spaced percentiles of `values`.
///
/// For four categories, these are the 25th, 50th and 75th percentiles.
pub fn compute_thresholds(
    values: &[f64],
    num_categories: usize,
) -> Result<Vec<f64>, WeatherGenError> {
    if num_categories < 2 {
        return Err(WeatherGenError::InvalidConfiguration(format!(
            "At least two categories are required (got {num_categories})"
        )));
    }
    if values.is_empty() {
        return Err(WeatherGenError::InsufficientData(
            "Cannot compute thresholds without values".into(),
        ));
    }
    if values.iter().any(|v| !v.is_finite()) {
        return Err(WeatherGenError::Schema(
            "Seasonal totals must be finite".into(),
        ));
    }

    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);

    Ok((1..num_categories)
        .map(|i| quantile(&sorted, i as f64 / num_categories as f64))
        .collect())
}

/// Quantile of pre-sorted data using linear interpolation between closest ranks.
///
/// This is R's default (type 7), which is also the default in pandas and NumPy.
///
/// # Panics
///
/// Panics if `sorted` is empty.
pub fn quantile(sorted: &[f64], p: f64) -> f64 {
    assert!(!sorted.is_empty(), "Cannot take quantile of empty data");
    let n = sorted.len();
    let h = (n - 1) as f64 * p;
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let lo = h.floor() as usize;
    let hi = (lo + 1).min(n - 1);
    sorted[lo] + (h - h.floor()) * (sorted[hi] - sorted[lo])
}

/// The category index for `value` given sorted `thresholds`.
///
/// Returns the position of the first threshold that `value` is less than or equal to, or
/// `thresholds.len()` (the top category) if it exceeds them all.
pub fn classify_value(value: f64, thresholds: &[f64]) -> usize {
    thresholds.partition_point(|threshold| *threshold < value)
}

/// Whether all values are equal
#[allow(clippy::float_cmp)]
fn is_constant(values: &[f64]) -> bool {
    values.windows(2).all(|w| w[0] == w[1])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixture::seasonal_totals;
    use crate::id::{Category, SimulationID};
    use float_cmp::assert_approx_eq;
    use rstest::rstest;

    fn scheme(raw: &[&str]) -> CategoryScheme {
        CategoryScheme::new(raw.iter().map(|c| Category::new(c))).unwrap()
    }

    #[test]
    fn test_quantile() {
        let sorted = [0.0, 0.0, 0.0, 1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0];
        assert_approx_eq!(f64, quantile(&sorted, 0.5), 2.5);
        assert_approx_eq!(f64, quantile(&sorted, 0.0), 0.0);
        assert_approx_eq!(f64, quantile(&sorted, 1.0), 7.0);
        assert_approx_eq!(f64, quantile(&[1.0, 2.0, 3.0, 4.0], 0.8), 3.4);
    }

    #[test]
    fn test_compute_thresholds_quartiles() {
        let values = [5.0, 1.0, 3.0, 2.0, 4.0];
        let thresholds = compute_thresholds(&values, 4).unwrap();
        assert_eq!(thresholds, [2.0, 3.0, 4.0]);
    }

    #[test]
    fn test_compute_thresholds_invalid() {
        assert!(matches!(
            compute_thresholds(&[1.0], 1),
            Err(WeatherGenError::InvalidConfiguration(_))
        ));
        assert!(matches!(
            compute_thresholds(&[], 3),
            Err(WeatherGenError::InsufficientData(_))
        ));
        assert!(matches!(
            compute_thresholds(&[f64::NAN], 3),
            Err(WeatherGenError::Schema(_))
        ));
    }

    #[rstest]
    #[case(0.5, 0)]
    #[case(2.0, 0)] // equal to a threshold goes to the lower category
    #[case(2.5, 1)]
    #[case(3.0, 1)]
    #[case(4.0, 2)]
    #[case(4.0001, 3)]
    #[case(100.0, 3)]
    fn test_classify_value(#[case] value: f64, #[case] expected: usize) {
        assert_eq!(classify_value(value, &[2.0, 3.0, 4.0]), expected);
    }

    #[rstest]
    fn test_classify(seasonal_totals: SeasonalTotals) {
        let classifier = QuantileClassifier::new(scheme(&["dry", "normal", "wet"]));
        let classified = classifier.classify(&seasonal_totals).unwrap();

        // Winter totals 10, 20, 30: thresholds 16.67, 23.33
        let winter = classified
            .column("Winter")
            .unwrap()
            .map(|(id, c)| (id, c.as_str()))
            .collect_vec();
        assert_eq!(
            winter,
            [
                (SimulationID(1), "dry"),
                (SimulationID(2), "normal"),
                (SimulationID(3), "wet")
            ]
        );

        // Summer totals are all identical so collapse to the lowest category
        assert!(
            classified
                .column("Summer")
                .unwrap()
                .all(|(_, c)| c.as_str() == "dry")
        );
    }

    #[rstest]
    fn test_classify_monotonic(#[values(2, 3, 4, 5)] num_categories: usize) {
        let labels = ["a", "b", "c", "d", "e"];
        let categories = scheme(&labels[..num_categories]);
        let values = [3.0, 9.0, 1.0, 1.0, 4.0, 7.0, 7.0, 2.0, 8.0, 5.0, 6.0];
        let thresholds = compute_thresholds(&values, num_categories).unwrap();

        let mut pairs = values
            .iter()
            .map(|v| (*v, classify_value(*v, &thresholds)))
            .collect_vec();
        assert!(pairs.iter().all(|(_, idx)| *idx < categories.len()));

        // Higher totals never receive a lower category
        pairs.sort_by(|a, b| a.0.total_cmp(&b.0));
        assert!(pairs.windows(2).all(|w| w[0].1 <= w[1].1));
    }

    #[test]
    fn test_classify_empty() {
        let totals = SeasonalTotals::new(vec!["Winter".into()]);
        let classifier = QuantileClassifier::new(CategoryScheme::default());
        assert!(matches!(
            classifier.classify(&totals),
            Err(WeatherGenError::InsufficientData(_))
        ));
    }
}

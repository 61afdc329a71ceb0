//! Time-indexed precipitation series and simulation ensembles.
//!
//! A [`Series`] is immutable once created: slicing and resampling always return a new series.
//! An [`Ensemble`] holds many simulated series which share a single date index.
use crate::error::{WeatherGenError, invalid_config};
use crate::id::SimulationID;
use chrono::{Datelike, Days, Months, NaiveDate, Weekday};
use indexmap::IndexMap;
use itertools::Itertools;
use serde_string_enum::{DeserializeLabeledStringEnum, SerializeLabeledStringEnum};

/// The temporal resolution of a series
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, DeserializeLabeledStringEnum, SerializeLabeledStringEnum,
)]
pub enum Resolution {
    /// One value per day
    #[string = "daily"]
    Daily,
    /// One value per week
    #[string = "weekly"]
    Weekly,
    /// One value per calendar month
    #[string = "monthly"]
    Monthly,
    /// One value per calendar year
    #[string = "annual"]
    Annual,
}

impl Resolution {
    /// The date `steps` periods after `date`, or `None` if out of range
    pub fn advance(self, date: NaiveDate, steps: u32) -> Option<NaiveDate> {
        match self {
            Self::Daily => date.checked_add_days(Days::new(steps.into())),
            Self::Weekly => date.checked_add_days(Days::new(u64::from(steps) * 7)),
            Self::Monthly => date.checked_add_months(Months::new(steps)),
            Self::Annual => date.checked_add_months(Months::new(steps.checked_mul(12)?)),
        }
    }

    /// The first day of the period containing `date`
    fn period_start(self, date: NaiveDate) -> NaiveDate {
        match self {
            Self::Daily => date,
            Self::Weekly => date.week(Weekday::Mon).first_day(),
            Self::Monthly => date.with_day(1).unwrap_or(date),
            Self::Annual => NaiveDate::from_ymd_opt(date.year(), 1, 1).unwrap_or(date),
        }
    }

    /// Infer the resolution of a strictly increasing sequence of dates from its median spacing
    pub fn infer(dates: &[NaiveDate]) -> Result<Self, WeatherGenError> {
        let median = median_spacing(dates)?;
        match median {
            1 => Ok(Self::Daily),
            7 => Ok(Self::Weekly),
            28..=31 => Ok(Self::Monthly),
            365 | 366 => Ok(Self::Annual),
            _ => invalid_config!("Cannot infer resolution from a median spacing of {median} days"),
        }
    }
}

/// The median number of days between consecutive dates
pub fn median_spacing(dates: &[NaiveDate]) -> Result<u64, WeatherGenError> {
    if dates.len() < 2 {
        return Err(WeatherGenError::InsufficientData(
            "At least two observations are needed to infer the resolution".into(),
        ));
    }

    let spacings = dates
        .iter()
        .tuple_windows()
        .map(|(a, b)| (*b - *a).num_days().unsigned_abs())
        .sorted_unstable()
        .collect_vec();

    Ok(spacings[spacings.len() / 2])
}

/// An ordered sequence of (date, value) pairs with strictly increasing dates.
///
/// Values are precipitation amounts. Missing observations are represented as NaN so that model
/// fitting can reject them; negative amounts are never valid.
#[derive(Debug, Clone, PartialEq)]
pub struct Series {
    dates: Vec<NaiveDate>,
    values: Vec<f64>,
}

impl Series {
    /// Create a new series, checking that dates are strictly increasing and values non-negative
    pub fn new(dates: Vec<NaiveDate>, values: Vec<f64>) -> Result<Self, WeatherGenError> {
        if dates.len() != values.len() {
            return Err(WeatherGenError::Schema(format!(
                "Series has {} dates but {} values",
                dates.len(),
                values.len()
            )));
        }
        check_strictly_increasing(&dates)?;
        if let Some(value) = values.iter().find(|v| **v < 0.0) {
            invalid_config!("Precipitation cannot be negative (found {value})");
        }

        Ok(Self { dates, values })
    }

    /// Number of observations
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether the series has no observations
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// The date index
    pub fn dates(&self) -> &[NaiveDate] {
        &self.dates
    }

    /// The observed values
    pub fn values(&self) -> &[f64] {
        &self.values
    }

    /// Iterate over (date, value) pairs
    pub fn iter(&self) -> impl Iterator<Item = (NaiveDate, f64)> + '_ {
        self.dates.iter().copied().zip(self.values.iter().copied())
    }

    /// Infer the temporal resolution of this series
    pub fn resolution(&self) -> Result<Resolution, WeatherGenError> {
        Resolution::infer(&self.dates)
    }

    /// A new series restricted to the inclusive date range `[start, end]`.
    ///
    /// Either bound may be omitted.
    pub fn slice(
        &self,
        start: Option<NaiveDate>,
        end: Option<NaiveDate>,
    ) -> Result<Series, WeatherGenError> {
        if let (Some(start), Some(end)) = (start, end)
            && start > end
        {
            invalid_config!("Start date {start} is after end date {end}");
        }

        let (dates, values) = self
            .iter()
            .filter(|(date, _)| start.is_none_or(|s| *date >= s) && end.is_none_or(|e| *date <= e))
            .unzip();
        let sliced = Series { dates, values };
        if sliced.is_empty() {
            return Err(WeatherGenError::InsufficientData(
                "No observations fall within the requested date range".into(),
            ));
        }

        Ok(sliced)
    }

    /// A new series resampled to `resolution` by taking the mean within each period.
    ///
    /// Each period is labelled with its first day. Missing (NaN) values are skipped; a period with
    /// no valid values is itself missing.
    pub fn resample(&self, resolution: Resolution) -> Series {
        let mut dates = Vec::new();
        let mut values = Vec::new();
        for (period, group) in &self
            .iter()
            .chunk_by(|(date, _)| resolution.period_start(*date))
        {
            let (sum, count) = group
                .map(|(_, value)| value)
                .filter(|value| !value.is_nan())
                .fold((0.0, 0usize), |(sum, count), value| (sum + value, count + 1));
            dates.push(period);
            values.push(if count == 0 {
                f64::NAN
            } else {
                sum / count as f64
            });
        }

        Series { dates, values }
    }
}

/// Check that dates are strictly increasing
fn check_strictly_increasing(dates: &[NaiveDate]) -> Result<(), WeatherGenError> {
    if let Some((a, b)) = dates.iter().tuple_windows().find(|(a, b)| a >= b) {
        invalid_config!("Dates must be strictly increasing ({a} is followed by {b})");
    }

    Ok(())
}

/// A collection of simulated trajectories sharing one date index.
#[derive(Debug, Clone, PartialEq)]
pub struct Ensemble {
    dates: Vec<NaiveDate>,
    simulations: IndexMap<SimulationID, Vec<f64>>,
}

impl Ensemble {
    /// Create an ensemble, checking every simulation matches the shared date index
    pub fn new(
        dates: Vec<NaiveDate>,
        simulations: IndexMap<SimulationID, Vec<f64>>,
    ) -> Result<Self, WeatherGenError> {
        check_strictly_increasing(&dates)?;
        for (id, values) in &simulations {
            if values.len() != dates.len() {
                return Err(WeatherGenError::Schema(format!(
                    "Simulation {id} has {} values but the ensemble horizon is {}",
                    values.len(),
                    dates.len()
                )));
            }
        }

        Ok(Self { dates, simulations })
    }

    /// Number of simulations
    pub fn len(&self) -> usize {
        self.simulations.len()
    }

    /// Whether the ensemble contains no simulations
    pub fn is_empty(&self) -> bool {
        self.simulations.is_empty()
    }

    /// Number of time steps in each simulation
    pub fn horizon(&self) -> usize {
        self.dates.len()
    }

    /// The shared date index
    pub fn dates(&self) -> &[NaiveDate] {
        &self.dates
    }

    /// The values of one simulation
    pub fn values(&self, id: SimulationID) -> Option<&[f64]> {
        self.simulations.get(&id).map(Vec::as_slice)
    }

    /// One simulation as a standalone [`Series`]
    pub fn series(&self, id: SimulationID) -> Option<Series> {
        self.values(id).map(|values| Series {
            dates: self.dates.clone(),
            values: values.to_vec(),
        })
    }

    /// Iterate over simulations in order
    pub fn iter(&self) -> impl Iterator<Item = (SimulationID, &[f64])> {
        self.simulations
            .iter()
            .map(|(id, values)| (*id, values.as_slice()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixture::{assert_core_error, date};
    use rstest::rstest;

    fn daily_series(values: &[f64]) -> Series {
        let start = date(2000, 1, 30);
        let dates = (0..values.len() as u32)
            .map(|i| Resolution::Daily.advance(start, i).unwrap())
            .collect();
        Series::new(dates, values.to_vec()).unwrap()
    }

    #[test]
    fn test_series_new_rejects_unordered_dates() {
        let dates = vec![date(2000, 1, 2), date(2000, 1, 1)];
        assert_core_error!(
            Series::new(dates, vec![1.0, 2.0]),
            InvalidConfiguration,
            "Dates must be strictly increasing (2000-01-02 is followed by 2000-01-01)"
        );
    }

    #[test]
    fn test_series_new_rejects_negative() {
        let dates = vec![date(2000, 1, 1)];
        assert!(Series::new(dates, vec![-0.5]).is_err());
    }

    #[test]
    fn test_series_new_length_mismatch() {
        let result = Series::new(vec![date(2000, 1, 1)], vec![]);
        assert!(matches!(result, Err(WeatherGenError::Schema(_))));
    }

    #[rstest]
    #[case(&[date(2000, 1, 1), date(2000, 1, 2), date(2000, 1, 3)], Resolution::Daily)]
    #[case(&[date(2000, 1, 3), date(2000, 1, 10), date(2000, 1, 17)], Resolution::Weekly)]
    #[case(&[date(2000, 1, 1), date(2000, 2, 1), date(2000, 3, 1)], Resolution::Monthly)]
    #[case(&[date(2000, 1, 1), date(2001, 1, 1), date(2002, 1, 1)], Resolution::Annual)]
    fn test_resolution_infer(#[case] dates: &[NaiveDate], #[case] expected: Resolution) {
        assert_eq!(Resolution::infer(dates).unwrap(), expected);
    }

    #[test]
    fn test_resolution_infer_irregular() {
        let dates = [date(2000, 1, 1), date(2000, 1, 3), date(2000, 1, 5)];
        assert!(matches!(
            Resolution::infer(&dates),
            Err(WeatherGenError::InvalidConfiguration(_))
        ));
        assert_eq!(median_spacing(&dates).unwrap(), 2);
    }

    #[test]
    fn test_resolution_labels() {
        assert_eq!(Resolution::Weekly.to_string(), "weekly");
        let table: toml::Table = toml::from_str("resample = \"annual\"").unwrap();
        let resolution: Resolution = table["resample"].clone().try_into().unwrap();
        assert_eq!(resolution, Resolution::Annual);
    }

    #[test]
    fn test_resolution_infer_too_short() {
        assert!(matches!(
            Resolution::infer(&[date(2000, 1, 1)]),
            Err(WeatherGenError::InsufficientData(_))
        ));
    }

    #[test]
    fn test_resolution_advance() {
        let start = date(2000, 1, 31);
        assert_eq!(Resolution::Daily.advance(start, 1), Some(date(2000, 2, 1)));
        assert_eq!(Resolution::Weekly.advance(start, 2), Some(date(2000, 2, 14)));
        assert_eq!(
            Resolution::Monthly.advance(date(2000, 1, 1), 13),
            Some(date(2001, 2, 1))
        );
        assert_eq!(
            Resolution::Annual.advance(date(2000, 1, 1), 2),
            Some(date(2002, 1, 1))
        );
    }

    #[test]
    fn test_slice() {
        let series = daily_series(&[1.0, 2.0, 3.0, 4.0]);
        let sliced = series
            .slice(Some(date(2000, 1, 31)), Some(date(2000, 2, 1)))
            .unwrap();
        assert_eq!(sliced.values(), [2.0, 3.0]);
        assert_eq!(sliced.dates(), [date(2000, 1, 31), date(2000, 2, 1)]);

        // Original is untouched
        assert_eq!(series.len(), 4);
    }

    #[test]
    fn test_slice_open_ended() {
        let series = daily_series(&[1.0, 2.0, 3.0]);
        assert_eq!(
            series.slice(None, Some(date(2000, 1, 31))).unwrap().values(),
            [1.0, 2.0]
        );
        assert_eq!(
            series.slice(Some(date(2000, 1, 31)), None).unwrap().values(),
            [2.0, 3.0]
        );
    }

    #[test]
    fn test_slice_invalid() {
        let series = daily_series(&[1.0, 2.0]);
        assert!(matches!(
            series.slice(Some(date(2000, 2, 1)), Some(date(2000, 1, 1))),
            Err(WeatherGenError::InvalidConfiguration(_))
        ));
        assert!(matches!(
            series.slice(Some(date(2010, 1, 1)), None),
            Err(WeatherGenError::InsufficientData(_))
        ));
    }

    #[test]
    fn test_resample_monthly_mean() {
        // 30 Jan, 31 Jan, 1 Feb, 2 Feb
        let series = daily_series(&[1.0, 3.0, f64::NAN, 6.0]);
        let resampled = series.resample(Resolution::Monthly);
        assert_eq!(resampled.dates(), [date(2000, 1, 1), date(2000, 2, 1)]);
        assert_eq!(resampled.values(), [2.0, 6.0]);
    }

    #[test]
    fn test_resample_weekly_mean() {
        // Weeks start on Monday, so 30 Jan is on its own
        let series = daily_series(&[1.0, 3.0, f64::NAN, 6.0]);
        let resampled = series.resample(Resolution::Weekly);
        assert_eq!(resampled.dates(), [date(2000, 1, 24), date(2000, 1, 31)]);
        assert_eq!(resampled.values(), [1.0, 4.5]);
    }

    #[test]
    fn test_ensemble_new_horizon_mismatch() {
        let dates = vec![date(2000, 1, 1), date(2000, 1, 2)];
        let simulations = [(SimulationID(1), vec![1.0])].into_iter().collect();
        assert!(matches!(
            Ensemble::new(dates, simulations),
            Err(WeatherGenError::Schema(_))
        ));
    }

    #[test]
    fn test_ensemble_series() {
        let dates = vec![date(2000, 1, 1), date(2000, 1, 2)];
        let simulations = [(SimulationID(1), vec![1.0, 2.0])].into_iter().collect();
        let ensemble = Ensemble::new(dates.clone(), simulations).unwrap();
        assert_eq!(ensemble.len(), 1);
        assert_eq!(ensemble.horizon(), 2);
        assert_eq!(
            ensemble.series(SimulationID(1)).unwrap(),
            Series::new(dates, vec![1.0, 2.0]).unwrap()
        );
        assert!(ensemble.series(SimulationID(2)).is_none());
    }
}

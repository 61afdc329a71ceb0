//! Fixtures for tests

use crate::id::SimulationID;
use crate::series::{Ensemble, Resolution, Series};
use crate::table::{ClassifiedTable, SeasonalTotals};
use chrono::NaiveDate;
use indexmap::IndexMap;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rand_distr::{Distribution, Normal};
use rstest::fixture;

/// Assert that an error with the given message occurs
macro_rules! assert_error {
    ($result:expr, $msg:expr) => {
        assert_eq!(
            $result.unwrap_err().chain().next().unwrap().to_string(),
            $msg
        );
    };
}
pub(crate) use assert_error;

/// Assert that a [`crate::error::WeatherGenError`] of the given kind and message occurs
macro_rules! assert_core_error {
    ($result:expr, $variant:ident, $msg:expr) => {
        match $result {
            Err($crate::error::WeatherGenError::$variant(msg)) => assert_eq!(msg, $msg),
            other => panic!("Expected {} error, got {other:?}", stringify!($variant)),
        }
    };
}
pub(crate) use assert_core_error;

/// Shorthand for a date which is known to be valid
pub fn date(year: i32, month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, day).unwrap()
}

/// A daily series following an AR(1) process around a positive mean
pub fn ar1_series(len: usize, phi: f64, seed: u64) -> Series {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let noise = Normal::new(0.0, 1.0).unwrap();
    let mut state = 0.0;
    let values = (0..len)
        .map(|_| {
            state = phi * state + noise.sample(&mut rng);
            (10.0 + 2.0 * state).max(0.0)
        })
        .collect();
    let dates = (0..len)
        .map(|i| Resolution::Daily.advance(date(2000, 1, 1), u32::try_from(i).unwrap()).unwrap())
        .collect();

    Series::new(dates, values).unwrap()
}

#[fixture]
pub fn rng() -> ChaCha8Rng {
    ChaCha8Rng::seed_from_u64(1234)
}

/// Three daily simulations covering 2001
#[fixture]
pub fn ensemble() -> Ensemble {
    let dates: Vec<_> = (0..365)
        .map(|i| Resolution::Daily.advance(date(2001, 1, 1), i).unwrap())
        .collect();
    let simulations: IndexMap<_, _> = (1..=3)
        .map(|id| {
            let values = (0..365u32).map(|day| f64::from((id * day) % 7)).collect();
            (SimulationID(id), values)
        })
        .collect();

    Ensemble::new(dates, simulations).unwrap()
}

#[fixture]
pub fn seasonal_totals() -> SeasonalTotals {
    let mut totals = SeasonalTotals::new(vec!["Winter".into(), "Summer".into()]);
    totals.insert_row(SimulationID(1), vec![10.0, 5.0]).unwrap();
    totals.insert_row(SimulationID(2), vec![20.0, 5.0]).unwrap();
    totals.insert_row(SimulationID(3), vec![30.0, 5.0]).unwrap();
    totals
}

/// Labels for [`ensemble`]: Winter is wet for 1 and 3, Summer is dry for 1 and 2
#[fixture]
pub fn classified_table() -> ClassifiedTable {
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

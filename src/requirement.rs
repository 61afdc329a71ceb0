//! Requirement structures describing the scenario a caller wants.
use crate::error::{WeatherGenError, invalid_config};
use crate::id::{Category, Season};
use crate::season::SeasonDefinition;
use serde::{Deserialize, Serialize};

/// The largest number of years a single-year structure can be repeated for
pub const MAX_YEARS: u32 = 10_000;

/// A request for one season's worth of data in a given category
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Requirement {
    /// The season to take a segment from
    pub season: Season,
    /// The category the season must have been classified as
    pub category: Category,
    /// Relative intensity weighting. Accepted but not currently used for selection.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub intensity: Option<f64>,
}

impl Requirement {
    /// Create a requirement without an intensity
    pub fn new(season: impl Into<Season>, category: impl Into<Category>) -> Self {
        Self {
            season: season.into(),
            category: category.into(),
            intensity: None,
        }
    }
}

/// The requirements for a scenario, either one year to repeat or an explicit list of years
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(untagged)]
pub enum YearStructure {
    /// A separate list of requirements for every year
    MultiYear(Vec<Vec<Requirement>>),
    /// One year of requirements, repeated for the requested number of years
    SingleYear(Vec<Requirement>),
}

/// A requirement structure with every year spelt out
#[derive(Debug, Clone, PartialEq)]
pub struct ExpandedStructure {
    /// The requirements for each year, in order
    pub years: Vec<Vec<Requirement>>,
    /// A `num_years` value which was supplied but did not apply to this structure
    pub ignored_num_years: Option<u32>,
}

impl ExpandedStructure {
    /// Iterate over every requirement in scenario order
    pub fn steps(&self) -> impl Iterator<Item = &Requirement> {
        self.years.iter().flatten()
    }

    /// Total number of requirement steps
    pub fn num_steps(&self) -> usize {
        self.years.iter().map(Vec::len).sum()
    }
}

impl YearStructure {
    /// Every requirement as written, without repeating a single-year structure
    pub fn requirements(&self) -> Box<dyn Iterator<Item = &Requirement> + '_> {
        match self {
            Self::SingleYear(year) => Box::new(year.iter()),
            Self::MultiYear(years) => Box::new(years.iter().flatten()),
        }
    }

    /// Check that the structure can be expanded for `num_years`, without expanding it
    pub fn check(&self, num_years: Option<u32>) -> Result<(), WeatherGenError> {
        if self.requirements().next().is_none() {
            invalid_config!("Requirement structure is empty");
        }
        if let Self::SingleYear(_) = self {
            let num_years = num_years.unwrap_or(1);
            if num_years < 1 {
                invalid_config!("Number of years must be at least 1");
            }
            if num_years > MAX_YEARS {
                invalid_config!("Number of years must be at most {MAX_YEARS} (got {num_years})");
            }
        }

        Ok(())
    }

    /// Expand into a list of years.
    ///
    /// A single-year structure is repeated `num_years` times (once if `None`), up to
    /// [`MAX_YEARS`]. A multi-year structure already specifies its years, so any `num_years`
    /// other than 1 is ignored and reported back in [`ExpandedStructure::ignored_num_years`].
    pub fn expand(&self, num_years: Option<u32>) -> Result<ExpandedStructure, WeatherGenError> {
        self.check(num_years)?;
        let expanded = match self {
            Self::SingleYear(year) => ExpandedStructure {
                years: vec![year.clone(); num_years.unwrap_or(1) as usize],
                ignored_num_years: None,
            },
            Self::MultiYear(years) => ExpandedStructure {
                years: years.clone(),
                ignored_num_years: num_years.filter(|n| *n != 1),
            },
        };

        Ok(expanded)
    }

    /// Build a multi-year structure from a category sequence by pairing each category with the
    /// next season in turn.
    ///
    /// A new year starts every time the seasons wrap around, so the last year may be partial.
    pub fn from_sequence(seasons: &SeasonDefinition, sequence: &[Category]) -> Self {
        let mut years: Vec<Vec<Requirement>> = Vec::new();
        for (season, category) in seasons.seasons().cycle().zip(sequence) {
            if years.last().is_none_or(|year| year.len() == seasons.len()) {
                years.push(Vec::with_capacity(seasons.len()));
            }
            if let Some(year) = years.last_mut() {
                year.push(Requirement::new(season.clone(), category.clone()));
            }
        }

        Self::MultiYear(years)
    }
}

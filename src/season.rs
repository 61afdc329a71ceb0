//! Season definitions and ordinal category schemes.
//!
//! Both are explicit configuration values passed into each component at construction, with
//! documented defaults.
use crate::error::{WeatherGenError, invalid_config};
use crate::id::{Category, Season};
use indexmap::map::Keys;
use indexmap::{IndexMap, IndexSet};
use itertools::Itertools;

/// The default seasons, as (name, months) pairs
pub const DEFAULT_SEASONS: [(&str, [u32; 3]); 4] = [
    ("Winter", [12, 1, 2]),
    ("Spring", [3, 4, 5]),
    ("Summer", [6, 7, 8]),
    ("Fall", [9, 10, 11]),
];

/// The default categories, from driest to wettest
pub const DEFAULT_CATEGORIES: [&str; 5] = ["very_dry", "dry", "normal", "wet", "very_wet"];

/// A mapping from season name to calendar months.
///
/// The seasons always partition the twelve months: every month belongs to exactly one season.
#[derive(Debug, Clone, PartialEq)]
pub struct SeasonDefinition {
    seasons: IndexMap<Season, Vec<u32>>,
    /// The season each month belongs to, indexed by month - 1
    by_month: [usize; 12],
}

impl Default for SeasonDefinition {
    /// Meteorological seasons for the northern hemisphere
    fn default() -> Self {
        Self::new(
            DEFAULT_SEASONS
                .iter()
                .map(|(name, months)| (Season::new(name), months.to_vec())),
        )
        .expect("Default seasons are a valid partition")
    }
}

impl SeasonDefinition {
    /// Create a new season definition, checking that the seasons partition the twelve months
    pub fn new<I>(seasons: I) -> Result<Self, WeatherGenError>
    where
        I: IntoIterator<Item = (Season, Vec<u32>)>,
    {
        let mut map: IndexMap<Season, Vec<u32>> = IndexMap::new();
        let mut by_month = [None; 12];
        for (season, months) in seasons {
            if months.is_empty() {
                invalid_config!("Season {season} has no months");
            }
            for &month in &months {
                if !(1..=12).contains(&month) {
                    invalid_config!("Invalid month {month} for season {season}");
                }
                let slot = &mut by_month[month as usize - 1];
                if let Some(other) = *slot {
                    let other = map.get_index(other).map_or(&season, |(other, _)| other);
                    invalid_config!("Month {month} is assigned to both {other} and {season}");
                }
                *slot = Some(map.len());
            }
            if map.insert(season.clone(), months).is_some() {
                invalid_config!("Duplicate season {season}");
            }
        }

        if map.is_empty() {
            invalid_config!("No seasons defined");
        }
        let missing = (1..=12u32)
            .filter(|month| by_month[*month as usize - 1].is_none())
            .collect_vec();
        if !missing.is_empty() {
            invalid_config!(
                "Months {} are not assigned to any season",
                missing.iter().join(", ")
            );
        }

        Ok(Self {
            seasons: map,
            by_month: by_month.map(|idx| idx.unwrap_or_default()),
        })
    }

    /// The season names, in definition order
    pub fn seasons(&self) -> Keys<'_, Season, Vec<u32>> {
        self.seasons.keys()
    }

    /// The number of seasons
    pub fn len(&self) -> usize {
        self.seasons.len()
    }

    /// Always false: a valid definition covers every month
    pub fn is_empty(&self) -> bool {
        self.seasons.is_empty()
    }

    /// The months belonging to `season`
    pub fn months(&self, season: &str) -> Option<&[u32]> {
        self.seasons.get(season).map(Vec::as_slice)
    }

    /// Look up a season by name, returning an error if it is not defined
    pub fn get_season(&self, season: &str) -> Result<&Season, WeatherGenError> {
        match self.seasons.get_key_value(season) {
            Some((season, _)) => Ok(season),
            None => invalid_config!("Unknown season {season}"),
        }
    }

    /// Position of `season` in definition order
    pub fn index_of(&self, season: &str) -> Option<usize> {
        self.seasons.get_index_of(season)
    }

    /// The season containing calendar month `month` (1-12)
    pub fn season_of_month(&self, month: u32) -> &Season {
        let (season, _) = self
            .seasons
            .get_index(self.by_month[month as usize - 1])
            .expect("Month index always refers to a season");
        season
    }

    /// Position (in definition order) of the season containing `month`
    pub fn season_index_of_month(&self, month: u32) -> usize {
        self.by_month[month as usize - 1]
    }
}

/// An ordered list of category labels, from lowest (driest) to highest (wettest)
#[derive(Debug, Clone, PartialEq)]
pub struct CategoryScheme(IndexSet<Category>);

impl Default for CategoryScheme {
    fn default() -> Self {
        Self::new(DEFAULT_CATEGORIES.iter().map(|c| Category::new(c)))
            .expect("Default categories are valid")
    }
}

impl CategoryScheme {
    /// Create a category scheme, checking there are at least two unique labels
    pub fn new<I>(categories: I) -> Result<Self, WeatherGenError>
    where
        I: IntoIterator<Item = Category>,
    {
        let mut set = IndexSet::new();
        for category in categories {
            if !set.insert(category.clone()) {
                invalid_config!("Duplicate category {category}");
            }
        }
        if set.len() < 2 {
            invalid_config!("At least two categories are required (got {})", set.len());
        }

        Ok(Self(set))
    }

    /// Number of categories
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Always false: a valid scheme has at least two categories
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// The category at ordinal position `index`
    pub fn get(&self, index: usize) -> Option<&Category> {
        self.0.get_index(index)
    }

    /// The ordinal position of `category`
    pub fn index_of(&self, category: &str) -> Option<usize> {
        self.0.get_index_of(category)
    }

    /// Look up a category by name, returning an error if it is not part of the scheme
    pub fn get_category(&self, category: &str) -> Result<&Category, WeatherGenError> {
        match self.0.get(category) {
            Some(category) => Ok(category),
            None => invalid_config!("Unknown category {category}"),
        }
    }

    /// Iterate over categories from lowest to highest
    pub fn iter(&self) -> impl Iterator<Item = &Category> {
        self.0.iter()
    }
}

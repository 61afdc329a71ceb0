//! Error types raised by the generation, classification and assembly components.
use thiserror::Error;

/// An error raised by one of the core components.
///
/// Errors are raised at the point of detection and never retried: every operation is
/// deterministic given its inputs and random source, so the same input fails the same way.
#[derive(Debug, Error, PartialEq)]
pub enum WeatherGenError {
    /// The series is too short for the requested operation
    #[error("Insufficient data: {0}")]
    InsufficientData(String),
    /// A generate/predict operation was called before `fit`
    #[error("{0} must be fitted before use")]
    NotFitted(&'static str),
    /// Numerical fitting failed (non-finite input, optimiser did not converge, etc.)
    #[error("Fitting failed: {0}")]
    Fitting(String),
    /// Malformed configuration (seasons, categories, lengths, years)
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),
    /// No simulation carries the requested label for the season
    #[error("No matching simulations found for {season} - {category}")]
    NoMatch {
        /// The requested season
        season: String,
        /// The requested category
        category: String,
    },
    /// An expected column is missing or malformed
    #[error("Schema error: {0}")]
    Schema(String),
}

/// Shorthand for raising an [`WeatherGenError::InvalidConfiguration`] error
macro_rules! invalid_config {
    ($($arg:tt)*) => {
        return Err($crate::error::WeatherGenError::InvalidConfiguration(format!($($arg)*)))
    };
}
pub(crate) use invalid_config;

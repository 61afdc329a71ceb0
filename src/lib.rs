//! Synthesis of multi-year precipitation scenarios from stochastic simulation ensembles.
//!
//! An ARMA model is fitted to an observed precipitation series and used to simulate an ensemble of
//! trajectories. Each trajectory is summarised by season and classified into precipitation
//! categories, and scenarios are then assembled by drawing the season of a matching simulation for
//! every step of a user-specified year structure.
#![warn(missing_docs)]
use std::path::PathBuf;

pub mod aggregate;
pub mod arma;
pub mod classify;
pub mod cli;
pub mod error;
pub mod id;
pub mod input;
pub mod log;
pub mod markov;
pub mod model;
pub mod output;
pub mod requirement;
pub mod scenario;
pub mod season;
pub mod series;
pub mod settings;
pub mod simulation;
pub mod table;
pub mod validate;

#[cfg(test)]
mod fixture;

/// Get the config folder for the program.
///
/// Falls back to the current directory if the platform has no config folder.
pub fn get_weathergen_config_dir() -> PathBuf {
    let Some(mut dir) = dirs::config_dir() else {
        return PathBuf::from(".weathergen");
    };
    dir.push("weathergen");

    dir
}

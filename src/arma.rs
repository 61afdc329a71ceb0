//! Autoregressive moving-average (ARMA) model for generating synthetic precipitation
//! trajectories.
//!
//! The observed series is standardised to zero mean and unit variance before an ARMA(p, q) model
//! is fitted to it by minimising the conditional sum of squares. Simulated trajectories are
//! mapped back into the original units and clipped at zero, as negative precipitation is
//! meaningless.
use crate::error::WeatherGenError;
use crate::id::SimulationID;
use crate::series::{Ensemble, Resolution, Series, median_spacing};
use chrono::{Days, NaiveDate};
use indexmap::IndexMap;
use log::{debug, info};
use rand::Rng;
use rand_distr::{Distribution, Normal};
use serde::{Deserialize, Serialize};
use std::fmt;

pub mod nelder_mead;
use nelder_mead::{NelderMeadConfig, minimise};

/// Number of initial simulated steps discarded so trajectories forget their starting values
const BURN_IN: usize = 100;

/// Bound on the magnitude of AR and MA coefficients during fitting
const COEFFICIENT_BOUND: f64 = 0.99;

/// The orders of an ARMA model
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(from = "(usize, usize)")]
pub struct ArmaOrder {
    /// Autoregressive order
    pub p: usize,
    /// Moving-average order
    pub q: usize,
}

impl From<(usize, usize)> for ArmaOrder {
    fn from((p, q): (usize, usize)) -> Self {
        Self { p, q }
    }
}

impl fmt::Display for ArmaOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ARMA({}, {})", self.p, self.q)
    }
}

/// Parameters learnt by [`ArmaModel::fit`]
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ArmaParameters {
    /// Mean of the observed series, used for standardisation
    pub mean: f64,
    /// Standard deviation of the observed series, used for standardisation
    pub scale: f64,
    /// Intercept of the model on the standardised scale
    pub intercept: f64,
    /// Autoregressive coefficients
    pub ar: Vec<f64>,
    /// Moving-average coefficients
    pub ma: Vec<f64>,
    /// Standard deviation of the innovations on the standardised scale
    pub sigma: f64,
}

impl ArmaParameters {
    /// Map a value on the standardised scale back to original units, clipped at zero
    fn inverse_transform(&self, value: f64) -> f64 {
        (value * self.scale + self.mean).max(0.0)
    }

    /// Simulate `steps` values on the standardised scale, discarding a burn-in period first
    fn simulate<R: Rng + ?Sized>(&self, steps: usize, noise: &Normal<f64>, rng: &mut R) -> Vec<f64> {
        let total = BURN_IN + steps;
        let mut values: Vec<f64> = Vec::with_capacity(total);
        let mut innovations: Vec<f64> = Vec::with_capacity(total);
        for t in 0..total {
            let innovation = noise.sample(rng);
            let ar_term: f64 = self
                .ar
                .iter()
                .enumerate()
                .take(t)
                .map(|(i, phi)| phi * (values[t - 1 - i] - self.intercept))
                .sum();
            let ma_term: f64 = self
                .ma
                .iter()
                .enumerate()
                .take(t)
                .map(|(j, theta)| theta * innovations[t - 1 - j])
                .sum();
            values.push(self.intercept + ar_term + ma_term + innovation);
            innovations.push(innovation);
        }

        values.split_off(BURN_IN)
    }
}

/// The spacing between consecutive trajectory dates
#[derive(Debug, Clone, Copy, PartialEq)]
enum DateStep {
    /// One period of a calendar resolution
    Calendar(Resolution),
    /// A fixed number of days, for series with no named resolution
    Days(u64),
}

impl DateStep {
    /// The spacing of the observations in `series`
    fn of(series: &Series) -> Result<Self, WeatherGenError> {
        match series.resolution() {
            Ok(resolution) => Ok(Self::Calendar(resolution)),
            Err(WeatherGenError::InvalidConfiguration(_)) => {
                Ok(Self::Days(median_spacing(series.dates())?))
            }
            Err(err) => Err(err),
        }
    }

    /// The date `steps` steps after `date`
    fn advance(self, date: NaiveDate, steps: u32) -> Option<NaiveDate> {
        match self {
            Self::Calendar(resolution) => resolution.advance(date, steps),
            Self::Days(days) => date.checked_add_days(Days::new(days.checked_mul(steps.into())?)),
        }
    }
}

impl fmt::Display for DateStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Calendar(resolution) => write!(f, "{resolution}"),
            Self::Days(days) => write!(f, "{days}-day"),
        }
    }
}

/// The state captured by a successful fit
#[derive(Debug, Clone, PartialEq)]
struct FittedState {
    observed: Series,
    step: DateStep,
    parameters: ArmaParameters,
}

/// A stochastic ARMA(p, q) trajectory generator.
///
/// [`ArmaModel::fit`] needs exclusive access; once fitted, [`ArmaModel::generate`] only reads the
/// model, so one fitted model can serve several callers, each with its own random source.
#[derive(Debug, Clone, PartialEq)]
pub struct ArmaModel {
    order: ArmaOrder,
    steps: u32,
    start_date: Option<NaiveDate>,
    optimiser: NelderMeadConfig,
    fitted: Option<FittedState>,
}

impl ArmaModel {
    /// Create an unfitted model which will generate trajectories of `steps` time steps
    pub fn new(order: ArmaOrder, steps: u32) -> Result<Self, WeatherGenError> {
        if steps == 0 {
            return Err(WeatherGenError::InvalidConfiguration(
                "Number of steps must be at least 1".into(),
            ));
        }

        Ok(Self {
            order,
            steps,
            start_date: None,
            optimiser: NelderMeadConfig {
                max_iter: 5000,
                f_tolerance: 1e-9,
                x_tolerance: 1e-5,
                ..NelderMeadConfig::default()
            },
            fitted: None,
        })
    }

    /// Set the first date of generated trajectories.
    ///
    /// By default, trajectories start one period after the last observation.
    pub fn with_start_date(mut self, start_date: NaiveDate) -> Self {
        self.start_date = Some(start_date);
        self
    }

    /// The model orders
    pub fn order(&self) -> ArmaOrder {
        self.order
    }

    /// The length of generated trajectories
    pub fn steps(&self) -> u32 {
        self.steps
    }

    /// Whether [`ArmaModel::fit`] has been called successfully
    pub fn is_fitted(&self) -> bool {
        self.fitted.is_some()
    }

    /// The fitted parameters
    pub fn parameters(&self) -> Option<&ArmaParameters> {
        self.fitted.as_ref().map(|state| &state.parameters)
    }

    /// The series the model was fitted to
    pub fn observed(&self) -> Option<&Series> {
        self.fitted.as_ref().map(|state| &state.observed)
    }

    /// Fit the model to an observed series.
    ///
    /// The series needs at least `p + q + 1` observations, all of which must be finite. Any
    /// previous fit is discarded only once the new one succeeds.
    pub fn fit(&mut self, series: &Series) -> Result<(), WeatherGenError> {
        let ArmaOrder { p, q } = self.order;
        let min_len = p + q + 1;
        if series.len() < min_len {
            return Err(WeatherGenError::InsufficientData(format!(
                "{} needs at least {min_len} observations but the series has {}",
                self.order,
                series.len()
            )));
        }
        if series.values().iter().any(|v| !v.is_finite()) {
            return Err(WeatherGenError::Fitting(
                "Series contains missing or non-numeric values".into(),
            ));
        }
        let step = DateStep::of(series)?;

        let (mean, scale) = mean_and_std(series.values());
        if !(scale.is_finite() && scale > 0.0) {
            return Err(WeatherGenError::Fitting(
                "Cannot standardise a series with zero variance".into(),
            ));
        }
        let standardised: Vec<f64> = series.values().iter().map(|v| (v - mean) / scale).collect();

        let (intercept, ar, ma, variance) = self.estimate(&standardised)?;
        let parameters = ArmaParameters {
            mean,
            scale,
            intercept,
            ar,
            ma,
            sigma: variance.sqrt(),
        };
        info!(
            "Fitted {} model to {} {step} observations",
            self.order,
            series.len()
        );
        debug!("Fitted parameters: {parameters:?}");

        self.fitted = Some(FittedState {
            observed: series.clone(),
            step,
            parameters,
        });

        Ok(())
    }

    /// Estimate intercept, AR and MA coefficients and innovation variance by conditional least
    /// squares
    fn estimate(
        &self,
        standardised: &[f64],
    ) -> Result<(f64, Vec<f64>, Vec<f64>, f64), WeatherGenError> {
        let ArmaOrder { p, q } = self.order;
        let objective = |params: &[f64]| {
            if !is_stationary(&params[1..1 + p]) {
                return f64::INFINITY;
            }
            mean_squared_residual(
                standardised,
                p,
                q,
                params[0],
                &params[1..1 + p],
                &params[1 + p..],
            )
        };

        if p == 0 && q == 0 {
            let (mean, _) = mean_and_std(standardised);
            return Ok((mean, vec![], vec![], objective(&[mean])));
        }

        let mut initial = vec![0.0; 1 + p + q];
        for i in 0..p {
            initial[1 + i] = 0.1 / (i + 1) as f64;
        }
        for j in 0..q {
            initial[1 + p + j] = 0.1 / (j + 1) as f64;
        }
        let mut bounds = vec![(f64::NEG_INFINITY, f64::INFINITY)];
        bounds.extend(std::iter::repeat_n(
            (-COEFFICIENT_BOUND, COEFFICIENT_BOUND),
            p + q,
        ));

        let result = minimise(objective, &initial, &bounds, &self.optimiser);
        if !result.value.is_finite() {
            return Err(WeatherGenError::Fitting(
                "Objective function is not finite at the optimum".into(),
            ));
        }
        if !result.converged {
            return Err(WeatherGenError::Fitting(format!(
                "Optimiser did not converge after {} iterations",
                result.iterations
            )));
        }
        debug!(
            "Optimiser converged after {} iterations (mean squared residual {})",
            result.iterations, result.value
        );

        let point = result.point;
        if !is_stationary(&point[1..1 + p]) {
            return Err(WeatherGenError::Fitting(
                "Fitted AR coefficients are not stationary".into(),
            ));
        }
        Ok((
            point[0],
            point[1..1 + p].to_vec(),
            point[1 + p..].to_vec(),
            result.value,
        ))
    }

    /// Generate an ensemble of `n` independent trajectories.
    ///
    /// Each trajectory draws its own innovations from `rng`, is mapped back to the original units
    /// and is clipped to be non-negative.
    pub fn generate<R: Rng + ?Sized>(
        &self,
        n: u32,
        rng: &mut R,
    ) -> Result<Ensemble, WeatherGenError> {
        let state = self
            .fitted
            .as_ref()
            .ok_or(WeatherGenError::NotFitted("ArmaModel"))?;
        if n == 0 {
            return Err(WeatherGenError::InvalidConfiguration(
                "Number of simulations must be at least 1".into(),
            ));
        }

        let dates = self.trajectory_dates(state)?;
        let parameters = &state.parameters;
        let noise = Normal::new(0.0, parameters.sigma)
            .map_err(|err| WeatherGenError::Fitting(err.to_string()))?;

        let simulations: IndexMap<SimulationID, Vec<f64>> = (1..=n)
            .map(|id| {
                let values = parameters
                    .simulate(dates.len(), &noise, rng)
                    .into_iter()
                    .map(|v| parameters.inverse_transform(v))
                    .collect();
                (SimulationID(id), values)
            })
            .collect();
        info!(
            "Generated {n} trajectories of {} steps from {}",
            dates.len(),
            dates[0]
        );

        Ensemble::new(dates, simulations)
    }

    /// The date index shared by generated trajectories
    fn trajectory_dates(&self, state: &FittedState) -> Result<Vec<NaiveDate>, WeatherGenError> {
        let origin = match self.start_date {
            Some(date) => Some(date),
            None => state
                .observed
                .dates()
                .last()
                .and_then(|last| state.step.advance(*last, 1)),
        };

        (0..self.steps)
            .map(|i| origin.and_then(|origin| state.step.advance(origin, i)))
            .collect::<Option<Vec<_>>>()
            .ok_or_else(|| {
                WeatherGenError::InvalidConfiguration(
                    "Trajectory dates are outside the supported calendar range".into(),
                )
            })
    }
}

/// Mean and population standard deviation
fn mean_and_std(values: &[f64]) -> (f64, f64) {
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    (mean, variance.sqrt())
}

/// Whether an AR polynomial with coefficients `ar` has all its roots outside the unit circle.
///
/// The coefficients are stepped down to partial autocorrelations, which must all lie in (-1, 1).
fn is_stationary(ar: &[f64]) -> bool {
    let mut coefficients = ar.to_vec();
    while let Some(&last) = coefficients.last() {
        if last.is_nan() || last.abs() >= 1.0 {
            return false;
        }
        let k = coefficients.len() - 1;
        let denominator = 1.0 - last * last;
        coefficients = (0..k)
            .map(|j| (coefficients[j] + last * coefficients[k - 1 - j]) / denominator)
            .collect();
    }

    true
}

/// Mean squared one-step-ahead residual, conditioning on the first `max(p, q)` observations
fn mean_squared_residual(
    series: &[f64],
    p: usize,
    q: usize,
    intercept: f64,
    ar: &[f64],
    ma: &[f64],
) -> f64 {
    let start = p.max(q);
    let n = series.len();
    if n <= start {
        return f64::INFINITY;
    }

    let mut residuals = vec![0.0; n];
    let mut css = 0.0;
    for t in start..n {
        let mut prediction = intercept;
        for (i, phi) in ar.iter().enumerate() {
            prediction += phi * (series[t - 1 - i] - intercept);
        }
        for (j, theta) in ma.iter().enumerate() {
            prediction += theta * residuals[t - 1 - j];
        }
        let error = series[t] - prediction;
        residuals[t] = error;
        css += error * error;
    }

    css / (n - start) as f64
}

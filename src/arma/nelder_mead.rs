//! Derivative-free minimisation with the Nelder-Mead simplex method.
use itertools::Itertools;

/// Reflection coefficient
const ALPHA: f64 = 1.0;
/// Expansion coefficient
const GAMMA: f64 = 2.0;
/// Contraction coefficient
const RHO: f64 = 0.5;
/// Shrink coefficient
const SIGMA: f64 = 0.5;

/// Settings for [`minimise`]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NelderMeadConfig {
    /// Maximum number of iterations before giving up
    pub max_iter: usize,
    /// Convergence tolerance on the spread of objective values across the simplex
    pub f_tolerance: f64,
    /// Convergence tolerance on the spread of simplex vertices
    pub x_tolerance: f64,
    /// Relative size of the initial simplex
    pub initial_step: f64,
}

impl Default for NelderMeadConfig {
    fn default() -> Self {
        Self {
            max_iter: 2000,
            f_tolerance: 1e-10,
            x_tolerance: 1e-8,
            initial_step: 0.05,
        }
    }
}

/// The outcome of a minimisation
#[derive(Debug, Clone, PartialEq)]
pub struct NelderMeadResult {
    /// The best point found
    pub point: Vec<f64>,
    /// The objective value at `point`
    pub value: f64,
    /// Number of iterations performed
    pub iterations: usize,
    /// Whether the tolerances were met before `max_iter` was reached
    pub converged: bool,
}

/// Minimise `f` starting from `initial`, keeping each coordinate within `bounds`.
///
/// Non-finite objective values are treated as infinitely bad.
pub fn minimise<F>(
    f: F,
    initial: &[f64],
    bounds: &[(f64, f64)],
    config: &NelderMeadConfig,
) -> NelderMeadResult
where
    F: Fn(&[f64]) -> f64,
{
    assert_eq!(initial.len(), bounds.len(), "One bound needed per parameter");
    let n = initial.len();
    let clamp = |x: Vec<f64>| -> Vec<f64> {
        x.into_iter()
            .zip(bounds)
            .map(|(xi, (lo, hi))| xi.clamp(*lo, *hi))
            .collect()
    };
    let eval = |x: &[f64]| {
        let value = f(x);
        if value.is_finite() {
            value
        } else {
            f64::INFINITY
        }
    };

    // Initial simplex: the starting point plus one perturbed vertex per dimension
    let mut simplex: Vec<(Vec<f64>, f64)> = Vec::with_capacity(n + 1);
    let start = clamp(initial.to_vec());
    simplex.push((start.clone(), eval(&start)));
    for i in 0..n {
        let mut vertex = start.clone();
        vertex[i] = if vertex[i] == 0.0 {
            0.00025
        } else {
            vertex[i] * (1.0 + config.initial_step)
        };
        let vertex = clamp(vertex);
        let value = eval(&vertex);
        simplex.push((vertex, value));
    }

    let mut iterations = 0;
    let mut converged = false;
    while iterations < config.max_iter {
        simplex.sort_by(|a, b| a.1.total_cmp(&b.1));
        if has_converged(&simplex, config) {
            converged = true;
            break;
        }
        iterations += 1;

        let (worst, worst_value) = simplex[n].clone();
        let centroid = (0..n)
            .map(|j| simplex[..n].iter().map(|(x, _)| x[j]).sum::<f64>() / n as f64)
            .collect_vec();
        let towards = |coef: f64, from: &[f64]| {
            clamp(
                centroid
                    .iter()
                    .zip(from)
                    .map(|(c, x)| c + coef * (x - c))
                    .collect(),
            )
        };

        let reflected = towards(-ALPHA, &worst);
        let reflected_value = eval(&reflected);

        if reflected_value < simplex[0].1 {
            let expanded = towards(-GAMMA, &worst);
            let expanded_value = eval(&expanded);
            simplex[n] = if expanded_value < reflected_value {
                (expanded, expanded_value)
            } else {
                (reflected, reflected_value)
            };
            continue;
        }

        if reflected_value < simplex[n - 1].1 {
            simplex[n] = (reflected, reflected_value);
            continue;
        }

        // Contract towards the better of the worst point and its reflection
        let (contracted, contracted_value) = if reflected_value < worst_value {
            let outside = towards(-RHO, &worst);
            let value = eval(&outside);
            (outside, value)
        } else {
            let inside = towards(RHO, &worst);
            let value = eval(&inside);
            (inside, value)
        };
        if contracted_value < worst_value.min(reflected_value) {
            simplex[n] = (contracted, contracted_value);
            continue;
        }

        // Shrink everything towards the best vertex
        let best = simplex[0].0.clone();
        for (vertex, value) in simplex.iter_mut().skip(1) {
            *vertex = clamp(
                best.iter()
                    .zip(vertex.iter())
                    .map(|(b, x)| b + SIGMA * (x - b))
                    .collect(),
            );
            *value = eval(vertex);
        }
    }

    simplex.sort_by(|a, b| a.1.total_cmp(&b.1));
    let (point, value) = simplex.swap_remove(0);
    NelderMeadResult {
        point,
        value,
        iterations,
        converged,
    }
}

/// Whether the (sorted) simplex has collapsed within tolerance
fn has_converged(simplex: &[(Vec<f64>, f64)], config: &NelderMeadConfig) -> bool {
    let (best, best_value) = &simplex[0];
    if !best_value.is_finite() {
        return false;
    }

    let f_spread = simplex
        .iter()
        .map(|(_, value)| (value - best_value).abs())
        .fold(0.0, f64::max);
    let x_spread = simplex
        .iter()
        .flat_map(|(x, _)| x.iter().zip(best).map(|(a, b)| (a - b).abs()))
        .fold(0.0, f64::max);

    f_spread <= config.f_tolerance * (1.0 + best_value.abs()) && x_spread <= config.x_tolerance
}

#[cfg(test)]
mod tests {
    use super::*;
    use float_cmp::assert_approx_eq;

    #[test]
    fn test_minimise_quadratic() {
        let f = |x: &[f64]| (x[0] - 1.0).powi(2) + 2.0 * (x[1] + 0.5).powi(2);
        let result = minimise(
            f,
            &[0.0, 0.0],
            &[(-10.0, 10.0), (-10.0, 10.0)],
            &NelderMeadConfig::default(),
        );
        assert!(result.converged);
        assert_approx_eq!(f64, result.point[0], 1.0, epsilon = 1e-6);
        assert_approx_eq!(f64, result.point[1], -0.5, epsilon = 1e-6);
    }

    #[test]
    fn test_minimise_respects_bounds() {
        let f = |x: &[f64]| (x[0] - 5.0).powi(2);
        let result = minimise(f, &[0.0], &[(-0.99, 0.99)], &NelderMeadConfig::default());
        assert_approx_eq!(f64, result.point[0], 0.99, epsilon = 1e-6);
    }

    #[test]
    fn test_minimise_rosenbrock() {
        let f = |x: &[f64]| (1.0 - x[0]).powi(2) + 100.0 * (x[1] - x[0].powi(2)).powi(2);
        let config = NelderMeadConfig {
            max_iter: 10_000,
            ..NelderMeadConfig::default()
        };
        let result = minimise(f, &[-1.2, 1.0], &[(-5.0, 5.0), (-5.0, 5.0)], &config);
        assert_approx_eq!(f64, result.point[0], 1.0, epsilon = 1e-4);
        assert_approx_eq!(f64, result.point[1], 1.0, epsilon = 1e-4);
    }

    #[test]
    fn test_minimise_gives_up() {
        let f = |x: &[f64]| x[0].powi(2);
        let config = NelderMeadConfig {
            max_iter: 1,
            ..NelderMeadConfig::default()
        };
        let result = minimise(f, &[3.0], &[(-10.0, 10.0)], &config);
        assert!(!result.converged);
        assert_eq!(result.iterations, 1);
    }
}

use super::dataset::{count_distinct, PsychometricDataset, WeightedPoints};
use super::weibull::{PsychometricFunction, Weibull};
use crate::error::{PsychError, Result};

use serde::{Deserialize, Serialize};

const INITIAL_DAMPING: f64 = 1e-3;
const MIN_DAMPING: f64 = 1e-12;
const MAX_DAMPING: f64 = 1e30;
const DIAGONAL_FLOOR: f64 = 1e-12;

// -----------------------------------------------------------------------------
// FIT CONFIG
// -----------------------------------------------------------------------------

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct FitConfig {
    pub guess_rate: f64,
    pub flake_rate: f64,
    /// Slope used to seed every fit.
    pub slope_prior: f64,
    /// Performance level defining the threshold; `None` uses `1 - (1 - guess) / e`.
    #[serde(default)]
    pub threshy: Option<f64>,
    pub max_iterations: usize,
}

impl Default for FitConfig {
    fn default() -> Self {
        Self {
            guess_rate: 0.5,
            flake_rate: 0.99,
            slope_prior: 3.5,
            threshy: None,
            max_iterations: 200,
        }
    }
}

impl FitConfig {
    pub fn validate(&self) -> Result<()> {
        if !(self.slope_prior > 0.0) || !self.slope_prior.is_finite() {
            return Err(PsychError::invalid_config(format!(
                "slope_prior must be positive, got {}",
                self.slope_prior
            )));
        }
        if self.max_iterations == 0 {
            return Err(PsychError::invalid_config("max_iterations must be at least 1"));
        }
        self.model()
            .map(|_| ())
            .map_err(|e| PsychError::invalid_config(e.to_string()))
    }

    pub fn model(&self) -> Result<Weibull> {
        Weibull::with_threshy(self.guess_rate, self.flake_rate, self.threshy)
    }

    pub fn options(&self) -> FitOptions {
        FitOptions {
            max_iterations: self.max_iterations,
            ..FitOptions::default()
        }
    }
}

/// Solver limits. Defaults follow MINPACK's `lmdif` tolerances.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq)]
pub struct FitOptions {
    pub max_iterations: usize,
    /// Relative parameter-step tolerance.
    pub xtol: f64,
    /// Relative sum-of-squares reduction tolerance.
    pub ftol: f64,
}

impl Default for FitOptions {
    fn default() -> Self {
        Self {
            max_iterations: 200,
            xtol: 1.49012e-8,
            ftol: 1.49012e-8,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq)]
pub struct CurveFit {
    pub threshold: f64,
    pub slope: f64,
    /// Residual sum of squares at the solution.
    pub sse: f64,
    pub iterations: usize,
}

// -----------------------------------------------------------------------------
// LEAST SQUARES
// -----------------------------------------------------------------------------

/// Default seed for a fit: mean intensity as threshold, prior slope.
pub fn initial_guess(points: &WeightedPoints, slope_prior: f64) -> (f64, f64) {
    (points.mean_x(), slope_prior)
}

/// Fit `(thresh, slope)` to aggregated data with a Weibull of the given
/// guess and flake rates.
pub fn fit(
    dataset: &PsychometricDataset,
    initial_guess: (f64, f64),
    guess_rate: f64,
    flake_rate: f64,
    options: &FitOptions,
) -> Result<CurveFit> {
    let points = dataset.expand()?;
    let model = Weibull::new(guess_rate, flake_rate)?;
    fit_points(&points.x, &points.y, initial_guess, &model, options)
}

/// Levenberg-Marquardt minimisation of `sum((y - model(x))^2)` over
/// `(thresh, slope)`, starting at `initial_guess`.
pub fn fit_points(
    x: &[f64],
    y: &[f64],
    initial_guess: (f64, f64),
    model: &dyn PsychometricFunction,
    options: &FitOptions,
) -> Result<CurveFit> {
    if x.len() != y.len() {
        return Err(PsychError::insufficient_data(format!(
            "{} intensities but {} responses",
            x.len(),
            y.len()
        )));
    }
    if count_distinct(x) < 2 {
        return Err(PsychError::insufficient_data(
            "need at least 2 distinct intensities",
        ));
    }
    if y.iter().any(|value| !value.is_finite()) {
        return Err(PsychError::domain("responses must be finite"));
    }
    if options.max_iterations == 0 {
        return Err(PsychError::invalid_config("max_iterations must be at least 1"));
    }

    let (mut thresh, mut slope) = initial_guess;
    let mut sse = sum_of_squares(x, y, thresh, slope, model)?;
    let mut damping = INITIAL_DAMPING;

    for iteration in 1..=options.max_iterations {
        let (jtj, jtr) = normal_equations(x, y, thresh, slope, model)?;

        loop {
            let a00 = jtj[0][0] + damping * jtj[0][0].max(DIAGONAL_FLOOR);
            let a11 = jtj[1][1] + damping * jtj[1][1].max(DIAGONAL_FLOOR);
            let a01 = jtj[0][1];
            let det = a00 * a11 - a01 * a01;

            if !det.is_finite() || det.abs() < f64::MIN_POSITIVE {
                damping *= 10.0;
                if damping > MAX_DAMPING {
                    return Err(PsychError::FitDidNotConverge {
                        iterations: iteration,
                        reason: "normal equations are singular".to_string(),
                    });
                }
                continue;
            }

            let d_thresh = (jtr[0] * a11 - a01 * jtr[1]) / det;
            let d_slope = (a00 * jtr[1] - a01 * jtr[0]) / det;
            let small_step = d_thresh.abs() <= options.xtol * (thresh.abs() + options.xtol)
                && d_slope.abs() <= options.xtol * (slope.abs() + options.xtol);

            let next_thresh = thresh + d_thresh;
            let next_slope = slope + d_slope;

            if next_thresh > 0.0 && next_slope > 0.0 && next_thresh.is_finite() && next_slope.is_finite() {
                let next_sse = sum_of_squares(x, y, next_thresh, next_slope, model)?;
                if next_sse <= sse {
                    let reduction = sse - next_sse;
                    let previous = sse;
                    thresh = next_thresh;
                    slope = next_slope;
                    sse = next_sse;
                    damping = (damping / 10.0).max(MIN_DAMPING);

                    if small_step || reduction <= options.ftol * previous {
                        return Ok(CurveFit {
                            threshold: thresh,
                            slope,
                            sse,
                            iterations: iteration,
                        });
                    }
                    break;
                }
            }

            // Rejected step. A step this small cannot move the solution any more.
            if small_step {
                return Ok(CurveFit {
                    threshold: thresh,
                    slope,
                    sse,
                    iterations: iteration,
                });
            }

            damping *= 10.0;
            if damping > MAX_DAMPING {
                return Err(PsychError::FitDidNotConverge {
                    iterations: iteration,
                    reason: "damping exhausted without reducing the residual".to_string(),
                });
            }
        }
    }

    Err(PsychError::FitDidNotConverge {
        iterations: options.max_iterations,
        reason: "iteration cap reached".to_string(),
    })
}

fn sum_of_squares(
    x: &[f64],
    y: &[f64],
    thresh: f64,
    slope: f64,
    model: &dyn PsychometricFunction,
) -> Result<f64> {
    let mut sse = 0.0;
    for (&xi, &yi) in x.iter().zip(y) {
        let residual = yi - model.evaluate(xi, thresh, slope)?;
        sse += residual * residual;
    }
    Ok(sse)
}

/// `J^T J` and `J^T r` with `J` the model Jacobian and `r = y - model`.
fn normal_equations(
    x: &[f64],
    y: &[f64],
    thresh: f64,
    slope: f64,
    model: &dyn PsychometricFunction,
) -> Result<([[f64; 2]; 2], [f64; 2])> {
    let mut jtj = [[0.0; 2]; 2];
    let mut jtr = [0.0; 2];

    for (&xi, &yi) in x.iter().zip(y) {
        let residual = yi - model.evaluate(xi, thresh, slope)?;
        let (d_thresh, d_slope) = model.gradient(xi, thresh, slope)?;
        let j = [d_thresh, d_slope];
        for row in 0..2 {
            jtr[row] += j[row] * residual;
            for col in 0..2 {
                jtj[row][col] += j[row] * j[col];
            }
        }
    }

    Ok((jtj, jtr))
}

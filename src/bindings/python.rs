use crate::error::PsychError;
use crate::processing::bootstrap::{bootstrap_ci, BootstrapConfig};
use crate::processing::fitter::{fit_points, FitOptions};
use crate::processing::staircase::{Staircase, StaircaseConfig};
use crate::processing::weibull::{weibull, Weibull};

use pyo3::exceptions::{PyRuntimeError, PyValueError};
use pyo3::prelude::*;

impl From<PsychError> for PyErr {
    fn from(error: PsychError) -> PyErr {
        match error {
            PsychError::FitDidNotConverge { .. } | PsychError::Io(_) => {
                PyRuntimeError::new_err(error.to_string())
            }
            _ => PyValueError::new_err(error.to_string()),
        }
    }
}

#[pyclass]
pub struct PyStaircase {
    staircase: Staircase,
}

#[pymethods]
impl PyStaircase {
    #[new]
    pub fn new(
        start_intensity: f64,
        step_size: f64,
        direction_sign: i32,
        n_up: u32,
        n_down: u32,
        lower_bound: f64,
        upper_bound: f64,
    ) -> PyResult<Self> {
        let config = StaircaseConfig {
            start_intensity,
            step_size,
            direction_sign,
            n_up,
            n_down,
            lower_bound,
            upper_bound,
        };
        Ok(PyStaircase {
            staircase: Staircase::new(config)?,
        })
    }

    pub fn update(&mut self, correct: bool) -> f64 {
        self.staircase.update(correct)
    }

    #[getter]
    pub fn intensity(&self) -> f64 {
        self.staircase.intensity()
    }

    #[getter]
    pub fn reversals(&self) -> usize {
        self.staircase.reversals()
    }

    pub fn history(&self) -> Vec<(f64, bool)> {
        self.staircase
            .history()
            .iter()
            .map(|observation| (observation.intensity, observation.correct))
            .collect()
    }
}

#[pyfunction]
#[pyo3(name = "weibull", signature = (x, thresh, slope, guess, flake, threshy=None))]
pub fn py_weibull(
    x: f64,
    thresh: f64,
    slope: f64,
    guess: f64,
    flake: f64,
    threshy: Option<f64>,
) -> PyResult<f64> {
    Ok(weibull(x, thresh, slope, guess, flake, threshy)?)
}

#[pyfunction]
#[pyo3(signature = (x, y, initial_guess, guess_rate, flake_rate, max_iterations=200))]
pub fn fit_weibull(
    x: Vec<f64>,
    y: Vec<f64>,
    initial_guess: (f64, f64),
    guess_rate: f64,
    flake_rate: f64,
    max_iterations: usize,
) -> PyResult<(f64, f64)> {
    let model = Weibull::new(guess_rate, flake_rate)?;
    let options = FitOptions {
        max_iterations,
        ..FitOptions::default()
    };
    let fit = fit_points(&x, &y, initial_guess, &model, &options)?;
    Ok((fit.threshold, fit.slope))
}

#[pyfunction]
#[pyo3(signature = (x, y, slope_prior, guess_rate, flake_rate, n_resamples=1000, alpha=0.05, seed=None))]
#[allow(clippy::too_many_arguments)]
pub fn bootstrap_threshold_ci(
    x: Vec<f64>,
    y: Vec<f64>,
    slope_prior: f64,
    guess_rate: f64,
    flake_rate: f64,
    n_resamples: usize,
    alpha: f64,
    seed: Option<u64>,
) -> PyResult<(f64, f64, usize)> {
    let model = Weibull::new(guess_rate, flake_rate)?;
    let config = BootstrapConfig {
        n_resamples,
        alpha,
        seed,
        ..BootstrapConfig::default()
    };
    let result = bootstrap_ci(&x, &y, &model, slope_prior, &FitOptions::default(), &config)?;
    Ok((result.lower, result.upper, result.n_failed))
}

/// A Python module implemented in Rust.
#[pymodule]
pub fn adaptive_psychophysics(m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add_class::<PyStaircase>()?;
    m.add_function(wrap_pyfunction!(py_weibull, m)?)?;
    m.add_function(wrap_pyfunction!(fit_weibull, m)?)?;
    m.add_function(wrap_pyfunction!(bootstrap_threshold_ci, m)?)?;
    Ok(())
}

use super::dataset::{count_distinct, mean};
use super::fitter::{fit_points, CurveFit, FitOptions};
use super::weibull::PsychometricFunction;
use crate::error::{PsychError, Result};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

// -----------------------------------------------------------------------------
// BOOTSTRAP CONFIG
// -----------------------------------------------------------------------------

/// What to do with a resample whose refit fails.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(tag = "policy", rename_all = "snake_case")]
pub enum ResampleFailurePolicy {
    /// Drop the resample; percentiles are taken over the successful ones.
    Skip,
    /// Redraw indices up to `max_attempts` times in total before dropping it.
    Retry { max_attempts: usize },
}

impl Default for ResampleFailurePolicy {
    fn default() -> Self {
        ResampleFailurePolicy::Skip
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct BootstrapConfig {
    pub n_resamples: usize,
    pub alpha: f64,
    /// Base seed; resample `i` draws from a stream seeded with `seed + i`.
    #[serde(default)]
    pub seed: Option<u64>,
    #[serde(default)]
    pub failure_policy: ResampleFailurePolicy,
    pub parallel: bool,
}

impl Default for BootstrapConfig {
    fn default() -> Self {
        Self {
            n_resamples: 1000,
            alpha: 0.05,
            seed: None,
            failure_policy: ResampleFailurePolicy::Skip,
            parallel: true,
        }
    }
}

impl BootstrapConfig {
    pub fn validate(&self) -> Result<()> {
        if self.n_resamples == 0 {
            return Err(PsychError::invalid_config("n_resamples must be at least 1"));
        }
        if !(self.alpha > 0.0 && self.alpha < 1.0) {
            return Err(PsychError::invalid_config(format!(
                "alpha must lie in (0, 1), got {}",
                self.alpha
            )));
        }
        if let ResampleFailurePolicy::Retry { max_attempts } = self.failure_policy {
            if max_attempts == 0 {
                return Err(PsychError::invalid_config("max_attempts must be at least 1"));
            }
        }
        Ok(())
    }

    fn attempts(&self) -> usize {
        match self.failure_policy {
            ResampleFailurePolicy::Skip => 1,
            ResampleFailurePolicy::Retry { max_attempts } => max_attempts,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct BootstrapResult {
    pub lower: f64,
    pub upper: f64,
    /// Successful threshold estimates, ascending.
    pub estimates: Vec<f64>,
    pub slope_lower: f64,
    pub slope_upper: f64,
    /// Slope estimates of the same resamples, ascending.
    pub slope_estimates: Vec<f64>,
    /// Resamples whose refit failed and were dropped.
    pub n_failed: usize,
}

impl BootstrapResult {
    pub fn width(&self) -> f64 {
        self.upper - self.lower
    }

    pub fn slope_width(&self) -> f64 {
        self.slope_upper - self.slope_lower
    }
}

// -----------------------------------------------------------------------------
// RESAMPLING
// -----------------------------------------------------------------------------

/// Percentile confidence intervals on threshold and slope by resampling
/// `(x, y)` pairs with replacement and refitting each resample.
///
/// Only failures that belong to an individual resample are subject to the
/// failure policy: a refit that does not converge, or a draw with fewer than
/// two distinct intensities. Problems with the input itself are returned.
pub fn bootstrap_ci(
    x: &[f64],
    y: &[f64],
    model: &dyn PsychometricFunction,
    slope_prior: f64,
    fit_options: &FitOptions,
    config: &BootstrapConfig,
) -> Result<BootstrapResult> {
    config.validate()?;
    check_input(x, y, model, slope_prior)?;

    let base_seed = config.seed.unwrap_or_else(|| rand::thread_rng().gen());
    let attempts = config.attempts();

    let resample = |index: usize| -> Result<Option<CurveFit>> {
        let mut rng = StdRng::seed_from_u64(base_seed.wrapping_add(index as u64));
        for _ in 0..attempts {
            match resample_fit(x, y, model, slope_prior, fit_options, &mut rng) {
                Ok(fit) => return Ok(Some(fit)),
                Err(error) if is_resample_failure(&error) => continue,
                Err(error) => return Err(error),
            }
        }
        Ok(None)
    };

    let outcomes: Vec<Option<CurveFit>> = if config.parallel {
        (0..config.n_resamples)
            .into_par_iter()
            .map(resample)
            .collect::<Result<_>>()?
    } else {
        (0..config.n_resamples).map(resample).collect::<Result<_>>()?
    };

    let fits: Vec<CurveFit> = outcomes.into_iter().flatten().collect();
    let n_failed = config.n_resamples - fits.len();

    if fits.is_empty() {
        return Err(PsychError::FitDidNotConverge {
            iterations: fit_options.max_iterations,
            reason: format!("all {} bootstrap resamples failed to fit", config.n_resamples),
        });
    }

    let estimates = sorted(fits.iter().map(|fit| fit.threshold));
    let slope_estimates = sorted(fits.iter().map(|fit| fit.slope));
    let (lower, upper) = percentile_interval(&estimates, config.alpha);
    let (slope_lower, slope_upper) = percentile_interval(&slope_estimates, config.alpha);

    Ok(BootstrapResult {
        lower,
        upper,
        estimates,
        slope_lower,
        slope_upper,
        slope_estimates,
        n_failed,
    })
}

/// Reject input that no resample could ever fit.
fn check_input(x: &[f64], y: &[f64], model: &dyn PsychometricFunction, slope_prior: f64) -> Result<()> {
    if x.len() != y.len() {
        return Err(PsychError::insufficient_data(format!(
            "{} intensities but {} responses",
            x.len(),
            y.len()
        )));
    }
    if x.is_empty() {
        return Err(PsychError::insufficient_data("no points to resample"));
    }
    if y.iter().any(|value| !value.is_finite()) {
        return Err(PsychError::domain("responses must be finite"));
    }
    if count_distinct(x) < 2 {
        return Err(PsychError::insufficient_data(
            "need at least 2 distinct intensities",
        ));
    }

    let seed = mean(x);
    for &intensity in x {
        model.evaluate(intensity, seed, slope_prior)?;
    }
    Ok(())
}

fn is_resample_failure(error: &PsychError) -> bool {
    matches!(
        error,
        PsychError::FitDidNotConverge { .. } | PsychError::InsufficientData(_)
    )
}

fn resample_fit(
    x: &[f64],
    y: &[f64],
    model: &dyn PsychometricFunction,
    slope_prior: f64,
    fit_options: &FitOptions,
    rng: &mut StdRng,
) -> Result<CurveFit> {
    let n = x.len();
    let mut x_resampled = Vec::with_capacity(n);
    let mut y_resampled = Vec::with_capacity(n);
    for _ in 0..n {
        let index = rng.gen_range(0..n);
        x_resampled.push(x[index]);
        y_resampled.push(y[index]);
    }

    let seed = (mean(&x_resampled), slope_prior);
    fit_points(&x_resampled, &y_resampled, seed, model, fit_options)
}

fn sorted(values: impl Iterator<Item = f64>) -> Vec<f64> {
    let mut values: Vec<f64> = values.collect();
    values.sort_by(|a, b| a.total_cmp(b));
    values
}

fn percentile_interval(values: &[f64], alpha: f64) -> (f64, f64) {
    (
        values[percentile_index(values.len(), alpha / 2.0)],
        values[percentile_index(values.len(), 1.0 - alpha / 2.0)],
    )
}

/// Index of the `quantile` position in a sorted array of length `n`.
pub fn percentile_index(n: usize, quantile: f64) -> usize {
    ((n as f64 * quantile).floor() as usize).min(n.saturating_sub(1))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::processing::weibull::Weibull;

    fn noisy_points() -> (Vec<f64>, Vec<f64>) {
        let model = Weibull::new(0.5, 0.99).unwrap();
        let mut rng = StdRng::seed_from_u64(7);
        let mut x = Vec::new();
        let mut y = Vec::new();
        for &intensity in &[0.1, 0.2, 0.3, 0.4, 0.5] {
            let p = model.evaluate(intensity, 0.3, 3.5).unwrap();
            let n_trials = 30;
            let n_correct = (0..n_trials).filter(|_| rng.gen::<f64>() < p).count();
            for _ in 0..n_trials {
                x.push(intensity);
                y.push(n_correct as f64 / n_trials as f64);
            }
        }
        (x, y)
    }

    /// Three points lying exactly on a Weibull curve. Any draw that keeps at
    /// least two of the intensities refits exactly; a draw that repeats a
    /// single intensity cannot be fitted.
    fn three_exact_points() -> (Vec<f64>, Vec<f64>) {
        let model = Weibull::new(0.5, 0.99).unwrap();
        let x = vec![0.1, 0.3, 0.5];
        let y = x
            .iter()
            .map(|&intensity| model.evaluate(intensity, 0.3, 3.5).unwrap())
            .collect();
        (x, y)
    }

    /// Replays one draw of `n` indices and reports whether it hit a single index.
    fn draw_collapses(rng: &mut StdRng, n: usize) -> bool {
        let first = rng.gen_range(0..n);
        let mut collapsed = true;
        for _ in 1..n {
            if rng.gen_range(0..n) != first {
                collapsed = false;
            }
        }
        collapsed
    }

    fn expected_failures(seed: u64, n_resamples: usize, attempts: usize) -> usize {
        (0..n_resamples)
            .filter(|&index| {
                let mut rng = StdRng::seed_from_u64(seed.wrapping_add(index as u64));
                (0..attempts).all(|_| draw_collapses(&mut rng, 3))
            })
            .count()
    }

    #[test]
    fn percentile_positions() {
        assert_eq!(percentile_index(1000, 0.025), 25);
        assert_eq!(percentile_index(1000, 0.975), 975);
        assert_eq!(percentile_index(1, 0.975), 0);
    }

    #[test]
    fn seeded_runs_match_across_execution_modes() {
        let (x, y) = noisy_points();
        let model = Weibull::new(0.5, 0.99).unwrap();
        let sequential = BootstrapConfig {
            n_resamples: 50,
            seed: Some(11),
            parallel: false,
            ..BootstrapConfig::default()
        };
        let parallel = BootstrapConfig {
            parallel: true,
            ..sequential.clone()
        };

        let a = bootstrap_ci(&x, &y, &model, 3.5, &FitOptions::default(), &sequential).unwrap();
        let b = bootstrap_ci(&x, &y, &model, 3.5, &FitOptions::default(), &parallel).unwrap();
        assert_eq!(a, b);
        assert!(a.lower <= a.upper);
        assert!(a.slope_lower <= a.slope_upper);
        assert_eq!(a.estimates.len() + a.n_failed, 50);
        assert_eq!(a.slope_estimates.len(), a.estimates.len());
    }

    #[test]
    fn skipped_resamples_are_counted_exactly() {
        let (x, y) = three_exact_points();
        let model = Weibull::new(0.5, 0.99).unwrap();
        let config = BootstrapConfig {
            n_resamples: 200,
            seed: Some(31),
            ..BootstrapConfig::default()
        };

        let result = bootstrap_ci(&x, &y, &model, 3.5, &FitOptions::default(), &config).unwrap();
        let expected = expected_failures(31, 200, 1);

        assert!(expected > 0);
        assert_eq!(result.n_failed, expected);
        assert_eq!(result.estimates.len() + result.n_failed, 200);
        assert!(result.estimates.iter().all(|t| (t - 0.3).abs() < 1e-4));
    }

    #[test]
    fn retry_recovers_dropped_resamples() {
        let (x, y) = three_exact_points();
        let model = Weibull::new(0.5, 0.99).unwrap();
        let skip = BootstrapConfig {
            n_resamples: 200,
            seed: Some(31),
            parallel: false,
            ..BootstrapConfig::default()
        };
        let retry = BootstrapConfig {
            failure_policy: ResampleFailurePolicy::Retry { max_attempts: 4 },
            ..skip.clone()
        };

        let skipped = bootstrap_ci(&x, &y, &model, 3.5, &FitOptions::default(), &skip).unwrap();
        let retried = bootstrap_ci(&x, &y, &model, 3.5, &FitOptions::default(), &retry).unwrap();

        assert_eq!(retried.n_failed, expected_failures(31, 200, 4));
        assert!(retried.n_failed < skipped.n_failed);
        assert_eq!(retried.estimates.len() + retried.n_failed, 200);
    }

    #[test]
    fn all_failed_resamples_do_not_converge() {
        let (x, y) = noisy_points();
        let model = Weibull::new(0.5, 0.99).unwrap();
        let options = FitOptions {
            max_iterations: 1,
            ..FitOptions::default()
        };
        let config = BootstrapConfig {
            n_resamples: 20,
            seed: Some(3),
            ..BootstrapConfig::default()
        };
        let result = bootstrap_ci(&x, &y, &model, 0.5, &options, &config);
        assert!(matches!(result, Err(PsychError::FitDidNotConverge { .. })));
    }

    #[test]
    fn negative_intensities_are_a_domain_error() {
        let model = Weibull::new(0.5, 0.99).unwrap();
        let config = BootstrapConfig {
            n_resamples: 10,
            seed: Some(1),
            ..BootstrapConfig::default()
        };
        let result = bootstrap_ci(
            &[-0.1, -0.1, -0.1, 0.2, 0.2, 0.2],
            &[0.5, 0.5, 0.5, 0.8, 0.8, 0.8],
            &model,
            3.5,
            &FitOptions::default(),
            &config,
        );
        assert!(matches!(result, Err(PsychError::DomainError(_))));
    }

    #[test]
    fn single_intensity_is_insufficient() {
        let model = Weibull::new(0.5, 0.99).unwrap();
        let result = bootstrap_ci(
            &[0.2, 0.2, 0.2],
            &[0.5, 0.6, 0.7],
            &model,
            3.5,
            &FitOptions::default(),
            &BootstrapConfig::default(),
        );
        assert!(matches!(result, Err(PsychError::InsufficientData(_))));
    }

    #[test]
    fn rejects_bad_options() {
        let model = Weibull::new(0.5, 0.99).unwrap();
        let config = BootstrapConfig {
            alpha: 1.5,
            ..BootstrapConfig::default()
        };
        let result = bootstrap_ci(&[0.1, 0.2], &[0.5, 0.6], &model, 3.5, &FitOptions::default(), &config);
        assert!(matches!(result, Err(PsychError::InvalidConfig(_))));
    }
}

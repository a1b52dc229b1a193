use super::bootstrap::{bootstrap_ci, BootstrapConfig};
use super::dataset::{PsychometricDataset, WeightedPoints};
use super::fitter::{fit_points, initial_guess, FitConfig};
use super::staircase::TrialObservation;
use super::weibull::PsychometricFunction;
use crate::error::Result;

use serde::{Deserialize, Serialize};
use std::path::Path;

/// Number of samples in the fitted curve handed to plotting tools.
pub const CURVE_SAMPLES: usize = 100;

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq)]
pub struct CurvePoint {
    pub intensity: f64,
    pub proportion_correct: f64,
}

/// Everything an external plotter or report needs about one run.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct AnalysisReport {
    pub threshold: f64,
    pub slope: f64,
    pub ci_lower: f64,
    pub ci_upper: f64,
    pub slope_ci_lower: f64,
    pub slope_ci_upper: f64,
    pub n_resamples_used: usize,
    pub n_failed_resamples: usize,
    pub total_trials: usize,
    /// Points the fit was run on.
    pub points: WeightedPoints,
    pub curve: Vec<CurvePoint>,
    /// Intensity of the final trial in presentation order.
    pub last_intensity: Option<f64>,
}

/// Aggregate, fit and bootstrap a completed run.
pub fn analyze(
    observations: &[TrialObservation],
    fit_config: &FitConfig,
    bootstrap_config: &BootstrapConfig,
) -> Result<AnalysisReport> {
    fit_config.validate()?;
    bootstrap_config.validate()?;

    let dataset = PsychometricDataset::from_observations(observations);
    let points = dataset.expand()?;
    let model = fit_config.model()?;
    let options = fit_config.options();

    let fit = fit_points(
        &points.x,
        &points.y,
        initial_guess(&points, fit_config.slope_prior),
        &model,
        &options,
    )?;

    let interval = bootstrap_ci(
        &points.x,
        &points.y,
        &model,
        fit_config.slope_prior,
        &options,
        bootstrap_config,
    )?;

    let curve = fitted_curve(&model, fit.threshold, fit.slope, &points, CURVE_SAMPLES)?;

    Ok(AnalysisReport {
        threshold: fit.threshold,
        slope: fit.slope,
        ci_lower: interval.lower,
        ci_upper: interval.upper,
        slope_ci_lower: interval.slope_lower,
        slope_ci_upper: interval.slope_upper,
        n_resamples_used: interval.estimates.len(),
        n_failed_resamples: interval.n_failed,
        total_trials: dataset.total_trials(),
        points,
        curve,
        last_intensity: observations.last().map(|observation| observation.intensity),
    })
}

/// The trials of one experimental condition within a run.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct ConditionRun {
    pub label: String,
    pub observations: Vec<TrialObservation>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct ConditionReport {
    pub label: String,
    pub report: AnalysisReport,
}

/// Analyse every condition independently with the same fit and bootstrap
/// settings. The first condition that cannot be analysed aborts the run.
pub fn analyze_conditions(
    runs: &[ConditionRun],
    fit_config: &FitConfig,
    bootstrap_config: &BootstrapConfig,
) -> Result<Vec<ConditionReport>> {
    runs.iter()
        .map(|run| {
            Ok(ConditionReport {
                label: run.label.clone(),
                report: analyze(&run.observations, fit_config, bootstrap_config)?,
            })
        })
        .collect()
}

/// Sample the fitted model at `samples` evenly spaced intensities spanning the data.
pub fn fitted_curve(
    model: &dyn PsychometricFunction,
    threshold: f64,
    slope: f64,
    points: &WeightedPoints,
    samples: usize,
) -> Result<Vec<CurvePoint>> {
    let min = points.x.iter().copied().fold(f64::INFINITY, f64::min);
    let max = points.x.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    if samples == 0 || !min.is_finite() {
        return Ok(Vec::new());
    }

    let step = if samples > 1 {
        (max - min) / (samples - 1) as f64
    } else {
        0.0
    };

    (0..samples)
        .map(|i| {
            let intensity = min + step * i as f64;
            Ok(CurvePoint {
                intensity,
                proportion_correct: model.evaluate(intensity, threshold, slope)?,
            })
        })
        .collect()
}

/// Write the fitted curve as `intensity,proportion_correct` rows.
pub fn write_curve_csv<P: AsRef<Path>>(report: &AnalysisReport, path: P) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)?;
    for point in &report.curve {
        writer.serialize(point)?;
    }
    writer.flush()?;
    Ok(())
}

//! Integration tests for the Weibull model, least-squares fit and bootstrap CI.

use adaptive_psychophysics::local::trial_log::{TrialLog, TrialLogWriter};
use adaptive_psychophysics::config::TrialLogColumns;
use adaptive_psychophysics::processing::dataset::IntensityCount;
use adaptive_psychophysics::processing::weibull::default_threshy;
use adaptive_psychophysics::{
    analyze, bootstrap_ci, fit, fit_points, weibull, BootstrapConfig, FitConfig, FitOptions,
    PsychError, PsychometricDataset, PsychometricFunction, TrialObservation, Weibull,
};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::BTreeMap;

const INTENSITIES: [f64; 5] = [0.1, 0.2, 0.3, 0.4, 0.5];

// ---- helpers ----------------------------------------------------------------

/// Binomial responses from a Weibull observer with threshold 0.3 and slope 3.5.
fn simulated_observations(trials_per_intensity: usize, seed: u64) -> Vec<TrialObservation> {
    let model = Weibull::new(0.5, 0.99).unwrap();
    let mut rng = StdRng::seed_from_u64(seed);
    let mut observations = Vec::new();
    for &intensity in &INTENSITIES {
        let p = model.evaluate(intensity, 0.3, 3.5).unwrap();
        for _ in 0..trials_per_intensity {
            observations.push(TrialObservation::new(intensity, rng.gen::<f64>() < p));
        }
    }
    observations
}

fn bootstrap_config(n_resamples: usize, seed: u64) -> BootstrapConfig {
    BootstrapConfig {
        n_resamples,
        seed: Some(seed),
        ..BootstrapConfig::default()
    }
}

// ---- model ------------------------------------------------------------------

#[test]
fn threshold_parameter_marks_threshy_level() {
    for &(thresh, slope, guess) in &[(0.3, 3.5, 0.5), (2.0, 1.2, 0.25), (0.01, 10.0, 0.0)] {
        let at_threshold = weibull(thresh, thresh, slope, guess, 1.0, None).unwrap();
        assert!((at_threshold - default_threshy(guess)).abs() < 1e-12);

        // Below a perfect ceiling the same point is scaled between guess and flake.
        let flake = 0.99;
        let scaled = weibull(thresh, thresh, slope, guess, flake, None).unwrap();
        let expected = flake - (flake - guess) * (1.0 - default_threshy(guess)) / (1.0 - guess);
        assert!((scaled - expected).abs() < 1e-12);
    }
}

#[test]
fn weibull_is_monotone_between_asymptotes() {
    for &(thresh, slope) in &[(0.3, 3.5), (0.8, 1.0), (0.05, 6.0)] {
        let mut previous = weibull(0.0, thresh, slope, 0.5, 0.99, None).unwrap();
        assert!((previous - 0.5).abs() < 1e-12);

        for step in 1..=400 {
            let x = step as f64 * thresh / 100.0;
            let y = weibull(x, thresh, slope, 0.5, 0.99, None).unwrap();
            assert!(y >= previous);
            assert!(y <= 0.99);
            previous = y;
        }

        let far = weibull(1000.0 * thresh, thresh, slope, 0.5, 0.99, None).unwrap();
        assert!((far - 0.99).abs() < 1e-9);
    }
}

#[test]
fn model_domain_errors() {
    assert!(matches!(
        weibull(0.1, -0.3, 3.5, 0.5, 0.99, None),
        Err(PsychError::DomainError(_))
    ));
    assert!(matches!(
        weibull(0.1, 0.3, 0.0, 0.5, 0.99, None),
        Err(PsychError::DomainError(_))
    ));
}

// ---- fit --------------------------------------------------------------------

#[test]
fn recovers_threshold_and_slope_from_clean_data() {
    let model = Weibull::new(0.5, 0.99).unwrap();
    let counts = INTENSITIES
        .iter()
        .map(|&intensity| {
            let p = model.evaluate(intensity, 0.3, 3.5).unwrap();
            IntensityCount {
                intensity,
                n_correct: (p * 1000.0).round() as usize,
                n_trials: 1000,
            }
        })
        .collect();
    let dataset = PsychometricDataset::from_counts(counts).unwrap();
    let points = dataset.expand().unwrap();

    let result = fit(
        &dataset,
        (points.mean_x(), 3.5),
        0.5,
        0.99,
        &FitOptions::default(),
    )
    .unwrap();

    assert!((result.threshold - 0.3).abs() <= 0.3 * 0.05);
    assert!((result.slope - 3.5).abs() <= 3.5 * 0.05);
}

#[test]
fn refit_is_deterministic() {
    let dataset = PsychometricDataset::from_observations(&simulated_observations(40, 1));
    let first = fit(&dataset, (0.3, 3.5), 0.5, 0.99, &FitOptions::default()).unwrap();
    let second = fit(&dataset, (0.3, 3.5), 0.5, 0.99, &FitOptions::default()).unwrap();
    assert_eq!(first.threshold.to_bits(), second.threshold.to_bits());
    assert_eq!(first.slope.to_bits(), second.slope.to_bits());
}

#[test]
fn sparse_intensities_are_insufficient() {
    let observations: Vec<TrialObservation> = INTENSITIES
        .iter()
        .flat_map(|&intensity| {
            vec![
                TrialObservation::new(intensity, true),
                TrialObservation::new(intensity, false),
            ]
        })
        .collect();
    let dataset = PsychometricDataset::from_observations(&observations);
    let result = fit(&dataset, (0.3, 3.5), 0.5, 0.99, &FitOptions::default());
    assert!(matches!(result, Err(PsychError::InsufficientData(_))));
}

#[test]
fn mismatched_lengths_are_rejected() {
    let model = Weibull::new(0.5, 0.99).unwrap();
    let result = fit_points(&[0.1, 0.2, 0.3], &[0.5, 0.6], (0.2, 3.5), &model, &FitOptions::default());
    assert!(matches!(result, Err(PsychError::InsufficientData(_))));
}

// ---- bootstrap --------------------------------------------------------------

#[test]
fn interval_brackets_point_estimate() {
    let observations = simulated_observations(60, 5);
    let report = analyze(&observations, &FitConfig::default(), &bootstrap_config(300, 99)).unwrap();

    assert!(report.total_trials > 50);
    assert!(report.ci_lower <= report.threshold);
    assert!(report.threshold <= report.ci_upper);
    assert_eq!(report.n_resamples_used + report.n_failed_resamples, 300);
}

#[test]
fn interval_narrows_with_more_trials() {
    let model = Weibull::new(0.5, 0.99).unwrap();
    let mut widths = Vec::new();

    for &trials in &[12, 300] {
        let dataset = PsychometricDataset::from_observations(&simulated_observations(trials, 21));
        let points = dataset.expand().unwrap();
        let result = bootstrap_ci(
            &points.x,
            &points.y,
            &model,
            3.5,
            &FitOptions::default(),
            &bootstrap_config(200, 4),
        )
        .unwrap();
        widths.push(result.width());
    }

    assert!(widths[1] < widths[0], "widths: {:?}", widths);
}

// ---- trial log --------------------------------------------------------------

#[test]
fn logged_session_analyses_end_to_end() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("session.csv");
    let observations = simulated_observations(20, 8);

    let mut params = BTreeMap::new();
    params.insert("task".to_string(), "Annulus".to_string());
    params.insert("annulus_contrast".to_string(), "0.2".to_string());

    let mut writer = TrialLogWriter::create(&path, &params).unwrap();
    for (trial, observation) in observations.iter().enumerate() {
        writer.write_trial(trial + 1, observation).unwrap();
    }
    writer.finish().unwrap();

    let log = TrialLog::read(&path, &TrialLogColumns::default()).unwrap();
    assert_eq!(log.param("task"), Some("Annulus"));
    assert_eq!(log.observations, observations);

    let report = analyze(&log.observations, &FitConfig::default(), &bootstrap_config(100, 1)).unwrap();
    assert_eq!(report.total_trials, 100);
    assert_eq!(report.last_intensity, Some(0.5));
    assert!(!report.curve.is_empty());
}

use super::staircase::TrialObservation;
use crate::error::{PsychError, Result};

use serde::{Deserialize, Serialize};

/// Intensities observed on fewer trials than this are left out of the fit.
pub const MIN_TRIALS_PER_INTENSITY: usize = 3;

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq)]
pub struct IntensityCount {
    pub intensity: f64,
    pub n_correct: usize,
    pub n_trials: usize,
}

impl IntensityCount {
    pub fn proportion_correct(&self) -> f64 {
        if self.n_trials == 0 {
            0.0
        } else {
            self.n_correct as f64 / self.n_trials as f64
        }
    }
}

/// Per-trial `(x, y)` pairs fed to the least-squares objective. Each
/// intensity appears once per trial, with `y` the proportion correct at
/// that intensity.
#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
pub struct WeightedPoints {
    pub x: Vec<f64>,
    pub y: Vec<f64>,
}

impl WeightedPoints {
    pub fn len(&self) -> usize {
        self.x.len()
    }

    pub fn is_empty(&self) -> bool {
        self.x.is_empty()
    }

    pub fn mean_x(&self) -> f64 {
        mean(&self.x)
    }
}

pub(crate) fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return f64::NAN;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

pub(crate) fn count_distinct(values: &[f64]) -> usize {
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    sorted.dedup();
    sorted.len()
}

// PSYCHOMETRIC DATASET --------------------------------------------------------

/// Trial outcomes aggregated by unique intensity, in ascending order.
#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
pub struct PsychometricDataset {
    counts: Vec<IntensityCount>,
}

impl PsychometricDataset {
    pub fn from_observations(observations: &[TrialObservation]) -> Self {
        let mut sorted = observations.to_vec();
        sorted.sort_by(|a, b| a.intensity.total_cmp(&b.intensity));

        let mut counts: Vec<IntensityCount> = Vec::new();
        for observation in sorted {
            let same_intensity = counts
                .last()
                .map_or(false, |last| last.intensity == observation.intensity);
            if !same_intensity {
                counts.push(IntensityCount {
                    intensity: observation.intensity,
                    n_correct: 0,
                    n_trials: 0,
                });
            }
            if let Some(last) = counts.last_mut() {
                last.n_trials += 1;
                last.n_correct += observation.correct as usize;
            }
        }

        Self { counts }
    }

    /// Build from already aggregated `(intensity, n_correct, n_trials)` triples.
    pub fn from_counts(mut counts: Vec<IntensityCount>) -> Result<Self> {
        for count in &counts {
            if !count.intensity.is_finite() {
                return Err(PsychError::insufficient_data(format!(
                    "non-finite intensity {}",
                    count.intensity
                )));
            }
            if count.n_correct > count.n_trials {
                return Err(PsychError::domain(format!(
                    "{} correct out of {} trials at intensity {}",
                    count.n_correct, count.n_trials, count.intensity
                )));
            }
        }
        counts.sort_by(|a, b| a.intensity.total_cmp(&b.intensity));

        let mut merged: Vec<IntensityCount> = Vec::with_capacity(counts.len());
        for count in counts {
            match merged.last_mut() {
                Some(last) if last.intensity == count.intensity => {
                    last.n_correct += count.n_correct;
                    last.n_trials += count.n_trials;
                }
                _ => merged.push(count),
            }
        }
        Ok(Self { counts: merged })
    }

    pub fn counts(&self) -> &[IntensityCount] {
        &self.counts
    }

    pub fn iter(&self) -> impl Iterator<Item = &IntensityCount> {
        self.counts.iter()
    }

    pub fn len(&self) -> usize {
        self.counts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    pub fn total_trials(&self) -> usize {
        self.counts.iter().map(|count| count.n_trials).sum()
    }

    /// Expand the retained intensities into per-trial points.
    pub fn expand(&self) -> Result<WeightedPoints> {
        let mut points = WeightedPoints::default();
        let mut retained = 0;

        for count in self
            .counts
            .iter()
            .filter(|count| count.n_trials >= MIN_TRIALS_PER_INTENSITY)
        {
            let proportion = count.proportion_correct();
            points.x.extend(std::iter::repeat(count.intensity).take(count.n_trials));
            points.y.extend(std::iter::repeat(proportion).take(count.n_trials));
            retained += 1;
        }

        if retained == 0 {
            return Err(PsychError::insufficient_data(format!(
                "no intensity was observed on at least {} trials",
                MIN_TRIALS_PER_INTENSITY
            )));
        }
        if retained < 2 {
            return Err(PsychError::insufficient_data(
                "need at least 2 distinct intensities with enough trials",
            ));
        }

        Ok(points)
    }
}

use crate::config::LoggingConfig;
use crate::error::Result;
use crate::processing::staircase::{Staircase, StaircaseConfig, TrialObservation};
use crate::processing::weibull::{PsychometricFunction, Weibull};
use crate::utils::log::log_csv;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

// -----------------------------------------------------------------------------
// SIMULATED OBSERVER
// -----------------------------------------------------------------------------

/// Observer whose probability of a correct response at an intensity follows a
/// Weibull psychometric function.
#[derive(Debug, Clone, Copy)]
pub struct SimulatedObserver {
    pub threshold: f64,
    pub slope: f64,
    model: Weibull,
}

impl SimulatedObserver {
    pub fn new(threshold: f64, slope: f64, guess: f64, flake: f64) -> Result<Self> {
        let model = Weibull::new(guess, flake)?;
        // Surface bad parameters here rather than on the first trial.
        model.evaluate(0.0, threshold, slope)?;
        Ok(Self {
            threshold,
            slope,
            model,
        })
    }

    pub fn p_correct(&self, intensity: f64) -> Result<f64> {
        self.model
            .evaluate(intensity.max(0.0), self.threshold, self.slope)
    }

    pub fn respond<R: Rng>(&self, intensity: f64, rng: &mut R) -> Result<bool> {
        Ok(rng.gen::<f64>() < self.p_correct(intensity)?)
    }
}

// -----------------------------------------------------------------------------
// RUN SESSION
// -----------------------------------------------------------------------------

/// Drive a staircase for `n_trials` against `observer` and return the
/// observations in presentation order.
pub fn run_session(
    staircase_config: &StaircaseConfig,
    observer: &SimulatedObserver,
    n_trials: usize,
    seed: u64,
    logging: &LoggingConfig,
) -> Result<Vec<TrialObservation>> {
    let mut staircase = Staircase::new(staircase_config.clone())?;
    let mut rng = StdRng::seed_from_u64(seed);

    for trial in 0..n_trials {
        let presented = staircase.intensity();
        let correct = observer.respond(presented, &mut rng)?;
        let next = staircase.update(correct);

        if logging.enabled {
            log_csv(
                &logging.log_dir,
                "staircase.csv",
                &["trial", "intensity", "correct", "next_intensity", "reversals"],
                &[
                    trial.to_string(),
                    presented.to_string(),
                    (correct as u8).to_string(),
                    next.to_string(),
                    staircase.reversals().to_string(),
                ],
            )?;
        }
    }

    Ok(staircase.into_history())
}

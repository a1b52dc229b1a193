use crate::error::{PsychError, Result};

use serde::{Deserialize, Serialize};

// -----------------------------------------------------------------------------
// TRIAL OBSERVATION
// -----------------------------------------------------------------------------

/// One completed trial: the intensity that was presented and whether the
/// response was correct.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq)]
pub struct TrialObservation {
    pub intensity: f64,
    pub correct: bool,
}

impl TrialObservation {
    pub fn new(intensity: f64, correct: bool) -> Self {
        Self { intensity, correct }
    }
}

// -----------------------------------------------------------------------------
// STAIRCASE CONFIG
// -----------------------------------------------------------------------------

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct StaircaseConfig {
    pub start_intensity: f64,
    pub step_size: f64,
    /// +1 when a larger intensity makes the task harder, -1 when a smaller one does.
    pub direction_sign: i32,
    /// Consecutive incorrect responses needed before stepping easier.
    pub n_up: u32,
    /// Consecutive correct responses needed before stepping harder.
    pub n_down: u32,
    pub lower_bound: f64,
    pub upper_bound: f64,
}

impl Default for StaircaseConfig {
    fn default() -> Self {
        // Surround-suppression annulus task: lower contrast is harder,
        // 15 increments over the annulus contrast. 1-up/2-down settles at
        // about 70.7% correct, above the 2AFC guess rate.
        Self {
            start_intensity: 0.35,
            step_size: 0.2 / 15.0,
            direction_sign: -1,
            n_up: 1,
            n_down: 2,
            lower_bound: 0.2,
            upper_bound: 1.0,
        }
    }
}

impl StaircaseConfig {
    pub fn validate(&self) -> Result<()> {
        let finite = [
            ("start_intensity", self.start_intensity),
            ("step_size", self.step_size),
            ("lower_bound", self.lower_bound),
            ("upper_bound", self.upper_bound),
        ];
        for (name, value) in finite {
            if !value.is_finite() {
                return Err(PsychError::invalid_config(format!(
                    "{} must be finite, got {}",
                    name, value
                )));
            }
        }

        if self.lower_bound > self.upper_bound {
            return Err(PsychError::invalid_config(format!(
                "lower_bound {} is greater than upper_bound {}",
                self.lower_bound, self.upper_bound
            )));
        }
        if self.n_up < 1 {
            return Err(PsychError::invalid_config("n_up must be at least 1"));
        }
        if self.n_down < 1 {
            return Err(PsychError::invalid_config("n_down must be at least 1"));
        }
        if self.direction_sign != 1 && self.direction_sign != -1 {
            return Err(PsychError::invalid_config(format!(
                "direction_sign must be +1 or -1, got {}",
                self.direction_sign
            )));
        }
        if self.step_size <= 0.0 {
            return Err(PsychError::invalid_config(format!(
                "step_size must be positive, got {}",
                self.step_size
            )));
        }
        if self.start_intensity < self.lower_bound || self.start_intensity > self.upper_bound {
            return Err(PsychError::invalid_config(format!(
                "start_intensity {} is outside [{}, {}]",
                self.start_intensity, self.lower_bound, self.upper_bound
            )));
        }
        Ok(())
    }
}

// -----------------------------------------------------------------------------
// STAIRCASE CONTROLLER
// -----------------------------------------------------------------------------

/// Transformed up/down staircase.
///
/// `n_down` consecutive correct responses move the intensity one step in the
/// harder direction, `n_up` consecutive incorrect responses move it one step in
/// the easier direction. The result is always clamped into
/// `[lower_bound, upper_bound]`; clamping leaves the run counters alone.
#[derive(Debug, Clone)]
pub struct Staircase {
    config: StaircaseConfig,
    current_intensity: f64,
    consecutive_correct: u32,
    consecutive_incorrect: u32,
    last_move: Option<i32>,
    reversals: usize,
    history: Vec<TrialObservation>,
}

impl Staircase {
    pub fn new(config: StaircaseConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            current_intensity: config.start_intensity,
            config,
            consecutive_correct: 0,
            consecutive_incorrect: 0,
            last_move: None,
            reversals: 0,
            history: Vec::new(),
        })
    }

    /// Feed the outcome of the trial just presented at `intensity()` and get
    /// the intensity for the next trial.
    pub fn update(&mut self, correct: bool) -> f64 {
        self.history
            .push(TrialObservation::new(self.current_intensity, correct));

        if correct {
            self.consecutive_correct += 1;
            self.consecutive_incorrect = 0;
        } else {
            self.consecutive_incorrect += 1;
            self.consecutive_correct = 0;
        }

        let harder = self.config.direction_sign as f64;
        let movement = if self.consecutive_correct >= self.config.n_down {
            self.consecutive_correct = 0;
            Some(1)
        } else if self.consecutive_incorrect >= self.config.n_up {
            self.consecutive_incorrect = 0;
            Some(-1)
        } else {
            None
        };

        if let Some(movement) = movement {
            self.record_move(movement);
            let stepped = self.current_intensity + movement as f64 * harder * self.config.step_size;
            self.current_intensity = stepped.clamp(self.config.lower_bound, self.config.upper_bound);
        }

        self.current_intensity
    }

    fn record_move(&mut self, movement: i32) {
        if let Some(previous) = self.last_move {
            if previous != movement {
                self.reversals += 1;
            }
        }
        self.last_move = Some(movement);
    }

    /// Intensity to present on the next trial.
    pub fn intensity(&self) -> f64 {
        self.current_intensity
    }

    pub fn config(&self) -> &StaircaseConfig {
        &self.config
    }

    pub fn history(&self) -> &[TrialObservation] {
        &self.history
    }

    pub fn trial_count(&self) -> usize {
        self.history.len()
    }

    /// Number of times the staircase switched between stepping harder and easier.
    pub fn reversals(&self) -> usize {
        self.reversals
    }

    /// Intensity presented on the most recent trial.
    pub fn last_intensity(&self) -> Option<f64> {
        self.history.last().map(|observation| observation.intensity)
    }

    pub fn into_history(self) -> Vec<TrialObservation> {
        self.history
    }
}

use crate::error::{PsychError, Result};

// -----------------------------------------------------------------------------
// PSYCHOMETRIC FUNCTION COMPONENT
// -----------------------------------------------------------------------------

/// A two-parameter psychometric curve as seen by the least-squares solver.
/// Guess and flake rates are fixed properties of the implementing model.
pub trait PsychometricFunction: Send + Sync {
    fn evaluate(&self, x: f64, thresh: f64, slope: f64) -> Result<f64>;

    /// Partial derivatives `(dy/dthresh, dy/dslope)` at `x`.
    fn gradient(&self, x: f64, thresh: f64, slope: f64) -> Result<(f64, f64)>;

    fn name(&self) -> String;
}

// WEIBULL ---------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Weibull {
    guess: f64,
    flake: f64,
    threshy: f64,
}

impl Weibull {
    /// Weibull with the conventional threshold level `1 - (1 - guess) / e`.
    pub fn new(guess: f64, flake: f64) -> Result<Self> {
        Self::with_threshy(guess, flake, None)
    }

    pub fn with_threshy(guess: f64, flake: f64, threshy: Option<f64>) -> Result<Self> {
        if !guess.is_finite() || !flake.is_finite() || guess < 0.0 || guess >= flake || flake > 1.0 {
            return Err(PsychError::domain(format!(
                "expected 0 <= guess < flake <= 1, got guess={} flake={}",
                guess, flake
            )));
        }

        let threshy = match threshy {
            Some(level) => {
                if !(level > guess && level < 1.0) {
                    return Err(PsychError::domain(format!(
                        "threshy must lie in ({}, 1), got {}",
                        guess, level
                    )));
                }
                level
            }
            None => default_threshy(guess),
        };

        Ok(Self {
            guess,
            flake,
            threshy,
        })
    }

    pub fn guess(&self) -> f64 {
        self.guess
    }

    pub fn flake(&self) -> f64 {
        self.flake
    }

    /// Performance level that defines the threshold parameter.
    pub fn threshy(&self) -> f64 {
        self.threshy
    }

    /// `-ln((1 - threshy) / (1 - guess))`, i.e. `k^slope`.
    fn log_ratio(&self) -> f64 {
        -((1.0 - self.threshy) / (1.0 - self.guess)).ln()
    }

    fn check_domain(x: f64, thresh: f64, slope: f64) -> Result<()> {
        if !(thresh > 0.0) || !thresh.is_finite() {
            return Err(PsychError::domain(format!("thresh must be positive, got {}", thresh)));
        }
        if !(slope > 0.0) || !slope.is_finite() {
            return Err(PsychError::domain(format!("slope must be positive, got {}", slope)));
        }
        if !(x >= 0.0) || !x.is_finite() {
            return Err(PsychError::domain(format!(
                "intensity must be non-negative, got {}",
                x
            )));
        }
        Ok(())
    }

    /// `(k * x / thresh)^slope`
    fn exponent(&self, x: f64, thresh: f64, slope: f64) -> f64 {
        let k = self.log_ratio().powf(1.0 / slope);
        (k * x / thresh).powf(slope)
    }
}

impl PsychometricFunction for Weibull {
    fn evaluate(&self, x: f64, thresh: f64, slope: f64) -> Result<f64> {
        Self::check_domain(x, thresh, slope)?;
        let u = self.exponent(x, thresh, slope);
        Ok(self.flake - (self.flake - self.guess) * (-u).exp())
    }

    fn gradient(&self, x: f64, thresh: f64, slope: f64) -> Result<(f64, f64)> {
        Self::check_domain(x, thresh, slope)?;
        if x == 0.0 {
            return Ok((0.0, 0.0));
        }
        let u = self.exponent(x, thresh, slope);
        let scale = (self.flake - self.guess) * (-u).exp();
        let d_thresh = -scale * slope * u / thresh;
        let d_slope = scale * u * (x / thresh).ln();
        Ok((d_thresh, d_slope))
    }

    fn name(&self) -> String {
        format!("weibull(guess={}, flake={})", self.guess, self.flake)
    }
}

pub fn default_threshy(guess: f64) -> f64 {
    1.0 - (1.0 - guess) * (-1.0f64).exp()
}

/// Evaluate the Weibull psychometric function at a single intensity.
pub fn weibull(
    x: f64,
    thresh: f64,
    slope: f64,
    guess: f64,
    flake: f64,
    threshy: Option<f64>,
) -> Result<f64> {
    Weibull::with_threshy(guess, flake, threshy)?.evaluate(x, thresh, slope)
}

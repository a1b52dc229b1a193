// src/config/mod.rs
use crate::error::{PsychError, Result};
use crate::processing::bootstrap::BootstrapConfig;
use crate::processing::fitter::FitConfig;
use crate::processing::staircase::StaircaseConfig;

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
pub struct Config {
    #[serde(default)]
    pub staircase: StaircaseConfig,
    #[serde(default)]
    pub fit: FitConfig,
    #[serde(default)]
    pub bootstrap: BootstrapConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub trial_log: TrialLogColumns,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct LoggingConfig {
    pub enabled: bool,
    pub log_dir: String,
    pub verbose: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            log_dir: "logs".to_string(),
            verbose: false,
        }
    }
}

/// Which trial log columns hold the staircase variable and the response.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct TrialLogColumns {
    pub intensity: String,
    pub correct: String,
    /// Header parameter subtracted from every intensity, e.g. the annulus
    /// contrast when analysing target-minus-annulus contrast.
    #[serde(default)]
    pub offset_param: Option<String>,
    /// Analyse the log as two conditions instead of one run.
    #[serde(default)]
    pub split: Option<ConditionSplit>,
}

impl Default for TrialLogColumns {
    fn default() -> Self {
        Self {
            intensity: "intensity".to_string(),
            correct: "correct".to_string(),
            offset_param: None,
            split: None,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Condition {
    pub label: String,
    /// Header parameter subtracted from this condition's intensities only.
    #[serde(default)]
    pub offset_param: Option<String>,
}

/// Rows whose `column` value is below `cut` form the first condition, the
/// rest form the second. Interleaved annulus-off and annulus-on staircases
/// are separated this way by the target contrast column.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct ConditionSplit {
    pub column: String,
    pub cut: f64,
    pub below: Condition,
    pub at_or_above: Condition,
}

impl ConditionSplit {
    pub fn validate(&self) -> Result<()> {
        if !self.cut.is_finite() {
            return Err(PsychError::invalid_config(format!(
                "split cut must be finite, got {}",
                self.cut
            )));
        }
        if self.below.label == self.at_or_above.label {
            return Err(PsychError::invalid_config(format!(
                "both split conditions are labelled '{}'",
                self.below.label
            )));
        }
        Ok(())
    }
}

impl Config {
    pub fn validate(&self) -> Result<()> {
        self.staircase.validate()?;
        self.fit.validate()?;
        self.bootstrap.validate()?;
        if let Some(split) = &self.trial_log.split {
            split.validate()?;
        }
        Ok(())
    }
}

pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config> {
    let config_str = fs::read_to_string(path)?;
    let config: Config = serde_yaml::from_str(&config_str)?;
    config.validate()?;
    Ok(config)
}

pub fn save_config<P: AsRef<Path>>(config: &Config, path: P) -> Result<()> {
    let yaml = serde_yaml::to_string(config)?;
    fs::write(path, yaml)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_validate() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn partial_yaml_fills_defaults() {
        let yaml = "staircase:\n  start_intensity: 0.5\n  step_size: 0.05\n  direction_sign: 1\n  n_up: 1\n  n_down: 2\n  lower_bound: 0.0\n  upper_bound: 1.0\nbootstrap:\n  n_resamples: 200\n  alpha: 0.1\n  seed: 42\n  parallel: false\n";
        let config: Config = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.staircase.n_down, 2);
        assert_eq!(config.bootstrap.seed, Some(42));
        assert_eq!(config.fit, FitConfig::default());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn invalid_section_fails_validation() {
        let mut config = Config::default();
        config.bootstrap.n_resamples = 0;
        assert!(matches!(config.validate(), Err(PsychError::InvalidConfig(_))));
    }

    #[test]
    fn condition_split_from_yaml() {
        let yaml = "trial_log:\n  intensity: annulus_target_contrast\n  correct: correct\n  split:\n    column: annulus_target_contrast\n    cut: 0.75\n    below:\n      label: annulus_off\n    at_or_above:\n      label: annulus_on\n      offset_param: annulus_contrast\n";
        let config: Config = serde_yaml::from_str(yaml).unwrap();
        let split = config.trial_log.split.clone().unwrap();
        assert_eq!(split.cut, 0.75);
        assert_eq!(split.below.offset_param, None);
        assert_eq!(split.at_or_above.offset_param.as_deref(), Some("annulus_contrast"));
        assert!(config.validate().is_ok());

        let mut clashing = config;
        if let Some(split) = clashing.trial_log.split.as_mut() {
            split.at_or_above.label = "annulus_off".to_string();
        }
        assert!(matches!(clashing.validate(), Err(PsychError::InvalidConfig(_))));
    }
}

pub mod config;
pub mod error;
pub mod local;
pub mod processing;
pub mod utils;

#[cfg(any(feature = "python", feature = "cpp"))]
pub mod bindings;

pub use error::{PsychError, Result};
pub use processing::analysis::{analyze, analyze_conditions, AnalysisReport, ConditionReport, ConditionRun};
pub use processing::bootstrap::{bootstrap_ci, BootstrapConfig, BootstrapResult};
pub use processing::dataset::{PsychometricDataset, WeightedPoints};
pub use processing::fitter::{fit, fit_points, CurveFit, FitConfig, FitOptions};
pub use processing::staircase::{Staircase, StaircaseConfig, TrialObservation};
pub use processing::weibull::{weibull, PsychometricFunction, Weibull};

pub mod analysis;
pub mod bootstrap;
pub mod dataset;
pub mod fitter;
pub mod staircase;
pub mod weibull;

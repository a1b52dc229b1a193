pub mod simulate;
pub mod trial_log;

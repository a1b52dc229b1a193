use thiserror::Error;

pub type Result<T> = std::result::Result<T, PsychError>;

#[derive(Debug, Error)]
pub enum PsychError {
    /// Staircase, fit or bootstrap parameters rejected at construction.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Psychometric model evaluated outside its parameter domain.
    #[error("domain error: {0}")]
    DomainError(String),

    /// The least-squares solver gave up before meeting its tolerances.
    #[error("fit did not converge after {iterations} iterations: {reason}")]
    FitDidNotConverge { iterations: usize, reason: String },

    #[error("insufficient data: {0}")]
    InsufficientData(String),

    /// Malformed trial log contents.
    #[error("trial log error: {0}")]
    TrialLog(String),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    #[error("yaml error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl PsychError {
    pub fn invalid_config(message: impl Into<String>) -> Self {
        PsychError::InvalidConfig(message.into())
    }

    pub fn domain(message: impl Into<String>) -> Self {
        PsychError::DomainError(message.into())
    }

    pub fn insufficient_data(message: impl Into<String>) -> Self {
        PsychError::InsufficientData(message.into())
    }
}

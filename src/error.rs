use thiserror::Error;

pub type Result<T> = std::result::Result<T, SurvError>;

#[derive(Error, Debug)]
pub enum SurvError {
    #[error("dimensions don't match: {message}")]
    InvalidDimensions { message: String },

    #[error("bad parameter: {parameter} = {value}")]
    InvalidParameter { parameter: String, value: String },

    #[error("numerical issues: {message}")]
    NumericalError { message: String },

    #[error("survival data is broken: {message}")]
    InvalidSurvivalData { message: String },

    #[error("unknown solver '{0}' (try: grid search, random search, sobol, particle swarm)")]
    UnknownSolver(String),

    #[error("bad bounds for {parameter}: [{low}, {high}]")]
    InvalidBounds { parameter: String, low: f64, high: f64 },

    #[error("search space has no parameters")]
    EmptySearchSpace,

    #[error("io failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("couldn't decode: {0}")]
    Decode(String),
}

impl SurvError {
    pub fn invalid_dimensions(message: impl Into<String>) -> Self {
        Self::InvalidDimensions { message: message.into() }
    }

    pub fn invalid_parameter(parameter: impl Into<String>, value: impl ToString) -> Self {
        Self::InvalidParameter {
            parameter: parameter.into(),
            value: value.to_string(),
        }
    }

    pub fn numerical_error(message: impl Into<String>) -> Self {
        Self::NumericalError { message: message.into() }
    }

    pub fn invalid_survival_data(message: impl Into<String>) -> Self {
        Self::InvalidSurvivalData { message: message.into() }
    }

    pub fn invalid_bounds(parameter: impl Into<String>, low: f64, high: f64) -> Self {
        Self::InvalidBounds {
            parameter: parameter.into(),
            low,
            high,
        }
    }
}

impl From<bincode::Error> for SurvError {
    fn from(err: bincode::Error) -> Self {
        Self::Decode(err.to_string())
    }
}

impl From<serde_json::Error> for SurvError {
    fn from(err: serde_json::Error) -> Self {
        Self::Decode(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = SurvError::invalid_parameter("dropout", 1.5);
        assert_eq!(err.to_string(), "bad parameter: dropout = 1.5");

        let err = SurvError::UnknownSolver("annealing".to_string());
        assert!(err.to_string().contains("annealing"));

        let err = SurvError::invalid_bounds("loss_mix", 1.0, 0.0);
        assert!(err.to_string().contains("loss_mix"));
    }

    #[test]
    fn test_io_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err: SurvError = io.into();
        assert!(matches!(err, SurvError::Io(_)));
    }
}

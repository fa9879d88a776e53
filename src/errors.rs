use thiserror::Error;

#[derive(Debug, Error)]
pub enum LoadProfileError {
    #[error("Request was considered invalid due to error: {0}")]
    InvalidRequest(#[from] anyhow::Error),
    #[error("Error identified during load profile calculation: {0}")]
    FailureInCalculation(#[from] CalculationError),
    #[error("Error while writing out results: {0}")]
    ErrorInPostprocessing(PostprocessingError),
}

#[derive(Debug, Error)]
#[error(transparent)]
pub struct CalculationError {
    error: anyhow::Error,
}

impl CalculationError {
    pub(crate) fn new(error: anyhow::Error) -> Self {
        Self { error }
    }
}

#[derive(Debug, Error)]
#[error(transparent)]
pub struct PostprocessingError {
    error: anyhow::Error,
}

impl PostprocessingError {
    pub fn new(error: anyhow::Error) -> Self {
        Self { error }
    }
}

impl LoadProfileError {
    /// HTTP-style status a hosting service should answer with for this error.
    pub fn status_code(&self) -> u16 {
        match self {
            LoadProfileError::InvalidRequest(_) | LoadProfileError::FailureInCalculation(_) => 422,
            LoadProfileError::ErrorInPostprocessing(_) => 500,
        }
    }
}

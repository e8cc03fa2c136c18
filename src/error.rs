use thiserror::Error;

/// Errors raised by the Riccati engines, the worst-case solver and the
/// supporting sample/config loaders.
///
/// A risk parameter that cannot support a finite robust value is *not* an
/// error: [`crate::control::objective::evaluate`] reports it as
/// [`crate::control::objective::Cost::Infeasible`].
#[derive(Debug, Error)]
pub enum LqrError {
    #[error("dimension mismatch in {operation}: {left:?} vs {right:?}")]
    DimensionMismatch {
        operation: &'static str,
        left: (usize, usize),
        right: (usize, usize),
    },
    #[error("singular matrix: {term} is not invertible")]
    Singular { term: &'static str },
    #[error("sample set is empty")]
    EmptySampleSet,
    #[error("invalid horizon: {stage_number} stages requested, {available} sample sets available")]
    InvalidHorizon {
        stage_number: usize,
        available: usize,
    },
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),
    #[error("risk parameter {lam} is infeasible at stage {stage}")]
    Infeasible { lam: f64, stage: usize },
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Csv(#[from] csv::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, LqrError>;

use thiserror::Error;

/// Errors surfaced by the solver.
#[derive(Error, Debug)]
pub enum SolverError {
    /// No acceptable solution exists. The message is the newline-joined
    /// list of reasons accumulated during the solve.
    #[error("Could not resolve dependencies:\n{message}")]
    Unsolvable { message: String },

    /// A solver invariant was broken. This signals a defect, not bad
    /// input.
    #[error("internal solver error: {message}")]
    Internal { message: String },
}

impl SolverError {
    pub(crate) fn unsolvable(reasons: Vec<String>) -> Self {
        SolverError::Unsolvable {
            message: reasons.join("\n"),
        }
    }

    pub(crate) fn internal(message: impl Into<String>) -> Self {
        SolverError::Internal {
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, SolverError>;

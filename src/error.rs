/// error type for the optimizer.
/// every variant is recoverable: the host can always keep rendering with
/// manual or default parameters, whatever happened here.
use thiserror::Error;

#[derive(Error, Debug)]
pub enum GridError {
    /// a grid axis fell outside [1, MAX_GRID_SIZE]; the previous grid stays in place
    #[error("grid axis {axis} is {value}, must be within 1..={max}")]
    InvalidDimension { axis: char, value: u32, max: u32 },

    /// a persisted document failed structural validation; callers fall back
    /// to an untrained grid instead of applying it partially
    #[error("corrupt grid file: {0}")]
    CorruptGridFile(String),

    /// a timing record no thread contributed to
    #[error("degenerate timing record: {0}")]
    DegenerateTiming(String),

    /// structural mutation requested while a training sweep is running
    #[error("grid cannot be reshaped while training is active")]
    TrainingActive,

    #[error("json: {0}")]
    Json(#[from] serde_json::Error),

    #[error("i/o: {0}")]
    Io(#[from] std::io::Error),
}

impl GridError {
    /// shorthand for document-validation failures
    pub fn corrupt(msg: impl Into<String>) -> Self {
        GridError::CorruptGridFile(msg.into())
    }
}

pub type Result<T> = std::result::Result<T, GridError>;

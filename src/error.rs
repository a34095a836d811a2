use thiserror::Error;

#[derive(Error, Debug)]
pub enum VarxError {
    #[error("empty dataset: at least one batch is required")]
    EmptyDataset,

    #[error("batch {batch}: expected {expected} {signal} channels, got {got}")]
    ChannelMismatch {
        batch: usize,
        signal: &'static str,
        expected: usize,
        got: usize,
    },

    #[error("invalid model order: {0}")]
    InvalidOrder(String),

    #[error("invalid flag `{name}`: expected 0 or 1, got {value}")]
    InvalidFlag { name: &'static str, value: i64 },

    #[error("truncation mode must be finite, got {0}")]
    NonFiniteTruncation(f64),

    #[error("invalid ridge penalty: {0}")]
    InvalidPenalty(String),

    #[error("cross-validation requires at least two batches, got {0}")]
    TooFewBatches(usize),

    #[error("data error: {0}")]
    DataError(String),

    #[error("normal equations could not be solved: {0}")]
    SolveFailed(String),

    #[error("decomposition failed: {0}")]
    DecompositionFailed(String),

    #[error("shape mismatch: expected dimension {expected}, got {got}")]
    ShapeMismatch { expected: usize, got: usize },
}

impl VarxError {
    /// True for precondition failures on caller input, false for numerical failures.
    pub fn is_input_error(&self) -> bool {
        !matches!(
            self,
            VarxError::SolveFailed(_)
                | VarxError::DecompositionFailed(_)
                | VarxError::ShapeMismatch { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, VarxError>;

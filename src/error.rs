use thiserror::Error;

/// Errors raised while building an [`AliasTable`](crate::AliasTable).
///
/// The first four are bad input. `AliasOutOfRange` and `MassMismatch` mean
/// the construction itself went wrong and are never corrected silently.
#[derive(Debug, Error, PartialEq)]
pub enum ProbError {
    #[error("weights slice is empty")]
    Empty,

    #[error("weights contain a negative value at index {index}: {value}")]
    Negative { index: usize, value: f64 },

    #[error("weights contain a non-finite value at index {index}: {value}")]
    NonFinite { index: usize, value: f64 },

    #[error("sum of weights is zero or not finite")]
    ZeroSum,

    #[error("tolerance must be finite and non-negative, got {0}")]
    InvalidTolerance(f64),

    #[error("alias table slot {slot} points at {alias}, outside 0..{len}")]
    AliasOutOfRange { slot: usize, alias: usize, len: usize },

    #[error("alias table gives item {item} probability {actual}, expected {expected}")]
    MassMismatch {
        item: usize,
        expected: f64,
        actual: f64,
    },
}

/// Precondition failures when drawing a batch.
#[derive(Debug, Error)]
pub enum SampleError {
    #[error("cannot sample from an empty table")]
    EmptyTable,

    #[error("sample shape has no dimensions")]
    NoDimensions,

    #[error("sample shape has a zero-length axis {axis}")]
    ZeroAxis { axis: usize },

    #[error(transparent)]
    Layout(#[from] ndarray::ShapeError),
}

/// Configuration and call-time errors of
/// [`NegativeSamplingLoss`](crate::NegativeSamplingLoss).
#[derive(Debug, Error)]
pub enum LossError {
    #[error("n_negatives must be at least 1")]
    NoNegatives,

    #[error("embedding_dim must be at least 1")]
    ZeroEmbeddingDim,

    #[error("smoothing power must be finite, got {0}")]
    NonFinitePower(f64),

    #[error("ignore_index {index} is outside the vocabulary of {vocab}")]
    IgnoreIndexOutOfRange { index: usize, vocab: usize },

    #[error("invalid embedding initializer: {0}")]
    InvalidInit(String),

    #[error("{targets} targets but {contexts} context vectors")]
    BatchMismatch { targets: usize, contexts: usize },

    #[error("context vectors have dimension {found}, expected {expected}")]
    ContextDim { expected: usize, found: usize },

    #[error("index {index} is outside the vocabulary of {vocab}")]
    TargetOutOfRange { index: usize, vocab: usize },

    #[error("gradient has shape {found:?}, expected {expected:?}")]
    GradientShape {
        expected: (usize, usize),
        found: (usize, usize),
    },

    #[error("negatives have shape {found:?}, expected ({batch}, {n_negatives})")]
    NegativesShape {
        batch: usize,
        n_negatives: usize,
        found: Vec<usize>,
    },

    #[error(transparent)]
    Table(#[from] ProbError),

    #[error(transparent)]
    Sample(#[from] SampleError),
}

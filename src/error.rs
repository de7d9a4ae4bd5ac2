//! Error types for the causal relation network crate.
//!
//! Configuration and data-contract problems are surfaced as [`CausalError`] values so
//! callers can abort a run with a specific message. Internal buffer-size invariants
//! between components are asserted instead, like the layer implementations do.

use thiserror::Error;

/// Errors raised by configuration loading, batch assembly, checkpointing and artifact I/O.
#[derive(Debug, Error)]
pub enum CausalError {
    /// Invalid or incomplete experiment configuration. Always fatal before training starts.
    #[error("configuration error: {0}")]
    Config(String),

    /// A tensor or record did not have the expected size.
    #[error("shape mismatch in {context}: expected {expected}, got {actual}")]
    Shape {
        context: String,
        expected: usize,
        actual: usize,
    },

    /// A token id does not index a row of the embedding table.
    #[error("token id {id} in field '{field}' is outside the embedding table (vocab size {vocab})")]
    TokenOutOfRange {
        field: &'static str,
        id: u32,
        vocab: usize,
    },

    /// A token sequence is longer than the configured maximum for its field.
    #[error("sequence in field '{field}' has length {len}, configured maximum is {max}")]
    SequenceTooLong {
        field: &'static str,
        len: usize,
        max: usize,
    },

    /// Checkpoint content does not match the model it is loaded into.
    #[error("checkpoint error: {0}")]
    Checkpoint(String),

    /// Filesystem failure (checkpoint or artifact write, record read).
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed JSON in a config, record or embedding file.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// Failure writing the metrics table.
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),
}

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, CausalError>;

impl CausalError {
    pub(crate) fn config(msg: impl Into<String>) -> Self {
        CausalError::Config(msg.into())
    }
}

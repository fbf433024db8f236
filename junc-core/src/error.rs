// Error kinds for the enumeration pipeline
// Converted into anyhow::Error at the orchestration layer

use thiserror::Error;

#[derive(Debug, Error)]
pub enum JuncError {
    #[error("I/O failure: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed FASTA: {0}")]
    Parse(String),

    #[error("cuckoo filter overflow; increase the filter size or the number of rounds")]
    FilterOverflow,

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("internal invariant violated: {0}")]
    Internal(String),
}

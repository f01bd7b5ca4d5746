use thiserror::Error;

#[derive(Debug, Error)]
pub enum ThermoplateError {
    #[error("Config error: {0}")]
    Config(String),

    #[error("Partition error: {0}")]
    Partition(String),

    #[error("rank {rank} out of range for {num_ranks} ranks")]
    RankOutOfRange { rank: usize, num_ranks: usize },

    #[error("row {row} outside owned range {first}..={last}")]
    RowOutOfRange { row: usize, first: usize, last: usize },

    #[error("Runtime error: {0}")]
    Runtime(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ThermoplateError>;

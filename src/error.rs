use thiserror::Error;

/// Failures of a single portal step
#[derive(Error, Debug)]
pub enum ScrapeError {
    #[error("Transport error")]
    Transport(#[from] reqwest::Error),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Decode error")]
    Decode(#[from] serde_json::Error),

    #[error("Account ID could not be found")]
    AccountNotFound,
}

pub type Result<T> = std::result::Result<T, ScrapeError>;

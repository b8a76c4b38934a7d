use thiserror::Error;

#[derive(Error, Debug)]
pub enum HarvestError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Migration error: {0}")]
    Migration(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Source error: {0}")]
    Source(String),

    #[error("Decode error: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Source not ready: {0}")]
    NotReady(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("{0}")]
    Other(String),
}

/// How the poll loop should regard a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Network, timeout, rate limit or a gateway-side failure.
    TransientSource,
    /// Storage write or read failure.
    Persistence,
    /// Setup problems that can only surface outside the loop.
    Fatal,
}

impl HarvestError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            HarvestError::Http(_)
            | HarvestError::Source(_)
            | HarvestError::Decode(_)
            | HarvestError::NotReady(_) => ErrorKind::TransientSource,
            HarvestError::Database(_) | HarvestError::Migration(_) => ErrorKind::Persistence,
            HarvestError::InvalidUrl(_)
            | HarvestError::Io(_)
            | HarvestError::Config(_)
            | HarvestError::Other(_) => ErrorKind::Fatal,
        }
    }
}

pub type Result<T> = std::result::Result<T, HarvestError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_classification() {
        assert_eq!(
            HarvestError::Source("rate limited".into()).kind(),
            ErrorKind::TransientSource
        );
        assert_eq!(
            HarvestError::NotReady("waiting for code".into()).kind(),
            ErrorKind::TransientSource
        );
        assert_eq!(
            HarvestError::Database(rusqlite::Error::InvalidQuery).kind(),
            ErrorKind::Persistence
        );
        assert_eq!(
            HarvestError::Config("bad".into()).kind(),
            ErrorKind::Fatal
        );
    }
}

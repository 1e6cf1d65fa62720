//! Any errors that can be encountered by a tidepool item store

/// Any errors that can be encountered by a tidepool item store
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    /// A config parsing error
    #[error("failed to load config: {0}")]
    Config(#[from] config::ConfigError),
    /// An IO error
    #[error(transparent)]
    IO(#[from] std::io::Error),
    /// A request named a table this store does not hold
    #[error("unknown table {0:?}")]
    UnknownTable(String),
    /// A row or key does not fit its tables key schema
    #[error("invalid key for table {table:?}: {reason}")]
    InvalidKey { table: String, reason: String },
    /// A tracing subscriber was already installed
    #[error("failed to setup tracing: {0}")]
    Tracing(#[from] tracing_subscriber::util::TryInitError),
}

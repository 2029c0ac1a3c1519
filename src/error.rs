use thiserror::Error;

#[derive(Error, Debug)]
pub enum JobwatchError {
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] ureq::Error),

    #[error("Database error: {0}")]
    DatabaseError(#[from] rusqlite::Error),

    #[error("Migration error: {0}")]
    MigrationError(#[from] refinery::Error),

    #[error("JSON serialization error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("URL parse error: {0}")]
    UrlParseError(#[from] url::ParseError),

    #[error("Background task failed: {0}")]
    TaskError(#[from] tokio::task::JoinError),

    #[error("API error: {0}")]
    ApiError(String),

    #[error("Filter configuration not found: {0}")]
    ConfigNotFound(String),

    #[error("Filter configuration name already exists: {0}")]
    DuplicateConfigName(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Notification failed: {0}")]
    NotificationError(String),
}

impl JobwatchError {
    /// Get an actionable hint for how to resolve this error
    pub fn hint(&self) -> Option<&'static str> {
        match self {
            JobwatchError::HttpError(_) | JobwatchError::ApiError(_) => Some(
                "Check that the job API is reachable, or set it with:\n  JOBWATCH_API_URL=http://localhost:8000 jobwatch status"
            ),
            JobwatchError::ConfigNotFound(_) => Some(
                "Run `jobwatch config list` to see saved filter configurations"
            ),
            JobwatchError::DuplicateConfigName(_) => Some(
                "Choose a different name, or overwrite it:\n  jobwatch config save \"<name>\" --filters '{...}' --force"
            ),
            JobwatchError::NotificationError(_) => Some(
                "Check your notification settings with `jobwatch notify show`\nOr reconfigure with `jobwatch notify set`"
            ),
            JobwatchError::DatabaseError(_) | JobwatchError::MigrationError(_) => Some(
                "The local database may be corrupt; move it aside and retry (see JOBWATCH_DB)"
            ),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, JobwatchError>;

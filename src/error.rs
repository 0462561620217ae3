use reqwest::StatusCode;
use thiserror::Error;

/// Failure to read, parse or persist the integration config file.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to access config file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Webhook delivery failures. Always recovered by the caller.
#[derive(Error, Debug)]
pub enum DeliveryError {
    #[error("Webhook failed with status {status}: {body}")]
    Status { status: StatusCode, body: String },
    #[error(transparent)]
    Transport(#[from] reqwest::Error),
}

/// Errors raised by the account and shop collaborators.
#[derive(Error, Debug)]
pub enum BackendError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error("invalid data: {0}")]
    Json(#[from] serde_json::Error),
    #[error("{0}")]
    Other(String),
}

/// Failures a command handler reports back to the caller.
#[derive(Error, Debug)]
pub enum CommandError {
    #[error("Missing required option `{0}`")]
    MissingOption(&'static str),
    #[error(transparent)]
    Backend(#[from] BackendError),
}

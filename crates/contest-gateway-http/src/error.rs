//! HTTP client errors and their mapping onto the gateway port.

use contest_session::GatewayError;
use thiserror::Error;

/// Status the portal uses for "attempt already finalized".
pub const STATUS_ALREADY_FINALIZED: u16 = 409;

/// Errors raised while talking to the contest API.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Connection failed: {0}")]
    Connection(String),
    #[error("Server answered {status}: {message}")]
    Status { status: u16, message: String },
    #[error("Failed to parse response: {0}")]
    Parse(String),
    #[error("Invalid gateway configuration: {0}")]
    Config(String),
}

impl From<ClientError> for GatewayError {
    fn from(err: ClientError) -> Self {
        match err {
            ClientError::Status {
                status: STATUS_ALREADY_FINALIZED,
                ..
            } => GatewayError::AlreadyFinalized,
            ClientError::Status { status, message } => GatewayError::Rejected { status, message },
            ClientError::Parse(message) => GatewayError::Decode(message),
            ClientError::Connection(message) | ClientError::Config(message) => {
                GatewayError::Network(message)
            }
            ClientError::Http(e) => GatewayError::Network(e.to_string()),
        }
    }
}

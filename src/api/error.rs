use serde::Deserialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("unauthorized - not signed in or session expired")]
    Unauthorized,

    /// Client-side pre-flight validation failure; never reaches the network
    #[error("{0}")]
    Validation(String),

    /// The server rejected the request; carries the server's message verbatim
    /// when one was provided
    #[error("{0}")]
    Rejected(String),

    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

/// Error body shape used by the server for non-2xx responses
#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: Option<String>,
}

impl ApiError {
    pub fn from_status(status: reqwest::StatusCode, body: &str) -> Self {
        let message = serde_json::from_str::<ErrorBody>(body)
            .ok()
            .and_then(|b| b.message)
            .filter(|m| !m.is_empty());

        match status.as_u16() {
            401 => ApiError::Unauthorized,
            400..=499 => ApiError::Rejected(
                message.unwrap_or_else(|| format!("request failed ({})", status.as_u16())),
            ),
            500..=599 => ApiError::Rejected(
                message.unwrap_or_else(|| "the server is unavailable, try again later".to_string()),
            ),
            _ => ApiError::InvalidResponse(format!("unexpected status {}", status)),
        }
    }
}

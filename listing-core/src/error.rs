use thiserror::Error;

/// Failure of a single remote API call (user list or weather).
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("request failed with status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("request could not be completed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("response body could not be decoded: {0}")]
    Decode(#[from] serde_json::Error),
}

impl ApiError {
    pub(crate) fn from_status(status: reqwest::StatusCode, body: &str) -> Self {
        ApiError::Status {
            status: status.as_u16(),
            body: truncate_body(body),
        }
    }

    /// HTTP status code, when the server answered at all.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            ApiError::Status { status, .. } => Some(*status),
            ApiError::Transport(e) => e.status().map(|s| s.as_u16()),
            ApiError::Decode(_) => None,
        }
    }
}

/// Failure reported by the platform location service.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum LocationError {
    #[error("location permission denied")]
    PermissionDenied,
    #[error("location service unavailable")]
    ServiceUnavailable,
    #[error("location error: {0}")]
    Other(String),
}

pub(crate) fn truncate_body(body: &str) -> String {
    const MAX: usize = 200;
    match body.char_indices().nth(MAX) {
        Some((idx, _)) => format!("{}...", &body[..idx]),
        None => body.to_string(),
    }
}

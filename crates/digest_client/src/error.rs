use reqwest::StatusCode;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, ClientError>;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("invalid base url: {0}")]
    InvalidUrl(String),
    #[error("network error: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("{status}: {}", .detail.as_deref().unwrap_or("request failed"))]
    Http {
        status: StatusCode,
        detail: Option<String>,
    },
}

impl ClientError {
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            Self::Http { status, .. } => Some(*status),
            Self::Transport(err) => err.status(),
            Self::InvalidUrl(_) => None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.status() == Some(StatusCode::NOT_FOUND)
    }

    /// Message suitable for a notification: the backend's `detail` when it
    /// sent one, a generic text otherwise.
    pub fn user_message(&self) -> String {
        match self {
            Self::Http {
                detail: Some(detail),
                ..
            } => detail.clone(),
            Self::Http {
                status,
                detail: None,
            } => format!("Request failed (HTTP {})", status.as_u16()),
            Self::Transport(err) if err.is_decode() => "Unexpected response from server".to_string(),
            Self::Transport(_) => "Server unreachable".to_string(),
            Self::InvalidUrl(url) => format!("Invalid server address: {url}"),
        }
    }
}

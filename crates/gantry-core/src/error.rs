use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Network,
    Api,
    Validation,
    Unknown,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ErrorKind::Network => "network",
            ErrorKind::Api => "api",
            ErrorKind::Validation => "validation",
            ErrorKind::Unknown => "unknown",
        };
        f.write_str(label)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum GanttError {
    #[error("network error: {0}")]
    Network(String),
    #[error("backlog returned {status}: {message}")]
    Api { status: u16, message: String },
    #[error("invalid input: {0}")]
    Validation(String),
    #[error("{0}")]
    Unknown(String),
}

impl GanttError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            GanttError::Network(_) => ErrorKind::Network,
            GanttError::Api { .. } => ErrorKind::Api,
            GanttError::Validation(_) => ErrorKind::Validation,
            GanttError::Unknown(_) => ErrorKind::Unknown,
        }
    }

    pub fn user_message(&self) -> String {
        match self {
            GanttError::Network(msg) => format!("network error: {msg}"),
            GanttError::Api { message, .. } => format!("API error: {message}"),
            GanttError::Validation(msg) => format!("input error: {msg}"),
            GanttError::Unknown(msg) if msg.is_empty() => "an error occurred".to_string(),
            GanttError::Unknown(msg) => msg.clone(),
        }
    }
}

impl From<reqwest::Error> for GanttError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_connect() || err.is_timeout() || err.is_request() {
            GanttError::Network(err.to_string())
        } else if let Some(status) = err.status() {
            GanttError::Api {
                status: status.as_u16(),
                message: err.to_string(),
            }
        } else {
            GanttError::Unknown(err.to_string())
        }
    }
}

impl From<serde_json::Error> for GanttError {
    fn from(err: serde_json::Error) -> Self {
        GanttError::Unknown(format!("failed decoding backlog response: {err}"))
    }
}

use thiserror::Error;

#[derive(Error, Debug)]
pub enum PdiError {
    #[error("Config error: {0}")]
    Config(String),

    #[error("Not logged in. Run `pdi login --username YOUR_NAME` first")]
    MissingToken,

    #[error("Invalid chassis number: {0}")]
    InvalidChassis(String),

    #[error("{message}")]
    Api { status: u16, message: String },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Malformed response from {endpoint}: {detail}")]
    MalformedResponse { endpoint: String, detail: String },

    #[error("A job card already exists for {0}. Pass --override to replace it")]
    JobCardExists(String),

    #[error("Password verification failed")]
    VerificationFailed,

    #[error("Request cancelled")]
    Cancelled,

    #[error("{0} is already in progress")]
    Busy(&'static str),

    #[error("No supervisors available")]
    NoSupervisors,

    #[error("Prompt error: {0}")]
    Prompt(String),

    #[error(transparent)]
    Common(#[from] pdi_common::Error),

    #[error("JSON error: {0}")]
    JsonParse(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl PdiError {
    /// Error for a non-success status; the server's message wins when present
    pub fn from_status(status: u16, body: &str) -> Self {
        let message = server_message(body).unwrap_or_else(|| generic_status_message(status));
        PdiError::Api { status, message }
    }

    /// Whether re-invoking the same action can succeed without other changes
    pub fn is_retryable(&self) -> bool {
        match self {
            PdiError::Http(_) | PdiError::Busy(_) | PdiError::NoSupervisors => true,
            PdiError::Api { status, .. } => *status >= 500 || matches!(status, 408 | 429),
            _ => false,
        }
    }
}

impl From<dialoguer::Error> for PdiError {
    fn from(err: dialoguer::Error) -> Self {
        PdiError::Prompt(err.to_string())
    }
}

fn server_message(body: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(body).ok()?;
    ["message", "error", "detail"]
        .iter()
        .find_map(|key| value.get(key).and_then(|v| v.as_str()))
        .map(str::trim)
        .filter(|m| !m.is_empty())
        .map(str::to_string)
}

fn generic_status_message(status: u16) -> String {
    match status {
        400 => "Request was rejected by the server (400)".to_string(),
        401 => "Session expired, please log in again (401)".to_string(),
        403 => "You are not allowed to do this (403)".to_string(),
        404 => "Not found (404)".to_string(),
        500..=599 => format!("Server error ({})", status),
        _ => format!("Request failed with status {}", status),
    }
}

pub type Result<T> = std::result::Result<T, PdiError>;

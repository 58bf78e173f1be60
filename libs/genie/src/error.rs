use http::StatusCode;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum GenieError {
    #[error("genie configuration error: {0}")]
    Config(String),
    #[error("genie transport error: {0}")]
    Transport(#[source] reqwest::Error),
    #[error("genie remote error (status {status}): {message}")]
    Remote { status: StatusCode, message: String },
    #[error("genie response decode error: {0}")]
    Decode(String),
    #[error("genie message {message_id} ended with status {status}: {reason}")]
    MessageFailed {
        message_id: String,
        status: String,
        reason: String,
    },
    #[error("genie message {message_id} did not complete within {waited_secs}s")]
    WaitExceeded { message_id: String, waited_secs: u64 },
    #[error("genie operation not supported by this backend: {0}")]
    Unsupported(&'static str),
}

/// User-facing classes of backend failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendFailure {
    /// The workspace IP access list rejected the bot's address.
    AccessDenied,
    /// The backend answered but the payload could not be decoded.
    Decode,
    Generic,
}

impl GenieError {
    pub fn classify(&self) -> BackendFailure {
        if is_ip_acl_block(&self.to_string()) {
            return BackendFailure::AccessDenied;
        }
        match self {
            GenieError::Decode(_) => BackendFailure::Decode,
            _ => BackendFailure::Generic,
        }
    }
}

/// Case-insensitive match on both `ip acl` and `blocked`.
pub fn is_ip_acl_block(text: &str) -> bool {
    let lowered = text.to_lowercase();
    lowered.contains("ip acl") && lowered.contains("blocked")
}

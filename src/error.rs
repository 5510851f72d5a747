//! Error types
//!
//! Every failure the library can produce is a [`NotebookError`]. Nothing is
//! retried or recovered inside the crate; errors are surfaced to the caller
//! with whatever detail the remote API supplied.

use thiserror::Error;

/// Notebook control-plane errors
#[derive(Error, Debug)]
pub enum NotebookError {
    /// Identity artifact missing, unreadable or malformed, or no token could be minted
    #[error("Credential error: {0}")]
    Credential(String),

    /// Session could not be established or the endpoint could not be reached
    #[error("Connection error: {0}")]
    Connection(String),

    /// The remote management API rejected or failed the request
    #[error("Remote error {status} ({code}): {message}")]
    Remote {
        /// HTTP status returned by the API
        status: u16,
        /// Canonical status string from the error envelope, e.g. `ALREADY_EXISTS`
        code: String,
        message: String,
    },

    /// A 2xx response that could not be interpreted
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// The instance exists but does not expose a proxy endpoint yet
    #[error("Instance {0} has no proxy endpoint (is it running?)")]
    NotAccessible(String),

    /// A long-running operation finished with an error status
    #[error("Operation {name} failed ({code}): {message}")]
    OperationFailed {
        name: String,
        code: i32,
        message: String,
    },

    #[error("Timed out waiting for {0}")]
    Timeout(String),

    #[error("Cancelled: {0}")]
    Cancelled(String),
}

pub type Result<T> = std::result::Result<T, NotebookError>;

impl NotebookError {
    /// HTTP status of a remote failure, if this is one
    pub fn status(&self) -> Option<u16> {
        match self {
            NotebookError::Remote { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.status() == Some(404)
    }

    pub fn is_already_exists(&self) -> bool {
        self.status() == Some(409)
    }

    /// The remote refused a state transition (e.g. starting an instance that is still provisioning)
    pub fn is_failed_precondition(&self) -> bool {
        match self {
            NotebookError::Remote { status: 412, .. } => true,
            NotebookError::Remote { status: 400, code, .. } => code == "FAILED_PRECONDITION",
            _ => false,
        }
    }
}

/// Format an error for display to a user
///
/// Remote failures are mapped to short hints per status class; the full
/// remote message stays in the log file.
pub fn format_error(error: &NotebookError) -> String {
    match error {
        NotebookError::Remote { status, message, .. } => match status {
            401 => "Authentication failed. Check the credentials file or run 'gcloud auth application-default login'.".to_string(),
            403 => "Permission denied. Check your GCP IAM permissions.".to_string(),
            404 => "Resource not found.".to_string(),
            409 => "Instance already exists.".to_string(),
            429 => "Rate limit or quota exceeded. Please try again later.".to_string(),
            500..=599 => "Notebooks service temporarily unavailable. Please try again.".to_string(),
            _ => truncate(message, 120),
        },
        other => truncate(&other.to_string(), 160),
    }
}

/// Format an error chain for display to a user
///
/// Any context attached on top of a [`NotebookError`] (e.g. which operation
/// was being waited on) is kept in front of the [`format_error`] hint.
pub fn format_report(error: &anyhow::Error) -> String {
    match error.downcast_ref::<NotebookError>() {
        Some(inner) => {
            let hint = format_error(inner);
            let outer = error.to_string();
            if outer == inner.to_string() {
                hint
            } else {
                format!("{}: {}", outer, hint)
            }
        }
        None => format!("{:#}", error),
    }
}

fn truncate(message: &str, max: usize) -> String {
    let sanitized: String = message
        .chars()
        .filter(|c| c.is_ascii_graphic() || *c == ' ')
        .collect();

    if sanitized.len() > max {
        format!("{}...", &sanitized[..max])
    } else {
        sanitized
    }
}

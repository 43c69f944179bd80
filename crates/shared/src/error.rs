use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    NotFound,
    Transport,
    Validation,
}

/// Failure outcome of any catalog read or local state transition.
///
/// `Clone` because a single in-flight fetch settles every waiter attached to it.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CatalogError {
    #[error("not found: {message}")]
    NotFound { message: String },
    #[error("transport error{}: {message}", status_suffix(.status_code))]
    Transport {
        status_code: Option<u16>,
        message: String,
    },
    #[error("validation error: {message}")]
    Validation { message: String },
}

fn status_suffix(status_code: &Option<u16>) -> String {
    match status_code {
        Some(code) => format!(" (status {code})"),
        None => String::new(),
    }
}

impl CatalogError {
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound {
            message: message.into(),
        }
    }

    pub fn transport(status_code: Option<u16>, message: impl Into<String>) -> Self {
        Self::Transport {
            status_code,
            message: message.into(),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    pub fn code(&self) -> ErrorCode {
        match self {
            Self::NotFound { .. } => ErrorCode::NotFound,
            Self::Transport { .. } => ErrorCode::Transport,
            Self::Validation { .. } => ErrorCode::Validation,
        }
    }

    /// Only transport failures are worth another attempt.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transport { .. })
    }

    pub fn message(&self) -> &str {
        match self {
            Self::NotFound { message }
            | Self::Transport { message, .. }
            | Self::Validation { message } => message,
        }
    }
}

//! Error types for the chatmirror CLI.
//!
//! Provides structured error handling with:
//! - Machine-readable error codes (`ErrorCode`)
//! - Category-based exit codes (2=config, 3=network, 4=throttled, etc.)
//! - Retryability flags for scripted re-invocation
//! - Context-aware recovery hints
//! - Structured JSON output for piped / non-TTY consumers

use thiserror::Error;

/// Result type alias for chatmirror operations.
pub type Result<T> = std::result::Result<T, Error>;

// ── Error Code ────────────────────────────────────────────────

/// Machine-readable error codes grouped by category.
///
/// Each code maps to a SCREAMING_SNAKE string and a category-based
/// exit code. Scripts match on the string; shell wrappers on the
/// exit code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    // Configuration (exit 2)
    ConfigMissing,

    // Network (exit 3)
    NetworkError,

    // Throttling (exit 4)
    Throttled,

    // Remote data (exit 5)
    MalformedResponse,

    // Store I/O (exit 6)
    IoError,
    JsonError,

    // Internal (exit 1)
    InternalError,
}

impl ErrorCode {
    /// Machine-readable SCREAMING_SNAKE code string.
    #[must_use]
    pub const fn as_str(&self) -> &str {
        match self {
            Self::ConfigMissing => "CONFIG_MISSING",
            Self::NetworkError => "NETWORK_ERROR",
            Self::Throttled => "THROTTLED",
            Self::MalformedResponse => "MALFORMED_RESPONSE",
            Self::IoError => "IO_ERROR",
            Self::JsonError => "JSON_ERROR",
            Self::InternalError => "INTERNAL_ERROR",
        }
    }

    /// Category-based exit code (1-6).
    #[must_use]
    pub const fn exit_code(&self) -> u8 {
        match self {
            Self::InternalError => 1,
            Self::ConfigMissing => 2,
            Self::NetworkError => 3,
            Self::Throttled => 4,
            Self::MalformedResponse => 5,
            Self::IoError | Self::JsonError => 6,
        }
    }

    /// Whether re-running the same invocation can succeed.
    ///
    /// True for network failures and throttling: the saved cursor means
    /// a re-run resumes where this one stopped. False for configuration,
    /// malformed remote data, or local I/O errors.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::NetworkError | Self::Throttled)
    }
}

// ── Error Enum ────────────────────────────────────────────────

/// Errors that can occur in chatmirror operations.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Missing configuration: {what}")]
    ConfigMissing { what: &'static str },

    #[error("Network error: {0}")]
    Network(String),

    #[error("Rate limited: retry budget exhausted")]
    Throttled,

    #[error("Malformed API response: {0}")]
    MalformedResponse(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Map this error to its structured `ErrorCode`.
    #[must_use]
    pub const fn error_code(&self) -> ErrorCode {
        match self {
            Self::ConfigMissing { .. } => ErrorCode::ConfigMissing,
            Self::Network(_) => ErrorCode::NetworkError,
            Self::Throttled => ErrorCode::Throttled,
            Self::MalformedResponse(_) => ErrorCode::MalformedResponse,
            Self::Io(_) => ErrorCode::IoError,
            Self::Json(_) => ErrorCode::JsonError,
            Self::Other(_) => ErrorCode::InternalError,
        }
    }

    /// Category-based exit code, delegating to the `ErrorCode`.
    #[must_use]
    pub const fn exit_code(&self) -> u8 {
        self.error_code().exit_code()
    }

    /// Context-aware recovery hint for humans and wrapper scripts.
    ///
    /// Returns `None` if no actionable suggestion exists.
    #[must_use]
    pub fn hint(&self) -> Option<String> {
        match self {
            Self::ConfigMissing { what } => Some(format!(
                "Provide the {what}. Credentials come from --identifier/--key/--site \
                 or the CM_IDENTIFIER, CM_KEY and CM_SITE environment variables."
            )),

            Self::Network(_) => Some(
                "Check connectivity and re-run. The cursor was saved, so the sync \
                 resumes where it stopped."
                    .to_string(),
            ),

            Self::Throttled => Some(
                "The API kept answering 429 across the retry budget. Re-run later; \
                 the sync resumes from the saved cursor."
                    .to_string(),
            ),

            Self::MalformedResponse(_) => Some(
                "The remote answered with something this version cannot read. \
                 Re-run with -vv to log the exchange, and check for an API change."
                    .to_string(),
            ),

            Self::Io(_) | Self::Json(_) | Self::Other(_) => None,
        }
    }

    /// Structured JSON representation for machine consumption.
    ///
    /// Includes error code, message, retryability, exit code, and
    /// optional recovery hint. Scripts parse this instead of stderr text.
    #[must_use]
    pub fn to_structured_json(&self) -> serde_json::Value {
        let code = self.error_code();
        let mut obj = serde_json::json!({
            "error": {
                "code": code.as_str(),
                "message": self.to_string(),
                "retryable": code.is_retryable(),
                "exit_code": code.exit_code(),
            }
        });

        if let Some(hint) = self.hint() {
            obj["error"]["hint"] = serde_json::Value::String(hint);
        }

        obj
    }
}

//! Error types for the Ridedesk core library.
//!
//! Every failure the coordinator, stores and configuration can report is a
//! [`RidedeskError`]. Errors carry the offending id or field so a UI layer can
//! render a meaningful message, and each variant has a stable code.
//!
//! # Error Codes Reference
//!
//! | Code Range | Category | Description |
//! |------------|----------|-------------|
//! | E1001-E1099 | Session | Unknown sessions and closed sessions |
//! | E2001-E2099 | Agent | Unknown agents and roster problems |
//! | E3001-E3099 | Validation | Invalid caller input |
//! | E4001-E4099 | Storage | Snapshot load/save failures |
//! | E5001-E5099 | Config | Configuration file and value errors |
//! | E9001-E9099 | General | Internal, IO and serialization errors |

use std::fmt;
use thiserror::Error;
use tracing::{error, warn};

/// Context information for error tracking and debugging.
#[derive(Debug, Clone)]
pub struct ErrorContext {
    pub file: &'static str,
    pub line: u32,
    pub column: u32,
    pub operation: Option<String>,
}

impl ErrorContext {
    pub fn new(file: &'static str, line: u32, column: u32) -> Self {
        Self {
            file,
            line,
            column,
            operation: None,
        }
    }

    pub fn with_operation(mut self, operation: impl Into<String>) -> Self {
        self.operation = Some(operation.into());
        self
    }
}

impl fmt::Display for ErrorContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.file, self.line, self.column)?;
        if let Some(ref op) = self.operation {
            write!(f, " ({})", op)?;
        }
        Ok(())
    }
}

/// Macro to create an ErrorContext at the current source location.
#[macro_export]
macro_rules! error_context {
    () => {
        $crate::error::ErrorContext::new(file!(), line!(), column!())
    };
    ($op:expr) => {
        $crate::error::ErrorContext::new(file!(), line!(), column!()).with_operation($op)
    };
}

/// Coarse classification callers branch on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    NotFound,
    InvalidArgument,
    InvalidState,
    Storage,
    Config,
    Internal,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorKind::NotFound => write!(f, "not_found"),
            ErrorKind::InvalidArgument => write!(f, "invalid_argument"),
            ErrorKind::InvalidState => write!(f, "invalid_state"),
            ErrorKind::Storage => write!(f, "storage"),
            ErrorKind::Config => write!(f, "config"),
            ErrorKind::Internal => write!(f, "internal"),
        }
    }
}

#[derive(Debug, Error)]
pub enum RidedeskError {
    // ========================================================================
    // Session Errors (E1001-E1099)
    // ========================================================================
    #[error("[E1001] Session not found: {0}")]
    SessionNotFound(String),

    /// The session is closed and no longer accepts mutations
    #[error("[E1002] Session '{0}' is closed")]
    SessionClosed(String),

    // ========================================================================
    // Agent Errors (E2001-E2099)
    // ========================================================================
    #[error("[E2001] Agent not found: {0}")]
    AgentNotFound(String),

    #[error("[E2002] Duplicate agent id in roster: {0}")]
    DuplicateAgent(String),

    // ========================================================================
    // Validation Errors (E3001-E3099)
    // ========================================================================
    #[error("[E3001] Invalid value for '{field}': {message}")]
    InvalidArgument { field: String, message: String },

    // ========================================================================
    // Storage Errors (E4001-E4099)
    // ========================================================================
    #[error("[E4001] Failed to load snapshot from {location}: {message}")]
    SnapshotLoadFailed { location: String, message: String },

    #[error("[E4002] Failed to save snapshot to {location}: {message}")]
    SnapshotSaveFailed { location: String, message: String },

    #[error("[E4003] Snapshot is corrupt: {0}")]
    SnapshotCorrupt(String),

    // ========================================================================
    // Configuration Errors (E5001-E5099)
    // ========================================================================
    #[error("[E5001] Failed to parse configuration: {0}")]
    ConfigParseError(String),

    #[error("[E5002] Invalid configuration value for '{key}': {message}")]
    InvalidConfigValue { key: String, message: String },

    #[error("[E5003] Missing required configuration: {0}")]
    MissingConfig(String),

    // ========================================================================
    // General Errors (E9001-E9099)
    // ========================================================================
    #[error("[E9001] Internal error: {0}")]
    Internal(String),

    #[error("[E9002] IO error: {0}")]
    IoError(String),

    #[error("[E9003] Serialization error: {0}")]
    SerializationError(String),
}

pub type RidedeskResult<T> = Result<T, RidedeskError>;

impl RidedeskError {
    pub fn invalid_argument(field: impl Into<String>, message: impl Into<String>) -> Self {
        RidedeskError::InvalidArgument {
            field: field.into(),
            message: message.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            RidedeskError::SessionNotFound(_) | RidedeskError::AgentNotFound(_) => {
                ErrorKind::NotFound
            }
            RidedeskError::InvalidArgument { .. } => ErrorKind::InvalidArgument,
            RidedeskError::SessionClosed(_) => ErrorKind::InvalidState,
            RidedeskError::SnapshotLoadFailed { .. }
            | RidedeskError::SnapshotSaveFailed { .. }
            | RidedeskError::SnapshotCorrupt(_) => ErrorKind::Storage,
            RidedeskError::ConfigParseError(_)
            | RidedeskError::InvalidConfigValue { .. }
            | RidedeskError::MissingConfig(_)
            | RidedeskError::DuplicateAgent(_) => ErrorKind::Config,
            RidedeskError::Internal(_)
            | RidedeskError::IoError(_)
            | RidedeskError::SerializationError(_) => ErrorKind::Internal,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.kind() == ErrorKind::NotFound
    }

    pub fn is_storage_error(&self) -> bool {
        self.kind() == ErrorKind::Storage
    }

    pub fn error_code(&self) -> &'static str {
        match self {
            RidedeskError::SessionNotFound(_) => "E1001",
            RidedeskError::SessionClosed(_) => "E1002",
            RidedeskError::AgentNotFound(_) => "E2001",
            RidedeskError::DuplicateAgent(_) => "E2002",
            RidedeskError::InvalidArgument { .. } => "E3001",
            RidedeskError::SnapshotLoadFailed { .. } => "E4001",
            RidedeskError::SnapshotSaveFailed { .. } => "E4002",
            RidedeskError::SnapshotCorrupt(_) => "E4003",
            RidedeskError::ConfigParseError(_) => "E5001",
            RidedeskError::InvalidConfigValue { .. } => "E5002",
            RidedeskError::MissingConfig(_) => "E5003",
            RidedeskError::Internal(_) => "E9001",
            RidedeskError::IoError(_) => "E9002",
            RidedeskError::SerializationError(_) => "E9003",
        }
    }

    pub fn user_suggestion(&self) -> Option<&'static str> {
        match self {
            RidedeskError::SessionNotFound(_) => {
                Some("Run 'ridedesk sessions list' to see known session ids")
            }
            RidedeskError::AgentNotFound(_) => Some("Run 'ridedesk roster' to see agent ids"),
            RidedeskError::SessionClosed(_) => {
                Some("Closed sessions are read-only. Start a new session instead")
            }
            RidedeskError::SnapshotCorrupt(_) => {
                Some("Move the snapshot file aside to start from an empty inbox")
            }
            RidedeskError::SnapshotSaveFailed { .. } => {
                Some("Check that the snapshot directory exists and is writable")
            }
            RidedeskError::DuplicateAgent(_) => {
                Some("Give every [[roster]] entry in the config a unique id")
            }
            _ => None,
        }
    }

    /// Log this error with a severity matching how recoverable it is.
    pub fn log(&self) {
        let code = self.error_code();
        let suggestion = self.user_suggestion();

        if self.is_storage_error() {
            error!(error_code = %code, suggestion = suggestion, "Error occurred: {}", self);
        } else {
            warn!(error_code = %code, suggestion = suggestion, "Error occurred: {}", self);
        }
    }

    pub fn log_with_context(&self, context: &ErrorContext) {
        let code = self.error_code();
        let suggestion = self.user_suggestion();

        if self.is_storage_error() {
            error!(
                error_code = %code,
                location = %context,
                suggestion = suggestion,
                "Error at {}: {}",
                context,
                self
            );
        } else {
            warn!(
                error_code = %code,
                location = %context,
                suggestion = suggestion,
                "Error at {}: {}",
                context,
                self
            );
        }
    }
}

impl From<serde_json::Error> for RidedeskError {
    fn from(err: serde_json::Error) -> Self {
        RidedeskError::SerializationError(err.to_string())
    }
}

impl From<std::io::Error> for RidedeskError {
    fn from(err: std::io::Error) -> Self {
        RidedeskError::IoError(err.to_string())
    }
}

impl From<config::ConfigError> for RidedeskError {
    fn from(err: config::ConfigError) -> Self {
        match err {
            config::ConfigError::NotFound(key) => RidedeskError::InvalidConfigValue {
                key,
                message: "Key not found".to_string(),
            },
            config::ConfigError::FileParse { uri, cause } => RidedeskError::ConfigParseError(
                format!("Failed to parse {}: {}", uri.unwrap_or_default(), cause),
            ),
            config::ConfigError::Type {
                origin,
                unexpected,
                expected,
                key,
            } => RidedeskError::InvalidConfigValue {
                key: key.unwrap_or_else(|| origin.map(|o| o.to_string()).unwrap_or_default()),
                message: format!("Expected {}, got {}", expected, unexpected),
            },
            _ => RidedeskError::ConfigParseError(err.to_string()),
        }
    }
}

/// Format an error for CLI display with its suggestion.
pub struct CliErrorDisplay<'a> {
    error: &'a RidedeskError,
}

impl<'a> CliErrorDisplay<'a> {
    pub fn new(error: &'a RidedeskError) -> Self {
        Self { error }
    }
}

impl<'a> fmt::Display for CliErrorDisplay<'a> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.error)?;

        if let Some(suggestion) = self.error.user_suggestion() {
            writeln!(f)?;
            write!(f, "  Suggestion: {}", suggestion)?;
        }

        Ok(())
    }
}

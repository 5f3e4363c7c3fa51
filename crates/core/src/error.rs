//! Error types for ak-core
//!
//! One error type shared by the storage and queue clients. Per-call failures
//! always carry the operation name and the resource they were made against.

use thiserror::Error;

/// Result type alias for ak-core operations
pub type Result<T> = std::result::Result<T, Error>;

/// Service error codes that mean the addressed resource does not exist
const NOT_FOUND_CODES: &[&str] = &[
    "NoSuchKey",
    "NoSuchBucket",
    "NotFound",
    "QueueDoesNotExist",
    "AWS.SimpleQueueService.NonExistentQueue",
];

/// Service error codes that mean the request was rejected for its credentials
const AUTH_CODES: &[&str] = &[
    "AccessDenied",
    "InvalidAccessKeyId",
    "InvalidClientTokenId",
    "SignatureDoesNotMatch",
    "UnrecognizedClientException",
    "ExpiredToken",
];

/// Error types for ak-core operations
#[derive(Error, Debug)]
pub enum Error {
    /// Client construction failed; the client instance cannot be used
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// An operation argument was out of range
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Object storage request failed
    #[error("Storage error: {operation} on {resource} failed: {message}")]
    Storage {
        operation: &'static str,
        resource: String,
        message: String,
        code: Option<String>,
    },

    /// Message queue request failed
    #[error("Queue error: {operation} on {resource} failed: {message}")]
    Queue {
        operation: &'static str,
        resource: String,
        message: String,
        code: Option<String>,
    },

    /// The caller cancelled the operation or its deadline passed
    #[error("Cancelled: {operation} on {resource}")]
    Cancelled {
        operation: &'static str,
        resource: String,
    },

    /// Named profile is not present in the configuration file
    #[error("Profile not found: {0}")]
    ProfileNotFound(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// TOML parsing error
    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    /// TOML serialization error
    #[error("TOML serialization error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),
}

impl Error {
    /// Build a storage error for `operation` against `resource`
    pub fn storage(
        operation: &'static str,
        resource: impl Into<String>,
        message: impl Into<String>,
        code: Option<String>,
    ) -> Self {
        Error::Storage {
            operation,
            resource: resource.into(),
            message: message.into(),
            code,
        }
    }

    /// Build a queue error for `operation` against `resource`
    pub fn queue(
        operation: &'static str,
        resource: impl Into<String>,
        message: impl Into<String>,
        code: Option<String>,
    ) -> Self {
        Error::Queue {
            operation,
            resource: resource.into(),
            message: message.into(),
            code,
        }
    }

    /// Build a cancellation error for `operation` against `resource`
    pub fn cancelled(operation: &'static str, resource: impl Into<String>) -> Self {
        Error::Cancelled {
            operation,
            resource: resource.into(),
        }
    }

    /// Service error code, when the backend reported one
    pub fn code(&self) -> Option<&str> {
        match self {
            Error::Storage { code, .. } | Error::Queue { code, .. } => code.as_deref(),
            _ => None,
        }
    }

    /// Whether the addressed object, bucket or queue does not exist
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::ProfileNotFound(_))
            || self.code().is_some_and(|c| NOT_FOUND_CODES.contains(&c))
    }

    /// Whether the backend rejected the request's credentials
    pub fn is_auth(&self) -> bool {
        self.code().is_some_and(|c| AUTH_CODES.contains(&c))
    }

    /// Whether the caller cancelled the operation
    pub const fn is_cancelled(&self) -> bool {
        matches!(self, Error::Cancelled { .. })
    }

    /// Get the appropriate exit code for this error
    pub fn exit_code(&self) -> i32 {
        if self.is_not_found() {
            return 5; // NotFound
        }
        if self.is_auth() {
            return 4; // AuthError
        }
        match self {
            Error::Configuration(_) | Error::InvalidArgument(_) => 2, // UsageError
            Error::Storage { .. } | Error::Queue { .. } => 3, // NetworkError
            Error::Cancelled { .. } => 130,                   // Interrupted
            _ => 1,                                           // GeneralError
        }
    }
}

//! Error types for selinux-relabel
//!
//! This module defines the error hierarchy for:
//! - The parallel tree walker (configuration, root, visitor failures)
//! - Label string parsing and volume option validation
//! - CLI configuration
//!
//! Design philosophy:
//! - Use thiserror for structured error types in library code
//! - A walk yields exactly one error value, never an aggregate
//! - Preserve the io::Error source so callers can match on its kind

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Boxed error returned by visitors that abort a walk
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Top-level error type for the crate
#[derive(Error, Debug)]
pub enum Error {
    /// Walker errors
    #[error("Walk error: {0}")]
    Walk(#[from] WalkError),

    /// Label parsing and validation errors
    #[error("Label error: {0}")]
    Label(#[from] LabelError),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Writing a file label failed
    #[error(transparent)]
    SetLabel(#[from] SetLabelError),

    /// I/O errors (xattr, /proc, selinuxfs)
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// A single file could not be relabeled
#[derive(Error, Debug)]
#[error("Failed to set label '{label}' on '{}': {source}", path.display())]
pub struct SetLabelError {
    pub path: PathBuf,
    pub label: String,
    #[source]
    pub source: io::Error,
}

/// Errors returned by a tree walk
#[derive(Error, Debug)]
pub enum WalkError {
    /// Worker count below one
    #[error("Invalid concurrency {value}: must be at least 1")]
    InvalidConcurrency { value: usize },

    /// Root could not be stat'ed or listed
    #[error("Cannot walk '{}': {source}", path.display())]
    Root {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// First error returned by a visitor
    #[error("{0}")]
    Visitor(#[source] BoxError),

    /// A visitor panicked while handling a path
    #[error("Visitor panicked on '{}': {message}", path.display())]
    VisitorPanicked { path: PathBuf, message: String },

    /// A walker thread died outside the visitor
    #[error("Walker {role} thread panicked: {message}")]
    ThreadPanicked { role: &'static str, message: String },

    /// A walker thread could not be started
    #[error("Failed to spawn {role} thread: {source}")]
    Spawn {
        role: &'static str,
        #[source]
        source: io::Error,
    },
}

impl WalkError {
    /// Check if the walk failed because the root does not exist
    pub fn is_not_found(&self) -> bool {
        match self {
            WalkError::Root { source, .. } => source.kind() == io::ErrorKind::NotFound,
            WalkError::Visitor(e) => e
                .downcast_ref::<io::Error>()
                .is_some_and(|e| e.kind() == io::ErrorKind::NotFound),
            _ => false,
        }
    }

    /// Get the visitor's error, if the walk was aborted by one
    pub fn visitor_error(&self) -> Option<&(dyn std::error::Error + Send + Sync + 'static)> {
        match self {
            WalkError::Visitor(e) => Some(e.as_ref()),
            _ => None,
        }
    }
}

/// Label string and volume option errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LabelError {
    /// Label does not have user:role:type[:level] shape
    #[error("Invalid SELinux context '{label}': {reason}")]
    InvalidContext { label: String, reason: String },

    /// Both the shared and private relabel options were given
    #[error("Bad SELinux option: z and Z can not be used together")]
    IncompatibleOptions,

    /// Unknown key in a label option list
    #[error("Bad label option '{option}'")]
    InvalidOption { option: String },

    /// MCS level already handed out
    #[error("MCS level '{level}' is already reserved")]
    McsInUse { level: String },

    /// Category id outside the representable range
    #[error("MCS category id {id} out of range for {range} categories")]
    McsOutOfRange { id: u32, range: u32 },

    /// Every category pair in the range is reserved
    #[error("No free MCS level left among {range} categories")]
    McsExhausted { range: u32 },

    /// Relabeling a protected system path
    #[error("Relabeling content in '{}' is not allowed", path.display())]
    RelabelNotAllowed { path: PathBuf },
}

/// Configuration and CLI errors
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Invalid worker count
    #[error("Invalid worker count {count}: must be between 1 and {max}")]
    InvalidWorkerCount { count: usize, max: usize },

    /// Path argument problem
    #[error("Invalid path '{}': {reason}", path.display())]
    InvalidPath { path: PathBuf, reason: String },

    /// Label argument problem
    #[error("Invalid label '{label}': {reason}")]
    InvalidLabel { label: String, reason: String },
}

/// Result type alias for Error
pub type Result<T> = std::result::Result<T, Error>;

/// Result type alias for WalkError
pub type WalkResult = std::result::Result<(), WalkError>;

/// Result type alias for LabelError
pub type LabelResult<T> = std::result::Result<T, LabelError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_root_not_found() {
        let err = WalkError::Root {
            path: "/missing".into(),
            source: io::Error::from(io::ErrorKind::NotFound),
        };
        assert!(err.is_not_found());

        let denied = WalkError::Root {
            path: "/secret".into(),
            source: io::Error::from(io::ErrorKind::PermissionDenied),
        };
        assert!(!denied.is_not_found());
        assert!(!WalkError::InvalidConcurrency { value: 0 }.is_not_found());
    }

    #[test]
    fn test_visitor_error_passthrough() {
        let err = WalkError::Visitor("42".into());
        assert_eq!(err.to_string(), "42");
        assert_eq!(err.visitor_error().map(|e| e.to_string()), Some("42".into()));
    }

    #[test]
    fn test_error_conversion() {
        let walk_err = WalkError::InvalidConcurrency { value: 0 };
        let err: Error = walk_err.into();
        assert!(matches!(err, Error::Walk(WalkError::InvalidConcurrency { .. })));

        let err: Error = LabelError::IncompatibleOptions.into();
        assert!(matches!(err, Error::Label(_)));
    }
}

//! Centralized error types for the Portico workspace.

use crate::config::FileOperation;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Top-level error enum. Variants map to the gateway's failure classes.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum GatewayError {
    #[error("{operation} file access is not enabled")]
    FeatureDisabled { operation: FileOperation },

    #[error("Access to file outside the import directory is not allowed: {}", path.display())]
    OutsideRoot { path: PathBuf },

    #[error("Reading from the filesystem outside the import directory is not allowed: {}", path.display())]
    ReadFromFilesystemNotAllowed { path: PathBuf },

    #[error("Malformed path '{input}': {reason}")]
    MalformedPath { input: String, reason: String },

    #[error("No such file or directory: {}", path.display())]
    NotFound { path: PathBuf },

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Operation cancelled after {written} elements")]
    Cancelled { written: u64 },

    #[error("Source error: {0}")]
    Source(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type GatewayResult<T> = Result<T, GatewayError>;

impl GatewayError {
    pub fn malformed(input: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::MalformedPath {
            input: input.into(),
            reason: reason.into(),
        }
    }

    pub fn serialization(msg: impl Into<String>) -> Self {
        Self::Serialization(msg.into())
    }

    /// `true` for denials raised by the access guard.
    pub fn is_access_denied(&self) -> bool {
        matches!(
            self,
            Self::FeatureDisabled { .. }
                | Self::OutsideRoot { .. }
                | Self::ReadFromFilesystemNotAllowed { .. }
        )
    }
}

// ---------------------------------------------------------------------------
// Access decisions
// ---------------------------------------------------------------------------

/// Why the guard refused a request. Closed set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DenyReason {
    FeatureDisabled,
    OutsideRootNotAllowed,
    ReadFromFilesystemNotAllowed,
}

impl DenyReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            DenyReason::FeatureDisabled => "FEATURE_DISABLED",
            DenyReason::OutsideRootNotAllowed => "OUTSIDE_ROOT_NOT_ALLOWED",
            DenyReason::ReadFromFilesystemNotAllowed => "READ_FROM_FILESYSTEM_NOT_ALLOWED",
        }
    }
}

impl std::fmt::Display for DenyReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of an access check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessDecision {
    Allow,
    Deny(DenyReason),
}

impl AccessDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, AccessDecision::Allow)
    }

    /// Converts a denial into the matching typed error.
    pub fn into_result(self, path: &Path, operation: FileOperation) -> GatewayResult<()> {
        match self {
            AccessDecision::Allow => Ok(()),
            AccessDecision::Deny(DenyReason::FeatureDisabled) => {
                Err(GatewayError::FeatureDisabled { operation })
            }
            AccessDecision::Deny(DenyReason::OutsideRootNotAllowed) => {
                Err(GatewayError::OutsideRoot {
                    path: path.to_path_buf(),
                })
            }
            AccessDecision::Deny(DenyReason::ReadFromFilesystemNotAllowed) => {
                Err(GatewayError::ReadFromFilesystemNotAllowed {
                    path: path.to_path_buf(),
                })
            }
        }
    }
}

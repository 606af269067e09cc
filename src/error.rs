//! Error types for envcreds operations

use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// The main error type for envcreds operations
///
/// Every store, codec and export operation reports failures through this enum.
/// The interactive menu turns each variant into a message and keeps running.
#[derive(Error, Debug)]
pub enum EnvCredsError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("Permission denied: {}", .0.display())]
    PermissionDenied(PathBuf),
    #[error("Credential set '{0}' not found")]
    NotFound(String),
    #[error("Parse error: {0}")]
    Parse(String),
    #[error("Validation error: {0}")]
    Validation(String),
    #[error("TOML parsing error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Dotenv error: {0}")]
    Dotenv(#[from] dotenvy::Error),
    #[error("User interaction error: {0}")]
    InquireError(#[from] inquire::InquireError),
    #[error("Could not find config directory")]
    NoConfigDir,
}

impl EnvCredsError {
    /// Wraps an I/O error raised while touching `path`.
    ///
    /// Permission failures get their own variant so callers can tell a
    /// read-only store apart from other I/O trouble.
    pub fn io_at(path: &Path, err: io::Error) -> Self {
        if err.kind() == io::ErrorKind::PermissionDenied {
            EnvCredsError::PermissionDenied(path.to_path_buf())
        } else {
            EnvCredsError::Io(err)
        }
    }

    /// Whether the error came from the user cancelling or interrupting a prompt.
    pub fn is_prompt_abort(&self) -> bool {
        matches!(
            self,
            EnvCredsError::InquireError(
                inquire::InquireError::OperationCanceled
                    | inquire::InquireError::OperationInterrupted
            )
        )
    }
}

/// A type alias for `Result<T, EnvCredsError>`
pub type Result<T> = std::result::Result<T, EnvCredsError>;

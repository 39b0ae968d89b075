//! Error types for registry operations.
//!
//! [`RegistryError`] is the error half of the `Result`-returning API. Every
//! variant maps back to a native status code through [`RegistryError::code`],
//! which is how the status-returning `try_*` API reports the same failures.

use crate::status::{codes, Status};
use std::io;
use thiserror::Error;

/// Result type alias for registry operations.
pub type Result<T> = std::result::Result<T, RegistryError>;

/// Errors that can occur while operating on the registry.
#[derive(Error, Debug)]
pub enum RegistryError {
    /// A native registry call did not report success.
    #[error("{message} (status {code})")]
    Native {
        /// Native status code returned by the failing call.
        code: i32,
        /// Description of the operation that failed.
        message: String,
    },

    /// A length did not fit the native 32-bit size type.
    #[error("Overflow when converting size {size} to a 32-bit registry length")]
    Overflow {
        /// The length that could not be narrowed.
        size: usize,
    },

    /// Stored data does not have the shape its value type requires.
    #[error("Invalid registry data: {0}")]
    InvalidData(String),

    /// Registration options are unusable.
    #[error("Invalid options: {0}")]
    InvalidOptions(String),

    /// The native registry is not available on this target.
    #[error("Unsupported platform: the Windows registry is not available")]
    UnsupportedPlatform,

    /// I/O error while reading configuration or snapshot files.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Configuration could not be parsed.
    #[error("Invalid configuration: {0}")]
    Config(#[from] serde_json::Error),
}

impl RegistryError {
    /// Creates a native failure error from a status and a description.
    ///
    /// # Arguments
    ///
    /// * `status` - The failed status returned by the native call
    /// * `message` - Description of the operation that failed
    ///
    /// # Examples
    ///
    /// ```rust
    /// # use dplnk::{RegistryError, Status};
    /// let err = RegistryError::native(Status::new(2), "Cannot open registry key");
    /// assert_eq!(err.code(), 2);
    /// ```
    pub fn native(status: Status, message: impl Into<String>) -> Self {
        Self::Native {
            code: status.code(),
            message: message.into(),
        }
    }

    /// Creates an invalid data error.
    pub fn invalid_data(message: impl Into<String>) -> Self {
        Self::InvalidData(message.into())
    }

    /// Returns the native status code that best describes this error.
    pub fn code(&self) -> i32 {
        match self {
            Self::Native { code, .. } => *code,
            Self::Overflow { .. } => codes::ERROR_ARITHMETIC_OVERFLOW,
            Self::InvalidData(_) => codes::ERROR_INVALID_DATA,
            Self::InvalidOptions(_) => codes::ERROR_INVALID_PARAMETER,
            Self::UnsupportedPlatform => codes::ERROR_CALL_NOT_IMPLEMENTED,
            Self::Io(err) => err.raw_os_error().unwrap_or(codes::ERROR_GEN_FAILURE),
            Self::Config(_) => codes::ERROR_INVALID_PARAMETER,
        }
    }

    /// Returns this error as a [`Status`] for the status-returning API.
    pub fn status(&self) -> Status {
        Status::new(self.code())
    }

    /// Returns true if the error reports a missing key or value.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self.code(),
            codes::ERROR_FILE_NOT_FOUND | codes::ERROR_PATH_NOT_FOUND
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_native_error_keeps_code_and_message() {
        let err = RegistryError::native(Status::new(5), "Cannot set string value");
        assert_eq!(err.code(), 5);
        assert_eq!(err.to_string(), "Cannot set string value (status 5)");
        assert!(!err.is_not_found());
    }

    #[test]
    fn test_error_codes() {
        assert_eq!(
            RegistryError::Overflow { size: 0 }.code(),
            codes::ERROR_ARITHMETIC_OVERFLOW
        );
        assert_eq!(
            RegistryError::invalid_data("bad").code(),
            codes::ERROR_INVALID_DATA
        );
        assert!(RegistryError::UnsupportedPlatform.status().failed());
    }

    #[test]
    fn test_not_found() {
        assert!(RegistryError::native(Status::new(2), "x").is_not_found());
        assert!(RegistryError::native(Status::new(3), "x").is_not_found());
    }
}

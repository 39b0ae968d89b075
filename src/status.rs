//! Native status codes and the status-returning result types.
//!
//! [`Status`] wraps the signed code returned by every registry primitive.
//! [`Expected`] carries either a decoded value or the failed [`Status`] and is
//! what the `try_*` read operations of [`RegKey`](crate::RegKey) return.

use crate::error::{RegistryError, Result};
use std::fmt;

/// Win32 status codes produced or interpreted by this crate.
pub mod codes {
    /// The operation completed successfully.
    pub const ERROR_SUCCESS: i32 = 0;
    /// The key or value does not exist.
    pub const ERROR_FILE_NOT_FOUND: i32 = 2;
    /// An intermediate path segment does not exist.
    pub const ERROR_PATH_NOT_FOUND: i32 = 3;
    /// Access is denied.
    pub const ERROR_ACCESS_DENIED: i32 = 5;
    /// The handle is invalid.
    pub const ERROR_INVALID_HANDLE: i32 = 6;
    /// The data is invalid.
    pub const ERROR_INVALID_DATA: i32 = 13;
    /// Generic failure.
    pub const ERROR_GEN_FAILURE: i32 = 31;
    /// The network path was not found.
    pub const ERROR_BAD_NETPATH: i32 = 53;
    /// The parameter is incorrect.
    pub const ERROR_INVALID_PARAMETER: i32 = 87;
    /// The function is not supported.
    pub const ERROR_CALL_NOT_IMPLEMENTED: i32 = 120;
    /// The object already exists.
    pub const ERROR_ALREADY_EXISTS: i32 = 183;
    /// The supplied buffer is too small.
    pub const ERROR_MORE_DATA: i32 = 234;
    /// Enumeration index past the last item.
    pub const ERROR_NO_MORE_ITEMS: i32 = 259;
    /// Arithmetic result exceeded 32 bits.
    pub const ERROR_ARITHMETIC_OVERFLOW: i32 = 534;
    /// The registry database is corrupt.
    pub const ERROR_BADDB: i32 = 1009;
    /// The key has been marked for deletion.
    pub const ERROR_KEY_DELETED: i32 = 1018;
    /// The stored data has the wrong size for its type.
    pub const ERROR_DATATYPE_MISMATCH: i32 = 1629;
    /// The stored value type does not match the requested one.
    pub const ERROR_UNSUPPORTED_TYPE: i32 = 1630;
}

/// `MAKELANGID(LANG_NEUTRAL, SUBLANG_DEFAULT)`.
pub const LANG_NEUTRAL_DEFAULT: u32 = 0x0400;

/// Outcome of a single native registry operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Status(i32);

impl Status {
    /// The success status.
    pub const SUCCESS: Status = Status(codes::ERROR_SUCCESS);

    /// Wraps a native status code.
    pub const fn new(code: i32) -> Self {
        Self(code)
    }

    /// Returns true if the operation succeeded.
    pub const fn is_ok(&self) -> bool {
        self.0 == codes::ERROR_SUCCESS
    }

    /// Returns true if the operation failed.
    pub const fn failed(&self) -> bool {
        !self.is_ok()
    }

    /// Returns the raw status code.
    pub const fn code(&self) -> i32 {
        self.0
    }

    /// Returns true for the two "does not exist" codes.
    pub const fn is_not_found(&self) -> bool {
        matches!(
            self.0,
            codes::ERROR_FILE_NOT_FOUND | codes::ERROR_PATH_NOT_FOUND
        )
    }

    /// Returns the system message for this code in the neutral language.
    ///
    /// Returns an empty string if no message can be found.
    pub fn message(&self) -> String {
        self.message_for_language(LANG_NEUTRAL_DEFAULT)
    }

    /// Returns the system message for this code in the given language.
    ///
    /// Message lookup is diagnostic only, so a failed lookup yields an empty
    /// string instead of an error.
    pub fn message_for_language(&self, language_id: u32) -> String {
        lookup_message(self.0, language_id).unwrap_or_default()
    }

    /// Converts this status into a `Result`, describing a failure with `context`.
    pub fn into_result(self, context: &str) -> Result<()> {
        if self.is_ok() {
            Ok(())
        } else {
            Err(RegistryError::native(self, context))
        }
    }
}

impl Default for Status {
    fn default() -> Self {
        Self::SUCCESS
    }
}

impl From<i32> for Status {
    fn from(code: i32) -> Self {
        Self(code)
    }
}

impl From<Status> for bool {
    fn from(status: Status) -> bool {
        status.is_ok()
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let message = self.message();
        if message.is_empty() {
            write!(f, "status {}", self.0)
        } else {
            write!(f, "{} (status {})", message, self.0)
        }
    }
}

#[cfg(windows)]
fn lookup_message(code: i32, language_id: u32) -> Option<String> {
    crate::api::win32::format_message(code, language_id)
}

#[cfg(not(windows))]
fn lookup_message(code: i32, language_id: u32) -> Option<String> {
    // Only the neutral and English tables are built in.
    if !matches!(language_id & 0x3FF, 0x00 | 0x09) {
        return None;
    }

    let text = match code {
        codes::ERROR_SUCCESS => "The operation completed successfully.",
        codes::ERROR_FILE_NOT_FOUND => "The system cannot find the file specified.",
        codes::ERROR_PATH_NOT_FOUND => "The system cannot find the path specified.",
        codes::ERROR_ACCESS_DENIED => "Access is denied.",
        codes::ERROR_INVALID_HANDLE => "The handle is invalid.",
        codes::ERROR_INVALID_DATA => "The data is invalid.",
        codes::ERROR_GEN_FAILURE => "A device attached to the system is not functioning.",
        codes::ERROR_BAD_NETPATH => "The network path was not found.",
        codes::ERROR_INVALID_PARAMETER => "The parameter is incorrect.",
        codes::ERROR_CALL_NOT_IMPLEMENTED => "This function is not supported on this system.",
        codes::ERROR_ALREADY_EXISTS => "Cannot create a file when that file already exists.",
        codes::ERROR_MORE_DATA => "More data is available.",
        codes::ERROR_NO_MORE_ITEMS => "No more data is available.",
        codes::ERROR_ARITHMETIC_OVERFLOW => "Arithmetic result exceeded 32 bits.",
        codes::ERROR_BADDB => "The configuration registry database is corrupt.",
        codes::ERROR_KEY_DELETED => {
            "Illegal operation attempted on a registry key that has been marked for deletion."
        }
        codes::ERROR_DATATYPE_MISMATCH => "The data supplied is of the wrong type.",
        codes::ERROR_UNSUPPORTED_TYPE => "Data of this type is not supported.",
        _ => return None,
    };

    Some(text.to_string())
}

/// Either a successfully decoded value or the failed [`Status`].
///
/// Exactly one side is present. Asking for the value of a failed result, or
/// for the error of a successful one, is a caller bug and panics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Expected<T> {
    /// The operation succeeded.
    Value(T),
    /// The operation failed with this status.
    Error(Status),
}

impl<T> Expected<T> {
    /// Wraps a successful value.
    pub fn from_value(value: T) -> Self {
        Self::Value(value)
    }

    /// Wraps a failure status.
    pub fn from_error(status: Status) -> Self {
        assert!(status.failed(), "Expected::from_error with a success status");
        Self::Error(status)
    }

    /// Returns true if a value is present.
    pub fn is_valid(&self) -> bool {
        matches!(self, Self::Value(_))
    }

    /// Returns the value.
    ///
    /// # Panics
    ///
    /// Panics if this holds an error.
    pub fn value(&self) -> &T {
        match self {
            Self::Value(value) => value,
            Self::Error(status) => {
                panic!("Expected::value called on an error result ({})", status.code())
            }
        }
    }

    /// Consumes `self` and returns the value.
    ///
    /// # Panics
    ///
    /// Panics if this holds an error.
    pub fn into_value(self) -> T {
        match self {
            Self::Value(value) => value,
            Self::Error(status) => {
                panic!("Expected::into_value called on an error result ({})", status.code())
            }
        }
    }

    /// Returns the error status.
    ///
    /// # Panics
    ///
    /// Panics if this holds a value.
    pub fn error(&self) -> Status {
        match self {
            Self::Error(status) => *status,
            Self::Value(_) => panic!("Expected::error called on a valid result"),
        }
    }

    /// Maps the contained value, leaving an error untouched.
    pub fn map<U, F: FnOnce(T) -> U>(self, f: F) -> Expected<U> {
        match self {
            Self::Value(value) => Expected::Value(f(value)),
            Self::Error(status) => Expected::Error(status),
        }
    }

    /// Converts into a `Result`, describing a failure with `context`.
    pub fn into_result(self, context: &str) -> Result<T> {
        match self {
            Self::Value(value) => Ok(value),
            Self::Error(status) => Err(RegistryError::native(status, context)),
        }
    }

    /// Converts into a `Result` carrying the bare status.
    pub fn ok(self) -> std::result::Result<T, Status> {
        match self {
            Self::Value(value) => Ok(value),
            Self::Error(status) => Err(status),
        }
    }
}

impl<T> From<Result<T>> for Expected<T> {
    fn from(result: Result<T>) -> Self {
        match result {
            Ok(value) => Self::Value(value),
            Err(err) => Self::Error(err.status()),
        }
    }
}

impl<T> From<Expected<T>> for bool {
    fn from(expected: Expected<T>) -> bool {
        expected.is_valid()
    }
}

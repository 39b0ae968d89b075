//! # dplnk
//!
//! Registers custom URL protocol handlers on Windows, on top of a safe,
//! owning wrapper around the registry key-handle API.
//!
//! ## Features
//!
//! - **Owning handles**: [`RegKey`] closes its key on drop and never closes
//!   predefined roots
//! - **Two error models**: `Result<T, RegistryError>` methods and `try_*`
//!   methods returning [`Status`] or [`Expected<T>`]
//! - **Typed values**: DWORD, QWORD, strings, expandable strings,
//!   multi-strings and binary data, plus decoded [`ValueData`]
//! - **Checked sizes**: lengths that do not fit the native 32-bit type are
//!   reported as overflow, never truncated
//! - **Portable backend**: [`MemoryRegistry`] emulates the native status codes
//!   so everything above the FFI runs on any platform
//!
//! ## Architecture
//!
//! 1. **Primitives** ([`api`]): the [`RegistryApi`] trait, one method per Win32
//!    registry function, on raw handles and raw status codes
//! 2. **Key wrapper** ([`key`]): ownership, query-twice reads, enumeration,
//!    existence checks
//! 3. **Registration** ([`link`]): the protocol handler keys and values
//!
//! ## Examples
//!
//! ### Registering a protocol handler
//!
//! ```no_run
//! use dplnk::{dplnk, LinkOptions, Scope};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let options = LinkOptions::new("myapp")
//!     .with_scope(Scope::User)
//!     .with_value("extra", "1");
//! dplnk(r"C:\Program Files\MyApp\myapp.exe", &options)?;
//! # Ok(())
//! # }
//! ```
//!
//! ### Working with keys
//!
//! ```rust
//! use dplnk::{Access, MemoryRegistry, RawKey, RegKey};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let registry = MemoryRegistry::new();
//! let key =
//!     RegKey::create_key(registry, RawKey::CURRENT_USER, r"Software\MyApp", Access::DEFAULT)?;
//! key.set_multi_string_value("Paths", &["a", "", "b"])?;
//!
//! for (name, value_type) in key.enum_values()? {
//!     println!("{} ({})", name, dplnk::reg_type_to_string(value_type));
//! }
//!
//! // The status model reports the same failures without an error value.
//! let missing = key.try_get_dword_value("Missing");
//! assert!(!missing.is_valid());
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod api;
pub mod error;
pub mod key;
pub mod link;
pub mod status;
pub mod types;
pub mod utils;
pub mod value;

// Re-export main types for convenience
pub use api::{MemoryRegistry, Operation, RawKey, RawKeyInfo, RegistryApi};
#[cfg(windows)]
pub use api::Win32Registry;
pub use error::{RegistryError, Result};
pub use key::{RegKey, MAX_READ_ATTEMPTS};
pub use link::{dplnk, register_protocol_with, LinkOptions, Scope};
pub use status::{codes, Expected, Status};
pub use types::{
    reg_type_to_string, Access, CreateOptions, Disposition, ExpandStringOption, GetValueFlags,
    KeyInfo, KeyReflection, ValueType,
};
pub use value::ValueData;

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

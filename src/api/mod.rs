//! Native registry primitives.
//!
//! [`RegistryApi`] mirrors the Win32 registry functions the key wrapper is
//! built on, one method per primitive, using raw handles ([`RawKey`]) and raw
//! status codes. [`RegKey`](crate::RegKey) owns a handle and layers the safe
//! protocols (query-twice reads, enumeration, ownership) on top.
//!
//! Two implementations are provided:
//!
//! - [`Win32Registry`] (Windows only) calls the real API.
//! - [`MemoryRegistry`] emulates the same status-code semantics in memory.

pub mod memory;
#[cfg(windows)]
pub mod win32;

pub use memory::{MemoryRegistry, Operation};
#[cfg(windows)]
pub use win32::Win32Registry;

use crate::status::Status;
use crate::types::{Access, CreateOptions, Disposition, GetValueFlags};
use std::fmt;
use std::path::Path;

/// A raw registry key handle (`HKEY`).
///
/// Predefined roots use the sign-extended values Windows defines, so a
/// `RawKey` converts to and from a native `HKEY` without translation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct RawKey(pub isize);

const fn predefined(value: u32) -> RawKey {
    RawKey(value as i32 as isize)
}

impl RawKey {
    /// The empty handle.
    pub const NULL: RawKey = RawKey(0);
    /// `HKEY_CLASSES_ROOT`
    pub const CLASSES_ROOT: RawKey = predefined(0x8000_0000);
    /// `HKEY_CURRENT_USER`
    pub const CURRENT_USER: RawKey = predefined(0x8000_0001);
    /// `HKEY_LOCAL_MACHINE`
    pub const LOCAL_MACHINE: RawKey = predefined(0x8000_0002);
    /// `HKEY_USERS`
    pub const USERS: RawKey = predefined(0x8000_0003);
    /// `HKEY_PERFORMANCE_DATA`
    pub const PERFORMANCE_DATA: RawKey = predefined(0x8000_0004);
    /// `HKEY_CURRENT_CONFIG`
    pub const CURRENT_CONFIG: RawKey = predefined(0x8000_0005);
    /// `HKEY_CURRENT_USER_LOCAL_SETTINGS`
    pub const CURRENT_USER_LOCAL_SETTINGS: RawKey = predefined(0x8000_0007);
    /// `HKEY_PERFORMANCE_TEXT`
    pub const PERFORMANCE_TEXT: RawKey = predefined(0x8000_0050);
    /// `HKEY_PERFORMANCE_NLSTEXT`
    pub const PERFORMANCE_NLSTEXT: RawKey = predefined(0x8000_0060);

    /// The predefined roots, which are never closed by the key wrapper.
    pub const PREDEFINED: [RawKey; 9] = [
        Self::CLASSES_ROOT,
        Self::CURRENT_USER,
        Self::LOCAL_MACHINE,
        Self::USERS,
        Self::PERFORMANCE_DATA,
        Self::CURRENT_CONFIG,
        Self::CURRENT_USER_LOCAL_SETTINGS,
        Self::PERFORMANCE_TEXT,
        Self::PERFORMANCE_NLSTEXT,
    ];

    /// Returns true for the empty handle.
    pub fn is_null(&self) -> bool {
        *self == Self::NULL
    }

    /// Returns true for one of the predefined roots.
    pub fn is_predefined(&self) -> bool {
        Self::PREDEFINED.contains(self)
    }

    /// Returns the symbolic name of a predefined root.
    pub fn predefined_name(&self) -> Option<&'static str> {
        let name = match *self {
            Self::CLASSES_ROOT => "HKEY_CLASSES_ROOT",
            Self::CURRENT_USER => "HKEY_CURRENT_USER",
            Self::LOCAL_MACHINE => "HKEY_LOCAL_MACHINE",
            Self::USERS => "HKEY_USERS",
            Self::PERFORMANCE_DATA => "HKEY_PERFORMANCE_DATA",
            Self::CURRENT_CONFIG => "HKEY_CURRENT_CONFIG",
            Self::CURRENT_USER_LOCAL_SETTINGS => "HKEY_CURRENT_USER_LOCAL_SETTINGS",
            Self::PERFORMANCE_TEXT => "HKEY_PERFORMANCE_TEXT",
            Self::PERFORMANCE_NLSTEXT => "HKEY_PERFORMANCE_NLSTEXT",
            _ => return None,
        };
        Some(name)
    }
}

impl fmt::Display for RawKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.predefined_name() {
            Some(name) => write!(f, "{}", name),
            None => write!(f, "{:#x}", self.0),
        }
    }
}

/// Metadata reported by `RegQueryInfoKeyW`.
///
/// Name lengths are in UTF-16 code units and exclude the terminator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RawKeyInfo {
    /// Number of sub-keys.
    pub sub_keys: u32,
    /// Longest sub-key name.
    pub max_sub_key_len: u32,
    /// Number of values.
    pub values: u32,
    /// Longest value name.
    pub max_value_name_len: u32,
    /// Largest value data, in bytes.
    pub max_value_len: u32,
    /// Last write time (FILETIME).
    pub last_write_time: u64,
}

/// The native registry primitives.
///
/// Methods take raw handles and never take ownership of them; only
/// [`RegistryApi::close_key`] releases a handle. Failures are reported as the
/// native [`Status`], never as panics.
pub trait RegistryApi {
    /// `RegCreateKeyExW`: opens `sub_key` under `parent`, creating it if needed.
    fn create_key(
        &self,
        parent: RawKey,
        sub_key: &str,
        options: CreateOptions,
        access: Access,
    ) -> Result<(RawKey, Disposition), Status>;

    /// `RegOpenKeyExW`: opens an existing `sub_key` under `parent`.
    fn open_key(&self, parent: RawKey, sub_key: &str, access: Access) -> Result<RawKey, Status>;

    /// `RegCloseKey`
    fn close_key(&self, key: RawKey) -> Status;

    /// `RegSetValueExW`: writes `data` as a value of the given native type.
    fn set_value(&self, key: RawKey, name: &str, value_type: u32, data: &[u8]) -> Status;

    /// `RegGetValueW` on the key itself.
    ///
    /// With `data` set to `None`, stores the required byte count in `size`.
    /// With a buffer that is too small, stores the required byte count in
    /// `size` and returns `ERROR_MORE_DATA`. On success `size` holds the
    /// number of bytes written and `value_type` the type of the data.
    fn get_value(
        &self,
        key: RawKey,
        name: &str,
        flags: GetValueFlags,
        data: Option<&mut [u8]>,
        size: &mut u32,
        value_type: &mut u32,
    ) -> Status;

    /// `RegQueryValueExW` without data: returns the value's type and size.
    fn query_value(&self, key: RawKey, name: &str) -> Result<(u32, u32), Status>;

    /// `RegQueryInfoKeyW`
    fn query_info_key(&self, key: RawKey) -> Result<RawKeyInfo, Status>;

    /// `RegEnumKeyExW`: writes the name of sub-key `index` into `name`.
    ///
    /// `name_len` holds the buffer capacity in code units on input and the
    /// name length, excluding the terminator, on output.
    fn enum_key(&self, key: RawKey, index: u32, name: &mut [u16], name_len: &mut u32) -> Status;

    /// `RegEnumValueW`: writes the name and type of value `index`.
    fn enum_value(
        &self,
        key: RawKey,
        index: u32,
        name: &mut [u16],
        name_len: &mut u32,
        value_type: &mut u32,
    ) -> Status;

    /// `RegDeleteValueW`
    fn delete_value(&self, key: RawKey, name: &str) -> Status;

    /// `RegDeleteKeyExW`: deletes an empty sub-key in the view chosen by `access`.
    fn delete_key(&self, key: RawKey, sub_key: &str, access: Access) -> Status;

    /// `RegDeleteTreeW`: deletes `sub_key` recursively, or the key's own
    /// contents when `sub_key` is empty.
    fn delete_tree(&self, key: RawKey, sub_key: &str) -> Status;

    /// `RegCopyTreeW`
    fn copy_tree(&self, src: RawKey, sub_key: &str, dest: RawKey) -> Status;

    /// `RegFlushKey`
    fn flush_key(&self, key: RawKey) -> Status;

    /// `RegLoadKeyW`: mounts the hive file at `file` as `sub_key` of `key`.
    fn load_key(&self, key: RawKey, sub_key: &str, file: &Path) -> Status;

    /// `RegSaveKeyW`: writes the key and its sub-tree to `file`.
    fn save_key(&self, key: RawKey, file: &Path) -> Status;

    /// `RegEnableReflectionKey`
    fn enable_reflection_key(&self, key: RawKey) -> Status;

    /// `RegDisableReflectionKey`
    fn disable_reflection_key(&self, key: RawKey) -> Status;

    /// `RegQueryReflectionKey`: returns true if reflection is disabled.
    fn query_reflection_key(&self, key: RawKey) -> Result<bool, Status>;

    /// `RegConnectRegistryW`: opens a predefined root on another machine.
    fn connect_registry(&self, machine_name: &str, predefined: RawKey) -> Result<RawKey, Status>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_predefined_values_are_sign_extended() {
        assert_eq!(RawKey::CLASSES_ROOT.0, -2_147_483_648);
        assert_eq!(RawKey::CURRENT_USER.0, -2_147_483_647);
    }

    #[test]
    fn test_predefined_set() {
        for key in RawKey::PREDEFINED {
            assert!(key.is_predefined());
            assert!(key.predefined_name().is_some());
        }
        assert!(!RawKey::NULL.is_predefined());
        assert!(!RawKey(0x1234).is_predefined());
        assert!(RawKey::NULL.is_null());
    }

    #[test]
    fn test_display() {
        assert_eq!(RawKey::LOCAL_MACHINE.to_string(), "HKEY_LOCAL_MACHINE");
        assert_eq!(RawKey(0x40).to_string(), "0x40");
    }
}

//! Registry value types, access rights, and option flags.
//!
//! The numeric values match the Win32 definitions so that they can be passed
//! straight through to the native API.

use std::ops::BitOr;

/// Native registry value type codes.
pub struct ValueType;

impl ValueType {
    /// `REG_NONE`
    pub const REG_NONE: u32 = 0;
    /// `REG_SZ`
    pub const REG_SZ: u32 = 1;
    /// `REG_EXPAND_SZ`
    pub const REG_EXPAND_SZ: u32 = 2;
    /// `REG_BINARY`
    pub const REG_BINARY: u32 = 3;
    /// `REG_DWORD`
    pub const REG_DWORD: u32 = 4;
    /// `REG_DWORD_BIG_ENDIAN`
    pub const REG_DWORD_BIG_ENDIAN: u32 = 5;
    /// `REG_LINK`
    pub const REG_LINK: u32 = 6;
    /// `REG_MULTI_SZ`
    pub const REG_MULTI_SZ: u32 = 7;
    /// `REG_QWORD`
    pub const REG_QWORD: u32 = 11;
}

/// Maps a native type code to its symbolic name.
///
/// Only the six types the key wrapper reads and writes are named; every other
/// code, including valid but unsupported ones, maps to `"Unknown"`.
pub fn reg_type_to_string(reg_type: u32) -> &'static str {
    match reg_type {
        ValueType::REG_SZ => "REG_SZ",
        ValueType::REG_EXPAND_SZ => "REG_EXPAND_SZ",
        ValueType::REG_MULTI_SZ => "REG_MULTI_SZ",
        ValueType::REG_DWORD => "REG_DWORD",
        ValueType::REG_QWORD => "REG_QWORD",
        ValueType::REG_BINARY => "REG_BINARY",
        _ => "Unknown",
    }
}

/// Access rights requested when opening or creating a key (`REGSAM`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Access(pub u32);

impl Access {
    /// Query values.
    pub const QUERY_VALUE: Access = Access(0x0001);
    /// Create, delete, or set values.
    pub const SET_VALUE: Access = Access(0x0002);
    /// Create sub-keys.
    pub const CREATE_SUB_KEY: Access = Access(0x0004);
    /// Enumerate sub-keys.
    pub const ENUMERATE_SUB_KEYS: Access = Access(0x0008);
    /// Request change notifications.
    pub const NOTIFY: Access = Access(0x0010);
    /// Create symbolic links.
    pub const CREATE_LINK: Access = Access(0x0020);
    /// Operate on the 64-bit registry view.
    pub const WOW64_64KEY: Access = Access(0x0100);
    /// Operate on the 32-bit registry view.
    pub const WOW64_32KEY: Access = Access(0x0200);
    /// Delete the key.
    pub const DELETE: Access = Access(0x0001_0000);
    /// `KEY_READ`
    pub const READ: Access = Access(0x0002_0019);
    /// `KEY_WRITE`
    pub const WRITE: Access = Access(0x0002_0006);
    /// `KEY_ALL_ACCESS`
    pub const ALL_ACCESS: Access = Access(0x000F_003F);

    /// Default rights for create and open: read, write, 64-bit view.
    pub const DEFAULT: Access = Access(Self::READ.0 | Self::WRITE.0 | Self::WOW64_64KEY.0);

    /// Returns true if every bit of `other` is requested.
    pub fn contains(&self, other: Access) -> bool {
        (self.0 & other.0) == other.0
    }

    /// Returns the rights with the view selection bits removed.
    pub fn without_view(&self) -> Access {
        Access(self.0 & !(Self::WOW64_32KEY.0 | Self::WOW64_64KEY.0))
    }
}

impl Default for Access {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl BitOr for Access {
    type Output = Access;

    fn bitor(self, rhs: Access) -> Access {
        Access(self.0 | rhs.0)
    }
}

/// Options for key creation (`REG_OPTION_*`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CreateOptions(pub u32);

impl CreateOptions {
    /// The key is persisted to disk.
    pub const NON_VOLATILE: CreateOptions = CreateOptions(0x0000);
    /// The key lives in memory only and is lost on unload.
    pub const VOLATILE: CreateOptions = CreateOptions(0x0001);

    /// Returns true for volatile creation.
    pub fn is_volatile(&self) -> bool {
        (self.0 & Self::VOLATILE.0) != 0
    }
}

impl Default for CreateOptions {
    fn default() -> Self {
        Self::NON_VOLATILE
    }
}

/// What a create call did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// The key did not exist and was created.
    CreatedNewKey,
    /// The key existed and was opened.
    OpenedExistingKey,
}

impl Disposition {
    /// Converts the native `REG_CREATED_NEW_KEY` / `REG_OPENED_EXISTING_KEY` code.
    pub fn from_u32(value: u32) -> Self {
        if value == 1 {
            Disposition::CreatedNewKey
        } else {
            Disposition::OpenedExistingKey
        }
    }
}

/// `RegGetValueW` flags (`RRF_*`): type restrictions and expansion behavior.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GetValueFlags(pub u32);

impl GetValueFlags {
    /// Accept `REG_NONE`.
    pub const RT_REG_NONE: GetValueFlags = GetValueFlags(0x0000_0001);
    /// Accept `REG_SZ`.
    pub const RT_REG_SZ: GetValueFlags = GetValueFlags(0x0000_0002);
    /// Accept `REG_EXPAND_SZ`.
    pub const RT_REG_EXPAND_SZ: GetValueFlags = GetValueFlags(0x0000_0004);
    /// Accept `REG_BINARY`.
    pub const RT_REG_BINARY: GetValueFlags = GetValueFlags(0x0000_0008);
    /// Accept `REG_DWORD`.
    pub const RT_REG_DWORD: GetValueFlags = GetValueFlags(0x0000_0010);
    /// Accept `REG_MULTI_SZ`.
    pub const RT_REG_MULTI_SZ: GetValueFlags = GetValueFlags(0x0000_0020);
    /// Accept `REG_QWORD`.
    pub const RT_REG_QWORD: GetValueFlags = GetValueFlags(0x0000_0040);
    /// Accept any type.
    pub const RT_ANY: GetValueFlags = GetValueFlags(0x0000_FFFF);
    /// Do not expand `REG_EXPAND_SZ` data.
    pub const NOEXPAND: GetValueFlags = GetValueFlags(0x1000_0000);

    /// Returns true if every bit of `other` is set.
    pub fn contains(&self, other: GetValueFlags) -> bool {
        (self.0 & other.0) == other.0
    }

    /// Returns true if a value of the given native type passes the restriction.
    pub fn accepts(&self, reg_type: u32) -> bool {
        let bit = match reg_type {
            ValueType::REG_NONE => Self::RT_REG_NONE,
            ValueType::REG_SZ => Self::RT_REG_SZ,
            ValueType::REG_EXPAND_SZ => Self::RT_REG_EXPAND_SZ,
            ValueType::REG_BINARY => Self::RT_REG_BINARY,
            ValueType::REG_DWORD => Self::RT_REG_DWORD,
            ValueType::REG_MULTI_SZ => Self::RT_REG_MULTI_SZ,
            ValueType::REG_QWORD => Self::RT_REG_QWORD,
            _ => return self.contains(Self::RT_ANY),
        };
        (self.0 & bit.0) != 0
    }
}

impl BitOr for GetValueFlags {
    type Output = GetValueFlags;

    fn bitor(self, rhs: GetValueFlags) -> GetValueFlags {
        GetValueFlags(self.0 | rhs.0)
    }
}

/// Whether `REG_EXPAND_SZ` reads resolve `%VARIABLE%` references.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExpandStringOption {
    /// Return the stored text as is.
    #[default]
    DontExpand,
    /// Replace environment variable references with their values.
    Expand,
}

/// Reflection state of a key between the 32-bit and 64-bit views.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyReflection {
    /// Changes are mirrored between views.
    ReflectionEnabled,
    /// Mirroring is turned off for this key.
    ReflectionDisabled,
}

/// Metadata snapshot of a key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct KeyInfo {
    /// Number of immediate sub-keys.
    pub sub_keys: u32,

    /// Number of values.
    pub values: u32,

    /// Last write time (Windows FILETIME).
    pub last_write_time: u64,
}

impl KeyInfo {
    /// Returns the last write time as a UTC timestamp.
    pub fn last_written(&self) -> Option<chrono::DateTime<chrono::Utc>> {
        crate::utils::filetime_to_datetime(self.last_write_time)
    }
}

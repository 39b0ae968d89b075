//! Owning registry key handle.
//!
//! [`RegKey`] owns exactly one open key handle and releases it on drop. Every
//! operation comes in two forms:
//!
//! - `name(...) -> Result<T>` reports failures as [`RegistryError`].
//! - `try_name(...)` reports the same failures as a [`Status`] or an
//!   [`Expected<T>`], built directly on the first form.
//!
//! Operating on an empty key is a caller bug and panics.

use crate::api::{RawKey, RegistryApi};
use crate::error::{RegistryError, Result};
use crate::status::{codes, Expected, Status};
use crate::types::{
    Access, CreateOptions, Disposition, ExpandStringOption, GetValueFlags, KeyInfo, KeyReflection,
    ValueType,
};
use crate::utils::{
    build_multi_string, bytes_to_wide, parse_multi_string, size_to_dword, string_to_bytes,
    wide_to_bytes, wide_to_string,
};
use crate::value::ValueData;
use byteorder::{ByteOrder, LittleEndian};
use std::fmt;
use std::path::Path;
use tracing::{debug, instrument, warn};

/// Maximum number of reads attempted while a value keeps growing between the
/// size query and the read.
pub const MAX_READ_ATTEMPTS: usize = 16;

/// Converts a primitive's status into the error model.
fn check<T>(result: std::result::Result<T, Status>, context: &str) -> Result<T> {
    result.map_err(|status| RegistryError::native(status, context))
}

fn status_of(result: Result<()>) -> Status {
    match result {
        Ok(()) => Status::SUCCESS,
        Err(err) => err.status(),
    }
}

/// An owned registry key handle.
///
/// Move-only: a handle has exactly one owner, and dropping the owner closes
/// it. Predefined roots such as `HKEY_CURRENT_USER` may be owned too, but are
/// only forgotten, never closed.
///
/// # Examples
///
/// ```rust
/// use dplnk::{Access, MemoryRegistry, RawKey, RegKey};
///
/// let registry = MemoryRegistry::new();
/// let key = RegKey::create_key(registry, RawKey::CURRENT_USER, r"Software\Demo", Access::READ)?;
/// key.set_string_value("", "hello")?;
/// assert_eq!(key.get_string_value("")?, "hello");
/// # Ok::<(), dplnk::RegistryError>(())
/// ```
pub struct RegKey<A: RegistryApi> {
    api: A,
    raw: RawKey,
}

impl<A: RegistryApi> RegKey<A> {
    /// Creates an empty key that owns nothing.
    pub fn new(api: A) -> Self {
        Self {
            api,
            raw: RawKey::NULL,
        }
    }

    /// Takes ownership of an already open handle without validating it.
    pub fn from_raw(api: A, raw: RawKey) -> Self {
        Self { api, raw }
    }

    /// Creates or opens `sub_key` under `parent` and returns the owning key.
    pub fn create_key(api: A, parent: RawKey, sub_key: &str, access: Access) -> Result<Self> {
        let mut key = Self::new(api);
        key.create(parent, sub_key, access)?;
        Ok(key)
    }

    /// Opens an existing `sub_key` under `parent` and returns the owning key.
    pub fn open_key(api: A, parent: RawKey, sub_key: &str, access: Access) -> Result<Self> {
        let mut key = Self::new(api);
        key.open(parent, sub_key, access)?;
        Ok(key)
    }

    /// The backend this key calls into.
    pub fn api(&self) -> &A {
        &self.api
    }

    /// The owned handle, which stays owned by this key.
    pub fn raw(&self) -> RawKey {
        self.raw
    }

    /// Returns true if a handle is owned.
    pub fn is_valid(&self) -> bool {
        !self.raw.is_null()
    }

    /// Returns true if the owned handle is a predefined root.
    pub fn is_predefined(&self) -> bool {
        self.raw.is_predefined()
    }

    fn handle(&self) -> RawKey {
        assert!(self.is_valid(), "registry operation on an empty key");
        self.raw
    }

    /// Releases the owned handle unless it is predefined, leaving the key
    /// empty. Closing an empty key does nothing.
    pub fn close(&mut self) {
        if self.raw.is_null() {
            return;
        }

        if !self.raw.is_predefined() {
            let status = self.api.close_key(self.raw);
            if status.failed() {
                warn!(handle = %self.raw, code = status.code(), "Failed to close registry key");
            }
        }
        self.raw = RawKey::NULL;
    }

    /// Gives the owned handle to the caller and leaves the key empty.
    pub fn detach(&mut self) -> RawKey {
        std::mem::replace(&mut self.raw, RawKey::NULL)
    }

    /// Closes the current handle and takes ownership of `raw`.
    ///
    /// Attaching the handle already owned does nothing; attaching
    /// [`RawKey::NULL`] just closes.
    pub fn attach(&mut self, raw: RawKey) {
        if raw == self.raw {
            return;
        }
        self.close();
        self.raw = raw;
    }

    /// Exchanges the handles (and backends) of two keys.
    pub fn swap_with(&mut self, other: &mut Self) {
        std::mem::swap(self, other);
    }

    // Create / open

    /// Creates or opens `sub_key` under `parent` with non-volatile storage.
    ///
    /// On success the previously owned handle is closed. On failure the key
    /// is left unchanged.
    pub fn create(&mut self, parent: RawKey, sub_key: &str, access: Access) -> Result<()> {
        self.create_with_options(parent, sub_key, access, CreateOptions::NON_VOLATILE)
            .map(|_| ())
    }

    /// Creates or opens `sub_key` under `parent`, reporting what happened.
    #[instrument(skip(self), level = "debug")]
    pub fn create_with_options(
        &mut self,
        parent: RawKey,
        sub_key: &str,
        access: Access,
        options: CreateOptions,
    ) -> Result<Disposition> {
        let (raw, disposition) = check(
            self.api.create_key(parent, sub_key, options, access),
            "Cannot create registry key: RegCreateKeyExW failed",
        )?;

        self.close();
        self.raw = raw;
        debug!(handle = %raw, ?disposition, "Registry key ready");
        Ok(disposition)
    }

    /// Status form of [`create`](Self::create).
    pub fn try_create(&mut self, parent: RawKey, sub_key: &str, access: Access) -> Status {
        status_of(self.create(parent, sub_key, access))
    }

    /// Status form of [`create_with_options`](Self::create_with_options).
    pub fn try_create_with_options(
        &mut self,
        parent: RawKey,
        sub_key: &str,
        access: Access,
        options: CreateOptions,
    ) -> Expected<Disposition> {
        self.create_with_options(parent, sub_key, access, options).into()
    }

    /// Opens an existing `sub_key` under `parent`.
    ///
    /// On success the previously owned handle is closed. On failure the key
    /// is left unchanged.
    #[instrument(skip(self), level = "debug")]
    pub fn open(&mut self, parent: RawKey, sub_key: &str, access: Access) -> Result<()> {
        let raw = check(
            self.api.open_key(parent, sub_key, access),
            "Cannot open registry key: RegOpenKeyExW failed",
        )?;

        self.close();
        self.raw = raw;
        Ok(())
    }

    /// Status form of [`open`](Self::open).
    pub fn try_open(&mut self, parent: RawKey, sub_key: &str, access: Access) -> Status {
        status_of(self.open(parent, sub_key, access))
    }

    // Writes

    fn write(&self, name: &str, value_type: u32, data: &[u8], context: &str) -> Result<()> {
        let key = self.handle();
        size_to_dword(data.len())?;
        self.api.set_value(key, name, value_type, data).into_result(context)
    }

    /// Writes a `REG_DWORD` value.
    pub fn set_dword_value(&self, name: &str, data: u32) -> Result<()> {
        let mut bytes = [0u8; 4];
        LittleEndian::write_u32(&mut bytes, data);
        self.write(
            name,
            ValueType::REG_DWORD,
            &bytes,
            "Cannot write DWORD value: RegSetValueExW failed",
        )
    }

    /// Writes a `REG_QWORD` value.
    pub fn set_qword_value(&self, name: &str, data: u64) -> Result<()> {
        let mut bytes = [0u8; 8];
        LittleEndian::write_u64(&mut bytes, data);
        self.write(
            name,
            ValueType::REG_QWORD,
            &bytes,
            "Cannot write QWORD value: RegSetValueExW failed",
        )
    }

    /// Writes a `REG_SZ` value.
    ///
    /// # Errors
    ///
    /// Returns `RegistryError::Overflow` if the encoded string does not fit a
    /// 32-bit length.
    pub fn set_string_value(&self, name: &str, data: &str) -> Result<()> {
        self.write(
            name,
            ValueType::REG_SZ,
            &string_to_bytes(data),
            "Cannot write string value: RegSetValueExW failed",
        )
    }

    /// Writes a `REG_EXPAND_SZ` value. `%VARIABLE%` references are stored as is.
    pub fn set_expand_string_value(&self, name: &str, data: &str) -> Result<()> {
        self.write(
            name,
            ValueType::REG_EXPAND_SZ,
            &string_to_bytes(data),
            "Cannot write expand string value: RegSetValueExW failed",
        )
    }

    /// Writes a `REG_MULTI_SZ` value.
    ///
    /// An empty slice is stored as the minimal multi-string, two nulls.
    pub fn set_multi_string_value<S: AsRef<str>>(&self, name: &str, data: &[S]) -> Result<()> {
        let bytes = wide_to_bytes(&build_multi_string(data));
        self.write(
            name,
            ValueType::REG_MULTI_SZ,
            &bytes,
            "Cannot write multi-string value: RegSetValueExW failed",
        )
    }

    /// Writes a `REG_BINARY` value.
    pub fn set_binary_value(&self, name: &str, data: &[u8]) -> Result<()> {
        self.write(
            name,
            ValueType::REG_BINARY,
            data,
            "Cannot write binary value: RegSetValueExW failed",
        )
    }

    /// Writes the first `len` bytes of `data` as a `REG_BINARY` value.
    ///
    /// The length is already native-sized, so no overflow check is made.
    ///
    /// # Panics
    ///
    /// Panics if `len` exceeds `data.len()`.
    pub fn set_binary_value_sized(&self, name: &str, data: &[u8], len: u32) -> Result<()> {
        let key = self.handle();
        let bytes = &data[..len as usize];
        self.api
            .set_value(key, name, ValueType::REG_BINARY, bytes)
            .into_result("Cannot write binary value: RegSetValueExW failed")
    }

    /// Writes a typed value.
    pub fn set_value(&self, name: &str, value: &ValueData) -> Result<()> {
        self.write(
            name,
            value.value_type(),
            &value.to_bytes(),
            "Cannot write value: RegSetValueExW failed",
        )
    }

    /// Status form of [`set_dword_value`](Self::set_dword_value).
    pub fn try_set_dword_value(&self, name: &str, data: u32) -> Status {
        status_of(self.set_dword_value(name, data))
    }

    /// Status form of [`set_qword_value`](Self::set_qword_value).
    pub fn try_set_qword_value(&self, name: &str, data: u64) -> Status {
        status_of(self.set_qword_value(name, data))
    }

    /// Status form of [`set_string_value`](Self::set_string_value).
    ///
    /// An oversized string yields `ERROR_ARITHMETIC_OVERFLOW`.
    pub fn try_set_string_value(&self, name: &str, data: &str) -> Status {
        status_of(self.set_string_value(name, data))
    }

    /// Status form of [`set_expand_string_value`](Self::set_expand_string_value).
    pub fn try_set_expand_string_value(&self, name: &str, data: &str) -> Status {
        status_of(self.set_expand_string_value(name, data))
    }

    /// Status form of [`set_multi_string_value`](Self::set_multi_string_value).
    pub fn try_set_multi_string_value<S: AsRef<str>>(&self, name: &str, data: &[S]) -> Status {
        status_of(self.set_multi_string_value(name, data))
    }

    /// Status form of [`set_binary_value`](Self::set_binary_value).
    pub fn try_set_binary_value(&self, name: &str, data: &[u8]) -> Status {
        status_of(self.set_binary_value(name, data))
    }

    /// Status form of [`set_binary_value_sized`](Self::set_binary_value_sized).
    pub fn try_set_binary_value_sized(&self, name: &str, data: &[u8], len: u32) -> Status {
        status_of(self.set_binary_value_sized(name, data, len))
    }

    // Reads

    /// Reads a fixed-size value straight into a stack buffer.
    ///
    /// Data of any other length is a type mismatch, never zero-padded.
    fn read_fixed<const N: usize>(
        &self,
        name: &str,
        flags: GetValueFlags,
        context: &str,
    ) -> Result<[u8; N]> {
        let key = self.handle();
        let mut buffer = [0u8; N];
        let mut size = N as u32;
        let mut value_type = 0;
        self.api
            .get_value(key, name, flags, Some(&mut buffer), &mut size, &mut value_type)
            .into_result(context)?;
        if size as usize != N {
            return Err(RegistryError::native(
                Status::new(codes::ERROR_DATATYPE_MISMATCH),
                context,
            ));
        }
        Ok(buffer)
    }

    /// Reads a variable-size value: asks for the size, then reads, growing the
    /// buffer while the store reports `ERROR_MORE_DATA`.
    ///
    /// Returns the bytes actually written and the type of the value.
    fn read_variable(
        &self,
        name: &str,
        flags: GetValueFlags,
        context: &str,
    ) -> Result<(Vec<u8>, u32)> {
        let key = self.handle();
        let mut size = 0u32;
        let mut value_type = 0u32;
        self.api
            .get_value(key, name, flags, None, &mut size, &mut value_type)
            .into_result(context)?;

        if size == 0 {
            return Ok((Vec::new(), value_type));
        }

        let mut buffer = vec![0u8; size as usize];
        for attempt in 1..=MAX_READ_ATTEMPTS {
            let status = self
                .api
                .get_value(key, name, flags, Some(&mut buffer), &mut size, &mut value_type);

            if status.code() != codes::ERROR_MORE_DATA {
                status.into_result(context)?;
                buffer.truncate(size as usize);
                return Ok((buffer, value_type));
            }

            debug!(name, attempt, size, "Value grew since the size query, retrying");
            buffer.resize(size as usize, 0);
        }

        warn!(name, attempts = MAX_READ_ATTEMPTS, "Value kept growing during read");
        Err(RegistryError::native(Status::new(codes::ERROR_MORE_DATA), context))
    }

    fn read_string(&self, name: &str, flags: GetValueFlags, context: &str) -> Result<String> {
        let (bytes, _) = self.read_variable(name, flags, context)?;
        let mut units = bytes_to_wide(&bytes)?;
        if units.last() == Some(&0) {
            units.pop();
        }
        wide_to_string(&units)
    }

    /// Reads a `REG_DWORD` value.
    pub fn get_dword_value(&self, name: &str) -> Result<u32> {
        let bytes = self.read_fixed::<4>(
            name,
            GetValueFlags::RT_REG_DWORD,
            "Cannot get DWORD value: RegGetValueW failed",
        )?;
        Ok(LittleEndian::read_u32(&bytes))
    }

    /// Reads a `REG_QWORD` value.
    pub fn get_qword_value(&self, name: &str) -> Result<u64> {
        let bytes = self.read_fixed::<8>(
            name,
            GetValueFlags::RT_REG_QWORD,
            "Cannot get QWORD value: RegGetValueW failed",
        )?;
        Ok(LittleEndian::read_u64(&bytes))
    }

    /// Reads a `REG_SZ` value, without its terminator.
    pub fn get_string_value(&self, name: &str) -> Result<String> {
        self.read_string(
            name,
            GetValueFlags::RT_REG_SZ,
            "Cannot get string value: RegGetValueW failed",
        )
    }

    /// Reads a `REG_EXPAND_SZ` value.
    ///
    /// With [`ExpandStringOption::Expand`] environment references are
    /// resolved by the store, and plain `REG_SZ` values are accepted too.
    pub fn get_expand_string_value(
        &self,
        name: &str,
        option: ExpandStringOption,
    ) -> Result<String> {
        let flags = match option {
            ExpandStringOption::DontExpand => {
                GetValueFlags::RT_REG_EXPAND_SZ | GetValueFlags::NOEXPAND
            }
            // The store rejects RT_REG_EXPAND_SZ without NOEXPAND; expanded
            // data is reported as REG_SZ.
            ExpandStringOption::Expand => GetValueFlags::RT_REG_SZ,
        };
        self.read_string(name, flags, "Cannot get expand string value: RegGetValueW failed")
    }

    /// Reads a `REG_MULTI_SZ` value.
    ///
    /// # Errors
    ///
    /// Returns `RegistryError::InvalidData` if the stored data is not double
    /// null terminated.
    pub fn get_multi_string_value(&self, name: &str) -> Result<Vec<String>> {
        let (bytes, _) = self.read_variable(
            name,
            GetValueFlags::RT_REG_MULTI_SZ,
            "Cannot get multi-string value: RegGetValueW failed",
        )?;
        parse_multi_string(&bytes_to_wide(&bytes)?)
    }

    /// Reads a `REG_BINARY` value. A zero-length value costs one native call.
    pub fn get_binary_value(&self, name: &str) -> Result<Vec<u8>> {
        let (bytes, _) = self.read_variable(
            name,
            GetValueFlags::RT_REG_BINARY,
            "Cannot get binary value: RegGetValueW failed",
        )?;
        Ok(bytes)
    }

    /// Reads a value of any type and decodes it.
    ///
    /// `REG_EXPAND_SZ` data is returned unexpanded.
    pub fn get_value(&self, name: &str) -> Result<ValueData> {
        let (bytes, value_type) = self.read_variable(
            name,
            GetValueFlags::RT_ANY | GetValueFlags::NOEXPAND,
            "Cannot get value: RegGetValueW failed",
        )?;
        ValueData::parse(&bytes, value_type)
    }

    /// Status form of [`get_dword_value`](Self::get_dword_value).
    pub fn try_get_dword_value(&self, name: &str) -> Expected<u32> {
        self.get_dword_value(name).into()
    }

    /// Status form of [`get_qword_value`](Self::get_qword_value).
    pub fn try_get_qword_value(&self, name: &str) -> Expected<u64> {
        self.get_qword_value(name).into()
    }

    /// Status form of [`get_string_value`](Self::get_string_value).
    pub fn try_get_string_value(&self, name: &str) -> Expected<String> {
        self.get_string_value(name).into()
    }

    /// Status form of [`get_expand_string_value`](Self::get_expand_string_value).
    pub fn try_get_expand_string_value(
        &self,
        name: &str,
        option: ExpandStringOption,
    ) -> Expected<String> {
        self.get_expand_string_value(name, option).into()
    }

    /// Status form of [`get_multi_string_value`](Self::get_multi_string_value).
    ///
    /// Malformed data yields `ERROR_INVALID_DATA`.
    pub fn try_get_multi_string_value(&self, name: &str) -> Expected<Vec<String>> {
        self.get_multi_string_value(name).into()
    }

    /// Status form of [`get_binary_value`](Self::get_binary_value).
    pub fn try_get_binary_value(&self, name: &str) -> Expected<Vec<u8>> {
        self.get_binary_value(name).into()
    }

    /// Status form of [`get_value`](Self::get_value).
    pub fn try_get_value(&self, name: &str) -> Expected<ValueData> {
        self.get_value(name).into()
    }

    // Queries

    /// Returns the native type code of a value.
    pub fn query_value_type(&self, name: &str) -> Result<u32> {
        let (value_type, _) = check(
            self.api.query_value(self.handle(), name),
            "Cannot get the value type: RegQueryValueExW failed",
        )?;
        Ok(value_type)
    }

    /// Returns the sub-key count, value count and last write time.
    pub fn query_info_key(&self) -> Result<KeyInfo> {
        let info = check(
            self.api.query_info_key(self.handle()),
            "Cannot query key info: RegQueryInfoKeyW failed",
        )?;
        Ok(KeyInfo {
            sub_keys: info.sub_keys,
            values: info.values,
            last_write_time: info.last_write_time,
        })
    }

    /// Returns whether reflection is enabled for this key.
    pub fn query_reflection_key(&self) -> Result<KeyReflection> {
        let disabled = check(
            self.api.query_reflection_key(self.raw),
            "Cannot query key reflection: RegQueryReflectionKey failed",
        )?;
        Ok(if disabled {
            KeyReflection::ReflectionDisabled
        } else {
            KeyReflection::ReflectionEnabled
        })
    }

    /// Status form of [`query_value_type`](Self::query_value_type).
    pub fn try_query_value_type(&self, name: &str) -> Expected<u32> {
        self.query_value_type(name).into()
    }

    /// Status form of [`query_info_key`](Self::query_info_key).
    pub fn try_query_info_key(&self) -> Expected<KeyInfo> {
        self.query_info_key().into()
    }

    /// Status form of [`query_reflection_key`](Self::query_reflection_key).
    pub fn try_query_reflection_key(&self) -> Expected<KeyReflection> {
        self.query_reflection_key().into()
    }

    // Enumeration

    /// Lists the names of the immediate sub-keys.
    ///
    /// Any failure aborts the enumeration; no partial list is returned.
    #[instrument(skip(self), fields(handle = %self.raw), level = "debug")]
    pub fn enum_sub_keys(&self) -> Result<Vec<String>> {
        const CONTEXT: &str = "Cannot enumerate sub-keys: RegEnumKeyExW failed";
        let key = self.handle();
        let info = check(
            self.api.query_info_key(key),
            "Cannot enumerate sub-keys: RegQueryInfoKeyW failed",
        )?;

        // Reported lengths exclude the terminator.
        let capacity = info.max_sub_key_len as usize + 1;
        let mut buffer = vec![0u16; capacity];
        let mut names = Vec::with_capacity(info.sub_keys as usize);

        for index in 0..info.sub_keys {
            let mut len = size_to_dword(capacity)?;
            self.api
                .enum_key(key, index, &mut buffer, &mut len)
                .into_result(CONTEXT)?;
            names.push(wide_to_string(&buffer[..len as usize])?);
        }

        debug!(count = names.len(), "Enumerated sub-keys");
        Ok(names)
    }

    /// Lists the names and native types of the values.
    ///
    /// Any failure aborts the enumeration; no partial list is returned.
    #[instrument(skip(self), fields(handle = %self.raw), level = "debug")]
    pub fn enum_values(&self) -> Result<Vec<(String, u32)>> {
        const CONTEXT: &str = "Cannot enumerate values: RegEnumValueW failed";
        let key = self.handle();
        let info = check(
            self.api.query_info_key(key),
            "Cannot enumerate values: RegQueryInfoKeyW failed",
        )?;

        let capacity = info.max_value_name_len as usize + 1;
        let mut buffer = vec![0u16; capacity];
        let mut values = Vec::with_capacity(info.values as usize);

        for index in 0..info.values {
            let mut len = size_to_dword(capacity)?;
            let mut value_type = 0u32;
            self.api
                .enum_value(key, index, &mut buffer, &mut len, &mut value_type)
                .into_result(CONTEXT)?;
            values.push((wide_to_string(&buffer[..len as usize])?, value_type));
        }

        debug!(count = values.len(), "Enumerated values");
        Ok(values)
    }

    /// Status form of [`enum_sub_keys`](Self::enum_sub_keys).
    pub fn try_enum_sub_keys(&self) -> Expected<Vec<String>> {
        self.enum_sub_keys().into()
    }

    /// Status form of [`enum_values`](Self::enum_values).
    pub fn try_enum_values(&self) -> Expected<Vec<(String, u32)>> {
        self.enum_values().into()
    }

    // Existence

    /// Returns true if the key holds a value called `name`.
    ///
    /// A missing value is `Ok(false)`; every other failure is an error.
    pub fn has_value(&self, name: &str) -> Result<bool> {
        let mut size = 0u32;
        let mut value_type = 0u32;
        let status = self.api.get_value(
            self.handle(),
            name,
            GetValueFlags::RT_ANY | GetValueFlags::NOEXPAND,
            None,
            &mut size,
            &mut value_type,
        );

        match status.code() {
            codes::ERROR_SUCCESS => Ok(true),
            codes::ERROR_FILE_NOT_FOUND => Ok(false),
            _ => Err(RegistryError::native(
                status,
                "Cannot check value existence: RegGetValueW failed",
            )),
        }
    }

    /// Returns true if `sub_key` exists under this key.
    ///
    /// A missing key or path is `Ok(false)`; every other failure, including
    /// access denied, is an error.
    pub fn has_sub_key(&self, sub_key: &str) -> Result<bool> {
        match self.api.open_key(self.handle(), sub_key, Access::READ) {
            Ok(raw) => {
                let status = self.api.close_key(raw);
                if status.failed() {
                    warn!(sub_key, code = status.code(), "Failed to close sub-key handle");
                }
                Ok(true)
            }
            Err(status) if status.is_not_found() => Ok(false),
            Err(status) => Err(RegistryError::native(
                status,
                "Cannot check sub-key existence: RegOpenKeyExW failed",
            )),
        }
    }

    /// Status form of [`has_value`](Self::has_value).
    pub fn try_has_value(&self, name: &str) -> Expected<bool> {
        self.has_value(name).into()
    }

    /// Status form of [`has_sub_key`](Self::has_sub_key).
    pub fn try_has_sub_key(&self, sub_key: &str) -> Expected<bool> {
        self.has_sub_key(sub_key).into()
    }

    // Tree and housekeeping

    /// Deletes a value.
    pub fn delete_value(&self, name: &str) -> Result<()> {
        self.api
            .delete_value(self.handle(), name)
            .into_result("Cannot delete value: RegDeleteValueW failed")
    }

    /// Deletes an empty sub-key in the view selected by `access`
    /// (`Access::WOW64_64KEY` or `Access::WOW64_32KEY`).
    pub fn delete_key(&self, sub_key: &str, access: Access) -> Result<()> {
        self.api
            .delete_key(self.handle(), sub_key, access)
            .into_result("Cannot delete key: RegDeleteKeyExW failed")
    }

    /// Deletes `sub_key` and everything below it. An empty `sub_key` clears
    /// this key's values and sub-keys but keeps the key.
    #[instrument(skip(self), fields(handle = %self.raw), level = "debug")]
    pub fn delete_tree(&self, sub_key: &str) -> Result<()> {
        self.api
            .delete_tree(self.handle(), sub_key)
            .into_result("Cannot delete tree: RegDeleteTreeW failed")
    }

    /// Copies `sub_key` of this key, with everything below it, into `dest`.
    pub fn copy_tree(&self, sub_key: &str, dest: &RegKey<A>) -> Result<()> {
        self.api
            .copy_tree(self.handle(), sub_key, dest.handle())
            .into_result("Cannot copy tree: RegCopyTreeW failed")
    }

    /// Writes pending changes of this key to its backing store.
    pub fn flush_key(&self) -> Result<()> {
        self.api
            .flush_key(self.handle())
            .into_result("Cannot flush key: RegFlushKey failed")
    }

    /// Mounts the hive in `file` as `sub_key` of this key.
    ///
    /// This key is normally `HKEY_USERS` or `HKEY_LOCAL_MACHINE`.
    #[instrument(skip(self), fields(handle = %self.raw), level = "debug")]
    pub fn load_key(&self, sub_key: &str, file: &Path) -> Result<()> {
        self.api
            .load_key(self.raw, sub_key, file)
            .into_result("Cannot load key: RegLoadKeyW failed")
    }

    /// Saves this key and its sub-tree to a new hive file.
    #[instrument(skip(self), fields(handle = %self.raw), level = "debug")]
    pub fn save_key(&self, file: &Path) -> Result<()> {
        self.api
            .save_key(self.handle(), file)
            .into_result("Cannot save key: RegSaveKeyW failed")
    }

    /// Turns reflection back on for this key.
    pub fn enable_reflection_key(&self) -> Result<()> {
        self.api
            .enable_reflection_key(self.raw)
            .into_result("Cannot enable key reflection: RegEnableReflectionKey failed")
    }

    /// Turns reflection off for this key.
    pub fn disable_reflection_key(&self) -> Result<()> {
        self.api
            .disable_reflection_key(self.raw)
            .into_result("Cannot disable key reflection: RegDisableReflectionKey failed")
    }

    /// Closes the current handle and takes ownership of `predefined` on
    /// `machine_name` (`\\name`, or empty for this machine).
    ///
    /// The current handle is closed even if the connection then fails.
    #[instrument(skip(self), level = "debug")]
    pub fn connect_registry(&mut self, machine_name: &str, predefined: RawKey) -> Result<()> {
        self.close();
        self.raw = check(
            self.api.connect_registry(machine_name, predefined),
            "Cannot connect to registry: RegConnectRegistryW failed",
        )?;
        Ok(())
    }

    /// Status form of [`delete_value`](Self::delete_value).
    pub fn try_delete_value(&self, name: &str) -> Status {
        status_of(self.delete_value(name))
    }

    /// Status form of [`delete_key`](Self::delete_key).
    pub fn try_delete_key(&self, sub_key: &str, access: Access) -> Status {
        status_of(self.delete_key(sub_key, access))
    }

    /// Status form of [`delete_tree`](Self::delete_tree).
    pub fn try_delete_tree(&self, sub_key: &str) -> Status {
        status_of(self.delete_tree(sub_key))
    }

    /// Status form of [`copy_tree`](Self::copy_tree).
    pub fn try_copy_tree(&self, sub_key: &str, dest: &RegKey<A>) -> Status {
        status_of(self.copy_tree(sub_key, dest))
    }

    /// Status form of [`flush_key`](Self::flush_key).
    pub fn try_flush_key(&self) -> Status {
        status_of(self.flush_key())
    }

    /// Status form of [`load_key`](Self::load_key).
    pub fn try_load_key(&self, sub_key: &str, file: &Path) -> Status {
        status_of(self.load_key(sub_key, file))
    }

    /// Status form of [`save_key`](Self::save_key).
    pub fn try_save_key(&self, file: &Path) -> Status {
        status_of(self.save_key(file))
    }

    /// Status form of [`enable_reflection_key`](Self::enable_reflection_key).
    pub fn try_enable_reflection_key(&self) -> Status {
        status_of(self.enable_reflection_key())
    }

    /// Status form of [`disable_reflection_key`](Self::disable_reflection_key).
    pub fn try_disable_reflection_key(&self) -> Status {
        status_of(self.disable_reflection_key())
    }

    /// Status form of [`connect_registry`](Self::connect_registry).
    pub fn try_connect_registry(&mut self, machine_name: &str, predefined: RawKey) -> Status {
        status_of(self.connect_registry(machine_name, predefined))
    }
}

impl<A: RegistryApi + Clone> RegKey<A> {
    /// Moves the handle out into a new key, leaving this one empty.
    pub fn take(&mut self) -> Self {
        let raw = self.detach();
        Self::from_raw(self.api.clone(), raw)
    }
}

impl<A: RegistryApi + Default> Default for RegKey<A> {
    fn default() -> Self {
        Self::new(A::default())
    }
}

impl<A: RegistryApi> Drop for RegKey<A> {
    fn drop(&mut self) {
        self.close();
    }
}

impl<A: RegistryApi> fmt::Debug for RegKey<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegKey").field("raw", &self.raw).finish()
    }
}

/// Keys compare by handle.
impl<A: RegistryApi> PartialEq for RegKey<A> {
    fn eq(&self, other: &Self) -> bool {
        self.raw == other.raw
    }
}

impl<A: RegistryApi> Eq for RegKey<A> {}

impl<A: RegistryApi> PartialOrd for RegKey<A> {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl<A: RegistryApi> Ord for RegKey<A> {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.raw.cmp(&other.raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::MemoryRegistry;

    fn test_key(registry: &MemoryRegistry) -> RegKey<MemoryRegistry> {
        RegKey::create_key(
            registry.clone(),
            RawKey::CURRENT_USER,
            r"Software\dplnk-unit",
            Access::DEFAULT,
        )
        .unwrap()
    }

    #[test]
    fn test_new_key_is_empty() {
        let key = RegKey::new(MemoryRegistry::new());
        assert!(!key.is_valid());
        assert!(!key.is_predefined());
        assert_eq!(key.raw(), RawKey::NULL);
    }

    #[test]
    fn test_failed_open_leaves_key_unchanged() {
        let registry = MemoryRegistry::new();
        let mut key = test_key(&registry);
        let before = key.raw();

        let status = key.try_open(RawKey::CURRENT_USER, r"Software\Missing", Access::READ);
        assert_eq!(status.code(), codes::ERROR_FILE_NOT_FOUND);
        assert_eq!(key.raw(), before);
    }

    #[test]
    fn test_reopen_closes_previous_handle() {
        let registry = MemoryRegistry::new();
        let mut key = test_key(&registry);
        assert_eq!(registry.open_handles(), 1);

        key.open(RawKey::CURRENT_USER, "Software", Access::READ).unwrap();
        assert_eq!(registry.open_handles(), 1);
        drop(key);
        assert_eq!(registry.open_handles(), 0);
    }

    #[test]
    fn test_dword_and_qword() {
        let registry = MemoryRegistry::new();
        let key = test_key(&registry);
        key.set_dword_value("d", 0xDEAD_BEEF).unwrap();
        key.set_qword_value("q", u64::MAX - 1).unwrap();

        assert_eq!(key.get_dword_value("d").unwrap(), 0xDEAD_BEEF);
        assert_eq!(key.get_qword_value("q").unwrap(), u64::MAX - 1);
        assert_eq!(key.query_value_type("q").unwrap(), ValueType::REG_QWORD);
    }

    #[test]
    fn test_wrong_type_is_native_error() {
        let registry = MemoryRegistry::new();
        let key = test_key(&registry);
        key.set_string_value("s", "text").unwrap();

        let expected = key.try_get_dword_value("s");
        assert_eq!(expected.error().code(), codes::ERROR_UNSUPPORTED_TYPE);
    }

    #[test]
    fn test_expand_option() {
        let registry = MemoryRegistry::new();
        registry.set_environment_variable("DPLNK_ROOT", r"D:\tools");
        let key = test_key(&registry);
        key.set_expand_string_value("path", r"%DPLNK_ROOT%\bin").unwrap();

        assert_eq!(
            key.get_expand_string_value("path", ExpandStringOption::DontExpand).unwrap(),
            r"%DPLNK_ROOT%\bin"
        );
        assert_eq!(
            key.get_expand_string_value("path", ExpandStringOption::Expand).unwrap(),
            r"D:\tools\bin"
        );
    }

    #[test]
    fn test_typed_value() {
        let registry = MemoryRegistry::new();
        let key = test_key(&registry);
        let value = ValueData::ExpandString("%TEMP%".to_string());
        key.set_value("t", &value).unwrap();
        assert_eq!(key.get_value("t").unwrap(), value);
        assert!(key.try_get_value("missing").error().is_not_found());
    }

    #[test]
    fn test_sized_binary_write() {
        let registry = MemoryRegistry::new();
        let key = test_key(&registry);
        key.set_binary_value_sized("b", &[1, 2, 3, 4], 2).unwrap();
        assert_eq!(key.get_binary_value("b").unwrap(), vec![1, 2]);
    }

    #[test]
    #[should_panic(expected = "empty key")]
    fn test_write_on_empty_key_panics() {
        let key = RegKey::new(MemoryRegistry::new());
        let _ = key.set_dword_value("x", 1);
    }

    #[test]
    fn test_reflection_state() {
        let registry = MemoryRegistry::new();
        let key = test_key(&registry);
        assert_eq!(key.query_reflection_key().unwrap(), KeyReflection::ReflectionEnabled);
        key.disable_reflection_key().unwrap();
        assert_eq!(key.query_reflection_key().unwrap(), KeyReflection::ReflectionDisabled);
        assert!(key.try_enable_reflection_key().is_ok());
        assert_eq!(key.query_reflection_key().unwrap(), KeyReflection::ReflectionEnabled);
    }

    #[test]
    fn test_query_info_key() {
        let registry = MemoryRegistry::new();
        let key = test_key(&registry);
        key.set_dword_value("a", 1).unwrap();
        key.set_dword_value("b", 2).unwrap();
        RegKey::create_key(registry.clone(), key.raw(), "child", Access::DEFAULT).unwrap();

        let info = key.query_info_key().unwrap();
        assert_eq!(info.sub_keys, 1);
        assert_eq!(info.values, 2);
        assert!(info.last_written().is_some());
    }

    #[test]
    fn test_keys_compare_by_handle() {
        let registry = MemoryRegistry::new();
        let first = test_key(&registry);
        let second = test_key(&registry);
        assert_ne!(first, second);
        assert!(first < second);

        let empty = RegKey::new(registry.clone());
        assert_eq!(empty, RegKey::new(registry.clone()));
        assert!(empty < first);

        let root = RegKey::from_raw(registry.clone(), RawKey::CURRENT_USER);
        assert_eq!(root, RegKey::from_raw(registry, RawKey::CURRENT_USER));
    }
}

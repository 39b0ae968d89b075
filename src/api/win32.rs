//! The real Windows registry, through `windows-sys`.

use crate::api::{RawKey, RawKeyInfo, RegistryApi};
use crate::status::Status;
use crate::types::{Access, CreateOptions, Disposition, GetValueFlags};
use crate::utils::to_wide;
use std::os::windows::ffi::OsStrExt;
use std::path::Path;
use std::ptr;
use windows_sys::Win32::Foundation::{LocalFree, FILETIME};
use windows_sys::Win32::System::Diagnostics::Debug::{
    FormatMessageW, FORMAT_MESSAGE_ALLOCATE_BUFFER, FORMAT_MESSAGE_FROM_SYSTEM,
    FORMAT_MESSAGE_IGNORE_INSERTS,
};
use windows_sys::Win32::System::Registry::{
    RegCloseKey, RegConnectRegistryW, RegCopyTreeW, RegCreateKeyExW, RegDeleteKeyExW,
    RegDeleteTreeW, RegDeleteValueW, RegDisableReflectionKey, RegEnableReflectionKey,
    RegEnumKeyExW, RegEnumValueW, RegFlushKey, RegGetValueW, RegLoadKeyW, RegOpenKeyExW,
    RegQueryInfoKeyW, RegQueryReflectionKey, RegQueryValueExW, RegSaveKeyW, RegSetValueExW, HKEY,
};

/// The system registry of this machine (or, through `connect_registry`, of
/// another one).
#[derive(Debug, Clone, Copy, Default)]
pub struct Win32Registry;

fn hkey(key: RawKey) -> HKEY {
    key.0 as HKEY
}

fn status(code: impl Into<i64>) -> Status {
    Status::new(code.into() as i32)
}

fn wide_path(path: &Path) -> Vec<u16> {
    path.as_os_str()
        .encode_wide()
        .chain(std::iter::once(0))
        .collect()
}

fn filetime_to_u64(filetime: FILETIME) -> u64 {
    (u64::from(filetime.dwHighDateTime) << 32) | u64::from(filetime.dwLowDateTime)
}

impl RegistryApi for Win32Registry {
    fn create_key(
        &self,
        parent: RawKey,
        sub_key: &str,
        options: CreateOptions,
        access: Access,
    ) -> Result<(RawKey, Disposition), Status> {
        let sub_key = to_wide(sub_key);
        let mut handle: HKEY = ptr::null_mut();
        let mut disposition = 0u32;

        let code = unsafe {
            RegCreateKeyExW(
                hkey(parent),
                sub_key.as_ptr(),
                0,
                ptr::null(),
                options.0,
                access.0,
                ptr::null(),
                &mut handle,
                &mut disposition,
            )
        };

        let result = status(code);
        if result.failed() {
            return Err(result);
        }
        Ok((RawKey(handle as isize), Disposition::from_u32(disposition)))
    }

    fn open_key(&self, parent: RawKey, sub_key: &str, access: Access) -> Result<RawKey, Status> {
        let sub_key = to_wide(sub_key);
        let mut handle: HKEY = ptr::null_mut();

        let code =
            unsafe { RegOpenKeyExW(hkey(parent), sub_key.as_ptr(), 0, access.0, &mut handle) };

        let result = status(code);
        if result.failed() {
            return Err(result);
        }
        Ok(RawKey(handle as isize))
    }

    fn close_key(&self, key: RawKey) -> Status {
        status(unsafe { RegCloseKey(hkey(key)) })
    }

    fn set_value(&self, key: RawKey, name: &str, value_type: u32, data: &[u8]) -> Status {
        let Ok(len) = u32::try_from(data.len()) else {
            return Status::new(crate::status::codes::ERROR_ARITHMETIC_OVERFLOW);
        };
        let name = to_wide(name);

        status(unsafe {
            RegSetValueExW(hkey(key), name.as_ptr(), 0, value_type, data.as_ptr(), len)
        })
    }

    fn get_value(
        &self,
        key: RawKey,
        name: &str,
        flags: GetValueFlags,
        data: Option<&mut [u8]>,
        size: &mut u32,
        value_type: &mut u32,
    ) -> Status {
        let name = to_wide(name);
        let buffer = match data {
            Some(buffer) => {
                *size = u32::try_from(buffer.len()).unwrap_or(u32::MAX);
                buffer.as_mut_ptr().cast()
            }
            None => ptr::null_mut(),
        };

        status(unsafe {
            RegGetValueW(
                hkey(key),
                ptr::null(),
                name.as_ptr(),
                flags.0,
                value_type,
                buffer,
                size,
            )
        })
    }

    fn query_value(&self, key: RawKey, name: &str) -> Result<(u32, u32), Status> {
        let name = to_wide(name);
        let mut value_type = 0u32;
        let mut size = 0u32;

        let code = unsafe {
            RegQueryValueExW(
                hkey(key),
                name.as_ptr(),
                ptr::null(),
                &mut value_type,
                ptr::null_mut(),
                &mut size,
            )
        };

        let result = status(code);
        if result.failed() {
            return Err(result);
        }
        Ok((value_type, size))
    }

    fn query_info_key(&self, key: RawKey) -> Result<RawKeyInfo, Status> {
        let mut info = RawKeyInfo::default();
        let mut last_write = FILETIME {
            dwLowDateTime: 0,
            dwHighDateTime: 0,
        };

        let code = unsafe {
            RegQueryInfoKeyW(
                hkey(key),
                ptr::null_mut(),
                ptr::null_mut(),
                ptr::null(),
                &mut info.sub_keys,
                &mut info.max_sub_key_len,
                ptr::null_mut(),
                &mut info.values,
                &mut info.max_value_name_len,
                &mut info.max_value_len,
                ptr::null_mut(),
                &mut last_write,
            )
        };

        let result = status(code);
        if result.failed() {
            return Err(result);
        }
        info.last_write_time = filetime_to_u64(last_write);
        Ok(info)
    }

    fn enum_key(&self, key: RawKey, index: u32, name: &mut [u16], name_len: &mut u32) -> Status {
        *name_len = (*name_len).min(u32::try_from(name.len()).unwrap_or(u32::MAX));

        status(unsafe {
            RegEnumKeyExW(
                hkey(key),
                index,
                name.as_mut_ptr(),
                name_len,
                ptr::null(),
                ptr::null_mut(),
                ptr::null_mut(),
                ptr::null_mut(),
            )
        })
    }

    fn enum_value(
        &self,
        key: RawKey,
        index: u32,
        name: &mut [u16],
        name_len: &mut u32,
        value_type: &mut u32,
    ) -> Status {
        *name_len = (*name_len).min(u32::try_from(name.len()).unwrap_or(u32::MAX));

        status(unsafe {
            RegEnumValueW(
                hkey(key),
                index,
                name.as_mut_ptr(),
                name_len,
                ptr::null(),
                value_type,
                ptr::null_mut(),
                ptr::null_mut(),
            )
        })
    }

    fn delete_value(&self, key: RawKey, name: &str) -> Status {
        let name = to_wide(name);
        status(unsafe { RegDeleteValueW(hkey(key), name.as_ptr()) })
    }

    fn delete_key(&self, key: RawKey, sub_key: &str, access: Access) -> Status {
        let sub_key = to_wide(sub_key);
        status(unsafe { RegDeleteKeyExW(hkey(key), sub_key.as_ptr(), access.0, 0) })
    }

    fn delete_tree(&self, key: RawKey, sub_key: &str) -> Status {
        // A null sub-key clears the key itself.
        if sub_key.is_empty() {
            return status(unsafe { RegDeleteTreeW(hkey(key), ptr::null()) });
        }
        let sub_key = to_wide(sub_key);
        status(unsafe { RegDeleteTreeW(hkey(key), sub_key.as_ptr()) })
    }

    fn copy_tree(&self, src: RawKey, sub_key: &str, dest: RawKey) -> Status {
        let sub_key = to_wide(sub_key);
        status(unsafe { RegCopyTreeW(hkey(src), sub_key.as_ptr(), hkey(dest)) })
    }

    fn flush_key(&self, key: RawKey) -> Status {
        status(unsafe { RegFlushKey(hkey(key)) })
    }

    fn load_key(&self, key: RawKey, sub_key: &str, file: &Path) -> Status {
        let sub_key = to_wide(sub_key);
        let file = wide_path(file);
        status(unsafe { RegLoadKeyW(hkey(key), sub_key.as_ptr(), file.as_ptr()) })
    }

    fn save_key(&self, key: RawKey, file: &Path) -> Status {
        let file = wide_path(file);
        status(unsafe { RegSaveKeyW(hkey(key), file.as_ptr(), ptr::null()) })
    }

    fn enable_reflection_key(&self, key: RawKey) -> Status {
        status(unsafe { RegEnableReflectionKey(hkey(key)) })
    }

    fn disable_reflection_key(&self, key: RawKey) -> Status {
        status(unsafe { RegDisableReflectionKey(hkey(key)) })
    }

    fn query_reflection_key(&self, key: RawKey) -> Result<bool, Status> {
        let mut disabled = 0;
        let result = status(unsafe { RegQueryReflectionKey(hkey(key), &mut disabled) });
        if result.failed() {
            return Err(result);
        }
        Ok(disabled != 0)
    }

    fn connect_registry(&self, machine_name: &str, predefined: RawKey) -> Result<RawKey, Status> {
        let machine = to_wide(machine_name);
        let mut handle: HKEY = ptr::null_mut();

        let code = unsafe { RegConnectRegistryW(machine.as_ptr(), hkey(predefined), &mut handle) };

        let result = status(code);
        if result.failed() {
            return Err(result);
        }
        Ok(RawKey(handle as isize))
    }
}

/// Looks up the system message for a Win32 error code.
pub(crate) fn format_message(code: i32, language_id: u32) -> Option<String> {
    let mut buffer: *mut u16 = ptr::null_mut();

    // With ALLOCATE_BUFFER the buffer argument receives a pointer to the
    // allocated text.
    let len = unsafe {
        FormatMessageW(
            FORMAT_MESSAGE_ALLOCATE_BUFFER
                | FORMAT_MESSAGE_FROM_SYSTEM
                | FORMAT_MESSAGE_IGNORE_INSERTS,
            ptr::null(),
            code as u32,
            language_id,
            (&mut buffer as *mut *mut u16).cast(),
            0,
            ptr::null(),
        )
    };

    if len == 0 || buffer.is_null() {
        return None;
    }

    let message = {
        let units = unsafe { std::slice::from_raw_parts(buffer, len as usize) };
        String::from_utf16_lossy(units)
    };
    unsafe {
        LocalFree(buffer.cast());
    }

    Some(message.trim_end().to_string())
}

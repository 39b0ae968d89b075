//! Wide-string, multi-string, size, and timestamp conversions.
//!
//! The native API speaks UTF-16LE byte buffers with `u32` lengths; everything
//! here converts between that representation and Rust strings and sizes.

use crate::error::{RegistryError, Result};
use byteorder::{ByteOrder, LittleEndian};
use encoding_rs::UTF_16LE;

/// Size in bytes of one UTF-16 code unit.
pub const WCHAR_SIZE: usize = 2;

/// FILETIME epoch (1601-01-01) to Unix epoch, in seconds.
const FILETIME_UNIX_DIFF: i64 = 11_644_473_600;

/// Encodes a string as null-terminated UTF-16, for native name parameters.
pub fn to_wide(s: &str) -> Vec<u16> {
    s.encode_utf16().chain(std::iter::once(0)).collect()
}

/// Serializes UTF-16 code units to little-endian bytes.
pub fn wide_to_bytes(units: &[u16]) -> Vec<u8> {
    let mut bytes = vec![0u8; units.len() * WCHAR_SIZE];
    LittleEndian::write_u16_into(units, &mut bytes);
    bytes
}

/// Reads little-endian bytes back into UTF-16 code units.
///
/// # Errors
///
/// Returns `RegistryError::InvalidData` if the byte count is odd.
pub fn bytes_to_wide(bytes: &[u8]) -> Result<Vec<u16>> {
    if bytes.len() % WCHAR_SIZE != 0 {
        return Err(RegistryError::invalid_data(format!(
            "UTF-16 data has odd length {}",
            bytes.len()
        )));
    }

    let mut units = vec![0u16; bytes.len() / WCHAR_SIZE];
    LittleEndian::read_u16_into(bytes, &mut units);
    Ok(units)
}

/// Encodes a string as null-terminated UTF-16LE bytes (`REG_SZ` layout).
pub fn string_to_bytes(s: &str) -> Vec<u8> {
    wide_to_bytes(&to_wide(s))
}

/// Decodes UTF-16LE bytes into a string.
///
/// Unlike hive parsing, no null terminators are trimmed here: the caller
/// strips exactly the one terminator the store appends.
///
/// # Errors
///
/// Returns `RegistryError::InvalidData` for odd lengths and unpaired
/// surrogates.
pub fn read_utf16_string(data: &[u8]) -> Result<String> {
    if data.is_empty() {
        return Ok(String::new());
    }

    if data.len() % WCHAR_SIZE != 0 {
        return Err(RegistryError::invalid_data(format!(
            "UTF-16 data has odd length {}",
            data.len()
        )));
    }

    UTF_16LE
        .decode_without_bom_handling_and_without_replacement(data)
        .map(|decoded| decoded.into_owned())
        .ok_or_else(|| RegistryError::invalid_data("malformed UTF-16 string"))
}

/// Decodes UTF-16 code units into a string.
pub fn wide_to_string(units: &[u16]) -> Result<String> {
    String::from_utf16(units).map_err(|_| RegistryError::invalid_data("malformed UTF-16 string"))
}

/// Builds a double-null-terminated multi-string.
///
/// Each string is followed by a null terminator, and one more null ends the
/// sequence:
///
/// ```text
/// Hello\0World\0\0
/// ```
///
/// An empty sequence becomes exactly two nulls, the minimal valid multi-string.
pub fn build_multi_string<S: AsRef<str>>(data: &[S]) -> Vec<u16> {
    if data.is_empty() {
        return vec![0, 0];
    }

    let total: usize = data
        .iter()
        .map(|s| s.as_ref().encode_utf16().count() + 1)
        .sum::<usize>()
        + 1;

    let mut multi_string = Vec::with_capacity(total);
    for s in data {
        multi_string.extend(s.as_ref().encode_utf16());
        multi_string.push(0);
    }
    multi_string.push(0);

    multi_string
}

/// Returns true if the sequence ends with two null code units.
pub fn is_double_null_terminated(data: &[u16]) -> bool {
    match data {
        [.., a, b] => *a == 0 && *b == 0,
        _ => false,
    }
}

/// Parses a double-null-terminated multi-string.
///
/// Empty segments between terminators are kept as empty strings. The minimal
/// buffer `\0\0` parses to an empty sequence.
///
/// # Errors
///
/// Returns `RegistryError::InvalidData` if the buffer does not end in two
/// nulls or a segment is not valid UTF-16.
pub fn parse_multi_string(data: &[u16]) -> Result<Vec<String>> {
    if !is_double_null_terminated(data) {
        return Err(RegistryError::invalid_data(
            "multi-string is not double-null terminated",
        ));
    }

    if data.len() == 2 {
        return Ok(Vec::new());
    }

    // The final null closes the sequence, every earlier one closes a segment.
    let body = &data[..data.len() - 1];
    let mut result = Vec::new();
    let mut start = 0;
    while start < body.len() {
        let len = body[start..]
            .iter()
            .position(|&unit| unit == 0)
            .unwrap_or(body.len() - start);
        result.push(wide_to_string(&body[start..start + len])?);
        start += len + 1;
    }

    Ok(result)
}

/// Narrows a host size to the native 32-bit length type.
///
/// # Errors
///
/// Returns `RegistryError::Overflow` instead of truncating.
pub fn size_to_dword(size: usize) -> Result<u32> {
    u32::try_from(size).map_err(|_| RegistryError::Overflow { size })
}

/// Converts a Windows FILETIME to a UTC timestamp.
pub fn filetime_to_datetime(filetime: u64) -> Option<chrono::DateTime<chrono::Utc>> {
    let seconds = (filetime / 10_000_000) as i64 - FILETIME_UNIX_DIFF;
    let nanos = ((filetime % 10_000_000) * 100) as u32;

    chrono::DateTime::from_timestamp(seconds, nanos)
}

/// Converts a UTC timestamp to a Windows FILETIME.
pub fn datetime_to_filetime(datetime: chrono::DateTime<chrono::Utc>) -> u64 {
    let seconds = datetime.timestamp() + FILETIME_UNIX_DIFF;
    if seconds < 0 {
        return 0;
    }
    seconds as u64 * 10_000_000 + u64::from(datetime.timestamp_subsec_nanos() / 100)
}

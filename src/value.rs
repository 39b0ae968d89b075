//! Typed registry value data.

use crate::error::{RegistryError, Result};
use crate::types::ValueType;
use crate::utils::{
    build_multi_string, bytes_to_wide, parse_multi_string, read_utf16_string, string_to_bytes,
    wide_to_bytes,
};
use byteorder::{BigEndian, ByteOrder, LittleEndian};
use std::fmt;

/// A decoded registry value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValueData {
    /// Untyped data, kept as raw bytes.
    None(Vec<u8>),

    /// String value.
    String(String),

    /// Expandable string value.
    ExpandString(String),

    /// Binary data.
    Binary(Vec<u8>),

    /// 32-bit integer.
    Dword(u32),

    /// 32-bit big-endian integer.
    DwordBigEndian(u32),

    /// Multiple strings.
    MultiString(Vec<String>),

    /// 64-bit integer.
    Qword(u64),

    /// Any other type, kept as raw bytes.
    Unknown {
        /// Native type code.
        value_type: u32,
        /// Raw data.
        data: Vec<u8>,
    },
}

impl ValueData {
    /// Decodes raw value bytes according to the native type.
    ///
    /// # Arguments
    ///
    /// * `data` - Raw value bytes as returned by the store.
    /// * `value_type` - Native type code of the value.
    ///
    /// # Errors
    ///
    /// Returns `RegistryError::InvalidData` if the bytes do not fit the type.
    pub fn parse(data: &[u8], value_type: u32) -> Result<Self> {
        match value_type {
            ValueType::REG_NONE => Ok(ValueData::None(data.to_vec())),

            ValueType::REG_SZ => Ok(ValueData::String(decode_string(data)?)),

            ValueType::REG_EXPAND_SZ => Ok(ValueData::ExpandString(decode_string(data)?)),

            ValueType::REG_BINARY => Ok(ValueData::Binary(data.to_vec())),

            ValueType::REG_DWORD => {
                check_len(data, 4, "REG_DWORD")?;
                Ok(ValueData::Dword(LittleEndian::read_u32(data)))
            }

            ValueType::REG_DWORD_BIG_ENDIAN => {
                check_len(data, 4, "REG_DWORD_BIG_ENDIAN")?;
                Ok(ValueData::DwordBigEndian(BigEndian::read_u32(data)))
            }

            ValueType::REG_QWORD => {
                check_len(data, 8, "REG_QWORD")?;
                Ok(ValueData::Qword(LittleEndian::read_u64(data)))
            }

            ValueType::REG_MULTI_SZ => {
                let units = bytes_to_wide(data)?;
                Ok(ValueData::MultiString(parse_multi_string(&units)?))
            }

            _ => Ok(ValueData::Unknown {
                value_type,
                data: data.to_vec(),
            }),
        }
    }

    /// Returns the native type code for this value.
    pub fn value_type(&self) -> u32 {
        match self {
            ValueData::None(_) => ValueType::REG_NONE,
            ValueData::String(_) => ValueType::REG_SZ,
            ValueData::ExpandString(_) => ValueType::REG_EXPAND_SZ,
            ValueData::Binary(_) => ValueType::REG_BINARY,
            ValueData::Dword(_) => ValueType::REG_DWORD,
            ValueData::DwordBigEndian(_) => ValueType::REG_DWORD_BIG_ENDIAN,
            ValueData::MultiString(_) => ValueType::REG_MULTI_SZ,
            ValueData::Qword(_) => ValueType::REG_QWORD,
            ValueData::Unknown { value_type, .. } => *value_type,
        }
    }

    /// Encodes the value into the bytes the store expects.
    pub fn to_bytes(&self) -> Vec<u8> {
        match self {
            ValueData::None(data) => data.clone(),
            ValueData::String(s) | ValueData::ExpandString(s) => string_to_bytes(s),
            ValueData::Binary(b) => b.clone(),
            ValueData::Dword(d) => d.to_le_bytes().to_vec(),
            ValueData::DwordBigEndian(d) => d.to_be_bytes().to_vec(),
            ValueData::MultiString(strings) => wide_to_bytes(&build_multi_string(strings)),
            ValueData::Qword(q) => q.to_le_bytes().to_vec(),
            ValueData::Unknown { data, .. } => data.clone(),
        }
    }
}

impl fmt::Display for ValueData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValueData::None(data) if data.is_empty() => write!(f, "(none)"),
            ValueData::None(data) => write!(f, "{}", hex::encode_upper(data)),
            ValueData::String(s) | ValueData::ExpandString(s) => write!(f, "{}", s),
            ValueData::Binary(b) => write!(f, "{}", hex::encode_upper(b)),
            ValueData::Dword(d) | ValueData::DwordBigEndian(d) => write!(f, "{} (0x{:08X})", d, d),
            ValueData::Qword(q) => write!(f, "{} (0x{:016X})", q, q),
            ValueData::MultiString(strings) => write!(f, "{}", strings.join(", ")),
            ValueData::Unknown { data, .. } => write!(f, "{}", hex::encode_upper(data)),
        }
    }
}

fn check_len(data: &[u8], expected: usize, type_name: &str) -> Result<()> {
    if data.len() < expected {
        return Err(RegistryError::invalid_data(format!(
            "{} needs {} bytes, got {}",
            type_name,
            expected,
            data.len()
        )));
    }
    Ok(())
}

/// Decodes string data and drops the single terminator the store keeps.
fn decode_string(data: &[u8]) -> Result<String> {
    let mut s = read_utf16_string(data)?;
    if s.ends_with('\0') {
        s.pop();
    }
    Ok(s)
}

//! Value write/read tests against the in-memory backend.

mod common;

use common::{test_key, Recorder};
use dplnk::utils::string_to_bytes;
use dplnk::{
    codes, ExpandStringOption, MemoryRegistry, Operation, RegistryApi, RegistryError, ValueData,
    ValueType, MAX_READ_ATTEMPTS,
};

#[test]
fn test_string_round_trips() {
    let key = test_key(MemoryRegistry::new(), "strings");

    for text in ["hello", "", "ünïcödé ✓", "with spaces\tand tabs", "😀 outside the BMP"] {
        key.set_string_value("s", text).unwrap();
        assert_eq!(key.get_string_value("s").unwrap(), text);
    }
}

#[test]
fn test_expand_string_round_trip() {
    let key = test_key(MemoryRegistry::new(), "expand");
    key.set_expand_string_value("e", "%NOT_A_VARIABLE_DPLNK%\\x").unwrap();

    assert_eq!(
        key.get_expand_string_value("e", ExpandStringOption::DontExpand).unwrap(),
        "%NOT_A_VARIABLE_DPLNK%\\x"
    );
    // Unknown variables survive expansion untouched.
    assert_eq!(
        key.get_expand_string_value("e", ExpandStringOption::Expand).unwrap(),
        "%NOT_A_VARIABLE_DPLNK%\\x"
    );
    assert_eq!(key.query_value_type("e").unwrap(), ValueType::REG_EXPAND_SZ);
}

#[test]
fn test_multi_string_round_trips() {
    let key = test_key(MemoryRegistry::new(), "multi");

    let cases: Vec<Vec<String>> = vec![
        vec![],
        vec!["one".into()],
        vec!["a".into(), "".into(), "b".into()],
        vec!["".into(), "x".into()],
        vec!["tail".into(), "".into()],
    ];
    for case in cases {
        key.set_multi_string_value("m", &case).unwrap();
        assert_eq!(key.get_multi_string_value("m").unwrap(), case);
    }
}

#[test]
fn test_empty_multi_string_is_two_nulls() {
    let key = test_key(MemoryRegistry::new(), "multi-empty");
    let empty: [&str; 0] = [];
    key.set_multi_string_value("m", &empty).unwrap();

    assert_eq!(key.get_value("m").unwrap(), ValueData::MultiString(Vec::new()));
    let (_, size) = key.api().query_value(key.raw(), "m").unwrap();
    assert_eq!(size, 4);
}

#[test]
fn test_malformed_multi_string() {
    let registry = MemoryRegistry::new();
    let key = test_key(registry.clone(), "multi-bad");
    // One terminator only.
    let bytes = [0x61, 0x00, 0x00, 0x00, 0x62, 0x00];
    assert!(registry.set_value(key.raw(), "m", ValueType::REG_MULTI_SZ, &bytes).is_ok());

    // The store appends a single terminator to unterminated string data.
    let err = key.get_multi_string_value("m").unwrap_err();
    assert!(matches!(err, RegistryError::InvalidData(_)));
    assert_eq!(
        key.try_get_multi_string_value("m").error().code(),
        codes::ERROR_INVALID_DATA
    );
}

#[test]
fn test_binary_round_trips() {
    let key = test_key(MemoryRegistry::new(), "binary");
    let large: Vec<u8> = (0..=255u8).cycle().take(70_000).collect();

    for data in [vec![], vec![0u8], vec![0xde, 0xad, 0xbe, 0xef], large] {
        key.set_binary_value("b", &data).unwrap();
        assert_eq!(key.get_binary_value("b").unwrap(), data);
    }
}

#[test]
fn test_zero_length_binary_uses_one_call() {
    let registry = MemoryRegistry::new();
    let key = test_key(registry.clone(), "binary-empty");
    key.set_binary_value("b", &[]).unwrap();

    let before = registry.call_count(Operation::GetValue);
    assert!(key.get_binary_value("b").unwrap().is_empty());
    assert_eq!(registry.call_count(Operation::GetValue) - before, 1);
}

#[test]
fn test_numbers() {
    let key = test_key(MemoryRegistry::new(), "numbers");
    for value in [0u32, 1, u32::MAX] {
        key.set_dword_value("d", value).unwrap();
        assert_eq!(key.get_dword_value("d").unwrap(), value);
    }
    for value in [0u64, u64::from(u32::MAX) + 1, u64::MAX] {
        key.set_qword_value("q", value).unwrap();
        assert_eq!(key.get_qword_value("q").unwrap(), value);
    }
}

#[test]
fn test_numbers_with_wrong_size_are_rejected() {
    let registry = MemoryRegistry::new();
    let key = test_key(registry.clone(), "numbers-short");
    assert!(registry.set_value(key.raw(), "d", ValueType::REG_DWORD, &[0xAB, 0xCD]).is_ok());
    assert!(registry.set_value(key.raw(), "q", ValueType::REG_QWORD, &[1, 2, 3, 4]).is_ok());

    let err = key.get_dword_value("d").unwrap_err();
    assert_eq!(err.code(), codes::ERROR_DATATYPE_MISMATCH);
    assert_eq!(
        key.try_get_qword_value("q").error().code(),
        codes::ERROR_DATATYPE_MISMATCH
    );

    // Unrestricted reads hand back the bytes, which do not decode as a DWORD.
    assert!(matches!(
        key.get_value("d").unwrap_err(),
        RegistryError::InvalidData(_)
    ));
}

#[test]
fn test_untyped_value_keeps_its_bytes() {
    let registry = MemoryRegistry::new();
    let key = test_key(registry.clone(), "untyped");
    assert!(registry.set_value(key.raw(), "n", ValueType::REG_NONE, &[1, 2, 3]).is_ok());

    let value = key.get_value("n").unwrap();
    assert_eq!(value, ValueData::None(vec![1, 2, 3]));

    key.set_value("copy", &value).unwrap();
    assert_eq!(key.get_value("copy").unwrap(), value);
}

#[test]
fn test_value_names_are_case_insensitive() {
    let key = test_key(MemoryRegistry::new(), "case");
    key.set_dword_value("Version", 1).unwrap();
    key.set_dword_value("VERSION", 2).unwrap();

    assert_eq!(key.get_dword_value("version").unwrap(), 2);
    assert_eq!(key.enum_values().unwrap().len(), 1);
}

#[test]
fn test_read_retries_when_value_grows() {
    let recorder = Recorder::new();
    let key = test_key(recorder.clone(), "grow");
    key.set_string_value("s", "short").unwrap();

    let raw = key.raw();
    let mut grown = false;
    recorder.after_get_value(move |inner| {
        if !grown {
            grown = true;
            inner.set_value(raw, "s", ValueType::REG_SZ, &string_to_bytes("a much longer value"));
        }
    });

    let before = recorder.inner.call_count(Operation::GetValue);
    assert_eq!(key.get_string_value("s").unwrap(), "a much longer value");
    // Size query, short read, full read.
    assert_eq!(recorder.inner.call_count(Operation::GetValue) - before, 3);
}

#[test]
fn test_read_gives_up_on_endless_growth() {
    let recorder = Recorder::new();
    let key = test_key(recorder.clone(), "churn");
    key.set_binary_value("b", &[1]).unwrap();

    let raw = key.raw();
    let mut data = vec![1u8];
    recorder.after_get_value(move |inner| {
        data.push(1);
        inner.set_value(raw, "b", ValueType::REG_BINARY, &data);
    });

    let err = key.get_binary_value("b").unwrap_err();
    assert_eq!(err.code(), codes::ERROR_MORE_DATA);
    assert_eq!(
        recorder.inner.call_count(Operation::GetValue),
        1 + MAX_READ_ATTEMPTS
    );
    recorder.clear_hook();
}

#[test]
fn test_status_model_reports_native_failures() {
    let registry = MemoryRegistry::new();
    let key = test_key(registry.clone(), "status");

    let missing = key.try_get_string_value("absent");
    assert!(!missing.is_valid());
    assert_eq!(missing.error().code(), codes::ERROR_FILE_NOT_FOUND);

    registry.fail_next(Operation::SetValue, codes::ERROR_ACCESS_DENIED);
    let status = key.try_set_string_value("s", "x");
    assert_eq!(status.code(), codes::ERROR_ACCESS_DENIED);
    assert!(key.try_set_string_value("s", "x").is_ok());

    let found = key.try_get_string_value("s");
    assert_eq!(found.value(), "x");
}

#[test]
fn test_error_model_message() {
    let key = test_key(MemoryRegistry::new(), "message");
    let err = key.get_dword_value("absent").unwrap_err();
    assert!(err.is_not_found());
    assert!(err.to_string().contains("RegGetValueW"));
}

#[test]
fn test_typed_values() {
    let key = test_key(MemoryRegistry::new(), "typed");
    let values = [
        ("n", ValueData::None(Vec::new())),
        ("n-raw", ValueData::None(vec![1, 2, 3])),
        ("dw", ValueData::Dword(42)),
        ("be", ValueData::DwordBigEndian(0x0102_0304)),
        ("qw", ValueData::Qword(1 << 40)),
        ("sz", ValueData::String("text".into())),
        ("bin", ValueData::Binary(vec![9, 8, 7])),
        ("multi", ValueData::MultiString(vec!["x".into(), "".into()])),
        (
            "raw",
            ValueData::Unknown {
                value_type: 0x42,
                data: vec![1, 2, 3],
            },
        ),
    ];

    for (name, value) in &values {
        key.set_value(name, value).unwrap();
    }
    for (name, value) in &values {
        assert_eq!(&key.get_value(name).unwrap(), value, "value {}", name);
    }
}

#[test]
fn test_delete_value() {
    let key = test_key(MemoryRegistry::new(), "delete-value");
    key.set_dword_value("d", 1).unwrap();

    key.delete_value("d").unwrap();
    assert!(!key.has_value("d").unwrap());
    assert_eq!(key.try_delete_value("d").code(), codes::ERROR_FILE_NOT_FOUND);
}

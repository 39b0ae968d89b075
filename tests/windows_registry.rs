//! Tests against the real registry, under `HKEY_CURRENT_USER\Software\dplnk-tests`.

#![cfg(windows)]

mod common;

use common::{test_key, TEST_ROOT};
use dplnk::{
    codes, register_protocol_with, Access, LinkOptions, RawKey, RegKey, Scope, Win32Registry,
};

fn cleanup(name: &str) {
    let root = RegKey::from_raw(Win32Registry, RawKey::CURRENT_USER);
    let _ = root.try_delete_tree(&format!(r"{}\{}", TEST_ROOT, name));
}

#[test]
fn test_values_round_trip() {
    cleanup("win32-values");
    let key = test_key(Win32Registry, "win32-values");

    key.set_dword_value("d", 0x1234_5678).unwrap();
    key.set_qword_value("q", u64::MAX).unwrap();
    key.set_string_value("s", "").unwrap();
    key.set_expand_string_value("e", r"%SystemRoot%\x").unwrap();
    key.set_multi_string_value("m", &["a", "", "b"]).unwrap();
    key.set_binary_value("b", &[]).unwrap();

    assert_eq!(key.get_dword_value("d").unwrap(), 0x1234_5678);
    assert_eq!(key.get_qword_value("q").unwrap(), u64::MAX);
    assert_eq!(key.get_string_value("s").unwrap(), "");
    assert_eq!(
        key.get_expand_string_value("e", dplnk::ExpandStringOption::DontExpand).unwrap(),
        r"%SystemRoot%\x"
    );
    assert!(!key
        .get_expand_string_value("e", dplnk::ExpandStringOption::Expand)
        .unwrap()
        .contains('%'));
    assert_eq!(key.get_multi_string_value("m").unwrap(), vec!["a", "", "b"]);
    assert!(key.get_binary_value("b").unwrap().is_empty());

    drop(key);
    cleanup("win32-values");
}

#[test]
fn test_enumeration_and_existence() {
    cleanup("win32-enum");
    let key = test_key(Win32Registry, "win32-enum");
    RegKey::create_key(Win32Registry, key.raw(), "child", Access::DEFAULT).unwrap();
    key.set_dword_value("v", 1).unwrap();

    assert_eq!(key.enum_sub_keys().unwrap(), vec!["child"]);
    assert_eq!(key.enum_values().unwrap().len(), 1);
    assert!(key.has_sub_key("child").unwrap());
    assert!(!key.has_sub_key("missing").unwrap());
    assert!(!key.has_value("missing").unwrap());

    drop(key);
    cleanup("win32-enum");
}

#[test]
fn test_open_missing_key() {
    let mut key = RegKey::new(Win32Registry);
    let path = r"Software\dplnk-tests\does-not-exist";
    let status = key.try_open(RawKey::CURRENT_USER, path, Access::READ);
    assert_eq!(status.code(), codes::ERROR_FILE_NOT_FOUND);
    assert!(!status.message().is_empty());
}

#[test]
fn test_per_user_registration() {
    let root = RegKey::from_raw(Win32Registry, RawKey::CURRENT_USER);
    let scheme = "dplnk-test-scheme";
    let _ = root.try_delete_tree(&format!(r"Software\Classes\{}", scheme));

    let options = LinkOptions::new(scheme).with_scope(Scope::User).with_value("extra", "1");
    register_protocol_with(&Win32Registry, r"C:\app.exe", &options).unwrap();

    let command = RegKey::open_key(
        Win32Registry,
        RawKey::CURRENT_USER,
        &format!(r"Software\Classes\{}\shell\open\command", scheme),
        Access::READ,
    )
    .unwrap();
    assert_eq!(command.get_string_value("").unwrap(), r#""C:\app.exe" %1"#);
    assert_eq!(command.get_string_value("extra").unwrap(), "1");

    drop(command);
    root.delete_tree(&format!(r"Software\Classes\{}", scheme)).unwrap();
}

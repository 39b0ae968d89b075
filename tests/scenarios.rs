//! End-to-end scenarios: key lifecycle and protocol registration.

mod common;

use common::{test_key, TEST_ROOT};
use dplnk::{
    codes, register_protocol_with, Access, CreateOptions, Disposition, LinkOptions, MemoryRegistry,
    RawKey, RegKey, Scope,
};

#[test]
fn test_scheme_key_lifecycle() {
    let registry = MemoryRegistry::new();
    let root = test_key(registry.clone(), "lifecycle");

    let mut key = RegKey::new(registry.clone());
    key.create(root.raw(), "schemeA", Access::DEFAULT).unwrap();
    key.set_string_value("", "hello").unwrap();
    assert_eq!(key.get_string_value("").unwrap(), "hello");

    key.delete_value("").unwrap();
    assert!(!key.has_value("").unwrap());
    key.close();

    root.delete_tree("schemeA").unwrap();

    let mut reopened = RegKey::new(registry);
    let status = reopened.try_open(root.raw(), "schemeA", Access::READ);
    assert_eq!(status.code(), codes::ERROR_FILE_NOT_FOUND);
    assert!(!reopened.is_valid());
}

#[test]
fn test_per_user_registration() {
    let registry = MemoryRegistry::new();
    let json = r#"{"protocol": "myapp", "d": {"extra": "1"}, "scope": "user"}"#;
    let options = LinkOptions::from_json(json).unwrap();

    register_protocol_with(&registry, r"C:\app.exe", &options).unwrap();

    let command = RegKey::open_key(
        registry.clone(),
        RawKey::CURRENT_USER,
        r"Software\Classes\myapp\shell\open\command",
        Access::READ,
    )
    .unwrap();
    assert_eq!(command.get_string_value("").unwrap(), r#""C:\app.exe" %1"#);
    assert_eq!(command.get_string_value("extra").unwrap(), "1");

    let path = r"Software\Classes\myapp";
    let protocol = RegKey::open_key(registry, RawKey::CURRENT_USER, path, Access::READ).unwrap();
    assert_eq!(protocol.get_string_value("").unwrap(), "URL: myapp Protocol");
    assert!(protocol.has_value("URL Protocol").unwrap());
    assert!(!protocol.has_sub_key("DefaultIcon").unwrap());
}

#[test]
fn test_registration_is_repeatable() {
    let registry = MemoryRegistry::new();
    let options = LinkOptions::new("myapp").with_scope(Scope::Machine);

    register_protocol_with(&registry, r"C:\old.exe", &options).unwrap();
    register_protocol_with(&registry, r"C:\new.exe", &options).unwrap();

    let path = r"myapp\shell\open\command";
    let command =
        RegKey::open_key(registry.clone(), RawKey::CLASSES_ROOT, path, Access::READ).unwrap();
    assert_eq!(command.get_string_value("").unwrap(), r#""C:\new.exe" %1"#);
    assert_eq!(command.enum_values().unwrap().len(), 1);
    drop(command);
    assert_eq!(registry.open_handles(), 0);
}

#[test]
fn test_registration_stops_at_first_failure() {
    let registry = MemoryRegistry::new();
    registry.fail_next(dplnk::Operation::CreateKey, codes::ERROR_ACCESS_DENIED);

    let err =
        register_protocol_with(&registry, r"C:\app.exe", &LinkOptions::new("myapp")).unwrap_err();
    assert_eq!(err.code(), codes::ERROR_ACCESS_DENIED);

    let root = RegKey::from_raw(registry, RawKey::CLASSES_ROOT);
    assert!(!root.has_sub_key("myapp").unwrap());
}

#[test]
fn test_create_disposition_and_volatile_keys() {
    let registry = MemoryRegistry::new();
    let mut key = RegKey::new(registry.clone());
    let path = format!(r"{}\volatile", TEST_ROOT);

    let first = key
        .create_with_options(RawKey::CURRENT_USER, &path, Access::DEFAULT, CreateOptions::VOLATILE)
        .unwrap();
    let second = key
        .try_create_with_options(
            RawKey::CURRENT_USER,
            &path,
            Access::DEFAULT,
            CreateOptions::VOLATILE,
        )
        .into_value();

    assert_eq!(first, Disposition::CreatedNewKey);
    assert_eq!(second, Disposition::OpenedExistingKey);
    assert_eq!(registry.open_handles(), 1);
}

#[test]
fn test_delete_key_and_tree() {
    let registry = MemoryRegistry::new();
    let root = test_key(registry.clone(), "delete");
    RegKey::create_key(registry.clone(), root.raw(), r"parent\child", Access::DEFAULT).unwrap();

    // Only empty keys can be deleted one at a time.
    assert_eq!(
        root.try_delete_key("parent", Access::WOW64_64KEY).code(),
        codes::ERROR_ACCESS_DENIED
    );
    root.delete_key(r"parent\child", Access::WOW64_64KEY).unwrap();
    root.delete_key("parent", Access::WOW64_64KEY).unwrap();
    assert!(!root.has_sub_key("parent").unwrap());

    RegKey::create_key(registry.clone(), root.raw(), r"a\b\c", Access::DEFAULT).unwrap();
    root.set_dword_value("kept-until-cleared", 1).unwrap();
    root.delete_tree("").unwrap();
    assert!(root.enum_sub_keys().unwrap().is_empty());
    assert!(root.enum_values().unwrap().is_empty());
}

#[test]
fn test_handle_to_deleted_key() {
    let registry = MemoryRegistry::new();
    let root = test_key(registry.clone(), "deleted");
    let child = RegKey::create_key(registry.clone(), root.raw(), "child", Access::DEFAULT).unwrap();

    root.delete_tree("child").unwrap();

    let status = child.try_set_dword_value("x", 1);
    assert_eq!(status.code(), codes::ERROR_KEY_DELETED);
}

#[test]
fn test_copy_tree() {
    let registry = MemoryRegistry::new();
    let root = test_key(registry.clone(), "copy");
    let source =
        RegKey::create_key(registry.clone(), root.raw(), r"src\inner", Access::DEFAULT).unwrap();
    source.set_multi_string_value("list", &["a", "", "b"]).unwrap();
    let dest = RegKey::create_key(registry.clone(), root.raw(), "dest", Access::DEFAULT).unwrap();

    root.copy_tree("src", &dest).unwrap();

    let copied = RegKey::open_key(registry.clone(), dest.raw(), "inner", Access::READ).unwrap();
    assert_eq!(copied.get_multi_string_value("list").unwrap(), vec!["a", "", "b"]);

    // Copying a tree into itself is refused.
    let status = root.try_copy_tree("src", &source);
    assert_eq!(status.code(), codes::ERROR_INVALID_PARAMETER);
}

#[test]
fn test_flush_key() {
    let registry = MemoryRegistry::new();
    let key = test_key(registry.clone(), "flush");
    key.flush_key().unwrap();

    registry.fail_next(dplnk::Operation::FlushKey, codes::ERROR_GEN_FAILURE);
    assert_eq!(key.try_flush_key().code(), codes::ERROR_GEN_FAILURE);
}

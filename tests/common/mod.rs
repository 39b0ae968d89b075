//! Shared test backend: a `MemoryRegistry` that records close calls and can
//! change the store between the steps of a read.

#![allow(dead_code)]

use dplnk::{
    Access, CreateOptions, Disposition, GetValueFlags, MemoryRegistry, RawKey, RawKeyInfo, RegKey,
    RegistryApi, Status,
};
use std::path::Path;
use std::sync::{Arc, Mutex};

type Hook = Box<dyn FnMut(&MemoryRegistry) + Send>;

/// Delegates to a `MemoryRegistry`, watching close calls and reads.
#[derive(Clone, Default)]
pub struct Recorder {
    pub inner: MemoryRegistry,
    closed: Arc<Mutex<Vec<RawKey>>>,
    after_get_value: Arc<Mutex<Option<Hook>>>,
}

impl Recorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Handles passed to `close_key`, in call order.
    pub fn closed(&self) -> Vec<RawKey> {
        self.closed.lock().unwrap().clone()
    }

    /// Runs `hook` after every `get_value` call until cleared.
    pub fn after_get_value(&self, hook: impl FnMut(&MemoryRegistry) + Send + 'static) {
        *self.after_get_value.lock().unwrap() = Some(Box::new(hook));
    }

    pub fn clear_hook(&self) {
        *self.after_get_value.lock().unwrap() = None;
    }
}

impl RegistryApi for Recorder {
    fn create_key(
        &self,
        parent: RawKey,
        sub_key: &str,
        options: CreateOptions,
        access: Access,
    ) -> Result<(RawKey, Disposition), Status> {
        self.inner.create_key(parent, sub_key, options, access)
    }

    fn open_key(&self, parent: RawKey, sub_key: &str, access: Access) -> Result<RawKey, Status> {
        self.inner.open_key(parent, sub_key, access)
    }

    fn close_key(&self, key: RawKey) -> Status {
        self.closed.lock().unwrap().push(key);
        self.inner.close_key(key)
    }

    fn set_value(&self, key: RawKey, name: &str, value_type: u32, data: &[u8]) -> Status {
        self.inner.set_value(key, name, value_type, data)
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
        let status = self.inner.get_value(key, name, flags, data, size, value_type);
        if let Some(hook) = self.after_get_value.lock().unwrap().as_mut() {
            hook(&self.inner);
        }
        status
    }

    fn query_value(&self, key: RawKey, name: &str) -> Result<(u32, u32), Status> {
        self.inner.query_value(key, name)
    }

    fn query_info_key(&self, key: RawKey) -> Result<RawKeyInfo, Status> {
        self.inner.query_info_key(key)
    }

    fn enum_key(&self, key: RawKey, index: u32, name: &mut [u16], name_len: &mut u32) -> Status {
        self.inner.enum_key(key, index, name, name_len)
    }

    fn enum_value(
        &self,
        key: RawKey,
        index: u32,
        name: &mut [u16],
        name_len: &mut u32,
        value_type: &mut u32,
    ) -> Status {
        self.inner.enum_value(key, index, name, name_len, value_type)
    }

    fn delete_value(&self, key: RawKey, name: &str) -> Status {
        self.inner.delete_value(key, name)
    }

    fn delete_key(&self, key: RawKey, sub_key: &str, access: Access) -> Status {
        self.inner.delete_key(key, sub_key, access)
    }

    fn delete_tree(&self, key: RawKey, sub_key: &str) -> Status {
        self.inner.delete_tree(key, sub_key)
    }

    fn copy_tree(&self, src: RawKey, sub_key: &str, dest: RawKey) -> Status {
        self.inner.copy_tree(src, sub_key, dest)
    }

    fn flush_key(&self, key: RawKey) -> Status {
        self.inner.flush_key(key)
    }

    fn load_key(&self, key: RawKey, sub_key: &str, file: &Path) -> Status {
        self.inner.load_key(key, sub_key, file)
    }

    fn save_key(&self, key: RawKey, file: &Path) -> Status {
        self.inner.save_key(key, file)
    }

    fn enable_reflection_key(&self, key: RawKey) -> Status {
        self.inner.enable_reflection_key(key)
    }

    fn disable_reflection_key(&self, key: RawKey) -> Status {
        self.inner.disable_reflection_key(key)
    }

    fn query_reflection_key(&self, key: RawKey) -> Result<bool, Status> {
        self.inner.query_reflection_key(key)
    }

    fn connect_registry(&self, machine_name: &str, predefined: RawKey) -> Result<RawKey, Status> {
        self.inner.connect_registry(machine_name, predefined)
    }
}

/// Path of the per-test key under `HKEY_CURRENT_USER`.
pub const TEST_ROOT: &str = r"Software\dplnk-tests";

/// Creates (or opens) `HKEY_CURRENT_USER\Software\dplnk-tests\<name>`.
pub fn test_key<A: RegistryApi>(api: A, name: &str) -> RegKey<A> {
    let path = format!(r"{}\{}", TEST_ROOT, name);
    RegKey::create_key(api, RawKey::CURRENT_USER, &path, Access::DEFAULT)
        .expect("Failed to create test key")
}

//! In-memory registry backend.
//!
//! [`MemoryRegistry`] reproduces the status-code behavior of the Win32
//! registry primitives closely enough for the key wrapper to run unchanged on
//! any platform: case-insensitive names, predefined roots, access checks on
//! handles, `ERROR_MORE_DATA` for short buffers, `ERROR_KEY_DELETED` for
//! handles to deleted keys, and hive files (stored as JSON snapshots).
//!
//! Clones share one store, the same way every handle in a process shares the
//! system registry.

use crate::api::{RawKey, RawKeyInfo, RegistryApi};
use crate::status::{codes, Status};
use crate::types::{Access, CreateOptions, Disposition, GetValueFlags, ValueType};
use crate::utils::{bytes_to_wide, datetime_to_filetime, wide_to_bytes};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::fs;
use std::io;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, trace};

type NodeId = usize;

/// First handle value handed out; real handles are small multiples of four.
const FIRST_HANDLE: isize = 0x100;

/// Name under which the local machine's roots are stored.
const LOCAL_MACHINE_NAME: &str = "";

/// The primitives of [`RegistryApi`], used to inject failures and count calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    /// `create_key`
    CreateKey,
    /// `open_key`
    OpenKey,
    /// `close_key`
    CloseKey,
    /// `set_value`
    SetValue,
    /// `get_value`
    GetValue,
    /// `query_value`
    QueryValue,
    /// `query_info_key`
    QueryInfoKey,
    /// `enum_key`
    EnumKey,
    /// `enum_value`
    EnumValue,
    /// `delete_value`
    DeleteValue,
    /// `delete_key`
    DeleteKey,
    /// `delete_tree`
    DeleteTree,
    /// `copy_tree`
    CopyTree,
    /// `flush_key`
    FlushKey,
    /// `load_key`
    LoadKey,
    /// `save_key`
    SaveKey,
    /// `enable_reflection_key`
    EnableReflection,
    /// `disable_reflection_key`
    DisableReflection,
    /// `query_reflection_key`
    QueryReflection,
    /// `connect_registry`
    ConnectRegistry,
}

#[derive(Debug, Clone)]
struct StoredValue {
    name: String,
    value_type: u32,
    data: Vec<u8>,
}

#[derive(Debug, Clone, Default)]
struct Node {
    name: String,
    parent: Option<NodeId>,
    /// Lowercased name to child.
    children: BTreeMap<String, NodeId>,
    /// Values in insertion order, which is also their enumeration order.
    values: Vec<StoredValue>,
    last_write_time: u64,
    volatile: bool,
    reflection_disabled: bool,
    denied: bool,
    deleted: bool,
}

impl Node {
    fn value_index(&self, name: &str) -> Option<usize> {
        let name = name.to_lowercase();
        self.values
            .iter()
            .position(|value| value.name.to_lowercase() == name)
    }
}

#[derive(Debug, Clone, Copy)]
struct OpenHandle {
    node: NodeId,
    access: Access,
}

/// On-disk form of a key and its sub-tree.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct Snapshot {
    name: String,
    values: Vec<SnapshotValue>,
    children: Vec<Snapshot>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct SnapshotValue {
    name: String,
    value_type: u32,
    /// Hex-encoded data.
    data: String,
}

#[derive(Debug)]
struct Store {
    nodes: Vec<Node>,
    /// Lowercased machine name to its predefined roots.
    machines: HashMap<String, HashMap<RawKey, NodeId>>,
    handles: HashMap<isize, OpenHandle>,
    next_handle: isize,
    failures: HashMap<Operation, VecDeque<i32>>,
    calls: HashMap<Operation, usize>,
    /// Uppercased variable name to value, consulted before the process environment.
    environment: HashMap<String, String>,
}

impl Store {
    fn new() -> Self {
        let mut store = Self {
            nodes: Vec::new(),
            machines: HashMap::new(),
            handles: HashMap::new(),
            next_handle: FIRST_HANDLE,
            failures: HashMap::new(),
            calls: HashMap::new(),
            environment: HashMap::new(),
        };
        store.add_machine(LOCAL_MACHINE_NAME);
        store
    }

    fn add_machine(&mut self, machine: &str) {
        let mut roots = HashMap::new();
        for root in RawKey::PREDEFINED {
            let id = self.new_node(root.predefined_name().unwrap_or_default(), None);
            roots.insert(root, id);
        }
        self.machines.insert(machine.to_lowercase(), roots);
    }

    fn new_node(&mut self, name: &str, parent: Option<NodeId>) -> NodeId {
        let id = self.nodes.len();
        self.nodes.push(Node {
            name: name.to_string(),
            parent,
            last_write_time: now(),
            ..Node::default()
        });
        if let Some(parent) = parent {
            self.nodes[parent].children.insert(name.to_lowercase(), id);
            self.touch(parent);
        }
        id
    }

    fn touch(&mut self, node: NodeId) {
        self.nodes[node].last_write_time = now();
    }

    /// Records the call and pops an injected failure, if any.
    fn begin(&mut self, op: Operation) -> Option<Status> {
        *self.calls.entry(op).or_insert(0) += 1;
        let code = self.failures.get_mut(&op).and_then(VecDeque::pop_front)?;
        trace!(?op, code, "Injected failure");
        Some(Status::new(code))
    }

    /// Resolves a handle to its node and granted access.
    fn key(&self, key: RawKey) -> Result<OpenHandle, Status> {
        let handle = if key.is_predefined() {
            let node = self.machines[LOCAL_MACHINE_NAME]
                .get(&key)
                .copied()
                .ok_or(Status::new(codes::ERROR_INVALID_HANDLE))?;
            OpenHandle {
                node,
                access: Access::ALL_ACCESS,
            }
        } else {
            *self
                .handles
                .get(&key.0)
                .ok_or(Status::new(codes::ERROR_INVALID_HANDLE))?
        };

        if self.nodes[handle.node].deleted {
            return Err(Status::new(codes::ERROR_KEY_DELETED));
        }
        Ok(handle)
    }

    fn key_with(&self, key: RawKey, required: Access) -> Result<NodeId, Status> {
        let handle = self.key(key)?;
        if !handle.access.contains(required) {
            return Err(Status::new(codes::ERROR_ACCESS_DENIED));
        }
        Ok(handle.node)
    }

    fn child(&self, node: NodeId, name: &str) -> Option<NodeId> {
        self.nodes[node].children.get(&name.to_lowercase()).copied()
    }

    fn resolve(&self, start: NodeId, path: &str) -> Result<NodeId, Status> {
        let mut node = start;
        for segment in segments(path) {
            node = self
                .child(node, segment)
                .ok_or(Status::new(codes::ERROR_FILE_NOT_FOUND))?;
        }
        Ok(node)
    }

    fn alloc_handle(&mut self, node: NodeId, access: Access) -> RawKey {
        let raw = self.next_handle;
        self.next_handle += 4;
        self.handles.insert(
            raw,
            OpenHandle {
                node,
                access: access.without_view(),
            },
        );
        RawKey(raw)
    }

    fn is_root(&self, node: NodeId) -> bool {
        self.nodes[node].parent.is_none()
    }

    fn is_within(&self, node: NodeId, ancestor: NodeId) -> bool {
        let mut current = Some(node);
        while let Some(id) = current {
            if id == ancestor {
                return true;
            }
            current = self.nodes[id].parent;
        }
        false
    }

    /// Detaches `node` from its parent and marks the whole sub-tree deleted.
    fn remove_subtree(&mut self, node: NodeId) {
        if let Some(parent) = self.nodes[node].parent {
            let key = self.nodes[node].name.to_lowercase();
            self.nodes[parent].children.remove(&key);
            self.touch(parent);
        }

        let mut pending = vec![node];
        while let Some(id) = pending.pop() {
            let entry = &mut self.nodes[id];
            entry.deleted = true;
            entry.values.clear();
            pending.extend(std::mem::take(&mut entry.children).into_values());
        }
    }

    fn snapshot(&self, node: NodeId) -> Snapshot {
        let entry = &self.nodes[node];
        Snapshot {
            name: entry.name.clone(),
            values: entry
                .values
                .iter()
                .map(|value| SnapshotValue {
                    name: value.name.clone(),
                    value_type: value.value_type,
                    data: hex::encode(&value.data),
                })
                .collect(),
            children: entry.children.values().map(|&child| self.snapshot(child)).collect(),
        }
    }

    /// Merges a snapshot's values and children into `node`.
    fn apply_snapshot(&mut self, node: NodeId, snapshot: &Snapshot) -> Result<(), Status> {
        for value in &snapshot.values {
            let data = hex::decode(&value.data).map_err(|_| Status::new(codes::ERROR_BADDB))?;
            self.put_value(node, &value.name, value.value_type, data);
        }
        for child in &snapshot.children {
            let id = match self.child(node, &child.name) {
                Some(id) => id,
                None => self.new_node(&child.name, Some(node)),
            };
            self.apply_snapshot(id, child)?;
        }
        Ok(())
    }

    fn put_value(&mut self, node: NodeId, name: &str, value_type: u32, data: Vec<u8>) {
        let entry = &mut self.nodes[node];
        match entry.value_index(name) {
            Some(index) => {
                entry.values[index].value_type = value_type;
                entry.values[index].data = data;
            }
            None => entry.values.push(StoredValue {
                name: name.to_string(),
                value_type,
                data,
            }),
        }
        self.touch(node);
    }

    fn expand(&self, text: &str) -> String {
        let mut out = String::with_capacity(text.len());
        let mut rest = text;
        while let Some(start) = rest.find('%') {
            out.push_str(&rest[..start]);
            let after = &rest[start + 1..];
            match after.find('%') {
                Some(end) => {
                    let name = &after[..end];
                    match self.variable(name) {
                        Some(value) if !name.is_empty() => out.push_str(&value),
                        _ => {
                            out.push('%');
                            out.push_str(name);
                            out.push('%');
                        }
                    }
                    rest = &after[end + 1..];
                }
                None => {
                    out.push_str(&rest[start..]);
                    rest = "";
                }
            }
        }
        out.push_str(rest);
        out
    }

    fn variable(&self, name: &str) -> Option<String> {
        self.environment
            .get(&name.to_uppercase())
            .cloned()
            .or_else(|| std::env::var(name).ok())
    }
}

fn now() -> u64 {
    datetime_to_filetime(chrono::Utc::now())
}

fn segments(path: &str) -> impl Iterator<Item = &str> {
    path.split('\\').filter(|segment| !segment.is_empty())
}

fn io_status(err: &io::Error) -> Status {
    match err.kind() {
        io::ErrorKind::NotFound => Status::new(codes::ERROR_FILE_NOT_FOUND),
        io::ErrorKind::PermissionDenied => Status::new(codes::ERROR_ACCESS_DENIED),
        io::ErrorKind::AlreadyExists => Status::new(codes::ERROR_ALREADY_EXISTS),
        _ => Status::new(codes::ERROR_GEN_FAILURE),
    }
}

fn len_u32(len: usize) -> u32 {
    u32::try_from(len).unwrap_or(u32::MAX)
}

fn is_string_type(value_type: u32) -> bool {
    matches!(
        value_type,
        ValueType::REG_SZ | ValueType::REG_EXPAND_SZ | ValueType::REG_MULTI_SZ
    )
}

/// An in-memory registry with Win32 status-code semantics.
#[derive(Debug, Clone)]
pub struct MemoryRegistry {
    inner: Arc<Mutex<Store>>,
}

impl Default for MemoryRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryRegistry {
    /// Creates an empty registry holding only the predefined roots.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(Store::new())),
        }
    }

    fn store(&self) -> MutexGuard<'_, Store> {
        self.inner.lock().expect("memory registry lock poisoned")
    }

    /// Makes a remote machine reachable through `connect_registry`.
    pub fn add_machine(&self, machine_name: &str) {
        self.store().add_machine(machine_name);
    }

    /// Denies all access to an existing key; opening or deleting it fails
    /// with `ERROR_ACCESS_DENIED`. Returns false if the key does not exist.
    pub fn deny_access(&self, root: RawKey, path: &str) -> bool {
        let mut store = self.store();
        let Ok(handle) = store.key(root) else {
            return false;
        };
        match store.resolve(handle.node, path) {
            Ok(node) => {
                store.nodes[node].denied = true;
                true
            }
            Err(_) => false,
        }
    }

    /// Sets a variable used when expanding `REG_EXPAND_SZ` data.
    pub fn set_environment_variable(&self, name: &str, value: &str) {
        self.store()
            .environment
            .insert(name.to_uppercase(), value.to_string());
    }

    /// Makes the next call of `op` fail with `code`. Calls queue up.
    pub fn fail_next(&self, op: Operation, code: i32) {
        self.store().failures.entry(op).or_default().push_back(code);
    }

    /// Number of times `op` has been called.
    pub fn call_count(&self, op: Operation) -> usize {
        self.store().calls.get(&op).copied().unwrap_or(0)
    }

    /// Number of open, non-predefined handles.
    pub fn open_handles(&self) -> usize {
        self.store().handles.len()
    }
}

impl RegistryApi for MemoryRegistry {
    fn create_key(
        &self,
        parent: RawKey,
        sub_key: &str,
        options: CreateOptions,
        access: Access,
    ) -> Result<(RawKey, Disposition), Status> {
        let mut store = self.store();
        if let Some(status) = store.begin(Operation::CreateKey) {
            return Err(status);
        }

        let handle = store.key(parent)?;
        let mut node = handle.node;
        let mut disposition = Disposition::OpenedExistingKey;
        for segment in segments(sub_key) {
            node = match store.child(node, segment) {
                Some(child) => child,
                None => {
                    if !handle.access.contains(Access::CREATE_SUB_KEY) {
                        return Err(Status::new(codes::ERROR_ACCESS_DENIED));
                    }
                    let child = store.new_node(segment, Some(node));
                    store.nodes[child].volatile = options.is_volatile();
                    disposition = Disposition::CreatedNewKey;
                    child
                }
            };
        }

        if store.nodes[node].denied {
            return Err(Status::new(codes::ERROR_ACCESS_DENIED));
        }

        let raw = store.alloc_handle(node, access);
        debug!(parent = %parent, sub_key, ?disposition, handle = %raw, "Created key");
        Ok((raw, disposition))
    }

    fn open_key(&self, parent: RawKey, sub_key: &str, access: Access) -> Result<RawKey, Status> {
        let mut store = self.store();
        if let Some(status) = store.begin(Operation::OpenKey) {
            return Err(status);
        }

        let handle = store.key(parent)?;
        let node = store.resolve(handle.node, sub_key)?;
        if store.nodes[node].denied {
            return Err(Status::new(codes::ERROR_ACCESS_DENIED));
        }

        Ok(store.alloc_handle(node, access))
    }

    fn close_key(&self, key: RawKey) -> Status {
        let mut store = self.store();
        if let Some(status) = store.begin(Operation::CloseKey) {
            return status;
        }

        if key.is_predefined() || store.handles.remove(&key.0).is_some() {
            Status::SUCCESS
        } else {
            Status::new(codes::ERROR_INVALID_HANDLE)
        }
    }

    fn set_value(&self, key: RawKey, name: &str, value_type: u32, data: &[u8]) -> Status {
        let mut store = self.store();
        if let Some(status) = store.begin(Operation::SetValue) {
            return status;
        }

        match store.key_with(key, Access::SET_VALUE) {
            Ok(node) => {
                store.put_value(node, name, value_type, data.to_vec());
                Status::SUCCESS
            }
            Err(status) => status,
        }
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
        let mut store = self.store();
        if let Some(status) = store.begin(Operation::GetValue) {
            return status;
        }

        let node = match store.key_with(key, Access::QUERY_VALUE) {
            Ok(node) => node,
            Err(status) => return status,
        };

        let no_expand = flags.contains(GetValueFlags::NOEXPAND);
        if !no_expand && (flags.0 & GetValueFlags::RT_ANY.0) == GetValueFlags::RT_REG_EXPAND_SZ.0 {
            return Status::new(codes::ERROR_INVALID_PARAMETER);
        }

        let entry = &store.nodes[node];
        let Some(index) = entry.value_index(name) else {
            return Status::new(codes::ERROR_FILE_NOT_FOUND);
        };
        let stored = &entry.values[index];
        let mut stored_type = stored.value_type;
        let mut bytes = stored.data.clone();

        if stored_type == ValueType::REG_EXPAND_SZ && !no_expand {
            let units = bytes_to_wide(&bytes[..bytes.len() & !1]).unwrap_or_default();
            let text = String::from_utf16_lossy(&units);
            let expanded = store.expand(text.trim_end_matches('\0'));
            bytes = wide_to_bytes(&crate::utils::to_wide(&expanded));
            stored_type = ValueType::REG_SZ;
        }

        if !flags.accepts(stored_type) {
            return Status::new(codes::ERROR_UNSUPPORTED_TYPE);
        }

        // Fixed-size restrictions also check the stored length.
        if flags.0 & GetValueFlags::RT_ANY.0 != GetValueFlags::RT_ANY.0 {
            let expected = match stored_type {
                ValueType::REG_DWORD => Some(4),
                ValueType::REG_QWORD => Some(8),
                _ => None,
            };
            if expected.is_some_and(|len| bytes.len() != len) {
                return Status::new(codes::ERROR_DATATYPE_MISMATCH);
            }
        }

        // String data always comes back terminated.
        if is_string_type(stored_type) {
            if bytes.len() % 2 != 0 {
                bytes.push(0);
            }
            if !bytes.ends_with(&[0, 0]) {
                bytes.extend_from_slice(&[0, 0]);
            }
        }

        *value_type = stored_type;
        *size = len_u32(bytes.len());
        match data {
            None => Status::SUCCESS,
            Some(buffer) if buffer.len() < bytes.len() => Status::new(codes::ERROR_MORE_DATA),
            Some(buffer) => {
                buffer[..bytes.len()].copy_from_slice(&bytes);
                Status::SUCCESS
            }
        }
    }

    fn query_value(&self, key: RawKey, name: &str) -> Result<(u32, u32), Status> {
        let mut store = self.store();
        if let Some(status) = store.begin(Operation::QueryValue) {
            return Err(status);
        }

        let node = store.key_with(key, Access::QUERY_VALUE)?;
        let entry = &store.nodes[node];
        let index = entry
            .value_index(name)
            .ok_or(Status::new(codes::ERROR_FILE_NOT_FOUND))?;
        let value = &entry.values[index];
        Ok((value.value_type, len_u32(value.data.len())))
    }

    fn query_info_key(&self, key: RawKey) -> Result<RawKeyInfo, Status> {
        let mut store = self.store();
        if let Some(status) = store.begin(Operation::QueryInfoKey) {
            return Err(status);
        }

        let node = store.key_with(key, Access::QUERY_VALUE)?;
        let entry = &store.nodes[node];
        let name_len = |name: &str| len_u32(name.encode_utf16().count());

        Ok(RawKeyInfo {
            sub_keys: len_u32(entry.children.len()),
            max_sub_key_len: entry
                .children
                .values()
                .map(|&child| name_len(&store.nodes[child].name))
                .max()
                .unwrap_or(0),
            values: len_u32(entry.values.len()),
            max_value_name_len: entry.values.iter().map(|v| name_len(&v.name)).max().unwrap_or(0),
            max_value_len: entry
                .values
                .iter()
                .map(|v| len_u32(v.data.len()))
                .max()
                .unwrap_or(0),
            last_write_time: entry.last_write_time,
        })
    }

    fn enum_key(&self, key: RawKey, index: u32, name: &mut [u16], name_len: &mut u32) -> Status {
        let mut store = self.store();
        if let Some(status) = store.begin(Operation::EnumKey) {
            return status;
        }

        let node = match store.key_with(key, Access::ENUMERATE_SUB_KEYS) {
            Ok(node) => node,
            Err(status) => return status,
        };
        let Some(&child) = store.nodes[node].children.values().nth(index as usize) else {
            return Status::new(codes::ERROR_NO_MORE_ITEMS);
        };

        copy_name(&store.nodes[child].name, name, name_len)
    }

    fn enum_value(
        &self,
        key: RawKey,
        index: u32,
        name: &mut [u16],
        name_len: &mut u32,
        value_type: &mut u32,
    ) -> Status {
        let mut store = self.store();
        if let Some(status) = store.begin(Operation::EnumValue) {
            return status;
        }

        let node = match store.key_with(key, Access::QUERY_VALUE) {
            Ok(node) => node,
            Err(status) => return status,
        };
        let Some(value) = store.nodes[node].values.get(index as usize) else {
            return Status::new(codes::ERROR_NO_MORE_ITEMS);
        };

        let status = copy_name(&value.name, name, name_len);
        if status.is_ok() {
            *value_type = value.value_type;
        }
        status
    }

    fn delete_value(&self, key: RawKey, name: &str) -> Status {
        let mut store = self.store();
        if let Some(status) = store.begin(Operation::DeleteValue) {
            return status;
        }

        let node = match store.key_with(key, Access::SET_VALUE) {
            Ok(node) => node,
            Err(status) => return status,
        };
        match store.nodes[node].value_index(name) {
            Some(index) => {
                store.nodes[node].values.remove(index);
                store.touch(node);
                Status::SUCCESS
            }
            None => Status::new(codes::ERROR_FILE_NOT_FOUND),
        }
    }

    fn delete_key(&self, key: RawKey, sub_key: &str, _access: Access) -> Status {
        let mut store = self.store();
        if let Some(status) = store.begin(Operation::DeleteKey) {
            return status;
        }

        let target = match store.key(key).and_then(|handle| store.resolve(handle.node, sub_key)) {
            Ok(target) => target,
            Err(status) => return status,
        };
        let entry = &store.nodes[target];
        if entry.denied || entry.parent.is_none() || !entry.children.is_empty() {
            return Status::new(codes::ERROR_ACCESS_DENIED);
        }

        store.remove_subtree(target);
        Status::SUCCESS
    }

    fn delete_tree(&self, key: RawKey, sub_key: &str) -> Status {
        let mut store = self.store();
        if let Some(status) = store.begin(Operation::DeleteTree) {
            return status;
        }

        let handle = match store.key(key) {
            Ok(handle) => handle,
            Err(status) => return status,
        };

        if segments(sub_key).next().is_none() {
            let children: Vec<NodeId> =
                store.nodes[handle.node].children.values().copied().collect();
            for child in children {
                store.remove_subtree(child);
            }
            store.nodes[handle.node].values.clear();
            store.touch(handle.node);
            return Status::SUCCESS;
        }

        match store.resolve(handle.node, sub_key) {
            Ok(target) if store.nodes[target].denied => Status::new(codes::ERROR_ACCESS_DENIED),
            Ok(target) => {
                store.remove_subtree(target);
                Status::SUCCESS
            }
            Err(status) => status,
        }
    }

    fn copy_tree(&self, src: RawKey, sub_key: &str, dest: RawKey) -> Status {
        let mut store = self.store();
        if let Some(status) = store.begin(Operation::CopyTree) {
            return status;
        }

        let source = match store.key(src).and_then(|handle| store.resolve(handle.node, sub_key)) {
            Ok(source) => source,
            Err(status) => return status,
        };
        let target = match store.key_with(dest, Access::SET_VALUE | Access::CREATE_SUB_KEY) {
            Ok(target) => target,
            Err(status) => return status,
        };
        if store.is_within(target, source) {
            return Status::new(codes::ERROR_INVALID_PARAMETER);
        }

        let snapshot = store.snapshot(source);
        match store.apply_snapshot(target, &snapshot) {
            Ok(()) => Status::SUCCESS,
            Err(status) => status,
        }
    }

    fn flush_key(&self, key: RawKey) -> Status {
        let mut store = self.store();
        if let Some(status) = store.begin(Operation::FlushKey) {
            return status;
        }

        match store.key(key) {
            Ok(_) => Status::SUCCESS,
            Err(status) => status,
        }
    }

    fn load_key(&self, key: RawKey, sub_key: &str, file: &Path) -> Status {
        let mut store = self.store();
        if let Some(status) = store.begin(Operation::LoadKey) {
            return status;
        }

        if key != RawKey::USERS && key != RawKey::LOCAL_MACHINE {
            return Status::new(codes::ERROR_INVALID_PARAMETER);
        }
        if sub_key.is_empty() || sub_key.contains('\\') {
            return Status::new(codes::ERROR_INVALID_PARAMETER);
        }

        let root = match store.key(key) {
            Ok(handle) => handle.node,
            Err(status) => return status,
        };
        if store.child(root, sub_key).is_some() {
            return Status::new(codes::ERROR_ALREADY_EXISTS);
        }

        let contents = match fs::read(file) {
            Ok(contents) => contents,
            Err(err) => return io_status(&err),
        };
        let snapshot: Snapshot = match serde_json::from_slice(&contents) {
            Ok(snapshot) => snapshot,
            Err(err) => {
                debug!(error = %err, "Hive file is not a registry snapshot");
                return Status::new(codes::ERROR_BADDB);
            }
        };

        let mounted = store.new_node(sub_key, Some(root));
        match store.apply_snapshot(mounted, &snapshot) {
            Ok(()) => Status::SUCCESS,
            Err(status) => {
                store.remove_subtree(mounted);
                status
            }
        }
    }

    fn save_key(&self, key: RawKey, file: &Path) -> Status {
        let mut store = self.store();
        if let Some(status) = store.begin(Operation::SaveKey) {
            return status;
        }

        let node = match store.key(key) {
            Ok(handle) => handle.node,
            Err(status) => return status,
        };
        if file.exists() {
            return Status::new(codes::ERROR_ALREADY_EXISTS);
        }

        let snapshot = store.snapshot(node);
        let bytes = match serde_json::to_vec_pretty(&snapshot) {
            Ok(bytes) => bytes,
            Err(_) => return Status::new(codes::ERROR_GEN_FAILURE),
        };
        match fs::write(file, bytes) {
            Ok(()) => Status::SUCCESS,
            Err(err) => io_status(&err),
        }
    }

    fn enable_reflection_key(&self, key: RawKey) -> Status {
        self.set_reflection(Operation::EnableReflection, key, false)
    }

    fn disable_reflection_key(&self, key: RawKey) -> Status {
        self.set_reflection(Operation::DisableReflection, key, true)
    }

    fn query_reflection_key(&self, key: RawKey) -> Result<bool, Status> {
        let mut store = self.store();
        if let Some(status) = store.begin(Operation::QueryReflection) {
            return Err(status);
        }

        let handle = store.key(key)?;
        Ok(store.nodes[handle.node].reflection_disabled)
    }

    fn connect_registry(&self, machine_name: &str, predefined: RawKey) -> Result<RawKey, Status> {
        let mut store = self.store();
        if let Some(status) = store.begin(Operation::ConnectRegistry) {
            return Err(status);
        }

        if !predefined.is_predefined() {
            return Err(Status::new(codes::ERROR_INVALID_HANDLE));
        }

        let machine = machine_name.trim_start_matches('\\').to_lowercase();
        let remote = machine != LOCAL_MACHINE_NAME;
        if remote
            && ![RawKey::LOCAL_MACHINE, RawKey::USERS, RawKey::PERFORMANCE_DATA]
                .contains(&predefined)
        {
            return Err(Status::new(codes::ERROR_INVALID_HANDLE));
        }

        let node = store
            .machines
            .get(&machine)
            .ok_or(Status::new(codes::ERROR_BAD_NETPATH))?
            .get(&predefined)
            .copied()
            .ok_or(Status::new(codes::ERROR_INVALID_HANDLE))?;

        debug!(machine = machine_name, root = %predefined, "Connected registry");
        Ok(store.alloc_handle(node, Access::ALL_ACCESS))
    }
}

impl MemoryRegistry {
    fn set_reflection(&self, op: Operation, key: RawKey, disabled: bool) -> Status {
        let mut store = self.store();
        if let Some(status) = store.begin(op) {
            return status;
        }

        match store.key(key) {
            Ok(handle) if store.is_root(handle.node) => Status::new(codes::ERROR_INVALID_PARAMETER),
            Ok(handle) => {
                store.nodes[handle.node].reflection_disabled = disabled;
                Status::SUCCESS
            }
            Err(status) => status,
        }
    }
}

/// Copies `source` and a terminator into `name`, `RegEnum*` style.
fn copy_name(source: &str, name: &mut [u16], name_len: &mut u32) -> Status {
    let units: Vec<u16> = source.encode_utf16().collect();
    let capacity = (*name_len as usize).min(name.len());
    if units.len() + 1 > capacity {
        return Status::new(codes::ERROR_MORE_DATA);
    }

    name[..units.len()].copy_from_slice(&units);
    name[units.len()] = 0;
    *name_len = len_u32(units.len());
    Status::SUCCESS
}

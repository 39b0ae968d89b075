//! URL protocol handler registration.
//!
//! Registering scheme `myapp` for `C:\app.exe` writes, under the scope's root:
//!
//! ```text
//! myapp                       (default) = "URL: myapp Protocol"
//!                             URL Protocol = ""
//! myapp\DefaultIcon           (default) = "C:\Windows\System32\url.dll,0"   machine scope only
//! myapp\shell\open\command    (default) = "\"C:\app.exe\" %1"
//!                             <extra name> = <extra value> ...
//! ```

use crate::api::{RawKey, RegistryApi};
use crate::error::{RegistryError, Result};
use crate::key::RegKey;
use crate::types::Access;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use tracing::{debug, info, instrument};

/// Icon shown for machine-wide protocol links.
pub const DEFAULT_ICON: &str = r"C:\Windows\System32\url.dll,0";

/// Where a protocol handler is registered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scope {
    /// `HKEY_CLASSES_ROOT\<scheme>`, for every user.
    #[default]
    Machine,
    /// `HKEY_CURRENT_USER\Software\Classes\<scheme>`, for the current user.
    User,
}

impl Scope {
    /// Root key and path of the protocol key for `scheme`.
    pub fn protocol_key(&self, scheme: &str) -> (RawKey, String) {
        match self {
            Scope::Machine => (RawKey::CLASSES_ROOT, scheme.to_string()),
            Scope::User => (RawKey::CURRENT_USER, format!(r"Software\Classes\{}", scheme)),
        }
    }
}

/// What to register.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkOptions {
    /// The URL scheme, without `://`.
    pub protocol: String,

    /// Extra values written verbatim under the command key.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub d: Option<BTreeMap<String, String>>,

    /// Machine-wide or per-user registration.
    #[serde(default)]
    pub scope: Scope,
}

impl LinkOptions {
    /// Machine-wide options for `protocol` with no extra values.
    pub fn new(protocol: impl Into<String>) -> Self {
        Self {
            protocol: protocol.into(),
            d: None,
            scope: Scope::Machine,
        }
    }

    /// Sets the scope.
    pub fn with_scope(mut self, scope: Scope) -> Self {
        self.scope = scope;
        self
    }

    /// Adds one extra command-key value.
    pub fn with_value(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.d
            .get_or_insert_with(BTreeMap::new)
            .insert(name.into(), value.into());
        self
    }

    /// Parses options from JSON such as
    /// `{"protocol": "myapp", "d": {"extra": "1"}, "scope": "user"}`.
    pub fn from_json(json: &str) -> Result<Self> {
        let options: Self = serde_json::from_str(json)?;
        options.validate()?;
        Ok(options)
    }

    /// Reads options from a JSON file.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        Self::from_json(&contents)
    }

    /// Checks that the scheme can be used as a single key name.
    pub fn validate(&self) -> Result<()> {
        if self.protocol.is_empty() {
            return Err(RegistryError::InvalidOptions("protocol name is empty".to_string()));
        }
        if self.protocol.contains(['\\', '\0']) {
            return Err(RegistryError::InvalidOptions(format!(
                "protocol name {:?} is not a single key name",
                self.protocol
            )));
        }
        Ok(())
    }
}

/// Registers `path` as the handler for `options.protocol` through `api`.
///
/// Existing keys are reused and their values overwritten.
#[instrument(skip(api), fields(protocol = %options.protocol, scope = ?options.scope))]
pub fn register_protocol_with<A: RegistryApi + Clone>(
    api: &A,
    path: &str,
    options: &LinkOptions,
) -> Result<()> {
    options.validate()?;

    let (root, base) = options.scope.protocol_key(&options.protocol);

    let protocol_key = RegKey::create_key(api.clone(), root, &base, Access::DEFAULT)?;
    protocol_key.set_string_value("", &format!("URL: {} Protocol", options.protocol))?;
    protocol_key.set_string_value("URL Protocol", "")?;

    if options.scope == Scope::Machine {
        let icon_path = format!(r"{}\DefaultIcon", base);
        let icon_key = RegKey::create_key(api.clone(), root, &icon_path, Access::DEFAULT)?;
        icon_key.set_string_value("", DEFAULT_ICON)?;
    }

    let command_key = RegKey::create_key(
        api.clone(),
        root,
        &format!(r"{}\shell\open\command", base),
        Access::DEFAULT,
    )?;
    command_key.set_string_value("", &format!("\"{}\" %1", path))?;

    if let Some(extra) = &options.d {
        for (name, value) in extra {
            debug!(name = %name, "Writing extra command value");
            command_key.set_string_value(name, value)?;
        }
    }

    info!(handler = path, "Registered protocol handler");
    Ok(())
}

/// Registers `path` as the handler for `options.protocol` in the system
/// registry.
///
/// # Errors
///
/// Returns `RegistryError::UnsupportedPlatform` on targets without a registry,
/// before anything is written.
#[cfg(windows)]
pub fn dplnk(path: &str, options: &LinkOptions) -> Result<()> {
    register_protocol_with(&crate::api::Win32Registry, path, options)
}

/// Registers `path` as the handler for `options.protocol` in the system
/// registry.
///
/// # Errors
///
/// Returns `RegistryError::UnsupportedPlatform` on targets without a registry,
/// before anything is written.
#[cfg(not(windows))]
pub fn dplnk(path: &str, options: &LinkOptions) -> Result<()> {
    let _ = (path, options);
    Err(RegistryError::UnsupportedPlatform)
}

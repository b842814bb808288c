//! Host lookups used while resolving path variables
//!
//! Environment variables and registry values are reached through the
//! [`Environment`] and [`Registry`] traits so projects can be resolved
//! against a fixed host in tests.

use crate::{IsmError, Result};
use std::collections::HashMap;
use std::path::Path;

/// Environment variable store
pub trait Environment {
    fn var(&self, name: &str) -> Option<String>;
}

/// Registry value store
pub trait Registry {
    /// Read a string value, opening `subkeys` in order below `root`
    fn read_value(&self, root: RootKey, subkeys: &[&str], value_name: &str) -> Option<String>;
}

/// Registry root keys accepted in `ISPathVariable` registry entries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RootKey {
    LocalMachine,
    CurrentUser,
    ClassesRoot,
    Users,
}

impl RootKey {
    pub fn as_str(&self) -> &'static str {
        match self {
            RootKey::LocalMachine => "HKEY_LOCAL_MACHINE",
            RootKey::CurrentUser => "HKEY_CURRENT_USER",
            RootKey::ClassesRoot => "HKEY_CLASSES_ROOT",
            RootKey::Users => "HKEY_USERS",
        }
    }
}

impl std::fmt::Display for RootKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for RootKey {
    type Err = IsmError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "HKEY_LOCAL_MACHINE" => Ok(RootKey::LocalMachine),
            "HKEY_CURRENT_USER" => Ok(RootKey::CurrentUser),
            "HKEY_CLASSES_ROOT" => Ok(RootKey::ClassesRoot),
            "HKEY_USERS" => Ok(RootKey::Users),
            _ => Err(IsmError::UnsupportedRootKey(s.to_string())),
        }
    }
}

/// Process environment
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemEnvironment;

impl Environment for SystemEnvironment {
    fn var(&self, name: &str) -> Option<String> {
        std::env::var(name).ok()
    }
}

/// Fixed set of variables, for tests and dry runs
impl Environment for HashMap<String, String> {
    fn var(&self, name: &str) -> Option<String> {
        self.get(name).cloned()
    }
}

/// Windows registry; never finds anything on other platforms
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemRegistry;

#[cfg(windows)]
impl Registry for SystemRegistry {
    fn read_value(&self, root: RootKey, subkeys: &[&str], value_name: &str) -> Option<String> {
        use winreg::enums::{HKEY_CLASSES_ROOT, HKEY_CURRENT_USER, HKEY_LOCAL_MACHINE, HKEY_USERS};
        use winreg::RegKey;

        let mut key = RegKey::predef(match root {
            RootKey::LocalMachine => HKEY_LOCAL_MACHINE,
            RootKey::CurrentUser => HKEY_CURRENT_USER,
            RootKey::ClassesRoot => HKEY_CLASSES_ROOT,
            RootKey::Users => HKEY_USERS,
        });
        for subkey in subkeys {
            key = key.open_subkey(subkey).ok()?;
        }
        key.get_value::<String, _>(value_name).ok()
    }
}

#[cfg(not(windows))]
impl Registry for SystemRegistry {
    fn read_value(&self, root: RootKey, subkeys: &[&str], value_name: &str) -> Option<String> {
        log::debug!(
            "No registry on this platform: {}\\{}\\{}",
            root,
            subkeys.join("\\"),
            value_name
        );
        None
    }
}

/// Fixed set of registry values keyed by `ROOT\sub\key\ValueName`
impl Registry for HashMap<String, String> {
    fn read_value(&self, root: RootKey, subkeys: &[&str], value_name: &str) -> Option<String> {
        let mut key = root.as_str().to_string();
        for subkey in subkeys {
            key.push('\\');
            key.push_str(subkey);
        }
        key.push('\\');
        key.push_str(value_name);
        self.get(&key).cloned()
    }
}

/// Operating system folders referenced by well-known path variables
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KnownFolder {
    /// 32-bit system folder (`SysWOW64` on 64-bit Windows)
    System,
    /// 32-bit common files folder
    CommonFiles,
    /// 32-bit program files folder
    ProgramFiles,
    Windows,
}

impl KnownFolder {
    /// Resolve from the environment, empty when the host has no such folder
    pub fn resolve(&self, env: &dyn Environment) -> String {
        fn first(env: &dyn Environment, names: &[&str]) -> Option<String> {
            names.iter().find_map(|name| env.var(name))
        }

        let folder = match self {
            KnownFolder::Windows => first(env, &["windir", "SystemRoot"]),
            KnownFolder::System => first(env, &["windir", "SystemRoot"]).map(|windir| {
                // A 32-bit view only exists as a separate folder on 64-bit hosts
                let system = if env.var("ProgramFiles(x86)").is_some() {
                    "SysWOW64"
                } else {
                    "System32"
                };
                Path::new(&windir).join(system).to_string_lossy().into_owned()
            }),
            KnownFolder::ProgramFiles => first(env, &["ProgramFiles(x86)", "ProgramFiles"]),
            KnownFolder::CommonFiles => {
                first(env, &["CommonProgramFiles(x86)", "CommonProgramFiles"])
            }
        };

        folder.unwrap_or_default()
    }
}

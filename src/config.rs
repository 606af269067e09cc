//! # Core data model and user settings
//!
//! The variable set is closed: eleven names known at compile time, each backed
//! by a field of [`Variables`]. Credential sets are keyed by a user-chosen name
//! and kept in a [`BTreeMap`] so that every listing walks them in the same order.
//!
//! User settings live next to the store in the platform config directory:
//!
//! ```toml
//! [defaults]
//! store = "/home/me/engagement/store.env"
//! mask_secrets = true
//! ```

use crate::{EnvCredsError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::env;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

/// Name of the application directory under the platform config directory.
pub const APP_NAME: &str = "envcreds";

/// File name of the persisted store inside the config directory.
pub const STORE_FILE: &str = "store.env";

/// File name of the optional settings file inside the config directory.
pub const SETTINGS_FILE: &str = "config.toml";

/// Key of the persisted line holding the whole credential-set collection.
pub const CRED_SETS_KEY: &str = "SAVED_CRED_SETS";

/// One of the fixed, named engagement variables.
///
/// The declaration order is the display order and the 1-based menu index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Variable {
    Outdir,
    C2,
    Target,
    Targets,
    Cidr,
    Dc,
    Domain,
    User,
    Password,
    NtHash,
    AesKey,
}

impl Variable {
    /// All variables in display order.
    pub const ALL: [Variable; 11] = [
        Variable::Outdir,
        Variable::C2,
        Variable::Target,
        Variable::Targets,
        Variable::Cidr,
        Variable::Dc,
        Variable::Domain,
        Variable::User,
        Variable::Password,
        Variable::NtHash,
        Variable::AesKey,
    ];

    /// The key used in the persisted file and the process environment.
    pub fn name(self) -> &'static str {
        match self {
            Variable::Outdir => "OUTDIR",
            Variable::C2 => "C2",
            Variable::Target => "TARGET",
            Variable::Targets => "TARGETS",
            Variable::Cidr => "CIDR",
            Variable::Dc => "DC",
            Variable::Domain => "DOMAIN",
            Variable::User => "USER",
            Variable::Password => "PASSWORD",
            Variable::NtHash => "NT_HASH",
            Variable::AesKey => "AES_KEY",
        }
    }

    /// Whether the value is an authentication secret that may be masked.
    pub fn is_secret(self) -> bool {
        matches!(self, Variable::Password | Variable::NtHash | Variable::AesKey)
    }
}

impl fmt::Display for Variable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Variable {
    type Err = EnvCredsError;

    fn from_str(s: &str) -> Result<Self> {
        Variable::ALL
            .into_iter()
            .find(|var| var.name() == s)
            .ok_or_else(|| EnvCredsError::Validation(format!("Unknown variable '{}'", s)))
    }
}

/// Current values of every [`Variable`]. Unset means empty, never absent.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Variables {
    pub outdir: String,
    pub c2: String,
    pub target: String,
    pub targets: String,
    pub cidr: String,
    pub dc: String,
    pub domain: String,
    pub user: String,
    pub password: String,
    pub nt_hash: String,
    pub aes_key: String,
}

impl Variables {
    /// Reads every variable from the process environment.
    pub fn from_env() -> Self {
        let mut vars = Self::default();
        for var in Variable::ALL {
            if let Ok(value) = env::var(var.name()) {
                vars.set(var, value);
            }
        }
        vars
    }

    pub fn get(&self, var: Variable) -> &str {
        match var {
            Variable::Outdir => &self.outdir,
            Variable::C2 => &self.c2,
            Variable::Target => &self.target,
            Variable::Targets => &self.targets,
            Variable::Cidr => &self.cidr,
            Variable::Dc => &self.dc,
            Variable::Domain => &self.domain,
            Variable::User => &self.user,
            Variable::Password => &self.password,
            Variable::NtHash => &self.nt_hash,
            Variable::AesKey => &self.aes_key,
        }
    }

    pub fn set(&mut self, var: Variable, value: String) {
        let slot = match var {
            Variable::Outdir => &mut self.outdir,
            Variable::C2 => &mut self.c2,
            Variable::Target => &mut self.target,
            Variable::Targets => &mut self.targets,
            Variable::Cidr => &mut self.cidr,
            Variable::Dc => &mut self.dc,
            Variable::Domain => &mut self.domain,
            Variable::User => &mut self.user,
            Variable::Password => &mut self.password,
            Variable::NtHash => &mut self.nt_hash,
            Variable::AesKey => &mut self.aes_key,
        };
        *slot = value;
    }

    /// Iterates `(variable, value)` pairs in display order.
    pub fn iter(&self) -> impl Iterator<Item = (Variable, &str)> + '_ {
        Variable::ALL.into_iter().map(move |var| (var, self.get(var)))
    }
}

/// A named bundle of credentials. The name is the key in [`CredentialSets`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CredentialSet {
    pub user: String,
    pub password: String,
    pub nt_hash: String,
    pub aes_key: String,
    pub target: String,
}

impl CredentialSet {
    /// Whether the set can be exported to the user/password lists.
    pub fn is_exportable(&self) -> bool {
        !self.user.is_empty() && !self.password.is_empty()
    }
}

/// All credential sets keyed by name, iterated in name order.
pub type CredentialSets = BTreeMap<String, CredentialSet>;

/// Returns the platform config directory for envcreds,
/// typically `~/.config/envcreds` on Unix systems.
pub fn config_dir() -> Result<PathBuf> {
    use directories::ProjectDirs;
    let dirs = ProjectDirs::from("", "", APP_NAME).ok_or(EnvCredsError::NoConfigDir)?;
    Ok(dirs.config_dir().to_path_buf())
}

/// Default location of the persisted store.
pub fn default_store_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(STORE_FILE))
}

/// User settings read from `config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Settings {
    #[serde(default)]
    pub defaults: SettingsDefaults,
}

/// The `[defaults]` table of the settings file.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct SettingsDefaults {
    /// Store path used when none is given on the command line
    #[serde(skip_serializing_if = "Option::is_none")]
    pub store: Option<PathBuf>,
    /// Mask passwords, hashes and keys in listings and hide their input
    #[serde(default)]
    pub mask_secrets: bool,
}

impl Settings {
    /// Gets the path to the settings file.
    pub fn path() -> Result<PathBuf> {
        Ok(config_dir()?.join(SETTINGS_FILE))
    }

    /// Loads the settings file, returning `None` when it does not exist.
    pub fn load() -> Result<Option<Self>> {
        let path = Self::path()?;
        if !path.exists() {
            return Ok(None);
        }
        let content = std::fs::read_to_string(&path).map_err(|e| EnvCredsError::io_at(&path, e))?;
        Ok(Some(toml::from_str(&content)?))
    }

    /// Picks the store path: explicit override, then settings, then the default.
    pub fn store_path(&self, explicit: Option<PathBuf>) -> Result<PathBuf> {
        match explicit.or_else(|| self.defaults.store.clone()) {
            Some(path) => Ok(path),
            None => default_store_path(),
        }
    }
}

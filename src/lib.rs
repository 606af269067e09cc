//! envcreds - engagement variables and credential sets in one file
//!
//! This library keeps a fixed set of named variables (`OUTDIR`, `TARGET`,
//! `DOMAIN`, ...) together with named credential sets in a single
//! shell-sourceable file, and exports credentials as plain lists for other tools.
//!
//! # Example
//!
//! ```no_run
//! use envcreds::{ConfigStore, CredentialSet, Variable};
//!
//! fn main() -> envcreds::Result<()> {
//!     let mut store = ConfigStore::open("/tmp/store.env")?;
//!     store.set_variable(Variable::Target, "10.0.0.5")?;
//!     store.upsert_credential_set(
//!         "admin",
//!         CredentialSet {
//!             user: "administrator".into(),
//!             password: "Passw0rd!".into(),
//!             ..Default::default()
//!         },
//!     )?;
//!     store.apply_credential_set("admin")?;
//!     Ok(())
//! }
//! ```

mod config;
mod error;

pub mod codec;
pub mod export;
pub mod store;

// CLI module (feature-gated)
#[cfg(feature = "cli")]
pub mod cli;

pub use config::{
    APP_NAME, CRED_SETS_KEY, CredentialSet, CredentialSets, STORE_FILE, Settings,
    SettingsDefaults, Variable, Variables, config_dir, default_store_path,
};
pub use error::{EnvCredsError, Result};
pub use export::{ExportSummary, export_credentials};
pub use store::{ConfigStore, Loaded};

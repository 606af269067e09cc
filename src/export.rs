//! Exports credential sets as plain user and password lists.

use crate::config::{CredentialSets, Variables};
use crate::{EnvCredsError, Result};
use std::fs::{self, File, OpenOptions};
use std::io::Write;
#[cfg(unix)]
use std::os::unix::fs::OpenOptionsExt;
use std::path::{Component, Path, PathBuf};
use tracing::info;

pub const USERS_FILE: &str = "users.txt";
pub const PASSWORDS_FILE: &str = "passwords.txt";

/// Outcome of [`export_credentials`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportSummary {
    /// Sets written to both lists
    pub exported: usize,
    /// Sets lacking a user or a password
    pub skipped: usize,
    pub users_path: PathBuf,
    pub passwords_path: PathBuf,
}

/// Appends the user and password of every complete credential set to
/// `OUTDIR/users.txt` and `OUTDIR/passwords.txt`, in store order.
///
/// `OUTDIR` must be set and must not climb out through a `..` component.
/// Sets without both a user and a password are skipped; exporting nothing
/// is not an error.
pub fn export_credentials(variables: &Variables, sets: &CredentialSets) -> Result<ExportSummary> {
    let outdir = validate_outdir(&variables.outdir)?;
    fs::create_dir_all(outdir).map_err(|e| EnvCredsError::io_at(outdir, e))?;

    let users_path = outdir.join(USERS_FILE);
    let passwords_path = outdir.join(PASSWORDS_FILE);
    let (eligible, skipped): (Vec<_>, Vec<_>) =
        sets.values().partition(|set| set.is_exportable());

    if !eligible.is_empty() {
        let mut users = open_append(&users_path)?;
        let mut passwords = open_append(&passwords_path)?;
        for set in &eligible {
            writeln!(users, "{}", set.user)?;
            writeln!(passwords, "{}", set.password)?;
        }
    }

    info!(
        outdir = %outdir.display(),
        exported = eligible.len(),
        skipped = skipped.len(),
        "exported credentials"
    );
    Ok(ExportSummary {
        exported: eligible.len(),
        skipped: skipped.len(),
        users_path,
        passwords_path,
    })
}

fn validate_outdir(outdir: &str) -> Result<&Path> {
    if outdir.trim().is_empty() {
        return Err(EnvCredsError::Validation(
            "OUTDIR is not set; set it before exporting".into(),
        ));
    }
    let path = Path::new(outdir);
    if path.components().any(|c| c == Component::ParentDir) {
        return Err(EnvCredsError::Validation(format!(
            "OUTDIR '{}' must not contain '..'",
            outdir
        )));
    }
    Ok(path)
}

fn open_append(path: &Path) -> Result<File> {
    let mut options = OpenOptions::new();
    options.create(true).append(true);
    #[cfg(unix)]
    options.mode(0o600);
    options.open(path).map_err(|e| EnvCredsError::io_at(path, e))
}

//! The persisted store: variables and credential sets in one line-oriented file.
//!
//! ```text
//! OUTDIR='/home/me/loot'
//! TARGET='10.0.0.5'
//! SAVED_CRED_SETS='["admin"]="administrator|Passw0rd!|||dc01" '
//! ```
//!
//! Every mutation updates memory first and then rewrites only the affected lines.
//! A rewrite reads the whole file, drops the lines for the keys being written and
//! any older duplicate store lines, appends the new lines and atomically renames
//! a temporary copy over the original. There is no locking between processes;
//! the last writer wins.

use crate::codec;
use crate::config::{CRED_SETS_KEY, CredentialSet, CredentialSets, Variable, Variables};
use crate::{EnvCredsError, Result};
use std::collections::HashMap;
use std::env;
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tempfile::NamedTempFile;
use tracing::{debug, warn};

/// Result of reading the persisted file.
#[derive(Debug, Default)]
pub struct Loaded {
    pub variables: Variables,
    pub credential_sets: CredentialSets,
    /// Lines or blobs that were skipped, one message each
    pub warnings: Vec<String>,
}

/// Reads the persisted file at `path`.
///
/// A missing file yields the default state. Malformed lines are skipped and
/// reported in [`Loaded::warnings`]; an undecodable credential-set blob leaves
/// the collection empty without touching the variables.
pub fn load(path: &Path) -> Result<Loaded> {
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            debug!(path = %path.display(), "store file missing, starting empty");
            return Ok(Loaded::default());
        }
        Err(e) => return Err(EnvCredsError::io_at(path, e)),
    };

    let mut loaded = Loaded::default();
    for (index, line) in content.lines().enumerate() {
        let Some((key, raw)) = split_assignment(line) else {
            continue;
        };
        let lineno = index + 1;

        if key == CRED_SETS_KEY {
            match codec::unquote(raw).and_then(|blob| codec::decode_collection(&blob)) {
                Ok(sets) => loaded.credential_sets = sets,
                Err(e) => {
                    warn!(line = lineno, error = %e, "discarding saved credential sets");
                    loaded.credential_sets.clear();
                    loaded
                        .warnings
                        .push(format!("line {}: saved credential sets ignored ({})", lineno, e));
                }
            }
            continue;
        }

        let Ok(var) = Variable::from_str(key) else {
            continue;
        };
        match codec::unquote(raw) {
            Ok(value) => loaded.variables.set(var, value),
            Err(e) => {
                warn!(line = lineno, variable = %var, error = %e, "skipping malformed line");
                loaded
                    .warnings
                    .push(format!("line {}: {} skipped ({})", lineno, var, e));
            }
        }
    }

    debug!(
        path = %path.display(),
        credential_sets = loaded.credential_sets.len(),
        "loaded store"
    );
    Ok(loaded)
}

/// Applies every known variable in the file at `path` to the process environment.
///
/// Returns how many variables were set. Lines `dotenvy` cannot parse are logged
/// and skipped.
pub fn source_into_env(path: &Path) -> Result<usize> {
    if !path.exists() {
        return Ok(0);
    }

    let mut applied = 0;
    for item in dotenvy::from_path_iter(path)? {
        let (key, value) = match item {
            Ok(pair) => pair,
            Err(e) => {
                warn!(error = %e, "skipping line while sourcing store");
                continue;
            }
        };
        if Variable::from_str(&key).is_ok() {
            // The CLI is single-threaded; nothing else reads the environment concurrently.
            unsafe { env::set_var(&key, &value) };
            applied += 1;
        }
    }
    Ok(applied)
}

/// Session state backed by the persisted file.
///
/// Created once at startup, mutated by each menu command, dropped at quit.
/// Writes happen inside each mutating call, so there is nothing to flush.
pub struct ConfigStore {
    path: PathBuf,
    variables: Variables,
    credential_sets: CredentialSets,
    warnings: Vec<String>,
}

impl ConfigStore {
    /// Loads the store at `path`.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let loaded = load(&path)?;
        Ok(Self {
            path,
            variables: loaded.variables,
            credential_sets: loaded.credential_sets,
            warnings: loaded.warnings,
        })
    }

    /// A store with no state that still persists to `path`.
    ///
    /// Used when the existing file cannot be read and the session continues
    /// without it.
    pub fn empty(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            variables: Variables::default(),
            credential_sets: CredentialSets::new(),
            warnings: Vec::new(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn variables(&self) -> &Variables {
        &self.variables
    }

    pub fn credential_sets(&self) -> &CredentialSets {
        &self.credential_sets
    }

    /// Messages for lines skipped while loading.
    pub fn load_warnings(&self) -> &[String] {
        &self.warnings
    }

    /// Credential set at a 0-based position in iteration order.
    pub fn credential_set_at(&self, index: usize) -> Option<(&String, &CredentialSet)> {
        self.credential_sets.iter().nth(index)
    }

    /// Whether the persisted file can be rewritten. A missing file counts as writable.
    pub fn is_writable(&self) -> bool {
        ensure_writable(&self.path).is_ok()
    }

    /// Sets a variable and persists its line.
    ///
    /// On error the new value is still held in memory for this session.
    pub fn set_variable(&mut self, var: Variable, value: impl Into<String>) -> Result<()> {
        let value = value.into();
        reject_line_breaks(var.name(), &value)?;
        let line = assignment(var.name(), &value);
        self.variables.set(var, value);
        rewrite_lines(&self.path, &[(var.name(), line)])
    }

    /// Like [`set_variable`](Self::set_variable), with the variable given by its file key.
    pub fn set_variable_by_name(&mut self, name: &str, value: impl Into<String>) -> Result<()> {
        let var = Variable::from_str(name)?;
        self.set_variable(var, value)
    }

    /// Inserts or replaces a credential set and persists the collection.
    ///
    /// The name is used as given so a set loaded with surrounding spaces is
    /// replaced rather than duplicated.
    pub fn upsert_credential_set(&mut self, name: &str, set: CredentialSet) -> Result<()> {
        if name.trim().is_empty() {
            return Err(EnvCredsError::Validation(
                "Credential set name cannot be empty".into(),
            ));
        }
        reject_line_breaks("credential set name", name)?;
        for (field, value) in [
            ("user", &set.user),
            ("password", &set.password),
            ("NT hash", &set.nt_hash),
            ("AES key", &set.aes_key),
            ("target", &set.target),
        ] {
            reject_line_breaks(field, value)?;
        }
        self.credential_sets.insert(name.to_string(), set);
        self.persist_credential_sets()
    }

    pub fn delete_credential_set(&mut self, name: &str) -> Result<()> {
        if self.credential_sets.remove(name).is_none() {
            return Err(EnvCredsError::NotFound(name.to_string()));
        }
        self.persist_credential_sets()
    }

    /// Copies a credential set into `USER`, `PASSWORD`, `NT_HASH`, `AES_KEY`
    /// and `TARGET`, persisting the five lines in one rewrite.
    pub fn apply_credential_set(&mut self, name: &str) -> Result<()> {
        let set = self
            .credential_sets
            .get(name)
            .cloned()
            .ok_or_else(|| EnvCredsError::NotFound(name.to_string()))?;

        let updates = [
            (Variable::User, set.user),
            (Variable::Password, set.password),
            (Variable::NtHash, set.nt_hash),
            (Variable::AesKey, set.aes_key),
            (Variable::Target, set.target),
        ];
        let lines: Vec<(&str, String)> = updates
            .iter()
            .map(|(var, value)| (var.name(), assignment(var.name(), value)))
            .collect();
        for (var, value) in updates {
            self.variables.set(var, value);
        }
        rewrite_lines(&self.path, &lines)
    }

    /// Empties every variable and credential set and truncates the file.
    pub fn clear_all(&mut self) -> Result<()> {
        self.variables = Variables::default();
        self.credential_sets.clear();

        if !self.path.exists() {
            return Ok(());
        }
        OpenOptions::new()
            .write(true)
            .truncate(true)
            .open(&self.path)
            .map_err(|e| EnvCredsError::io_at(&self.path, e))?;
        debug!(path = %self.path.display(), "truncated store");
        Ok(())
    }

    fn persist_credential_sets(&self) -> Result<()> {
        let blob = codec::encode_collection(&self.credential_sets);
        rewrite_lines(&self.path, &[(CRED_SETS_KEY, assignment(CRED_SETS_KEY, &blob))])
    }
}

/// Each record is one line, so a value spanning lines cannot be stored.
fn reject_line_breaks(what: &str, value: &str) -> Result<()> {
    if value.contains(['\n', '\r']) {
        return Err(EnvCredsError::Validation(format!(
            "{} cannot contain a line break",
            what
        )));
    }
    Ok(())
}

fn assignment(key: &str, value: &str) -> String {
    format!("{}={}", key, codec::quote(value))
}

/// Splits `KEY=value`, accepting a leading `export `. Blank lines and comments yield `None`.
fn split_assignment(line: &str) -> Option<(&str, &str)> {
    let line = line.trim_start();
    if line.is_empty() || line.starts_with('#') {
        return None;
    }
    let line = line.strip_prefix("export ").map(str::trim_start).unwrap_or(line);
    let (key, value) = line.split_once('=')?;
    Some((key.trim_end(), value))
}

/// Fails with `PermissionDenied` when an existing file cannot be opened for writing.
///
/// The rename in [`rewrite_lines`] only needs directory permissions, so the
/// file's own mode has to be checked separately.
fn ensure_writable(path: &Path) -> Result<()> {
    match OpenOptions::new().append(true).open(path) {
        Ok(_) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(EnvCredsError::io_at(path, e)),
    }
}

fn is_store_key(key: &str) -> bool {
    key == CRED_SETS_KEY || Variable::from_str(key).is_ok()
}

/// Replaces the lines for the given keys and atomically swaps the file.
///
/// Older duplicates of any store key are dropped as well, keeping the last
/// line the way [`load`] reads it. Unrelated lines are kept in place.
fn rewrite_lines(path: &Path, lines: &[(&str, String)]) -> Result<()> {
    ensure_writable(path)?;

    let existing = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == io::ErrorKind::NotFound => String::new(),
        Err(e) => return Err(EnvCredsError::io_at(path, e)),
    };

    let keyed: Vec<(&str, Option<&str>)> = existing
        .lines()
        .map(|line| (line, split_assignment(line).map(|(key, _)| key)))
        .collect();
    let mut last_seen: HashMap<&str, usize> = HashMap::new();
    for (index, (_, key)) in keyed.iter().enumerate() {
        if let Some(key) = key.filter(|key| is_store_key(key)) {
            last_seen.insert(key, index);
        }
    }

    let mut content = String::with_capacity(existing.len() + 64);
    for (index, (line, key)) in keyed.iter().enumerate() {
        let dropped = key.is_some_and(|key| {
            lines.iter().any(|(target, _)| *target == key)
                || last_seen.get(key).is_some_and(|last| *last != index)
        });
        if !dropped {
            content.push_str(line);
            content.push('\n');
        }
    }
    for (_, line) in lines {
        content.push_str(line);
        content.push('\n');
    }

    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    fs::create_dir_all(dir).map_err(|e| EnvCredsError::io_at(dir, e))?;

    // NamedTempFile is created owner-only (0600) on Unix
    let mut tmp = NamedTempFile::new_in(dir).map_err(|e| EnvCredsError::io_at(dir, e))?;
    tmp.write_all(content.as_bytes())?;
    tmp.as_file().sync_all()?;
    tmp.persist(path)
        .map_err(|e| EnvCredsError::io_at(path, e.error))?;

    debug!(
        path = %path.display(),
        keys = ?lines.iter().map(|(key, _)| *key).collect::<Vec<_>>(),
        "rewrote store"
    );
    Ok(())
}

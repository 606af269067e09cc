//! Interactive menu over a [`ConfigStore`].

use crate::config::{CredentialSet, Variable};
use crate::export::export_credentials;
use crate::store::ConfigStore;
use crate::{EnvCredsError, Result};
use colored::Colorize;
use std::io::{self, Write};
use tracing::warn;

const MASK: &str = "********";

/// Source of user input for the menu.
///
/// The terminal implementation drives `inquire`; tests feed scripted answers.
pub trait Prompt {
    /// Reads a top-level menu command.
    fn command(&mut self, message: &str) -> Result<String>;

    /// Reads a value, offering `current` as the starting text.
    fn edit(&mut self, message: &str, current: &str) -> Result<String>;

    /// Reads a secret value. Defaults to a plain edit.
    fn secret(&mut self, message: &str, current: &str) -> Result<String> {
        self.edit(message, current)
    }
}

/// `inquire`-backed prompt for a real terminal.
pub struct TerminalPrompt {
    mask_secrets: bool,
}

impl TerminalPrompt {
    pub fn new(mask_secrets: bool) -> Self {
        Self { mask_secrets }
    }
}

impl Prompt for TerminalPrompt {
    fn command(&mut self, message: &str) -> Result<String> {
        Ok(inquire::Text::new(message).prompt()?)
    }

    fn edit(&mut self, message: &str, current: &str) -> Result<String> {
        Ok(inquire::Text::new(message)
            .with_initial_value(current)
            .prompt()?)
    }

    fn secret(&mut self, message: &str, current: &str) -> Result<String> {
        if !self.mask_secrets {
            return self.edit(message, current);
        }
        let hint = if current.is_empty() {
            ""
        } else {
            " (blank keeps current)"
        };
        let value = rpassword::prompt_password(format!("{}{}: ", message, hint))?;
        Ok(if value.is_empty() {
            current.to_string()
        } else {
            value
        })
    }
}

enum Flow {
    Continue,
    Quit,
}

/// The menu loop. Owns the store for the whole session.
pub struct Menu<P, W> {
    store: ConfigStore,
    prompt: P,
    out: W,
    mask_secrets: bool,
}

impl<P: Prompt, W: Write> Menu<P, W> {
    pub fn new(store: ConfigStore, prompt: P, out: W, mask_secrets: bool) -> Self {
        Self {
            store,
            prompt,
            out,
            mask_secrets,
        }
    }

    pub fn store(&self) -> &ConfigStore {
        &self.store
    }

    pub fn into_store(self) -> ConfigStore {
        self.store
    }

    /// Runs until the user quits or interrupts the top-level prompt.
    ///
    /// Only output failures end the loop with an error; every store error is
    /// reported and the menu is shown again.
    pub fn run(&mut self) -> io::Result<()> {
        loop {
            self.render()?;
            let input = match self.prompt.command("Select an option:") {
                Ok(input) => input,
                Err(e) if e.is_prompt_abort() => return Ok(()),
                Err(e) => {
                    writeln!(self.out, "{} {}", "✗".red(), e)?;
                    return Ok(());
                }
            };
            match self.dispatch(input.trim()) {
                Ok(Flow::Continue) => {}
                Ok(Flow::Quit) => return Ok(()),
                Err(e) if e.is_prompt_abort() => writeln!(self.out, "Cancelled.")?,
                Err(e) => self.report(&e)?,
            }
        }
    }

    /// Writes the variables, credential sets and commands.
    pub fn render(&mut self) -> io::Result<()> {
        let var_count = Variable::ALL.len();
        writeln!(self.out, "\n{}", "Variables".bold())?;
        for (index, (var, value)) in self.store.variables().iter().enumerate() {
            let value = shown(self.mask_secrets, var.is_secret(), value);
            writeln!(self.out, "{:>3}) {:<8} = {}", index + 1, var.name(), value)?;
        }

        writeln!(self.out, "\n{}", "Credential sets".bold())?;
        if self.store.credential_sets().is_empty() {
            writeln!(self.out, "     {}", "(none)".dimmed())?;
        }
        for (index, (name, set)) in self.store.credential_sets().iter().enumerate() {
            let line = describe(name, set, self.mask_secrets);
            writeln!(self.out, "{:>3}) {}", var_count + index + 1, line)?;
        }

        writeln!(
            self.out,
            "\n  [A]dd  [E]dit  [D]elete  e[X]port  [C]lear all  [Q]uit"
        )
    }

    fn dispatch(&mut self, input: &str) -> Result<Flow> {
        if let Ok(number) = input.parse::<usize>() {
            self.select(number)?;
            return Ok(Flow::Continue);
        }
        match input.to_ascii_uppercase().as_str() {
            "A" => self.add()?,
            "E" => self.edit()?,
            "D" => self.delete()?,
            "X" => self.export()?,
            "C" => self.clear()?,
            "Q" => return Ok(Flow::Quit),
            _ => writeln!(
                self.out,
                "{} Unknown command '{}'",
                "✗".red(),
                input
            )?,
        }
        Ok(Flow::Continue)
    }

    /// Numbers `1..=11` edit a variable, higher numbers load a credential set.
    fn select(&mut self, number: usize) -> Result<()> {
        let var_count = Variable::ALL.len();
        if (1..=var_count).contains(&number) {
            let var = Variable::ALL[number - 1];
            let current = self.store.variables().get(var).to_string();
            let value = if var.is_secret() {
                self.prompt.secret(var.name(), &current)?
            } else {
                self.prompt.edit(var.name(), &current)?
            };
            let result = self.store.set_variable(var, value);
            return self.confirm_persisted(result, &format!("{} updated", var));
        }

        let name = number
            .checked_sub(var_count + 1)
            .and_then(|index| self.store.credential_set_at(index))
            .map(|(name, _)| name.clone());
        match name {
            Some(name) => {
                let result = self.store.apply_credential_set(&name);
                self.confirm_persisted(result, &format!("Loaded credential set '{}'", name))
            }
            None => {
                writeln!(self.out, "{} No entry numbered {}", "✗".red(), number)?;
                Ok(())
            }
        }
    }

    fn add(&mut self) -> Result<()> {
        let name = self.prompt.edit("Credential set name", "")?;
        let name = name.trim().to_string();
        if name.is_empty() {
            return Err(EnvCredsError::Validation(
                "Credential set name cannot be empty".into(),
            ));
        }
        if self.store.credential_sets().contains_key(&name) {
            writeln!(
                self.out,
                "{} '{}' already exists and will be replaced",
                "!".yellow(),
                name
            )?;
        }
        let set = self.prompt_fields(&CredentialSet::default())?;
        let result = self.store.upsert_credential_set(&name, set);
        self.confirm_persisted(result, &format!("Saved credential set '{}'", name))
    }

    fn edit(&mut self) -> Result<()> {
        let Some(name) = self.pick_credential_set("edit")? else {
            return Ok(());
        };
        let current = self.store.credential_sets()[&name].clone();
        let set = self.prompt_fields(&current)?;
        let result = self.store.upsert_credential_set(&name, set);
        self.confirm_persisted(result, &format!("Saved credential set '{}'", name))
    }

    fn delete(&mut self) -> Result<()> {
        let Some(name) = self.pick_credential_set("delete")? else {
            return Ok(());
        };
        let result = self.store.delete_credential_set(&name);
        self.confirm_persisted(result, &format!("Deleted credential set '{}'", name))
    }

    fn export(&mut self) -> Result<()> {
        let summary = export_credentials(self.store.variables(), self.store.credential_sets())?;
        writeln!(
            self.out,
            "{} Exported {} credential(s) to {} and {} ({} skipped without user and password)",
            "✓".green(),
            summary.exported,
            summary.users_path.display(),
            summary.passwords_path.display(),
            summary.skipped
        )?;
        Ok(())
    }

    fn clear(&mut self) -> Result<()> {
        let answer = self
            .prompt
            .edit("Type 'yes' to clear all variables and credential sets", "")?;
        if answer.trim() != "yes" {
            writeln!(self.out, "Cancelled.")?;
            return Ok(());
        }
        let result = self.store.clear_all();
        self.confirm_persisted(result, "Cleared all variables and credential sets")
    }

    /// Lists the credential sets numbered from 1 and asks for one.
    fn pick_credential_set(&mut self, action: &str) -> Result<Option<String>> {
        if self.store.credential_sets().is_empty() {
            writeln!(self.out, "No credential sets to {}.", action)?;
            return Ok(None);
        }
        for (index, (name, set)) in self.store.credential_sets().iter().enumerate() {
            let line = describe(name, set, self.mask_secrets);
            writeln!(self.out, "{:>3}) {}", index + 1, line)?;
        }

        let answer = self
            .prompt
            .edit(&format!("Credential set number to {}", action), "")?;
        let picked = answer
            .trim()
            .parse::<usize>()
            .ok()
            .and_then(|n| n.checked_sub(1))
            .and_then(|index| self.store.credential_set_at(index))
            .map(|(name, _)| name.clone());
        if picked.is_none() {
            writeln!(
                self.out,
                "{} No credential set numbered '{}'",
                "✗".red(),
                answer.trim()
            )?;
        }
        Ok(picked)
    }

    fn prompt_fields(&mut self, current: &CredentialSet) -> Result<CredentialSet> {
        Ok(CredentialSet {
            user: self.prompt.edit("User", &current.user)?,
            password: self.prompt.secret("Password", &current.password)?,
            nt_hash: self.prompt.secret("NT hash", &current.nt_hash)?,
            aes_key: self.prompt.secret("AES key", &current.aes_key)?,
            target: self.prompt.edit("Target", &current.target)?,
        })
    }

    /// Prints `success` or explains that the change only lives in this session.
    fn confirm_persisted(&mut self, result: Result<()>, success: &str) -> Result<()> {
        match result {
            Ok(()) => writeln!(self.out, "{} {}", "✓".green(), success)?,
            Err(e @ (EnvCredsError::PermissionDenied(_) | EnvCredsError::Io(_))) => {
                warn!(error = %e, "change not persisted");
                writeln!(
                    self.out,
                    "{} {} for this session only; not saved: {}",
                    "!".yellow(),
                    success,
                    e
                )?;
            }
            Err(e) => return Err(e),
        }
        Ok(())
    }

    fn report(&mut self, err: &EnvCredsError) -> io::Result<()> {
        writeln!(self.out, "{} {}", "✗".red(), err)
    }
}

/// One-line summary of a credential set.
pub(crate) fn describe(name: &str, set: &CredentialSet, mask_secrets: bool) -> String {
    let mut parts = vec![format!("user: {}", set.user)];
    for (label, value) in [
        ("password", &set.password),
        ("nt_hash", &set.nt_hash),
        ("aes_key", &set.aes_key),
    ] {
        if !value.is_empty() {
            parts.push(format!("{}: {}", label, shown(mask_secrets, true, value)));
        }
    }
    if !set.target.is_empty() {
        parts.push(format!("target: {}", set.target));
    }
    format!("{} ({})", name.bold(), parts.join(", "))
}

pub(crate) fn shown(mask_secrets: bool, secret: bool, value: &str) -> &str {
    if secret && mask_secrets && !value.is_empty() {
        MASK
    } else {
        value
    }
}

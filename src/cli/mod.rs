use crate::codec;
use crate::store::{self, ConfigStore};
use crate::{CredentialSets, Settings, Variables};
use clap::error::ErrorKind;
use clap::{ArgAction, ArgGroup, Parser};
use color_eyre::eyre::{Result, WrapErr};
use colored::Colorize;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

pub mod menu;


pub use menu::{Menu, Prompt, TerminalPrompt};

/// Command-line flags for envcreds.
///
/// Without a mode flag the interactive menu starts.
#[derive(Parser)]
#[command(name = "envcreds")]
#[command(about = "Engagement variables and credential sets in one file", long_about = None)]
#[command(version)]
#[command(group(ArgGroup::new("mode").args(["list", "source", "delete_all", "emit"])))]
struct Cli {
    /// Print variables and credential sets, then exit
    #[arg(short, long)]
    list: bool,
    /// Load the store into this process's environment, then list
    #[arg(short, long)]
    source: bool,
    /// Clear all variables and credential sets and truncate the store
    #[arg(short = 'd', long = "delete-all")]
    delete_all: bool,
    /// Print `export NAME='value'` lines for `eval "$(envcreds -e)"`
    #[arg(short, long)]
    emit: bool,
    /// Store file to use instead of the configured one
    #[arg(long, env = "ENVCREDS_STORE")]
    store: Option<PathBuf>,
    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,
}

/// Writes a non-interactive listing of variables and credential sets.
fn write_listing(
    out: &mut impl Write,
    variables: &Variables,
    sets: &CredentialSets,
    mask_secrets: bool,
) -> io::Result<()> {
    writeln!(out, "{}", "Variables".bold())?;
    for (var, value) in variables.iter() {
        writeln!(
            out,
            "  {:<8} = {}",
            var.name(),
            menu::shown(mask_secrets, var.is_secret(), value)
        )?;
    }
    writeln!(out, "\n{}", "Credential sets".bold())?;
    if sets.is_empty() {
        writeln!(out, "  {}", "(none)".dimmed())?;
    }
    for (name, set) in sets {
        writeln!(out, "  {}", menu::describe(name, set, mask_secrets))?;
    }
    Ok(())
}

/// Writes one `export NAME='value'` line per variable.
fn write_exports(out: &mut impl Write, variables: &Variables) -> io::Result<()> {
    for (var, value) in variables.iter() {
        writeln!(out, "export {}={}", var.name(), codec::quote(value))?;
    }
    Ok(())
}

/// Opens the store, falling back to an empty session when it cannot be read.
fn open_lenient(path: &Path) -> ConfigStore {
    let store = match ConfigStore::open(path) {
        Ok(store) => store,
        Err(e) => {
            warn!(error = %e, "store unreadable, continuing with an empty session");
            eprintln!(
                "{} Could not read {}: {}. Starting empty.",
                "!".yellow(),
                path.display(),
                e
            );
            return ConfigStore::empty(path);
        }
    };
    for warning in store.load_warnings() {
        eprintln!("{} {}", "!".yellow(), warning);
    }
    store
}

fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(io::stderr)
        .init();
}

/// Startup checks, then the menu loop.
///
/// Failing to create the configuration directory, or declining to continue
/// with a read-only store, stops before the menu is shown.
fn interactive(store_path: PathBuf, mask_secrets: bool) -> Result<()> {
    if let Some(dir) = store_path.parent() {
        fs::create_dir_all(dir).wrap_err_with(|| {
            format!("Failed to create configuration directory {}", dir.display())
        })?;
    }

    let store = open_lenient(&store_path);
    if !store.is_writable() {
        let proceed = inquire::Confirm::new(&format!(
            "{} is not writable. Continue with changes kept for this session only?",
            store_path.display()
        ))
        .with_default(false)
        .prompt()?;
        if !proceed {
            println!("Cancelled.");
            return Ok(());
        }
    }

    let mut menu = Menu::new(
        store,
        TerminalPrompt::new(mask_secrets),
        io::stdout(),
        mask_secrets,
    );
    menu.run().wrap_err("Failed to write the menu")?;
    Ok(())
}

/// Main entry point for the envcreds CLI application.
///
/// Help and version exit 0; any other argument error is printed to stderr
/// and exits 1.
pub fn main() -> Result<()> {
    color_eyre::install()?;

    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let code = match e.kind() {
                ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => 0,
                _ => 1,
            };
            e.print()?;
            std::process::exit(code);
        }
    };
    init_tracing(cli.verbose);

    let settings = Settings::load()
        .wrap_err("Failed to read envcreds settings")?
        .unwrap_or_default();
    let store_path = settings
        .store_path(cli.store)
        .wrap_err("Failed to locate the store file")?;
    let mask_secrets = settings.defaults.mask_secrets;
    let mut stdout = io::stdout().lock();

    if cli.list {
        let store = open_lenient(&store_path);
        write_listing(
            &mut stdout,
            store.variables(),
            store.credential_sets(),
            mask_secrets,
        )?;
    } else if cli.source {
        let applied = store::source_into_env(&store_path)
            .wrap_err_with(|| format!("Failed to source {}", store_path.display()))?;
        info!(applied, "sourced store into environment");
        let store = open_lenient(&store_path);
        write_listing(
            &mut stdout,
            &Variables::from_env(),
            store.credential_sets(),
            mask_secrets,
        )?;
    } else if cli.delete_all {
        let mut store = ConfigStore::empty(&store_path);
        store
            .clear_all()
            .wrap_err("Failed to clear the store")?;
        writeln!(
            stdout,
            "{} Cleared all variables and credential sets",
            "✓".green()
        )?;
    } else if cli.emit {
        let store = open_lenient(&store_path);
        write_exports(&mut stdout, store.variables())?;
    } else {
        drop(stdout);
        interactive(store_path, mask_secrets)?;
    }

    Ok(())
}

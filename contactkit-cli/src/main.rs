use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use serde::de::DeserializeOwned;
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing_subscriber::prelude::*;

use contactkit_core::{
    AppleScript, Contacts, RemovalChannel, ScriptedRemover, SqliteShell, SqliteStore,
};
use shared_types::{FindInput, GetInput, GroupsInput, MutateInput, UpsertInput};

mod config;

use config::{CliConfig, RemovalChannelKind};

#[derive(Parser, Debug)]
#[command(name = "contactkit", author, version, about = "Typed primitives over a contacts store")]
struct Cli {
    /// Config file (defaults to <config_dir>/contactkit/config.toml)
    #[arg(long, value_name = "PATH", global = true)]
    config: Option<PathBuf>,

    /// SQLite contacts database, overriding the config file
    #[arg(long, value_name = "PATH", global = true)]
    db: Option<PathBuf>,

    #[arg(long, global = true)]
    log_file_path: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the store authorization status
    Auth {
        /// Request access before reporting the status
        #[arg(long)]
        request: bool,
    },
    /// Select contact refs with a typed query
    Find(RequestArgs),
    /// Hydrate refs into contact items
    Get(RequestArgs),
    /// Create and patch contacts
    Upsert(RequestArgs),
    /// Apply explicit ops to contacts
    Mutate(RequestArgs),
    /// List, create, rename or delete groups
    Groups(RequestArgs),
}

#[derive(Args, Debug)]
struct RequestArgs {
    /// JSON request file; reads stdin when omitted or "-"
    #[arg(long, short, value_name = "PATH")]
    input: Option<PathBuf>,
}

fn init_tracing(log_file_path: Option<&str>) -> Option<tracing_appender::non_blocking::WorkerGuard> {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    if let Some(log_path) = log_file_path {
        let log_path = Path::new(log_path);
        let file_appender = tracing_appender::rolling::never(
            log_path.parent().unwrap_or(Path::new(".")),
            log_path
                .file_name()
                .unwrap_or(std::ffi::OsStr::new("contactkit.log")),
        );
        let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

        tracing_subscriber::registry()
            .with(env_filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .with_ansi(true)
                    .with_writer(std::io::stderr),
            )
            .with(
                tracing_subscriber::fmt::layer()
                    .with_ansi(false)
                    .with_writer(non_blocking),
            )
            .init();
        Some(guard)
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_writer(std::io::stderr)
            .init();
        None
    }
}

fn read_request<T: DeserializeOwned>(args: &RequestArgs) -> Result<T> {
    let raw = match args.input.as_deref() {
        Some(path) if path != Path::new("-") => std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read request from {:?}", path))?,
        _ => {
            let mut raw = String::new();
            std::io::stdin()
                .read_to_string(&mut raw)
                .context("Failed to read request from stdin")?;
            raw
        }
    };

    if raw.trim().is_empty() {
        return serde_json::from_str("{}").context("Failed to build empty request");
    }
    serde_json::from_str(&raw).context("Failed to parse JSON request")
}

fn build_remover(config: &CliConfig, db_path: &Path) -> Box<dyn RemovalChannel> {
    let program = config.removal_program();
    match config.removal_channel() {
        RemovalChannelKind::Sqlite3 => {
            Box::new(ScriptedRemover::new(SqliteShell::new(program, db_path)))
        }
        RemovalChannelKind::Osascript => Box::new(ScriptedRemover::new(AppleScript::new(program))),
    }
}

fn run(cli: &Cli, contacts: &Contacts<'_>) -> Result<serde_json::Value> {
    let response = match &cli.command {
        Command::Auth { request } => {
            let status = if *request {
                contacts.request_access()?
            } else {
                contacts.authorization_status()?
            };
            serde_json::json!({ "status": status })
        }
        Command::Find(args) => {
            let input: FindInput = read_request(args)?;
            serde_json::to_value(contacts.find(&input)?)?
        }
        Command::Get(args) => {
            let input: GetInput = read_request(args)?;
            serde_json::to_value(contacts.get(&input)?)?
        }
        Command::Upsert(args) => {
            let input: UpsertInput = read_request(args)?;
            serde_json::to_value(contacts.upsert(&input))?
        }
        Command::Mutate(args) => {
            let input: MutateInput = read_request(args)?;
            serde_json::to_value(contacts.mutate(&input))?
        }
        Command::Groups(args) => {
            let input: GroupsInput = read_request(args)?;
            serde_json::to_value(contacts.groups(&input)?)?
        }
    };
    Ok(response)
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let _guard = init_tracing(cli.log_file_path.as_deref());

    let (config, config_path) =
        CliConfig::load(cli.config.as_deref()).context("Failed to load contactkit config")?;
    tracing::debug!("Loaded config from {:?}", config_path);

    let db_path = cli.db.clone().unwrap_or_else(|| config.store_path());
    let store = SqliteStore::open(&db_path)
        .with_context(|| format!("Failed to open contacts database at {:?}", db_path))?;
    let remover = build_remover(&config, &db_path);
    let contacts = Contacts::new(&store, remover.as_ref());

    let response = run(&cli, &contacts)?;
    println!("{}", serde_json::to_string_pretty(&response)?);

    Ok(())
}

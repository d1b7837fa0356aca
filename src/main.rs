//! blobkv CLI - Command line interface for the blobkv store
//!
//! Moves small values between machines through object storage:
//!
//! ```text
//! machine-a$ blobkv store set my_name Bob
//! machine-b$ blobkv store get my_name
//! Bob
//! ```

use anyhow::Context;
use blobkv::{BackendKind, KeyValueStore, SetOptions, StoreConfig, Value};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

const SECONDS_PER_DAY: u64 = 24 * 60 * 60;

#[derive(Parser)]
#[command(name = "blobkv")]
#[command(about = "A key-value store for moving small values between machines")]
#[command(version)]
struct Cli {
    /// Namespace for keys (defaults to $USER)
    #[arg(short, long, global = true)]
    user: Option<String>,

    /// Storage backend: s3, file or memory
    #[arg(short, long, global = true)]
    backend: Option<BackendKind>,

    /// Directory used by the file backend
    #[arg(long, global = true)]
    root: Option<PathBuf>,

    /// Config file to read instead of ~/.config/blobkv/config.json
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Output format (json or text)
    #[arg(short, long, default_value = "text", global = true)]
    format: OutputFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
enum OutputFormat {
    Json,
    Text,
}

#[derive(Subcommand)]
enum Commands {
    /// Key-value store operations
    Store {
        #[command(subcommand)]
        action: StoreCommand,
    },

    /// Show the effective configuration
    Config,
}

#[derive(Subcommand)]
enum StoreCommand {
    /// Store a value under a key
    Set {
        key: String,
        /// The value, stored as a string unless --json is given
        value: String,
        /// Parse the value as a JSON document
        #[arg(long)]
        json: bool,
        /// Advisory expiry, in days
        #[arg(long)]
        ttl_days: Option<u64>,
    },

    /// Print the value stored under a key
    Get { key: String },

    /// Delete a key
    Unset { key: String },

    /// Print the value stored under a key and delete it
    Pop { key: String },

    /// List all keys
    List,

    /// Show a key's metadata
    Info { key: String },
}

fn main() -> ExitCode {
    init_logging();
    let cli = Cli::parse();
    let format = cli.format;

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            match format {
                OutputFormat::Json => output(
                    &format,
                    &serde_json::json!({
                        "status": "error",
                        "message": format!("{:#}", e),
                    }),
                ),
                OutputFormat::Text => eprintln!("{} {:#}", red_background(" Error "), e),
            }
            ExitCode::FAILURE
        }
    }
}

fn init_logging() {
    let filter = EnvFilter::try_from_env("BLOBKV_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let config = load_config(&cli)?;

    match cli.command {
        Commands::Config => {
            let mut shown = serde_json::to_value(&config)?;
            if config.secret_key.is_some() {
                shown["secret_key"] = serde_json::json!("<redacted>");
            }
            println!("{}", serde_json::to_string_pretty(&shown)?);
        }

        Commands::Store { action } => {
            let store = KeyValueStore::from_config(&config)?;
            run_store(&store, action, &cli.format)?;
        }
    }

    Ok(())
}

fn run_store(store: &KeyValueStore, action: StoreCommand, format: &OutputFormat) -> anyhow::Result<()> {
    match action {
        StoreCommand::Set {
            key,
            value,
            json,
            ttl_days,
        } => {
            let value = if json {
                let parsed: serde_json::Value =
                    serde_json::from_str(&value).context("value is not valid JSON")?;
                Value::from_json(parsed)
            } else {
                Value::String(value)
            };
            let ttl = ttl_days
                .map(|days| {
                    days.checked_mul(SECONDS_PER_DAY)
                        .with_context(|| format!("--ttl-days {} is too large", days))
                })
                .transpose()?
                .map(Duration::from_secs);
            let options = SetOptions { ttl };
            store.set_with(key.as_str(), value, &options)?;
            if *format == OutputFormat::Json {
                output(format, &serde_json::json!({ "status": "ok", "key": key }));
            }
        }

        StoreCommand::Get { key } => {
            let value = store.get(key.as_str())?;
            print_value(format, &key, &value);
        }

        StoreCommand::Unset { key } => {
            store.unset(key.as_str())?;
            if *format == OutputFormat::Json {
                output(format, &serde_json::json!({ "status": "ok", "key": key }));
            }
        }

        StoreCommand::Pop { key } => {
            let value = store.pop(key.as_str())?;
            print_value(format, &key, &value);
        }

        StoreCommand::List => {
            let keys = store
                .list_keys()
                .map(|k| k.map(|k| k.to_string()))
                .collect::<blobkv::Result<Vec<_>>>()?;
            match format {
                OutputFormat::Text => {
                    for key in keys {
                        println!("{}", key);
                    }
                }
                OutputFormat::Json => output(
                    format,
                    &serde_json::json!({ "count": keys.len(), "keys": keys }),
                ),
            }
        }

        StoreCommand::Info { key } => {
            let entry = store.get_entry(key.as_str())?;
            output(
                format,
                &serde_json::json!({
                    "key": key,
                    "object": store.object_name(key.as_str())?,
                    "type": entry.value.type_name(),
                    "written_at": entry.meta.written_at,
                    "expires_at": entry.meta.expires_at,
                    "expired": entry.is_expired(),
                    "writer": entry.meta.writer,
                }),
            );
        }
    }

    Ok(())
}

/// Defaults, config file, environment, then command-line flags
fn load_config(cli: &Cli) -> anyhow::Result<StoreConfig> {
    let mut config = match &cli.config {
        Some(path) => {
            let mut config = StoreConfig::from_file(path)?
                .with_context(|| format!("config file {} does not exist", path.display()))?;
            config.apply_env(|name| std::env::var(name).ok())?;
            config
        }
        None => StoreConfig::load()?,
    };

    if let Some(user) = &cli.user {
        config.user = user.clone();
    }
    if let Some(backend) = cli.backend {
        config.backend = backend;
    }
    if let Some(root) = &cli.root {
        config.root = Some(root.clone());
        // A root only makes sense for the file backend
        if cli.backend.is_none() {
            config.backend = BackendKind::File;
        }
    }
    Ok(config)
}

fn print_value(format: &OutputFormat, key: &str, value: &Value) {
    match format {
        OutputFormat::Text => println!("{}", value),
        OutputFormat::Json => output(
            format,
            &serde_json::json!({
                "key": key,
                "type": value.type_name(),
                "value": value.to_json(),
            }),
        ),
    }
}

fn output(format: &OutputFormat, value: &serde_json::Value) {
    match format {
        OutputFormat::Json => {
            println!("{}", value);
        }
        OutputFormat::Text => match serde_json::to_string_pretty(value) {
            Ok(pretty) => println!("{}", pretty),
            Err(_) => println!("{}", value),
        },
    }
}

fn red_background(text: &str) -> String {
    format!("\x1b[41m{}\x1b[0m", text)
}

#![forbid(unsafe_code)]

use serde_json::json;
use sq_core::ids::{CollectionName, SequenceName};
use sq_storage::{DocumentStore, SequenceCounter, SqliteStore, StoreConfig, StoreError};
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

const EXIT_ABSENT: u8 = 1;
const EXIT_USAGE: u8 = 2;
const EXIT_STORE: u8 = 3;

#[derive(Debug, PartialEq, Eq)]
enum Command {
    Help,
    Next { name: String },
    Reset { name: String, value: i64 },
    Get { name: String },
}

#[derive(Debug)]
struct CliConfig {
    store: StoreConfig,
    json: bool,
    command: Command,
}

fn usage() -> &'static str {
    "sq: named auto-increment sequences on a shared SQLite file\n\n\
USAGE:\n\
  sq [--storage-dir DIR] [--db-file FILE] [--collection NAME]\n\
     [--busy-timeout-ms MS] [--json] <COMMAND>\n\n\
COMMANDS:\n\
  next  NAME          increment NAME and print the new value\n\
  reset NAME VALUE    set NAME to VALUE and print it\n\
  get   NAME          print the current value (exit 1 if NAME does not exist)\n\n\
NOTES:\n\
  - every flag falls back to SQ_STORAGE_DIR / SQ_DB_FILE / SQ_COLLECTION /\n\
    SQ_BUSY_TIMEOUT_MS, then to built-in defaults.\n\
  - failed calls are never retried; exit code 3 reports the store error code.\n"
}

fn parse_args(args: Vec<String>, mut store: StoreConfig) -> Result<CliConfig, String> {
    if args.iter().any(|a| a == "-h" || a == "--help") {
        return Ok(CliConfig {
            store,
            json: false,
            command: Command::Help,
        });
    }

    let mut json = false;
    let mut positional = Vec::new();

    let mut i = 0usize;
    while i < args.len() {
        let a = args[i].as_str();
        match a {
            "--storage-dir" => {
                i += 1;
                let v = args.get(i).ok_or("--storage-dir requires DIR")?;
                store.storage_dir = PathBuf::from(v);
            }
            "--db-file" => {
                i += 1;
                let v = args.get(i).ok_or("--db-file requires FILE")?;
                store.db_file = v.to_string();
            }
            "--collection" => {
                i += 1;
                let v = args.get(i).ok_or("--collection requires NAME")?;
                store.collection = CollectionName::try_new(v.as_str())
                    .map_err(|_| "--collection must be a plain identifier ([A-Za-z_][A-Za-z0-9_]*)")?;
            }
            "--busy-timeout-ms" => {
                i += 1;
                let v = args.get(i).ok_or("--busy-timeout-ms requires MS")?;
                let ms = v
                    .parse::<u64>()
                    .map_err(|_| "--busy-timeout-ms must be an integer (milliseconds)")?;
                store.busy_timeout = Duration::from_millis(ms);
            }
            "--json" => json = true,
            other if other.starts_with("--") => {
                return Err(format!("unknown flag: {other}\n\n{}", usage()));
            }
            other => positional.push(other.to_string()),
        }
        i += 1;
    }

    let command = parse_command(positional)?;
    Ok(CliConfig {
        store,
        json,
        command,
    })
}

fn parse_command(positional: Vec<String>) -> Result<Command, String> {
    let mut it = positional.into_iter();
    let Some(verb) = it.next() else {
        return Err(format!("missing command\n\n{}", usage()));
    };
    let name = it.next();
    let command = match (verb.as_str(), name) {
        ("next", Some(name)) => Command::Next { name },
        ("get", Some(name)) => Command::Get { name },
        ("reset", Some(name)) => {
            let raw = it.next().ok_or("reset requires NAME VALUE")?;
            let value = raw
                .parse::<i64>()
                .map_err(|_| "reset VALUE must be a 64-bit signed integer")?;
            Command::Reset { name, value }
        }
        ("next" | "get" | "reset", None) => return Err(format!("{verb} requires NAME")),
        (other, _) => return Err(format!("unknown command: {other}\n\n{}", usage())),
    };
    if let Some(extra) = it.next() {
        return Err(format!("unexpected argument: {extra}"));
    }
    match &command {
        Command::Next { name } | Command::Get { name } | Command::Reset { name, .. }
            if name.is_empty() =>
        {
            Err("NAME must not be empty".to_string())
        }
        _ => Ok(command),
    }
}

fn render(name: &str, value: i64, as_json: bool) -> String {
    if as_json {
        json!({ "name": name, "value": value }).to_string()
    } else {
        value.to_string()
    }
}

fn run(cfg: CliConfig) -> Result<Option<String>, StoreError> {
    let connect = || SqliteStore::connect(&cfg.store).map(SequenceCounter::new);
    match cfg.command {
        Command::Help => Ok(Some(usage().to_string())),
        Command::Next { name } => {
            let value = connect()?.next_value(&name)?;
            Ok(Some(render(&name, value, cfg.json)))
        }
        Command::Reset { name, value } => {
            let value = connect()?.reset(&name, value)?;
            Ok(Some(render(&name, value, cfg.json)))
        }
        Command::Get { name } => {
            let key = SequenceName::try_new(name.as_str())
                .map_err(|_| StoreError::InvalidInput("sequence name must not be empty"))?;
            Ok(connect()?
                .store()
                .find_one(&key)?
                .map(|seq| render(&name, seq.value, cfg.json)))
        }
    }
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new("sq=warn,sq_storage=warn")
        }))
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact()
        .init();

    let base = match StoreConfig::from_env() {
        Ok(base) => base,
        Err(e) => {
            eprintln!("{e}");
            return ExitCode::from(EXIT_USAGE);
        }
    };

    let cfg = match parse_args(std::env::args().skip(1).collect(), base) {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("{e}");
            return ExitCode::from(EXIT_USAGE);
        }
    };

    match run(cfg) {
        Ok(Some(line)) => {
            println!("{line}");
            ExitCode::SUCCESS
        }
        Ok(None) => ExitCode::from(EXIT_ABSENT),
        Err(e) => {
            tracing::error!(code = e.code(), outcome = ?e.outcome(), "store call failed");
            eprintln!("{}: {e}", e.code());
            ExitCode::from(EXIT_STORE)
        }
    }
}

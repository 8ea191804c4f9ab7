use std::fmt;
use std::sync::Arc;

use microleet_core::Clock;
use microleet_core::model::{Language, ViewMode};
use services::{
    MigrationGate, PreferencesUpdate, ProgressService, ProgressServiceError, DEFAULT_POINTS_AWARD,
};
use storage::repository::Storage;

#[derive(Debug)]
enum ArgsError {
    MissingValue { flag: &'static str },
    MissingArg { what: &'static str },
    UnknownArg(String),
    InvalidPoints { raw: String },
    InvalidDbUrl { raw: String },
    InvalidPreference { raw: String },
}

impl fmt::Display for ArgsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgsError::MissingValue { flag } => write!(f, "{flag} requires a value"),
            ArgsError::MissingArg { what } => write!(f, "missing argument: {what}"),
            ArgsError::UnknownArg(arg) => write!(f, "unknown argument: {arg}"),
            ArgsError::InvalidPoints { raw } => write!(f, "invalid points value: {raw}"),
            ArgsError::InvalidDbUrl { raw } => write!(f, "invalid --db value: {raw}"),
            ArgsError::InvalidPreference { raw } => {
                write!(f, "invalid preference (expected key=value): {raw}")
            }
        }
    }
}

impl std::error::Error for ArgsError {}

fn print_usage() {
    eprintln!("Usage:");
    eprintln!("  cargo run -p app -- show                          [--db <sqlite_url>]");
    eprintln!("  cargo run -p app -- export [--out <path>]         [--db <sqlite_url>]");
    eprintln!("  cargo run -p app -- import <file>                 [--db <sqlite_url>]");
    eprintln!("  cargo run -p app -- add-points <topic> [n]        [--db <sqlite_url>]");
    eprintln!("  cargo run -p app -- complete <topic> <concept-id> [--db <sqlite_url>]");
    eprintln!("  cargo run -p app -- prefs <key=value>...          [--db <sqlite_url>]");
    eprintln!("  cargo run -p app -- reset                         [--db <sqlite_url>]");
    eprintln!();
    eprintln!("Defaults:");
    eprintln!("  --db sqlite:microleet.sqlite3");
    eprintln!();
    eprintln!("Environment:");
    eprintln!("  MICROLEET_DB_URL");
}

#[derive(Debug, Clone)]
enum Command {
    Show,
    Export { out: Option<String> },
    Import { file: String },
    AddPoints { topic: String, points: u32 },
    Complete { topic: String, concept_id: String },
    Prefs(PreferencesUpdate),
    Reset,
}

#[derive(Debug, Clone)]
struct Args {
    db_url: String,
    command: Command,
}

fn require_value(
    args: &mut impl Iterator<Item = String>,
    flag: &'static str,
) -> Result<String, ArgsError> {
    args.next().ok_or(ArgsError::MissingValue { flag })
}

fn parse_preference(update: &mut PreferencesUpdate, raw: &str) -> Result<(), ArgsError> {
    let invalid = || ArgsError::InvalidPreference {
        raw: raw.to_string(),
    };
    let (key, value) = raw.split_once('=').ok_or_else(invalid)?;
    match key {
        "dark-mode" => {
            update.dark_mode = Some(value.parse::<bool>().map_err(|_| invalid())?);
        }
        "view-mode" => {
            update.view_mode = Some(value.parse::<ViewMode>().map_err(|_| invalid())?);
        }
        "language" => {
            update.language = Some(value.parse::<Language>().map_err(|_| invalid())?);
        }
        _ => return Err(invalid()),
    }
    Ok(())
}

impl Args {
    fn parse(mut argv: impl Iterator<Item = String>) -> Result<Self, ArgsError> {
        let mut db_url = std::env::var("MICROLEET_DB_URL")
            .ok()
            .map_or_else(|| "sqlite://microleet.sqlite3".into(), normalize_sqlite_url);

        let mut subcommand: Option<String> = None;
        let mut positionals: Vec<String> = Vec::new();
        let mut out: Option<String> = None;

        while let Some(arg) = argv.next() {
            match arg.as_str() {
                "--db" => {
                    let value = require_value(&mut argv, "--db")?;
                    if value.trim().is_empty() {
                        return Err(ArgsError::InvalidDbUrl { raw: value });
                    }
                    db_url = normalize_sqlite_url(value);
                }
                "--out" => out = Some(require_value(&mut argv, "--out")?),
                "--help" | "-h" => {
                    print_usage();
                    std::process::exit(0);
                }
                other if other.starts_with("--") => {
                    return Err(ArgsError::UnknownArg(other.to_string()));
                }
                _ if subcommand.is_none() => subcommand = Some(arg),
                _ => positionals.push(arg),
            }
        }

        let mut positionals = positionals.into_iter();
        let command = match subcommand.as_deref().unwrap_or("show") {
            "show" => Command::Show,
            "export" => Command::Export { out },
            "import" => Command::Import {
                file: positionals
                    .next()
                    .ok_or(ArgsError::MissingArg { what: "<file>" })?,
            },
            "add-points" => {
                let topic = positionals
                    .next()
                    .ok_or(ArgsError::MissingArg { what: "<topic>" })?;
                let points = match positionals.next() {
                    Some(raw) => raw
                        .parse::<u32>()
                        .map_err(|_| ArgsError::InvalidPoints { raw })?,
                    None => DEFAULT_POINTS_AWARD,
                };
                Command::AddPoints { topic, points }
            }
            "complete" => Command::Complete {
                topic: positionals
                    .next()
                    .ok_or(ArgsError::MissingArg { what: "<topic>" })?,
                concept_id: positionals
                    .next()
                    .ok_or(ArgsError::MissingArg { what: "<concept-id>" })?,
            },
            "prefs" => {
                let mut update = PreferencesUpdate::default();
                let mut any = false;
                for raw in positionals.by_ref() {
                    parse_preference(&mut update, &raw)?;
                    any = true;
                }
                if !any {
                    return Err(ArgsError::MissingArg {
                        what: "<key=value>",
                    });
                }
                Command::Prefs(update)
            }
            "reset" => Command::Reset,
            other => return Err(ArgsError::UnknownArg(other.to_string())),
        };

        if let Some(extra) = positionals.next() {
            return Err(ArgsError::UnknownArg(extra));
        }

        Ok(Self { db_url, command })
    }
}

fn normalize_sqlite_url(raw: String) -> String {
    if raw == "sqlite::memory:" || raw.starts_with("sqlite://") {
        return raw;
    }

    let trimmed = raw.trim().to_string();
    let path_str = trimmed
        .strip_prefix("sqlite:")
        .unwrap_or(trimmed.as_str())
        .to_string();
    let path = std::path::Path::new(&path_str);
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .unwrap_or_else(|_| std::path::PathBuf::from("."))
            .join(path)
    };
    format!("sqlite://{}", absolute.display())
}

fn prepare_sqlite_file(db_url: &str) -> Result<(), Box<dyn std::error::Error>> {
    if db_url == "sqlite::memory:" {
        return Ok(());
    }

    let path = db_url
        .strip_prefix("sqlite://")
        .ok_or_else(|| ArgsError::InvalidDbUrl {
            raw: db_url.to_string(),
        })?;
    let path = path.split('?').next().unwrap_or(path);
    if path.is_empty() {
        return Err(ArgsError::InvalidDbUrl {
            raw: db_url.to_string(),
        }
        .into());
    }

    let path = std::path::Path::new(path);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    if !path.exists() {
        std::fs::OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(false)
            .open(path)?;
    }

    Ok(())
}

fn print_document(doc: &microleet_core::model::ProgressDocument) {
    println!("progress document v{}", doc.version);
    if doc.topics.is_empty() {
        println!("  no topic progress recorded");
    }
    for (topic, progress) in &doc.topics {
        println!(
            "  {topic}: {} points, {} concepts completed",
            progress.points,
            progress.completed_concepts.len()
        );
    }
    if !doc.problem_understanding.is_empty() {
        println!("  {} problems rated", doc.problem_understanding.len());
    }
    let dark = match doc.preferences.dark_mode {
        Some(true) => "dark",
        Some(false) => "light",
        None => "system",
    };
    println!(
        "  preferences: {dark} theme, {} view, {} samples",
        doc.preferences.view_mode, doc.preferences.language
    );
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse(std::env::args().skip(1)).map_err(|e| {
        eprintln!("{e}");
        print_usage();
        e
    })?;

    // Open + schema-migrate SQLite at startup, then run the one-time legacy
    // migration gate before anything reads the document.
    prepare_sqlite_file(&args.db_url)?;
    let storage = Storage::sqlite(&args.db_url).await?;

    let mut gate = MigrationGate::new(Arc::clone(&storage.kv));
    gate.run_once().await;

    let service = ProgressService::new(Arc::clone(&storage.kv), Clock::default_clock());

    match args.command {
        Command::Show => {
            let doc = service.load().await?;
            print_document(&doc);
        }
        Command::Export { out } => {
            let backup = service.export().await?;
            let path = out.unwrap_or_else(|| service.export_file_name());
            std::fs::write(&path, backup)?;
            println!("exported progress to {path}");
        }
        Command::Import { file } => {
            let text = std::fs::read_to_string(&file)?;
            match service.import(&text).await {
                Ok(doc) => {
                    println!("progress imported from {file}");
                    // The document was replaced wholesale; re-read it rather
                    // than trusting anything loaded earlier.
                    print_document(&doc);
                }
                Err(ProgressServiceError::Import(err)) => {
                    tracing::warn!(%err, "rejected backup file");
                    eprintln!("invalid backup file");
                    std::process::exit(1);
                }
                Err(err) => return Err(err.into()),
            }
        }
        Command::AddPoints { topic, points } => {
            let doc = service.add_points(&topic, points).await?;
            let total = doc.topic(&topic).map_or(0, |p| p.points);
            println!("{topic}: +{points} points ({total} total)");
        }
        Command::Complete { topic, concept_id } => {
            service.complete_concept(&topic, &concept_id).await?;
            println!("{topic}: completed {concept_id}");
        }
        Command::Prefs(update) => {
            let doc = service.update_preferences(update).await?;
            print_document(&doc);
        }
        Command::Reset => {
            service.reset().await?;
            println!("progress reset to defaults");
        }
    }

    Ok(())
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    if let Err(err) = run().await {
        // At this layer (binary glue), printing once is fine.
        eprintln!("{err}");
        std::process::exit(2);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Result<Args, ArgsError> {
        Args::parse(args.iter().map(|s| (*s).to_string()))
    }

    #[test]
    fn defaults_to_show() {
        let args = parse(&[]).unwrap();
        assert!(matches!(args.command, Command::Show));
    }

    #[test]
    fn add_points_uses_default_award() {
        let args = parse(&["add-points", "stack"]).unwrap();
        match args.command {
            Command::AddPoints { topic, points } => {
                assert_eq!(topic, "stack");
                assert_eq!(points, DEFAULT_POINTS_AWARD);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn every_advertised_subcommand_parses() {
        assert!(matches!(parse(&["show"]).unwrap().command, Command::Show));
        assert!(matches!(parse(&["reset"]).unwrap().command, Command::Reset));
        assert!(matches!(
            parse(&["export"]).unwrap().command,
            Command::Export { out: None }
        ));
        assert!(matches!(
            parse(&["import", "backup.json"]).unwrap().command,
            Command::Import { .. }
        ));
    }

    #[test]
    fn complete_requires_both_positionals() {
        assert!(matches!(
            parse(&["complete", "stack"]),
            Err(ArgsError::MissingArg { .. })
        ));
    }

    #[test]
    fn prefs_parses_key_value_pairs() {
        let args = parse(&["prefs", "dark-mode=true", "view-mode=list"]).unwrap();
        match args.command {
            Command::Prefs(update) => {
                assert_eq!(update.dark_mode, Some(true));
                assert_eq!(update.view_mode, Some(ViewMode::List));
                assert_eq!(update.language, None);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn rejects_unknown_preference_keys() {
        assert!(matches!(
            parse(&["prefs", "font=mono"]),
            Err(ArgsError::InvalidPreference { .. })
        ));
    }

    #[test]
    fn normalizes_bare_paths_to_sqlite_urls() {
        assert_eq!(
            normalize_sqlite_url("sqlite::memory:".into()),
            "sqlite::memory:"
        );
        assert_eq!(
            normalize_sqlite_url("sqlite:///tmp/p.sqlite3".into()),
            "sqlite:///tmp/p.sqlite3"
        );
        assert!(normalize_sqlite_url("sqlite:p.sqlite3".into()).starts_with("sqlite://"));
    }
}

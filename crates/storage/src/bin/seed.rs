//! Seeds a database with pre-migration legacy keys so the one-time progress
//! migration can be exercised against realistic data.

use std::fmt;

use microleet_core::model::LegacyKey;
use storage::repository::KeyValueStore;
use storage::sqlite::SqliteStore;

#[derive(Debug, Clone)]
struct Args {
    db_url: String,
}

#[derive(Debug)]
enum ArgsError {
    MissingValue { flag: &'static str },
    UnknownArg(String),
}

impl fmt::Display for ArgsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgsError::MissingValue { flag } => write!(f, "{flag} requires a value"),
            ArgsError::UnknownArg(arg) => write!(f, "unknown argument: {arg}"),
        }
    }
}

impl std::error::Error for ArgsError {}

impl Args {
    fn parse() -> Result<Self, ArgsError> {
        let mut db_url = std::env::var("MICROLEET_DB_URL")
            .unwrap_or_else(|_| "sqlite:microleet.sqlite3".into());

        let mut args = std::env::args().skip(1);
        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--db" => {
                    db_url = args.next().ok_or(ArgsError::MissingValue { flag: "--db" })?;
                }
                "--help" | "-h" => {
                    eprintln!("Usage: cargo run -p storage --bin seed -- [--db <sqlite_url>]");
                    std::process::exit(0);
                }
                other => return Err(ArgsError::UnknownArg(other.to_string())),
            }
        }

        Ok(Self { db_url })
    }
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse()?;

    let store = SqliteStore::connect(&args.db_url).await?;
    store.migrate().await?;

    let entries: [(LegacyKey, &str); 6] = [
        (LegacyKey::TopicPoints("array"), "12"),
        (LegacyKey::TopicPoints("tree"), "7"),
        (LegacyKey::TopicPoints("linkedList"), "25"),
        (
            LegacyKey::CompletedConcepts,
            r#"["array-0","array-1","tree-0"]"#,
        ),
        (LegacyKey::ProblemUnderstanding, r#"{"two-sum":4}"#),
        (LegacyKey::DarkMode, "true"),
    ];

    for (descriptor, value) in &entries {
        store.set(&descriptor.key(), value).await?;
    }

    println!(
        "Seeded {} legacy entries into {}",
        entries.len(),
        args.db_url
    );

    Ok(())
}

#[tokio::main]
async fn main() {
    if let Err(err) = run().await {
        eprintln!("{err}");
        std::process::exit(2);
    }
}

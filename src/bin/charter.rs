//! charter CLI.
//!
//! Resolves a repository's effective governance configuration and reports
//! every conflict, with an exit code CI can gate on: `0` resolved (errors
//! absent), `1` aborted or errors present, `2` invocation error.

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use clap::{Parser, ValueEnum};
use tracing::error;

use charter::{
    resolve_repository, CharterError, ConfigError, FailureMode, FetchOptions, RankTable,
    RunOptions, SafetyKeyTable,
};

#[derive(Parser, Debug)]
#[command(
    name = "charter",
    version,
    about = "Constitutional inheritance resolver",
    long_about = "Computes a repository's effective governance configuration from its \
                  constitution document and the Org/Team constitutions it inherits from, \
                  reporting every conflict for audit."
)]
struct Cli {
    /// Path to the repository constitution document
    repo_doc: PathBuf,

    /// Downgrade fetch failures to warnings and resolve the partial chain
    #[arg(long, conflicts_with = "strict")]
    lenient: bool,

    /// Abort the run on any fetch failure (default)
    #[arg(long)]
    strict: bool,

    /// Timeout in seconds for each URL fetch
    #[arg(long, default_value_t = 10, value_name = "SECONDS")]
    timeout: u64,

    /// Output format
    #[arg(long, value_enum, default_value_t = Format::Text)]
    format: Format,

    /// Additional parent constitution path or URL; supplements the
    /// document's inherits_from section. Can be repeated.
    #[arg(long = "parent", value_name = "PATH_OR_URL")]
    parents: Vec<String>,

    /// Load an amended precedence table from a JSON file
    #[arg(long, value_name = "JSON_PATH")]
    rank_table: Option<PathBuf>,
}

#[derive(ValueEnum, Debug, Clone, Copy)]
enum Format {
    Text,
    Json,
}

fn load_rank_table(path: Option<&PathBuf>) -> Result<RankTable, CharterError> {
    let Some(path) = path else {
        return Ok(RankTable::default());
    };
    let text = std::fs::read_to_string(path).map_err(|e| {
        CharterError::Config(ConfigError::UnreadableRankTable {
            path: path.to_string_lossy().into_owned(),
            message: e.to_string(),
        })
    })?;
    Ok(RankTable::from_json(&text)?)
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let rank_table = match load_rank_table(cli.rank_table.as_ref()) {
        Ok(table) => table,
        Err(e) => {
            error!("{e}");
            eprintln!("error: {e}");
            return exit_code_of(&e);
        }
    };

    let options = RunOptions {
        root: cli.repo_doc,
        extra_parents: cli.parents,
        fetch: FetchOptions {
            mode: if cli.lenient {
                FailureMode::Lenient
            } else {
                FailureMode::Strict
            },
            timeout: Duration::from_secs(cli.timeout),
        },
        rank_table,
        safety_keys: SafetyKeyTable::default(),
    };

    match resolve_repository(options).await {
        Ok(report) => {
            match cli.format {
                Format::Json => println!("{}", report.to_json()),
                Format::Text => println!("{}", report.to_text()),
            }
            match u8::try_from(report.exit_code()) {
                Ok(code) => ExitCode::from(code),
                Err(_) => ExitCode::FAILURE,
            }
        }
        Err(e) => {
            eprintln!("error: {e}");
            exit_code_of(&e)
        }
    }
}

fn exit_code_of(error: &CharterError) -> ExitCode {
    match u8::try_from(error.exit_code()) {
        Ok(code) => ExitCode::from(code),
        Err(_) => ExitCode::FAILURE,
    }
}

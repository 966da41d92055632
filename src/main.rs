use std::io::Read;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use competency_mastery::config::Config;
use competency_mastery::db::{MemoryStore, SqliteProgressRepository, StoreError};
use competency_mastery::logging;
use competency_mastery::mastery::snapshot::{MasterySnapshot, SnapshotError};
use competency_mastery::services::{CompetencyProgressService, ServiceError};

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error(transparent)]
    Snapshot(#[from] SnapshotError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Service(#[from] ServiceError),
    #[error("failed to encode report: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("usage: competency-mastery [--store] [snapshot.json | -]")]
    Usage,
}

struct Args {
    store: bool,
    source: Option<String>,
}

fn parse_args() -> Result<Args, CliError> {
    let mut args = Args {
        store: false,
        source: None,
    };
    for arg in std::env::args().skip(1) {
        match arg.as_str() {
            "--store" => args.store = true,
            "-h" | "--help" => return Err(CliError::Usage),
            _ if args.source.is_none() => args.source = Some(arg),
            _ => return Err(CliError::Usage),
        }
    }
    Ok(args)
}

#[tokio::main]
async fn main() -> ExitCode {
    let _ = dotenvy::dotenv();
    let config = Config::from_env();
    let _log_guard = logging::init_tracing(&config);

    let result = match parse_args() {
        Ok(args) => run(&config, args).await,
        Err(err) => Err(err),
    };

    match result {
        Ok(output) => {
            println!("{output}");
            ExitCode::SUCCESS
        }
        Err(err) => {
            tracing::error!(error = %err, "competency-mastery failed");
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}

async fn run(config: &Config, args: Args) -> Result<String, CliError> {
    let snapshot = read_snapshot(args.source.as_deref())?;
    if args.store {
        return store(config, &snapshot).await;
    }

    let report = snapshot.evaluate();
    tracing::info!(
        progress = report.progress,
        confidence = report.confidence,
        mastered = report.mastered,
        "evaluated snapshot"
    );
    Ok(serde_json::to_string_pretty(&report)?)
}

/// Reads a snapshot from the given path, or from stdin for `-` or no argument.
fn read_snapshot(source: Option<&str>) -> Result<MasterySnapshot, SnapshotError> {
    match source {
        None | Some("-") => {
            let mut raw = String::new();
            std::io::stdin().read_to_string(&mut raw)?;
            MasterySnapshot::from_json(&raw)
        }
        Some(path) => MasterySnapshot::from_path(&PathBuf::from(path)),
    }
}

async fn store(config: &Config, snapshot: &MasterySnapshot) -> Result<String, CliError> {
    let inputs = Arc::new(MemoryStore::from_snapshot(snapshot));
    let repository = SqliteProgressRepository::open(&config.database_path).await?;
    tracing::info!(path = %config.database_path.display(), "opened progress database");

    let mut service =
        CompetencyProgressService::new(inputs.clone(), Arc::new(repository), inputs)
            .with_debounce(config.debounce_window());
    if let Some(params) = snapshot.params.clone() {
        service = service.with_params(params);
    }

    let state = service
        .update_competency_progress(snapshot.competency_id, snapshot.user_id)
        .await?;
    tracing::info!(
        competency_id = snapshot.competency_id,
        user_id = snapshot.user_id,
        "stored competency progress"
    );
    Ok(serde_json::to_string_pretty(&state)?)
}

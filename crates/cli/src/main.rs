use crate::{
    commands::{Commands, SyncArgs},
    env::{EnvManager, redact},
    error::CliError,
    shutdown::{ExitCode, ShutdownCoordinator},
};
use clap::Parser;
use engine_core::state::{CursorStore, JsonFileCursorStore};
use engine_runtime::{
    execution::{SyncEngine, factory},
    settings::{self, StoreSettings, SyncSettings},
};
use model::core::identifiers::DatasetKey;
use std::path::{Path, PathBuf};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

mod commands;
mod env;
mod error;
mod output;
mod shutdown;

#[derive(Parser)]
#[command(name = "docsync", version, about = "Incremental document store to CSV sync")]
struct Cli {
    #[arg(long, global = true, help = "Load settings from this .env file")]
    env_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[tokio::main]
async fn main() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let cli = Cli::parse();

    let code = match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            error!("{e}");
            ExitCode::GeneralError
        }
    };
    std::process::exit(code.as_i32());
}

async fn run(cli: Cli) -> Result<ExitCode, CliError> {
    let mut env = EnvManager::new();
    match &cli.env_file {
        Some(path) => env.load_from_file(path)?,
        None => env.load_default_file()?,
    }
    let vars = env.all();

    match cli.command {
        Commands::Sync(args) => {
            let settings = SyncSettings::from_env(vars)?;
            sync(settings, args).await
        }
        Commands::Cursors { json } => {
            let store = factory::open_cursor_store(&StoreSettings::from_env(vars)?)?;
            output::print_cursors(&store.load().await?, json)?;
            Ok(ExitCode::Success)
        }
        Commands::Reset { dataset } => {
            let store = factory::open_cursor_store(&StoreSettings::from_env(vars)?)?;
            reset(&*store, &dataset).await?;
            Ok(ExitCode::Success)
        }
        Commands::ImportSnapshot { file } => {
            let store = factory::open_cursor_store(&StoreSettings::from_env(vars)?)?;
            import_snapshot(&*store, &file).await?;
            Ok(ExitCode::Success)
        }
        Commands::Ping => {
            let db_uri = settings::db_uri_from_env(vars)?;
            info!("Pinging document store at {}", redact(&db_uri));
            let source = factory::create_source(&db_uri).await?;
            source.ping().await?;
            info!("Document store is reachable");
            Ok(ExitCode::Success)
        }
    }
}

async fn sync(mut settings: SyncSettings, args: SyncArgs) -> Result<ExitCode, CliError> {
    if let Some(policy) = args.cursor_policy {
        settings.run.cursor_policy = policy;
    }
    if let Some(limit) = args.max_concurrency {
        settings.run.max_concurrency = limit;
    }
    if let Some(dir) = args.staging_dir {
        settings.run.staging_dir = dir;
    }

    info!(
        "Syncing from {} to {} ({} cursors)",
        redact(&settings.db_uri),
        settings.storage_url,
        settings.run.cursor_policy
    );

    let store = factory::open_cursor_store(&settings.store)?;
    let source = factory::create_source(&settings.db_uri).await?;
    let sink = factory::create_sink(&settings).await?;

    let shutdown = ShutdownCoordinator::new(CancellationToken::new());
    shutdown.register_handlers();

    let engine = SyncEngine::new(source, sink, store, settings.run.clone());
    let report = engine.run(shutdown.cancel_token()).await?;
    output::print_report(&report, args.json)?;

    if shutdown.is_shutdown_requested() {
        return Ok(ExitCode::ShutdownRequested);
    }
    Ok(exit_code_for(report.has_failures(), args.strict))
}

fn exit_code_for(has_failures: bool, strict: bool) -> ExitCode {
    if has_failures && strict {
        ExitCode::GeneralError
    } else {
        ExitCode::Success
    }
}

async fn reset(store: &dyn CursorStore, dataset: &str) -> Result<(), CliError> {
    let key = DatasetKey::from(dataset);
    if !store.remove(&key).await? {
        return Err(CliError::UnknownDataset(dataset.to_string()));
    }
    info!(dataset = %key, "Cursor removed; the next run starts from the beginning");
    Ok(())
}

/// Merges a legacy cursor file. Keys already in the store are overwritten.
async fn import_snapshot(store: &dyn CursorStore, file: &Path) -> Result<(), CliError> {
    let snapshot = JsonFileCursorStore::read_legacy(file).await?;
    if snapshot.is_empty() {
        warn!("{} holds no cursors, nothing imported", file.display());
        return Ok(());
    }

    store.save(&snapshot).await?;
    info!("Imported {} cursors from {}", snapshot.len(), file.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use engine_core::state::SledCursorStore;
    use model::pagination::cursor::Cursor;
    use tempfile::tempdir;

    #[test]
    fn strict_mode_turns_failures_into_exit_code() {
        assert_eq!(exit_code_for(true, false), ExitCode::Success);
        assert_eq!(exit_code_for(true, true), ExitCode::GeneralError);
        assert_eq!(exit_code_for(false, true), ExitCode::Success);
    }

    #[tokio::test]
    async fn import_merges_legacy_file_into_store() {
        let dir = tempdir().unwrap();
        let store = SledCursorStore::open(dir.path().join("state")).unwrap();
        store
            .upsert(&DatasetKey::from("keep.me"), &Cursor::identifier("1"))
            .await
            .unwrap();

        let legacy = dir.path().join("snapshot.json");
        tokio::fs::write(
            &legacy,
            r#"{"shop.orders": "64b7f0c2a1b2c3d4e5f60718", "fx.rates": "2024-05-01T10:00:00+02:00"}"#,
        )
        .await
        .unwrap();

        import_snapshot(&store, &legacy).await.unwrap();

        let snapshot = store.load().await.unwrap();
        assert_eq!(snapshot.len(), 3);
        assert_eq!(
            snapshot[&DatasetKey::from("fx.rates")].to_string(),
            "2024-05-01T08:00:00Z"
        );
    }

    #[tokio::test]
    async fn reset_of_unknown_dataset_is_an_error() {
        let dir = tempdir().unwrap();
        let store = JsonFileCursorStore::new(dir.path().join("snapshot.json"));
        store
            .upsert(&DatasetKey::from("shop.orders"), &Cursor::identifier("1"))
            .await
            .unwrap();

        reset(&store, "shop.orders").await.unwrap();
        assert!(store.load().await.unwrap().is_empty());

        let err = reset(&store, "shop.orders").await.unwrap_err();
        assert!(matches!(err, CliError::UnknownDataset(_)));
    }
}

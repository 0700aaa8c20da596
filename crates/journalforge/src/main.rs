//! journalforge — CLI entry point for the multi-tier journal aggregation
//! pipeline.
//!
//! Three operations, matching the Coordinator's external interface
//! (spec §6): `run` drives the pipeline from its current phase through to
//! completion, `status` reads Pipeline State without mutating it, `reset`
//! drops the pipeline back to `idle` (artifacts are preserved).

mod config;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use journalforge_core::{Coordinator, CoordinatorConfig};
use journalforge_db::DbConfig;
use journalforge_llm::{GatewayConfig, HttpLlmGateway, LlmGateway, RateBucketConfig};
use journalforge_objectstore::{FsObjectStore, ObjectStore};
use journalforge_worker::{AggregatorWorker, ExtractorWorker};

use config::PipelineTunables;

#[derive(Parser, Debug)]
#[command(name = "journalforge", about = "Multi-tier journal aggregation pipeline")]
struct Cli {
    /// Directory containing `manifest.json` and a `journals/` subdirectory
    /// (the object store layout, §6).
    #[arg(long, env = "JOURNALFORGE_JOURNALS_DIR", default_value = ".")]
    journals_dir: PathBuf,

    /// SQLite file backing the Persistence Layer and Content Cache.
    #[arg(long, env = "JOURNALFORGE_DB_PATH", default_value = "journalforge.db")]
    db_path: PathBuf,

    /// Path to an optional `config.toml` carrying `[pipeline]` tunables.
    #[arg(long, env = "JOURNALFORGE_CONFIG")]
    config: Option<PathBuf>,

    /// Emit machine-readable JSON instead of human-readable text.
    #[arg(long, global = true)]
    json: bool,

    /// Verbose console logging (mirrors file logging instead of being
    /// filtered to warnings-and-above).
    #[arg(short = 'v', long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Drive the pipeline from its current phase through to `complete`.
    Run,
    /// Read Pipeline State without mutating it.
    Status,
    /// Drop the pipeline back to `idle`. Artifacts are preserved.
    Reset,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    journalforge_logging::init_logging(journalforge_logging::LogConfig {
        app_name: "journalforge",
        verbose: cli.verbose,
        quiet_console: cli.json,
    })
    .context("failed to initialize logging")?;

    let tunables = match &cli.config {
        Some(path) => config::load_pipeline_tunables(path).context("failed to load config.toml")?,
        None => {
            let default_path = config::default_config_path();
            config::load_pipeline_tunables(&default_path).context("failed to load config.toml")?
        }
    };

    let coordinator = build_coordinator(&cli.journals_dir, &cli.db_path, &tunables).await?;

    let state = match cli.command {
        Command::Run => coordinator
            .start()
            .await
            .context("pipeline run failed")?,
        Command::Status => coordinator.status().await.context("failed to read pipeline state")?,
        Command::Reset => {
            coordinator.reset().await.context("failed to reset pipeline state")?;
            coordinator.status().await.context("failed to read pipeline state")?
        }
    };

    print_state(&state, cli.json)?;

    if !state.warnings.is_empty() {
        std::process::exit(1);
    }
    Ok(())
}

async fn build_coordinator(
    journals_dir: &std::path::Path,
    db_path: &std::path::Path,
    tunables: &PipelineTunables,
) -> Result<Coordinator> {
    let db_config = DbConfig::sqlite(db_path.display().to_string());
    let (persistence, cache) = journalforge_db::open(db_config)
        .await
        .context("failed to open persistence database")?;

    let object_store: Arc<dyn ObjectStore> = Arc::new(FsObjectStore::new(journals_dir));

    let mut gateway_config = GatewayConfig::from_env().map_err(anyhow::Error::msg)?;
    gateway_config.max_retries = tunables.max_retries;
    gateway_config.rate = RateBucketConfig {
        requests_per_minute: tunables.requests_per_minute,
        daily_ceiling: tunables.daily_ceiling,
    };
    let gateway: Arc<dyn LlmGateway> = Arc::new(HttpLlmGateway::new(gateway_config));

    let extractor = ExtractorWorker::new(persistence.clone(), cache.clone(), object_store.clone(), gateway.clone());
    let aggregator = AggregatorWorker::new(persistence.clone(), cache, gateway);

    let coordinator_config = CoordinatorConfig {
        max_concurrent_jobs: tunables.max_concurrent_jobs,
    };

    Ok(Coordinator::new(
        persistence,
        object_store,
        extractor,
        aggregator,
        coordinator_config,
    ))
}

fn print_state(state: &journalforge_types::PipelineState, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(state)?);
        return Ok(());
    }

    println!("phase:             {}", state.phase);
    println!("total entries:     {}", state.total_entries);
    println!("processed entries: {}", state.processed_entries);
    if let Some(started) = state.started_at {
        println!("started at:        {started}");
    }
    if let Some(completed) = state.completed_at {
        println!("completed at:      {completed}");
    }
    if state.warnings.is_empty() {
        println!("warnings:          none");
    } else {
        println!("warnings:");
        for warning in &state.warnings {
            println!("  - {warning}");
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_well_formed() {
        Cli::command().debug_assert();
    }

    #[test]
    fn status_subcommand_parses_with_defaults() {
        let cli = Cli::parse_from(["journalforge", "status"]);
        assert!(matches!(cli.command, Command::Status));
        assert_eq!(cli.db_path, PathBuf::from("journalforge.db"));
        assert!(!cli.json);
    }

    #[test]
    fn run_subcommand_honors_overridden_paths() {
        let cli = Cli::parse_from([
            "journalforge",
            "--journals-dir",
            "/tmp/corpus",
            "--db-path",
            "/tmp/state.db",
            "--json",
            "run",
        ]);
        assert!(matches!(cli.command, Command::Run));
        assert_eq!(cli.journals_dir, PathBuf::from("/tmp/corpus"));
        assert_eq!(cli.db_path, PathBuf::from("/tmp/state.db"));
        assert!(cli.json);
    }
}

use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use env_logger::Env;
use git_ingest::config::{Args, Config};
use git_ingest::external::{LocalObjectStore, LogStatusReporter, NdjsonPublisher, PassthroughResolver};
use git_ingest::loc::{ClocCommitTool, GitopsLocTool};
use git_ingest::orphan::ScriptOrphanTool;
use git_ingest::sync::controller::{Collaborators, SyncController};
use git_ingest::sync::git::SystemGit;

#[tokio::main]
async fn main() -> ExitCode {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    let config = match Config::resolve(Args::parse()) {
        Ok(config) => config,
        Err(e) => {
            log::error!("{e}");
            return ExitCode::FAILURE;
        }
    };

    let collaborators = Collaborators {
        git: Arc::new(SystemGit::new()),
        loc_tool: Arc::new(GitopsLocTool::new(config.loc_tool_failure_mode)),
        cloc_tool: Arc::new(ClocCommitTool::new(config.loc_tool_failure_mode)),
        orphan_tool: Arc::new(ScriptOrphanTool::new()),
        resolver: Arc::new(PassthroughResolver { configured_id: config.git_source_id.clone() }),
        publisher: Arc::new(NdjsonPublisher::new(config.git_cache_path.clone())),
        status: Arc::new(LogStatusReporter::new(config.git_cache_path.clone())),
        object_store: Arc::new(LocalObjectStore::new(config.git_cache_path.clone())),
    };

    let controller = SyncController::new(config, collaborators);
    match controller.run().await {
        Ok(summary) => {
            log::info!(
                "sync complete: {} created, {} updated, {} skipped, {} errors",
                summary.created,
                summary.updated,
                summary.skipped,
                summary.errors
            );
            ExitCode::SUCCESS
        }
        Err(e) => {
            log::error!("sync failed: {e}");
            ExitCode::FAILURE
        }
    }
}

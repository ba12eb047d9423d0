//! Kanban Graph Server
//!
//! REST backend for kanban projects with cycle-free task dependencies,
//! stored in SQLite or PostgreSQL.

use anyhow::{Result, bail};
use clap::Parser;
use kanban_graph::api;
use kanban_graph::cli::{Cli, Command};
use kanban_graph::config::Config;
use kanban_graph::db::{DependencyGraph, open_store};
use kanban_graph::logging::{self, LogTarget};
use kanban_graph::types::TaskSummary;
use serde_json::json;
use tracing::{info, warn};

/// Resolve when the process receives Ctrl-C.
async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    logging::init(&LogTarget::parse(&cli.log), cli.verbose)?;

    let mut config = Config::resolve(cli.config.as_deref())?;
    cli.apply_overrides(&mut config);
    config.validate()?;

    let store = open_store(&config.database).await?;
    info!(backend = ?config.database.backend, "Store opened");

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => {
            api::serve(
                store,
                &config.server.host,
                config.server.port,
                shutdown_signal(),
            )
            .await?;
        }
        Command::Migrate => {
            info!("Database schema is up to date");
        }
        Command::CheckDeps { project } => {
            if store.get_project(project).await?.is_none() {
                bail!("project {} not found", project);
            }
            let graph = DependencyGraph::new(store);
            let dependencies = graph.list_dependencies(project).await?;
            let blocked: Vec<TaskSummary> = graph
                .blocked_tasks(project)
                .await?
                .iter()
                .map(|t| t.summary())
                .collect();
            let report = json!({
                "project_id": project,
                "dependencies": dependencies,
                "blocked": blocked,
            });
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
    }

    Ok(())
}

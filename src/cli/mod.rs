//! CLI command definitions for kanban-graph
//!
//! This module defines the CLI structure using clap's derive macros.
//! The main entry point is the `Cli` struct which contains subcommands.

use crate::config::{Config, DatabaseBackend};
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Backend selector accepted on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum BackendArg {
    Sqlite,
    Postgres,
}

impl From<BackendArg> for DatabaseBackend {
    fn from(arg: BackendArg) -> Self {
        match arg {
            BackendArg::Sqlite => DatabaseBackend::Sqlite,
            BackendArg::Postgres => DatabaseBackend::Postgres,
        }
    }
}

/// Kanban board server with task dependency tracking
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Path to SQLite database file (overrides config)
    #[arg(short, long, global = true)]
    pub database: Option<PathBuf>,

    /// Storage backend (overrides config)
    #[arg(long, value_enum, global = true)]
    pub backend: Option<BackendArg>,

    /// PostgreSQL connection URL (overrides config)
    #[arg(long, global = true)]
    pub database_url: Option<String>,

    /// HTTP listen port (overrides config)
    #[arg(short, long, global = true)]
    pub port: Option<u16>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Logging output: 0/off, 1/stdout, 2/stderr (default), or filename
    #[arg(short, long, default_value = "2", global = true)]
    pub log: String,

    #[command(subcommand)]
    pub command: Option<Command>,
}

impl Cli {
    /// Apply command-line overrides on top of file and environment config.
    pub fn apply_overrides(&self, config: &mut Config) {
        if let Some(path) = &self.database {
            config.database.sqlite_path = path.clone();
        }
        if let Some(backend) = self.backend {
            config.database.backend = backend.into();
        }
        if let Some(url) = &self.database_url {
            config.database.postgres_url = Some(url.clone());
        }
        if let Some(port) = self.port {
            config.server.port = port;
        }
    }
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Start the HTTP API server (default if no subcommand given)
    Serve,

    /// Open the database, apply schema migrations and exit
    Migrate,

    /// Print a project's dependency edges and blocked tasks as JSON
    CheckDeps {
        /// Project to inspect
        #[arg(long)]
        project: i64,
    },
}

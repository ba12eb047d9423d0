//! Configuration loading and management.
//!
//! Sources, first found wins: an explicit `--config` file, `./kanban.yaml`,
//! `~/.kanban/config.yaml`, then built-in defaults. Environment variables are
//! applied on top:
//! - `KANBAN_HOST` / `KANBAN_PORT` - HTTP listen address
//! - `KANBAN_DB_BACKEND` - `sqlite` or `postgres`
//! - `KANBAN_DB_PATH` - SQLite database file
//! - `KANBAN_DATABASE_URL` - PostgreSQL connection URL

use anyhow::{Result, bail};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Server configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub database: DatabaseConfig,
}

/// HTTP listener configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    3001
}

/// Which store implementation to open at startup.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DatabaseBackend {
    #[default]
    Sqlite,
    Postgres,
}

impl FromStr for DatabaseBackend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "sqlite" => Ok(DatabaseBackend::Sqlite),
            "postgres" | "postgresql" => Ok(DatabaseBackend::Postgres),
            other => bail!("unknown database backend: {}", other),
        }
    }
}

/// Database configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default)]
    pub backend: DatabaseBackend,

    /// Path to the SQLite database file.
    #[serde(default = "default_sqlite_path")]
    pub sqlite_path: PathBuf,

    /// PostgreSQL connection URL, required when `backend` is `postgres`.
    #[serde(default)]
    pub postgres_url: Option<String>,

    /// Pool size for the PostgreSQL backend.
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            backend: DatabaseBackend::default(),
            sqlite_path: default_sqlite_path(),
            postgres_url: None,
            max_connections: default_max_connections(),
        }
    }
}

fn default_sqlite_path() -> PathBuf {
    PathBuf::from(".kanban/kanban.db")
}

fn default_max_connections() -> u32 {
    5
}

impl Config {
    /// Load configuration from file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    pub fn from_yaml(content: &str) -> Result<Self> {
        let config: Config = serde_yaml::from_str(content)?;
        Ok(config)
    }

    /// Load from `explicit` if given, otherwise from the default locations,
    /// then apply environment overrides.
    pub fn resolve(explicit: Option<&Path>) -> Result<Self> {
        let mut config = match explicit {
            Some(path) => Self::load(path)?,
            None => Self::default_locations()
                .into_iter()
                .find(|p| p.is_file())
                .map(Self::load)
                .transpose()?
                .unwrap_or_default(),
        };
        config.apply_env(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    fn default_locations() -> Vec<PathBuf> {
        let mut paths = vec![PathBuf::from("kanban.yaml")];
        if let Some(home) = dirs::home_dir() {
            paths.push(home.join(".kanban").join("config.yaml"));
        }
        paths
    }

    /// Apply `KANBAN_*` overrides read through `var`.
    pub fn apply_env<F>(&mut self, var: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(host) = var("KANBAN_HOST") {
            self.server.host = host;
        }

        if let Some(port) = var("KANBAN_PORT") {
            if let Ok(port) = port.parse() {
                self.server.port = port;
            }
        }

        if let Some(backend) = var("KANBAN_DB_BACKEND") {
            self.database.backend = backend.parse()?;
        }

        if let Some(path) = var("KANBAN_DB_PATH") {
            self.database.sqlite_path = PathBuf::from(path);
        }

        if let Some(url) = var("KANBAN_DATABASE_URL") {
            self.database.postgres_url = Some(url);
        }

        Ok(())
    }

    /// Reject combinations that cannot open a store.
    pub fn validate(&self) -> Result<()> {
        if self.database.backend == DatabaseBackend::Postgres
            && self.database.postgres_url.as_deref().is_none_or(str::is_empty)
        {
            bail!("database.backend is postgres but database.postgres_url is not set");
        }
        if self.database.max_connections == 0 {
            bail!("database.max_connections must be at least 1");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn empty_yaml_gives_defaults() {
        let config = Config::from_yaml("{}").unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.server.port, 3001);
        assert_eq!(config.database.backend, DatabaseBackend::Sqlite);
    }

    #[test]
    fn parses_postgres_section() {
        let config = Config::from_yaml(
            "server:\n  port: 8080\ndatabase:\n  backend: postgres\n  postgres_url: postgres://localhost/kanban\n  max_connections: 10\n",
        )
        .unwrap();

        assert_eq!(config.server.port, 8080);
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.database.backend, DatabaseBackend::Postgres);
        assert_eq!(
            config.database.postgres_url.as_deref(),
            Some("postgres://localhost/kanban")
        );
        assert_eq!(config.database.max_connections, 10);
        config.validate().unwrap();
    }

    #[test]
    fn env_overrides_file_values() {
        let env: HashMap<&str, &str> = [
            ("KANBAN_PORT", "9000"),
            ("KANBAN_DB_BACKEND", "postgres"),
            ("KANBAN_DATABASE_URL", "postgres://db/kanban"),
        ]
        .into_iter()
        .collect();

        let mut config = Config::default();
        config
            .apply_env(|key| env.get(key).map(|v| v.to_string()))
            .unwrap();

        assert_eq!(config.server.port, 9000);
        assert_eq!(config.database.backend, DatabaseBackend::Postgres);
        assert_eq!(
            config.database.postgres_url.as_deref(),
            Some("postgres://db/kanban")
        );
    }

    #[test]
    fn unknown_backend_is_rejected() {
        let mut config = Config::default();
        let result = config.apply_env(|key| (key == "KANBAN_DB_BACKEND").then(|| "mysql".into()));
        assert!(result.is_err());
    }

    #[test]
    fn postgres_without_url_fails_validation() {
        let mut config = Config::default();
        config.database.backend = DatabaseBackend::Postgres;
        assert!(config.validate().is_err());
    }

    #[test]
    fn load_reads_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("kanban.yaml");
        std::fs::write(&path, "database:\n  sqlite_path: /tmp/board.db\n").unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.database.sqlite_path, PathBuf::from("/tmp/board.db"));
    }
}

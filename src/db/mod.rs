//! Database layer: the store abstraction and its SQLite and PostgreSQL backends.

pub mod deps;
pub mod postgres;
pub mod sqlite;

use crate::config::{DatabaseBackend, DatabaseConfig};
use crate::types::{
    Board, BoardId, Column, ColumnId, Dependency, NewBoard, NewColumn, NewProject, NewTask,
    Project, ProjectId, Task, TaskId, TaskSummary, TaskUpdate,
};
use anyhow::{Result, anyhow};
use async_trait::async_trait;
use std::sync::Arc;

pub use deps::{DependencyGraph, GraphError, GraphResult};
pub use postgres::PostgresStore;
pub use sqlite::SqliteStore;

/// Persistent storage for projects, boards, columns, tasks and dependency edges.
///
/// Deleting a task removes every dependency edge that references it. Deleting
/// a project removes everything beneath it.
#[async_trait]
pub trait TaskStore: Send + Sync {
    async fn create_project(&self, input: NewProject) -> Result<Project>;
    async fn get_project(&self, id: ProjectId) -> Result<Option<Project>>;
    async fn list_projects(&self) -> Result<Vec<Project>>;
    /// Returns false if the project did not exist.
    async fn delete_project(&self, id: ProjectId) -> Result<bool>;

    async fn create_board(&self, project_id: ProjectId, input: NewBoard) -> Result<Board>;
    async fn get_board(&self, id: BoardId) -> Result<Option<Board>>;
    async fn list_boards(&self, project_id: ProjectId) -> Result<Vec<Board>>;

    async fn create_column(&self, board_id: BoardId, input: NewColumn) -> Result<Column>;
    async fn list_columns(&self, board_id: BoardId) -> Result<Vec<Column>>;
    /// Project owning the column's board, if the column exists.
    async fn column_project(&self, id: ColumnId) -> Result<Option<ProjectId>>;

    async fn create_task(&self, project_id: ProjectId, input: NewTask) -> Result<Task>;
    async fn get_task(&self, id: TaskId) -> Result<Option<Task>>;
    async fn list_tasks(&self, project_id: ProjectId) -> Result<Vec<Task>>;
    async fn update_task(&self, id: TaskId, update: TaskUpdate) -> Result<Option<Task>>;
    /// Returns false if the task did not exist.
    async fn delete_task(&self, id: TaskId) -> Result<bool>;

    async fn task_summary(&self, id: TaskId) -> Result<Option<TaskSummary>>;
    /// Summaries of the tasks `id` depends on.
    async fn blocked_by(&self, id: TaskId) -> Result<Vec<TaskSummary>>;
    /// Summaries of the tasks that depend on `id`.
    async fn blocking(&self, id: TaskId) -> Result<Vec<TaskSummary>>;
    async fn list_dependencies(&self, project_id: ProjectId) -> Result<Vec<Dependency>>;

    /// Open a write transaction for dependency mutations.
    ///
    /// Writers are serialised for the lifetime of the returned handle.
    async fn begin(&self) -> Result<Box<dyn StoreTx>>;
}

/// A write transaction over the dependency edge set.
///
/// Dropping the handle without calling [`StoreTx::commit`] rolls back.
#[async_trait]
pub trait StoreTx: Send {
    /// Project of the task, or `None` if the task does not exist.
    async fn task_project(&mut self, id: TaskId) -> Result<Option<ProjectId>>;
    async fn dependency_exists(&mut self, task_id: TaskId, depends_on: TaskId) -> Result<bool>;
    /// Ids of the tasks `task_id` depends on.
    async fn depends_on(&mut self, task_id: TaskId) -> Result<Vec<TaskId>>;
    async fn insert_dependency(&mut self, task_id: TaskId, depends_on: TaskId)
    -> Result<Dependency>;
    /// Returns false if the edge was not present.
    async fn delete_dependency(&mut self, task_id: TaskId, depends_on: TaskId) -> Result<bool>;
    async fn commit(self: Box<Self>) -> Result<()>;
}

/// Open the backend selected by the configuration.
pub async fn open_store(config: &DatabaseConfig) -> Result<Arc<dyn TaskStore>> {
    match config.backend {
        DatabaseBackend::Sqlite => {
            if let Some(parent) = config.sqlite_path.parent() {
                if !parent.as_os_str().is_empty() {
                    std::fs::create_dir_all(parent)?;
                }
            }
            let store = SqliteStore::open(&config.sqlite_path)?;
            Ok(Arc::new(store))
        }
        DatabaseBackend::Postgres => {
            let url = config
                .postgres_url
                .as_deref()
                .ok_or_else(|| anyhow!("postgres backend selected but no postgres_url configured"))?;
            let store = PostgresStore::connect(url, config.max_connections).await?;
            Ok(Arc::new(store))
        }
    }
}

/// Get the current timestamp in milliseconds.
pub fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

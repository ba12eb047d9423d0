//! SQLite backend built on rusqlite.

use super::{StoreTx, TaskStore, now_ms};
use crate::types::{
    Board, BoardId, Column, ColumnId, Dependency, NewBoard, NewColumn, NewProject, NewTask,
    Project, ProjectId, Task, TaskId, TaskSummary, TaskUpdate,
};
use anyhow::Result;
use async_trait::async_trait;
use rusqlite::{Connection, OptionalExtension, Row, params};
use std::path::Path;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

mod embedded {
    use refinery::embed_migrations;
    embed_migrations!("migrations/sqlite");
}

const TASK_SELECT: &str = "SELECT t.id, t.project_id, t.column_id, t.title, t.description,
        c.name AS status, t.assignee_name, t.position, t.created_at, t.updated_at
     FROM tasks t
     INNER JOIN board_columns c ON c.id = t.column_id";

const SUMMARY_SELECT: &str = "SELECT t.id, t.title, c.name AS status, t.assignee_name
     FROM tasks t
     INNER JOIN board_columns c ON c.id = t.column_id";

/// Store handle wrapping a single SQLite connection.
#[derive(Clone)]
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    /// Open or create the database at the given path.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let conn = Connection::open(path)?;

        conn.execute_batch(
            "PRAGMA journal_mode=WAL;
             PRAGMA foreign_keys=ON;
             PRAGMA busy_timeout=5000;",
        )?;

        Self::with_migrations(conn)
    }

    /// Open an in-memory database (for testing).
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        Self::with_migrations(conn)
    }

    fn with_migrations(mut conn: Connection) -> Result<Self> {
        embedded::migrations::runner().run(&mut conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Execute a function with exclusive access to the connection.
    async fn with_conn<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T> + Send,
        T: Send,
    {
        let conn = self.conn.lock().await;
        f(&conn)
    }
}

fn parse_task_row(row: &Row) -> rusqlite::Result<Task> {
    Ok(Task {
        id: row.get("id")?,
        project_id: row.get("project_id")?,
        column_id: row.get("column_id")?,
        title: row.get("title")?,
        description: row.get("description")?,
        status: row.get("status")?,
        assignee_name: row.get("assignee_name")?,
        position: row.get("position")?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}

fn parse_summary_row(row: &Row) -> rusqlite::Result<TaskSummary> {
    Ok(TaskSummary {
        id: row.get("id")?,
        title: row.get("title")?,
        status: row.get("status")?,
        assignee_name: row.get("assignee_name")?,
    })
}

fn parse_project_row(row: &Row) -> rusqlite::Result<Project> {
    Ok(Project {
        id: row.get("id")?,
        name: row.get("name")?,
        description: row.get("description")?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}

fn parse_board_row(row: &Row) -> rusqlite::Result<Board> {
    Ok(Board {
        id: row.get("id")?,
        project_id: row.get("project_id")?,
        name: row.get("name")?,
        created_at: row.get("created_at")?,
    })
}

fn parse_column_row(row: &Row) -> rusqlite::Result<Column> {
    Ok(Column {
        id: row.get("id")?,
        board_id: row.get("board_id")?,
        name: row.get("name")?,
        position: row.get("position")?,
        created_at: row.get("created_at")?,
    })
}

fn load_task(conn: &Connection, id: TaskId) -> Result<Option<Task>> {
    let task = conn
        .query_row(
            &format!("{} WHERE t.id = ?1", TASK_SELECT),
            params![id],
            parse_task_row,
        )
        .optional()?;
    Ok(task)
}

#[async_trait]
impl TaskStore for SqliteStore {
    async fn create_project(&self, input: NewProject) -> Result<Project> {
        self.with_conn(move |conn| {
            let now = now_ms();
            conn.execute(
                "INSERT INTO projects (name, description, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?3)",
                params![input.name, input.description, now],
            )?;
            Ok(Project {
                id: conn.last_insert_rowid(),
                name: input.name,
                description: input.description,
                created_at: now,
                updated_at: now,
            })
        })
        .await
    }

    async fn get_project(&self, id: ProjectId) -> Result<Option<Project>> {
        self.with_conn(move |conn| {
            let project = conn
                .query_row(
                    "SELECT * FROM projects WHERE id = ?1",
                    params![id],
                    parse_project_row,
                )
                .optional()?;
            Ok(project)
        })
        .await
    }

    async fn list_projects(&self) -> Result<Vec<Project>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare("SELECT * FROM projects ORDER BY id")?;
            let projects = stmt
                .query_map([], parse_project_row)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(projects)
        })
        .await
    }

    async fn delete_project(&self, id: ProjectId) -> Result<bool> {
        self.with_conn(move |conn| {
            let deleted = conn.execute("DELETE FROM projects WHERE id = ?1", params![id])?;
            Ok(deleted > 0)
        })
        .await
    }

    async fn create_board(&self, project_id: ProjectId, input: NewBoard) -> Result<Board> {
        self.with_conn(move |conn| {
            let now = now_ms();
            conn.execute(
                "INSERT INTO boards (project_id, name, created_at) VALUES (?1, ?2, ?3)",
                params![project_id, input.name, now],
            )?;
            Ok(Board {
                id: conn.last_insert_rowid(),
                project_id,
                name: input.name,
                created_at: now,
            })
        })
        .await
    }

    async fn get_board(&self, id: BoardId) -> Result<Option<Board>> {
        self.with_conn(move |conn| {
            let board = conn
                .query_row(
                    "SELECT * FROM boards WHERE id = ?1",
                    params![id],
                    parse_board_row,
                )
                .optional()?;
            Ok(board)
        })
        .await
    }

    async fn list_boards(&self, project_id: ProjectId) -> Result<Vec<Board>> {
        self.with_conn(move |conn| {
            let mut stmt = conn.prepare("SELECT * FROM boards WHERE project_id = ?1 ORDER BY id")?;
            let boards = stmt
                .query_map(params![project_id], parse_board_row)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(boards)
        })
        .await
    }

    async fn create_column(&self, board_id: BoardId, input: NewColumn) -> Result<Column> {
        self.with_conn(move |conn| {
            let now = now_ms();
            let position = match input.position {
                Some(p) => p,
                None => conn.query_row(
                    "SELECT COALESCE(MAX(position), -1) + 1 FROM board_columns WHERE board_id = ?1",
                    params![board_id],
                    |row| row.get(0),
                )?,
            };
            conn.execute(
                "INSERT INTO board_columns (board_id, name, position, created_at)
                 VALUES (?1, ?2, ?3, ?4)",
                params![board_id, input.name, position, now],
            )?;
            Ok(Column {
                id: conn.last_insert_rowid(),
                board_id,
                name: input.name,
                position,
                created_at: now,
            })
        })
        .await
    }

    async fn list_columns(&self, board_id: BoardId) -> Result<Vec<Column>> {
        self.with_conn(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT * FROM board_columns WHERE board_id = ?1 ORDER BY position, id",
            )?;
            let columns = stmt
                .query_map(params![board_id], parse_column_row)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(columns)
        })
        .await
    }

    async fn column_project(&self, id: ColumnId) -> Result<Option<ProjectId>> {
        self.with_conn(move |conn| {
            let project_id = conn
                .query_row(
                    "SELECT b.project_id FROM board_columns c
                     INNER JOIN boards b ON b.id = c.board_id
                     WHERE c.id = ?1",
                    params![id],
                    |row| row.get(0),
                )
                .optional()?;
            Ok(project_id)
        })
        .await
    }

    async fn create_task(&self, project_id: ProjectId, input: NewTask) -> Result<Task> {
        self.with_conn(move |conn| {
            let now = now_ms();
            let position: i32 = conn.query_row(
                "SELECT COALESCE(MAX(position), -1) + 1 FROM tasks WHERE column_id = ?1",
                params![input.column_id],
                |row| row.get(0),
            )?;
            conn.execute(
                "INSERT INTO tasks (project_id, column_id, title, description, assignee_name,
                                    position, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?7)",
                params![
                    project_id,
                    input.column_id,
                    input.title,
                    input.description,
                    input.assignee_name,
                    position,
                    now
                ],
            )?;
            let id = conn.last_insert_rowid();
            load_task(conn, id)?.ok_or_else(|| anyhow::anyhow!("task {} vanished after insert", id))
        })
        .await
    }

    async fn get_task(&self, id: TaskId) -> Result<Option<Task>> {
        self.with_conn(move |conn| load_task(conn, id)).await
    }

    async fn list_tasks(&self, project_id: ProjectId) -> Result<Vec<Task>> {
        self.with_conn(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "{} WHERE t.project_id = ?1 ORDER BY c.position, t.position, t.id",
                TASK_SELECT
            ))?;
            let tasks = stmt
                .query_map(params![project_id], parse_task_row)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(tasks)
        })
        .await
    }

    async fn update_task(&self, id: TaskId, update: TaskUpdate) -> Result<Option<Task>> {
        self.with_conn(move |conn| {
            let Some(mut task) = load_task(conn, id)? else {
                return Ok(None);
            };
            update.apply_to(&mut task);
            conn.execute(
                "UPDATE tasks
                 SET title = ?1, description = ?2, assignee_name = ?3, column_id = ?4,
                     updated_at = ?5
                 WHERE id = ?6",
                params![
                    task.title,
                    task.description,
                    task.assignee_name,
                    task.column_id,
                    now_ms(),
                    id
                ],
            )?;
            load_task(conn, id)
        })
        .await
    }

    async fn delete_task(&self, id: TaskId) -> Result<bool> {
        self.with_conn(move |conn| {
            let deleted = conn.execute("DELETE FROM tasks WHERE id = ?1", params![id])?;
            Ok(deleted > 0)
        })
        .await
    }

    async fn task_summary(&self, id: TaskId) -> Result<Option<TaskSummary>> {
        self.with_conn(move |conn| {
            let summary = conn
                .query_row(
                    &format!("{} WHERE t.id = ?1", SUMMARY_SELECT),
                    params![id],
                    parse_summary_row,
                )
                .optional()?;
            Ok(summary)
        })
        .await
    }

    async fn blocked_by(&self, id: TaskId) -> Result<Vec<TaskSummary>> {
        self.with_conn(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "{} INNER JOIN task_dependencies d ON d.depends_on_task_id = t.id
                 WHERE d.task_id = ?1
                 ORDER BY t.id",
                SUMMARY_SELECT
            ))?;
            let summaries = stmt
                .query_map(params![id], parse_summary_row)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(summaries)
        })
        .await
    }

    async fn blocking(&self, id: TaskId) -> Result<Vec<TaskSummary>> {
        self.with_conn(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "{} INNER JOIN task_dependencies d ON d.task_id = t.id
                 WHERE d.depends_on_task_id = ?1
                 ORDER BY t.id",
                SUMMARY_SELECT
            ))?;
            let summaries = stmt
                .query_map(params![id], parse_summary_row)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(summaries)
        })
        .await
    }

    async fn list_dependencies(&self, project_id: ProjectId) -> Result<Vec<Dependency>> {
        self.with_conn(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT d.task_id, d.depends_on_task_id, d.created_at
                 FROM task_dependencies d
                 INNER JOIN tasks t ON t.id = d.task_id
                 WHERE t.project_id = ?1
                 ORDER BY d.task_id, d.depends_on_task_id",
            )?;
            let deps = stmt
                .query_map(params![project_id], |row| {
                    Ok(Dependency {
                        task_id: row.get(0)?,
                        depends_on_task_id: row.get(1)?,
                        created_at: row.get(2)?,
                    })
                })?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(deps)
        })
        .await
    }

    async fn begin(&self) -> Result<Box<dyn StoreTx>> {
        let conn = Arc::clone(&self.conn).lock_owned().await;
        conn.execute_batch("BEGIN IMMEDIATE")?;
        Ok(Box::new(SqliteTx {
            conn,
            finished: false,
        }))
    }
}

/// Write transaction holding the connection until commit or drop.
pub struct SqliteTx {
    conn: OwnedMutexGuard<Connection>,
    finished: bool,
}

#[async_trait]
impl StoreTx for SqliteTx {
    async fn task_project(&mut self, id: TaskId) -> Result<Option<ProjectId>> {
        let project_id = self
            .conn
            .query_row(
                "SELECT project_id FROM tasks WHERE id = ?1",
                params![id],
                |row| row.get(0),
            )
            .optional()?;
        Ok(project_id)
    }

    async fn dependency_exists(&mut self, task_id: TaskId, depends_on: TaskId) -> Result<bool> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM task_dependencies
             WHERE task_id = ?1 AND depends_on_task_id = ?2",
            params![task_id, depends_on],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    async fn depends_on(&mut self, task_id: TaskId) -> Result<Vec<TaskId>> {
        let mut stmt = self
            .conn
            .prepare("SELECT depends_on_task_id FROM task_dependencies WHERE task_id = ?1")?;
        let ids = stmt
            .query_map(params![task_id], |row| row.get(0))?
            .collect::<rusqlite::Result<Vec<TaskId>>>()?;
        Ok(ids)
    }

    async fn insert_dependency(
        &mut self,
        task_id: TaskId,
        depends_on: TaskId,
    ) -> Result<Dependency> {
        let now = now_ms();
        self.conn.execute(
            "INSERT INTO task_dependencies (task_id, depends_on_task_id, created_at)
             VALUES (?1, ?2, ?3)",
            params![task_id, depends_on, now],
        )?;
        Ok(Dependency {
            task_id,
            depends_on_task_id: depends_on,
            created_at: now,
        })
    }

    async fn delete_dependency(&mut self, task_id: TaskId, depends_on: TaskId) -> Result<bool> {
        let deleted = self.conn.execute(
            "DELETE FROM task_dependencies WHERE task_id = ?1 AND depends_on_task_id = ?2",
            params![task_id, depends_on],
        )?;
        Ok(deleted > 0)
    }

    async fn commit(self: Box<Self>) -> Result<()> {
        let mut tx = self;
        tx.conn.execute_batch("COMMIT")?;
        tx.finished = true;
        Ok(())
    }
}

impl Drop for SqliteTx {
    fn drop(&mut self) {
        if !self.finished {
            // Rollback failure leaves nothing to recover; the next BEGIN reports it.
            let _ = self.conn.execute_batch("ROLLBACK");
        }
    }
}

//! PostgreSQL backend built on sqlx.

use super::{StoreTx, TaskStore, now_ms};
use crate::types::{
    Board, BoardId, Column, ColumnId, Dependency, NewBoard, NewColumn, NewProject, NewTask,
    Project, ProjectId, Task, TaskId, TaskSummary, TaskUpdate,
};
use anyhow::{Result, anyhow};
use async_trait::async_trait;
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use sqlx::{PgConnection, Postgres, Row, Transaction};

/// Advisory lock key held by every dependency write transaction.
const DEPENDENCY_LOCK_KEY: i64 = 0x6b61_6e62_616e;

const TASK_SELECT: &str = "SELECT t.id, t.project_id, t.column_id, t.title, t.description,
        c.name AS status, t.assignee_name, t.position, t.created_at, t.updated_at
     FROM tasks t
     INNER JOIN board_columns c ON c.id = t.column_id";

const SUMMARY_SELECT: &str = "SELECT t.id, t.title, c.name AS status, t.assignee_name
     FROM tasks t
     INNER JOIN board_columns c ON c.id = t.column_id";

/// Store handle over a PostgreSQL connection pool.
#[derive(Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    /// Connect to `url` and apply pending migrations.
    pub async fn connect(url: &str, max_connections: u32) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(url)
            .await?;

        sqlx::migrate!("migrations/postgres").run(&pool).await?;

        Ok(Self { pool })
    }
}

fn task_from_row(row: &PgRow) -> Result<Task, sqlx::Error> {
    Ok(Task {
        id: row.try_get("id")?,
        project_id: row.try_get("project_id")?,
        column_id: row.try_get("column_id")?,
        title: row.try_get("title")?,
        description: row.try_get("description")?,
        status: row.try_get("status")?,
        assignee_name: row.try_get("assignee_name")?,
        position: row.try_get("position")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn summary_from_row(row: &PgRow) -> Result<TaskSummary, sqlx::Error> {
    Ok(TaskSummary {
        id: row.try_get("id")?,
        title: row.try_get("title")?,
        status: row.try_get("status")?,
        assignee_name: row.try_get("assignee_name")?,
    })
}

fn project_from_row(row: &PgRow) -> Result<Project, sqlx::Error> {
    Ok(Project {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        description: row.try_get("description")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn board_from_row(row: &PgRow) -> Result<Board, sqlx::Error> {
    Ok(Board {
        id: row.try_get("id")?,
        project_id: row.try_get("project_id")?,
        name: row.try_get("name")?,
        created_at: row.try_get("created_at")?,
    })
}

fn column_from_row(row: &PgRow) -> Result<Column, sqlx::Error> {
    Ok(Column {
        id: row.try_get("id")?,
        board_id: row.try_get("board_id")?,
        name: row.try_get("name")?,
        position: row.try_get("position")?,
        created_at: row.try_get("created_at")?,
    })
}

fn collect_rows<T>(
    rows: Vec<PgRow>,
    parse: fn(&PgRow) -> Result<T, sqlx::Error>,
) -> Result<Vec<T>> {
    Ok(rows.iter().map(parse).collect::<Result<Vec<_>, _>>()?)
}

async fn load_task(conn: &mut PgConnection, id: TaskId) -> Result<Option<Task>> {
    let row = sqlx::query(&format!("{} WHERE t.id = $1", TASK_SELECT))
        .bind(id)
        .fetch_optional(conn)
        .await?;
    Ok(row.as_ref().map(task_from_row).transpose()?)
}

#[async_trait]
impl TaskStore for PostgresStore {
    async fn create_project(&self, input: NewProject) -> Result<Project> {
        let now = now_ms();
        let row = sqlx::query(
            "INSERT INTO projects (name, description, created_at, updated_at)
             VALUES ($1, $2, $3, $3)
             RETURNING *",
        )
        .bind(&input.name)
        .bind(&input.description)
        .bind(now)
        .fetch_one(&self.pool)
        .await?;
        Ok(project_from_row(&row)?)
    }

    async fn get_project(&self, id: ProjectId) -> Result<Option<Project>> {
        let row = sqlx::query("SELECT * FROM projects WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.as_ref().map(project_from_row).transpose()?)
    }

    async fn list_projects(&self) -> Result<Vec<Project>> {
        let rows = sqlx::query("SELECT * FROM projects ORDER BY id")
            .fetch_all(&self.pool)
            .await?;
        collect_rows(rows, project_from_row)
    }

    async fn delete_project(&self, id: ProjectId) -> Result<bool> {
        let result = sqlx::query("DELETE FROM projects WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn create_board(&self, project_id: ProjectId, input: NewBoard) -> Result<Board> {
        let row = sqlx::query(
            "INSERT INTO boards (project_id, name, created_at)
             VALUES ($1, $2, $3)
             RETURNING *",
        )
        .bind(project_id)
        .bind(&input.name)
        .bind(now_ms())
        .fetch_one(&self.pool)
        .await?;
        Ok(board_from_row(&row)?)
    }

    async fn get_board(&self, id: BoardId) -> Result<Option<Board>> {
        let row = sqlx::query("SELECT * FROM boards WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.as_ref().map(board_from_row).transpose()?)
    }

    async fn list_boards(&self, project_id: ProjectId) -> Result<Vec<Board>> {
        let rows = sqlx::query("SELECT * FROM boards WHERE project_id = $1 ORDER BY id")
            .bind(project_id)
            .fetch_all(&self.pool)
            .await?;
        collect_rows(rows, board_from_row)
    }

    async fn create_column(&self, board_id: BoardId, input: NewColumn) -> Result<Column> {
        let row = sqlx::query(
            "INSERT INTO board_columns (board_id, name, position, created_at)
             VALUES ($1, $2,
                     COALESCE($3, (SELECT COALESCE(MAX(position), -1) + 1
                                   FROM board_columns WHERE board_id = $1)),
                     $4)
             RETURNING *",
        )
        .bind(board_id)
        .bind(&input.name)
        .bind(input.position)
        .bind(now_ms())
        .fetch_one(&self.pool)
        .await?;
        Ok(column_from_row(&row)?)
    }

    async fn list_columns(&self, board_id: BoardId) -> Result<Vec<Column>> {
        let rows =
            sqlx::query("SELECT * FROM board_columns WHERE board_id = $1 ORDER BY position, id")
                .bind(board_id)
                .fetch_all(&self.pool)
                .await?;
        collect_rows(rows, column_from_row)
    }

    async fn column_project(&self, id: ColumnId) -> Result<Option<ProjectId>> {
        let project_id = sqlx::query_scalar(
            "SELECT b.project_id FROM board_columns c
             INNER JOIN boards b ON b.id = c.board_id
             WHERE c.id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(project_id)
    }

    async fn create_task(&self, project_id: ProjectId, input: NewTask) -> Result<Task> {
        let mut conn = self.pool.acquire().await?;
        let id: TaskId = sqlx::query_scalar(
            "INSERT INTO tasks (project_id, column_id, title, description, assignee_name,
                                position, created_at, updated_at)
             VALUES ($1, $2, $3, $4, $5,
                     (SELECT COALESCE(MAX(position), -1) + 1 FROM tasks WHERE column_id = $2),
                     $6, $6)
             RETURNING id",
        )
        .bind(project_id)
        .bind(input.column_id)
        .bind(&input.title)
        .bind(&input.description)
        .bind(&input.assignee_name)
        .bind(now_ms())
        .fetch_one(&mut *conn)
        .await?;
        load_task(&mut conn, id)
            .await?
            .ok_or_else(|| anyhow!("task {} vanished after insert", id))
    }

    async fn get_task(&self, id: TaskId) -> Result<Option<Task>> {
        let mut conn = self.pool.acquire().await?;
        load_task(&mut conn, id).await
    }

    async fn list_tasks(&self, project_id: ProjectId) -> Result<Vec<Task>> {
        let rows = sqlx::query(&format!(
            "{} WHERE t.project_id = $1 ORDER BY c.position, t.position, t.id",
            TASK_SELECT
        ))
        .bind(project_id)
        .fetch_all(&self.pool)
        .await?;
        collect_rows(rows, task_from_row)
    }

    async fn update_task(&self, id: TaskId, update: TaskUpdate) -> Result<Option<Task>> {
        let mut tx = self.pool.begin().await?;
        let row = sqlx::query(&format!("{} WHERE t.id = $1 FOR UPDATE OF t", TASK_SELECT))
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?;
        let Some(mut task) = row.as_ref().map(task_from_row).transpose()? else {
            return Ok(None);
        };
        update.apply_to(&mut task);
        sqlx::query(
            "UPDATE tasks
             SET title = $1, description = $2, assignee_name = $3, column_id = $4,
                 updated_at = $5
             WHERE id = $6",
        )
        .bind(&task.title)
        .bind(&task.description)
        .bind(&task.assignee_name)
        .bind(task.column_id)
        .bind(now_ms())
        .bind(id)
        .execute(&mut *tx)
        .await?;
        let task = load_task(&mut tx, id).await?;
        tx.commit().await?;
        Ok(task)
    }

    async fn delete_task(&self, id: TaskId) -> Result<bool> {
        let result = sqlx::query("DELETE FROM tasks WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn task_summary(&self, id: TaskId) -> Result<Option<TaskSummary>> {
        let row = sqlx::query(&format!("{} WHERE t.id = $1", SUMMARY_SELECT))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.as_ref().map(summary_from_row).transpose()?)
    }

    async fn blocked_by(&self, id: TaskId) -> Result<Vec<TaskSummary>> {
        let rows = sqlx::query(&format!(
            "{} INNER JOIN task_dependencies d ON d.depends_on_task_id = t.id
             WHERE d.task_id = $1
             ORDER BY t.id",
            SUMMARY_SELECT
        ))
        .bind(id)
        .fetch_all(&self.pool)
        .await?;
        collect_rows(rows, summary_from_row)
    }

    async fn blocking(&self, id: TaskId) -> Result<Vec<TaskSummary>> {
        let rows = sqlx::query(&format!(
            "{} INNER JOIN task_dependencies d ON d.task_id = t.id
             WHERE d.depends_on_task_id = $1
             ORDER BY t.id",
            SUMMARY_SELECT
        ))
        .bind(id)
        .fetch_all(&self.pool)
        .await?;
        collect_rows(rows, summary_from_row)
    }

    async fn list_dependencies(&self, project_id: ProjectId) -> Result<Vec<Dependency>> {
        let rows: Vec<(TaskId, TaskId, i64)> = sqlx::query_as(
            "SELECT d.task_id, d.depends_on_task_id, d.created_at
             FROM task_dependencies d
             INNER JOIN tasks t ON t.id = d.task_id
             WHERE t.project_id = $1
             ORDER BY d.task_id, d.depends_on_task_id",
        )
        .bind(project_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows
            .into_iter()
            .map(|(task_id, depends_on_task_id, created_at)| Dependency {
                task_id,
                depends_on_task_id,
                created_at,
            })
            .collect())
    }

    async fn begin(&self) -> Result<Box<dyn StoreTx>> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("SELECT pg_advisory_xact_lock($1)")
            .bind(DEPENDENCY_LOCK_KEY)
            .execute(&mut *tx)
            .await?;
        Ok(Box::new(PostgresTx { tx }))
    }
}

/// Write transaction; sqlx rolls back on drop if not committed.
pub struct PostgresTx {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl StoreTx for PostgresTx {
    async fn task_project(&mut self, id: TaskId) -> Result<Option<ProjectId>> {
        let project_id = sqlx::query_scalar("SELECT project_id FROM tasks WHERE id = $1")
            .bind(id)
            .fetch_optional(&mut *self.tx)
            .await?;
        Ok(project_id)
    }

    async fn dependency_exists(&mut self, task_id: TaskId, depends_on: TaskId) -> Result<bool> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM task_dependencies
                           WHERE task_id = $1 AND depends_on_task_id = $2)",
        )
        .bind(task_id)
        .bind(depends_on)
        .fetch_one(&mut *self.tx)
        .await?;
        Ok(exists)
    }

    async fn depends_on(&mut self, task_id: TaskId) -> Result<Vec<TaskId>> {
        let ids =
            sqlx::query_scalar("SELECT depends_on_task_id FROM task_dependencies WHERE task_id = $1")
                .bind(task_id)
                .fetch_all(&mut *self.tx)
                .await?;
        Ok(ids)
    }

    async fn insert_dependency(
        &mut self,
        task_id: TaskId,
        depends_on: TaskId,
    ) -> Result<Dependency> {
        let now = now_ms();
        sqlx::query(
            "INSERT INTO task_dependencies (task_id, depends_on_task_id, created_at)
             VALUES ($1, $2, $3)",
        )
        .bind(task_id)
        .bind(depends_on)
        .bind(now)
        .execute(&mut *self.tx)
        .await?;
        Ok(Dependency {
            task_id,
            depends_on_task_id: depends_on,
            created_at: now,
        })
    }

    async fn delete_dependency(&mut self, task_id: TaskId, depends_on: TaskId) -> Result<bool> {
        let result = sqlx::query(
            "DELETE FROM task_dependencies WHERE task_id = $1 AND depends_on_task_id = $2",
        )
        .bind(task_id)
        .bind(depends_on)
        .execute(&mut *self.tx)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn commit(self: Box<Self>) -> Result<()> {
        self.tx.commit().await?;
        Ok(())
    }
}

//! Core types for the kanban backend.

use serde::{Deserialize, Serialize};

/// Store-assigned task identifier.
pub type TaskId = i64;
pub type ProjectId = i64;
pub type BoardId = i64;
pub type ColumnId = i64;

/// Column names that count as a completed task status.
///
/// Matching is exact and case-sensitive. Clients rely on these three names,
/// so the set is closed.
pub const COMPLETED_STATUSES: [&str; 3] = ["Done", "Completed", "Finished"];

/// Returns true if a task in the column named `status` is complete.
pub fn is_completed_status(status: &str) -> bool {
    COMPLETED_STATUSES.contains(&status)
}

/// A project, the top-level container.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Project {
    pub id: ProjectId,
    pub name: String,
    pub description: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Board {
    pub id: BoardId,
    pub project_id: ProjectId,
    pub name: String,
    pub created_at: i64,
}

/// A board column. Its name doubles as the status of every task in it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Column {
    pub id: ColumnId,
    pub board_id: BoardId,
    pub name: String,
    pub position: i32,
    pub created_at: i64,
}

/// A task on a board.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    pub project_id: ProjectId,
    pub column_id: ColumnId,
    pub title: String,
    pub description: Option<String>,
    /// Name of the column the task currently sits in.
    pub status: String,
    pub assignee_name: Option<String>,
    pub position: i32,
    pub created_at: i64,
    pub updated_at: i64,
}

impl Task {
    pub fn is_completed(&self) -> bool {
        is_completed_status(&self.status)
    }

    pub fn summary(&self) -> TaskSummary {
        TaskSummary {
            id: self.id,
            title: self.title.clone(),
            status: self.status.clone(),
            assignee_name: self.assignee_name.clone(),
        }
    }
}

/// The slice of a task shown in dependency views.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskSummary {
    pub id: TaskId,
    pub title: String,
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assignee_name: Option<String>,
}

/// A "depends-on" edge: `task_id` stays blocked until `depends_on_task_id`
/// reaches a completed status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dependency {
    pub task_id: TaskId,
    pub depends_on_task_id: TaskId,
    pub created_at: i64,
}

/// Blocked/blocking view of a single task, derived at query time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskDependencies {
    /// Tasks this task depends on.
    pub blocked_by: Vec<TaskSummary>,
    /// Tasks that depend on this task.
    pub blocking: Vec<TaskSummary>,
    pub is_blocked: bool,
}

impl TaskDependencies {
    pub fn new(blocked_by: Vec<TaskSummary>, blocking: Vec<TaskSummary>) -> Self {
        let is_blocked = blocked_by.iter().any(|t| !is_completed_status(&t.status));
        Self {
            blocked_by,
            blocking,
            is_blocked,
        }
    }
}

/// Input for creating a project.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewProject {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewBoard {
    pub name: String,
}

/// Input for creating a column. Appended after existing columns when no
/// position is given.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewColumn {
    pub name: String,
    #[serde(default)]
    pub position: Option<i32>,
}

/// Input for creating a task. The task is appended to the bottom of the column.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewTask {
    pub column_id: ColumnId,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub assignee_name: Option<String>,
}

/// Partial task update. An empty string clears `description` or
/// `assignee_name`; moving to another column changes the task's status.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TaskUpdate {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub assignee_name: Option<String>,
    #[serde(default)]
    pub column_id: Option<ColumnId>,
}

impl TaskUpdate {
    /// Apply the update to `task` in place, leaving `status` to the store.
    pub fn apply_to(&self, task: &mut Task) {
        if let Some(title) = &self.title {
            task.title = title.clone();
        }
        if let Some(description) = &self.description {
            task.description = non_empty(description);
        }
        if let Some(assignee) = &self.assignee_name {
            task.assignee_name = non_empty(assignee);
        }
        if let Some(column_id) = self.column_id {
            task.column_id = column_id;
        }
    }
}

fn non_empty(s: &str) -> Option<String> {
    if s.is_empty() {
        None
    } else {
        Some(s.to_string())
    }
}

//! Task dependency graph: edge validation, cycle detection and blocked views.

use super::{StoreTx, TaskStore};
use crate::types::{Dependency, ProjectId, Task, TaskDependencies, TaskId};
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;
use thiserror::Error;

/// Failures reported by [`DependencyGraph`].
///
/// All variants except `Store` are caused by caller input and will fail the
/// same way on retry.
#[derive(Debug, Error)]
pub enum GraphError {
    #[error("task {0} not found")]
    NotFound(TaskId),

    #[error("a task cannot depend on itself")]
    InvalidSelfDependency,

    #[error("dependency already exists")]
    DuplicateDependency,

    #[error("dependency would create a cycle")]
    CircularDependency,

    #[error(transparent)]
    Store(#[from] anyhow::Error),
}

pub type GraphResult<T> = std::result::Result<T, GraphError>;

/// Owns the "depends-on" edges between tasks and keeps them acyclic.
///
/// An edge `(task, depends_on)` means `task` stays blocked until `depends_on`
/// reaches a completed status. Edges may only join tasks of the same project.
#[derive(Clone)]
pub struct DependencyGraph {
    store: Arc<dyn TaskStore>,
}

impl DependencyGraph {
    pub fn new(store: Arc<dyn TaskStore>) -> Self {
        Self { store }
    }

    /// Add the edge `task_id -> depends_on_task_id`.
    ///
    /// Checks run inside one store transaction, in order: both tasks exist in
    /// the same project, no self edge, no duplicate, no cycle.
    pub async fn add_dependency(
        &self,
        task_id: TaskId,
        depends_on_task_id: TaskId,
    ) -> GraphResult<Dependency> {
        let mut tx = self.store.begin().await?;

        let project = tx
            .task_project(task_id)
            .await?
            .ok_or(GraphError::NotFound(task_id))?;

        match tx.task_project(depends_on_task_id).await? {
            Some(p) if p == project => {}
            _ => return Err(GraphError::NotFound(depends_on_task_id)),
        }

        if task_id == depends_on_task_id {
            return Err(GraphError::InvalidSelfDependency);
        }

        if tx.dependency_exists(task_id, depends_on_task_id).await? {
            return Err(GraphError::DuplicateDependency);
        }

        if would_create_cycle(tx.as_mut(), task_id, depends_on_task_id).await? {
            return Err(GraphError::CircularDependency);
        }

        let dep = tx.insert_dependency(task_id, depends_on_task_id).await?;
        tx.commit().await?;
        Ok(dep)
    }

    /// Remove the edge if present. Removing a missing edge succeeds.
    pub async fn remove_dependency(
        &self,
        task_id: TaskId,
        depends_on_task_id: TaskId,
    ) -> GraphResult<()> {
        let mut tx = self.store.begin().await?;
        tx.delete_dependency(task_id, depends_on_task_id).await?;
        tx.commit().await?;
        Ok(())
    }

    /// Blocked-by and blocking views of a task.
    pub async fn get_dependencies(&self, task_id: TaskId) -> GraphResult<TaskDependencies> {
        if self.store.task_summary(task_id).await?.is_none() {
            return Err(GraphError::NotFound(task_id));
        }

        let blocked_by = self.store.blocked_by(task_id).await?;
        let blocking = self.store.blocking(task_id).await?;
        Ok(TaskDependencies::new(blocked_by, blocking))
    }

    /// True if any task `task_id` depends on is not complete.
    pub async fn is_blocked(&self, task_id: TaskId) -> GraphResult<bool> {
        Ok(self.get_dependencies(task_id).await?.is_blocked)
    }

    /// All edges whose dependent task belongs to the project.
    pub async fn list_dependencies(&self, project_id: ProjectId) -> GraphResult<Vec<Dependency>> {
        Ok(self.store.list_dependencies(project_id).await?)
    }

    /// Tasks of the project with at least one incomplete dependency.
    pub async fn blocked_tasks(&self, project_id: ProjectId) -> GraphResult<Vec<Task>> {
        let tasks = self.store.list_tasks(project_id).await?;
        let deps = self.store.list_dependencies(project_id).await?;

        let by_id: HashMap<TaskId, &Task> = tasks.iter().map(|t| (t.id, t)).collect();

        let blocked: HashSet<TaskId> = deps
            .iter()
            .filter(|d| {
                by_id
                    .get(&d.depends_on_task_id)
                    .is_some_and(|t| !t.is_completed())
            })
            .map(|d| d.task_id)
            .collect();

        Ok(tasks
            .into_iter()
            .filter(|t| blocked.contains(&t.id))
            .collect())
    }
}

/// Check whether adding `task_id -> depends_on_task_id` would close a cycle.
///
/// Breadth-first search from `depends_on_task_id` along existing depends-on
/// edges; reaching `task_id` means a path back already exists.
async fn would_create_cycle(
    tx: &mut dyn StoreTx,
    task_id: TaskId,
    depends_on_task_id: TaskId,
) -> anyhow::Result<bool> {
    let mut visited: HashSet<TaskId> = HashSet::new();
    let mut queue: VecDeque<TaskId> = VecDeque::new();
    queue.push_back(depends_on_task_id);

    while let Some(current) = queue.pop_front() {
        if current == task_id {
            return Ok(true);
        }

        if !visited.insert(current) {
            continue;
        }

        for next in tx.depends_on(current).await? {
            if !visited.contains(&next) {
                queue.push_back(next);
            }
        }
    }

    Ok(false)
}

//! Route handlers. Each returns JSON or an [`ApiError`].

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use serde::{Deserialize, Serialize};
use tracing::info;

use super::extract::ApiJson;
use super::server::ApiServer;
use crate::error::{ApiError, ApiResult};
use crate::types::{
    Board, BoardId, Column, Dependency, NewBoard, NewColumn, NewProject, NewTask, Project,
    ProjectId, Task, TaskDependencies, TaskId, TaskUpdate,
};

/// Health check response.
#[derive(Serialize)]
pub(crate) struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

/// Body of `POST /api/tasks/{task_id}/dependencies`.
#[derive(Debug, Deserialize)]
pub(crate) struct AddDependencyRequest {
    depends_on_task_id: TaskId,
}

fn require_non_blank(field: &str, value: &str) -> ApiResult<()> {
    if value.trim().is_empty() {
        return Err(ApiError::missing_field(field));
    }
    Ok(())
}

async fn require_project(state: &ApiServer, project_id: ProjectId) -> ApiResult<Project> {
    state
        .store()
        .get_project(project_id)
        .await?
        .ok_or_else(|| ApiError::project_not_found(project_id))
}

/// The column must sit on a board of `project_id`.
async fn require_column_in_project(
    state: &ApiServer,
    column_id: i64,
    project_id: ProjectId,
) -> ApiResult<()> {
    match state.store().column_project(column_id).await? {
        Some(p) if p == project_id => Ok(()),
        _ => Err(ApiError::column_not_found(column_id)),
    }
}

pub(crate) async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
    })
}

// Projects

pub(crate) async fn list_projects(State(state): State<ApiServer>) -> ApiResult<Json<Vec<Project>>> {
    Ok(Json(state.store().list_projects().await?))
}

pub(crate) async fn create_project(
    State(state): State<ApiServer>,
    ApiJson(input): ApiJson<NewProject>,
) -> ApiResult<(StatusCode, Json<Project>)> {
    require_non_blank("name", &input.name)?;
    let project = state.store().create_project(input).await?;
    info!(project_id = project.id, "project created");
    Ok((StatusCode::CREATED, Json(project)))
}

pub(crate) async fn get_project(
    State(state): State<ApiServer>,
    Path(project_id): Path<ProjectId>,
) -> ApiResult<Json<Project>> {
    Ok(Json(require_project(&state, project_id).await?))
}

pub(crate) async fn delete_project(
    State(state): State<ApiServer>,
    Path(project_id): Path<ProjectId>,
) -> ApiResult<StatusCode> {
    if !state.store().delete_project(project_id).await? {
        return Err(ApiError::project_not_found(project_id));
    }
    info!(project_id, "project deleted");
    Ok(StatusCode::NO_CONTENT)
}

// Boards and columns

pub(crate) async fn list_boards(
    State(state): State<ApiServer>,
    Path(project_id): Path<ProjectId>,
) -> ApiResult<Json<Vec<Board>>> {
    require_project(&state, project_id).await?;
    Ok(Json(state.store().list_boards(project_id).await?))
}

pub(crate) async fn create_board(
    State(state): State<ApiServer>,
    Path(project_id): Path<ProjectId>,
    ApiJson(input): ApiJson<NewBoard>,
) -> ApiResult<(StatusCode, Json<Board>)> {
    require_non_blank("name", &input.name)?;
    require_project(&state, project_id).await?;
    let board = state.store().create_board(project_id, input).await?;
    Ok((StatusCode::CREATED, Json(board)))
}

pub(crate) async fn list_columns(
    State(state): State<ApiServer>,
    Path(board_id): Path<BoardId>,
) -> ApiResult<Json<Vec<Column>>> {
    if state.store().get_board(board_id).await?.is_none() {
        return Err(ApiError::board_not_found(board_id));
    }
    Ok(Json(state.store().list_columns(board_id).await?))
}

pub(crate) async fn create_column(
    State(state): State<ApiServer>,
    Path(board_id): Path<BoardId>,
    ApiJson(input): ApiJson<NewColumn>,
) -> ApiResult<(StatusCode, Json<Column>)> {
    require_non_blank("name", &input.name)?;
    if state.store().get_board(board_id).await?.is_none() {
        return Err(ApiError::board_not_found(board_id));
    }
    let column = state.store().create_column(board_id, input).await?;
    Ok((StatusCode::CREATED, Json(column)))
}

// Tasks

pub(crate) async fn list_tasks(
    State(state): State<ApiServer>,
    Path(project_id): Path<ProjectId>,
) -> ApiResult<Json<Vec<Task>>> {
    require_project(&state, project_id).await?;
    Ok(Json(state.store().list_tasks(project_id).await?))
}

pub(crate) async fn create_task(
    State(state): State<ApiServer>,
    Path(project_id): Path<ProjectId>,
    ApiJson(input): ApiJson<NewTask>,
) -> ApiResult<(StatusCode, Json<Task>)> {
    require_non_blank("title", &input.title)?;
    require_project(&state, project_id).await?;
    require_column_in_project(&state, input.column_id, project_id).await?;
    let task = state.store().create_task(project_id, input).await?;
    info!(task_id = task.id, project_id, "task created");
    Ok((StatusCode::CREATED, Json(task)))
}

pub(crate) async fn get_task(
    State(state): State<ApiServer>,
    Path(task_id): Path<TaskId>,
) -> ApiResult<Json<Task>> {
    state
        .store()
        .get_task(task_id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::task_not_found(task_id))
}

pub(crate) async fn update_task(
    State(state): State<ApiServer>,
    Path(task_id): Path<TaskId>,
    ApiJson(update): ApiJson<TaskUpdate>,
) -> ApiResult<Json<Task>> {
    if let Some(title) = &update.title {
        require_non_blank("title", title)?;
    }
    let existing = state
        .store()
        .get_task(task_id)
        .await?
        .ok_or_else(|| ApiError::task_not_found(task_id))?;
    if let Some(column_id) = update.column_id {
        require_column_in_project(&state, column_id, existing.project_id).await?;
    }

    let task = state
        .store()
        .update_task(task_id, update)
        .await?
        .ok_or_else(|| ApiError::task_not_found(task_id))?;
    if task.status != existing.status {
        info!(task_id, from = %existing.status, to = %task.status, "task moved");
    }
    Ok(Json(task))
}

pub(crate) async fn delete_task(
    State(state): State<ApiServer>,
    Path(task_id): Path<TaskId>,
) -> ApiResult<StatusCode> {
    if !state.store().delete_task(task_id).await? {
        return Err(ApiError::task_not_found(task_id));
    }
    info!(task_id, "task deleted");
    Ok(StatusCode::NO_CONTENT)
}

// Dependencies

pub(crate) async fn get_dependencies(
    State(state): State<ApiServer>,
    Path(task_id): Path<TaskId>,
) -> ApiResult<Json<TaskDependencies>> {
    Ok(Json(state.graph().get_dependencies(task_id).await?))
}

pub(crate) async fn add_dependency(
    State(state): State<ApiServer>,
    Path(task_id): Path<TaskId>,
    ApiJson(body): ApiJson<AddDependencyRequest>,
) -> ApiResult<(StatusCode, Json<Dependency>)> {
    let dep = state
        .graph()
        .add_dependency(task_id, body.depends_on_task_id)
        .await?;
    info!(task_id, depends_on = body.depends_on_task_id, "dependency added");
    Ok((StatusCode::CREATED, Json(dep)))
}

pub(crate) async fn remove_dependency(
    State(state): State<ApiServer>,
    Path((task_id, depends_on_task_id)): Path<(TaskId, TaskId)>,
) -> ApiResult<StatusCode> {
    state
        .graph()
        .remove_dependency(task_id, depends_on_task_id)
        .await?;
    info!(task_id, depends_on = depends_on_task_id, "dependency removed");
    Ok(StatusCode::NO_CONTENT)
}

pub(crate) async fn list_project_dependencies(
    State(state): State<ApiServer>,
    Path(project_id): Path<ProjectId>,
) -> ApiResult<Json<Vec<Dependency>>> {
    require_project(&state, project_id).await?;
    Ok(Json(state.graph().list_dependencies(project_id).await?))
}

pub(crate) async fn list_blocked_tasks(
    State(state): State<ApiServer>,
    Path(project_id): Path<ProjectId>,
) -> ApiResult<Json<Vec<Task>>> {
    require_project(&state, project_id).await?;
    Ok(Json(state.graph().blocked_tasks(project_id).await?))
}

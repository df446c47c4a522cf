use super::AppState;
use super::auth::Owner;
use super::dto::{CreateTaskRequest, SuccessResponse, UpdateTaskRequest, validated};
use super::error::ApiError;
use crate::server::telemetry::{increment_tasks_created, increment_tasks_deleted};
use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use taskvault::{PublicId, TaskView};

type ApiResult<T> = Result<SuccessResponse<T>, ApiError>;

fn public_id(raw: &str) -> Result<PublicId, ApiError> {
    Ok(raw.parse::<PublicId>()?)
}

fn body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, ApiError> {
    payload
        .map(|Json(body)| body)
        .map_err(|rejection| ApiError::InvalidBody(rejection.body_text()))
}

pub async fn get_all_tasks(
    State(state): State<AppState>,
    Owner(owner): Owner,
) -> ApiResult<Vec<TaskView>> {
    let tasks = state.tasks.get_all_tasks(&owner);
    tracing::debug!(%owner, count = tasks.len(), "listed tasks");
    Ok(SuccessResponse::ok("All tasks retrieved", tasks))
}

pub async fn get_task(
    State(state): State<AppState>,
    Owner(owner): Owner,
    Path(id): Path<String>,
) -> ApiResult<TaskView> {
    let id = public_id(&id)?;
    let task = state.tasks.get_task_by_id(&owner, id)?;
    Ok(SuccessResponse::ok("Task retrieved", task))
}

pub async fn create_task(
    State(state): State<AppState>,
    Owner(owner): Owner,
    payload: Result<Json<CreateTaskRequest>, JsonRejection>,
) -> ApiResult<TaskView> {
    let req = validated(body(payload)?)?;
    let task = state.tasks.create_task(&owner, req.into());
    increment_tasks_created();
    tracing::info!(%owner, id = %task.id, "created task");
    Ok(SuccessResponse::created("Task created", task))
}

pub async fn update_task(
    State(state): State<AppState>,
    Owner(owner): Owner,
    Path(id): Path<String>,
    payload: Result<Json<UpdateTaskRequest>, JsonRejection>,
) -> ApiResult<TaskView> {
    let id = public_id(&id)?;
    let req = validated(body(payload)?)?;
    let task = state.tasks.update_task(&owner, id, req.into())?;
    tracing::info!(%owner, %id, "updated task");
    Ok(SuccessResponse::ok("Task updated", task))
}

pub async fn delete_task(
    State(state): State<AppState>,
    Owner(owner): Owner,
    Path(id): Path<String>,
) -> ApiResult<()> {
    let id = public_id(&id)?;
    state.tasks.delete_task(&owner, id)?;
    increment_tasks_deleted();
    tracing::info!(%owner, %id, "deleted task");
    Ok(SuccessResponse::ok("Task deleted", ()))
}

pub async fn route_not_found() -> ApiError {
    ApiError::RouteNotFound
}

//! User administration handlers (admin only)

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use shared::{MessageResponse, Page};
use uuid::Uuid;

use crate::error::AppResult;
use crate::middleware::{require_admin, CurrentUser};
use crate::services::user::{CreateUserInput, ListUsersQuery, UpdateUserInput, UserProfile};
use crate::services::UserService;
use crate::AppState;

/// List users
pub async fn list_users(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Query(query): Query<ListUsersQuery>,
) -> AppResult<Json<Page<UserProfile>>> {
    require_admin(&current_user.0)?;
    let service = UserService::new(state.db);
    Ok(Json(service.list_users(query).await?))
}

/// Create a user
pub async fn create_user(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(input): Json<CreateUserInput>,
) -> AppResult<(StatusCode, Json<UserProfile>)> {
    require_admin(&current_user.0)?;
    let service = UserService::new(state.db);
    let user = service.create_user(input).await?;
    Ok((StatusCode::CREATED, Json(user)))
}

/// Update a user
pub async fn update_user(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(user_id): Path<Uuid>,
    Json(input): Json<UpdateUserInput>,
) -> AppResult<Json<UserProfile>> {
    require_admin(&current_user.0)?;
    let service = UserService::new(state.db);
    Ok(Json(service.update_user(user_id, input).await?))
}

/// Delete a user
pub async fn delete_user(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(user_id): Path<Uuid>,
) -> AppResult<Json<MessageResponse>> {
    require_admin(&current_user.0)?;
    let service = UserService::new(state.db);
    service.delete_user(current_user.0.user_id, user_id).await?;
    Ok(Json(MessageResponse::new("User deleted")))
}

/// Active supervisors
pub async fn list_supervisor_users(
    State(state): State<AppState>,
    current_user: CurrentUser,
) -> AppResult<Json<Vec<UserProfile>>> {
    require_admin(&current_user.0)?;
    let service = UserService::new(state.db);
    Ok(Json(service.list_supervisors().await?))
}

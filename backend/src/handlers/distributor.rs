//! Distributor handlers

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use shared::{MessageResponse, Page};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::middleware::{require_admin, CurrentUser};
use crate::services::distributor::{
    BulkReassignInput, BulkReassignResult, Distributor, DistributorInput, ListDistributorsQuery,
    SupervisorOption,
};
use crate::services::{DistributorService, ScopeService};
use crate::AppState;

/// List distributors visible to the caller
pub async fn list_distributors(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Query(query): Query<ListDistributorsQuery>,
) -> AppResult<Json<Page<Distributor>>> {
    let access = ScopeService::new(state.db.clone()).resolve(&current_user.0).await?;
    let service = DistributorService::new(state.db.clone());
    Ok(Json(service.list_distributors(&access, query).await?))
}

pub async fn get_distributor(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(distributor_id): Path<Uuid>,
) -> AppResult<Json<Distributor>> {
    let access = ScopeService::new(state.db.clone()).resolve(&current_user.0).await?;
    if !access.covers(distributor_id) {
        return Err(AppError::forbidden("Distributor is outside your scope"));
    }
    let service = DistributorService::new(state.db.clone());
    Ok(Json(service.get_distributor(distributor_id).await?))
}

pub async fn create_distributor(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(input): Json<DistributorInput>,
) -> AppResult<(StatusCode, Json<Distributor>)> {
    require_admin(&current_user.0)?;
    let service = DistributorService::new(state.db.clone());
    let distributor = service.create_distributor(input).await?;
    Ok((StatusCode::CREATED, Json(distributor)))
}

pub async fn update_distributor(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(distributor_id): Path<Uuid>,
    Json(input): Json<DistributorInput>,
) -> AppResult<Json<Distributor>> {
    require_admin(&current_user.0)?;
    let service = DistributorService::new(state.db.clone());
    Ok(Json(service.update_distributor(distributor_id, input).await?))
}

pub async fn delete_distributor(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(distributor_id): Path<Uuid>,
) -> AppResult<Json<MessageResponse>> {
    require_admin(&current_user.0)?;
    let service = DistributorService::new(state.db.clone());
    service.delete_distributor(distributor_id).await?;
    Ok(Json(MessageResponse::new("Distributor deleted")))
}

/// Move several distributors to one supervisor
pub async fn bulk_reassign(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(input): Json<BulkReassignInput>,
) -> AppResult<Json<BulkReassignResult>> {
    require_admin(&current_user.0)?;
    let service = DistributorService::new(state.db.clone());
    Ok(Json(service.bulk_reassign(input).await?))
}

pub async fn list_supervisors(
    State(state): State<AppState>,
    current_user: CurrentUser,
) -> AppResult<Json<Vec<SupervisorOption>>> {
    require_admin(&current_user.0)?;
    let service = DistributorService::new(state.db.clone());
    Ok(Json(service.supervisors().await?))
}

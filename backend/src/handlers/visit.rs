//! Field visit handlers

use axum::{
    extract::{Query, State},
    Json,
};

use crate::error::AppResult;
use crate::middleware::CurrentUser;
use crate::services::visit::{UpsertVisitInput, UpsertVisitResult, VisitMatrix, VisitMatrixQuery};
use crate::services::{ScopeService, VisitService};
use crate::AppState;

/// One row per vendor of a distributor with that day's visit counters
pub async fn visit_matrix(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Query(query): Query<VisitMatrixQuery>,
) -> AppResult<Json<VisitMatrix>> {
    let access = ScopeService::new(state.db.clone()).resolve(&current_user.0).await?;
    let service = VisitService::new(state.db.clone());
    Ok(Json(service.matrix(&access, query).await?))
}

pub async fn upsert_visit(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(input): Json<UpsertVisitInput>,
) -> AppResult<Json<UpsertVisitResult>> {
    let access = ScopeService::new(state.db.clone()).resolve(&current_user.0).await?;
    let service = VisitService::new(state.db.clone());
    Ok(Json(service.upsert(&access, input).await?))
}

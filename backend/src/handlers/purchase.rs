//! Purchase handlers

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use shared::{MessageResponse, Page};
use uuid::Uuid;

use crate::error::AppResult;
use crate::middleware::CurrentUser;
use crate::services::purchase::{
    CreatePurchaseInput, ListPurchasesQuery, PurchaseMatrixQuery, PurchaseMatrixRow,
    PurchaseWithLines, UpdatePurchaseInput,
};
use crate::services::{PurchaseService, ScopeService};
use crate::AppState;

pub async fn list_purchases(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Query(query): Query<ListPurchasesQuery>,
) -> AppResult<Json<Page<PurchaseWithLines>>> {
    let access = ScopeService::new(state.db.clone()).resolve(&current_user.0).await?;
    let service = PurchaseService::new(state.db.clone());
    Ok(Json(service.list_purchases(&access, query).await?))
}

pub async fn get_purchase(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(purchase_id): Path<Uuid>,
) -> AppResult<Json<PurchaseWithLines>> {
    let access = ScopeService::new(state.db.clone()).resolve(&current_user.0).await?;
    let service = PurchaseService::new(state.db.clone());
    Ok(Json(service.get_purchase(&access, purchase_id).await?))
}

pub async fn create_purchase(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(input): Json<CreatePurchaseInput>,
) -> AppResult<(StatusCode, Json<PurchaseWithLines>)> {
    let access = ScopeService::new(state.db.clone()).resolve(&current_user.0).await?;
    let service = PurchaseService::new(state.db.clone());
    let purchase = service.create_purchase(&access, input).await?;
    Ok((StatusCode::CREATED, Json(purchase)))
}

pub async fn update_purchase(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(purchase_id): Path<Uuid>,
    Json(input): Json<UpdatePurchaseInput>,
) -> AppResult<Json<PurchaseWithLines>> {
    let access = ScopeService::new(state.db.clone()).resolve(&current_user.0).await?;
    let service = PurchaseService::new(state.db.clone());
    Ok(Json(service.update_purchase(&access, purchase_id, input).await?))
}

pub async fn delete_purchase(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(purchase_id): Path<Uuid>,
) -> AppResult<Json<MessageResponse>> {
    let access = ScopeService::new(state.db.clone()).resolve(&current_user.0).await?;
    let service = PurchaseService::new(state.db.clone());
    service.delete_purchase(&access, purchase_id).await?;
    Ok(Json(MessageResponse::new("Purchase deleted")))
}

/// Product grid for entering a purchase order
pub async fn purchase_matrix(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Query(query): Query<PurchaseMatrixQuery>,
) -> AppResult<Json<Page<PurchaseMatrixRow>>> {
    let access = ScopeService::new(state.db.clone()).resolve(&current_user.0).await?;
    let service = PurchaseService::new(state.db.clone());
    Ok(Json(service.purchase_matrix(&access, query).await?))
}

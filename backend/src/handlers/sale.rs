//! Sales handlers, including the weekly entry matrix

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use shared::{MessageResponse, Page};
use uuid::Uuid;

use crate::error::AppResult;
use crate::middleware::CurrentUser;
use crate::services::sale::{
    BulkCellInput, BulkCellResult, CellResult, CreateSaleInput, ListSalesQuery, SaleCellInput,
    SaleStatusInput, SaleWithLines, SalesMatrix, SalesMatrixQuery, StatusChange, UpdateSaleInput,
};
use crate::services::{SaleService, ScopeService};
use crate::AppState;

pub async fn list_sales(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Query(query): Query<ListSalesQuery>,
) -> AppResult<Json<Page<SaleWithLines>>> {
    let access = ScopeService::new(state.db.clone()).resolve(&current_user.0).await?;
    let service = SaleService::new(state.db.clone());
    Ok(Json(service.list_sales(&access, query).await?))
}

pub async fn get_sale(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(sale_id): Path<Uuid>,
) -> AppResult<Json<SaleWithLines>> {
    let access = ScopeService::new(state.db.clone()).resolve(&current_user.0).await?;
    let service = SaleService::new(state.db.clone());
    Ok(Json(service.get_sale(&access, sale_id).await?))
}

pub async fn create_sale(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(input): Json<CreateSaleInput>,
) -> AppResult<(StatusCode, Json<SaleWithLines>)> {
    let access = ScopeService::new(state.db.clone()).resolve(&current_user.0).await?;
    let service = SaleService::new(state.db.clone());
    let sale = service.create_sale(&access, input).await?;
    Ok((StatusCode::CREATED, Json(sale)))
}

pub async fn update_sale(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(sale_id): Path<Uuid>,
    Json(input): Json<UpdateSaleInput>,
) -> AppResult<Json<SaleWithLines>> {
    let access = ScopeService::new(state.db.clone()).resolve(&current_user.0).await?;
    let service = SaleService::new(state.db.clone());
    Ok(Json(service.update_sale(&access, sale_id, input).await?))
}

pub async fn delete_sale(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(sale_id): Path<Uuid>,
) -> AppResult<Json<MessageResponse>> {
    let access = ScopeService::new(state.db.clone()).resolve(&current_user.0).await?;
    let service = SaleService::new(state.db.clone());
    service.delete_sale(&access, sale_id).await?;
    Ok(Json(MessageResponse::new("Sale deleted")))
}

/// Six-day grid of one vendor's sales, one row per product
pub async fn sales_matrix(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Query(query): Query<SalesMatrixQuery>,
) -> AppResult<Json<SalesMatrix>> {
    let access = ScopeService::new(state.db.clone()).resolve(&current_user.0).await?;
    let service = SaleService::new(state.db.clone());
    Ok(Json(service.weekly_matrix(&access, query).await?))
}

pub async fn upsert_cell(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(input): Json<SaleCellInput>,
) -> AppResult<Json<CellResult>> {
    let access = ScopeService::new(state.db.clone()).resolve(&current_user.0).await?;
    let service = SaleService::new(state.db.clone());
    Ok(Json(service.upsert_cell(&access, input).await?))
}

pub async fn bulk_upsert(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(input): Json<BulkCellInput>,
) -> AppResult<Json<BulkCellResult>> {
    let access = ScopeService::new(state.db.clone()).resolve(&current_user.0).await?;
    let service = SaleService::new(state.db.clone());
    Ok(Json(service.bulk_upsert(&access, input).await?))
}

/// Set the status of a vendor's sale for one day
pub async fn set_status(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(input): Json<SaleStatusInput>,
) -> AppResult<Json<StatusChange>> {
    let access = ScopeService::new(state.db.clone()).resolve(&current_user.0).await?;
    let service = SaleService::new(state.db.clone());
    Ok(Json(service.set_status_by_date(&access, input).await?))
}

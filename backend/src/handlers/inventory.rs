//! Inventory handlers

use axum::{
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use shared::{MessageResponse, Page, Role, StockVariance};
use uuid::Uuid;

use crate::error::AppResult;
use crate::middleware::{require_any_role, CurrentUser};
use crate::services::inventory::{
    AdjustStockInput, HistoryEntry, HistoryQuery, PhysicalCountInput, RefreshResult, StockQuery,
};
use crate::services::{InventoryService, ScopeService};
use crate::AppState;

fn inventory_service(state: &AppState) -> InventoryService {
    InventoryService::new(state.db.clone(), state.config.inventory.low_stock_threshold)
}

/// Current balances of a distributor, as JSON or CSV
pub async fn get_stock(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Query(query): Query<StockQuery>,
) -> AppResult<Response> {
    let access = ScopeService::new(state.db.clone()).resolve(&current_user.0).await?;
    let service = inventory_service(&state);
    let stock = service.stock(&access, &query).await?;

    if query.format.as_deref() == Some("csv") {
        let csv = InventoryService::export_to_csv(&stock.data)?;
        Ok((
            [(header::CONTENT_TYPE, "text/csv"), (header::CONTENT_DISPOSITION, "attachment; filename=\"stock.csv\"")],
            csv,
        ).into_response())
    } else {
        Ok(Json(stock).into_response())
    }
}

pub async fn adjust_stock(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(input): Json<AdjustStockInput>,
) -> AppResult<(StatusCode, Json<MessageResponse>)> {
    let access = ScopeService::new(state.db.clone()).resolve(&current_user.0).await?;
    let response = inventory_service(&state).adjust(&access, input).await?;
    Ok((StatusCode::CREATED, Json(response)))
}

pub async fn delete_adjustment(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(adjustment_id): Path<Uuid>,
) -> AppResult<Json<MessageResponse>> {
    let access = ScopeService::new(state.db.clone()).resolve(&current_user.0).await?;
    inventory_service(&state)
        .delete_adjustment(&access, adjustment_id)
        .await?;
    Ok(Json(MessageResponse::new("Adjustment deleted")))
}

/// Movement history of one product at one distributor
pub async fn get_history(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path((distributor_id, product_id)): Path<(Uuid, Uuid)>,
    Query(query): Query<HistoryQuery>,
) -> AppResult<Json<Page<HistoryEntry>>> {
    let access = ScopeService::new(state.db.clone()).resolve(&current_user.0).await?;
    let history = inventory_service(&state)
        .history(&access, distributor_id, product_id, query)
        .await?;
    Ok(Json(history))
}

/// Rebuild every balance from the transaction ledger
pub async fn refresh_stock(
    State(state): State<AppState>,
    current_user: CurrentUser,
) -> AppResult<Json<RefreshResult>> {
    require_any_role(&current_user.0, &[Role::Admin, Role::Dg, Role::Dc])?;
    Ok(Json(inventory_service(&state).refresh().await?))
}

pub async fn record_physical(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(input): Json<PhysicalCountInput>,
) -> AppResult<Json<StockVariance>> {
    let access = ScopeService::new(state.db.clone()).resolve(&current_user.0).await?;
    Ok(Json(inventory_service(&state).record_physical(&access, input).await?))
}

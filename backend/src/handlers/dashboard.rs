//! Dashboard handler

use axum::{extract::State, Json};

use crate::error::AppResult;
use crate::middleware::CurrentUser;
use crate::services::dashboard::DashboardResponse;
use crate::services::{DashboardService, ScopeService};
use crate::AppState;

/// Month-to-date metrics and rankings for the caller's territory
pub async fn get_stats(
    State(state): State<AppState>,
    current_user: CurrentUser,
) -> AppResult<Json<DashboardResponse>> {
    let access = ScopeService::new(state.db.clone()).resolve(&current_user.0).await?;
    let service = DashboardService::new(
        state.db.clone(),
        state.config.inventory.low_stock_threshold,
    );
    Ok(Json(service.stats(&access).await?))
}

//! Vendor handlers

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use shared::{MessageResponse, Page};
use uuid::Uuid;

use crate::error::AppResult;
use crate::middleware::CurrentUser;
use crate::services::vendor::{ListVendorsQuery, Vendor, VendorInput};
use crate::services::{ScopeService, VendorService};
use crate::AppState;

pub async fn list_vendors(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Query(query): Query<ListVendorsQuery>,
) -> AppResult<Json<Page<Vendor>>> {
    let access = ScopeService::new(state.db.clone()).resolve(&current_user.0).await?;
    let service = VendorService::new(state.db.clone());
    Ok(Json(service.list_vendors(&access, query).await?))
}

pub async fn create_vendor(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(input): Json<VendorInput>,
) -> AppResult<(StatusCode, Json<Vendor>)> {
    let access = ScopeService::new(state.db.clone()).resolve(&current_user.0).await?;
    let service = VendorService::new(state.db.clone());
    let vendor = service.create_vendor(&access, input).await?;
    Ok((StatusCode::CREATED, Json(vendor)))
}

pub async fn update_vendor(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(vendor_id): Path<Uuid>,
    Json(input): Json<VendorInput>,
) -> AppResult<Json<Vendor>> {
    let access = ScopeService::new(state.db.clone()).resolve(&current_user.0).await?;
    let service = VendorService::new(state.db.clone());
    Ok(Json(service.update_vendor(&access, vendor_id, input).await?))
}

pub async fn delete_vendor(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(vendor_id): Path<Uuid>,
) -> AppResult<Json<MessageResponse>> {
    let access = ScopeService::new(state.db.clone()).resolve(&current_user.0).await?;
    let service = VendorService::new(state.db.clone());
    service.delete_vendor(&access, vendor_id).await?;
    Ok(Json(MessageResponse::new("Vendor deleted")))
}

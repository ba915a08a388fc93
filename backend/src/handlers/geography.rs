//! Geography handlers

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use shared::MessageResponse;
use uuid::Uuid;

use crate::error::AppResult;
use crate::middleware::{require_admin, CurrentUser};
use crate::services::geography::{
    CreateRegionInput, CreateWilayaInput, CreateZoneInput, Region, Wilaya, Zone,
};
use crate::services::GeographyService;
use crate::AppState;

#[derive(Deserialize)]
pub struct ZoneFilter {
    pub region_id: Option<Uuid>,
}

#[derive(Deserialize)]
pub struct WilayaFilter {
    pub zone_id: Option<Uuid>,
}

pub async fn list_regions(
    State(state): State<AppState>,
    _current_user: CurrentUser,
) -> AppResult<Json<Vec<Region>>> {
    Ok(Json(GeographyService::new(state.db).list_regions().await?))
}

pub async fn create_region(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(input): Json<CreateRegionInput>,
) -> AppResult<(StatusCode, Json<Region>)> {
    require_admin(&current_user.0)?;
    let region = GeographyService::new(state.db).create_region(input).await?;
    Ok((StatusCode::CREATED, Json(region)))
}

pub async fn delete_region(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(region_id): Path<Uuid>,
) -> AppResult<Json<MessageResponse>> {
    require_admin(&current_user.0)?;
    GeographyService::new(state.db).delete_region(region_id).await?;
    Ok(Json(MessageResponse::new("Region deleted")))
}

pub async fn list_zones(
    State(state): State<AppState>,
    _current_user: CurrentUser,
    Query(filter): Query<ZoneFilter>,
) -> AppResult<Json<Vec<Zone>>> {
    Ok(Json(
        GeographyService::new(state.db)
            .list_zones(filter.region_id)
            .await?,
    ))
}

pub async fn create_zone(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(input): Json<CreateZoneInput>,
) -> AppResult<(StatusCode, Json<Zone>)> {
    require_admin(&current_user.0)?;
    let zone = GeographyService::new(state.db).create_zone(input).await?;
    Ok((StatusCode::CREATED, Json(zone)))
}

pub async fn delete_zone(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(zone_id): Path<Uuid>,
) -> AppResult<Json<MessageResponse>> {
    require_admin(&current_user.0)?;
    GeographyService::new(state.db).delete_zone(zone_id).await?;
    Ok(Json(MessageResponse::new("Zone deleted")))
}

pub async fn list_wilayas(
    State(state): State<AppState>,
    _current_user: CurrentUser,
    Query(filter): Query<WilayaFilter>,
) -> AppResult<Json<Vec<Wilaya>>> {
    Ok(Json(
        GeographyService::new(state.db)
            .list_wilayas(filter.zone_id)
            .await?,
    ))
}

pub async fn create_wilaya(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(input): Json<CreateWilayaInput>,
) -> AppResult<(StatusCode, Json<Wilaya>)> {
    require_admin(&current_user.0)?;
    let wilaya = GeographyService::new(state.db).create_wilaya(input).await?;
    Ok((StatusCode::CREATED, Json(wilaya)))
}

pub async fn delete_wilaya(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(wilaya_id): Path<Uuid>,
) -> AppResult<Json<MessageResponse>> {
    require_admin(&current_user.0)?;
    GeographyService::new(state.db).delete_wilaya(wilaya_id).await?;
    Ok(Json(MessageResponse::new("Wilaya deleted")))
}

//! Dropdown lookups for the front-end forms

use axum::{
    extract::{Path, State},
    Json,
};
use uuid::Uuid;

use crate::error::AppResult;
use crate::middleware::CurrentUser;
use crate::services::geography::GeographyTree;
use crate::services::lookup::{
    AdminMetadata, CategoryFormats, DistributorOption, ProductOption, VendorOption,
};
use crate::services::{LookupService, ScopeService};
use crate::AppState;

pub async fn lookup_admin_metadata(
    State(state): State<AppState>,
    _current_user: CurrentUser,
) -> AppResult<Json<AdminMetadata>> {
    Ok(Json(LookupService::new(state.db.clone()).admin_metadata().await?))
}

pub async fn lookup_distributors(
    State(state): State<AppState>,
    current_user: CurrentUser,
) -> AppResult<Json<Vec<DistributorOption>>> {
    let access = ScopeService::new(state.db.clone()).resolve(&current_user.0).await?;
    Ok(Json(LookupService::new(state.db.clone()).distributors(&access).await?))
}

pub async fn lookup_products(
    State(state): State<AppState>,
    _current_user: CurrentUser,
) -> AppResult<Json<Vec<ProductOption>>> {
    Ok(Json(LookupService::new(state.db.clone()).products().await?))
}

pub async fn lookup_vendors_by_distributor(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(distributor_id): Path<Uuid>,
) -> AppResult<Json<Vec<VendorOption>>> {
    let access = ScopeService::new(state.db.clone()).resolve(&current_user.0).await?;
    let vendors = LookupService::new(state.db.clone())
        .vendors_by_distributor(&access, distributor_id)
        .await?;
    Ok(Json(vendors))
}

pub async fn lookup_categories_with_formats(
    State(state): State<AppState>,
    _current_user: CurrentUser,
) -> AppResult<Json<Vec<CategoryFormats>>> {
    Ok(Json(
        LookupService::new(state.db.clone())
            .categories_with_formats()
            .await?,
    ))
}

pub async fn lookup_geography(
    State(state): State<AppState>,
    _current_user: CurrentUser,
) -> AppResult<Json<GeographyTree>> {
    Ok(Json(LookupService::new(state.db.clone()).geography().await?))
}

//! Route definitions for the Distribution Management Platform

use axum::{
    middleware,
    routing::{delete, get, post, put},
    Router,
};

use crate::{handlers, middleware::auth_middleware, AppState};

/// Create API routes
pub fn api_routes(state: &AppState) -> Router<AppState> {
    Router::new()
        // Health check (public)
        .route("/health", get(handlers::health_check))
        // Auth routes (login and refresh are public)
        .nest("/auth", auth_routes(state))
        // Protected routes - form lookups
        .nest("/lookups", lookup_routes(state))
        // Protected routes - user administration
        .nest("/users", user_routes(state))
        // Protected routes - territory hierarchy
        .nest("/geography", geography_routes(state))
        // Protected routes - distributors
        .nest("/distributors", distributor_routes(state))
        // Protected routes - product catalogue
        .nest("/products", product_routes(state))
        // Protected routes - vendors
        .nest("/vendors", vendor_routes(state))
        // Protected routes - sales
        .nest("/sales", sale_routes(state))
        // Protected routes - purchases
        .nest("/purchases", purchase_routes(state))
        // Protected routes - field visits
        .nest("/visits", visit_routes(state))
        // Protected routes - inventory
        .nest("/inventory", inventory_routes(state))
        // Protected routes - dashboard
        .nest("/dashboard", dashboard_routes(state))
}

/// Authentication routes
fn auth_routes(state: &AppState) -> Router<AppState> {
    let protected = Router::new()
        .route("/me", get(handlers::me))
        .route_layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    Router::new()
        .route("/login", post(handlers::login))
        .route("/refresh", post(handlers::refresh))
        .merge(protected)
}

/// Lookup routes (protected)
fn lookup_routes(state: &AppState) -> Router<AppState> {
    Router::new()
        .route("/admin-metadata", get(handlers::lookup_admin_metadata))
        .route("/distributors", get(handlers::lookup_distributors))
        .route("/products", get(handlers::lookup_products))
        .route(
            "/vendors/distributor/:distributor_id",
            get(handlers::lookup_vendors_by_distributor),
        )
        .route(
            "/categories-with-formats",
            get(handlers::lookup_categories_with_formats),
        )
        .route("/geography", get(handlers::lookup_geography))
        .route_layer(middleware::from_fn_with_state(state.clone(), auth_middleware))
}

/// User administration routes (protected)
fn user_routes(state: &AppState) -> Router<AppState> {
    Router::new()
        .route("/", get(handlers::list_users).post(handlers::create_user))
        .route("/supervisors", get(handlers::list_supervisor_users))
        .route(
            "/:user_id",
            put(handlers::update_user).delete(handlers::delete_user),
        )
        .route_layer(middleware::from_fn_with_state(state.clone(), auth_middleware))
}

/// Geography routes (protected)
fn geography_routes(state: &AppState) -> Router<AppState> {
    Router::new()
        .route(
            "/regions",
            get(handlers::list_regions).post(handlers::create_region),
        )
        .route("/regions/:region_id", delete(handlers::delete_region))
        .route("/zones", get(handlers::list_zones).post(handlers::create_zone))
        .route("/zones/:zone_id", delete(handlers::delete_zone))
        .route(
            "/wilayas",
            get(handlers::list_wilayas).post(handlers::create_wilaya),
        )
        .route("/wilayas/:wilaya_id", delete(handlers::delete_wilaya))
        .route_layer(middleware::from_fn_with_state(state.clone(), auth_middleware))
}

/// Distributor routes (protected)
fn distributor_routes(state: &AppState) -> Router<AppState> {
    Router::new()
        .route(
            "/",
            get(handlers::list_distributors).post(handlers::create_distributor),
        )
        .route("/bulk-reassign", post(handlers::bulk_reassign))
        .route("/supervisors", get(handlers::list_supervisors))
        .route(
            "/:distributor_id",
            get(handlers::get_distributor)
                .put(handlers::update_distributor)
                .delete(handlers::delete_distributor),
        )
        .route_layer(middleware::from_fn_with_state(state.clone(), auth_middleware))
}

/// Product routes (protected)
fn product_routes(state: &AppState) -> Router<AppState> {
    Router::new()
        .route("/", get(handlers::list_products).post(handlers::create_product))
        .route(
            "/:product_id",
            get(handlers::get_product).put(handlers::update_product),
        )
        .route_layer(middleware::from_fn_with_state(state.clone(), auth_middleware))
}

/// Vendor routes (protected)
fn vendor_routes(state: &AppState) -> Router<AppState> {
    Router::new()
        .route("/", get(handlers::list_vendors).post(handlers::create_vendor))
        .route(
            "/:vendor_id",
            put(handlers::update_vendor).delete(handlers::delete_vendor),
        )
        .route_layer(middleware::from_fn_with_state(state.clone(), auth_middleware))
}

/// Sales routes (protected)
fn sale_routes(state: &AppState) -> Router<AppState> {
    Router::new()
        .route("/", get(handlers::list_sales).post(handlers::create_sale))
        .route("/matrix", get(handlers::sales_matrix))
        .route("/upsert", post(handlers::upsert_cell))
        .route("/bulk-upsert", post(handlers::bulk_upsert))
        .route("/status", post(handlers::set_status))
        .route(
            "/:sale_id",
            get(handlers::get_sale)
                .put(handlers::update_sale)
                .delete(handlers::delete_sale),
        )
        .route_layer(middleware::from_fn_with_state(state.clone(), auth_middleware))
}

/// Purchase routes (protected)
fn purchase_routes(state: &AppState) -> Router<AppState> {
    Router::new()
        .route(
            "/",
            get(handlers::list_purchases).post(handlers::create_purchase),
        )
        .route("/matrix", get(handlers::purchase_matrix))
        .route(
            "/:purchase_id",
            get(handlers::get_purchase)
                .put(handlers::update_purchase)
                .delete(handlers::delete_purchase),
        )
        .route_layer(middleware::from_fn_with_state(state.clone(), auth_middleware))
}

/// Visit routes (protected)
fn visit_routes(state: &AppState) -> Router<AppState> {
    Router::new()
        .route("/matrix", get(handlers::visit_matrix))
        .route("/upsert", post(handlers::upsert_visit))
        .route_layer(middleware::from_fn_with_state(state.clone(), auth_middleware))
}

/// Inventory routes (protected)
fn inventory_routes(state: &AppState) -> Router<AppState> {
    Router::new()
        .route("/stock", get(handlers::get_stock))
        .route("/adjust", post(handlers::adjust_stock))
        .route("/adjust/:adjustment_id", delete(handlers::delete_adjustment))
        .route(
            "/history/:distributor_id/:product_id",
            get(handlers::get_history),
        )
        .route("/refresh", post(handlers::refresh_stock))
        .route("/physical", post(handlers::record_physical))
        .route_layer(middleware::from_fn_with_state(state.clone(), auth_middleware))
}

/// Dashboard routes (protected)
fn dashboard_routes(state: &AppState) -> Router<AppState> {
    Router::new()
        .route("/stats", get(handlers::get_stats))
        .route_layer(middleware::from_fn_with_state(state.clone(), auth_middleware))
}

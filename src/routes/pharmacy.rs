use axum::{
    Extension, Json, Router,
    extract::{Path, State},
    response::IntoResponse,
    routing,
};
use serde::Deserialize;
use utoipa::ToSchema;

use crate::{
    core::{
        auth::{self, AuthUser},
        error::{AppError, StdResponse},
        state::AppState,
    },
    models::OrderStatus,
    services::{
        catalog::{self, CreateMedicine, RegisterPharmacy, UpdateMedicine},
        orders,
    },
};

/// Pharmacist-facing routes: registration, product management, incoming
/// orders.
pub fn routes(state: AppState) -> Router<AppState> {
    Router::new().nest(
        "/api/pharmacy",
        Router::new()
            .route("/register", routing::post(register))
            .route(
                "/products",
                routing::get(own_products).post(create_product),
            )
            .route("/products/add", routing::post(create_product))
            .route("/products/{id}/update", routing::put(update_product))
            .route("/products/{id}/delete", routing::delete(delete_product))
            .route("/orders", routing::get(incoming_orders))
            .route("/orders/{id}/status", routing::post(update_order_status))
            .route_layer(axum::middleware::from_fn_with_state(
                state,
                auth::pharmacists_authorization,
            )),
    )
}

async fn register(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Json(body): Json<RegisterPharmacy>,
) -> Result<impl IntoResponse, AppError> {
    let pharmacy = catalog::register_pharmacy(&state.store, auth.id, body).await?;
    Ok(StdResponse::ok(
        pharmacy,
        "Pharmacy registered successfully, pending verification",
    ))
}

async fn own_products(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
) -> Result<impl IntoResponse, AppError> {
    let products = catalog::own_products(&state.store, auth.id).await?;
    Ok(StdResponse::ok(products, "Products retrieved successfully"))
}

async fn create_product(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Json(body): Json<CreateMedicine>,
) -> Result<impl IntoResponse, AppError> {
    let product = catalog::create_medicine(&state.store, auth.id, body).await?;
    Ok(StdResponse::ok(
        product,
        "Product created successfully, pending approval",
    ))
}

async fn update_product(
    Path(id): Path<i32>,
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Json(body): Json<UpdateMedicine>,
) -> Result<impl IntoResponse, AppError> {
    let product = catalog::update_medicine(&state.store, auth.id, id, body).await?;
    Ok(StdResponse::ok(product, "Product updated successfully"))
}

async fn delete_product(
    Path(id): Path<i32>,
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
) -> Result<impl IntoResponse, AppError> {
    let product = catalog::delete_medicine(&state.store, auth.id, id).await?;
    Ok(StdResponse::ok(product, "Product deleted successfully"))
}

async fn incoming_orders(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
) -> Result<impl IntoResponse, AppError> {
    let orders = orders::pharmacy_orders(&state.store, auth.id).await?;
    Ok(StdResponse::ok(orders, "Orders retrieved successfully"))
}

#[derive(Deserialize, ToSchema)]
struct UpdateOrderStatusReq {
    status: OrderStatus,
}

async fn update_order_status(
    Path(id): Path<i32>,
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Json(body): Json<UpdateOrderStatusReq>,
) -> Result<impl IntoResponse, AppError> {
    let order = orders::advance_status(&state.store, auth, id, body.status).await?;
    Ok(StdResponse::ok(order, "Order status updated successfully"))
}

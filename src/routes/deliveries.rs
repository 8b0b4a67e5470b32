use axum::{
    Extension, Json, Router,
    extract::{Path, State},
    response::IntoResponse,
    routing,
};

use crate::{
    core::{
        auth::{self, AuthUser},
        error::{AppError, StdResponse},
        state::AppState,
    },
    services::deliveries::{self, UpdateDeliveryStatus, UpdateLocation},
};

/// Courier-facing routes, keyed by order id.
pub fn routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/api/deliveries/my-deliveries", routing::get(my_deliveries))
        .route(
            "/api/deliveries/{order_id}/status",
            routing::post(update_status),
        )
        .route(
            "/api/deliveries/{order_id}/location",
            routing::post(update_location),
        )
        .route_layer(axum::middleware::from_fn_with_state(
            state,
            auth::delivery_authorization,
        ))
}

async fn my_deliveries(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
) -> impl IntoResponse {
    let deliveries = deliveries::my_deliveries(&state.store, auth.id).await;
    StdResponse::ok(deliveries, "Deliveries retrieved successfully")
}

async fn delivery_id_of_order(state: &AppState, order_id: i32) -> Result<i32, AppError> {
    let tables = state.store.read().await;
    tables
        .delivery_by_order
        .get(&order_id)
        .copied()
        .ok_or(AppError::NotFound)
}

async fn update_status(
    Path(order_id): Path<i32>,
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Json(body): Json<UpdateDeliveryStatus>,
) -> Result<impl IntoResponse, AppError> {
    let delivery_id = delivery_id_of_order(&state, order_id).await?;
    let delivery = deliveries::update_status(&state.store, auth.id, delivery_id, body).await?;
    Ok(StdResponse::ok(
        delivery,
        "Delivery status updated successfully",
    ))
}

async fn update_location(
    Path(order_id): Path<i32>,
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Json(body): Json<UpdateLocation>,
) -> Result<impl IntoResponse, AppError> {
    let delivery_id = delivery_id_of_order(&state, order_id).await?;
    let delivery = deliveries::update_location(&state.store, auth.id, delivery_id, body).await?;
    Ok(StdResponse::ok(delivery, "Location updated successfully"))
}

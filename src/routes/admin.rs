use axum::{
    Extension, Json, Router,
    extract::{Path, Query, State},
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
        deliveries::{self, AssignDelivery},
        moderation::{self, ModerationQuery, RejectRequest},
        prescriptions::{self, RejectPrescription},
    },
    store::Tables,
};

/// Admin moderation and operations surface.
pub fn routes(state: AppState) -> Router<AppState> {
    Router::new()
        .nest(
            "/api/admin",
            Router::new()
                .route("/pharmacies", routing::get(list_pharmacies))
                .route("/pharmacies/{id}/verify", routing::post(verify_pharmacy))
                .route("/pharmacies/{id}/reject", routing::post(reject_pharmacy))
                .route("/products", routing::get(list_products))
                .route("/products/{id}/approve", routing::post(approve_product))
                .route("/products/{id}/reject", routing::post(reject_product))
                .route("/orders", routing::get(list_orders))
                .route("/dashboard/stats", routing::get(dashboard_stats))
                .route("/prescriptions", routing::get(pending_prescriptions))
                .route(
                    "/prescriptions/{order_id}/validate",
                    routing::post(validate_prescription),
                )
                .route(
                    "/prescriptions/{order_id}/reject",
                    routing::post(reject_prescription),
                ),
        )
        .route(
            "/api/deliveries/{order_id}/assign",
            routing::post(assign_delivery),
        )
        .route_layer(axum::middleware::from_fn_with_state(
            state,
            auth::admins_authorization,
        ))
}

async fn list_pharmacies(
    State(state): State<AppState>,
    Query(query): Query<ModerationQuery>,
) -> impl IntoResponse {
    let pharmacies = moderation::list_pharmacies(&state.store, query).await;
    StdResponse::ok(pharmacies, "Pharmacies retrieved successfully")
}

async fn verify_pharmacy(
    Path(id): Path<i32>,
    State(state): State<AppState>,
) -> Result<impl IntoResponse, AppError> {
    let pharmacy = moderation::verify_pharmacy(&state.store, id).await?;
    Ok(StdResponse::ok(pharmacy, "Pharmacy verified successfully"))
}

async fn reject_pharmacy(
    Path(id): Path<i32>,
    State(state): State<AppState>,
    body: Option<Json<RejectRequest>>,
) -> Result<impl IntoResponse, AppError> {
    let input = body.map(|Json(b)| b).unwrap_or(RejectRequest { reason: None });
    let pharmacy = moderation::reject_pharmacy(&state.store, id, input).await?;
    Ok(StdResponse::ok(pharmacy, "Pharmacy verification rejected"))
}

async fn list_products(
    State(state): State<AppState>,
    Query(query): Query<ModerationQuery>,
) -> impl IntoResponse {
    let products = moderation::list_medicines(&state.store, query).await;
    StdResponse::ok(products, "Products retrieved successfully")
}

async fn approve_product(
    Path(id): Path<i32>,
    State(state): State<AppState>,
) -> Result<impl IntoResponse, AppError> {
    let product = moderation::approve_medicine(&state.store, id).await?;
    Ok(StdResponse::ok(product, "Product approved successfully"))
}

async fn reject_product(
    Path(id): Path<i32>,
    State(state): State<AppState>,
    body: Option<Json<RejectRequest>>,
) -> Result<impl IntoResponse, AppError> {
    let input = body.map(|Json(b)| b).unwrap_or(RejectRequest { reason: None });
    let product = moderation::reject_medicine(&state.store, id, input).await?;
    Ok(StdResponse::ok(product, "Product rejected"))
}

#[derive(Deserialize, ToSchema)]
struct OrderListQuery {
    #[serde(default)]
    status: Option<OrderStatus>,
}

async fn list_orders(
    State(state): State<AppState>,
    Query(query): Query<OrderListQuery>,
) -> impl IntoResponse {
    let orders = moderation::all_orders(&state.store, query.status).await;
    StdResponse::ok(orders, "Orders retrieved successfully")
}

async fn dashboard_stats(State(state): State<AppState>) -> impl IntoResponse {
    let stats = moderation::dashboard(&state.store).await;
    StdResponse::ok(stats, "Dashboard statistics retrieved successfully")
}

async fn pending_prescriptions(State(state): State<AppState>) -> impl IntoResponse {
    let pending = prescriptions::pending(&state.store).await;
    StdResponse::ok(pending, "Pending prescriptions retrieved successfully")
}

fn prescription_id_of_order(tables: &Tables, order_id: i32) -> Result<i32, AppError> {
    tables
        .prescription_by_order
        .get(&order_id)
        .copied()
        .ok_or(AppError::NotFound)
}

async fn validate_prescription(
    Path(order_id): Path<i32>,
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
) -> Result<impl IntoResponse, AppError> {
    let prescription_id = {
        let tables = state.store.read().await;
        prescription_id_of_order(&tables, order_id)?
    };
    let prescription = prescriptions::validate(&state.store, auth.id, prescription_id).await?;
    Ok(StdResponse::ok(
        prescription,
        "Prescription validated successfully",
    ))
}

async fn reject_prescription(
    Path(order_id): Path<i32>,
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    body: Option<Json<RejectPrescription>>,
) -> Result<impl IntoResponse, AppError> {
    let prescription_id = {
        let tables = state.store.read().await;
        prescription_id_of_order(&tables, order_id)?
    };
    let input = body
        .map(|Json(b)| b)
        .unwrap_or(RejectPrescription { reason: None });
    let prescription = prescriptions::reject(&state.store, auth.id, prescription_id, input).await?;
    Ok(StdResponse::ok(
        prescription,
        "Prescription rejected, order cancelled",
    ))
}

async fn assign_delivery(
    Path(order_id): Path<i32>,
    State(state): State<AppState>,
    Json(body): Json<AssignDelivery>,
) -> Result<impl IntoResponse, AppError> {
    let delivery_id = {
        let tables = state.store.read().await;
        tables
            .delivery_by_order
            .get(&order_id)
            .copied()
            .ok_or(AppError::NotFound)?
    };
    let delivery = deliveries::assign(&state.store, delivery_id, body).await?;
    Ok(StdResponse::ok(delivery, "Delivery assigned successfully"))
}

use axum::{
    Extension, Json,
    extract::{Path, State},
    response::IntoResponse,
};
use utoipa_axum::router::OpenApiRouter;

use crate::{
    core::{
        auth::{self, AuthUser},
        error::{AppError, StdResponse},
        state::AppState,
    },
    services::{
        deliveries, orders,
        orders::{CheckoutRequest, OrderView},
        payments,
        payments::CreatePayment,
        prescriptions,
        prescriptions::AttachPrescription,
    },
};

pub fn routes_with_openapi(state: AppState) -> OpenApiRouter<AppState> {
    OpenApiRouter::new().nest(
        "/api/orders",
        OpenApiRouter::new()
            .routes(utoipa_axum::routes!(checkout))
            .routes(utoipa_axum::routes!(my_orders))
            .routes(utoipa_axum::routes!(get_order))
            .routes(utoipa_axum::routes!(cancel_order))
            .routes(utoipa_axum::routes!(create_payment, get_payment))
            .routes(utoipa_axum::routes!(attach_prescription))
            .routes(utoipa_axum::routes!(order_delivery))
            .layer(axum::middleware::from_fn_with_state(
                state,
                auth::users_authorization,
            )),
    )
}

/// Convert the caller's cart into orders, one per pharmacy.
#[utoipa::path(
    post,
    path = "/",
    tags = ["Orders"],
    responses(
        (status = 200, description = "Orders created from cart", body = StdResponse<Vec<OrderView>, String>)
    )
)]
async fn checkout(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Json(body): Json<CheckoutRequest>,
) -> Result<impl IntoResponse, AppError> {
    let created = orders::checkout(&state.store, &state.config, auth.id, body).await?;
    Ok(StdResponse::ok(created, "Order placed successfully"))
}

/// Fetch all orders belonging to the authenticated user.
#[utoipa::path(
    get,
    path = "/my-orders",
    tags = ["Orders"],
    responses(
        (status = 200, description = "List my orders", body = StdResponse<Vec<OrderView>, String>)
    )
)]
async fn my_orders(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
) -> Result<impl IntoResponse, AppError> {
    let orders = orders::my_orders(&state.store, auth.id).await;
    Ok(StdResponse::ok(orders, "Get my orders successfully"))
}

/// Fetch a specific order.
#[utoipa::path(
    get,
    path = "/{id}",
    tags = ["Orders"],
    params(
        ("id" = i32, Path, description = "Order ID to fetch")
    ),
    responses(
        (status = 200, description = "Get order successfully", body = StdResponse<OrderView, String>)
    )
)]
async fn get_order(
    Path(id): Path<i32>,
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
) -> Result<impl IntoResponse, AppError> {
    let order = orders::get_order(&state.store, auth.id, id).await?;
    Ok(StdResponse::ok(order, "Get order successfully"))
}

/// Cancel an order. Stock is returned and any open payment is failed.
#[utoipa::path(
    post,
    path = "/{id}/cancel",
    tags = ["Orders"],
    params(
        ("id" = i32, Path, description = "Order ID to cancel")
    ),
    responses(
        (status = 200, description = "Order cancelled", body = StdResponse<crate::models::OrderEntity, String>)
    )
)]
async fn cancel_order(
    Path(id): Path<i32>,
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
) -> Result<impl IntoResponse, AppError> {
    let order = orders::cancel_order(&state.store, auth, id).await?;
    Ok(StdResponse::ok(order, "Order cancelled successfully"))
}

/// Create the payment for an order.
#[utoipa::path(
    post,
    path = "/{id}/payment",
    tags = ["Payments"],
    params(
        ("id" = i32, Path, description = "Order ID")
    ),
    responses(
        (status = 200, description = "Payment created", body = StdResponse<crate::models::PaymentEntity, String>)
    )
)]
async fn create_payment(
    Path(id): Path<i32>,
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Json(body): Json<CreatePayment>,
) -> Result<impl IntoResponse, AppError> {
    let payment = payments::create_payment(&state.store, auth.id, id, body).await?;
    Ok(StdResponse::ok(payment, "Payment created successfully"))
}

/// Fetch the payment attached to an order.
#[utoipa::path(
    get,
    path = "/{id}/payment",
    tags = ["Payments"],
    params(
        ("id" = i32, Path, description = "Order ID")
    ),
    responses(
        (status = 200, description = "Payment retrieved", body = StdResponse<crate::models::PaymentEntity, String>)
    )
)]
async fn get_payment(
    Path(id): Path<i32>,
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
) -> Result<impl IntoResponse, AppError> {
    let payment = payments::order_payment(&state.store, auth.id, id).await?;
    Ok(StdResponse::ok(payment, "Payment retrieved successfully"))
}

/// Attach a prescription document to an order awaiting one.
#[utoipa::path(
    post,
    path = "/{id}/prescription",
    tags = ["Prescriptions"],
    params(
        ("id" = i32, Path, description = "Order ID")
    ),
    responses(
        (status = 200, description = "Prescription attached", body = StdResponse<crate::models::PrescriptionEntity, String>)
    )
)]
async fn attach_prescription(
    Path(id): Path<i32>,
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Json(body): Json<AttachPrescription>,
) -> Result<impl IntoResponse, AppError> {
    let prescription = prescriptions::attach(&state.store, auth.id, id, body).await?;
    Ok(StdResponse::ok(
        prescription,
        "Prescription uploaded successfully",
    ))
}

/// Delivery tracking for an order.
#[utoipa::path(
    get,
    path = "/{id}/delivery",
    tags = ["Deliveries"],
    params(
        ("id" = i32, Path, description = "Order ID")
    ),
    responses(
        (status = 200, description = "Delivery retrieved", body = StdResponse<crate::models::DeliveryEntity, String>)
    )
)]
async fn order_delivery(
    Path(id): Path<i32>,
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
) -> Result<impl IntoResponse, AppError> {
    let delivery = deliveries::order_delivery(&state.store, auth.id, id).await?;
    Ok(StdResponse::ok(delivery, "Delivery retrieved successfully"))
}
